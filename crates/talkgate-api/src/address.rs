use crate::error::Error;

/// Port voice servers listen on when the address omits one.
pub const DEFAULT_PORT: u16 = 64738;

/// Split `host[:port]` (or `[v6]:port`) into host and port.
pub fn split_address(address: &str) -> Result<(String, u16), Error> {
    let invalid = |reason: &str| Error::InvalidAddress {
        address: address.into(),
        reason: reason.into(),
    };
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| invalid("port is not a number between 0 and 65535"))
    };

    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty address"));
    }

    if let Some(rest) = trimmed.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if tail.is_empty() => DEFAULT_PORT,
            None => return Err(invalid("unexpected text after IPv6 literal")),
        };
        return Ok((host.into(), port));
    }

    match trimmed.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            if host.is_empty() {
                return Err(invalid("missing host"));
            }
            Ok((host.into(), parse_port(port)?))
        }
        // Bare IPv6 literal without brackets, or no port at all.
        _ => Ok((trimmed.into(), DEFAULT_PORT)),
    }
}
