//! UDP server ping.
//!
//! Voice servers answer a 12 byte ping request (four zero bytes plus an 8 byte
//! ident) on their UDP port with a 24 byte reply carrying the server
//! version, the echoed ident, user counts and the bandwidth limit. No
//! TLS session is needed, so the gateway can ping every configured
//! account without disturbing the active connection.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

use crate::address::split_address;
use crate::error::Error;
use crate::proto::split_version;

const REQUEST_LEN: usize = 12;
const REPLY_LEN: usize = 24;

/// A decoded ping reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReply {
    pub address: SocketAddr,
    pub version: (u16, u8, u8),
    pub users: u32,
    pub max_users: u32,
    pub max_bandwidth: u32,
    pub round_trip: Duration,
}

impl PingReply {
    pub fn version_string(&self) -> String {
        let (major, minor, patch) = self.version;
        format!("{major}.{minor}.{patch}")
    }
}

/// Ping a server over UDP and wait up to `timeout` for the reply.
pub async fn ping(address: &str, timeout: Duration) -> Result<PingReply, Error> {
    let (host, port) = split_address(address)?;
    let target = tokio::net::lookup_host((host.as_str(), port))
        .await?
        .next()
        .ok_or_else(|| Error::InvalidAddress {
            address: address.into(),
            reason: "host did not resolve".into(),
        })?;

    let bind: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;

    let ident: u64 = rand::random();
    let started = Instant::now();
    socket.send_to(&encode_request(ident), target).await?;

    let mut buf = [0_u8; 64];
    let exchange = async {
        loop {
            let (len, from) = socket.recv_from(&mut buf).await?;
            if from != target {
                debug!(%from, "ignoring datagram from unexpected peer");
                continue;
            }
            return decode_reply(&buf[..len], ident).ok_or_else(|| Error::BadPingReply {
                address: address.into(),
            });
        }
    };

    let raw = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| Error::Timeout {
            address: address.into(),
            timeout_secs: timeout.as_secs(),
        })??;

    Ok(PingReply {
        address: target,
        version: split_version(raw.version),
        users: raw.users,
        max_users: raw.max_users,
        max_bandwidth: raw.max_bandwidth,
        round_trip: started.elapsed(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawReply {
    pub version: u32,
    pub users: u32,
    pub max_users: u32,
    pub max_bandwidth: u32,
}

pub(crate) fn encode_request(ident: u64) -> [u8; REQUEST_LEN] {
    let mut out = [0_u8; REQUEST_LEN];
    out[4..].copy_from_slice(&ident.to_be_bytes());
    out
}

pub(crate) fn decode_reply(buf: &[u8], ident: u64) -> Option<RawReply> {
    let buf: &[u8; REPLY_LEN] = buf.try_into().ok()?;
    let word = |at: usize| u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

    let echoed = u64::from_be_bytes(buf[4..12].try_into().ok()?);
    if echoed != ident {
        return None;
    }

    Some(RawReply {
        version: word(0),
        users: word(12),
        max_users: word(16),
        max_bandwidth: word(20),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    fn reply(ident: u64) -> Vec<u8> {
        let mut out = vec![0, 1, 4, 2];
        out.extend_from_slice(&ident.to_be_bytes());
        out.extend_from_slice(&3_u32.to_be_bytes());
        out.extend_from_slice(&50_u32.to_be_bytes());
        out.extend_from_slice(&72_000_u32.to_be_bytes());
        out
    }

    #[test]
    fn request_carries_ident_after_zero_word() {
        let req = encode_request(0x0102_0304_0506_0708);
        assert_eq!(req, [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn reply_decodes_counts() {
        let raw = decode_reply(&reply(42), 42).unwrap();
        assert_eq!(split_version(raw.version), (1, 4, 2));
        assert_eq!((raw.users, raw.max_users, raw.max_bandwidth), (3, 50, 72_000));
    }

    #[test]
    fn reply_with_foreign_ident_is_ignored() {
        assert_eq!(decode_reply(&reply(41), 42), None);
        assert_eq!(decode_reply(&reply(42)[..20], 42), None);
    }
}
