use thiserror::Error;

use crate::proto::RejectKind;

/// Top-level error type for the `talkgate-api` crate.
///
/// Covers every failure mode of the control channel and the UDP
/// ping. `talkgate-core` maps these into gateway-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Socket-level failure (connection refused, reset, DNS failure, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured address could not be split into host and port.
    #[error("Invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Dial or handshake did not finish in time.
    #[error("Connection to {address} timed out after {timeout_secs}s")]
    Timeout { address: String, timeout_secs: u64 },

    /// TLS configuration, certificate loading, or handshake error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// The server refused the authentication attempt.
    #[error("Server rejected connection ({kind}): {reason}")]
    Rejected { kind: RejectKind, reason: String },

    /// A control message could not be decoded.
    #[error("Malformed {message} message: {source}")]
    Decode {
        message: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    /// A frame header announced a payload larger than we accept.
    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The server closed the control channel.
    #[error("Connection closed by server")]
    Closed,

    /// The client handle outlived its connection task.
    #[error("Client is disconnected")]
    Disconnected,

    // ── Ping ────────────────────────────────────────────────────────
    /// The UDP ping reply was truncated or did not echo our ident.
    #[error("Malformed ping reply from {address}")]
    BadPingReply { address: String },
}
