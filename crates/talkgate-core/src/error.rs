// ── Core error types ──
//
// Gateway-level errors. Front-ends never see raw socket or protocol
// failures; the `From<talkgate_api::Error>` impl folds them into the
// variants below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Server rejected the gateway: {reason}")]
    Rejected { reason: String },

    #[error("Connection to {address} timed out after {timeout_secs}s")]
    Timeout { address: String, timeout_secs: u64 },

    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Not connected to a voice server")]
    NotConnected,

    // ── Session errors ───────────────────────────────────────────────
    #[error("Channel {channel_id} does not exist")]
    ChannelNotFound { channel_id: u32 },

    #[error("Session request failed: {message}")]
    Session { message: String },

    // ── Gateway lifecycle ────────────────────────────────────────────
    #[error("Gateway worker has stopped")]
    GatewayStopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<talkgate_api::Error> for CoreError {
    fn from(err: talkgate_api::Error) -> Self {
        match err {
            talkgate_api::Error::Io(e) => CoreError::ConnectionFailed {
                address: String::new(),
                reason: e.to_string(),
            },
            talkgate_api::Error::InvalidAddress { address, reason } => CoreError::Config {
                message: format!("invalid server address '{address}': {reason}"),
            },
            talkgate_api::Error::Timeout {
                address,
                timeout_secs,
            } => CoreError::Timeout {
                address,
                timeout_secs,
            },
            talkgate_api::Error::Tls(reason) => CoreError::ConnectionFailed {
                address: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            talkgate_api::Error::Rejected { kind, reason } => CoreError::Rejected {
                reason: if reason.is_empty() {
                    kind.to_string()
                } else {
                    format!("{kind}: {reason}")
                },
            },
            talkgate_api::Error::Closed | talkgate_api::Error::Disconnected => {
                CoreError::NotConnected
            }
            e @ (talkgate_api::Error::Decode { .. }
            | talkgate_api::Error::FrameTooLarge { .. }
            | talkgate_api::Error::BadPingReply { .. }) => CoreError::Session {
                message: e.to_string(),
            },
        }
    }
}
