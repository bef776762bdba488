//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use talkgate_config::ConfigError;
use talkgate_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFIG: i32 = 4;
    pub const DEVICE: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {address}: {reason}")]
    #[diagnostic(
        code(talkgate::connection_failed),
        help(
            "Check that the server is reachable and the address is right.\n\
             Try: talkgate ping"
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Server rejected the gateway: {reason}")]
    #[diagnostic(
        code(talkgate::rejected),
        help("Verify the account's username, password and access tokens.")
    )]
    Rejected { reason: String },

    #[error("Gave up after {attempts} reconnect attempts")]
    #[diagnostic(
        code(talkgate::reconnect_exhausted),
        help("The server stayed unreachable. A supervisor may restart the gateway.")
    )]
    ReconnectExhausted { attempts: u32 },

    #[error("Connection to {address} timed out after {seconds}s")]
    #[diagnostic(
        code(talkgate::timeout),
        help("Raise timers.connect_timeout or check the network.")
    )]
    Timeout { address: String, seconds: u64 },

    #[error("Gateway failed: {message}")]
    #[diagnostic(code(talkgate::gateway))]
    Gateway { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(talkgate::no_config),
        help(
            "Create one with: talkgate config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(talkgate::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(talkgate::config),
        help("Run: talkgate config check")
    )]
    Config(#[from] ConfigError),

    // ── Front-ends & devices ─────────────────────────────────────────
    #[error("Cannot listen on {address}")]
    #[diagnostic(
        code(talkgate::http_bind),
        help("Another process may own the port; change http.listen.")
    )]
    HttpBind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot put the terminal into raw mode")]
    #[diagnostic(
        code(talkgate::terminal),
        help("Run without a terminal front-end: talkgate run --no-keyboard")
    )]
    Terminal {
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO setup failed on {chip}: {reason}")]
    #[diagnostic(
        code(talkgate::gpio),
        help("Check gpio.chip and that the user may open it (usually the 'gpio' group).")
    )]
    Gpio { chip: String, reason: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ReconnectExhausted { .. } => {
                exit_code::CONNECTION
            }
            Self::Rejected { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::ConfigExists { .. } => exit_code::USAGE,
            Self::HttpBind { .. } | Self::Terminal { .. } | Self::Gpio { .. } => exit_code::DEVICE,
            Self::Gateway { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }
            CoreError::Rejected { reason } => CliError::Rejected { reason },
            CoreError::ReconnectExhausted { attempts } => CliError::ReconnectExhausted { attempts },
            CoreError::Timeout {
                address,
                timeout_secs,
            } => CliError::Timeout {
                address,
                seconds: timeout_secs,
            },
            CoreError::Config { message } => CliError::Config(ConfigError::Validation {
                field: "accounts".into(),
                reason: message,
            }),
            other @ (CoreError::NotConnected
            | CoreError::ChannelNotFound { .. }
            | CoreError::Session { .. }
            | CoreError::GatewayStopped) => CliError::Gateway {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_reconnect_exits_with_connection_code() {
        let err = CliError::from(CoreError::ReconnectExhausted { attempts: 3 });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(err.to_string(), "Gave up after 3 reconnect attempts");
    }

    #[test]
    fn config_problems_exit_with_config_code() {
        let err = CliError::from(CoreError::Config {
            message: "invalid server address".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);
        assert_eq!(CliError::from(ConfigError::NoAccounts).exit_code(), exit_code::CONFIG);
    }
}
