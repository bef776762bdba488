// talkgate-api: async control-plane client for Mumble voice servers.
//
// Covers what a headless gateway needs: TLS dial, authentication, the
// channel/user model, moves, text messages, comments, and the UDP ping.
// Voice packets are out of scope.

pub mod address;
pub mod client;
pub mod codec;
pub mod error;
pub mod ping;
pub mod proto;
pub mod state;
pub mod tls;

pub use address::{DEFAULT_PORT, split_address};
pub use client::{Client, ClientEvent, ConnectOptions, DisconnectCause};
pub use error::Error;
pub use ping::{PingReply, ping};
pub use proto::{DenyType, RejectKind};
pub use state::{Channel, ServerState, User};
pub use tls::TlsOptions;
