//! Port traits: the boundary between the gateway worker and the world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Gateway (domain)
//! ```
//!
//! The voice transport, audio device and hardware indicators are all
//! reached through these traits, so the worker can be driven by fakes in
//! tests. Audio and indicator calls are fire-and-forget: the worker logs
//! their errors and carries on.

use std::future::Future;

use strum::{Display, EnumIter, EnumString};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use talkgate_api::{DenyType, PingReply};

use crate::command::MuteMode;
use crate::config::{Account, SoundCue};
use crate::error::CoreError;
use crate::navigator::ChannelInfo;

// ───────────────────────────────────────────────────────────────
// Voice transport (driven adapter: domain ↔ voice server)
// ───────────────────────────────────────────────────────────────

/// Why the session ended, for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DisconnectReason {
    #[strum(serialize = "connection error")]
    Error,
    #[strum(serialize = "other")]
    Other,
}

/// Events delivered by a live session, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected {
        welcome_text: Option<String>,
    },
    Disconnected {
        reason: DisconnectReason,
    },
    ChannelsChanged,
    UsersChanged,
    TextMessage {
        sender: Option<String>,
        message: String,
    },
    PermissionDenied {
        kind: DenyType,
        reason: Option<String>,
    },
}

/// A dialled session plus its event stream.
pub type Dialed<S> = (S, mpsc::UnboundedReceiver<SessionEvent>);

/// Dials sessions and pings servers.
pub trait VoiceTransport: Send + Sync + 'static {
    type Session: VoiceSession;

    /// One connection attempt to `account`.
    fn dial(
        &self,
        account: &Account,
    ) -> impl Future<Output = Result<Dialed<Self::Session>, CoreError>> + Send;

    /// UDP ping of `address` without touching the live session.
    fn ping(&self, address: &str) -> impl Future<Output = Result<PingReply, CoreError>> + Send;
}

/// Synchronous view of, and requests against, a live session.
///
/// Requests are queued; the server's confirmation arrives as a
/// [`SessionEvent`]. Reads reflect the most recent server state.
pub trait VoiceSession: Send + Sync + 'static {
    fn username(&self) -> String;
    fn channels(&self) -> Vec<ChannelInfo>;
    fn self_channel(&self) -> Option<u32>;
    /// Names of users in `channel_id`, including ourselves.
    fn users_in(&self, channel_id: u32) -> Vec<String>;
    fn move_to(&self, channel_id: u32) -> Result<(), CoreError>;
    fn send_text(&self, channel_id: u32, message: &str) -> Result<(), CoreError>;
    fn set_comment(&self, comment: &str) -> Result<(), CoreError>;
    fn disconnect(&self);
}

// ───────────────────────────────────────────────────────────────
// Audio & indicators (driven adapters: domain → device)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PortError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is not supported on this device")]
    Unsupported(&'static str),

    #[error("device error: {0}")]
    Device(String),
}

pub trait AudioPort: Send + Sync + 'static {
    /// Play a cue on the local speaker.
    fn play_local(&self, cue: &SoundCue) -> Result<(), PortError>;
    fn start_capture(&self) -> Result<(), PortError>;
    fn stop_capture(&self) -> Result<(), PortError>;
    /// Feed a file into the outgoing channel audio until it ends or
    /// `cancel` fires.
    fn stream_into_channel(&self, cue: &SoundCue, cancel: CancellationToken)
    -> Result<(), PortError>;
    /// Apply a mute mode; returns whether output is now muted.
    fn set_mute(&self, mode: MuteMode) -> Result<bool, PortError>;
}

/// Discrete indicator outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Led {
    Online,
    Participants,
    Transmit,
    Heartbeat,
    Attention,
    Backlight,
}

/// Number of text lines on the status display.
pub const DISPLAY_LINES: usize = 4;

pub trait IndicatorPort: Send + Sync + 'static {
    fn set_led(&self, led: Led, on: bool) -> Result<(), PortError>;
    fn render(&self, lines: &[String; DISPLAY_LINES]) -> Result<(), PortError>;
    /// Clear the local console and the display.
    fn clear(&self) -> Result<(), PortError>;
}
