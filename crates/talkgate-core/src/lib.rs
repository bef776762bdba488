//! Gateway core between `talkgate-api` and the front-ends.
//!
//! - **[`Gateway`]**: the worker that owns all session state. It keeps one
//!   voice session alive (bounded reconnect), navigates channels, enforces
//!   transmit/stream exclusion and reacts to session events.
//!
//! - **[`Controller`]**: cloneable handle front-ends use to run commands by
//!   name. Keyboard, GPIO, HTTP and MQTT all go through
//!   [`Controller::invoke`]; they differ only in which commands they may
//!   ask for.
//!
//! - **Ports** ([`ports`]): the voice transport, audio device and hardware
//!   indicators, as traits. [`MumbleTransport`] is the production transport.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod navigator;
pub mod ports;
pub mod state;
pub mod transport;

mod timers;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandPolicy, CommandReport, DispatchOutcome, FrontEnd, MuteMode};
pub use config::{Account, Comments, GatewayConfig, SoundCue, Sounds, Timings};
pub use controller::Controller;
pub use error::CoreError;
pub use gateway::Gateway;
pub use navigator::{ChannelInfo, ChannelSnapshot};
pub use ports::{
    AudioPort, DISPLAY_LINES, IndicatorPort, Led, PortError, SessionEvent, VoiceSession,
    VoiceTransport,
};
pub use state::{ButtonPress, SessionSnapshot};
pub use transport::MumbleTransport;
