// ── Command table ──
//
// Every front-end (keyboard, GPIO, HTTP, MQTT) resolves input to one of
// these names. The name → behavior mapping lives only here and in the
// gateway worker; front-ends decide solely whether a caller may ask.

use std::collections::BTreeSet;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tokio::sync::oneshot;

// ── Command ──────────────────────────────────────────────────────────

/// A named gateway command. `Display`/`FromStr` use the wire names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum Command {
    DisplayMenu,
    ChannelUp,
    ChannelDown,
    ListChannels,
    StartTransmitting,
    StopTransmitting,
    ListOnlineUsers,
    #[strum(serialize = "Stream-Toggle")]
    StreamToggle,
    ClearScreen,
    PingServers,
    ScanChannels,
    ShowUptime,
    Mute,
    Unmute,
    #[strum(serialize = "Mute-Toggle")]
    MuteToggle,
    TxLock,
    NextServer,
    PreviousServer,
    CommentOn,
    CommentOff,
    Quit,
}

impl Command {
    /// Human label used in HTTP responses ("API Channel Up Request ...").
    pub fn description(self) -> &'static str {
        match self {
            Self::DisplayMenu => "Display Menu",
            Self::ChannelUp => "Channel Up",
            Self::ChannelDown => "Channel Down",
            Self::ListChannels => "List Channels",
            Self::StartTransmitting => "Start Transmitting",
            Self::StopTransmitting => "Stop Transmitting",
            Self::ListOnlineUsers => "List Online Users",
            Self::StreamToggle => "Play/Stop Stream",
            Self::ClearScreen => "Clear Screen",
            Self::PingServers => "Ping Servers",
            Self::ScanChannels => "Scan Channels",
            Self::ShowUptime => "Show Uptime",
            Self::Mute => "Mute",
            Self::Unmute => "Unmute",
            Self::MuteToggle => "Mute/Unmute Toggle",
            Self::TxLock => "TX Lock",
            Self::NextServer => "Next Server",
            Self::PreviousServer => "Previous Server",
            Self::CommentOn => "Set Comment On",
            Self::CommentOff => "Set Comment Off",
            Self::Quit => "Quit",
        }
    }

    /// Commands that are silently skipped while disconnected.
    pub fn requires_connection(self) -> bool {
        !matches!(
            self,
            Self::DisplayMenu
                | Self::ClearScreen
                | Self::PingServers
                | Self::ShowUptime
                | Self::Mute
                | Self::Unmute
                | Self::MuteToggle
                | Self::NextServer
                | Self::PreviousServer
                | Self::Quit
        )
    }

    /// Resolve a wire name, tolerating surrounding whitespace.
    pub fn lookup(name: &str) -> Option<Self> {
        name.trim().parse().ok()
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::iter().map(<&'static str>::from)
    }
}

// ── Mute mode ────────────────────────────────────────────────────────

/// Argument of the mute commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum MuteMode {
    Mute,
    Unmute,
    Toggle,
}

// ── Front-ends & permissions ─────────────────────────────────────────

/// Where a command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FrontEnd {
    Keyboard,
    Gpio,
    Http,
    Mqtt,
}

/// Commands a remote front-end may invoke. Anything absent is denied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPolicy {
    enabled: BTreeSet<Command>,
}

impl CommandPolicy {
    pub fn allow_all() -> Self {
        Self {
            enabled: Command::iter().collect(),
        }
    }

    pub fn permits(&self, command: Command) -> bool {
        self.enabled.contains(&command)
    }

    pub fn enabled(&self) -> impl Iterator<Item = Command> + '_ {
        self.enabled.iter().copied()
    }

    pub fn disable(&mut self, command: Command) {
        self.enabled.remove(&command);
    }
}

impl FromIterator<Command> for CommandPolicy {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().collect(),
        }
    }
}

// ── Results ──────────────────────────────────────────────────────────

/// What a handler did. Collaborator failures are logged, not reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReport {
    Completed,
    /// Skipped because the gateway is not connected.
    NotConnected,
    /// Navigation hit the first/last channel; state is unchanged.
    Boundary,
    /// Already in the requested state (e.g. already transmitting).
    Unchanged,
    /// The command could not run (bad payload, missing configuration).
    Rejected(String),
    /// Cut short because the gateway is shutting down.
    Interrupted,
}

/// Outcome of [`Controller::invoke`](crate::Controller::invoke).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Executed(Command, CommandReport),
    /// The front-end may not invoke this command.
    Denied(Command),
    /// Not a known command name.
    Undefined,
    /// The gateway worker is gone.
    Unavailable(Command),
}

/// A queued command with its reply channel.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    pub payload: Option<String>,
    pub response_tx: oneshot::Sender<CommandReport>,
}
