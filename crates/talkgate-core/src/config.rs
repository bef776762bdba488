// ── Runtime gateway configuration ──
//
// These types describe *what* the gateway connects to and how it paces
// itself. They carry credential data and timings but never touch disk;
// `talkgate-config` builds a `GatewayConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::command::CommandPolicy;

/// One server account. The gateway is connected to exactly one at a time.
#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
    /// `host[:port]`.
    pub address: String,
    pub username: String,
    pub password: Option<SecretString>,
    pub tokens: Vec<String>,
    /// Accept self-signed server certificates.
    pub insecure: bool,
    /// PEM file with client certificate and key.
    pub certificate: Option<PathBuf>,
    /// Channel joined after connecting, and the fallback for "down" at the root.
    pub channel: Option<String>,
}

/// A sound file and the volume (0-100) to play it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundCue {
    pub path: PathBuf,
    pub volume: u8,
}

/// Optional sounds. `None` disables the corresponding cue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sounds {
    pub joined: Option<SoundCue>,
    pub left: Option<SoundCue>,
    pub message: Option<SoundCue>,
    /// Played into the channel by `Stream-Toggle`.
    pub stream: Option<SoundCue>,
    /// Played into the channel by the beacon timer.
    pub beacon: Option<SoundCue>,
    /// Spoken prompt before navigating up/down.
    pub channel_up: Option<SoundCue>,
    pub channel_down: Option<SoundCue>,
}

/// Delays and periods. `None` disables the corresponding timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Pause after a channel move so the server can confirm it.
    pub channel_settle: Duration,
    /// Pause between stopping a stream and keying up.
    pub transmit_settle: Duration,
    /// Time spent in each channel while scanning.
    pub scan_dwell: Duration,
    /// Dial + handshake timeout.
    pub connect_timeout: Duration,
    /// Per-server UDP ping timeout.
    pub ping_timeout: Duration,
    /// How long `TxLock` keeps transmitting.
    pub tx_lock: Duration,
    pub heartbeat: Option<Duration>,
    pub backlight: Option<Duration>,
    pub beacon: Option<Duration>,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            channel_settle: Duration::from_millis(500),
            transmit_settle: Duration::from_millis(100),
            scan_dwell: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(2),
            tx_lock: Duration::from_secs(60),
            heartbeat: None,
            backlight: None,
            beacon: None,
        }
    }
}

/// User comments set by the comment switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comments {
    pub on: String,
    pub off: String,
}

impl Default for Comments {
    fn default() -> Self {
        Self {
            on: "Monitoring".into(),
            off: String::new(),
        }
    }
}

/// Everything the gateway worker needs. Built by the config crate,
/// passed to [`Gateway::new`](crate::Gateway::new).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub accounts: Vec<Account>,
    /// Index into `accounts` used for the first connect.
    pub active_account: usize,
    pub http: CommandPolicy,
    pub mqtt: CommandPolicy,
    pub sounds: Sounds,
    pub timings: Timings,
    pub comments: Comments,
}

impl GatewayConfig {
    /// A config with one account and all remote commands disabled.
    pub fn single(account: Account) -> Self {
        Self {
            accounts: vec![account],
            active_account: 0,
            http: CommandPolicy::default(),
            mqtt: CommandPolicy::default(),
            sounds: Sounds::default(),
            timings: Timings::default(),
            comments: Comments::default(),
        }
    }
}
