//! Configuration for the talkgate gateway.
//!
//! TOML file + `TALKGATE_`-prefixed environment via figment, credential
//! resolution (env + plaintext), and translation to
//! `talkgate_core::GatewayConfig`. The binary adds the GPIO/MQTT/HTTP
//! front-end settings resolved here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use talkgate_core::{
    Account, Command, CommandPolicy, Comments, GatewayConfig, Led, SoundCue, Sounds, Timings,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no accounts configured")]
    NoAccounts,

    #[error("unknown account '{name}' (configured: {available})")]
    UnknownAccount { name: String, available: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Account connected at startup. Defaults to the first by name.
    pub default_account: Option<String>,

    /// Named server accounts.
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountProfile>,

    #[serde(default)]
    pub keyboard: KeyboardConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub gpio: GpioConfig,

    #[serde(default)]
    pub sounds: SoundsConfig,

    #[serde(default)]
    pub timers: TimersConfig,

    #[serde(default)]
    pub comments: CommentsConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// One voice server account.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccountProfile {
    /// `host[:port]`; the port defaults to 64738.
    pub address: String,

    /// Login name. A random `talkgate-…` name is used when absent.
    pub username: Option<String>,

    /// Server password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the server password.
    pub password_env: Option<String>,

    /// Accept self-signed server certificates.
    #[serde(default)]
    pub insecure: bool,

    /// PEM file with client certificate and private key.
    pub certificate: Option<PathBuf>,

    /// Channel joined after connecting.
    pub channel: Option<String>,

    /// Access tokens sent with authentication.
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct KeyboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// HTTP command API.
#[derive(Debug, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,

    /// Commands the API may invoke. All when absent.
    pub commands: Option<Vec<String>>,

    /// Commands removed from `commands`.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_listen(),
            commands: None,
            disabled: Vec::new(),
        }
    }
}

/// MQTT command subscription.
#[derive(Debug, Deserialize, Serialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub enabled: bool,

    /// `mqtt://host[:port]`.
    #[serde(default = "default_broker")]
    pub broker: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    pub client_id: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,

    pub password_env: Option<String>,

    /// Subscription QoS (0, 1 or 2).
    #[serde(default)]
    pub qos: u8,

    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,

    pub commands: Option<Vec<String>>,

    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker: default_broker(),
            topic: default_topic(),
            client_id: None,
            username: None,
            password: None,
            password_env: None,
            qos: 0,
            keep_alive: default_keep_alive(),
            commands: None,
            disabled: Vec::new(),
        }
    }
}

/// GPIO buttons and LEDs on a Linux character device.
#[derive(Debug, Deserialize, Serialize)]
pub struct GpioConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_chip")]
    pub chip: PathBuf,

    /// Button poll interval while connected.
    #[serde(default = "default_poll")]
    pub poll: String,

    /// Button poll interval while offline.
    #[serde(default = "default_idle")]
    pub idle: String,

    /// Buttons pull up and read low when pressed.
    #[serde(default = "default_true")]
    pub active_low: bool,

    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,

    /// LED name (`online`, `participants`, `transmit`, `heartbeat`,
    /// `attention`, `backlight`) → line offset.
    #[serde(default)]
    pub leds: BTreeMap<String, u32>,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chip: default_chip(),
            poll: default_poll(),
            idle: default_idle(),
            active_low: true,
            buttons: Vec::new(),
            leds: BTreeMap::new(),
        }
    }
}

/// A button: `press` runs on the falling edge, `release` (if any) on the
/// rising edge. Push-to-talk is `StartTransmitting` / `StopTransmitting`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonConfig {
    pub pin: u32,
    pub press: String,
    pub release: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SoundEntry {
    pub path: PathBuf,
    #[serde(default = "default_volume")]
    pub volume: u8,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SoundsConfig {
    pub joined: Option<SoundEntry>,
    pub left: Option<SoundEntry>,
    pub message: Option<SoundEntry>,
    pub stream: Option<SoundEntry>,
    pub beacon: Option<SoundEntry>,
    pub channel_up: Option<SoundEntry>,
    pub channel_down: Option<SoundEntry>,
}

/// Durations in humantime syntax ("500ms", "1m 30s").
#[derive(Debug, Deserialize, Serialize)]
pub struct TimersConfig {
    #[serde(default = "default_channel_settle")]
    pub channel_settle: String,
    #[serde(default = "default_transmit_settle")]
    pub transmit_settle: String,
    #[serde(default = "default_scan_dwell")]
    pub scan_dwell: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: String,
    #[serde(default = "default_tx_lock")]
    pub tx_lock: String,
    pub heartbeat: Option<String>,
    pub backlight: Option<String>,
    pub beacon: Option<String>,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            channel_settle: default_channel_settle(),
            transmit_settle: default_transmit_settle(),
            scan_dwell: default_scan_dwell(),
            connect_timeout: default_connect_timeout(),
            ping_timeout: default_ping_timeout(),
            tx_lock: default_tx_lock(),
            heartbeat: None,
            backlight: None,
            beacon: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsConfig {
    #[serde(default = "default_comment_on")]
    pub on: String,
    #[serde(default)]
    pub off: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            on: default_comment_on(),
            off: String::new(),
        }
    }
}

/// Local audio tools.
#[derive(Debug, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Local cue player. `{file}` and `{volume}` (0-100) are substituted.
    #[serde(default = "default_player")]
    pub player: Vec<String>,

    /// Mixer invoked as `<mixer> set <control> <percent>% | mute | unmute | toggle`.
    #[serde(default = "default_mixer")]
    pub mixer: String,

    #[serde(default = "default_mixer_control")]
    pub mixer_control: String,

    /// Spawned while transmitting, killed on stop.
    pub transmit_command: Option<Vec<String>>,

    /// Spawned to feed a file into the channel. Same placeholders as `player`.
    pub stream_command: Option<Vec<String>>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            player: default_player(),
            mixer: default_mixer(),
            mixer_control: default_mixer_control(),
            transmit_command: None,
            stream_command: None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// Append logs here in addition to stderr.
    pub file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}
fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_broker() -> String {
    "mqtt://localhost:1883".into()
}
fn default_topic() -> String {
    "talkgate/command".into()
}
fn default_keep_alive() -> String {
    "30s".into()
}
fn default_chip() -> PathBuf {
    PathBuf::from("/dev/gpiochip0")
}
fn default_poll() -> String {
    "200ms".into()
}
fn default_idle() -> String {
    "1s".into()
}
fn default_volume() -> u8 {
    80
}
fn default_channel_settle() -> String {
    "500ms".into()
}
fn default_transmit_settle() -> String {
    "100ms".into()
}
fn default_scan_dwell() -> String {
    "1s".into()
}
fn default_connect_timeout() -> String {
    "10s".into()
}
fn default_ping_timeout() -> String {
    "2s".into()
}
fn default_tx_lock() -> String {
    "60s".into()
}
fn default_comment_on() -> String {
    "Monitoring".into()
}
fn default_player() -> Vec<String> {
    vec!["aplay".into(), "-q".into(), "{file}".into()]
}
fn default_mixer() -> String {
    "amixer".into()
}
fn default_mixer_control() -> String {
    "Master".into()
}

impl Config {
    /// Starter file written by `talkgate config init`.
    pub fn example() -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            "home".to_owned(),
            AccountProfile {
                address: "voice.example.org:64738".into(),
                username: Some("talkgate".into()),
                password_env: Some("TALKGATE_HOME_PASSWORD".into()),
                insecure: true,
                channel: Some("Root".into()),
                ..AccountProfile::default()
            },
        );
        Self {
            default_account: Some("home".into()),
            accounts,
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "talkgate", "talkgate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("talkgate");
    p
}

// ── Config loading & saving ─────────────────────────────────────────

/// Load the config from `path` + environment. A missing file yields the
/// defaults (which have no accounts).
///
/// Environment keys nest with `__`: `TALKGATE_HTTP__ENABLED=true`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TALKGATE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Password from the named env var, then plaintext. `None` when neither is set.
fn resolve_password(
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    if let Some(env_name) = env_name {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }
    plaintext.map(|pw| SecretString::from(pw.to_owned()))
}

/// `talkgate-` followed by 12 random hex digits.
pub fn random_username() -> String {
    let bytes: [u8; 6] = rand::random();
    let mut name = String::from("talkgate-");
    for b in bytes {
        name.push_str(&format!("{b:02x}"));
    }
    name
}

// ── Translation to core types ───────────────────────────────────────

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| invalid(field, format!("'{value}': {e}")))
}

fn parse_optional_duration(
    field: &str,
    value: Option<&String>,
) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|v| parse_duration(field, v))
        .transpose()
        .map(|d| d.filter(|d| !d.is_zero()))
}

fn parse_command(field: &str, name: &str) -> Result<Command, ConfigError> {
    Command::lookup(name).ok_or_else(|| invalid(field, format!("unknown command '{name}'")))
}

/// Allow-list (all commands when absent) minus `disabled`.
fn command_policy(
    field: &str,
    commands: Option<&[String]>,
    disabled: &[String],
) -> Result<CommandPolicy, ConfigError> {
    let mut policy = match commands {
        None => CommandPolicy::allow_all(),
        Some(names) => names
            .iter()
            .map(|n| parse_command(field, n))
            .collect::<Result<CommandPolicy, _>>()?,
    };
    for name in disabled {
        policy.disable(parse_command(field, name)?);
    }
    Ok(policy)
}

fn sound(field: &str, entry: Option<&SoundEntry>) -> Result<Option<SoundCue>, ConfigError> {
    let Some(entry) = entry else { return Ok(None) };
    if entry.volume > 100 {
        return Err(invalid(
            format!("sounds.{field}.volume"),
            format!("{} is above 100", entry.volume),
        ));
    }
    Ok(Some(SoundCue {
        path: entry.path.clone(),
        volume: entry.volume,
    }))
}

fn to_account(name: &str, profile: &AccountProfile) -> Result<Account, ConfigError> {
    if profile.address.trim().is_empty() {
        return Err(invalid(format!("accounts.{name}.address"), "must not be empty"));
    }
    Ok(Account {
        name: name.to_owned(),
        address: profile.address.trim().to_owned(),
        username: profile
            .username
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(random_username),
        password: resolve_password(profile.password_env.as_deref(), profile.password.as_deref()),
        tokens: profile.tokens.clone(),
        insecure: profile.insecure,
        certificate: profile.certificate.clone(),
        channel: profile.channel.clone().filter(|c| !c.is_empty()),
    })
}

fn to_timings(timers: &TimersConfig) -> Result<Timings, ConfigError> {
    Ok(Timings {
        channel_settle: parse_duration("timers.channel_settle", &timers.channel_settle)?,
        transmit_settle: parse_duration("timers.transmit_settle", &timers.transmit_settle)?,
        scan_dwell: parse_duration("timers.scan_dwell", &timers.scan_dwell)?,
        connect_timeout: parse_duration("timers.connect_timeout", &timers.connect_timeout)?,
        ping_timeout: parse_duration("timers.ping_timeout", &timers.ping_timeout)?,
        tx_lock: parse_duration("timers.tx_lock", &timers.tx_lock)?,
        heartbeat: parse_optional_duration("timers.heartbeat", timers.heartbeat.as_ref())?,
        backlight: parse_optional_duration("timers.backlight", timers.backlight.as_ref())?,
        beacon: parse_optional_duration("timers.beacon", timers.beacon.as_ref())?,
    })
}

/// Build the gateway configuration. `account` overrides `default_account`.
pub fn to_gateway_config(
    cfg: &Config,
    account: Option<&str>,
) -> Result<GatewayConfig, ConfigError> {
    if cfg.accounts.is_empty() {
        return Err(ConfigError::NoAccounts);
    }

    let accounts = cfg
        .accounts
        .iter()
        .map(|(name, profile)| to_account(name, profile))
        .collect::<Result<Vec<_>, _>>()?;

    let wanted = account.or(cfg.default_account.as_deref());
    let active_account = match wanted {
        None => 0,
        Some(name) => accounts
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| ConfigError::UnknownAccount {
                name: name.to_owned(),
                available: cfg.accounts.keys().cloned().collect::<Vec<_>>().join(", "),
            })?,
    };

    let sounds = &cfg.sounds;
    Ok(GatewayConfig {
        accounts,
        active_account,
        http: command_policy(
            "http.commands",
            cfg.http.commands.as_deref(),
            &cfg.http.disabled,
        )?,
        mqtt: command_policy(
            "mqtt.commands",
            cfg.mqtt.commands.as_deref(),
            &cfg.mqtt.disabled,
        )?,
        sounds: Sounds {
            joined: sound("joined", sounds.joined.as_ref())?,
            left: sound("left", sounds.left.as_ref())?,
            message: sound("message", sounds.message.as_ref())?,
            stream: sound("stream", sounds.stream.as_ref())?,
            beacon: sound("beacon", sounds.beacon.as_ref())?,
            channel_up: sound("channel_up", sounds.channel_up.as_ref())?,
            channel_down: sound("channel_down", sounds.channel_down.as_ref())?,
        },
        timings: to_timings(&cfg.timers)?,
        comments: Comments {
            on: cfg.comments.on.clone(),
            off: cfg.comments.off.clone(),
        },
    })
}

// ── Front-end settings ──────────────────────────────────────────────

/// Resolved MQTT connection settings.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub credentials: Option<(String, SecretString)>,
    pub qos: u8,
    pub keep_alive: Duration,
}

pub fn resolve_mqtt(cfg: &MqttConfig) -> Result<MqttSettings, ConfigError> {
    let url: url::Url = cfg
        .broker
        .parse()
        .map_err(|e| invalid("mqtt.broker", format!("'{}': {e}", cfg.broker)))?;
    if !matches!(url.scheme(), "mqtt" | "tcp") {
        return Err(invalid(
            "mqtt.broker",
            format!("unsupported scheme '{}', expected mqtt://", url.scheme()),
        ));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("mqtt.broker", "missing host"))?
        .to_owned();
    if cfg.topic.trim().is_empty() {
        return Err(invalid("mqtt.topic", "must not be empty"));
    }
    if cfg.qos > 2 {
        return Err(invalid("mqtt.qos", format!("{} is not 0, 1 or 2", cfg.qos)));
    }

    let credentials = cfg.username.clone().map(|user| {
        let password = resolve_password(cfg.password_env.as_deref(), cfg.password.as_deref())
            .unwrap_or_else(|| SecretString::from(String::new()));
        (user, password)
    });

    Ok(MqttSettings {
        host,
        port: url.port().unwrap_or(1883),
        topic: cfg.topic.trim().to_owned(),
        client_id: cfg.client_id.clone().unwrap_or_else(random_username),
        credentials,
        qos: cfg.qos,
        keep_alive: parse_duration("mqtt.keep_alive", &cfg.keep_alive)?,
    })
}

/// A button line bound to commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonBinding {
    pub pin: u32,
    pub press: Command,
    pub release: Option<Command>,
}

/// Resolved GPIO layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioPlan {
    pub chip: PathBuf,
    pub poll: Duration,
    pub idle: Duration,
    pub active_low: bool,
    pub buttons: Vec<ButtonBinding>,
    pub leds: Vec<(Led, u32)>,
}

pub fn resolve_gpio(cfg: &GpioConfig) -> Result<GpioPlan, ConfigError> {
    let mut pins = BTreeMap::new();
    let mut claim = |pin: u32, owner: String| match pins.insert(pin, owner.clone()) {
        Some(previous) => Err(invalid(
            "gpio",
            format!("line {pin} used by both {previous} and {owner}"),
        )),
        None => Ok(()),
    };

    let mut buttons = Vec::with_capacity(cfg.buttons.len());
    for (i, button) in cfg.buttons.iter().enumerate() {
        let field = format!("gpio.buttons[{i}]");
        claim(button.pin, field.clone())?;
        buttons.push(ButtonBinding {
            pin: button.pin,
            press: parse_command(&field, &button.press)?,
            release: button
                .release
                .as_deref()
                .map(|r| parse_command(&field, r))
                .transpose()?,
        });
    }

    let mut leds = Vec::with_capacity(cfg.leds.len());
    for (name, &pin) in &cfg.leds {
        let led: Led = name
            .parse()
            .map_err(|_| invalid(format!("gpio.leds.{name}"), "unknown LED"))?;
        claim(pin, format!("led {name}"))?;
        leds.push((led, pin));
    }

    Ok(GpioPlan {
        chip: cfg.chip.clone(),
        poll: parse_duration("gpio.poll", &cfg.poll)?,
        idle: parse_duration("gpio.idle", &cfg.idle)?,
        active_low: cfg.active_low,
        buttons,
        leds,
    })
}

/// Check everything `run` would resolve, without connecting.
pub fn validate(cfg: &Config) -> Result<GatewayConfig, ConfigError> {
    let gateway = to_gateway_config(cfg, None)?;
    if cfg.mqtt.enabled {
        resolve_mqtt(&cfg.mqtt)?;
    }
    if cfg.gpio.enabled {
        resolve_gpio(&cfg.gpio)?;
    }
    if cfg.http.enabled {
        cfg.http
            .listen
            .parse::<std::net::SocketAddr>()
            .map_err(|e| invalid("http.listen", format!("'{}': {e}", cfg.http.listen)))?;
    }
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn parse(toml_text: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml_text).unwrap();
        load_config(&path).unwrap()
    }

    const TWO_ACCOUNTS: &str = r#"
        default_account = "site"

        [accounts.home]
        address = "home.example.org"
        username = "gw-home"
        password = "hunter2"

        [accounts.site]
        address = "site.example.org:64739"
        channel = "Ops"
        insecure = true
    "#;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.accounts.is_empty());
        assert!(cfg.keyboard.enabled);
        assert_eq!(cfg.http.listen, "0.0.0.0:8080");
        assert!(matches!(
            to_gateway_config(&cfg, None),
            Err(ConfigError::NoAccounts)
        ));
    }

    #[test]
    fn accounts_translate_in_name_order() {
        let cfg = parse(TWO_ACCOUNTS);
        let gw = to_gateway_config(&cfg, None).unwrap();

        let names: Vec<_> = gw.accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["home", "site"]);
        assert_eq!(gw.active_account, 1);

        let home = &gw.accounts[0];
        assert_eq!(home.username, "gw-home");
        assert_eq!(home.password.as_ref().unwrap().expose_secret(), "hunter2");

        let site = &gw.accounts[1];
        assert!(site.insecure);
        assert_eq!(site.channel.as_deref(), Some("Ops"));
        assert!(site.username.starts_with("talkgate-"));
        assert_eq!(site.username.len(), "talkgate-".len() + 12);
    }

    #[test]
    fn account_override_must_exist() {
        let cfg = parse(TWO_ACCOUNTS);
        assert_eq!(to_gateway_config(&cfg, Some("home")).unwrap().active_account, 0);

        let err = to_gateway_config(&cfg, Some("cabin")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown account 'cabin' (configured: home, site)"
        );
    }

    #[test]
    fn command_policies_default_to_all_minus_disabled() {
        let cfg = parse(&format!(
            "{TWO_ACCOUNTS}\n[http]\ndisabled = [\"Quit\"]\n[mqtt]\ncommands = [\"ChannelUp\", \"Stream-Toggle\"]\n"
        ));
        let gw = to_gateway_config(&cfg, None).unwrap();

        assert!(gw.http.permits(Command::ChannelUp));
        assert!(!gw.http.permits(Command::Quit));
        assert!(gw.mqtt.permits(Command::StreamToggle));
        assert!(!gw.mqtt.permits(Command::ChannelDown));
    }

    #[test]
    fn unknown_command_names_are_rejected() {
        let cfg = parse(&format!("{TWO_ACCOUNTS}\n[http]\ncommands = [\"Launch\"]\n"));
        let err = to_gateway_config(&cfg, None).unwrap_err();
        assert_eq!(err.to_string(), "invalid http.commands: unknown command 'Launch'");
    }

    #[test]
    fn timers_parse_humantime() {
        let cfg = parse(&format!(
            "{TWO_ACCOUNTS}\n[timers]\nscan_dwell = \"2s 500ms\"\nheartbeat = \"1s\"\nbeacon = \"0s\"\n"
        ));
        let timings = to_gateway_config(&cfg, None).unwrap().timings;
        assert_eq!(timings.scan_dwell, Duration::from_millis(2500));
        assert_eq!(timings.channel_settle, Duration::from_millis(500));
        assert_eq!(timings.heartbeat, Some(Duration::from_secs(1)));
        assert_eq!(timings.beacon, None);

        let cfg = parse(&format!("{TWO_ACCOUNTS}\n[timers]\ntx_lock = \"soon\"\n"));
        assert!(matches!(
            to_gateway_config(&cfg, None),
            Err(ConfigError::Validation { field, .. }) if field == "timers.tx_lock"
        ));
    }

    #[test]
    fn sound_volume_is_bounded() {
        let cfg = parse(&format!(
            "{TWO_ACCOUNTS}\n[sounds.joined]\npath = \"/s/join.wav\"\nvolume = 120\n"
        ));
        assert!(to_gateway_config(&cfg, None).is_err());
    }

    #[test]
    fn gpio_plan_rejects_shared_lines() {
        let cfg = parse(
            r#"
            [gpio]
            enabled = true
            buttons = [
                { pin = 17, press = "StartTransmitting", release = "StopTransmitting" },
                { pin = 27, press = "ChannelUp" },
            ]
            leds = { online = 5, transmit = 6 }
            "#,
        );
        let plan = resolve_gpio(&cfg.gpio).unwrap();
        assert_eq!(plan.poll, Duration::from_millis(200));
        assert_eq!(
            plan.buttons[0],
            ButtonBinding {
                pin: 17,
                press: Command::StartTransmitting,
                release: Some(Command::StopTransmitting),
            }
        );
        assert_eq!(plan.leds, vec![(Led::Online, 5), (Led::Transmit, 6)]);

        let cfg = parse("[gpio]\nbuttons = [{ pin = 5, press = \"ChannelUp\" }]\nleds = { online = 5 }\n");
        assert!(resolve_gpio(&cfg.gpio).is_err());
    }

    #[test]
    fn mqtt_broker_url_is_validated() {
        let mut cfg = MqttConfig {
            broker: "mqtt://broker.lan".into(),
            username: Some("gw".into()),
            password: Some("pw".into()),
            ..MqttConfig::default()
        };
        let settings = resolve_mqtt(&cfg).unwrap();
        assert_eq!(settings.host, "broker.lan");
        assert_eq!(settings.port, 1883);
        assert_eq!(settings.credentials.unwrap().1.expose_secret(), "pw");

        cfg.broker = "https://broker.lan".into();
        assert!(resolve_mqtt(&cfg).is_err());
    }

    #[test]
    fn example_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        save_config(&Config::example(), &path).unwrap();

        let cfg = load_config(&path).unwrap();
        let gw = validate(&cfg).unwrap();
        assert_eq!(gw.accounts[0].address, "voice.example.org:64738");
    }
}
