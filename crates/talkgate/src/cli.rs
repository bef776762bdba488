//! Clap derive structures for the `talkgate` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// talkgate -- headless Mumble gateway for buttons, LEDs and remote control
#[derive(Debug, Parser)]
#[command(
    name = "talkgate",
    version,
    about = "Headless Mumble gateway for buttons, LEDs and remote control",
    long_about = "Keeps a Mumble session alive and drives it from a keyboard, GPIO \
        buttons, an HTTP API and an MQTT topic.\n\n\
        Connection, channel and participant state is mirrored onto LEDs and a \
        four-line status display. Without a subcommand, `run` is assumed.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "TALKGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Account to connect to (overrides `default_account`)
    #[arg(long, short = 'a', env = "TALKGATE_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Also write logs to this file
    #[arg(long, env = "TALKGATE_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and serve all enabled front-ends (default)
    Run(RunArgs),

    /// Ping every configured server and exit
    Ping(PingArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Do not read commands from the terminal
    #[arg(long)]
    pub no_keyboard: bool,

    /// Do not start the HTTP API even if enabled in the config
    #[arg(long)]
    pub no_http: bool,

    /// Do not subscribe to MQTT even if enabled in the config
    #[arg(long)]
    pub no_mqtt: bool,

    /// Do not open GPIO lines even if enabled in the config
    #[arg(long)]
    pub no_gpio: bool,
}

#[derive(Debug, Args)]
pub struct PingArgs {
    /// Per-server timeout in milliseconds (defaults to `timers.ping_timeout`)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the config and summarize it
    Check,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
