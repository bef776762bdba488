//! `talkgate config ...`

use talkgate_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", super::config_path(global).display());
            Ok(())
        }
        ConfigCommand::Init { force } => init(global, force),
        ConfigCommand::Check => check(global),
    }
}

fn init(global: &GlobalOpts, force: bool) -> Result<(), CliError> {
    let path = super::config_path(global);
    if path.exists() && !force {
        return Err(CliError::ConfigExists {
            path: path.display().to_string(),
        });
    }
    talkgate_config::save_config(&Config::example(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

fn check(global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, path) = super::load(global)?;
    let gateway = talkgate_config::validate(&cfg)?;
    let active = talkgate_config::to_gateway_config(&cfg, global.account.as_deref())?.active_account;

    println!("Config OK: {}", path.display());
    println!("accounts:");
    for (i, account) in gateway.accounts.iter().enumerate() {
        let marker = if i == active { " [default]" } else { "" };
        let channel = account.channel.as_deref().unwrap_or("-");
        println!(
            "  {} {} as {} (channel {channel}){marker}",
            account.name, account.address, account.username
        );
    }

    let commands = |policy: &talkgate_core::CommandPolicy| {
        policy
            .enabled()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("keyboard: {}", on_off(cfg.keyboard.enabled));
    println!("http: {} on {}", on_off(cfg.http.enabled), cfg.http.listen);
    if cfg.http.enabled {
        println!("  commands: {}", commands(&gateway.http));
    }
    println!("mqtt: {} ({} / {})", on_off(cfg.mqtt.enabled), cfg.mqtt.broker, cfg.mqtt.topic);
    if cfg.mqtt.enabled {
        println!("  commands: {}", commands(&gateway.mqtt));
    }
    println!(
        "gpio: {} ({} buttons, {} LEDs)",
        on_off(cfg.gpio.enabled),
        cfg.gpio.buttons.len(),
        cfg.gpio.leds.len()
    );
    Ok(())
}
