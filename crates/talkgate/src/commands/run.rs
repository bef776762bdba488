//! `talkgate run`: assemble the gateway and its front-ends.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{info, warn};

use talkgate_config::{GpioPlan, MqttSettings};
use talkgate_core::{Gateway, MumbleTransport};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::frontend::{self, gpio::Button, keyboard::RawMode};
use crate::hardware::{Panel, SystemAudio, gpio};
use crate::logging;

/// Front-ends resolved from config and flags, before anything starts.
struct FrontEnds {
    keyboard: bool,
    http: Option<SocketAddr>,
    mqtt: Option<MqttSettings>,
    gpio: Option<GpioPlan>,
}

fn resolve_front_ends(
    cfg: &talkgate_config::Config,
    args: &RunArgs,
) -> Result<FrontEnds, CliError> {
    let http = if cfg.http.enabled && !args.no_http {
        let address = cfg.http.listen.parse().map_err(|e| {
            CliError::Config(talkgate_config::ConfigError::Validation {
                field: "http.listen".into(),
                reason: format!("'{}': {e}", cfg.http.listen),
            })
        })?;
        Some(address)
    } else {
        None
    };
    let mqtt = (cfg.mqtt.enabled && !args.no_mqtt)
        .then(|| talkgate_config::resolve_mqtt(&cfg.mqtt))
        .transpose()?;
    let gpio = (cfg.gpio.enabled && !args.no_gpio)
        .then(|| talkgate_config::resolve_gpio(&cfg.gpio))
        .transpose()?;

    Ok(FrontEnds {
        keyboard: cfg.keyboard.enabled && !args.no_keyboard,
        http,
        mqtt,
        gpio,
    })
}

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, path) = super::load(global)?;
    let _log_guard = logging::init(
        global.verbose,
        global.quiet,
        global.log_file.as_deref().or(cfg.log.file.as_deref()),
    );
    info!(config = %path.display(), version = env!("CARGO_PKG_VERSION"), "starting talkgate");

    let gateway_config = talkgate_config::to_gateway_config(&cfg, global.account.as_deref())?;
    let front_ends = resolve_front_ends(&cfg, args)?;

    // Devices and sockets are claimed up front; failures here are fatal.
    let lines = front_ends.gpio.as_ref().map(gpio::open).transpose()?;
    let (leds, buttons) = match lines {
        Some(lines) => (lines.leds, lines.buttons),
        None => (BTreeMap::new(), Vec::new()),
    };
    let listener = match front_ends.http {
        Some(address) => Some(TcpListener::bind(address).await.map_err(|source| {
            CliError::HttpBind {
                address: address.to_string(),
                source,
            }
        })?),
        None => None,
    };
    let raw_mode = if front_ends.keyboard && std::io::stdin().is_terminal() {
        Some(RawMode::enable()?)
    } else {
        if front_ends.keyboard {
            warn!("stdin is not a terminal, keyboard disabled");
        }
        None
    };

    let transport = MumbleTransport::new(
        gateway_config.timings.connect_timeout,
        gateway_config.timings.ping_timeout,
    );
    let audio = Arc::new(SystemAudio::new(&cfg.audio));
    let panel = Arc::new(Panel::new(leds, std::io::stdout().is_terminal()));
    let (gateway, controller) = Gateway::new(gateway_config, transport, audio, panel);
    let worker = tokio::spawn(gateway.run());

    let mut tasks = JoinSet::new();
    tasks.spawn(frontend::watch_signals(controller.clone()));
    if let Some(raw_mode) = raw_mode {
        tasks.spawn(frontend::keyboard::run(controller.clone(), raw_mode));
    }
    if let Some(listener) = listener {
        tasks.spawn(frontend::http::serve(listener, controller.clone()));
    }
    if let Some(settings) = front_ends.mqtt {
        tasks.spawn(frontend::mqtt::run(settings, controller.clone()));
    }
    if let Some(plan) = &front_ends.gpio {
        for (binding, pin) in buttons {
            let button = Button::new(pin, binding, plan.active_low);
            tasks.spawn(frontend::gpio::run(button, plan.poll, plan.idle, controller.clone()));
        }
    }

    let result = worker.await;
    controller.shutdown();
    while tasks.join_next().await.is_some() {}

    match result {
        Ok(outcome) => Ok(outcome?),
        Err(e) => Err(CliError::Gateway {
            message: e.to_string(),
        }),
    }
}
