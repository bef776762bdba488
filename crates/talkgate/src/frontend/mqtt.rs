//! MQTT front-end: every message on the command topic is a command name.
//! Nothing is published back.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use talkgate_config::MqttSettings;
use talkgate_core::{Controller, FrontEnd};

const RETRY_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 10;

fn qos(level: u8) -> QoS {
    match level {
        2 => QoS::ExactlyOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::AtMostOnce,
    }
}

/// Command name carried by a payload, if it is text.
fn command_name(payload: &[u8]) -> Option<&str> {
    std::str::from_utf8(payload)
        .ok()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn options(settings: &MqttSettings) -> MqttOptions {
    let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    options.set_keep_alive(settings.keep_alive);
    if let Some((username, password)) = &settings.credentials {
        options.set_credentials(username, password.expose_secret());
    }
    options
}

/// Subscribe (again after every reconnect) and dispatch until the gateway stops.
pub async fn run(settings: MqttSettings, controller: Controller) {
    let cancel = controller.cancel_token();
    let (client, mut eventloop) = AsyncClient::new(options(&settings), REQUEST_CAPACITY);
    let qos = qos(settings.qos);
    let dispatcher = super::Dispatcher::spawn(FrontEnd::Mqtt, controller);

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(broker = %settings.host, topic = %settings.topic, "MQTT connected");
                if let Err(e) = client.try_subscribe(&settings.topic, qos) {
                    warn!(error = %e, "MQTT subscribe failed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some(name) = command_name(&publish.payload) else {
                    debug!(topic = %publish.topic, "ignoring non-text MQTT payload");
                    continue;
                };
                dispatcher.submit(name);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection error, retrying");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "MQTT disconnect not sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_trimmed_text() {
        assert_eq!(command_name(b"ChannelUp\n"), Some("ChannelUp"));
        assert_eq!(command_name(b"  Stream-Toggle "), Some("Stream-Toggle"));
        assert_eq!(command_name(b"   "), None);
        assert_eq!(command_name(&[0xff, 0xfe]), None);
    }

    #[test]
    fn qos_levels() {
        assert_eq!(qos(0), QoS::AtMostOnce);
        assert_eq!(qos(1), QoS::AtLeastOnce);
        assert_eq!(qos(2), QoS::ExactlyOnce);
    }
}
