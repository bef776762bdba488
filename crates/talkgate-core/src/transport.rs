// ── Mumble transport adapter ──
//
// Implements the voice ports on top of `talkgate_api::Client`. A small
// forwarding task translates client events into session events so the
// gateway never depends on the wire-level event type.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use talkgate_api::{Client, ClientEvent, ConnectOptions, DisconnectCause, PingReply, TlsOptions};

use crate::config::Account;
use crate::error::CoreError;
use crate::navigator::ChannelInfo;
use crate::ports::{Dialed, DisconnectReason, SessionEvent, VoiceSession, VoiceTransport};

/// Production transport: TLS control channel plus UDP ping.
#[derive(Debug, Clone)]
pub struct MumbleTransport {
    connect_timeout: Duration,
    ping_timeout: Duration,
}

impl MumbleTransport {
    pub fn new(connect_timeout: Duration, ping_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ping_timeout,
        }
    }
}

impl VoiceTransport for MumbleTransport {
    type Session = MumbleSession;

    async fn dial(&self, account: &Account) -> Result<Dialed<MumbleSession>, CoreError> {
        let options = ConnectOptions {
            address: account.address.clone(),
            username: account.username.clone(),
            password: account.password.clone(),
            tokens: account.tokens.clone(),
            tls: TlsOptions {
                insecure: account.insecure,
                certificate: account.certificate.clone(),
            },
            timeout: self.connect_timeout,
        };

        let (client, mut client_events) = Client::connect(options).await.map_err(|e| {
            match CoreError::from(e) {
                CoreError::ConnectionFailed { reason, .. } => CoreError::ConnectionFailed {
                    address: account.address.clone(),
                    reason,
                },
                other => other,
            }
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(event) = client_events.recv().await {
                if tx.send(translate(event)).is_err() {
                    break;
                }
            }
            debug!("client event stream ended");
        });

        Ok((MumbleSession { client }, rx))
    }

    async fn ping(&self, address: &str) -> Result<PingReply, CoreError> {
        Ok(talkgate_api::ping(address, self.ping_timeout).await?)
    }
}

fn translate(event: ClientEvent) -> SessionEvent {
    match event {
        ClientEvent::Connected { welcome_text } => SessionEvent::Connected { welcome_text },
        ClientEvent::Disconnected { cause } => SessionEvent::Disconnected {
            reason: match cause {
                DisconnectCause::Error => DisconnectReason::Error,
                DisconnectCause::Closed | DisconnectCause::Requested => DisconnectReason::Other,
            },
        },
        ClientEvent::ChannelsChanged => SessionEvent::ChannelsChanged,
        ClientEvent::UsersChanged => SessionEvent::UsersChanged,
        ClientEvent::TextMessage { sender, message } => {
            SessionEvent::TextMessage { sender, message }
        }
        ClientEvent::PermissionDenied { kind, reason, .. } => {
            SessionEvent::PermissionDenied { kind, reason }
        }
    }
}

/// Live session backed by a connected [`Client`].
#[derive(Debug)]
pub struct MumbleSession {
    client: Client,
}

impl VoiceSession for MumbleSession {
    fn username(&self) -> String {
        self.client
            .self_user()
            .map(|u| u.name)
            .unwrap_or_default()
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        self.client.with_state(|state| {
            state
                .channels
                .values()
                .map(|c| ChannelInfo {
                    id: c.id,
                    name: c.name.clone(),
                    parent_id: c.parent.unwrap_or(0),
                    user_count: state.users_in(c.id).count(),
                })
                .collect()
        })
    }

    fn self_channel(&self) -> Option<u32> {
        self.client.self_user().map(|u| u.channel_id)
    }

    fn users_in(&self, channel_id: u32) -> Vec<String> {
        self.client.with_state(|state| {
            state
                .users_in(channel_id)
                .map(|u| u.name.clone())
                .collect()
        })
    }

    fn move_to(&self, channel_id: u32) -> Result<(), CoreError> {
        let exists = self
            .client
            .with_state(|state| state.channels.contains_key(&channel_id));
        if !exists {
            return Err(CoreError::ChannelNotFound { channel_id });
        }
        Ok(self.client.move_to(channel_id)?)
    }

    fn send_text(&self, channel_id: u32, message: &str) -> Result<(), CoreError> {
        Ok(self.client.send_text(channel_id, message)?)
    }

    fn set_comment(&self, comment: &str) -> Result<(), CoreError> {
        Ok(self.client.set_comment(comment)?)
    }

    fn disconnect(&self) {
        self.client.disconnect();
    }
}
