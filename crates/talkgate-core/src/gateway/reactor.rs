// ── Event reactor ──

use talkgate_api::DenyType;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::ports::{AudioPort, IndicatorPort, Led, SessionEvent, VoiceSession, VoiceTransport};
use crate::state::ButtonPress;

use super::Gateway;

/// Text messages are cut to this many characters in the log.
const MESSAGE_LOG_LIMIT: usize = 105;

impl<T: VoiceTransport, A: AudioPort, I: IndicatorPort> Gateway<T, A, I> {
    /// Apply one session event. `Err` only when reconnecting is exhausted.
    pub(crate) async fn react(&mut self, event: SessionEvent) -> Result<(), CoreError> {
        match event {
            SessionEvent::Connected { welcome_text } => {
                if let Some(text) = welcome_text {
                    for line in welcome_lines(&text) {
                        info!("welcome: {line}");
                    }
                }
            }
            SessionEvent::Disconnected { reason } => {
                warn!(%reason, "disconnected from server");
                self.drop_session();
                self.indicate_offline();
                if self.state.server_hop {
                    debug!("server hop in progress, not reconnecting");
                } else {
                    self.reconnect().await?;
                }
            }
            SessionEvent::ChannelsChanged => {
                self.list_channels(false);
                self.recount_participants();
            }
            SessionEvent::UsersChanged => self.recount_participants(),
            SessionEvent::TextMessage { sender, message } => self.on_text_message(sender, &message),
            SessionEvent::PermissionDenied { kind, reason } => {
                self.on_permission_denied(kind, reason).await;
            }
        }
        Ok(())
    }

    /// Recount users in our channel and fire join/leave cues when the
    /// count crosses the "alone" threshold.
    pub(crate) fn recount_participants(&mut self) {
        self.sync_current();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let count = session.users_in(self.state.current_channel_id).len();
        let previous = self.state.participant_count;
        self.state.previous_participant_count = previous;
        self.state.participant_count = count;

        if previous <= 1 && count > 1 {
            debug!(count, "someone joined");
            self.play_cue(self.config.sounds.joined.as_ref());
        } else if previous > 1 && count <= 1 {
            debug!(count, "channel is empty");
            self.play_cue(self.config.sounds.left.as_ref());
        }
        self.led(Led::Participants, count > 1);
        self.refresh_display();
    }

    fn on_text_message(&mut self, sender: Option<String>, message: &str) {
        let sender = sender.unwrap_or_else(|| "server".to_owned());
        let text: String = message.chars().take(MESSAGE_LOG_LIMIT).collect();
        info!(from = %sender, "message: {text}");

        self.play_cue(self.config.sounds.message.as_ref());
        self.led(Led::Attention, true);
        self.show_message(format!("{sender}: {text}"));
    }

    /// A refused move during navigation keeps going in the same
    /// direction, skipping the locked or full channel.
    async fn on_permission_denied(&mut self, kind: DenyType, reason: Option<String>) {
        warn!(%kind, reason = reason.as_deref().unwrap_or(""), "permission denied");
        if !matches!(kind, DenyType::Permission | DenyType::ChannelFull) {
            return;
        }

        let anchor = self.state.previous_channel_id;
        let retry = match self.state.last_button_press {
            ButtonPress::Up => anchor < self.state.max_channel_id,
            ButtonPress::Down => anchor > 0,
            ButtonPress::None => false,
        };
        if retry {
            let direction = self.state.last_button_press;
            info!(%direction, skipped = anchor, "channel refused, trying the next one");
            let report = self.navigate(direction, false).await;
            debug!(?report, "retry finished");
        }
    }
}

/// Split an HTML welcome text into plain lines.
fn welcome_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r'])
        .flat_map(|l| l.split("<br />"))
        .flat_map(|l| l.split("<br/>"))
        .flat_map(|l| l.split("<br>"))
        .map(str::trim)
        .filter(|l| !l.is_empty())
}
