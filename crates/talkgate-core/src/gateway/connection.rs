// ── Connection manager ──
//
// At most one live session. Failures are retried a bounded number of
// times with no backoff beyond the dial timeout; after that the error is
// fatal and the process is expected to be restarted by its supervisor.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::command::CommandReport;
use crate::error::CoreError;
use crate::ports::{AudioPort, IndicatorPort, Led, VoiceSession, VoiceTransport};

use super::Gateway;

/// Dials attempted by one `reconnect` before giving up.
pub(crate) const MAX_CONNECT_ATTEMPTS: u32 = 3;

impl<T: VoiceTransport, A: AudioPort, I: IndicatorPort> Gateway<T, A, I> {
    /// Dial the active account unless already connected. A failed dial
    /// falls through to [`reconnect`](Self::reconnect) unless a server hop
    /// is in progress.
    pub(crate) async fn connect(&mut self) -> Result<(), CoreError> {
        if self.state.connected {
            debug!("already connected");
            return Ok(());
        }
        match self.dial_once().await {
            Ok(()) => Ok(()),
            Err(e @ CoreError::Config { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, "connect failed");
                if self.state.server_hop {
                    Ok(())
                } else {
                    self.reconnect().await
                }
            }
        }
    }

    /// Tear down any session and dial again, at most
    /// [`MAX_CONNECT_ATTEMPTS`] times in total across calls until a dial
    /// succeeds.
    pub(crate) async fn reconnect(&mut self) -> Result<(), CoreError> {
        self.drop_session();
        self.indicate_offline();

        while self.state.connect_attempts < MAX_CONNECT_ATTEMPTS {
            if self.cancel.is_cancelled() {
                debug!("shutdown requested, reconnect abandoned");
                return Ok(());
            }
            self.state.connect_attempts += 1;
            info!(
                attempt = self.state.connect_attempts,
                max = MAX_CONNECT_ATTEMPTS,
                "reconnecting"
            );
            match self.dial_once().await {
                Ok(()) => return Ok(()),
                Err(e @ CoreError::Config { .. }) => return Err(e),
                Err(e) => warn!(attempt = self.state.connect_attempts, error = %e, "reconnect failed"),
            }
        }

        error!(
            attempts = self.state.connect_attempts,
            "unable to reach the server, giving up"
        );
        Err(CoreError::ReconnectExhausted {
            attempts: self.state.connect_attempts,
        })
    }

    /// One dial of the active account. Returns `Ok` without a session if
    /// shutdown begins mid-dial.
    async fn dial_once(&mut self) -> Result<(), CoreError> {
        let account = self.account()?.clone();
        info!(account = %account.name, address = %account.address, "connecting");

        let cancel = self.cancel.clone();
        let (session, events) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(account = %account.name, "dial abandoned");
                return Ok(());
            }
            dialed = self.transport.dial(&account) => dialed?,
        };
        self.session = Some(session);
        self.events = Some(events);
        self.on_connected();
        Ok(())
    }

    /// Post-connect bookkeeping: reset counters and flags, join the
    /// configured channel, seed navigation.
    fn on_connected(&mut self) {
        self.state.connected = true;
        self.state.connect_attempts = 0;
        self.state.transmitting = false;
        self.state.streaming = false;
        self.state.connected_since = Some(Utc::now());
        if let Some(token) = self.stream_cancel.take() {
            token.cancel();
        }

        self.led(Led::Online, true);
        self.led(Led::Transmit, false);

        let snapshot = self.list_channels(false);
        self.state.current_channel_id = self
            .session
            .as_ref()
            .and_then(VoiceSession::self_channel)
            .unwrap_or(0);

        let configured = self.account().ok().and_then(|a| a.channel.clone());
        if let Some(name) = configured {
            match snapshot.find_by_name(&name).map(|c| c.id) {
                Some(id) if id == self.state.current_channel_id => {}
                Some(id) => {
                    if let Some(session) = self.session.as_ref() {
                        match session.move_to(id) {
                            Ok(()) => {
                                info!(channel = %name, channel_id = id, "joining configured channel");
                                self.state.current_channel_id = id;
                            }
                            Err(e) => warn!(channel = %name, error = %e, "failed to join channel"),
                        }
                    }
                }
                None => warn!(channel = %name, "configured channel does not exist"),
            }
        }

        self.state.previous_channel_id = self.state.current_channel_id;
        info!(
            channel_id = self.state.current_channel_id,
            max_channel_id = self.state.max_channel_id,
            "connected"
        );
        self.recount_participants();
    }

    /// Disconnect and forget the current session, stopping any audio
    /// tied to it.
    pub(crate) fn drop_session(&mut self) {
        if self.state.transmitting {
            if let Err(e) = self.audio.stop_capture() {
                warn!(error = %e, "failed to stop capture");
            }
        }
        if let Some(token) = self.stream_cancel.take() {
            token.cancel();
        }
        self.stop_beacon();
        if let Some(session) = self.session.take() {
            session.disconnect();
        }
        self.events = None;
        self.state.mark_disconnected();
    }

    pub(crate) fn indicate_offline(&mut self) {
        for led in [Led::Online, Led::Participants, Led::Transmit] {
            self.led(led, false);
        }
        self.state.participant_count = 0;
        self.refresh_display();
    }

    /// Switch to the next (`step > 0`) or previous account.
    pub(crate) async fn hop(&mut self, step: isize) -> Result<CommandReport, CoreError> {
        let count = self.config.accounts.len();
        if count < 2 {
            info!("only one server configured");
            return Ok(CommandReport::Unchanged);
        }

        self.state.server_hop = true;
        self.drop_session();
        self.indicate_offline();

        let next = self
            .state
            .account_index
            .checked_add_signed(step)
            .unwrap_or(count - 1)
            % count;
        self.state.account_index = next;
        self.state.server_hop = false;
        self.state.connect_attempts = 0;
        info!(
            account = %self.account()?.name,
            index = next + 1,
            of = count,
            "switching server"
        );

        self.connect().await?;
        Ok(CommandReport::Completed)
    }
}
