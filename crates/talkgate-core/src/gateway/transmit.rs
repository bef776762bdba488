// ── Transmit / stream controller ──
//
// `transmitting` and `streaming` are mutually exclusive: starting either
// stops the other first. The beacon yields to both.

use tracing::{debug, info, warn};

use crate::command::CommandReport;
use crate::ports::{AudioPort, IndicatorPort, Led, VoiceSession, VoiceTransport};

use super::{Gateway, Request};

impl<T: VoiceTransport, A: AudioPort, I: IndicatorPort> Gateway<T, A, I> {
    pub(crate) async fn transmit_start(&mut self) -> CommandReport {
        self.stop_beacon();
        if self.state.streaming {
            self.stop_stream();
            if !self.pause(self.config.timings.transmit_settle).await {
                return CommandReport::Interrupted;
            }
        }
        if self.state.transmitting {
            debug!("already transmitting");
            return CommandReport::Unchanged;
        }

        self.state.transmitting = true;
        if let Err(e) = self.audio.start_capture() {
            warn!(error = %e, "failed to start capture");
        }
        self.led(Led::Transmit, true);
        info!("transmitting");
        CommandReport::Completed
    }

    pub(crate) fn transmit_stop(&mut self) -> CommandReport {
        if self.state.streaming {
            self.stop_stream();
        }
        if !self.state.transmitting {
            debug!("not transmitting");
            return CommandReport::Unchanged;
        }

        self.state.transmitting = false;
        if let Err(e) = self.audio.stop_capture() {
            warn!(error = %e, "failed to stop capture");
        }
        self.led(Led::Transmit, false);
        info!("stopped transmitting");
        CommandReport::Completed
    }

    /// Start or stop the configured stream into the current channel.
    pub(crate) async fn playback_toggle(&mut self) -> CommandReport {
        let Some(cue) = self.config.sounds.stream.clone() else {
            return CommandReport::Rejected("no stream file configured".into());
        };
        if self.state.transmitting {
            self.transmit_stop();
        }

        if self.state.streaming {
            self.stop_stream();
            return CommandReport::Completed;
        }
        self.stop_beacon();

        if let Some(session) = self.session.as_ref() {
            let announcement = format!("{} Streaming", session.username());
            if let Err(e) = session.send_text(self.state.current_channel_id, &announcement) {
                debug!(error = %e, "stream announcement failed");
            }
        }

        let token = self.cancel.child_token();
        match self.audio.stream_into_channel(&cue, token.clone()) {
            Ok(()) => {
                self.state.streaming = true;
                self.stream_cancel = Some(token);
                self.led(Led::Transmit, true);
                info!(path = %cue.path.display(), "streaming");
                CommandReport::Completed
            }
            Err(e) => {
                warn!(path = %cue.path.display(), error = %e, "failed to start stream");
                CommandReport::Completed
            }
        }
    }

    pub(crate) fn stop_stream(&mut self) {
        if let Some(token) = self.stream_cancel.take() {
            token.cancel();
        }
        if self.state.streaming {
            self.state.streaming = false;
            self.led(Led::Transmit, false);
            info!("stream stopped");
        }
    }

    /// Key up now and force a stop after the configured lock period.
    pub(crate) async fn tx_lock(&mut self) -> CommandReport {
        let report = self.transmit_start().await;
        self.tx_lock_generation += 1;
        let generation = self.tx_lock_generation;
        let period = self.config.timings.tx_lock;
        let requests = self.request_tx.clone();
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(period) => {
                    let _ = requests.send(Request::TxLockExpired { generation }).await;
                }
            }
        });
        info!(period = %humantime::format_duration(period), "tx lock armed");
        report
    }

    pub(crate) fn tx_lock_expired(&mut self, generation: u64) {
        if generation != self.tx_lock_generation {
            debug!(generation, "stale tx lock timer");
            return;
        }
        if self.state.transmitting {
            info!("tx lock expired");
            self.transmit_stop();
        }
    }

    /// Play the beacon into the channel when idle.
    pub(crate) fn beacon(&mut self) {
        let Some(cue) = self.config.sounds.beacon.clone() else {
            return;
        };
        if !self.state.connected || self.state.transmitting || self.state.streaming {
            debug!("beacon skipped");
            return;
        }
        self.stop_beacon();
        let token = self.cancel.child_token();
        match self.audio.stream_into_channel(&cue, token.clone()) {
            Ok(()) => {
                debug!(path = %cue.path.display(), "beacon started");
                self.beacon_cancel = Some(token);
            }
            Err(e) => warn!(error = %e, "beacon failed"),
        }
    }

    pub(crate) fn stop_beacon(&mut self) {
        if let Some(token) = self.beacon_cancel.take() {
            if !token.is_cancelled() {
                debug!("beacon stopped");
            }
            token.cancel();
        }
    }
}
