// ── Channel navigation (worker side) ──
//
// Fetches a fresh snapshot for every operation and applies the steps
// computed by `ChannelSnapshot`. `previous_channel_id` is the anchor:
// the last channel we tried to enter.

use tracing::{debug, info, warn};

use crate::command::CommandReport;
use crate::navigator::{ChannelSnapshot, Step};
use crate::ports::{AudioPort, IndicatorPort, VoiceSession, VoiceTransport};
use crate::state::ButtonPress;

use super::Gateway;

impl<T: VoiceTransport, A: AudioPort, I: IndicatorPort> Gateway<T, A, I> {
    /// Fetch the channel list and recompute `max_channel_id`. With
    /// `verbose`, log the parent/child listing.
    pub(crate) fn list_channels(&mut self, verbose: bool) -> ChannelSnapshot {
        let snapshot: ChannelSnapshot = self
            .session
            .as_ref()
            .map(VoiceSession::channels)
            .unwrap_or_default()
            .into_iter()
            .collect();
        self.state.max_channel_id = snapshot.max_id();

        if verbose {
            for line in snapshot.listing() {
                info!("{line}");
            }
        }
        snapshot
    }

    /// Pick up a server-confirmed channel change. Landing somewhere new
    /// also re-seeds the anchor and ends any pending retry.
    pub(crate) fn sync_current(&mut self) {
        let Some(id) = self.session.as_ref().and_then(VoiceSession::self_channel) else {
            return;
        };
        if id != self.state.current_channel_id {
            debug!(from = self.state.current_channel_id, to = id, "channel changed");
            self.state.current_channel_id = id;
            self.state.previous_channel_id = id;
            self.state.last_button_press = ButtonPress::None;
        }
    }

    pub(crate) async fn channel_up(&mut self) -> CommandReport {
        self.play_cue(self.config.sounds.channel_up.as_ref());
        self.navigate(ButtonPress::Up, true).await
    }

    pub(crate) async fn channel_down(&mut self) -> CommandReport {
        self.play_cue(self.config.sounds.channel_down.as_ref());
        self.navigate(ButtonPress::Down, true).await
    }

    /// One step in `direction`. A fresh button press starts from the
    /// current channel; a retry after a denial continues past the anchor.
    pub(crate) async fn navigate(&mut self, direction: ButtonPress, fresh: bool) -> CommandReport {
        if self.session.is_none() {
            return CommandReport::NotConnected;
        }
        self.sync_current();
        let snapshot = self.list_channels(false);
        let current = self.state.current_channel_id;

        match direction {
            ButtonPress::Up => {
                if current >= self.state.max_channel_id {
                    warn!(channel_id = current, "already at the highest channel");
                    return CommandReport::Boundary;
                }
                self.state.last_button_press = ButtonPress::Up;
                if fresh || self.state.previous_channel_id == 0 {
                    self.state.previous_channel_id = current;
                }
                match snapshot.step_up(current, self.state.previous_channel_id) {
                    Step::Move(id) => self.move_and_settle(id).await,
                    Step::Boundary => {
                        warn!(channel_id = current, "no channel above");
                        self.state.previous_channel_id = current;
                        CommandReport::Boundary
                    }
                }
            }
            ButtonPress::Down => {
                self.state.last_button_press = ButtonPress::Down;
                if current == 0 {
                    return self.down_from_root(&snapshot).await;
                }
                if fresh {
                    self.state.previous_channel_id = current;
                }
                match snapshot.step_down(current, self.state.previous_channel_id) {
                    Step::Move(id) => self.move_and_settle(id).await,
                    Step::Boundary => {
                        warn!(channel_id = current, "no channel below");
                        self.state.previous_channel_id = current;
                        CommandReport::Boundary
                    }
                }
            }
            ButtonPress::None => CommandReport::Unchanged,
        }
    }

    /// At the root, "down" means back to the account's home channel, or
    /// the lowest non-root channel when none is configured.
    async fn down_from_root(&mut self, snapshot: &ChannelSnapshot) -> CommandReport {
        let configured = self.account().ok().and_then(|a| a.channel.clone());
        let target = configured
            .as_deref()
            .and_then(|name| snapshot.find_by_name(name))
            .or_else(|| snapshot.first_at_or_above(1))
            .map(|c| c.id);

        match target {
            Some(id) => {
                info!(channel_id = id, "at root, returning to default channel");
                self.move_and_settle(id).await
            }
            None => {
                warn!("at root and no other channel exists");
                CommandReport::Boundary
            }
        }
    }

    async fn move_and_settle(&mut self, channel_id: u32) -> CommandReport {
        let Some(session) = self.session.as_ref() else {
            return CommandReport::NotConnected;
        };
        if let Err(e) = session.move_to(channel_id) {
            warn!(channel_id, error = %e, "move failed");
            return CommandReport::Rejected(e.to_string());
        }
        info!(channel_id, "moving to channel");
        self.state.previous_channel_id = channel_id;

        if !self.pause(self.config.timings.channel_settle).await {
            return CommandReport::Interrupted;
        }
        self.sync_current();
        self.recount_participants();
        CommandReport::Completed
    }

    /// Squelch scan: walk upward, dwelling in each channel, until one has
    /// company. Past the top, return to the root and stop.
    pub(crate) async fn scan(&mut self) -> CommandReport {
        if self.session.is_none() {
            return CommandReport::NotConnected;
        }
        self.sync_current();
        let snapshot = self.list_channels(false);
        let max = self.state.max_channel_id;
        self.state.previous_channel_id = self.state.current_channel_id;
        info!(max_channel_id = max, "scanning channels");

        for _ in 0..=snapshot.len() {
            let current = self.state.current_channel_id;
            let from = self.state.previous_channel_id.max(current).saturating_add(1);
            let target = if current >= max {
                None
            } else {
                snapshot.first_at_or_above(from).map(|c| c.id)
            };

            let Some(target) = target else {
                info!("scan wrapped to root");
                let report = self.move_and_settle(0).await;
                self.state.previous_channel_id = 0;
                return report;
            };

            let Some(session) = self.session.as_ref() else {
                return CommandReport::NotConnected;
            };
            if let Err(e) = session.move_to(target) {
                warn!(channel_id = target, error = %e, "scan move failed");
            }
            self.state.previous_channel_id = target;
            if !self.pause(self.config.timings.scan_dwell).await {
                info!(channel_id = target, "scan interrupted");
                return CommandReport::Interrupted;
            }
            self.sync_current();

            // A refused move leaves us where we were; only count the
            // channel we actually landed in.
            if self.state.current_channel_id != target {
                debug!(channel_id = target, "scan move refused, skipping");
                continue;
            }
            let users = self.session.as_ref().map_or(0, |s| s.users_in(target).len());
            debug!(channel_id = target, users, "scan dwell");
            if users > 1 {
                info!(channel_id = target, users, "activity found, scan stopped");
                self.recount_participants();
                return CommandReport::Completed;
            }
        }
        self.recount_participants();
        CommandReport::Completed
    }
}
