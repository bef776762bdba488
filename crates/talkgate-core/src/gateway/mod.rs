// ── Gateway worker ──
//
// Single owner of `SessionState`. Commands from every front-end, timer
// callbacks and session events are funnelled into one `select!` loop, so
// handlers run one at a time and never race on state.
//
//   Controller ──▶ requests ─┐
//   Timers ──────▶ requests ─┼──▶ Gateway::run ──▶ ports (session, audio, indicators)
//   Session ─────▶ events ───┘

mod connection;
mod navigation;
mod reactor;
mod transmit;


use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use strum::IntoEnumIterator;
use tokio::sync::{Notify, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandEnvelope, CommandReport, MuteMode};
use crate::config::{Account, GatewayConfig, SoundCue};
use crate::controller::Controller;
use crate::error::CoreError;
use crate::ports::{
    AudioPort, DISPLAY_LINES, DisconnectReason, IndicatorPort, Led, SessionEvent, VoiceSession,
    VoiceTransport,
};
use crate::state::{SessionSnapshot, SessionState};
use crate::timers;

const REQUEST_CHANNEL_SIZE: usize = 64;

/// Work items consumed by the worker loop.
#[derive(Debug)]
pub(crate) enum Request {
    Command(CommandEnvelope),
    /// The TX lock timer armed at `generation` fired.
    TxLockExpired { generation: u64 },
    /// Periodic beacon tick.
    Beacon,
}

enum Step {
    Request(Request),
    Event(SessionEvent),
}

/// The gateway worker. Build with [`Gateway::new`], then drive with
/// [`Gateway::run`] while front-ends talk to the returned [`Controller`].
pub struct Gateway<T: VoiceTransport, A: AudioPort, I: IndicatorPort> {
    config: GatewayConfig,
    transport: T,
    audio: Arc<A>,
    indicators: Arc<I>,
    state: SessionState,
    session: Option<T::Session>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    requests: mpsc::Receiver<Request>,
    request_tx: mpsc::Sender<Request>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Cancels the stream currently playing into the channel.
    stream_cancel: Option<CancellationToken>,
    /// Cancels the beacon currently playing into the channel.
    beacon_cancel: Option<CancellationToken>,
    tx_lock_generation: u64,
    /// Poked on every command and event; drives the backlight timer.
    activity: Arc<Notify>,
    display: [String; DISPLAY_LINES],
    started: Instant,
    cancel: CancellationToken,
}

impl<T: VoiceTransport, A: AudioPort, I: IndicatorPort> Gateway<T, A, I> {
    pub fn new(
        config: GatewayConfig,
        transport: T,
        audio: Arc<A>,
        indicators: Arc<I>,
    ) -> (Self, Controller) {
        let (request_tx, requests) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let cancel = CancellationToken::new();

        let controller = Controller::new(
            request_tx.clone(),
            snapshot_rx,
            config.http.clone(),
            config.mqtt.clone(),
            cancel.clone(),
        );

        let state = SessionState::new(config.active_account);
        let gateway = Self {
            config,
            transport,
            audio,
            indicators,
            state,
            session: None,
            events: None,
            requests,
            request_tx,
            snapshot_tx,
            stream_cancel: None,
            beacon_cancel: None,
            tx_lock_generation: 0,
            activity: Arc::new(Notify::new()),
            display: Default::default(),
            started: Instant::now(),
            cancel,
        };
        (gateway, controller)
    }

    /// Connect, then serve requests and session events until shutdown.
    ///
    /// Returns `Err` only for fatal conditions (reconnect attempts
    /// exhausted, bad account index); the caller is expected to exit.
    pub async fn run(mut self) -> Result<(), CoreError> {
        let timers = timers::spawn(
            &self.config.timings,
            Arc::clone(&self.indicators),
            self.snapshot_tx.subscribe(),
            Arc::clone(&self.activity),
            self.request_tx.clone(),
            self.cancel.child_token(),
        );

        let result = self.serve().await;

        self.cancel.cancel();
        self.state.server_hop = true;
        self.drop_session();
        self.led(Led::Online, false);
        self.publish();
        for handle in timers {
            let _ = handle.await;
        }
        info!(uptime = %self.process_uptime(), "gateway stopped");
        result
    }

    async fn serve(&mut self) -> Result<(), CoreError> {
        self.connect().await?;
        self.publish();

        let cancel = self.cancel.clone();
        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                request = self.requests.recv() => {
                    let Some(request) = request else { break };
                    Step::Request(request)
                }
                event = next_event(&mut self.events) => Step::Event(event),
            };
            // Queued work is dropped once shutdown starts; callers see the
            // gateway as stopped.
            if cancel.is_cancelled() {
                break;
            }

            self.activity.notify_one();
            match step {
                Step::Request(Request::Command(envelope)) => {
                    let CommandEnvelope {
                        command,
                        payload,
                        response_tx,
                    } = envelope;
                    match self.execute(command, payload.as_deref()).await {
                        Ok(report) => {
                            // Callers may read the snapshot as soon as they get the report.
                            self.publish();
                            let _ = response_tx.send(report);
                        }
                        Err(e) => {
                            let _ = response_tx.send(CommandReport::Rejected(e.to_string()));
                            return Err(e);
                        }
                    }
                }
                Step::Request(Request::TxLockExpired { generation }) => {
                    self.tx_lock_expired(generation);
                }
                Step::Request(Request::Beacon) => self.beacon(),
                Step::Event(event) => self.react(event).await?,
            }
            self.publish();
        }
        Ok(())
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Run one command. `Err` is reserved for fatal conditions.
    pub(crate) async fn execute(
        &mut self,
        command: Command,
        payload: Option<&str>,
    ) -> Result<CommandReport, CoreError> {
        self.led(Led::Attention, false);

        if command.requires_connection() && !self.state.connected {
            debug!(%command, "not connected, skipping");
            return Ok(CommandReport::NotConnected);
        }
        debug!(%command, ?payload, "executing command");

        let report = match command {
            Command::DisplayMenu => {
                self.display_menu();
                CommandReport::Completed
            }
            Command::ChannelUp => self.channel_up().await,
            Command::ChannelDown => self.channel_down().await,
            Command::ListChannels => {
                self.list_channels(true);
                CommandReport::Completed
            }
            Command::StartTransmitting => self.transmit_start().await,
            Command::StopTransmitting => self.transmit_stop(),
            Command::ListOnlineUsers => self.list_online_users(),
            Command::StreamToggle => self.playback_toggle().await,
            Command::ClearScreen => {
                if let Err(e) = self.indicators.clear() {
                    warn!(error = %e, "failed to clear screen");
                }
                CommandReport::Completed
            }
            Command::PingServers => self.ping_servers().await,
            Command::ScanChannels => self.scan().await,
            Command::ShowUptime => {
                self.show_uptime();
                CommandReport::Completed
            }
            Command::Mute => self.mute(MuteMode::Mute),
            Command::Unmute => self.mute(MuteMode::Unmute),
            Command::MuteToggle => match payload.map(str::trim).filter(|p| !p.is_empty()) {
                None => self.mute(MuteMode::Toggle),
                Some(raw) => match raw.parse::<MuteMode>() {
                    Ok(mode) => self.mute(mode),
                    Err(_) => CommandReport::Rejected(format!("unknown mute mode '{raw}'")),
                },
            },
            Command::TxLock => self.tx_lock().await,
            Command::NextServer => self.hop(1).await?,
            Command::PreviousServer => self.hop(-1).await?,
            Command::CommentOn => self.set_comment(true),
            Command::CommentOff => self.set_comment(false),
            Command::Quit => {
                self.quit();
                CommandReport::Completed
            }
        };
        Ok(report)
    }

    // ── Small commands ───────────────────────────────────────────────

    fn display_menu(&self) {
        info!("available commands:");
        for command in Command::iter() {
            let name: &'static str = command.into();
            info!("  {name:<18} {}", command.description());
        }
    }

    fn list_online_users(&self) -> CommandReport {
        let Some(session) = self.session.as_ref() else {
            return CommandReport::NotConnected;
        };
        for channel in session.channels() {
            let users = session.users_in(channel.id);
            if users.is_empty() {
                continue;
            }
            info!(
                channel_id = channel.id,
                "{}: {}",
                channel.name,
                users.join(", ")
            );
        }
        CommandReport::Completed
    }

    async fn ping_servers(&self) -> CommandReport {
        for (index, account) in self.config.accounts.iter().enumerate() {
            let marker = if self.state.connected && index == self.state.account_index {
                " (connected)"
            } else {
                ""
            };
            match self.transport.ping(&account.address).await {
                Ok(reply) => info!(
                    "server #{} {} [{}] v{} users {}/{} rtt {}ms{marker}",
                    index + 1,
                    account.name,
                    account.address,
                    reply.version_string(),
                    reply.users,
                    reply.max_users,
                    reply.round_trip.as_millis(),
                ),
                Err(e) => warn!(
                    "server #{} {} [{}] unreachable: {e}{marker}",
                    index + 1,
                    account.name,
                    account.address,
                ),
            }
        }
        CommandReport::Completed
    }

    fn show_uptime(&self) {
        let session = self
            .state
            .session_uptime(Utc::now())
            .map_or_else(|| "offline".to_owned(), |d| format_duration(d).to_string());
        info!(
            process = %self.process_uptime(),
            session = %session,
            "uptime"
        );
    }

    fn mute(&mut self, mode: MuteMode) -> CommandReport {
        match self.audio.set_mute(mode) {
            Ok(muted) => {
                self.state.muted = muted;
                info!(%mode, muted, "speaker mute updated");
            }
            Err(e) => warn!(%mode, error = %e, "failed to change mute state"),
        }
        CommandReport::Completed
    }

    fn set_comment(&self, on: bool) -> CommandReport {
        let Some(session) = self.session.as_ref() else {
            return CommandReport::NotConnected;
        };
        let comment = if on {
            &self.config.comments.on
        } else {
            &self.config.comments.off
        };
        match session.set_comment(comment) {
            Ok(()) => {
                info!(comment = %comment, "comment set");
                CommandReport::Completed
            }
            Err(e) => {
                warn!(error = %e, "failed to set comment");
                CommandReport::Rejected(e.to_string())
            }
        }
    }

    fn quit(&mut self) {
        info!(uptime = %self.process_uptime(), "quit requested");
        self.state.server_hop = true;
        self.drop_session();
        self.cancel.cancel();
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Sleep for `duration`. Returns `false` if shutdown began first.
    pub(crate) async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    pub(crate) fn account(&self) -> Result<&Account, CoreError> {
        self.config
            .accounts
            .get(self.state.account_index)
            .ok_or_else(|| CoreError::Config {
                message: format!(
                    "account index {} out of range ({} configured)",
                    self.state.account_index,
                    self.config.accounts.len()
                ),
            })
    }

    pub(crate) fn led(&self, led: Led, on: bool) {
        if let Err(e) = self.indicators.set_led(led, on) {
            debug!(%led, on, error = %e, "indicator update failed");
        }
    }

    pub(crate) fn play_cue(&self, cue: Option<&SoundCue>) {
        let Some(cue) = cue else { return };
        if let Err(e) = self.audio.play_local(cue) {
            warn!(path = %cue.path.display(), error = %e, "failed to play sound");
        }
    }

    pub(crate) fn refresh_display(&mut self) {
        let (account_line, channel_line, users_line) = if self.state.connected {
            (
                self.account().map(|a| a.name.clone()).unwrap_or_default(),
                self.current_channel_name().unwrap_or_default(),
                format!("{} users", self.state.participant_count),
            )
        } else {
            ("offline".to_owned(), String::new(), String::new())
        };
        let [first, second, third, _] = &mut self.display;
        *first = account_line;
        *second = channel_line;
        *third = users_line;
        if let Err(e) = self.indicators.render(&self.display) {
            debug!(error = %e, "display update failed");
        }
    }

    pub(crate) fn show_message(&mut self, line: String) {
        let [.., last] = &mut self.display;
        *last = line;
        if let Err(e) = self.indicators.render(&self.display) {
            debug!(error = %e, "display update failed");
        }
    }

    fn current_channel_name(&self) -> Option<String> {
        self.session.as_ref().and_then(|s| {
            s.channels()
                .into_iter()
                .find(|c| c.id == self.state.current_channel_id)
                .map(|c| c.name)
        })
    }

    fn process_uptime(&self) -> humantime::FormattedDuration {
        format_duration(self.started.elapsed())
    }

    pub(crate) fn publish(&self) {
        let account = self.account().ok();
        let channel_name = self.current_channel_name();
        let snapshot = SessionSnapshot {
            connected: self.state.connected,
            account: account.map(|a| a.name.clone()).unwrap_or_default(),
            address: account.map(|a| a.address.clone()).unwrap_or_default(),
            username: self.session.as_ref().map(VoiceSession::username),
            channel_id: self.state.current_channel_id,
            channel_name,
            max_channel_id: self.state.max_channel_id,
            participants: self.state.participant_count,
            transmitting: self.state.transmitting,
            streaming: self.state.streaming,
            muted: self.state.muted,
            last_button_press: self.state.last_button_press,
            connect_attempts: self.state.connect_attempts,
            connected_since: self.state.connected_since,
            process_uptime_secs: self.started.elapsed().as_secs(),
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

/// Whole-second humantime rendering.
fn format_duration(d: Duration) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_secs(d.as_secs()))
}

/// Next event from the live session; pending forever when there is none.
/// A closed stream is reported as an error disconnect.
async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<SessionEvent>>) -> SessionEvent {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };
    if let Some(event) = rx.recv().await {
        return event;
    }
    *events = None;
    SessionEvent::Disconnected {
        reason: DisconnectReason::Error,
    }
}
