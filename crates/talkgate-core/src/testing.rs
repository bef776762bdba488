// Test doubles for the port traits.
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, VecDeque};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use talkgate_api::{DenyType, PingReply};

use crate::command::MuteMode;
use crate::config::{Account, SoundCue};
use crate::error::CoreError;
use crate::navigator::ChannelInfo;
use crate::ports::{
    AudioPort, DISPLAY_LINES, Dialed, IndicatorPort, Led, PortError, SessionEvent, VoiceSession,
    VoiceTransport,
};

pub(crate) const SELF_NAME: &str = "gateway";

// ── World ────────────────────────────────────────────────────────────

/// Server-side view shared by the fake transport and its sessions.
#[derive(Debug, Default)]
pub(crate) struct World {
    pub channels: Vec<(u32, String, u32)>,
    /// `(name, channel_id)`, ourselves included once connected.
    pub users: Vec<(String, u32)>,
    /// Channels the server refuses to let us enter.
    pub locked: BTreeSet<u32>,
    pub moves: Vec<u32>,
    pub texts: Vec<(u32, String)>,
    pub comment: Option<String>,
    pub disconnects: u32,
    pub events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl World {
    /// Channels named `ch<id>` directly under the root.
    pub fn with_channels(ids: &[u32]) -> Self {
        Self {
            channels: ids
                .iter()
                .map(|&id| (id, format!("ch{id}"), 0))
                .collect(),
            ..Self::default()
        }
    }

    pub fn add_user(&mut self, name: &str, channel_id: u32) {
        self.users.push((name.to_owned(), channel_id));
    }

    pub fn self_channel(&self) -> Option<u32> {
        self.users
            .iter()
            .find(|(n, _)| n == SELF_NAME)
            .map(|(_, c)| *c)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

pub(crate) type SharedWorld = Arc<Mutex<World>>;

// ── Transport ────────────────────────────────────────────────────────

/// Scripted transport: each dial pops the next outcome (`true` succeeds);
/// an empty script succeeds.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    pub world: SharedWorld,
    pub script: Mutex<VecDeque<bool>>,
    pub dials: AtomicU32,
    pub always_fail: bool,
}

impl FakeTransport {
    pub fn new(world: World) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn dial_count(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }
}

impl VoiceTransport for FakeTransport {
    type Session = FakeSession;

    async fn dial(&self, account: &Account) -> Result<Dialed<FakeSession>, CoreError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let succeed = !self.always_fail && self.script.lock().unwrap().pop_front().unwrap_or(true);
        if !succeed {
            return Err(CoreError::ConnectionFailed {
                address: account.address.clone(),
                reason: "connection refused".into(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut world = self.world.lock().unwrap();
        world.users.retain(|(n, _)| n != SELF_NAME);
        world.users.push((SELF_NAME.to_owned(), 0));
        world.events = Some(tx);
        world.emit(SessionEvent::Connected { welcome_text: None });
        drop(world);

        Ok((
            FakeSession {
                world: Arc::clone(&self.world),
            },
            rx,
        ))
    }

    async fn ping(&self, address: &str) -> Result<PingReply, CoreError> {
        if self.always_fail {
            return Err(CoreError::Timeout {
                address: address.to_owned(),
                timeout_secs: 1,
            });
        }
        Ok(PingReply {
            address: SocketAddr::from(([127, 0, 0, 1], 64738)),
            version: (1, 5, 0),
            users: 2,
            max_users: 10,
            max_bandwidth: 72_000,
            round_trip: Duration::from_millis(5),
        })
    }
}

#[derive(Debug)]
pub(crate) struct FakeSession {
    world: SharedWorld,
}

impl VoiceSession for FakeSession {
    fn username(&self) -> String {
        SELF_NAME.to_owned()
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        let world = self.world.lock().unwrap();
        world
            .channels
            .iter()
            .map(|(id, name, parent)| ChannelInfo {
                id: *id,
                name: name.clone(),
                parent_id: *parent,
                user_count: world.users.iter().filter(|(_, c)| c == id).count(),
            })
            .collect()
    }

    fn self_channel(&self) -> Option<u32> {
        self.world.lock().unwrap().self_channel()
    }

    fn users_in(&self, channel_id: u32) -> Vec<String> {
        self.world
            .lock()
            .unwrap()
            .users
            .iter()
            .filter(|(_, c)| *c == channel_id)
            .map(|(n, _)| n.clone())
            .collect()
    }

    fn move_to(&self, channel_id: u32) -> Result<(), CoreError> {
        let mut world = self.world.lock().unwrap();
        if !world.channels.iter().any(|(id, _, _)| *id == channel_id) {
            return Err(CoreError::ChannelNotFound { channel_id });
        }
        world.moves.push(channel_id);
        if world.locked.contains(&channel_id) {
            world.emit(SessionEvent::PermissionDenied {
                kind: DenyType::Permission,
                reason: Some("locked".into()),
            });
            return Ok(());
        }
        if let Some(user) = world.users.iter_mut().find(|(n, _)| n == SELF_NAME) {
            user.1 = channel_id;
        }
        world.emit(SessionEvent::UsersChanged);
        Ok(())
    }

    fn send_text(&self, channel_id: u32, message: &str) -> Result<(), CoreError> {
        self.world
            .lock()
            .unwrap()
            .texts
            .push((channel_id, message.to_owned()));
        Ok(())
    }

    fn set_comment(&self, comment: &str) -> Result<(), CoreError> {
        self.world.lock().unwrap().comment = Some(comment.to_owned());
        Ok(())
    }

    fn disconnect(&self) {
        let mut world = self.world.lock().unwrap();
        world.disconnects += 1;
        world.users.retain(|(n, _)| n != SELF_NAME);
        world.events = None;
    }
}

// ── Audio ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AudioCall {
    Play(PathBuf),
    StartCapture,
    StopCapture,
    Stream(PathBuf),
    Mute(MuteMode),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingAudio {
    pub calls: Mutex<Vec<AudioCall>>,
    pub muted: Mutex<bool>,
    pub streams: Mutex<Vec<CancellationToken>>,
}

impl RecordingAudio {
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: AudioCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AudioPort for RecordingAudio {
    fn play_local(&self, cue: &SoundCue) -> Result<(), PortError> {
        self.record(AudioCall::Play(cue.path.clone()));
        Ok(())
    }

    fn start_capture(&self) -> Result<(), PortError> {
        self.record(AudioCall::StartCapture);
        Ok(())
    }

    fn stop_capture(&self) -> Result<(), PortError> {
        self.record(AudioCall::StopCapture);
        Ok(())
    }

    fn stream_into_channel(
        &self,
        cue: &SoundCue,
        cancel: CancellationToken,
    ) -> Result<(), PortError> {
        self.record(AudioCall::Stream(cue.path.clone()));
        self.streams.lock().unwrap().push(cancel);
        Ok(())
    }

    fn set_mute(&self, mode: MuteMode) -> Result<bool, PortError> {
        self.record(AudioCall::Mute(mode));
        let mut muted = self.muted.lock().unwrap();
        *muted = match mode {
            MuteMode::Mute => true,
            MuteMode::Unmute => false,
            MuteMode::Toggle => !*muted,
        };
        Ok(*muted)
    }
}

// ── Indicators ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct RecordingIndicators {
    pub leds: Mutex<Vec<(Led, bool)>>,
    pub frames: Mutex<Vec<[String; DISPLAY_LINES]>>,
    pub clears: AtomicU32,
}

impl RecordingIndicators {
    /// Last state written to `led`.
    pub fn led(&self, led: Led) -> Option<bool> {
        self.leds
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(l, _)| *l == led)
            .map(|(_, on)| *on)
    }

    pub fn led_history(&self, led: Led) -> Vec<bool> {
        self.leds
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == led)
            .map(|(_, on)| *on)
            .collect()
    }

    pub fn last_frame(&self) -> Option<[String; DISPLAY_LINES]> {
        self.frames.lock().unwrap().last().cloned()
    }
}

impl IndicatorPort for RecordingIndicators {
    fn set_led(&self, led: Led, on: bool) -> Result<(), PortError> {
        self.leds.lock().unwrap().push((led, on));
        Ok(())
    }

    fn render(&self, lines: &[String; DISPLAY_LINES]) -> Result<(), PortError> {
        self.frames.lock().unwrap().push(lines.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PortError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Builders ─────────────────────────────────────────────────────────

pub(crate) fn account(name: &str, channel: Option<&str>) -> Account {
    Account {
        name: name.to_owned(),
        address: format!("{name}.example.org:64738"),
        username: SELF_NAME.to_owned(),
        password: None,
        tokens: Vec::new(),
        insecure: false,
        certificate: None,
        channel: channel.map(str::to_owned),
    }
}

pub(crate) fn cue(name: &str) -> SoundCue {
    SoundCue {
        path: PathBuf::from(format!("/sounds/{name}.wav")),
        volume: 80,
    }
}
