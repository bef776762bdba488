// ── Control channel client ──
//
// Dials a voice server over TLS, authenticates, waits for the initial
// state sync, then hands the connection to a background task that keeps
// the server model current, answers keepalive pings, and forwards
// interesting changes as `ClientEvent`s.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::address::split_address;
use crate::codec::{Frame, FrameCodec};
use crate::error::Error;
use crate::proto::{
    Authenticate, ControlMessage, DenyType, MessageType, Ping, TextMessage, UserState, Version,
};
use crate::state::{ServerState, User};
use crate::tls::{self, TlsOptions};

/// Servers drop clients that stay silent for 30s.
const PING_INTERVAL: Duration = Duration::from_secs(15);

// ── Options & events ────────────────────────────────────────────────

/// Everything needed to dial one server account.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// `host[:port]`; the port defaults to 64738.
    pub address: String,
    pub username: String,
    pub password: Option<SecretString>,
    /// Access tokens for password-protected channels.
    pub tokens: Vec<String>,
    pub tls: TlsOptions,
    /// Upper bound for TCP connect + TLS handshake + initial sync.
    pub timeout: Duration,
}

/// Why the control channel went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// Read/write failure on the socket.
    Error,
    /// The server closed the stream.
    Closed,
    /// [`Client::disconnect`] was called.
    Requested,
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "connection error",
            Self::Closed => "closed by server",
            Self::Requested => "requested",
        })
    }
}

/// Changes reported by the background connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Emitted once, right after the initial sync.
    Connected { welcome_text: Option<String> },
    /// Terminal event; nothing follows it.
    Disconnected { cause: DisconnectCause },
    ChannelsChanged,
    UsersChanged,
    TextMessage {
        sender: Option<String>,
        message: String,
    },
    PermissionDenied {
        kind: DenyType,
        channel_id: Option<u32>,
        reason: Option<String>,
    },
}

// ── Client ──────────────────────────────────────────────────────────

/// Handle to a live control channel.
///
/// Cheaply cloneable via `Arc<ClientInner>`. All mutating calls queue a
/// frame for the background task and return immediately; the server's
/// confirmation arrives later as a state delta.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    address: String,
    state: RwLock<ServerState>,
    outgoing: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.inner.address)
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Dial, authenticate and sync. On success the returned receiver
    /// yields [`ClientEvent::Connected`] first.
    pub async fn connect(
        options: ConnectOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), Error> {
        let (host, port) = split_address(&options.address)?;
        let tls_config = tls::client_config(&options.tls)?;
        let server_name = tls::server_name(&host)?;

        let handshake = async {
            let tcp = TcpStream::connect((host.as_str(), port)).await?;
            tcp.set_nodelay(true)?;
            let stream = TlsConnector::from(tls_config)
                .connect(server_name, tcp)
                .await
                .map_err(|e| Error::Tls(format!("handshake failed: {e}")))?;
            debug!(address = %options.address, "TLS established");

            let mut framed = Framed::new(stream, FrameCodec);
            authenticate(&mut framed, &options).await?;
            let state = await_sync(&mut framed).await?;
            Ok::<_, Error>((framed, state))
        };

        let (framed, state) = tokio::time::timeout(options.timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                address: options.address.clone(),
                timeout_secs: options.timeout.as_secs(),
            })??;

        let welcome_text = state.welcome_text.clone();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ClientInner {
            address: options.address,
            state: RwLock::new(state),
            outgoing,
            cancel: CancellationToken::new(),
        });

        let _ = event_tx.send(ClientEvent::Connected { welcome_text });
        tokio::spawn(io_loop(framed, Arc::clone(&inner), outgoing_rx, event_tx));

        Ok((Self { inner }, event_rx))
    }

    /// Run `f` against the current server model.
    pub fn with_state<R>(&self, f: impl FnOnce(&ServerState) -> R) -> R {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    pub fn session(&self) -> Option<u32> {
        self.with_state(|s| s.session)
    }

    pub fn self_user(&self) -> Option<User> {
        self.with_state(|s| s.self_user().cloned())
    }

    /// Ask the server to move us into `channel_id`.
    pub fn move_to(&self, channel_id: u32) -> Result<(), Error> {
        let session = self.session().ok_or(Error::Disconnected)?;
        self.send(Frame::message(
            MessageType::UserState,
            &UserState {
                session: Some(session),
                channel_id: Some(channel_id),
                ..UserState::default()
            },
        ))
    }

    /// Send a text message to everyone in `channel_id`.
    pub fn send_text(&self, channel_id: u32, message: &str) -> Result<(), Error> {
        self.send(Frame::message(
            MessageType::TextMessage,
            &TextMessage::to_channel(channel_id, message),
        ))
    }

    /// Replace our user comment.
    pub fn set_comment(&self, comment: &str) -> Result<(), Error> {
        let session = self.session().ok_or(Error::Disconnected)?;
        self.send(Frame::message(
            MessageType::UserState,
            &UserState {
                session: Some(session),
                comment: Some(comment.into()),
                ..UserState::default()
            },
        ))
    }

    /// Close the control channel. Idempotent.
    pub fn disconnect(&self) {
        self.inner.cancel.cancel();
    }

    fn send(&self, frame: Frame) -> Result<(), Error> {
        self.inner
            .outgoing
            .send(frame)
            .map_err(|_| Error::Disconnected)
    }
}

// ── Handshake ───────────────────────────────────────────────────────

async fn authenticate<S>(
    framed: &mut Framed<S, FrameCodec>,
    options: &ConnectOptions,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed
        .send(Frame::message(MessageType::Version, &Version::ours()))
        .await?;

    let auth = Authenticate {
        username: Some(options.username.clone()),
        password: options
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_owned()),
        tokens: options.tokens.clone(),
        opus: Some(true),
    };
    framed
        .send(Frame::message(MessageType::Authenticate, &auth))
        .await
}

/// Fold the initial channel/user burst until `ServerSync` or `Reject`.
async fn await_sync<S>(framed: &mut Framed<S, FrameCodec>) -> Result<ServerState, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut state = ServerState::default();
    loop {
        let frame = framed.next().await.ok_or(Error::Closed)??;
        match ControlMessage::decode(&frame)? {
            ControlMessage::ServerSync(sync) => {
                state.session = sync.session;
                state.welcome_text = sync.welcome_text;
                state.max_bandwidth = sync.max_bandwidth;
                debug!(
                    session = ?state.session,
                    channels = state.channels.len(),
                    users = state.users.len(),
                    "server sync complete"
                );
                return Ok(state);
            }
            ControlMessage::Reject(reject) => {
                return Err(Error::Rejected {
                    kind: reject.kind(),
                    reason: reject.reason.unwrap_or_default(),
                });
            }
            ControlMessage::Version(version) => {
                let (major, minor, patch) = version.triple();
                debug!(%major, %minor, %patch, release = version.release(), "server version");
            }
            ControlMessage::ChannelState(delta) => state.apply_channel(delta),
            ControlMessage::ChannelRemove(rm) => state.remove_channel(rm.channel_id),
            ControlMessage::UserState(delta) => {
                state.apply_user(delta);
            }
            ControlMessage::UserRemove(rm) => {
                state.remove_user(rm.session);
            }
            other => trace!(?other, "ignored during sync"),
        }
    }
}

// ── Background task ─────────────────────────────────────────────────

async fn io_loop<S>(
    framed: Framed<S, FrameCodec>,
    inner: Arc<ClientInner>,
    mut outgoing: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::UnboundedSender<ClientEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = framed.split();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await; // consume the immediate first tick

    let cause = loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break DisconnectCause::Requested,

            Some(frame) = outgoing.recv() => {
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "control channel write failed");
                    break DisconnectCause::Error;
                }
            }

            _ = ping.tick() => {
                let ping = Ping { timestamp: Some(unix_secs()) };
                let frame = Frame::message(MessageType::Ping, &ping);
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "keepalive ping failed");
                    break DisconnectCause::Error;
                }
            }

            frame = stream.next() => match frame {
                None => break DisconnectCause::Closed,
                Some(Err(e)) => {
                    warn!(error = %e, "control channel read failed");
                    break DisconnectCause::Error;
                }
                Some(Ok(frame)) => handle_inbound(&inner, &events, &frame),
            },
        }
    };

    inner.cancel.cancel();
    if cause == DisconnectCause::Requested {
        let _ = sink.close().await;
    }
    debug!(address = %inner.address, %cause, "control channel closed");
    let _ = events.send(ClientEvent::Disconnected { cause });
}

fn handle_inbound(
    inner: &ClientInner,
    events: &mpsc::UnboundedSender<ClientEvent>,
    frame: &Frame,
) {
    let message = match ControlMessage::decode(frame) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, kind = frame.kind, "dropping undecodable message");
            return;
        }
    };

    let mut state = inner.state.write().unwrap_or_else(PoisonError::into_inner);
    let event = match message {
        ControlMessage::ChannelState(delta) => {
            state.apply_channel(delta);
            Some(ClientEvent::ChannelsChanged)
        }
        ControlMessage::ChannelRemove(rm) => {
            state.remove_channel(rm.channel_id);
            Some(ClientEvent::ChannelsChanged)
        }
        ControlMessage::UserState(delta) => {
            state.apply_user(delta);
            Some(ClientEvent::UsersChanged)
        }
        ControlMessage::UserRemove(rm) => {
            if let Some(user) = state.remove_user(rm.session) {
                debug!(user = %user.name, reason = ?rm.reason, "user left server");
            }
            Some(ClientEvent::UsersChanged)
        }
        ControlMessage::TextMessage(msg) => {
            let sender = msg
                .actor
                .and_then(|actor| state.users.get(&actor))
                .map(|u| u.name.clone());
            Some(ClientEvent::TextMessage {
                sender,
                message: msg.message,
            })
        }
        ControlMessage::PermissionDenied(denied) => Some(ClientEvent::PermissionDenied {
            kind: denied.kind(),
            channel_id: denied.channel_id,
            reason: denied.reason,
        }),
        ControlMessage::Ping(_) => None,
        other => {
            trace!(?other, "unhandled control message");
            None
        }
    };
    drop(state);

    if let Some(event) = event {
        let _ = events.send(event);
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
