// ── Control messages ──
//
// The Mumble control messages the gateway exchanges, as prost messages.
// Tags follow Mumble.proto (proto2); only the fields we read or write are
// modelled and everything else is skipped on decode.

use std::fmt;

use prost::Message;
use strum::{Display, FromRepr, IntoStaticStr};

use crate::codec::Frame;
use crate::error::Error;

// ── Message types ───────────────────────────────────────────────────

/// Control channel message type ids (the `u16` in every frame header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr, IntoStaticStr)]
#[repr(u16)]
pub enum MessageType {
    Version = 0,
    UdpTunnel = 1,
    Authenticate = 2,
    Ping = 3,
    Reject = 4,
    ServerSync = 5,
    ChannelRemove = 6,
    ChannelState = 7,
    UserRemove = 8,
    UserState = 9,
    BanList = 10,
    TextMessage = 11,
    PermissionDenied = 12,
    Acl = 13,
    QueryUsers = 14,
    CryptSetup = 15,
    ContextActionModify = 16,
    ContextAction = 17,
    UserList = 18,
    VoiceTarget = 19,
    PermissionQuery = 20,
    CodecVersion = 21,
    UserStats = 22,
    RequestBlob = 23,
    ServerConfig = 24,
    SuggestConfig = 25,
}

/// Why the server refused an `Authenticate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, prost::Enumeration)]
#[repr(i32)]
pub enum RejectKind {
    #[strum(serialize = "unspecified")]
    None = 0,
    #[strum(serialize = "wrong version")]
    WrongVersion = 1,
    #[strum(serialize = "invalid username")]
    InvalidUsername = 2,
    #[strum(serialize = "wrong user password")]
    WrongUserPassword = 3,
    #[strum(serialize = "wrong server password")]
    WrongServerPassword = 4,
    #[strum(serialize = "username in use")]
    UsernameInUse = 5,
    #[strum(serialize = "server full")]
    ServerFull = 6,
    #[strum(serialize = "certificate required")]
    NoCertificate = 7,
    #[strum(serialize = "authenticator failure")]
    AuthenticatorFail = 8,
}

/// Category carried by a `PermissionDenied` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, prost::Enumeration)]
#[repr(i32)]
pub enum DenyType {
    #[strum(serialize = "other")]
    Text = 0,
    #[strum(serialize = "insufficient permissions")]
    Permission = 1,
    #[strum(serialize = "cannot modify SuperUser")]
    SuperUser = 2,
    #[strum(serialize = "invalid channel name")]
    ChannelName = 3,
    #[strum(serialize = "text too long")]
    TextTooLong = 4,
    #[strum(serialize = "H9K")]
    H9K = 5,
    #[strum(serialize = "temporary channel")]
    TemporaryChannel = 6,
    #[strum(serialize = "missing certificate")]
    MissingCertificate = 7,
    #[strum(serialize = "invalid username")]
    UserName = 8,
    #[strum(serialize = "channel is full")]
    ChannelFull = 9,
    #[strum(serialize = "channel nesting limit reached")]
    NestingLimit = 10,
}

// ── Client → server messages ────────────────────────────────────────

/// Protocol version we announce (1.4.0).
pub const PROTOCOL_VERSION: u32 = (1 << 16) | (4 << 8);

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Version {
    #[prost(uint32, optional, tag = "1")]
    pub version: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub release: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub os: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub os_version: Option<String>,
}

impl Version {
    pub fn ours() -> Self {
        Self {
            version: Some(PROTOCOL_VERSION),
            release: Some(concat!("talkgate ", env!("CARGO_PKG_VERSION")).into()),
            os: Some(std::env::consts::OS.into()),
            os_version: Some(std::env::consts::ARCH.into()),
        }
    }

    /// `(major, minor, patch)` unpacked from the wire version.
    pub fn triple(&self) -> (u16, u8, u8) {
        split_version(self.version())
    }
}

/// Unpack a `major << 16 | minor << 8 | patch` version word.
pub fn split_version(version: u32) -> (u16, u8, u8) {
    let [hi, lo, minor, patch] = version.to_be_bytes();
    (u16::from_be_bytes([hi, lo]), minor, patch)
}

#[derive(Clone, PartialEq, Eq, Message)]
#[prost(skip_debug)]
pub struct Authenticate {
    #[prost(string, optional, tag = "1")]
    pub username: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub password: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub tokens: Vec<String>,
    #[prost(bool, optional, tag = "5")]
    pub opus: Option<bool>,
}

impl fmt::Debug for Authenticate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticate")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tokens", &self.tokens.len())
            .field("opus", &self.opus)
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Message)]
pub struct Ping {
    #[prost(uint64, optional, tag = "1")]
    pub timestamp: Option<u64>,
}

// ── Server → client messages ────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Reject {
    #[prost(enumeration = "RejectKind", optional, tag = "1")]
    pub kind: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub reason: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct ServerSync {
    #[prost(uint32, optional, tag = "1")]
    pub session: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub max_bandwidth: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub welcome_text: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct ChannelState {
    #[prost(uint32, optional, tag = "1")]
    pub channel_id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub parent: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Message)]
pub struct ChannelRemove {
    #[prost(uint32, required, tag = "1")]
    pub channel_id: u32,
}

/// `UserState` is sent as a delta: absent fields are unchanged.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct UserState {
    #[prost(uint32, optional, tag = "1")]
    pub session: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub actor: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
    #[prost(uint32, optional, tag = "4")]
    pub user_id: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub channel_id: Option<u32>,
    #[prost(string, optional, tag = "14")]
    pub comment: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct UserRemove {
    #[prost(uint32, required, tag = "1")]
    pub session: u32,
    #[prost(uint32, optional, tag = "2")]
    pub actor: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub reason: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct TextMessage {
    #[prost(uint32, optional, tag = "1")]
    pub actor: Option<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "2")]
    pub sessions: Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "3")]
    pub channel_ids: Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "4")]
    pub tree_ids: Vec<u32>,
    #[prost(string, required, tag = "5")]
    pub message: String,
}

impl TextMessage {
    /// A message addressed to a single channel.
    pub fn to_channel(channel_id: u32, message: impl Into<String>) -> Self {
        Self {
            channel_ids: vec![channel_id],
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct PermissionDenied {
    #[prost(uint32, optional, tag = "1")]
    pub permission: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub channel_id: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub session: Option<u32>,
    #[prost(string, optional, tag = "4")]
    pub reason: Option<String>,
    #[prost(enumeration = "DenyType", optional, tag = "5")]
    pub kind: Option<i32>,
    #[prost(string, optional, tag = "6")]
    pub name: Option<String>,
}

// ── Dispatch ────────────────────────────────────────────────────────

/// A decoded inbound control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Version(Version),
    Ping(Ping),
    Reject(Reject),
    ServerSync(ServerSync),
    ChannelRemove(ChannelRemove),
    ChannelState(ChannelState),
    UserRemove(UserRemove),
    UserState(UserState),
    TextMessage(TextMessage),
    PermissionDenied(PermissionDenied),
    /// A known message type the gateway does not act on.
    Ignored(MessageType),
    /// A type id newer than this client.
    Unknown(u16),
}

impl ControlMessage {
    pub fn decode(frame: &Frame) -> Result<Self, Error> {
        let Some(kind) = MessageType::from_repr(frame.kind) else {
            return Ok(Self::Unknown(frame.kind));
        };
        let buf = frame.payload.as_ref();
        Ok(match kind {
            MessageType::Version => Self::Version(parse(kind, buf)?),
            MessageType::Ping => Self::Ping(parse(kind, buf)?),
            MessageType::Reject => Self::Reject(parse(kind, buf)?),
            MessageType::ServerSync => Self::ServerSync(parse(kind, buf)?),
            MessageType::ChannelRemove => Self::ChannelRemove(parse(kind, buf)?),
            MessageType::ChannelState => Self::ChannelState(parse(kind, buf)?),
            MessageType::UserRemove => Self::UserRemove(parse(kind, buf)?),
            MessageType::UserState => Self::UserState(parse(kind, buf)?),
            MessageType::TextMessage => Self::TextMessage(parse(kind, buf)?),
            MessageType::PermissionDenied => Self::PermissionDenied(parse(kind, buf)?),
            other => Self::Ignored(other),
        })
    }
}

fn parse<M: Message + Default>(kind: MessageType, buf: &[u8]) -> Result<M, Error> {
    M::decode(buf).map_err(|source| Error::Decode {
        message: kind.into(),
        source,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    use super::*;

    fn decode(kind: MessageType, payload: &[u8]) -> Result<ControlMessage, Error> {
        ControlMessage::decode(&Frame::typed(kind, Bytes::copy_from_slice(payload)))
    }

    #[test]
    fn ping_timestamp_uses_field_one() {
        let ping = Ping {
            timestamp: Some(300),
        };
        assert_eq!(ping.encode_to_vec(), [0x08, 0xac, 0x02]);
    }

    #[test]
    fn version_words_split_into_triple() {
        assert_eq!(split_version(PROTOCOL_VERSION), (1, 4, 0));
        assert_eq!(split_version(0x0001_0205), (1, 2, 5));
        assert_eq!(Version::ours().triple(), (1, 4, 0));
    }

    #[test]
    fn user_state_delta_keeps_absent_fields_empty() {
        // session = 7, channel_id = 3
        let ControlMessage::UserState(state) =
            decode(MessageType::UserState, &[0x08, 0x07, 0x28, 0x03]).unwrap()
        else {
            panic!("expected UserState");
        };
        assert_eq!(state.session, Some(7));
        assert_eq!(state.channel_id, Some(3));
        assert_eq!(state.name, None);
        assert_eq!(state.comment, None);
    }

    #[test]
    fn unknown_fields_are_skipped() {
        // channel_id = 4, field 9 = "x", name = "Lobby"
        let mut raw = vec![0x08, 0x04, 0x4a, 0x01, b'x', 0x1a, 0x05];
        raw.extend_from_slice(b"Lobby");
        let ControlMessage::ChannelState(state) = decode(MessageType::ChannelState, &raw).unwrap()
        else {
            panic!("expected ChannelState");
        };
        assert_eq!(state.channel_id, Some(4));
        assert_eq!(state.name.as_deref(), Some("Lobby"));
    }

    #[test]
    fn text_message_accepts_packed_channel_ids() {
        // field 3 as one packed run of [1, 5], then message = "hello"
        let mut raw = vec![0x1a, 0x02, 0x01, 0x05, 0x2a, 0x05];
        raw.extend_from_slice(b"hello");
        let ControlMessage::TextMessage(msg) = decode(MessageType::TextMessage, &raw).unwrap()
        else {
            panic!("expected TextMessage");
        };
        assert_eq!(msg.channel_ids, vec![1, 5]);
        assert_eq!(msg.message, "hello");
    }

    #[test]
    fn outgoing_text_message_is_unpacked() {
        let raw = TextMessage::to_channel(12, "hi").encode_to_vec();
        assert_eq!(raw, [0x18, 0x0c, 0x2a, 0x02, b'h', b'i']);
    }

    #[test]
    fn permission_denied_maps_type() {
        // channel_id = 12, type = ChannelFull
        let ControlMessage::PermissionDenied(denied) =
            decode(MessageType::PermissionDenied, &[0x10, 0x0c, 0x28, 0x09]).unwrap()
        else {
            panic!("expected PermissionDenied");
        };
        assert_eq!(denied.kind(), DenyType::ChannelFull);
        assert_eq!(denied.channel_id, Some(12));
    }

    #[test]
    fn unknown_enum_values_fall_back_to_default() {
        let reject = Reject {
            kind: Some(42),
            reason: None,
        };
        assert_eq!(reject.kind(), RejectKind::None);
    }

    #[test]
    fn authenticate_debug_hides_password() {
        let auth = Authenticate {
            username: Some("gw".into()),
            password: Some("hunter2".into()),
            tokens: vec![],
            opus: Some(true),
        };
        let text = format!("{auth:?}");
        assert!(text.contains("REDACTED"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn truncated_payload_is_a_decode_error() {
        let err = decode(MessageType::ChannelState, &[0x1a, 0x05, b'a']).unwrap_err();
        assert!(matches!(err, Error::Decode { message: "ChannelState", .. }));
    }

    #[test]
    fn unknown_type_ids_are_preserved() {
        let frame = Frame::new(99, Bytes::new());
        assert_eq!(ControlMessage::decode(&frame).unwrap(), ControlMessage::Unknown(99));
    }
}
