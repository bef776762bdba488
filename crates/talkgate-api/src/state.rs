// ── Server model ──
//
// The client's view of the server: channel tree and connected users,
// folded from `ChannelState`/`UserState` deltas as they arrive.

use std::collections::BTreeMap;

use crate::proto::{ChannelState, UserState};

/// A channel as last announced by the server. The root channel is id 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: u32,
    pub parent: Option<u32>,
    pub name: String,
}

/// A connected user, keyed by session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub session: u32,
    pub name: String,
    pub user_id: Option<u32>,
    pub channel_id: u32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ServerState {
    pub channels: BTreeMap<u32, Channel>,
    pub users: BTreeMap<u32, User>,
    /// Our own session id, known after `ServerSync`.
    pub session: Option<u32>,
    pub welcome_text: Option<String>,
    pub max_bandwidth: Option<u32>,
}

impl ServerState {
    pub fn apply_channel(&mut self, delta: ChannelState) {
        let Some(id) = delta.channel_id else {
            return;
        };
        let channel = self.channels.entry(id).or_insert_with(|| Channel {
            id,
            parent: None,
            name: String::new(),
        });
        if delta.parent.is_some() {
            channel.parent = delta.parent;
        }
        if let Some(name) = delta.name {
            channel.name = name;
        }
    }

    pub fn remove_channel(&mut self, id: u32) {
        self.channels.remove(&id);
    }

    /// Fold a user delta. Returns the previous channel of that user, if it moved.
    pub fn apply_user(&mut self, delta: UserState) -> Option<u32> {
        let session = delta.session?;
        let user = self.users.entry(session).or_insert_with(|| User {
            session,
            name: String::new(),
            user_id: None,
            channel_id: 0,
            comment: None,
        });
        if let Some(name) = delta.name {
            user.name = name;
        }
        if delta.user_id.is_some() {
            user.user_id = delta.user_id;
        }
        if delta.comment.is_some() {
            user.comment = delta.comment;
        }
        match delta.channel_id {
            Some(channel_id) if channel_id != user.channel_id => {
                let previous = user.channel_id;
                user.channel_id = channel_id;
                Some(previous)
            }
            _ => None,
        }
    }

    pub fn remove_user(&mut self, session: u32) -> Option<User> {
        self.users.remove(&session)
    }

    pub fn self_user(&self) -> Option<&User> {
        self.session.and_then(|s| self.users.get(&s))
    }

    pub fn users_in(&self, channel_id: u32) -> impl Iterator<Item = &User> {
        self.users.values().filter(move |u| u.channel_id == channel_id)
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&Channel> {
        self.channels.values().find(|c| c.name == name)
    }
}
