// ── Session state ──
//
// Owned exclusively by the gateway worker. Front-ends only ever see a
// `SessionSnapshot` through the controller's watch channel.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

/// Direction of the last navigation request, for permission-denied retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ButtonPress {
    #[default]
    None,
    Up,
    Down,
}

/// Mutable gateway state. Invariant: `transmitting && streaming` is never true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub connected: bool,
    pub current_channel_id: u32,
    /// Navigation anchor; 0 means "seed from current on next step".
    pub previous_channel_id: u32,
    pub max_channel_id: u32,
    pub participant_count: usize,
    pub previous_participant_count: usize,
    pub transmitting: bool,
    pub streaming: bool,
    pub muted: bool,
    pub last_button_press: ButtonPress,
    pub connect_attempts: u32,
    /// Set while intentionally switching servers or quitting.
    pub server_hop: bool,
    pub account_index: usize,
    pub connected_since: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(account_index: usize) -> Self {
        Self {
            account_index,
            ..Self::default()
        }
    }

    /// Forget everything tied to the live session.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
        self.transmitting = false;
        self.streaming = false;
        self.connected_since = None;
    }

    /// Uptime of the current session.
    pub fn session_uptime(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.connected_since
            .and_then(|since| (now - since).to_std().ok())
    }
}

/// Read-only view published after every worker step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub connected: bool,
    pub account: String,
    pub address: String,
    pub username: Option<String>,
    pub channel_id: u32,
    pub channel_name: Option<String>,
    pub max_channel_id: u32,
    pub participants: usize,
    pub transmitting: bool,
    pub streaming: bool,
    pub muted: bool,
    pub last_button_press: ButtonPress,
    pub connect_attempts: u32,
    pub connected_since: Option<DateTime<Utc>>,
    pub process_uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn disconnect_clears_session_flags_but_keeps_navigation() {
        let mut state = SessionState::new(1);
        state.connected = true;
        state.transmitting = true;
        state.current_channel_id = 4;
        state.connected_since = Some(Utc::now());

        state.mark_disconnected();

        assert!(!state.connected);
        assert!(!state.transmitting);
        assert_eq!(state.connected_since, None);
        assert_eq!(state.current_channel_id, 4);
        assert_eq!(state.account_index, 1);
    }

    #[test]
    fn snapshot_serializes_button_press_in_snake_case() {
        let snapshot = SessionSnapshot {
            last_button_press: ButtonPress::Up,
            ..SessionSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap_or_default();
        assert_eq!(json["last_button_press"], "up");
    }
}
