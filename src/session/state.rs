//! Session state types

use serde::Serialize;

use crate::network::NetInfo;
use crate::protocol::{ParticipantId, Position};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Failed connect or lost signal; left only by a new `connect` or `disconnect`
    Error,
}

/// Local microphone state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AudioState {
    Disconnected,
    ConnectedMuted,
    ConnectedOpen,
}

/// Priority-mute override, one per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MuteOverrideState {
    pub active: bool,
    /// Milliseconds since the Unix epoch
    pub triggered_at: Option<i64>,
    pub acknowledged: bool,
}

impl MuteOverrideState {
    pub(crate) fn engage(&mut self, now_ms: i64) -> bool {
        if self.active {
            return false;
        }
        *self = MuteOverrideState {
            active: true,
            triggered_at: Some(now_ms),
            acknowledged: false,
        };
        true
    }

    pub(crate) fn clear(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.acknowledged = true;
        true
    }
}

/// Point-in-time copy of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub room_id: Option<String>,
    pub identity: Option<ParticipantId>,
    pub role: String,
    pub position: Option<Position>,
    pub connection: ConnectionState,
    pub audio: AudioState,
    pub transmit_permission: bool,
    pub mute_override: MuteOverrideState,
    pub net: Option<NetInfo>,
    pub last_error: Option<String>,
}

/// Mutable session fields, guarded by the session lock
#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    pub room_id: Option<String>,
    pub identity: Option<ParticipantId>,
    pub role: String,
    pub position: Option<Position>,
    pub connection: ConnectionState,
    pub audio: AudioState,
    pub mute_override: MuteOverrideState,
    pub net: Option<NetInfo>,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            room_id: None,
            identity: None,
            role: String::new(),
            position: None,
            connection: ConnectionState::Disconnected,
            audio: AudioState::Disconnected,
            mute_override: MuteOverrideState::default(),
            net: None,
            last_error: None,
        }
    }
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Leave the connected states, keeping identity and role for a retry
    pub fn drop_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
        self.audio = AudioState::Disconnected;
        self.mute_override = MuteOverrideState::default();
    }
}
