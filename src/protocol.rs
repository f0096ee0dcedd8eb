//! Side-channel message types and participant metadata
//!
//! These are the in-memory forms. The JSON wire shapes live in [`crate::codec`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity of a participant within a net
pub type ParticipantId = String;

/// Identifier of a remote audio track
pub type TrackId = String;

/// Kind of distress flare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlareVariant {
    Combat,
    Medical,
}

impl fmt::Display for FlareVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlareVariant::Combat => f.write_str("COMBAT"),
            FlareVariant::Medical => f.write_str("MEDICAL"),
        }
    }
}

/// A message carried over the reliable data channel
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    Flare {
        variant: FlareVariant,
        location: String,
    },
    MuteAll,
    MuteAck {
        /// Milliseconds since the Unix epoch
        timestamp: i64,
    },
    Chat {
        content: String,
        timestamp: i64,
        attachment: Option<String>,
    },
    /// Any message type this build does not know, kept verbatim
    AppEvent {
        kind: String,
        payload: Map<String, Value>,
    },
}

impl ProtocolMessage {
    pub fn flare(variant: FlareVariant, location: impl Into<String>) -> Self {
        ProtocolMessage::Flare {
            variant,
            location: location.into(),
        }
    }

    /// MUTE_ACK stamped with the current wall clock
    pub fn mute_ack_now() -> Self {
        ProtocolMessage::MuteAck {
            timestamp: now_ms(),
        }
    }

    pub fn chat(content: impl Into<String>, attachment: Option<String>) -> Self {
        ProtocolMessage::Chat {
            content: content.into(),
            timestamp: now_ms(),
            attachment,
        }
    }

    /// Wire `type` tag
    pub fn kind(&self) -> &str {
        match self {
            ProtocolMessage::Flare { .. } => "FLARE",
            ProtocolMessage::MuteAll => "MUTE_ALL",
            ProtocolMessage::MuteAck { .. } => "MUTE_ACK",
            ProtocolMessage::Chat { .. } => "CHAT",
            ProtocolMessage::AppEvent { kind, .. } => kind,
        }
    }
}

/// 2D position on the stage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Metadata every participant publishes about itself
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticipantMetadata {
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl ParticipantMetadata {
    pub fn new(role: impl Into<String>, position: Option<Position>) -> Self {
        Self {
            role: role.into(),
            x: position.map(|p| p.x),
            y: position.map(|p| p.y),
        }
    }

    /// Position, if both coordinates were published
    pub fn position(&self) -> Option<Position> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Position { x, y }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a struct of strings and floats cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    /// Lenient parse; malformed metadata yields `None`
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
