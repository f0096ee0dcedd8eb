//! Side-channel protocol codec
//!
//! Encodes and decodes [`ProtocolMessage`] to UTF-8 JSON, one message per
//! datagram. Unknown `type` tags decode to [`ProtocolMessage::AppEvent`]
//! instead of failing.

pub mod decoder;
pub mod encoder;

pub use decoder::MessageDecoder;
pub use encoder::MessageEncoder;

use serde::{Deserialize, Deserializer, Serialize};

use crate::protocol::{FlareVariant, ProtocolMessage};

/// `type` tags with a typed representation
pub const KNOWN_TYPES: [&str; 4] = ["FLARE", "MUTE_ALL", "MUTE_ACK", "CHAT"];

/// Exact wire shapes of the known message types
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "FLARE")]
    Flare { variant: FlareVariant, loc: String },

    #[serde(rename = "MUTE_ALL")]
    MuteAll {},

    #[serde(rename = "MUTE_ACK")]
    MuteAck {
        #[serde(deserialize_with = "millis")]
        ts: i64,
    },

    #[serde(rename = "CHAT")]
    Chat {
        content: String,
        #[serde(deserialize_with = "millis")]
        ts: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachment: Option<String>,
    },
}

/// Accept integral or fractional JSON numbers for timestamps
fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() {
        Ok(value.trunc() as i64)
    } else {
        Err(serde::de::Error::custom("timestamp is not finite"))
    }
}

impl From<WireMessage> for ProtocolMessage {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::Flare { variant, loc } => ProtocolMessage::Flare {
                variant,
                location: loc,
            },
            WireMessage::MuteAll {} => ProtocolMessage::MuteAll,
            WireMessage::MuteAck { ts } => ProtocolMessage::MuteAck { timestamp: ts },
            WireMessage::Chat {
                content,
                ts,
                attachment,
            } => ProtocolMessage::Chat {
                content,
                timestamp: ts,
                attachment,
            },
        }
    }
}
