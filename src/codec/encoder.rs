//! Protocol message encoder
//!
//! Produces one JSON datagram per message.

use bytes::Bytes;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

use super::WireMessage;
use crate::protocol::ProtocolMessage;

/// Encoder with running statistics
#[derive(Debug, Default)]
pub struct MessageEncoder {
    messages_encoded: AtomicU64,
    bytes_produced: AtomicU64,
}

impl MessageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a message to a UTF-8 JSON datagram
    pub fn encode(&self, message: &ProtocolMessage) -> Bytes {
        let bytes = encode(message);
        self.messages_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_produced
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        bytes
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            messages_encoded: self.messages_encoded.load(Ordering::Relaxed),
            bytes_produced: self.bytes_produced.load(Ordering::Relaxed),
        }
    }
}

/// Encode without keeping statistics
pub fn encode(message: &ProtocolMessage) -> Bytes {
    let value = match message {
        ProtocolMessage::Flare { variant, location } => wire_value(WireMessage::Flare {
            variant: *variant,
            loc: location.clone(),
        }),
        ProtocolMessage::MuteAll => wire_value(WireMessage::MuteAll {}),
        ProtocolMessage::MuteAck { timestamp } => {
            wire_value(WireMessage::MuteAck { ts: *timestamp })
        }
        ProtocolMessage::Chat {
            content,
            timestamp,
            attachment,
        } => wire_value(WireMessage::Chat {
            content: content.clone(),
            ts: *timestamp,
            attachment: attachment.clone(),
        }),
        ProtocolMessage::AppEvent { kind, payload } => {
            let mut object = payload.clone();
            object.insert("type".to_string(), Value::String(kind.clone()));
            Value::Object(object)
        }
    };
    Bytes::from(value.to_string())
}

fn wire_value(wire: WireMessage) -> Value {
    // Only strings, integers and enums: serialization is infallible
    serde_json::to_value(wire).unwrap_or(Value::Null)
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub messages_encoded: u64,
    pub bytes_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FlareVariant;
    use serde_json::json;

    fn as_json(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_flare_shape() {
        let bytes = encode(&ProtocolMessage::flare(FlareVariant::Combat, "HUR-L1"));
        assert_eq!(
            as_json(&bytes),
            json!({"type": "FLARE", "variant": "COMBAT", "loc": "HUR-L1"})
        );
    }

    #[test]
    fn test_mute_shapes() {
        assert_eq!(as_json(&encode(&ProtocolMessage::MuteAll)), json!({"type": "MUTE_ALL"}));
        assert_eq!(
            as_json(&encode(&ProtocolMessage::MuteAck { timestamp: 1700000000123 })),
            json!({"type": "MUTE_ACK", "ts": 1700000000123i64})
        );
    }

    #[test]
    fn test_chat_omits_missing_attachment() {
        let msg = ProtocolMessage::Chat {
            content: "rally at L1".into(),
            timestamp: 5,
            attachment: None,
        };
        assert_eq!(
            as_json(&encode(&msg)),
            json!({"type": "CHAT", "content": "rally at L1", "ts": 5})
        );
    }

    #[test]
    fn test_app_event_keeps_payload() {
        let mut payload = serde_json::Map::new();
        payload.insert("waypoint".into(), json!("ARC-L2"));
        let msg = ProtocolMessage::AppEvent {
            kind: "WAYPOINT".into(),
            payload,
        };
        assert_eq!(
            as_json(&encode(&msg)),
            json!({"type": "WAYPOINT", "waypoint": "ARC-L2"})
        );
    }

    #[test]
    fn test_stats() {
        let encoder = MessageEncoder::new();
        let a = encoder.encode(&ProtocolMessage::MuteAll);
        let b = encoder.encode(&ProtocolMessage::MuteAll);

        let stats = encoder.stats();
        assert_eq!(stats.messages_encoded, 2);
        assert_eq!(stats.bytes_produced, (a.len() + b.len()) as u64);
    }
}
