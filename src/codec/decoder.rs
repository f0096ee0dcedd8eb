//! Protocol message decoder
//!
//! Never panics on hostile input. Unknown message types become
//! [`ProtocolMessage::AppEvent`]; everything else malformed is a [`DecodeError`].

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{WireMessage, KNOWN_TYPES};
use crate::error::DecodeError;
use crate::protocol::ProtocolMessage;

/// Decoder with running statistics
#[derive(Debug, Default)]
pub struct MessageDecoder {
    messages_decoded: AtomicU64,
    app_events: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one datagram
    pub fn decode(&self, data: &[u8]) -> Result<ProtocolMessage, DecodeError> {
        match decode(data) {
            Ok(message) => {
                self.messages_decoded.fetch_add(1, Ordering::Relaxed);
                if matches!(message, ProtocolMessage::AppEvent { .. }) {
                    self.app_events.fetch_add(1, Ordering::Relaxed);
                }
                Ok(message)
            }
            Err(e) => {
                self.messages_dropped.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Get statistics
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            app_events: self.app_events.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Decode without keeping statistics
pub fn decode(data: &[u8]) -> Result<ProtocolMessage, DecodeError> {
    let text = std::str::from_utf8(data).map_err(|_| DecodeError::InvalidUtf8)?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let object = match value {
        Value::Object(object) => object,
        _ => return Err(DecodeError::MissingType),
    };
    let kind = match object.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        _ => return Err(DecodeError::MissingType),
    };

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(ProtocolMessage::AppEvent {
            kind,
            payload: object,
        });
    }

    serde_json::from_value::<WireMessage>(Value::Object(object))
        .map(ProtocolMessage::from)
        .map_err(|e| DecodeError::Malformed {
            kind,
            reason: e.to_string(),
        })
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub messages_decoded: u64,
    pub app_events: u64,
    pub messages_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::encode;
    use crate::protocol::FlareVariant;

    #[test]
    fn test_flare_roundtrip() {
        let flare = ProtocolMessage::flare(FlareVariant::Combat, "HUR-L1");
        let decoded = decode(&encode(&flare)).unwrap();
        assert_eq!(decoded, flare);
    }

    #[test]
    fn test_unknown_type_is_app_event() {
        let raw = br#"{"type":"BEACON","freq":121.5}"#;
        match decode(raw).unwrap() {
            ProtocolMessage::AppEvent { kind, payload } => {
                assert_eq!(kind, "BEACON");
                assert_eq!(payload.get("freq"), Some(&serde_json::json!(121.5)));
                assert_eq!(payload.get("type"), Some(&serde_json::json!("BEACON")));
            }
            other => panic!("expected AppEvent, got {:?}", other),
        }
    }

    #[test]
    fn test_app_event_roundtrip() {
        let raw = br#"{"type":"BEACON","freq":121.5}"#;
        let first = decode(raw).unwrap();
        let second = decode(&encode(&first)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mute_all_ignores_extra_fields() {
        let decoded = decode(br#"{"type":"MUTE_ALL","origin":"bridge"}"#).unwrap();
        assert_eq!(decoded, ProtocolMessage::MuteAll);
    }

    #[test]
    fn test_fractional_timestamp() {
        let decoded = decode(br#"{"type":"MUTE_ACK","ts":1700000000123.7}"#).unwrap();
        assert_eq!(
            decoded,
            ProtocolMessage::MuteAck {
                timestamp: 1700000000123
            }
        );
    }

    #[test]
    fn test_chat_with_attachment() {
        let decoded =
            decode(br#"{"type":"CHAT","content":"eyes up","ts":9,"attachment":"map.png"}"#)
                .unwrap();
        assert_eq!(
            decoded,
            ProtocolMessage::Chat {
                content: "eyes up".into(),
                timestamp: 9,
                attachment: Some("map.png".into()),
            }
        );
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(decode(&[0xff, 0xfe]), Err(DecodeError::InvalidUtf8)));
        assert!(matches!(decode(b"{nope"), Err(DecodeError::InvalidJson(_))));
        assert!(matches!(decode(b"[1,2]"), Err(DecodeError::MissingType)));
        assert!(matches!(decode(br#"{"type":7}"#), Err(DecodeError::MissingType)));
        assert!(matches!(
            decode(br#"{"type":"FLARE","variant":"ORBITAL","loc":"x"}"#),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            decode(br#"{"type":"MUTE_ACK"}"#),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_stats() {
        let decoder = MessageDecoder::new();
        let _ = decoder.decode(br#"{"type":"MUTE_ALL"}"#);
        let _ = decoder.decode(br#"{"type":"CUSTOM"}"#);
        let _ = decoder.decode(b"garbage");

        let stats = decoder.stats();
        assert_eq!(stats.messages_decoded, 2);
        assert_eq!(stats.app_events, 1);
        assert_eq!(stats.messages_dropped, 1);
    }
}
