//! Domain events for the presentation layer

use serde_json::{Map, Value};

use crate::audio::Mix;
use crate::protocol::{FlareVariant, ParticipantId, TrackId};

/// Something the operator should see or hear.
///
/// `from`/`by` is `None` when the event originated locally.
#[derive(Debug, Clone, PartialEq)]
pub enum TacticalEvent {
    Flare {
        from: Option<ParticipantId>,
        variant: FlareVariant,
        location: String,
    },
    MuteOverrideEngaged {
        by: Option<ParticipantId>,
    },
    MuteOverrideCleared {
        by: Option<ParticipantId>,
    },
    Chat {
        from: Option<ParticipantId>,
        content: String,
        timestamp: i64,
        attachment: Option<String>,
    },
    AppEvent {
        from: Option<ParticipantId>,
        kind: String,
        payload: Map<String, Value>,
    },
    /// Pan/gain of a remote track changed; values rounded for display
    MixChanged {
        track_id: TrackId,
        participant_id: ParticipantId,
        mix: Mix,
    },
    /// Connect failed or the transport dropped; retry with a fresh connect
    SignalLost {
        reason: String,
    },
}
