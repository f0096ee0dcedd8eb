//! Transport boundary and external collaborators
//!
//! The real-time media engine is consumed as a capability: anything that can
//! open a session, publish datagrams and metadata, gate the local microphone
//! and report remote tracks implements [`Transport`].

pub mod directory;
pub mod loopback;
pub mod token;

pub use directory::{DirectoryService, NetInfo, StaticDirectory};
pub use loopback::{LoopbackHub, LoopbackTransport};
pub use token::{Credential, HttpTokenService, StaticTokenService, TokenResponse, TokenService};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::audio::{AudioFrame, TrackSpec};
use crate::error::TransportError;
use crate::protocol::{ParticipantId, TrackId};

/// Inbound notifications from the transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A datagram from another participant
    DataReceived {
        from: Option<ParticipantId>,
        payload: Bytes,
        reliable: bool,
    },
    /// Raw metadata JSON published by a participant
    ParticipantMetadataChanged {
        participant_id: ParticipantId,
        metadata: String,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
    },
    TrackSubscribed(TrackSpec),
    TrackUnsubscribed {
        track_id: TrackId,
    },
    AudioFrame {
        track_id: TrackId,
        frame: AudioFrame,
    },
    /// Link quality of a remote participant, 0 (worst) ..= 1 (best)
    LinkQuality {
        participant_id: ParticipantId,
        quality: f32,
    },
    /// The session was lost underneath us
    Disconnected {
        reason: String,
    },
}

/// Media/data transport for one session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the session. Inbound events arrive on the returned receiver.
    async fn connect(
        &self,
        server_url: &str,
        token: &str,
        identity: &str,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Best-effort close; never fails
    fn disconnect(&self);

    async fn publish_data(&self, payload: Bytes, reliable: bool) -> Result<(), TransportError>;

    /// Replace the local participant's metadata
    async fn set_metadata(&self, metadata: &str) -> Result<(), TransportError>;

    /// Publish or mute the local microphone track
    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError>;
}
