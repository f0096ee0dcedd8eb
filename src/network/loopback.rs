//! In-process loopback transport
//!
//! A [`LoopbackHub`] is one net. Every [`LoopbackTransport`] connected to it
//! sees the others' datagrams, metadata, tracks and audio frames, the same
//! way a media server would fan them out. Used by tests and the drill binary.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{Transport, TransportEvent};
use crate::audio::{AudioFrame, TrackSpec};
use crate::constants::{DEFAULT_SAMPLE_RATE, EVENT_CHANNEL_CAPACITY};
use crate::error::TransportError;
use crate::protocol::ParticipantId;

struct Member {
    events: mpsc::Sender<TransportEvent>,
    metadata: Option<String>,
    track: Option<TrackSpec>,
    microphone_enabled: bool,
}

/// Shared routing state for one loopback net
#[derive(Default)]
pub struct LoopbackHub {
    members: DashMap<ParticipantId, Member>,
    reject_handshakes: AtomicBool,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following handshake fail
    pub fn set_reject_handshakes(&self, reject: bool) {
        self.reject_handshakes.store(reject, Ordering::SeqCst);
    }

    pub fn participants(&self) -> Vec<ParticipantId> {
        self.members.iter().map(|m| m.key().clone()).collect()
    }

    pub fn is_connected(&self, identity: &str) -> bool {
        self.members.contains_key(identity)
    }

    pub fn is_microphone_enabled(&self, identity: &str) -> bool {
        self.members
            .get(identity)
            .map(|m| m.microphone_enabled)
            .unwrap_or(false)
    }

    pub fn metadata_of(&self, identity: &str) -> Option<String> {
        self.members.get(identity).and_then(|m| m.metadata.clone())
    }

    /// Report link quality of `identity` to everyone else
    pub fn report_link_quality(&self, identity: &str, quality: f32) {
        self.broadcast(
            identity,
            TransportEvent::LinkQuality {
                participant_id: identity.to_string(),
                quality,
            },
        );
    }

    /// Drop a participant as if its network went away
    pub fn sever(&self, identity: &str, reason: &str) {
        if let Some((_, member)) = self.members.remove(identity) {
            let _ = member.events.try_send(TransportEvent::Disconnected {
                reason: reason.to_string(),
            });
            self.announce_departure(identity, member.track);
        }
    }

    fn broadcast(&self, from: &str, event: TransportEvent) {
        for member in self.members.iter().filter(|m| m.key() != from) {
            if member.events.try_send(event.clone()).is_err() {
                tracing::warn!(to = %member.key(), "Loopback event queue full, event dropped");
            }
        }
    }

    fn announce_departure(&self, identity: &str, track: Option<TrackSpec>) {
        if let Some(track) = track {
            self.broadcast(
                identity,
                TransportEvent::TrackUnsubscribed {
                    track_id: track.track_id,
                },
            );
        }
        self.broadcast(
            identity,
            TransportEvent::ParticipantLeft {
                participant_id: identity.to_string(),
            },
        );
    }
}

/// One participant's view of a [`LoopbackHub`]
pub struct LoopbackTransport {
    hub: Arc<LoopbackHub>,
    identity: Mutex<Option<ParticipantId>>,
    sequence: AtomicU32,
    sample_rate: u32,
    handshake_delay: Option<Duration>,
}

impl LoopbackTransport {
    pub fn new(hub: Arc<LoopbackHub>) -> Self {
        Self {
            hub,
            identity: Mutex::new(None),
            sequence: AtomicU32::new(0),
            sample_rate: DEFAULT_SAMPLE_RATE,
            handshake_delay: None,
        }
    }

    /// Sample rate advertised for the published microphone track
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Hold the handshake open after joining the hub, like a slow server ack
    pub fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = Some(delay);
        self
    }

    fn identity(&self) -> Result<ParticipantId, TransportError> {
        let identity = self.identity.lock().clone();
        match identity {
            Some(identity) if self.hub.members.contains_key(&identity) => Ok(identity),
            _ => Err(TransportError::NotConnected),
        }
    }

    /// Send one mono frame of microphone audio to the others
    pub fn push_audio(&self, samples: Vec<f32>) -> Result<(), TransportError> {
        let identity = self.identity()?;
        let track = match self.hub.members.get(&identity) {
            Some(member) if member.microphone_enabled => member.track.clone(),
            _ => None,
        };
        if let Some(track) = track {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
            self.hub.broadcast(
                &identity,
                TransportEvent::AudioFrame {
                    track_id: track.track_id,
                    frame: AudioFrame::mono(samples, sequence),
                },
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(
        &self,
        _server_url: &str,
        token: &str,
        identity: &str,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        if self.hub.reject_handshakes.load(Ordering::SeqCst) {
            return Err(TransportError::HandshakeFailed(
                "Loopback hub refused handshake".to_string(),
            ));
        }
        if token.is_empty() {
            return Err(TransportError::HandshakeFailed("Empty token".to_string()));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        // Existing state for the newcomer
        for member in self.hub.members.iter().filter(|m| m.key() != identity) {
            if let Some(metadata) = &member.metadata {
                let _ = tx.try_send(TransportEvent::ParticipantMetadataChanged {
                    participant_id: member.key().clone(),
                    metadata: metadata.clone(),
                });
            }
            if let Some(track) = &member.track {
                let _ = tx.try_send(TransportEvent::TrackSubscribed(track.clone()));
            }
        }

        let previous = self.hub.members.insert(
            identity.to_string(),
            Member {
                events: tx,
                metadata: None,
                track: None,
                microphone_enabled: false,
            },
        );
        if let Some(previous) = previous {
            let _ = previous.events.try_send(TransportEvent::Disconnected {
                reason: "Duplicate identity joined".to_string(),
            });
        }

        // The hub already counts us; the local side learns it after the ack
        if let Some(delay) = self.handshake_delay {
            tokio::time::sleep(delay).await;
        }

        *self.identity.lock() = Some(identity.to_string());
        tracing::debug!(identity, "Loopback participant joined");
        Ok(rx)
    }

    fn disconnect(&self) {
        let identity = self.identity.lock().take();
        if let Some(identity) = identity {
            if let Some((_, member)) = self.hub.members.remove(&identity) {
                self.hub.announce_departure(&identity, member.track);
                tracing::debug!(identity = %identity, "Loopback participant left");
            }
        }
    }

    async fn publish_data(&self, payload: Bytes, reliable: bool) -> Result<(), TransportError> {
        let identity = self.identity()?;
        self.hub.broadcast(
            &identity,
            TransportEvent::DataReceived {
                from: Some(identity.clone()),
                payload,
                reliable,
            },
        );
        Ok(())
    }

    async fn set_metadata(&self, metadata: &str) -> Result<(), TransportError> {
        let identity = self.identity()?;
        if let Some(mut member) = self.hub.members.get_mut(&identity) {
            member.metadata = Some(metadata.to_string());
        }
        self.hub.broadcast(
            &identity,
            TransportEvent::ParticipantMetadataChanged {
                participant_id: identity.clone(),
                metadata: metadata.to_string(),
            },
        );
        Ok(())
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        let identity = self.identity()?;
        let published = {
            let mut member = self
                .hub
                .members
                .get_mut(&identity)
                .ok_or(TransportError::NotConnected)?;
            member.microphone_enabled = enabled;
            if enabled && member.track.is_none() {
                let track = TrackSpec {
                    track_id: format!("TR_{}", uuid::Uuid::new_v4().simple()),
                    participant_id: identity.clone(),
                    sample_rate: self.sample_rate,
                    channels: 1,
                };
                member.track = Some(track.clone());
                Some(track)
            } else {
                None
            }
        };

        if let Some(track) = published {
            self.hub
                .broadcast(&identity, TransportEvent::TrackSubscribed(track));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn joined(hub: &Arc<LoopbackHub>, identity: &str) -> (LoopbackTransport, mpsc::Receiver<TransportEvent>) {
        let transport = LoopbackTransport::new(hub.clone());
        let rx = transport
            .connect("loopback://net", "token", identity)
            .await
            .unwrap();
        (transport, rx)
    }

    #[tokio::test]
    async fn test_data_fanout_excludes_sender() {
        let hub = LoopbackHub::new();
        let (alpha, mut alpha_rx) = joined(&hub, "alpha").await;
        let (_bravo, mut bravo_rx) = joined(&hub, "bravo").await;

        alpha
            .publish_data(Bytes::from_static(b"{}"), true)
            .await
            .unwrap();

        match bravo_rx.try_recv().unwrap() {
            TransportEvent::DataReceived { from, .. } => assert_eq!(from.as_deref(), Some("alpha")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(alpha_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_joiner_sees_existing_state() {
        let hub = LoopbackHub::new();
        let (alpha, _alpha_rx) = joined(&hub, "alpha").await;
        alpha.set_metadata(r#"{"role":"Scout"}"#).await.unwrap();
        alpha.set_microphone_enabled(true).await.unwrap();

        let (_bravo, mut bravo_rx) = joined(&hub, "bravo").await;
        assert!(matches!(
            bravo_rx.try_recv().unwrap(),
            TransportEvent::ParticipantMetadataChanged { .. }
        ));
        assert!(matches!(
            bravo_rx.try_recv().unwrap(),
            TransportEvent::TrackSubscribed(track) if track.participant_id == "alpha"
        ));
    }

    #[tokio::test]
    async fn test_audio_only_while_mic_open() {
        let hub = LoopbackHub::new();
        let (alpha, _alpha_rx) = joined(&hub, "alpha").await;
        let (_bravo, mut bravo_rx) = joined(&hub, "bravo").await;

        alpha.push_audio(vec![0.1; 8]).unwrap();
        assert!(bravo_rx.try_recv().is_err());

        alpha.set_microphone_enabled(true).await.unwrap();
        assert!(matches!(bravo_rx.try_recv().unwrap(), TransportEvent::TrackSubscribed(_)));
        alpha.push_audio(vec![0.1; 8]).unwrap();
        assert!(matches!(bravo_rx.try_recv().unwrap(), TransportEvent::AudioFrame { .. }));
        assert!(hub.is_microphone_enabled("alpha"));
    }

    #[tokio::test]
    async fn test_disconnect_announces_departure() {
        let hub = LoopbackHub::new();
        let (alpha, _alpha_rx) = joined(&hub, "alpha").await;
        let (_bravo, mut bravo_rx) = joined(&hub, "bravo").await;
        alpha.set_microphone_enabled(true).await.unwrap();
        let _ = bravo_rx.try_recv();

        alpha.disconnect();
        assert!(matches!(
            bravo_rx.try_recv().unwrap(),
            TransportEvent::TrackUnsubscribed { .. }
        ));
        assert!(matches!(
            bravo_rx.try_recv().unwrap(),
            TransportEvent::ParticipantLeft { .. }
        ));
        assert!(matches!(
            alpha.publish_data(Bytes::new(), true).await,
            Err(TransportError::NotConnected)
        ));
        // second disconnect is harmless
        alpha.disconnect();
    }

    #[tokio::test]
    async fn test_track_advertises_sample_rate() {
        let hub = LoopbackHub::new();
        let alpha = LoopbackTransport::new(hub.clone()).with_sample_rate(16_000);
        let _alpha_rx = alpha.connect("loopback://net", "token", "alpha").await.unwrap();
        let (_bravo, mut bravo_rx) = joined(&hub, "bravo").await;

        alpha.set_microphone_enabled(true).await.unwrap();
        match bravo_rx.try_recv().unwrap() {
            TransportEvent::TrackSubscribed(track) => assert_eq!(track.sample_rate, 16_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let hub = LoopbackHub::new();
        hub.set_reject_handshakes(true);
        let transport = LoopbackTransport::new(hub.clone());
        assert!(matches!(
            transport.connect("loopback://net", "token", "alpha").await,
            Err(TransportError::HandshakeFailed(_))
        ));
        assert!(!hub.is_connected("alpha"));
    }

    #[tokio::test]
    async fn test_sever_notifies_member() {
        let hub = LoopbackHub::new();
        let (_alpha, mut alpha_rx) = joined(&hub, "alpha").await;
        hub.sever("alpha", "link down");
        assert!(matches!(
            alpha_rx.try_recv().unwrap(),
            TransportEvent::Disconnected { reason } if reason == "link down"
        ));
        assert!(!hub.is_connected("alpha"));
    }
}
