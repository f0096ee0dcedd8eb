//! Tactical coordinator
//!
//! Turns transport events into domain behavior: decodes side-channel
//! messages, runs the priority-mute and flare protocols, builds an audio
//! chain per remote track and keeps the spatial mix current.
//!
//! Priority mute:
//!
//! ```text
//! Command ── MUTE_ALL ──▶ everyone: override on, mic forced closed, alert
//! Pioneer+ ── MUTE_ACK ─▶ everyone: override off, mic may reopen
//! ```
//!
//! A repeated MUTE_ALL only re-closes a reopened microphone; the alert plays
//! once. An ack that arrives before its sender's metadata is held until the
//! role is known.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::events::TacticalEvent;
use crate::audio::{SpatialMixer, StageBounds};
use crate::codec::decoder::{DecoderStats, MessageDecoder};
use crate::error::Result;
use crate::network::TransportEvent;
use crate::protocol::{FlareVariant, ParticipantId, ParticipantMetadata, Position, ProtocolMessage};
use crate::roles::TacticalAction;
use crate::session::Session;
use crate::speech::SpeechSink;

pub struct TacticalCoordinator {
    session: Arc<Session>,
    speech: Arc<dyn SpeechSink>,
    mixer: SpatialMixer,
    decoder: MessageDecoder,
    remotes: DashMap<ParticipantId, ParticipantMetadata>,
    /// MUTE_ACKs from senders whose role is not known yet
    pending_acks: DashMap<ParticipantId, i64>,
    /// Session epoch the registries belong to
    epoch: AtomicU64,
}

impl TacticalCoordinator {
    pub fn new(session: Arc<Session>, speech: Arc<dyn SpeechSink>, stage: StageBounds) -> Self {
        let epoch = AtomicU64::new(session.epoch());
        Self {
            session,
            speech,
            mixer: SpatialMixer::new(stage),
            decoder: MessageDecoder::new(),
            remotes: DashMap::new(),
            pending_acks: DashMap::new(),
            epoch,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn mixer(&self) -> &SpatialMixer {
        &self.mixer
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Last metadata seen from a remote participant
    pub fn remote(&self, participant_id: &str) -> Option<ParticipantMetadata> {
        self.remotes.get(participant_id).map(|entry| entry.clone())
    }

    /// Dispatch transport events until the stream closes
    pub async fn run(&self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("Transport event stream closed");
    }

    /// Handle one transport event. Never fails; problems are logged.
    pub async fn handle_event(&self, event: TransportEvent) {
        self.sync_epoch();
        match event {
            TransportEvent::DataReceived { from, payload, .. } => {
                match self.decoder.decode(&payload) {
                    Ok(message) => self.handle_message(from, message).await,
                    Err(e) => {
                        tracing::warn!(from = ?from, error = %e, "Dropping undecodable message");
                    }
                }
            }
            TransportEvent::ParticipantMetadataChanged {
                participant_id,
                metadata,
            } => self.update_remote(participant_id, &metadata),
            TransportEvent::ParticipantLeft { participant_id } => {
                self.remotes.remove(&participant_id);
                self.pending_acks.remove(&participant_id);
                let chain = self.session.audio_chain();
                for track_id in chain.tracks_for_participant(&participant_id) {
                    chain.stop_processing(&track_id);
                }
                tracing::info!(participant = %participant_id, "Participant left");
            }
            TransportEvent::TrackSubscribed(track) => {
                let remote = self.remote(&track.participant_id);
                let profile = self
                    .session
                    .profiles()
                    .for_role(remote.as_ref().map(|m| m.role.as_str()));
                let position = remote.as_ref().and_then(|m| m.position());

                match self
                    .session
                    .audio_chain()
                    .process_remote_track(&track, profile, position)
                {
                    Ok(true) => self.remix_track(&track.track_id, &track.participant_id),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(track_id = %track.track_id, error = %e, "Track dropped");
                    }
                }
            }
            TransportEvent::TrackUnsubscribed { track_id } => {
                self.session.audio_chain().stop_processing(&track_id);
            }
            TransportEvent::AudioFrame { track_id, frame } => {
                if let Err(e) = self.session.audio_chain().process_frame(&track_id, &frame) {
                    tracing::trace!(track_id = %track_id, error = %e, "Frame not processed");
                }
            }
            TransportEvent::LinkQuality {
                participant_id,
                quality,
            } => {
                let chain = self.session.audio_chain();
                for track_id in chain.tracks_for_participant(&participant_id) {
                    if let Err(e) = chain.update_distortion(&track_id, quality) {
                        tracing::debug!(track_id = %track_id, error = %e, "Distortion not updated");
                    }
                }
            }
            TransportEvent::Disconnected { reason } => {
                self.session.signal_lost(&reason);
                self.reset_remotes();
            }
        }
    }

    async fn handle_message(&self, from: Option<ParticipantId>, message: ProtocolMessage) {
        match message {
            ProtocolMessage::Flare { variant, location } => {
                tracing::info!(from = ?from, %variant, location = %location, "Flare received");
                self.speech
                    .speak(&format!("{} flare at {}", flare_word(variant), location));
                self.session.emit(TacticalEvent::Flare {
                    from,
                    variant,
                    location,
                });
            }
            ProtocolMessage::MuteAll => match self.session.apply_mute_override().await {
                Ok(true) => {
                    // Acks held from before this override do not lift it
                    self.pending_acks.clear();
                    tracing::info!(from = ?from, "Priority mute engaged");
                    self.speech.speak("Priority mute. Stand by for command.");
                    self.session
                        .emit(TacticalEvent::MuteOverrideEngaged { by: from });
                }
                Ok(false) => tracing::debug!(from = ?from, "Priority mute already engaged"),
                Err(e) => tracing::warn!(error = %e, "Failed to force microphone closed"),
            },
            ProtocolMessage::MuteAck { timestamp } => {
                let Some(sender) = from else {
                    tracing::warn!("Ignoring MUTE_ACK with no sender");
                    return;
                };
                let role = self.remotes.get(&sender).map(|meta| meta.role.clone());
                match role {
                    Some(role) if self.session.policy().can_acknowledge(&role) => {
                        self.lift_override(sender, timestamp)
                    }
                    Some(role) => {
                        tracing::warn!(from = %sender, role = %role, "Ignoring MUTE_ACK from unqualified sender");
                    }
                    None if self.session.mute_override().active => {
                        tracing::debug!(from = %sender, "Holding MUTE_ACK until sender metadata arrives");
                        self.pending_acks.insert(sender, timestamp);
                    }
                    None => tracing::debug!(from = %sender, "Ignoring MUTE_ACK from unknown sender"),
                }
            }
            ProtocolMessage::Chat {
                content,
                timestamp,
                attachment,
            } => self.session.emit(TacticalEvent::Chat {
                from,
                content,
                timestamp,
                attachment,
            }),
            ProtocolMessage::AppEvent { kind, payload } => {
                tracing::debug!(from = ?from, kind = %kind, "Application event");
                self.session
                    .emit(TacticalEvent::AppEvent { from, kind, payload });
            }
        }
    }

    fn lift_override(&self, sender: ParticipantId, timestamp: i64) {
        if self.session.clear_mute_override() {
            tracing::info!(from = %sender, timestamp, "Priority mute lifted");
            self.speech.speak("Priority mute lifted.");
            self.session.emit(TacticalEvent::MuteOverrideCleared {
                by: Some(sender),
            });
        }
    }

    /// Drop per-connection registries when the session reconnected or dropped
    fn sync_epoch(&self) {
        let current = self.session.epoch();
        if self.epoch.swap(current, Ordering::SeqCst) != current {
            tracing::debug!(epoch = current, "Session changed, resetting remote registry");
            self.reset_remotes();
        }
    }

    fn reset_remotes(&self) {
        self.remotes.clear();
        self.pending_acks.clear();
    }

    fn update_remote(&self, participant_id: ParticipantId, raw: &str) {
        let Some(metadata) = ParticipantMetadata::from_json(raw) else {
            tracing::warn!(participant = %participant_id, "Ignoring malformed metadata");
            return;
        };
        tracing::debug!(participant = %participant_id, role = %metadata.role, "Metadata updated");
        let qualified = self.session.policy().can_acknowledge(&metadata.role);
        self.remotes.insert(participant_id.clone(), metadata);
        if let Some((sender, timestamp)) = self.pending_acks.remove(&participant_id) {
            if qualified {
                self.lift_override(sender, timestamp);
            } else {
                tracing::warn!(from = %sender, "Dropping held MUTE_ACK from unqualified sender");
            }
        }
        for track_id in self
            .session
            .audio_chain()
            .tracks_for_participant(&participant_id)
        {
            self.remix_track(&track_id, &participant_id);
        }
    }

    /// Recompute pan/gain of one track from the current positions
    fn remix_track(&self, track_id: &str, participant_id: &str) {
        let source = self.remote(participant_id).and_then(|m| m.position());
        let (Some(source), Some(listener)) = (source, self.session.position()) else {
            return;
        };
        let mix = self.mixer.calculate_mix(source, listener);
        let chain = self.session.audio_chain();
        chain.set_position(track_id, Some(source));
        if chain
            .update_pan_and_gain(track_id, mix.pan as f32, mix.gain as f32)
            .is_ok()
        {
            self.session.emit(TacticalEvent::MixChanged {
                track_id: track_id.to_string(),
                participant_id: participant_id.to_string(),
                mix: mix.rounded(),
            });
        }
    }

    fn remix_all(&self) {
        let chain = self.session.audio_chain();
        for track_id in chain.track_ids() {
            if let Some(info) = chain.channel_info(&track_id) {
                self.remix_track(&track_id, &info.participant_id);
            }
        }
    }

    /// Whether `role` may send `action` on the current net
    pub fn can_transmit_tactical(&self, role: &str, action: TacticalAction) -> bool {
        self.session.can_transmit_tactical(role, action)
    }

    pub async fn publish_flare(&self, variant: FlareVariant, location: &str) -> Result<()> {
        self.session.check_tactical(TacticalAction::Flare)?;
        self.session
            .publish_message(&ProtocolMessage::flare(variant, location))
            .await?;
        tracing::info!(%variant, location, "Flare sent");
        Ok(())
    }

    /// Broadcast `MUTE_ALL`. The sender keeps its microphone.
    pub async fn publish_mute_all(&self) -> Result<()> {
        self.session.check_tactical(TacticalAction::MuteAll)?;
        self.session.broadcast_mute_all().await?;
        Ok(())
    }

    /// Broadcast `MUTE_ACK` and lift the local override
    pub async fn publish_ack(&self) -> Result<()> {
        self.session.check_tactical(TacticalAction::MuteAck)?;
        self.session
            .publish_message(&ProtocolMessage::mute_ack_now())
            .await?;
        if self.session.clear_mute_override() {
            tracing::info!("Priority mute lifted locally");
            self.session
                .emit(TacticalEvent::MuteOverrideCleared { by: None });
        }
        Ok(())
    }

    pub async fn publish_chat(&self, content: &str, attachment: Option<String>) -> Result<()> {
        self.session
            .publish_message(&ProtocolMessage::chat(content, attachment))
            .await
    }

    pub async fn publish_data(&self, payload: Bytes, reliable: bool) -> Result<()> {
        self.session.publish_data(payload, reliable).await
    }

    /// Move the local participant and remix every channel
    pub async fn set_position(&self, position: Position) -> Result<()> {
        self.session.set_position(position).await?;
        self.remix_all();
        Ok(())
    }

    /// Replace the stage bounds and remix every channel
    pub fn set_stage(&self, width: f64, height: f64) -> Result<()> {
        self.mixer.set_stage(width, height)?;
        self.remix_all();
        Ok(())
    }
}

fn flare_word(variant: FlareVariant) -> &'static str {
    match variant {
        FlareVariant::Combat => "Combat",
        FlareVariant::Medical => "Medical",
    }
}
