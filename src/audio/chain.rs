//! Per-track processing chains
//!
//! Every subscribed remote audio track gets exactly one
//! [`ParticipantAudioChannel`] holding a compiled [`AudioGraph`]:
//!
//! ```text
//! source → compressor → high-pass → low-pass → distortion → panner → gain → output bus
//! ```
//!
//! The stage order is fixed by [`ChainBuilder`]; live updates only touch
//! stage parameters, never the topology.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::buffer::{AudioFrame, OutputFrame, SharedOutputBus};
use super::dsp::{pan_block, Biquad, Compressor, FilterKind, WaveShaper};
use super::profile::RoleAudioProfile;
use crate::error::AudioError;
use crate::protocol::{ParticipantId, Position, TrackId};

/// Description of a remote audio track as announced by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    pub track_id: TrackId,
    pub participant_id: ParticipantId,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Stage identity, used to inspect topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Compressor,
    HighPass,
    LowPass,
    Distortion,
    Panner,
    Gain,
}

/// One processing stage with its live state
#[derive(Debug, Clone)]
pub enum Stage {
    Compressor(Compressor),
    HighPass(Biquad),
    LowPass(Biquad),
    Distortion(WaveShaper),
    Panner { pan: f32 },
    Gain { gain: f32 },
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Compressor(_) => StageKind::Compressor,
            Stage::HighPass(_) => StageKind::HighPass,
            Stage::LowPass(_) => StageKind::LowPass,
            Stage::Distortion(_) => StageKind::Distortion,
            Stage::Panner { .. } => StageKind::Panner,
            Stage::Gain { .. } => StageKind::Gain,
        }
    }
}

/// Builds the fixed stage list for a profile
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    sample_rate: u32,
    profile: RoleAudioProfile,
    pan: f32,
    gain: f32,
}

impl ChainBuilder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            profile: RoleAudioProfile::default(),
            pan: 0.0,
            gain: 1.0,
        }
    }

    pub fn profile(mut self, profile: RoleAudioProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn pan(mut self, pan: f32) -> Self {
        self.pan = pan.clamp(-1.0, 1.0);
        self
    }

    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = gain.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> AudioGraph {
        let (threshold_db, ratio) = self.profile.compressor_settings();
        let stages = vec![
            Stage::Compressor(Compressor::new(threshold_db, ratio, self.sample_rate)),
            Stage::HighPass(Biquad::new(
                FilterKind::HighPass,
                self.profile.high_pass_hz,
                self.sample_rate,
            )),
            Stage::LowPass(Biquad::new(
                FilterKind::LowPass,
                self.profile.low_pass_hz,
                self.sample_rate,
            )),
            Stage::Distortion(WaveShaper::new(self.profile.distortion_amount)),
            Stage::Panner { pan: self.pan },
            Stage::Gain { gain: self.gain },
        ];
        AudioGraph { stages }
    }
}

/// Ordered, fixed-topology stage list
#[derive(Debug, Clone)]
pub struct AudioGraph {
    stages: Vec<Stage>,
}

impl AudioGraph {
    pub fn topology(&self) -> Vec<StageKind> {
        self.stages.iter().map(Stage::kind).collect()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn distortion_amount(&self) -> Option<f32> {
        self.stages.iter().find_map(|stage| match stage {
            Stage::Distortion(shaper) => Some(shaper.amount()),
            _ => None,
        })
    }

    pub fn pan(&self) -> Option<f32> {
        self.stages.iter().find_map(|stage| match stage {
            Stage::Panner { pan } => Some(*pan),
            _ => None,
        })
    }

    pub fn gain(&self) -> Option<f32> {
        self.stages.iter().find_map(|stage| match stage {
            Stage::Gain { gain } => Some(*gain),
            _ => None,
        })
    }

    pub fn set_distortion(&mut self, amount: f32) {
        for stage in &mut self.stages {
            if let Stage::Distortion(shaper) = stage {
                shaper.set_amount(amount);
            }
        }
    }

    pub fn set_pan_and_gain(&mut self, pan: f32, gain: f32) {
        for stage in &mut self.stages {
            match stage {
                Stage::Panner { pan: current } => *current = pan.clamp(-1.0, 1.0),
                Stage::Gain { gain: current } => *current = gain.clamp(0.0, 1.0),
                _ => {}
            }
        }
    }

    /// Run one frame through every stage; output is interleaved stereo
    pub fn process(&mut self, input: &AudioFrame) -> AudioFrame {
        let mut mono = input.downmix();
        let mut stereo: Option<Vec<f32>> = None;

        for stage in &mut self.stages {
            match stage {
                Stage::Compressor(compressor) => compressor.process_block(&mut mono),
                Stage::HighPass(filter) | Stage::LowPass(filter) => filter.process_block(&mut mono),
                Stage::Distortion(shaper) => shaper.process_block(&mut mono),
                Stage::Panner { pan } => stereo = Some(pan_block(&mono, *pan)),
                Stage::Gain { gain } => {
                    let block = stereo.as_mut().unwrap_or(&mut mono);
                    for sample in block.iter_mut() {
                        *sample *= *gain;
                    }
                }
            }
        }

        let samples = stereo.unwrap_or_else(|| pan_block(&mono, 0.0));
        AudioFrame::new(samples, 2, input.sequence)
    }
}

/// Processing state for one remote track
#[derive(Debug)]
pub struct ParticipantAudioChannel {
    pub track_id: TrackId,
    pub participant_id: ParticipantId,
    pub position: Option<Position>,
    pub profile: RoleAudioProfile,
    graph: AudioGraph,
    frames_processed: u64,
}

impl ParticipantAudioChannel {
    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

/// Read-only view of a channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub track_id: TrackId,
    pub participant_id: ParticipantId,
    pub position: Option<Position>,
    pub profile: RoleAudioProfile,
    pub topology: Vec<StageKind>,
    pub pan: f32,
    pub gain: f32,
    pub distortion_amount: f32,
    pub frames_processed: u64,
}

/// Owner of every [`ParticipantAudioChannel`], keyed by track id
pub struct AudioChain {
    channels: DashMap<TrackId, ParticipantAudioChannel>,
    output: SharedOutputBus,
    frames_dropped: AtomicU64,
}

impl AudioChain {
    pub fn new(output: SharedOutputBus) -> Self {
        Self {
            channels: DashMap::new(),
            output,
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Build a channel for a remote track.
    ///
    /// Returns `Ok(false)` if the track already has a channel.
    pub fn process_remote_track(
        &self,
        track: &TrackSpec,
        profile: RoleAudioProfile,
        position: Option<Position>,
    ) -> Result<bool, AudioError> {
        if track.channels == 0 || track.channels > 2 {
            return Err(AudioError::UnsupportedTrack {
                track_id: track.track_id.clone(),
                reason: format!("Unsupported channel count: {}", track.channels),
            });
        }
        if track.sample_rate == 0 {
            return Err(AudioError::UnsupportedTrack {
                track_id: track.track_id.clone(),
                reason: "Sample rate is zero".to_string(),
            });
        }

        match self.channels.entry(track.track_id.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(track_id = %track.track_id, "Track already has a chain");
                Ok(false)
            }
            Entry::Vacant(slot) => {
                let graph = ChainBuilder::new(track.sample_rate).profile(profile).build();
                slot.insert(ParticipantAudioChannel {
                    track_id: track.track_id.clone(),
                    participant_id: track.participant_id.clone(),
                    position,
                    profile,
                    graph,
                    frames_processed: 0,
                });
                tracing::info!(
                    track_id = %track.track_id,
                    participant = %track.participant_id,
                    "Audio chain created"
                );
                Ok(true)
            }
        }
    }

    /// Map link quality 0..=1 to distortion amount (1 - quality) * 100
    pub fn update_distortion(&self, track_id: &str, quality: f32) -> Result<(), AudioError> {
        let mut channel = self
            .channels
            .get_mut(track_id)
            .ok_or_else(|| AudioError::TrackNotFound(track_id.to_string()))?;
        let amount = (1.0 - quality.clamp(0.0, 1.0)) * 100.0;
        channel.graph.set_distortion(amount);
        Ok(())
    }

    pub fn update_pan_and_gain(&self, track_id: &str, pan: f32, gain: f32) -> Result<(), AudioError> {
        let mut channel = self
            .channels
            .get_mut(track_id)
            .ok_or_else(|| AudioError::TrackNotFound(track_id.to_string()))?;
        channel.graph.set_pan_and_gain(pan, gain);
        Ok(())
    }

    pub fn set_position(&self, track_id: &str, position: Option<Position>) {
        if let Some(mut channel) = self.channels.get_mut(track_id) {
            channel.position = position;
        }
    }

    /// Tear down a channel. Returns false if there was nothing to stop
    pub fn stop_processing(&self, track_id: &str) -> bool {
        let removed = self.channels.remove(track_id).is_some();
        if removed {
            tracing::info!(track_id = %track_id, "Audio chain stopped");
        }
        removed
    }

    /// Release every channel
    pub fn clear(&self) {
        let count = self.channels.len();
        self.channels.clear();
        if count > 0 {
            tracing::info!(count, "Released all audio chains");
        }
    }

    /// Process one frame of a track and queue the result on the output bus.
    /// A full bus drops the frame and reports [`AudioError::BufferOverflow`].
    pub fn process_frame(&self, track_id: &str, frame: &AudioFrame) -> Result<(), AudioError> {
        if frame.channels == 0 || frame.samples.len() % frame.channels as usize != 0 {
            return Err(AudioError::InvalidFrame(format!(
                "{} samples over {} channels",
                frame.samples.len(),
                frame.channels
            )));
        }

        let output = {
            let mut channel = self
                .channels
                .get_mut(track_id)
                .ok_or_else(|| AudioError::TrackNotFound(track_id.to_string()))?;
            let processed = channel.graph.process(frame);
            channel.frames_processed += 1;
            OutputFrame {
                track_id: channel.track_id.clone(),
                participant_id: channel.participant_id.clone(),
                frame: processed,
            }
        };

        if !self.output.push(output) {
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
            return Err(AudioError::BufferOverflow);
        }
        Ok(())
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.channels.contains_key(track_id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn tracks_for_participant(&self, participant_id: &str) -> Vec<TrackId> {
        self.channels
            .iter()
            .filter(|entry| entry.participant_id == participant_id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn channel_info(&self, track_id: &str) -> Option<ChannelInfo> {
        self.channels.get(track_id).map(|channel| ChannelInfo {
            track_id: channel.track_id.clone(),
            participant_id: channel.participant_id.clone(),
            position: channel.position,
            profile: channel.profile,
            topology: channel.graph.topology(),
            pan: channel.graph.pan().unwrap_or(0.0),
            gain: channel.graph.gain().unwrap_or(1.0),
            distortion_amount: channel.graph.distortion_amount().unwrap_or(0.0),
            frames_processed: channel.frames_processed,
        })
    }

    pub fn output(&self) -> &SharedOutputBus {
        &self.output
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::create_output_bus;

    fn track(id: &str) -> TrackSpec {
        TrackSpec {
            track_id: id.to_string(),
            participant_id: "bravo".to_string(),
            sample_rate: 48_000,
            channels: 1,
        }
    }

    fn chain() -> AudioChain {
        AudioChain::new(create_output_bus(16))
    }

    #[test]
    fn test_topology_order() {
        let graph = ChainBuilder::new(48_000).build();
        assert_eq!(
            graph.topology(),
            vec![
                StageKind::Compressor,
                StageKind::HighPass,
                StageKind::LowPass,
                StageKind::Distortion,
                StageKind::Panner,
                StageKind::Gain,
            ]
        );
    }

    #[test]
    fn test_builder_uses_profile() {
        let profile = RoleAudioProfile::new(40.0, 250.0, 3000.0, true);
        let graph = ChainBuilder::new(48_000).profile(profile).build();
        match &graph.stages()[0] {
            Stage::Compressor(c) => {
                assert_eq!(c.threshold_db(), -45.0);
                assert_eq!(c.ratio(), 12.0);
            }
            other => panic!("unexpected first stage {:?}", other.kind()),
        }
        match &graph.stages()[1] {
            Stage::HighPass(f) => assert_eq!(f.cutoff_hz(), 250.0),
            other => panic!("unexpected second stage {:?}", other.kind()),
        }
        assert_eq!(graph.distortion_amount(), Some(40.0));
    }

    #[test]
    fn test_duplicate_registration_is_noop() {
        let chain = chain();
        assert!(chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap());
        assert!(!chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_unsupported_track_rejected() {
        let chain = chain();
        let mut bad = track("TR_BAD");
        bad.channels = 6;
        assert!(matches!(
            chain.process_remote_track(&bad, RoleAudioProfile::default(), None),
            Err(AudioError::UnsupportedTrack { .. })
        ));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let chain = chain();
        chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap();
        assert!(chain.stop_processing("TR_A"));
        assert!(!chain.stop_processing("TR_A"));
        assert!(!chain.contains("TR_A"));
    }

    #[test]
    fn test_quality_maps_to_distortion() {
        let chain = chain();
        chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap();
        chain.update_distortion("TR_A", 0.25).unwrap();
        assert_eq!(chain.channel_info("TR_A").unwrap().distortion_amount, 75.0);
        assert!(chain.update_distortion("TR_MISSING", 0.5).is_err());
    }

    #[test]
    fn test_live_pan_and_gain() {
        let chain = chain();
        chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap();
        chain.update_pan_and_gain("TR_A", -0.5, 0.25).unwrap();
        let info = chain.channel_info("TR_A").unwrap();
        assert_eq!(info.pan, -0.5);
        assert_eq!(info.gain, 0.25);
        assert_eq!(info.topology.len(), 6);
    }

    #[test]
    fn test_process_frame_outputs_stereo() {
        let chain = chain();
        chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap();
        chain.update_pan_and_gain("TR_A", -1.0, 1.0).unwrap();

        let input: Vec<f32> = (0..480).map(|i| (i as f32 * 0.2).sin() * 0.3).collect();
        chain
            .process_frame("TR_A", &AudioFrame::mono(input, 7))
            .unwrap();

        let out = chain.output().pop().unwrap();
        assert_eq!(out.track_id, "TR_A");
        assert_eq!(out.frame.channels, 2);
        assert_eq!(out.frame.samples.len(), 960);
        assert_eq!(out.frame.sequence, 7);
        // hard left: right channel silent
        assert!(out.frame.samples.iter().skip(1).step_by(2).all(|s| s.abs() < 1e-6));
        assert_eq!(chain.channel_info("TR_A").unwrap().frames_processed, 1);
    }

    #[test]
    fn test_process_frame_unknown_track() {
        let chain = chain();
        assert!(matches!(
            chain.process_frame("TR_NONE", &AudioFrame::mono(vec![0.0; 4], 0)),
            Err(AudioError::TrackNotFound(_))
        ));
        assert!(matches!(
            chain.process_frame("TR_NONE", &AudioFrame::new(vec![0.0; 3], 2, 0)),
            Err(AudioError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_full_output_bus_drops_frame() {
        let chain = AudioChain::new(create_output_bus(1));
        chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap();
        let frame = AudioFrame::mono(vec![0.1; 48], 0);

        chain.process_frame("TR_A", &frame).unwrap();
        assert!(matches!(
            chain.process_frame("TR_A", &frame),
            Err(AudioError::BufferOverflow)
        ));
        assert_eq!(chain.frames_dropped(), 1);
        assert_eq!(chain.output().len(), 1);
        assert_eq!(chain.channel_info("TR_A").unwrap().frames_processed, 2);
    }

    #[test]
    fn test_clear_and_participant_lookup() {
        let chain = chain();
        chain
            .process_remote_track(&track("TR_A"), RoleAudioProfile::default(), None)
            .unwrap();
        chain
            .process_remote_track(&track("TR_B"), RoleAudioProfile::default(), None)
            .unwrap();
        let mut tracks = chain.tracks_for_participant("bravo");
        tracks.sort();
        assert_eq!(tracks, vec!["TR_A".to_string(), "TR_B".to_string()]);

        chain.clear();
        assert!(chain.is_empty());
    }
}
