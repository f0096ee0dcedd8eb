//! Audio subsystem module

pub mod buffer;
pub mod chain;
pub mod dsp;
pub mod profile;
pub mod spatial;

pub use buffer::{create_output_bus, AudioFrame, OutputBus, OutputFrame, SharedOutputBus};
pub use chain::{AudioChain, AudioGraph, ChainBuilder, ChannelInfo, Stage, StageKind, TrackSpec};
pub use profile::{ProfileTable, RoleAudioProfile};
pub use spatial::{Mix, SpatialMixer, StageBounds};
