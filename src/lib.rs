//! # TacNet Voice
//!
//! Real-time voice coordination across logical channels ("nets"): session
//! lifecycle, per-participant audio processing, spatial mixing, role-gated
//! transmit permission and a small tactical messaging protocol.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                          TacticalCoordinator                          │
//! │   FLARE / MUTE_ALL / MUTE_ACK / CHAT / AppEvent      TacticalEvent ──▶│
//! │        │                │                │                            │
//! │        ▼                ▼                ▼                            │
//! │  ┌───────────┐   ┌─────────────┐   ┌──────────────┐   ┌────────────┐  │
//! │  │   Codec   │   │   Session   │   │ SpatialMixer │   │ SpeechSink │  │
//! │  │ JSON wire │   │ state/mic   │   │  pan, gain   │   │   alerts   │  │
//! │  └───────────┘   └──────┬──────┘   └──────┬───────┘   └────────────┘  │
//! │                         │                 │                           │
//! │                         ▼                 ▼                           │
//! │                  ┌──────────────────────────────────────────────┐     │
//! │                  │ AudioChain (one graph per remote track)      │     │
//! │                  │ comp → HP → LP → shaper → pan → gain → bus   │     │
//! │                  └──────────────────────────────────────────────┘     │
//! └─────────────────────────┬─────────────────────────────────────────────┘
//!                           │ Transport (reliable data, metadata, tracks)
//!                           ▼
//!                ┌─────────────────────┐   ┌──────────────────────┐
//!                │  Real-time engine   │   │ Token / Directory    │
//!                │  (or LoopbackHub)   │   │ services             │
//!                └─────────────────────┘   └──────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod roles;
pub mod session;
pub mod speech;
pub mod tactical;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default stage width in stage units
    pub const DEFAULT_STAGE_WIDTH: f64 = 960.0;

    /// Default stage height in stage units
    pub const DEFAULT_STAGE_HEIGHT: f64 = 640.0;

    /// Points in a generated distortion curve
    pub const DISTORTION_CURVE_SAMPLES: usize = 44100;

    /// Default high-pass cutoff
    pub const DEFAULT_HIGH_PASS_HZ: f32 = 400.0;

    /// Default low-pass cutoff
    pub const DEFAULT_LOW_PASS_HZ: f32 = 3500.0;

    /// Compressor threshold without the compression flag
    pub const COMPRESSOR_THRESHOLD_DB: f32 = -55.0;

    /// Compressor ratio without the compression flag
    pub const COMPRESSOR_RATIO: f32 = 8.0;

    /// Compressor threshold with the compression flag
    pub const COMPRESSOR_THRESHOLD_HEAVY_DB: f32 = -45.0;

    /// Compressor ratio with the compression flag
    pub const COMPRESSOR_RATIO_HEAVY: f32 = 12.0;

    /// Capacity of transport event queues
    pub const EVENT_CHANNEL_CAPACITY: usize = 512;

    /// Capacity of the tactical event broadcast
    pub const TACTICAL_EVENT_CAPACITY: usize = 64;

    /// Lock-free output bus capacity (in frames)
    pub const OUTPUT_BUFFER_FRAMES: usize = 256;
}
