//! Spatial pan/gain from 2D stage positions

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_STAGE_HEIGHT, DEFAULT_STAGE_WIDTH};
use crate::error::{Error, Result};
use crate::protocol::Position;

/// Stage bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageBounds {
    pub width: f64,
    pub height: f64,
}

impl Default for StageBounds {
    fn default() -> Self {
        Self {
            width: DEFAULT_STAGE_WIDTH,
            height: DEFAULT_STAGE_HEIGHT,
        }
    }
}

impl StageBounds {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        let bounds = Self { width, height };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Stage bounds must be positive, got {}x{}",
                self.width, self.height
            )))
        }
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }
}

/// Result of a mix computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mix {
    /// -1 (left) ..= 1 (right)
    pub pan: f64,
    /// 0 ..= 1
    pub gain: f64,
    pub distance: f64,
}

impl Mix {
    /// Rounded to 2 decimals for display and telemetry
    pub fn rounded(&self) -> Mix {
        let round2 = |v: f64| (v * 100.0).round() / 100.0;
        Mix {
            pan: round2(self.pan),
            gain: round2(self.gain),
            distance: round2(self.distance),
        }
    }
}

/// Computes pan and gain of a source relative to a listener
#[derive(Debug, Default)]
pub struct SpatialMixer {
    bounds: RwLock<StageBounds>,
}

impl SpatialMixer {
    pub fn new(bounds: StageBounds) -> Self {
        Self {
            bounds: RwLock::new(bounds),
        }
    }

    pub fn stage(&self) -> StageBounds {
        *self.bounds.read()
    }

    /// Replace the stage bounds
    pub fn set_stage(&self, width: f64, height: f64) -> Result<()> {
        let bounds = StageBounds::new(width, height)?;
        *self.bounds.write() = bounds;
        Ok(())
    }

    pub fn calculate_mix(&self, source: Position, listener: Position) -> Mix {
        let bounds = self.stage();
        let distance = source.distance_to(&listener);

        let pan = ((source.x - listener.x) / (bounds.width / 2.0)).clamp(-1.0, 1.0);
        let gain = (1.0 - distance / (0.5 * bounds.diagonal())).clamp(0.0, 1.0);

        Mix {
            pan: if pan.is_nan() { 0.0 } else { pan },
            gain: if gain.is_nan() { 0.0 } else { gain },
            distance,
        }
    }
}
