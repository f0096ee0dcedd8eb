//! Signal-processing primitives used by the audio chain
//!
//! All processors run on mono blocks except the panner, which turns a mono
//! block into interleaved stereo.

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use crate::constants::DISTORTION_CURVE_SAMPLES;

/// Transfer function of the distortion curve at input `x` for `amount` 0..=100
pub fn distortion_transfer(x: f64, amount: f64) -> f64 {
    let deg = std::f64::consts::PI / 180.0;
    (3.0 + amount) * x * 20.0 * deg / (std::f64::consts::PI + amount * x.abs())
}

/// Sample the transfer function over x in [-1, 1]
pub fn make_distortion_curve(amount: f32, samples: usize) -> Arc<[f32]> {
    let amount = amount.clamp(0.0, 100.0) as f64;
    let last = samples.saturating_sub(1).max(1) as f64;
    (0..samples)
        .map(|i| {
            let x = i as f64 * 2.0 / last - 1.0;
            distortion_transfer(x, amount) as f32
        })
        .collect()
}

/// Table wave-shaper with linear interpolation
#[derive(Debug, Clone)]
pub struct WaveShaper {
    amount: f32,
    curve: Arc<[f32]>,
}

impl WaveShaper {
    pub fn new(amount: f32) -> Self {
        let amount = amount.clamp(0.0, 100.0);
        Self {
            amount,
            curve: make_distortion_curve(amount, DISTORTION_CURVE_SAMPLES),
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn curve(&self) -> &[f32] {
        &self.curve
    }

    /// Regenerate the curve in place
    pub fn set_amount(&mut self, amount: f32) {
        *self = Self::new(amount);
    }

    pub fn shape(&self, x: f32) -> f32 {
        let n = self.curve.len();
        if n == 0 {
            return x;
        }
        let v = (n - 1) as f32 * 0.5 * (x + 1.0);
        if v <= 0.0 {
            return self.curve[0];
        }
        if v >= (n - 1) as f32 {
            return self.curve[n - 1];
        }
        let index = v.floor() as usize;
        let frac = v - index as f32;
        self.curve[index] + (self.curve[index + 1] - self.curve[index]) * frac
    }

    pub fn process_block(&self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.shape(*sample);
        }
    }
}

/// Filter response of a [`Biquad`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    HighPass,
    LowPass,
}

/// Second-order IIR section (RBJ cookbook, transposed direct form II)
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: FilterKind,
    cutoff_hz: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// Butterworth Q
    pub const Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

    pub fn new(kind: FilterKind, cutoff_hz: f32, sample_rate: u32) -> Self {
        let nyquist_guard = sample_rate as f32 * 0.49;
        let cutoff_hz = cutoff_hz.clamp(1.0, nyquist_guard.max(1.0));
        let w0 = 2.0 * PI * cutoff_hz / sample_rate.max(1) as f32;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * Self::Q);

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            FilterKind::HighPass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        };
        let a0 = 1.0 + alpha;

        Self {
            kind,
            cutoff_hz,
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// Feed-forward peak compressor with a soft knee
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current gain reduction in dB (<= 0)
    reduction_db: f32,
}

impl Compressor {
    pub const KNEE_DB: f32 = 30.0;
    pub const ATTACK_SECS: f32 = 0.003;
    pub const RELEASE_SECS: f32 = 0.25;

    pub fn new(threshold_db: f32, ratio: f32, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        Self {
            threshold_db,
            ratio: ratio.max(1.0),
            knee_db: Self::KNEE_DB,
            attack_coeff: (-1.0 / (Self::ATTACK_SECS * sr)).exp(),
            release_coeff: (-1.0 / (Self::RELEASE_SECS * sr)).exp(),
            reduction_db: 0.0,
        }
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Static curve: gain change in dB for an input level in dB
    pub fn static_reduction_db(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        let slope = 1.0 / self.ratio - 1.0;
        if 2.0 * over < -self.knee_db {
            0.0
        } else if 2.0 * over.abs() <= self.knee_db {
            slope * (over + self.knee_db / 2.0).powi(2) / (2.0 * self.knee_db)
        } else {
            slope * over
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let level_db = 20.0 * x.abs().max(1e-6).log10();
        let target = self.static_reduction_db(level_db);
        let coeff = if target < self.reduction_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.reduction_db = target + coeff * (self.reduction_db - target);
        x * 10f32.powf(self.reduction_db / 20.0)
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// Equal-power gains (left, right) for pan in [-1, 1]
pub fn equal_power_gains(pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5;
    ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin())
}

/// Mono block to interleaved stereo
pub fn pan_block(mono: &[f32], pan: f32) -> Vec<f32> {
    let (left, right) = equal_power_gains(pan);
    let mut out = Vec::with_capacity(mono.len() * 2);
    for &sample in mono {
        out.push(sample * left);
        out.push(sample * right);
    }
    out
}
