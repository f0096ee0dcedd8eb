//! Role audio profiles
//!
//! A profile is picked once, when a channel is created, from the remote
//! participant's role. It does not change for the lifetime of the channel.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{
    COMPRESSOR_RATIO, COMPRESSOR_RATIO_HEAVY, COMPRESSOR_THRESHOLD_DB,
    COMPRESSOR_THRESHOLD_HEAVY_DB, DEFAULT_HIGH_PASS_HZ, DEFAULT_LOW_PASS_HZ,
};

/// Signal-processing parameters for one role
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAudioProfile {
    /// Wave-shaper amount, 0..=100
    pub distortion_amount: f32,
    pub high_pass_hz: f32,
    pub low_pass_hz: f32,
    /// Heavier compression when set
    pub compression_enabled: bool,
}

impl Default for RoleAudioProfile {
    fn default() -> Self {
        Self {
            distortion_amount: 0.0,
            high_pass_hz: DEFAULT_HIGH_PASS_HZ,
            low_pass_hz: DEFAULT_LOW_PASS_HZ,
            compression_enabled: false,
        }
    }
}

impl RoleAudioProfile {
    pub fn new(
        distortion_amount: f32,
        high_pass_hz: f32,
        low_pass_hz: f32,
        compression_enabled: bool,
    ) -> Self {
        Self {
            distortion_amount,
            high_pass_hz,
            low_pass_hz,
            compression_enabled,
        }
    }

    /// Compressor (threshold dB, ratio)
    pub fn compressor_settings(&self) -> (f32, f32) {
        if self.compression_enabled {
            (COMPRESSOR_THRESHOLD_HEAVY_DB, COMPRESSOR_RATIO_HEAVY)
        } else {
            (COMPRESSOR_THRESHOLD_DB, COMPRESSOR_RATIO)
        }
    }
}

/// Role name → profile lookup with a fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileTable {
    pub profiles: HashMap<String, RoleAudioProfile>,
    pub fallback: RoleAudioProfile,
}

impl Default for ProfileTable {
    fn default() -> Self {
        let profiles = [
            ("Vagrant", RoleAudioProfile::new(60.0, 500.0, 3000.0, true)),
            ("Scout", RoleAudioProfile::new(30.0, 400.0, 3500.0, true)),
            ("Pioneer", RoleAudioProfile::new(15.0, 400.0, 3500.0, false)),
            ("Command", RoleAudioProfile::new(0.0, 300.0, 4000.0, false)),
        ]
        .into_iter()
        .map(|(role, profile)| (role.to_string(), profile))
        .collect();

        Self {
            profiles,
            fallback: RoleAudioProfile::default(),
        }
    }
}

impl ProfileTable {
    /// Profile for a role (case-insensitive), or the fallback
    pub fn for_role(&self, role: Option<&str>) -> RoleAudioProfile {
        role.and_then(|role| {
            self.profiles
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(role))
                .map(|(_, profile)| *profile)
        })
        .unwrap_or(self.fallback)
    }
}
