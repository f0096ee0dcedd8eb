//! Application configuration
//!
//! Loaded from TOML. Every section has defaults, so an empty file (or no
//! file) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::{ProfileTable, StageBounds};
use crate::constants::{DEFAULT_SAMPLE_RATE, OUTPUT_BUFFER_FRAMES};
use crate::error::{Error, Result};
use crate::network::NetInfo;
use crate::roles::RolePolicy;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub token_service: TokenServiceConfig,
    /// Used when the token service does not return a server address
    pub server_url: Option<String>,
    pub roles: RolePolicy,
    pub profiles: ProfileTable,
    pub audio: AudioConfig,
    pub stage: StageBounds,
    pub nets: Vec<NetInfo>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            token_service: TokenServiceConfig::default(),
            server_url: None,
            roles: RolePolicy::default(),
            profiles: ProfileTable::default(),
            audio: AudioConfig::default(),
            stage: StageBounds::default(),
            nets: Vec::new(),
        }
    }
}

/// Token Service endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenServiceConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Ask for `roomNames` (list) instead of `roomName`
    pub multi_room: bool,
}

impl Default for TokenServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/api/token".to_string(),
            timeout_secs: 10,
            multi_room: false,
        }
    }
}

/// Audio processing settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Capacity of the output bus, in frames
    pub output_buffer_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            output_buffer_frames: OUTPUT_BUFFER_FRAMES,
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tacnet")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load from the default location, if there is one
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.roles.validate()?;
        self.stage.validate()?;
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("Sample rate must be non-zero".to_string()));
        }
        for net in &self.nets {
            if let Some(rank) = &net.min_rank {
                if self.roles.rank_of(rank).is_none() {
                    return Err(Error::Config(format!(
                        "Net {} requires unknown rank {:?}",
                        net.room_id, rank
                    )));
                }
            }
        }
        Ok(())
    }
}
