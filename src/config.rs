//! # Configuration Management Module
//!
//! Deployment settings for one sensing node, stored as TOML in the
//! platform config directory. Detection tuning (window sizes, decay rates,
//! thresholds) is deliberately NOT here: those are compile-time constants
//! in the modules that own them, fixed per firmware build.
//!
//! ## Settings
//! - `target_host` / `target_port`: where beat events are sent
//! - `path_prefix`: hierarchical event path root, one segment per channel
//! - `channel_count`: attached sensors, clamped to 1..=4
//! - `simulator_bpm`: base rate for the built-in synthetic source
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/pulsegrid/config.toml
//! - Linux: ~/.config/pulsegrid/config.toml
//! - Windows: %APPDATA%\pulsegrid\config.toml

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Most installations daisy-chain at most this many sensors per node.
pub const MAX_CHANNELS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target_host: String,
    pub target_port: u16,
    pub path_prefix: String,
    pub channel_count: usize,
    pub simulator_bpm: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_host: "127.0.0.1".to_string(),
            target_port: 8000,
            path_prefix: "/pulse".to_string(),
            channel_count: 2,
            simulator_bpm: 65,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("pulsegrid").join("config.toml")
    }

    /// Load config from the default location, or create it if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific file, creating it with defaults if it
    /// doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config.clamped())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Channel count outside 1..=MAX_CHANNELS is a config file typo, not a
    /// reason to refuse to run.
    fn clamped(mut self) -> Self {
        self.channel_count = self.channel_count.clamp(1, MAX_CHANNELS);
        self
    }
}
