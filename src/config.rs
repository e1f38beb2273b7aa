//! TOML configuration for the scheduling engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub planning: PlanningConfig,
}

/// Where and whether the embedded store persists its snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the JSON snapshot. Supports `~` expansion.
    pub data_dir: String,
    /// Disable to run fully in memory.
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.manege".to_string(),
            persist: true,
        }
    }
}

/// Limits and defaults applied by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Hard cap on session length.
    pub max_session_minutes: u32,
    /// Duration used when a caller does not care.
    pub default_duration_minutes: u32,
    /// Session type used when the input leaves it empty.
    pub default_session_type: String,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_session_minutes: 480,
            default_duration_minutes: 60,
            default_session_type: "lesson".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first location that exists, falling back
    /// to defaults: `./config.toml`, `./manege.toml`, then
    /// `{config_dir}/manege/config.toml`.
    pub fn load() -> Result<Self> {
        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                debug!(path = %candidate.display(), "loading config");
                return Self::from_file(&candidate);
            }
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("config.toml"),
            PathBuf::from("manege.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("manege").join("config.toml"));
        }
        paths
    }

    /// Tilde-expanded data directory.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.data_dir).into_owned())
    }

    fn validate(&self) -> Result<()> {
        if self.storage.data_dir.is_empty() {
            return Err(ConfigError::Invalid("storage.data_dir must not be empty".to_string()).into());
        }
        if self.planning.max_session_minutes == 0 || self.planning.max_session_minutes > 1440 {
            return Err(ConfigError::Invalid(format!(
                "planning.max_session_minutes must be within 1..=1440, got {}",
                self.planning.max_session_minutes
            ))
            .into());
        }
        if self.planning.default_duration_minutes == 0
            || self.planning.default_duration_minutes > self.planning.max_session_minutes
        {
            return Err(ConfigError::Invalid(format!(
                "planning.default_duration_minutes must be within 1..={}, got {}",
                self.planning.max_session_minutes, self.planning.default_duration_minutes
            ))
            .into());
        }
        if self.planning.default_session_type.is_empty() {
            return Err(
                ConfigError::Invalid("planning.default_session_type must not be empty".to_string())
                    .into(),
            );
        }
        Ok(())
    }
}
