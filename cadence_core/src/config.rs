//! Configuration file support for Cadence.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/cadence/config.toml`.

use crate::{ClockTime, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleSettings,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Scheduling behaviour configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// How far ahead the "ending soon" list looks
    #[serde(default = "default_expiring_window_days")]
    pub expiring_window_days: i64,

    /// Slot time given to stored sessions that predate per-slot times
    #[serde(default = "default_legacy_session_time")]
    pub legacy_session_time: ClockTime,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            expiring_window_days: default_expiring_window_days(),
            legacy_session_time: default_legacy_session_time(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("cadence")
}

fn default_expiring_window_days() -> i64 {
    30
}

fn default_legacy_session_time() -> ClockTime {
    ClockTime::from_minutes(9 * 60)
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("cadence").join("config.toml")
    }

    /// Path of the roster document inside the data directory
    pub fn roster_path(&self) -> PathBuf {
        self.data.data_dir.join("roster.json")
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.expiring_window_days < 0 {
            return Err(Error::Config(format!(
                "expiring_window_days must not be negative, got {}",
                self.schedule.expiring_window_days
            )));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
