//! Application Configuration
//! Timing and control-surface settings, stored as JSON in the user config dir

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get config directory path
fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("booster"))
}

/// Get config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|p| p.join("config.json"))
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    /// Config version (for future migrations)
    pub version: u32,
    /// Interval of the detached-element sweep
    pub sweep_interval_ms: u64,
    /// How long a page waits for its saved volume
    pub restore_timeout_ms: u64,
    /// How long the coordinator waits on a page before probing
    pub query_timeout_ms: u64,
    /// Delay before refreshing the badge after a page finishes loading
    pub badge_refresh_delay_ms: u64,
    /// Percentage added/removed by the step buttons
    pub step_percent: u16,
    /// One-click percentages
    pub presets: Vec<u16>,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            sweep_interval_ms: 3000,
            restore_timeout_ms: 500,
            query_timeout_ms: 500,
            badge_refresh_delay_ms: 100,
            step_percent: 5,
            presets: vec![0, 50, 100, 200, 300, 400, 500],
        }
    }
}

impl BoosterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn badge_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.badge_refresh_delay_ms)
    }

    /// Load configuration from the user config dir, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = get_config_path() else {
            tracing::info!("could not determine config path, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::info!("no config file found, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded configuration");
                config
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to the user config dir
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = get_config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;

        tracing::info!(path = %path.display(), "saved configuration");
        Ok(())
    }
}
