pub mod glasses_config;
pub mod ring_config;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::glasses_config::GlassesConfig;
use crate::config::ring_config::RingConfig;
use crate::core::bluetooth::constants::RING_SENSITIVITY_MAX;
use crate::error::BridgeError;
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "g1-bridge";
const CONFIG_FILE_NAME: &str = "config.json";
/// Overrides the config file location
pub const CONFIG_PATH_ENV: &str = "G1_BRIDGE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of error, warn, info, debug, trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.level);
            log::LevelFilter::Info
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub glasses: GlassesConfig,
    pub ring: RingConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// `$G1_BRIDGE_CONFIG`, or `config.json` in the user config directory.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from the default location.
    pub async fn load_config() -> Result<Self> {
        Self::load_from(Self::config_path()?).await
    }

    /// Loads the config from `path`; a missing file yields the defaults.
    pub async fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref();
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;
        config.validate()?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the config to the default location.
    pub async fn save_config(&self) -> Result<()> {
        self.save_to(Self::config_path()?).await
    }

    pub async fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file_path = path.as_ref();
        if let Some(parent) = file_path.parent() {
            ensure_directory_exists(parent).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;
        info!("Config saved to {:?}.", file_path);
        Ok(())
    }

    /// Rejects values the protocol engine cannot work with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.glasses.teleprompter_line_width_px == 0 {
            return Err(BridgeError::Config(
                "glasses.teleprompter_line_width_px must be positive".to_string(),
            ));
        }
        if self.glasses.heartbeat_interval_ms == 0 || self.ring.keepalive_interval_ms == 0 {
            return Err(BridgeError::Config(
                "heartbeat and keep-alive intervals must be positive".to_string(),
            ));
        }
        if self.ring.sensitivity > RING_SENSITIVITY_MAX {
            return Err(BridgeError::InvalidSensitivity(self.ring.sensitivity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.glasses.left_address = Some("AA:BB:CC:DD:EE:01".to_string());
        config.ring.sensitivity = 80;
        config.logging.level = "debug".to_string();
        config.save_to(&path).await.unwrap();

        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.logging.level_filter(), log::LevelFilter::Debug);
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"ring": {"sensitivity": 150}}"#).await.unwrap();

        assert!(AppConfig::load_from(&path).await.is_err());
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let logging = LoggingConfig {
            level: "loud".to_string(),
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
    }
}
