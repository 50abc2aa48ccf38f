use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::SampleKey;

/// Engine configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Byte budget of the raw sample cache
    pub cache_max_bytes: usize,
    pub default_volume: f32,
    /// Output device name; `None` uses the system default
    pub preferred_device: Option<String>,
    /// Position refresh period for hosts without a native frame callback
    pub frame_interval_ms: u64,
    /// Sample server used when only numeric ids are requested
    pub server_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_max_bytes: 64 * 1024 * 1024,
            default_volume: 0.8,
            preferred_device: None,
            frame_interval_ms: 16,
            server_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Server to fetch `keys` from: an explicit URL wins, otherwise numeric
    /// ids go to `server_url` and anything else is read from disk
    pub fn sample_server<'a>(&'a self, explicit: Option<&'a str>, keys: &[SampleKey]) -> Option<&'a str> {
        match explicit {
            Some(url) => Some(url),
            None if !keys.is_empty() && keys.iter().all(|k| k.as_id().is_some()) => Some(self.server_url.as_str()),
            None => None,
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: EngineConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from `~/.config/sample-deck/config.toml`, falling back to defaults
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Ok(Self::with_path(config_path))
    }

    /// Manager bound to an explicit file; a missing or unreadable file yields defaults
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring configuration at {}: {}", config_path.display(), e);
                EngineConfig::default()
            }
        };

        Self { config, config_path }
    }

    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut EngineConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.default_volume = volume.clamp(0.0, 1.0);
        self.save_config()
    }

    pub fn set_cache_max_bytes(&mut self, bytes: usize) -> Result<(), ConfigError> {
        self.config.cache_max_bytes = bytes;
        self.save_config()
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.preferred_device = device;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = EngineConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("sample-deck");

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
        if !path.exists() {
            return Ok(EngineConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}
