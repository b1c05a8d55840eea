//! Configuration management for ClipSync
//!
//! This module handles application configuration including:
//! - Loading and saving the TOML configuration file
//! - Locating the platform configuration directory
//! - Providing the protocol defaults
//! - Configuration validation

use crate::error::{ConfigError, ConfigResult};
use crate::network::FramingMode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Constants for configuration (avoiding magic numbers)
const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 12000;
const DEFAULT_CHUNK_SIZE: usize = 1 << 12;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 500;
const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;
const DEFAULT_DRAIN_INTERVAL_MS: u64 = 100;
const DEFAULT_WATCH_INTERVAL_MS: u64 = 250;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Clipboard configuration
    #[serde(default)]
    pub clipboard: ClipboardConfig,
}

/// Connection and framing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the host binds to and the guest dials
    pub address: String,

    /// TCP port
    pub port: u16,

    /// Upper bound on a single socket read
    pub chunk_size: usize,

    /// How long the sync loop waits for inbound data before flushing outbound
    pub poll_timeout_ms: u64,

    /// Frame parsing rules
    pub framing: FramingMode,

    /// Largest accepted frame payload
    pub max_frame_bytes: usize,
}

/// Clipboard side configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Tick on which received snapshots are applied
    pub drain_interval_ms: u64,

    /// How often the local clipboard is checked for changes
    pub watch_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            framing: FramingMode::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            watch_interval_ms: DEFAULT_WATCH_INTERVAL_MS,
        }
    }
}

impl NetworkConfig {
    /// Socket poll timeout as a Duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl ClipboardConfig {
    /// Inbound drain tick as a Duration
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Change polling interval as a Duration
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

impl Config {
    /// Validates configuration values
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad field
    pub fn validate(&self) -> ConfigResult<()> {
        if self.network.address.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "Address must not be empty".to_string(),
            ));
        }

        if self.network.chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "Chunk size must be greater than 0".to_string(),
            ));
        }

        if self.network.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "Poll timeout must be greater than 0".to_string(),
            ));
        }

        if self.network.max_frame_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "Maximum frame size must be greater than 0".to_string(),
            ));
        }

        if self.clipboard.drain_interval_ms == 0 || self.clipboard.watch_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "Clipboard intervals must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_file: PathBuf,
}

impl ConfigManager {
    /// Creates a manager for the platform configuration directory
    ///
    /// # Errors
    ///
    /// Returns error if project directory cannot be determined
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::get_config_directory()?;
        Ok(Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
        })
    }

    /// Creates a manager for an explicit configuration file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_file: path.into(),
        }
    }

    /// Gets the configuration directory path
    fn get_config_directory() -> ConfigResult<PathBuf> {
        ProjectDirs::from("com", "clipsync", "ClipSync")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::DirectoryNotFound(
                    "Could not determine configuration directory".to_string(),
                )
            })
    }

    /// Ensures the directory holding the configuration file exists
    fn ensure_config_directory(&self) -> ConfigResult<()> {
        let Some(dir) = self.config_file.parent() else {
            return Ok(());
        };
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                ConfigError::DirectoryCreationFailed(format!(
                    "Failed to create config directory at {:?}: {}",
                    dir, e
                ))
            })?;
        }
        Ok(())
    }

    /// Loads the configuration file, or returns defaults if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns error if an existing file cannot be read, parsed or validated
    pub fn load_or_default(&self) -> ConfigResult<Config> {
        if self.config_file.exists() {
            self.load()
        } else {
            Ok(Config::default())
        }
    }

    /// Loads configuration from file
    fn load(&self) -> ConfigResult<Config> {
        let content = fs::read_to_string(&self.config_file).map_err(|e| {
            ConfigError::LoadFailed(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            ConfigError::LoadFailed(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file
    ///
    /// # Errors
    ///
    /// Returns error if configuration cannot be saved
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate()?;
        self.ensure_config_directory()?;

        let content = toml::to_string_pretty(config)?;

        fs::write(&self.config_file, content).map_err(|e| {
            ConfigError::SaveFailed(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Gets the configuration file path
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}
