//! Command line interface
//!
//! Values given on the command line override the configuration file.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use tracing::{info, warn};

use crate::config::{Config, ConfigManager};
use crate::error::{ConfigError, Result};
use crate::network::{ConnectionRole, FramingMode};

/// Role selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Listen and wait for the guest
    Host,
    /// Connect to the host
    Guest,
}

impl From<RoleArg> for ConnectionRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Host => ConnectionRole::Host,
            RoleArg::Guest => ConnectionRole::Guest,
        }
    }
}

/// Command line arguments
#[derive(Debug, Parser)]
#[command(
    name = "clip-sync",
    version,
    about = "Synchronize the clipboard between a host and a guest"
)]
pub struct Cli {
    /// Role of this process
    #[arg(value_enum, default_value_t = RoleArg::Guest)]
    pub role: RoleArg,

    /// Run as host (same as the `host` role)
    #[arg(short = 'o', long = "host")]
    pub host: bool,

    /// IP address of the host
    #[arg(short, long)]
    pub address: Option<String>,

    /// Port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum bytes per socket read
    #[arg(short = 'b', long = "bytesize", value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Socket poll timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_timeout_ms: Option<u64>,

    /// Interval between inbound clipboard applications in milliseconds
    #[arg(long, value_name = "MS")]
    pub drain_interval_ms: Option<u64>,

    /// Interval between local clipboard checks in milliseconds
    #[arg(long, value_name = "MS")]
    pub watch_interval_ms: Option<u64>,

    /// Frame parsing rules: legacy or buffered
    #[arg(long, value_name = "MODE")]
    pub framing: Option<FramingMode>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the effective configuration back to the configuration file
    #[arg(long)]
    pub save_config: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Effective role
    pub fn role(&self) -> ConnectionRole {
        if self.host {
            ConnectionRole::Host
        } else {
            self.role.into()
        }
    }

    /// Manager for `--config`, or for the platform config directory
    ///
    /// Returns `None` when no platform directory exists; the run then goes
    /// on with defaults and flags only.
    pub fn config_manager(&self) -> Option<ConfigManager> {
        if let Some(path) = &self.config {
            return Some(ConfigManager::with_path(path));
        }
        match ConfigManager::new() {
            Ok(manager) => Some(manager),
            Err(e) => {
                warn!("{}; using default configuration", e);
                None
            }
        }
    }

    /// Resolves the effective configuration: defaults, then file, then flags
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is unreadable, a value is
    /// invalid, or `--save-config` has nowhere to write
    pub fn load_config(&self, manager: Option<&ConfigManager>) -> Result<Config> {
        let mut config = match manager {
            Some(manager) => manager.load_or_default()?,
            None => Config::default(),
        };
        self.apply_to(&mut config);
        config.validate()?;

        if self.save_config {
            let manager = manager.ok_or_else(|| {
                ConfigError::DirectoryNotFound(
                    "No configuration directory; pass --config to save".to_string(),
                )
            })?;
            manager.save(&config)?;
            info!("Configuration saved to {}", manager.config_file().display());
        }

        Ok(config)
    }

    /// Overrides `config` with every value given on the command line
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(address) = &self.address {
            config.network.address = address.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.network.chunk_size = chunk_size;
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.network.poll_timeout_ms = ms;
        }
        if let Some(framing) = self.framing {
            config.network.framing = framing;
        }
        if let Some(ms) = self.drain_interval_ms {
            config.clipboard.drain_interval_ms = ms;
        }
        if let Some(ms) = self.watch_interval_ms {
            config.clipboard.watch_interval_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClipSyncError;

    #[test]
    fn test_defaults_to_guest() {
        let cli = Cli::try_parse_from(["clip-sync"]).unwrap();
        assert_eq!(cli.role(), ConnectionRole::Guest);

        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_host_selection() {
        let cli = Cli::try_parse_from(["clip-sync", "host"]).unwrap();
        assert_eq!(cli.role(), ConnectionRole::Host);

        let cli = Cli::try_parse_from(["clip-sync", "-o"]).unwrap();
        assert_eq!(cli.role(), ConnectionRole::Host);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "clip-sync",
            "guest",
            "-a",
            "10.0.0.2",
            "-p",
            "13000",
            "-b",
            "8192",
            "--framing",
            "buffered",
            "--drain-interval-ms",
            "50",
        ])
        .unwrap();

        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.network.address, "10.0.0.2");
        assert_eq!(config.network.port, 13000);
        assert_eq!(config.network.chunk_size, 8192);
        assert_eq!(config.network.framing, FramingMode::Buffered);
        assert_eq!(config.clipboard.drain_interval_ms, 50);
        assert_eq!(config.network.poll_timeout_ms, 500);
    }

    #[test]
    fn test_load_without_config_directory() {
        let cli = Cli::try_parse_from(["clip-sync", "host", "-p", "13001"]).unwrap();

        let config = cli.load_config(None).unwrap();
        assert_eq!(config.network.port, 13001);
        assert_eq!(config.network.address, "127.0.0.1");

        let cli = Cli::try_parse_from(["clip-sync", "--save-config"]).unwrap();
        let err = cli.load_config(None).unwrap_err();
        assert!(matches!(
            err,
            ClipSyncError::Config(ConfigError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_load_layers_file_then_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let path_arg = path.to_str().unwrap();

        let cli = Cli::try_parse_from([
            "clip-sync",
            "-c",
            path_arg,
            "-p",
            "14000",
            "--save-config",
        ])
        .unwrap();
        let manager = cli.config_manager().unwrap();
        cli.load_config(Some(&manager)).unwrap();
        assert!(path.exists());

        let cli = Cli::try_parse_from(["clip-sync", "-c", path_arg, "-b", "512"]).unwrap();
        let manager = cli.config_manager().unwrap();
        let config = cli.load_config(Some(&manager)).unwrap();
        assert_eq!(config.network.port, 14000);
        assert_eq!(config.network.chunk_size, 512);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["clip-sync", "server"]).is_err());
        assert!(Cli::try_parse_from(["clip-sync", "--framing", "strict"]).is_err());
        assert!(Cli::try_parse_from(["clip-sync", "-p", "70000"]).is_err());
    }
}
