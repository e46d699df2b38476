//! Configuration management for cadence-ap
//!
//! Settings are read once at startup from an optional TOML file. Every field
//! has a built-in default, so a missing file or a partial file is fine.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--seek-length, --repeat, --shuffle)
//! 2. TOML configuration file (--config, `CADENCE_CONFIG`, platform config dir)
//! 3. Built-in defaults (code constants)

use crate::error::{Error, Result};
use cadence_common::config::{load_toml, resolve_config_path, CONFIG_ENV_VAR};
use cadence_common::events::{RepeatMode, ShuffleMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Player configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Seconds skipped by seek forward/backward
    ///
    /// Default: 5
    pub seek_length_secs: u32,

    /// Per-subscriber event buffer size
    ///
    /// Default: 1000
    pub event_bus_capacity: usize,

    /// Repeat mode at startup
    pub repeat_mode: RepeatMode,

    /// Shuffle mode at startup
    pub shuffle_mode: ShuffleMode,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_seek_length_secs() -> u32 {
    5
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            seek_length_secs: default_seek_length_secs(),
            event_bus_capacity: default_event_bus_capacity(),
            repeat_mode: RepeatMode::Off,
            shuffle_mode: ShuffleMode::Off,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl PlayerConfig {
    /// Load configuration, falling back to defaults when no file is found
    ///
    /// `cli_path` takes priority over the `CADENCE_CONFIG` environment
    /// variable, which takes priority over the platform config directory.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config = match resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(load_toml(path)?)
    }

    /// Reject values that would make the controller misbehave
    pub fn validate(&self) -> Result<()> {
        if self.seek_length_secs == 0 {
            return Err(Error::Config(
                "seek_length_secs must be greater than zero".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config(
                "event_bus_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.seek_length_secs, 5);
        assert_eq!(config.event_bus_capacity, 1000);
        assert_eq!(config.repeat_mode, RepeatMode::Off);
        assert_eq!(config.shuffle_mode, ShuffleMode::Off);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("seek_length_secs = 10\n");
        let config = PlayerConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.seek_length_secs, 10);
        assert_eq!(config.event_bus_capacity, 1000);
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
            seek_length_secs = 15
            event_bus_capacity = 64
            repeat_mode = "all"
            shuffle_mode = "on"

            [logging]
            level = "debug"
            file = "/tmp/cadence.log"
            "#,
        );
        let config = PlayerConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.seek_length_secs, 15);
        assert_eq!(config.event_bus_capacity, 64);
        assert_eq!(config.repeat_mode, RepeatMode::All);
        assert_eq!(config.shuffle_mode, ShuffleMode::On);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/cadence.log")));
    }

    #[test]
    fn test_zero_seek_length_rejected() {
        let file = write_config("seek_length_secs = 0\n");
        let result = PlayerConfig::load(Some(file.path()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_common_config_error() {
        let file = write_config("seek_length_secs = \"ten\"\n");
        let result = PlayerConfig::load(Some(file.path()));
        assert!(matches!(
            result,
            Err(Error::Common(cadence_common::Error::Config(_)))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = PlayerConfig::load(Some(Path::new("/no/such/cadence.toml")));
        assert!(result.is_err());
    }
}
