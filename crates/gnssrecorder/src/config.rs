//! Configuration management for gnssrecorder.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationPolicy;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "gnssrecorder";

/// Directory under the data directory holding recordings.
const RECORDINGS_DIR_NAME: &str = "recordings";

/// Environment variable prefix.
const ENV_PREFIX: &str = "GNSSRECORDER_";

/// Allowed file prefixes: no path separators, no leading dot.
const FILE_PREFIX_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,63}$";

/// Allowed file extensions.
const EXTENSION_PATTERN: &str = r"^[A-Za-z0-9]{1,16}$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GNSSRECORDER_`, nested keys
///    separated by `__`, e.g. `GNSSRECORDER_WRITER__QUEUE_CAPACITY`)
/// 2. TOML config file at `~/.config/gnssrecorder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session file configuration.
    pub recording: RecordingConfig,
    /// Writer queue configuration.
    pub writer: WriterConfig,
    /// Fix correlation configuration.
    pub correlation: CorrelationConfig,
}

/// Where and how session files are created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory new sessions are created in.
    /// Defaults to `~/.local/share/gnssrecorder/recordings`
    pub output_dir: Option<PathBuf>,
    /// File name prefix, followed by the UTC start time.
    pub file_prefix: String,
    /// File extension, without the dot.
    pub extension: String,
    /// Delete `-journal`, `-wal` and `-shm` side files after a session stops.
    pub remove_journal_files: bool,
}

/// Writer queue configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum queued events before new ones are dropped.
    /// Set to 0 for unbounded.
    pub queue_capacity: usize,
}

/// Fix correlation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Which pending measurement rows a fix is linked to.
    pub policy: CorrelationPolicy,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: None, // Will be resolved to default at runtime
            file_prefix: "GNSS-RECORDER".to_string(),
            extension: "gpkg".to_string(),
            remove_journal_files: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `GNSSRECORDER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        check_pattern(
            "file_prefix",
            &self.recording.file_prefix,
            FILE_PREFIX_PATTERN,
        )?;
        check_pattern("extension", &self.recording.extension, EXTENSION_PATTERN)?;

        if let Some(dir) = &self.recording.output_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "output_dir cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the output directory, resolving defaults if not set.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.recording
            .output_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(RECORDINGS_DIR_NAME))
    }
}

fn check_pattern(field: &str, value: &str, pattern: &str) -> Result<()> {
    let re = Regex::new(pattern).map_err(|e| Error::internal(format!("bad pattern: {e}")))?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(Error::ConfigValidation {
            message: format!("{field} '{value}' must match {pattern}"),
        })
    }
}
