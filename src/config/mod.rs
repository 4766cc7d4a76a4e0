//! Configuration management for nexa.
//!
//! Configuration is read from `~/.config/nexa/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::fetcher::http_fetcher::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::reconciler::summary::DEFAULT_SUMMARY_CHARS;
use crate::scheduler::{DEFAULT_QUEUE_SIZE, DEFAULT_WORKERS};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub fetch: FetchConfig,
    pub scheduler: SchedulerConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `None` means `<data_dir>/nexa/nexa.db`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrent fetch slots.
    pub workers: usize,
    pub queue_size: usize,
    /// Seconds between re-reads of the feed registry.
    pub registry_sync_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            registry_sync_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub max_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_SUMMARY_CHARS,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path: `~/.config/nexa/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("nexa").join("config.toml"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.workers == 0 {
            return Err(ConfigError::Invalid("scheduler.workers must be at least 1".into()));
        }
        if self.scheduler.queue_size == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.queue_size must be at least 1".into(),
            ));
        }
        if self.scheduler.registry_sync_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.registry_sync_secs must be at least 1".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# nexa configuration

[database]
# SQLite database file. Defaults to <data dir>/nexa/nexa.db
# path = "/var/lib/nexa/nexa.db"

[fetch]
# Per-request timeout in seconds
timeout_secs = 30

# User-Agent header sent with every request
user_agent = "nexa/1.0"

[scheduler]
# Maximum number of feeds fetched at the same time
workers = 8

# Pending fetch requests before triggers wait
queue_size = 64

# How often the daemon re-reads the feed list to pick up edits
registry_sync_secs = 60

[summary]
# Length of the summary synthesized when a feed entry has no description
max_chars = 150
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
