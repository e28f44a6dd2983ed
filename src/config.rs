//! Runtime configuration.
//!
//! Settings come from an optional JSON file (named by `JUKEBOT_CONFIG`) and
//! are then overridden by individual environment variables. Durations in the
//! file use humantime notation, e.g. `"60s"` or `"31m"`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required setting {0}")]
    Missing(&'static str),
}

/// What to do with live streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivePolicy {
    /// Play live streams straight from their URL, without caching them.
    #[default]
    Stream,
    /// Refuse live streams.
    Reject,
}

/// Tunables for the playback core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Longest remote media that will be downloaded.
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,
    pub live_policy: LivePolicy,
    /// Period of the idle reaper.
    #[serde(with = "humantime_serde")]
    pub reaper_interval: Duration,
    /// Upper bound on establishing or moving a voice connection.
    #[serde(with = "humantime_serde")]
    pub join_timeout: Duration,
    /// Upper bound on a metadata probe or a download.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Ballots that resolve a vote regardless of channel size.
    pub vote_threshold: usize,
    /// Number of queued items listed by the queue command.
    pub queue_preview: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(31 * 60),
            live_policy: LivePolicy::Stream,
            reaper_interval: Duration::from_secs(60),
            join_timeout: Duration::from_secs(15),
            fetch_timeout: Duration::from_secs(300),
            vote_threshold: 3,
            queue_preview: 10,
        }
    }
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Never read from the file; only from `DISCORD_TOKEN`.
    #[serde(skip)]
    pub discord_token: Option<String>,
    /// Prefix for text commands and archive sound triggers.
    pub command_prefix: String,
    /// Root directory; each server gets its own subdirectory.
    pub media_dir: PathBuf,
    /// SQLite database holding the sound archive.
    pub database_path: PathBuf,
    pub player: PlayerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: None,
            command_prefix: "!".to_string(),
            media_dir: PathBuf::from("media"),
            database_path: PathBuf::from("application_data.db"),
            player: PlayerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("JUKEBOT_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("JUKEBOT_CONFIG not set, using default configuration");
                Self::default()
            }
        };

        if let Some(token) = lookup("DISCORD_TOKEN") {
            config.discord_token = Some(token);
        }
        if let Some(prefix) = lookup("JUKEBOT_PREFIX").filter(|p| !p.is_empty()) {
            config.command_prefix = prefix;
        }
        if let Some(dir) = lookup("JUKEBOT_MEDIA_DIR") {
            config.media_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("JUKEBOT_DATABASE") {
            config.database_path = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn discord_token(&self) -> Result<&str, ConfigError> {
        self.discord_token
            .as_deref()
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))
    }
}
