//! Runtime configuration from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TASKCLOCK_DATA_DIR` | resolved | Directory holding the JSON files |
//! | `TODOIST_API_TOKEN` | - | Token used by the CLI and the background sync |
//! | `TASKCLOCK_API_BASE` | `https://api.todoist.com/rest/v2` | Todoist REST base URL |
//! | `TASKCLOCK_SYNC_INTERVAL` | 300 | Seconds between background syncs (min 60) |
//! | `TASKCLOCK_HOST` | 127.0.0.1 | HTTP bind address |
//! | `TASKCLOCK_PORT` | 5000 | HTTP port |
//!
//! Command-line flags take precedence over all of these.

use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::sync::{DEFAULT_API_BASE, DEFAULT_SYNC_INTERVAL_SECS, MIN_SYNC_INTERVAL_SECS};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub api_token: Option<String>,
    pub api_base: String,
    pub sync_interval_secs: u64,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            api_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Configuration from the process environment; numeric values must parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Configuration read through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let sync_interval_secs = match get("TASKCLOCK_SYNC_INTERVAL") {
            Some(raw) => parse_number::<u64>("TASKCLOCK_SYNC_INTERVAL", &raw)?,
            None => defaults.sync_interval_secs,
        };
        let sync_interval_secs = if sync_interval_secs < MIN_SYNC_INTERVAL_SECS {
            warn!(
                requested = sync_interval_secs,
                minimum = MIN_SYNC_INTERVAL_SECS,
                "Sync interval too short, using the minimum"
            );
            MIN_SYNC_INTERVAL_SECS
        } else {
            sync_interval_secs
        };

        let port = match get("TASKCLOCK_PORT") {
            Some(raw) => parse_number::<u16>("TASKCLOCK_PORT", &raw)?,
            None => defaults.port,
        };

        Ok(Self {
            data_dir: get("TASKCLOCK_DATA_DIR").map(PathBuf::from),
            api_token: get("TODOIST_API_TOKEN"),
            api_base: get("TASKCLOCK_API_BASE").unwrap_or(defaults.api_base),
            sync_interval_secs,
            host: get("TASKCLOCK_HOST").unwrap_or(defaults.host),
            port,
        })
    }

    /// The Todoist token, or an error naming the variable to set
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.api_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("TODOIST_API_TOKEN".to_string()))
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}': {}", raw, err),
    })
}
