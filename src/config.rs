//! Configuration management for agentboard.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `AGENTBOARD_STORE` - Optional. Storage backend, `sqlite` (default)
//!   or `memory`.
//! - `AGENTBOARD_DB_PATH` - Optional. SQLite database path. Defaults to
//!   `agentboard.db` in the working directory.
//! - `STATUS_LOOKBACK_EVENTS` - Optional. How many recent activity
//!   events a status read scans for a phase-defining event. Defaults
//!   to `10`. Status reconstruction cannot see a phase change buried
//!   deeper than this, so size it generously for chatty logs.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::DEFAULT_LOOKBACK;
use crate::store::StoreKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Storage backend selection
    pub store: StoreKind,

    /// SQLite database path (ignored by the memory backend)
    pub db_path: PathBuf,

    /// Lookback window for status reconstruction
    pub status_lookback: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let store = std::env::var("AGENTBOARD_STORE")
            .map(|s| StoreKind::parse(&s))
            .unwrap_or_default();

        let db_path = std::env::var("AGENTBOARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("agentboard.db"));

        let status_lookback = match std::env::var("STATUS_LOOKBACK_EVENTS") {
            Ok(raw) => {
                let n: usize = raw.parse().map_err(|e| {
                    ConfigError::InvalidValue("STATUS_LOOKBACK_EVENTS".to_string(), format!("{}", e))
                })?;
                if n == 0 {
                    return Err(ConfigError::InvalidValue(
                        "STATUS_LOOKBACK_EVENTS".to_string(),
                        "must be at least 1".to_string(),
                    ));
                }
                n
            }
            Err(_) => DEFAULT_LOOKBACK,
        };

        Ok(Self {
            host,
            port,
            store,
            db_path,
            status_lookback,
        })
    }
}
