//! Runtime configuration for hosts embedding the core.

use std::path::PathBuf;

use thiserror::Error;

use crate::capture::{FileCapture, DEFAULT_MAX_FILE_BYTES};
use crate::logging::DEFAULT_LOG_FILTER;
use crate::store::{SqliteRecordStore, StoreResult};

/// Environment variable holding the database path.
pub const ENV_DB_PATH: &str = "LABREPORT_DB_PATH";
/// Environment variable holding the per-file size ceiling in bytes.
pub const ENV_MAX_FILE_BYTES: &str = "LABREPORT_MAX_FILE_BYTES";
/// Standard tracing filter variable.
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Core settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite file holding analysis records
    pub database_path: PathBuf,
    /// Largest accepted upload, per file
    pub max_file_size_bytes: u64,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("labreport.sqlite3"),
            max_file_size_bytes: DEFAULT_MAX_FILE_BYTES,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CoreConfig {
    /// Load from the process environment, reading a `.env` file first if one
    /// exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("no .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            config.database_path = PathBuf::from(path.trim());
        }

        if let Some(raw) = lookup(ENV_MAX_FILE_BYTES) {
            config.max_file_size_bytes = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: ENV_MAX_FILE_BYTES,
                    value: raw,
                })?;
        }

        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }

        Ok(config)
    }

    pub fn file_capture(&self) -> FileCapture {
        FileCapture::new(self.max_file_size_bytes)
    }

    pub fn open_store(&self) -> StoreResult<SqliteRecordStore> {
        SqliteRecordStore::open(&self.database_path)
    }
}
