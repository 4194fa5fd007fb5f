//! Configuration module for the notification feed backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::store::StorePath;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite file backing the notification store
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Store path of the notification collection
    pub collection: StorePath,
    /// Upper bound on a single mark-read write
    pub write_timeout: Duration,
}

/// A configuration variable that could not be parsed.
#[derive(Debug)]
pub struct ConfigError {
    pub var: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.var, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("NOTIFEED_DB_PATH")
            .unwrap_or_else(|_| "./data/notifications.sqlite".to_string())
            .into();

        let bind_addr = env::var("NOTIFEED_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError {
                var: "NOTIFEED_BIND_ADDR",
                message: e.to_string(),
            })?;

        let log_level = env::var("NOTIFEED_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let collection = env::var("NOTIFEED_COLLECTION")
            .unwrap_or_else(|_| "notifications".to_string());
        let collection = StorePath::parse(&collection).map_err(|e| ConfigError {
            var: "NOTIFEED_COLLECTION",
            message: e.to_string(),
        })?;

        let write_timeout = match env::var("NOTIFEED_WRITE_TIMEOUT_MS") {
            Ok(raw) => {
                let millis: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError {
                        var: "NOTIFEED_WRITE_TIMEOUT_MS",
                        message: e.to_string(),
                    }
                })?;
                Duration::from_millis(millis)
            }
            Err(_) => Duration::from_millis(10_000),
        };

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            collection,
            write_timeout,
        })
    }
}
