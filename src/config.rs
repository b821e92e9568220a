//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::breeds::{DEFAULT_BREEDS_URL, DEFAULT_TIMEOUT};

/// Service configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite file (from SPY_CATS_DB_PATH). `None` uses the platform data directory.
    pub db_path: Option<PathBuf>,
    /// Breed catalogue endpoint (from SPY_CATS_BREEDS_URL)
    pub breeds_url: String,
    /// Breed lookup timeout (from SPY_CATS_BREEDS_TIMEOUT_SECS)
    pub breeds_timeout: Duration,
    /// Allowed CORS origins (from SPY_CATS_CORS_ORIGINS, comma-separated).
    /// `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("SPY_CATS_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let breeds_url =
            lookup("SPY_CATS_BREEDS_URL").unwrap_or_else(|| DEFAULT_BREEDS_URL.to_string());

        let breeds_timeout = lookup("SPY_CATS_BREEDS_TIMEOUT_SECS")
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!(
                        "Ignoring invalid SPY_CATS_BREEDS_TIMEOUT_SECS {:?}, using {}s",
                        raw,
                        DEFAULT_TIMEOUT.as_secs()
                    );
                    None
                }
            })
            .unwrap_or(DEFAULT_TIMEOUT);

        let cors_origins = lookup("SPY_CATS_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            db_path,
            breeds_url,
            breeds_timeout,
            cors_origins,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
