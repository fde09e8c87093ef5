// ============================================================================
// Trellis Config - Centralized configuration management
// ============================================================================
//
// Loads every setting from environment variables with sensible defaults.
// Scheduler intervals are parsed but not judged here: a zero interval is a
// fatal error raised by the scheduler when it is enabled.
//
// ============================================================================

mod constants;
mod federation;
mod follow;

pub use constants::{
    AUTO_FOLLOW_BATCH_SIZE, AUTO_FOLLOW_INDEX_PAGE_SIZE, DEFAULT_HTTP_SIGNATURE_CLOCK_SKEW_SECS,
};
pub use federation::{AutoFollowIndexConfig, FederationConfig, JobQueueConfig};
pub use follow::{FollowHealthConfig, FollowScoreConfig};

use anyhow::Result;
use constants::*;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub bind_address: String,
    pub rust_log: String,

    // Sub-configurations
    pub federation: FederationConfig,
    pub follow_health: FollowHealthConfig,
    pub auto_follow_index: AutoFollowIndexConfig,
    pub jobs: JobQueueConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port = env_or("PORT", DEFAULT_PORT);

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL")?,
            port,
            bind_address: format!("[::]:{}", port),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            federation: FederationConfig::from_env()?,
            follow_health: FollowHealthConfig::from_env()?,
            auto_follow_index: AutoFollowIndexConfig::from_env()?,
            jobs: JobQueueConfig::from_env(),
        })
    }
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

/// Intervals must parse when set; a malformed value is an error rather than a
/// silent fallback to the default.
pub(crate) fn parse_interval_ms(key: &str, default_ms: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{} is not a valid millisecond count: {}", key, e))?;
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}
