// ============================================================================
// Federation Configuration
// ============================================================================

use crate::constants::*;
use crate::{env_bool, parse_interval_ms};
use std::time::Duration;

/// Local federation identity and inbound signature policy
#[derive(Clone, Debug)]
pub struct FederationConfig {
    /// Instance domain (e.g., "video.example.org")
    pub instance_domain: String,
    /// Preferred username of the application actor that owns server follows
    pub server_actor_name: String,
    /// Allowed distance in seconds between a signature's creation time and
    /// now. `None` falls back to the library default.
    pub signature_clock_skew_secs: Option<u64>,
}

impl FederationConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let signature_clock_skew_secs = match std::env::var("HTTP_SIGNATURE_CLOCK_SKEW_SECS") {
            Ok(raw) => Some(raw.trim().parse().map_err(|e| {
                anyhow::anyhow!("HTTP_SIGNATURE_CLOCK_SKEW_SECS is not a number: {}", e)
            })?),
            Err(_) => None,
        };

        Ok(Self {
            instance_domain: std::env::var("INSTANCE_DOMAIN")
                .unwrap_or_else(|_| "localhost:8080".to_string()),
            server_actor_name: std::env::var("SERVER_ACTOR_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVER_ACTOR_NAME.to_string()),
            signature_clock_skew_secs,
        })
    }
}

/// Pull-based discovery of new peers from a shared index
#[derive(Clone, Debug)]
pub struct AutoFollowIndexConfig {
    pub enabled: bool,
    pub index_url: String,
    pub interval: Duration,
}

impl AutoFollowIndexConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            enabled: env_bool("AUTO_FOLLOW_INDEX_ENABLED", false),
            index_url: std::env::var("AUTO_FOLLOW_INDEX_URL")
                .unwrap_or_else(|_| DEFAULT_AUTO_FOLLOW_INDEX_URL.to_string()),
            interval: parse_interval_ms(
                "AUTO_FOLLOW_INDEX_INTERVAL_MS",
                DEFAULT_AUTO_FOLLOW_INDEX_INTERVAL_MS,
            )?,
        })
    }
}

/// Redis stream settings for outbound jobs
#[derive(Clone, Debug)]
pub struct JobQueueConfig {
    /// Prefix for job streams: "{prefix}{job_type}"
    pub stream_prefix: String,
    /// Approximate MAXLEN applied on XADD
    pub stream_max_len: usize,
}

impl JobQueueConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            stream_prefix: std::env::var("JOB_STREAM_PREFIX")
                .unwrap_or_else(|_| DEFAULT_JOB_STREAM_PREFIX.to_string()),
            stream_max_len: std::env::var("JOB_STREAM_MAX_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_JOB_STREAM_MAX_LEN),
        }
    }
}
