// ============================================================================
// Follow Health Configuration
// ============================================================================

use crate::constants::*;
use crate::{env_or, parse_interval_ms};
use std::time::Duration;

/// Score bounds and adjustments applied to follow relationships
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FollowScoreConfig {
    /// Lower clamp bound
    pub min: i64,
    /// Upper clamp bound
    pub max: i64,
    /// Relationships at or below this score are deleted by the sweep
    pub failure_floor: i64,
    /// Fixed adjustment for hosts reported bad this cycle (negative)
    pub penalty: i64,
    /// Fixed adjustment for hosts reported good this cycle (positive)
    pub bonus: i64,
}

impl Default for FollowScoreConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_FOLLOW_SCORE_MIN,
            max: DEFAULT_FOLLOW_SCORE_MAX,
            failure_floor: DEFAULT_FOLLOW_SCORE_FLOOR,
            penalty: DEFAULT_FOLLOW_SCORE_PENALTY,
            bonus: DEFAULT_FOLLOW_SCORE_BONUS,
        }
    }
}

impl FollowScoreConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min > self.max {
            anyhow::bail!(
                "FOLLOW_SCORE_MIN ({}) must not exceed FOLLOW_SCORE_MAX ({})",
                self.min,
                self.max
            );
        }
        if self.failure_floor < self.min || self.failure_floor > self.max {
            anyhow::bail!(
                "FOLLOW_SCORE_FLOOR ({}) must lie within [{}, {}]",
                self.failure_floor,
                self.min,
                self.max
            );
        }
        if self.penalty >= 0 {
            anyhow::bail!("FOLLOW_SCORE_PENALTY must be negative (got {})", self.penalty);
        }
        if self.bonus <= 0 {
            anyhow::bail!("FOLLOW_SCORE_BONUS must be positive (got {})", self.bonus);
        }
        Ok(())
    }

    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            min: env_or("FOLLOW_SCORE_MIN", DEFAULT_FOLLOW_SCORE_MIN),
            max: env_or("FOLLOW_SCORE_MAX", DEFAULT_FOLLOW_SCORE_MAX),
            failure_floor: env_or("FOLLOW_SCORE_FLOOR", DEFAULT_FOLLOW_SCORE_FLOOR),
            penalty: env_or("FOLLOW_SCORE_PENALTY", DEFAULT_FOLLOW_SCORE_PENALTY),
            bonus: env_or("FOLLOW_SCORE_BONUS", DEFAULT_FOLLOW_SCORE_BONUS),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Follow health scheduler configuration
#[derive(Clone, Debug)]
pub struct FollowHealthConfig {
    /// How often pending scores are committed. A zero interval is kept as-is
    /// and rejected when the scheduler is enabled.
    pub interval: Duration,
    pub scores: FollowScoreConfig,
}

impl FollowHealthConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            interval: parse_interval_ms(
                "FOLLOW_SCORES_INTERVAL_MS",
                DEFAULT_FOLLOW_SCORES_INTERVAL_MS,
            )?,
            scores: FollowScoreConfig::from_env()?,
        })
    }
}
