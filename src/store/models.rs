use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A federated actor, local or remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PeerIdentity {
    pub id: i64,
    pub preferred_username: String,
    /// Actor URL (e.g. "https://video.example/accounts/peertube")
    pub url: String,
    /// Key identifier advertised in signatures (usually "{url}#main-key")
    pub key_id: String,
    pub public_key_pem: String,
    pub inbox_url: String,
    pub shared_inbox_url: Option<String>,
    /// Owning host, `None` for local actors
    pub host: Option<String>,
}

impl PeerIdentity {
    pub fn is_local(&self) -> bool {
        self.host.is_none()
    }

    /// Whether `key_id` designates this actor
    ///
    /// Matches the advertised key id, or the actor URL once the `#fragment`
    /// is stripped.
    pub fn matches_key_id(&self, key_id: &str) -> bool {
        let key_id = key_id.trim();
        if key_id == self.key_id {
            return true;
        }
        key_id.split('#').next().is_some_and(|actor| actor == self.url)
    }

    /// Whether deliveries addressed to `inbox` reach this actor
    pub fn receives_at(&self, inbox: &str) -> bool {
        self.inbox_url == inbox || self.shared_inbox_url.as_deref() == Some(inbox)
    }
}

/// Lifecycle of a follow relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowState {
    Pending,
    Accepted,
    Rejected,
}

impl FollowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowState::Pending => "pending",
            FollowState::Accepted => "accepted",
            FollowState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FollowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FollowState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => anyhow::bail!("Unknown follow state: {}", other),
        }
    }
}

/// Directed follow relationship (follower -> following)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub id: i64,
    pub follower_id: i64,
    pub following_id: i64,
    pub state: FollowState,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// Score bounds handed to the store so clamping happens on write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBounds {
    pub min: i64,
    pub max: i64,
}

impl ScoreBounds {
    pub fn clamp(&self, score: i64) -> i64 {
        score.clamp(self.min, self.max)
    }

    pub fn apply(&self, score: i64, delta: i64) -> i64 {
        self.clamp(score.saturating_add(delta))
    }

    /// Largest useful delta in either direction
    ///
    /// Applying the clamped delta to any in-bounds score gives the same result
    /// as applying the raw one, without overflowing `score + delta` in SQL.
    pub fn clamp_delta(&self, delta: i64) -> i64 {
        let span = self.max.saturating_sub(self.min);
        delta.clamp(-span, span)
    }
}

impl From<&trellis_config::FollowScoreConfig> for ScoreBounds {
    fn from(config: &trellis_config::FollowScoreConfig) -> Self {
        Self {
            min: config.min,
            max: config.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerIdentity {
        PeerIdentity {
            id: 7,
            preferred_username: "peertube".to_string(),
            url: "https://remote.example/accounts/peertube".to_string(),
            key_id: "https://remote.example/accounts/peertube#main-key".to_string(),
            public_key_pem: String::new(),
            inbox_url: "https://remote.example/accounts/peertube/inbox".to_string(),
            shared_inbox_url: Some("https://remote.example/inbox".to_string()),
            host: Some("remote.example".to_string()),
        }
    }

    #[test]
    fn test_key_id_matching() {
        let peer = peer();
        assert!(peer.matches_key_id("https://remote.example/accounts/peertube#main-key"));
        assert!(peer.matches_key_id("https://remote.example/accounts/peertube#other-key"));
        assert!(peer.matches_key_id("https://remote.example/accounts/peertube"));
        assert!(!peer.matches_key_id("https://evil.example/accounts/peertube#main-key"));
    }

    #[test]
    fn test_receives_at_shared_inbox() {
        let peer = peer();
        assert!(peer.receives_at("https://remote.example/inbox"));
        assert!(peer.receives_at("https://remote.example/accounts/peertube/inbox"));
        assert!(!peer.receives_at("https://other.example/inbox"));
    }

    #[test]
    fn test_bounds_apply() {
        let bounds = ScoreBounds { min: 0, max: 100 };
        assert_eq!(bounds.apply(50, 500), 100);
        assert_eq!(bounds.apply(50, -500), 0);
        assert_eq!(bounds.apply(50, i64::MIN), 0);
    }

    #[test]
    fn test_clamp_delta_preserves_result() {
        let bounds = ScoreBounds { min: 0, max: 100 };
        for score in [0, 37, 100] {
            for delta in [i64::MIN, -1000, -5, 0, 5, 1000, i64::MAX] {
                assert_eq!(
                    bounds.clamp(score + bounds.clamp_delta(delta)),
                    bounds.apply(score, delta)
                );
            }
        }
    }
}
