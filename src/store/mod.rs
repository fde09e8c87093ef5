// ============================================================================
// Persistence - actors and follow relationships
// ============================================================================
//
// Two traits, one per table family, so tests and the in-memory backend can
// stand in for PostgreSQL. Implementations clamp scores on write; callers
// never read-modify-write a score.
//
// ============================================================================

mod memory;
mod models;
mod postgres;

pub use memory::MemoryStore;
pub use models::{FollowEdge, FollowState, PeerIdentity, ScoreBounds};
pub use postgres::PostgresStore;

use anyhow::Result;

/// Actor to be inserted, id assigned by the store
#[derive(Debug, Clone)]
pub struct NewActor {
    pub preferred_username: String,
    pub url: String,
    pub key_id: String,
    pub public_key_pem: String,
    pub inbox_url: String,
    pub shared_inbox_url: Option<String>,
    pub host: Option<String>,
}

/// Actor lookups used by signature verification and discovery
#[async_trait::async_trait]
pub trait ActorStore: Send + Sync {
    /// Resolve the actor owning `key_id`
    ///
    /// Matches either the stored key id or, once the fragment is stripped,
    /// the actor URL.
    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<PeerIdentity>>;

    /// Local actor named `name` (the instance's server actor)
    async fn find_local_actor(&self, name: &str) -> Result<Option<PeerIdentity>>;

    async fn insert_actor(&self, actor: NewActor) -> Result<PeerIdentity>;
}

/// Follow relationship storage and score maintenance
#[async_trait::async_trait]
pub trait FollowStore: Send + Sync {
    /// Create a follow relationship
    ///
    /// An existing (follower, following) pair is returned unchanged.
    async fn insert_follow(
        &self,
        follower_id: i64,
        following_id: i64,
        state: FollowState,
        score: i64,
    ) -> Result<FollowEdge>;

    /// Add `delta` to every relationship whose follower receives at `inbox`
    ///
    /// Returns the number of relationships updated.
    async fn update_score_by_inbox(
        &self,
        inbox: &str,
        delta: i64,
        bounds: ScoreBounds,
    ) -> Result<u64>;

    /// Add `delta` to every relationship pointing at an actor on one of `hosts`
    async fn update_score_by_following_hosts(
        &self,
        hosts: &[String],
        delta: i64,
        bounds: ScoreBounds,
    ) -> Result<u64>;

    /// Delete relationships whose score is at or below `floor`
    ///
    /// Returns the number of relationships removed.
    async fn remove_follows_at_or_below(&self, floor: i64) -> Result<u64>;

    /// Subset of `hosts` that `follower_id` does not follow yet, in input order
    async fn keep_unfollowed_hosts(&self, follower_id: i64, hosts: &[String])
    -> Result<Vec<String>>;
}
