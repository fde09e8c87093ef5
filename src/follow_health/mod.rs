// ============================================================================
// Follow Health - scoring and pruning of outbound follow relationships
// ============================================================================
//
// The delivery path reports outcomes into FollowHealthCache without touching
// the store. FollowHealthScheduler periodically drains the cache, commits the
// score changes and removes relationships that reached the failure floor.
//
// ============================================================================

mod cache;
mod scheduler;

pub use cache::{FollowHealthCache, PendingHealth};
pub use scheduler::FollowHealthScheduler;
