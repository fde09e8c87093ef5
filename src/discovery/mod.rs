// ============================================================================
// Discovery - pull-based peer discovery from a shared instance index
// ============================================================================
//
// The index answers GET <url>?count=1000[&since=<RFC 3339>] with
// { "data": [ { "host": "..." }, ... ] }. Hosts we do not follow yet get an
// auto-follow job.
//
// ============================================================================

mod client;
mod scheduler;

pub use client::{IndexClient, parse_index_hosts};
pub use scheduler::IndexDiscoveryScheduler;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trellis_error::AppResult;

/// Source of candidate peer hosts
#[async_trait]
pub trait DiscoveryIndex: Send + Sync {
    /// Hosts registered in the index, restricted to those added after `since`
    /// when given
    async fn fetch_hosts(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<String>>;

    /// Where the index lives, for logs
    fn url(&self) -> &str;
}
