// ============================================================================
// Jobs - outbound work handed to the job workers
// ============================================================================
//
// Producers never wait on the queue: create_job_async() returns immediately
// and failures are logged by the queue itself.
//
// ============================================================================

mod memory;
mod redis_streams;

pub use memory::MemoryJobQueue;
pub use redis_streams::RedisJobQueue;

use serde::{Deserialize, Serialize};

/// Payload of an `activitypub-follow` job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowJobPayload {
    /// Host to follow
    pub host: String,
    /// Preferred username of the remote actor to follow
    pub name: String,
    pub follower_actor_id: i64,
    pub is_auto_follow: bool,
}

/// Payload of an `activitypub-inbox` job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxJobPayload {
    pub activity: serde_json::Value,
    /// Actor that signed the delivering request
    pub signature_actor_id: i64,
    /// Local recipient for per-account inboxes, `None` for the shared inbox
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Job {
    #[serde(rename = "activitypub-follow")]
    ActivityPubFollow(FollowJobPayload),
    #[serde(rename = "activitypub-inbox")]
    ActivityPubInbox(InboxJobPayload),
}

impl Job {
    pub fn job_type(&self) -> &'static str {
        match self {
            Job::ActivityPubFollow(_) => "activitypub-follow",
            Job::ActivityPubInbox(_) => "activitypub-inbox",
        }
    }

    /// JSON encoding of the payload alone
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            Job::ActivityPubFollow(payload) => serde_json::to_string(payload),
            Job::ActivityPubInbox(payload) => serde_json::to_string(payload),
        }
    }
}

/// Fire-and-forget job emission
pub trait JobQueue: Send + Sync {
    fn create_job_async(&self, job: Job);
}
