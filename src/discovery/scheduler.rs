use super::DiscoveryIndex;
use crate::jobs::{FollowJobPayload, Job, JobQueue};
use crate::scheduler::ScheduledTask;
use crate::store::{ActorStore, FollowStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trellis_config::AUTO_FOLLOW_BATCH_SIZE;
use trellis_error::{AppError, AppResult};

/// Follows every instance listed by the index that we do not follow yet
pub struct IndexDiscoveryScheduler {
    index: Arc<dyn DiscoveryIndex>,
    actors: Arc<dyn ActorStore>,
    follows: Arc<dyn FollowStore>,
    jobs: Arc<dyn JobQueue>,
    server_actor_name: String,
    enabled: AtomicBool,
    last_check: Mutex<Option<DateTime<Utc>>>,
}

impl IndexDiscoveryScheduler {
    pub const NAME: &'static str = "auto-follow-index-instances";

    pub fn new(
        index: Arc<dyn DiscoveryIndex>,
        actors: Arc<dyn ActorStore>,
        follows: Arc<dyn FollowStore>,
        jobs: Arc<dyn JobQueue>,
        server_actor_name: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            index,
            actors,
            follows,
            jobs,
            server_actor_name: server_actor_name.into(),
            enabled: AtomicBool::new(enabled),
            last_check: Mutex::new(None),
        }
    }

    /// Toggle discovery without touching the scheduler timer
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Time at which the last fetch was started
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        match self.last_check.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Advance the checkpoint to now and return the previous one
    fn advance_checkpoint(&self) -> Option<DateTime<Utc>> {
        let mut guard = match self.last_check.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.replace(Utc::now())
    }
}

#[async_trait]
impl ScheduledTask for IndexDiscoveryScheduler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self) -> AppResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let index_url = self.index.url();
        tracing::info!(index_url = %index_url, "Auto follow instances of index");

        let server_actor = self
            .actors
            .find_local_actor(&self.server_actor_name)
            .await
            .map_err(|e| AppError::persistence(format!("loading server actor: {:#}", e)))?
            .ok_or_else(|| {
                AppError::internal(format!("server actor {} not found", self.server_actor_name))
            })?;

        // Set before the request: a host registered while we fetch shows up next time
        let since = self.advance_checkpoint();

        let hosts = self.index.fetch_hosts(since).await?;

        let mut emitted = 0usize;
        for batch in hosts.chunks(AUTO_FOLLOW_BATCH_SIZE) {
            let unfollowed = self
                .follows
                .keep_unfollowed_hosts(server_actor.id, batch)
                .await
                .map_err(|e| AppError::persistence(format!("filtering followed hosts: {:#}", e)))?;

            for host in unfollowed {
                self.jobs
                    .create_job_async(Job::ActivityPubFollow(FollowJobPayload {
                        host,
                        name: self.server_actor_name.clone(),
                        follower_actor_id: server_actor.id,
                        is_auto_follow: true,
                    }));
                emitted += 1;
            }
        }

        tracing::info!(
            index_url = %index_url,
            listed = hosts.len(),
            emitted,
            "Auto follow of index instances done"
        );
        Ok(())
    }
}
