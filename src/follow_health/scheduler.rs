use super::{FollowHealthCache, PendingHealth};
use crate::metrics;
use crate::scheduler::ScheduledTask;
use crate::store::{FollowStore, ScoreBounds};
use async_trait::async_trait;
use std::sync::Arc;
use trellis_config::FollowScoreConfig;
use trellis_error::{AppError, AppResult};

/// Commits cached delivery outcomes to the follow store
///
/// Runs at a fixed interval without jitter. Per tick: drain, per-inbox
/// deltas, bulk bad then good hosts, then the sweep.
pub struct FollowHealthScheduler {
    cache: Arc<FollowHealthCache>,
    store: Arc<dyn FollowStore>,
    scores: FollowScoreConfig,
}

impl FollowHealthScheduler {
    pub const NAME: &'static str = "actor-follow-scores";

    pub fn new(
        cache: Arc<FollowHealthCache>,
        store: Arc<dyn FollowStore>,
        scores: FollowScoreConfig,
    ) -> Self {
        Self {
            cache,
            store,
            scores,
        }
    }

    async fn commit(&self, pending: PendingHealth) -> AppResult<()> {
        let bounds = ScoreBounds::from(&self.scores);
        let mut updated = 0u64;

        for (inbox, delta) in pending.scores.iter().filter(|(_, d)| **d != 0) {
            updated += self
                .store
                .update_score_by_inbox(inbox, *delta, bounds)
                .await
                .map_err(|e| {
                    AppError::persistence(format!("updating score of {}: {:#}", inbox, e))
                })?;
        }

        // Bulk adjustments come strictly after the per-inbox ones and stack on them
        for (hosts, delta, label) in [
            (&pending.bad_hosts, self.scores.penalty, "bad"),
            (&pending.good_hosts, self.scores.bonus, "good"),
        ] {
            if hosts.is_empty() {
                continue;
            }
            let hosts: Vec<String> = hosts.iter().cloned().collect();
            updated += self
                .store
                .update_score_by_following_hosts(&hosts, delta, bounds)
                .await
                .map_err(|e| {
                    AppError::persistence(format!("updating {} hosts: {:#}", label, e))
                })?;
        }

        metrics::FOLLOW_SCORE_UPDATES_TOTAL.inc_by(updated);
        tracing::debug!(updated, "Committed follow scores");
        Ok(())
    }

    async fn remove_bad_follows(&self) {
        match self
            .store
            .remove_follows_at_or_below(self.scores.failure_floor)
            .await
        {
            Ok(0) => {}
            Ok(removed) => {
                metrics::FOLLOWS_REMOVED_TOTAL.inc_by(removed);
                tracing::info!(removed, "Removed bad follows");
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot remove bad follows");
            }
        }
    }
}

#[async_trait]
impl ScheduledTask for FollowHealthScheduler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self) -> AppResult<()> {
        let pending = self.cache.drain();
        if !pending.is_empty() {
            tracing::debug!(
                inboxes = pending.scores.len(),
                bad_hosts = pending.bad_hosts.len(),
                good_hosts = pending.good_hosts.len(),
                "Processing pending follow scores"
            );
            self.commit(pending).await?;
        }

        self.remove_bad_follows().await;
        Ok(())
    }
}
