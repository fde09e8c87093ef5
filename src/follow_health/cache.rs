use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Everything recorded since the previous drain
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingHealth {
    /// Net score delta per inbox URL
    pub scores: HashMap<String, i64>,
    /// Hosts that failed as a whole this cycle
    pub bad_hosts: HashSet<String>,
    /// Hosts that answered as a whole this cycle
    pub good_hosts: HashSet<String>,
}

impl PendingHealth {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.bad_hosts.is_empty() && self.good_hosts.is_empty()
    }
}

/// In-memory accumulator of delivery outcomes
///
/// Many delivery callers write, the follow health scheduler drains. Every
/// operation holds the lock only for a map update, never across I/O, so
/// callers on the delivery path do not wait on the store.
#[derive(Debug)]
pub struct FollowHealthCache {
    pending: Mutex<PendingHealth>,
    penalty: i64,
    bonus: i64,
}

impl FollowHealthCache {
    /// `penalty` and `bonus` are the per-inbox adjustments used by
    /// [`record_delivery_outcomes`](Self::record_delivery_outcomes)
    pub fn new(penalty: i64, bonus: i64) -> Self {
        Self {
            pending: Mutex::new(PendingHealth::default()),
            penalty,
            bonus,
        }
    }

    /// Add `delta` to the pending total of `inbox`
    pub fn record_score(&self, inbox: &str, delta: i64) {
        let mut pending = self.lock();
        let total = pending.scores.entry(inbox.to_string()).or_insert(0);
        *total = total.saturating_add(delta);
    }

    pub fn record_bad_server(&self, host: &str) {
        self.lock().bad_hosts.insert(host.to_string());
    }

    pub fn record_good_server(&self, host: &str) {
        self.lock().good_hosts.insert(host.to_string());
    }

    /// Batch report from one delivery round
    ///
    /// Each good inbox earns the bonus, each bad inbox the penalty.
    pub fn record_delivery_outcomes<G, B>(&self, good_inboxes: G, bad_inboxes: B)
    where
        G: IntoIterator,
        G::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let mut pending = self.lock();
        for inbox in good_inboxes {
            let total = pending.scores.entry(inbox.as_ref().to_string()).or_insert(0);
            *total = total.saturating_add(self.bonus);
        }
        for inbox in bad_inboxes {
            let total = pending.scores.entry(inbox.as_ref().to_string()).or_insert(0);
            *total = total.saturating_add(self.penalty);
        }
    }

    /// Swap the pending collections for empty ones and return the old contents
    pub fn drain(&self) -> PendingHealth {
        std::mem::take(&mut *self.lock())
    }

    // A poisoned lock only means a writer panicked between two map operations;
    // the collections are still structurally valid.
    fn lock(&self) -> MutexGuard<'_, PendingHealth> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
