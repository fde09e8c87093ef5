use super::{Job, JobQueue};
use crate::metrics;
use std::sync::Mutex;

/// Records jobs in memory instead of dispatching them
///
/// Used by tests and by local runs without Redis.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<Job>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs created so far, oldest first
    pub fn jobs(&self) -> Vec<Job> {
        match self.jobs.lock() {
            Ok(jobs) => jobs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn take(&self) -> Vec<Job> {
        match self.jobs.lock() {
            Ok(mut jobs) => std::mem::take(&mut *jobs),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl JobQueue for MemoryJobQueue {
    fn create_job_async(&self, job: Job) {
        metrics::JOBS_EMITTED_TOTAL
            .with_label_values(&[job.job_type()])
            .inc();

        match self.jobs.lock() {
            Ok(mut jobs) => jobs.push(job),
            Err(poisoned) => poisoned.into_inner().push(job),
        }
    }
}
