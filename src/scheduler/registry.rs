use super::TaskScheduler;
use trellis_error::AppResult;

/// Owns every scheduler of the process
///
/// Built once by the composition root and kept alive until shutdown; dropping
/// it disables all schedulers.
#[derive(Default)]
pub struct SchedulerRegistry {
    schedulers: Vec<TaskScheduler>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheduler: TaskScheduler) -> &mut Self {
        self.schedulers.push(scheduler);
        self
    }

    /// Enable all registered schedulers
    ///
    /// Stops at the first configuration error and disables whatever was
    /// already started, so a misconfigured process never runs half its tasks.
    pub fn enable_all(&self) -> AppResult<()> {
        for scheduler in &self.schedulers {
            if let Err(err) = scheduler.enable() {
                tracing::error!(
                    task = scheduler.name(),
                    error = %err,
                    "Failed to enable scheduler"
                );
                self.disable_all();
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn disable_all(&self) {
        for scheduler in &self.schedulers {
            scheduler.disable();
        }
    }

    pub fn get(&self, name: &str) -> Option<&TaskScheduler> {
        self.schedulers.iter().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }
}
