// ============================================================================
// Task Scheduler - Recurring background tasks
// ============================================================================
//
// Every periodic job in the server runs through a TaskScheduler:
// - fixed interval, optional random first run in [0, interval/2)
// - single-flight: a tick that fires while the body is still running is
//   dropped, never queued
// - errors and panics raised by the body are logged with the task name and
//   never escape the scheduler
//
// There is no per-tick timeout. A body that never resolves keeps the
// single-flight flag set, so every later tick of that scheduler is skipped.
//
// ============================================================================

mod registry;

pub use registry::SchedulerRegistry;

use async_trait::async_trait;
use futures_util::FutureExt;
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use trellis_error::{AppError, AppResult};

use crate::metrics;

/// Body of a recurring task
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    /// Name used in logs and metrics
    fn name(&self) -> &'static str;

    async fn run(&self) -> AppResult<()>;
}

/// How a single guarded invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Failed,
    /// The previous invocation was still running
    Skipped,
}

impl TickOutcome {
    fn as_label(self) -> &'static str {
        match self {
            TickOutcome::Completed => "completed",
            TickOutcome::Failed => "failed",
            TickOutcome::Skipped => "skipped",
        }
    }
}

/// Runs a [`ScheduledTask`] at a fixed interval
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    task: Arc<dyn ScheduledTask>,
    interval: Duration,
    random_first_run: bool,
    running: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(task: Arc<dyn ScheduledTask>, interval: Duration) -> Self {
        Self::build(task, interval, false)
    }

    /// Delay the first run by a random amount in `[0, interval/2)`
    ///
    /// Servers started around the same time (after an upgrade, for instance)
    /// would otherwise hit shared services in lockstep.
    pub fn with_random_first_run(task: Arc<dyn ScheduledTask>, interval: Duration) -> Self {
        Self::build(task, interval, true)
    }

    fn build(task: Arc<dyn ScheduledTask>, interval: Duration, random_first_run: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                task,
                interval,
                random_first_run,
                running: AtomicBool::new(false),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.task.name()
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Start periodic execution
    ///
    /// Must be called from within a tokio runtime. Calling it on an already
    /// enabled scheduler does nothing.
    pub fn enable(&self) -> AppResult<()> {
        let name = self.name();
        if self.inner.interval.is_zero() {
            return Err(AppError::config(format!(
                "Interval is not correctly set for the {} scheduler",
                name
            )));
        }

        let mut timer = self
            .inner
            .timer
            .lock()
            .map_err(|_| AppError::internal("scheduler timer lock poisoned"))?;

        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::warn!(task = name, "Scheduler already enabled, ignoring");
            return Ok(());
        }

        let first_delay = self
            .inner
            .random_first_run
            .then(|| first_run_delay(self.inner.interval));

        tracing::info!(
            task = name,
            interval_ms = self.inner.interval.as_millis() as u64,
            first_delay_ms = first_delay.map(|d| d.as_millis() as u64),
            "Enabling scheduler"
        );

        let inner = self.inner.clone();
        *timer = Some(tokio::spawn(inner.drive(first_delay)));
        Ok(())
    }

    /// Cancel pending timers. A body that is already running completes.
    ///
    /// Returns `true` if the scheduler was enabled.
    pub fn disable(&self) -> bool {
        let handle = match self.inner.timer.lock() {
            Ok(mut timer) => timer.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match handle {
            Some(handle) => {
                handle.abort();
                tracing::info!(task = self.name(), "Scheduler disabled");
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner
            .timer
            .lock()
            .map(|timer| timer.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Whether a body is currently executing
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Run the task body once, honouring the single-flight guard
    pub async fn execute(&self) -> TickOutcome {
        self.inner.execute().await
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.disable();
    }
}

impl Inner {
    async fn drive(self: Arc<Self>, first_delay: Option<Duration>) {
        if let Some(delay) = first_delay {
            time::sleep(delay).await;
            // Spawned so that disable() during the first run leaves the body alone.
            // The recurring interval only starts once this run is over.
            let inner = self.clone();
            if let Err(e) = tokio::spawn(async move { inner.execute().await }).await {
                tracing::error!(
                    task = self.task.name(),
                    error = %e,
                    "First run did not complete"
                );
            }
        }

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let inner = self.clone();
            tokio::spawn(async move {
                inner.execute().await;
            });
        }
    }

    async fn execute(&self) -> TickOutcome {
        let name = self.task.name();

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(task = name, "Previous run still in progress, skipping tick");
            return record(name, TickOutcome::Skipped);
        }
        let _guard = RunningGuard(&self.running);

        let outcome = match AssertUnwindSafe(self.task.run()).catch_unwind().await {
            Ok(Ok(())) => TickOutcome::Completed,
            Ok(Err(err)) => {
                tracing::error!(
                    task = name,
                    error = %err,
                    error_code = err.error_code(),
                    "Cannot execute scheduler"
                );
                TickOutcome::Failed
            }
            Err(panic) => {
                tracing::error!(
                    task = name,
                    panic = %panic_message(panic.as_ref()),
                    "Scheduler body panicked"
                );
                TickOutcome::Failed
            }
        };

        record(name, outcome)
    }
}

/// Clears the single-flight flag even if the body unwinds
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn record(name: &'static str, outcome: TickOutcome) -> TickOutcome {
    metrics::SCHEDULER_RUNS_TOTAL
        .with_label_values(&[name, outcome.as_label()])
        .inc();
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Uniform random delay in `[0, interval/2)` at millisecond resolution
pub fn first_run_delay(interval: Duration) -> Duration {
    let half_ms = (interval.as_millis() / 2) as u64;
    if half_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..half_ms))
}
