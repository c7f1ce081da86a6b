//! Deferred task scheduling on a shared tokio runtime
//!
//! Tasks are fire-once (or fixed-rate) and cancellable. Task bodies run on
//! the blocking pool since they take per-key locks and may block on channel
//! sends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub type TaskId = u64;

#[derive(Clone)]
pub struct TaskScheduler {
    runtime: Handle,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("scheduled", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl TaskScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Scheduler on the runtime the caller is running in, if any
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Run `task` once after `delay`; the task receives its own id
    pub fn schedule<F>(&self, delay: Duration, task: F) -> ScheduledTask
    where
        F: FnOnce(TaskId) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::task::spawn_blocking(move || task(id)).await {
                log::error!("Scheduled task {} failed: {}", id, e);
            }
        });
        log::trace!("Scheduled task {} in {:?}", id, delay);
        ScheduledTask { id, handle }
    }

    /// Run `task` every `period`, first after one full period
    pub fn schedule_at_fixed_rate<F>(&self, period: Duration, task: F) -> ScheduledTask
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(task);
        let handle = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let task = Arc::clone(&task);
                if let Err(e) = tokio::task::spawn_blocking(move || task()).await {
                    log::error!("Periodic task {} failed: {}", id, e);
                }
            }
        });
        ScheduledTask { id, handle }
    }
}

/// Handle to a scheduled task
///
/// Cancelling stops a task that has not started yet. A body already running
/// on the blocking pool completes, so task bodies must check they are still
/// current before acting.
#[derive(Debug)]
pub struct ScheduledTask {
    id: TaskId,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
