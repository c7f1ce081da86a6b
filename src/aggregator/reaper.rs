//! Periodic expiry sweep

use crate::aggregator::scheduler::{ScheduledTask, TaskScheduler};
use crate::store::MessageGroupStore;
use std::sync::Arc;
use std::time::Duration;

/// Calls `expire_message_groups` on a store at a fixed rate
///
/// The sweep stops when the reaper is stopped or dropped.
pub struct Reaper {
    task: ScheduledTask,
    interval: Duration,
    group_age: Duration,
}

impl Reaper {
    pub fn start(
        store: Arc<dyn MessageGroupStore>,
        scheduler: &TaskScheduler,
        interval: Duration,
        group_age: Duration,
    ) -> Self {
        log::debug!(
            "Starting reaper: every {:?} for groups idle at least {:?}",
            interval,
            group_age
        );
        let task = scheduler.schedule_at_fixed_rate(interval, move || {
            let expired = store.expire_message_groups(group_age);
            if expired > 0 {
                log::info!("Reaper expired {} message group(s)", expired);
            }
        });
        Self {
            task,
            interval,
            group_age,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn group_age(&self) -> Duration {
        self.group_age
    }

    pub fn stop(&self) {
        self.task.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.task.cancel();
    }
}
