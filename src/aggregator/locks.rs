//! Per-key mutual exclusion
//!
//! Every correlation key gets its own mutex guarding the key's scheduling
//! state. Unrelated keys never contend. Entries are dropped from the registry
//! once no thread holds or waits for them and nothing is pending for the key.

use crate::aggregator::error::{AggregatorError, AggregatorResult};
use crate::aggregator::scheduler::{ScheduledTask, TaskId};
use crate::message::CorrelationKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// State kept per key alongside its lock
#[derive(Debug, Default)]
pub(crate) struct KeyState {
    pending: Option<ScheduledTask>,
    /// Consecutive failed force-complete deliveries
    pub(crate) failed_attempts: u32,
}

impl KeyState {
    /// Install `task` as the key's only pending task, cancelling the old one
    pub(crate) fn replace_pending(&mut self, task: Option<ScheduledTask>) {
        if let Some(previous) = std::mem::replace(&mut self.pending, task) {
            previous.cancel();
        }
    }

    pub(crate) fn cancel_pending(&mut self) {
        self.replace_pending(None);
    }

    /// Clear the pending slot if `task_id` still owns it
    ///
    /// Returns false for a task that was cancelled or replaced after it
    /// started running.
    pub(crate) fn claim(&mut self, task_id: TaskId) -> bool {
        match &self.pending {
            Some(task) if task.id() == task_id => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn is_idle(&self) -> bool {
        self.pending.is_none() && self.failed_attempts == 0
    }
}

type KeyLock = Arc<Mutex<KeyState>>;

pub(crate) struct LockRegistry {
    locks: Mutex<HashMap<CorrelationKey, KeyLock>>,
    timeout: Option<Duration>,
}

impl LockRegistry {
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Run `f` while holding the lock for `key`
    pub(crate) fn with_lock<R>(
        &self,
        key: &CorrelationKey,
        f: impl FnOnce(&mut KeyState) -> R,
    ) -> AggregatorResult<R> {
        let entry = Arc::clone(self.locks.lock().entry(key.clone()).or_default());

        let mut state = match self.timeout {
            Some(timeout) => entry
                .try_lock_for(timeout)
                .ok_or_else(|| AggregatorError::LockTimeout {
                    key: key.clone(),
                    timeout,
                })?,
            None => entry.lock(),
        };

        let result = f(&mut state);

        // Registry and our clone are the only references; nobody waits.
        if state.is_idle() {
            let mut locks = self.locks.lock();
            if let Some(current) = locks.get(key) {
                if Arc::ptr_eq(current, &entry) && Arc::strong_count(&entry) == 2 {
                    locks.remove(key);
                }
            }
        }

        Ok(result)
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
