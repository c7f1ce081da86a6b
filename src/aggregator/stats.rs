//! Handler counters

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct HandlerCounters {
    messages_handled: AtomicU64,
    groups_released: AtomicU64,
    groups_expired: AtomicU64,
    messages_discarded: AtomicU64,
    force_complete_retries: AtomicU64,
    force_complete_abandoned: AtomicU64,
}

/// Point-in-time copy of a handler's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerStatistics {
    pub messages_handled: u64,
    pub groups_released: u64,
    pub groups_expired: u64,
    pub messages_discarded: u64,
    pub force_complete_retries: u64,
    pub force_complete_abandoned: u64,
}

impl HandlerCounters {
    pub(crate) fn message_handled(&self) {
        self.messages_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn group_released(&self) {
        self.groups_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn group_expired(&self) {
        self.groups_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn messages_discarded(&self, count: usize) {
        self.messages_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn force_complete_retried(&self) {
        self.force_complete_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn force_complete_abandoned(&self) {
        self.force_complete_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HandlerStatistics {
        HandlerStatistics {
            messages_handled: self.messages_handled.load(Ordering::Relaxed),
            groups_released: self.groups_released.load(Ordering::Relaxed),
            groups_expired: self.groups_expired.load(Ordering::Relaxed),
            messages_discarded: self.messages_discarded.load(Ordering::Relaxed),
            force_complete_retries: self.force_complete_retries.load(Ordering::Relaxed),
            force_complete_abandoned: self.force_complete_abandoned.load(Ordering::Relaxed),
        }
    }
}
