//! Time provider abstraction for testable time-dependent logic
//!
//! Message groups are stamped with wall-clock time so that expiry sweeps can
//! compare ages. Tests swap in `ManualTimeProvider` to move time explicitly.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub trait TimeProvider: Send + Sync {
    fn system_time(&self) -> SystemTime;
}

/// Production time provider using actual system time
#[derive(Debug, Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualTimeProvider {
    current: Arc<Mutex<SystemTime>>,
}

impl Default for ManualTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTimeProvider {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(SystemTime::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
    }

    pub fn set(&self, time: SystemTime) {
        *self.current.lock() = time;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn system_time(&self) -> SystemTime {
        *self.current.lock()
    }
}

/// Age of `since` relative to `now`; a clock going backwards counts as zero
pub fn elapsed_between(since: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(since).unwrap_or(Duration::ZERO)
}
