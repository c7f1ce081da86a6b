//! Retry policy for deferred deliveries
//!
//! Failed force-complete deliveries are rescheduled rather than dropped. The
//! policy bounds how many attempts are made and the delay used when no
//! group timeout supplies its own cadence.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one; `None` retries forever
    pub max_attempts: Option<u32>,
    #[serde(rename = "delay_ms", with = "crate::core::duration_ms")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    /// Whether another attempt may follow `failed_attempts` failures
    pub fn allows_retry(&self, failed_attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => failed_attempts < max,
            None => true,
        }
    }
}
