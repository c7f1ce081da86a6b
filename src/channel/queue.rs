//! Bounded blocking queue channel
//!
//! Producers block in `send` while the queue is at capacity, up to the send
//! timeout. Consumers block in `receive` up to their own timeout.

use crate::channel::{ChannelError, ChannelResult, MessageChannel};
use crate::message::Message;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-to-point queue with optional capacity
#[derive(Debug)]
pub struct QueueChannel {
    name: String,
    capacity: usize,
    messages: Mutex<VecDeque<Arc<Message>>>,
    not_empty: Condvar,
    not_full: Condvar,
    /// Total number of messages accepted since creation
    accepted: AtomicU64,
}

impl QueueChannel {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            messages: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            accepted: AtomicU64::new(0),
        }
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, usize::MAX)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Take the next message without waiting
    pub fn try_receive(&self) -> Option<Arc<Message>> {
        let message = self.messages.lock().pop_front();
        if message.is_some() {
            self.not_full.notify_one();
        }
        message
    }

    /// Wait up to `timeout` for the next message
    pub fn receive(&self, timeout: Duration) -> Option<Arc<Message>> {
        let deadline = deadline_after(timeout);
        let mut messages = self.messages.lock();
        while messages.is_empty() {
            if self.not_empty.wait_until(&mut messages, deadline).timed_out() {
                break;
            }
        }
        let message = messages.pop_front();
        drop(messages);
        if message.is_some() {
            self.not_full.notify_one();
        }
        message
    }

    /// Remove and return everything currently queued
    pub fn drain(&self) -> Vec<Arc<Message>> {
        let drained: Vec<_> = self.messages.lock().drain(..).collect();
        self.not_full.notify_all();
        drained
    }
}

impl MessageChannel for QueueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Arc<Message>, timeout: Duration) -> ChannelResult<()> {
        let deadline = deadline_after(timeout);
        let mut messages = self.messages.lock();

        while messages.len() >= self.capacity {
            if timeout.is_zero() {
                return Err(ChannelError::Full {
                    channel: self.name.clone(),
                    capacity: self.capacity,
                });
            }
            if self.not_full.wait_until(&mut messages, deadline).timed_out()
                && messages.len() >= self.capacity
            {
                return Err(ChannelError::SendTimeout {
                    channel: self.name.clone(),
                    timeout,
                });
            }
        }

        messages.push_back(message);
        drop(messages);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_one();
        Ok(())
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365))
}
