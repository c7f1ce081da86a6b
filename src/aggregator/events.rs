//! Lifecycle events published by correlating handlers
//!
//! Subscribers receive events over unbounded tokio channels. Publishing
//! never blocks; subscribers whose receiver has been dropped are removed on
//! the next publish.

use crate::message::CorrelationKey;
use parking_lot::Mutex;
use std::time::SystemTime;
use strum_macros::Display;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum AggregationEventType {
    /// Processor output for a group was delivered
    GroupReleased,
    /// Group removed without (complete) release: timeout, sweep or retries
    /// exhausted
    GroupExpired,
    MessageDiscarded,
    ForceCompleteRescheduled,
    ForceCompleteAbandoned,
}

#[derive(Clone, Debug)]
pub struct AggregationEvent {
    pub event_type: AggregationEventType,
    pub timestamp: SystemTime,
    pub handler: String,
    pub key: CorrelationKey,
    /// Messages involved: released, discarded or still held
    pub message_count: usize,
    pub message: Option<String>,
}

impl AggregationEvent {
    pub fn new(
        event_type: AggregationEventType,
        handler: impl Into<String>,
        key: CorrelationKey,
        message_count: usize,
    ) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            handler: handler.into(),
            key,
            message_count,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

struct Subscriber {
    id: String,
    sender: UnboundedSender<AggregationEvent>,
}

#[derive(Default)]
pub struct EventPublisher {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber_id: impl Into<String>) -> UnboundedReceiver<AggregationEvent> {
        let (sender, receiver) = unbounded_channel();
        let id = subscriber_id.into();
        let mut subscribers = self.subscribers.lock();

        if let Some(existing) = subscribers.iter_mut().find(|s| s.id == id) {
            log::warn!("Subscriber '{}' replaced an existing subscription", id);
            existing.sender = sender;
        } else {
            subscribers.push(Subscriber { id, sender });
        }
        receiver
    }

    pub fn publish(&self, event: AggregationEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| match subscriber.sender.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                log::debug!(
                    "Subscriber '{}' closed its receiver; unsubscribing",
                    subscriber.id
                );
                false
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
