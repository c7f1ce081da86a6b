//! Group processors turn a releasable group into outbound messages

use crate::message::{Message, SEQUENCE_NUMBER, SEQUENCE_SIZE};
use crate::store::MessageGroup;
use crate::strategy::BoxError;
use serde_json::Value;
use std::sync::Arc;

/// Builds zero, one or many outbound messages from a group snapshot
pub trait MessageGroupProcessor: Send + Sync {
    fn process(&self, group: &MessageGroup) -> Result<Vec<Message>, BoxError>;
}

impl<F> MessageGroupProcessor for F
where
    F: Fn(&MessageGroup) -> Result<Vec<Message>, BoxError> + Send + Sync,
{
    fn process(&self, group: &MessageGroup) -> Result<Vec<Message>, BoxError> {
        self(group)
    }
}

/// Collects member payloads into one JSON array
///
/// Payloads are ordered by sequence number when present, insertion order
/// otherwise. Headers carrying the same value on every member are copied to
/// the result; sequence headers are not.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAggregatingProcessor;

impl MessageGroupProcessor for DefaultAggregatingProcessor {
    fn process(&self, group: &MessageGroup) -> Result<Vec<Message>, BoxError> {
        let ordered = group.messages_by_sequence();
        let first = match ordered.first() {
            Some(first) => first,
            None => return Ok(Vec::new()),
        };

        let payloads = ordered.iter().map(|m| m.payload.clone()).collect();
        let mut aggregated = Message::new(Value::Array(payloads));

        for (name, value) in &first.header.values {
            if name == SEQUENCE_NUMBER || name == SEQUENCE_SIZE {
                continue;
            }
            if ordered.iter().all(|m| m.header(name) == Some(value)) {
                aggregated = aggregated.with_header(name.clone(), value.clone());
            }
        }

        Ok(vec![aggregated])
    }
}

/// Emits every member unchanged, in sequence order
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughProcessor;

impl PassThroughProcessor {
    /// Held messages in emission order, sharing the group's entries
    pub fn select(&self, group: &MessageGroup) -> Vec<Arc<Message>> {
        group.messages_by_sequence()
    }
}

impl MessageGroupProcessor for PassThroughProcessor {
    fn process(&self, group: &MessageGroup) -> Result<Vec<Message>, BoxError> {
        Ok(owned(self.select(group)))
    }
}

/// Emits the contiguous run of messages following the last released
/// sequence number
///
/// Messages without a positive sequence number cannot be ordered and are
/// emitted after the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResequencingProcessor;

impl ResequencingProcessor {
    /// Held messages released next, sharing the group's entries
    pub fn select(&self, group: &MessageGroup) -> Vec<Arc<Message>> {
        let mut next = group.last_released_sequence() + 1;
        let mut released = Vec::new();
        let mut unnumbered = Vec::new();

        for message in group.messages_by_sequence() {
            match message.sequence_number() {
                Some(number) if number == next => {
                    released.push(message);
                    next += 1;
                }
                Some(number) if number > 0 => {}
                _ => unnumbered.push(message),
            }
        }

        released.extend(unnumbered);
        released
    }
}

impl MessageGroupProcessor for ResequencingProcessor {
    fn process(&self, group: &MessageGroup) -> Result<Vec<Message>, BoxError> {
        Ok(owned(self.select(group)))
    }
}

fn owned(messages: Vec<Arc<Message>>) -> Vec<Message> {
    messages.iter().map(|m| Message::clone(m)).collect()
}
