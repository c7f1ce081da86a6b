//! Message and header types
//!
//! Header names for correlation and sequencing are conventions, not protocol:
//! the correlation header used by a handler is configurable, the sequence
//! headers below are what the sequence-aware strategies read.

use crate::message::CorrelationKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Default correlation header name
pub const CORRELATION_ID: &str = "correlation_id";
/// 1-based position of a message within its sequence
pub const SEQUENCE_NUMBER: &str = "sequence_number";
/// Total number of messages in the sequence
pub const SEQUENCE_SIZE: &str = "sequence_size";

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_message_id() -> u64 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Header information carried by every message
///
/// The `id` is assigned from a process counter on construction (or on
/// deserialization when absent). Ids read from input and clones repeat, so
/// the id labels a message in logs and errors but does not identify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default = "next_message_id")]
    pub id: u64,
    #[serde(skip, default = "SystemTime::now")]
    pub timestamp: SystemTime,
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self {
            id: next_message_id(),
            timestamp: SystemTime::now(),
            values: BTreeMap::new(),
        }
    }
}

/// Immutable message: headers plus a JSON payload
///
/// # Example
///
/// ```rust
/// use correlator::message::Message;
///
/// let message = Message::new(7)
///     .with_correlation_id("order-1")
///     .with_sequence(1, 3);
///
/// assert_eq!(message.sequence_number(), Some(1));
/// assert_eq!(message.sequence_size(), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "headers", default)]
    pub header: MessageHeader,
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            header: MessageHeader::default(),
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.header.id
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.header.values.insert(name.into(), value.into());
        self
    }

    pub fn with_correlation_id(self, key: impl Into<CorrelationKey>) -> Self {
        let key: CorrelationKey = key.into();
        self.with_header(CORRELATION_ID, key)
    }

    pub fn with_sequence(self, number: u32, size: u32) -> Self {
        self.with_header(SEQUENCE_NUMBER, number)
            .with_header(SEQUENCE_SIZE, size)
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.header.values.get(name)
    }

    pub fn correlation_id(&self) -> Option<CorrelationKey> {
        self.header(CORRELATION_ID)
            .and_then(CorrelationKey::from_value)
    }

    pub fn sequence_number(&self) -> Option<u32> {
        self.numeric_header(SEQUENCE_NUMBER)
    }

    pub fn sequence_size(&self) -> Option<u32> {
        self.numeric_header(SEQUENCE_SIZE)
    }

    fn numeric_header(&self, name: &str) -> Option<u32> {
        self.header(name)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::new("a");
        let b = Message::new("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_sequence_headers_ignore_non_numeric_values() {
        let message = Message::new(json!(null)).with_header(SEQUENCE_NUMBER, "first");
        assert_eq!(message.sequence_number(), None);
    }

    #[test]
    fn test_json_line_deserialization_assigns_id() {
        let line = r#"{"headers":{"correlation_id":"a","sequence_number":2,"sequence_size":3},"payload":[1,2]}"#;
        let message: Message = serde_json::from_str(line).unwrap();

        assert!(message.id() > 0);
        assert_eq!(message.correlation_id(), Some(CorrelationKey::from("a")));
        assert_eq!(message.sequence_number(), Some(2));
        assert_eq!(message.sequence_size(), Some(3));
        assert_eq!(message.payload, json!([1, 2]));
    }

    #[test]
    fn test_serialized_message_keeps_id_inside_headers() {
        let message = Message::new(1).with_correlation_id("k");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["headers"]["id"], json!(message.id()));
        assert_eq!(value["headers"]["correlation_id"], json!("k"));
        assert_eq!(value["payload"], json!(1));
    }
}
