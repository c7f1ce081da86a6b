//! Correlation strategies

use crate::message::{CorrelationKey, Message, CORRELATION_ID};

/// Computes the correlation key of an inbound message
///
/// Returning `None` means no key can be derived; handlers reject such
/// messages. Implementations must be pure: the same message always maps to
/// the same key.
///
/// Any `Fn(&Message) -> Option<CorrelationKey>` closure is a strategy:
///
/// ```rust
/// use correlator::message::{CorrelationKey, Message};
/// use correlator::strategy::CorrelationStrategy;
///
/// let by_payload = |m: &Message| m.payload["order"].as_str().map(CorrelationKey::from);
/// let message = Message::new(serde_json::json!({"order": "o-7"}));
/// assert_eq!(by_payload.correlation_key(&message), Some(CorrelationKey::from("o-7")));
/// ```
pub trait CorrelationStrategy: Send + Sync {
    fn correlation_key(&self, message: &Message) -> Option<CorrelationKey>;
}

impl<F> CorrelationStrategy for F
where
    F: Fn(&Message) -> Option<CorrelationKey> + Send + Sync,
{
    fn correlation_key(&self, message: &Message) -> Option<CorrelationKey> {
        self(message)
    }
}

/// Reads the key from a named header (default `correlation_id`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCorrelationStrategy {
    header: String,
}

impl Default for HeaderCorrelationStrategy {
    fn default() -> Self {
        Self::new(CORRELATION_ID)
    }
}

impl HeaderCorrelationStrategy {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

impl CorrelationStrategy for HeaderCorrelationStrategy {
    fn correlation_key(&self, message: &Message) -> Option<CorrelationKey> {
        message
            .header(&self.header)
            .and_then(CorrelationKey::from_value)
    }
}
