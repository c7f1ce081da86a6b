//! Message model consumed by the correlation engine
//!
//! Messages are immutable value objects: a header bag (with a generated id)
//! plus a JSON payload. The engine never mutates a message after it has been
//! handed to a handler; messages are shared between groups, channels and
//! callers as `Arc<Message>`.

mod key;
mod message;

pub use key::CorrelationKey;
pub use message::{Message, MessageHeader, CORRELATION_ID, SEQUENCE_NUMBER, SEQUENCE_SIZE};
