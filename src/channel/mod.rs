//! Message channels
//!
//! The correlation engine only needs a "send with timeout" sink for its
//! output and discard paths. `QueueChannel` is the minimal bounded blocking
//! queue used by tests and the binary; any other transport can implement
//! `MessageChannel` to receive released or discarded messages.

mod error;
mod queue;

pub use error::{ChannelError, ChannelResult};
pub use queue::QueueChannel;

use crate::message::Message;
use std::sync::Arc;
use std::time::Duration;

/// Sink for outbound messages
///
/// `send` may block up to `timeout` when the channel applies backpressure.
/// A zero timeout means "do not wait".
pub trait MessageChannel: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, message: Arc<Message>, timeout: Duration) -> ChannelResult<()>;
}
