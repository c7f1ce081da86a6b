//! Channel Error Types

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel '{channel}' is full (capacity: {capacity})")]
    Full { channel: String, capacity: usize },

    #[error("Send to channel '{channel}' timed out after {timeout:?}")]
    SendTimeout { channel: String, timeout: Duration },

    #[error("Channel '{channel}' rejected message: {reason}")]
    Rejected { channel: String, reason: String },
}

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;
