//! Aggregator Error Types

use crate::aggregator::config::ConfigError;
use crate::channel::ChannelError;
use crate::core::error_handling::ContextualError;
use crate::message::{CorrelationKey, Message};
use crate::store::StoreError;
use crate::strategy::BoxError;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("No correlation key could be derived from message {message_id}")]
    MissingCorrelationKey { message_id: u64 },

    #[error("Timed out after {timeout:?} waiting for the lock on group [{key}]")]
    LockTimeout {
        key: CorrelationKey,
        timeout: Duration,
    },

    #[error("Release strategy failed for group [{key}]: {source}")]
    ReleaseStrategy { key: CorrelationKey, source: BoxError },

    #[error("Group processor failed for group [{key}]: {source}")]
    Processor { key: CorrelationKey, source: BoxError },

    #[error("Failed to deliver output of group [{key}]: {source}")]
    Delivery {
        key: CorrelationKey,
        source: ChannelError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Group [{key}] is inconsistent: {detail}")]
    InvariantViolation { key: CorrelationKey, detail: String },

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

/// Result type for aggregator operations
pub type AggregatorResult<T> = Result<T, AggregatorError>;

impl ContextualError for AggregatorError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, AggregatorError::Configuration(_))
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AggregatorError::Configuration(e) => e.user_message(),
            _ => None,
        }
    }
}

/// Failure of a `handle()` call, carrying the message that was rejected
#[derive(Debug, thiserror::Error)]
#[error("Failed to handle message {id}: {source}", id = .message.id())]
pub struct MessagingError {
    pub message: Arc<Message>,
    #[source]
    pub source: AggregatorError,
}

impl MessagingError {
    pub fn new(message: Arc<Message>, source: AggregatorError) -> Self {
        Self { message, source }
    }

    pub fn message(&self) -> &Arc<Message> {
        &self.message
    }

    pub fn cause(&self) -> &AggregatorError {
        &self.source
    }
}

impl ContextualError for MessagingError {
    fn is_user_actionable(&self) -> bool {
        self.source.is_user_actionable()
    }

    fn user_message(&self) -> Option<&str> {
        self.source.user_message()
    }
}
