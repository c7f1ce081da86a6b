//! Store Error Types

use crate::message::CorrelationKey;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Message store is full (capacity: {capacity} messages)")]
    CapacityExceeded { capacity: usize },

    #[error("Message group [{key}] is complete and cannot accept messages")]
    GroupComplete { key: CorrelationKey },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
