//! Pluggable decisions of the correlation engine
//!
//! - `CorrelationStrategy`: which group a message belongs to
//! - `ReleaseStrategy`: when a group is complete
//! - `MessageGroupProcessor`: what a completed group turns into

mod correlation;
mod processor;
mod release;

pub use correlation::{CorrelationStrategy, HeaderCorrelationStrategy};
pub use processor::{
    DefaultAggregatingProcessor, MessageGroupProcessor, PassThroughProcessor,
    ResequencingProcessor,
};
pub use release::{GroupPredicate, MessagePredicate, ReleaseStrategy};

/// Error type returned by user-supplied strategy callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
