//! Correlation engine
//!
//! Handlers group inbound messages by correlation key, hold them in a
//! `MessageGroupStore` and release them according to a `ReleaseStrategy`:
//!
//! - `CorrelatingMessageHandler` releases a complete group as a whole
//!   (aggregator)
//! - `ResequencingMessageHandler` releases messages in sequence order as
//!   gaps are filled (resequencer)
//!
//! Incomplete groups can be force completed by a group timeout, a periodic
//! `Reaper` sweep or an explicit `force_complete` call.

pub mod config;
pub mod error;
pub mod events;
mod handler;
mod locks;
pub mod reaper;
mod resequencer;
pub mod scheduler;
mod stats;
pub mod timeout;

pub use config::{AggregatorConfig, ConfigError};
pub use error::{AggregatorError, AggregatorResult, MessagingError};
pub use events::{AggregationEvent, AggregationEventType, EventPublisher};
pub use handler::{AggregatorBuilder, CorrelatingMessageHandler};
pub use reaper::Reaper;
pub use resequencer::{ResequencerBuilder, ResequencingMessageHandler};
pub use scheduler::{ScheduledTask, TaskId, TaskScheduler};
pub use stats::HandlerStatistics;
pub use timeout::{GroupTimeout, TimeoutExpression};

#[cfg(test)]
mod tests;
