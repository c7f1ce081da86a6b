//! Message aggregation and resequencing
//!
//! Messages are correlated into groups by key, held in a
//! [`store::MessageGroupStore`] and released by a
//! [`aggregator::CorrelatingMessageHandler`] once a
//! [`strategy::ReleaseStrategy`] says the group is complete, or when the
//! group times out.

pub mod aggregator;
pub mod app;
pub mod channel;
pub mod core;
pub mod message;
pub mod store;
pub mod strategy;
