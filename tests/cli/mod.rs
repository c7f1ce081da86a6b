//! CLI integration test modules

pub mod aggregation;
pub mod configuration;
pub mod resequencing;
pub mod timeouts;
