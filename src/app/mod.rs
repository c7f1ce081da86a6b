//! Command line application

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod startup;

pub use config::{AppConfig, LoggingConfig, Mode};
pub use driver::{run, RunSettings, RunSummary};
pub use error::AppError;
