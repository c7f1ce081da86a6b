//! Command line arguments
//!
//! Every option that also exists in the configuration file overrides the
//! file's value when given.

use crate::aggregator::{AggregatorConfig, ConfigError};
use crate::app::config::{AppConfig, Mode};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "correlator")]
#[command(
    version,
    about = "Correlate JSON-lines messages into aggregated or resequenced output"
)]
pub struct Args {
    /// Configuration file path
    #[arg(long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Input file of JSON-lines messages (standard input when omitted or '-')
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Handler type
    #[arg(short = 'm', long = "mode", value_enum)]
    pub mode: Option<Mode>,

    /// Write discarded messages to this file as JSON lines
    #[arg(long = "discard-file", value_name = "FILE")]
    pub discard_file: Option<PathBuf>,

    /// Header holding the correlation key
    #[arg(long = "correlation-header", value_name = "NAME")]
    pub correlation_header: Option<String>,

    /// Fixed group timeout in milliseconds
    #[arg(
        long = "group-timeout-ms",
        value_name = "MS",
        conflicts_with = "group_timeout_expression"
    )]
    pub group_timeout_ms: Option<u64>,

    /// Group timeout computed from the group, e.g. "size() >= 2 ? 100 : null"
    #[arg(long = "group-timeout-expression", value_name = "EXPR")]
    pub group_timeout_expression: Option<String>,

    /// Release incomplete groups on timeout instead of discarding them
    #[arg(long = "send-partial-result-on-timeout", action = ArgAction::SetTrue)]
    pub send_partial_result_on_timeout: bool,

    /// Run the expiry sweep at this interval in milliseconds
    #[arg(long = "reaper-interval-ms", value_name = "MS")]
    pub reaper_interval_ms: Option<u64>,

    /// Complete every open group once the input is exhausted
    #[arg(long = "flush-on-exit", action = ArgAction::SetTrue)]
    pub flush_on_exit: bool,

    /// Wait this long after the input ends for pending group timeouts
    #[arg(long = "drain-ms", value_name = "MS", default_value_t = 0)]
    pub drain_ms: u64,

    /// Force colored output (overrides TTY detection)
    #[arg(long = "color", action = ArgAction::SetTrue)]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", action = ArgAction::SetTrue, conflicts_with = "color")]
    pub no_color: bool,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log level
    #[arg(long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Fold the command line over the configuration file
    pub fn apply_to(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.discard_file.is_some() {
            config.discard_file = self.discard_file.clone();
        }
        if self.log_level.is_some() {
            config.logging.level = self.log_level.clone();
        }
        if self.log_format.is_some() {
            config.logging.format = self.log_format.clone();
        }
        if self.log_file.is_some() {
            config.logging.file = self.log_file.clone();
        }
        if self.color {
            config.logging.color = Some(true);
        } else if self.no_color {
            config.logging.color = Some(false);
        }

        let mut aggregator = config.aggregator_config();
        self.apply_to_aggregator(&mut aggregator);
        aggregator.validate()?;
        config.aggregator = Some(aggregator);
        Ok(())
    }

    fn apply_to_aggregator(&self, config: &mut AggregatorConfig) {
        if let Some(header) = &self.correlation_header {
            config.correlation_header = header.clone();
        }
        // A timeout from the command line replaces either form from the file
        if let Some(ms) = self.group_timeout_ms {
            config.group_timeout = Some(Duration::from_millis(ms));
            config.group_timeout_expression = None;
        }
        if let Some(expression) = &self.group_timeout_expression {
            config.group_timeout_expression = Some(expression.clone());
            config.group_timeout = None;
        }
        if self.send_partial_result_on_timeout {
            config.send_partial_result_on_timeout = true;
        }
        if let Some(ms) = self.reaper_interval_ms {
            config.reaper_interval = Some(Duration::from_millis(ms));
        }
    }

    pub fn is_stdin(&self) -> bool {
        match &self.input {
            None => true,
            Some(path) => path.as_os_str() == "-",
        }
    }
}
