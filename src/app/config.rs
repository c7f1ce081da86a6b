//! Binary configuration file
//!
//! ```toml
//! mode = "resequencer"
//! output_capacity = 1024
//!
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [aggregator]
//! group_timeout_ms = 500
//! send_partial_result_on_timeout = true
//! ```
//!
//! Without `--config-file` the default location
//! `<config dir>/correlator/correlator.toml` is used when it exists.

use crate::aggregator::{AggregatorConfig, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Release each complete group as one aggregated message
    #[default]
    Aggregator,
    /// Release messages in sequence order
    Resequencer,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<PathBuf>,
    pub color: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub mode: Mode,
    /// Released messages buffered ahead of the stdout writer
    pub output_capacity: usize,
    /// Discarded messages are written here as JSON lines when set
    pub discard_file: Option<PathBuf>,
    pub discard_capacity: usize,
    pub logging: LoggingConfig,
    /// Absent table means engine defaults for the selected mode
    pub aggregator: Option<AggregatorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            output_capacity: 1024,
            discard_file: None,
            discard_capacity: 1024,
            logging: LoggingConfig::default(),
            aggregator: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::invalid(format!("Error parsing configuration: {}", e)))
    }

    /// Load the configuration file, if one applies
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let path = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::invalid(format!(
                        "The specified configuration file does not exist: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(None),
            },
        };

        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::File {
            path: path.clone(),
            message: format!("Error reading configuration file {}: {}", path.display(), e),
        })?;
        let config = toml::from_str(&contents).map_err(|e| ConfigError::File {
            path: path.clone(),
            message: format!("Error parsing configuration file {}: {}", path.display(), e),
        })?;
        Ok(Some((path, config)))
    }

    /// Engine configuration for the selected mode
    pub fn aggregator_config(&self) -> AggregatorConfig {
        match (&self.aggregator, self.mode) {
            (Some(config), _) => config.clone(),
            (None, Mode::Aggregator) => AggregatorConfig::default(),
            (None, Mode::Resequencer) => AggregatorConfig::resequencer(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("correlator").join("correlator.toml"))
}
