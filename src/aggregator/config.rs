//! Aggregator configuration
//!
//! `AggregatorConfig` holds every tunable of a correlating handler. It can be
//! built in code or read from a TOML table; durations are written as integer
//! milliseconds:
//!
//! ```toml
//! correlation_header = "order_id"
//! send_partial_result_on_timeout = true
//! group_timeout_expression = "size() >= 2 ? 100 : null"
//! reaper_interval_ms = 5000
//!
//! [force_complete_retry]
//! max_attempts = 5
//! delay_ms = 250
//! ```

use crate::aggregator::timeout::GroupTimeout;
use crate::core::error_handling::ContextualError;
use crate::core::retry::RetryPolicy;
use crate::message::CORRELATION_ID;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration problems detected while loading or building a handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{message}")]
    Invalid { message: String },

    #[error("{message}")]
    File { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }

    fn file(path: &Path, message: String) -> Self {
        ConfigError::File {
            path: path.to_path_buf(),
            message,
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { message } | ConfigError::File { message, .. } => Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregatorConfig {
    /// Header read by the default correlation strategy
    pub correlation_header: String,
    /// Release what has accumulated when a group times out instead of
    /// discarding it
    pub send_partial_result_on_timeout: bool,
    /// Remove released groups; when false the key stays closed and late
    /// arrivals are discarded until an expiry sweep reopens it
    pub expire_groups_upon_completion: bool,
    /// Let the sequence-size strategy release contiguous runs early
    pub release_partial_sequences: bool,
    #[serde(rename = "send_timeout_ms", with = "crate::core::duration_ms")]
    pub send_timeout: Duration,
    /// Maximum wait for a per-key lock; unbounded when absent
    #[serde(
        rename = "lock_timeout_ms",
        deserialize_with = "crate::core::duration_ms::option::deserialize"
    )]
    pub lock_timeout: Option<Duration>,
    #[serde(
        rename = "group_timeout_ms",
        deserialize_with = "crate::core::duration_ms::option::deserialize"
    )]
    pub group_timeout: Option<Duration>,
    pub group_timeout_expression: Option<String>,
    #[serde(
        rename = "reaper_interval_ms",
        deserialize_with = "crate::core::duration_ms::option::deserialize"
    )]
    pub reaper_interval: Option<Duration>,
    /// Minimum idle age swept by the reaper; defaults to the interval
    #[serde(
        rename = "reaper_group_age_ms",
        deserialize_with = "crate::core::duration_ms::option::deserialize"
    )]
    pub reaper_group_age: Option<Duration>,
    pub force_complete_retry: RetryPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            correlation_header: CORRELATION_ID.to_string(),
            send_partial_result_on_timeout: false,
            expire_groups_upon_completion: true,
            release_partial_sequences: false,
            send_timeout: Duration::from_millis(1000),
            lock_timeout: None,
            group_timeout: None,
            group_timeout_expression: None,
            reaper_interval: None,
            reaper_group_age: None,
            force_complete_retry: RetryPolicy::default(),
        }
    }
}

impl AggregatorConfig {
    /// Defaults for a resequencer: contiguous runs are released as soon as
    /// they are available
    pub fn resequencer() -> Self {
        Self {
            release_partial_sequences: true,
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| {
            ConfigError::invalid(format!("Error parsing aggregator configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::file(
                path,
                format!("Error reading configuration file {}: {}", path.display(), e),
            )
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            ConfigError::file(
                path,
                format!("Error parsing configuration file {}: {}", path.display(), e),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.correlation_header.trim().is_empty() {
            return Err(ConfigError::invalid("correlation_header must not be empty"));
        }
        if self.group_timeout.is_some() && self.group_timeout_expression.is_some() {
            return Err(ConfigError::invalid(
                "group_timeout_ms and group_timeout_expression are mutually exclusive",
            ));
        }
        if let Some(expression) = &self.group_timeout_expression {
            GroupTimeout::expression(expression)?;
        }
        if self.reaper_interval == Some(Duration::ZERO) {
            return Err(ConfigError::invalid("reaper_interval_ms must be greater than 0"));
        }
        if self.reaper_group_age.is_some() && self.reaper_interval.is_none() {
            return Err(ConfigError::invalid(
                "reaper_group_age_ms requires reaper_interval_ms",
            ));
        }
        if self.force_complete_retry.max_attempts == Some(0) {
            return Err(ConfigError::invalid(
                "force_complete_retry.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    /// Group timeout described by this configuration, if any
    pub fn group_timeout(&self) -> Result<Option<GroupTimeout>, ConfigError> {
        match (&self.group_timeout, &self.group_timeout_expression) {
            (Some(_), Some(_)) => Err(ConfigError::invalid(
                "group_timeout_ms and group_timeout_expression are mutually exclusive",
            )),
            (Some(fixed), None) => Ok(Some(GroupTimeout::Fixed(*fixed))),
            (None, Some(expression)) => GroupTimeout::expression(expression).map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Age threshold used by the periodic sweep
    pub fn effective_reaper_group_age(&self) -> Option<Duration> {
        self.reaper_group_age.or(self.reaper_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AggregatorConfig::default();

        assert_eq!(config.correlation_header, "correlation_id");
        assert!(config.expire_groups_upon_completion);
        assert!(!config.send_partial_result_on_timeout);
        assert!(!config.release_partial_sequences);
        assert_eq!(config.send_timeout, Duration::from_millis(1000));
        assert_eq!(config.lock_timeout, None);
        assert!(config.validate().is_ok());
        assert!(AggregatorConfig::resequencer().release_partial_sequences);
    }

    #[test]
    fn test_from_toml_with_durations_in_millis() {
        let config = AggregatorConfig::from_toml_str(
            r#"
            correlation_header = "order_id"
            send_partial_result_on_timeout = true
            expire_groups_upon_completion = false
            send_timeout_ms = 50
            lock_timeout_ms = 2000
            group_timeout_ms = 300
            reaper_interval_ms = 1000

            [force_complete_retry]
            max_attempts = 3
            delay_ms = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.correlation_header, "order_id");
        assert!(config.send_partial_result_on_timeout);
        assert!(!config.expire_groups_upon_completion);
        assert_eq!(config.send_timeout, Duration::from_millis(50));
        assert_eq!(config.lock_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.group_timeout, Some(Duration::from_millis(300)));
        assert_eq!(
            config.effective_reaper_group_age(),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            config.force_complete_retry,
            RetryPolicy::bounded(3, Duration::from_millis(20))
        );
    }

    #[test]
    fn test_fixed_and_expression_timeouts_conflict() {
        let result = AggregatorConfig::from_toml_str(
            r#"
            group_timeout_ms = 100
            group_timeout_expression = "size() >= 2 ? 100 : null"
            "#,
        );
        let error = result.unwrap_err();
        assert!(error.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_invalid_expression_is_rejected() {
        let result = AggregatorConfig::from_toml_str(r#"group_timeout_expression = "size() ~ 2""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = AggregatorConfig::from_toml_str("group_timeout = 100");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_retry_attempts_are_rejected() {
        let result = AggregatorConfig::from_toml_str(
            r#"
            [force_complete_retry]
            max_attempts = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "send_timeout_ms = \"soon\"").unwrap();

        let error = AggregatorConfig::from_file(file.path()).unwrap_err();
        match &error {
            ConfigError::File { path, message } => {
                assert_eq!(path, file.path());
                assert!(message.contains("Error parsing configuration file"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.is_user_actionable());
    }

    #[test]
    fn test_group_timeout_from_expression() {
        let config = AggregatorConfig {
            group_timeout_expression: Some("250".to_string()),
            ..AggregatorConfig::default()
        };
        assert!(matches!(
            config.group_timeout().unwrap(),
            Some(GroupTimeout::Expression(_))
        ));
    }
}
