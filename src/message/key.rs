//! Correlation keys

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque, comparable value grouping related messages into one aggregation unit
///
/// Keys derived from header values keep the string form of the value, so
/// `"42"` and `42` correlate to the same group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from a header value. `null` yields no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self(s.clone())),
            other => Some(Self(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<u64> for CorrelationKey {
    fn from(key: u64) -> Self {
        Self(key.to_string())
    }
}

impl From<CorrelationKey> for Value {
    fn from(key: CorrelationKey) -> Self {
        Value::String(key.0)
    }
}
