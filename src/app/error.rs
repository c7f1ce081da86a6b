//! Binary errors

use crate::aggregator::ConfigError;
use crate::core::error_handling::ContextualError;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{message}")]
    Open {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn open(path: &Path, source: std::io::Error) -> Self {
        AppError::Open {
            message: format!("Cannot open {}: {}", path.display(), source),
            source,
        }
    }

    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        AppError::Io { operation, source }
    }
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_user_actionable(),
            AppError::Open { .. } | AppError::Logging(_) => true,
            AppError::Io { .. } | AppError::Task(_) => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Open { message, .. } | AppError::Logging(message) => Some(message),
            AppError::Io { .. } | AppError::Task(_) => None,
        }
    }
}
