//! Importer-specific error types

use shared::{SharedError, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid import request: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Bibliographic source request failed: {message}")]
    SourceError { message: String, transient: bool },

    #[error("Unable to parse source record: {message}")]
    ParseError { message: String },

    #[error("Inconsistent review history: {message}")]
    ClassificationError { message: String },

    #[error("State {attempted} would move the review backwards from {current}")]
    RegressiveTransition { current: StatusCode, attempted: StatusCode },

    #[error("Storage operation failed: {operation}: {message}")]
    StorageError { operation: String, message: String },

    #[error("Store is busy: {operation}")]
    StoreBusy { operation: String },

    #[error("Batch cancelled after {processed} identifiers")]
    Cancelled { processed: usize },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl ImportError {
    pub fn validation(message: impl Into<String>) -> Self {
        ImportError::ValidationError { message: message.into() }
    }

    pub fn config(field: impl Into<String>) -> Self {
        ImportError::ConfigurationError { field: field.into() }
    }

    pub fn classification(message: impl Into<String>) -> Self {
        ImportError::ClassificationError { message: message.into() }
    }

    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ImportError::StorageError { operation: operation.into(), message: message.into() }
    }

    /// Worth retrying with backoff before treating as permanent
    pub fn is_transient(&self) -> bool {
        match self {
            ImportError::SourceError { transient, .. } => *transient,
            ImportError::StoreBusy { .. } => true,
            ImportError::HttpError(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err
                        .status()
                        .map(|s| s.is_server_error() || s.as_u16() == 429)
                        .unwrap_or(false)
            }
            ImportError::IoError(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
