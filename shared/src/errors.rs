//! Shared error types for the article import system

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid source identifier: {input}")]
    InvalidSourceId { input: String },

    #[error("Invalid review cycle: {input}")]
    InvalidCycle { input: String },

    #[error("Unknown status code: {code}")]
    UnknownStatus { code: String },

    #[error("Status {code} requires a payload")]
    PayloadRequired { code: String },

    #[error("Unknown disposition: {code}")]
    UnknownDisposition { code: String },

    #[error("Unknown import type: {code}")]
    UnknownImportType { code: String },

    #[error("Invalid identifier: {input}")]
    InvalidId { input: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
