//! Error types for the Folio document generation system.

use crate::section::SectionStatus;
use crate::types::RunId;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Serialization(String),
}

/// Failures reported by the content generation service.
///
/// Every class consumes one attempt from the section's shared retry budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Timeout, connection failure, rate limit or 5xx.
    #[error("Transient service failure: {0}")]
    Transient(String),

    /// Non-retryable 4xx class responses.
    #[error("Service rejected request (status {status}): {message}")]
    Permanent { status: u16, message: String },

    /// The response body did not have a usable shape.
    #[error("Unexpected response shape: {0}")]
    Parse(String),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Transient(_) => "transient",
            ServiceError::Permanent { .. } => "permanent",
            ServiceError::Parse(_) => "parse",
        }
    }
}

/// API-level errors surfaced to callers of the orchestrator
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Section selection is empty")]
    EmptySelection,

    #[error("Invalid transition for section {section_id}: {from} -> {to}")]
    InvalidTransition {
        section_id: String,
        from: SectionStatus,
        to: SectionStatus,
    },

    #[error("Run {0} has no completed sections to compile")]
    NothingToCompile(RunId),

    #[error("Compilation failed: {0}")]
    Compilation(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Timed out waiting for run {0}")]
    Timeout(RunId),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
