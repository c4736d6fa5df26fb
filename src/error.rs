//! Error types for Havenlight

use thiserror::Error;

/// Errors that can occur inside the detection engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid crisis signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed user profile: {0}")]
    InvalidProfile(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Failed to parse event log: {0}")]
    ParseError(String),
}
