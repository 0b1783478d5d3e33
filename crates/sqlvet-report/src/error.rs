//! Error types for the report crate.

use thiserror::Error;

/// Errors that can occur while recording or reading audit reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to initialize the report logger.
    #[error("failed to initialize report logger: {0}")]
    InitializationFailed(String),

    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// A stored line could not be read back.
    #[error("corrupt report line {line}: {message}")]
    CorruptLine { line: usize, message: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
