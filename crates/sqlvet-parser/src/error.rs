//! Error types for the parser crate.

use thiserror::Error;

/// Errors raised while turning SQL text into statement envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The batch could not be tokenized (unterminated string or comment).
    #[error("failed to tokenize SQL: {0}")]
    Tokenize(String),

    /// A statement is syntactically invalid.
    #[error("failed to parse SQL at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A DDL statement the schema reader could not interpret.
    #[error("unsupported DDL: {0}")]
    UnsupportedDdl(String),
}

impl ParseError {
    pub(crate) fn ddl(msg: impl Into<String>) -> Self {
        Self::UnsupportedDdl(msg.into())
    }
}
