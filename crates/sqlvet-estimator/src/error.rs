//! Error types for the estimator crate.

use sqlvet_parser::ParseError;
use sqlvet_session::SessionError;
use thiserror::Error;

/// Errors raised while estimating affected rows. Each is fatal to one estimate only.
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The statement has no count-equivalent form.
    #[error("unsupported statement type: {0}")]
    UnsupportedStatementType(String),

    /// The rewritten statement is not a single count aggregate.
    #[error("rewritten statement rejected ({reason}): {sql}")]
    RewriteValidationFailed { sql: String, reason: String },

    /// The server failed while planning or counting.
    #[error("live execution failed for `{sql}`: {source}")]
    LiveExecution {
        sql: String,
        #[source]
        source: SessionError,
    },

    /// The count query returned something other than a row count.
    #[error("unexpected count `{value}` returned for `{sql}`")]
    UnexpectedResult { sql: String, value: String },

    /// The statement needs the server and the session is offline.
    #[error("estimating this statement requires a live connection")]
    Offline,
}
