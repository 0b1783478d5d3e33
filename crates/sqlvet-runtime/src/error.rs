//! Error types for the runtime crate.

use sqlvet_estimator::EstimateError;
use sqlvet_parser::ParseError;
use sqlvet_rules::RuleError;
use sqlvet_session::{ExecOutcome, SessionError};
use thiserror::Error;

use crate::pipeline::AuditStage;

/// Errors that abort a statement's audit or an execution request.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Estimate(#[from] EstimateError),

    #[error(transparent)]
    OnlineDdl(#[from] OnlineDdlError),

    /// A statement of a batch could not be audited.
    #[error("statement #{batch_index} (line {line}) failed during {stage}: {source}")]
    Statement {
        stage: AuditStage,
        line: usize,
        batch_index: usize,
        text: String,
        #[source]
        source: Box<AuditError>,
    },

    /// A statement of an execution batch failed; earlier ones were applied.
    #[error("exec sql failed after {count} statement(s):\n{sql}\n{source}", count = .completed.len())]
    ExecutionFailed {
        sql: String,
        completed: Vec<ExecOutcome>,
        #[source]
        source: Box<AuditError>,
    },

    #[error("expected exactly one statement, got {0}")]
    NotSingleStatement(usize),
}

impl AuditError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Session(SessionError::Cancelled) => true,
            Self::Rule(e) => e.is_cancelled(),
            Self::Statement { source, .. } | Self::ExecutionFailed { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}

/// Failures of the online schema-change tool.
#[derive(Debug, Error)]
pub enum OnlineDdlError {
    #[error("failed to start {binary}: {message}")]
    Spawn { binary: String, message: String },

    #[error("{action} exited with status {status}: {stderr}")]
    Failed {
        action: &'static str,
        status: String,
        stderr: String,
    },

    #[error("{action} timed out after {seconds}s")]
    Timeout { action: &'static str, seconds: u64 },

    #[error("cannot run online DDL: {0}")]
    Unsupported(String),
}
