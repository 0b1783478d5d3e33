//! Error types for the rules crate.

use sqlvet_estimator::EstimateError;
use sqlvet_session::SessionError;
use thiserror::Error;

/// Failure inside one rule handler.
///
/// The dispatcher turns these into an error finding for the rule and moves on
/// to the next rule; only [`SessionError::Cancelled`] stops dispatch.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("required parameter '{0}' is not set")]
    MissingParam(String),

    #[error("parameter '{key}' is not a {expected}")]
    ParamType { key: String, expected: &'static str },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Estimate(#[from] EstimateError),

    #[error("{0}")]
    Internal(String),
}

impl RuleError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Session(SessionError::Cancelled)
                | Self::Estimate(EstimateError::LiveExecution {
                    source: SessionError::Cancelled,
                    ..
                })
        )
    }
}

/// Errors raised while building a registry or binding a rule set.
#[derive(Debug, Error)]
pub enum RuleConfigError {
    #[error("rule '{0}' is already registered")]
    DuplicateRule(String),

    #[error("unknown rule '{0}'")]
    UnknownRule(String),

    #[error("rule '{rule}': parameter '{key}' expects {expected}, got '{value}'")]
    InvalidParam {
        rule: String,
        key: String,
        expected: String,
        value: String,
    },
}

impl RuleConfigError {
    pub fn invalid_param(
        rule: impl Into<String>,
        key: impl Into<String>,
        expected: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::InvalidParam {
            rule: rule.into(),
            key: key.into(),
            expected: expected.into(),
            value: value.to_string(),
        }
    }
}
