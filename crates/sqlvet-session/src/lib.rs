//! # sqlvet-session
//!
//! Session-scoped virtual schema for the sqlvet audit engine.
//!
//! A [`SessionContext`] answers "what does the schema look like right now"
//! for rules and the affected-rows estimator. Offline sessions know only the
//! DDL audited so far; live sessions additionally fetch definitions and
//! system variables through a [`LiveExecutor`], once per key.

pub mod context;
pub mod error;
pub mod executor;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use context::{
    Capability, DefinitionOrigin, SessionContext, TableDefinition, TableKey, apply_alter_op,
};
pub use error::{ExecutorError, SessionError};
pub use executor::{ExecOutcome, ExplainRow, LiveExecutor, QueryRow};
pub use tokio_util::sync::CancellationToken;
