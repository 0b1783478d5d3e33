//! Error types for the session crate.

use thiserror::Error;

/// Errors raised by a live executor.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// Could not reach or authenticate against the server.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected a statement.
    #[error("query failed: {message} (sql: {sql})")]
    Query { sql: String, message: String },

    /// An operation exceeded its configured timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The executor was closed.
    #[error("executor is closed")]
    Closed,
}

/// Errors raised by session context lookups and DDL application.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The fact cannot be determined without a live connection.
    #[error("cannot determine `{0}` without a live connection")]
    SchemaUnknown(String),

    /// The table is known to be absent.
    #[error("table `{schema}`.`{table}` does not exist")]
    TableNotFound { schema: String, table: String },

    /// The system variable is not available.
    #[error("system variable `{0}` is unavailable")]
    VariableUnavailable(String),

    /// `SHOW CREATE TABLE` returned text the schema reader could not interpret.
    #[error("SHOW CREATE TABLE `{table}` could not be parsed: {message}")]
    ShowCreateTableUnparseable { table: String, message: String },

    /// The operation needs a live executor and the session has none.
    #[error("session has no live connection")]
    Offline,

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The caller cancelled the session.
    #[error("session cancelled")]
    Cancelled,

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Lookup could not decide; callers skip instead of reporting a violation.
    pub fn is_undetermined(&self) -> bool {
        matches!(
            self,
            Self::SchemaUnknown(_) | Self::VariableUnavailable(_) | Self::Offline
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TableNotFound { .. })
    }

    pub fn is_show_create_table_unparseable(&self) -> bool {
        matches!(self, Self::ShowCreateTableUnparseable { .. })
    }
}
