//! Live executor boundary.
//!
//! The session context, the affected-rows estimator and statement execution
//! reach the database only through [`LiveExecutor`]. Timeouts are enforced by
//! the implementation and surface as plain [`ExecutorError`]s.

use async_trait::async_trait;

use crate::error::ExecutorError;

/// One result row with its column names; `None` is SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRow {
    pub columns: Vec<String>,
    pub values: Vec<Option<String>>,
}

impl QueryRow {
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// Value of the named column, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
            .and_then(|v| v.as_deref())
    }

    /// Value at `index`.
    pub fn at(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }
}

/// Result of a non-query statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

/// One row of an `EXPLAIN` plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainRow {
    /// Join/access type (`ALL`, `ref`, `range`, ...).
    pub access_type: Option<String>,
    /// Estimated rows examined.
    pub rows: u64,
}

impl ExplainRow {
    pub fn is_full_scan(&self) -> bool {
        self.access_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("ALL"))
    }
}

/// A connection to a live MySQL server.
#[async_trait]
pub trait LiveExecutor: Send + Sync {
    async fn query(&self, sql: &str) -> Result<Vec<QueryRow>, ExecutorError>;

    async fn exec(&self, sql: &str) -> Result<ExecOutcome, ExecutorError>;

    /// Run `statements` in one transaction; rolled back if any fails.
    async fn transact(&self, statements: &[String]) -> Result<Vec<ExecOutcome>, ExecutorError>;

    async fn explain(&self, sql: &str) -> Result<Vec<ExplainRow>, ExecutorError>;

    async fn ping(&self) -> Result<(), ExecutorError>;

    async fn list_schemas(&self) -> Result<Vec<String>, ExecutorError>;

    /// Server-side id of the connection (`CONNECTION_ID()`).
    async fn connection_id(&self) -> Result<u64, ExecutorError>;

    /// Kill another connection by id.
    async fn kill(&self, connection_id: u64) -> Result<(), ExecutorError>;

    /// Release the connection. Further calls fail with [`ExecutorError::Closed`].
    async fn close(&self) -> Result<(), ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_ignores_case() {
        let row = QueryRow::new(
            vec!["Variable_name".into(), "Value".into()],
            vec![Some("lower_case_table_names".into()), None],
        );
        assert_eq!(row.get("variable_name"), Some("lower_case_table_names"));
        assert_eq!(row.get("value"), None);
        assert_eq!(row.at(0), Some("lower_case_table_names"));
    }

    #[test]
    fn test_full_scan_detection() {
        let row = ExplainRow {
            access_type: Some("all".into()),
            rows: 10,
        };
        assert!(row.is_full_scan());
        let row = ExplainRow {
            access_type: None,
            rows: 10,
        };
        assert!(!row.is_full_scan());
    }
}
