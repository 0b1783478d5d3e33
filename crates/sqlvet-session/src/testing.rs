//! In-memory [`LiveExecutor`] for tests.
//!
//! Answers the catalog queries the session context issues from a fixed set of
//! tables and variables, returns canned rows and plans for anything else, and
//! records every statement it receives.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ExecutorError;
use crate::executor::{ExecOutcome, ExplainRow, LiveExecutor, QueryRow};

struct MockTable {
    schema: String,
    name: String,
    create_sql: String,
    size_mb: f64,
    rows: u64,
}

#[derive(Default)]
pub struct MockExecutor {
    tables: Vec<MockTable>,
    variables: HashMap<String, String>,
    schemas: Vec<String>,
    results: Vec<(String, Vec<QueryRow>)>,
    plans: Vec<(String, Vec<ExplainRow>)>,
    failures: Vec<String>,
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `create_sql` for `SHOW CREATE TABLE schema.name`.
    pub fn with_table(
        mut self,
        schema: &str,
        name: &str,
        create_sql: &str,
        size_mb: f64,
        rows: u64,
    ) -> Self {
        if !self.schemas.iter().any(|s| s == schema) {
            self.schemas.push(schema.to_string());
        }
        self.tables.push(MockTable {
            schema: schema.to_string(),
            name: name.to_string(),
            create_sql: create_sql.to_string(),
            size_mb,
            rows,
        });
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_schema(mut self, name: &str) -> Self {
        self.schemas.push(name.to_string());
        self
    }

    /// Rows returned for queries containing `pattern`.
    pub fn with_result(mut self, pattern: &str, rows: Vec<QueryRow>) -> Self {
        self.results.push((pattern.to_string(), rows));
        self
    }

    /// Plan returned for `EXPLAIN` of SQL containing `pattern`.
    pub fn with_plan(mut self, pattern: &str, plan: Vec<ExplainRow>) -> Self {
        self.plans.push((pattern.to_string(), plan));
        self
    }

    /// Fail every statement containing `pattern`.
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_string());
        self
    }

    /// Every statement received, in order; plans are prefixed with `EXPLAIN `.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    async fn record(&self, sql: &str) -> Result<(), ExecutorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(sql.to_string());
        }
        tokio::task::yield_now().await;
        if self.failures.iter().any(|p| sql.contains(p.as_str())) {
            return Err(ExecutorError::Query {
                sql: sql.to_string(),
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }

    fn table(&self, matches: impl Fn(&MockTable) -> bool) -> Option<&MockTable> {
        self.tables.iter().find(|t| matches(t))
    }
}

fn row(columns: &[&str], values: Vec<Option<String>>) -> QueryRow {
    QueryRow::new(columns.iter().map(|c| c.to_string()).collect(), values)
}

#[async_trait]
impl LiveExecutor for MockExecutor {
    async fn query(&self, sql: &str) -> Result<Vec<QueryRow>, ExecutorError> {
        self.record(sql).await?;
        let lower = sql.to_lowercase();

        if lower.contains("from information_schema.tables") {
            let found = self.table(|t| {
                lower.contains(&format!(
                    "table_schema = '{}' and table_name = '{}'",
                    t.schema.to_lowercase(),
                    t.name.to_lowercase()
                ))
            });
            return Ok(found
                .map(|t| {
                    vec![row(
                        &["size_mb", "table_rows"],
                        vec![Some(t.size_mb.to_string()), Some(t.rows.to_string())],
                    )]
                })
                .unwrap_or_default());
        }

        if lower.starts_with("show create table") {
            let found = self.table(|t| {
                lower.contains(&format!(
                    "`{}`.`{}`",
                    t.schema.to_lowercase(),
                    t.name.to_lowercase()
                ))
            });
            return match found {
                Some(t) => Ok(vec![row(
                    &["Table", "Create Table"],
                    vec![Some(t.name.clone()), Some(t.create_sql.clone())],
                )]),
                None => Err(ExecutorError::Query {
                    sql: sql.to_string(),
                    message: "Table doesn't exist".to_string(),
                }),
            };
        }

        if lower.starts_with("show variables like") {
            let found = self
                .variables
                .iter()
                .find(|(name, _)| lower.contains(&format!("'{name}'")));
            return Ok(found
                .map(|(name, value)| {
                    vec![row(
                        &["Variable_name", "Value"],
                        vec![Some(name.clone()), Some(value.clone())],
                    )]
                })
                .unwrap_or_default());
        }

        if lower.contains("from information_schema.schemata") {
            return Ok(self
                .schemas
                .iter()
                .filter(|s| lower.contains(&format!("'{}'", s.to_lowercase())))
                .map(|s| row(&["SCHEMA_NAME"], vec![Some(s.clone())]))
                .collect());
        }

        Ok(self
            .results
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn exec(&self, sql: &str) -> Result<ExecOutcome, ExecutorError> {
        self.record(sql).await?;
        Ok(ExecOutcome::default())
    }

    async fn transact(&self, statements: &[String]) -> Result<Vec<ExecOutcome>, ExecutorError> {
        let mut outcomes = Vec::with_capacity(statements.len());
        for sql in statements {
            outcomes.push(self.exec(sql).await?);
        }
        Ok(outcomes)
    }

    async fn explain(&self, sql: &str) -> Result<Vec<ExplainRow>, ExecutorError> {
        self.record(&format!("EXPLAIN {sql}")).await?;
        Ok(self
            .plans
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, plan)| plan.clone())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn list_schemas(&self) -> Result<Vec<String>, ExecutorError> {
        Ok(self.schemas.clone())
    }

    async fn connection_id(&self) -> Result<u64, ExecutorError> {
        Ok(42)
    }

    async fn kill(&self, connection_id: u64) -> Result<(), ExecutorError> {
        self.record(&format!("KILL {connection_id}")).await
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
