//! `sqlx`-backed live executor.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row};
use tokio::sync::Mutex;

use sqlvet_core::ExecutorConfig;
use sqlvet_session::{ExecOutcome, ExecutorError, ExplainRow, LiveExecutor, QueryRow};

/// One dedicated MySQL connection.
///
/// Statements are sent through the text protocol so `SHOW`, `EXPLAIN` and
/// DDL behave exactly as they do in the mysql client.
pub struct MySqlExecutor {
    conn: Mutex<Option<MySqlConnection>>,
    options: MySqlConnectOptions,
    connection_id: u64,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl MySqlExecutor {
    pub async fn connect(config: &ExecutorConfig) -> Result<Self, ExecutorError> {
        let options = MySqlConnectOptions::from_str(&config.connection_string())
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        Self::connect_with(
            options,
            Duration::from_secs(config.connect_timeout_seconds),
            Duration::from_secs(config.query_timeout_seconds),
        )
        .await
    }

    pub async fn connect_with(
        options: MySqlConnectOptions,
        connect_timeout: Duration,
        query_timeout: Duration,
    ) -> Result<Self, ExecutorError> {
        let mut conn = open(&options, connect_timeout).await?;
        let connection_id: u64 = sqlx::query_scalar("SELECT CONNECTION_ID()")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        tracing::info!(connection_id, "Connected to MySQL");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            options,
            connection_id,
            connect_timeout,
            query_timeout,
        })
    }

    async fn timed<T>(
        &self,
        sql: &str,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, ExecutorError> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(query_error(sql, e)),
            Err(_) => {
                tracing::warn!(
                    connection_id = self.connection_id,
                    timeout_secs = self.query_timeout.as_secs(),
                    "Statement timed out"
                );
                Err(ExecutorError::Timeout(format!(
                    "{}s elapsed running: {sql}",
                    self.query_timeout.as_secs()
                )))
            }
        }
    }
}

#[async_trait]
impl LiveExecutor for MySqlExecutor {
    async fn query(&self, sql: &str) -> Result<Vec<QueryRow>, ExecutorError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ExecutorError::Closed)?;
        let rows = self
            .timed(sql, (&mut *conn).fetch_all(sqlx::raw_sql(sql)))
            .await?;
        Ok(rows.iter().map(convert_row).collect())
    }

    async fn exec(&self, sql: &str) -> Result<ExecOutcome, ExecutorError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ExecutorError::Closed)?;
        let result = self.timed(sql, (&mut *conn).execute(sqlx::raw_sql(sql))).await?;
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    async fn transact(&self, statements: &[String]) -> Result<Vec<ExecOutcome>, ExecutorError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ExecutorError::Closed)?;
        let mut tx = self.timed("BEGIN", conn.begin()).await?;

        let mut outcomes = Vec::with_capacity(statements.len());
        for sql in statements {
            match self.timed(sql, (&mut *tx).execute(sqlx::raw_sql(sql))).await {
                Ok(result) => outcomes.push(ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: result.last_insert_id(),
                }),
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::error!(error = %rollback, "Rollback failed");
                    }
                    return Err(e);
                }
            }
        }
        self.timed("COMMIT", tx.commit()).await?;
        Ok(outcomes)
    }

    async fn explain(&self, sql: &str) -> Result<Vec<ExplainRow>, ExecutorError> {
        let rows = self.query(&format!("EXPLAIN {sql}")).await?;
        Ok(rows.iter().map(explain_row).collect())
    }

    async fn ping(&self) -> Result<(), ExecutorError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ExecutorError::Closed)?;
        self.timed("PING", conn.ping()).await
    }

    async fn list_schemas(&self) -> Result<Vec<String>, ExecutorError> {
        let rows = self.query("SHOW DATABASES").await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.at(0).map(str::to_string))
            .collect())
    }

    async fn connection_id(&self) -> Result<u64, ExecutorError> {
        Ok(self.connection_id)
    }

    /// Kill over a fresh connection; the session's own one may be busy.
    async fn kill(&self, connection_id: u64) -> Result<(), ExecutorError> {
        let sql = format!("KILL {connection_id}");
        let mut conn = open(&self.options, self.connect_timeout).await?;
        let result = self.timed(&sql, (&mut conn).execute(sqlx::raw_sql(&sql))).await;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Closing kill connection failed");
        }
        result.map(|_| ())
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        tracing::debug!(connection_id = self.connection_id, "Closing MySQL connection");
        conn.close()
            .await
            .map_err(|e| ExecutorError::Connection(e.to_string()))
    }
}

async fn open(
    options: &MySqlConnectOptions,
    timeout: Duration,
) -> Result<MySqlConnection, ExecutorError> {
    match tokio::time::timeout(timeout, options.connect()).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(ExecutorError::Connection(e.to_string())),
        Err(_) => Err(ExecutorError::Timeout(format!(
            "connecting took longer than {}s",
            timeout.as_secs()
        ))),
    }
}

fn query_error(sql: &str, e: sqlx::Error) -> ExecutorError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
            ExecutorError::Connection(e.to_string())
        }
        other => ExecutorError::Query {
            sql: sql.to_string(),
            message: other.to_string(),
        },
    }
}

fn convert_row(row: &MySqlRow) -> QueryRow {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..row.len()).map(|i| cell_text(row, i)).collect();
    QueryRow::new(columns, values)
}

/// Render a cell as text; `None` is SQL `NULL`.
fn cell_text(row: &MySqlRow, idx: usize) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return v.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    // DECIMAL and other types arrive as text under the text protocol.
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return v;
    }
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .ok()
        .flatten()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Map one `EXPLAIN` row; `rows` is `NULL` for some plan nodes.
fn explain_row(row: &QueryRow) -> ExplainRow {
    ExplainRow {
        access_type: row.get("type").map(str::to_string),
        rows: row
            .get("rows")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plan_row(access_type: Option<&str>, rows: Option<&str>) -> QueryRow {
        QueryRow::new(
            vec![
                "id".to_string(),
                "select_type".to_string(),
                "table".to_string(),
                "type".to_string(),
                "rows".to_string(),
            ],
            vec![
                Some("1".to_string()),
                Some("SIMPLE".to_string()),
                Some("t".to_string()),
                access_type.map(str::to_string),
                rows.map(str::to_string),
            ],
        )
    }

    #[test]
    fn test_explain_row_mapping() {
        assert_eq!(
            explain_row(&plan_row(Some("ALL"), Some("1200"))),
            ExplainRow {
                access_type: Some("ALL".to_string()),
                rows: 1200,
            }
        );
        assert_eq!(
            explain_row(&plan_row(None, None)),
            ExplainRow {
                access_type: None,
                rows: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let config = ExecutorConfig {
            database_url: Some("mysql://root@127.0.0.1:1/app".to_string()),
            connect_timeout_seconds: 2,
            ..ExecutorConfig::default()
        };
        match MySqlExecutor::connect(&config).await {
            Err(ExecutorError::Connection(_)) | Err(ExecutorError::Timeout(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
