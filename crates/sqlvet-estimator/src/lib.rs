//! # sqlvet-estimator
//!
//! Affected-rows estimation for the sqlvet audit engine.
//!
//! A DML statement is rewritten into a count-equivalent query, the rewrite is
//! re-parsed to make sure nothing but a `COUNT` reaches the server, and the
//! execution plan decides whether the count is worth running:
//!
//! | Plan                                   | Result                       |
//! |----------------------------------------|------------------------------|
//! | any full scan (`type = ALL`)           | plan estimate, no count run  |
//! | rows examined above the ceiling        | plan estimate, no count run  |
//! | otherwise                              | live `COUNT` result          |
//!
//! `INSERT ... VALUES` is counted from its tuples and never touches the server.

pub mod error;
pub mod rewrite;

pub use error::EstimateError;
pub use rewrite::{CountQuery, rewrite, validate_count_query};

use serde::Serialize;
use sqlvet_parser::{SqlParser, StatementEnvelope};
use sqlvet_session::{ExplainRow, SessionContext, SessionError};

/// Plans examining more rows than this are not counted live.
pub const PLAN_ROWS_CEILING: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    /// Counted from literal value tuples.
    Literal,
    /// Taken from the execution plan.
    Plan,
    /// Result of running the count query.
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Estimate {
    pub rows: u64,
    pub source: EstimateSource,
    /// The count query, when one was built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_sql: Option<String>,
}

/// Estimates how many rows a DML statement touches.
#[derive(Debug, Clone)]
pub struct AffectedRowsEstimator {
    plan_rows_ceiling: u64,
}

impl Default for AffectedRowsEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl AffectedRowsEstimator {
    pub fn new() -> Self {
        Self {
            plan_rows_ceiling: PLAN_ROWS_CEILING,
        }
    }

    pub fn with_plan_rows_ceiling(mut self, ceiling: u64) -> Self {
        self.plan_rows_ceiling = ceiling;
        self
    }

    /// Parse `sql` (one statement) and estimate it.
    pub async fn estimate_sql(
        &self,
        ctx: &SessionContext,
        sql: &str,
    ) -> Result<Estimate, EstimateError> {
        let stmt = SqlParser::new().parse_one(sql)?;
        self.estimate(ctx, &stmt).await
    }

    pub async fn estimate(
        &self,
        ctx: &SessionContext,
        stmt: &StatementEnvelope,
    ) -> Result<Estimate, EstimateError> {
        let sql = match rewrite(stmt)? {
            CountQuery::Literal(rows) => {
                return Ok(Estimate {
                    rows,
                    source: EstimateSource::Literal,
                    rewritten_sql: None,
                });
            }
            CountQuery::Query(sql) => sql,
        };
        validate_count_query(&sql)?;

        let plan = ctx.explain(&sql).await.map_err(|e| live_error(&sql, e))?;
        if let Some(rows) = self.plan_estimate(&plan) {
            tracing::debug!(sql = %sql, rows, "Using plan estimate");
            return Ok(Estimate {
                rows,
                source: EstimateSource::Plan,
                rewritten_sql: Some(sql),
            });
        }

        let result = ctx.query(&sql).await.map_err(|e| live_error(&sql, e))?;
        let rows = match result.first().and_then(|row| row.at(0)) {
            // An empty LIMIT window returns no row at all.
            None => 0,
            Some(value) => {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| EstimateError::UnexpectedResult {
                        sql: sql.clone(),
                        value: value.to_string(),
                    })?
            }
        };
        tracing::debug!(sql = %sql, rows, "Counted affected rows");
        Ok(Estimate {
            rows,
            source: EstimateSource::Live,
            rewritten_sql: Some(sql),
        })
    }

    /// The plan's row estimate when running the count would be too costly.
    fn plan_estimate(&self, plan: &[ExplainRow]) -> Option<u64> {
        let full_scan = plan.iter().any(ExplainRow::is_full_scan);
        let examined = plan.iter().fold(0u64, |acc, row| acc.saturating_add(row.rows));
        if full_scan || examined > self.plan_rows_ceiling {
            Some(plan.last().map(|row| row.rows).unwrap_or(0))
        } else {
            None
        }
    }
}

fn live_error(sql: &str, e: SessionError) -> EstimateError {
    match e {
        SessionError::Offline => EstimateError::Offline,
        source => EstimateError::LiveExecution {
            sql: sql.to_string(),
            source,
        },
    }
}
