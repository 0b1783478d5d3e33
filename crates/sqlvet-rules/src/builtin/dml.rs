//! Data-manipulation rules.

use async_trait::async_trait;

use sqlvet_estimator::{AffectedRowsEstimator, EstimateError};
use sqlvet_parser::{StatementKind, TableName};

use crate::error::RuleError;
use crate::registry::{RuleHandler, RuleInput};

pub struct WhereExists;

#[async_trait]
impl RuleHandler for WhereExists {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let (verb, info) = match &input.stmt.kind {
            StatementKind::Update(info) => ("UPDATE", info),
            StatementKind::Delete(info) => ("DELETE", info),
            _ => return Ok(()),
        };
        if !info.has_where {
            input.report(format!("{verb} without a WHERE clause affects every row"));
        }
        Ok(())
    }
}

pub struct SelectStar;

#[async_trait]
impl RuleHandler for SelectStar {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        if let StatementKind::Select(select) = &input.stmt.kind
            && select.select_star
        {
            input.report("list the needed columns instead of SELECT *");
        }
        Ok(())
    }
}

pub struct SchemaQualified;

#[async_trait]
impl RuleHandler for SchemaQualified {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let mut unqualified: Vec<String> = Vec::new();
        for TableName { schema, name } in input.stmt.kind.tables() {
            if schema.is_none() && !unqualified.contains(&name) {
                unqualified.push(name);
            }
        }
        if !unqualified.is_empty() {
            input.report(format!(
                "objects referenced without a schema: {}",
                unqualified.join(", ")
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct AffectedRows {
    estimator: AffectedRowsEstimator,
}

#[async_trait]
impl RuleHandler for AffectedRows {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        if !matches!(
            input.stmt.kind,
            StatementKind::Insert(_) | StatementKind::Update(_) | StatementKind::Delete(_)
        ) {
            return Ok(());
        }
        let max = input.params().get_int("max_rows")?;

        let estimate = match self.estimator.estimate(input.ctx, input.stmt).await {
            Ok(estimate) => estimate,
            Err(EstimateError::Offline | EstimateError::UnsupportedStatementType(_)) => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if estimate.rows as i64 > max {
            input.report(format!(
                "statement affects about {} rows, more than {max}",
                estimate.rows
            ));
        }
        Ok(())
    }
}
