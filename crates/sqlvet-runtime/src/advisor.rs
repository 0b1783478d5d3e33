//! Index advisor.
//!
//! Advisory only: every message becomes a notice and lookup failures are
//! logged and skipped. Indexes a statement creates are checked for width, and
//! on live tables the selectivity of their leading column is sampled.

use sqlvet_parser::{AlterOp, IndexDef, IndexKind, StatementKind, TableName};
use sqlvet_session::{DefinitionOrigin, SessionContext, SessionError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisorSettings {
    /// Widest composite index that passes without a notice.
    pub max_columns: i64,
    /// Lowest acceptable distinct/total ratio of a leading index column.
    pub min_selectivity: f64,
}

/// Advice for the indexes `kind` creates.
pub async fn advise(
    ctx: &SessionContext,
    kind: &StatementKind,
    settings: AdvisorSettings,
) -> Result<Vec<String>, SessionError> {
    let (table, indexes, new_table): (&TableName, Vec<&IndexDef>, bool) = match kind {
        StatementKind::CreateTable(create) => (&create.table, create.indexes.iter().collect(), true),
        StatementKind::AlterTable(alter) => (
            &alter.table,
            alter
                .ops
                .iter()
                .filter_map(|op| match op {
                    AlterOp::AddIndex(index) => Some(index),
                    _ => None,
                })
                .collect(),
            false,
        ),
        StatementKind::CreateIndex(create) => (&create.table, vec![&create.index], false),
        _ => return Ok(Vec::new()),
    };

    let mut advice = Vec::new();
    let indexes: Vec<&IndexDef> = indexes
        .into_iter()
        .filter(|i| matches!(i.kind, IndexKind::Index | IndexKind::Unique | IndexKind::Primary))
        .collect();

    for index in &indexes {
        if index.columns.len() as i64 > settings.max_columns {
            advice.push(format!(
                "index {} on {} has {} columns, consider at most {}",
                index.effective_name().unwrap_or("(unnamed)"),
                table.name,
                index.columns.len(),
                settings.max_columns
            ));
        }
    }

    if new_table || indexes.is_empty() {
        return Ok(advice);
    }
    let definition = match ctx.get_table_definition(table).await {
        Ok(definition) if definition.origin == DefinitionOrigin::Live && definition.rows > 0 => {
            definition
        }
        Ok(_) => return Ok(advice),
        Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
        Err(e) => {
            tracing::warn!(table = %table, error = %e, "Skipping selectivity advice");
            return Ok(advice);
        }
    };

    for index in &indexes {
        let Some(leading) = index.columns.first() else {
            continue;
        };
        match selectivity(ctx, &definition.table, leading).await {
            Ok(Some(value)) if value < settings.min_selectivity => advice.push(format!(
                "leading column {leading} of index {} has selectivity {value:.4}, below {}",
                index.effective_name().unwrap_or("(unnamed)"),
                settings.min_selectivity
            )),
            Ok(_) => {}
            Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
            Err(e) => {
                tracing::warn!(table = %table, column = %leading, error = %e, "Selectivity query failed");
            }
        }
    }
    Ok(advice)
}

async fn selectivity(
    ctx: &SessionContext,
    table: &TableName,
    column: &str,
) -> Result<Option<f64>, SessionError> {
    let sql = format!(
        "SELECT COUNT(DISTINCT `{}`) / COUNT(*) AS selectivity FROM {}",
        column.replace('`', "``"),
        table.quoted()
    );
    let rows = ctx.query(&sql).await?;
    Ok(rows
        .first()
        .and_then(|row| row.at(0))
        .and_then(|value| value.trim().parse::<f64>().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlvet_parser::SqlParser;
    use sqlvet_session::QueryRow;
    use sqlvet_session::testing::MockExecutor;
    use std::sync::Arc;

    const SETTINGS: AdvisorSettings = AdvisorSettings {
        max_columns: 2,
        min_selectivity: 0.2,
    };

    fn kind(sql: &str) -> StatementKind {
        SqlParser::new().parse_one(sql).unwrap().kind
    }

    #[tokio::test]
    async fn test_wide_index_offline() {
        let ctx = SessionContext::offline();
        let advice = advise(
            &ctx,
            &kind("CREATE TABLE t (id int PRIMARY KEY, a int, b int, c int, KEY abc (a, b, c))"),
            SETTINGS,
        )
        .await
        .unwrap();
        assert_eq!(
            advice,
            vec!["index abc on t has 3 columns, consider at most 2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_low_selectivity_on_live_table() {
        let server = MockExecutor::new()
            .with_table(
                "app",
                "orders",
                "CREATE TABLE `orders` (\n  `id` int NOT NULL,\n  `status` int NOT NULL,\n  PRIMARY KEY (`id`)\n)",
                50.0,
                1_000,
            )
            .with_result(
                "COUNT(DISTINCT `status`)",
                vec![QueryRow::new(
                    vec!["selectivity".to_string()],
                    vec![Some("0.0030".to_string())],
                )],
            );
        let ctx = SessionContext::live(Arc::new(server)).with_default_schema("app");

        let advice = advise(
            &ctx,
            &kind("ALTER TABLE orders ADD INDEX idx_status (status)"),
            SETTINGS,
        )
        .await
        .unwrap();
        assert_eq!(
            advice,
            vec!["leading column status of index idx_status has selectivity 0.0030, below 0.2".to_string()]
        );
    }
}
