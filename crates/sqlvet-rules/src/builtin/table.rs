//! Table-shape rules.

use async_trait::async_trait;

use sqlvet_parser::{AlterOp, CreateTable, IndexKind, StatementKind};
use sqlvet_session::apply_alter_op;

use super::lookup_table;
use crate::error::RuleError;
use crate::registry::{RuleHandler, RuleInput};

pub struct TablePrimaryKey;

#[async_trait]
impl RuleHandler for TablePrimaryKey {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let StatementKind::CreateTable(create) = &input.stmt.kind else {
            return Ok(());
        };
        if create.like.is_none() && !create.has_primary_key() {
            input.report(format!("table {} has no primary key", create.table));
        }
        Ok(())
    }
}

pub struct AutoIncrementStart;

#[async_trait]
impl RuleHandler for AutoIncrementStart {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        match &input.stmt.kind {
            StatementKind::CreateTable(create) => {
                if let Some(start) = &create.options.auto_increment
                    && start.trim() != "0"
                {
                    input.report(format!(
                        "table {} sets AUTO_INCREMENT={}, the initial value must be 0",
                        create.table,
                        start.trim()
                    ));
                }
            }
            StatementKind::Set(assignments) => {
                let offset = assignments
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case("auto_increment_offset"))
                    .and_then(|a| a.value.trim().parse::<i64>().ok());
                if let Some(offset) = offset
                    && offset > 1
                {
                    input.report(format!(
                        "auto_increment_offset is set to {offset}, it must not exceed 1"
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

pub struct TableEngine;

#[async_trait]
impl RuleHandler for TableEngine {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let (table, engine) = match &input.stmt.kind {
            StatementKind::CreateTable(create) => (&create.table, create.options.engine.as_deref()),
            StatementKind::AlterTable(alter) => {
                let engine = alter.ops.iter().rev().find_map(|op| match op {
                    AlterOp::Options(options) => options.engine.as_deref(),
                    _ => None,
                });
                (&alter.table, engine)
            }
            _ => return Ok(()),
        };
        let Some(engine) = engine else {
            return Ok(());
        };

        let required = input.params().get_str("engine")?.to_string();
        if !engine.eq_ignore_ascii_case(&required) {
            input.report(format!(
                "table {table} uses storage engine {engine}, expected {required}"
            ));
        }
        Ok(())
    }
}

/// Indexes counted against the limit: everything but primary keys and constraints.
fn index_count(create: &CreateTable) -> usize {
    create
        .all_indexes()
        .iter()
        .filter(|i| {
            matches!(
                i.kind,
                IndexKind::Index | IndexKind::Unique | IndexKind::Fulltext | IndexKind::Spatial
            )
        })
        .count()
}

pub struct IndexCount;

#[async_trait]
impl RuleHandler for IndexCount {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let after = match &input.stmt.kind {
            StatementKind::CreateTable(create) => create.clone(),
            StatementKind::AlterTable(alter) => {
                if !alter.ops.iter().any(|op| matches!(op, AlterOp::AddIndex(_))) {
                    return Ok(());
                }
                let Some(current) = lookup_table(input.ctx, &alter.table).await? else {
                    return Ok(());
                };
                let mut after = current.create.clone();
                for op in &alter.ops {
                    apply_alter_op(&mut after, op);
                }
                after
            }
            StatementKind::CreateIndex(create) => {
                let Some(current) = lookup_table(input.ctx, &create.table).await? else {
                    return Ok(());
                };
                let mut after = current.create.clone();
                apply_alter_op(&mut after, &AlterOp::AddIndex(create.index.clone()));
                after
            }
            _ => return Ok(()),
        };

        let max = input.params().get_int("max_count")?;
        let count = index_count(&after);
        if count as i64 > max {
            input.report(format!(
                "table {} would have {count} indexes, more than {max}",
                after.table.name
            ));
        }
        Ok(())
    }
}

pub struct AlterColumnExists;

#[async_trait]
impl RuleHandler for AlterColumnExists {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let StatementKind::AlterTable(alter) = &input.stmt.kind else {
            return Ok(());
        };
        let Some(current) = lookup_table(input.ctx, &alter.table).await? else {
            return Ok(());
        };

        // Walk the operations in order so columns added earlier in the same
        // statement count as existing.
        let mut shape = current.create.clone();
        let mut missing: Vec<String> = Vec::new();
        for op in &alter.ops {
            let referenced: Vec<&str> = match op {
                AlterOp::ModifyColumn(column) => vec![column.name.as_str()],
                AlterOp::ChangeColumn { old, .. } => vec![old.as_str()],
                AlterOp::RenameColumn { old, .. } => vec![old.as_str()],
                AlterOp::DropColumn(name) => vec![name.as_str()],
                AlterOp::AddIndex(index) if index.kind.is_index() => {
                    index.columns.iter().map(String::as_str).collect()
                }
                _ => Vec::new(),
            };
            for name in referenced {
                if shape.column(name).is_none()
                    && !missing.iter().any(|m| m.eq_ignore_ascii_case(name))
                {
                    missing.push(name.to_string());
                }
            }
            apply_alter_op(&mut shape, op);
        }

        if !missing.is_empty() {
            input.report(format!(
                "column(s) {} do not exist in table {}",
                missing.join(", "),
                alter.table.name
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builtin::names;
    use crate::builtin::test_support::offline;
    use pretty_assertions::assert_eq;
    use sqlvet_core::RuleConfig;

    #[tokio::test]
    async fn test_primary_key_required() {
        let rule = || RuleConfig::new(names::TABLE_PRIMARY_KEY);
        assert_eq!(
            offline(rule(), "CREATE TABLE t (id int, name varchar(20))").await,
            vec!["table t has no primary key".to_string()]
        );
        assert!(
            offline(rule(), "CREATE TABLE t (id int PRIMARY KEY)")
                .await
                .is_empty()
        );
        assert!(
            offline(rule(), "CREATE TABLE t (id int, PRIMARY KEY (id))")
                .await
                .is_empty()
        );
        assert!(offline(rule(), "CREATE TABLE t2 LIKE t").await.is_empty());
    }

    #[tokio::test]
    async fn test_auto_increment_start() {
        let rule = || RuleConfig::new(names::AUTO_INCREMENT_START);
        assert_eq!(
            offline(
                rule(),
                "CREATE TABLE t (id int AUTO_INCREMENT PRIMARY KEY) AUTO_INCREMENT=100"
            )
            .await
            .len(),
            1
        );
        assert!(
            offline(rule(), "CREATE TABLE t (id int PRIMARY KEY) AUTO_INCREMENT=0")
                .await
                .is_empty()
        );
        assert_eq!(
            offline(rule(), "SET auto_increment_offset = 5").await,
            vec!["auto_increment_offset is set to 5, it must not exceed 1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_table_engine() {
        let sql = "CREATE TABLE t (id int PRIMARY KEY) ENGINE=MyISAM";
        assert_eq!(
            offline(RuleConfig::new(names::TABLE_ENGINE), sql).await,
            vec!["table t uses storage engine MyISAM, expected InnoDB".to_string()]
        );
        assert!(
            offline(
                RuleConfig::new(names::TABLE_ENGINE).with_param("engine", "myisam"),
                sql
            )
            .await
            .is_empty()
        );
        assert!(
            offline(
                RuleConfig::new(names::TABLE_ENGINE),
                "CREATE TABLE t (id int PRIMARY KEY)"
            )
            .await
            .is_empty()
        );
    }

    #[tokio::test]
    async fn test_index_count_sees_session_state() {
        let rule = || RuleConfig::new(names::INDEX_COUNT).with_param("max_count", 2i64);
        let sql = "CREATE TABLE t (id int PRIMARY KEY, a int, b int, c int, KEY ia (a), KEY ib (b));
                   CREATE INDEX ic ON t (c)";
        assert_eq!(
            offline(rule(), sql).await,
            vec!["table t would have 3 indexes, more than 2".to_string()]
        );

        let sql = "CREATE TABLE t (id int PRIMARY KEY, a int, b int, KEY ia (a), KEY ib (b));
                   ALTER TABLE t DROP INDEX ia, ADD INDEX ic (a, b)";
        assert!(offline(rule(), sql).await.is_empty());
    }

    #[tokio::test]
    async fn test_alter_column_exists() {
        let rule = || RuleConfig::new(names::ALTER_COLUMN_EXISTS);
        let sql = "CREATE TABLE t (id int PRIMARY KEY, a int);
                   ALTER TABLE t MODIFY COLUMN b bigint, DROP COLUMN a";
        assert_eq!(
            offline(rule(), sql).await,
            vec!["column(s) b do not exist in table t".to_string()]
        );

        let sql = "CREATE TABLE t (id int PRIMARY KEY);
                   ALTER TABLE t ADD COLUMN c int, ADD INDEX ic (c)";
        assert!(offline(rule(), sql).await.is_empty());

        // Unknown table offline: undetermined, skipped.
        assert!(
            offline(rule(), "ALTER TABLE other DROP COLUMN x")
                .await
                .is_empty()
        );
    }
}
