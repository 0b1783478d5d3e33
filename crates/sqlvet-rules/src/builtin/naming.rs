//! Naming rules.

use async_trait::async_trait;

use sqlvet_parser::{AlterOp, IndexDef, IndexKind, StatementKind, TableName};

use super::lookup_table;
use crate::error::RuleError;
use crate::registry::{RuleHandler, RuleInput};

/// Names a statement introduces.
fn introduced_names(kind: &StatementKind) -> Vec<&str> {
    let mut names = Vec::new();
    match kind {
        StatementKind::CreateTable(create) => {
            names.push(create.table.name.as_str());
            names.extend(create.columns.iter().map(|c| c.name.as_str()));
            names.extend(create.indexes.iter().filter_map(|i| i.name.as_deref()));
        }
        StatementKind::AlterTable(alter) => {
            for op in &alter.ops {
                match op {
                    AlterOp::AddColumn(column) | AlterOp::ModifyColumn(column) => {
                        names.push(column.name.as_str())
                    }
                    AlterOp::ChangeColumn { column, .. } => names.push(column.name.as_str()),
                    AlterOp::RenameColumn { new, .. } | AlterOp::RenameIndex { new, .. } => {
                        names.push(new.as_str())
                    }
                    AlterOp::AddIndex(index) => names.extend(index.name.as_deref()),
                    AlterOp::RenameTable(table) => names.push(table.name.as_str()),
                    _ => {}
                }
            }
        }
        StatementKind::CreateIndex(create) => names.extend(create.index.name.as_deref()),
        StatementKind::RenameTable(rename) => {
            names.extend(rename.pairs.iter().map(|(_, to)| to.name.as_str()))
        }
        StatementKind::CreateDatabase { name, .. } => names.push(name.as_str()),
        _ => {}
    }
    names
}

pub struct ObjectNameLength;

#[async_trait]
impl RuleHandler for ObjectNameLength {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let max = input.params().get_int("max_length")?;
        let too_long: Vec<String> = introduced_names(&input.stmt.kind)
            .into_iter()
            .filter(|name| name.chars().count() as i64 > max)
            .map(str::to_string)
            .collect();
        if !too_long.is_empty() {
            input.report(format!(
                "object names longer than {max} characters: {}",
                too_long.join(", ")
            ));
        }
        Ok(())
    }
}

/// A unique index a statement creates or renames, with the table it belongs to.
struct UniqueIndex {
    table: TableName,
    name: String,
    columns: Vec<String>,
}

/// Unique indexes added by the statement, plus renamed indexes that are unique.
///
/// A renamed index is matched by its prior name against the unique
/// constraints the session knows for the table; when the table's shape cannot
/// be determined the rename is not checked.
async fn unique_indexes(input: &RuleInput<'_>) -> Result<Vec<UniqueIndex>, RuleError> {
    let added = |table: &TableName, index: &IndexDef| {
        (index.kind == IndexKind::Unique)
            .then(|| index.name.clone())
            .flatten()
            .map(|name| UniqueIndex {
                table: table.clone(),
                name,
                columns: index.columns.clone(),
            })
    };

    let mut out = Vec::new();
    match &input.stmt.kind {
        StatementKind::CreateTable(create) => {
            out.extend(create.indexes.iter().filter_map(|i| added(&create.table, i)));
        }
        StatementKind::CreateIndex(create) => out.extend(added(&create.table, &create.index)),
        StatementKind::AlterTable(alter) => {
            for op in &alter.ops {
                match op {
                    AlterOp::AddIndex(index) => out.extend(added(&alter.table, index)),
                    AlterOp::RenameIndex { old, new } => {
                        let Some(current) = lookup_table(input.ctx, &alter.table).await? else {
                            continue;
                        };
                        let prior = current.create.indexes.iter().find(|i| {
                            i.kind == IndexKind::Unique
                                && i.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(old))
                        });
                        if let Some(prior) = prior {
                            out.push(UniqueIndex {
                                table: alter.table.clone(),
                                name: new.clone(),
                                columns: prior.columns.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    Ok(out)
}

pub struct UniqueIndexPrefix;

#[async_trait]
impl RuleHandler for UniqueIndexPrefix {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        let prefix = input.params().get_str("prefix")?.to_string();
        let offending: Vec<String> = unique_indexes(input)
            .await?
            .into_iter()
            .filter(|index| {
                !index
                    .name
                    .to_ascii_lowercase()
                    .starts_with(&prefix.to_ascii_lowercase())
            })
            .map(|index| index.name)
            .collect();
        if !offending.is_empty() {
            input.report(format!(
                "unique index names must start with \"{prefix}\": {}",
                offending.join(", ")
            ));
        }
        Ok(())
    }
}

pub struct UniqueIndexNameFormat;

#[async_trait]
impl RuleHandler for UniqueIndexNameFormat {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
        for index in unique_indexes(input).await? {
            let expected = format!("IDX_UK_{}_{}", index.table.name, index.columns.join("_"));
            if !index.name.eq_ignore_ascii_case(&expected) {
                input.report(format!(
                    "unique index {} should be named {expected}",
                    index.name
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builtin::names;
    use crate::builtin::test_support::{offline, run};
    use pretty_assertions::assert_eq;
    use sqlvet_core::RuleConfig;
    use sqlvet_session::SessionContext;
    use sqlvet_session::testing::MockExecutor;
    use std::sync::Arc;

    fn live() -> SessionContext {
        let server = MockExecutor::new().with_table(
            "app",
            "users",
            "CREATE TABLE `users` (\n  `id` int NOT NULL,\n  `email` varchar(64) NOT NULL,\n  \
             PRIMARY KEY (`id`),\n  UNIQUE KEY `email_key` (`email`),\n  KEY `idx_email` (`email`)\n) ENGINE=InnoDB",
            1.0,
            10,
        );
        SessionContext::live(Arc::new(server)).with_default_schema("app")
    }

    #[tokio::test]
    async fn test_object_name_length() {
        let rule = || RuleConfig::new(names::OBJECT_NAME_LENGTH).with_param("max_length", 5i64);
        assert_eq!(
            offline(
                rule(),
                "CREATE TABLE orders (id int PRIMARY KEY, created int, KEY ix (id))"
            )
            .await,
            vec!["object names longer than 5 characters: orders, created".to_string()]
        );
        assert_eq!(
            offline(rule(), "ALTER TABLE t RENAME COLUMN a TO abcdefg").await,
            vec!["object names longer than 5 characters: abcdefg".to_string()]
        );
        assert!(
            offline(
                RuleConfig::new(names::OBJECT_NAME_LENGTH),
                "CREATE TABLE orders (id int PRIMARY KEY)"
            )
            .await
            .is_empty()
        );
    }

    #[tokio::test]
    async fn test_unique_prefix() {
        let rule = || RuleConfig::new(names::UNIQUE_INDEX_PREFIX);
        assert_eq!(
            run(
                &mut live(),
                rule(),
                "CREATE TABLE t (id int PRIMARY KEY, a int, UNIQUE KEY a_key (a), UNIQUE KEY uniq_id (id))"
            )
            .await,
            vec!["unique index names must start with \"uniq_\": a_key".to_string()]
        );
        assert!(
            run(
                &mut live(),
                rule(),
                "CREATE UNIQUE INDEX UNIQ_email ON users (email)"
            )
            .await
            .is_empty()
        );
    }

    #[tokio::test]
    async fn test_unique_prefix_on_rename() {
        let rule = || RuleConfig::new(names::UNIQUE_INDEX_PREFIX);
        assert_eq!(
            run(
                &mut live(),
                rule(),
                "ALTER TABLE users RENAME INDEX email_key TO mail"
            )
            .await,
            vec!["unique index names must start with \"uniq_\": mail".to_string()]
        );
        // A non-unique index may be renamed freely.
        assert!(
            run(
                &mut live(),
                rule(),
                "ALTER TABLE users RENAME INDEX idx_email TO mail"
            )
            .await
            .is_empty()
        );
    }

    #[tokio::test]
    async fn test_unique_name_format() {
        let rule = || RuleConfig::new(names::UNIQUE_INDEX_NAME_FORMAT);
        assert_eq!(
            run(
                &mut live(),
                rule(),
                "ALTER TABLE users ADD UNIQUE INDEX uk_mail (email)"
            )
            .await,
            vec!["unique index uk_mail should be named IDX_UK_users_email".to_string()]
        );
        assert!(
            run(
                &mut live(),
                rule(),
                "ALTER TABLE users RENAME INDEX email_key TO idx_uk_users_email"
            )
            .await
            .is_empty()
        );
        assert_eq!(
            run(
                &mut live(),
                rule(),
                "ALTER TABLE users RENAME INDEX email_key TO something"
            )
            .await
            .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_live_only_rules_silent_offline() {
        assert!(
            offline(
                RuleConfig::new(names::UNIQUE_INDEX_PREFIX),
                "CREATE TABLE t (id int PRIMARY KEY, a int, UNIQUE KEY a_key (a))"
            )
            .await
            .is_empty()
        );
    }
}
