//! Reverse statements for DDL.
//!
//! Generated before the statement's effect is applied to the session, so the
//! session still holds the definitions a reversal needs (dropped columns,
//! dropped indexes, previous options). Operations that cannot be reversed
//! from what the session knows are left out.

use sqlvet_parser::{AlterOp, ColumnDef, CreateTable, IndexDef, IndexKind, StatementKind, TableName};
use sqlvet_session::{SessionContext, SessionError};

/// Reverse of `kind`, or `None` when nothing can be generated.
pub async fn rollback_sql(
    ctx: &SessionContext,
    kind: &StatementKind,
) -> Result<Option<String>, SessionError> {
    let statements = match kind {
        StatementKind::CreateTable(create) => vec![format!(
            "DROP TABLE {}",
            qualified(ctx, &create.table).quoted()
        )],
        StatementKind::DropTable(drop) => {
            let mut out = Vec::new();
            for table in &drop.tables {
                if let Some(create) = current(ctx, table).await? {
                    out.push(create.to_sql());
                }
            }
            out
        }
        StatementKind::RenameTable(rename) => {
            let pairs: Vec<String> = rename
                .pairs
                .iter()
                .rev()
                .map(|(from, to)| {
                    format!(
                        "{} TO {}",
                        qualified(ctx, to).quoted(),
                        qualified(ctx, from).quoted()
                    )
                })
                .collect();
            vec![format!("RENAME TABLE {}", pairs.join(", "))]
        }
        StatementKind::CreateIndex(create) => match create.index.effective_name() {
            Some(name) => vec![format!(
                "DROP INDEX `{name}` ON {}",
                qualified(ctx, &create.table).quoted()
            )],
            None => Vec::new(),
        },
        StatementKind::DropIndex(drop) => match current(ctx, &drop.table).await? {
            Some(create) => create
                .index(&drop.name)
                .map(|index| {
                    vec![format!(
                        "ALTER TABLE {} ADD {}",
                        qualified(ctx, &drop.table).quoted(),
                        index.raw
                    )]
                })
                .unwrap_or_default(),
            None => Vec::new(),
        },
        StatementKind::AlterTable(alter) => {
            let shape = current(ctx, &alter.table).await?;
            let mut table = qualified(ctx, &alter.table);
            let mut reversed = Vec::new();
            for op in &alter.ops {
                if let AlterOp::RenameTable(to) = op {
                    table = qualified(ctx, to);
                }
                if let Some(clause) = reverse_op(shape.as_ref(), &alter.table, op) {
                    reversed.push(clause);
                }
            }
            reversed.reverse();
            if reversed.is_empty() {
                Vec::new()
            } else {
                vec![format!("ALTER TABLE {} {}", table.quoted(), reversed.join(", "))]
            }
        }
        StatementKind::CreateDatabase { name, .. } => vec![format!("DROP DATABASE `{name}`")],
        _ => Vec::new(),
    };

    if statements.is_empty() {
        Ok(None)
    } else {
        Ok(Some(statements.join(";\n")))
    }
}

fn qualified(ctx: &SessionContext, table: &TableName) -> TableName {
    let schema = ctx.resolve_schema_name(table);
    if schema.is_empty() {
        table.clone()
    } else {
        TableName::qualified(schema, table.name.clone())
    }
}

/// Definition before the statement; `None` when the session cannot tell.
async fn current(
    ctx: &SessionContext,
    table: &TableName,
) -> Result<Option<CreateTable>, SessionError> {
    match ctx.get_table_definition(table).await {
        Ok(definition) => Ok(Some(definition.create.clone())),
        Err(e) if e.is_undetermined() || e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn column<'a>(shape: Option<&'a CreateTable>, name: &str) -> Option<&'a ColumnDef> {
    shape.and_then(|s| s.column(name))
}

fn index<'a>(shape: Option<&'a CreateTable>, name: &str) -> Option<&'a IndexDef> {
    shape.and_then(|s| s.index(name))
}

fn reverse_op(shape: Option<&CreateTable>, table: &TableName, op: &AlterOp) -> Option<String> {
    match op {
        AlterOp::AddColumn(column) => Some(format!("DROP COLUMN `{}`", column.name)),
        AlterOp::DropColumn(name) => column(shape, name).map(|c| format!("ADD COLUMN {}", c.raw)),
        AlterOp::ModifyColumn(new) => {
            column(shape, &new.name).map(|c| format!("MODIFY COLUMN {}", c.raw))
        }
        AlterOp::ChangeColumn { old, column: new } => {
            column(shape, old).map(|c| format!("CHANGE COLUMN `{}` {}", new.name, c.raw))
        }
        AlterOp::RenameColumn { old, new } => Some(format!("RENAME COLUMN `{new}` TO `{old}`")),
        AlterOp::AddIndex(index) => match index.kind {
            IndexKind::Primary => Some("DROP PRIMARY KEY".to_string()),
            IndexKind::Foreign => index
                .name
                .as_ref()
                .map(|name| format!("DROP FOREIGN KEY `{name}`")),
            IndexKind::Check => index
                .name
                .as_ref()
                .map(|name| format!("DROP CHECK `{name}`")),
            _ => index
                .name
                .as_ref()
                .map(|name| format!("DROP INDEX `{name}`")),
        },
        AlterOp::DropIndex(name) | AlterOp::DropForeignKey(name) | AlterOp::DropConstraint(name) => {
            index(shape, name).map(|i| format!("ADD {}", i.raw))
        }
        AlterOp::DropPrimaryKey => shape
            .map(CreateTable::all_indexes)
            .and_then(|all| all.into_iter().find(|i| i.kind == IndexKind::Primary))
            .map(|i| format!("ADD {}", i.raw)),
        AlterOp::RenameIndex { old, new } => Some(format!("RENAME INDEX `{new}` TO `{old}`")),
        AlterOp::RenameTable(_) => Some(format!("RENAME TO `{}`", table.name)),
        AlterOp::Options(options) => {
            let before = shape.map(|s| &s.options)?;
            let mut restore = Vec::new();
            if options.engine.is_some()
                && let Some(engine) = &before.engine
            {
                restore.push(format!("ENGINE={engine}"));
            }
            if options.charset.is_some()
                && let Some(charset) = &before.charset
            {
                restore.push(format!("DEFAULT CHARSET={charset}"));
            }
            if options.comment.is_some() {
                let comment = before.comment.as_deref().unwrap_or_default();
                restore.push(format!("COMMENT='{}'", comment.replace('\'', "''")));
            }
            (!restore.is_empty()).then(|| restore.join(" "))
        }
        AlterOp::Other(_) => None,
    }
}
