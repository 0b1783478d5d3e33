//! Validity pre-checks run before rule dispatch.
//!
//! Statement-local checks (duplicate names, undefined index columns) always
//! run. With a live connection on a fresh audit, the statement is also checked
//! against the session's view of the schema: referenced objects must exist and
//! created ones must not. Facts the session cannot determine are skipped.

use std::collections::HashSet;

use sqlvet_parser::{
    AlterOp, CreateTable, IndexDef, IndexKind, StatementEnvelope, StatementKind, TableName,
};
use sqlvet_session::{SessionContext, SessionError, apply_alter_op};

/// Rule name findings from this stage are reported under.
pub const PRE_CHECK: &str = "pre_check";

/// Messages describing why the statement is invalid; empty when it is not.
pub async fn prevalidate(
    ctx: &SessionContext,
    stmt: &StatementEnvelope,
    against_schema: bool,
) -> Result<Vec<String>, SessionError> {
    let mut violations = local_violations(&stmt.kind);
    if against_schema {
        violations.extend(schema_violations(ctx, &stmt.kind).await?);
    }
    Ok(violations)
}

// =============================================================================
// Statement-local checks
// =============================================================================

fn local_violations(kind: &StatementKind) -> Vec<String> {
    let mut out = Vec::new();
    match kind {
        StatementKind::CreateTable(create) if create.like.is_none() => {
            check_create_table(create, &mut out)
        }
        StatementKind::AlterTable(alter) => {
            let mut columns = HashSet::new();
            let mut indexes = HashSet::new();
            for op in &alter.ops {
                match op {
                    AlterOp::AddColumn(column) => {
                        if !columns.insert(column.name.to_lowercase()) {
                            out.push(format!("duplicate column `{}`", column.name));
                        }
                    }
                    AlterOp::AddIndex(index) => {
                        if let Some(name) = &index.name
                            && !indexes.insert(name.to_lowercase())
                        {
                            out.push(format!("duplicate index name `{name}`"));
                        }
                        check_index_columns_unique(index, &mut out);
                    }
                    _ => {}
                }
            }
        }
        StatementKind::CreateIndex(create) => check_index_columns_unique(&create.index, &mut out),
        _ => {}
    }
    out
}

fn check_create_table(create: &CreateTable, out: &mut Vec<String>) {
    let mut columns = HashSet::new();
    for column in &create.columns {
        if !columns.insert(column.name.to_lowercase()) {
            out.push(format!("duplicate column `{}`", column.name));
        }
    }

    let mut names = HashSet::new();
    let mut primary_keys = create.columns.iter().filter(|c| c.primary_key).count();
    for index in &create.indexes {
        if index.kind == IndexKind::Primary {
            primary_keys += 1;
        }
        if let Some(name) = &index.name
            && index.kind.is_index()
            && index.kind != IndexKind::Primary
            && !names.insert(name.to_lowercase())
        {
            out.push(format!("duplicate index name `{name}`"));
        }
        if index.kind == IndexKind::Check {
            continue;
        }
        for column in &index.columns {
            if create.column(column).is_none() {
                let what = match index.kind {
                    IndexKind::Primary => "primary key",
                    _ => "index",
                };
                out.push(format!("{what} column `{column}` is not defined"));
            }
        }
        check_index_columns_unique(index, out);
    }
    if primary_keys > 1 {
        out.push("multiple primary keys defined".to_string());
    }
}

fn check_index_columns_unique(index: &IndexDef, out: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for column in &index.columns {
        if !seen.insert(column.to_lowercase()) {
            out.push(format!(
                "index `{}` lists column `{column}` more than once",
                index.effective_name().unwrap_or("(unnamed)")
            ));
        }
    }
}

// =============================================================================
// Checks against the session schema
// =============================================================================

/// `None` when the session cannot tell.
async fn table_exists(ctx: &SessionContext, table: &TableName) -> Result<Option<bool>, SessionError> {
    match ctx.table_exists(table).await {
        Ok(exists) => Ok(Some(exists)),
        Err(e) if e.is_undetermined() => Ok(None),
        Err(e) => Err(e),
    }
}

async fn schema_exists(ctx: &SessionContext, name: &str) -> Result<Option<bool>, SessionError> {
    if name.is_empty() {
        return Ok(None);
    }
    match ctx.schema_exists(name).await {
        Ok(exists) => Ok(Some(exists)),
        Err(e) if e.is_undetermined() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Report a missing schema or table; `true` when the table exists.
async fn require_table(
    ctx: &SessionContext,
    table: &TableName,
    out: &mut Vec<String>,
) -> Result<bool, SessionError> {
    let schema = ctx.resolve_schema_name(table);
    if schema_exists(ctx, &schema).await? == Some(false) {
        out.push(format!("schema `{schema}` does not exist"));
        return Ok(false);
    }
    match table_exists(ctx, table).await? {
        Some(true) => Ok(true),
        Some(false) => {
            out.push(format!("table `{}` does not exist", qualified(ctx, table)));
            Ok(false)
        }
        None => Ok(false),
    }
}

fn qualified(ctx: &SessionContext, table: &TableName) -> String {
    let schema = ctx.resolve_schema_name(table);
    if schema.is_empty() {
        table.name.clone()
    } else {
        format!("{schema}.{}", table.name)
    }
}

async fn schema_violations(
    ctx: &SessionContext,
    kind: &StatementKind,
) -> Result<Vec<String>, SessionError> {
    let mut out = Vec::new();
    match kind {
        StatementKind::Select(_)
        | StatementKind::Insert(_)
        | StatementKind::Update(_)
        | StatementKind::Delete(_) => {
            let mut seen = HashSet::new();
            for table in kind.tables() {
                if seen.insert(qualified(ctx, &table)) {
                    require_table(ctx, &table, &mut out).await?;
                }
            }
        }
        StatementKind::CreateTable(create) => {
            let schema = ctx.resolve_schema_name(&create.table);
            if schema_exists(ctx, &schema).await? == Some(false) {
                out.push(format!("schema `{schema}` does not exist"));
            } else if !create.if_not_exists && table_exists(ctx, &create.table).await? == Some(true) {
                out.push(format!("table `{}` already exists", qualified(ctx, &create.table)));
            }
            if let Some(source) = &create.like {
                require_table(ctx, source, &mut out).await?;
            }
        }
        StatementKind::AlterTable(alter) => {
            if require_table(ctx, &alter.table, &mut out).await? {
                let definition = ctx.get_table_definition(&alter.table).await?;
                let mut shape = definition.create.clone();
                for op in &alter.ops {
                    check_alter_op(&shape, op, &mut out);
                    apply_alter_op(&mut shape, op);
                }
                for op in &alter.ops {
                    if let AlterOp::RenameTable(target) = op
                        && table_exists(ctx, target).await? == Some(true)
                    {
                        out.push(format!("table `{}` already exists", qualified(ctx, target)));
                    }
                }
            }
        }
        StatementKind::DropTable(drop) if !drop.if_exists => {
            for table in &drop.tables {
                require_table(ctx, table, &mut out).await?;
            }
        }
        StatementKind::RenameTable(rename) => {
            for (from, to) in &rename.pairs {
                require_table(ctx, from, &mut out).await?;
                if table_exists(ctx, to).await? == Some(true) {
                    out.push(format!("table `{}` already exists", qualified(ctx, to)));
                }
            }
        }
        StatementKind::CreateIndex(create) => {
            if require_table(ctx, &create.table, &mut out).await? {
                let definition = ctx.get_table_definition(&create.table).await?;
                check_alter_op(
                    &definition.create,
                    &AlterOp::AddIndex(create.index.clone()),
                    &mut out,
                );
            }
        }
        StatementKind::DropIndex(drop) => {
            if require_table(ctx, &drop.table, &mut out).await? {
                let definition = ctx.get_table_definition(&drop.table).await?;
                check_alter_op(&definition.create, &AlterOp::DropIndex(drop.name.clone()), &mut out);
            }
        }
        StatementKind::CreateDatabase {
            name,
            if_not_exists: false,
        } => {
            if schema_exists(ctx, name).await? == Some(true) {
                out.push(format!("schema `{name}` already exists"));
            }
        }
        StatementKind::DropDatabase {
            name,
            if_exists: false,
        }
        | StatementKind::Use(name) => {
            if schema_exists(ctx, name).await? == Some(false) {
                out.push(format!("schema `{name}` does not exist"));
            }
        }
        _ => {}
    }
    Ok(out)
}

/// Check one `ALTER TABLE` operation against the table shape before it.
fn check_alter_op(shape: &CreateTable, op: &AlterOp, out: &mut Vec<String>) {
    let table = &shape.table.name;
    let missing_column = |name: &str, out: &mut Vec<String>| {
        if shape.column(name).is_none() {
            out.push(format!("column `{name}` does not exist in table `{table}`"));
        }
    };

    match op {
        AlterOp::AddColumn(column) => {
            if shape.column(&column.name).is_some() {
                out.push(format!(
                    "column `{}` already exists in table `{table}`",
                    column.name
                ));
            }
        }
        AlterOp::ModifyColumn(column) => missing_column(&column.name, out),
        AlterOp::ChangeColumn { old, column } => {
            missing_column(old, out);
            if !old.eq_ignore_ascii_case(&column.name) && shape.column(&column.name).is_some() {
                out.push(format!(
                    "column `{}` already exists in table `{table}`",
                    column.name
                ));
            }
        }
        AlterOp::RenameColumn { old, new } => {
            missing_column(old, out);
            if shape.column(new).is_some() {
                out.push(format!("column `{new}` already exists in table `{table}`"));
            }
        }
        AlterOp::DropColumn(name) => missing_column(name, out),
        AlterOp::AddIndex(index) => {
            if let Some(name) = &index.name
                && index.kind != IndexKind::Check
                && shape.index(name).is_some()
            {
                out.push(format!("index `{name}` already exists in table `{table}`"));
            }
            if index.kind == IndexKind::Primary && shape.has_primary_key() {
                out.push(format!("table `{table}` already has a primary key"));
            }
            if index.kind.is_index() {
                for column in &index.columns {
                    missing_column(column, out);
                }
            }
        }
        AlterOp::DropIndex(name) | AlterOp::RenameIndex { old: name, .. } => {
            if shape.index(name).is_none() {
                out.push(format!("index `{name}` does not exist in table `{table}`"));
            }
        }
        AlterOp::DropPrimaryKey => {
            if !shape.has_primary_key() {
                out.push(format!("table `{table}` has no primary key"));
            }
        }
        _ => {}
    }
}
