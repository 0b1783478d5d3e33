//! Statement envelopes and the closed statement sum type.

use serde::Serialize;
use sqlparser::ast::{
    Delete, Ident, Insert, ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableObject,
    Update, Visit, Visitor,
};
use std::convert::Infallible;
use std::fmt;
use std::ops::ControlFlow;

use crate::clauses::Clauses;
use crate::ddl::{
    self, AlterTable, CreateIndex, CreateTable, DropIndex, DropTable, RenameTable,
};
use crate::error::ParseError;
use crate::lexer::{Lexeme, slice_text, split_top_level};

/// A possibly schema-qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Backtick-quoted form, e.g. `` `shop`.`orders` ``.
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("`{}`.`{}`", schema, self.name),
            None => format!("`{}`", self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Coarse statement category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementCategory {
    /// Read-only statements (`SELECT`, `SHOW`, `EXPLAIN`).
    Query,
    /// Data changes (`INSERT`, `UPDATE`, `DELETE`).
    Mutation,
    /// Schema changes and session statements.
    Definition,
}

impl fmt::Display for StatementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "DQL"),
            Self::Mutation => write!(f, "DML"),
            Self::Definition => write!(f, "DDL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectInfo {
    pub tables: Vec<TableName>,
    pub select_star: bool,
    pub has_where: bool,
    pub is_union: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertInfo {
    pub table: TableName,
    /// All tables referenced, target first.
    pub tables: Vec<TableName>,
    /// Number of literal rows for `VALUES` and `SET` forms.
    pub value_rows: Option<usize>,
}

/// `UPDATE` or `DELETE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationInfo {
    pub tables: Vec<TableName>,
    pub has_where: bool,
    pub has_limit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetAssignment {
    /// Lower-cased variable name without `@@` or scope prefix.
    pub name: String,
    pub value: String,
}

/// Every statement shape the engine distinguishes.
///
/// Rules match the variants they care about and ignore the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    Select(SelectInfo),
    Insert(InsertInfo),
    Update(MutationInfo),
    Delete(MutationInfo),
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    RenameTable(RenameTable),
    DropTable(DropTable),
    CreateIndex(CreateIndex),
    DropIndex(DropIndex),
    CreateDatabase { name: String, if_not_exists: bool },
    DropDatabase { name: String, if_exists: bool },
    Use(String),
    Set(Vec<SetAssignment>),
    Other,
}

impl StatementKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
            Self::CreateTable(_) => "CREATE TABLE",
            Self::AlterTable(_) => "ALTER TABLE",
            Self::RenameTable(_) => "RENAME TABLE",
            Self::DropTable(_) => "DROP TABLE",
            Self::CreateIndex(_) => "CREATE INDEX",
            Self::DropIndex(_) => "DROP INDEX",
            Self::CreateDatabase { .. } => "CREATE DATABASE",
            Self::DropDatabase { .. } => "DROP DATABASE",
            Self::Use(_) => "USE",
            Self::Set(_) => "SET",
            Self::Other => "OTHER",
        }
    }

    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            Self::Select(_) | Self::Insert(_) | Self::Update(_) | Self::Delete(_)
        )
    }

    /// Whether the statement changes the shape of the schema.
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Self::CreateTable(_)
                | Self::AlterTable(_)
                | Self::RenameTable(_)
                | Self::DropTable(_)
                | Self::CreateIndex(_)
                | Self::DropIndex(_)
                | Self::CreateDatabase { .. }
                | Self::DropDatabase { .. }
        )
    }

    /// Tables the statement reads, writes or changes, in source order.
    pub fn tables(&self) -> Vec<TableName> {
        match self {
            Self::Select(s) => s.tables.clone(),
            Self::Insert(i) => i.tables.clone(),
            Self::Update(m) | Self::Delete(m) => m.tables.clone(),
            Self::CreateTable(c) => {
                let mut out = vec![c.table.clone()];
                out.extend(c.like.iter().cloned());
                out
            }
            Self::AlterTable(a) => vec![a.table.clone()],
            Self::RenameTable(r) => r
                .pairs
                .iter()
                .flat_map(|(from, to)| [from.clone(), to.clone()])
                .collect(),
            Self::DropTable(d) => d.tables.clone(),
            Self::CreateIndex(c) => vec![c.table.clone()],
            Self::DropIndex(d) => vec![d.table.clone()],
            _ => Vec::new(),
        }
    }
}

/// The unit of work flowing through the audit pipeline.
#[derive(Debug, Clone)]
pub struct StatementEnvelope {
    /// Statement text without the trailing semicolon.
    pub text: String,
    pub kind: StatementKind,
    /// Parsed AST; absent for DDL only the schema reader understood.
    pub ast: Option<Statement>,
    pub lexemes: Vec<Lexeme>,
    /// Normalized text with literals abstracted.
    pub fingerprint: String,
    /// 1-based line of the first token in the batch text.
    pub start_line: usize,
    pub category: StatementCategory,
    /// Position in the batch, starting at 0.
    pub batch_index: usize,
}

impl StatementEnvelope {
    pub fn clauses(&self) -> Clauses {
        Clauses::scan(&self.lexemes)
    }
}

// =============================================================================
// Classification
// =============================================================================

pub(crate) fn classify(
    text: &str,
    lx: &[Lexeme],
    ast: Option<&Statement>,
) -> Result<StatementKind, ParseError> {
    if let Some(stmt) = ast
        && let Some(kind) = dml_kind(stmt)?
    {
        return Ok(kind);
    }

    let Some(first) = lx.first() else {
        return Ok(StatementKind::Other);
    };
    let second = lx.get(1);
    let second_is = |kws: &[&str]| second.is_some_and(|l| l.is_any_kw(kws));

    let kind = if first.is_kw("CREATE") {
        if second_is(&["TABLE", "TEMPORARY"]) {
            StatementKind::CreateTable(ddl::read_create_table(text, lx)?)
        } else if second_is(&["UNIQUE", "FULLTEXT", "SPATIAL", "INDEX"]) {
            StatementKind::CreateIndex(ddl::read_create_index(text, lx)?)
        } else if second_is(&["DATABASE", "SCHEMA"]) {
            let if_not_exists = lx.get(2).is_some_and(|l| l.is_kw("IF"));
            let name = lx
                .get(if if_not_exists { 5 } else { 2 })
                .filter(|l| l.is_ident())
                .ok_or_else(|| ParseError::ddl("CREATE DATABASE without a name"))?;
            StatementKind::CreateDatabase {
                name: name.value.clone(),
                if_not_exists,
            }
        } else {
            StatementKind::Other
        }
    } else if first.is_kw("ALTER") && second_is(&["TABLE", "ONLINE", "IGNORE"]) {
        StatementKind::AlterTable(ddl::read_alter_table(text, lx)?)
    } else if first.is_kw("RENAME") && second_is(&["TABLE", "TABLES"]) {
        StatementKind::RenameTable(ddl::read_rename_table(text, lx)?)
    } else if first.is_kw("DROP") {
        if second_is(&["TABLE", "TEMPORARY"]) {
            StatementKind::DropTable(ddl::read_drop_table(text, lx)?)
        } else if second_is(&["INDEX"]) {
            StatementKind::DropIndex(ddl::read_drop_index(text, lx)?)
        } else if second_is(&["DATABASE", "SCHEMA"]) {
            let if_exists = lx.get(2).is_some_and(|l| l.is_kw("IF"));
            let name = lx
                .get(if if_exists { 4 } else { 2 })
                .filter(|l| l.is_ident())
                .ok_or_else(|| ParseError::ddl("DROP DATABASE without a name"))?;
            StatementKind::DropDatabase {
                name: name.value.clone(),
                if_exists,
            }
        } else {
            StatementKind::Other
        }
    } else if first.is_kw("USE") {
        let name = second
            .filter(|l| l.is_ident())
            .ok_or_else(|| ParseError::ddl("USE without a schema"))?;
        StatementKind::Use(name.value.clone())
    } else if first.is_kw("SET") {
        StatementKind::Set(set_assignments(text, &lx[1..]))
    } else {
        StatementKind::Other
    };
    Ok(kind)
}

pub(crate) fn category_of(kind: &StatementKind, lx: &[Lexeme]) -> StatementCategory {
    match kind {
        StatementKind::Select(_) => StatementCategory::Query,
        StatementKind::Insert(_) | StatementKind::Update(_) | StatementKind::Delete(_) => {
            StatementCategory::Mutation
        }
        StatementKind::Other
            if lx
                .first()
                .is_some_and(|l| l.is_any_kw(&["SHOW", "EXPLAIN", "DESC", "DESCRIBE"])) =>
        {
            StatementCategory::Query
        }
        _ => StatementCategory::Definition,
    }
}

/// Whether the leading keywords name a statement the schema reader handles.
pub(crate) fn is_schema_statement(lx: &[Lexeme]) -> bool {
    lx.first()
        .is_some_and(|l| l.is_any_kw(&["CREATE", "ALTER", "RENAME", "DROP"]))
}

/// Data statements are read from the AST only.
fn dml_kind(stmt: &Statement) -> Result<Option<StatementKind>, ParseError> {
    let kind = match stmt {
        Statement::Query(query) => match query.body.as_ref() {
            // `WITH ... UPDATE/DELETE/INSERT`: the outer statement carries the CTE scope.
            SetExpr::Update(Statement::Update(update)) => {
                StatementKind::Update(update_info(stmt, update))
            }
            SetExpr::Delete(Statement::Delete(delete)) => {
                StatementKind::Delete(delete_info(stmt, delete))
            }
            SetExpr::Insert(Statement::Insert(insert)) => {
                StatementKind::Insert(insert_info(stmt, insert)?)
            }
            _ => StatementKind::Select(select_info(stmt, query)),
        },
        Statement::Insert(insert) => StatementKind::Insert(insert_info(stmt, insert)?),
        Statement::Update(update) => StatementKind::Update(update_info(stmt, update)),
        Statement::Delete(delete) => StatementKind::Delete(delete_info(stmt, delete)),
        _ => return Ok(None),
    };
    Ok(Some(kind))
}

fn select_info(stmt: &Statement, query: &Query) -> SelectInfo {
    SelectInfo {
        tables: statement_tables(stmt),
        select_star: set_expr_has_wildcard(&query.body),
        has_where: top_select(&query.body).is_some_and(|select| select.selection.is_some()),
        is_union: is_set_operation(&query.body),
    }
}

fn top_select(body: &SetExpr) -> Option<&Select> {
    match body {
        SetExpr::Select(select) => Some(select.as_ref()),
        SetExpr::Query(query) => top_select(&query.body),
        _ => None,
    }
}

fn is_set_operation(body: &SetExpr) -> bool {
    match body {
        SetExpr::SetOperation { .. } => true,
        SetExpr::Query(query) => is_set_operation(&query.body),
        _ => false,
    }
}

fn set_expr_has_wildcard(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.projection.iter().any(|item| {
            matches!(
                item,
                SelectItem::Wildcard(..) | SelectItem::QualifiedWildcard(..)
            )
        }),
        SetExpr::Query(query) => set_expr_has_wildcard(&query.body),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_has_wildcard(left) || set_expr_has_wildcard(right)
        }
        _ => false,
    }
}

fn insert_info(stmt: &Statement, insert: &Insert) -> Result<InsertInfo, ParseError> {
    let table = match &insert.table {
        TableObject::TableName(name) => table_name(name),
        _ => None,
    }
    .ok_or_else(|| ParseError::ddl("INSERT without a target table"))?;

    let value_rows = match insert.source.as_deref() {
        Some(source) => match source.body.as_ref() {
            SetExpr::Values(values) => Some(values.rows.len()),
            _ => None,
        },
        None if !insert.assignments.is_empty() => Some(1),
        None => None,
    };

    let mut tables = vec![table.clone()];
    for t in statement_tables(stmt) {
        if !tables.contains(&t) {
            tables.push(t);
        }
    }
    Ok(InsertInfo {
        table,
        tables,
        value_rows,
    })
}

fn update_info(stmt: &Statement, update: &Update) -> MutationInfo {
    MutationInfo {
        tables: statement_tables(stmt),
        has_where: update.selection.is_some(),
        has_limit: update.limit.is_some(),
    }
}

fn delete_info(stmt: &Statement, delete: &Delete) -> MutationInfo {
    MutationInfo {
        tables: statement_tables(stmt),
        has_where: delete.selection.is_some(),
        has_limit: delete.limit.is_some(),
    }
}

fn set_assignments(text: &str, lx: &[Lexeme]) -> Vec<SetAssignment> {
    split_top_level(lx, ",")
        .into_iter()
        .filter_map(|part| {
            let eq = part
                .iter()
                .position(|l| l.is_symbol("=") || l.is_symbol(":="))?;
            let mut name = slice_text(text, &part[..eq]).trim().to_ascii_lowercase();
            for prefix in ["global ", "session ", "local ", "persist "] {
                if let Some(rest) = name.strip_prefix(prefix) {
                    name = rest.trim().to_string();
                }
            }
            let name = name.trim_start_matches('@');
            let name = ["global.", "session.", "local."]
                .iter()
                .find_map(|p| name.strip_prefix(p))
                .unwrap_or(name)
                .to_string();
            let value_lx = &part[eq + 1..];
            let value = match value_lx {
                [single] if single.is_literal() => single.value.clone(),
                _ => slice_text(text, value_lx).to_string(),
            };
            Some(SetAssignment { name, value })
        })
        .collect()
}

// =============================================================================
// Table references
// =============================================================================

/// Collects base tables in visit order, skipping names bound by an enclosing `WITH`.
#[derive(Default)]
struct RelationCollector {
    /// CTE names of each query being visited, innermost last.
    scopes: Vec<Vec<String>>,
    tables: Vec<TableName>,
}

impl RelationCollector {
    fn is_cte(&self, table: &TableName) -> bool {
        table.schema.is_none()
            && self
                .scopes
                .iter()
                .flatten()
                .any(|cte| cte.eq_ignore_ascii_case(&table.name))
    }
}

impl Visitor for RelationCollector {
    type Break = Infallible;

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let names = query
            .with
            .iter()
            .flat_map(|with| &with.cte_tables)
            .map(|cte| cte.alias.name.value.clone())
            .collect();
        self.scopes.push(names);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.scopes.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if let Some(table) = table_name(relation)
            && !table.name.eq_ignore_ascii_case("dual")
            && !self.is_cte(&table)
            && !self.tables.contains(&table)
        {
            self.tables.push(table);
        }
        ControlFlow::Continue(())
    }
}

/// Base tables a statement reads or writes at any depth, in source order.
///
/// Common table expressions are not tables: `WITH recent AS (...) SELECT ...
/// FROM recent` yields only the tables inside `recent`.
pub fn statement_tables(stmt: &Statement) -> Vec<TableName> {
    let mut collector = RelationCollector::default();
    let ControlFlow::Continue(()) = stmt.visit(&mut collector);
    collector.tables
}

/// `name` or `schema.name`; `None` for function-valued name parts.
fn table_name(name: &ObjectName) -> Option<TableName> {
    let idents: Vec<&Ident> = name
        .0
        .iter()
        .map(|part| part.as_ident())
        .collect::<Option<_>>()?;
    match idents.as_slice() {
        [] => None,
        [table] => Some(TableName::new(table.value.clone())),
        [.., schema, table] => Some(TableName::qualified(
            schema.value.clone(),
            table.value.clone(),
        )),
    }
}
