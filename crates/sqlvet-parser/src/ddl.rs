//! Schema-changing statement reader.
//!
//! Reads `CREATE TABLE`, `ALTER TABLE`, `RENAME TABLE`, `DROP TABLE`,
//! `CREATE INDEX` and `DROP INDEX` into plain structures the session context
//! can apply to its table cache. The same reader parses the output of
//! `SHOW CREATE TABLE` when a definition is fetched from a live server.
//!
//! Column and index definitions keep their original source text (`raw`) so
//! reverse statements can restore them verbatim.

use serde::Serialize;
use std::fmt;

use crate::error::ParseError;
use crate::lexer::{self, Lexeme, slice_text, split_top_level, tokenize};
use crate::statement::TableName;

// =============================================================================
// Definitions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    /// Type as written, e.g. `varchar(64)` or `int unsigned`.
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub auto_increment: bool,
    pub comment: Option<String>,
    /// Inline `PRIMARY KEY`.
    pub primary_key: bool,
    /// Inline `UNIQUE`.
    pub unique: bool,
    /// Source text of the whole definition.
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
    Fulltext,
    Spatial,
    Foreign,
    Check,
}

impl ColumnDef {
    /// Same column under a new name; `raw` keeps the rest of the definition.
    pub fn renamed(&self, name: &str) -> ColumnDef {
        let rest = tokenize(&self.raw)
            .ok()
            .and_then(|lx| lx.first().map(|l| self.raw[l.span.end..].trim_start().to_string()))
            .unwrap_or_else(|| self.data_type.clone());
        ColumnDef {
            name: name.to_string(),
            raw: format!("`{name}` {rest}"),
            ..self.clone()
        }
    }
}

impl IndexKind {
    /// Whether the definition creates an index structure (checks do not).
    pub fn is_index(self) -> bool {
        !matches!(self, Self::Check)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    /// Index or constraint name; MySQL names primary keys `PRIMARY`.
    pub name: Option<String>,
    pub kind: IndexKind,
    pub columns: Vec<String>,
    /// Referenced table of a foreign key.
    pub references: Option<TableName>,
    pub raw: String,
}

impl IndexDef {
    /// Name MySQL reports for this index.
    pub fn effective_name(&self) -> Option<&str> {
        match self.kind {
            IndexKind::Primary => Some("PRIMARY"),
            _ => self.name.as_deref(),
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.kind, IndexKind::Unique | IndexKind::Primary)
    }

    /// Same index under a new name, with `raw` re-rendered.
    pub fn renamed(&self, name: &str) -> IndexDef {
        IndexDef {
            name: Some(name.to_string()),
            raw: render_index(self.kind, Some(name), &self.columns),
            ..self.clone()
        }
    }

    /// Same index over different columns, with `raw` re-rendered.
    pub fn with_columns(&self, columns: Vec<String>) -> IndexDef {
        IndexDef {
            raw: render_index(self.kind, self.name.as_deref(), &columns),
            columns,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableOptions {
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub collate: Option<String>,
    pub auto_increment: Option<String>,
    pub comment: Option<String>,
}

impl TableOptions {
    /// Overwrite the options `other` sets.
    pub fn merge(&mut self, other: TableOptions) {
        if other.engine.is_some() {
            self.engine = other.engine;
        }
        if other.charset.is_some() {
            self.charset = other.charset;
        }
        if other.collate.is_some() {
            self.collate = other.collate;
        }
        if other.auto_increment.is_some() {
            self.auto_increment = other.auto_increment;
        }
        if other.comment.is_some() {
            self.comment = other.comment;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TableOptions::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTable {
    pub table: TableName,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    pub options: TableOptions,
    /// `CREATE TABLE t LIKE src`.
    pub like: Option<TableName>,
}

impl CreateTable {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes
            .iter()
            .find(|i| i.effective_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Whether a primary key is declared inline or as a table constraint.
    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
            || self.indexes.iter().any(|i| i.kind == IndexKind::Primary)
    }

    /// Index definitions including those declared inline on columns.
    pub fn all_indexes(&self) -> Vec<IndexDef> {
        let mut out = Vec::new();
        for column in &self.columns {
            if column.primary_key {
                out.push(IndexDef {
                    name: None,
                    kind: IndexKind::Primary,
                    columns: vec![column.name.clone()],
                    references: None,
                    raw: format!("PRIMARY KEY (`{}`)", column.name),
                });
            }
            if column.unique {
                out.push(IndexDef {
                    name: Some(column.name.clone()),
                    kind: IndexKind::Unique,
                    columns: vec![column.name.clone()],
                    references: None,
                    raw: format!("UNIQUE KEY `{0}` (`{0}`)", column.name),
                });
            }
        }
        out.extend(self.indexes.iter().cloned());
        out
    }

    /// Render a `CREATE TABLE` statement from the current definition.
    pub fn to_sql(&self) -> String {
        let mut body: Vec<String> = self.columns.iter().map(|c| c.raw.clone()).collect();
        body.extend(self.indexes.iter().map(|i| i.raw.clone()));
        let mut sql = format!("CREATE TABLE {} (\n  {}\n)", self.table.quoted(), body.join(",\n  "));
        if let Some(engine) = &self.options.engine {
            sql.push_str(&format!(" ENGINE={engine}"));
        }
        if let Some(charset) = &self.options.charset {
            sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(collate) = &self.options.collate {
            sql.push_str(&format!(" COLLATE={collate}"));
        }
        if let Some(comment) = &self.options.comment {
            sql.push_str(&format!(" COMMENT='{}'", comment.replace('\'', "''")));
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AlterOp {
    AddColumn(ColumnDef),
    ModifyColumn(ColumnDef),
    ChangeColumn { old: String, column: ColumnDef },
    RenameColumn { old: String, new: String },
    DropColumn(String),
    AddIndex(IndexDef),
    DropIndex(String),
    DropPrimaryKey,
    DropForeignKey(String),
    DropConstraint(String),
    RenameIndex { old: String, new: String },
    RenameTable(TableName),
    Options(TableOptions),
    /// Operation with no effect on the cached table shape.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlterTable {
    pub table: TableName,
    pub ops: Vec<AlterOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateIndex {
    pub table: TableName,
    pub index: IndexDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropIndex {
    pub table: TableName,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropTable {
    pub tables: Vec<TableName>,
    pub if_exists: bool,
}

/// `RENAME TABLE a TO b, c TO d`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameTable {
    pub pairs: Vec<(TableName, TableName)>,
}

// =============================================================================
// Entry points
// =============================================================================

/// Parse a `CREATE TABLE` statement (or `SHOW CREATE TABLE` output).
pub fn parse_create_table(sql: &str) -> Result<CreateTable, ParseError> {
    let lexemes = tokenize(sql)?;
    read_create_table(sql, &lexemes)
}

pub(crate) fn read_create_table(text: &str, lx: &[Lexeme]) -> Result<CreateTable, ParseError> {
    let mut cur = Cursor::new(text, lx);
    cur.expect_kw("CREATE")?;
    cur.eat_kw("TEMPORARY");
    cur.expect_kw("TABLE")?;
    let if_not_exists = cur.eat_seq(&["IF", "NOT", "EXISTS"]);
    let table = cur.table_name()?;

    let mut create = CreateTable {
        table,
        if_not_exists,
        columns: Vec::new(),
        indexes: Vec::new(),
        options: TableOptions::default(),
        like: None,
    };

    if cur.eat_kw("LIKE") {
        create.like = Some(cur.table_name()?);
        return Ok(create);
    }

    if cur.peek().is_some_and(|l| l.is_symbol("(")) {
        let body = cur.group()?;
        if body.first().is_some_and(|l| l.is_kw("LIKE")) {
            let mut inner = Cursor::new(text, body);
            inner.next();
            create.like = Some(inner.table_name()?);
            return Ok(create);
        }
        for element in split_top_level(body, ",") {
            match read_element(text, element)? {
                Element::Column(column) => create.columns.push(column),
                Element::Index(index) => create.indexes.push(index),
                Element::Ignored => {}
            }
        }
    }

    create.options = read_table_options(&mut cur);
    Ok(create)
}

pub(crate) fn read_alter_table(text: &str, lx: &[Lexeme]) -> Result<AlterTable, ParseError> {
    let mut cur = Cursor::new(text, lx);
    cur.expect_kw("ALTER")?;
    cur.eat_kw("ONLINE");
    cur.eat_kw("IGNORE");
    cur.expect_kw("TABLE")?;
    let table = cur.table_name()?;

    let mut ops = Vec::new();
    for part in split_top_level(cur.rest(), ",") {
        read_alter_op(text, part, &mut ops)?;
    }
    Ok(AlterTable { table, ops })
}

pub(crate) fn read_rename_table(text: &str, lx: &[Lexeme]) -> Result<RenameTable, ParseError> {
    let mut cur = Cursor::new(text, lx);
    cur.expect_kw("RENAME")?;
    if !cur.eat_kw("TABLE") {
        cur.expect_kw("TABLES")?;
    }
    let mut pairs = Vec::new();
    for part in split_top_level(cur.rest(), ",") {
        let mut p = Cursor::new(text, part);
        let from = p.table_name()?;
        p.expect_kw("TO")?;
        let to = p.table_name()?;
        pairs.push((from, to));
    }
    if pairs.is_empty() {
        return Err(ParseError::ddl("RENAME TABLE without targets"));
    }
    Ok(RenameTable { pairs })
}

pub(crate) fn read_drop_table(text: &str, lx: &[Lexeme]) -> Result<DropTable, ParseError> {
    let mut cur = Cursor::new(text, lx);
    cur.expect_kw("DROP")?;
    cur.eat_kw("TEMPORARY");
    cur.expect_kw("TABLE")?;
    let if_exists = cur.eat_seq(&["IF", "EXISTS"]);
    let mut tables = Vec::new();
    for part in split_top_level(cur.rest(), ",") {
        let mut p = Cursor::new(text, part);
        tables.push(p.table_name()?);
    }
    Ok(DropTable { tables, if_exists })
}

pub(crate) fn read_create_index(text: &str, lx: &[Lexeme]) -> Result<CreateIndex, ParseError> {
    let mut cur = Cursor::new(text, lx);
    cur.expect_kw("CREATE")?;
    let kind = if cur.eat_kw("UNIQUE") {
        IndexKind::Unique
    } else if cur.eat_kw("FULLTEXT") {
        IndexKind::Fulltext
    } else if cur.eat_kw("SPATIAL") {
        IndexKind::Spatial
    } else {
        IndexKind::Index
    };
    cur.expect_kw("INDEX")?;
    let name = cur.ident()?;
    if cur.eat_kw("USING") {
        cur.next();
    }
    cur.expect_kw("ON")?;
    let table = cur.table_name()?;
    let columns = index_columns(text, cur.group()?);
    Ok(CreateIndex {
        table,
        index: IndexDef {
            raw: render_index(kind, Some(&name), &columns),
            name: Some(name),
            kind,
            columns,
            references: None,
        },
    })
}

pub(crate) fn read_drop_index(text: &str, lx: &[Lexeme]) -> Result<DropIndex, ParseError> {
    let mut cur = Cursor::new(text, lx);
    cur.expect_kw("DROP")?;
    cur.expect_kw("INDEX")?;
    let name = cur.ident()?;
    cur.expect_kw("ON")?;
    let table = cur.table_name()?;
    Ok(DropIndex { table, name })
}

/// Text of an `ALTER TABLE` statement after the table name, as gh-ost's `--alter` expects.
pub fn alter_clause(sql: &str) -> Result<String, ParseError> {
    let lexemes = tokenize(sql)?;
    let mut cur = Cursor::new(sql, &lexemes);
    cur.expect_kw("ALTER")?;
    cur.eat_kw("ONLINE");
    cur.eat_kw("IGNORE");
    cur.expect_kw("TABLE")?;
    cur.table_name()?;
    Ok(slice_text(sql, cur.rest()).to_string())
}

// =============================================================================
// Elements
// =============================================================================

enum Element {
    Column(ColumnDef),
    Index(IndexDef),
    Ignored,
}

const INDEX_STARTERS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "INDEX", "KEY", "FULLTEXT", "SPATIAL", "CHECK",
];

fn read_element(text: &str, lx: &[Lexeme]) -> Result<Element, ParseError> {
    let Some(first) = lx.first() else {
        return Ok(Element::Ignored);
    };
    if first.is_any_kw(INDEX_STARTERS) {
        return read_index(text, lx).map(Element::Index);
    }
    if first.is_kw("PERIOD") {
        return Ok(Element::Ignored);
    }
    read_column(text, lx).map(Element::Column)
}

fn read_index(text: &str, lx: &[Lexeme]) -> Result<IndexDef, ParseError> {
    let mut cur = Cursor::new(text, lx);
    let mut symbol = None;
    if cur.eat_kw("CONSTRAINT") && cur.peek().is_some_and(|l| l.is_ident() && !l.is_any_kw(INDEX_STARTERS)) {
        symbol = Some(cur.ident()?);
    }

    let kind = if cur.eat_seq(&["PRIMARY", "KEY"]) {
        IndexKind::Primary
    } else if cur.eat_kw("UNIQUE") {
        if !cur.eat_kw("INDEX") {
            cur.eat_kw("KEY");
        }
        IndexKind::Unique
    } else if cur.eat_seq(&["FOREIGN", "KEY"]) {
        IndexKind::Foreign
    } else if cur.eat_kw("CHECK") {
        IndexKind::Check
    } else if cur.eat_kw("FULLTEXT") {
        if !cur.eat_kw("INDEX") {
            cur.eat_kw("KEY");
        }
        IndexKind::Fulltext
    } else if cur.eat_kw("SPATIAL") {
        if !cur.eat_kw("INDEX") {
            cur.eat_kw("KEY");
        }
        IndexKind::Spatial
    } else if cur.eat_kw("INDEX") || cur.eat_kw("KEY") {
        IndexKind::Index
    } else {
        return Err(ParseError::ddl(format!(
            "unrecognized index definition: {}",
            slice_text(text, lx)
        )));
    };

    if kind == IndexKind::Check {
        return Ok(IndexDef {
            name: symbol,
            kind,
            columns: Vec::new(),
            references: None,
            raw: slice_text(text, lx).to_string(),
        });
    }

    let mut name = None;
    if cur.peek().is_some_and(|l| l.is_ident() && !l.is_kw("USING")) {
        name = Some(cur.ident()?);
    }
    if cur.eat_kw("USING") {
        cur.next();
    }
    let columns = index_columns(text, cur.group()?);

    let mut references = None;
    if kind == IndexKind::Foreign && cur.eat_kw("REFERENCES") {
        references = Some(cur.table_name()?);
    }

    Ok(IndexDef {
        name: name.or(symbol),
        kind,
        columns,
        references,
        raw: slice_text(text, lx).to_string(),
    })
}

fn index_columns(text: &str, group: &[Lexeme]) -> Vec<String> {
    split_top_level(group, ",")
        .into_iter()
        .filter_map(|part| match part.first() {
            Some(first) if first.is_ident() => Some(first.value.clone()),
            Some(_) => Some(slice_text(text, part).to_string()),
            None => None,
        })
        .collect()
}

const TYPE_MODIFIERS: &[&str] = &["UNSIGNED", "SIGNED", "ZEROFILL", "PRECISION", "VARYING"];

fn read_column(text: &str, lx: &[Lexeme]) -> Result<ColumnDef, ParseError> {
    let mut cur = Cursor::new(text, lx);
    let name = cur.ident()?;

    let type_start = cur.pos;
    match cur.next() {
        Some(l) if l.is_ident() => {}
        _ => {
            return Err(ParseError::ddl(format!(
                "column '{name}' has no data type"
            )));
        }
    }
    if cur.peek().is_some_and(|l| l.is_symbol("(")) {
        cur.group()?;
    }
    while cur.peek().is_some_and(|l| l.is_any_kw(TYPE_MODIFIERS)) {
        cur.next();
    }
    let data_type = slice_text(text, &lx[type_start..cur.pos]).to_string();

    let mut column = ColumnDef {
        name,
        data_type,
        nullable: true,
        default: None,
        auto_increment: false,
        comment: None,
        primary_key: false,
        unique: false,
        raw: slice_text(text, lx).to_string(),
    };

    while let Some(l) = cur.next() {
        if l.is_kw("NOT") && cur.eat_kw("NULL") {
            column.nullable = false;
        } else if l.is_kw("NULL") {
            column.nullable = true;
        } else if l.is_kw("DEFAULT") {
            column.default = Some(cur.expression_value()?);
        } else if l.is_kw("AUTO_INCREMENT") {
            column.auto_increment = true;
        } else if l.is_kw("PRIMARY") {
            cur.eat_kw("KEY");
            column.primary_key = true;
            column.nullable = false;
        } else if l.is_kw("KEY") {
            column.primary_key = true;
            column.nullable = false;
        } else if l.is_kw("UNIQUE") {
            cur.eat_kw("KEY");
            column.unique = true;
        } else if l.is_kw("COMMENT") {
            column.comment = cur.next().map(|c| c.value.clone());
        } else if l.is_kw("REFERENCES") {
            break;
        } else if l.is_any_kw(&["CHECK", "AS"]) {
            if cur.peek().is_some_and(|l| l.is_symbol("(")) {
                cur.group()?;
            }
        } else if l.is_kw("ON") && cur.eat_kw("UPDATE") {
            cur.expression_value()?;
        } else if l.is_symbol("(") {
            return Err(ParseError::ddl(format!(
                "unexpected '(' in definition of column '{}'",
                column.name
            )));
        }
    }
    Ok(column)
}

fn read_table_options(cur: &mut Cursor<'_>) -> TableOptions {
    let mut options = TableOptions::default();
    while let Some(l) = cur.peek() {
        if l.is_any_kw(&["PARTITION", "AS", "SELECT", "IGNORE", "REPLACE"]) || l.is_symbol("(") {
            break;
        }
        cur.next();
        if l.is_symbol(",") || l.is_kw("DEFAULT") {
            continue;
        }

        let key = if l.is_kw("CHARACTER") {
            cur.eat_kw("SET");
            "CHARSET".to_string()
        } else {
            l.value.to_ascii_uppercase()
        };
        cur.eat_symbol("=");
        let Some(value) = cur.next() else { break };
        let value = value.value.clone();

        match key.as_str() {
            "ENGINE" => options.engine = Some(value),
            "CHARSET" => options.charset = Some(value),
            "COLLATE" => options.collate = Some(value),
            "AUTO_INCREMENT" => options.auto_increment = Some(value),
            "COMMENT" => options.comment = Some(value),
            _ => {}
        }
    }
    options
}

fn read_alter_op(text: &str, part: &[Lexeme], ops: &mut Vec<AlterOp>) -> Result<(), ParseError> {
    let mut cur = Cursor::new(text, part);
    let Some(first) = cur.next() else {
        return Ok(());
    };
    let other = || AlterOp::Other(slice_text(text, part).to_string());

    if first.is_kw("ADD") {
        let column_kw = cur.eat_kw("COLUMN");
        if cur.peek().is_some_and(|l| l.is_symbol("(")) {
            let group = cur.group()?;
            for element in split_top_level(group, ",") {
                match read_element(text, element)? {
                    Element::Column(c) => ops.push(AlterOp::AddColumn(c)),
                    Element::Index(i) => ops.push(AlterOp::AddIndex(i)),
                    Element::Ignored => {}
                }
            }
            return Ok(());
        }
        if cur.peek().is_some_and(|l| l.is_kw("PARTITION")) {
            ops.push(other());
            return Ok(());
        }
        let rest = cur.rest();
        match (column_kw, read_element(text, rest)?) {
            (false, Element::Index(index)) => ops.push(AlterOp::AddIndex(index)),
            (_, Element::Column(column)) => ops.push(AlterOp::AddColumn(column)),
            _ => ops.push(other()),
        }
    } else if first.is_kw("DROP") {
        if cur.eat_seq(&["PRIMARY", "KEY"]) {
            ops.push(AlterOp::DropPrimaryKey);
        } else if cur.eat_seq(&["FOREIGN", "KEY"]) {
            ops.push(AlterOp::DropForeignKey(cur.ident()?));
        } else if cur.eat_kw("INDEX") || cur.eat_kw("KEY") {
            ops.push(AlterOp::DropIndex(cur.ident()?));
        } else if cur.eat_kw("CONSTRAINT") || cur.eat_kw("CHECK") {
            ops.push(AlterOp::DropConstraint(cur.ident()?));
        } else if cur.peek().is_some_and(|l| l.is_kw("PARTITION")) {
            ops.push(other());
        } else {
            cur.eat_kw("COLUMN");
            ops.push(AlterOp::DropColumn(cur.ident()?));
        }
    } else if first.is_kw("MODIFY") {
        cur.eat_kw("COLUMN");
        ops.push(AlterOp::ModifyColumn(read_column(text, cur.rest())?));
    } else if first.is_kw("CHANGE") {
        cur.eat_kw("COLUMN");
        let old = cur.ident()?;
        ops.push(AlterOp::ChangeColumn {
            old,
            column: read_column(text, cur.rest())?,
        });
    } else if first.is_kw("RENAME") {
        if cur.eat_kw("COLUMN") {
            let old = cur.ident()?;
            cur.expect_kw("TO")?;
            ops.push(AlterOp::RenameColumn {
                old,
                new: cur.ident()?,
            });
        } else if cur.eat_kw("INDEX") || cur.eat_kw("KEY") {
            let old = cur.ident()?;
            cur.expect_kw("TO")?;
            ops.push(AlterOp::RenameIndex {
                old,
                new: cur.ident()?,
            });
        } else {
            if !cur.eat_kw("TO") {
                cur.eat_kw("AS");
            }
            ops.push(AlterOp::RenameTable(cur.table_name()?));
        }
    } else if first.is_any_kw(&[
        "ENGINE", "DEFAULT", "CHARSET", "CHARACTER", "COLLATE", "AUTO_INCREMENT", "COMMENT",
    ]) {
        let mut opt_cur = Cursor::new(text, part);
        ops.push(AlterOp::Options(read_table_options(&mut opt_cur)));
    } else {
        ops.push(other());
    }
    Ok(())
}

/// Render an index definition clause (`UNIQUE KEY `name` (`a`,`b`)`).
pub fn render_index(kind: IndexKind, name: Option<&str>, columns: &[String]) -> String {
    let cols = columns
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(",");
    let prefix = match kind {
        IndexKind::Primary => return format!("PRIMARY KEY ({cols})"),
        IndexKind::Unique => "UNIQUE KEY",
        IndexKind::Fulltext => "FULLTEXT KEY",
        IndexKind::Spatial => "SPATIAL KEY",
        IndexKind::Foreign => "FOREIGN KEY",
        IndexKind::Index | IndexKind::Check => "KEY",
    };
    match name {
        Some(name) => format!("{prefix} `{name}` ({cols})"),
        None => format!("{prefix} ({cols})"),
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Primary => "primary key",
            Self::Unique => "unique index",
            Self::Index => "index",
            Self::Fulltext => "fulltext index",
            Self::Spatial => "spatial index",
            Self::Foreign => "foreign key",
            Self::Check => "check constraint",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Cursor
// =============================================================================

pub(crate) struct Cursor<'a> {
    text: &'a str,
    lx: &'a [Lexeme],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(text: &'a str, lx: &'a [Lexeme]) -> Self {
        Self { text, lx, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<&'a Lexeme> {
        self.lx.get(self.pos)
    }

    pub(crate) fn next(&mut self) -> Option<&'a Lexeme> {
        let l = self.lx.get(self.pos);
        if l.is_some() {
            self.pos += 1;
        }
        l
    }

    pub(crate) fn rest(&self) -> &'a [Lexeme] {
        &self.lx[self.pos.min(self.lx.len())..]
    }

    pub(crate) fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek().is_some_and(|l| l.is_kw(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a keyword sequence only if all of it is present.
    pub(crate) fn eat_seq(&mut self, kws: &[&str]) -> bool {
        let matches = kws
            .iter()
            .enumerate()
            .all(|(i, kw)| self.lx.get(self.pos + i).is_some_and(|l| l.is_kw(kw)));
        if matches {
            self.pos += kws.len();
        }
        matches
    }

    pub(crate) fn eat_symbol(&mut self, sym: &str) -> bool {
        if self.peek().is_some_and(|l| l.is_symbol(sym)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_kw(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(ParseError::ddl(format!(
                "expected {kw}, found {}",
                self.peek().map(|l| l.value.as_str()).unwrap_or("end of statement")
            )))
        }
    }

    pub(crate) fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(l) if l.is_ident() || l.kind == lexer::LexemeKind::String => {
                self.pos += 1;
                Ok(l.value.clone())
            }
            other => Err(ParseError::ddl(format!(
                "expected identifier, found {}",
                other.map(|l| l.value.as_str()).unwrap_or("end of statement")
            ))),
        }
    }

    /// `name` or `schema.name`.
    pub(crate) fn table_name(&mut self) -> Result<TableName, ParseError> {
        let first = self.ident()?;
        if self.eat_symbol(".") {
            let name = self.ident()?;
            Ok(TableName::qualified(first, name))
        } else {
            Ok(TableName::new(first))
        }
    }

    /// Consume a parenthesized group and return its inner lexemes.
    pub(crate) fn group(&mut self) -> Result<&'a [Lexeme], ParseError> {
        if !self.peek().is_some_and(|l| l.is_symbol("(")) {
            return Err(ParseError::ddl("expected '('"));
        }
        let close = lexer::matching_paren(self.lx, self.pos)
            .ok_or_else(|| ParseError::ddl("unbalanced parentheses"))?;
        let inner = &self.lx[self.pos + 1..close];
        self.pos = close + 1;
        Ok(inner)
    }

    /// A default or `ON UPDATE` value: literal, signed number, word, or call.
    fn expression_value(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(l) if l.is_symbol("(") => {
                self.group()?;
            }
            Some(l) if l.is_symbol("-") || l.is_symbol("+") => {
                self.pos += 2;
            }
            Some(_) => {
                self.pos += 1;
                if self.peek().is_some_and(|l| l.is_symbol("(")) {
                    self.group()?;
                }
            }
            None => return Err(ParseError::ddl("DEFAULT without a value")),
        }
        let end = self.pos.min(self.lx.len());
        let run = &self.lx[start..end];
        Ok(match run {
            [single] if single.is_literal() => single.value.clone(),
            _ => slice_text(self.text, run).to_string(),
        })
    }
}
