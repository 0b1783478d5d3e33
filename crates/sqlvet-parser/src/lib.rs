//! # sqlvet-parser
//!
//! SQL parsing boundary for the sqlvet audit engine.
//!
//! This crate provides functionality to:
//! - Split a SQL batch into statements with their source lines
//! - Parse each statement with `sqlparser` (MySQL dialect)
//! - Classify statements into a closed sum type ([`StatementKind`])
//! - Read schema-changing statements into plain structures ([`ddl`])
//! - Compute statement fingerprints
//!
//! ## Parse policy
//!
//! Every statement is handed to `sqlparser` first. DDL that `sqlparser`
//! rejects but the schema reader understands (table options, index hints and
//! similar MySQL-specific syntax) is still accepted, without an AST. Anything
//! else `sqlparser` rejects is a syntax error.

pub mod clauses;
pub mod ddl;
pub mod error;
pub mod fingerprint;
pub mod lexer;
pub mod statement;

pub use clauses::{Clause, Clauses};
pub use ddl::{
    AlterOp, AlterTable, ColumnDef, CreateIndex, CreateTable, DropIndex, DropTable, IndexDef,
    IndexKind, RenameTable, TableOptions, alter_clause, parse_create_table, render_index,
};
pub use error::ParseError;
pub use lexer::{Lexeme, LexemeKind};
pub use statement::{
    InsertInfo, MutationInfo, SelectInfo, SetAssignment, StatementCategory, StatementEnvelope,
    StatementKind, TableName, statement_tables,
};

use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// One statement cut out of a batch, not yet parsed.
#[derive(Debug, Clone)]
pub struct RawStatement {
    pub text: String,
    /// Lexemes with spans relative to `text`.
    pub lexemes: Vec<Lexeme>,
    pub start_line: usize,
    pub batch_index: usize,
}

/// Splits, parses and fingerprints SQL text.
#[derive(Debug, Clone, Default)]
pub struct SqlParser {
    case_sensitive: bool,
}

impl SqlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep identifier case in fingerprints (`lower_case_table_names = 0`).
    pub fn with_case_sensitivity(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Split a batch at top-level semicolons. Empty statements are dropped.
    pub fn split(&self, sql: &str) -> Result<Vec<RawStatement>, ParseError> {
        let lexemes = lexer::tokenize(sql)?;
        let mut out = Vec::new();
        for chunk in lexemes.split(|l| l.is_symbol(";")) {
            let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
                continue;
            };
            let base = first.span.start;
            let text = sql[base..last.span.end].trim_end().to_string();
            let rebased = chunk
                .iter()
                .map(|l| Lexeme {
                    span: (l.span.start - base)..(l.span.end - base).min(text.len()),
                    ..l.clone()
                })
                .collect();
            out.push(RawStatement {
                start_line: first.line,
                batch_index: out.len(),
                text,
                lexemes: rebased,
            });
        }
        Ok(out)
    }

    /// Parse one statement cut out by [`SqlParser::split`].
    pub fn parse_statement(&self, raw: RawStatement) -> Result<StatementEnvelope, ParseError> {
        let RawStatement {
            text,
            lexemes,
            start_line,
            batch_index,
        } = raw;

        let ast = match Parser::parse_sql(&MySqlDialect {}, &text) {
            Ok(mut statements) if statements.len() == 1 => statements.pop(),
            Ok(statements) => {
                return Err(ParseError::Syntax {
                    line: start_line,
                    message: format!("expected one statement, found {}", statements.len()),
                });
            }
            Err(e) => {
                if statement::is_schema_statement(&lexemes)
                    && let Ok(kind) = statement::classify(&text, &lexemes, None)
                    && kind.is_ddl()
                {
                    tracing::debug!(
                        line = start_line,
                        error = %e,
                        "Accepted DDL rejected by sqlparser"
                    );
                    return Ok(self.envelope(text, kind, None, lexemes, start_line, batch_index));
                }
                tracing::error!(line = start_line, sql = %text, error = %e, "Failed to parse SQL");
                return Err(ParseError::Syntax {
                    line: start_line,
                    message: e.to_string(),
                });
            }
        };

        let kind = match statement::classify(&text, &lexemes, ast.as_ref()) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(
                    line = start_line,
                    error = %e,
                    "Statement shape not recognised, treating as opaque"
                );
                StatementKind::Other
            }
        };
        Ok(self.envelope(text, kind, ast, lexemes, start_line, batch_index))
    }

    /// Parse a whole batch, failing on the first malformed statement.
    pub fn parse(&self, sql: &str) -> Result<Vec<StatementEnvelope>, ParseError> {
        self.split(sql)?
            .into_iter()
            .map(|raw| self.parse_statement(raw))
            .collect()
    }

    /// Parse text that must hold exactly one statement.
    pub fn parse_one(&self, sql: &str) -> Result<StatementEnvelope, ParseError> {
        let mut statements = self.parse(sql)?;
        if statements.len() != 1 {
            return Err(ParseError::Syntax {
                line: statements.first().map(|s| s.start_line).unwrap_or(1),
                message: format!("expected one statement, found {}", statements.len()),
            });
        }
        statements.pop().ok_or_else(|| ParseError::Syntax {
            line: 1,
            message: "empty statement".to_string(),
        })
    }

    /// Fingerprint of each statement in `sql`.
    pub fn fingerprints(&self, sql: &str) -> Result<Vec<String>, ParseError> {
        Ok(self
            .split(sql)?
            .iter()
            .map(|raw| fingerprint::fingerprint(&raw.lexemes, self.case_sensitive))
            .collect())
    }

    fn envelope(
        &self,
        text: String,
        kind: StatementKind,
        ast: Option<sqlparser::ast::Statement>,
        lexemes: Vec<Lexeme>,
        start_line: usize,
        batch_index: usize,
    ) -> StatementEnvelope {
        let category = statement::category_of(&kind, &lexemes);
        let fingerprint = fingerprint::fingerprint(&lexemes, self.case_sensitive);
        StatementEnvelope {
            text,
            kind,
            ast,
            lexemes,
            fingerprint,
            start_line,
            category,
            batch_index,
        }
    }
}
