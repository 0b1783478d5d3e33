//! Online schema-change support.
//!
//! Large `ALTER TABLE` statements can be routed through an external tool
//! (gh-ost) instead of running directly. The pipeline decides when, based on
//! the `ddl_ghost_min_size` rule; the tool itself sits behind
//! [`OnlineDdlTool`]. A `pt-online-schema-change` command line is suggested
//! separately, based on `ddl_osc_min_size`.

use async_trait::async_trait;

use sqlvet_parser::{ParseError, alter_clause};

use crate::error::OnlineDdlError;

/// An online schema-change tool.
#[async_trait]
pub trait OnlineDdlTool: Send + Sync {
    /// Apply (or, with `dry_run`, rehearse) `statement` against `schema.table`.
    async fn run(
        &self,
        schema: &str,
        table: &str,
        statement: &str,
        dry_run: bool,
    ) -> Result<(), OnlineDdlError>;
}

/// `pt-online-schema-change` invocation for an `ALTER TABLE` statement.
pub fn osc_command(
    binary: &str,
    schema: &str,
    table: &str,
    statement: &str,
) -> Result<String, ParseError> {
    let alter = alter_clause(statement)?;
    Ok(format!(
        "{binary} D={schema},t={table} --alter=\"{}\" --print --execute",
        alter.replace('"', "\\\"")
    ))
}
