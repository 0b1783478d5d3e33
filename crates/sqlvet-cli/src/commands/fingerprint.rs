//! `sqlvet fingerprint` command implementation.
//!
//! Works offline: only the parser is involved.

use anyhow::{Context, Result};
use serde::Serialize;

use sqlvet_parser::SqlParser;

use crate::OutputFormat;

#[derive(Debug, Serialize, PartialEq)]
pub struct FingerprintLine {
    pub line: usize,
    pub kind: &'static str,
    pub fingerprint: String,
}

pub fn fingerprints(sql: &str, case_sensitive: bool) -> Result<Vec<FingerprintLine>> {
    let parser = SqlParser::new().with_case_sensitivity(case_sensitive);
    let statements = parser.parse(sql).context("Failed to parse SQL")?;
    Ok(statements
        .into_iter()
        .map(|stmt| FingerprintLine {
            line: stmt.start_line,
            kind: stmt.kind.name(),
            fingerprint: stmt.fingerprint,
        })
        .collect())
}

pub fn run(sql: &str, case_sensitive: bool, format: OutputFormat) -> Result<()> {
    let lines = fingerprints(sql, case_sensitive)?;
    match format {
        OutputFormat::Text => {
            for line in &lines {
                println!("{}\t{}", line.line, line.fingerprint);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&lines)?),
    }
    Ok(())
}
