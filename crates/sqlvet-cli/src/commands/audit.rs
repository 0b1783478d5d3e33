//! `sqlvet audit` command implementation.
//!
//! Audits a SQL file statement by statement and prints the verdicts.

use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;

use sqlvet_core::Severity;
use sqlvet_runtime::{BatchOutcome, StatementReport};

use crate::OutputFormat;
use crate::engine::Engine;

/// Exit status when a statement reaches the threshold.
pub const THRESHOLD_EXIT: u8 = 2;

#[derive(Debug, Serialize)]
struct AuditOutput<'a> {
    passed: bool,
    threshold: Severity,
    statements: &'a [StatementReport],
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted: Option<String>,
}

pub async fn run(
    mut engine: Engine,
    sql: &str,
    threshold: Severity,
    format: OutputFormat,
) -> Result<ExitCode> {
    let outcome = engine.pipeline.audit_batch(sql).await;
    if let Err(e) = engine.logger.log_batch(&outcome).await {
        tracing::error!(error = %e, "Failed to write audit report");
    }
    engine.shutdown().await;
    let passed = outcome.passes(threshold);

    match format {
        OutputFormat::Text => print!("{}", render_text(&outcome)),
        OutputFormat::Json => {
            let output = AuditOutput {
                passed,
                threshold,
                statements: &outcome.reports,
                aborted: outcome.aborted.as_ref().map(ToString::to_string),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if let Some(error) = outcome.aborted {
        return Err(anyhow::Error::new(error).context("Audit stopped early"));
    }
    if passed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(THRESHOLD_EXIT))
    }
}

/// Human-readable verdicts, one block per statement.
pub fn render_text(outcome: &BatchOutcome) -> String {
    let mut out = String::new();
    for report in &outcome.reports {
        let verdict = report
            .level()
            .map(|level| level.to_string())
            .unwrap_or_else(|| "ok".to_string());
        out.push_str(&format!(
            "line {} [{}] {}: {}\n",
            report.start_line,
            verdict,
            report.kind,
            one_line(&report.text)
        ));
        for finding in report.findings() {
            out.push_str(&format!("    {finding} ({})\n", finding.rule));
        }
        if report.requires_online_ddl {
            out.push_str("    runs through gh-ost\n");
        }
        if let Some(rollback) = &report.rollback_sql {
            out.push_str(&format!("    rollback: {}\n", one_line(rollback)));
        }
    }
    out
}

fn one_line(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineOptions};
    use std::io::Write;

    async fn offline_engine(rules: &str) -> (Engine, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{rules}").unwrap();
        let options = EngineOptions {
            config: Some(file.path().to_path_buf()),
            schema: Some("app".to_string()),
            ..Default::default()
        };
        (Engine::start(&options).await.unwrap(), file)
    }

    #[tokio::test]
    async fn test_render_text() {
        let (mut engine, _config) =
            offline_engine("rules:\n  - name: dml_check_where_exists\n").await;
        let outcome = engine
            .pipeline
            .audit_batch("SELECT 1;\nDELETE\n  FROM orders;")
            .await;

        let text = render_text(&outcome);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("line 1 [ok]"));
        assert!(lines[1].starts_with("line 2 [error]"));
        assert!(lines[1].ends_with("DELETE FROM orders"));
        assert!(lines[2].contains("(dml_check_where_exists)"));
    }

    #[tokio::test]
    async fn test_threshold_exit_status() {
        let rules = "rules:\n  - name: dml_check_where_exists\n";

        let (engine, _config) = offline_engine(rules).await;
        let code = run(engine, "DELETE FROM orders", Severity::Error, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::from(THRESHOLD_EXIT));

        let (engine, _config) = offline_engine(rules).await;
        let code = run(
            engine,
            "DELETE FROM orders WHERE id = 1",
            Severity::Error,
            OutputFormat::Text,
        )
        .await
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_syntax_error_is_engine_error() {
        let (engine, _config) = offline_engine("rules: []\n").await;
        let result = run(engine, "SELECT 1; SELEC oops", Severity::Error, OutputFormat::Text).await;
        assert!(result.is_err());
    }
}
