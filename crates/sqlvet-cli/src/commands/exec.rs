//! `sqlvet exec` command implementation.
//!
//! Audits the file first and executes it only when every statement stays
//! below the threshold (or `--force` is given).

use std::process::ExitCode;

use anyhow::Result;

use sqlvet_core::Severity;
use sqlvet_runtime::AuditError;

use crate::commands::audit::{THRESHOLD_EXIT, render_text};
use crate::engine::Engine;

pub struct ExecOptions {
    pub threshold: Severity,
    pub force: bool,
    pub transaction: bool,
}

pub async fn run(mut engine: Engine, sql: &str, options: ExecOptions) -> Result<ExitCode> {
    if engine.pipeline.context().is_offline() {
        engine.shutdown().await;
        anyhow::bail!("Executing SQL needs an `executor` section in the configuration");
    }

    let outcome = engine.pipeline.audit_batch(sql).await;
    if let Err(e) = engine.logger.log_batch(&outcome).await {
        tracing::error!(error = %e, "Failed to write audit report");
    }
    eprint!("{}", render_text(&outcome));
    let passed = outcome.passes(options.threshold);

    if let Some(error) = outcome.aborted {
        engine.shutdown().await;
        return Err(anyhow::Error::new(error).context("Audit stopped early, nothing executed"));
    }
    if !passed && !options.force {
        engine.shutdown().await;
        eprintln!(
            "Not executing: findings at or above '{}' (use --force to override)",
            options.threshold
        );
        return Ok(ExitCode::from(THRESHOLD_EXIT));
    }

    let statements: Vec<String> = outcome.reports.iter().map(|r| r.text.clone()).collect();
    let result = if options.transaction {
        engine.pipeline.tx(&statements).await
    } else {
        engine.pipeline.exec_batch(&statements).await
    };
    engine.shutdown().await;

    match result {
        Ok(outcomes) => {
            let affected: u64 = outcomes.iter().map(|o| o.rows_affected).sum();
            println!(
                "Executed {} statement(s), {affected} row(s) affected",
                outcomes.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(AuditError::ExecutionFailed {
            sql,
            completed,
            source,
        }) => {
            println!("Executed {} statement(s) before failing", completed.len());
            Err(anyhow::Error::new(*source).context(format!("Failed executing: {sql}")))
        }
        Err(e) => Err(anyhow::Error::new(e).context("Execution failed")),
    }
}
