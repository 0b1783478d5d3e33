//! `sqlvet estimate` command implementation.

use anyhow::{Context, Result};

use crate::OutputFormat;
use crate::engine::Engine;

/// Estimate the rows one statement would touch. Needs a live connection.
pub async fn run(engine: Engine, sql: &str, format: OutputFormat) -> Result<()> {
    if engine.pipeline.context().is_offline() {
        engine.shutdown().await;
        anyhow::bail!("Estimating affected rows needs an `executor` section in the configuration");
    }

    let result = engine.pipeline.estimate_affected_rows(sql).await;
    let estimate = match result {
        Ok(Some(estimate)) => estimate,
        Ok(None) => {
            engine.shutdown().await;
            anyhow::bail!("No estimate available for an offline session");
        }
        Err(e) => {
            engine.shutdown().await;
            return Err(anyhow::Error::new(e).context("Estimation failed"));
        }
    };
    if let Err(e) = engine.logger.log_estimate(sql, &estimate).await {
        tracing::error!(error = %e, "Failed to write estimate report");
    }
    engine.shutdown().await;

    match format {
        OutputFormat::Text => {
            if let Some(message) = &estimate.message {
                println!("{message}");
            } else {
                println!("{} row(s)", estimate.rows);
                if let Some(rewritten) = &estimate.rewritten_sql {
                    println!("count query: {rewritten}");
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&estimate).context("Failed to render estimate")?;
            println!("{json}");
        }
    }
    Ok(())
}
