//! Wiring shared by the commands: configuration, session, pipeline.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use sqlvet_adapter_mysql::{GhostConnection, GhostTool, MySqlExecutor};
use sqlvet_core::SqlvetConfig;
use sqlvet_report::AuditLogger;
use sqlvet_rules::{RuleRegistry, RuleSet};
use sqlvet_runtime::AuditPipeline;
use sqlvet_session::SessionContext;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "sqlvet.yaml";

/// Options every engine-backed command accepts.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub config: Option<PathBuf>,
    pub schema: Option<String>,
    pub executed: bool,
    pub offline: bool,
}

/// Load the configuration file, or defaults when there is none.
pub fn load_config(path: Option<&Path>) -> Result<SqlvetConfig> {
    match path {
        Some(path) => SqlvetConfig::load_with_context(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            SqlvetConfig::load_with_context(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("Failed to load configuration from {DEFAULT_CONFIG_FILE}"))
        }
        None => Ok(SqlvetConfig::default()),
    }
}

/// Read SQL from a file, or stdin for `-`.
pub fn read_sql(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .context("Failed to read SQL from stdin")?;
        return Ok(sql);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read SQL file: {}", input.display()))
}

/// Rules enabled for this run. An empty rule list enables every built-in rule.
pub fn rule_set(config: &SqlvetConfig) -> Result<RuleSet> {
    let registry = RuleRegistry::builtin();
    let rules = if config.rules.is_empty() {
        RuleSet::all(&registry)
    } else {
        RuleSet::bind(&registry, &config.rules)
    };
    rules.context("Invalid rule configuration")
}

/// An audit pipeline plus the report log, ready for one command.
pub struct Engine {
    pub config: SqlvetConfig,
    pub pipeline: AuditPipeline,
    pub logger: AuditLogger,
}

impl Engine {
    pub async fn start(options: &EngineOptions) -> Result<Self> {
        let config = load_config(options.config.as_deref())?;
        let rules = rule_set(&config)?;
        let logger = AuditLogger::new(config.report.clone()).context("Failed to open report log")?;

        let token = CancellationToken::new();
        let mut ctx = match &config.executor {
            Some(executor) if !options.offline => {
                let conn = MySqlExecutor::connect(executor)
                    .await
                    .context("Failed to connect to MySQL")?;
                SessionContext::live(Arc::new(conn))
            }
            _ => {
                tracing::info!("No executor configured, auditing offline");
                SessionContext::offline()
            }
        }
        .with_cancellation(token.clone());

        if let Some(schema) = options.schema.clone().or(config.session.default_schema.clone()) {
            ctx = ctx.with_default_schema(schema);
        }
        let live = !ctx.is_offline();

        let mut pipeline = AuditPipeline::new(ctx, rules)
            .with_osc_binary(config.online_ddl.osc_binary.clone())
            .with_executed_sql(options.executed || config.session.executed_sql);
        if live && let Some(executor) = &config.executor {
            let tool = GhostTool::new(&config.online_ddl, GhostConnection::from_config(executor));
            pipeline = pipeline.with_online_ddl(Arc::new(tool));
        }

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                token.cancel();
            }
        });

        Ok(Self {
            config,
            pipeline,
            logger,
        })
    }

    /// Release the live connection, logging rather than failing.
    pub async fn shutdown(self) {
        if let Err(e) = self.pipeline.close().await {
            tracing::warn!(error = %e, "Closing session failed");
        }
    }
}
