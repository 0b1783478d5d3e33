//! gh-ost online schema-change tool.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use sqlvet_core::{ExecutorConfig, OnlineDdlConfig};
use sqlvet_parser::alter_clause;
use sqlvet_runtime::{OnlineDdlError, OnlineDdlTool};

/// Server gh-ost connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
}

impl GhostConnection {
    /// Connection parameters from the discrete executor fields. gh-ost does
    /// not accept URLs, so URL-only configurations use the field defaults.
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.username.clone(),
            password: config.get_password(),
        }
    }
}

/// Runs `gh-ost` as a child process.
#[derive(Debug, Clone)]
pub struct GhostTool {
    binary: String,
    extra_args: Vec<String>,
    timeout: Duration,
    connection: GhostConnection,
}

impl GhostTool {
    pub fn new(config: &OnlineDdlConfig, connection: GhostConnection) -> Self {
        Self {
            binary: config.ghost_binary.clone(),
            extra_args: config.extra_args.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            connection,
        }
    }

    /// Command-line arguments for one invocation.
    pub fn args(
        &self,
        schema: &str,
        table: &str,
        alter: &str,
        dry_run: bool,
    ) -> Vec<String> {
        let mut args = vec![
            format!("--host={}", self.connection.host),
            format!("--port={}", self.connection.port),
            format!("--user={}", self.connection.user),
        ];
        if let Some(password) = &self.connection.password {
            args.push(format!("--password={password}"));
        }
        args.extend([
            format!("--database={schema}"),
            format!("--table={table}"),
            format!("--alter={alter}"),
            "--allow-on-master".to_string(),
            "--initially-drop-ghost-table".to_string(),
            "--initially-drop-old-table".to_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        if !dry_run {
            args.push("--execute".to_string());
        }
        args
    }
}

#[async_trait]
impl OnlineDdlTool for GhostTool {
    async fn run(
        &self,
        schema: &str,
        table: &str,
        statement: &str,
        dry_run: bool,
    ) -> Result<(), OnlineDdlError> {
        let action = if dry_run { "gh-ost dry run" } else { "gh-ost" };
        let alter = alter_clause(statement).map_err(|e| OnlineDdlError::Unsupported(e.to_string()))?;

        tracing::info!(schema, table, dry_run, "Starting gh-ost");
        let child = Command::new(&self.binary)
            .args(self.args(schema, table, &alter, dry_run))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OnlineDdlError::Spawn {
                binary: self.binary.clone(),
                message: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(OnlineDdlError::Spawn {
                    binary: self.binary.clone(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                tracing::error!(schema, table, dry_run, "gh-ost timed out");
                return Err(OnlineDdlError::Timeout {
                    action,
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(schema, table, dry_run, status = %output.status, "gh-ost failed");
            return Err(OnlineDdlError::Failed {
                action,
                status: output.status.to_string(),
                stderr,
            });
        }
        tracing::info!(schema, table, dry_run, "gh-ost finished");
        Ok(())
    }
}
