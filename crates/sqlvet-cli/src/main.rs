use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sqlvet_core::Severity;

mod commands;
mod engine;

use engine::{Engine, EngineOptions, load_config, read_sql};

#[derive(Parser, Debug)]
#[command(name = "sqlvet", version, about = "Audit MySQL statements before they run")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Audit a SQL file statement by statement.
    Audit {
        /// SQL file, or `-` for stdin
        file: PathBuf,

        /// Configuration file (default: ./sqlvet.yaml when present)
        #[arg(short, long, env = "SQLVET_CONFIG")]
        config: Option<PathBuf>,

        /// Default schema for unqualified table names
        #[arg(long)]
        schema: Option<String>,

        /// Exit with status 2 when a statement reaches this level
        #[arg(long, default_value = "error")]
        threshold: Severity,

        /// The SQL already ran; re-audit it without state-dependent checks
        #[arg(long, default_value_t = false)]
        executed: bool,

        /// Audit offline even when an executor is configured
        #[arg(long, default_value_t = false)]
        offline: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Estimate the rows a DML statement would touch (needs a live connection).
    Estimate {
        /// Statement text
        #[arg(long)]
        sql: String,

        #[arg(short, long, env = "SQLVET_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long)]
        schema: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Audit a SQL file, then execute it on the configured server.
    Exec {
        /// SQL file, or `-` for stdin
        file: PathBuf,

        #[arg(short, long, env = "SQLVET_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long)]
        schema: Option<String>,

        /// Refuse to execute when a statement reaches this level
        #[arg(long, default_value = "error")]
        threshold: Severity,

        /// Execute even when the audit reached the threshold
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Run every statement in a single transaction
        #[arg(long = "tx", default_value_t = false)]
        transaction: bool,
    },

    /// Print the fingerprint of each statement in a SQL file.
    Fingerprint {
        /// SQL file, or `-` for stdin
        file: PathBuf,

        /// Lower-case identifiers (servers with lower_case_table_names != 0)
        #[arg(long, default_value_t = false)]
        ignore_case: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List built-in rules and the ones the configuration enables.
    Rules {
        #[arg(short, long, env = "SQLVET_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Reports go to stdout; logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Audit {
            file,
            config,
            schema,
            threshold,
            executed,
            offline,
            format,
        } => {
            let sql = read_sql(&file)?;
            let options = EngineOptions {
                config,
                schema,
                executed,
                offline,
            };
            let engine = Engine::start(&options).await?;
            commands::audit::run(engine, &sql, threshold, format).await
        }

        Command::Estimate {
            sql,
            config,
            schema,
            format,
        } => {
            let options = EngineOptions {
                config,
                schema,
                ..Default::default()
            };
            let engine = Engine::start(&options).await?;
            commands::estimate::run(engine, &sql, format).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Exec {
            file,
            config,
            schema,
            threshold,
            force,
            transaction,
        } => {
            let sql = read_sql(&file)?;
            let options = EngineOptions {
                config,
                schema,
                ..Default::default()
            };
            let engine = Engine::start(&options).await?;
            let exec = commands::exec::ExecOptions {
                threshold,
                force,
                transaction,
            };
            commands::exec::run(engine, &sql, exec).await
        }

        Command::Fingerprint {
            file,
            ignore_case,
            format,
        } => {
            let sql = read_sql(&file)?;
            commands::fingerprint::run(&sql, !ignore_case, format)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Rules { config, format } => {
            let config = load_config(config.as_deref())?;
            commands::rules::run(&config, format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_audit_arguments() {
        let cli = Cli::try_parse_from([
            "sqlvet",
            "audit",
            "batch.sql",
            "--threshold",
            "warning",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.cmd {
            Command::Audit {
                threshold, format, ..
            } => {
                assert_eq!(threshold, Severity::Warning);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["sqlvet", "audit", "batch.sql", "--threshold", "fatal"]).is_err());
    }
}
