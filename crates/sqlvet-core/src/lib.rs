//! Shared types for the sqlvet audit engine.
//!
//! This crate holds what every other sqlvet crate needs to agree on:
//!
//! - [`Severity`], [`Finding`] and [`AuditResults`]: the per-statement result set
//!   produced by rule dispatch and the pipeline's post-processing stages.
//! - [`config`]: the YAML configuration loaded by hosts (session defaults,
//!   live executor connection, online-DDL tool, rule list, report log).

// Configuration types shared across all sqlvet crates
pub mod config;

mod result;

pub use config::{
    ConfigError, ExecutorConfig, OnlineDdlConfig, ReportBackend, ReportConfig, RuleConfig,
    RuleParamValue, SessionConfig, SqlvetConfig,
};
pub use result::{AuditResults, Finding, Severity, UnknownSeverity};
