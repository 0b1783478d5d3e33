//! Pipeline tests against a scripted MySQL server and online-DDL tool.
//!
//! Test modules are organized by feature area:
//! - `live_audit` - schema pre-checks, explain pre-check, index advice, cancellation
//! - `online_ddl` - gh-ost decision and pt-online-schema-change suggestions
//! - `execution` - exec, exec_batch, transactions, kill and close
//!
//! Run with:
//!   cargo test -p sqlvet-runtime --test pipeline

#[path = "pipeline/common/mod.rs"]
mod common;

#[path = "pipeline/execution.rs"]
mod execution;

#[path = "pipeline/live_audit.rs"]
mod live_audit;

#[path = "pipeline/online_ddl.rs"]
mod online_ddl;
