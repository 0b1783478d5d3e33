//! Online-DDL decision tests.

use super::common::*;
use pretty_assertions::assert_eq;
use sqlvet_core::{RuleConfig, Severity};
use sqlvet_rules::names;
use std::sync::Arc;

const ALTER: &str = "ALTER TABLE orders ADD COLUMN note int";

#[tokio::test]
async fn test_large_table_dry_run_success_is_reported_at_rule_level() {
    let tool = Arc::new(ScriptedTool::new());
    let mut pipeline = live_pipeline(
        orders_server(2048.0),
        &[RuleConfig::new(names::GHOST_MIN_SIZE)],
    )
    .with_online_ddl(tool.clone());

    let outcome = pipeline.audit_batch(ALTER).await;

    assert!(outcome.is_complete());
    let report = &outcome.reports[0];
    assert!(report.requires_online_ddl);
    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].level, Severity::Notice);
    assert_eq!(report.findings()[0].rule, names::GHOST_MIN_SIZE);
    assert!(report.findings()[0].message.contains("gh-ost"));
    assert_eq!(tool.calls(), vec![ToolCall::new(true)]);
}

#[tokio::test]
async fn test_dry_run_failure_is_error_finding_not_abort() {
    let tool = Arc::new(ScriptedTool::failing_dry_run());
    let mut pipeline = live_pipeline(
        orders_server(2048.0),
        &[RuleConfig::new(names::GHOST_MIN_SIZE).with_level(Severity::Warning)],
    )
    .with_online_ddl(tool.clone());

    let outcome = pipeline
        .audit_batch("ALTER TABLE orders ADD COLUMN note int; SELECT id FROM orders")
        .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.reports.len(), 2);
    let finding = &outcome.reports[0].findings()[0];
    assert_eq!(finding.level, Severity::Error);
    assert!(finding.message.contains("cannot acquire metadata lock"));
    assert_eq!(tool.calls().len(), 1);
}

#[tokio::test]
async fn test_ghost_triggers_only_above_threshold_and_osc_at_threshold() {
    let tool = Arc::new(ScriptedTool::new());
    let mut pipeline = live_pipeline(
        orders_server(1024.0),
        &[
            RuleConfig::new(names::GHOST_MIN_SIZE),
            RuleConfig::new(names::OSC_MIN_SIZE),
        ],
    )
    .with_online_ddl(tool.clone());

    let outcome = pipeline.audit_batch(ALTER).await;

    let report = &outcome.reports[0];
    assert!(!report.requires_online_ddl);
    assert!(tool.calls().is_empty());
    assert_eq!(
        report.results.message(),
        "[notice][osc] pt-online-schema-change D=app,t=orders --alter=\"ADD COLUMN note int\" --print --execute"
    );
}

#[tokio::test]
async fn test_configured_threshold_and_small_tables() {
    let tool = Arc::new(ScriptedTool::new());
    let rules = [RuleConfig::new(names::GHOST_MIN_SIZE).with_param("min_size", 100i64)];

    let mut small = live_pipeline(orders_server(50.0), &rules).with_online_ddl(tool.clone());
    let outcome = small.audit_batch(ALTER).await;
    assert!(!outcome.reports[0].requires_online_ddl);
    assert!(!outcome.reports[0].results.has_result());

    let mut large = live_pipeline(orders_server(150.0), &rules).with_online_ddl(tool.clone());
    let outcome = large.audit_batch(ALTER).await;
    assert!(outcome.reports[0].requires_online_ddl);
    assert_eq!(tool.calls(), vec![ToolCall::new(true)]);
}

#[tokio::test]
async fn test_non_alter_statements_are_ignored() {
    let tool = Arc::new(ScriptedTool::new());
    let mut pipeline = live_pipeline(
        orders_server(4096.0),
        &[RuleConfig::new(names::GHOST_MIN_SIZE)],
    )
    .with_online_ddl(tool.clone());

    let outcome = pipeline
        .audit_batch("CREATE INDEX idx_status ON orders (status)")
        .await;

    assert!(!outcome.reports[0].requires_online_ddl);
    assert!(tool.calls().is_empty());
}
