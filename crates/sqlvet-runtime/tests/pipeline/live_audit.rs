//! Audit tests against a live (mocked) server.

use super::common::*;
use pretty_assertions::assert_eq;
use sqlvet_core::{RuleConfig, Severity};
use sqlvet_rules::names;
use sqlvet_runtime::{AuditStage, PRE_CHECK};
use sqlvet_session::QueryRow;
use std::sync::Arc;

#[tokio::test]
async fn test_missing_table_fails_pre_check() {
    let mut pipeline = live_pipeline(orders_server(1.0), &[]);

    let outcome = pipeline.audit_batch("SELECT id FROM app.missing").await;

    assert!(outcome.is_complete());
    let findings = outcome.reports[0].findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule, PRE_CHECK);
    assert_eq!(findings[0].message, "table `app.missing` does not exist");
    assert!(pipeline.has_invalid_sql());
}

#[tokio::test]
async fn test_cte_names_are_not_checked_as_tables() {
    let server = orders_server(1.0);
    let mut pipeline = live_pipeline(server.clone(), &[]);

    let outcome = pipeline
        .audit_batch(
            "WITH recent AS (SELECT id FROM orders) SELECT id FROM recent;\n\
             SELECT id FROM (SELECT id FROM orders) AS recent",
        )
        .await;

    assert!(outcome.is_complete());
    assert!(!outcome.reports[0].results.has_result());
    assert!(!outcome.reports[1].results.has_result());
    assert!(!pipeline.has_invalid_sql());
    assert!(server.calls().iter().all(|sql| !sql.contains("recent")));
}

#[tokio::test]
async fn test_created_table_is_visible_to_later_statements() {
    let server = orders_server(1.0);
    let mut pipeline = live_pipeline(server.clone(), &[]);

    let outcome = pipeline
        .audit_batch(
            "CREATE TABLE audit_log (id int PRIMARY KEY, note varchar(32));\n\
             INSERT INTO audit_log (id, note) VALUES (1, 'a');\n\
             ALTER TABLE audit_log ADD COLUMN note int",
        )
        .await;

    assert!(outcome.is_complete());
    assert!(!outcome.reports[0].results.has_result());
    assert!(!outcome.reports[1].results.has_result());
    assert_eq!(
        outcome.reports[2].results.message(),
        "[error]column `note` already exists in table `audit_log`"
    );
    assert_eq!(server.count_calls("SHOW CREATE TABLE"), 0);
}

#[tokio::test]
async fn test_explain_failure_becomes_pre_check_error() {
    let server = Arc::new(orders_executor(1.0).failing_on("EXPLAIN DELETE"));
    let mut pipeline = live_pipeline(server, &[RuleConfig::new(names::EXPLAIN_PRE_CHECK)]);

    let outcome = pipeline
        .audit_batch("DELETE FROM orders WHERE id = 1; SELECT id FROM orders")
        .await;

    assert!(outcome.is_complete());
    let findings = outcome.reports[0].findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].level, Severity::Error);
    assert!(findings[0].message.starts_with("explain failed"));
    assert!(!outcome.reports[1].results.has_result());
}

#[tokio::test]
async fn test_index_advice_and_rollback() {
    let server = Arc::new(orders_executor(1.0).with_result(
        "COUNT(DISTINCT `status`)",
        vec![QueryRow::new(
            vec!["selectivity".to_string()],
            vec![Some("0.0020".to_string())],
        )],
    ));
    let mut pipeline = live_pipeline(server, &[RuleConfig::new(names::OPTIMIZE_INDEX)]);

    let outcome = pipeline
        .audit_batch("ALTER TABLE orders ADD INDEX idx_status (status)")
        .await;

    let report = &outcome.reports[0];
    assert_eq!(
        report.results.message(),
        "[notice]leading column status of index idx_status has selectivity 0.0020, below 0.1"
    );
    assert_eq!(
        report.rollback_sql.as_deref(),
        Some("ALTER TABLE `app`.`orders` DROP INDEX `idx_status`")
    );
}

#[tokio::test]
async fn test_cancellation_stops_the_batch() {
    let server = orders_server(1.0);
    let mut pipeline = live_pipeline(server, &[]);
    pipeline.context().cancel();

    let outcome = pipeline
        .audit_batch("ALTER TABLE orders ADD COLUMN note int")
        .await;

    assert!(outcome.reports.is_empty());
    let error = outcome.aborted.expect("batch should abort");
    assert!(error.is_cancelled());
    assert!(matches!(
        error,
        sqlvet_runtime::AuditError::Statement {
            stage: AuditStage::PreValidate,
            ..
        }
    ));
}

#[tokio::test]
async fn test_estimate_reports_unsupported_statements() {
    let pipeline = live_pipeline(orders_server(1.0), &[]);

    let estimate = pipeline
        .estimate_affected_rows("DROP TABLE orders")
        .await
        .unwrap()
        .expect("live sessions estimate");
    assert_eq!(estimate.rows, 0);
    assert!(estimate.message.is_some());

    let estimate = pipeline
        .estimate_affected_rows("INSERT INTO orders (status) VALUES (1), (2)")
        .await
        .unwrap()
        .expect("live sessions estimate");
    assert_eq!(estimate.rows, 2);
    assert_eq!(estimate.message, None);
}
