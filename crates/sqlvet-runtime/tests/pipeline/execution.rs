//! Execution mediation tests.

use super::common::*;
use pretty_assertions::assert_eq;
use sqlvet_core::RuleConfig;
use sqlvet_rules::names;
use sqlvet_runtime::AuditError;
use std::sync::Arc;

#[tokio::test]
async fn test_large_alter_runs_through_online_ddl_tool() {
    let server = orders_server(2048.0);
    let tool = Arc::new(ScriptedTool::new());
    let pipeline = live_pipeline(server.clone(), &[RuleConfig::new(names::GHOST_MIN_SIZE)])
        .with_online_ddl(tool.clone());

    let outcome = pipeline
        .exec("ALTER TABLE orders ADD COLUMN note int")
        .await
        .unwrap();

    assert!(outcome.is_some());
    assert_eq!(tool.calls(), vec![ToolCall::new(true), ToolCall::new(false)]);
    assert_eq!(server.count_calls("ALTER"), 0);
}

#[tokio::test]
async fn test_failed_dry_run_skips_real_run() {
    let tool = Arc::new(ScriptedTool::failing_dry_run());
    let pipeline = live_pipeline(
        orders_server(2048.0),
        &[RuleConfig::new(names::GHOST_MIN_SIZE)],
    )
    .with_online_ddl(tool.clone());

    let err = pipeline
        .exec("ALTER TABLE orders ADD COLUMN note int")
        .await
        .unwrap_err();

    assert!(matches!(err, AuditError::OnlineDdl(_)));
    assert_eq!(tool.calls(), vec![ToolCall::new(true)]);
}

#[tokio::test]
async fn test_small_statements_run_directly() {
    let server = orders_server(2048.0);
    let pipeline = live_pipeline(server.clone(), &[]);

    pipeline
        .exec("UPDATE orders SET status = 1 WHERE id = 1;")
        .await
        .unwrap();

    assert_eq!(
        server.calls().last().map(String::as_str),
        Some("UPDATE orders SET status = 1 WHERE id = 1")
    );
    assert!(matches!(
        pipeline.exec("SELECT 1; SELECT 2").await,
        Err(AuditError::NotSingleStatement(2))
    ));
}

#[tokio::test]
async fn test_exec_batch_stops_at_first_failure() {
    let server = Arc::new(orders_executor(1.0).failing_on("DELETE"));
    let pipeline = live_pipeline(server.clone(), &[]);
    let statements = vec![
        "UPDATE orders SET status = 1 WHERE id = 1".to_string(),
        "DELETE FROM orders WHERE id = 2".to_string(),
        "UPDATE orders SET status = 2 WHERE id = 3".to_string(),
    ];

    match pipeline.exec_batch(&statements).await {
        Err(AuditError::ExecutionFailed { sql, completed, .. }) => {
            assert_eq!(sql, statements[1]);
            assert_eq!(completed.len(), 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(server.count_calls("UPDATE orders SET status = 2"), 0);
}

#[tokio::test]
async fn test_transaction_kill_and_close() {
    let server = orders_server(1.0);
    let pipeline = live_pipeline(server.clone(), &[]);

    let outcomes = pipeline
        .tx(&["INSERT INTO orders (status) VALUES (1)".to_string(), "DELETE FROM orders WHERE id = 1".to_string()])
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);

    assert_eq!(pipeline.schemas().await.unwrap(), vec!["app".to_string()]);
    pipeline.ping().await.unwrap();

    assert_eq!(pipeline.kill_process().await.unwrap(), Some(42));
    assert!(server.calls().contains(&"KILL 42".to_string()));

    pipeline.close().await.unwrap();
    pipeline.close().await.unwrap();
    assert_eq!(server.close_count(), 1);
}
