use pretty_assertions::assert_eq;
use std::sync::Arc;

use sqlvet_parser::{SqlParser, TableName};

use crate::testing::MockExecutor;
use crate::{DefinitionOrigin, SessionContext, SessionError};

const USERS_DDL: &str = "CREATE TABLE `users` (\n  `id` int NOT NULL AUTO_INCREMENT,\n  \
    `email` varchar(255) NOT NULL,\n  PRIMARY KEY (`id`),\n  UNIQUE KEY `uniq_email` (`email`)\n) \
    ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

async fn apply(ctx: &mut SessionContext, sql: &str) {
    for stmt in SqlParser::new().parse(sql).unwrap() {
        ctx.apply_ddl_effect(&stmt).await.unwrap();
    }
}

fn column_names(def: &crate::TableDefinition) -> Vec<String> {
    def.create.columns.iter().map(|c| c.name.clone()).collect()
}

// =============================================================================
// Offline
// =============================================================================

#[tokio::test]
async fn test_offline_create_then_alter_is_visible() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(
        &mut ctx,
        "CREATE TABLE orders (id int NOT NULL, total decimal(10,2), PRIMARY KEY (id));
         ALTER TABLE orders ADD COLUMN note varchar(64), ADD INDEX idx_total (total);",
    )
    .await;

    let def = ctx
        .get_table_definition(&TableName::new("orders"))
        .await
        .unwrap();
    assert_eq!(def.table, TableName::qualified("shop", "orders"));
    assert_eq!(column_names(&def), vec!["id", "total", "note"]);
    assert!(def.create.index("idx_total").is_some());
    assert!(def.create.has_primary_key());
    assert_eq!(def.origin, DefinitionOrigin::Synthesized);
}

#[tokio::test]
async fn test_offline_unknown_table_is_undetermined() {
    let ctx = SessionContext::offline().with_default_schema("shop");
    let err = ctx
        .get_table_definition(&TableName::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SchemaUnknown(_)));
    assert!(err.is_undetermined());

    let ctx = SessionContext::offline();
    let err = ctx
        .get_table_definition(&TableName::new("orders"))
        .await
        .unwrap_err();
    assert!(err.is_undetermined());
}

#[tokio::test]
async fn test_drop_table_is_known_absent() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(&mut ctx, "CREATE TABLE t (id int); DROP TABLE t").await;

    let err = ctx
        .get_table_definition(&TableName::new("t"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!ctx.table_exists(&TableName::new("t")).await.unwrap());
}

#[tokio::test]
async fn test_rename_table_swap() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(
        &mut ctx,
        "CREATE TABLE a (a_col int); CREATE TABLE b (b_col int);
         RENAME TABLE a TO tmp, b TO a, tmp TO b;",
    )
    .await;

    let a = ctx.get_table_definition(&TableName::new("a")).await.unwrap();
    let b = ctx.get_table_definition(&TableName::new("b")).await.unwrap();
    assert_eq!(column_names(&a), vec!["b_col"]);
    assert_eq!(column_names(&b), vec!["a_col"]);
    assert_eq!(a.table, TableName::qualified("shop", "a"));
    assert!(!ctx.table_exists(&TableName::new("tmp")).await.unwrap());
}

#[tokio::test]
async fn test_alter_rename_moves_definition_across_schemas() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(
        &mut ctx,
        "CREATE TABLE t (id int); ALTER TABLE t RENAME TO archive.t_old",
    )
    .await;

    assert!(!ctx.table_exists(&TableName::new("t")).await.unwrap());
    let moved = ctx
        .get_table_definition(&TableName::qualified("archive", "t_old"))
        .await
        .unwrap();
    assert_eq!(moved.create.table, TableName::qualified("archive", "t_old"));
}

#[tokio::test]
async fn test_column_changes_follow_into_indexes() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(
        &mut ctx,
        "CREATE TABLE t (a int, b int, c int, KEY idx_ab (a, b), KEY idx_c (c));
         ALTER TABLE t DROP COLUMN b;
         ALTER TABLE t CHANGE a x bigint;
         ALTER TABLE t DROP COLUMN c;",
    )
    .await;

    let def = ctx.get_table_definition(&TableName::new("t")).await.unwrap();
    assert_eq!(column_names(&def), vec!["x"]);
    let idx = def.create.index("idx_ab").unwrap();
    assert_eq!(idx.columns, vec!["x"]);
    assert!(def.create.index("idx_c").is_none());
}

#[tokio::test]
async fn test_index_rename_and_drop() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(
        &mut ctx,
        "CREATE TABLE t (a int, b int, UNIQUE KEY uk_a (a));
         ALTER TABLE t RENAME INDEX uk_a TO uniq_a;
         CREATE INDEX idx_b ON t (b);
         DROP INDEX idx_b ON t;",
    )
    .await;

    let def = ctx.get_table_definition(&TableName::new("t")).await.unwrap();
    assert!(def.create.index("uk_a").is_none());
    assert!(def.create.index("uniq_a").is_some_and(|i| i.is_unique()));
    assert!(def.create.index("idx_b").is_none());
}

#[tokio::test]
async fn test_create_table_like_and_if_not_exists() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(
        &mut ctx,
        "CREATE TABLE src (id int, name varchar(10));
         CREATE TABLE copy LIKE src;
         CREATE TABLE IF NOT EXISTS copy (other int);",
    )
    .await;

    let copy = ctx.get_table_definition(&TableName::new("copy")).await.unwrap();
    assert_eq!(column_names(&copy), vec!["id", "name"]);
    assert_eq!(copy.create.table, TableName::qualified("shop", "copy"));
}

#[tokio::test]
async fn test_alter_of_unknown_table_is_skipped() {
    let mut ctx = SessionContext::offline().with_default_schema("shop");
    apply(&mut ctx, "ALTER TABLE ghost ADD COLUMN c int").await;
    let err = ctx
        .get_table_definition(&TableName::new("ghost"))
        .await
        .unwrap_err();
    assert!(err.is_undetermined());
}

#[tokio::test]
async fn test_use_and_databases() {
    let mut ctx = SessionContext::offline();
    apply(
        &mut ctx,
        "CREATE DATABASE analytics; USE analytics; CREATE TABLE events (id int);",
    )
    .await;

    assert_eq!(ctx.current_schema(), Some("analytics"));
    assert!(ctx.schema_exists("analytics").await.unwrap());
    assert!(
        ctx.table_exists(&TableName::qualified("analytics", "events"))
            .await
            .unwrap()
    );

    apply(&mut ctx, "DROP DATABASE analytics").await;
    assert_eq!(ctx.current_schema(), None);
    assert!(!ctx.schema_exists("analytics").await.unwrap());
    assert!(
        !ctx.table_exists(&TableName::qualified("analytics", "events"))
            .await
            .unwrap()
    );
    assert!(ctx.schema_exists("other").await.unwrap_err().is_undetermined());
}

#[tokio::test]
async fn test_set_statement_feeds_variable_cache() {
    let mut ctx = SessionContext::offline();
    assert!(matches!(
        ctx.get_system_variable("sql_mode").await,
        Err(SessionError::VariableUnavailable(_))
    ));
    apply(&mut ctx, "SET sql_mode = 'STRICT_ALL_TABLES'").await;
    assert_eq!(
        ctx.get_system_variable("SQL_MODE").await.unwrap(),
        "STRICT_ALL_TABLES"
    );
}

#[tokio::test]
async fn test_offline_defaults_to_case_sensitive() {
    let ctx = SessionContext::offline();
    assert!(ctx.case_sensitive().await);
    let ctx = SessionContext::offline().with_case_sensitivity(false);
    assert!(!ctx.case_sensitive().await);
}

// =============================================================================
// Live
// =============================================================================

fn users_server() -> Arc<MockExecutor> {
    Arc::new(
        MockExecutor::new()
            .with_table("shop", "users", USERS_DDL, 12.5, 1000)
            .with_variable("lower_case_table_names", "1"),
    )
}

#[tokio::test]
async fn test_live_fetch_is_memoized_under_concurrency() {
    let server = users_server();
    let ctx = SessionContext::live(server.clone()).with_default_schema("shop");
    let users = TableName::new("users");

    let (first, second) = tokio::join!(
        ctx.get_table_definition(&users),
        ctx.get_table_definition(&users)
    );
    let first = first.unwrap();
    assert!(Arc::ptr_eq(&first, &second.unwrap()));
    assert_eq!(first.origin, DefinitionOrigin::Live);
    assert_eq!(first.size_mb, 12.5);
    assert_eq!(first.rows, 1000);
    assert!(first.create.index("uniq_email").is_some());

    ctx.get_table_definition(&TableName::new("USERS"))
        .await
        .unwrap();
    assert_eq!(server.count_calls("SHOW CREATE TABLE"), 1);
}

#[tokio::test]
async fn test_live_missing_table_is_cached_as_absent() {
    let server = users_server();
    let ctx = SessionContext::live(server.clone()).with_default_schema("shop");
    let missing = TableName::new("missing");

    assert!(
        ctx.get_table_definition(&missing)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(!ctx.table_exists(&missing).await.unwrap());
    let catalog_queries = server
        .calls()
        .iter()
        .filter(|sql| sql.contains("information_schema.TABLES"))
        .count();
    assert_eq!(catalog_queries, 1);
    assert_eq!(server.count_calls("SHOW CREATE TABLE"), 0);
}

#[tokio::test]
async fn test_live_unparseable_definition() {
    let server = Arc::new(MockExecutor::new().with_table(
        "shop",
        "v",
        "CREATE ALGORITHM=UNDEFINED VIEW `v` AS select 1",
        0.0,
        0,
    ));
    let ctx = SessionContext::live(server).with_default_schema("shop");
    let err = ctx
        .get_table_definition(&TableName::new("v"))
        .await
        .unwrap_err();
    assert!(err.is_show_create_table_unparseable());
}

#[tokio::test]
async fn test_live_ddl_applies_on_top_of_fetched_definition() {
    let server = users_server();
    let mut ctx = SessionContext::live(server.clone()).with_default_schema("shop");
    apply(&mut ctx, "ALTER TABLE users ADD COLUMN nickname varchar(32)").await;

    let def = ctx
        .get_table_definition(&TableName::new("users"))
        .await
        .unwrap();
    assert_eq!(column_names(&def), vec!["id", "email", "nickname"]);
    assert_eq!(def.size_mb, 12.5);
    assert_eq!(server.count_calls("SHOW CREATE TABLE"), 1);
}

#[tokio::test]
async fn test_live_variables_are_read_once() {
    let server = Arc::new(MockExecutor::new().with_variable("max_allowed_packet", "67108864"));
    let ctx = SessionContext::live(server.clone());

    assert_eq!(
        ctx.get_system_variable("max_allowed_packet").await.unwrap(),
        "67108864"
    );
    ctx.get_system_variable("max_allowed_packet").await.unwrap();
    assert_eq!(server.count_calls("SHOW VARIABLES"), 1);

    assert!(matches!(
        ctx.get_system_variable("no_such_variable").await,
        Err(SessionError::VariableUnavailable(_))
    ));
    assert!(ctx.case_sensitive().await);
}

#[tokio::test]
async fn test_cancelled_session_stops_live_queries() {
    let server = users_server();
    let ctx = SessionContext::live(server.clone())
        .with_default_schema("shop")
        .with_case_sensitivity(false);
    ctx.cancel();

    let err = ctx
        .get_table_definition(&TableName::new("users"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let server = users_server();
    let ctx = SessionContext::live(server.clone());
    ctx.close().await.unwrap();
    ctx.close().await.unwrap();

    assert_eq!(server.close_count(), 1);
    assert!(matches!(ctx.executor(), Err(SessionError::Closed)));
}
