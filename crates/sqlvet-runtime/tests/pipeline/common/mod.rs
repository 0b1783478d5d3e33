//! Shared fixtures for pipeline tests.
//!
//! This module provides:
//! - A mock server holding one `app.orders` table of a chosen size
//! - A scripted online-DDL tool that records its invocations
//! - A helper building a live pipeline from rule configurations

#![allow(dead_code)]

use async_trait::async_trait;
use sqlvet_core::RuleConfig;
use sqlvet_rules::{RuleRegistry, RuleSet};
use sqlvet_runtime::{AuditPipeline, OnlineDdlError, OnlineDdlTool};
use sqlvet_session::SessionContext;
use sqlvet_session::testing::MockExecutor;
use std::sync::{Arc, Mutex};

// =============================================================================
// MOCK SERVER
// =============================================================================

pub const ORDERS: &str = "CREATE TABLE `orders` (\n  \
    `id` int NOT NULL AUTO_INCREMENT,\n  \
    `status` int NOT NULL,\n  \
    PRIMARY KEY (`id`)\n\
    ) ENGINE=InnoDB";

pub fn orders_executor(size_mb: f64) -> MockExecutor {
    MockExecutor::new().with_table("app", "orders", ORDERS, size_mb, 500_000)
}

pub fn orders_server(size_mb: f64) -> Arc<MockExecutor> {
    Arc::new(orders_executor(size_mb))
}

pub fn live_pipeline(server: Arc<MockExecutor>, rules: &[RuleConfig]) -> AuditPipeline {
    let rules = RuleSet::bind(&RuleRegistry::builtin(), rules).expect("rules should bind");
    AuditPipeline::new(SessionContext::live(server).with_default_schema("app"), rules)
}

// =============================================================================
// SCRIPTED ONLINE-DDL TOOL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub schema: String,
    pub table: String,
    pub dry_run: bool,
}

impl ToolCall {
    pub fn new(dry_run: bool) -> Self {
        Self {
            schema: "app".to_string(),
            table: "orders".to_string(),
            dry_run,
        }
    }
}

#[derive(Default)]
pub struct ScriptedTool {
    fail_dry_run: bool,
    calls: Mutex<Vec<ToolCall>>,
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_dry_run() -> Self {
        Self {
            fail_dry_run: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OnlineDdlTool for ScriptedTool {
    async fn run(
        &self,
        schema: &str,
        table: &str,
        _statement: &str,
        dry_run: bool,
    ) -> Result<(), OnlineDdlError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ToolCall {
                schema: schema.to_string(),
                table: table.to_string(),
                dry_run,
            });
        }
        if dry_run && self.fail_dry_run {
            return Err(OnlineDdlError::Failed {
                action: "gh-ost dry run",
                status: "exit status: 1".to_string(),
                stderr: "cannot acquire metadata lock".to_string(),
            });
        }
        Ok(())
    }
}
