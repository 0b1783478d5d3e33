//! Audit pipeline.
//!
//! Every statement moves through the same stages:
//!
//! ```text
//! Parse -> PreValidate -> RuleDispatch -> IndexOptimization
//!       -> OnlineDdlDecision -> RollbackAnnotation -> ContextUpdate -> Done
//! ```
//!
//! Statements of a batch are audited one after another on the same session,
//! so each statement sees the schema as left by the ones before it. The first
//! statement that fails with a non-recoverable error stops the batch; reports
//! for the statements already audited are kept.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use sqlvet_core::{AuditResults, Finding, Severity};
use sqlvet_estimator::{AffectedRowsEstimator, EstimateError, EstimateSource};
use sqlvet_parser::{SqlParser, StatementCategory, StatementEnvelope, StatementKind, TableName};
use sqlvet_rules::{BoundRule, DispatchMode, RuleSet, dispatch, names};
use sqlvet_session::{ExecOutcome, SessionContext, SessionError};

use crate::advisor::{AdvisorSettings, advise};
use crate::error::AuditError;
use crate::online_ddl::{OnlineDdlTool, osc_command};
use crate::prevalidate::{PRE_CHECK, prevalidate};
use crate::rollback::rollback_sql;

const DEFAULT_OSC_BINARY: &str = "pt-online-schema-change";

/// Stage a statement is in when its audit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Parse,
    PreValidate,
    RuleDispatch,
    IndexOptimization,
    OnlineDdlDecision,
    RollbackAnnotation,
    ContextUpdate,
    Done,
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::PreValidate => "pre-validation",
            Self::RuleDispatch => "rule dispatch",
            Self::IndexOptimization => "index optimization",
            Self::OnlineDdlDecision => "online DDL decision",
            Self::RollbackAnnotation => "rollback annotation",
            Self::ContextUpdate => "context update",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Audit verdict for one statement.
#[derive(Debug, Clone, Serialize)]
pub struct StatementReport {
    pub text: String,
    pub fingerprint: String,
    pub start_line: usize,
    pub batch_index: usize,
    pub category: StatementCategory,
    pub kind: &'static str,
    pub results: AuditResults,
    /// Statement(s) undoing this one, when they can be derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_sql: Option<String>,
    /// The table is large enough that the change should go through gh-ost.
    pub requires_online_ddl: bool,
}

impl StatementReport {
    pub fn level(&self) -> Option<Severity> {
        self.results.level()
    }

    pub fn findings(&self) -> &[Finding] {
        self.results.findings()
    }
}

/// Reports for a batch, plus the error that stopped it early, if any.
#[derive(Debug)]
pub struct BatchOutcome {
    pub reports: Vec<StatementReport>,
    pub aborted: Option<AuditError>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    /// Whether every statement was audited and stays below `threshold`.
    pub fn passes(&self, threshold: Severity) -> bool {
        self.is_complete() && self.reports.iter().all(|r| r.results.passes(threshold))
    }
}

/// Affected-rows estimate as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedRows {
    pub rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<EstimateSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_sql: Option<String>,
    /// Why no estimate could be made, for statements without a count form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Audits statements against one session and mediates their execution.
pub struct AuditPipeline {
    ctx: SessionContext,
    rules: RuleSet,
    online_ddl: Option<Arc<dyn OnlineDdlTool>>,
    osc_binary: String,
    estimator: AffectedRowsEstimator,
    executed_sql: bool,
    has_invalid_sql: bool,
}

impl AuditPipeline {
    pub fn new(ctx: SessionContext, rules: RuleSet) -> Self {
        Self {
            ctx,
            rules,
            online_ddl: None,
            osc_binary: DEFAULT_OSC_BINARY.to_string(),
            estimator: AffectedRowsEstimator::new(),
            executed_sql: false,
            has_invalid_sql: false,
        }
    }

    pub fn with_online_ddl(mut self, tool: Arc<dyn OnlineDdlTool>) -> Self {
        self.online_ddl = Some(tool);
        self
    }

    pub fn with_osc_binary(mut self, binary: impl Into<String>) -> Self {
        self.osc_binary = binary.into();
        self
    }

    pub fn with_estimator(mut self, estimator: AffectedRowsEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Re-audit SQL that has already run: schema checks, rules marked as not
    /// applicable and context updates are skipped.
    pub fn with_executed_sql(mut self, executed: bool) -> Self {
        self.executed_sql = executed;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Whether any audited statement failed pre-validation.
    pub fn has_invalid_sql(&self) -> bool {
        self.has_invalid_sql
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Audit a batch statement by statement.
    pub async fn audit_batch(&mut self, sql: &str) -> BatchOutcome {
        let parser = SqlParser::new().with_case_sensitivity(self.ctx.case_sensitive().await);
        let mut reports = Vec::new();

        let raw_statements = match parser.split(sql) {
            Ok(raw) => raw,
            Err(e) => {
                return BatchOutcome {
                    reports,
                    aborted: Some(e.into()),
                };
            }
        };

        for raw in raw_statements {
            let (line, batch_index, text) = (raw.start_line, raw.batch_index, raw.text.clone());
            let outcome = match parser.parse_statement(raw) {
                Ok(stmt) => self.audit_statement(&stmt).await,
                Err(e) => Err(AuditError::Statement {
                    stage: AuditStage::Parse,
                    line,
                    batch_index,
                    text,
                    source: Box::new(e.into()),
                }),
            };
            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(line, batch_index, error = %e, "Aborting batch");
                    return BatchOutcome {
                        reports,
                        aborted: Some(e),
                    };
                }
            }
        }

        BatchOutcome {
            reports,
            aborted: None,
        }
    }

    /// Run one parsed statement through every stage after parsing.
    pub async fn audit_statement(
        &mut self,
        stmt: &StatementEnvelope,
    ) -> Result<StatementReport, AuditError> {
        let fail = |stage: AuditStage| {
            move |e: AuditError| AuditError::Statement {
                stage,
                line: stmt.start_line,
                batch_index: stmt.batch_index,
                text: stmt.text.clone(),
                source: Box::new(e),
            }
        };
        let mut results = AuditResults::new();

        self.pre_validate(stmt, &mut results)
            .await
            .map_err(fail(AuditStage::PreValidate))?;

        dispatch(
            stmt,
            &self.ctx,
            &self.rules,
            DispatchMode::for_session(&self.ctx, self.executed_sql),
            &mut results,
        )
        .await
        .map_err(|e| fail(AuditStage::RuleDispatch)(e.into()))?;

        self.optimize_indexes(stmt, &mut results)
            .await
            .map_err(fail(AuditStage::IndexOptimization))?;

        let requires_online_ddl = self
            .decide_online_ddl(stmt, &mut results)
            .await
            .map_err(fail(AuditStage::OnlineDdlDecision))?;

        let rollback = self
            .annotate_rollback(stmt)
            .await
            .map_err(fail(AuditStage::RollbackAnnotation))?;

        if !self.executed_sql {
            self.ctx
                .apply_ddl_effect(stmt)
                .await
                .map_err(|e| fail(AuditStage::ContextUpdate)(e.into()))?;
        }

        tracing::debug!(
            line = stmt.start_line,
            kind = stmt.kind.name(),
            findings = results.findings().len(),
            "Statement audited"
        );
        Ok(StatementReport {
            text: stmt.text.clone(),
            fingerprint: stmt.fingerprint.clone(),
            start_line: stmt.start_line,
            batch_index: stmt.batch_index,
            category: stmt.category,
            kind: stmt.kind.name(),
            results,
            rollback_sql: rollback,
            requires_online_ddl,
        })
    }

    async fn pre_validate(
        &mut self,
        stmt: &StatementEnvelope,
        results: &mut AuditResults,
    ) -> Result<(), AuditError> {
        let against_schema = !self.ctx.is_offline() && !self.executed_sql;
        match prevalidate(&self.ctx, stmt, against_schema).await {
            Ok(violations) => {
                if !violations.is_empty() {
                    self.has_invalid_sql = true;
                }
                for message in violations {
                    results.add(Severity::Error, PRE_CHECK, message);
                }
            }
            Err(e) if e.is_show_create_table_unparseable() => {
                tracing::error!(line = stmt.start_line, error = %e, "Pre-check downgraded to warning");
                results.add(Severity::Warning, PRE_CHECK, e.to_string());
            }
            Err(e) => return Err(e.into()),
        }

        if self.rules.is_enabled(names::EXPLAIN_PRE_CHECK)
            && !self.ctx.is_offline()
            && !results.has_result()
            && stmt.kind.is_dml()
        {
            match self.ctx.explain(&stmt.text).await {
                Ok(_) => {}
                Err(SessionError::Cancelled) => return Err(SessionError::Cancelled.into()),
                Err(e) => {
                    self.has_invalid_sql = true;
                    results.add(Severity::Error, PRE_CHECK, format!("explain failed: {e}"));
                }
            }
        }
        Ok(())
    }

    async fn optimize_indexes(
        &self,
        stmt: &StatementEnvelope,
        results: &mut AuditResults,
    ) -> Result<(), AuditError> {
        let Some(rule) = self.rules.get(names::OPTIMIZE_INDEX) else {
            return Ok(());
        };
        let settings = AdvisorSettings {
            max_columns: rule.params.get_int("max_columns")?,
            min_selectivity: rule.params.get_float("min_selectivity")?,
        };
        for advice in advise(&self.ctx, &stmt.kind, settings).await? {
            results.add(rule.level, rule.name(), advice);
        }
        Ok(())
    }

    /// Decide whether an `ALTER TABLE` needs gh-ost and suggest a
    /// pt-online-schema-change command line for large tables.
    async fn decide_online_ddl(
        &self,
        stmt: &StatementEnvelope,
        results: &mut AuditResults,
    ) -> Result<bool, AuditError> {
        let StatementKind::AlterTable(alter) = &stmt.kind else {
            return Ok(false);
        };
        if self.ctx.is_offline() || self.executed_sql {
            return Ok(false);
        }
        let ghost = self.rules.get(names::GHOST_MIN_SIZE);
        let osc = self.rules.get(names::OSC_MIN_SIZE);
        if ghost.is_none() && osc.is_none() {
            return Ok(false);
        }
        let Some(size) = self.table_size(&alter.table).await? else {
            return Ok(false);
        };
        let schema = self.ctx.resolve_schema_name(&alter.table);

        let mut requires_online_ddl = false;
        if let Some(rule) = ghost {
            let min = min_size(rule)?;
            if size > min {
                requires_online_ddl = true;
                if let Some(tool) = &self.online_ddl {
                    tracing::info!(table = %alter.table, size, min, "Running gh-ost dry run");
                    match tool.run(&schema, &alter.table.name, &stmt.text, true).await {
                        Ok(()) => results.add(
                            rule.level,
                            rule.name(),
                            format!(
                                "table size {size:.2}MB exceeds {min}MB, the change will be applied with gh-ost"
                            ),
                        ),
                        Err(e) => {
                            tracing::error!(table = %alter.table, error = %e, "gh-ost dry run failed");
                            results.add(
                                Severity::Error,
                                rule.name(),
                                format!(
                                    "table size {size:.2}MB exceeds {min}MB, but the gh-ost dry run failed: {e}"
                                ),
                            );
                        }
                    }
                }
            }
        }

        if let Some(rule) = osc {
            let min = min_size(rule)?;
            if size >= min {
                match osc_command(&self.osc_binary, &schema, &alter.table.name, &stmt.text) {
                    Ok(command) => results.add(
                        rule.level,
                        rule.name(),
                        format!("[osc] {command}"),
                    ),
                    Err(e) => {
                        tracing::warn!(table = %alter.table, error = %e, "Cannot build OSC command");
                    }
                }
            }
        }
        Ok(requires_online_ddl)
    }

    /// Size of `table` in MB; `None` when the session cannot tell.
    async fn table_size(&self, table: &TableName) -> Result<Option<f64>, AuditError> {
        match self.ctx.table_size_mb(table).await {
            Ok(size) => Ok(Some(size)),
            Err(SessionError::Cancelled) => Err(SessionError::Cancelled.into()),
            Err(e) => {
                tracing::debug!(table = %table, error = %e, "Table size unknown");
                Ok(None)
            }
        }
    }

    async fn annotate_rollback(&self, stmt: &StatementEnvelope) -> Result<Option<String>, AuditError> {
        if self.executed_sql || !stmt.kind.is_ddl() {
            return Ok(None);
        }
        match rollback_sql(&self.ctx, &stmt.kind).await {
            Ok(sql) => Ok(sql),
            Err(e) if e.is_show_create_table_unparseable() => {
                tracing::error!(line = stmt.start_line, error = %e, "Skipping rollback annotation");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Estimation
    // =========================================================================

    /// Estimate the rows `sql` touches. `None` offline.
    pub async fn estimate_affected_rows(&self, sql: &str) -> Result<Option<AffectedRows>, AuditError> {
        if self.ctx.is_offline() {
            return Ok(None);
        }
        match self.estimator.estimate_sql(&self.ctx, sql).await {
            Ok(estimate) => Ok(Some(AffectedRows {
                rows: estimate.rows,
                source: Some(estimate.source),
                rewritten_sql: estimate.rewritten_sql,
                message: None,
            })),
            Err(e @ EstimateError::UnsupportedStatementType(_)) => Ok(Some(AffectedRows {
                rows: 0,
                source: None,
                rewritten_sql: None,
                message: Some(e.to_string()),
            })),
            Err(EstimateError::Offline) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute one statement. Large `ALTER TABLE`s go through gh-ost, first
    /// as a dry run. `None` offline.
    pub async fn exec(&self, sql: &str) -> Result<Option<ExecOutcome>, AuditError> {
        if self.ctx.is_offline() {
            return Ok(None);
        }
        let parser = SqlParser::new();
        let mut statements = parser.parse(sql)?;
        if statements.len() != 1 {
            return Err(AuditError::NotSingleStatement(statements.len()));
        }
        let Some(stmt) = statements.pop() else {
            return Err(AuditError::NotSingleStatement(0));
        };

        if let StatementKind::AlterTable(alter) = &stmt.kind
            && let Some(tool) = &self.online_ddl
            && let Some(rule) = self.rules.get(names::GHOST_MIN_SIZE)
            && let Some(size) = self.table_size(&alter.table).await?
            && size > min_size(rule)?
        {
            let schema = self.ctx.resolve_schema_name(&alter.table);
            tool.run(&schema, &alter.table.name, &stmt.text, true).await?;
            tracing::info!(table = %alter.table, "gh-ost dry run passed, applying change");
            tool.run(&schema, &alter.table.name, &stmt.text, false).await?;
            return Ok(Some(ExecOutcome::default()));
        }

        let executor = self.ctx.executor()?;
        let outcome = executor.exec(&stmt.text).await.map_err(SessionError::from)?;
        Ok(Some(outcome))
    }

    /// Execute statements in order, stopping at the first failure.
    pub async fn exec_batch(&self, statements: &[String]) -> Result<Vec<ExecOutcome>, AuditError> {
        let mut completed = Vec::new();
        for sql in statements {
            match self.exec(sql).await {
                Ok(Some(outcome)) => completed.push(outcome),
                Ok(None) => {}
                Err(e) => {
                    return Err(AuditError::ExecutionFailed {
                        sql: sql.clone(),
                        completed,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(completed)
    }

    /// Execute statements in one transaction.
    pub async fn tx(&self, statements: &[String]) -> Result<Vec<ExecOutcome>, AuditError> {
        if self.ctx.is_offline() {
            return Ok(Vec::new());
        }
        let outcomes = self
            .ctx
            .executor()?
            .transact(statements)
            .await
            .map_err(SessionError::from)?;
        Ok(outcomes)
    }

    pub async fn ping(&self) -> Result<(), AuditError> {
        if self.ctx.is_offline() {
            return Ok(());
        }
        self.ctx
            .executor()?
            .ping()
            .await
            .map_err(SessionError::from)?;
        Ok(())
    }

    /// Schemas visible to the connection.
    pub async fn schemas(&self) -> Result<Vec<String>, AuditError> {
        if self.ctx.is_offline() {
            return Ok(Vec::new());
        }
        let schemas = self
            .ctx
            .executor()?
            .list_schemas()
            .await
            .map_err(SessionError::from)?;
        Ok(schemas)
    }

    /// Kill the session's server connection; returns the killed id.
    pub async fn kill_process(&self) -> Result<Option<u64>, AuditError> {
        if self.ctx.is_offline() {
            return Ok(None);
        }
        let executor = self.ctx.executor()?;
        let id = executor.connection_id().await.map_err(SessionError::from)?;
        tracing::info!(connection_id = id, "Killing session connection");
        executor.kill(id).await.map_err(SessionError::from)?;
        Ok(Some(id))
    }

    /// Release the session's live connection.
    pub async fn close(&self) -> Result<(), AuditError> {
        self.ctx.close().await?;
        Ok(())
    }
}

fn min_size(rule: &BoundRule) -> Result<f64, AuditError> {
    Ok(rule.params.get_int("min_size")? as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlvet_core::RuleConfig;
    use sqlvet_rules::RuleRegistry;

    fn pipeline(rules: &[RuleConfig]) -> AuditPipeline {
        let registry = RuleRegistry::builtin();
        let rules = RuleSet::bind(&registry, rules).unwrap();
        AuditPipeline::new(SessionContext::offline().with_default_schema("app"), rules)
    }

    #[tokio::test]
    async fn test_later_statements_see_earlier_ddl() {
        let mut pipeline = pipeline(&[RuleConfig::new(names::ALTER_COLUMN_EXISTS)]);
        let outcome = pipeline
            .audit_batch(
                "CREATE TABLE t (id int PRIMARY KEY);\n\
                 ALTER TABLE t ADD COLUMN age int;\n\
                 ALTER TABLE t MODIFY COLUMN age bigint, DROP COLUMN missing",
            )
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.reports.len(), 3);
        assert!(!outcome.reports[1].results.has_result());
        assert_eq!(
            outcome.reports[2].results.message(),
            "[error]column(s) missing do not exist in table t"
        );
        assert_eq!(
            outcome.reports[1].rollback_sql.as_deref(),
            Some("ALTER TABLE `app`.`t` DROP COLUMN `age`")
        );
    }

    #[tokio::test]
    async fn test_syntax_error_aborts_with_partial_results() {
        let mut pipeline = pipeline(&[]);
        let outcome = pipeline
            .audit_batch("SELECT 1;\nSELEC * FROM t;\nSELECT 2")
            .await;

        assert_eq!(outcome.reports.len(), 1);
        match outcome.aborted {
            Some(AuditError::Statement {
                stage: AuditStage::Parse,
                line: 2,
                batch_index: 1,
                ..
            }) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_pre_check_marks_invalid_sql() {
        let mut pipeline = pipeline(&[]);
        let outcome = pipeline
            .audit_batch("CREATE TABLE t (id int, id int, PRIMARY KEY (id))")
            .await;

        let findings = outcome.reports[0].findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, PRE_CHECK);
        assert_eq!(findings[0].level, Severity::Error);
        assert!(pipeline.has_invalid_sql());
    }

    #[tokio::test]
    async fn test_executed_mode_leaves_context_alone() {
        let mut pipeline = pipeline(&[RuleConfig::new(names::WHERE_EXISTS)])
            .with_executed_sql(true);
        let outcome = pipeline
            .audit_batch("CREATE TABLE t (id int PRIMARY KEY); DELETE FROM t")
            .await;

        assert!(outcome.is_complete());
        assert!(!outcome.reports[1].results.has_result());
        assert_eq!(outcome.reports[0].rollback_sql, None);
        assert!(
            pipeline
                .context()
                .get_table_definition(&TableName::new("t"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_offline_helpers_are_noops() {
        let pipeline = pipeline(&[]);
        assert_eq!(pipeline.estimate_affected_rows("DELETE FROM t").await.unwrap(), None);
        assert_eq!(pipeline.exec("DELETE FROM t").await.unwrap(), None);
        assert!(pipeline.exec_batch(&["SELECT 1".to_string()]).await.unwrap().is_empty());
        assert!(pipeline.schemas().await.unwrap().is_empty());
        assert_eq!(pipeline.kill_process().await.unwrap(), None);
        pipeline.ping().await.unwrap();
        pipeline.close().await.unwrap();
        pipeline.close().await.unwrap();
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(AuditStage::OnlineDdlDecision.to_string(), "online DDL decision");
        assert_eq!(AuditStage::PreValidate.to_string(), "pre-validation");
    }
}
