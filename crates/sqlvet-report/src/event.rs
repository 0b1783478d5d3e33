//! Report event types.
//!
//! One event per audited statement, aborted batch or estimate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sqlvet_core::{Finding, Severity};
use sqlvet_runtime::{AffectedRows, AuditError, StatementReport};

/// Type of report event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportEventType {
    /// A statement was audited.
    StatementAudited,
    /// A batch stopped before its last statement.
    BatchAborted,
    /// Affected rows were estimated for a statement.
    RowsEstimated,
}

impl std::fmt::Display for ReportEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatementAudited => write!(f, "STATEMENT_AUDITED"),
            Self::BatchAborted => write!(f, "BATCH_ABORTED"),
            Self::RowsEstimated => write!(f, "ROWS_ESTIMATED"),
        }
    }
}

/// A report event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: ReportEventType,

    /// Statement text.
    pub sql: String,

    // ===== Statement position =====
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// 1-based line the statement starts on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,

    /// Statement kind (`CREATE TABLE`, `UPDATE`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    // ===== Verdict =====
    /// Highest finding level; absent when the statement is clean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Severity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_sql: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_online_ddl: Option<bool>,

    // ===== Estimates =====
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Where the row count came from (`literal`, `plan`, `live`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate_source: Option<String>,

    // ===== Failures =====
    /// Pipeline stage a batch stopped in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportEvent {
    /// Create a new event with the given type and statement text.
    pub fn new(event_type: ReportEventType, sql: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            sql: sql.into(),
            fingerprint: None,
            line: None,
            batch_index: None,
            kind: None,
            level: None,
            findings: Vec::new(),
            rollback_sql: None,
            requires_online_ddl: None,
            row_count: None,
            estimate_source: None,
            stage: None,
            error: None,
        }
    }

    /// Create a builder for a report event.
    pub fn builder(event_type: ReportEventType, sql: impl Into<String>) -> ReportEventBuilder {
        ReportEventBuilder::new(event_type, sql)
    }

    /// Event for one audited statement.
    pub fn statement(report: &StatementReport) -> Self {
        let mut builder = Self::builder(ReportEventType::StatementAudited, &report.text)
            .fingerprint(&report.fingerprint)
            .position(report.start_line, report.batch_index)
            .kind(report.kind)
            .findings(report.findings().to_vec())
            .requires_online_ddl(report.requires_online_ddl);
        if let Some(rollback) = &report.rollback_sql {
            builder = builder.rollback_sql(rollback);
        }
        builder.build()
    }

    /// Event for a batch stopped by `error`.
    pub fn aborted(error: &AuditError) -> Self {
        let mut event = Self::new(ReportEventType::BatchAborted, "");
        if let AuditError::Statement {
            stage,
            line,
            batch_index,
            text,
            source,
        } = error
        {
            event.sql = text.clone();
            event.line = Some(*line);
            event.batch_index = Some(*batch_index);
            event.stage = Some(stage.to_string());
            event.error = Some(source.to_string());
        } else {
            event.error = Some(error.to_string());
        }
        event.level = Some(Severity::Error);
        event
    }

    /// Event for an affected-rows estimate of `sql`.
    pub fn estimate(sql: &str, estimate: &AffectedRows) -> Self {
        let mut builder = Self::builder(ReportEventType::RowsEstimated, sql).row_count(estimate.rows);
        if let Some(source) = estimate
            .source
            .and_then(|s| serde_json::to_value(s).ok())
            .and_then(|v| v.as_str().map(str::to_string))
        {
            builder = builder.estimate_source(source);
        }
        if let Some(message) = &estimate.message {
            builder = builder.error(message);
        }
        builder.build()
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE line=... level=... sql=... [findings=...]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
        );

        if let Some(n) = self.line {
            line.push_str(&format!(" line={n}"));
        }
        if let Some(level) = self.level {
            line.push_str(&format!(" level={level}"));
        }
        if let Some(stage) = &self.stage {
            line.push_str(&format!(" stage=\"{stage}\""));
        }

        // Long statements are cut for console output
        let preview: String = if self.sql.chars().count() > 100 {
            format!("{}...", self.sql.chars().take(100).collect::<String>())
        } else {
            self.sql.clone()
        };
        line.push_str(&format!(" sql=\"{}\"", preview.replace('\n', " ")));

        if let Some(rows) = self.row_count {
            line.push_str(&format!(" rows={rows}"));
        }
        if !self.findings.is_empty() {
            let rendered: Vec<String> = self.findings.iter().map(ToString::to_string).collect();
            line.push_str(&format!(" findings=\"{}\"", rendered.join(" ")));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }
        line
    }
}

/// Builder for creating report events.
#[derive(Debug)]
pub struct ReportEventBuilder {
    event: ReportEvent,
}

impl ReportEventBuilder {
    pub fn new(event_type: ReportEventType, sql: impl Into<String>) -> Self {
        Self {
            event: ReportEvent::new(event_type, sql),
        }
    }

    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.event.fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the start line and batch index.
    pub fn position(mut self, line: usize, batch_index: usize) -> Self {
        self.event.line = Some(line);
        self.event.batch_index = Some(batch_index);
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.event.kind = Some(kind.into());
        self
    }

    /// Set the findings; the event level follows the highest one.
    pub fn findings(mut self, findings: Vec<Finding>) -> Self {
        self.event.level = findings.iter().map(|f| f.level).max();
        self.event.findings = findings;
        self
    }

    pub fn rollback_sql(mut self, sql: impl Into<String>) -> Self {
        self.event.rollback_sql = Some(sql.into());
        self
    }

    pub fn requires_online_ddl(mut self, required: bool) -> Self {
        self.event.requires_online_ddl = Some(required);
        self
    }

    pub fn row_count(mut self, rows: u64) -> Self {
        self.event.row_count = Some(rows);
        self
    }

    pub fn estimate_source(mut self, source: impl Into<String>) -> Self {
        self.event.estimate_source = Some(source.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    /// Build the report event.
    pub fn build(self) -> ReportEvent {
        self.event
    }
}
