//! Report logger implementation.
//!
//! Provides the main `AuditLogger` type with helper methods for recording
//! audit verdicts, aborted batches and estimates.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlvet_core::{ReportBackend, ReportConfig, Severity};
use sqlvet_runtime::{AffectedRows, AuditError, BatchOutcome, StatementReport};

use crate::error::ReportError;
use crate::event::{ReportEvent, ReportEventType};
use crate::storage::{ConsoleStorage, DualStorage, FileStorage, NullStorage, ReportStorage};

/// The main report logger.
pub struct AuditLogger {
    config: ReportConfig,
    storage: Arc<dyn ReportStorage>,
}

impl AuditLogger {
    /// Create a new report logger with the given configuration.
    pub fn new(config: ReportConfig) -> Result<Self, ReportError> {
        let storage: Arc<dyn ReportStorage> = if !config.enabled {
            Arc::new(NullStorage::new())
        } else {
            match config.backend {
                ReportBackend::Console => Arc::new(ConsoleStorage::new()),
                ReportBackend::File => {
                    let path = Self::resolve_log_path(&config);
                    if config.stdout {
                        Arc::new(DualStorage::new(&path)?)
                    } else {
                        Arc::new(FileStorage::new(&path)?)
                    }
                }
            }
        };

        Ok(Self { config, storage })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: ReportConfig, storage: Arc<dyn ReportStorage>) -> Self {
        Self { config, storage }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            config: ReportConfig::default(),
            storage: Arc::new(NullStorage::new()),
        }
    }

    fn resolve_log_path(config: &ReportConfig) -> PathBuf {
        let mut path = PathBuf::from(&config.directory);
        path.push(&config.file_name);
        path
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record a report event.
    pub async fn log(&self, event: ReportEvent) -> Result<(), ReportError> {
        if !self.config.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            line = ?event.line,
            level = ?event.level,
            "Report event"
        );

        self.storage.store(event).await
    }

    /// Record the verdict for one statement.
    pub async fn log_statement(&self, report: &StatementReport) -> Result<(), ReportError> {
        self.log(ReportEvent::statement(report)).await
    }

    /// Record a batch that stopped early.
    pub async fn log_aborted(&self, error: &AuditError) -> Result<(), ReportError> {
        self.log(ReportEvent::aborted(error)).await
    }

    /// Record every statement of a batch, then the abort if there was one.
    pub async fn log_batch(&self, outcome: &BatchOutcome) -> Result<(), ReportError> {
        for report in &outcome.reports {
            self.log_statement(report).await?;
        }
        if let Some(error) = &outcome.aborted {
            self.log_aborted(error).await?;
        }
        Ok(())
    }

    /// Record an affected-rows estimate.
    pub async fn log_estimate(&self, sql: &str, estimate: &AffectedRows) -> Result<(), ReportError> {
        self.log(ReportEvent::estimate(sql, estimate)).await
    }

    /// Query report events with filters.
    pub async fn query(&self, filter: ReportFilter) -> Result<Vec<ReportEvent>, ReportError> {
        self.storage.query(filter).await
    }

    /// Count report events matching a filter (ignores limit/offset).
    pub async fn count(&self, filter: ReportFilter) -> Result<usize, ReportError> {
        self.storage.count(filter).await
    }

    /// Get a report event by ID.
    pub async fn get(&self, event_id: uuid::Uuid) -> Result<Option<ReportEvent>, ReportError> {
        self.storage.get(event_id).await
    }

    /// Most recent events for a statement fingerprint, newest first.
    pub async fn history(
        &self,
        fingerprint: &str,
        limit: usize,
    ) -> Result<Vec<ReportEvent>, ReportError> {
        self.query(ReportFilter {
            fingerprint: Some(fingerprint.to_string()),
            newest_first: true,
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }
}

/// Filter for querying report events.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    /// Filter by event type.
    pub event_type: Option<ReportEventType>,
    /// Keep events whose level is at least this one.
    pub min_level: Option<Severity>,
    /// Filter by statement fingerprint.
    pub fingerprint: Option<String>,
    /// Filter by start time.
    pub start_time: Option<DateTime<Utc>>,
    /// Filter by end time.
    pub end_time: Option<DateTime<Utc>>,
    /// Return newest events first (default: storage order).
    pub newest_first: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl ReportFilter {
    pub fn matches(&self, event: &ReportEvent) -> bool {
        if let Some(event_type) = self.event_type
            && event.event_type != event_type
        {
            return false;
        }
        if let Some(min) = self.min_level
            && event.level.is_none_or(|level| level < min)
        {
            return false;
        }
        if let Some(fingerprint) = &self.fingerprint
            && event.fingerprint.as_ref() != Some(fingerprint)
        {
            return false;
        }
        if let Some(start) = self.start_time
            && event.occurred_at < start
        {
            return false;
        }
        if let Some(end) = self.end_time
            && event.occurred_at > end
        {
            return false;
        }
        true
    }

    /// Filter, order and page `events`.
    pub fn apply(&self, events: Vec<ReportEvent>) -> Vec<ReportEvent> {
        let mut results: Vec<_> = events.into_iter().filter(|e| self.matches(e)).collect();
        if self.newest_first {
            results.reverse();
        }

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        results.into_iter().skip(offset).take(limit).collect()
    }
}
