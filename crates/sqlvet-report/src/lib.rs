//! # sqlvet-report
//!
//! Persisted audit report log for the sqlvet audit engine.
//!
//! Every audited statement, aborted batch and affected-rows estimate can be
//! recorded as a [`ReportEvent`]:
//!
//! - **File output**: JSON Lines (one JSON object per line)
//! - **Console output**: one JSON object per line on stdout
//!
//! ## Event Types
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `StatementAudited` | A statement went through the audit pipeline |
//! | `BatchAborted` | A batch stopped at a statement that could not be audited |
//! | `RowsEstimated` | An affected-rows estimate was produced |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sqlvet_core::ReportConfig;
//! use sqlvet_report::AuditLogger;
//!
//! # async fn example(outcome: sqlvet_runtime::BatchOutcome) -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(ReportConfig::default())?;
//! logger.log_batch(&outcome).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::ReportError;
pub use event::{ReportEvent, ReportEventBuilder, ReportEventType};
pub use logger::{AuditLogger, ReportFilter};
pub use storage::{ConsoleStorage, DualStorage, FileStorage, NullStorage, ReportStorage};
