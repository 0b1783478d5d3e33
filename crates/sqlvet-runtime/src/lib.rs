//! # sqlvet-runtime
//!
//! Audit pipeline and execution mediation for the sqlvet audit engine.
//!
//! [`AuditPipeline`] owns a session and the enabled rule set. It audits SQL
//! batches statement by statement (pre-checks, rule dispatch, index advice,
//! online-DDL decision, rollback annotation, context update) and executes
//! statements on the live connection, routing large `ALTER TABLE`s through
//! an [`OnlineDdlTool`].
//!
//! ## Example
//!
//! ```ignore
//! let rules = RuleSet::bind(&RuleRegistry::builtin(), &config.rules)?;
//! let mut pipeline = AuditPipeline::new(SessionContext::offline(), rules);
//! let outcome = pipeline.audit_batch(&sql).await;
//! for report in &outcome.reports {
//!     println!("{}: {}", report.start_line, report.results.message());
//! }
//! ```

pub mod advisor;
pub mod error;
pub mod online_ddl;
pub mod pipeline;
pub mod prevalidate;
pub mod rollback;

pub use advisor::{AdvisorSettings, advise};
pub use error::{AuditError, OnlineDdlError};
pub use online_ddl::{OnlineDdlTool, osc_command};
pub use pipeline::{AffectedRows, AuditPipeline, AuditStage, BatchOutcome, StatementReport};
pub use prevalidate::{PRE_CHECK, prevalidate};
pub use rollback::rollback_sql;
