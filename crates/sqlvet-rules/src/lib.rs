//! # sqlvet-rules
//!
//! Rule registry, dispatch and built-in rules for the sqlvet audit engine.
//!
//! ## Overview
//!
//! - [`RuleDescriptor`]: a named check with its level, typed parameters,
//!   offline/re-audit flags and an async [`RuleHandler`]
//! - [`RuleRegistry`]: all known rules in registration order, built by the host
//! - [`RuleSet`]: the rules enabled for one run, with configured levels and
//!   parameters validated against each descriptor
//! - [`dispatch`]: runs a rule set against one statement, isolating failures
//!
//! ## Example
//!
//! ```ignore
//! use sqlvet_rules::{DispatchMode, RuleRegistry, RuleSet, dispatch};
//!
//! let registry = RuleRegistry::builtin();
//! let rules = RuleSet::bind(&registry, &config.rules)?;
//! dispatch(&stmt, &ctx, &rules, DispatchMode::for_session(&ctx, false), &mut results).await?;
//! ```

pub mod builtin;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod registry;

pub use builtin::names;
pub use dispatch::{DispatchMode, dispatch};
pub use error::{RuleConfigError, RuleError};
pub use params::{BoundParams, ParamSpec, ParamType, ParamValue};
pub use registry::{BoundRule, RuleDescriptor, RuleHandler, RuleInput, RuleRegistry, RuleSet};
