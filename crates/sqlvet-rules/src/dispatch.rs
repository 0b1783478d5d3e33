//! Rule dispatch.
//!
//! Rules run one after another in rule-set order against a shared result set.
//! A failing handler is reported as an error finding under its own name and
//! does not stop the remaining rules.

use sqlvet_core::{AuditResults, Severity};
use sqlvet_parser::StatementEnvelope;
use sqlvet_session::{SessionContext, SessionError};

use crate::error::RuleError;
use crate::registry::{BoundRule, RuleInput, RuleSet};

/// How the statement is being audited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchMode {
    /// No live connection is available.
    pub offline: bool,
    /// The SQL already ran; this is a re-audit.
    pub already_executed: bool,
}

impl DispatchMode {
    pub fn for_session(ctx: &SessionContext, already_executed: bool) -> Self {
        Self {
            offline: ctx.is_offline(),
            already_executed,
        }
    }

    /// Whether `rule` is skipped in this mode.
    pub fn skips(&self, rule: &BoundRule) -> bool {
        let descriptor = &rule.descriptor;
        descriptor.is_config_only()
            || (self.offline && !descriptor.allow_offline)
            || (self.already_executed && descriptor.disabled_for_executed)
    }
}

/// Run every applicable rule in `rules` against `stmt`.
///
/// Returns an error only when the session was cancelled; findings gathered
/// before that point stay in `results`.
pub async fn dispatch(
    stmt: &StatementEnvelope,
    ctx: &SessionContext,
    rules: &RuleSet,
    mode: DispatchMode,
    results: &mut AuditResults,
) -> Result<(), RuleError> {
    for rule in rules.iter() {
        if mode.skips(rule) {
            continue;
        }
        let Some(handler) = rule.descriptor.handler.as_ref() else {
            continue;
        };

        let outcome = {
            let mut input = RuleInput {
                ctx,
                stmt,
                rule,
                results: &mut *results,
            };
            handler.check(&mut input).await
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return Err(e),
            Err(RuleError::Session(e)) if e.is_undetermined() => {
                tracing::debug!(rule = %rule.name(), error = %e, "Skipping rule, fact undetermined");
            }
            Err(e) => {
                tracing::error!(
                    rule = %rule.name(),
                    desc = %rule.descriptor.desc,
                    error = %e,
                    "Rule handler failed"
                );
                results.add(
                    Severity::Error,
                    rule.name(),
                    format!("rule {} failed: {e}", rule.name()),
                );
            }
        }
    }
    Ok(())
}

/// Whether the session error is one a rule should skip on.
pub fn is_skippable(e: &SessionError) -> bool {
    e.is_undetermined() || e.is_not_found()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamSpec;
    use crate::registry::{RuleDescriptor, RuleHandler, RuleRegistry};
    use async_trait::async_trait;
    use sqlvet_core::RuleConfig;
    use sqlvet_parser::SqlParser;

    struct Always(&'static str);

    #[async_trait]
    impl RuleHandler for Always {
        async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
            input.report(self.0);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl RuleHandler for Broken {
        async fn check(&self, _input: &mut RuleInput<'_>) -> Result<(), RuleError> {
            Err(RuleError::Internal("boom".to_string()))
        }
    }

    struct NeedsParam;

    #[async_trait]
    impl RuleHandler for NeedsParam {
        async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError> {
            let limit = input.params().get_int("limit")?;
            input.report(format!("limit {limit}"));
            Ok(())
        }
    }

    struct Cancelled;

    #[async_trait]
    impl RuleHandler for Cancelled {
        async fn check(&self, _input: &mut RuleInput<'_>) -> Result<(), RuleError> {
            Err(SessionError::Cancelled.into())
        }
    }

    fn registry() -> RuleRegistry {
        let mut registry = RuleRegistry::new();
        registry
            .register(
                RuleDescriptor::new("first", "always fires", Severity::Notice)
                    .allow_offline()
                    .with_handler(Always("first fired")),
            )
            .unwrap();
        registry
            .register(
                RuleDescriptor::new("broken", "always fails", Severity::Warning)
                    .allow_offline()
                    .with_handler(Broken),
            )
            .unwrap();
        registry
            .register(
                RuleDescriptor::new("live_only", "needs a server", Severity::Warning)
                    .with_handler(Always("live fired")),
            )
            .unwrap();
        registry
            .register(
                RuleDescriptor::new("fresh_only", "skipped on re-audit", Severity::Error)
                    .allow_offline()
                    .disabled_for_executed()
                    .with_handler(Always("fresh fired")),
            )
            .unwrap();
        registry
            .register(
                RuleDescriptor::new("needs_param", "requires limit", Severity::Notice)
                    .allow_offline()
                    .with_param(ParamSpec::int("limit", "limit", 0).required())
                    .with_handler(NeedsParam),
            )
            .unwrap();
        registry
            .register(RuleDescriptor::new("config_only", "threshold", Severity::Notice).allow_offline())
            .unwrap();
        registry
    }

    fn stmt() -> StatementEnvelope {
        SqlParser::new().parse_one("SELECT 1").unwrap()
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let registry = registry();
        let rules = RuleSet::all(&registry).unwrap();
        let ctx = SessionContext::offline();
        let mut results = AuditResults::new();

        dispatch(&stmt(), &ctx, &rules, DispatchMode::for_session(&ctx, false), &mut results)
            .await
            .unwrap();

        let rendered: Vec<(String, Severity)> = results
            .findings()
            .iter()
            .map(|f| (f.rule.clone(), f.level))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("first".to_string(), Severity::Notice),
                ("broken".to_string(), Severity::Error),
                ("fresh_only".to_string(), Severity::Error),
                ("needs_param".to_string(), Severity::Error),
            ]
        );
        assert_eq!(results.findings()[1].message, "rule broken failed: boom");
        assert!(results.findings()[3].message.contains("limit"));
    }

    #[tokio::test]
    async fn test_offline_and_executed_skips() {
        let registry = registry();
        let rules = RuleSet::bind(
            &registry,
            &[RuleConfig::new("live_only"), RuleConfig::new("fresh_only")],
        )
        .unwrap();
        let ctx = SessionContext::offline();

        let mut results = AuditResults::new();
        let mode = DispatchMode {
            offline: true,
            already_executed: true,
        };
        dispatch(&stmt(), &ctx, &rules, mode, &mut results).await.unwrap();
        assert!(!results.has_result());

        let mut results = AuditResults::new();
        let mode = DispatchMode {
            offline: false,
            already_executed: false,
        };
        dispatch(&stmt(), &ctx, &rules, mode, &mut results).await.unwrap();
        assert_eq!(results.findings().len(), 2);
    }

    #[tokio::test]
    async fn test_order_is_stable() {
        let registry = registry();
        let rules = RuleSet::all(&registry).unwrap();
        let ctx = SessionContext::offline();
        let mode = DispatchMode::for_session(&ctx, false);

        let mut first = AuditResults::new();
        dispatch(&stmt(), &ctx, &rules, mode, &mut first).await.unwrap();
        let mut second = AuditResults::new();
        dispatch(&stmt(), &ctx, &rules, mode, &mut second).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let mut registry = registry();
        registry
            .register(
                RuleDescriptor::new("cancelled", "cancels", Severity::Notice)
                    .allow_offline()
                    .with_handler(Cancelled),
            )
            .unwrap();
        let rules = RuleSet::bind(
            &registry,
            &[RuleConfig::new("first"), RuleConfig::new("cancelled")],
        )
        .unwrap();
        let ctx = SessionContext::offline();
        let mut results = AuditResults::new();

        let err = dispatch(&stmt(), &ctx, &rules, DispatchMode::for_session(&ctx, false), &mut results)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(results.findings().len(), 1);
    }
}
