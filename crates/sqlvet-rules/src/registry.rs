//! Rule descriptors, the registry and per-run rule sets.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sqlvet_core::{AuditResults, RuleConfig, Severity};
use sqlvet_parser::StatementEnvelope;
use sqlvet_session::SessionContext;

use crate::error::{RuleConfigError, RuleError};
use crate::params::{BoundParams, ParamSpec};

// =============================================================================
// Handlers
// =============================================================================

/// Everything a handler sees while checking one statement.
pub struct RuleInput<'a> {
    pub ctx: &'a SessionContext,
    pub stmt: &'a StatementEnvelope,
    pub rule: &'a BoundRule,
    pub results: &'a mut AuditResults,
}

impl RuleInput<'_> {
    /// Record a finding at the rule's configured level.
    pub fn report(&mut self, message: impl Into<String>) {
        self.results
            .add(self.rule.level, self.rule.name(), message.into());
    }

    pub fn params(&self) -> &BoundParams {
        &self.rule.params
    }
}

/// The check behind a rule.
///
/// Handlers match the statement kinds they care about and return `Ok(())`
/// without findings for everything else. Facts the session cannot determine
/// are a reason to skip, not to report.
#[async_trait]
pub trait RuleHandler: Send + Sync {
    async fn check(&self, input: &mut RuleInput<'_>) -> Result<(), RuleError>;
}

// =============================================================================
// Descriptors
// =============================================================================

/// A registered, named check.
#[derive(Clone, Serialize)]
pub struct RuleDescriptor {
    pub name: String,
    pub desc: String,
    pub tags: Vec<&'static str>,
    pub level: Severity,
    pub params: Vec<ParamSpec>,
    /// Whether the rule can run without a live connection.
    pub allow_offline: bool,
    /// Whether the rule is skipped when re-auditing SQL that already ran.
    pub disabled_for_executed: bool,
    /// `None` for rules that only carry configuration for the pipeline.
    #[serde(skip)]
    pub handler: Option<Arc<dyn RuleHandler>>,
}

impl fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("params", &self.params)
            .field("allow_offline", &self.allow_offline)
            .field("disabled_for_executed", &self.disabled_for_executed)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl RuleDescriptor {
    pub fn new(name: impl Into<String>, desc: impl Into<String>, level: Severity) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            tags: Vec::new(),
            level,
            params: Vec::new(),
            allow_offline: false,
            disabled_for_executed: false,
            handler: None,
        }
    }

    pub fn with_tags(mut self, tags: &[&'static str]) -> Self {
        self.tags.extend_from_slice(tags);
        self
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn allow_offline(mut self) -> Self {
        self.allow_offline = true;
        self
    }

    pub fn disabled_for_executed(mut self) -> Self {
        self.disabled_for_executed = true;
        self
    }

    pub fn with_handler(mut self, handler: impl RuleHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Whether the rule only carries configuration.
    pub fn is_config_only(&self) -> bool {
        self.handler.is_none()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Every rule a host knows about, in registration order.
///
/// Registries are built explicitly and passed down; there is no process-wide
/// instance.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<RuleDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in rules.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in crate::builtin::descriptors() {
            let registered = registry.register(descriptor);
            if let Err(e) = &registered {
                tracing::error!(error = %e, "Built-in rule not registered");
            }
            debug_assert!(registered.is_ok(), "built-in rule names must be distinct");
        }
        registry
    }

    pub fn register(&mut self, descriptor: RuleDescriptor) -> Result<(), RuleConfigError> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(RuleConfigError::DuplicateRule(descriptor.name));
        }
        self.by_name
            .insert(descriptor.name.clone(), self.rules.len());
        self.rules.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RuleDescriptor>> {
        self.by_name.get(name).map(|&i| &self.rules[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RuleDescriptor>> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// =============================================================================
// Rule sets
// =============================================================================

/// A rule enabled for one run, with its level and parameters resolved.
#[derive(Debug, Clone)]
pub struct BoundRule {
    pub descriptor: Arc<RuleDescriptor>,
    pub level: Severity,
    pub params: BoundParams,
}

impl BoundRule {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// The active rules of one run, in registry order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<BoundRule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Enable the configured rules, validating levels and parameters.
    ///
    /// Dispatch order follows the registry, not the configuration. A rule
    /// listed more than once keeps its last entry.
    pub fn bind(registry: &RuleRegistry, configs: &[RuleConfig]) -> Result<Self, RuleConfigError> {
        let mut chosen: HashMap<usize, &RuleConfig> = HashMap::new();
        for config in configs {
            let index = *registry
                .by_name
                .get(&config.name)
                .ok_or_else(|| RuleConfigError::UnknownRule(config.name.clone()))?;
            chosen.insert(index, config);
        }

        let mut indices: Vec<usize> = chosen.keys().copied().collect();
        indices.sort_unstable();

        let mut rules = Vec::with_capacity(indices.len());
        for index in indices {
            let descriptor = registry.rules[index].clone();
            let config = chosen[&index];
            let params = BoundParams::bind(&descriptor.name, &descriptor.params, &config.params)?;
            rules.push(BoundRule {
                level: config.level.unwrap_or(descriptor.level),
                descriptor,
                params,
            });
        }
        tracing::debug!(rules = rules.len(), "Bound rule set");
        Ok(Self { rules })
    }

    /// Every registered rule with its declared level and default parameters.
    pub fn all(registry: &RuleRegistry) -> Result<Self, RuleConfigError> {
        let configs: Vec<RuleConfig> = registry
            .iter()
            .map(|d| RuleConfig::new(d.name.clone()))
            .collect();
        Self::bind(registry, &configs)
    }

    pub fn get(&self, name: &str) -> Option<&BoundRule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::names;

    #[test]
    fn test_builtin_registry_order() {
        let registry = RuleRegistry::builtin();
        let names: Vec<&str> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names[0], names::TABLE_PRIMARY_KEY);
        assert_eq!(names[11], names::AFFECTED_ROWS);
        assert_eq!(registry.len(), 16);
        assert!(registry.get(names::GHOST_MIN_SIZE).unwrap().is_config_only());
    }

    #[test]
    fn test_builtin_registry_keeps_every_descriptor() {
        let descriptors = crate::builtin::descriptors();
        let registry = RuleRegistry::builtin();
        assert_eq!(registry.len(), descriptors.len());
        for descriptor in &descriptors {
            assert!(registry.get(&descriptor.name).is_some(), "{}", descriptor.name);
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = RuleRegistry::builtin();
        let err = registry
            .register(RuleDescriptor::new(
                names::SELECT_STAR,
                "again",
                Severity::Notice,
            ))
            .unwrap_err();
        assert!(matches!(err, RuleConfigError::DuplicateRule(_)));
    }

    #[test]
    fn test_bind_follows_registry_order() {
        let registry = RuleRegistry::builtin();
        let rules = RuleSet::bind(
            &registry,
            &[
                RuleConfig::new(names::SELECT_STAR),
                RuleConfig::new(names::TABLE_PRIMARY_KEY).with_level(Severity::Warning),
            ],
        )
        .unwrap();

        let order: Vec<&str> = rules.iter().map(BoundRule::name).collect();
        assert_eq!(order, vec![names::TABLE_PRIMARY_KEY, names::SELECT_STAR]);
        assert_eq!(
            rules.get(names::TABLE_PRIMARY_KEY).unwrap().level,
            Severity::Warning
        );
        assert_eq!(rules.get(names::SELECT_STAR).unwrap().level, Severity::Notice);
    }

    #[test]
    fn test_bind_rejects_unknown_rule_and_bad_param() {
        let registry = RuleRegistry::builtin();
        assert!(matches!(
            RuleSet::bind(&registry, &[RuleConfig::new("no_such_rule")]),
            Err(RuleConfigError::UnknownRule(_))
        ));
        assert!(matches!(
            RuleSet::bind(
                &registry,
                &[RuleConfig::new(names::INDEX_COUNT).with_param("max_count", "many")]
            ),
            Err(RuleConfigError::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_all_enables_every_rule() {
        let registry = RuleRegistry::builtin();
        let rules = RuleSet::all(&registry).unwrap();
        assert_eq!(rules.len(), registry.len());
        assert_eq!(
            rules
                .get(names::OBJECT_NAME_LENGTH)
                .unwrap()
                .params
                .get_int("max_length")
                .unwrap(),
            64
        );
    }
}
