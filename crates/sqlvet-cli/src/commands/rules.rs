//! `sqlvet rules` command implementation.
//!
//! Lists the built-in rule registry and marks the rules the configuration
//! enables.

use anyhow::Result;
use serde::Serialize;

use sqlvet_core::SqlvetConfig;
use sqlvet_rules::{RuleDescriptor, RuleRegistry, RuleSet};

use crate::OutputFormat;
use crate::engine::rule_set;

#[derive(Debug, Serialize)]
struct RuleListing<'a> {
    #[serde(flatten)]
    descriptor: &'a RuleDescriptor,
    enabled: bool,
    config_only: bool,
}

pub fn run(config: &SqlvetConfig, format: OutputFormat) -> Result<()> {
    let registry = RuleRegistry::builtin();
    let enabled = rule_set(config)?;

    match format {
        OutputFormat::Text => print!("{}", render_text(&registry, &enabled)),
        OutputFormat::Json => {
            let listing: Vec<RuleListing> = registry
                .iter()
                .map(|d| RuleListing {
                    descriptor: d,
                    enabled: enabled.is_enabled(&d.name),
                    config_only: d.is_config_only(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
    }
    Ok(())
}

pub fn render_text(registry: &RuleRegistry, enabled: &RuleSet) -> String {
    let mut out = String::new();
    for descriptor in registry.iter() {
        let level = enabled
            .get(&descriptor.name)
            .map(|rule| rule.level)
            .unwrap_or(descriptor.level);
        let mut flags = Vec::new();
        if enabled.is_enabled(&descriptor.name) {
            flags.push("enabled");
        }
        if descriptor.allow_offline {
            flags.push("offline");
        }
        if descriptor.disabled_for_executed {
            flags.push("skip-executed");
        }
        if descriptor.is_config_only() {
            flags.push("config");
        }

        out.push_str(&format!(
            "{:<40} {:<7} [{}]\n    {}\n",
            descriptor.name,
            level.to_string(),
            flags.join(","),
            descriptor.desc
        ));
        for param in &descriptor.params {
            let value = enabled
                .get(&descriptor.name)
                .and_then(|rule| rule.params.get(param.key))
                .or(param.default.as_ref())
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "    {} ({}) = {}: {}\n",
                param.key, param.kind, value, param.desc
            ));
        }
    }
    out
}
