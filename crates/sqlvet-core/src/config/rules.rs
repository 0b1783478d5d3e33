//! Rule selection and parameter configuration.
//!
//! Rules are enabled by listing them, either inline under `rules:` in the main
//! file or in a separate file referenced by `rules_file`:
//!
//! ```yaml
//! rules:
//!   - name: ddl_check_table_primary_key
//!   - name: ddl_check_object_name_length
//!     level: warning
//!     params:
//!       max_length: 32
//!   - name: ddl_ghost_min_size
//!     params:
//!       min_size: 2048
//! ```
//!
//! Parameter values stay untyped here; the rule registry validates them
//! against each rule's declared parameter types when the rule set is bound.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ConfigError;
use crate::Severity;

/// One enabled rule with optional overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,

    /// Severity override; the rule's declared level applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Severity>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, RuleParamValue>,
}

impl RuleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<RuleParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A raw parameter value as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for RuleParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for RuleParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for RuleParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for RuleParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for RuleParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Contents of a standalone rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RulesFile {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_params_keep_yaml_types() {
        let yaml = r#"
rules:
  - name: ddl_check_object_name_length
    level: error
    params:
      max_length: 32
  - name: optimize_index_enabled
    params:
      min_selectivity: 0.5
      max_columns: 3
  - name: ddl_check_table_engine
    params:
      engine: InnoDB
"#;
        let file = RulesFile::from_yaml(yaml).unwrap();
        assert_eq!(file.rules.len(), 3);
        assert_eq!(file.rules[0].level, Some(Severity::Error));
        assert_eq!(file.rules[0].params["max_length"], RuleParamValue::Int(32));
        assert_eq!(
            file.rules[1].params["min_selectivity"],
            RuleParamValue::Float(0.5)
        );
        assert_eq!(
            file.rules[2].params["engine"],
            RuleParamValue::Text("InnoDB".to_string())
        );
    }
}
