//! Configuration types for the sqlvet audit engine.
//!
//! Configuration is loaded from a single YAML file (`sqlvet.yaml`), optionally
//! referencing a separate rules file:
//!
//! ```yaml
//! session:
//!   default_schema: shop
//!   executed_sql: false
//! executor:
//!   database_url_env: SQLVET_DATABASE_URL
//! online_ddl:
//!   ghost_binary: /usr/local/bin/gh-ost
//! rules_file: rules.yaml
//! report:
//!   enabled: true
//!   backend: file
//! ```
//!
//! Without an `executor` section every audit runs offline.

pub mod executor;
pub mod online_ddl;
pub mod report;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use executor::ExecutorConfig;
pub use online_ddl::OnlineDdlConfig;
pub use report::{ReportBackend, ReportConfig};
pub use rules::{RuleConfig, RuleParamValue, RulesFile};

/// Complete sqlvet configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlvetConfig {
    /// Audit session defaults.
    #[serde(default)]
    pub session: SessionConfig,

    /// Live MySQL connection; offline audits when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorConfig>,

    /// Online schema-change tools.
    #[serde(default)]
    pub online_ddl: OnlineDdlConfig,

    /// Inline rule list.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Path to a rules file (alternative to inline; appended after inline rules).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,

    /// Audit report log.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Session-level defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Schema used for unqualified table references until a `USE` is seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    /// Audit SQL that has already been executed (re-audit mode).
    #[serde(default)]
    pub executed_sql: bool,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqlvetConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve the `rules_file` reference.
    ///
    /// A relative `rules_file` is resolved against the directory of `path`.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(rules_file) = &config.rules_file {
            let rules_path = if rules_file.is_absolute() {
                rules_file.clone()
            } else {
                base_dir.join(rules_file)
            };

            if !rules_path.exists() {
                return Err(ConfigError::Config(format!(
                    "rules file not found: {}",
                    rules_path.display()
                )));
            }
            let content = fs::read_to_string(&rules_path)?;
            config.rules.extend(RulesFile::from_yaml(&content)?.rules);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject rule lists naming the same rule twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::Config(format!(
                    "rule '{}' is configured more than once",
                    rule.name
                )));
            }
        }
        Ok(())
    }

    /// Whether audits run without a live database.
    pub fn is_offline(&self) -> bool {
        self.executor.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_is_offline() {
        let config = SqlvetConfig::from_yaml("{}").unwrap();
        assert!(config.is_offline());
        assert!(config.rules.is_empty());
        assert!(!config.session.executed_sql);
        assert_eq!(config.online_ddl.ghost_binary, "gh-ost");
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
session:
  default_schema: shop
executor:
  host: db.internal
  port: 3307
  username: auditor
  password_env: SQLVET_TEST_PASSWORD_UNSET
online_ddl:
  ghost_binary: /opt/gh-ost
  extra_args: ["--allow-on-master"]
rules:
  - name: dml_check_where_exists
report:
  enabled: true
  backend: file
"#;
        let config = SqlvetConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.session.default_schema.as_deref(), Some("shop"));
        let executor = config.executor.as_ref().unwrap();
        assert_eq!(executor.port, 3307);
        assert_eq!(executor.connection_string(), "mysql://auditor@db.internal:3307");
        assert_eq!(config.online_ddl.extra_args, vec!["--allow-on-master"]);
        assert_eq!(config.report.backend, ReportBackend::File);
        assert_eq!(config.rules[0].name, "dml_check_where_exists");
    }

    #[test]
    fn test_load_with_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let rules_path = dir.path().join("rules.yaml");
        let mut rules = fs::File::create(&rules_path).unwrap();
        writeln!(rules, "rules:\n  - name: dml_check_select_star").unwrap();

        let main_path = dir.path().join("sqlvet.yaml");
        let mut main = fs::File::create(&main_path).unwrap();
        writeln!(
            main,
            "rules:\n  - name: ddl_check_table_primary_key\nrules_file: rules.yaml"
        )
        .unwrap();

        let config = SqlvetConfig::load_with_context(&main_path).unwrap();
        let names: Vec<_> = config.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ddl_check_table_primary_key", "dml_check_select_star"]);
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let main_path = dir.path().join("sqlvet.yaml");
        fs::write(
            &main_path,
            "rules:\n  - name: dml_check_select_star\n  - name: dml_check_select_star\n",
        )
        .unwrap();

        let err = SqlvetConfig::load_with_context(&main_path).unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }
}
