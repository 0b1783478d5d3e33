//! Audit result set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered finding level: `Notice < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Notice,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notice => write!(f, "notice"),
            Self::Warning => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}' (expected notice, warning or error)")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notice" | "info" => Ok(Self::Notice),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

/// A single rule violation or advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub level: Severity,
    /// Name of the rule (or pipeline stage) that produced the finding.
    pub rule: String,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.level, self.message)
    }
}

/// Accumulates the findings for one statement.
///
/// Findings keep the order in which they were added. The overall level is the
/// maximum over all findings, so it never decreases as findings accumulate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResults {
    findings: Vec<Finding>,
}

impl AuditResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finding.
    pub fn add(&mut self, level: Severity, rule: impl Into<String>, message: impl Into<String>) {
        self.findings.push(Finding {
            level,
            rule: rule.into(),
            message: message.into(),
        });
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Maximum severity over all findings, `None` when empty.
    pub fn level(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.level).max()
    }

    pub fn has_result(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Whether any finding came from the named rule.
    pub fn has_rule(&self, rule: &str) -> bool {
        self.findings.iter().any(|f| f.rule == rule)
    }

    /// Whether the statement stays below the caller-chosen threshold.
    pub fn passes(&self, threshold: Severity) -> bool {
        self.level().is_none_or(|level| level < threshold)
    }

    /// Render all findings, one per line.
    pub fn message(&self) -> String {
        self.findings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}
