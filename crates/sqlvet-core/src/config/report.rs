//! Audit report log configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the persisted audit report log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Whether report logging is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// Storage backend.
    #[serde(default)]
    pub backend: ReportBackend,

    /// Directory holding the JSON Lines file (file backend).
    #[serde(default = "default_directory")]
    pub directory: String,

    /// File name inside `directory`.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Also echo every event to stdout.
    #[serde(default)]
    pub stdout: bool,
}

/// Report storage backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportBackend {
    /// Log to stdout.
    #[default]
    Console,
    /// Append to a JSON Lines file.
    File,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: ReportBackend::default(),
            directory: default_directory(),
            file_name: default_file_name(),
            stdout: false,
        }
    }
}

fn default_directory() -> String {
    "logs".to_string()
}

fn default_file_name() -> String {
    "sqlvet-report.jsonl".to_string()
}
