//! Online schema-change tool configuration.

use serde::{Deserialize, Serialize};

/// Settings for the external online-DDL tools.
///
/// Size thresholds are not configured here: they are parameters of the
/// `ddl_ghost_min_size` and `ddl_osc_min_size` rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineDdlConfig {
    /// Path to the gh-ost binary.
    #[serde(default = "default_ghost_binary")]
    pub ghost_binary: String,

    /// Extra arguments appended to every gh-ost invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Timeout in seconds for a single dry run or real run.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Binary named in generated pt-online-schema-change command lines.
    #[serde(default = "default_osc_binary")]
    pub osc_binary: String,
}

impl Default for OnlineDdlConfig {
    fn default() -> Self {
        Self {
            ghost_binary: default_ghost_binary(),
            extra_args: Vec::new(),
            timeout_seconds: default_timeout(),
            osc_binary: default_osc_binary(),
        }
    }
}

fn default_ghost_binary() -> String {
    "gh-ost".to_string()
}

fn default_timeout() -> u64 {
    3600
}

fn default_osc_binary() -> String {
    "pt-online-schema-change".to_string()
}
