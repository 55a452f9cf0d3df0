//! CLI configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tc_jobs::ValidatorConfig;

/// CLI configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Validator settings.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Default store fixture when `--store` is not given.
    #[serde(default)]
    pub store: Option<String>,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            validator: ValidatorConfig::default(),
            store: None,
            log_level: default_log_level(),
        }
    }
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }
}
