//! Validator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;

/// Name of the parameter holding the dynamic TTL maximum, in days.
pub const MAX_REVAL_DURATION_PARAMETER: &str = "maxRevalDurationDays";
/// Config file of [`MAX_REVAL_DURATION_PARAMETER`].
pub const REGEX_REVALIDATE_CONFIG_FILE: &str = "regex_revalidate.config";
/// Name of the parameter that switches REFETCH jobs on.
pub const REFETCH_ENABLED_PARAMETER: &str = "refetch_enabled";
/// Config file of [`REFETCH_ENABLED_PARAMETER`].
pub const GLOBAL_CONFIG_FILE: &str = "global";

/// Settings shared by every validation performed against one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Budget for the storage calls of a single request, in milliseconds.
    /// Unbounded when absent.
    #[serde(default)]
    pub lookup_timeout_ms: Option<u64>,

    /// Parameter name of the dynamic TTL maximum.
    #[serde(default = "default_max_reval_parameter")]
    pub max_reval_parameter: String,

    /// Config file of the dynamic TTL maximum.
    #[serde(default = "default_reval_config_file")]
    pub reval_config_file: String,

    /// Parameter name of the REFETCH switch.
    #[serde(default = "default_refetch_parameter")]
    pub refetch_parameter: String,

    /// Config file of the REFETCH switch.
    #[serde(default = "default_global_config_file")]
    pub global_config_file: String,
}

fn default_max_reval_parameter() -> String {
    MAX_REVAL_DURATION_PARAMETER.to_string()
}

fn default_reval_config_file() -> String {
    REGEX_REVALIDATE_CONFIG_FILE.to_string()
}

fn default_refetch_parameter() -> String {
    REFETCH_ENABLED_PARAMETER.to_string()
}

fn default_global_config_file() -> String {
    GLOBAL_CONFIG_FILE.to_string()
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: None,
            max_reval_parameter: default_max_reval_parameter(),
            reval_config_file: default_reval_config_file(),
            refetch_parameter: default_refetch_parameter(),
            global_config_file: default_global_config_file(),
        }
    }
}

impl ValidatorConfig {
    /// Set the per-request lookup budget.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// A fresh deadline for one request.
    pub fn deadline(&self) -> Deadline {
        Deadline::from_millis(self.lookup_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_name_traffic_ops_parameters() {
        let config = ValidatorConfig::default();
        assert_eq!(config.max_reval_parameter, "maxRevalDurationDays");
        assert_eq!(config.reval_config_file, "regex_revalidate.config");
        assert_eq!(config.refetch_parameter, "refetch_enabled");
        assert_eq!(config.global_config_file, "global");
        assert!(config.deadline().remaining().is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ValidatorConfig = toml::from_str("lookup_timeout_ms = 250").unwrap();
        assert_eq!(config.lookup_timeout_ms, Some(250));
        assert_eq!(config.max_reval_parameter, "maxRevalDurationDays");
        assert!(config.deadline().remaining().is_some());
    }

    #[test]
    fn test_with_lookup_timeout() {
        let config = ValidatorConfig::default().with_lookup_timeout(Duration::from_secs(2));
        assert_eq!(config.lookup_timeout_ms, Some(2000));
    }
}
