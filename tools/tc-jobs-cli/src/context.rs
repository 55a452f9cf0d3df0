//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use tc_jobs::memory::MemoryStore;
use tc_jobs::validate::JobValidator;

use crate::config::CliConfig;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config = if let Some(path) = config_path {
            CliConfig::load(path)?
        } else {
            // Try to find config in current directory or parent directories
            Self::find_config(&cwd).unwrap_or_default()
        };

        Ok(Self { config, output, cwd })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<CliConfig> {
        let config_names = ["tcjobs.toml", ".tcjobs.toml", "tcjobs.json"];

        let mut current = start.to_path_buf();
        loop {
            for name in &config_names {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = CliConfig::load(config_path.to_str()?) {
                        return Some(config);
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        if PathBuf::from(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        }
    }

    /// Load the store fixture named on the command line or in the config.
    pub fn load_store(&self, path: Option<&str>) -> Result<MemoryStore> {
        let path = path
            .or(self.config.store.as_deref())
            .ok_or_else(|| anyhow!("No store fixture given; pass --store or set `store` in tcjobs.toml"))?;
        let resolved = self.resolve_path(path);
        let content = std::fs::read_to_string(&resolved)
            .with_context(|| format!("Failed to read store fixture: {}", resolved.display()))?;

        let store = if path.ends_with(".json") {
            MemoryStore::from_json(&content)
        } else {
            MemoryStore::from_toml(&content)
        };
        let store = store.with_context(|| format!("Failed to parse store fixture: {}", resolved.display()))?;
        self.output.debug(&format!("Loaded store fixture {}", resolved.display()));
        Ok(store)
    }

    /// A validator over `store` using the configured settings.
    pub fn validator<'s>(&self, store: &'s MemoryStore) -> JobValidator<'s, MemoryStore> {
        JobValidator::new(store).with_config(self.config.validator.clone())
    }
}
