use crate::options::{OptionSet, OptionValue};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Directory holding the config file, relative to the directory it applies to
pub const CONFIG_DIR: &str = ".batchren";
pub const CONFIG_FILE: &str = "config.toml";

/// Option defaults read from `.batchren/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Option name to value, e.g. `recursive = true`
    #[serde(default)]
    pub defaults: BTreeMap<String, OptionValue>,
}

impl Config {
    /// Load `.batchren/config.toml` under `dir` if it exists
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Self::load_from_path(&config_path);
        }

        // Return default config if no config file exists
        Ok(Self::default())
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save config to `.batchren/config.toml` under `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let config_dir = dir.join(CONFIG_DIR);
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }
        self.save_to_path(&config_dir.join(CONFIG_FILE))
    }

    /// Save config to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply the defaults through the validated option setter
    pub fn apply_to(&self, options: &mut OptionSet) -> crate::Result<()> {
        if self.defaults.is_empty() {
            return Ok(());
        }
        options.set(
            self.defaults
                .iter()
                .map(|(name, value)| (name.as_str(), value.clone())),
        )?;
        Ok(())
    }
}
