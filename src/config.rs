use std::env;
use std::fs;

use anyhow::Context;
use serde::Deserialize;

use crate::safety::SeverityWeights;

pub const CONFIG_PATH_VAR: &str = "SAFEWALK_CONFIG";
pub const BIND_VAR: &str = "SAFEWALK_BIND";

/// Service settings. Built once in `main` and handed to whatever needs them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: String,
    pub severity_weights: SeverityWeights,
    /// Allow any origin (the map frontend is usually served from a file).
    pub cors_permissive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            severity_weights: SeverityWeights::default(),
            cors_permissive: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(raw).context("parsing config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the TOML file named by `SAFEWALK_CONFIG` if set, then applies
    /// `SAFEWALK_BIND`.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Same as [`Config::load`], with variables resolved through `var`.
    pub fn load_with(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = match var(CONFIG_PATH_VAR) {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        if let Some(bind) = var(BIND_VAR) {
            config.bind_addr = bind;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.severity_weights
            .validate()
            .context("invalid severity_weights")?;
        Ok(())
    }
}
