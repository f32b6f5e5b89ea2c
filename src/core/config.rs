use crate::core::currency::DEFAULT_CURRENCY;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Upper bound for one refresh, retries included.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Upper bound for a single HTTP attempt. Keep
    /// `(retries + 1) * attempt_timeout_ms` plus the delays under `timeout_ms`
    /// or later attempts never run.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_attempt_timeout_ms() -> u64 {
    3_000
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    250
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://api.frankfurter.app".to_string(),
            timeout_ms: default_timeout_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Currency the rate table is fetched against.
    #[serde(default = "default_currency")]
    pub base_currency: String,
    /// Display currency when nothing was selected or inferred.
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Country of the signed-in user; absent means anonymous.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_currency: default_currency(),
            default_currency: default_currency(),
            country: None,
            provider: ProviderConfig::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxcache", "fxcache")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "fxcache", "fxcache")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
