use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;

pub const EXAMPLE_CONFIG: &str = r#"---
# Example configuration file for fxcache

# Currency the rate table is fetched against
base_currency: "EUR"

# Display currency used until one is selected or inferred
default_currency: "EUR"

# Country of the signed-in user (ISO 3166-1 alpha-2), drives first-login inference
# country: "GB"

provider:
  base_url: "https://api.frankfurter.app"
  timeout_ms: 10000
  attempt_timeout_ms: 3000
  retries: 2
  retry_delay_ms: 250

# Where cached rates and the currency preference are stored
# data_path: "/tmp/fxcache"
"#;

/// Writes the example configuration to the default location.
pub fn setup() -> Result<()> {
    setup_at_path(AppConfig::default_config_path()?)
}

pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_setup_creates_loadable_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        setup_at_path(&config_path)?;

        let config = AppConfig::load_from_path(&config_path)?;
        assert_eq!(config.base_currency, "EUR");
        assert_eq!(config.provider.base_url, "https://api.frankfurter.app");
        assert!(config.country.is_none());
        Ok(())
    }

    #[test]
    fn test_setup_fails_if_config_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "test")?;

        let result = setup_at_path(&config_path);

        assert!(result.unwrap_err().to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&config_path)?, "test");
        Ok(())
    }
}
