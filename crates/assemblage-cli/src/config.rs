//! Configuration loading

use anyhow::Result;
use assemblage_core::Preferences;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Load configuration from file, defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.preferences, Preferences::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("assemblage.toml");
        std::fs::write(
            &path,
            "[preferences]\ngroup_tools_suffix = \"_g\"\ngroup_tools_size = 0.5\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.preferences.group_tools_suffix, "_g");
        assert_eq!(config.preferences.group_tools_size, 0.5);
        assert_eq!(config.preferences.group_tools_prefix, "_");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_config_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("assemblage.toml");
        save_default_config(&path).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.preferences, Preferences::default());
        assert!(std::fs::read_to_string(&path).unwrap().contains("group_tools_basename"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[preferences\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
