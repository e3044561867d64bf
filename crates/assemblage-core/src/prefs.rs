//! Preferences record shared by every operator
//!
//! Operators never carry their own defaults; they read them from here.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Lower and upper bound of the group size fade factor
pub const FADE_FACTOR_RANGE: (f64, f64) = (0.1, 0.9);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_prefix")]
    pub group_tools_prefix: String,
    #[serde(default = "default_suffix")]
    pub group_tools_suffix: String,
    #[serde(default = "default_basename")]
    pub group_tools_basename: String,
    #[serde(default = "default_true")]
    pub group_tools_auto_name: bool,
    /// Display size of newly created group empties
    #[serde(default = "default_size")]
    pub group_tools_size: f64,
    #[serde(default = "default_true")]
    pub group_tools_fade_sizes: bool,
    #[serde(default = "default_fade_factor")]
    pub group_tools_fade_factor: f64,
    #[serde(default = "default_true")]
    pub group_tools_remove_empty: bool,

    /// Package the selected objects themselves instead of duplicates
    #[serde(default)]
    pub assetbrowser_tools_use_originals: bool,
    #[serde(default)]
    pub assetbrowser_tools_meta_author: String,
    #[serde(default)]
    pub assetbrowser_tools_meta_copyright: String,
    #[serde(default)]
    pub assetbrowser_tools_meta_license: String,
    #[serde(default = "default_catalog")]
    pub assetbrowser_tools_preferred_default_catalog: String,
    /// Edge length thumbnails are scaled down to
    #[serde(default = "default_thumbnail_size")]
    pub assetbrowser_tools_thumbnail_size: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            group_tools_prefix: default_prefix(),
            group_tools_suffix: default_suffix(),
            group_tools_basename: default_basename(),
            group_tools_auto_name: true,
            group_tools_size: default_size(),
            group_tools_fade_sizes: true,
            group_tools_fade_factor: default_fade_factor(),
            group_tools_remove_empty: true,
            assetbrowser_tools_use_originals: false,
            assetbrowser_tools_meta_author: String::new(),
            assetbrowser_tools_meta_copyright: String::new(),
            assetbrowser_tools_meta_license: String::new(),
            assetbrowser_tools_preferred_default_catalog: default_catalog(),
            assetbrowser_tools_thumbnail_size: default_thumbnail_size(),
        }
    }
}

fn default_prefix() -> String {
    "_".to_string()
}

fn default_suffix() -> String {
    "_grp".to_string()
}

fn default_basename() -> String {
    "GROUP".to_string()
}

fn default_true() -> bool {
    true
}

fn default_size() -> f64 {
    0.2
}

fn default_fade_factor() -> f64 {
    0.8
}

fn default_catalog() -> String {
    "Unassigned".to_string()
}

fn default_thumbnail_size() -> u32 {
    256
}

impl Preferences {
    /// Fade factor clamped to its valid range
    pub fn fade_factor(&self) -> f64 {
        let (lo, hi) = FADE_FACTOR_RANGE;
        self.group_tools_fade_factor.clamp(lo, hi)
    }

    pub fn from_toml(content: &str) -> Result<Self, PrefsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PrefsError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Load preferences from a TOML file, falling back to defaults when missing
pub fn load_preferences(path: &Path) -> Result<Preferences, PrefsError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let prefs = Preferences::from_toml(&content)?;
        info!(path = %path.display(), "Loaded preferences");
        Ok(prefs)
    } else {
        info!(path = %path.display(), "Preferences file not found, using defaults");
        Ok(Preferences::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.group_tools_prefix, "_");
        assert_eq!(prefs.group_tools_suffix, "_grp");
        assert_eq!(prefs.group_tools_basename, "GROUP");
        assert_eq!(prefs.assetbrowser_tools_preferred_default_catalog, "Unassigned");
        assert_eq!(prefs.fade_factor(), 0.8);
    }

    #[test]
    fn test_fade_factor_clamped() {
        let mut prefs = Preferences::default();
        prefs.group_tools_fade_factor = 0.01;
        assert_eq!(prefs.fade_factor(), 0.1);
        prefs.group_tools_fade_factor = 3.0;
        assert_eq!(prefs.fade_factor(), 0.9);
    }

    #[test]
    fn test_partial_toml() {
        let prefs = Preferences::from_toml(
            r#"
group_tools_suffix = ""
group_tools_fade_sizes = false
"#,
        )
        .unwrap();
        assert_eq!(prefs.group_tools_suffix, "");
        assert!(!prefs.group_tools_fade_sizes);
        assert_eq!(prefs.group_tools_prefix, "_");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        let mut prefs = Preferences::default();
        prefs.assetbrowser_tools_meta_author = "Jane".into();
        prefs.save(&path).unwrap();
        assert_eq!(load_preferences(&path).unwrap(), prefs);
        assert_eq!(
            load_preferences(&dir.path().join("missing.toml")).unwrap(),
            Preferences::default()
        );
    }
}
