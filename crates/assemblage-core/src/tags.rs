//! Free-form string-keyed tags stored on objects, collections and scenes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of `Visibility::hide` taken when an object is packaged
pub const TAG_HIDE: &str = "M3.hide";
/// Snapshot of `Visibility::hide_viewport` taken when an object is packaged
pub const TAG_HIDE_VIEWPORT: &str = "M3.hide_viewport";
/// Marks a backup object kept by the decal integration
pub const TAG_DECAL_BACKUP: &str = "is_decal_backup";
/// Marks a stash object kept by the mesh integration
pub const TAG_STASH_OBJECT: &str = "is_stash_object";

/// A single tag value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl TagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Ordered tag dictionary
pub type Tags = BTreeMap<String, TagValue>;
