//! Saved group pose record
//!
//! The record lives on the owning group empty (`GroupProps::group_pose_col`);
//! the operations that maintain it are in `assemblage-groups::poses`.

use glam::DMat4;
use serde::{Deserialize, Serialize};

/// Name of the first pose recorded when a group is formed
pub const INCEPTION_POSE: &str = "Inception";
/// Name given to poses migrated from the single-rotation format
pub const LEGACY_POSE: &str = "LegacyPose";
/// Base name for automatically named poses
pub const AUTO_POSE_NAME: &str = "Pose";

/// Single rotation axis a pose differs by from its empty's Inception pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseAxis {
    X,
    Y,
    Z,
}

impl PoseAxis {
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

/// A saved local-space transform of a group empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the owning list
    pub index: usize,
    pub name: String,
    /// Local matrix of the owning empty at capture time
    pub mx: DMat4,
    /// Stable identity, shared by every pose of a batch
    pub uuid: String,
    /// Created as part of a hierarchy-wide batch
    #[serde(default)]
    pub batch: bool,
    /// Still synchronized with its batch siblings
    #[serde(default)]
    pub batchlinked: bool,
    #[serde(default)]
    pub axis: Option<PoseAxis>,
    /// Radians, meaningful only when `axis` is set
    #[serde(default)]
    pub angle: f64,
    #[serde(skip)]
    pub forced_preview_update: bool,
}

impl Pose {
    pub fn new(index: usize, name: impl Into<String>, mx: DMat4, uuid: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            mx,
            uuid: uuid.into(),
            batch: false,
            batchlinked: false,
            axis: None,
            angle: 0.0,
            forced_preview_update: false,
        }
    }

    pub fn is_inception(&self) -> bool {
        self.name == INCEPTION_POSE
    }

    pub fn is_reserved(&self) -> bool {
        self.name == INCEPTION_POSE || self.name == LEGACY_POSE
    }

    pub fn clear_derivation(&mut self) {
        self.axis = None;
        self.angle = 0.0;
    }
}

/// Fresh random pose identity
pub fn new_pose_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        let inception = Pose::new(0, INCEPTION_POSE, DMat4::IDENTITY, "a");
        assert!(inception.is_inception());
        assert!(inception.is_reserved());

        let legacy = Pose::new(1, LEGACY_POSE, DMat4::IDENTITY, "b");
        assert!(!legacy.is_inception());
        assert!(legacy.is_reserved());

        let user = Pose::new(2, "Open", DMat4::IDENTITY, "c");
        assert!(!user.is_reserved());
    }

    #[test]
    fn test_transient_flag_not_serialized() {
        let mut pose = Pose::new(0, AUTO_POSE_NAME, DMat4::IDENTITY, "u");
        pose.forced_preview_update = true;
        let json = serde_json::to_string(&pose).unwrap();
        assert!(!json.contains("forced_preview_update"));
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert!(!back.forced_preview_update);
    }
}
