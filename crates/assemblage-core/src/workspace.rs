//! Window, 3D view and workspace outliner state

use glam::{DMat4, DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::object::{ObjectId, Visibility};
use crate::scene::{SceneGroupSettings, SceneId};

/// Region-3D state of the main viewport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// World to view transform
    pub view_matrix: DMat4,
    #[serde(default = "default_true")]
    pub perspective: bool,
    #[serde(default = "default_region_width")]
    pub region_width: u32,
    #[serde(default = "default_region_height")]
    pub region_height: u32,
    /// Half-angle cotangent of the perspective field of view
    #[serde(default = "default_lens_factor")]
    pub lens_factor: f64,
    /// Visible width at unit distance for orthographic views
    #[serde(default = "default_ortho_scale")]
    pub ortho_scale: f64,
}

fn default_true() -> bool {
    true
}

fn default_region_width() -> u32 {
    1920
}

fn default_region_height() -> u32 {
    1080
}

fn default_lens_factor() -> f64 {
    1.0 / (0.5_f64 * 0.8575).tan()
}

fn default_ortho_scale() -> f64 {
    10.0
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            view_matrix: DMat4::look_at_rh(
                DVec3::new(10.0, -10.0, 7.0),
                DVec3::ZERO,
                DVec3::Z,
            ),
            perspective: true,
            region_width: default_region_width(),
            region_height: default_region_height(),
            lens_factor: default_lens_factor(),
            ortho_scale: default_ortho_scale(),
        }
    }
}

impl ViewState {
    /// View to world transform
    pub fn view_to_world(&self) -> DMat4 {
        self.view_matrix.inverse()
    }

    pub fn right(&self) -> DVec3 {
        self.view_to_world().x_axis.truncate().normalize_or_zero()
    }

    pub fn up(&self) -> DVec3 {
        self.view_to_world().y_axis.truncate().normalize_or_zero()
    }

    /// Direction the view looks into
    pub fn forward(&self) -> DVec3 {
        -self.view_to_world().z_axis.truncate().normalize_or_zero()
    }

    pub fn aspect(&self) -> f64 {
        self.region_width.max(1) as f64 / self.region_height.max(1) as f64
    }

    /// Project a world point into region pixel coordinates (origin top-left).
    ///
    /// Returns `None` for points behind a perspective camera.
    pub fn project(&self, world: DVec3) -> Option<DVec2> {
        let v = self.view_matrix.transform_point3(world);
        let ndc = if self.perspective {
            if v.z >= -1e-9 {
                return None;
            }
            DVec2::new(
                v.x * self.lens_factor / (-v.z * self.aspect()),
                v.y * self.lens_factor / -v.z,
            )
        } else {
            let half = self.ortho_scale * 0.5;
            DVec2::new(v.x / (half * self.aspect()), v.y / half)
        };
        Some(DVec2::new(
            (ndc.x * 0.5 + 0.5) * self.region_width as f64,
            (0.5 - ndc.y * 0.5) * self.region_height as f64,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub scene: SceneId,
    pub view: ViewState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlinerDisplayMode {
    #[default]
    ViewLayer,
    Scenes,
    BlenderFile,
    OrphanData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlinerFilter {
    #[serde(default)]
    pub filter_text: String,
    #[serde(default)]
    pub use_filter_complete: bool,
    #[serde(default)]
    pub use_filter_case_sensitive: bool,
    #[serde(default = "default_true")]
    pub use_filter_children: bool,
    #[serde(default = "default_true")]
    pub use_filter_collection: bool,
    #[serde(default = "default_true")]
    pub use_filter_object_mesh: bool,
    #[serde(default = "default_true")]
    pub use_filter_object_empty: bool,
    #[serde(default = "default_true")]
    pub use_filter_object_others: bool,
    #[serde(default = "default_true")]
    pub use_filter_object_content: bool,
    #[serde(default = "default_true")]
    pub show_restrict_column_hide: bool,
    #[serde(default)]
    pub show_restrict_column_viewport: bool,
    #[serde(default)]
    pub show_restrict_column_select: bool,
}

impl Default for OutlinerFilter {
    fn default() -> Self {
        Self {
            filter_text: String::new(),
            use_filter_complete: false,
            use_filter_case_sensitive: false,
            use_filter_children: true,
            use_filter_collection: true,
            use_filter_object_mesh: true,
            use_filter_object_empty: true,
            use_filter_object_others: true,
            use_filter_object_content: true,
            show_restrict_column_hide: true,
            show_restrict_column_viewport: false,
            show_restrict_column_select: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlinerSettings {
    #[serde(default)]
    pub display_mode: OutlinerDisplayMode,
    #[serde(default)]
    pub filter: OutlinerFilter,
    #[serde(default)]
    pub use_sort_alpha: bool,
}

/// State captured when a workspace enters outliner group mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupModeSnapshot {
    pub scene: SceneId,
    pub outliner: OutlinerSettings,
    pub scene_group: SceneGroupSettings,
    pub empty_visibility: Vec<(ObjectId, Visibility)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    #[serde(default)]
    pub outliner: OutlinerSettings,
    #[serde(rename = "outliner_group_mode_toggle", default)]
    pub group_mode: Option<GroupModeSnapshot>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outliner: OutlinerSettings::default(),
            group_mode: None,
        }
    }
}
