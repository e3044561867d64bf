//! Object types of the host scene graph

use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::collection::CollectionId;
use crate::math::compose;
use crate::pose::Pose;
use crate::tags::{TagValue, Tags};

/// Unique identifier of an object within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OB{}", self.0)
    }
}

/// Unique identifier of a mesh data-block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub u64);

/// Mesh data-block; only vertex positions matter to the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub id: MeshId,
    pub name: String,
    pub vertices: Vec<DVec3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Empty,
    Mesh,
    Curve,
    Camera,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDisplay {
    #[default]
    PlainAxes,
    Arrows,
    SingleArrow,
    Circle,
    Cube,
    Sphere,
    Cone,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    #[default]
    Textured,
    Solid,
    Wire,
    Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    #[default]
    None,
    Collection,
}

/// Per-object visibility flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Visibility {
    /// Hidden in the view layer
    pub hide: bool,
    /// Disabled in viewports
    pub hide_viewport: bool,
    pub hide_select: bool,
    pub hide_render: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModifierKind {
    Mirror {
        mirror_object: Option<ObjectId>,
        axes: [bool; 3],
    },
    Boolean {
        object: Option<ObjectId>,
    },
    Other {
        type_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    pub kind: ModifierKind,
    #[serde(default = "default_true")]
    pub show_viewport: bool,
}

impl Modifier {
    pub fn is_mirror(&self) -> bool {
        matches!(self.kind, ModifierKind::Mirror { .. })
    }

    /// Object referenced by this modifier, if any
    pub fn target(&self) -> Option<ObjectId> {
        match &self.kind {
            ModifierKind::Mirror { mirror_object, .. } => *mirror_object,
            ModifierKind::Boolean { object } => *object,
            ModifierKind::Other { .. } => None,
        }
    }

    pub fn set_target(&mut self, target: Option<ObjectId>) {
        match &mut self.kind {
            ModifierKind::Mirror { mirror_object, .. } => *mirror_object = target,
            ModifierKind::Boolean { object } => *object = target,
            ModifierKind::Other { .. } => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigidBodyKind {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    pub kind: RigidBodyKind,
    pub mass: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Asset browser metadata of an asset-marked object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetData {
    pub catalog_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub description: String,
}

/// Preview image, RGBA8 rows from the top
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Persistent framing helper of an assembly anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailHelper {
    #[serde(rename = "asset_thumbnail_helper_matrix")]
    pub matrix: DMat4,
    #[serde(rename = "asset_thumbnail_helper_location_offset")]
    pub location_offset: DVec3,
    #[serde(rename = "asset_thumbnail_helper_rotation")]
    pub rotation: DQuat,
}

/// Group tags of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProps {
    #[serde(default)]
    pub is_group_empty: bool,
    #[serde(default)]
    pub is_group_object: bool,
    #[serde(default)]
    pub is_group_anchor: bool,
    #[serde(default = "default_group_size")]
    pub group_size: f64,
    #[serde(default = "default_group_size")]
    pub group_gizmo_size: f64,
    #[serde(default = "default_true")]
    pub show_group_gizmo: bool,
    #[serde(default)]
    pub show_group_x_rotation: bool,
    #[serde(default)]
    pub show_group_y_rotation: bool,
    #[serde(default = "default_true")]
    pub show_group_z_rotation: bool,
    #[serde(default)]
    pub draw_active_group_pose: bool,
    #[serde(default = "default_pose_alpha")]
    pub group_pose_alpha: f64,
    #[serde(rename = "group_pose_COL", default)]
    pub group_pose_col: Vec<Pose>,
    #[serde(rename = "group_pose_IDX", default = "default_pose_idx")]
    pub group_pose_idx: i64,
}

impl Default for GroupProps {
    fn default() -> Self {
        Self {
            is_group_empty: false,
            is_group_object: false,
            is_group_anchor: false,
            group_size: default_group_size(),
            group_gizmo_size: default_group_size(),
            show_group_gizmo: true,
            show_group_x_rotation: false,
            show_group_y_rotation: false,
            show_group_z_rotation: true,
            draw_active_group_pose: false,
            group_pose_alpha: default_pose_alpha(),
            group_pose_col: Vec::new(),
            group_pose_idx: default_pose_idx(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_group_size() -> f64 {
    0.2
}

fn default_pose_alpha() -> f64 {
    0.5
}

fn default_pose_idx() -> i64 {
    -1
}

fn default_scale() -> DVec3 {
    DVec3::ONE
}

fn default_color() -> [f64; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_empty_size() -> f64 {
    1.0
}

fn default_parent_inverse() -> DMat4 {
    DMat4::IDENTITY
}

/// An object in the host scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub mesh: Option<MeshId>,
    #[serde(default)]
    pub location: DVec3,
    #[serde(default)]
    pub rotation: DQuat,
    #[serde(default = "default_scale")]
    pub scale: DVec3,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    /// Correction between the parent's world matrix and the space the
    /// location/rotation/scale are expressed in, set when parenting keeps the
    /// world transform
    #[serde(default = "default_parent_inverse")]
    pub matrix_parent_inverse: DMat4,
    #[serde(default)]
    pub children: Vec<ObjectId>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub display_type: DisplayType,
    #[serde(default)]
    pub empty_display_type: EmptyDisplay,
    #[serde(default = "default_empty_size")]
    pub empty_display_size: f64,
    #[serde(default)]
    pub instance_type: InstanceType,
    #[serde(default)]
    pub instance_collection: Option<CollectionId>,
    #[serde(default = "default_color")]
    pub color: [f64; 4],
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub rigid_body: Option<RigidBody>,
    /// Present when the object is marked as an asset
    #[serde(default)]
    pub asset: Option<AssetData>,
    #[serde(default)]
    pub asset_version: Option<String>,
    #[serde(default)]
    pub asset_thumbnail_helper: Option<ThumbnailHelper>,
    #[serde(default)]
    pub preview: Option<Thumbnail>,
    #[serde(default)]
    pub group: GroupProps,
    #[serde(default)]
    pub tags: Tags,
    /// Path of the library this object is linked from
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub use_fake_user: bool,
}

impl Object {
    pub fn new(id: ObjectId, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            mesh: None,
            location: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
            parent: None,
            matrix_parent_inverse: DMat4::IDENTITY,
            children: Vec::new(),
            visibility: Visibility::default(),
            selected: false,
            display_type: DisplayType::default(),
            empty_display_type: EmptyDisplay::default(),
            empty_display_size: default_empty_size(),
            instance_type: InstanceType::default(),
            instance_collection: None,
            color: default_color(),
            modifiers: Vec::new(),
            rigid_body: None,
            asset: None,
            asset_version: None,
            asset_thumbnail_helper: None,
            preview: None,
            group: GroupProps::default(),
            tags: Tags::new(),
            library: None,
            use_fake_user: false,
        }
    }

    /// Matrix of location, rotation and scale
    pub fn local_matrix(&self) -> DMat4 {
        compose(self.location, self.rotation, self.scale)
    }

    /// Matrix relative to the parent's world matrix
    pub fn parent_relative_matrix(&self) -> DMat4 {
        self.matrix_parent_inverse * self.local_matrix()
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ObjectKind::Empty
    }

    pub fn is_group_empty(&self) -> bool {
        self.kind == ObjectKind::Empty && self.group.is_group_empty
    }

    pub fn is_instancer(&self) -> bool {
        self.instance_type == InstanceType::Collection && self.instance_collection.is_some()
    }

    pub fn is_asset(&self) -> bool {
        self.asset.is_some()
    }

    pub fn is_linked(&self) -> bool {
        self.library.is_some()
    }

    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    pub fn tag_bool(&self, key: &str) -> bool {
        self.tags.get(key).and_then(TagValue::as_bool).unwrap_or(false)
    }

    pub fn set_tag(&mut self, key: &str, value: impl Into<TagValue>) {
        self.tags.insert(key.to_string(), value.into());
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<TagValue> {
        self.tags.remove(key)
    }
}
