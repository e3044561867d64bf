//! Scenes, view layers and scene-level group settings

use glam::DMat4;
use serde::{Deserialize, Serialize};

use crate::collection::CollectionId;
use crate::object::ObjectId;
use crate::tags::Tags;

/// Unique identifier of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(pub u64);

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SC{}", self.0)
    }
}

/// Flags of one layer-collection node, addressed by its path from the
/// scene's master collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCollectionState {
    pub path: Vec<CollectionId>,
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub hide_viewport: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewLayer {
    pub name: String,
    /// Only nodes with non-default flags are stored
    #[serde(default)]
    pub layer_collections: Vec<LayerCollectionState>,
}

impl ViewLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer_collections: Vec::new(),
        }
    }

    /// `(exclude, hide_viewport)` of the node at `path`
    pub fn flags(&self, path: &[CollectionId]) -> (bool, bool) {
        self.layer_collections
            .iter()
            .find(|lc| lc.path == path)
            .map(|lc| (lc.exclude, lc.hide_viewport))
            .unwrap_or((false, false))
    }

    pub fn set_flags(&mut self, path: &[CollectionId], exclude: Option<bool>, hide_viewport: Option<bool>) {
        let idx = match self.layer_collections.iter().position(|lc| lc.path == path) {
            Some(idx) => idx,
            None => {
                self.layer_collections.push(LayerCollectionState {
                    path: path.to_vec(),
                    exclude: false,
                    hide_viewport: false,
                });
                self.layer_collections.len() - 1
            }
        };
        let node = &mut self.layer_collections[idx];
        if let Some(exclude) = exclude {
            node.exclude = exclude;
        }
        if let Some(hide) = hide_viewport {
            node.hide_viewport = hide;
        }
        if !node.exclude && !node.hide_viewport {
            self.layer_collections.remove(idx);
        }
    }

    /// Drop every node whose path passes through `collection`
    pub fn forget_collection(&mut self, collection: CollectionId) {
        self.layer_collections
            .retain(|lc| !lc.path.contains(&collection));
    }
}

/// Scene-wide group display and selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneGroupSettings {
    #[serde(default = "default_true")]
    pub group_select: bool,
    #[serde(default = "default_true")]
    pub group_recursive_select: bool,
    #[serde(default = "default_true")]
    pub group_hide: bool,
    #[serde(default)]
    pub show_group_gizmos: bool,
    /// Global multiplier applied to every empty's `group_gizmo_size`
    #[serde(default = "default_gizmo_size")]
    pub group_gizmo_size: f64,
    #[serde(default)]
    pub draw_group_relations: bool,
    #[serde(default)]
    pub draw_group_relations_active_only: bool,
    #[serde(default)]
    pub draw_group_relations_objects: bool,
    #[serde(default)]
    pub group_origin_mode: bool,
}

impl Default for SceneGroupSettings {
    fn default() -> Self {
        Self {
            group_select: true,
            group_recursive_select: true,
            group_hide: true,
            show_group_gizmos: false,
            group_gizmo_size: default_gizmo_size(),
            draw_group_relations: false,
            draw_group_relations_active_only: false,
            draw_group_relations_objects: false,
            group_origin_mode: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_gizmo_size() -> f64 {
    1.0
}

/// Marks a scene created to edit an assembly collection in place
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssemblyEditState {
    #[serde(rename = "assembly_edit_collection")]
    pub collection: CollectionId,
    #[serde(rename = "assembly_edit_init_scene")]
    pub init_scene: SceneId,
    /// Instancer world matrix composed with the inverse instance offset
    #[serde(rename = "assembly_edit_delta_view_mx")]
    pub delta_view_mx: DMat4,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyWorld {
    pub collection: CollectionId,
    pub frame_start: i32,
    pub frame_end: i32,
    /// Point cache must be re-baked before playback matches the scene
    #[serde(default)]
    pub needs_bake: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    pub master_collection: CollectionId,
    pub view_layer: ViewLayer,
    #[serde(default = "default_cursor")]
    pub cursor: DMat4,
    #[serde(default)]
    pub active_object: Option<ObjectId>,
    /// Collection new objects are linked into
    #[serde(default)]
    pub active_collection: Option<CollectionId>,
    #[serde(default)]
    pub group: SceneGroupSettings,
    #[serde(default)]
    pub assembly_edit: Option<AssemblyEditState>,
    #[serde(default)]
    pub rigidbody_world: Option<RigidBodyWorld>,
    #[serde(default = "default_frame_start")]
    pub frame_start: i32,
    #[serde(default = "default_frame_end")]
    pub frame_end: i32,
    #[serde(default)]
    pub tags: Tags,
}

fn default_cursor() -> DMat4 {
    DMat4::IDENTITY
}

fn default_frame_start() -> i32 {
    1
}

fn default_frame_end() -> i32 {
    250
}

impl Scene {
    pub fn new(id: SceneId, name: impl Into<String>, master_collection: CollectionId) -> Self {
        Self {
            id,
            name: name.into(),
            master_collection,
            view_layer: ViewLayer::new("ViewLayer"),
            cursor: default_cursor(),
            active_object: None,
            active_collection: None,
            group: SceneGroupSettings::default(),
            assembly_edit: None,
            rigidbody_world: None,
            frame_start: default_frame_start(),
            frame_end: default_frame_end(),
            tags: Tags::new(),
        }
    }

    pub fn is_assembly_edit_scene(&self) -> bool {
        self.assembly_edit.is_some()
    }

    /// Collection new objects go into
    pub fn current_collection(&self) -> CollectionId {
        self.active_collection.unwrap_or(self.master_collection)
    }
}
