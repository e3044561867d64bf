//! The in-process host document: every object, mesh, collection and scene
//!
//! The document is persisted as JSON and stands in for the host's native
//! file format. Id maps are serialized as plain arrays keyed by each item's
//! own `id` field.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collection::{Collection, CollectionId};
use crate::error::{CoreError, CoreResult};
use crate::object::{Mesh, MeshId, Object, ObjectId, ObjectKind};
use crate::scene::{Scene, SceneId};
use crate::workspace::{ViewState, Window, Workspace};

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid document: {0}")]
    Invalid(String),
}

/// Integration name required to prune decal backups
pub const ADDON_DECALS: &str = "decal_machine";
/// Integration name required to prune stash objects
pub const ADDON_STASHES: &str = "mesh_machine";

/// Items stored in id-keyed maps
pub trait Keyed {
    type Key: Ord + Copy;
    fn key(&self) -> Self::Key;
}

impl Keyed for Object {
    type Key = ObjectId;
    fn key(&self) -> ObjectId {
        self.id
    }
}

impl Keyed for Collection {
    type Key = CollectionId;
    fn key(&self) -> CollectionId {
        self.id
    }
}

impl Keyed for Scene {
    type Key = SceneId;
    fn key(&self) -> SceneId {
        self.id
    }
}

impl Keyed for Mesh {
    type Key = MeshId;
    fn key(&self) -> MeshId {
        self.id
    }
}

mod id_map {
    use super::Keyed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, s: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        s.collect_seq(map.values())
    }

    pub fn deserialize<'de, V, D>(d: D) -> Result<BTreeMap<V::Key, V>, D::Error>
    where
        V: Deserialize<'de> + Keyed,
        D: Deserializer<'de>,
    {
        let values = Vec::<V>::deserialize(d)?;
        Ok(values.into_iter().map(|v| (v.key(), v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    next_id: u64,
    #[serde(with = "id_map")]
    pub objects: BTreeMap<ObjectId, Object>,
    #[serde(with = "id_map")]
    pub meshes: BTreeMap<MeshId, Mesh>,
    #[serde(with = "id_map")]
    pub collections: BTreeMap<CollectionId, Collection>,
    #[serde(with = "id_map")]
    pub scenes: BTreeMap<SceneId, Scene>,
    pub window: Window,
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub active_workspace: usize,
    /// Companion integrations available in the host
    #[serde(default)]
    pub addons: BTreeSet<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick a name not accepted by `taken`, appending `.001`, `.002`, ...
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let stem = strip_numeric_suffix(base);
    (1..)
        .map(|n| format!("{}.{:03}", stem, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// `Name.012` -> `Name`
pub fn strip_numeric_suffix(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, digits))
            if !stem.is_empty() && digits.len() == 3 && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            stem
        }
        _ => name,
    }
}

/// Vertices of an axis-aligned cube centered on the origin
pub fn cube_vertices(size: f64) -> Vec<DVec3> {
    let h = size * 0.5;
    let mut verts = Vec::with_capacity(8);
    for &z in &[-h, h] {
        for &y in &[-h, h] {
            for &x in &[-h, h] {
                verts.push(DVec3::new(x, y, z));
            }
        }
    }
    verts
}

impl Document {
    /// Create a document with one scene, its "Collection" child and a window
    pub fn new() -> Self {
        let mut doc = Self {
            next_id: 1,
            objects: BTreeMap::new(),
            meshes: BTreeMap::new(),
            collections: BTreeMap::new(),
            scenes: BTreeMap::new(),
            window: Window {
                scene: SceneId(0),
                view: ViewState::default(),
            },
            workspaces: vec![Workspace::new("Layout")],
            active_workspace: 0,
            addons: BTreeSet::new(),
        };
        let scene = doc.new_scene("Scene");
        let master = doc.scenes[&scene].master_collection;
        let col = doc.new_collection("Collection");
        // fresh ids, cannot cycle
        let _ = doc.link_child_collection(master, col);
        if let Some(s) = doc.scenes.get_mut(&scene) {
            s.active_collection = Some(col);
        }
        doc.window.scene = scene;
        doc
    }

    pub(crate) fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // -- lookup --

    pub fn object(&self, id: ObjectId) -> CoreResult<&Object> {
        self.objects
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("object {}", id)))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> CoreResult<&mut Object> {
        self.objects
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("object {}", id)))
    }

    pub fn collection(&self, id: CollectionId) -> CoreResult<&Collection> {
        self.collections
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("collection {}", id)))
    }

    pub fn collection_mut(&mut self, id: CollectionId) -> CoreResult<&mut Collection> {
        self.collections
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("collection {}", id)))
    }

    pub fn scene(&self, id: SceneId) -> CoreResult<&Scene> {
        self.scenes
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("scene {}", id)))
    }

    pub fn scene_mut(&mut self, id: SceneId) -> CoreResult<&mut Scene> {
        self.scenes
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("scene {}", id)))
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(&id)
    }

    /// Scene shown in the window
    pub fn active_scene(&self) -> SceneId {
        self.window.scene
    }

    pub fn find_collection(&self, name: &str) -> Option<CollectionId> {
        self.collections
            .values()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    pub fn find_scene(&self, name: &str) -> Option<SceneId> {
        self.scenes.values().find(|s| s.name == name).map(|s| s.id)
    }

    pub fn has_addon(&self, name: &str) -> bool {
        self.addons.contains(name)
    }

    pub fn active_workspace_mut(&mut self) -> CoreResult<&mut Workspace> {
        let idx = self.active_workspace;
        self.workspaces
            .get_mut(idx)
            .ok_or_else(|| CoreError::not_found(format!("workspace #{}", idx)))
    }

    // -- creation --

    pub fn unique_object_name(&self, base: &str) -> String {
        unique_name(base, |n| self.objects.values().any(|o| o.name == n))
    }

    pub fn unique_collection_name(&self, base: &str) -> String {
        unique_name(base, |n| self.collections.values().any(|c| c.name == n))
    }

    /// Create an object that is not linked into any collection yet
    pub fn new_object(&mut self, name: &str, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.alloc_id());
        let name = self.unique_object_name(name);
        self.objects.insert(id, Object::new(id, name, kind));
        id
    }

    pub fn new_mesh(&mut self, name: &str, vertices: Vec<DVec3>) -> MeshId {
        let id = MeshId(self.alloc_id());
        self.meshes.insert(
            id,
            Mesh {
                id,
                name: name.to_string(),
                vertices,
            },
        );
        id
    }

    /// Create an object and link it into `collection`
    pub fn add_object(
        &mut self,
        collection: CollectionId,
        name: &str,
        kind: ObjectKind,
        location: DVec3,
    ) -> CoreResult<ObjectId> {
        let id = self.new_object(name, kind);
        self.object_mut(id)?.location = location;
        self.link_object(collection, id)?;
        Ok(id)
    }

    /// Create a cube mesh object and link it into `collection`
    pub fn add_cube(
        &mut self,
        collection: CollectionId,
        name: &str,
        location: DVec3,
        size: f64,
    ) -> CoreResult<ObjectId> {
        let id = self.add_object(collection, name, ObjectKind::Mesh, location)?;
        let mesh = self.new_mesh(name, cube_vertices(size));
        self.object_mut(id)?.mesh = Some(mesh);
        Ok(id)
    }

    /// Rename an object, returning the unique name it actually got
    pub fn rename_object(&mut self, id: ObjectId, name: &str) -> CoreResult<String> {
        if self.object(id)?.name == name {
            return Ok(name.to_string());
        }
        let unique = unique_name(name, |n| {
            self.objects.values().any(|o| o.id != id && o.name == n)
        });
        self.object_mut(id)?.name = unique.clone();
        Ok(unique)
    }

    pub fn new_scene(&mut self, name: &str) -> SceneId {
        let master = self.new_collection(&format!("{} Collection", name));
        let id = SceneId(self.alloc_id());
        let name = unique_name(name, |n| self.scenes.values().any(|s| s.name == n));
        self.scenes.insert(id, Scene::new(id, name, master));
        id
    }

    /// New scene inheriting group settings, cursor and frame range of `template`
    pub fn new_scene_from(&mut self, name: &str, template: SceneId) -> CoreResult<SceneId> {
        let source = self.scene(template)?.clone();
        let id = self.new_scene(name);
        let scene = self.scene_mut(id)?;
        scene.group = source.group;
        scene.cursor = source.cursor;
        scene.frame_start = source.frame_start;
        scene.frame_end = source.frame_end;
        Ok(id)
    }

    // -- removal --

    /// Delete an object; its children keep their world transforms
    pub fn remove_object(&mut self, id: ObjectId) -> CoreResult<()> {
        let children = self.object(id)?.children.clone();
        for child in children {
            self.clear_parent(child, true)?;
        }
        if self.object(id)?.parent.is_some() {
            self.clear_parent(id, false)?;
        }
        for col in self.collections.values_mut() {
            col.objects.retain(|o| *o != id);
        }
        for obj in self.objects.values_mut() {
            for modifier in obj.modifiers.iter_mut() {
                if modifier.target() == Some(id) {
                    modifier.set_target(None);
                }
            }
        }
        for scene in self.scenes.values_mut() {
            if scene.active_object == Some(id) {
                scene.active_object = None;
            }
        }
        self.objects.remove(&id);
        debug!(object = %id, "Removed object");
        Ok(())
    }

    /// Delete a collection; its objects and child collections stay in the document
    pub fn remove_collection(&mut self, id: CollectionId) -> CoreResult<()> {
        self.collection(id)?;
        if self.scenes.values().any(|s| s.master_collection == id) {
            return Err(CoreError::illegal_selection(
                "a scene's master collection cannot be removed",
            ));
        }
        for col in self.collections.values_mut() {
            col.children.retain(|c| *c != id);
        }
        for scene in self.scenes.values_mut() {
            scene.view_layer.forget_collection(id);
            if scene.active_collection == Some(id) {
                scene.active_collection = None;
            }
        }
        for obj in self.objects.values_mut() {
            if obj.instance_collection == Some(id) {
                obj.instance_collection = None;
            }
        }
        self.collections.remove(&id);
        debug!(collection = %id, "Removed collection");
        Ok(())
    }

    /// Delete a scene and its master collection
    pub fn remove_scene(&mut self, id: SceneId) -> CoreResult<()> {
        if self.window.scene == id {
            return Err(CoreError::illegal_selection(
                "the scene shown in the window cannot be removed",
            ));
        }
        let master = self.scene(id)?.master_collection;
        self.scenes.remove(&id);
        if let Some(col) = self.collections.get_mut(&master) {
            col.children.clear();
            col.objects.clear();
        }
        self.remove_collection(master)?;
        Ok(())
    }

    pub fn mesh_users(&self, mesh: MeshId) -> usize {
        self.objects
            .values()
            .filter(|o| o.mesh == Some(mesh))
            .count()
    }

    /// Remove data-blocks without users.
    ///
    /// A non-recursive purge only removes what is orphaned when it starts, so a
    /// mesh orphaned by removing its last object survives until the next pass.
    pub fn purge_orphans(&mut self, recursive: bool) -> usize {
        let mut total = 0;
        loop {
            let orphan_objects: Vec<ObjectId> = self
                .objects
                .values()
                .filter(|o| !o.use_fake_user && o.parent.is_none())
                .filter(|o| !self.collections.values().any(|c| c.objects.contains(&o.id)))
                .map(|o| o.id)
                .collect();
            let orphan_meshes: Vec<MeshId> = self
                .meshes
                .keys()
                .copied()
                .filter(|m| self.mesh_users(*m) == 0)
                .collect();
            let orphan_collections: Vec<CollectionId> = self
                .collections
                .values()
                .filter(|c| !c.use_fake_user)
                .filter(|c| !self.scenes.values().any(|s| s.master_collection == c.id))
                .filter(|c| {
                    !self
                        .scenes
                        .values()
                        .any(|s| s.rigidbody_world.as_ref().map(|w| w.collection) == Some(c.id))
                })
                .filter(|c| !self.collections.values().any(|p| p.children.contains(&c.id)))
                .filter(|c| !self.objects.values().any(|o| o.instance_collection == Some(c.id)))
                .map(|c| c.id)
                .collect();

            let mut removed = 0;
            for id in orphan_objects {
                match self.remove_object(id) {
                    Ok(()) => removed += 1,
                    Err(err) => warn!(object = %id, error = %err, "Could not purge orphan object"),
                }
            }
            for id in orphan_meshes {
                if self.meshes.remove(&id).is_some() {
                    removed += 1;
                }
            }
            for id in orphan_collections {
                match self.remove_collection(id) {
                    Ok(()) => removed += 1,
                    Err(err) => warn!(collection = %id, error = %err, "Could not purge orphan collection"),
                }
            }
            total += removed;
            if !recursive || removed == 0 {
                break;
            }
        }
        if total > 0 {
            info!(removed = total, recursive, "Purged orphan data");
        }
        total
    }

    // -- persistence --

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let doc: Document = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        let doc = Self::from_json(&content)?;
        info!(path = %path.display(), objects = doc.objects.len(), "Loaded document");
        Ok(doc)
    }

    /// Load a document or create a fresh one if the file doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self, DocumentError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let content = self.to_json()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), DocumentError> {
        if !self.scenes.contains_key(&self.window.scene) {
            return Err(DocumentError::Invalid(format!(
                "window shows unknown scene {}",
                self.window.scene
            )));
        }
        let max_id = self
            .objects
            .keys()
            .map(|k| k.0)
            .chain(self.collections.keys().map(|k| k.0))
            .chain(self.scenes.keys().map(|k| k.0))
            .chain(self.meshes.keys().map(|k| k.0))
            .max()
            .unwrap_or(0);
        if max_id >= self.next_id {
            return Err(DocumentError::Invalid(format!(
                "id counter {} is behind id {}",
                self.next_id, max_id
            )));
        }
        for obj in self.objects.values() {
            if let Some(parent) = obj.parent {
                if !self.objects.contains_key(&parent) {
                    return Err(DocumentError::Invalid(format!(
                        "object '{}' has unknown parent {}",
                        obj.name, parent
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unique_name() {
        let taken = ["Cube", "Cube.001"];
        assert_eq!(unique_name("Sphere", |n| taken.contains(&n)), "Sphere");
        assert_eq!(unique_name("Cube", |n| taken.contains(&n)), "Cube.002");
        assert_eq!(unique_name("Cube.001", |n| taken.contains(&n)), "Cube.002");
    }

    #[test]
    fn test_strip_numeric_suffix() {
        assert_eq!(strip_numeric_suffix("Cube.004"), "Cube");
        assert_eq!(strip_numeric_suffix("Cube.4"), "Cube.4");
        assert_eq!(strip_numeric_suffix(".001"), ".001");
    }

    #[test]
    fn test_new_document_layout() {
        let doc = Document::new();
        let scene = doc.scene(doc.active_scene()).unwrap();
        let master = doc.collection(scene.master_collection).unwrap();
        assert_eq!(master.children.len(), 1);
        assert_eq!(scene.current_collection(), master.children[0]);
    }

    #[test]
    fn test_object_names_are_unique() {
        let mut doc = Document::new();
        let col = doc.scene(doc.active_scene()).unwrap().current_collection();
        let a = doc.add_cube(col, "Cube", DVec3::ZERO, 1.0).unwrap();
        let b = doc.add_cube(col, "Cube", DVec3::ZERO, 1.0).unwrap();
        assert_eq!(doc.object(a).unwrap().name, "Cube");
        assert_eq!(doc.object(b).unwrap().name, "Cube.001");
        assert_eq!(doc.rename_object(b, "Cube").unwrap(), "Cube.002");
    }

    #[test]
    fn test_remove_object_keeps_children_world() {
        let mut doc = Document::new();
        let col = doc.scene(doc.active_scene()).unwrap().current_collection();
        let parent = doc.add_object(col, "P", ObjectKind::Empty, DVec3::new(1.0, 0.0, 0.0)).unwrap();
        let child = doc.add_cube(col, "C", DVec3::new(3.0, 0.0, 0.0), 1.0).unwrap();
        doc.set_parent(child, Some(parent), true).unwrap();
        doc.remove_object(parent).unwrap();
        assert!(doc.object(child).unwrap().parent.is_none());
        assert!(doc.object(child).unwrap().location.abs_diff_eq(DVec3::new(3.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_purge_non_recursive() {
        let mut doc = Document::new();
        let orphan = doc.new_object("Orphan", ObjectKind::Mesh);
        let mesh = doc.new_mesh("OrphanMesh", cube_vertices(1.0));
        doc.object_mut(orphan).unwrap().mesh = Some(mesh);

        assert_eq!(doc.purge_orphans(false), 1);
        assert!(doc.meshes.contains_key(&mesh));
        assert_eq!(doc.purge_orphans(false), 1);
        assert!(doc.meshes.is_empty());
    }

    #[test]
    fn test_purge_counts_only_removed_data() {
        let mut doc = Document::new();
        let col = doc.scene(doc.active_scene()).unwrap().current_collection();
        let orphan = doc.new_object("Orphan", ObjectKind::Empty);
        let linked = doc.add_cube(col, "Linked", DVec3::ZERO, 1.0).unwrap();
        doc.set_parent(linked, Some(orphan), true).unwrap();
        doc.object_mut(linked).unwrap().library = Some("parts.blend".to_string());

        // a linked child cannot be unparented, so the orphan stays
        assert_eq!(doc.purge_orphans(true), 0);
        assert!(doc.objects.contains_key(&orphan));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let mut doc = Document::new();
        let col = doc.scene(doc.active_scene()).unwrap().current_collection();
        doc.add_cube(col, "Cube", DVec3::new(1.0, 2.0, 3.0), 2.0).unwrap();
        doc.save(&path).unwrap();

        let loaded = Document::from_file(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_load_or_create_missing() {
        let dir = tempdir().unwrap();
        let doc = Document::load_or_create(&dir.path().join("missing.json")).unwrap();
        assert_eq!(doc.scenes.len(), 1);
    }
}
