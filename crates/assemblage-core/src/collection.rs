//! Collections and the collection adapter
//!
//! A collection may be linked under several parents, so the same collection
//! can show up at more than one layer-collection path of a scene. Scene-level
//! queries therefore walk paths, not collections.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::scene::SceneId;
use crate::tags::Tags;

/// Unique identifier of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub u64);

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CO{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColorTag {
    #[default]
    None,
    Color01,
    Color02,
    Color03,
    Color04,
    Color05,
    Color06,
    Color07,
    Color08,
}

impl ColorTag {
    const PALETTE: [ColorTag; 8] = [
        ColorTag::Color01,
        ColorTag::Color02,
        ColorTag::Color03,
        ColorTag::Color04,
        ColorTag::Color05,
        ColorTag::Color06,
        ColorTag::Color07,
        ColorTag::Color08,
    ];

    /// Stable color for a name, so repeated packaging picks the same tag
    pub fn for_name(name: &str) -> Self {
        let hash = name
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        Self::PALETTE[(hash % 8) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    #[serde(default)]
    pub objects: Vec<ObjectId>,
    #[serde(default)]
    pub children: Vec<CollectionId>,
    #[serde(default)]
    pub instance_offset: DVec3,
    #[serde(default)]
    pub hide_viewport: bool,
    #[serde(default)]
    pub hide_select: bool,
    #[serde(default)]
    pub hide_render: bool,
    #[serde(default)]
    pub color_tag: ColorTag,
    #[serde(default)]
    pub is_asset_collection: bool,
    /// Path of the library this collection is linked from
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub use_fake_user: bool,
    #[serde(default)]
    pub tags: Tags,
}

impl Collection {
    pub fn new(id: CollectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            objects: Vec::new(),
            children: Vec::new(),
            instance_offset: DVec3::ZERO,
            hide_viewport: false,
            hide_select: false,
            hide_render: false,
            color_tag: ColorTag::None,
            is_asset_collection: false,
            library: None,
            use_fake_user: false,
            tags: Tags::new(),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.library.is_some()
    }
}

/// How a collection appears in a scene's view layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SceneCollectionInfo {
    /// Every layer-collection path this collection appears at
    pub layer_collections: Vec<Vec<CollectionId>>,
    /// Excluded at every path
    pub excluded: bool,
    /// Hidden at every path
    pub hidden: bool,
    /// Visible at one path at least
    pub visible: bool,
}

/// Result of a recursive collection duplicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDuplicate {
    pub collection: CollectionId,
    pub objects: BTreeMap<ObjectId, ObjectId>,
    pub collections: BTreeMap<CollectionId, CollectionId>,
}

impl Document {
    pub fn new_collection(&mut self, name: &str) -> CollectionId {
        let id = CollectionId(self.alloc_id());
        let name = self.unique_collection_name(name);
        self.collections.insert(id, Collection::new(id, name));
        id
    }

    fn ensure_local(&self, id: CollectionId) -> CoreResult<()> {
        let col = self.collection(id)?;
        if col.is_linked() {
            return Err(CoreError::LinkedAsset(format!(
                "collection '{}' is linked from a library",
                col.name
            )));
        }
        Ok(())
    }

    /// Whether `target` is `root` or a descendant of it
    pub fn collection_contains(&self, root: CollectionId, target: CollectionId) -> bool {
        let mut stack = vec![root];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(col) = self.collections.get(&id) {
                stack.extend(col.children.iter().copied());
            }
        }
        false
    }

    pub fn link_child_collection(&mut self, parent: CollectionId, child: CollectionId) -> CoreResult<()> {
        self.ensure_local(parent)?;
        self.collection(child)?;
        if self.collection_contains(child, parent) {
            return Err(CoreError::illegal_selection(format!(
                "linking {} under {} would create a cycle",
                child, parent
            )));
        }
        let col = self.collection_mut(parent)?;
        if !col.children.contains(&child) {
            col.children.push(child);
        }
        Ok(())
    }

    pub fn unlink_child_collection(&mut self, parent: CollectionId, child: CollectionId) -> CoreResult<()> {
        self.ensure_local(parent)?;
        self.collection_mut(parent)?.children.retain(|c| *c != child);
        Ok(())
    }

    pub fn link_object(&mut self, collection: CollectionId, object: ObjectId) -> CoreResult<()> {
        self.ensure_local(collection)?;
        self.object(object)?;
        let col = self.collection_mut(collection)?;
        if !col.objects.contains(&object) {
            col.objects.push(object);
        }
        Ok(())
    }

    pub fn unlink_object(&mut self, collection: CollectionId, object: ObjectId) -> CoreResult<()> {
        self.ensure_local(collection)?;
        self.collection_mut(collection)?.objects.retain(|o| *o != object);
        Ok(())
    }

    /// Collections that directly contain `object`
    pub fn users_collection(&self, object: ObjectId) -> Vec<CollectionId> {
        self.collections
            .values()
            .filter(|c| c.objects.contains(&object))
            .map(|c| c.id)
            .collect()
    }

    /// Collections that list `collection` as a child
    pub fn collection_parents(&self, collection: CollectionId) -> Vec<CollectionId> {
        self.collections
            .values()
            .filter(|c| c.children.contains(&collection))
            .map(|c| c.id)
            .collect()
    }

    /// Objects instancing `collection`
    pub fn collection_users(&self, collection: CollectionId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.instance_collection == Some(collection))
            .map(|o| o.id)
            .collect()
    }

    /// Objects of `collection` and all of its child collections, each once
    pub fn all_objects(&self, collection: CollectionId) -> Vec<ObjectId> {
        let mut result = Vec::new();
        let mut seen_objects = BTreeSet::new();
        let mut seen_cols = BTreeSet::new();
        let mut stack = vec![collection];
        while let Some(id) = stack.pop() {
            if !seen_cols.insert(id) {
                continue;
            }
            let Some(col) = self.collections.get(&id) else {
                continue;
            };
            for obj in &col.objects {
                if seen_objects.insert(*obj) {
                    result.push(*obj);
                }
            }
            stack.extend(col.children.iter().rev().copied());
        }
        result
    }

    /// Every layer-collection path of a scene in depth-first order
    pub fn layer_collection_paths(&self, scene: SceneId) -> CoreResult<Vec<Vec<CollectionId>>> {
        let master = self.scene(scene)?.master_collection;
        let mut paths = Vec::new();
        let mut stack = vec![vec![master]];
        while let Some(path) = stack.pop() {
            let last = *path.last().unwrap_or(&master);
            if let Some(col) = self.collections.get(&last) {
                for child in col.children.iter().rev() {
                    // a cycle in the graph would repeat a node on the same path
                    if path.contains(child) {
                        continue;
                    }
                    let mut next = path.clone();
                    next.push(*child);
                    stack.push(next);
                }
            }
            paths.push(path);
        }
        Ok(paths)
    }

    /// Map every collection reachable in `scene` to its view-layer state
    pub fn scene_collections(&self, scene: SceneId) -> CoreResult<BTreeMap<CollectionId, SceneCollectionInfo>> {
        let view_layer = &self.scene(scene)?.view_layer;
        let mut result: BTreeMap<CollectionId, SceneCollectionInfo> = BTreeMap::new();
        // excluded / hidden of the node itself, inherited downwards
        let mut node_state: BTreeMap<Vec<CollectionId>, (bool, bool)> = BTreeMap::new();

        for path in self.layer_collection_paths(scene)? {
            let Some(&id) = path.last() else { continue };
            let (exclude, hide_layer) = view_layer.flags(&path);
            let hide_col = self.collections.get(&id).map(|c| c.hide_viewport).unwrap_or(false);
            let (parent_excluded, parent_hidden) = if path.len() > 1 {
                node_state
                    .get(&path[..path.len() - 1])
                    .copied()
                    .unwrap_or((false, false))
            } else {
                (false, false)
            };
            let excluded = exclude || parent_excluded;
            let hidden = hide_layer || hide_col || parent_hidden;
            node_state.insert(path.clone(), (excluded, hidden));

            let info = result.entry(id).or_insert_with(|| SceneCollectionInfo {
                layer_collections: Vec::new(),
                excluded: true,
                hidden: true,
                visible: false,
            });
            info.layer_collections.push(path);
            info.excluded &= excluded;
            info.hidden &= hidden;
            info.visible |= !excluded && !hidden;
        }
        Ok(result)
    }

    /// Set view-layer flags of `collection` at every path it appears at in `scene`
    pub fn set_collection_visibility(
        &mut self,
        scene: SceneId,
        collection: CollectionId,
        exclude: Option<bool>,
        hide_viewport: Option<bool>,
    ) -> CoreResult<()> {
        let paths: Vec<Vec<CollectionId>> = self
            .layer_collection_paths(scene)?
            .into_iter()
            .filter(|p| p.last() == Some(&collection))
            .collect();
        if paths.is_empty() {
            return Err(CoreError::not_found(format!(
                "collection {} is not part of scene {}",
                collection, scene
            )));
        }
        let view_layer = &mut self.scene_mut(scene)?.view_layer;
        for path in paths {
            view_layer.set_flags(&path, exclude, hide_viewport);
        }
        Ok(())
    }

    /// Objects reachable from the scene's master collection, each once
    pub fn scene_objects(&self, scene: SceneId) -> CoreResult<Vec<ObjectId>> {
        Ok(self.all_objects(self.scene(scene)?.master_collection))
    }

    /// Duplicate a collection, optionally with all child collections.
    ///
    /// Objects shared between collections of the source map to one duplicate.
    /// A cycle in the source maps to the same cycle in the duplicate.
    pub fn duplicate_collection(&mut self, source: CollectionId, recursive: bool) -> CoreResult<CollectionDuplicate> {
        self.collection(source)?;
        let mut collections: BTreeMap<CollectionId, CollectionId> = BTreeMap::new();
        let mut order = Vec::new();
        let mut stack = vec![source];

        while let Some(orig) = stack.pop() {
            if collections.contains_key(&orig) {
                continue;
            }
            let original = self.collection(orig)?.clone();
            let dup = self.new_collection(&original.name);
            let col = self.collection_mut(dup)?;
            col.instance_offset = original.instance_offset;
            col.hide_viewport = original.hide_viewport;
            col.hide_select = original.hide_select;
            col.hide_render = original.hide_render;
            col.color_tag = original.color_tag;
            col.tags = original.tags.clone();
            collections.insert(orig, dup);
            order.push(orig);
            if recursive {
                stack.extend(original.children.iter().rev().copied());
            }
        }

        let source_objects: Vec<ObjectId> = if recursive {
            self.all_objects(source)
        } else {
            self.collection(source)?.objects.clone()
        };
        let objects = self.duplicate_objects(&source_objects, false, false)?;

        for orig in order {
            let original = self.collection(orig)?.clone();
            let dup = collections[&orig];
            let dup_objects: Vec<ObjectId> = original
                .objects
                .iter()
                .filter_map(|o| objects.get(o).copied())
                .collect();
            let dup_children: Vec<CollectionId> = if recursive {
                original
                    .children
                    .iter()
                    .filter_map(|c| collections.get(c).copied())
                    .collect()
            } else {
                original.children.clone()
            };
            let col = self.collection_mut(dup)?;
            col.objects = dup_objects;
            col.children = dup_children;
        }

        debug!(
            source = %source,
            collections = collections.len(),
            objects = objects.len(),
            "Duplicated collection"
        );
        Ok(CollectionDuplicate {
            collection: collections[&source],
            objects,
            collections,
        })
    }
}
