//! Object registry adapter: parenting, transforms, visibility, selection
//!
//! An object's location, rotation and scale are expressed in its parent
//! space, `parent_world * matrix_parent_inverse`. The parent inverse stays
//! identity unless a parent with non-uniform scale would shear the child; that
//! residual is stored there so keeping the world transform is exact.

use glam::DMat4;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::math::{
    approx_eq, decompose, is_invertible, local_from_world, trs_matrix, try_inverse, Aabb, TRANSFORM_EPSILON,
};
use crate::object::{ObjectId, Visibility};
use crate::scene::SceneId;
use crate::tags::TagValue;

/// Effective visibility of an object in one scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityState {
    /// Drawn in the viewport
    pub visible: bool,
    pub hide: bool,
    pub hide_viewport: bool,
    /// Every collection holding the object is excluded (or it is in none)
    pub excluded: bool,
    /// Some collection holding the object is visible in the view layer
    pub layer_visible: bool,
}

impl Document {
    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.objects.values().find(|o| o.name == name).map(|o| o.id)
    }

    pub fn get_parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(&id).and_then(|o| o.parent)
    }

    /// Children in order; recursive walks are depth-first pre-order
    pub fn get_children(&self, id: ObjectId, recursive: bool) -> Vec<ObjectId> {
        let Some(obj) = self.objects.get(&id) else {
            return Vec::new();
        };
        if !recursive {
            return obj.children.clone();
        }
        let mut result = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut stack: Vec<ObjectId> = obj.children.iter().rev().copied().collect();
        while let Some(child) = stack.pop() {
            if !seen.insert(child) {
                continue;
            }
            result.push(child);
            if let Some(c) = self.objects.get(&child) {
                stack.extend(c.children.iter().rev().copied());
            }
        }
        result
    }

    pub fn local_matrix(&self, id: ObjectId) -> CoreResult<DMat4> {
        Ok(self.object(id)?.local_matrix())
    }

    pub fn set_local_matrix(&mut self, id: ObjectId, matrix: &DMat4) -> CoreResult<()> {
        let (location, rotation, scale) = decompose(matrix);
        let obj = self.object_mut(id)?;
        obj.location = location;
        obj.rotation = rotation;
        obj.scale = scale;
        Ok(())
    }

    /// World matrix; a parent cycle stops the walk at the first repeat
    pub fn world_matrix(&self, id: ObjectId) -> DMat4 {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            if !seen.insert(cid) {
                break;
            }
            let Some(obj) = self.objects.get(&cid) else {
                break;
            };
            chain.push(obj.parent_relative_matrix());
            current = obj.parent;
        }
        chain
            .iter()
            .rev()
            .fold(DMat4::IDENTITY, |world, local| world * *local)
    }

    /// Space the object's location, rotation and scale are expressed in
    pub fn parent_world_matrix(&self, id: ObjectId) -> DMat4 {
        match self.objects.get(&id) {
            Some(obj) => match obj.parent {
                Some(p) => self.world_matrix(p) * obj.matrix_parent_inverse,
                None => DMat4::IDENTITY,
            },
            None => DMat4::IDENTITY,
        }
    }

    pub fn set_world_matrix(&mut self, id: ObjectId, world: &DMat4) -> CoreResult<()> {
        let local = local_from_world(&self.parent_world_matrix(id), world)?;
        let basis = trs_matrix(&local);
        if let Some(parent) = self.get_parent(id) {
            // shear the parent space leaves over goes into the parent inverse
            if is_invertible(&basis) && !approx_eq(&basis, &local, TRANSFORM_EPSILON) {
                let inverse_parent = try_inverse(&self.world_matrix(parent), "parent world matrix")?;
                self.object_mut(id)?.matrix_parent_inverse = inverse_parent * *world * basis.inverse();
            }
        }
        self.set_local_matrix(id, &basis)
    }

    /// Whether `ancestor` is reachable from `id` through parents
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut seen = BTreeSet::new();
        let mut current = self.get_parent(id);
        while let Some(cid) = current {
            if cid == ancestor {
                return true;
            }
            if !seen.insert(cid) {
                return false;
            }
            current = self.get_parent(cid);
        }
        false
    }

    /// Parent `child` to `parent`, or to the scene root with `None`
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>, keep_world: bool) -> CoreResult<()> {
        let obj = self.object(child)?;
        if obj.is_linked() {
            return Err(CoreError::LinkedAsset(format!(
                "object '{}' is linked from a library",
                obj.name
            )));
        }
        if let Some(p) = parent {
            self.object(p)?;
            if p == child || self.is_ancestor(child, p) {
                return Err(CoreError::illegal_selection(format!(
                    "parenting {} to {} would create a cycle",
                    child, p
                )));
            }
        }
        if obj.parent == parent {
            return Ok(());
        }

        let world = self.world_matrix(child);
        if let Some(p) = parent {
            try_inverse(&self.world_matrix(p), "parent world matrix")?;
        }

        if let Some(old) = self.object(child)?.parent {
            if let Some(o) = self.objects.get_mut(&old) {
                o.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = parent {
            let po = self.object_mut(p)?;
            if !po.children.contains(&child) {
                po.children.push(child);
            }
        }
        {
            let obj = self.object_mut(child)?;
            obj.parent = parent;
            obj.matrix_parent_inverse = DMat4::IDENTITY;
        }
        if keep_world {
            self.set_world_matrix(child, &world)?;
        }
        debug!(child = %child, parent = ?parent, keep_world, "Reparented object");
        Ok(())
    }

    pub fn clear_parent(&mut self, child: ObjectId, keep_world: bool) -> CoreResult<()> {
        self.set_parent(child, None, keep_world)
    }

    // -- visibility --

    pub fn visibility(&self, scene: SceneId, id: ObjectId) -> CoreResult<VisibilityState> {
        let obj = self.object(id)?;
        let infos = self.scene_collections(scene)?;
        let holders: Vec<_> = self
            .users_collection(id)
            .into_iter()
            .filter_map(|c| infos.get(&c))
            .collect();
        let excluded = holders.iter().all(|i| i.excluded);
        let layer_visible = holders.iter().any(|i| i.visible);
        let hide = obj.visibility.hide;
        let hide_viewport = obj.visibility.hide_viewport;
        Ok(VisibilityState {
            visible: layer_visible && !hide && !hide_viewport,
            hide,
            hide_viewport,
            excluded,
            layer_visible,
        })
    }

    pub fn set_visibility(&mut self, id: ObjectId, hide: Option<bool>, hide_viewport: Option<bool>) -> CoreResult<()> {
        let vis = &mut self.object_mut(id)?.visibility;
        if let Some(hide) = hide {
            vis.hide = hide;
        }
        if let Some(hide_viewport) = hide_viewport {
            vis.hide_viewport = hide_viewport;
        }
        Ok(())
    }

    pub fn object_visibility(&self, id: ObjectId) -> CoreResult<Visibility> {
        Ok(self.object(id)?.visibility)
    }

    pub fn tag_get(&self, id: ObjectId, key: &str) -> Option<&TagValue> {
        self.objects.get(&id).and_then(|o| o.tag(key))
    }

    pub fn tag_set(&mut self, id: ObjectId, key: &str, value: impl Into<TagValue>) -> CoreResult<()> {
        self.object_mut(id)?.set_tag(key, value);
        Ok(())
    }

    // -- selection --

    pub fn select(&mut self, id: ObjectId, state: bool) -> CoreResult<()> {
        self.object_mut(id)?.selected = state;
        Ok(())
    }

    pub fn deselect_all(&mut self) {
        for obj in self.objects.values_mut() {
            obj.selected = false;
        }
    }

    pub fn set_active(&mut self, scene: SceneId, id: Option<ObjectId>) -> CoreResult<()> {
        if let Some(id) = id {
            self.object(id)?;
        }
        self.scene_mut(scene)?.active_object = id;
        Ok(())
    }

    pub fn active_object(&self, scene: SceneId) -> Option<ObjectId> {
        self.scenes.get(&scene).and_then(|s| s.active_object)
    }

    /// Selected objects of the scene, in scene order
    pub fn selected_objects(&self, scene: SceneId) -> CoreResult<Vec<ObjectId>> {
        Ok(self
            .scene_objects(scene)?
            .into_iter()
            .filter(|id| self.objects.get(id).map(|o| o.selected).unwrap_or(false))
            .collect())
    }

    // -- duplication --

    /// Duplicate objects the way the host's duplicate operator does.
    ///
    /// Parents and modifier targets inside the duplicated set are remapped to
    /// the duplicates. Mesh data is shared when `linked`, copied otherwise.
    /// With `link_collections` every duplicate joins its original's collections.
    pub fn duplicate_objects(
        &mut self,
        ids: &[ObjectId],
        linked: bool,
        link_collections: bool,
    ) -> CoreResult<BTreeMap<ObjectId, ObjectId>> {
        let mut map = BTreeMap::new();
        for &orig in ids {
            if map.contains_key(&orig) {
                continue;
            }
            let source = self.object(orig)?.clone();
            let dup = self.new_object(&source.name, source.kind);
            let mesh = match source.mesh {
                Some(mesh_id) if !linked => match self.mesh(mesh_id).cloned() {
                    Some(mesh) => Some(self.new_mesh(&mesh.name, mesh.vertices)),
                    None => None,
                },
                other => other,
            };
            let name = self.object(dup)?.name.clone();
            let mut copy = source.clone();
            copy.id = dup;
            copy.name = name;
            copy.mesh = mesh;
            copy.children = Vec::new();
            copy.use_fake_user = false;
            copy.library = None;
            self.objects.insert(dup, copy);
            map.insert(orig, dup);
        }

        for (&orig, &dup) in &map {
            let parent = self.object(orig)?.parent;
            let remapped = parent.map(|p| map.get(&p).copied().unwrap_or(p));
            let obj = self.object_mut(dup)?;
            obj.parent = remapped;
            for modifier in obj.modifiers.iter_mut() {
                if let Some(target) = modifier.target() {
                    if let Some(&t) = map.get(&target) {
                        modifier.set_target(Some(t));
                    }
                }
            }
            if let Some(p) = remapped {
                let po = self.object_mut(p)?;
                if !po.children.contains(&dup) {
                    po.children.push(dup);
                }
            }
        }

        if link_collections {
            for (&orig, &dup) in &map {
                for col in self.users_collection(orig) {
                    if self.collection(col)?.is_linked() {
                        continue;
                    }
                    self.link_object(col, dup)?;
                }
            }
        }
        debug!(count = map.len(), linked, "Duplicated objects");
        Ok(map)
    }

    /// World-space bounds of the objects' geometry, origins for non-mesh objects
    pub fn world_bounds(&self, ids: &[ObjectId]) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        for &id in ids {
            let Some(obj) = self.objects.get(&id) else {
                continue;
            };
            let world = self.world_matrix(id);
            let local = obj
                .mesh
                .and_then(|m| self.mesh(m))
                .and_then(|m| Aabb::from_points(m.vertices.iter().copied()));
            let b = match local {
                Some(aabb) => aabb.transformed(&world),
                None => Aabb::from_point(world.w_axis.truncate()),
            };
            bounds = Some(match bounds {
                Some(acc) => acc.union(&b),
                None => b,
            });
        }
        bounds
    }
}
