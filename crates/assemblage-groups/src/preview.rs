//! Pose previews: ghost transforms of a group's descendants under a saved pose

use assemblage_core::math::try_inverse;
use assemblage_core::{CoreError, CoreResult, Document, MeshId, ObjectId};
use glam::{DMat4, DVec3};
use std::collections::HashMap;
use tracing::debug;

/// One descendant drawn at its transform under the previewed pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewItem<'a> {
    pub object: ObjectId,
    pub matrix: DMat4,
    /// Geometry to draw; empty for non-mesh objects
    pub vertices: &'a [DVec3],
}

/// Lazily yield the preview batch of pose `index` on `empty`.
///
/// Each descendant keeps its transform relative to the empty, which is moved
/// to the pose's local matrix under its current parent.
pub fn preview_batches<'a>(
    doc: &'a Document,
    empty: ObjectId,
    index: usize,
) -> CoreResult<impl Iterator<Item = PreviewItem<'a>> + 'a> {
    let obj = doc.object(empty)?;
    let pose = obj
        .group
        .group_pose_col
        .get(index)
        .ok_or_else(|| CoreError::not_found(format!("pose #{} on '{}'", index, obj.name)))?;
    let pose_world = doc.parent_world_matrix(empty) * pose.mx;
    let to_pose = pose_world * try_inverse(&doc.world_matrix(empty), "group world matrix")?;

    Ok(doc.get_children(empty, true).into_iter().filter_map(move |id| {
        let child = doc.objects.get(&id)?;
        let vertices = child
            .mesh
            .and_then(|m| doc.mesh(m))
            .map(|m| m.vertices.as_slice())
            .unwrap_or(&[]);
        Some(PreviewItem {
            object: id,
            matrix: to_pose * doc.world_matrix(id),
            vertices,
        })
    }))
}

/// Cached preview entry without geometry borrows
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPreview {
    pub object: ObjectId,
    pub matrix: DMat4,
    pub mesh: Option<MeshId>,
}

/// Preview batches keyed by (empty, pose index).
///
/// A batch is recomputed when missing or when its pose carries
/// `forced_preview_update`, which is cleared afterwards.
#[derive(Debug, Default)]
pub struct PreviewCache {
    entries: HashMap<(ObjectId, usize), Vec<CachedPreview>>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, doc: &mut Document, empty: ObjectId, index: usize) -> CoreResult<&[CachedPreview]> {
        let forced = doc
            .object(empty)?
            .group
            .group_pose_col
            .get(index)
            .map(|p| p.forced_preview_update)
            .unwrap_or(false);
        let key = (empty, index);
        if forced || !self.entries.contains_key(&key) {
            let batch: Vec<CachedPreview> = preview_batches(doc, empty, index)?
                .map(|item| CachedPreview {
                    object: item.object,
                    matrix: item.matrix,
                    mesh: doc.objects.get(&item.object).and_then(|o| o.mesh),
                })
                .collect();
            debug!(empty = %empty, index, items = batch.len(), "Computed pose preview");
            self.entries.insert(key, batch);
            if let Some(pose) = doc.object_mut(empty)?.group.group_pose_col.get_mut(index) {
                pose.forced_preview_update = false;
            }
        }
        Ok(self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
