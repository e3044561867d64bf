//! Pose store: saved local transforms of group empties
//!
//! Poses of one batch share a UUID across the empties of a hierarchy. Batch
//! operations walk the hierarchy once and match poses by UUID, optionally
//! reaching up to the top group and optionally including poses whose batch
//! link was cut.

use assemblage_core::document::{strip_numeric_suffix, unique_name};
use assemblage_core::math::{decompose, TRANSFORM_EPSILON};
use assemblage_core::{
    new_pose_uuid, CoreError, CoreResult, Document, GroupProps, ObjectId, Pose, PoseAxis, AUTO_POSE_NAME,
    INCEPTION_POSE,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::f64::consts::PI;
use std::fmt;
use tracing::{debug, info, warn};

use crate::hierarchy::{group_subtree, top_group};

/// Invariant violation found and repaired by `process_group_poses`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PoseIssue {
    /// A second Inception pose, renamed to an automatic name
    DuplicateInception { empty: String, index: usize },
    /// Missing or repeated UUID within one list, replaced by a fresh one
    DuplicateUuid { empty: String, index: usize },
    /// Pose sharing a batch UUID without being flagged as batch
    BatchMismatch { empty: String, index: usize },
    /// Selected pose index outside the list, clamped
    IndexOutOfRange { empty: String, index: i64 },
}

impl fmt::Display for PoseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateInception { empty, index } => {
                write!(f, "{}: pose #{} is a second Inception pose", empty, index)
            }
            Self::DuplicateUuid { empty, index } => {
                write!(f, "{}: pose #{} has a missing or repeated UUID", empty, index)
            }
            Self::BatchMismatch { empty, index } => {
                write!(f, "{}: pose #{} shares a batch UUID but is not a batch pose", empty, index)
            }
            Self::IndexOutOfRange { empty, index } => {
                write!(f, "{}: selected pose index {} is out of range", empty, index)
            }
        }
    }
}

impl From<&PoseIssue> for CoreError {
    fn from(issue: &PoseIssue) -> Self {
        CoreError::PoseValidation(issue.to_string())
    }
}

fn require_group_empty(doc: &Document, id: ObjectId) -> CoreResult<()> {
    let obj = doc.object(id)?;
    if !obj.is_group_empty() {
        return Err(CoreError::illegal_selection(format!("'{}' is not a group empty", obj.name)));
    }
    Ok(())
}

fn group_props_mut(doc: &mut Document, id: ObjectId) -> CoreResult<&mut GroupProps> {
    Ok(&mut doc.object_mut(id)?.group)
}

pub fn poses(doc: &Document, id: ObjectId) -> CoreResult<&[Pose]> {
    Ok(&doc.object(id)?.group.group_pose_col)
}

fn pose_at(doc: &Document, id: ObjectId, index: usize) -> CoreResult<&Pose> {
    let obj = doc.object(id)?;
    obj.group
        .group_pose_col
        .get(index)
        .ok_or_else(|| CoreError::not_found(format!("pose #{} on '{}'", index, obj.name)))
}

/// Root the pose reprocessing starts from
fn hierarchy_root(doc: &Document, id: ObjectId) -> ObjectId {
    top_group(doc, id).unwrap_or(id)
}

/// Empties a batch operation reaches: the subtree below `id`, or with `up`
/// the whole hierarchy of its top group
fn batch_scope(doc: &Document, id: ObjectId, up: bool) -> Vec<ObjectId> {
    let root = if up { hierarchy_root(doc, id) } else { id };
    group_subtree(doc, root).into_iter().map(|(e, _)| e).collect()
}

fn push_pose(doc: &mut Document, id: ObjectId, name: &str, uuid: &str, batch: bool) -> CoreResult<usize> {
    let mx = doc.local_matrix(id)?;
    let props = group_props_mut(doc, id)?;
    let index = props.group_pose_col.len();
    let mut pose = Pose::new(index, name, mx, uuid);
    pose.batch = batch;
    pose.batchlinked = batch;
    pose.forced_preview_update = true;
    props.group_pose_col.push(pose);
    props.group_pose_idx = index as i64;
    Ok(index)
}

/// Record the empty's current local matrix as a new pose and return its UUID
pub fn set_pose(
    doc: &mut Document,
    empty: ObjectId,
    name: Option<&str>,
    uuid: Option<&str>,
    batch: bool,
) -> CoreResult<String> {
    require_group_empty(doc, empty)?;
    let uuid = uuid.map(str::to_string).unwrap_or_else(new_pose_uuid);
    let index = push_pose(doc, empty, name.unwrap_or(AUTO_POSE_NAME), &uuid, batch)?;
    let root = hierarchy_root(doc, empty);
    process_group_poses(doc, root)?;
    info!(empty = %empty, index, batch, "Set group pose");
    Ok(uuid)
}

/// Record one batch pose on `root` and every group empty below it
pub fn set_batch_pose(doc: &mut Document, root: ObjectId, name: Option<&str>) -> CoreResult<String> {
    require_group_empty(doc, root)?;
    let uuid = new_pose_uuid();
    let empties = batch_scope(doc, root, false);
    for id in &empties {
        push_pose(doc, *id, name.unwrap_or(AUTO_POSE_NAME), &uuid, true)?;
    }
    let top = hierarchy_root(doc, root);
    process_group_poses(doc, top)?;
    info!(root = %root, empties = empties.len(), "Set batch pose");
    Ok(uuid)
}

/// Insert the Inception pose at the front of the list unless one exists
pub fn set_inception_pose(doc: &mut Document, empty: ObjectId) -> CoreResult<()> {
    require_group_empty(doc, empty)?;
    let mx = doc.local_matrix(empty)?;
    let props = group_props_mut(doc, empty)?;
    if props.group_pose_col.iter().any(Pose::is_inception) {
        return Ok(());
    }
    let mut pose = Pose::new(0, INCEPTION_POSE, mx, new_pose_uuid());
    pose.forced_preview_update = true;
    props.group_pose_col.insert(0, pose);
    props.group_pose_idx = if props.group_pose_idx < 0 { 0 } else { props.group_pose_idx + 1 };
    let root = hierarchy_root(doc, empty);
    process_group_poses(doc, root)?;
    Ok(())
}

/// Apply a saved pose to the empty.
///
/// With `keep_children_world` the direct children are compensated so that
/// nothing below the empty moves in world space.
pub fn retrieve_pose(doc: &mut Document, empty: ObjectId, index: usize, keep_children_world: bool) -> CoreResult<()> {
    require_group_empty(doc, empty)?;
    let mx = pose_at(doc, empty, index)?.mx;
    let worlds: Vec<_> = if keep_children_world {
        doc.get_children(empty, false)
            .into_iter()
            .map(|c| (c, doc.world_matrix(c)))
            .collect()
    } else {
        Vec::new()
    };
    doc.set_local_matrix(empty, &mx)?;
    for (child, world) in worlds {
        doc.set_world_matrix(child, &world)?;
    }
    group_props_mut(doc, empty)?.group_pose_idx = index as i64;
    debug!(empty = %empty, index, keep_children_world, "Retrieved group pose");
    Ok(())
}

fn refresh(pose: &mut Pose, mx: glam::DMat4) {
    pose.mx = mx;
    pose.clear_derivation();
    pose.forced_preview_update = true;
}

/// Write the empty's current local matrix back into a pose.
///
/// Batch-linked poses propagate to every pose with the same UUID in scope,
/// each taking its own empty's current local matrix. Returns the number of
/// poses written.
pub fn update_pose(
    doc: &mut Document,
    empty: ObjectId,
    index: usize,
    propagate_batch: bool,
    up: bool,
    unlinked: bool,
) -> CoreResult<usize> {
    require_group_empty(doc, empty)?;
    let source = pose_at(doc, empty, index)?.clone();
    let mx = doc.local_matrix(empty)?;
    {
        let list = &mut group_props_mut(doc, empty)?.group_pose_col;
        refresh(&mut list[index], mx);
        if source.is_inception() {
            list.iter_mut().for_each(Pose::clear_derivation);
        }
    }

    let mut updated = 1;
    if propagate_batch && source.batch && (source.batchlinked || unlinked) {
        for id in batch_scope(doc, empty, up) {
            if id == empty {
                continue;
            }
            let mx = doc.local_matrix(id)?;
            for pose in group_props_mut(doc, id)?.group_pose_col.iter_mut() {
                if pose.uuid == source.uuid && pose.batch && (pose.batchlinked || unlinked) {
                    refresh(pose, mx);
                    updated += 1;
                }
            }
        }
    }
    let root = hierarchy_root(doc, empty);
    process_group_poses(doc, root)?;
    info!(empty = %empty, index, updated, "Updated group pose");
    Ok(updated)
}

fn remove_pose_at(props: &mut GroupProps, index: usize) {
    if index >= props.group_pose_col.len() {
        return;
    }
    let removed = props.group_pose_col.remove(index);
    for (i, pose) in props.group_pose_col.iter_mut().enumerate() {
        pose.index = i;
    }
    if removed.is_inception() {
        props.group_pose_col.iter_mut().for_each(Pose::clear_derivation);
    }
    let len = props.group_pose_col.len() as i64;
    let idx = props.group_pose_idx;
    props.group_pose_idx = if len == 0 {
        -1
    } else if idx > index as i64 {
        idx - 1
    } else {
        idx.min(len - 1)
    };
}

/// Remove a pose, or with batch propagation every linked pose sharing its UUID.
///
/// Returns the number of poses removed.
pub fn remove_pose(
    doc: &mut Document,
    empty: ObjectId,
    index: usize,
    propagate_batch: bool,
    up: bool,
    unlinked: bool,
) -> CoreResult<usize> {
    require_group_empty(doc, empty)?;
    let source = pose_at(doc, empty, index)?.clone();

    let mut targets: BTreeMap<ObjectId, Vec<usize>> = BTreeMap::from([(empty, vec![index])]);
    if propagate_batch && source.batch && (source.batchlinked || unlinked) {
        for id in batch_scope(doc, empty, up) {
            if id == empty {
                continue;
            }
            let matching: Vec<usize> = poses(doc, id)?
                .iter()
                .enumerate()
                .filter(|(_, p)| p.uuid == source.uuid && p.batch && (p.batchlinked || unlinked))
                .map(|(i, _)| i)
                .collect();
            if !matching.is_empty() {
                targets.insert(id, matching);
            }
        }
    }

    let mut removed = 0;
    for (id, mut indices) in targets {
        indices.sort_unstable_by(|a, b| b.cmp(a));
        let props = group_props_mut(doc, id)?;
        for i in indices {
            remove_pose_at(props, i);
            removed += 1;
        }
    }
    let root = hierarchy_root(doc, empty);
    process_group_poses(doc, root)?;
    info!(empty = %empty, index, removed, "Removed group pose");
    Ok(removed)
}

/// Move a pose within its list, keeping the selected pose selected
pub fn move_pose(doc: &mut Document, empty: ObjectId, from: usize, to: usize) -> CoreResult<()> {
    require_group_empty(doc, empty)?;
    pose_at(doc, empty, from)?;
    let props = group_props_mut(doc, empty)?;
    let to = to.min(props.group_pose_col.len() - 1);
    let selected = usize::try_from(props.group_pose_idx)
        .ok()
        .and_then(|i| props.group_pose_col.get(i))
        .map(|p| p.uuid.clone());
    let pose = props.group_pose_col.remove(from);
    props.group_pose_col.insert(to, pose);
    for (i, pose) in props.group_pose_col.iter_mut().enumerate() {
        pose.index = i;
    }
    if let Some(uuid) = selected {
        if let Some(i) = props.group_pose_col.iter().position(|p| p.uuid == uuid) {
            props.group_pose_idx = i as i64;
        }
    }
    let root = hierarchy_root(doc, empty);
    process_group_poses(doc, root)?;
    Ok(())
}

/// `Pose`, `Pose.001`, ...
pub fn is_auto_pose_name(name: &str) -> bool {
    strip_numeric_suffix(name) == AUTO_POSE_NAME
}

/// Reindex a pose list and make its names unique.
///
/// Automatically named poses are renumbered in list order, reserved names are
/// kept, custom names get a `.NNN` counter on collision.
pub fn prettify_pose_names(poses: &mut [Pose]) {
    let mut used: HashSet<String> = HashSet::new();
    let mut counter = 0usize;
    for (i, pose) in poses.iter_mut().enumerate() {
        pose.index = i;
        if pose.is_reserved() && !used.contains(&pose.name) {
            used.insert(pose.name.clone());
            continue;
        }
        if is_auto_pose_name(&pose.name) {
            pose.name = if counter == 0 {
                AUTO_POSE_NAME.to_string()
            } else {
                format!("{}.{:03}", AUTO_POSE_NAME, counter)
            };
            counter += 1;
        } else if used.contains(&pose.name) {
            pose.name = unique_name(&pose.name, |n| used.contains(n) || is_auto_pose_name(n));
        }
        used.insert(pose.name.clone());
    }
}

/// Signed angle in (-PI, PI]
fn wrap_angle(angle: f64) -> f64 {
    if angle > PI {
        angle - 2.0 * PI
    } else {
        angle
    }
}

/// Set `axis`/`angle` on every pose that differs from the Inception pose by a
/// rotation about one local axis only
pub fn derive_axis_angles(poses: &mut [Pose]) {
    let inception = poses.iter().find(|p| p.is_inception()).map(|p| p.mx);
    for pose in poses.iter_mut() {
        pose.clear_derivation();
    }
    let Some(inception) = inception else {
        return;
    };
    let (base_loc, base_rot, base_scale) = decompose(&inception);
    for pose in poses.iter_mut().filter(|p| !p.is_inception()) {
        let (loc, rot, scale) = decompose(&pose.mx);
        if !loc.abs_diff_eq(base_loc, TRANSFORM_EPSILON) || !scale.abs_diff_eq(base_scale, TRANSFORM_EPSILON) {
            continue;
        }
        let (axis, angle) = (base_rot.inverse() * rot).normalize().to_axis_angle();
        let angle = wrap_angle(angle);
        if angle.abs() < TRANSFORM_EPSILON {
            continue;
        }
        for candidate in [PoseAxis::X, PoseAxis::Y, PoseAxis::Z] {
            let component = axis[candidate.index()];
            if (component.abs() - 1.0).abs() < TRANSFORM_EPSILON {
                pose.axis = Some(candidate);
                pose.angle = angle * component.signum();
            }
        }
    }
}

/// Repair, rename and re-derive the poses of every group empty below `root`.
///
/// Called after every public pose mutation; safe to call repeatedly.
pub fn process_group_poses(doc: &mut Document, root: ObjectId) -> CoreResult<Vec<PoseIssue>> {
    let empties: Vec<ObjectId> = group_subtree(doc, root).into_iter().map(|(e, _)| e).collect();
    let mut issues = Vec::new();

    for &id in &empties {
        let obj = doc.object_mut(id)?;
        let name = obj.name.clone();
        let props = &mut obj.group;

        let mut seen_inception = false;
        let mut uuids = HashSet::new();
        for (i, pose) in props.group_pose_col.iter_mut().enumerate() {
            if pose.is_inception() {
                if seen_inception {
                    pose.name = AUTO_POSE_NAME.to_string();
                    issues.push(PoseIssue::DuplicateInception { empty: name.clone(), index: i });
                }
                seen_inception = true;
            }
            if pose.uuid.is_empty() || !uuids.insert(pose.uuid.clone()) {
                pose.uuid = new_pose_uuid();
                pose.batchlinked = false;
                uuids.insert(pose.uuid.clone());
                issues.push(PoseIssue::DuplicateUuid { empty: name.clone(), index: i });
            }
        }

        prettify_pose_names(&mut props.group_pose_col);

        let len = props.group_pose_col.len() as i64;
        if props.group_pose_idx < -1 || props.group_pose_idx >= len {
            issues.push(PoseIssue::IndexOutOfRange {
                empty: name.clone(),
                index: props.group_pose_idx,
            });
            props.group_pose_idx = if len == 0 { -1 } else { props.group_pose_idx.clamp(0, len - 1) };
        }

        derive_axis_angles(&mut props.group_pose_col);
    }

    let batch_uuids: HashSet<String> = empties
        .iter()
        .filter_map(|id| doc.objects.get(id))
        .flat_map(|o| o.group.group_pose_col.iter())
        .filter(|p| p.batch)
        .map(|p| p.uuid.clone())
        .collect();
    for &id in &empties {
        let obj = doc.object_mut(id)?;
        let name = obj.name.clone();
        for (i, pose) in obj.group.group_pose_col.iter_mut().enumerate() {
            if !pose.batch && batch_uuids.contains(&pose.uuid) {
                pose.batch = true;
                issues.push(PoseIssue::BatchMismatch { empty: name.clone(), index: i });
            }
        }
    }

    for issue in &issues {
        warn!(issue = %issue, "Repaired group pose");
    }
    Ok(issues)
}

/// Every group empty carrying poses of the batch `uuid`, with the pose indices
pub fn batch_members(doc: &Document, root: ObjectId, uuid: &str) -> Vec<(ObjectId, usize)> {
    group_subtree(doc, root)
        .into_iter()
        .flat_map(|(id, _)| {
            doc.objects
                .get(&id)
                .map(|o| {
                    o.group
                        .group_pose_col
                        .iter()
                        .filter(|p| p.uuid == uuid)
                        .map(|p| (id, p.index))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
        .collect()
}
