//! Group creation

use assemblage_core::math::{compose, decompose, mean, translation};
use assemblage_core::{
    CollectionId, CoreError, CoreResult, Document, EmptyDisplay, ModifierKind, ObjectId, ObjectKind, Preferences,
    SceneId,
};
use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::cleanup::clean_up_groups;
use crate::hierarchy::{group_parent, is_group_empty};
use crate::naming::set_unique_group_name;
use crate::poses::set_inception_pose;

/// Where a new group empty is placed or oriented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupOrigin {
    #[default]
    Average,
    /// Average dropped to the floor
    #[serde(rename = "AVGFLOOR")]
    AverageFloor,
    Active,
    Cursor,
    World,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateGroupOptions {
    pub location: GroupOrigin,
    pub rotation: GroupOrigin,
    /// Basename of the new group, the configured default when `None`
    pub name: Option<String>,
}

/// Whether `id` is the operand of a boolean modifier on its parent
pub fn is_boolean_operand(doc: &Document, id: ObjectId) -> bool {
    let Some(parent) = doc.get_parent(id).and_then(|p| doc.objects.get(&p)) else {
        return false;
    };
    parent
        .modifiers
        .iter()
        .any(|m| matches!(m.kind, ModifierKind::Boolean { object: Some(o) } if o == id))
}

/// Members a new group adopts: no boolean operands, nothing whose ancestor is
/// already a member. Fails when a member hangs below a non-group object.
fn resolve_members(doc: &Document, selection: &[ObjectId]) -> CoreResult<Vec<ObjectId>> {
    let candidates: Vec<ObjectId> = selection
        .iter()
        .copied()
        .filter(|id| !is_boolean_operand(doc, *id))
        .collect();
    let set: BTreeSet<ObjectId> = candidates.iter().copied().collect();

    let mut members = Vec::new();
    for id in candidates {
        if set.iter().any(|other| *other != id && doc.is_ancestor(*other, id)) {
            continue;
        }
        if let Some(parent) = doc.get_parent(id) {
            if !is_group_empty(doc, parent) {
                let obj = doc.object(id)?;
                return Err(CoreError::illegal_selection(format!(
                    "'{}' is parented to a non-group object",
                    obj.name
                )));
            }
        }
        members.push(id);
    }
    Ok(members)
}

/// Mean of unit quaternions, sign-aligned to the first
fn average_rotation(rotations: &[DQuat]) -> DQuat {
    let Some(first) = rotations.first().copied() else {
        return DQuat::IDENTITY;
    };
    let sum = rotations.iter().fold(glam::DVec4::ZERO, |acc, q| {
        let v = glam::DVec4::from(*q);
        if v.dot(glam::DVec4::from(first)) < 0.0 {
            acc - v
        } else {
            acc + v
        }
    });
    if sum.length_squared() < 1e-12 {
        return first;
    }
    DQuat::from_vec4(sum).normalize()
}

fn origin_location(doc: &Document, scene: SceneId, members: &[ObjectId], origin: GroupOrigin) -> CoreResult<DVec3> {
    let origins: Vec<DVec3> = members.iter().map(|id| translation(&doc.world_matrix(*id))).collect();
    let average = mean(&origins).unwrap_or(DVec3::ZERO);
    Ok(match origin {
        GroupOrigin::Average => average,
        GroupOrigin::AverageFloor => DVec3::new(average.x, average.y, 0.0),
        GroupOrigin::Active => match doc.active_object(scene) {
            Some(active) => translation(&doc.world_matrix(active)),
            None => average,
        },
        GroupOrigin::Cursor => translation(&doc.scene(scene)?.cursor),
        GroupOrigin::World => DVec3::ZERO,
    })
}

fn origin_rotation(doc: &Document, scene: SceneId, members: &[ObjectId], origin: GroupOrigin) -> CoreResult<DQuat> {
    let rotations: Vec<DQuat> = members.iter().map(|id| decompose(&doc.world_matrix(*id)).1).collect();
    Ok(match origin {
        GroupOrigin::Average | GroupOrigin::AverageFloor => average_rotation(&rotations),
        GroupOrigin::Active => match doc.active_object(scene) {
            Some(active) => decompose(&doc.world_matrix(active)).1,
            None => average_rotation(&rotations),
        },
        GroupOrigin::Cursor => decompose(&doc.scene(scene)?.cursor).1,
        GroupOrigin::World => DQuat::IDENTITY,
    })
}

/// Collection the new empty goes into: the first member's, else the scene's current one
fn target_collection(doc: &Document, scene: SceneId, first: ObjectId) -> CoreResult<CollectionId> {
    let local = doc
        .users_collection(first)
        .into_iter()
        .find(|c| doc.collections.get(c).map(|c| !c.is_linked()).unwrap_or(false));
    match local {
        Some(col) => Ok(col),
        None => Ok(doc.scene(scene)?.current_collection()),
    }
}

/// Group the selected objects under a new group empty.
///
/// When every member already sits in the same group, the new group is nested
/// inside it. Members keep their world transforms. The new empty ends up
/// selected and active, with an Inception pose.
pub fn create_group(
    doc: &mut Document,
    scene: SceneId,
    selection: &[ObjectId],
    opts: &CreateGroupOptions,
    prefs: &Preferences,
) -> CoreResult<ObjectId> {
    let members = resolve_members(doc, selection)?;
    let Some(&first) = members.first() else {
        return Err(CoreError::illegal_selection("nothing to group"));
    };

    let parents: BTreeSet<Option<ObjectId>> = members.iter().map(|id| group_parent(doc, *id)).collect();
    let outer = match parents.into_iter().collect::<Vec<_>>().as_slice() {
        [Some(p)] => Some(*p),
        _ => None,
    };

    let location = origin_location(doc, scene, &members, opts.location)?;
    let rotation = origin_rotation(doc, scene, &members, opts.rotation)?;
    let collection = target_collection(doc, scene, first)?;

    for &id in &members {
        doc.clear_parent(id, true)?;
    }

    let empty = doc.add_object(collection, &prefs.group_tools_basename, ObjectKind::Empty, DVec3::ZERO)?;
    {
        let obj = doc.object_mut(empty)?;
        obj.empty_display_type = EmptyDisplay::Cube;
        obj.empty_display_size = prefs.group_tools_size;
        obj.group.is_group_empty = true;
        obj.group.group_size = prefs.group_tools_size;
    }
    let world: DMat4 = compose(location, rotation, DVec3::ONE);
    if let Some(outer) = outer {
        doc.set_parent(empty, Some(outer), false)?;
    }
    doc.set_world_matrix(empty, &world)?;
    let name = set_unique_group_name(doc, empty, opts.name.as_deref(), prefs)?;

    for &id in &members {
        doc.set_parent(id, Some(empty), true)?;
        doc.object_mut(id)?.group.is_group_object = true;
    }

    for &id in &members {
        doc.select(id, false)?;
    }
    doc.select(empty, true)?;
    doc.set_active(scene, Some(empty))?;

    clean_up_groups(doc, scene, prefs)?;
    set_inception_pose(doc, empty)?;
    info!(group = %name, members = members.len(), nested = outer.is_some(), "Created group");
    Ok(empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::{add_group, nested, setup};
    use assemblage_core::math::approx_eq;
    use assemblage_core::Modifier;

    fn three_objects(doc: &mut Document, col: CollectionId) -> [ObjectId; 3] {
        [
            doc.add_cube(col, "O1", DVec3::new(1.0, 0.0, 0.0), 1.0).unwrap(),
            doc.add_cube(col, "O2", DVec3::new(-1.0, 0.0, 0.0), 1.0).unwrap(),
            doc.add_cube(col, "O3", DVec3::new(0.0, 2.0, 0.0), 1.0).unwrap(),
        ]
    }

    #[test]
    fn test_create_group_average() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let objs = three_objects(&mut doc, col);

        let g = create_group(&mut doc, scene, &objs, &CreateGroupOptions::default(), &prefs).unwrap();
        let center = DVec3::new(0.0, 2.0 / 3.0, 0.0);
        let group = doc.object(g).unwrap();
        assert!(group.is_group_empty());
        assert_eq!(group.name, "_GROUP_grp");
        assert!(group.location.abs_diff_eq(center, 1e-12));
        assert!(group.rotation.abs_diff_eq(DQuat::IDENTITY, 1e-12));
        assert_eq!(group.children.len(), 3);

        for (id, loc) in objs.iter().zip([
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::new(0.0, 2.0, 0.0),
        ]) {
            let obj = doc.object(*id).unwrap();
            assert_eq!(obj.parent, Some(g));
            assert!(obj.group.is_group_object);
            assert!(obj.location.abs_diff_eq(loc - center, 1e-12));
        }

        let poses = &group.group.group_pose_col;
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].name, "Inception");
        assert!(approx_eq(&poses[0].mx, &DMat4::from_translation(center), 1e-12));
        assert!(group.selected);
        assert_eq!(doc.active_object(scene), Some(g));
    }

    #[test]
    fn test_create_group_world_and_floor() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let a = doc.add_cube(col, "A", DVec3::new(2.0, 2.0, 4.0), 1.0).unwrap();

        let world = CreateGroupOptions {
            location: GroupOrigin::World,
            rotation: GroupOrigin::World,
            name: Some("Base".into()),
        };
        let g = create_group(&mut doc, scene, &[a], &world, &prefs).unwrap();
        assert_eq!(doc.object(g).unwrap().location, DVec3::ZERO);
        assert_eq!(doc.object(g).unwrap().name, "_Base_grp");

        let b = doc.add_cube(col, "B", DVec3::new(2.0, 2.0, 4.0), 1.0).unwrap();
        let floor = CreateGroupOptions {
            location: GroupOrigin::AverageFloor,
            ..CreateGroupOptions::default()
        };
        let h = create_group(&mut doc, scene, &[b], &floor, &prefs).unwrap();
        assert!(doc.object(h).unwrap().location.abs_diff_eq(DVec3::new(2.0, 2.0, 0.0), 1e-12));
    }

    #[test]
    fn test_create_nested_group() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences {
            group_tools_fade_sizes: false,
            ..Preferences::default()
        };
        let [a, b, x, y, z] = nested(&mut doc, col);
        let before = doc.world_matrix(z);

        let g = create_group(&mut doc, scene, &[z], &CreateGroupOptions::default(), &prefs).unwrap();
        assert_eq!(doc.get_parent(g), Some(a));
        assert_eq!(doc.get_parent(z), Some(g));
        assert!(approx_eq(&doc.world_matrix(z), &before, 1e-9));
        assert!(doc.object(g).unwrap().group.is_group_object);

        // members from different groups land at the root
        let h = create_group(&mut doc, scene, &[x, g], &CreateGroupOptions::default(), &prefs).unwrap();
        assert_eq!(doc.get_parent(h), None);
        assert_eq!(doc.get_parent(y), Some(b));
    }

    #[test]
    fn test_selected_descendants_follow_their_ancestor() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, b, x, ..] = nested(&mut doc, col);
        let g = create_group(&mut doc, scene, &[a, b, x], &CreateGroupOptions::default(), &prefs).unwrap();
        assert_eq!(doc.object(g).unwrap().children, vec![a]);
        assert_eq!(doc.get_parent(x), Some(b));
    }

    #[test]
    fn test_non_group_parent_rejected() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let parent = doc.add_cube(col, "Parent", DVec3::ZERO, 1.0).unwrap();
        let child = doc.add_cube(col, "Child", DVec3::X, 1.0).unwrap();
        doc.set_parent(child, Some(parent), true).unwrap();

        let err = create_group(&mut doc, scene, &[child], &CreateGroupOptions::default(), &prefs).unwrap_err();
        assert_eq!(err.label(), "IllegalSelection");

        // a boolean operand is skipped instead
        doc.object_mut(parent).unwrap().modifiers.push(Modifier {
            name: "Boolean".into(),
            kind: ModifierKind::Boolean { object: Some(child) },
            show_viewport: true,
        });
        let g = create_group(&mut doc, scene, &[parent, child], &CreateGroupOptions::default(), &prefs).unwrap();
        assert_eq!(doc.object(g).unwrap().children, vec![parent]);
        assert_eq!(doc.get_parent(child), Some(parent));
    }

    #[test]
    fn test_empty_group_in_selection_is_removed() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let old = add_group(&mut doc, col, "Old", DVec3::ZERO);
        let c = doc.add_cube(col, "C", DVec3::X, 1.0).unwrap();
        doc.set_parent(c, Some(old), true).unwrap();

        // regrouping the only member leaves the old group childless
        let d = doc.add_cube(col, "D", DVec3::Y, 1.0).unwrap();
        create_group(&mut doc, scene, &[c, d], &CreateGroupOptions::default(), &prefs).unwrap();
        assert!(!doc.objects.contains_key(&old));
    }
}
