//! Adding objects to and removing them from existing groups

use assemblage_core::math::{mean, translation};
use assemblage_core::{CoreError, CoreResult, Document, ObjectId, ObjectKind, Preferences, SceneId};
use std::collections::BTreeSet;
use tracing::info;

use crate::cleanup::clean_up_groups;
use crate::hierarchy::{group_parent, is_group_empty};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddToGroupOptions {
    /// Move the empty to the average origin of its members afterwards
    pub realign: bool,
    /// Give added meshes the mirror modifier of an existing member
    pub add_mirror: bool,
    /// Inherit the empty's object color
    pub add_color: bool,
}

/// Move the group empty to the mean origin of its children without moving them
pub fn realign_group(doc: &mut Document, empty: ObjectId) -> CoreResult<()> {
    let children = doc.get_children(empty, false);
    let origins: Vec<_> = children.iter().map(|c| translation(&doc.world_matrix(*c))).collect();
    let Some(center) = mean(&origins) else {
        return Ok(());
    };
    let worlds: Vec<_> = children.iter().map(|c| (*c, doc.world_matrix(*c))).collect();
    let mut world = doc.world_matrix(empty);
    world.w_axis = center.extend(1.0);
    doc.set_world_matrix(empty, &world)?;
    for (child, w) in worlds {
        doc.set_world_matrix(child, &w)?;
    }
    Ok(())
}

/// Parent objects into `target`, keeping their world transforms
pub fn add_to_group(
    doc: &mut Document,
    scene: SceneId,
    target: ObjectId,
    objects: &[ObjectId],
    opts: &AddToGroupOptions,
    prefs: &Preferences,
) -> CoreResult<usize> {
    if !is_group_empty(doc, target) {
        let obj = doc.object(target)?;
        return Err(CoreError::illegal_selection(format!("'{}' is not a group empty", obj.name)));
    }
    let candidates: BTreeSet<ObjectId> = objects
        .iter()
        .copied()
        .filter(|id| *id != target && !doc.is_ancestor(*id, target))
        .filter(|id| doc.get_parent(*id) != Some(target))
        .collect();
    let added: Vec<ObjectId> = candidates
        .iter()
        .copied()
        .filter(|id| !candidates.iter().any(|other| doc.is_ancestor(*other, *id)))
        .collect();
    if added.is_empty() {
        return Err(CoreError::illegal_selection("nothing to add to the group"));
    }

    let mirror = if opts.add_mirror {
        doc.get_children(target, false)
            .into_iter()
            .filter_map(|c| doc.objects.get(&c))
            .flat_map(|o| o.modifiers.iter())
            .find(|m| m.is_mirror())
            .cloned()
    } else {
        None
    };
    let color = doc.object(target)?.color;

    for &id in &added {
        doc.set_parent(id, Some(target), true)?;
        let obj = doc.object_mut(id)?;
        obj.group.is_group_object = true;
        if let Some(modifier) = &mirror {
            if obj.kind == ObjectKind::Mesh && !obj.modifiers.iter().any(|m| m.is_mirror()) {
                obj.modifiers.push(modifier.clone());
            }
        }
        if opts.add_color {
            obj.color = color;
        }
    }

    if opts.realign {
        realign_group(doc, target)?;
    }
    clean_up_groups(doc, scene, prefs)?;
    info!(group = %target, added = added.len(), realign = opts.realign, "Added to group");
    Ok(added.len())
}

/// Unparent grouped objects to the scene root, keeping their world transforms
pub fn remove_from_group(
    doc: &mut Document,
    scene: SceneId,
    objects: &[ObjectId],
    prefs: &Preferences,
) -> CoreResult<usize> {
    let grouped: Vec<ObjectId> = objects
        .iter()
        .copied()
        .filter(|id| group_parent(doc, *id).is_some())
        .collect();
    if grouped.is_empty() {
        return Err(CoreError::illegal_selection("no grouped object selected"));
    }
    for &id in &grouped {
        doc.clear_parent(id, true)?;
        doc.object_mut(id)?.group.is_group_object = false;
    }
    clean_up_groups(doc, scene, prefs)?;
    info!(removed = grouped.len(), "Removed from group");
    Ok(grouped.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::{add_group, nested, setup};
    use assemblage_core::math::approx_eq;
    use assemblage_core::{Modifier, ModifierKind};
    use glam::DVec3;

    #[test]
    fn test_add_keeps_world_and_inherits() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, _, _, _, z] = nested(&mut doc, col);
        doc.object_mut(z).unwrap().modifiers.push(Modifier {
            name: "Mirror".into(),
            kind: ModifierKind::Mirror {
                mirror_object: Some(a),
                axes: [true, false, false],
            },
            show_viewport: true,
        });
        doc.object_mut(a).unwrap().color = [1.0, 0.0, 0.0, 1.0];
        let new = doc.add_cube(col, "New", DVec3::new(5.0, 5.0, 0.0), 1.0).unwrap();
        let before = doc.world_matrix(new);

        let opts = AddToGroupOptions {
            realign: false,
            add_mirror: true,
            add_color: true,
        };
        assert_eq!(add_to_group(&mut doc, scene, a, &[new], &opts, &prefs).unwrap(), 1);
        let obj = doc.object(new).unwrap();
        assert_eq!(obj.parent, Some(a));
        assert!(obj.group.is_group_object);
        assert_eq!(obj.color, [1.0, 0.0, 0.0, 1.0]);
        assert!(obj.modifiers.iter().any(|m| m.is_mirror()));
        assert!(approx_eq(&doc.world_matrix(new), &before, 1e-9));
    }

    #[test]
    fn test_add_realigns() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let g = add_group(&mut doc, col, "G", DVec3::ZERO);
        let c1 = doc.add_cube(col, "C1", DVec3::new(2.0, 0.0, 0.0), 1.0).unwrap();
        let c2 = doc.add_cube(col, "C2", DVec3::new(4.0, 2.0, 0.0), 1.0).unwrap();
        let opts = AddToGroupOptions {
            realign: true,
            ..AddToGroupOptions::default()
        };
        add_to_group(&mut doc, scene, g, &[c1, c2], &opts, &prefs).unwrap();
        assert!(doc.object(g).unwrap().location.abs_diff_eq(DVec3::new(3.0, 1.0, 0.0), 1e-12));
        assert!(translation(&doc.world_matrix(c1)).abs_diff_eq(DVec3::new(2.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_add_rejects_ancestor() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, b, ..] = nested(&mut doc, col);
        let err = add_to_group(&mut doc, scene, b, &[a], &AddToGroupOptions::default(), &prefs).unwrap_err();
        assert_eq!(err.label(), "IllegalSelection");
    }

    #[test]
    fn test_remove_from_group() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, b, x, y, _] = nested(&mut doc, col);
        let before = doc.world_matrix(x);

        assert_eq!(remove_from_group(&mut doc, scene, &[x, y], &prefs).unwrap(), 2);
        assert_eq!(doc.get_parent(x), None);
        assert!(!doc.object(x).unwrap().group.is_group_object);
        assert!(approx_eq(&doc.world_matrix(x), &before, 1e-9));
        // B lost its last members and is cleaned up
        assert!(!doc.objects.contains_key(&b));
        assert!(doc.objects.contains_key(&a));

        let loose = doc.add_cube(col, "Loose", DVec3::ZERO, 1.0).unwrap();
        assert!(remove_from_group(&mut doc, scene, &[loose], &prefs).is_err());
    }
}
