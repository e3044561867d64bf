//! Duplicating whole groups

use assemblage_core::{CoreError, CoreResult, Document, ObjectId, Preferences, SceneId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::cleanup::clean_up_groups;
use crate::hierarchy::is_group_empty;
use crate::naming::set_unique_group_name;

/// Objects a group duplicate takes along: the empty and its whole subtree,
/// or only its direct children when the scene selects non-recursively
pub fn group_duplicate_set(doc: &Document, scene: SceneId, empties: &[ObjectId]) -> CoreResult<Vec<ObjectId>> {
    let recursive = doc.scene(scene)?.group.group_recursive_select;
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for &empty in empties {
        let mut members = vec![empty];
        members.extend(doc.get_children(empty, recursive));
        for id in members {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

/// Duplicate group empties with their members.
///
/// The duplicates replace the selection, the first duplicated empty becomes
/// active. With `linked` mesh data is shared. Returns the original to
/// duplicate mapping.
pub fn duplicate_groups(
    doc: &mut Document,
    scene: SceneId,
    empties: &[ObjectId],
    linked: bool,
    prefs: &Preferences,
) -> CoreResult<BTreeMap<ObjectId, ObjectId>> {
    let groups: Vec<ObjectId> = empties.iter().copied().filter(|id| is_group_empty(doc, *id)).collect();
    let Some(&first) = groups.first() else {
        return Err(CoreError::illegal_selection("no group empty selected"));
    };
    let ids = group_duplicate_set(doc, scene, &groups)?;
    let map = doc.duplicate_objects(&ids, linked, true)?;

    doc.deselect_all();
    for &dup in map.values() {
        doc.select(dup, true)?;
    }
    doc.set_active(scene, map.get(&first).copied())?;
    for (&orig, &dup) in &map {
        if is_group_empty(doc, orig) {
            set_unique_group_name(doc, dup, None, prefs)?;
        }
    }

    clean_up_groups(doc, scene, prefs)?;
    info!(groups = groups.len(), objects = map.len(), linked, "Duplicated groups");
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::{nested, setup};
    use assemblage_core::math::approx_eq;

    #[test]
    fn test_duplicate_recursive() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, b, x, ..] = nested(&mut doc, col);

        let map = duplicate_groups(&mut doc, scene, &[a], false, &prefs).unwrap();
        assert_eq!(map.len(), 5);
        let (da, db, dx) = (map[&a], map[&b], map[&x]);
        assert_eq!(doc.get_parent(db), Some(da));
        assert_eq!(doc.get_parent(dx), Some(db));
        assert!(approx_eq(&doc.world_matrix(dx), &doc.world_matrix(x), 1e-12));
        assert_ne!(doc.object(dx).unwrap().mesh, doc.object(x).unwrap().mesh);
        assert_eq!(doc.active_object(scene), Some(da));
        assert!(doc.object(da).unwrap().selected);
        assert!(!doc.object(a).unwrap().selected);
        assert_eq!(doc.users_collection(da), vec![col]);
        assert_eq!(doc.object(da).unwrap().name, "_A_grp");
    }

    #[test]
    fn test_duplicate_linked_shares_mesh() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, _, x, ..] = nested(&mut doc, col);
        let map = duplicate_groups(&mut doc, scene, &[a], true, &prefs).unwrap();
        assert_eq!(doc.object(map[&x]).unwrap().mesh, doc.object(x).unwrap().mesh);
    }

    #[test]
    fn test_duplicate_direct_children_only() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        doc.scene_mut(scene).unwrap().group.group_recursive_select = false;
        let [a, b, ..] = nested(&mut doc, col);
        let ids = group_duplicate_set(&doc, scene, &[a]).unwrap();
        assert_eq!(ids, vec![a, b, doc.get("Z").unwrap()]);

        // the copied sub-group has no members and is cleaned up
        let map = duplicate_groups(&mut doc, scene, &[a], false, &prefs).unwrap();
        assert!(!doc.objects.contains_key(&map[&b]));
    }
}
