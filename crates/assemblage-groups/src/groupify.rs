//! Turn plain empty hierarchies into managed groups

use assemblage_core::{CoreError, CoreResult, Document, EmptyDisplay, ObjectId, Preferences, SceneId};
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info};

use crate::cleanup::clean_up_groups;
use crate::naming::set_unique_group_name;
use crate::poses::set_inception_pose;

fn is_parent_empty(doc: &Document, id: ObjectId) -> bool {
    doc.objects
        .get(&id)
        .map(|o| o.is_empty() && !o.children.is_empty() && !o.is_linked())
        .unwrap_or(false)
}

/// Convert empties with children, and the empties with children below them,
/// into group empties. Returns the converted empties, outermost first.
pub fn groupify(
    doc: &mut Document,
    scene: SceneId,
    empties: &[ObjectId],
    prefs: &Preferences,
) -> CoreResult<Vec<ObjectId>> {
    let mut queue: VecDeque<ObjectId> = empties.iter().copied().filter(|id| is_parent_empty(doc, *id)).collect();
    if queue.is_empty() {
        return Err(CoreError::illegal_selection("no empty with children selected"));
    }

    let mut converted = Vec::new();
    let mut seen = BTreeSet::new();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        {
            let obj = doc.object_mut(id)?;
            obj.group.is_group_empty = true;
            obj.empty_display_type = EmptyDisplay::Cube;
            obj.empty_display_size = prefs.group_tools_size;
            obj.group.group_size = prefs.group_tools_size;
        }
        let name = set_unique_group_name(doc, id, None, prefs)?;
        debug!(group = %name, "Groupified empty");

        for child in doc.get_children(id, false) {
            doc.object_mut(child)?.group.is_group_object = true;
            if is_parent_empty(doc, child) {
                queue.push_back(child);
            }
        }
        converted.push(id);
    }

    clean_up_groups(doc, scene, prefs)?;
    for &id in &converted {
        set_inception_pose(doc, id)?;
    }
    info!(groups = converted.len(), "Groupified hierarchy");
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::setup;
    use assemblage_core::ObjectKind;
    use glam::DVec3;

    #[test]
    fn test_groupify_recurses() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let root = doc.add_object(col, "Rig", ObjectKind::Empty, DVec3::ZERO).unwrap();
        let arm = doc.add_object(col, "Arm", ObjectKind::Empty, DVec3::X).unwrap();
        let bare = doc.add_object(col, "Marker", ObjectKind::Empty, DVec3::Y).unwrap();
        let hand = doc.add_cube(col, "Hand", DVec3::new(2.0, 0.0, 0.0), 1.0).unwrap();
        doc.set_parent(arm, Some(root), true).unwrap();
        doc.set_parent(bare, Some(root), true).unwrap();
        doc.set_parent(hand, Some(arm), true).unwrap();

        let converted = groupify(&mut doc, scene, &[root], &prefs).unwrap();
        assert_eq!(converted, vec![root, arm]);

        let rig = doc.object(root).unwrap();
        assert!(rig.is_group_empty());
        assert_eq!(rig.name, "_Rig_grp");
        assert_eq!(rig.empty_display_type, EmptyDisplay::Cube);
        assert_eq!(rig.group.group_pose_col[0].name, "Inception");

        assert!(doc.object(arm).unwrap().group.is_group_object);
        assert!(doc.object(hand).unwrap().group.is_group_object);
        // a childless empty stays a plain member
        assert!(!doc.object(bare).unwrap().is_group_empty());
        assert!(doc.object(bare).unwrap().group.is_group_object);
    }

    #[test]
    fn test_groupify_rejects_childless() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let lone = doc.add_object(col, "Lone", ObjectKind::Empty, DVec3::ZERO).unwrap();
        let err = groupify(&mut doc, scene, &[lone], &prefs).unwrap_err();
        assert_eq!(err.label(), "IllegalSelection");
    }
}
