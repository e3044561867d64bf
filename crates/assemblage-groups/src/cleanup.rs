//! Clean-up pass run after every structural change

use assemblage_core::{CoreResult, Document, Preferences, SceneId};
use serde::Serialize;
use tracing::{debug, info};

use crate::hierarchy::{group_parent, group_subtree, is_group_empty, scene_group_empties, top_group_empties};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub cycles_broken: usize,
    pub anchors_cleared: usize,
    pub flags_fixed: usize,
    pub removed: Vec<String>,
    pub faded: usize,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.cycles_broken == 0 && self.anchors_cleared == 0 && self.flags_fixed == 0 && self.removed.is_empty()
    }
}

/// Enforce the group flag invariants of a scene.
///
/// Breaks parent cycles, clears `is_group_anchor` on empties that gained
/// children, syncs `is_group_object` with the parent, removes childless
/// non-anchor groups (recursing upward) and fades sizes, the last two as the
/// preferences allow. Running it twice in a row changes nothing.
pub fn clean_up_groups(doc: &mut Document, scene: SceneId, prefs: &Preferences) -> CoreResult<CleanupReport> {
    let mut report = CleanupReport::default();
    let objects = doc.scene_objects(scene)?;

    for &id in &objects {
        if doc.is_ancestor(id, id) {
            doc.clear_parent(id, false)?;
            report.cycles_broken += 1;
        }
    }

    for &id in &objects {
        let obj = doc.object_mut(id)?;
        if obj.group.is_group_anchor && !obj.children.is_empty() {
            obj.group.is_group_anchor = false;
            report.anchors_cleared += 1;
        }
    }

    for &id in &objects {
        let expected = group_parent(doc, id).is_some();
        let obj = doc.object_mut(id)?;
        if obj.group.is_group_object != expected {
            obj.group.is_group_object = expected;
            report.flags_fixed += 1;
        }
    }

    if prefs.group_tools_remove_empty {
        let mut pending = scene_group_empties(doc, scene);
        while let Some(id) = pending.pop() {
            let Some(obj) = doc.objects.get(&id) else {
                continue;
            };
            if !obj.is_group_empty() || !obj.children.is_empty() || obj.group.is_group_anchor || obj.is_linked() {
                continue;
            }
            let name = obj.name.clone();
            let parent = obj.parent;
            doc.remove_object(id)?;
            debug!(group = %name, "Removed empty group");
            report.removed.push(name);
            if let Some(p) = parent.filter(|p| is_group_empty(doc, *p)) {
                pending.push(p);
            }
        }
    }

    if prefs.group_tools_fade_sizes {
        report.faded = fade_group_sizes(doc, scene, prefs)?;
    }

    if !report.is_clean() {
        info!(
            cycles = report.cycles_broken,
            anchors = report.anchors_cleared,
            flags = report.flags_fixed,
            removed = report.removed.len(),
            "Cleaned up groups"
        );
    }
    Ok(report)
}

/// Scale nested group sizes by the fade factor per level below each top group.
///
/// Top groups keep their sizes; every sub-group gets its parent's display and
/// gizmo size times the factor.
pub fn fade_group_sizes(doc: &mut Document, scene: SceneId, prefs: &Preferences) -> CoreResult<usize> {
    let factor = prefs.fade_factor();
    let mut count = 0;
    for top in top_group_empties(doc, scene) {
        for (id, depth) in group_subtree(doc, top) {
            if depth == 0 {
                continue;
            }
            let Some(parent) = doc.get_parent(id) else {
                continue;
            };
            let (size, gizmo) = {
                let p = doc.object(parent)?;
                (p.empty_display_size * factor, p.group.group_gizmo_size * factor)
            };
            let obj = doc.object_mut(id)?;
            obj.empty_display_size = size;
            obj.group.group_size = size;
            obj.group.group_gizmo_size = gizmo;
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::{add_group, nested, setup};
    use glam::DVec3;

    fn no_fade() -> Preferences {
        Preferences {
            group_tools_fade_sizes: false,
            ..Preferences::default()
        }
    }

    #[test]
    fn test_removes_empty_groups_upward() {
        let (mut doc, scene, col) = setup();
        let outer = add_group(&mut doc, col, "Outer", DVec3::ZERO);
        let inner = add_group(&mut doc, col, "Inner", DVec3::ZERO);
        doc.set_parent(inner, Some(outer), true).unwrap();

        let report = clean_up_groups(&mut doc, scene, &no_fade()).unwrap();
        assert_eq!(report.removed.len(), 2);
        assert!(doc.objects.is_empty());
    }

    #[test]
    fn test_keeps_anchors_and_respects_policy() {
        let (mut doc, scene, col) = setup();
        let anchor = add_group(&mut doc, col, "Anchor", DVec3::ZERO);
        doc.object_mut(anchor).unwrap().group.is_group_anchor = true;
        let lonely = add_group(&mut doc, col, "Lonely", DVec3::ZERO);

        let keep = Preferences {
            group_tools_remove_empty: false,
            ..no_fade()
        };
        assert!(clean_up_groups(&mut doc, scene, &keep).unwrap().removed.is_empty());

        let report = clean_up_groups(&mut doc, scene, &no_fade()).unwrap();
        assert_eq!(report.removed, vec!["Lonely".to_string()]);
        assert!(doc.objects.contains_key(&anchor));
        assert!(!doc.objects.contains_key(&lonely));
    }

    #[test]
    fn test_fixes_flags_and_anchor_with_children() {
        let (mut doc, scene, col) = setup();
        let [a, b, x, ..] = nested(&mut doc, col);
        doc.object_mut(a).unwrap().group.is_group_object = true;
        doc.object_mut(x).unwrap().group.is_group_object = false;
        doc.object_mut(b).unwrap().group.is_group_anchor = true;

        let report = clean_up_groups(&mut doc, scene, &no_fade()).unwrap();
        assert_eq!(report.flags_fixed, 2);
        assert_eq!(report.anchors_cleared, 1);
        assert!(!doc.object(a).unwrap().group.is_group_object);
        assert!(doc.object(x).unwrap().group.is_group_object);

        // idempotent
        assert!(clean_up_groups(&mut doc, scene, &no_fade()).unwrap().is_clean());
    }

    #[test]
    fn test_breaks_parent_cycles() {
        let (mut doc, scene, col) = setup();
        let [a, b, ..] = nested(&mut doc, col);
        doc.object_mut(a).unwrap().parent = Some(b);
        doc.object_mut(b).unwrap().children.push(a);

        let report = clean_up_groups(&mut doc, scene, &no_fade()).unwrap();
        assert_eq!(report.cycles_broken, 1);
        assert!(!doc.is_ancestor(a, a));
        assert!(!doc.is_ancestor(b, b));
    }

    #[test]
    fn test_fade_sizes() {
        let (mut doc, scene, col) = setup();
        let [a, b, ..] = nested(&mut doc, col);
        let c = add_group(&mut doc, col, "C", DVec3::ZERO);
        doc.set_parent(c, Some(b), true).unwrap();
        doc.object_mut(a).unwrap().empty_display_size = 1.0;
        doc.object_mut(a).unwrap().group.group_gizmo_size = 2.0;

        let prefs = Preferences {
            group_tools_fade_factor: 0.5,
            ..Preferences::default()
        };
        assert_eq!(fade_group_sizes(&mut doc, scene, &prefs).unwrap(), 2);
        assert_eq!(doc.object(b).unwrap().empty_display_size, 0.5);
        assert_eq!(doc.object(c).unwrap().empty_display_size, 0.25);
        assert_eq!(doc.object(c).unwrap().group.group_gizmo_size, 0.5);
        assert_eq!(doc.object(a).unwrap().empty_display_size, 1.0);
    }
}
