//! Group-aware selection

use assemblage_core::{CoreError, CoreResult, Document, ObjectId, SceneId};
use std::collections::BTreeSet;
use tracing::debug;

use crate::hierarchy::{group_parent, is_group_empty, scene_group_empties, AncestorCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectGroupOptions {
    pub unhide: bool,
    pub recursive: bool,
}

impl Default for SelectGroupOptions {
    fn default() -> Self {
        Self {
            unhide: false,
            recursive: true,
        }
    }
}

/// Toggle the selection of the members of the given group empties.
///
/// When every member is already selected they are all deselected, otherwise
/// all of them are selected. Returns the number of members touched.
pub fn select_group(
    doc: &mut Document,
    scene: SceneId,
    empties: &[ObjectId],
    opts: &SelectGroupOptions,
) -> CoreResult<usize> {
    let groups: Vec<ObjectId> = empties.iter().copied().filter(|id| is_group_empty(doc, *id)).collect();
    if groups.is_empty() {
        return Err(CoreError::illegal_selection("no group empty selected"));
    }
    let mut members = BTreeSet::new();
    for &group in &groups {
        members.extend(doc.get_children(group, opts.recursive));
    }
    let all_selected = members
        .iter()
        .all(|id| doc.objects.get(id).map(|o| o.selected).unwrap_or(true));
    let state = !all_selected;

    for &id in &members {
        if opts.unhide {
            doc.set_visibility(id, Some(false), Some(false))?;
        }
        doc.select(id, state)?;
    }
    if state {
        for &group in &groups {
            doc.select(group, true)?;
        }
        if doc.active_object(scene).is_none() {
            doc.set_active(scene, Some(groups[0]))?;
        }
    }
    debug!(groups = groups.len(), members = members.len(), select = state, "Toggled group selection");
    Ok(members.len())
}

/// Apply the scene's group selection flags after the user changed the selection.
///
/// With `group_select` a selected member pulls in its group (the top group when
/// `group_recursive_select` is set, else the nearest one) and that group's
/// members. With `group_hide` group empties are hidden unless selected.
pub fn propagate_group_selection(doc: &mut Document, scene: SceneId) -> CoreResult<usize> {
    let settings = doc.scene(scene)?.group.clone();
    let mut cache = AncestorCache::new();
    let mut selected = 0;

    if settings.group_select {
        let mut groups = BTreeSet::new();
        for id in doc.selected_objects(scene)? {
            let group = if settings.group_recursive_select {
                cache.top_group(doc, id)
            } else if is_group_empty(doc, id) {
                Some(id)
            } else {
                group_parent(doc, id)
            };
            groups.extend(group);
        }
        for group in groups {
            let mut members = vec![group];
            members.extend(doc.get_children(group, settings.group_recursive_select));
            for id in members {
                let obj = doc.object_mut(id)?;
                if !obj.selected {
                    obj.selected = true;
                    selected += 1;
                }
            }
        }
    }

    if settings.group_hide {
        for id in scene_group_empties(doc, scene) {
            let obj = doc.object_mut(id)?;
            obj.visibility.hide = !obj.selected;
        }
    }
    Ok(selected)
}
