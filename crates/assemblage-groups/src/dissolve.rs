//! Ungrouping

use assemblage_core::math::translation;
use assemblage_core::{Aabb, CoreError, CoreResult, Document, ObjectId, Preferences, SceneId};
use glam::DVec3;
use std::collections::BTreeSet;
use tracing::info;

use crate::cleanup::clean_up_groups;
use crate::hierarchy::{group_depth, group_subtree, is_group_empty};

/// Transient feedback of a dissolve: where the empties were and what they held
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DissolveReport {
    pub locations: Vec<DVec3>,
    pub bounds: Option<Aabb>,
}

/// Dissolve group empties, handing their children to the next parent up.
///
/// With `recursive` every group empty below the given ones is dissolved too.
/// Children keep their world transforms.
pub fn dissolve_groups(
    doc: &mut Document,
    scene: SceneId,
    empties: &[ObjectId],
    recursive: bool,
    prefs: &Preferences,
) -> CoreResult<DissolveReport> {
    let mut targets = BTreeSet::new();
    for &id in empties.iter().filter(|id| is_group_empty(doc, **id)) {
        if recursive {
            targets.extend(group_subtree(doc, id).into_iter().map(|(e, _)| e));
        } else {
            targets.insert(id);
        }
    }
    if targets.is_empty() {
        return Err(CoreError::illegal_selection("no group empty selected"));
    }
    for &id in &targets {
        let obj = doc.object(id)?;
        if obj.is_linked() {
            return Err(CoreError::LinkedAsset(format!("group '{}' is linked from a library", obj.name)));
        }
    }

    let mut ordered: Vec<(usize, ObjectId)> = targets.iter().map(|id| (group_depth(doc, *id), *id)).collect();
    ordered.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut report = DissolveReport::default();
    let descendants: Vec<ObjectId> = targets
        .iter()
        .flat_map(|id| doc.get_children(*id, true))
        .filter(|id| !targets.contains(id))
        .collect();
    report.bounds = doc.world_bounds(&descendants);

    for (_, id) in ordered {
        report.locations.push(translation(&doc.world_matrix(id)));
        let parent = doc.get_parent(id);
        let grouped = parent.map(|p| is_group_empty(doc, p)).unwrap_or(false);
        for child in doc.get_children(id, false) {
            doc.set_parent(child, parent, true)?;
            doc.object_mut(child)?.group.is_group_object = grouped;
        }
        doc.remove_object(id)?;
    }

    clean_up_groups(doc, scene, prefs)?;
    info!(dissolved = report.locations.len(), recursive, "Dissolved groups");
    Ok(report)
}
