//! Outliner group mode
//!
//! A workspace is either in normal mode or in group mode, where the outliner
//! lists only group empties. Entering stores a snapshot on the workspace;
//! leaving restores it verbatim.

use assemblage_core::{
    CoreError, CoreResult, Document, GroupModeSnapshot, OutlinerDisplayMode, OutlinerFilter, Preferences, SceneId,
};
use tracing::info;

use crate::cleanup::clean_up_groups;
use crate::hierarchy::scene_group_empties;

/// Outliner filter listing only objects named by the group policy
pub fn group_mode_filter(prefs: &Preferences) -> OutlinerFilter {
    let text = if prefs.group_tools_suffix.is_empty() {
        prefs.group_tools_prefix.clone()
    } else {
        prefs.group_tools_suffix.clone()
    };
    OutlinerFilter {
        filter_text: text,
        use_filter_complete: false,
        use_filter_case_sensitive: true,
        use_filter_children: true,
        use_filter_collection: false,
        use_filter_object_mesh: false,
        use_filter_object_empty: true,
        use_filter_object_others: false,
        use_filter_object_content: false,
        show_restrict_column_hide: true,
        show_restrict_column_viewport: false,
        show_restrict_column_select: true,
    }
}

pub fn is_group_mode(doc: &Document, workspace: usize) -> bool {
    doc.workspaces
        .get(workspace)
        .map(|w| w.group_mode.is_some())
        .unwrap_or(false)
}

/// Switch a workspace between normal and group mode. Returns whether the
/// workspace is in group mode afterwards.
pub fn toggle_group_mode(
    doc: &mut Document,
    workspace: usize,
    scene: SceneId,
    prefs: &Preferences,
) -> CoreResult<bool> {
    let ws = doc
        .workspaces
        .get(workspace)
        .ok_or_else(|| CoreError::not_found(format!("workspace #{}", workspace)))?;
    match ws.group_mode.clone() {
        None => {
            enter_group_mode(doc, workspace, scene, prefs)?;
            Ok(true)
        }
        Some(snapshot) => {
            exit_group_mode(doc, workspace, snapshot, prefs)?;
            Ok(false)
        }
    }
}

fn enter_group_mode(doc: &mut Document, workspace: usize, scene: SceneId, prefs: &Preferences) -> CoreResult<()> {
    let empties = scene_group_empties(doc, scene);
    let empty_visibility = empties
        .iter()
        .map(|id| Ok((*id, doc.object_visibility(*id)?)))
        .collect::<CoreResult<Vec<_>>>()?;
    let snapshot = GroupModeSnapshot {
        scene,
        outliner: doc.workspaces[workspace].outliner.clone(),
        scene_group: doc.scene(scene)?.group.clone(),
        empty_visibility,
    };

    let ws = &mut doc.workspaces[workspace];
    ws.outliner.display_mode = OutlinerDisplayMode::ViewLayer;
    ws.outliner.filter = group_mode_filter(prefs);
    ws.group_mode = Some(snapshot);

    let flags = &mut doc.scene_mut(scene)?.group;
    flags.group_select = false;
    flags.group_recursive_select = false;
    flags.group_hide = false;
    flags.show_group_gizmos = false;
    flags.draw_group_relations = true;

    for &id in &empties {
        doc.set_visibility(id, Some(false), None)?;
    }
    info!(workspace, groups = empties.len(), "Entered outliner group mode");
    Ok(())
}

fn exit_group_mode(
    doc: &mut Document,
    workspace: usize,
    snapshot: GroupModeSnapshot,
    prefs: &Preferences,
) -> CoreResult<()> {
    let ws = &mut doc.workspaces[workspace];
    ws.outliner = snapshot.outliner;
    ws.group_mode = None;

    if let Ok(scene) = doc.scene_mut(snapshot.scene) {
        scene.group = snapshot.scene_group;
    }
    for (id, visibility) in snapshot.empty_visibility {
        if let Some(obj) = doc.objects.get_mut(&id) {
            obj.visibility = visibility;
        }
    }
    if doc.scenes.contains_key(&snapshot.scene) {
        clean_up_groups(doc, snapshot.scene, prefs)?;
    }
    info!(workspace, "Left outliner group mode");
    Ok(())
}
