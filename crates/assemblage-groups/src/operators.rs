//! Host operators for group and pose tools

use assemblage_core::{Context, CoreError, CoreResult, Document, ObjectId, Operator, Preferences};

use crate::cleanup::{clean_up_groups, fade_group_sizes};
use crate::create::{create_group, is_boolean_operand, CreateGroupOptions};
use crate::dissolve::dissolve_groups;
use crate::duplicate::duplicate_groups;
use crate::groupify::groupify;
use crate::hierarchy::{group_parent, is_group_empty};
use crate::membership::{add_to_group, remove_from_group, AddToGroupOptions};
use crate::naming::auto_rename_groups;
use crate::outliner::toggle_group_mode;
use crate::poses::{move_pose, remove_pose, retrieve_pose, set_batch_pose, set_pose, update_pose};
use crate::select::{select_group, SelectGroupOptions};

fn selection(doc: &Document) -> CoreResult<Vec<ObjectId>> {
    doc.selected_objects(doc.active_scene())
}

fn selected_group_empties(doc: &Document) -> CoreResult<Vec<ObjectId>> {
    Ok(selection(doc)?
        .into_iter()
        .filter(|id| is_group_empty(doc, *id))
        .collect())
}

fn require_selected_groups(doc: &Document) -> CoreResult<Vec<ObjectId>> {
    let groups = selected_group_empties(doc)?;
    if groups.is_empty() {
        return Err(CoreError::illegal_selection("select at least one group empty"));
    }
    Ok(groups)
}

fn active_group_empty(doc: &Document) -> CoreResult<ObjectId> {
    match doc.active_object(doc.active_scene()) {
        Some(id) if is_group_empty(doc, id) => Ok(id),
        _ => Err(CoreError::illegal_selection("the active object is not a group empty")),
    }
}

/// Explicit pose index, else the empty's selected pose
fn pose_index(doc: &Document, empty: ObjectId, index: Option<usize>) -> CoreResult<usize> {
    if let Some(index) = index {
        return Ok(index);
    }
    let obj = doc.object(empty)?;
    usize::try_from(obj.group.group_pose_idx)
        .map_err(|_| CoreError::not_found(format!("no pose selected on '{}'", obj.name)))
}

#[derive(Debug, Default)]
pub struct CreateGroup {
    pub options: CreateGroupOptions,
}

impl Operator for CreateGroup {
    fn id(&self) -> &'static str {
        "groups.create"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        let selected = selection(doc)?;
        if selected.iter().all(|id| is_boolean_operand(doc, *id)) {
            return Err(CoreError::illegal_selection("select objects to group"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let selected = selection(ctx.doc)?;
        let empty = create_group(ctx.doc, scene, &selected, &self.options, ctx.prefs)?;
        let name = ctx.doc.object(empty)?.name.clone();
        ctx.info(format!("Created group {}", name));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DissolveGroup {
    pub recursive: bool,
}

impl Operator for DissolveGroup {
    fn id(&self) -> &'static str {
        "groups.dissolve"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        require_selected_groups(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let groups = require_selected_groups(ctx.doc)?;
        let report = dissolve_groups(ctx.doc, scene, &groups, self.recursive, ctx.prefs)?;
        ctx.info(format!("Dissolved {} groups", report.locations.len()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Groupify;

impl Operator for Groupify {
    fn id(&self) -> &'static str {
        "groups.groupify"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        let found = selection(doc)?.into_iter().any(|id| {
            doc.objects
                .get(&id)
                .map(|o| o.is_empty() && !o.children.is_empty())
                .unwrap_or(false)
        });
        if !found {
            return Err(CoreError::illegal_selection("select an empty with children"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let selected = selection(ctx.doc)?;
        let converted = groupify(ctx.doc, scene, &selected, ctx.prefs)?;
        ctx.info(format!("Groupified {} empties", converted.len()));
        Ok(())
    }
}

/// Add the selected objects to the active group empty
#[derive(Debug, Default)]
pub struct AddToGroup {
    pub options: AddToGroupOptions,
}

impl Operator for AddToGroup {
    fn id(&self) -> &'static str {
        "groups.add_to"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        let target = active_group_empty(doc)?;
        if !selection(doc)?.iter().any(|id| *id != target) {
            return Err(CoreError::illegal_selection("select objects besides the active group"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let target = active_group_empty(ctx.doc)?;
        let objects: Vec<ObjectId> = selection(ctx.doc)?.into_iter().filter(|id| *id != target).collect();
        let added = add_to_group(ctx.doc, scene, target, &objects, &self.options, ctx.prefs)?;
        ctx.info(format!("Added {} objects to the group", added));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RemoveFromGroup;

impl Operator for RemoveFromGroup {
    fn id(&self) -> &'static str {
        "groups.remove_from"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        if !selection(doc)?.iter().any(|id| group_parent(doc, *id).is_some()) {
            return Err(CoreError::illegal_selection("select grouped objects"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let selected = selection(ctx.doc)?;
        let removed = remove_from_group(ctx.doc, scene, &selected, ctx.prefs)?;
        ctx.info(format!("Removed {} objects from their groups", removed));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DuplicateGroup {
    pub linked: bool,
}

impl Operator for DuplicateGroup {
    fn id(&self) -> &'static str {
        "groups.duplicate"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        require_selected_groups(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let groups = require_selected_groups(ctx.doc)?;
        let map = duplicate_groups(ctx.doc, scene, &groups, self.linked, ctx.prefs)?;
        ctx.info(format!("Duplicated {} objects", map.len()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SelectGroup {
    pub options: SelectGroupOptions,
}

impl Operator for SelectGroup {
    fn id(&self) -> &'static str {
        "groups.select"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        require_selected_groups(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let groups = require_selected_groups(ctx.doc)?;
        select_group(ctx.doc, scene, &groups, &self.options)?;
        Ok(())
    }

    fn undoable(&self) -> bool {
        false
    }
}

/// Run the clean-up pass and re-apply the naming policy
#[derive(Debug, Default)]
pub struct CleanUpGroups;

impl Operator for CleanUpGroups {
    fn id(&self) -> &'static str {
        "groups.clean_up"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        doc.scene(doc.active_scene()).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let report = clean_up_groups(ctx.doc, scene, ctx.prefs)?;
        if ctx.prefs.group_tools_auto_name {
            auto_rename_groups(ctx.doc, scene, ctx.prefs)?;
        }
        if !report.removed.is_empty() {
            ctx.info(format!("Removed empty groups: {}", report.removed.join(", ")));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FadeGroupSizes;

impl Operator for FadeGroupSizes {
    fn id(&self) -> &'static str {
        "groups.fade_sizes"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        doc.scene(doc.active_scene()).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let count = fade_group_sizes(ctx.doc, scene, ctx.prefs)?;
        ctx.info(format!("Faded {} group sizes", count));
        Ok(())
    }
}

/// Record a pose on the active group empty, or a batch pose on it and every
/// group below
#[derive(Debug, Default)]
pub struct SetGroupPose {
    pub name: Option<String>,
    pub batch: bool,
}

impl Operator for SetGroupPose {
    fn id(&self) -> &'static str {
        "groups.set_pose"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        active_group_empty(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let empty = active_group_empty(ctx.doc)?;
        let uuid = if self.batch {
            set_batch_pose(ctx.doc, empty, self.name.as_deref())?
        } else {
            set_pose(ctx.doc, empty, self.name.as_deref(), None, false)?
        };
        ctx.info(format!("Saved pose {}", uuid));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RetrieveGroupPose {
    pub index: Option<usize>,
    pub keep_children_world: bool,
}

impl Operator for RetrieveGroupPose {
    fn id(&self) -> &'static str {
        "groups.retrieve_pose"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        let empty = active_group_empty(doc)?;
        if doc.object(empty)?.group.group_pose_col.is_empty() {
            return Err(CoreError::not_found("the group has no poses"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let empty = active_group_empty(ctx.doc)?;
        let index = pose_index(ctx.doc, empty, self.index)?;
        retrieve_pose(ctx.doc, empty, index, self.keep_children_world)
    }
}

/// Options shared by the batch-aware pose operators
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseBatchOptions {
    pub index: Option<usize>,
    pub propagate_batch: bool,
    pub up: bool,
    pub unlinked: bool,
}

#[derive(Debug, Default)]
pub struct UpdateGroupPose {
    pub options: PoseBatchOptions,
}

impl Operator for UpdateGroupPose {
    fn id(&self) -> &'static str {
        "groups.update_pose"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        active_group_empty(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let empty = active_group_empty(ctx.doc)?;
        let o = self.options;
        let index = pose_index(ctx.doc, empty, o.index)?;
        let count = update_pose(ctx.doc, empty, index, o.propagate_batch, o.up, o.unlinked)?;
        ctx.info(format!("Updated {} poses", count));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RemoveGroupPose {
    pub options: PoseBatchOptions,
}

impl Operator for RemoveGroupPose {
    fn id(&self) -> &'static str {
        "groups.remove_pose"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        active_group_empty(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let empty = active_group_empty(ctx.doc)?;
        let o = self.options;
        let index = pose_index(ctx.doc, empty, o.index)?;
        let count = remove_pose(ctx.doc, empty, index, o.propagate_batch, o.up, o.unlinked)?;
        ctx.info(format!("Removed {} poses", count));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MoveGroupPose {
    pub from: usize,
    pub to: usize,
}

impl Operator for MoveGroupPose {
    fn id(&self) -> &'static str {
        "groups.move_pose"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        active_group_empty(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let empty = active_group_empty(ctx.doc)?;
        move_pose(ctx.doc, empty, self.from, self.to)
    }
}

/// Toggle outliner group mode on the active workspace
#[derive(Debug, Default)]
pub struct ToggleGroupMode;

impl Operator for ToggleGroupMode {
    fn id(&self) -> &'static str {
        "groups.toggle_outliner_group_mode"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        if doc.workspaces.get(doc.active_workspace).is_none() {
            return Err(CoreError::not_found("no active workspace"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let workspace = ctx.doc.active_workspace;
        let on = toggle_group_mode(ctx.doc, workspace, scene, ctx.prefs)?;
        ctx.info(if on { "Outliner group mode on" } else { "Outliner group mode off" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::{nested, setup};
    use assemblage_core::{run_operator, Modifier, ModifierKind, OperatorStatus};
    use glam::DVec3;

    #[test]
    fn test_dissolve_poll_rejects_boolean_operand() {
        let (mut doc, _, col) = setup();
        let prefs = Preferences::default();
        let base = doc.add_cube(col, "Base", DVec3::ZERO, 1.0).unwrap();
        let cutter = doc.add_cube(col, "Cutter", DVec3::X, 0.5).unwrap();
        doc.set_parent(cutter, Some(base), true).unwrap();
        doc.object_mut(base).unwrap().modifiers.push(Modifier {
            name: "Boolean".into(),
            kind: ModifierKind::Boolean { object: Some(cutter) },
            show_viewport: true,
        });
        doc.select(cutter, true).unwrap();
        let before = doc.clone();

        let outcome = run_operator(&mut DissolveGroup::default(), &mut doc, &prefs);
        assert_eq!(outcome.status, OperatorStatus::Cancelled);
        assert_eq!(outcome.label, Some("IllegalSelection"));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_create_then_dissolve() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let a = doc.add_cube(col, "A", DVec3::X, 1.0).unwrap();
        let b = doc.add_cube(col, "B", -DVec3::X, 1.0).unwrap();
        doc.select(a, true).unwrap();
        doc.select(b, true).unwrap();

        let outcome = run_operator(&mut CreateGroup::default(), &mut doc, &prefs);
        assert!(outcome.finished());
        let group = doc.active_object(scene).unwrap();
        assert!(is_group_empty(&doc, group));

        assert!(run_operator(&mut DissolveGroup::default(), &mut doc, &prefs).finished());
        assert!(!doc.objects.contains_key(&group));
        assert_eq!(doc.get_parent(a), None);
    }

    #[test]
    fn test_pose_operators() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, ..] = nested(&mut doc, col);
        doc.set_active(scene, Some(a)).unwrap();

        let mut set = SetGroupPose {
            name: Some("Open".into()),
            batch: true,
        };
        assert!(run_operator(&mut set, &mut doc, &prefs).finished());
        let b = doc.get("B").unwrap();
        assert_eq!(doc.object(b).unwrap().group.group_pose_col.len(), 1);

        let mut remove = RemoveGroupPose {
            options: PoseBatchOptions {
                index: None,
                propagate_batch: true,
                up: false,
                unlinked: false,
            },
        };
        assert!(run_operator(&mut remove, &mut doc, &prefs).finished());
        assert!(doc.object(b).unwrap().group.group_pose_col.is_empty());

        let outcome = run_operator(&mut RetrieveGroupPose::default(), &mut doc, &prefs);
        assert_eq!(outcome.label, Some("NotFound"));
    }

    #[test]
    fn test_add_to_active_group() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let [a, ..] = nested(&mut doc, col);
        let c = doc.add_cube(col, "C", DVec3::ZERO, 1.0).unwrap();
        doc.set_active(scene, Some(a)).unwrap();
        doc.select(a, true).unwrap();
        doc.select(c, true).unwrap();
        assert!(run_operator(&mut AddToGroup::default(), &mut doc, &prefs).finished());
        assert_eq!(doc.get_parent(c), Some(a));

        assert!(run_operator(&mut RemoveFromGroup, &mut doc, &prefs).finished());
        assert_eq!(doc.get_parent(c), None);
    }

    #[test]
    fn test_toggle_group_mode_operator() {
        let (mut doc, _, col) = setup();
        let prefs = Preferences::default();
        nested(&mut doc, col);
        assert!(run_operator(&mut ToggleGroupMode, &mut doc, &prefs).finished());
        assert!(doc.workspaces[0].group_mode.is_some());
        assert!(run_operator(&mut ToggleGroupMode, &mut doc, &prefs).finished());
        assert!(doc.workspaces[0].group_mode.is_none());
    }
}
