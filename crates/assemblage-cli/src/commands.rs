//! Subcommands and their mapping onto host operators

use anyhow::{anyhow, bail, Context as _, Result};
use assemblage_assembly::operators::{
    CreateAssembly, Disassemble, EnterAssemblyEdit, ExitAssemblyEdit, RemoveAssembly, TurnIntoAsset,
};
use assemblage_assembly::{AssemblyLocation, AssemblyScope, CreateAssemblyOptions, RemoveMode, TurnIntoAssetOptions};
use assemblage_core::math::translation;
use assemblage_core::{
    run_modal, run_operator, Document, ModalEvent, ModalOperator, ObjectId, ObjectKind, Operator, OperatorOutcome,
    PoseAxis, Preferences, ReportLevel,
};
use assemblage_groups::operators::{
    AddToGroup, CleanUpGroups, CreateGroup, DissolveGroup, DuplicateGroup, FadeGroupSizes, Groupify, MoveGroupPose,
    PoseBatchOptions, RemoveFromGroup, RemoveGroupPose, RetrieveGroupPose, SelectGroup, SetGroupPose,
    ToggleGroupMode, UpdateGroupPose,
};
use assemblage_groups::{AddToGroupOptions, CreateGroupOptions, GroupOrigin, SelectGroupOptions, TransformGroupSession};
use clap::{Args, Subcommand, ValueEnum};
use glam::{DVec2, DVec3};
use tracing::{debug, warn};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration and an empty document
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Print the scene hierarchy of the document
    Inspect,

    /// Add a cube or an empty to the current collection
    Add {
        name: String,
        #[arg(long, value_enum, default_value = "cube")]
        kind: AddKind,
        /// Location as x,y,z
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true, default_values_t = [0.0, 0.0, 0.0])]
        at: Vec<f64>,
        #[arg(long, default_value_t = 1.0)]
        size: f64,
        /// Parent object, keeping the world transform
        #[arg(long)]
        parent: Option<String>,
    },

    /// Group operations
    #[command(subcommand)]
    Group(GroupCommand),

    /// Group pose operations
    #[command(subcommand)]
    Pose(PoseCommand),

    /// Assembly asset operations
    #[command(subcommand)]
    Assembly(AssemblyCommand),

    /// Outliner display state
    #[command(subcommand)]
    Outliner(OutlinerCommand),
}

#[derive(Subcommand, Debug)]
pub enum OutlinerCommand {
    /// Toggle group mode on the active workspace
    Toggle,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AddKind {
    Cube,
    Empty,
}

/// Objects to select, the last one becomes active
#[derive(Args, Debug, Clone)]
pub struct Selection {
    #[arg(required = true)]
    pub objects: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Group the selected objects under a new group empty
    Create {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value = "average")]
        location: Origin,
        #[arg(long, value_enum, default_value = "world")]
        rotation: Origin,
    },
    /// Remove group empties, keeping their members
    Dissolve {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        recursive: bool,
    },
    /// Turn plain empties with children into group empties
    Groupify {
        #[command(flatten)]
        selection: Selection,
    },
    /// Parent the selection to the active (last) group
    Add {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        realign: bool,
        #[arg(long)]
        add_mirror: bool,
        #[arg(long)]
        add_color: bool,
    },
    /// Take the selection out of its groups
    Remove {
        #[command(flatten)]
        selection: Selection,
    },
    Duplicate {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        linked: bool,
    },
    /// Select groups with their members
    Select {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        unhide: bool,
        #[arg(long)]
        recursive: bool,
    },
    /// Rotate the active group about one of its axes
    Rotate {
        group: String,
        #[arg(long, value_enum, default_value = "z")]
        axis: Axis,
        /// Degrees, counter-clockwise as seen in the view
        #[arg(allow_negative_numbers = true)]
        degrees: f64,
    },
    /// Rename, resize and purge group empties across the scene
    Cleanup,
    /// Scale group empties by depth
    Fade,
}

#[derive(Subcommand, Debug)]
pub enum PoseCommand {
    /// Record a pose on a group empty
    Set {
        group: String,
        #[arg(long)]
        name: Option<String>,
        /// Record a batch pose on the group and every group below
        #[arg(long)]
        batch: bool,
    },
    /// Restore a pose
    Retrieve {
        group: String,
        #[arg(long)]
        index: Option<usize>,
        #[arg(long)]
        keep_children_world: bool,
    },
    /// Overwrite a pose with the current rotation
    Update {
        group: String,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Remove {
        group: String,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Reorder a pose
    Move { group: String, from: usize, to: usize },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct BatchArgs {
    #[arg(long)]
    pub index: Option<usize>,
    /// Apply to every pose sharing the batch
    #[arg(long)]
    pub propagate_batch: bool,
    /// Follow the batch upwards as well
    #[arg(long)]
    pub up: bool,
    /// Include poses whose batch link was broken
    #[arg(long)]
    pub unlinked: bool,
}

#[derive(Subcommand, Debug)]
pub enum AssemblyCommand {
    /// Package the selection into an assembly asset
    Create {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "Assembly")]
        name: String,
        #[arg(long, value_enum, default_value = "average-floor")]
        location: Location,
        #[arg(long, value_enum, default_value = "hierarchy")]
        scope: Scope,
        #[arg(long)]
        catalog: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Package the originals instead of duplicates
        #[arg(long)]
        no_duplicate: bool,
        /// Place an instance next to the originals
        #[arg(long)]
        drop: bool,
    },
    /// Turn a collection instance into an assembly asset
    TurnIntoAsset {
        instance: String,
        #[arg(long)]
        name: Option<String>,
    },
    Remove {
        #[command(flatten)]
        selection: Selection,
        /// Delete the asset and its collection too
        #[arg(long)]
        entire: bool,
    },
    /// Replace instances with real objects
    Disassemble {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        use_originals: Option<bool>,
    },
    /// Open an instance's collection in an edit scene
    Edit { instance: String },
    /// Leave the assembly edit scene
    Exit,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Origin {
    Average,
    AverageFloor,
    Active,
    Cursor,
    World,
}

impl From<Origin> for GroupOrigin {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Average => GroupOrigin::Average,
            Origin::AverageFloor => GroupOrigin::AverageFloor,
            Origin::Active => GroupOrigin::Active,
            Origin::Cursor => GroupOrigin::Cursor,
            Origin::World => GroupOrigin::World,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Location {
    Average,
    AverageFloor,
    Cursor,
    World,
}

impl From<Location> for AssemblyLocation {
    fn from(location: Location) -> Self {
        match location {
            Location::Average => AssemblyLocation::Average,
            Location::AverageFloor => AssemblyLocation::AverageFloor,
            Location::Cursor => AssemblyLocation::Cursor,
            Location::World => AssemblyLocation::World,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Scope {
    Hierarchy,
    Selection,
}

impl From<Scope> for AssemblyScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Hierarchy => AssemblyScope::Hierarchy,
            Scope::Selection => AssemblyScope::Selection,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl From<Axis> for PoseAxis {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::X => PoseAxis::X,
            Axis::Y => PoseAxis::Y,
            Axis::Z => PoseAxis::Z,
        }
    }
}

fn resolve(doc: &Document, name: &str) -> Result<ObjectId> {
    doc.get(name).ok_or_else(|| anyhow!("no object named '{}'", name))
}

/// Replace the selection of the window's scene, the last name is active
pub fn select_names(doc: &mut Document, names: &[String]) -> Result<Vec<ObjectId>> {
    let ids = names.iter().map(|n| resolve(doc, n)).collect::<Result<Vec<_>>>()?;
    let scene = doc.active_scene();
    for id in doc.selected_objects(scene)? {
        doc.select(id, false)?;
    }
    for &id in &ids {
        doc.select(id, true)?;
    }
    doc.set_active(scene, ids.last().copied())?;
    Ok(ids)
}

fn report(outcome: &OperatorOutcome) -> Result<()> {
    for r in &outcome.reports {
        match r.level {
            ReportLevel::Info => println!("{}", r.message),
            ReportLevel::Warning | ReportLevel::Error => warn!(level = %r.level, "{}", r.message),
        }
    }
    if let Some(label) = outcome.label {
        let message = outcome.reports.last().map(|r| r.message.as_str()).unwrap_or_default();
        bail!("{}: {}", label, message);
    }
    Ok(())
}

fn run(op: &mut dyn Operator, doc: &mut Document, prefs: &Preferences) -> Result<()> {
    debug!(operator = op.id(), "Running operator");
    report(&run_operator(op, doc, prefs))
}

fn run_session(op: &mut dyn ModalOperator, doc: &mut Document, prefs: &Preferences, events: &[ModalEvent]) -> Result<()> {
    debug!(operator = op.id(), events = events.len(), "Running modal operator");
    report(&run_modal(op, doc, prefs, events))
}

/// Mouse path sweeping `degrees` around `center`, in region pixels
fn rotation_events(center: DVec2, radius: f64, degrees: f64) -> Vec<ModalEvent> {
    let steps = (degrees.abs() / 15.0).ceil().max(1.0) as usize;
    let mut events: Vec<ModalEvent> = (0..=steps)
        .map(|i| {
            let angle = (degrees * i as f64 / steps as f64).to_radians();
            // region y grows downwards
            ModalEvent::MouseMove {
                x: center.x + radius * angle.cos(),
                y: center.y - radius * angle.sin(),
                ctrl: false,
                shift: false,
            }
        })
        .collect();
    events.push(ModalEvent::Confirm);
    events
}

fn location(at: &[f64]) -> Result<DVec3> {
    match at {
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => bail!("expected a location as x,y,z, got {} values", at.len()),
    }
}

/// Execute one subcommand against the document
pub fn execute(command: Command, doc: &mut Document, prefs: &Preferences) -> Result<()> {
    match command {
        Command::Init { .. } => bail!("init does not operate on a loaded document"),
        Command::Inspect => {
            print!("{}", describe(doc)?);
            Ok(())
        }
        Command::Add { name, kind, at, size, parent } => {
            let collection = doc.scene(doc.active_scene())?.current_collection();
            let at = location(&at)?;
            let id = match kind {
                AddKind::Cube => doc.add_cube(collection, &name, at, size)?,
                AddKind::Empty => doc.add_object(collection, &name, ObjectKind::Empty, at)?,
            };
            if let Some(parent) = parent {
                let parent = resolve(doc, &parent)?;
                doc.set_parent(id, Some(parent), true)?;
            }
            println!("Added {}", doc.object(id)?.name);
            Ok(())
        }
        Command::Group(group) => execute_group(group, doc, prefs),
        Command::Pose(pose) => execute_pose(pose, doc, prefs),
        Command::Assembly(assembly) => execute_assembly(assembly, doc, prefs),
        Command::Outliner(OutlinerCommand::Toggle) => run(&mut ToggleGroupMode, doc, prefs),
    }
}

fn execute_group(command: GroupCommand, doc: &mut Document, prefs: &Preferences) -> Result<()> {
    match command {
        GroupCommand::Create { selection, name, location, rotation } => {
            select_names(doc, &selection.objects)?;
            let mut op = CreateGroup {
                options: CreateGroupOptions {
                    location: location.into(),
                    rotation: rotation.into(),
                    name,
                },
            };
            run(&mut op, doc, prefs)
        }
        GroupCommand::Dissolve { selection, recursive } => {
            select_names(doc, &selection.objects)?;
            run(&mut DissolveGroup { recursive }, doc, prefs)
        }
        GroupCommand::Groupify { selection } => {
            select_names(doc, &selection.objects)?;
            run(&mut Groupify, doc, prefs)
        }
        GroupCommand::Add { selection, realign, add_mirror, add_color } => {
            select_names(doc, &selection.objects)?;
            let mut op = AddToGroup {
                options: AddToGroupOptions { realign, add_mirror, add_color },
            };
            run(&mut op, doc, prefs)
        }
        GroupCommand::Remove { selection } => {
            select_names(doc, &selection.objects)?;
            run(&mut RemoveFromGroup, doc, prefs)
        }
        GroupCommand::Duplicate { selection, linked } => {
            select_names(doc, &selection.objects)?;
            run(&mut DuplicateGroup { linked }, doc, prefs)
        }
        GroupCommand::Select { selection, unhide, recursive } => {
            select_names(doc, &selection.objects)?;
            let mut op = SelectGroup {
                options: SelectGroupOptions { unhide, recursive },
            };
            run(&mut op, doc, prefs)
        }
        GroupCommand::Rotate { group, axis, degrees } => {
            let ids = select_names(doc, &[group])?;
            let origin = translation(&doc.world_matrix(ids[0]));
            let view = &doc.window.view;
            let center = view
                .project(origin)
                .ok_or_else(|| anyhow!("the group origin is behind the view"))?;
            let radius = view.region_width.min(view.region_height) as f64 / 4.0;
            let events = rotation_events(center, radius, degrees);
            run_session(&mut TransformGroupSession::new(axis.into()), doc, prefs, &events)
        }
        GroupCommand::Cleanup => run(&mut CleanUpGroups, doc, prefs),
        GroupCommand::Fade => run(&mut FadeGroupSizes, doc, prefs),
    }
}

fn execute_pose(command: PoseCommand, doc: &mut Document, prefs: &Preferences) -> Result<()> {
    fn options(batch: BatchArgs) -> PoseBatchOptions {
        PoseBatchOptions {
            index: batch.index,
            propagate_batch: batch.propagate_batch,
            up: batch.up,
            unlinked: batch.unlinked,
        }
    }

    match command {
        PoseCommand::Set { group, name, batch } => {
            select_names(doc, &[group])?;
            run(&mut SetGroupPose { name, batch }, doc, prefs)
        }
        PoseCommand::Retrieve { group, index, keep_children_world } => {
            select_names(doc, &[group])?;
            run(&mut RetrieveGroupPose { index, keep_children_world }, doc, prefs)
        }
        PoseCommand::Update { group, batch } => {
            select_names(doc, &[group])?;
            run(&mut UpdateGroupPose { options: options(batch) }, doc, prefs)
        }
        PoseCommand::Remove { group, batch } => {
            select_names(doc, &[group])?;
            run(&mut RemoveGroupPose { options: options(batch) }, doc, prefs)
        }
        PoseCommand::Move { group, from, to } => {
            select_names(doc, &[group])?;
            run(&mut MoveGroupPose { from, to }, doc, prefs)
        }
    }
}

fn execute_assembly(command: AssemblyCommand, doc: &mut Document, prefs: &Preferences) -> Result<()> {
    match command {
        AssemblyCommand::Create {
            selection,
            name,
            location,
            scope,
            catalog,
            tags,
            no_duplicate,
            drop,
        } => {
            select_names(doc, &selection.objects)?;
            let mut op = CreateAssembly {
                options: CreateAssemblyOptions {
                    name,
                    catalog,
                    tags,
                    location: location.into(),
                    scope: scope.into(),
                    duplicate: !no_duplicate,
                    drop_into_scene: drop,
                    ..Default::default()
                },
                renderer: None,
            };
            run(&mut op, doc, prefs)
        }
        AssemblyCommand::TurnIntoAsset { instance, name } => {
            select_names(doc, &[instance])?;
            let mut op = TurnIntoAsset {
                options: TurnIntoAssetOptions {
                    name,
                    ..Default::default()
                },
            };
            run(&mut op, doc, prefs)
        }
        AssemblyCommand::Remove { selection, entire } => {
            select_names(doc, &selection.objects)?;
            let mode = if entire { RemoveMode::Entire } else { RemoveMode::InstancesOnly };
            run(&mut RemoveAssembly { mode }, doc, prefs)
        }
        AssemblyCommand::Disassemble { selection, use_originals } => {
            select_names(doc, &selection.objects)?;
            run(&mut Disassemble { use_originals }, doc, prefs)
        }
        AssemblyCommand::Edit { instance } => {
            select_names(doc, &[instance])?;
            run(&mut EnterAssemblyEdit, doc, prefs)
        }
        AssemblyCommand::Exit => run(&mut ExitAssemblyEdit, doc, prefs),
    }
}

/// Indented outline of the window's scene
pub fn describe(doc: &Document) -> Result<String> {
    let scene_id = doc.active_scene();
    let scene = doc.scene(scene_id).context("window scene")?;
    let mut out = format!("Scene {}\n", scene.name);
    let roots: Vec<ObjectId> = doc
        .scene_objects(scene_id)?
        .into_iter()
        .filter(|id| doc.get_parent(*id).is_none())
        .collect();
    let mut stack: Vec<(ObjectId, usize)> = roots.into_iter().rev().map(|id| (id, 1)).collect();
    while let Some((id, depth)) = stack.pop() {
        let obj = doc.object(id)?;
        let mut flags = Vec::new();
        if obj.group.is_group_empty {
            flags.push(format!("group, {} poses", obj.group.group_pose_col.len()));
        }
        if obj.is_instancer() {
            flags.push("instance".to_string());
        }
        if obj.is_asset() {
            flags.push("asset".to_string());
        }
        if obj.visibility.hide {
            flags.push("hidden".to_string());
        }
        let loc = obj.location;
        out.push_str(&format!(
            "{}{} ({:.3}, {:.3}, {:.3})",
            "  ".repeat(depth),
            obj.name,
            loc.x,
            loc.y,
            loc.z
        ));
        if !flags.is_empty() {
            out.push_str(&format!(" [{}]", flags.join(", ")));
        }
        out.push('\n');
        for child in doc.get_children(id, false).into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(doc: &mut Document, name: &str, at: [f64; 3]) {
        let command = Command::Add {
            name: name.to_string(),
            kind: AddKind::Cube,
            at: at.to_vec(),
            size: 1.0,
            parent: None,
        };
        execute(command, doc, &Preferences::default()).unwrap();
    }

    fn selection(names: &[&str]) -> Selection {
        Selection {
            objects: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_select_names_sets_active() {
        let mut doc = Document::new();
        add(&mut doc, "A", [0.0, 0.0, 0.0]);
        add(&mut doc, "B", [1.0, 0.0, 0.0]);
        let ids = select_names(&mut doc, &["A".to_string(), "B".to_string()]).unwrap();
        let scene = doc.active_scene();
        assert_eq!(doc.active_object(scene), Some(ids[1]));
        assert_eq!(doc.selected_objects(scene).unwrap().len(), 2);

        select_names(&mut doc, &["A".to_string()]).unwrap();
        assert_eq!(doc.selected_objects(scene).unwrap(), vec![ids[0]]);
        assert!(select_names(&mut doc, &["Missing".to_string()]).is_err());
    }

    #[test]
    fn test_group_and_pose_commands() {
        let prefs = Preferences::default();
        let mut doc = Document::new();
        add(&mut doc, "A", [0.0, 0.0, 0.0]);
        add(&mut doc, "B", [2.0, 0.0, 0.0]);
        let create = GroupCommand::Create {
            selection: selection(&["A", "B"]),
            name: Some("Pair".to_string()),
            location: Origin::Average,
            rotation: Origin::World,
        };
        execute(Command::Group(create), &mut doc, &prefs).unwrap();
        let a = doc.get("A").unwrap();
        let group = doc.get_parent(a).unwrap();
        assert!(doc.object(group).unwrap().group.is_group_empty);
        let group_name = doc.object(group).unwrap().name.clone();

        let set = PoseCommand::Set {
            group: group_name.clone(),
            name: Some("Open".to_string()),
            batch: false,
        };
        execute(Command::Pose(set), &mut doc, &prefs).unwrap();
        let poses = doc.object(group).unwrap().group.group_pose_col.len();
        assert!(poses >= 1);

        let text = describe(&doc).unwrap();
        assert!(text.contains(&group_name));
        assert!(text.contains("    A "));
    }

    #[test]
    fn test_rotate_group_command() {
        let prefs = Preferences::default();
        let mut doc = Document::new();
        add(&mut doc, "A", [1.0, 0.0, 0.0]);
        let create = GroupCommand::Create {
            selection: selection(&["A"]),
            name: None,
            location: Origin::World,
            rotation: Origin::World,
        };
        execute(Command::Group(create), &mut doc, &prefs).unwrap();
        let a = doc.get("A").unwrap();
        let group = doc.get_parent(a).unwrap();
        let name = doc.object(group).unwrap().name.clone();
        let before = doc.world_matrix(group);

        let rotate = GroupCommand::Rotate {
            group: name,
            axis: Axis::Z,
            degrees: 90.0,
        };
        execute(Command::Group(rotate), &mut doc, &prefs).unwrap();
        assert_ne!(doc.world_matrix(group), before);
    }

    #[test]
    fn test_failed_operator_is_an_error() {
        let prefs = Preferences::default();
        let mut doc = Document::new();
        add(&mut doc, "A", [0.0, 0.0, 0.0]);
        let count = doc.objects.len();
        let dissolve = GroupCommand::Dissolve {
            selection: selection(&["A"]),
            recursive: false,
        };
        let err = execute(Command::Group(dissolve), &mut doc, &prefs).unwrap_err();
        assert!(err.to_string().starts_with("IllegalSelection"));
        assert_eq!(doc.objects.len(), count);
    }

    #[test]
    fn test_assembly_commands() {
        let prefs = Preferences::default();
        let mut doc = Document::new();
        add(&mut doc, "Base", [0.0, 0.0, 0.0]);
        let create = AssemblyCommand::Create {
            selection: selection(&["Base"]),
            name: "Stool".to_string(),
            location: Location::AverageFloor,
            scope: Scope::Hierarchy,
            catalog: None,
            tags: vec!["furniture".to_string()],
            no_duplicate: false,
            drop: true,
        };
        execute(Command::Assembly(create), &mut doc, &prefs).unwrap();
        let scene = doc.active_scene();
        let dropped = doc.active_object(scene).unwrap();
        let dropped_name = doc.object(dropped).unwrap().name.clone();

        let edit = AssemblyCommand::Edit {
            instance: dropped_name.clone(),
        };
        execute(Command::Assembly(edit), &mut doc, &prefs).unwrap();
        assert_ne!(doc.active_scene(), scene);
        execute(Command::Assembly(AssemblyCommand::Exit), &mut doc, &prefs).unwrap();
        assert_eq!(doc.active_scene(), scene);

        let disassemble = AssemblyCommand::Disassemble {
            selection: selection(&[&dropped_name]),
            use_originals: None,
        };
        execute(Command::Assembly(disassemble), &mut doc, &prefs).unwrap();
        assert!(doc.get(&dropped_name).is_none());
    }

    #[test]
    fn test_add_needs_three_coordinates() {
        let mut doc = Document::new();
        let command = Command::Add {
            name: "A".to_string(),
            kind: AddKind::Empty,
            at: vec![1.0, 2.0],
            size: 1.0,
            parent: None,
        };
        assert!(execute(command, &mut doc, &Preferences::default()).is_err());
        assert!(doc.get("A").is_none());

        add(&mut doc, "Parent", [1.0, 0.0, 0.0]);
        let command = Command::Add {
            name: "Child".to_string(),
            kind: AddKind::Empty,
            at: vec![1.0, -2.0, 0.5],
            size: 1.0,
            parent: Some("Parent".to_string()),
        };
        execute(command, &mut doc, &Preferences::default()).unwrap();
        let child = doc.get("Child").unwrap();
        assert_eq!(doc.get_parent(child), doc.get("Parent"));
        assert!(translation(&doc.world_matrix(child)).abs_diff_eq(DVec3::new(1.0, -2.0, 0.5), 1e-9));
    }

    #[test]
    fn test_outliner_toggle() {
        let prefs = Preferences::default();
        let mut doc = Document::new();
        let workspace = doc.active_workspace;
        execute(Command::Outliner(OutlinerCommand::Toggle), &mut doc, &prefs).unwrap();
        assert!(assemblage_groups::is_group_mode(&doc, workspace));
        execute(Command::Outliner(OutlinerCommand::Toggle), &mut doc, &prefs).unwrap();
        assert!(!assemblage_groups::is_group_mode(&doc, workspace));
    }

    #[test]
    fn test_rotation_events_end_with_confirm() {
        let events = rotation_events(DVec2::new(960.0, 540.0), 270.0, 90.0);
        assert_eq!(events.len(), 8);
        assert_eq!(events.last(), Some(&ModalEvent::Confirm));
        match events[0] {
            ModalEvent::MouseMove { x, y, .. } => {
                assert_eq!(x, 960.0 + 270.0);
                assert_eq!(y, 540.0);
            }
            _ => panic!("expected a mouse move"),
        }
    }
}
