//! Host operators for assembly tools

use assemblage_core::{Context, CoreError, CoreResult, Document, ObjectId, Operator, Preferences, ReportLevel};

use crate::disassemble::disassemble;
use crate::editor::{enter_assembly_edit, exit_assembly_edit};
use crate::legacy::{turn_into_asset, TurnIntoAssetOptions};
use crate::packager::{create_assembly, CreateAssemblyOptions};
use crate::remove::{remove_assembly, RemoveMode};
use crate::thumbnail::ThumbnailRenderer;

fn selection(doc: &Document) -> CoreResult<Vec<ObjectId>> {
    doc.selected_objects(doc.active_scene())
}

fn selected_instancers(doc: &Document) -> CoreResult<Vec<ObjectId>> {
    let instancers: Vec<ObjectId> = selection(doc)?
        .into_iter()
        .filter(|id| doc.objects.get(id).map(|o| o.is_instancer()).unwrap_or(false))
        .collect();
    if instancers.is_empty() {
        return Err(CoreError::illegal_selection("select at least one assembly instance"));
    }
    Ok(instancers)
}

fn active_instancer(doc: &Document) -> CoreResult<ObjectId> {
    match doc.active_object(doc.active_scene()) {
        Some(id) if doc.objects.get(&id).map(|o| o.is_instancer()).unwrap_or(false) => Ok(id),
        _ => Err(CoreError::illegal_selection("the active object does not instance a collection")),
    }
}

/// Package the selection into an assembly asset
#[derive(Default)]
pub struct CreateAssembly {
    pub options: CreateAssemblyOptions,
    /// Viewport render used for the thumbnail
    pub renderer: Option<Box<dyn ThumbnailRenderer>>,
}

impl Operator for CreateAssembly {
    fn id(&self) -> &'static str {
        "assembly.create"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        if selection(doc)?.is_empty() {
            return Err(CoreError::illegal_selection("select objects to package"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let selected = selection(ctx.doc)?;
        let renderer: Option<&mut dyn ThumbnailRenderer> = match self.renderer.as_mut() {
            Some(renderer) => Some(&mut **renderer),
            None => None,
        };
        let result = create_assembly(ctx.doc, scene, &selected, &self.options, ctx.prefs, renderer)?;
        for warning in &result.warnings {
            ctx.warn(warning);
        }
        let name = ctx.doc.object(result.anchor)?.name.clone();
        ctx.info(format!("Created assembly {} from {} objects", name, result.objects.len()));
        Ok(())
    }
}

/// Turn the active collection instance into an assembly asset
#[derive(Debug, Default)]
pub struct TurnIntoAsset {
    pub options: TurnIntoAssetOptions,
}

impl Operator for TurnIntoAsset {
    fn id(&self) -> &'static str {
        "assembly.turn_into_asset"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        active_instancer(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let instancer = active_instancer(ctx.doc)?;
        let anchor = turn_into_asset(ctx.doc, instancer, &self.options, ctx.prefs)?;
        let name = ctx.doc.object(anchor)?.name.clone();
        ctx.info(format!("Created asset {}", name));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RemoveAssembly {
    pub mode: RemoveMode,
}

impl Operator for RemoveAssembly {
    fn id(&self) -> &'static str {
        "assembly.remove"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        selected_instancers(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let instancers = selected_instancers(ctx.doc)?;
        let use_originals = ctx.prefs.assetbrowser_tools_use_originals;
        let report = remove_assembly(ctx.doc, scene, &instancers, self.mode, use_originals)?;
        if report.legacy_disassembled > 0 {
            ctx.report(
                ReportLevel::Warning,
                format!(
                    "{} legacy assemblies were disassembled instead of removed",
                    report.legacy_disassembled
                ),
            );
        }
        ctx.info(format!(
            "Removed {} instances and {} objects",
            report.removed_instances, report.removed_objects
        ));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Disassemble {
    /// Reuse the asset's objects, the preference when unset
    pub use_originals: Option<bool>,
}

impl Operator for Disassemble {
    fn id(&self) -> &'static str {
        "assembly.disassemble"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        selected_instancers(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = ctx.scene();
        let instancers = selected_instancers(ctx.doc)?;
        let use_originals = self.use_originals.unwrap_or(ctx.prefs.assetbrowser_tools_use_originals);
        let report = disassemble(ctx.doc, scene, &instancers, use_originals)?;
        if report.needs_bake {
            ctx.warn(&CoreError::ExternalDependency(
                "rigid bodies were re-added, bake the simulation again".to_string(),
            ));
        }
        ctx.info(format!("Disassembled into {} objects", report.objects.len()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EnterAssemblyEdit;

impl Operator for EnterAssemblyEdit {
    fn id(&self) -> &'static str {
        "assembly.edit_enter"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        if doc.scene(doc.window.scene)?.is_assembly_edit_scene() {
            return Err(CoreError::illegal_selection("already editing an assembly"));
        }
        active_instancer(doc).map(|_| ())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let instancer = active_instancer(ctx.doc)?;
        let scene = enter_assembly_edit(ctx.doc, instancer)?;
        let name = ctx.doc.scene(scene)?.name.clone();
        ctx.info(format!("Editing in {}", name));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ExitAssemblyEdit;

impl Operator for ExitAssemblyEdit {
    fn id(&self) -> &'static str {
        "assembly.edit_exit"
    }

    fn poll(&self, doc: &Document, _prefs: &Preferences) -> CoreResult<()> {
        if !doc.scene(doc.window.scene)?.is_assembly_edit_scene() {
            return Err(CoreError::illegal_selection("not in an assembly edit scene"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context<'_>) -> CoreResult<()> {
        let scene = exit_assembly_edit(ctx.doc, ctx.prefs)?;
        let name = ctx.doc.scene(scene)?.name.clone();
        ctx.info(format!("Back in {}", name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::tests::{hierarchy, setup};
    use crate::thumbnail::tests::GradientRenderer;
    use assemblage_core::{run_operator, OperatorStatus};

    #[test]
    fn test_create_with_renderer() {
        let (mut doc, scene, col) = setup();
        let h = hierarchy(&mut doc, col);
        doc.select(h[1], true).unwrap();
        let mut op = CreateAssembly {
            options: CreateAssemblyOptions {
                name: "Lamp".to_string(),
                render_thumbnail: true,
                drop_into_scene: true,
                ..Default::default()
            },
            renderer: Some(Box::new(GradientRenderer { calls: 0 })),
        };
        let outcome = run_operator(&mut op, &mut doc, &Preferences::default());
        assert!(outcome.finished());
        let anchor = doc.get("Lamp").unwrap();
        assert!(doc.object(anchor).unwrap().preview.is_some());
        let dropped = doc.active_object(scene).unwrap();
        assert!(doc.object(dropped).unwrap().is_instancer());
    }

    #[test]
    fn test_create_reports_missing_renderer() {
        let (mut doc, _, col) = setup();
        let h = hierarchy(&mut doc, col);
        doc.select(h[0], true).unwrap();
        let mut op = CreateAssembly {
            options: CreateAssemblyOptions {
                render_thumbnail: true,
                ..Default::default()
            },
            renderer: None,
        };
        let outcome = run_operator(&mut op, &mut doc, &Preferences::default());
        assert!(outcome.finished());
        assert!(outcome.reports.iter().any(|r| r.level == ReportLevel::Warning));
    }

    #[test]
    fn test_edit_round_trip_operators() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let h = hierarchy(&mut doc, col);
        doc.select(h[0], true).unwrap();
        let mut create = CreateAssembly {
            options: CreateAssemblyOptions {
                drop_into_scene: true,
                ..Default::default()
            },
            renderer: None,
        };
        assert!(run_operator(&mut create, &mut doc, &prefs).finished());

        assert!(run_operator(&mut ExitAssemblyEdit, &mut doc, &prefs).label.is_some());
        assert!(run_operator(&mut EnterAssemblyEdit, &mut doc, &prefs).finished());
        assert_ne!(doc.window.scene, scene);
        assert!(run_operator(&mut ExitAssemblyEdit, &mut doc, &prefs).finished());
        assert_eq!(doc.window.scene, scene);
    }

    #[test]
    fn test_disassemble_and_remove_need_instances() {
        let (mut doc, _, col) = setup();
        let prefs = Preferences::default();
        let h = hierarchy(&mut doc, col);
        doc.select(h[0], true).unwrap();
        let before = doc.clone();

        let outcome = run_operator(&mut Disassemble::default(), &mut doc, &prefs);
        assert_eq!(outcome.status, OperatorStatus::Cancelled);
        assert_eq!(outcome.label, Some("IllegalSelection"));
        let outcome = run_operator(&mut RemoveAssembly::default(), &mut doc, &prefs);
        assert_eq!(outcome.label, Some("IllegalSelection"));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_remove_legacy_reports_a_plain_warning() {
        use crate::packager::LEGACY_ASSET_VERSION;
        use assemblage_core::{InstanceType, ObjectKind};
        use glam::DVec3;

        let (mut doc, _, col) = setup();
        let legacy = doc.new_collection("Old");
        doc.add_cube(legacy, "Crate", DVec3::ZERO, 1.0).unwrap();
        let inst = doc.add_object(col, "Old", ObjectKind::Empty, DVec3::ZERO).unwrap();
        {
            let obj = doc.object_mut(inst).unwrap();
            obj.instance_type = InstanceType::Collection;
            obj.instance_collection = Some(legacy);
            obj.asset_version = Some(LEGACY_ASSET_VERSION.to_string());
        }
        doc.select(inst, true).unwrap();

        let mut op = RemoveAssembly { mode: RemoveMode::Entire };
        let outcome = run_operator(&mut op, &mut doc, &Preferences::default());
        assert!(outcome.finished());
        assert_eq!(outcome.label, None);
        let warning = outcome
            .reports
            .iter()
            .find(|r| r.level == ReportLevel::Warning)
            .unwrap();
        assert!(warning.message.contains("disassembled"));
        assert!(!warning.message.contains("Illegal"));
    }

    #[test]
    fn test_disassemble_dropped_instance() {
        let (mut doc, scene, col) = setup();
        let prefs = Preferences::default();
        let h = hierarchy(&mut doc, col);
        doc.select(h[0], true).unwrap();
        let mut create = CreateAssembly {
            options: CreateAssemblyOptions {
                drop_into_scene: true,
                ..Default::default()
            },
            renderer: None,
        };
        run_operator(&mut create, &mut doc, &prefs);
        let dropped = doc.active_object(scene).unwrap();

        let outcome = run_operator(&mut Disassemble::default(), &mut doc, &prefs);
        assert!(outcome.finished());
        assert!(!doc.objects.contains_key(&dropped));
        assert_eq!(doc.selected_objects(scene).unwrap().len(), 0);
    }
}
