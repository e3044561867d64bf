//! Removing assembly assets and their instances

use assemblage_core::{CollectionId, CoreError, CoreResult, Document, ObjectId, SceneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::disassemble::{disassemble, remove_assembly_collection};
use crate::packager::LEGACY_ASSET_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoveMode {
    /// Delete the instances, keep the marked asset
    #[default]
    InstancesOnly,
    /// Delete the asset with its collection and everything only it holds
    Entire,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveReport {
    pub removed_instances: usize,
    pub removed_objects: usize,
    pub removed_collections: Vec<CollectionId>,
    /// Objects of legacy assets turned into scene objects instead of being deleted
    pub disassembled: Vec<ObjectId>,
    /// Legacy instancers that were disassembled
    pub legacy_disassembled: usize,
}

/// Assets packaged before asset collections existed
pub fn is_legacy_asset(doc: &Document, instancer: ObjectId) -> bool {
    let Some(obj) = doc.objects.get(&instancer) else {
        return false;
    };
    let Some(col) = obj.instance_collection.and_then(|c| doc.collections.get(&c)) else {
        return false;
    };
    let legacy_version = obj.asset_version.as_deref().map_or(true, |v| v == LEGACY_ASSET_VERSION);
    legacy_version && !col.is_asset_collection
}

pub fn remove_assembly(
    doc: &mut Document,
    scene: SceneId,
    instancers: &[ObjectId],
    mode: RemoveMode,
    use_originals: bool,
) -> CoreResult<RemoveReport> {
    let targets: Vec<ObjectId> = instancers
        .iter()
        .copied()
        .filter(|id| doc.objects.get(id).map(|o| o.is_instancer()).unwrap_or(false))
        .collect();
    if targets.is_empty() {
        return Err(CoreError::illegal_selection("no assembly instance selected"));
    }
    let mut report = RemoveReport::default();

    match mode {
        RemoveMode::InstancesOnly => {
            for id in targets {
                if doc.object(id)?.is_asset() {
                    continue;
                }
                doc.remove_object(id)?;
                report.removed_instances += 1;
            }
        }
        RemoveMode::Entire => {
            let (legacy, current): (Vec<ObjectId>, Vec<ObjectId>) =
                targets.into_iter().partition(|id| is_legacy_asset(doc, *id));
            if !legacy.is_empty() {
                let disassembled = disassemble(doc, scene, &legacy, use_originals)?;
                warn!(count = legacy.len(), "Legacy assemblies were disassembled instead of removed");
                report.legacy_disassembled = legacy.len();
                report.disassembled = disassembled.objects;
                report.removed_collections.extend(disassembled.removed_collections);
            }

            let collections: BTreeSet<CollectionId> = current
                .iter()
                .filter_map(|id| doc.objects.get(id).and_then(|o| o.instance_collection))
                .collect();
            for collection in collections {
                if doc.collection(collection)?.is_linked() {
                    return Err(CoreError::LinkedAsset(format!("collection {}", collection)));
                }
                for user in doc.collection_users(collection) {
                    doc.remove_object(user)?;
                    report.removed_instances += 1;
                }
                let (objects, removed) = remove_assembly_collection(doc, collection)?;
                report.removed_objects += objects;
                report.removed_collections.extend(removed);
            }
        }
    }

    info!(
        mode = ?mode,
        instances = report.removed_instances,
        objects = report.removed_objects,
        disassembled = report.disassembled.len(),
        "Removed assemblies"
    );
    Ok(report)
}
