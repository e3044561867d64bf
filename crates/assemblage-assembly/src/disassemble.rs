//! Turning assembly instances back into scene objects

use assemblage_core::tags::{TAG_HIDE, TAG_HIDE_VIEWPORT};
use assemblage_core::{CollectionId, CoreError, CoreResult, Document, ObjectId, RigidBodyWorld, SceneId};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::thumbnail::instance_matrix;

/// Name of the collection created for a missing rigid body world
pub const RIGID_BODY_COLLECTION: &str = "RigidBodyWorld";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisassembleReport {
    /// Objects now in the scene
    pub objects: Vec<ObjectId>,
    pub removed_instancers: Vec<ObjectId>,
    pub removed_collections: Vec<CollectionId>,
    /// Rigid bodies were re-added and the point cache has to be re-baked
    pub needs_bake: bool,
}

/// Objects inside `collection` that no collection outside of it links
fn exclusive_objects(doc: &Document, collection: CollectionId) -> Vec<ObjectId> {
    doc.all_objects(collection)
        .into_iter()
        .filter(|id| {
            doc.users_collection(*id)
                .iter()
                .all(|c| doc.collection_contains(collection, *c))
        })
        .collect()
}

/// Delete an assembly collection, the objects only it holds and its child
/// collections with no other parent
pub(crate) fn remove_assembly_collection(
    doc: &mut Document,
    collection: CollectionId,
) -> CoreResult<(usize, Vec<CollectionId>)> {
    let objects = exclusive_objects(doc, collection);
    for id in &objects {
        if doc.objects.contains_key(id) {
            doc.remove_object(*id)?;
        }
    }
    let mut removed = Vec::new();
    let mut stack = vec![collection];
    while let Some(id) = stack.pop() {
        let children = doc.collection(id)?.children.clone();
        doc.remove_collection(id)?;
        removed.push(id);
        for child in children {
            if doc.collections.contains_key(&child) && doc.collection_parents(child).is_empty() {
                stack.push(child);
            }
        }
    }
    Ok((objects.len(), removed))
}

fn restore_visibility(doc: &mut Document, id: ObjectId) -> CoreResult<()> {
    let obj = doc.object_mut(id)?;
    if let Some(hide) = obj.remove_tag(TAG_HIDE).and_then(|v| v.as_bool()) {
        obj.visibility.hide = hide;
    }
    if let Some(hide_viewport) = obj.remove_tag(TAG_HIDE_VIEWPORT).and_then(|v| v.as_bool()) {
        obj.visibility.hide_viewport = hide_viewport;
    }
    Ok(())
}

/// Make sure `scene` has a rigid body world and add `objects` to it
fn ensure_rigid_bodies(doc: &mut Document, scene: SceneId, objects: &[ObjectId]) -> CoreResult<()> {
    let world = doc.scene(scene)?.rigidbody_world.clone();
    let collection = match world {
        Some(world) => world.collection,
        None => {
            let collection = doc.new_collection(RIGID_BODY_COLLECTION);
            let s = doc.scene(scene)?;
            let world = RigidBodyWorld {
                collection,
                frame_start: s.frame_start,
                frame_end: s.frame_end,
                needs_bake: false,
            };
            doc.scene_mut(scene)?.rigidbody_world = Some(world);
            debug!(scene = %scene, "Created rigid body world");
            collection
        }
    };
    for &id in objects {
        doc.link_object(collection, id)?;
    }
    if let Some(world) = doc.scene_mut(scene)?.rigidbody_world.as_mut() {
        world.needs_bake = true;
    }
    Ok(())
}

/// Replace assembly instances with real objects in the scene's current
/// collection.
///
/// Root objects get `instancer_world ∘ offset⁻¹ ∘ inner_world`, so everything
/// stays where the instance showed it. The originals are reused when
/// `use_originals` is set and no other instancer needs them. A collection
/// left without instancers is removed together with the objects only it
/// holds.
pub fn disassemble(
    doc: &mut Document,
    scene: SceneId,
    instancers: &[ObjectId],
    use_originals: bool,
) -> CoreResult<DisassembleReport> {
    let targets: Vec<ObjectId> = instancers
        .iter()
        .copied()
        .filter(|id| doc.objects.get(id).map(|o| o.is_instancer()).unwrap_or(false))
        .collect();
    if targets.is_empty() {
        return Err(CoreError::illegal_selection("no assembly instance selected"));
    }
    for &id in &targets {
        if let Some(col) = doc.object(id)?.instance_collection {
            let col = doc.collection(col)?;
            if col.is_linked() {
                return Err(CoreError::LinkedAsset(format!(
                    "collection '{}' is linked, make it local before disassembling",
                    col.name
                )));
            }
        }
    }

    let target_collection = doc.scene(scene)?.current_collection();
    let mut report = DisassembleReport::default();
    let mut touched = BTreeSet::new();
    let mut rigid = Vec::new();

    for &instancer in &targets {
        let Some(collection) = doc.object(instancer)?.instance_collection else {
            continue;
        };
        let outer = instance_matrix(doc, instancer)?;
        let sources = doc.all_objects(collection);
        let last_user = doc.collection_users(collection).len() == 1;

        let objects: Vec<ObjectId> = if use_originals && last_user {
            for &id in &sources {
                for col in doc.users_collection(id) {
                    if doc.collection_contains(collection, col) {
                        doc.unlink_object(col, id)?;
                    }
                }
            }
            sources.clone()
        } else {
            let map = doc.duplicate_objects(&sources, false, false)?;
            sources.iter().filter_map(|id| map.get(id).copied()).collect()
        };

        let members: BTreeSet<ObjectId> = objects.iter().copied().collect();
        let roots: Vec<(ObjectId, _)> = objects
            .iter()
            .filter(|id| doc.get_parent(**id).map(|p| !members.contains(&p)).unwrap_or(true))
            .map(|id| (*id, doc.world_matrix(*id)))
            .collect();
        for (id, inner) in roots {
            if doc.get_parent(id).is_some() {
                doc.clear_parent(id, false)?;
            }
            doc.set_world_matrix(id, &(outer * inner))?;
        }

        for &id in &objects {
            doc.link_object(target_collection, id)?;
            restore_visibility(doc, id)?;
            if doc.object(id)?.rigid_body.is_some() {
                rigid.push(id);
            }
        }

        doc.remove_object(instancer)?;
        report.removed_instancers.push(instancer);
        report.objects.extend(objects);
        touched.insert(collection);
        debug!(instancer = %instancer, collection = %collection, "Disassembled instance");
    }

    if !rigid.is_empty() {
        ensure_rigid_bodies(doc, scene, &rigid)?;
        report.needs_bake = true;
        warn!(objects = rigid.len(), "Rigid bodies re-added, the simulation needs a re-bake");
    }

    for collection in touched {
        if doc.collections.contains_key(&collection) && doc.collection_users(collection).is_empty() {
            let (_, removed) = remove_assembly_collection(doc, collection)?;
            report.removed_collections.extend(removed);
        }
    }

    info!(
        instancers = report.removed_instancers.len(),
        objects = report.objects.len(),
        removed_collections = report.removed_collections.len(),
        "Disassembled assemblies"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::tests::{hierarchy, setup};
    use crate::packager::{create_assembly, AssemblyLocation, CreateAssemblyOptions, ASSEMBLIES_COLLECTION};
    use assemblage_core::math::{approx_eq, compose};
    use assemblage_core::{Preferences, RigidBody, RigidBodyKind};
    use glam::{DMat4, DQuat, DVec3};

    fn package(doc: &mut Document, scene: SceneId, root: ObjectId) -> crate::packager::AssemblyResult {
        let opts = CreateAssemblyOptions {
            name: "Desk".to_string(),
            location: AssemblyLocation::AverageFloor,
            duplicate: true,
            render_thumbnail: false,
            ..Default::default()
        };
        create_assembly(doc, scene, &[root], &opts, &Preferences::default(), None).unwrap()
    }

    #[test]
    fn test_package_disassemble_round_trip() {
        let (mut doc, scene, col) = setup();
        let h = hierarchy(&mut doc, col);
        let before: Vec<DMat4> = h.iter().map(|id| doc.world_matrix(*id)).collect();
        let result = package(&mut doc, scene, h[0]);

        // hierarchy untouched, asset in place
        let after: Vec<DMat4> = h.iter().map(|id| doc.world_matrix(*id)).collect();
        assert_eq!(before, after);
        let assemblies = doc.find_collection(ASSEMBLIES_COLLECTION).unwrap();
        assert!(doc.collection(result.collection).unwrap().is_asset_collection);
        assert_eq!(doc.collection_parents(result.collection), vec![assemblies]);
        let anchor = doc.object(result.anchor).unwrap();
        assert_eq!(anchor.asset_version.as_deref(), Some("1.2"));
        assert!(anchor.is_asset());
        assert_eq!(anchor.instance_collection, Some(result.collection));

        let report = disassemble(&mut doc, scene, &[result.anchor], false).unwrap();
        assert_eq!(report.objects.len(), 4);
        for (id, world) in report.objects.iter().zip(&before) {
            assert!(approx_eq(&doc.world_matrix(*id), world, 1e-5));
            assert!(doc.collection(col).unwrap().objects.contains(id));
        }
        assert!(!doc.objects.contains_key(&result.anchor));
        assert!(!doc.collections.contains_key(&result.collection));
        assert_eq!(report.removed_collections, vec![result.collection]);
        // the packaged objects went with their collection
        assert!(result.objects.iter().all(|id| !doc.objects.contains_key(id)));
    }

    #[test]
    fn test_disassemble_moved_instance() {
        let (mut doc, scene, col) = setup();
        let h = hierarchy(&mut doc, col);
        let result = package(&mut doc, scene, h[0]);
        let offset = doc.collection(result.collection).unwrap().instance_offset;

        let instance = doc.duplicate_objects(&[result.anchor], false, false).unwrap()[&result.anchor];
        doc.link_object(col, instance).unwrap();
        let placement = compose(DVec3::new(0.0, 10.0, 0.0), DQuat::from_rotation_z(1.0), DVec3::splat(2.0));
        doc.set_world_matrix(instance, &placement).unwrap();
        doc.object_mut(instance).unwrap().asset = None;

        let report = disassemble(&mut doc, scene, &[instance], false).unwrap();
        let expected = placement * DMat4::from_translation(-offset) * doc.world_matrix(h[0]);
        assert!(approx_eq(&doc.world_matrix(report.objects[0]), &expected, 1e-9));
        // the anchor still uses the collection
        assert!(report.removed_collections.is_empty());
        assert!(doc.collections.contains_key(&result.collection));
    }

    #[test]
    fn test_visibility_restored() {
        let (mut doc, scene, col) = setup();
        let h = hierarchy(&mut doc, col);
        doc.object_mut(h[3]).unwrap().visibility.hide = true;
        let result = package(&mut doc, scene, h[0]);
        assert!(doc.object(result.objects[2]).unwrap().visibility.hide);

        let report = disassemble(&mut doc, scene, &[result.anchor], true).unwrap();
        // originals of the asset are reused
        assert_eq!(report.objects, result.objects);
        let wire = doc.object(report.objects[2]).unwrap();
        assert!(!wire.visibility.hide);
        assert!(wire.tag(TAG_HIDE).is_none());
        assert!(doc.object(report.objects[3]).unwrap().visibility.hide);
    }

    #[test]
    fn test_rigid_bodies_flag_bake() {
        let (mut doc, scene, col) = setup();
        let h = hierarchy(&mut doc, col);
        doc.object_mut(h[1]).unwrap().rigid_body = Some(RigidBody {
            kind: RigidBodyKind::Active,
            mass: 1.0,
            enabled: true,
        });
        let result = package(&mut doc, scene, h[0]);
        let report = disassemble(&mut doc, scene, &[result.anchor], false).unwrap();
        assert!(report.needs_bake);
        let world = doc.scene(scene).unwrap().rigidbody_world.clone().unwrap();
        assert!(world.needs_bake);
        assert!(doc.collection(world.collection).unwrap().objects.contains(&report.objects[1]));

        // the rigid body collection survives a purge
        doc.purge_orphans(true);
        assert!(doc.collections.contains_key(&world.collection));
    }

    #[test]
    fn test_linked_collection_rejected() {
        let (mut doc, scene, col) = setup();
        let h = hierarchy(&mut doc, col);
        let result = package(&mut doc, scene, h[0]);
        doc.collection_mut(result.collection).unwrap().library = Some("//assets.blend".to_string());
        let err = disassemble(&mut doc, scene, &[result.anchor], false).unwrap_err();
        assert_eq!(err.label(), "LinkedAsset");

        let err = disassemble(&mut doc, scene, &[h[1]], false).unwrap_err();
        assert_eq!(err.label(), "IllegalSelection");
    }
}
