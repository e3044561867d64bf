//! Editing an assembly collection in its own scene
//!
//! Entering forks a scene holding only the instanced collection, laid out in
//! collection space. The view and cursor are moved by the instance delta so
//! nothing appears to jump; exiting reverses that and deletes the scene.

use assemblage_core::math::{flatten_negative_scale, has_negative_scale, try_inverse};
use assemblage_core::tags::{TAG_HIDE, TAG_HIDE_VIEWPORT};
use assemblage_core::{
    AssemblyEditState, CoreError, CoreResult, DisplayType, Document, ObjectId, Preferences, SceneId,
};
use assemblage_groups::{clean_up_groups, is_group_empty};
use glam::DMat4;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::packager::is_auxiliary;

/// Instancer world matrix without mirroring, composed with the inverse
/// instance offset
pub fn edit_delta(doc: &Document, instancer: ObjectId) -> CoreResult<DMat4> {
    let obj = doc.object(instancer)?;
    let collection = obj
        .instance_collection
        .filter(|_| obj.is_instancer())
        .ok_or_else(|| CoreError::illegal_selection(format!("'{}' does not instance a collection", obj.name)))?;
    let offset = doc.collection(collection)?.instance_offset;
    let mut world = doc.world_matrix(instancer);
    if has_negative_scale(&world) {
        world = flatten_negative_scale(&world);
    }
    Ok(world * DMat4::from_translation(-offset))
}

/// Open the collection instanced by `instancer` in a new edit scene and show
/// it in the window. Returns the edit scene.
pub fn enter_assembly_edit(doc: &mut Document, instancer: ObjectId) -> CoreResult<SceneId> {
    let init_scene = doc.window.scene;
    if doc.scene(init_scene)?.is_assembly_edit_scene() {
        return Err(CoreError::illegal_selection("already editing an assembly"));
    }
    let delta = edit_delta(doc, instancer)?;
    let inverse = try_inverse(&delta, "assembly edit delta")?;
    let obj = doc.object(instancer)?;
    let name = obj.name.clone();
    let Some(collection) = obj.instance_collection else {
        return Err(CoreError::illegal_selection(format!("'{}' does not instance a collection", name)));
    };
    let col = doc.collection(collection)?;
    if col.is_linked() {
        return Err(CoreError::LinkedAsset(format!(
            "collection '{}' is linked and cannot be edited",
            col.name
        )));
    }
    let init_cursor = doc.scene(init_scene)?.cursor;

    let scene = doc.new_scene_from(&format!("{} (edit)", name), init_scene)?;
    let master = doc.scene(scene)?.master_collection;
    doc.link_child_collection(master, collection)?;
    {
        let s = doc.scene_mut(scene)?;
        s.assembly_edit = Some(AssemblyEditState {
            collection,
            init_scene,
            delta_view_mx: delta,
        });
        s.active_collection = Some(collection);
        s.cursor = inverse * init_cursor;
    }

    doc.window.scene = scene;
    doc.window.view.view_matrix *= delta;

    let mut revealed = 0;
    for id in doc.all_objects(collection) {
        let group = is_group_empty(doc, id);
        let obj = doc.object_mut(id)?;
        if (group || obj.group.is_group_anchor) && obj.visibility.hide {
            obj.visibility.hide = false;
            revealed += 1;
        }
    }

    info!(scene = %scene, collection = %collection, revealed, "Entered assembly edit scene");
    Ok(scene)
}

/// Fold changes made in the edit scene back into the assembly collection,
/// return to the initial scene and delete the edit scene.
pub fn exit_assembly_edit(doc: &mut Document, prefs: &Preferences) -> CoreResult<SceneId> {
    let scene = doc.window.scene;
    let state = doc
        .scene(scene)?
        .assembly_edit
        .ok_or_else(|| CoreError::illegal_selection("the window does not show an assembly edit scene"))?;
    doc.scene(state.init_scene)?;
    let inverse = try_inverse(&state.delta_view_mx, "assembly edit delta")?;
    let collection = state.collection;

    let members: BTreeSet<ObjectId> = doc.all_objects(collection).into_iter().collect();
    let outsiders: Vec<ObjectId> = doc
        .scene_objects(scene)?
        .into_iter()
        .filter(|id| !members.contains(id))
        .collect();
    for &id in &outsiders {
        for col in doc.users_collection(id) {
            if !doc.collection(col)?.is_linked() {
                doc.unlink_object(col, id)?;
            }
        }
        doc.link_object(collection, id)?;
        let obj = doc.object_mut(id)?;
        let vis = obj.visibility;
        obj.set_tag(TAG_HIDE, vis.hide);
        obj.set_tag(TAG_HIDE_VIEWPORT, vis.hide_viewport);
    }
    if !outsiders.is_empty() {
        debug!(count = outsiders.len(), "Moved new objects into the assembly");
    }

    clean_up_groups(doc, scene, prefs)?;
    for id in doc.all_objects(collection) {
        let obj = doc.object_mut(id)?;
        if is_auxiliary(obj) {
            obj.visibility.hide = true;
        } else if obj.parent.is_none() && matches!(obj.display_type, DisplayType::Wire | DisplayType::Bounds) {
            obj.visibility.hide = false;
        }
    }

    let cursor = doc.scene(scene)?.cursor;
    doc.scene_mut(state.init_scene)?.cursor = state.delta_view_mx * cursor;
    doc.window.scene = state.init_scene;
    doc.window.view.view_matrix *= inverse;

    let master = doc.scene(scene)?.master_collection;
    doc.unlink_child_collection(master, collection)?;
    doc.remove_scene(scene)?;
    let purged = doc.purge_orphans(false);

    info!(scene = %state.init_scene, collection = %collection, purged, "Left assembly edit scene");
    Ok(state.init_scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::tests::{hierarchy, setup};
    use crate::packager::{create_assembly, CreateAssemblyOptions};
    use assemblage_core::math::{approx_eq, compose, translation};
    use glam::{DQuat, DVec3};

    fn placed_instance(doc: &mut Document, scene: SceneId, scale: DVec3) -> (ObjectId, Vec<ObjectId>) {
        let col = doc.scene(scene).unwrap().current_collection();
        let h = hierarchy(doc, col);
        let opts = CreateAssemblyOptions {
            drop_into_scene: true,
            ..Default::default()
        };
        let result = create_assembly(doc, scene, &[h[0]], &opts, &Preferences::default(), None).unwrap();
        let instance = result.dropped.unwrap();
        let world = compose(DVec3::new(3.0, -2.0, 1.0), DQuat::from_rotation_z(0.7), scale);
        doc.set_world_matrix(instance, &world).unwrap();
        (instance, result.objects)
    }

    #[test]
    fn test_enter_exit_round_trip() {
        let (mut doc, scene, _) = setup();
        let (a, _) = placed_instance(&mut doc, scene, DVec3::splat(1.5));
        let collection = doc.object(a).unwrap().instance_collection.unwrap();
        let object_before = doc.object(a).unwrap().clone();
        let offset_before = doc.collection(collection).unwrap().instance_offset;
        let view_before = doc.window.view.view_matrix;
        let cursor_before = doc.scene(scene).unwrap().cursor;
        let scene_count = doc.scenes.len();

        let edit = enter_assembly_edit(&mut doc, a).unwrap();
        assert_eq!(doc.window.scene, edit);
        assert!(doc.scene(edit).unwrap().is_assembly_edit_scene());
        assert_eq!(doc.scene(edit).unwrap().assembly_edit.unwrap().init_scene, scene);

        let back = exit_assembly_edit(&mut doc, &Preferences::default()).unwrap();
        assert_eq!(back, scene);
        assert_eq!(doc.window.scene, scene);
        assert_eq!(doc.object(a).unwrap(), &object_before);
        assert_eq!(doc.collection(collection).unwrap().instance_offset, offset_before);
        assert!(approx_eq(&doc.window.view.view_matrix, &view_before, 1e-4));
        assert!(approx_eq(&doc.scene(scene).unwrap().cursor, &cursor_before, 1e-9));
        assert_eq!(doc.scenes.len(), scene_count);
        assert!(!doc.scenes.contains_key(&edit));
        assert!(doc.collections.contains_key(&collection));
    }

    #[test]
    fn test_view_keeps_apparent_placement() {
        let (mut doc, scene, _) = setup();
        let (a, objects) = placed_instance(&mut doc, scene, DVec3::ONE);
        let delta = edit_delta(&doc, a).unwrap();
        let apparent = delta.transform_point3(translation(&doc.world_matrix(objects[1])));
        let projected = doc.window.view.project(apparent).unwrap();

        enter_assembly_edit(&mut doc, a).unwrap();
        let inside = translation(&doc.world_matrix(objects[1]));
        let projected_edit = doc.window.view.project(inside).unwrap();
        assert!(projected.abs_diff_eq(projected_edit, 1e-6));
    }

    #[test]
    fn test_outsiders_join_the_assembly() {
        let (mut doc, scene, _) = setup();
        let (a, objects) = placed_instance(&mut doc, scene, DVec3::ONE);
        let collection = doc.object(a).unwrap().instance_collection.unwrap();
        let edit = enter_assembly_edit(&mut doc, a).unwrap();
        let master = doc.scene(edit).unwrap().master_collection;
        let extra = doc.add_cube(master, "Handle", DVec3::new(0.0, 0.0, 3.0), 0.2).unwrap();
        // revealed while editing, hidden again on exit
        doc.object_mut(objects[2]).unwrap().visibility.hide = false;

        exit_assembly_edit(&mut doc, &Preferences::default()).unwrap();
        assert!(doc.collection(collection).unwrap().objects.contains(&extra));
        assert!(doc.object(extra).unwrap().tag(TAG_HIDE).is_some());
        assert!(doc.object(objects[2]).unwrap().visibility.hide);
    }

    #[test]
    fn test_negative_scale_is_flattened() {
        let (mut doc, scene, _) = setup();
        let (a, objects) = placed_instance(&mut doc, scene, DVec3::new(-1.0, 1.0, 1.0));
        let collection = doc.object(a).unwrap().instance_collection.unwrap();
        let offset = doc.collection(collection).unwrap().instance_offset;
        let world = doc.world_matrix(a);
        let view = doc.window.view.view_matrix;
        let origin = doc.window.view.project(translation(&world)).unwrap();
        let members: Vec<DVec3> = objects.iter().map(|id| translation(&doc.world_matrix(*id))).collect();
        let spread: Vec<f64> = members
            .iter()
            .map(|p| {
                let apparent = view.transform_point3(world.transform_point3(*p - offset));
                apparent.distance(view.transform_point3(translation(&world)))
            })
            .collect();

        let delta = edit_delta(&doc, a).unwrap();
        assert!(!has_negative_scale(&delta));
        let edit = enter_assembly_edit(&mut doc, a).unwrap();
        assert!(!has_negative_scale(&doc.scene(edit).unwrap().assembly_edit.unwrap().delta_view_mx));

        // the instance origin stays put on screen and members keep their distance to it
        let inside = doc.window.view.project(offset).unwrap();
        assert!(origin.abs_diff_eq(inside, 1e-6));
        let edit_view = doc.window.view.view_matrix;
        for (p, expected) in members.iter().zip(&spread) {
            let distance = edit_view.transform_point3(*p).distance(edit_view.transform_point3(offset));
            assert!((distance - expected).abs() < 1e-6);
        }
        exit_assembly_edit(&mut doc, &Preferences::default()).unwrap();
    }

    #[test]
    fn test_enter_failures() {
        let (mut doc, scene, _) = setup();
        let (a, objects) = placed_instance(&mut doc, scene, DVec3::ONE);
        assert_eq!(enter_assembly_edit(&mut doc, objects[0]).unwrap_err().label(), "IllegalSelection");
        assert_eq!(exit_assembly_edit(&mut doc, &Preferences::default()).unwrap_err().label(), "IllegalSelection");

        enter_assembly_edit(&mut doc, a).unwrap();
        assert_eq!(enter_assembly_edit(&mut doc, a).unwrap_err().label(), "IllegalSelection");
        exit_assembly_edit(&mut doc, &Preferences::default()).unwrap();

        let collection = doc.object(a).unwrap().instance_collection.unwrap();
        doc.collection_mut(collection).unwrap().library = Some("//lib.blend".to_string());
        assert_eq!(enter_assembly_edit(&mut doc, a).unwrap_err().label(), "LinkedAsset");

        doc.collection_mut(collection).unwrap().library = None;
        doc.object_mut(a).unwrap().scale = DVec3::new(1.0, 0.0, 1.0);
        assert_eq!(enter_assembly_edit(&mut doc, a).unwrap_err().label(), "InvertibleMatrix");
    }
}
