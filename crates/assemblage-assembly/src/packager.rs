//! Packaging object hierarchies into assembly assets
//!
//! An assembly is a collection under `_Assemblies` holding the packaged
//! objects, plus an asset-marked anchor empty that instances it. Neither is
//! linked into a scene; fake users keep them alive.

use assemblage_core::math::{mean, translation};
use assemblage_core::tags::{TAG_DECAL_BACKUP, TAG_HIDE, TAG_HIDE_VIEWPORT, TAG_STASH_OBJECT};
use assemblage_core::{
    AssetData, CollectionId, ColorTag, CoreError, CoreResult, DisplayType, Document, InstanceType, Object, ObjectId,
    ObjectKind, Preferences, SceneId, ADDON_DECALS, ADDON_STASHES,
};
use assemblage_groups::hierarchy::parent_chain;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::thumbnail::{render_thumbnail, ThumbnailRenderer};

/// Top-level collection holding every assembly collection
pub const ASSEMBLIES_COLLECTION: &str = "_Assemblies";
/// Version written on anchors created by the packager
pub const ASSET_VERSION: &str = "1.2";
/// Version of instance-collection assets packaged without an asset collection
pub const LEGACY_ASSET_VERSION: &str = "1.0";

/// Share of the smallest asset dimension used as anchor display size
const ANCHOR_SIZE_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssemblyScope {
    /// Whole hierarchies the selection belongs to
    #[default]
    Hierarchy,
    /// The selection and its children
    Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssemblyLocation {
    #[serde(rename = "AVG")]
    Average,
    #[default]
    #[serde(rename = "AVGFLOOR")]
    AverageFloor,
    Cursor,
    World,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateAssemblyOptions {
    pub name: String,
    /// Catalog id, the preferred default catalog when unset
    pub catalog: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub license: Option<String>,
    pub description: String,
    pub location: AssemblyLocation,
    pub scope: AssemblyScope,
    /// Package copies and leave the selection untouched
    pub duplicate: bool,
    pub keep_decal_backups: bool,
    pub keep_stash_objects: bool,
    pub drop_into_scene: bool,
    pub render_thumbnail: bool,
}

impl Default for CreateAssemblyOptions {
    fn default() -> Self {
        Self {
            name: "Assembly".to_string(),
            catalog: None,
            tags: Vec::new(),
            author: None,
            copyright: None,
            license: None,
            description: String::new(),
            location: AssemblyLocation::default(),
            scope: AssemblyScope::default(),
            duplicate: true,
            keep_decal_backups: false,
            keep_stash_objects: false,
            drop_into_scene: false,
            render_thumbnail: false,
        }
    }
}

impl CreateAssemblyOptions {
    fn asset_data(&self, prefs: &Preferences) -> AssetData {
        AssetData {
            catalog_id: self
                .catalog
                .clone()
                .unwrap_or_else(|| prefs.assetbrowser_tools_preferred_default_catalog.clone()),
            tags: self.tags.clone(),
            author: self.author.clone().unwrap_or_else(|| prefs.assetbrowser_tools_meta_author.clone()),
            copyright: self
                .copyright
                .clone()
                .unwrap_or_else(|| prefs.assetbrowser_tools_meta_copyright.clone()),
            license: self.license.clone().unwrap_or_else(|| prefs.assetbrowser_tools_meta_license.clone()),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyResult {
    pub anchor: ObjectId,
    pub collection: CollectionId,
    /// Objects inside the assembly collection
    pub objects: Vec<ObjectId>,
    /// Instance placed into the scene
    pub dropped: Option<ObjectId>,
    /// Skipped branches, e.g. a missing integration
    pub warnings: Vec<CoreError>,
}

/// Objects a selection packages under `scope`, in hierarchy order
pub fn resolve_scope(doc: &Document, selection: &[ObjectId], scope: AssemblyScope) -> Vec<ObjectId> {
    let mut seen = BTreeSet::new();
    let mut result = Vec::new();
    for &id in selection {
        let root = match scope {
            AssemblyScope::Hierarchy => parent_chain(doc, id).last().copied().unwrap_or(id),
            AssemblyScope::Selection => id,
        };
        for obj in std::iter::once(root).chain(doc.get_children(root, true)) {
            if seen.insert(obj) {
                result.push(obj);
            }
        }
    }
    result
}

/// Child objects that only support the main geometry: wire and bounds
/// display, or empties
pub fn is_auxiliary(obj: &Object) -> bool {
    obj.parent.is_some()
        && (matches!(obj.display_type, DisplayType::Wire | DisplayType::Bounds) || obj.kind == ObjectKind::Empty)
}

/// Origin of the anchor for a packaged set
pub fn anchor_location(
    doc: &Document,
    scene: SceneId,
    objects: &[ObjectId],
    location: AssemblyLocation,
) -> CoreResult<DVec3> {
    let origins: Vec<DVec3> = objects.iter().map(|id| translation(&doc.world_matrix(*id))).collect();
    let average = mean(&origins).unwrap_or(DVec3::ZERO);
    Ok(match location {
        AssemblyLocation::Average => average,
        AssemblyLocation::AverageFloor => DVec3::new(average.x, average.y, 0.0),
        AssemblyLocation::Cursor => translation(&doc.scene(scene)?.cursor),
        AssemblyLocation::World => DVec3::ZERO,
    })
}

/// The local `_Assemblies` collection, created on first use
pub fn assemblies_collection(doc: &mut Document) -> CoreResult<CollectionId> {
    let existing = doc
        .collections
        .values()
        .find(|c| c.name == ASSEMBLIES_COLLECTION && !c.is_linked())
        .map(|c| c.id);
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = doc.new_collection(ASSEMBLIES_COLLECTION);
    doc.collection_mut(id)?.use_fake_user = true;
    debug!(collection = %id, "Created assemblies collection");
    Ok(id)
}

/// Drop objects carrying `tag` unless the companion integration is missing
fn prune_companions(
    doc: &mut Document,
    objects: &mut Vec<ObjectId>,
    tag: &str,
    addon: &str,
    remove: bool,
    warnings: &mut Vec<CoreError>,
) -> CoreResult<()> {
    let tagged: Vec<ObjectId> = objects
        .iter()
        .copied()
        .filter(|id| doc.objects.get(id).map(|o| o.tag_bool(tag)).unwrap_or(false))
        .collect();
    if tagged.is_empty() {
        return Ok(());
    }
    if !doc.has_addon(addon) {
        warnings.push(CoreError::ExternalDependency(format!(
            "{} is not available, keeping {} '{}' objects",
            addon,
            tagged.len(),
            tag
        )));
        return Ok(());
    }
    objects.retain(|id| !tagged.contains(id));
    if remove {
        for id in &tagged {
            doc.remove_object(*id)?;
        }
    }
    debug!(tag, count = tagged.len(), "Pruned companion objects");
    Ok(())
}

/// Package `selection` into a new assembly asset.
///
/// Packaged objects keep their world transforms; the anchor sits at the
/// chosen location and the collection's instance offset matches it, so an
/// instance at the anchor shows the objects where they were.
pub fn create_assembly(
    doc: &mut Document,
    scene: SceneId,
    selection: &[ObjectId],
    opts: &CreateAssemblyOptions,
    prefs: &Preferences,
    renderer: Option<&mut dyn ThumbnailRenderer>,
) -> CoreResult<AssemblyResult> {
    if selection.is_empty() {
        return Err(CoreError::illegal_selection("nothing selected to package"));
    }
    let name = opts.name.trim();
    if name.is_empty() {
        return Err(CoreError::illegal_selection("an assembly needs a name"));
    }
    let sources = resolve_scope(doc, selection, opts.scope);
    let location = anchor_location(doc, scene, &sources, opts.location)?;
    let mut warnings = Vec::new();

    let duplicate = opts.duplicate && !prefs.assetbrowser_tools_use_originals;
    let mut objects = if duplicate {
        let map = doc.duplicate_objects(&sources, false, false)?;
        sources.iter().filter_map(|id| map.get(id).copied()).collect()
    } else {
        sources.clone()
    };

    for &id in &objects {
        let obj = doc.object_mut(id)?;
        let vis = obj.visibility;
        obj.set_tag(TAG_HIDE, vis.hide);
        obj.set_tag(TAG_HIDE_VIEWPORT, vis.hide_viewport);
    }
    if !opts.keep_decal_backups {
        prune_companions(doc, &mut objects, TAG_DECAL_BACKUP, ADDON_DECALS, duplicate, &mut warnings)?;
    }
    if !opts.keep_stash_objects {
        prune_companions(doc, &mut objects, TAG_STASH_OBJECT, ADDON_STASHES, duplicate, &mut warnings)?;
    }
    if objects.is_empty() {
        return Err(CoreError::illegal_selection("nothing left to package"));
    }
    // the asset must not hang off a scene object it does not contain
    for &id in &objects {
        if let Some(parent) = doc.get_parent(id) {
            if !objects.contains(&parent) && !doc.object(id)?.is_linked() {
                doc.clear_parent(id, true)?;
            }
        }
    }

    let assemblies = assemblies_collection(doc)?;
    let collection = doc.new_collection(&format!("_{}", name));
    {
        let col = doc.collection_mut(collection)?;
        col.is_asset_collection = true;
        col.color_tag = ColorTag::for_name(name);
        col.instance_offset = location;
    }
    doc.link_child_collection(assemblies, collection)?;

    for &id in &objects {
        for col in doc.users_collection(id) {
            if !doc.collection(col)?.is_linked() {
                doc.unlink_object(col, id)?;
            }
        }
        doc.link_object(collection, id)?;
        if is_auxiliary(doc.object(id)?) {
            doc.set_visibility(id, Some(true), None)?;
        }
    }

    let bounds = doc.world_bounds(&objects);
    let display_size = bounds
        .map(|b| b.dimensions())
        .and_then(|d| d.to_array().into_iter().filter(|v| *v > 1e-6).reduce(f64::min))
        .map(|min| ANCHOR_SIZE_FACTOR * min)
        .unwrap_or(1.0);

    let anchor = doc.new_object(name, ObjectKind::Empty);
    {
        let obj = doc.object_mut(anchor)?;
        obj.location = location;
        obj.instance_type = InstanceType::Collection;
        obj.instance_collection = Some(collection);
        obj.empty_display_size = display_size;
        obj.asset_version = Some(ASSET_VERSION.to_string());
        obj.asset = Some(opts.asset_data(prefs));
        obj.use_fake_user = true;
    }

    if opts.render_thumbnail {
        match renderer {
            Some(renderer) => {
                let size = prefs.assetbrowser_tools_thumbnail_size;
                match render_thumbnail(doc, anchor, &objects, renderer, size) {
                    Ok(thumbnail) => doc.object_mut(anchor)?.preview = Some(thumbnail),
                    Err(err) => warnings.push(err.into()),
                }
            }
            None => warnings.push(CoreError::ExternalDependency(
                "no viewport renderer, the asset has no thumbnail".to_string(),
            )),
        }
    }

    let dropped = if opts.drop_into_scene {
        let view = doc.window.view.clone();
        let right = view.right();
        let width = bounds.map(|b| b.dimensions().dot(right.abs())).unwrap_or(0.0);
        let map = doc.duplicate_objects(&[anchor], false, false)?;
        let instance = map
            .get(&anchor)
            .copied()
            .ok_or_else(|| CoreError::not_found("anchor duplicate"))?;
        {
            let obj = doc.object_mut(instance)?;
            obj.asset = None;
            obj.preview = None;
            obj.use_fake_user = false;
            obj.location = location + right * width;
        }
        let target = doc.scene(scene)?.current_collection();
        doc.link_object(target, instance)?;
        doc.deselect_all();
        doc.select(instance, true)?;
        doc.set_active(scene, Some(instance))?;
        Some(instance)
    } else {
        None
    };

    info!(
        assembly = name,
        anchor = %anchor,
        collection = %collection,
        objects = objects.len(),
        duplicate,
        "Created assembly"
    );
    Ok(AssemblyResult {
        anchor,
        collection,
        objects,
        dropped,
        warnings,
    })
}

/// Whether `id` is an anchor written by the current packager
pub fn is_assembly_anchor(doc: &Document, id: ObjectId) -> bool {
    doc.objects
        .get(&id)
        .map(|o| o.is_instancer() && o.asset_version.as_deref() == Some(ASSET_VERSION))
        .unwrap_or(false)
}
