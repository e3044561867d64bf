//! Turning existing collection instances into assembly assets

use assemblage_core::math::normalize_zero_scale;
use assemblage_core::{AssetData, CoreError, CoreResult, Document, InstanceType, ObjectId, ObjectKind, Preferences};
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::packager::{assemblies_collection, ASSET_VERSION};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnIntoAssetOptions {
    /// Anchor name, the instancer's name when unset
    pub name: Option<String>,
    pub catalog: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub license: Option<String>,
    pub description: String,
}

impl TurnIntoAssetOptions {
    fn asset_data(&self, prefs: &Preferences) -> AssetData {
        let or_pref = |value: &Option<String>, pref: &String| value.clone().unwrap_or_else(|| pref.clone());
        AssetData {
            catalog_id: or_pref(&self.catalog, &prefs.assetbrowser_tools_preferred_default_catalog),
            tags: self.tags.clone(),
            author: or_pref(&self.author, &prefs.assetbrowser_tools_meta_author),
            copyright: or_pref(&self.copyright, &prefs.assetbrowser_tools_meta_copyright),
            license: or_pref(&self.license, &prefs.assetbrowser_tools_meta_license),
            description: self.description.clone(),
        }
    }
}

/// Mark the collection instanced by `instancer` as an assembly and give it a
/// fresh asset anchor. Returns the anchor.
pub fn turn_into_asset(
    doc: &mut Document,
    instancer: ObjectId,
    opts: &TurnIntoAssetOptions,
    prefs: &Preferences,
) -> CoreResult<ObjectId> {
    let obj = doc.object(instancer)?;
    let collection = match obj.instance_collection {
        Some(col) if obj.is_instancer() => col,
        _ => {
            return Err(CoreError::illegal_selection(format!(
                "'{}' does not instance a collection",
                obj.name
            )))
        }
    };
    let name = opts.name.clone().unwrap_or_else(|| obj.name.clone());
    let display_size = obj.empty_display_size;
    let col = doc.collection(collection)?;
    if col.is_linked() {
        return Err(CoreError::LinkedAsset(format!("collection '{}'", col.name)));
    }
    let offset = col.instance_offset;

    let assemblies = assemblies_collection(doc)?;
    for parent in doc.collection_parents(collection) {
        if parent != assemblies && !doc.collection(parent)?.is_linked() {
            doc.unlink_child_collection(parent, collection)?;
        }
    }
    if !doc.collection_parents(collection).contains(&assemblies) {
        doc.link_child_collection(assemblies, collection)?;
    }
    doc.collection_mut(collection)?.is_asset_collection = true;

    let anchor = doc.new_object(&name, ObjectKind::Empty);
    {
        let a = doc.object_mut(anchor)?;
        a.location = offset;
        a.rotation = DQuat::IDENTITY;
        a.scale = DVec3::ONE;
        a.instance_type = InstanceType::Collection;
        a.instance_collection = Some(collection);
        a.empty_display_size = display_size;
        a.asset_version = Some(ASSET_VERSION.to_string());
        a.asset = Some(opts.asset_data(prefs));
        a.use_fake_user = true;
    }

    let inst = doc.object_mut(instancer)?;
    inst.scale = normalize_zero_scale(inst.scale);

    info!(anchor = %anchor, collection = %collection, "Turned instance into assembly asset");
    Ok(anchor)
}
