//! Group name policy: `prefix + basename + suffix [+ .NNN]`

use assemblage_core::document::strip_numeric_suffix;
use assemblage_core::{CoreResult, Document, ObjectId, Pose, Preferences, SceneId};
use tracing::debug;

use crate::hierarchy::scene_group_empties;

/// A group name split into its policy parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub prefix: String,
    pub basename: String,
    pub suffix: String,
}

/// Split `name` by stripping the configured prefix and suffix when present.
///
/// A trailing `.NNN` collision counter is dropped before the suffix is matched.
pub fn split_name(name: &str, prefs: &Preferences) -> NameParts {
    let mut rest = strip_numeric_suffix(name);
    let prefix = &prefs.group_tools_prefix;
    let suffix = &prefs.group_tools_suffix;

    let mut found_prefix = String::new();
    if !prefix.is_empty() && rest.len() > prefix.len() && rest.starts_with(prefix.as_str()) {
        found_prefix = prefix.clone();
        rest = &rest[prefix.len()..];
    }
    let mut found_suffix = String::new();
    if !suffix.is_empty() && rest.len() > suffix.len() && rest.ends_with(suffix.as_str()) {
        found_suffix = suffix.clone();
        rest = &rest[..rest.len() - suffix.len()];
    }
    NameParts {
        prefix: found_prefix,
        basename: rest.to_string(),
        suffix: found_suffix,
    }
}

/// Full policy name for `basename`
pub fn compose_name(basename: &str, prefs: &Preferences) -> String {
    format!("{}{}{}", prefs.group_tools_prefix, basename, prefs.group_tools_suffix)
}

/// Whether `name` carries the configured group prefix or suffix
pub fn matches_group_policy(name: &str, prefs: &Preferences) -> bool {
    let base = strip_numeric_suffix(name);
    let prefix = &prefs.group_tools_prefix;
    let suffix = &prefs.group_tools_suffix;
    (!prefix.is_empty() && base.starts_with(prefix.as_str()))
        || (!suffix.is_empty() && base.ends_with(suffix.as_str()))
}

pub fn is_inception_pose(pose: &Pose) -> bool {
    pose.is_inception()
}

/// Give a group empty a unique name.
///
/// With auto-naming the name is recomposed from the policy parts around
/// `basename` (or the current basename); otherwise `basename` is used as is.
/// A `.NNN` counter is appended only on collision.
pub fn set_unique_group_name(
    doc: &mut Document,
    id: ObjectId,
    basename: Option<&str>,
    prefs: &Preferences,
) -> CoreResult<String> {
    let current = doc.object(id)?.name.clone();
    let base = match basename {
        Some(b) if !b.is_empty() => b.to_string(),
        _ => {
            let parts = split_name(&current, prefs);
            if parts.basename.is_empty() {
                prefs.group_tools_basename.clone()
            } else {
                parts.basename
            }
        }
    };
    let target = if prefs.group_tools_auto_name {
        compose_name(&base, prefs)
    } else {
        base
    };
    let name = doc.rename_object(id, &target)?;
    if name != current {
        debug!(object = %id, from = %current, to = %name, "Renamed group");
    }
    Ok(name)
}

/// Re-apply the name policy to every group empty of the scene
pub fn auto_rename_groups(doc: &mut Document, scene: SceneId, prefs: &Preferences) -> CoreResult<usize> {
    let mut renamed = 0;
    for id in scene_group_empties(doc, scene) {
        let before = doc.object(id)?.name.clone();
        let after = set_unique_group_name(doc, id, None, prefs)?;
        if before != after {
            renamed += 1;
        }
    }
    Ok(renamed)
}
