//! Group hierarchy traversal
//!
//! Every walk is iterative and guarded against parent cycles, which can be
//! present in documents loaded from disk until the clean-up pass breaks them.

use assemblage_core::{Document, ObjectId, SceneId};
use std::collections::{BTreeSet, HashMap, VecDeque};

pub fn is_group_empty(doc: &Document, id: ObjectId) -> bool {
    doc.objects.get(&id).map(|o| o.is_group_empty()).unwrap_or(false)
}

/// Parent of `id` when that parent is a group empty
pub fn group_parent(doc: &Document, id: ObjectId) -> Option<ObjectId> {
    doc.get_parent(id).filter(|p| is_group_empty(doc, *p))
}

/// All parents of `id`, nearest first
pub fn parent_chain(doc: &Document, id: ObjectId) -> Vec<ObjectId> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::from([id]);
    let mut current = doc.get_parent(id);
    while let Some(p) = current {
        if !seen.insert(p) {
            break;
        }
        chain.push(p);
        current = doc.get_parent(p);
    }
    chain
}

/// Group empties above `id`, nearest first
pub fn ancestors(doc: &Document, id: ObjectId) -> Vec<ObjectId> {
    parent_chain(doc, id)
        .into_iter()
        .filter(|p| is_group_empty(doc, *p))
        .collect()
}

/// Outermost group empty `id` belongs to, `id` itself for a top group
pub fn top_group(doc: &Document, id: ObjectId) -> Option<ObjectId> {
    let top = ancestors(doc, id).last().copied();
    top.or_else(|| is_group_empty(doc, id).then_some(id))
}

/// Number of group empties above `id`
pub fn group_depth(doc: &Document, id: ObjectId) -> usize {
    ancestors(doc, id).len()
}

/// Group empties of the subtree rooted at `root` (included), shallowest first,
/// each paired with its depth below `root`
pub fn group_subtree(doc: &Document, root: ObjectId) -> Vec<(ObjectId, usize)> {
    let mut result = Vec::new();
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([(root, 0usize)]);
    while let Some((id, depth)) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let Some(obj) = doc.objects.get(&id) else {
            continue;
        };
        if !obj.is_group_empty() {
            continue;
        }
        result.push((id, depth));
        for child in &obj.children {
            queue.push_back((*child, depth + 1));
        }
    }
    result
}

/// Group empties reachable in the scene
pub fn scene_group_empties(doc: &Document, scene: SceneId) -> Vec<ObjectId> {
    doc.scene_objects(scene)
        .unwrap_or_default()
        .into_iter()
        .filter(|id| is_group_empty(doc, *id))
        .collect()
}

/// Group empties of the scene without a group parent
pub fn top_group_empties(doc: &Document, scene: SceneId) -> Vec<ObjectId> {
    scene_group_empties(doc, scene)
        .into_iter()
        .filter(|id| ancestors(doc, *id).is_empty())
        .collect()
}

/// Ancestor chains memoized for the duration of a modal session
#[derive(Debug, Default)]
pub struct AncestorCache {
    chains: HashMap<ObjectId, Vec<ObjectId>>,
}

impl AncestorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group empties above `id`, nearest first
    pub fn ancestors(&mut self, doc: &Document, id: ObjectId) -> &[ObjectId] {
        self.chains.entry(id).or_insert_with(|| ancestors(doc, id))
    }

    pub fn top_group(&mut self, doc: &Document, id: ObjectId) -> Option<ObjectId> {
        let top = self.ancestors(doc, id).last().copied();
        top.or_else(|| is_group_empty(doc, id).then_some(id))
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Forget every chain after a structural change
    pub fn invalidate(&mut self) {
        self.chains.clear();
    }
}
