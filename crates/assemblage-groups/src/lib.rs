//! Assemblage Groups - Group empties, poses and group operations
//!
//! This crate provides:
//! - Hierarchy traversal, the name policy and the clean-up pass
//! - The pose store with batch poses and pose previews
//! - Create, dissolve, groupify, add/remove, duplicate and select operations
//! - The interactive group rotation session
//! - Outliner group mode and the host operators for all of the above

pub mod cleanup;
pub mod create;
pub mod dissolve;
pub mod duplicate;
pub mod groupify;
pub mod hierarchy;
pub mod membership;
pub mod naming;
pub mod operators;
pub mod outliner;
pub mod poses;
pub mod preview;
pub mod select;
pub mod transform;

pub use cleanup::{clean_up_groups, fade_group_sizes, CleanupReport};
pub use create::{create_group, CreateGroupOptions, GroupOrigin};
pub use dissolve::{dissolve_groups, DissolveReport};
pub use duplicate::duplicate_groups;
pub use groupify::groupify;
pub use hierarchy::{ancestors, group_subtree, is_group_empty, top_group, AncestorCache};
pub use membership::{add_to_group, remove_from_group, AddToGroupOptions};
pub use naming::{set_unique_group_name, split_name, NameParts};
pub use outliner::{is_group_mode, toggle_group_mode};
pub use poses::{
    process_group_poses, remove_pose, retrieve_pose, set_batch_pose, set_inception_pose, set_pose, update_pose,
    PoseIssue,
};
pub use preview::{preview_batches, PreviewCache, PreviewItem};
pub use select::{propagate_group_selection, select_group, SelectGroupOptions};
pub use transform::TransformGroupSession;
