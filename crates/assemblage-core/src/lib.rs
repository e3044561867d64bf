//! Assemblage Core - Scene graph model, adapters and operator dispatch
//!
//! This crate provides the foundational types for Assemblage:
//! - Document model of objects, collections, scenes and workspaces
//! - Object registry adapter (parenting, transforms, visibility, selection)
//! - Collection adapter (linking, view-layer state, recursive duplicates)
//! - Pose record and transform helpers
//! - Preferences record and operator dispatch

pub mod collection;
pub mod document;
pub mod error;
pub mod math;
pub mod object;
pub mod operator;
pub mod pose;
pub mod prefs;
pub mod registry;
pub mod scene;
pub mod tags;
pub mod workspace;

pub use collection::{Collection, CollectionDuplicate, CollectionId, ColorTag, SceneCollectionInfo};
pub use document::{Document, DocumentError, ADDON_DECALS, ADDON_STASHES};
pub use error::{CoreError, CoreResult};
pub use math::Aabb;
pub use object::{
    AssetData, DisplayType, EmptyDisplay, GroupProps, InstanceType, Mesh, MeshId, Modifier,
    ModifierKind, Object, ObjectId, ObjectKind, RigidBody, RigidBodyKind, Thumbnail,
    ThumbnailHelper, Visibility,
};
pub use operator::{
    run_modal, run_operator, Context, ModalEvent, ModalOperator, ModalStatus, Operator,
    OperatorOutcome, OperatorStatus, Report, ReportLevel,
};
pub use pose::{new_pose_uuid, Pose, PoseAxis, AUTO_POSE_NAME, INCEPTION_POSE, LEGACY_POSE};
pub use prefs::{load_preferences, Preferences, PrefsError};
pub use registry::VisibilityState;
pub use scene::{AssemblyEditState, RigidBodyWorld, Scene, SceneGroupSettings, SceneId};
pub use workspace::{GroupModeSnapshot, OutlinerDisplayMode, OutlinerFilter, OutlinerSettings, ViewState, Workspace};
