//! Assemblage Assembly - Assembly assets and the assembly editor
//!
//! This crate provides:
//! - Packaging hierarchies into instanced, asset-marked collections
//! - Thumbnail framing, cropping and the thumbnail helper session
//! - Legacy instance conversion, removal and disassembly
//! - Editing an assembly collection in an isolated scene
//! - Host operators for all of the above

pub mod disassemble;
pub mod editor;
pub mod legacy;
pub mod operators;
pub mod packager;
pub mod remove;
pub mod thumbnail;

pub use disassemble::{disassemble, DisassembleReport};
pub use editor::{edit_delta, enter_assembly_edit, exit_assembly_edit};
pub use legacy::{turn_into_asset, TurnIntoAssetOptions};
pub use packager::{
    create_assembly, is_assembly_anchor, AssemblyLocation, AssemblyResult, AssemblyScope, CreateAssemblyOptions,
    ASSEMBLIES_COLLECTION, ASSET_VERSION, LEGACY_ASSET_VERSION,
};
pub use remove::{is_legacy_asset, remove_assembly, RemoveMode, RemoveReport};
pub use thumbnail::{render_thumbnail, save_png, ThumbnailError, ThumbnailHelperSession, ThumbnailRenderer};
