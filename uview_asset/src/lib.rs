#![deny(missing_docs)]

//! # uview_asset
//!
//! The package layer of uview: parses UAsset and Zen package headers out of
//! mounted containers, resolves cross-package references through a global
//! public-export-hash index, loads type mappings, and deserializes export
//! payloads into typed property trees.

pub mod archive;
pub use archive::RawArchive;
pub mod error;
pub use error::Error;
pub mod metadata;
pub use metadata::{AssetExport, AssetImport, AssetMetadata, ResolvedRef};
pub mod name_batch;
pub mod properties;
pub use properties::{Diagnostic, PropertyBag, PropertyValue};
pub mod reader;
pub use reader::{ContentReader, ReaderConfig};
pub mod registry;
pub use registry::{AssetGroup, AssetRegistry};
pub mod script_objects;
pub use script_objects::ScriptObjectIndex;
pub mod typemap;
pub use typemap::TypeRegistry;
pub mod types;
