//! Package metadata: the uniform header model both parsers produce

use std::sync::OnceLock;

use bitflags::bitflags;

use crate::types::ObjectRef;

pub mod uasset;
pub mod versions;
pub mod zen;

bitflags! {
    /// Package flags
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct EPackageFlags : u32 {
        /// Editor-only data has been stripped
        const FILTER_EDITOR_ONLY = 0x8000_0000;
        /// Properties are serialized without tags
        const UNVERSIONED_PROPERTIES = 0x2000;
        /// Package was cooked
        const COOKED = 0x0000_0200;
    }
}

/// `RF_Public` bit of the object flags word
pub const OBJECT_FLAG_PUBLIC: u32 = 0x1;

/// A fully resolved object reference
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedRef {
    /// Class name of the referenced object
    pub class_name: String,
    /// Object name
    pub name: String,
    /// Package path the object lives in
    pub package_path: String,
    /// Export index in that package, or -1 for script objects
    pub export_index: i32,
}

/// Late-resolved import fields, set once during cross-package resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    /// Object name
    pub name: String,
    /// Class name
    pub class_name: String,
    /// Package the object lives in
    pub package_name: String,
}

/// One import of a package
#[derive(Debug)]
pub struct AssetImport {
    /// Object name as known at parse time, possibly a placeholder
    pub name: String,
    /// Class name as known at parse time
    pub class_name: String,
    /// Package name as known at parse time, possibly a placeholder
    pub package_name: String,
    /// Index into `imported_public_export_hashes`, or -1
    pub public_export_hash_index: i64,
    /// Whether the import was complete at parse time
    parse_resolved: bool,
    resolved: OnceLock<ResolvedImport>,
}

impl AssetImport {
    /// Create an import whose fields are already final (script imports,
    /// legacy imports).
    pub fn resolved_at_parse(name: String, class_name: String, package_name: String) -> Self {
        AssetImport {
            name,
            class_name,
            package_name,
            public_export_hash_index: -1,
            parse_resolved: true,
            resolved: OnceLock::new(),
        }
    }

    /// Create an import that needs the cross-package hash pass.
    pub fn pending(
        name: String,
        class_name: String,
        package_name: String,
        public_export_hash_index: i64,
    ) -> Self {
        AssetImport {
            name,
            class_name,
            package_name,
            public_export_hash_index,
            parse_resolved: false,
            resolved: OnceLock::new(),
        }
    }

    /// Whether the import is fully resolved.
    pub fn is_resolved(&self) -> bool {
        self.parse_resolved || self.resolved.get().is_some()
    }

    /// Set the late-resolved fields; the first caller wins.
    pub fn resolve(&self, resolved: ResolvedImport) {
        let _ = self.resolved.set(resolved);
    }

    /// Final object name.
    pub fn final_name(&self) -> &str {
        self.resolved.get().map(|e| e.name.as_str()).unwrap_or(&self.name)
    }

    /// Final class name.
    pub fn final_class_name(&self) -> &str {
        self.resolved
            .get()
            .map(|e| e.class_name.as_str())
            .unwrap_or(&self.class_name)
    }

    /// Final package name.
    pub fn final_package_name(&self) -> &str {
        self.resolved
            .get()
            .map(|e| e.package_name.as_str())
            .unwrap_or(&self.package_name)
    }
}

/// One export of a package
#[derive(Debug, Default)]
pub struct AssetExport {
    /// Object name
    pub name: String,
    /// Class name, filled during script/local resolution
    pub class_name: OnceLock<String>,
    /// Offset of the serialized object payload
    pub serial_offset: u64,
    /// Size of the serialized object payload
    pub serial_size: u64,
    /// Outer object
    pub outer: ObjectRef,
    /// Raw class reference
    pub class_ref: ObjectRef,
    /// Raw super reference
    pub super_ref: ObjectRef,
    /// Raw template reference
    pub template_ref: ObjectRef,
    /// Object flags word
    pub object_flags: u32,
    /// Hash identifying this export to other packages, 0 when absent
    pub public_export_hash: u64,
    /// Resolved class reference
    pub class: OnceLock<ResolvedRef>,
    /// Resolved super reference
    pub superclass: OnceLock<ResolvedRef>,
    /// Resolved template reference
    pub template: OnceLock<ResolvedRef>,
}

impl AssetExport {
    /// Whether the export is visible to other packages.
    pub fn is_public(&self) -> bool {
        self.object_flags & OBJECT_FLAG_PUBLIC != 0
    }

    /// The export's class name, best effort.
    pub fn final_class_name(&self) -> &str {
        self.class
            .get()
            .map(|e| e.name.as_str())
            .or_else(|| self.class_name.get().map(|e| e.as_str()))
            .unwrap_or_default()
    }
}

/// Uniform package header: name table, imports and exports, produced once
/// per package and cached. Late fields resolve through `OnceLock`s, so the
/// metadata is shareable and effectively immutable after the resolution
/// fixpoint.
#[derive(Debug, Default)]
pub struct AssetMetadata {
    /// Package name, e.g. `/Game/Maps/Frontend`
    pub package_name: String,
    /// Name table in declaration order
    pub name_table: Vec<String>,
    /// Imports
    pub imports: Vec<AssetImport>,
    /// Exports
    pub exports: Vec<AssetExport>,
    /// Total header size, for Zen packages
    pub header_size: u32,
    /// Size the header would have in the legacy format; biases Zen serial
    /// offsets
    pub cooked_header_size: u32,
    /// Whether export payloads use unversioned property serialization
    pub is_unversioned: bool,
    /// Whether the package uses the Zen on-disk format
    pub is_zen: bool,
    /// Public export hashes this package imports through
    pub imported_public_export_hashes: Vec<u64>,
    /// Names of the packages imported from, when the header carries them
    pub imported_package_names: Vec<String>,
}

impl AssetMetadata {
    /// Package path used in export index keys: the package name minus any
    /// extension.
    pub fn package_path(&self) -> &str {
        match self.package_name.rfind('.') {
            Some(dot) if !self.package_name[dot..].contains('/') => &self.package_name[..dot],
            _ => &self.package_name,
        }
    }
}
