//! Shared package-format types

use std::io::Read;

use byteorder::{ReadBytesExt, LE};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::Error;

/// Two byte header in front of each name batch string
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SerializedNameHeader {
    /// Whether the string is UTF-16
    pub is_wide: bool,
    /// String length in code units
    pub len: i32,
}

impl SerializedNameHeader {
    /// Read a `SerializedNameHeader` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let (first_byte, second_byte) = (reader.read_u8()?, reader.read_u8()?);

        Ok(SerializedNameHeader {
            is_wide: first_byte & 0x80 != 0,
            len: (((first_byte & 0x7f) as i32) << 8) + second_byte as i32,
        })
    }
}

/// Scope of a mapped name
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum EMappedNameType {
    /// Package-level name table
    #[default]
    Package,
    /// Container-level name table
    Container,
    /// Global name table
    Global,
}

/// A name table reference as serialized in Zen packages and global data
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct FMappedName {
    /// Name table index
    pub index: u32,
    /// Extra index; greater than zero suffixes `_<extra - 1>`
    pub extra: u32,
    /// Name table the index points into
    pub ty: EMappedNameType,
}

impl FMappedName {
    /// Index bits
    pub const INDEX_BITS: u32 = 30;
    /// Index mask
    pub const INDEX_MASK: u32 = (1u32 << Self::INDEX_BITS) - 1;
    /// Type shift
    pub const TYPE_SHIFT: u32 = Self::INDEX_BITS;

    /// Read an `FMappedName` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let index = reader.read_u32::<LE>()?;
        let extra = reader.read_u32::<LE>()?;

        let ty = EMappedNameType::try_from((index >> Self::TYPE_SHIFT) as u8)?;

        Ok(FMappedName {
            index: index & Self::INDEX_MASK,
            extra,
            ty,
        })
    }

    /// Resolve against the table the scope bits select, applying the
    /// extra-index suffix.
    ///
    /// `Global`-scoped names index the global name batch carried by the
    /// ScriptObjects chunk and cannot resolve without it; the other scopes
    /// index the package-local table.
    pub fn resolve(
        &self,
        name_table: &[String],
        global_names: Option<&[String]>,
    ) -> Option<String> {
        let table = match self.ty {
            EMappedNameType::Global => global_names?,
            EMappedNameType::Package | EMappedNameType::Container => name_table,
        };

        let name = table.get(self.index as usize)?;
        Some(match self.extra {
            0 => name.clone(),
            extra => format!("{}_{}", name, extra - 1),
        })
    }
}

/// Tag of a [`PackageObjectIndex`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum EPackageObjectIndexType {
    /// Export in the owning package
    Export,
    /// Engine-provided script object
    ScriptImport,
    /// Export of another package
    PackageImport,
    /// Null
    #[default]
    Null,
}

/// A packed 64-bit object reference: 2-bit tag plus a 62-bit value
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct PackageObjectIndex {
    /// The 62-bit value
    pub id: u64,
    /// Tag
    pub ty: EPackageObjectIndexType,
}

impl PackageObjectIndex {
    /// Index bits
    pub const INDEX_BITS: u64 = 62;
    /// Index mask
    pub const INDEX_MASK: u64 = (1u64 << Self::INDEX_BITS) - 1;
    /// Type shift
    pub const TYPE_SHIFT: u64 = Self::INDEX_BITS;

    /// Split a raw 64-bit value into id and tag.
    pub fn from_raw(type_and_id: u64) -> Self {
        let id = type_and_id & Self::INDEX_MASK;
        let ty = EPackageObjectIndexType::try_from((type_and_id >> Self::TYPE_SHIFT) as u16)
            .unwrap_or(EPackageObjectIndexType::Null);

        PackageObjectIndex { id, ty }
    }

    /// Read a `PackageObjectIndex` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(Self::from_raw(reader.read_u64::<LE>()?))
    }

    /// The raw 64-bit value including the tag bits.
    #[inline]
    pub fn raw(&self) -> u64 {
        self.id | ((self.ty as u64) << Self::TYPE_SHIFT)
    }

    /// Check if this index is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ty == EPackageObjectIndexType::Null
    }

    /// Check if this index is a script import
    #[inline]
    pub fn is_script_import(&self) -> bool {
        self.ty == EPackageObjectIndexType::ScriptImport
    }

    /// Check if this index is a package import
    #[inline]
    pub fn is_package_import(&self) -> bool {
        self.ty == EPackageObjectIndexType::PackageImport
    }

    /// Check if this index is an export
    #[inline]
    pub fn is_export(&self) -> bool {
        self.ty == EPackageObjectIndexType::Export
    }

    /// Zero-based export index; only meaningful for export-tagged indices
    #[inline]
    pub fn as_export(&self) -> u32 {
        self.id as u32
    }

    /// `(package index, hash index)` halves of a package import value
    #[inline]
    pub fn as_package_import(&self) -> (u32, u32) {
        ((self.id >> 32) as u32, self.id as u32)
    }
}

/// Legacy signed package index: positive is `export + 1`, negative is
/// `-(import + 1)`, zero is null.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct PackageIndex {
    /// The signed index value
    pub index: i32,
}

impl PackageIndex {
    /// Create a new `PackageIndex`
    pub fn new(index: i32) -> Self {
        PackageIndex { index }
    }

    /// Check if this index is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.index == 0
    }

    /// Check if this index points into the import table
    #[inline]
    pub fn is_import(&self) -> bool {
        self.index < 0
    }

    /// Check if this index points into the export table
    #[inline]
    pub fn is_export(&self) -> bool {
        self.index > 0
    }

    /// Zero-based import table index
    #[inline]
    pub fn as_import(&self) -> u32 {
        (-self.index - 1) as u32
    }

    /// Zero-based export table index
    #[inline]
    pub fn as_export(&self) -> u32 {
        (self.index - 1) as u32
    }
}

/// A unified raw object reference; legacy signed indices and Zen packed
/// indices both normalize into this for resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ObjectRef {
    /// Null reference
    #[default]
    Null,
    /// Zero-based export index in the owning package
    Export(u32),
    /// Zero-based index into the owning package's import table (legacy)
    Import(u32),
    /// Script import keyed by the raw 64-bit packed index (Zen)
    ScriptImport(u64),
    /// Export of another package (Zen)
    PackageImport {
        /// Index into `imported_package_names`
        package: u32,
        /// Index into `imported_public_export_hashes`
        hash: u32,
    },
}

impl From<PackageIndex> for ObjectRef {
    fn from(index: PackageIndex) -> Self {
        if index.is_export() {
            ObjectRef::Export(index.as_export())
        } else if index.is_import() {
            ObjectRef::Import(index.as_import())
        } else {
            ObjectRef::Null
        }
    }
}

impl From<PackageObjectIndex> for ObjectRef {
    fn from(index: PackageObjectIndex) -> Self {
        match index.ty {
            EPackageObjectIndexType::Null => ObjectRef::Null,
            EPackageObjectIndexType::Export => ObjectRef::Export(index.as_export()),
            EPackageObjectIndexType::ScriptImport => ObjectRef::ScriptImport(index.raw()),
            EPackageObjectIndexType::PackageImport => {
                let (package, hash) = index.as_package_import();
                ObjectRef::PackageImport { package, hash }
            }
        }
    }
}

impl ObjectRef {
    /// Check if this reference is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, ObjectRef::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn package_object_index_tags() {
        let script = PackageObjectIndex::from_raw(1u64 << 62 | 0x1234);
        assert!(script.is_script_import());
        assert_eq!(script.raw(), 1u64 << 62 | 0x1234);

        let package = PackageObjectIndex::from_raw(2u64 << 62 | (7u64 << 32) | 3);
        assert!(package.is_package_import());
        assert_eq!(package.as_package_import(), (7, 3));

        let export = PackageObjectIndex::from_raw(5);
        assert!(export.is_export());
        assert_eq!(export.as_export(), 5);

        assert!(PackageObjectIndex::from_raw(u64::MAX).is_null());
    }

    #[test]
    fn mapped_name_extra_suffix() {
        let mut cursor = Cursor::new([1u8, 0, 0, 0, 3, 0, 0, 0]);
        let name = FMappedName::read(&mut cursor).unwrap();

        let table = vec!["A".to_string(), "B".to_string()];
        assert_eq!(name.resolve(&table, None), Some("B_2".to_string()));
    }

    #[test]
    fn mapped_name_scope_selects_table() {
        let raw = 1u32 | (2 << FMappedName::TYPE_SHIFT);
        let mut bytes = raw.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let name = FMappedName::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(name.ty, EMappedNameType::Global);

        let local = vec!["Local0".to_string(), "Local1".to_string()];
        let global = vec!["Global0".to_string(), "Global1".to_string()];

        assert_eq!(
            name.resolve(&local, Some(&global)),
            Some("Global1".to_string())
        );
        // a global name must not fall back to the package-local table
        assert_eq!(name.resolve(&local, None), None);
    }

    #[test]
    fn legacy_package_index() {
        assert!(PackageIndex::new(0).is_null());
        assert_eq!(PackageIndex::new(3).as_export(), 2);
        assert_eq!(PackageIndex::new(-2).as_import(), 1);

        assert_eq!(ObjectRef::from(PackageIndex::new(-1)), ObjectRef::Import(0));
    }
}
