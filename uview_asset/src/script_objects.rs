//! Engine script-object resolution from the global container

use std::collections::HashMap;
use std::io::Cursor;

use crate::archive::RawArchive;
use crate::error::Error;
use crate::name_batch;
use crate::types::{FMappedName, PackageObjectIndex};

/// One entry of the global ScriptObjects chunk
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScriptObjectEntry {
    /// Object name in the global name table
    pub object_name: FMappedName,
    /// Global index; the raw value is the lookup key
    pub global_index: PackageObjectIndex,
    /// Outer object
    pub outer_index: PackageObjectIndex,
    /// Class default object class
    pub cdo_class_index: PackageObjectIndex,
}

impl ScriptObjectEntry {
    /// Read a `ScriptObjectEntry` from an archive
    pub fn read<C: std::io::Read + std::io::Seek>(
        archive: &mut RawArchive<C>,
    ) -> Result<Self, Error> {
        let object_name = archive.read_mapped_name()?;
        let global_index = PackageObjectIndex::read(archive)?;
        let outer_index = PackageObjectIndex::read(archive)?;
        let cdo_class_index = PackageObjectIndex::read(archive)?;

        Ok(ScriptObjectEntry {
            object_name,
            global_index,
            outer_index,
            cdo_class_index,
        })
    }
}

/// Resolves engine-built-in script imports by their packed 64-bit index.
#[derive(Debug, Default)]
pub struct ScriptObjectIndex {
    names: Vec<String>,
    entries: HashMap<u64, ScriptObjectEntry>,
}

impl ScriptObjectIndex {
    // outer chains in practice are a handful deep; this only guards
    // against reference cycles in corrupt data
    const MAX_OUTER_DEPTH: usize = 64;

    /// Parse the ScriptObjects chunk payload: a name batch followed by the
    /// entry array.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut archive = RawArchive::new(Cursor::new(data))?;

        let names = name_batch::read_name_batch(&mut archive)?;

        let entry_list = archive.read_array(ScriptObjectEntry::read)?;
        log::debug!("loaded {} script objects", entry_list.len());

        let mut entries = HashMap::with_capacity(entry_list.len());
        for entry in entry_list {
            entries.insert(entry.global_index.raw(), entry);
        }

        Ok(ScriptObjectIndex {
            names,
            entries,
        })
    }

    /// Number of indexed script objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The global name batch the ScriptObjects chunk carried; this is the
    /// table `Global`-scoped mapped names index into.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve a raw packed index to the script object's name.
    pub fn resolve(&self, raw_index: u64) -> Option<String> {
        let entry = self.entries.get(&raw_index)?;
        entry.object_name.resolve(&self.names, Some(&self.names))
    }

    /// Resolve a raw packed index to `(objectName, modulePath)`.
    ///
    /// The module path is the outermost object's name, e.g. `/Script/Engine`;
    /// `None` when the outer chain cannot be walked.
    pub fn resolve_with_module(&self, raw_index: u64) -> Option<(String, Option<String>)> {
        let entry = self.entries.get(&raw_index)?;
        let object_name = entry.object_name.resolve(&self.names, Some(&self.names))?;

        let mut current = *entry;
        let mut module = None;
        for _ in 0..Self::MAX_OUTER_DEPTH {
            if current.outer_index.is_null() {
                if current.global_index.raw() != raw_index {
                    module = current.object_name.resolve(&self.names, Some(&self.names));
                }
                break;
            }

            match self.entries.get(&current.outer_index.raw()) {
                Some(outer) => current = *outer,
                None => break,
            }
        }

        Some((object_name, module))
    }
}
