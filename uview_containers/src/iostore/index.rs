//! .utoc directory index

use std::io::{Read, Seek};

use byteorder::{ReadBytesExt, LE};
use uview_helpers::UnrealReadExt;

use crate::error::ContainerError;

/// IoStore .utoc directory index entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IoStoreDirectoryIndexEntry {
    /// Name index into the string table
    pub name: u32,
    /// First child entry
    pub first_child_entry: u32,
    /// Next sibling entry
    pub next_sibling_entry: u32,
    /// First file entry
    pub first_file_entry: u32,
}

impl IoStoreDirectoryIndexEntry {
    /// Read `IoStoreDirectoryIndexEntry` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ContainerError> {
        let name = reader.read_u32::<LE>()?;
        let first_child_entry = reader.read_u32::<LE>()?;
        let next_sibling_entry = reader.read_u32::<LE>()?;
        let first_file_entry = reader.read_u32::<LE>()?;

        Ok(IoStoreDirectoryIndexEntry {
            name,
            first_child_entry,
            next_sibling_entry,
            first_file_entry,
        })
    }
}

/// IoStore .utoc file index entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IoStoreFileIndexEntry {
    /// Name index into the string table
    pub name: u32,
    /// Next file entry
    pub next_file_entry: u32,
    /// Toc chunk index of the file data
    pub chunk_index: u32,
}

impl IoStoreFileIndexEntry {
    /// Read `IoStoreFileIndexEntry` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ContainerError> {
        let name = reader.read_u32::<LE>()?;
        let next_file_entry = reader.read_u32::<LE>()?;
        let chunk_index = reader.read_u32::<LE>()?;

        Ok(IoStoreFileIndexEntry {
            name,
            next_file_entry,
            chunk_index,
        })
    }
}

/// IoStore .utoc directory index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IoStoreDirectoryIndex {
    /// Mount point
    pub mount_point: Option<String>,
    /// Directory entries
    pub directory_entries: Vec<IoStoreDirectoryIndexEntry>,
    /// File entries
    pub file_entries: Vec<IoStoreFileIndexEntry>,
    /// String table
    pub string_table: Vec<Option<String>>,
}

impl IoStoreDirectoryIndex {
    /// Root directory index
    pub const ROOT_INDEX: u32 = 0;
    /// Invalid index, marks "none"
    pub const INVALID_INDEX: u32 = u32::MAX;

    /// Read `IoStoreDirectoryIndex` from a reader
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, ContainerError> {
        let mount_point = reader.read_fstring()?;

        let directory_entries_count = reader.read_i32::<LE>()?;
        let mut directory_entries = Vec::with_capacity(directory_entries_count.max(0) as usize);
        for _ in 0..directory_entries_count {
            directory_entries.push(IoStoreDirectoryIndexEntry::read(reader)?);
        }

        let file_entries_count = reader.read_i32::<LE>()?;
        let mut file_entries = Vec::with_capacity(file_entries_count.max(0) as usize);
        for _ in 0..file_entries_count {
            file_entries.push(IoStoreFileIndexEntry::read(reader)?);
        }

        let string_table_count = reader.read_i32::<LE>()?;
        let mut string_table = Vec::with_capacity(string_table_count.max(0) as usize);
        for _ in 0..string_table_count {
            string_table.push(reader.read_fstring()?);
        }

        Ok(IoStoreDirectoryIndex {
            mount_point,
            directory_entries,
            file_entries,
            string_table,
        })
    }

    /// Walk every file in the index, calling `f(chunk_index, logical_path)`.
    ///
    /// Paths are built by concatenating slash-terminated directory names onto
    /// the mount point.
    pub fn walk(&self, mount_point: &str, f: &mut impl FnMut(u32, String)) {
        if self.directory_entries.is_empty() {
            return;
        }

        let mut root = mount_point.to_string();
        if !root.is_empty() && !root.ends_with('/') {
            root.push('/');
        }

        self.walk_impl(Self::ROOT_INDEX, &root, f);
    }

    fn walk_impl(&self, directory_index: u32, accumulated_path: &str, f: &mut impl FnMut(u32, String)) {
        let Some(directory_entry) = self.directory_entries.get(directory_index as usize) else {
            return;
        };

        let mut file = directory_entry.first_file_entry;
        while file != Self::INVALID_INDEX {
            let Some(file_entry) = self.file_entries.get(file as usize) else {
                break;
            };

            let name = self.name(file_entry.name);
            f(file_entry.chunk_index, format!("{accumulated_path}{name}"));

            file = file_entry.next_file_entry;
        }

        let mut child = directory_entry.first_child_entry;
        while child != Self::INVALID_INDEX {
            let Some(child_entry) = self.directory_entries.get(child as usize) else {
                break;
            };

            let name = self.name(child_entry.name);
            let path = format!("{accumulated_path}{name}/");
            self.walk_impl(child, &path, f);

            child = child_entry.next_sibling_entry;
        }
    }

    fn name(&self, index: u32) -> &str {
        self.string_table
            .get(index as usize)
            .and_then(|e| e.as_deref())
            .unwrap_or_default()
    }
}
