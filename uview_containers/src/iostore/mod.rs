//! IoStore .utoc decoding

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{ReadBytesExt, BE, LE};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use uview_helpers::align16;

use crate::compression::CompressionMethod;
use crate::encryption::{self, EncryptionKey};
use crate::entry::{ChunkInfo, CompressionBlock, ContainerEntry, ContainerIndex, EntryKind};
use crate::error::ContainerError;

pub mod header;
pub mod index;
pub use header::{EIoContainerFlags, IoStoreTocHeader};
pub use index::IoStoreDirectoryIndex;

/// IoStore .utoc version
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum EIoStoreTocVersion {
    /// Invalid
    Invalid = 0,
    /// Initial version
    Initial,
    /// Directory index added
    DirectoryIndex,
    /// Partition size added
    PartitionSize,
    /// Perfect hashing added
    PerfectHash,
    /// Perfect hashing with overflow added
    PerfectHashWithOverflow,
}

/// IoStore chunk type for UE5 containers
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EIoChunkType {
    /// Invalid
    Invalid = 0,
    /// Export bundle data
    ExportBundleData = 1,
    /// Bulk data
    BulkData = 2,
    /// Optional bulk data
    OptionalBulkData = 3,
    /// Memory mapped bulk data
    MemoryMappedBulkData = 4,
    /// Script objects
    ScriptObjects = 5,
    /// Container header
    ContainerHeader = 6,
    /// External file
    ExternalFile = 7,
    /// Shader code library
    ShaderCodeLibrary = 8,
    /// Shader code
    ShaderCode = 9,
    /// Package store entry
    PackageStoreEntry = 10,
    /// Derived data
    DerivedData = 11,
    /// Editor derived data
    EditorDerivedData = 12,
}

/// IoStore chunk id, 12 bytes on disk
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IoChunkId {
    /// Chunk id
    pub chunk_id: u64,
    /// Chunk index
    pub chunk_index: u16,
    /// Chunk type, the high byte of the last u32
    pub chunk_type: u8,
}

impl IoChunkId {
    /// Read `IoChunkId` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ContainerError> {
        let chunk_id = reader.read_u64::<LE>()?;
        let chunk_index = reader.read_u16::<BE>()?;

        let _ = reader.read_u8()?; // padding

        let chunk_type = reader.read_u8()?;

        Ok(IoChunkId {
            chunk_id,
            chunk_index,
            chunk_type,
        })
    }
}

/// IoStore combined offset and length, two 40-bit big-endian fields
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IoOffsetAndLength {
    /// Offset into the logical uncompressed container space
    pub offset: u64,
    /// Length
    pub length: u64,
}

impl IoOffsetAndLength {
    /// Read `IoOffsetAndLength` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ContainerError> {
        let mut value = [0u8; 10];
        reader.read_exact(&mut value)?;

        let offset = (value[4] as u64)
            | ((value[3] as u64) << 8)
            | ((value[2] as u64) << 16)
            | ((value[1] as u64) << 24)
            | ((value[0] as u64) << 32);

        let length = (value[9] as u64)
            | ((value[8] as u64) << 8)
            | ((value[7] as u64) << 16)
            | ((value[6] as u64) << 24)
            | ((value[5] as u64) << 32);

        Ok(IoOffsetAndLength { offset, length })
    }
}

/// IoStore compression block entry, 12 bytes packed as
/// `offset:40 | compressed_size:24 | uncompressed_size:24 | method:8`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IoStoreBlockEntry {
    /// Block offset in the data file
    pub offset: u64,
    /// Compressed size
    pub compressed_size: u32,
    /// Uncompressed size
    pub uncompressed_size: u32,
    /// Compression method index, 0 = None
    pub compression_method_index: u8,
}

impl IoStoreBlockEntry {
    const OFFSET_BITS: u64 = 40;
    const OFFSET_MASK: u64 = (1u64 << Self::OFFSET_BITS) - 1;

    const SIZE_BITS: u32 = 24;
    const SIZE_MASK: u32 = (1u32 << Self::SIZE_BITS) - 1;
    const SIZE_SHIFT: u32 = 8;

    /// Read `IoStoreBlockEntry` from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ContainerError> {
        let mut value = [0u8; 12];
        reader.read_exact(&mut value)?;

        let offset = u64::from_le_bytes(value[..8].try_into().unwrap()) & Self::OFFSET_MASK;

        let compressed_size = (u32::from_le_bytes(value[4..8].try_into().unwrap())
            >> Self::SIZE_SHIFT)
            & Self::SIZE_MASK;
        let uncompressed_size =
            u32::from_le_bytes(value[8..12].try_into().unwrap()) & Self::SIZE_MASK;

        let compression_method_index = value[11];

        Ok(IoStoreBlockEntry {
            offset,
            compressed_size,
            uncompressed_size,
            compression_method_index,
        })
    }
}

/// Decoded IoStore .utoc resource
#[derive(Debug, Clone)]
pub struct IoStoreToc {
    /// Header
    pub header: IoStoreTocHeader,
    /// Chunk ids
    pub chunk_ids: Vec<IoChunkId>,
    /// Chunk offsets and lengths
    pub chunk_offsets_lengths: Vec<IoOffsetAndLength>,
    /// Compression blocks, container-global
    pub compression_blocks: Vec<IoStoreBlockEntry>,
    /// Compression methods, index 0 = implicit None
    pub compression_methods: Vec<CompressionMethod>,
    /// Directory index
    pub directory_index: Option<IoStoreDirectoryIndex>,
}

impl IoStoreToc {
    /// Read an `IoStoreToc` from a .utoc reader.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        encryption_key: Option<&EncryptionKey>,
    ) -> Result<Self, ContainerError> {
        let header = IoStoreTocHeader::read(reader)?;

        let mut chunk_ids = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            chunk_ids.push(IoChunkId::read(reader)?);
        }

        let mut chunk_offsets_lengths = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            chunk_offsets_lengths.push(IoOffsetAndLength::read(reader)?);
        }

        if header.version >= EIoStoreTocVersion::PerfectHash {
            reader.seek(SeekFrom::Current(
                header.chunk_perfect_hash_seeds_count as i64 * 4,
            ))?;
        }

        if header.version >= EIoStoreTocVersion::PerfectHashWithOverflow {
            reader.seek(SeekFrom::Current(
                header.chunks_without_perfect_hash_count as i64 * 4,
            ))?;
        }

        let mut compression_blocks =
            Vec::with_capacity(header.compressed_block_entry_count as usize);
        for _ in 0..header.compressed_block_entry_count {
            compression_blocks.push(IoStoreBlockEntry::read(reader)?);
        }

        let mut compression_methods =
            Vec::with_capacity(header.compression_method_name_count as usize + 1);
        compression_methods.push(CompressionMethod::None);
        for _ in 0..header.compression_method_name_count {
            let mut data = vec![0u8; header.compression_method_name_length as usize];
            reader.read_exact(&mut data)?;

            let null_end = data.iter().position(|e| *e == 0x00).unwrap_or(data.len());
            data.resize(null_end, 0x00);

            compression_methods.push(CompressionMethod::new(&String::from_utf8(data)?));
        }

        if header.container_flags.contains(EIoContainerFlags::SIGNED) {
            let hash_size = reader.read_i32::<LE>()?;

            // toc signature, block signature and per-block sha hashes
            reader.seek(SeekFrom::Current(hash_size as i64 * 2))?;
            reader.seek(SeekFrom::Current(
                header.compressed_block_entry_count as i64 * 20,
            ))?;
        }

        let directory_index = match header.container_flags.contains(EIoContainerFlags::INDEXED)
            && header.directory_index_size > 0
        {
            true => match header.container_flags.contains(EIoContainerFlags::ENCRYPTED) {
                true => {
                    let Some(encryption_key) = encryption_key else {
                        return Err(ContainerError::NoEncryptionKey);
                    };

                    let aes = encryption::cipher(encryption_key);

                    let mut buf = vec![0u8; align16(header.directory_index_size as u64) as usize];
                    reader.read_exact(&mut buf)?;

                    encryption::decrypt(&aes, &mut buf);

                    // the first plaintext field is the mount point FString
                    // length; an implausible value means the key was wrong
                    let mount_len = i32::from_le_bytes(buf[..4].try_into().unwrap());
                    if !(0..=1024).contains(&mount_len) {
                        return Err(ContainerError::BadKey);
                    }

                    Some(IoStoreDirectoryIndex::read(&mut Cursor::new(buf))?)
                }
                false => Some(IoStoreDirectoryIndex::read(reader)?),
            },
            false => None,
        };

        Ok(IoStoreToc {
            header,
            chunk_ids,
            chunk_offsets_lengths,
            compression_blocks,
            compression_methods,
            directory_index,
        })
    }

    /// Flatten the toc into the uniform [`ContainerIndex`] model.
    pub fn to_index(&self, container_path: &str) -> ContainerIndex {
        let encrypted = self
            .header
            .container_flags
            .contains(EIoContainerFlags::ENCRYPTED);

        let mount_point = self
            .directory_index
            .as_ref()
            .and_then(|e| e.mount_point.clone())
            .map(|e| strip_mount_prefix(&e))
            .unwrap_or_default();

        let mut entries = Vec::new();
        if let Some(directory_index) = &self.directory_index {
            directory_index.walk(&mount_point, &mut |chunk_index, logical_path| {
                let Some(chunk) = self.chunk_offsets_lengths.get(chunk_index as usize) else {
                    return;
                };

                entries.push(ContainerEntry {
                    container_path: container_path.to_string(),
                    logical_path,
                    offset: chunk.offset,
                    size: chunk.length,
                    encrypted,
                    kind: EntryKind::IoStore,
                    blocks: Vec::new(),
                    method_index: 0,
                });
            });
        }

        let chunks = self
            .chunk_ids
            .iter()
            .zip(&self.chunk_offsets_lengths)
            .map(|(id, loc)| ChunkInfo {
                chunk_type: id.chunk_type,
                offset: loc.offset,
                length: loc.length,
                encrypted,
            })
            .collect();

        let shared_blocks = self
            .compression_blocks
            .iter()
            .map(|e| CompressionBlock {
                compressed_offset: e.offset,
                compressed_size: e.compressed_size,
                uncompressed_size: e.uncompressed_size,
                method_index: e.compression_method_index,
            })
            .collect();

        ContainerIndex {
            kind: EntryKind::IoStore,
            mount_point,
            entries,
            chunks,
            shared_blocks,
            methods: self.compression_methods.clone(),
            block_size: self.header.compression_block_size,
            partition_size: self.header.partition_size,
        }
    }
}

/// Strip the relative engine-root prefix some cookers put on mount points.
pub(crate) fn strip_mount_prefix(mount_point: &str) -> String {
    mount_point
        .strip_prefix("../../../")
        .unwrap_or(mount_point)
        .to_string()
}
