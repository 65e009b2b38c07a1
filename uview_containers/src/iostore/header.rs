//! .utoc header

use std::io::{Read, Seek, SeekFrom};

use bitflags::bitflags;
use byteorder::{ReadBytesExt, LE};
use uview_helpers::{Guid, UnrealReadExt};

use crate::error::ContainerError;

use super::EIoStoreTocVersion;

bitflags! {
    /// IoStore container flags
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct EIoContainerFlags : u8 {
        /// Has a directory index
        const INDEXED = 0x01;
        /// Entry data is encrypted
        const ENCRYPTED = 0x02;
        /// Blocks are signed
        const SIGNED = 0x04;
    }
}

/// IoStore .utoc header, 144 bytes on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IoStoreTocHeader {
    /// Version
    pub version: EIoStoreTocVersion,
    /// Total header size; parsing continues at this offset
    pub header_size: u32,
    /// Entry count
    pub entry_count: u32,
    /// Compressed block entry count
    pub compressed_block_entry_count: u32,
    /// Compressed block entry size
    pub compressed_block_entry_size: u32,
    /// Compression method name count
    pub compression_method_name_count: u32,
    /// Compression method name length
    pub compression_method_name_length: u32,
    /// Uncompressed block size
    pub compression_block_size: u32,
    /// Directory index size
    pub directory_index_size: u32,
    /// Partition count
    pub partition_count: u32,
    /// Container id
    pub container_id: u64,
    /// Encryption key guid
    pub encryption_key_guid: Guid,
    /// Container flags
    pub container_flags: EIoContainerFlags,
    /// Chunk perfect hash seeds count
    pub chunk_perfect_hash_seeds_count: u32,
    /// Partition size
    pub partition_size: u64,
    /// Chunks without perfect hash count
    pub chunks_without_perfect_hash_count: u32,
}

impl IoStoreTocHeader {
    const TOC_MAGIC: [u8; 16] = *b"-==--==--==--==-";
    const FIXED_SIZE: u32 = 144;

    /// Read `IoStoreTocHeader` from a reader.
    ///
    /// The reader is left at `header_size`, where the chunk id table starts.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<IoStoreTocHeader, ContainerError> {
        let mut magic = [0u8; 16];
        reader.read_exact(&mut magic)?;

        if magic != Self::TOC_MAGIC {
            return Err(ContainerError::invalid_format(format!(
                "Invalid .utoc magic, got: {magic:?}"
            )));
        }

        let version_raw = reader.read_u8()?;
        let version = EIoStoreTocVersion::try_from(version_raw)
            .map_err(|_| ContainerError::UnsupportedVersion(version_raw as u32))?;
        if version == EIoStoreTocVersion::Invalid {
            return Err(ContainerError::UnsupportedVersion(0));
        }

        let mut reserved = [0u8; 3];
        reader.read_exact(&mut reserved)?;

        let header_size = reader.read_u32::<LE>()?;
        if header_size < Self::FIXED_SIZE {
            return Err(ContainerError::invalid_format(format!(
                "Invalid .utoc header size {header_size}"
            )));
        }

        let entry_count = reader.read_u32::<LE>()?;
        let compressed_block_entry_count = reader.read_u32::<LE>()?;
        let compressed_block_entry_size = reader.read_u32::<LE>()?;
        let compression_method_name_count = reader.read_u32::<LE>()?;
        let compression_method_name_length = reader.read_u32::<LE>()?;
        let compression_block_size = reader.read_u32::<LE>()?;
        let directory_index_size = reader.read_u32::<LE>()?;
        let mut partition_count = reader.read_u32::<LE>()?;
        let container_id = reader.read_u64::<LE>()?;

        let encryption_key_guid = reader.read_guid()?;

        let container_flags = EIoContainerFlags::from_bits_retain(reader.read_u8()?);

        let mut reserved_0 = [0u8; 3];
        reader.read_exact(&mut reserved_0)?;

        let chunk_perfect_hash_seeds_count = reader.read_u32::<LE>()?;
        let mut partition_size = reader.read_u64::<LE>()?;
        let chunks_without_perfect_hash_count = reader.read_u32::<LE>()?;

        let mut reserved_1 = [0u8; 44];
        reader.read_exact(&mut reserved_1)?;

        if version < EIoStoreTocVersion::PartitionSize {
            partition_count = 1;
            partition_size = u64::MAX;
        }

        reader.seek(SeekFrom::Start(header_size as u64))?;

        Ok(IoStoreTocHeader {
            version,
            header_size,
            entry_count,
            compressed_block_entry_count,
            compressed_block_entry_size,
            compression_method_name_count,
            compression_method_name_length,
            compression_block_size,
            directory_index_size,
            partition_count,
            container_id,
            encryption_key_guid,
            container_flags,
            chunk_perfect_hash_seeds_count,
            partition_size,
            chunks_without_perfect_hash_count,
        })
    }
}
