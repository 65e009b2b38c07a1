//! Uniform entry records produced by the container index decoders

use crate::compression::CompressionMethod;

/// Which container format an entry came from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Legacy footer-indexed .pak container
    Pak,
    /// IoStore .utoc/.ucas container
    IoStore,
}

/// One compressed block of entry data.
///
/// For Pak containers blocks are entry-local; for IoStore they live in the
/// container-shared block table and `compressed_offset` is absolute within
/// the data file in both cases.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CompressionBlock {
    /// Absolute offset of the compressed bytes in the data file
    pub compressed_offset: u64,
    /// Size of the compressed bytes
    pub compressed_size: u32,
    /// Size after decompression
    pub uncompressed_size: u32,
    /// Index into the container's compression method table, 0 = None
    pub method_index: u8,
}

/// An addressable file-like item within a container
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    /// Path of the container file this entry is stored in
    pub container_path: String,
    /// Slash-delimited logical path with original casing, extension preserved
    pub logical_path: String,
    /// Offset of the entry data: absolute for Pak, into the logical
    /// uncompressed container space for IoStore
    pub offset: u64,
    /// Uncompressed size of the entry
    pub size: u64,
    /// Whether the entry data is encrypted
    pub encrypted: bool,
    /// Source container format
    pub kind: EntryKind,
    /// Entry-local block table (Pak only, empty for IoStore)
    pub blocks: Vec<CompressionBlock>,
    /// Index into the container method table (Pak only; IoStore blocks carry
    /// their own method indices)
    pub method_index: u8,
}

impl ContainerEntry {
    /// Lowercased logical path used for lookups
    pub fn lookup_path(&self) -> String {
        self.logical_path.to_lowercase()
    }
}

/// Offset and length of one chunk in an IoStore container
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChunkInfo {
    /// Chunk type, the high byte of the last u32 of the chunk id
    pub chunk_type: u8,
    /// Offset into the logical uncompressed container space
    pub offset: u64,
    /// Uncompressed length
    pub length: u64,
    /// Whether the chunk data is encrypted
    pub encrypted: bool,
}

/// Decoded index of a single container file
#[derive(Debug, Clone)]
pub struct ContainerIndex {
    /// Source container format
    pub kind: EntryKind,
    /// Mount point the logical paths are rooted at
    pub mount_point: String,
    /// Entries in the container
    pub entries: Vec<ContainerEntry>,
    /// All chunks by toc order (IoStore only); lets callers reach chunks
    /// that have no directory-index path, like ScriptObjects
    pub chunks: Vec<ChunkInfo>,
    /// Container-shared block table (IoStore only, empty for Pak)
    pub shared_blocks: Vec<CompressionBlock>,
    /// Method table; index 0 is always `None`
    pub methods: Vec<CompressionMethod>,
    /// Fixed uncompressed block size (IoStore only, 0 for Pak)
    pub block_size: u32,
    /// Size of one data-file partition; block offsets beyond it live in
    /// `_s<n>` partition files. `u64::MAX` for unpartitioned containers.
    pub partition_size: u64,
}

impl ContainerIndex {
    /// Resolve a method index against the container method table.
    pub fn method(&self, index: u8) -> CompressionMethod {
        self.methods
            .get(index as usize)
            .cloned()
            .unwrap_or(CompressionMethod::Unknown(
                index.to_string().into_boxed_str(),
            ))
    }

    /// Find the first chunk of the given type.
    pub fn find_chunk_by_type(&self, chunk_type: u8) -> Option<ChunkInfo> {
        self.chunks
            .iter()
            .find(|e| e.chunk_type == chunk_type)
            .copied()
    }

    /// Synthesize an entry covering one chunk, so chunks without a
    /// directory-index path can be streamed like any other entry.
    pub fn chunk_entry(&self, container_path: &str, chunk: ChunkInfo) -> ContainerEntry {
        ContainerEntry {
            container_path: container_path.to_string(),
            logical_path: format!("<chunk type {}>", chunk.chunk_type),
            offset: chunk.offset,
            size: chunk.length,
            encrypted: chunk.encrypted,
            kind: EntryKind::IoStore,
            blocks: Vec::new(),
            method_index: 0,
        }
    }
}
