//! Block-streamed entry access

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use parking_lot::Mutex;
use uview_helpers::align16;

use crate::compression::{self, CompressionMethod};
use crate::encryption;
use crate::entry::{ContainerEntry, ContainerIndex, EntryKind};
use crate::error::ContainerError;
use crate::mount::MountedContainer;

/// A bounded free-list of decode buffers shared by all streams of a reader.
///
/// Streams rent one raw and at most one decode buffer per block load and
/// return them on block change and on drop.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    /// Create a pool holding at most `capacity` free buffers.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(BufferPool {
            buffers: Mutex::new(Vec::new()),
            capacity,
        })
    }

    /// Rent a buffer of exactly `size` bytes.
    pub fn rent(&self, size: usize) -> Vec<u8> {
        let mut buffer = self.buffers.lock().pop().unwrap_or_default();
        buffer.clear();
        buffer.resize(size, 0);
        buffer
    }

    /// Return a buffer to the pool; dropped when the free-list is full.
    pub fn give_back(&self, buffer: Vec<u8>) {
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.capacity {
            buffers.push(buffer);
        }
    }
}

/// Geometry of one block of an entry
#[derive(Debug, Copy, Clone)]
pub struct BlockDescriptor {
    /// Absolute offset of the compressed bytes in the data file
    pub compressed_offset: u64,
    /// Compressed size
    pub compressed_size: u32,
    /// Full decoded size of the block
    pub uncompressed_size: u32,
    /// Method table index
    pub method_index: u8,
    /// Entry-relative offset of the first entry byte in this block
    pub entry_start: u64,
    /// Number of entry bytes in this block
    pub entry_len: u64,
    /// Offset of the first entry byte within the decoded block
    pub skip: u64,
}

/// Translates entry-relative offsets into container block reads.
#[derive(Debug, Clone)]
pub struct BlockProvider {
    blocks: Vec<BlockDescriptor>,
    methods: Vec<CompressionMethod>,
    /// Logical entry size
    pub uncompressed_size: u64,
    /// Offset of the entry within its first block (IoStore), 0 for Pak
    pub first_block_offset: u64,
    /// Whether block reads must be decrypted
    pub encrypted: bool,
}

impl BlockProvider {
    /// Build the block geometry for an entry.
    pub fn new(entry: &ContainerEntry, index: &ContainerIndex) -> Result<Self, ContainerError> {
        let blocks = match entry.kind {
            EntryKind::Pak => {
                let mut cursor = 0u64;
                entry
                    .blocks
                    .iter()
                    .map(|block| {
                        let descriptor = BlockDescriptor {
                            compressed_offset: block.compressed_offset,
                            compressed_size: block.compressed_size,
                            uncompressed_size: block.uncompressed_size,
                            method_index: block.method_index,
                            entry_start: cursor,
                            entry_len: block.uncompressed_size as u64,
                            skip: 0,
                        };
                        cursor += block.uncompressed_size as u64;
                        descriptor
                    })
                    .collect()
            }
            EntryKind::IoStore => {
                let block_size = index.block_size as u64;
                if block_size == 0 {
                    return Err(ContainerError::invalid_format(
                        "IoStore container has no compression block size".to_string(),
                    ));
                }

                match entry.size {
                    0 => Vec::new(),
                    size => {
                        let first = entry.offset / block_size;
                        let last = (entry.offset + size - 1) / block_size;

                        let mut blocks = Vec::with_capacity((last - first + 1) as usize);
                        for block_index in first..=last {
                            let Some(block) =
                                index.shared_blocks.get(block_index as usize).copied()
                            else {
                                return Err(ContainerError::invalid_format(format!(
                                    "Entry {} spans block {} beyond the container block table",
                                    entry.logical_path, block_index
                                )));
                            };

                            let block_global_start = block_index * block_size;
                            let skip = entry.offset.saturating_sub(block_global_start);
                            let entry_start = (block_global_start + skip) - entry.offset;
                            let entry_len = (block.uncompressed_size as u64 - skip)
                                .min(size - entry_start);

                            blocks.push(BlockDescriptor {
                                compressed_offset: block.compressed_offset,
                                compressed_size: block.compressed_size,
                                uncompressed_size: block.uncompressed_size,
                                method_index: block.method_index,
                                entry_start,
                                entry_len,
                                skip,
                            });
                        }
                        blocks
                    }
                }
            }
        };

        Ok(BlockProvider {
            blocks,
            methods: index.methods.clone(),
            uncompressed_size: entry.size,
            first_block_offset: match entry.kind {
                EntryKind::Pak => 0,
                EntryKind::IoStore => entry.offset % index.block_size.max(1) as u64,
            },
            encrypted: entry.encrypted,
        })
    }

    /// Number of blocks the entry spans.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block geometry by entry-relative block index.
    pub fn block(&self, index: usize) -> &BlockDescriptor {
        &self.blocks[index]
    }

    /// Bytes to read from disk for a block: encrypted spans are padded to the
    /// AES block alignment.
    pub fn block_read_size(&self, index: usize) -> usize {
        let compressed_size = self.blocks[index].compressed_size as u64;
        match self.encrypted {
            true => align16(compressed_size) as usize,
            false => compressed_size as usize,
        }
    }

    /// Compression method of a block.
    pub fn block_method(&self, index: usize) -> &CompressionMethod {
        self.methods
            .get(self.blocks[index].method_index as usize)
            .unwrap_or(&CompressionMethod::None)
    }

    /// Find the block containing the entry-relative position.
    pub fn block_index_for(&self, position: u64) -> Option<usize> {
        self.blocks
            .iter()
            .position(|e| position >= e.entry_start && position < e.entry_start + e.entry_len)
    }
}

/// A seekable read-only view of one entry, decoding blocks on demand.
///
/// Holds exactly one decoded block at a time; buffers cycle through the
/// shared [`BufferPool`].
pub struct AssetStream {
    container: Arc<MountedContainer>,
    provider: BlockProvider,
    pool: Arc<BufferPool>,
    position: u64,
    current_block: Option<usize>,
    block_data: Option<Vec<u8>>,
}

impl AssetStream {
    /// Open a stream over an entry of a mounted container.
    pub fn new(
        container: Arc<MountedContainer>,
        entry: &ContainerEntry,
        pool: Arc<BufferPool>,
    ) -> Result<Self, ContainerError> {
        if entry.encrypted && container.aes.is_none() {
            return Err(ContainerError::NoEncryptionKey);
        }

        let provider = BlockProvider::new(entry, &container.index)?;

        Ok(AssetStream {
            container,
            provider,
            pool,
            position: 0,
            current_block: None,
            block_data: None,
        })
    }

    /// Logical length of the stream.
    pub fn len(&self) -> u64 {
        self.provider.uncompressed_size
    }

    /// Whether the stream has no data.
    pub fn is_empty(&self) -> bool {
        self.provider.uncompressed_size == 0
    }

    /// Read the whole entry into a buffer.
    pub fn read_to_end_at_start(&mut self) -> Result<Vec<u8>, ContainerError> {
        self.seek(SeekFrom::Start(0))?;
        let mut data = vec![0u8; self.len() as usize];
        self.read_exact(&mut data)?;
        Ok(data)
    }

    fn load_block(&mut self, block_index: usize) -> Result<(), ContainerError> {
        if self.current_block == Some(block_index) {
            return Ok(());
        }

        if let Some(old) = self.block_data.take() {
            self.pool.give_back(old);
        }
        self.current_block = None;

        let block = *self.provider.block(block_index);
        let read_size = self.provider.block_read_size(block_index);

        let mut raw = self.pool.rent(read_size);
        self.container.read_at(block.compressed_offset, &mut raw)?;

        if self.provider.encrypted {
            let aes = self
                .container
                .aes
                .as_ref()
                .ok_or(ContainerError::NoEncryptionKey)?;
            encryption::decrypt(aes, &mut raw);
        }

        let method = self.provider.block_method(block_index).clone();
        let data = match method {
            CompressionMethod::None => {
                raw.truncate(block.uncompressed_size as usize);
                raw
            }
            method => {
                let mut decoded = self.pool.rent(block.uncompressed_size as usize);
                // decompress the unaligned span; padding is only for AES
                let result = compression::decompress(
                    &method,
                    &raw[..block.compressed_size as usize],
                    &mut decoded,
                );
                self.pool.give_back(raw);
                result?;
                decoded
            }
        };

        self.block_data = Some(data);
        self.current_block = Some(block_index);
        Ok(())
    }
}

impl Read for AssetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;

        while written < buf.len() && self.position < self.provider.uncompressed_size {
            let in_current = self
                .current_block
                .map(|i| {
                    let block = self.provider.block(i);
                    self.position >= block.entry_start
                        && self.position < block.entry_start + block.entry_len
                })
                .unwrap_or(false);

            if !in_current {
                let Some(block_index) = self.provider.block_index_for(self.position) else {
                    break;
                };
                self.load_block(block_index)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            }

            let block_index = self.current_block.expect("block loaded above");
            let block = *self.provider.block(block_index);
            let data = self.block_data.as_ref().expect("block data loaded above");

            let offset_in_data = (self.position - block.entry_start + block.skip) as usize;
            let block_remaining = data.len().saturating_sub(offset_in_data);
            let entry_remaining =
                (block.entry_start + block.entry_len - self.position) as usize;

            let to_copy = (buf.len() - written)
                .min(block_remaining)
                .min(entry_remaining);
            if to_copy == 0 {
                break;
            }

            buf[written..written + to_copy]
                .copy_from_slice(&data[offset_in_data..offset_in_data + to_copy]);

            written += to_copy;
            self.position += to_copy as u64;
        }

        Ok(written)
    }
}

impl Seek for AssetStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.provider.uncompressed_size as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }

        self.position = target as u64;
        Ok(self.position)
    }
}

impl Drop for AssetStream {
    fn drop(&mut self) {
        if let Some(buffer) = self.block_data.take() {
            self.pool.give_back(buffer);
        }
    }
}
