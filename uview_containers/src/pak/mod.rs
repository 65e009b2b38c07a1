//! Legacy .pak container decoding

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use uview_helpers::UnrealReadExt;

use crate::compression::CompressionMethod;
use crate::encryption::{self, EncryptionKey};
use crate::entry::{CompressionBlock, ContainerEntry, ContainerIndex, EntryKind};
use crate::error::ContainerError;

pub mod version;
pub use version::PakVersion;

pub(crate) const PAK_MAGIC: u32 = u32::from_be_bytes([0xe1, 0x12, 0x6f, 0x5a]);

const ENTRY_ENCRYPTED_FLAG: u8 = 0x01;

/// One entry record as stored in the pak index and duplicated before the
/// entry data.
#[derive(Debug, Clone)]
pub struct PakEntryRecord {
    /// Offset of the entry (header + data) in the pak file
    pub offset: u64,
    /// Compressed size of the data
    pub compressed_size: u64,
    /// Decompressed size of the data
    pub decompressed_size: u64,
    /// Raw compression method field; meaning depends on the pak version
    pub compression_method: u32,
    /// Compression blocks, offsets relative to `offset`
    pub compression_blocks: Option<Vec<PakBlock>>,
    /// Entry flags
    pub flags: u8,
    /// Block size used when compressing
    pub compression_block_size: u32,
}

/// One compression block of a pak entry
#[derive(Debug, Copy, Clone)]
pub struct PakBlock {
    /// Start offset relative to the start of the entry record
    pub start: u64,
    /// Size of the compressed block
    pub size: u64,
}

impl PakEntryRecord {
    /// Read an entry record, reader positioned at its start.
    pub fn read<R: Read>(reader: &mut R, pak_version: PakVersion) -> Result<Self, ContainerError> {
        let offset = reader.read_u64::<LittleEndian>()?;
        let compressed_size = reader.read_u64::<LittleEndian>()?;
        let decompressed_size = reader.read_u64::<LittleEndian>()?;
        let compression_method = reader.read_u32::<LittleEndian>()?;

        if pak_version <= PakVersion::Initial {
            let _timestamp = reader.read_u64::<LittleEndian>()?;
        }

        let mut hash = [0u8; 20];
        reader.read_exact(&mut hash)?;

        let mut compression_blocks = None;
        let mut flags = 0;
        let mut compression_block_size = 0;

        if pak_version >= PakVersion::CompressionEncryption {
            if compression_method != 0 {
                let block_count = reader.read_u32::<LittleEndian>()? as usize;
                let mut blocks = Vec::with_capacity(block_count);

                for _ in 0..block_count {
                    // pre-v5 offsets are absolute in the file
                    let start_offset = reader.read_u64::<LittleEndian>()?
                        - if pak_version < PakVersion::RelativeChunkOffsets {
                            offset
                        } else {
                            0
                        };
                    let end_offset = reader.read_u64::<LittleEndian>()?;
                    blocks.push(PakBlock {
                        start: start_offset,
                        size: end_offset - start_offset,
                    });
                }
                compression_blocks = Some(blocks);
            }

            flags = reader.read_u8()?;
            compression_block_size = reader.read_u32::<LittleEndian>()?;
        }

        Ok(PakEntryRecord {
            offset,
            compressed_size,
            decompressed_size,
            compression_method,
            compression_blocks,
            flags,
            compression_block_size,
        })
    }

    /// Whether the entry data is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags & ENTRY_ENCRYPTED_FLAG != 0
    }

    /// Serialized size of this record, which is also the distance from
    /// `offset` to the entry data.
    pub fn serialized_len(&self, pak_version: PakVersion) -> u64 {
        let mut len = 28;

        if pak_version <= PakVersion::Initial {
            len += 8;
        }

        len += 20;

        if pak_version >= PakVersion::CompressionEncryption {
            if let Some(blocks) = &self.compression_blocks {
                len += 4 + blocks.len() as u64 * 16;
            }
            len += 5;
        }

        len
    }
}

/// Pak footer fields
#[derive(Debug, Clone)]
pub struct PakFooter {
    /// Pak format version
    pub pak_version: PakVersion,
    /// Offset of the index
    pub index_offset: u64,
    /// Size of the index
    pub index_size: u64,
    /// Whether the index is encrypted
    pub index_encrypted: bool,
    /// Guid of the encryption key, when present
    pub encryption_key_guid: Option<[u8; 16]>,
    /// Compression method names listed in the footer (v8+)
    pub compression_methods: Vec<CompressionMethod>,
}

impl PakFooter {
    /// Locate and read the footer by probing the known footer sizes.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, ContainerError> {
        // magic offset (from the end) can only be 0x2C (v2-v7), 0xAC (v8a),
        // 0xCC (v8b,v11), 0xCD (v9)
        let possible_offsets: [i64; 4] = [-0x2C, -0xAC, -0xCC, -0xCD];

        let mut magic_offset = None;
        for offset in possible_offsets {
            if reader.seek(SeekFrom::End(offset)).is_err() {
                continue;
            }
            if reader.read_u32::<BigEndian>()? == PAK_MAGIC {
                magic_offset = Some(offset);
            }
        }
        let magic_offset = magic_offset
            .ok_or_else(|| ContainerError::invalid_format("Pak magic not found".to_string()))?;

        reader.seek(SeekFrom::End(magic_offset + 4))?;

        let version_num = reader.read_u32::<LittleEndian>()?;
        let mut pak_version = PakVersion::from_num(version_num);
        if pak_version == PakVersion::Invalid {
            return Err(ContainerError::UnsupportedVersion(version_num));
        }
        if magic_offset == -0xAC {
            pak_version.set_subversion();
        }

        let index_offset = reader.read_u64::<LittleEndian>()?;
        let index_size = reader.read_u64::<LittleEndian>()?;

        let mut index_hash = [0u8; 20];
        reader.read_exact(&mut index_hash)?;

        // v9 has the frozen index byte before the method names
        if pak_version == PakVersion::FrozenIndex {
            reader.seek(SeekFrom::Current(1))?;
        }

        let compression_methods = if pak_version >= PakVersion::FnameBasedCompressionMethod {
            read_method_names(reader)?
        } else {
            Vec::new()
        };

        let mut index_encrypted = false;
        if pak_version >= PakVersion::IndexEncryption {
            reader.seek(SeekFrom::End(magic_offset - 1))?;
            index_encrypted = reader.read_u8()? != 0;
        }

        let mut encryption_key_guid = None;
        if pak_version >= PakVersion::EncryptionKeyGuid {
            reader.seek(SeekFrom::End(magic_offset - 0x11))?;
            let mut buf = [0u8; 16];
            reader.read_exact(&mut buf)?;
            encryption_key_guid = Some(buf);
        }

        Ok(PakFooter {
            pak_version,
            index_offset,
            index_size,
            index_encrypted,
            encryption_key_guid,
            compression_methods,
        })
    }
}

/// Read the NUL-padded 32-byte method names from the footer, tolerating the
/// 4-entry table some versions write.
fn read_method_names<R: Read + Seek>(
    reader: &mut R,
) -> Result<Vec<CompressionMethod>, ContainerError> {
    let old_pos = reader.stream_position()?;
    let remaining = reader.seek(SeekFrom::End(0))? - old_pos;
    reader.seek(SeekFrom::Start(old_pos))?;

    let num_entries = 5u64.min(remaining / 0x20);

    let mut methods = Vec::with_capacity(num_entries as usize);
    for _ in 0..num_entries {
        let mut buf = [0u8; 0x20];
        reader.read_exact(&mut buf)?;

        let null_end = buf.iter().position(|e| *e == 0x00).unwrap_or(buf.len());
        let name = String::from_utf8_lossy(&buf[..null_end]).to_string();
        methods.push(match name.is_empty() {
            true => CompressionMethod::None,
            false => CompressionMethod::new(&name),
        });
    }

    Ok(methods)
}

/// Decoded pak index
#[derive(Debug)]
pub struct PakIndexFile {
    /// Footer the index was located through
    pub footer: PakFooter,
    /// Mount point
    pub mount_point: String,
    /// Entries by declaration order
    pub entries: Vec<(String, PakEntryRecord)>,
}

impl PakIndexFile {
    /// Read the pak index from a .pak reader.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        encryption_key: Option<&EncryptionKey>,
    ) -> Result<Self, ContainerError> {
        let footer = PakFooter::read(reader)?;

        if footer.pak_version >= PakVersion::PathHashIndex {
            return Err(ContainerError::UnsupportedVersion(
                footer.pak_version.to_num(),
            ));
        }

        reader.seek(SeekFrom::Start(footer.index_offset))?;

        let (mount_point, entries) = if footer.index_encrypted {
            let Some(encryption_key) = encryption_key else {
                return Err(ContainerError::NoEncryptionKey);
            };

            let aes = encryption::cipher(encryption_key);
            let mut buf = vec![0u8; footer.index_size as usize];
            reader.read_exact(&mut buf)?;
            encryption::decrypt(&aes, &mut buf);

            let mount_len = i32::from_le_bytes(
                buf.get(..4)
                    .ok_or(ContainerError::BadKey)?
                    .try_into()
                    .unwrap(),
            );
            if !(0..=1024).contains(&mount_len) {
                return Err(ContainerError::BadKey);
            }

            Self::read_index_body(&mut Cursor::new(buf), footer.pak_version)?
        } else {
            Self::read_index_body(reader, footer.pak_version)?
        };

        Ok(PakIndexFile {
            footer,
            mount_point,
            entries,
        })
    }

    fn read_index_body<R: Read + Seek>(
        reader: &mut R,
        pak_version: PakVersion,
    ) -> Result<(String, Vec<(String, PakEntryRecord)>), ContainerError> {
        let mount_point = reader.read_fstring()?.unwrap_or_default();

        let entry_count = reader.read_u32::<LittleEndian>()?;
        let mut entries = Vec::with_capacity(entry_count as usize);

        for _ in 0..entry_count {
            let file_name = reader.read_fstring()?.ok_or_else(|| {
                ContainerError::invalid_format("Pak index entry has no name".to_string())
            })?;

            entries.push((file_name, PakEntryRecord::read(reader, pak_version)?));
        }

        Ok((mount_point, entries))
    }

    /// Flatten the index into the uniform [`ContainerIndex`] model.
    pub fn to_index(&self, container_path: &str) -> Result<ContainerIndex, ContainerError> {
        let mut methods = vec![CompressionMethod::None];
        methods.extend(self.footer.compression_methods.iter().cloned());

        let mount_point = crate::iostore::strip_mount_prefix(&self.mount_point);
        let mount_prefix = match mount_point.is_empty() || mount_point.ends_with('/') {
            true => mount_point.clone(),
            false => format!("{mount_point}/"),
        };

        let mut entries = Vec::with_capacity(self.entries.len());
        for (name, record) in &self.entries {
            let method_index =
                resolve_method_index(&mut methods, self.footer.pak_version, record)?;

            let data_offset = record.offset + record.serialized_len(self.footer.pak_version);

            let block_size = match record.compression_block_size {
                0 => record.decompressed_size as u32,
                size => size,
            };

            let blocks = match &record.compression_blocks {
                Some(blocks) => blocks
                    .iter()
                    .map(|block| CompressionBlock {
                        compressed_offset: record.offset + block.start,
                        compressed_size: block.size as u32,
                        uncompressed_size: block_size.min(record.decompressed_size as u32),
                        method_index,
                    })
                    .collect::<Vec<_>>(),
                None => vec![CompressionBlock {
                    compressed_offset: data_offset,
                    compressed_size: record.compressed_size as u32,
                    uncompressed_size: record.decompressed_size as u32,
                    method_index,
                }],
            };

            // block sizes are uniform except the tail block
            let blocks = fix_tail_block(blocks, record.decompressed_size);

            entries.push(ContainerEntry {
                container_path: container_path.to_string(),
                logical_path: format!("{mount_prefix}{name}"),
                offset: data_offset,
                size: record.decompressed_size,
                encrypted: record.is_encrypted(),
                kind: EntryKind::Pak,
                blocks,
                method_index,
            });
        }

        Ok(ContainerIndex {
            kind: EntryKind::Pak,
            mount_point,
            entries,
            chunks: Vec::new(),
            shared_blocks: Vec::new(),
            methods,
            block_size: 0,
            partition_size: u64::MAX,
        })
    }
}

/// Honor the per-version meaning of the raw compression method field:
/// v8+ is a 1-based index into the footer name table, older versions use the
/// fixed zlib flag values.
fn resolve_method_index(
    methods: &mut Vec<CompressionMethod>,
    pak_version: PakVersion,
    record: &PakEntryRecord,
) -> Result<u8, ContainerError> {
    if pak_version >= PakVersion::FnameBasedCompressionMethod {
        if record.compression_method == 0 {
            return Ok(0);
        }
        if record.compression_method <= 5 && (record.compression_method as usize) < methods.len() {
            return Ok(record.compression_method as u8);
        }
        return Err(ContainerError::unsupported_codec(&format!(
            "pak method index {}",
            record.compression_method
        )));
    }

    let method = match record.compression_method {
        0 => CompressionMethod::None,
        0x01 | 0x10 | 0x20 => CompressionMethod::Zlib,
        other => CompressionMethod::Unknown(other.to_string().into_boxed_str()),
    };

    Ok(find_or_insert_method(methods, method))
}

fn find_or_insert_method(methods: &mut Vec<CompressionMethod>, method: CompressionMethod) -> u8 {
    match methods.iter().position(|e| *e == method) {
        Some(index) => index as u8,
        None => {
            methods.push(method);
            (methods.len() - 1) as u8
        }
    }
}

/// Clamp the last block's uncompressed size to the remainder of the entry.
fn fix_tail_block(mut blocks: Vec<CompressionBlock>, total_size: u64) -> Vec<CompressionBlock> {
    let mut remaining = total_size;
    for block in blocks.iter_mut() {
        let uncompressed = (block.uncompressed_size as u64).min(remaining);
        block.uncompressed_size = uncompressed as u32;
        remaining -= uncompressed;
    }
    blocks
}
