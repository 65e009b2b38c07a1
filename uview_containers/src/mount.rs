//! Memory-mapped container mounting

use std::fs::File;
use std::path::{Path, PathBuf};

use aes::Aes256;
use memmap2::Mmap;

use crate::encryption::{self, EncryptionKey};
use crate::entry::ContainerIndex;
use crate::error::ContainerError;
use crate::iostore::IoStoreToc;
use crate::pak::PakIndexFile;

/// A mounted container: the decoded index plus read-only memory maps of the
/// data file and its partitions.
///
/// The maps are immutable for the container's lifetime, so streams share
/// them without coordination; the registry owns the container and streams
/// borrow it through an `Arc`.
pub struct MountedContainer {
    /// Path of the container file the entries reference
    pub container_path: String,
    /// Decoded index
    pub index: ContainerIndex,
    /// AES cipher for encrypted entries
    pub(crate) aes: Option<Aes256>,
    partitions: Vec<Mmap>,
    partition_size: u64,
}

impl std::fmt::Debug for MountedContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedContainer")
            .field("container_path", &self.container_path)
            .field("entries", &self.index.entries.len())
            .field("partitions", &self.partitions.len())
            .field("data_len", &self.data_len())
            .finish()
    }
}

impl MountedContainer {
    /// Mount a legacy .pak container. The pak file is both index and data.
    pub fn mount_pak(
        path: &Path,
        encryption_key: Option<&EncryptionKey>,
    ) -> Result<Self, ContainerError> {
        let container_path = path.to_string_lossy().to_string();

        let mut file = File::open(path)?;
        let pak_index = PakIndexFile::read(&mut file, encryption_key)?;
        let index = pak_index.to_index(&container_path)?;

        log::debug!(
            "mounted pak {} ({} entries, version {:?})",
            container_path,
            index.entries.len(),
            pak_index.footer.pak_version
        );

        let data = unsafe { Mmap::map(&file)? };

        Ok(MountedContainer {
            container_path,
            partition_size: index.partition_size,
            index,
            aes: encryption_key.map(encryption::cipher),
            partitions: vec![data],
        })
    }

    /// Mount an IoStore container from its .utoc path; the `.ucas` data file
    /// and any `_s<n>.ucas` partitions are expected next to it.
    pub fn mount_iostore(
        utoc_path: &Path,
        encryption_key: Option<&EncryptionKey>,
    ) -> Result<Self, ContainerError> {
        let container_path = utoc_path.to_string_lossy().to_string();

        let mut toc_file = File::open(utoc_path)?;
        let toc = IoStoreToc::read(&mut toc_file, encryption_key)?;
        let index = toc.to_index(&container_path);

        let partition_count = toc.header.partition_count.max(1);
        let mut partitions = Vec::with_capacity(partition_count as usize);
        for partition in 0..partition_count {
            let data_path = partition_path(utoc_path, partition);
            let data_file = File::open(&data_path)?;
            partitions.push(unsafe { Mmap::map(&data_file)? });
        }

        log::debug!(
            "mounted iostore {} ({} entries, {} blocks, {} partitions)",
            container_path,
            index.entries.len(),
            index.shared_blocks.len(),
            partitions.len()
        );

        Ok(MountedContainer {
            container_path,
            partition_size: index.partition_size,
            index,
            aes: encryption_key.map(encryption::cipher),
            partitions,
        })
    }

    /// Total length of the mapped data across partitions.
    pub fn data_len(&self) -> u64 {
        self.partitions.iter().map(|e| e.len() as u64).sum()
    }

    /// Random-access read at an absolute data offset, routed to the right
    /// partition.
    ///
    /// Thread-safe: the mappings are immutable and reads do not coordinate.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), ContainerError> {
        let (partition, offset_in_partition) = match self.partition_size {
            u64::MAX => (0usize, offset),
            size => ((offset / size) as usize, offset % size),
        };

        let Some(data) = self.partitions.get(partition) else {
            return Err(ContainerError::overrun(offset, buf.len() as u64, 0));
        };

        let end = offset_in_partition + buf.len() as u64;
        if end > data.len() as u64 {
            return Err(ContainerError::overrun(
                offset,
                buf.len() as u64,
                (data.len() as u64).saturating_sub(offset_in_partition),
            ));
        }

        buf.copy_from_slice(&data[offset_in_partition as usize..end as usize]);
        Ok(())
    }
}

/// Data file path for a partition: `X.ucas` for the first, `X_s<n>.ucas`
/// for the rest.
fn partition_path(utoc_path: &Path, partition: u32) -> PathBuf {
    match partition {
        0 => utoc_path.with_extension("ucas"),
        n => {
            let stem = utoc_path
                .file_stem()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            utoc_path.with_file_name(format!("{stem}_s{n}.ucas"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_paths() {
        let utoc = Path::new("/paks/MyGame-Windows.utoc");
        assert_eq!(
            partition_path(utoc, 0),
            Path::new("/paks/MyGame-Windows.ucas")
        );
        assert_eq!(
            partition_path(utoc, 2),
            Path::new("/paks/MyGame-Windows_s2.ucas")
        );
    }
}
