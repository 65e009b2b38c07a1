//! The orchestrating reader: open containers, enumerate, deserialize

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uview_containers::iostore::EIoChunkType;
use uview_containers::{
    encryption, AssetStream, BufferPool, ContainerEntry, ContainerError, MountedContainer,
};

use crate::archive::RawArchive;
use crate::error::Error;
use crate::metadata::AssetMetadata;
use crate::properties::{self, Diagnostic, DiagnosticCode, PropertyBag, ReadContext};
use crate::registry::{AssetGroup, AssetRegistry, ExportInfo, ProgressFn};
use crate::script_objects::ScriptObjectIndex;
use crate::typemap::{json, usmap, TypeRegistry};

/// Buffers kept on the shared decode free-list
const POOL_CAPACITY: usize = 64;

/// Configuration for [`ContentReader::open`]
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// Directory scanned for `.pak` and `.utoc` containers
    pub paks_root: PathBuf,
    /// Optional type-mapping blob (`.usmap`-style binary or `.json`)
    pub type_map_path: Option<PathBuf>,
    /// Optional AES key, 0x-prefixed hex
    pub aes_key: Option<String>,
    /// Worker count for metadata preloading; defaults to the CPU count
    pub parallelism: Option<usize>,
}

/// Read-only view over a game's packaged content.
pub struct ContentReader {
    registry: AssetRegistry,
    types: Arc<TypeRegistry>,
    parallelism: Option<usize>,
}

impl ContentReader {
    /// Discover and mount every container under the configured root, load
    /// the global script objects and the type mapping.
    pub fn open(config: ReaderConfig) -> Result<Self, Error> {
        let encryption_key = match &config.aes_key {
            Some(key) => Some(encryption::parse_key(key).map_err(Error::Container)?),
            None => None,
        };

        let mut container_paths = Vec::new();
        collect_container_paths(&config.paks_root, &mut container_paths)?;
        container_paths.sort();

        let pool = BufferPool::new(POOL_CAPACITY);

        let mut containers = Vec::new();
        for path in &container_paths {
            let is_utoc = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("utoc"))
                .unwrap_or(false);

            let mounted = match is_utoc {
                true => MountedContainer::mount_iostore(path, encryption_key.as_ref()),
                false => MountedContainer::mount_pak(path, encryption_key.as_ref()),
            };

            match mounted {
                Ok(container) => containers.push(Arc::new(container)),
                // a wrong or missing key is a configuration problem, not a
                // broken file; surface it instead of skipping
                Err(e @ (ContainerError::BadKey | ContainerError::NoEncryptionKey)) => {
                    return Err(e.into())
                }
                Err(e) => {
                    log::warn!("skipping container {}: {e}", path.display());
                }
            }
        }

        log::debug!("mounted {} containers", containers.len());

        let script_objects = load_script_objects(&containers, &pool)?;

        let types = Arc::new(TypeRegistry::new());
        if let Some(type_map_path) = &config.type_map_path {
            let is_json = type_map_path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("json"))
                .unwrap_or(false);

            let file = File::open(type_map_path)?;
            match is_json {
                true => json::load(file, &types)?,
                false => usmap::load(file, &types)?,
            }
        }

        let registry = AssetRegistry::new(containers, script_objects.map(Arc::new), pool);

        Ok(ContentReader {
            registry,
            types,
            parallelism: config.parallelism,
        })
    }

    /// The type registry backing unversioned deserialization.
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// The asset registry.
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// All container entries, optionally filtered by substring.
    pub fn entries(&self, filter: Option<&str>) -> Vec<&ContainerEntry> {
        self.registry.entries(filter)
    }

    /// All asset groups, optionally filtered by substring.
    pub fn assets(&self, filter: Option<&str>) -> Vec<&AssetGroup> {
        let filter = filter.map(|e| e.to_lowercase());
        self.registry
            .groups()
            .iter()
            .filter(|group| match &filter {
                Some(filter) => group.base_path.contains(filter),
                None => true,
            })
            .collect()
    }

    /// Parse (or fetch cached) metadata for a group.
    pub fn read_metadata(&self, group: &AssetGroup) -> Result<Arc<AssetMetadata>, Error> {
        self.registry.read_metadata(group)
    }

    /// Open a raw stream over any entry.
    pub fn open_entry(&self, entry: &ContainerEntry) -> Result<AssetStream, Error> {
        self.registry.open_entry(entry)
    }

    /// Read one export's serialized payload.
    pub fn read_export_data(
        &self,
        group: &AssetGroup,
        export_index: usize,
    ) -> Result<Vec<u8>, Error> {
        let metadata = self.registry.read_metadata(group)?;
        let export = metadata
            .exports
            .get(export_index)
            .ok_or_else(|| Error::no_data(format!("export {export_index} does not exist")))?;
        self.registry.read_export_data(group, export, &metadata)
    }

    /// Parse all metadata and resolve cross-package references.
    pub fn preload_all_metadata(&self, progress: Option<&ProgressFn>) -> Result<(), Error> {
        self.registry.preload_all_metadata(self.parallelism, progress)
    }

    /// Resolve an export by `"<packagePath>.<exportName>"`.
    pub fn resolve_export(&self, export_path: &str) -> Option<(Arc<AssetMetadata>, usize)> {
        self.registry.resolve_export(export_path)
    }

    /// Find exports by bare name.
    pub fn find_exports_by_name(&self, name: &str) -> Vec<(Arc<AssetMetadata>, usize)> {
        self.registry.find_exports_by_name(name)
    }

    /// Resolve an export by public export hash.
    pub fn resolve_export_by_hash(&self, hash: u64) -> Option<ExportInfo> {
        self.registry.resolve_export_by_hash(hash)
    }

    /// Deserialize one export into a property tree.
    ///
    /// Returns the best-effort bag plus every diagnostic the read emitted;
    /// callers decide whether fatal diagnostics constitute a failure.
    pub fn deserialize_export(
        &self,
        group: &AssetGroup,
        export_index: usize,
    ) -> Result<(PropertyBag, Vec<Diagnostic>), Error> {
        let metadata = self.registry.read_metadata(group)?;
        let export = metadata
            .exports
            .get(export_index)
            .ok_or_else(|| Error::no_data(format!("export {export_index} does not exist")))?;

        let data = self.registry.read_export_data(group, export, &metadata)?;
        let mut archive = RawArchive::new(Cursor::new(data))?;

        let mut ctx = ReadContext::new(
            &metadata.name_table,
            &metadata.imports,
            &metadata.exports,
            &self.types,
            metadata.package_path(),
            metadata.is_unversioned,
        );

        let type_name = export.final_class_name().to_string();
        let mut bag = PropertyBag::new(&type_name);

        let result = match metadata.is_unversioned {
            true => properties::read_unversioned(&mut archive, &mut ctx, &type_name, &mut bag),
            false => properties::read_tagged(&mut archive, &mut ctx, &mut bag),
        };

        // payload-level read failures become a fatal diagnostic on the
        // best-effort result rather than discarding what was read
        if let Err(e) = result {
            ctx.diagnostics.push(Diagnostic {
                code: DiagnosticCode::StreamOverrun,
                position: archive.position(),
                detail: e.to_string(),
                fatal: true,
            });
        }

        Ok((bag, ctx.diagnostics))
    }
}

fn collect_container_paths(root: &Path, out: &mut Vec<PathBuf>) -> Result<(), Error> {
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_container_paths(&path, out)?;
            continue;
        }

        let is_container = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pak") || e.eq_ignore_ascii_case("utoc"))
            .unwrap_or(false);
        if is_container {
            out.push(path);
        }
    }

    Ok(())
}

/// Find the ScriptObjects chunk in any mounted container and parse it.
fn load_script_objects(
    containers: &[Arc<MountedContainer>],
    pool: &Arc<BufferPool>,
) -> Result<Option<ScriptObjectIndex>, Error> {
    for container in containers {
        let Some(chunk) = container
            .index
            .find_chunk_by_type(EIoChunkType::ScriptObjects as u8)
        else {
            continue;
        };

        let entry = container.index.chunk_entry(&container.container_path, chunk);
        let mut stream = AssetStream::new(container.clone(), &entry, pool.clone())
            .map_err(Error::Container)?;
        let data = stream.read_to_end_at_start().map_err(Error::Container)?;

        return Ok(Some(ScriptObjectIndex::parse(&data)?));
    }

    Ok(None)
}
