//! Asset registry: grouping, metadata caching and cross-package resolution

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use uview_containers::{AssetStream, BufferPool, ContainerEntry, EntryKind, MountedContainer};

use crate::archive::RawArchive;
use crate::error::Error;
use crate::metadata::{AssetExport, AssetMetadata, ResolvedImport, ResolvedRef};
use crate::script_objects::ScriptObjectIndex;
use crate::types::ObjectRef;

/// Progress callback for metadata preloading: `(done, total)`
pub type ProgressFn = dyn Fn(usize, usize) + Sync;

/// A primary asset with its optional companion files
#[derive(Debug, Clone)]
pub struct AssetGroup {
    /// Lowercased logical path without the extension
    pub base_path: String,
    /// The `.uasset` or `.umap` entry
    pub primary: ContainerEntry,
    /// Serialized export data, when split out of the primary
    pub uexp: Option<ContainerEntry>,
    /// Bulk data
    pub ubulk: Option<ContainerEntry>,
    /// Whether the primary is a `.umap`
    pub is_map: bool,
}

/// What the public-export-hash index knows about one export
#[derive(Debug, Clone, Default)]
pub struct ExportInfo {
    /// Export name
    pub name: String,
    /// Class name
    pub class_name: String,
    /// Package path
    pub package_path: String,
    /// Export index within its package
    pub export_index: i32,
}

/// Which reference of an export is being resolved
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RefRole {
    Class,
    Super,
    Template,
}

/// Owns the mounted containers and builds every cross-package index.
pub struct AssetRegistry {
    containers: HashMap<String, Arc<MountedContainer>>,
    pool: Arc<BufferPool>,
    script_objects: Option<Arc<ScriptObjectIndex>>,

    entries: Vec<ContainerEntry>,
    groups: Vec<AssetGroup>,

    metadata_cache: RwLock<HashMap<String, Arc<AssetMetadata>>>,
    export_index: RwLock<HashMap<String, (Arc<AssetMetadata>, usize)>>,
    export_name_index: RwLock<HashMap<String, Vec<(Arc<AssetMetadata>, usize)>>>,
    public_export_hash_index: RwLock<HashMap<u64, ExportInfo>>,
}

impl AssetRegistry {
    /// Build a registry over mounted containers.
    ///
    /// Entries are deduplicated by lookup path; IoStore entries supersede
    /// Pak entries for the same path, otherwise the first mounted wins.
    pub fn new(
        containers: Vec<Arc<MountedContainer>>,
        script_objects: Option<Arc<ScriptObjectIndex>>,
        pool: Arc<BufferPool>,
    ) -> Self {
        let mut by_path: HashMap<String, ContainerEntry> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for container in &containers {
            for entry in &container.index.entries {
                let key = entry.lookup_path();
                match by_path.get(&key) {
                    None => {
                        order.push(key.clone());
                        by_path.insert(key, entry.clone());
                    }
                    Some(existing)
                        if existing.kind == EntryKind::Pak && entry.kind == EntryKind::IoStore =>
                    {
                        by_path.insert(key, entry.clone());
                    }
                    Some(_) => {}
                }
            }
        }

        let entries: Vec<ContainerEntry> =
            order.iter().map(|key| by_path[key].clone()).collect();
        let groups = Self::group_entries(&entries);

        log::debug!(
            "registry holds {} entries in {} asset groups",
            entries.len(),
            groups.len()
        );

        AssetRegistry {
            containers: containers
                .into_iter()
                .map(|e| (e.container_path.clone(), e))
                .collect(),
            pool,
            script_objects,
            entries,
            groups,
            metadata_cache: RwLock::new(HashMap::new()),
            export_index: RwLock::new(HashMap::new()),
            export_name_index: RwLock::new(HashMap::new()),
            public_export_hash_index: RwLock::new(HashMap::new()),
        }
    }

    /// Partition entries into asset groups, dropping orphan companions.
    fn group_entries(entries: &[ContainerEntry]) -> Vec<AssetGroup> {
        let mut primaries: HashMap<String, (ContainerEntry, bool)> = HashMap::new();
        let mut companions: HashMap<String, (Option<ContainerEntry>, Option<ContainerEntry>)> =
            HashMap::new();
        let mut order = Vec::new();

        for entry in entries {
            let lookup = entry.lookup_path();
            let Some((base, extension)) = lookup.rsplit_once('.') else {
                continue;
            };

            match extension {
                "uasset" | "umap" => {
                    if !primaries.contains_key(base) {
                        order.push(base.to_string());
                        primaries
                            .insert(base.to_string(), (entry.clone(), extension == "umap"));
                    }
                }
                "uexp" => {
                    companions.entry(base.to_string()).or_default().0 = Some(entry.clone());
                }
                "ubulk" => {
                    companions.entry(base.to_string()).or_default().1 = Some(entry.clone());
                }
                _ => {}
            }
        }

        order
            .into_iter()
            .map(|base| {
                let (primary, is_map) = primaries.remove(&base).expect("primary recorded above");
                let (uexp, ubulk) = companions.remove(&base).unwrap_or_default();
                AssetGroup {
                    base_path: base,
                    primary,
                    uexp,
                    ubulk,
                    is_map,
                }
            })
            .collect()
    }

    /// All entries, optionally filtered by a case-insensitive substring.
    pub fn entries(&self, filter: Option<&str>) -> Vec<&ContainerEntry> {
        let filter = filter.map(|e| e.to_lowercase());
        self.entries
            .iter()
            .filter(|entry| match &filter {
                Some(filter) => entry.lookup_path().contains(filter),
                None => true,
            })
            .collect()
    }

    /// All asset groups.
    pub fn groups(&self) -> &[AssetGroup] {
        &self.groups
    }

    /// Open a raw stream over any entry.
    pub fn open_entry(&self, entry: &ContainerEntry) -> Result<AssetStream, Error> {
        let container = self
            .containers
            .get(&entry.container_path)
            .ok_or_else(|| Error::no_data(format!("container {} not mounted", entry.container_path)))?;

        Ok(AssetStream::new(
            container.clone(),
            entry,
            self.pool.clone(),
        )?)
    }

    /// Parse (or fetch cached) metadata for a group.
    pub fn read_metadata(&self, group: &AssetGroup) -> Result<Arc<AssetMetadata>, Error> {
        if let Some(cached) = self.metadata_cache.read().get(&group.base_path) {
            return Ok(cached.clone());
        }

        let mut stream = self.open_entry(&group.primary)?;
        let data = stream.read_to_end_at_start()?;
        let mut archive = RawArchive::new(std::io::Cursor::new(data))?;

        let metadata = match group.primary.kind {
            EntryKind::IoStore => crate::metadata::zen::parse(
                &mut archive,
                self.script_objects.as_deref(),
            )?,
            EntryKind::Pak => crate::metadata::uasset::parse(
                &mut archive,
                &package_path_of(&group.primary.logical_path),
            )?,
        };

        let metadata = Arc::new(metadata);

        // first writer wins so concurrent preloads stay consistent
        let mut cache = self.metadata_cache.write();
        Ok(cache
            .entry(group.base_path.clone())
            .or_insert(metadata)
            .clone())
    }

    /// Parse every group's metadata in parallel, then build the
    /// cross-package indices and resolve all references to a fixpoint.
    ///
    /// Running this twice produces identical caches and indices.
    pub fn preload_all_metadata(
        &self,
        max_parallelism: Option<usize>,
        progress: Option<&ProgressFn>,
    ) -> Result<(), Error> {
        let parallelism = max_parallelism
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|e| e.get())
                    .unwrap_or(1)
            })
            .max(1);

        let total = self.groups.len();
        let done = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build()
            .map_err(|e| Error::no_data(format!("could not build worker pool: {e}")))?;

        pool.install(|| {
            self.groups.par_iter().for_each(|group| {
                if let Err(e) = self.read_metadata(group) {
                    log::warn!("failed to read metadata for {}: {e}", group.base_path);
                }

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(progress) = progress {
                    progress(finished, total);
                }
            });
        });

        self.build_indices();
        self.resolve_references();

        Ok(())
    }

    /// Rebuild the export indices from the metadata cache.
    fn build_indices(&self) {
        let mut export_index = self.export_index.write();
        let mut export_name_index = self.export_name_index.write();
        let mut hash_index = self.public_export_hash_index.write();

        export_index.clear();
        export_name_index.clear();
        hash_index.clear();

        for group in &self.groups {
            let Some(metadata) = self.metadata_cache.read().get(&group.base_path).cloned()
            else {
                continue;
            };

            let package_path = metadata.package_path().to_string();

            for (index, export) in metadata.exports.iter().enumerate() {
                let key = format!("{}.{}", package_path, export.name).to_lowercase();
                export_index
                    .entry(key)
                    .or_insert_with(|| (metadata.clone(), index));

                export_name_index
                    .entry(export.name.to_lowercase())
                    .or_default()
                    .push((metadata.clone(), index));

                if export.is_public() && export.public_export_hash != 0 {
                    hash_index
                        .entry(export.public_export_hash)
                        .or_insert_with(|| ExportInfo {
                            name: export.name.clone(),
                            class_name: export.final_class_name().to_string(),
                            package_path: package_path.clone(),
                            export_index: index as i32,
                        });
                }
            }
        }
    }

    /// Resolve every export's class/super/template and every pending
    /// import against the indices.
    fn resolve_references(&self) {
        let metadata_list: Vec<Arc<AssetMetadata>> = {
            let cache = self.metadata_cache.read();
            self.groups
                .iter()
                .filter_map(|group| cache.get(&group.base_path).cloned())
                .collect()
        };

        // script and local references first so class names are known
        for metadata in &metadata_list {
            for export in &metadata.exports {
                self.resolve_export_ref(metadata, export, export.class_ref, RefRole::Class);
                self.resolve_export_ref(metadata, export, export.super_ref, RefRole::Super);
                self.resolve_export_ref(metadata, export, export.template_ref, RefRole::Template);
            }
        }

        // import resolution through the public export hash index
        for metadata in &metadata_list {
            for import in &metadata.imports {
                if import.is_resolved() || import.public_export_hash_index < 0 {
                    continue;
                }

                let Some(hash) = metadata
                    .imported_public_export_hashes
                    .get(import.public_export_hash_index as usize)
                else {
                    continue;
                };

                if let Some(info) = self.public_export_hash_index.read().get(hash) {
                    import.resolve(ResolvedImport {
                        name: info.name.clone(),
                        class_name: info.class_name.clone(),
                        package_name: info.package_path.clone(),
                    });
                }
            }
        }
    }

    fn resolve_export_ref(
        &self,
        metadata: &AssetMetadata,
        export: &AssetExport,
        object_ref: ObjectRef,
        role: RefRole,
    ) {
        let resolved = match object_ref {
            ObjectRef::Null => return,
            ObjectRef::ScriptImport(raw) => self.resolve_script_ref(raw, role),
            ObjectRef::Export(index) => {
                metadata
                    .exports
                    .get(index as usize)
                    .map(|target| ResolvedRef {
                        class_name: target.final_class_name().to_string(),
                        name: target.name.clone(),
                        package_path: metadata.package_path().to_string(),
                        export_index: index as i32,
                    })
            }
            ObjectRef::Import(index) => {
                metadata.imports.get(index as usize).map(|import| ResolvedRef {
                    class_name: import.final_class_name().to_string(),
                    name: import.final_name().to_string(),
                    package_path: import.final_package_name().to_string(),
                    export_index: -1,
                })
            }
            ObjectRef::PackageImport { hash, .. } => metadata
                .imported_public_export_hashes
                .get(hash as usize)
                .and_then(|hash| {
                    self.public_export_hash_index
                        .read()
                        .get(hash)
                        .map(|info| ResolvedRef {
                            class_name: info.class_name.clone(),
                            name: info.name.clone(),
                            package_path: info.package_path.clone(),
                            export_index: info.export_index,
                        })
                }),
        };

        let Some(resolved) = resolved else {
            return;
        };

        match role {
            RefRole::Class => {
                let _ = export.class_name.set(resolved.name.clone());
                let _ = export.class.set(resolved);
            }
            RefRole::Super => {
                let _ = export.superclass.set(resolved);
            }
            RefRole::Template => {
                let _ = export.template.set(resolved);
            }
        }
    }

    fn resolve_script_ref(&self, raw: u64, role: RefRole) -> Option<ResolvedRef> {
        let script_objects = self.script_objects.as_deref()?;
        let (object_name, module) = script_objects.resolve_with_module(raw)?;
        let package_path = module.unwrap_or_else(|| "/Script".to_string());

        Some(match role {
            RefRole::Class | RefRole::Super => ResolvedRef {
                class_name: "Class".to_string(),
                name: object_name,
                package_path,
                export_index: -1,
            },
            RefRole::Template => ResolvedRef {
                class_name: object_name.clone(),
                name: format!("Default__{object_name}"),
                package_path,
                export_index: -1,
            },
        })
    }

    /// Resolve an export by `"<packagePath>.<exportName>"`.
    pub fn resolve_export(&self, export_path: &str) -> Option<(Arc<AssetMetadata>, usize)> {
        self.export_index
            .read()
            .get(&export_path.to_lowercase())
            .cloned()
    }

    /// Find exports by bare name.
    pub fn find_exports_by_name(&self, name: &str) -> Vec<(Arc<AssetMetadata>, usize)> {
        self.export_name_index
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve an export by its public export hash.
    pub fn resolve_export_by_hash(&self, hash: u64) -> Option<ExportInfo> {
        self.public_export_hash_index.read().get(&hash).cloned()
    }

    /// Read one export's serialized payload.
    ///
    /// The serial range may live in the primary, in the `.uexp` companion,
    /// or span both; IoStore primaries bias cooked offsets by the cooked
    /// header size.
    pub fn read_export_data(
        &self,
        group: &AssetGroup,
        export: &AssetExport,
        metadata: &AssetMetadata,
    ) -> Result<Vec<u8>, Error> {
        let serial_size = export.serial_size;
        if serial_size == 0 || serial_size > i32::MAX as u64 {
            return Err(Error::InvalidSerialSize(
                export.name.clone().into_boxed_str(),
                serial_size as i64,
            ));
        }

        let mut data = vec![0u8; serial_size as usize];

        if metadata.is_zen {
            // cooked offsets are relative to the legacy-format header size
            let position = export
                .serial_offset
                .checked_sub(metadata.cooked_header_size as u64)
                .map(|e| e + metadata.header_size as u64)
                .unwrap_or(export.serial_offset);

            let mut stream = self.open_entry(&group.primary)?;
            stream.seek(SeekFrom::Start(position))?;
            stream.read_exact(&mut data)?;
            return Ok(data);
        }

        let primary_size = group.primary.size;
        let serial_offset = export.serial_offset;

        if serial_offset >= primary_size {
            // the payload lives entirely in the companion
            let Some(uexp) = &group.uexp else {
                return Err(Error::missing_companion(
                    &group.primary.logical_path,
                    &format!("{}.uexp", group.base_path),
                ));
            };

            let mut stream = self.open_entry(uexp)?;
            stream.seek(SeekFrom::Start(serial_offset - primary_size))?;
            stream.read_exact(&mut data)?;
            return Ok(data);
        }

        if serial_offset + serial_size <= primary_size {
            let mut stream = self.open_entry(&group.primary)?;
            stream.seek(SeekFrom::Start(serial_offset))?;
            stream.read_exact(&mut data)?;
            return Ok(data);
        }

        // the payload spans the primary and the companion
        let Some(uexp) = &group.uexp else {
            return Err(Error::missing_companion(
                &group.primary.logical_path,
                &format!("{}.uexp", group.base_path),
            ));
        };

        let primary_part = (primary_size - serial_offset) as usize;

        let mut stream = self.open_entry(&group.primary)?;
        stream.seek(SeekFrom::Start(serial_offset))?;
        stream.read_exact(&mut data[..primary_part])?;

        let mut stream = self.open_entry(uexp)?;
        stream.read_exact(&mut data[primary_part..])?;

        Ok(data)
    }
}

/// Map a container logical path onto a package path: game content under
/// `<Project>/Content/` mounts at `/Game/`, engine content at `/Engine/`.
pub(crate) fn package_path_of(logical_path: &str) -> String {
    let without_extension = match logical_path.rsplit_once('.') {
        Some((base, extension)) if !extension.contains('/') => base,
        _ => logical_path,
    };

    let trimmed = without_extension.trim_start_matches('/');

    if let Some(rest) = trimmed.strip_prefix("Engine/Content/") {
        return format!("/Engine/{rest}");
    }

    if let Some((_, rest)) = trimmed.split_once("/Content/") {
        return format!("/Game/{rest}");
    }

    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_path_mapping() {
        assert_eq!(
            package_path_of("MyGame/Content/Maps/Frontend.umap"),
            "/Game/Maps/Frontend"
        );
        assert_eq!(
            package_path_of("Engine/Content/BasicShapes/Cube.uasset"),
            "/Engine/BasicShapes/Cube"
        );
        assert_eq!(package_path_of("/Game/Loose.uasset"), "/Game/Loose");
    }

    #[test]
    fn grouping_drops_orphans_and_attaches_companions() {
        let entry = |path: &str| ContainerEntry {
            container_path: "test.pak".to_string(),
            logical_path: path.to_string(),
            offset: 0,
            size: 16,
            encrypted: false,
            kind: EntryKind::Pak,
            blocks: Vec::new(),
            method_index: 0,
        };

        let entries = vec![
            entry("Game/Content/A.uasset"),
            entry("Game/Content/A.uexp"),
            entry("Game/Content/A.ubulk"),
            entry("Game/Content/Orphan.uexp"),
            entry("Game/Content/B.umap"),
        ];

        let groups = AssetRegistry::group_entries(&entries);
        assert_eq!(groups.len(), 2);

        let a = &groups[0];
        assert_eq!(a.base_path, "game/content/a");
        assert!(a.uexp.is_some());
        assert!(a.ubulk.is_some());
        assert!(!a.is_map);

        let b = &groups[1];
        assert!(b.is_map);
        assert!(b.uexp.is_none());
    }
}
