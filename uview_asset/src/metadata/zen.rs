//! Zen (IoStore) package header parsing

use std::io::{Read, Seek};

use crate::archive::RawArchive;
use crate::error::Error;
use crate::metadata::{AssetExport, AssetImport, AssetMetadata, EPackageFlags};
use crate::name_batch;
use crate::script_objects::ScriptObjectIndex;
use crate::types::{FMappedName, PackageObjectIndex};

const MAX_HEADER_SIZE: u32 = 500 * 1024 * 1024;
const MAX_TABLE_COUNT: i64 = 1_000_000;
const MAX_CUSTOM_VERSIONS: i32 = 10_000;

/// Size of one export map entry on disk
pub const EXPORT_MAP_ENTRY_SIZE: u64 = 72;

/// Zen package summary
#[derive(Debug, Clone, Default)]
pub struct ZenPackageSummary {
    /// Whether a versioning block follows the summary
    pub has_versioning_info: bool,
    /// Total header size
    pub header_size: u32,
    /// Package name
    pub name: FMappedName,
    /// Package flags
    pub package_flags: EPackageFlags,
    /// Size the header would have in the legacy format
    pub cooked_header_size: u32,
    /// Imported public export hashes offset
    pub imported_public_export_hashes_offset: i32,
    /// Import map offset
    pub import_map_offset: i32,
    /// Export map offset
    pub export_map_offset: i32,
    /// Export bundle entries offset
    pub export_bundle_entries_offset: i32,
    /// Graph data offset (UE 5.0 - 5.2)
    pub graph_data_offset: Option<i32>,
    /// Dependency bundle headers offset (UE 5.3+)
    pub dependency_bundle_headers_offset: Option<i32>,
    /// Dependency bundle entries offset (UE 5.3+)
    pub dependency_bundle_entries_offset: Option<i32>,
    /// Imported package names offset (UE 5.3+)
    pub imported_package_names_offset: Option<i32>,
}

impl ZenPackageSummary {
    /// Read a `ZenPackageSummary`, including the version-dependent trailer.
    pub fn read<C: Read + Seek>(archive: &mut RawArchive<C>) -> Result<Self, Error> {
        let has_versioning_info = archive.read_u32()? != 0;
        let header_size = archive.read_u32()?;

        if header_size == 0 || header_size > MAX_HEADER_SIZE {
            return Err(Error::invalid_file(format!(
                "Implausible Zen header size {header_size}"
            )));
        }

        let name = archive.read_mapped_name()?;
        let package_flags = EPackageFlags::from_bits_retain(archive.read_u32()?);
        let cooked_header_size = archive.read_u32()?;

        let imported_public_export_hashes_offset = archive.read_i32()?;
        let import_map_offset = archive.read_i32()?;
        let export_map_offset = archive.read_i32()?;
        let export_bundle_entries_offset = archive.read_i32()?;

        for offset in [
            imported_public_export_hashes_offset,
            import_map_offset,
            export_map_offset,
            export_bundle_entries_offset,
        ] {
            if offset < 0 || offset as u64 > archive.data_length() {
                return Err(Error::invalid_file(format!(
                    "Zen summary offset {offset} is out of bounds"
                )));
            }
        }

        let mut summary = ZenPackageSummary {
            has_versioning_info,
            header_size,
            name,
            package_flags,
            cooked_header_size,
            imported_public_export_hashes_offset,
            import_map_offset,
            export_map_offset,
            export_bundle_entries_offset,
            ..Default::default()
        };

        // The 5.0-5.2 trailer is a single graph-data offset; 5.3+ has three
        // offsets. Try the three-field form and accept it only when the
        // offsets are monotonically non-decreasing and inside the header.
        let trailer_start = archive.position();
        let three_field = (|| -> Result<(i32, i32, i32), Error> {
            Ok((archive.read_i32()?, archive.read_i32()?, archive.read_i32()?))
        })();

        match three_field {
            Ok((headers, entries, names))
                if headers >= 0
                    && headers <= entries
                    && entries <= names
                    && (names as u32) < header_size =>
            {
                summary.dependency_bundle_headers_offset = Some(headers);
                summary.dependency_bundle_entries_offset = Some(entries);
                summary.imported_package_names_offset = Some(names);
            }
            _ => {
                archive.set_position(trailer_start)?;
                summary.graph_data_offset = Some(archive.read_i32()?);
            }
        }

        Ok(summary)
    }
}

/// Parse a Zen package header into [`AssetMetadata`].
///
/// Script imports resolve inline through `script_objects`; package imports
/// are recorded for the registry's hash pass.
pub fn parse<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    script_objects: Option<&ScriptObjectIndex>,
) -> Result<AssetMetadata, Error> {
    archive.set_position(0)?;

    let summary = ZenPackageSummary::read(archive)?;

    // `Global`-scoped mapped names index the global name batch, not the
    // package's own
    let global_names = script_objects.map(|e| e.names());

    if summary.has_versioning_info {
        // ZenVersion, PackageVersion, LicenseeVersion
        archive.skip(4 + 8 + 4)?;

        let custom_version_count = archive.read_i32()?;
        if !(0..=MAX_CUSTOM_VERSIONS).contains(&custom_version_count) {
            return Err(Error::invalid_file(format!(
                "Implausible custom version count {custom_version_count}"
            )));
        }
        archive.skip(custom_version_count as i64 * 20)?;
    }

    let name_table = name_batch::read_name_batch(archive)?;

    let package_name = summary
        .name
        .resolve(&name_table, global_names)
        .ok_or_else(|| Error::no_data("Zen package name is not in the name batch".to_string()))?;

    // imported public export hashes
    archive.set_position(summary.imported_public_export_hashes_offset as u64)?;
    let hash_count = count_between(
        summary.imported_public_export_hashes_offset,
        summary.import_map_offset,
        8,
    )?;
    let imported_public_export_hashes =
        archive.read_array_with_length(hash_count, |reader| reader.read_u64())?;

    let imported_package_names = match summary.imported_package_names_offset {
        Some(offset) => {
            archive.set_position(offset as u64)?;
            archive.read_array(|reader| Ok(reader.read_fstring()?.unwrap_or_default()))?
        }
        None => Vec::new(),
    };

    // import map
    archive.set_position(summary.import_map_offset as u64)?;
    let import_count = count_between(summary.import_map_offset, summary.export_map_offset, 8)?;

    let mut imports = Vec::with_capacity(import_count as usize);
    for _ in 0..import_count {
        let index = PackageObjectIndex::read(archive)?;
        imports.push(import_from_index(
            index,
            script_objects,
            &imported_package_names,
        ));
    }

    // export map
    archive.set_position(summary.export_map_offset as u64)?;
    let export_count = count_between(
        summary.export_map_offset,
        summary.export_bundle_entries_offset,
        EXPORT_MAP_ENTRY_SIZE as i32,
    )?;

    let mut exports = Vec::with_capacity(export_count as usize);
    for i in 0..export_count {
        let entry_start = summary.export_map_offset as u64 + i as u64 * EXPORT_MAP_ENTRY_SIZE;
        let export = read_export(archive, &name_table, global_names).unwrap_or_else(|_| {
            log::warn!("export {i} of {package_name} is invalid, skipping its record");
            AssetExport::default()
        });

        // keep subsequent entries aligned no matter what this one consumed
        archive.set_position(entry_start + EXPORT_MAP_ENTRY_SIZE)?;
        exports.push(export);
    }

    Ok(AssetMetadata {
        package_name,
        name_table,
        imports,
        exports,
        header_size: summary.header_size,
        cooked_header_size: summary.cooked_header_size,
        is_unversioned: summary
            .package_flags
            .contains(EPackageFlags::UNVERSIONED_PROPERTIES),
        is_zen: true,
        imported_public_export_hashes,
        imported_package_names,
    })
}

fn count_between(start: i32, end: i32, entry_size: i32) -> Result<i32, Error> {
    let count = (end as i64 - start as i64) / entry_size as i64;
    if !(0..=MAX_TABLE_COUNT).contains(&count) {
        return Err(Error::invalid_file(format!(
            "Implausible Zen table count {count}"
        )));
    }
    Ok(count as i32)
}

fn import_from_index(
    index: PackageObjectIndex,
    script_objects: Option<&ScriptObjectIndex>,
    imported_package_names: &[String],
) -> AssetImport {
    if index.is_script_import() {
        let raw = index.raw();
        return match script_objects.and_then(|e| e.resolve_with_module(raw)) {
            Some((object_name, module)) => AssetImport::resolved_at_parse(
                object_name,
                "Class".to_string(),
                module.unwrap_or_else(|| "/Script".to_string()),
            ),
            None => AssetImport::resolved_at_parse(
                format!("ScriptImport_0x{:X}", raw),
                "Class".to_string(),
                "/Script".to_string(),
            ),
        };
    }

    if index.is_package_import() {
        let (package_index, hash_index) = index.as_package_import();

        return match imported_package_names.get(package_index as usize) {
            Some(package_name) => {
                let basename = package_name
                    .rsplit('/')
                    .next()
                    .unwrap_or(package_name)
                    .to_string();
                AssetImport::pending(
                    basename,
                    String::new(),
                    package_name.clone(),
                    hash_index as i64,
                )
            }
            None => AssetImport::pending(
                format!("PackageImport_{}_{}", package_index, hash_index),
                String::new(),
                format!("/Package_{}", package_index),
                hash_index as i64,
            ),
        };
    }

    AssetImport::pending(
        format!("UnknownImport_0x{:X}", index.raw()),
        String::new(),
        String::new(),
        -1,
    )
}

fn read_export<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    name_table: &[String],
    global_names: Option<&[String]>,
) -> Result<AssetExport, Error> {
    let cooked_serial_offset = archive.read_u64()?;
    let cooked_serial_size = archive.read_u64()?;

    let name = archive
        .read_mapped_name()?
        .resolve(name_table, global_names)
        .unwrap_or_default();

    let outer = PackageObjectIndex::read(archive)?;
    let class = PackageObjectIndex::read(archive)?;
    let super_index = PackageObjectIndex::read(archive)?;
    let template = PackageObjectIndex::read(archive)?;
    let public_export_hash = archive.read_u64()?;
    let object_flags = archive.read_u32()?;

    // filter flags and padding
    archive.skip(4)?;

    Ok(AssetExport {
        name,
        serial_offset: cooked_serial_offset,
        serial_size: cooked_serial_size,
        outer: outer.into(),
        class_ref: class.into(),
        super_ref: super_index.into(),
        template_ref: template.into(),
        object_flags,
        public_export_hash,
        ..Default::default()
    })
}
