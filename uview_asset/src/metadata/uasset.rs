//! Legacy tagged UAsset header parsing

use std::io::{Read, Seek};

use crate::archive::RawArchive;
use crate::error::Error;
use crate::metadata::versions::{ObjectVersion, ObjectVersionUE5};
use crate::metadata::{AssetExport, AssetImport, AssetMetadata, EPackageFlags};
use crate::types::PackageIndex;

const UASSET_MAGIC: u32 = 0x9E2A83C1;

/// An import record as serialized in the legacy import table
#[derive(Debug, Clone)]
struct RawImport {
    class_package: String,
    class_name: String,
    outer_index: PackageIndex,
    object_name: String,
    package_name: Option<String>,
}

/// Parse a legacy UAsset header into [`AssetMetadata`].
///
/// `package_name` is the logical path of the primary file; the legacy
/// summary itself does not carry it.
pub fn parse<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    package_name: &str,
) -> Result<AssetMetadata, Error> {
    archive.set_position(0)?;

    if archive.read_u32()? != UASSET_MAGIC {
        return Err(Error::invalid_file(
            "File is not a valid uasset file".to_string(),
        ));
    }

    let legacy_file_version = archive.read_i32()?;
    if !(-8..=-5).contains(&legacy_file_version) {
        return Err(Error::invalid_file(format!(
            "Unsupported uasset legacy version {legacy_file_version}"
        )));
    }

    // LegacyUE3Version, always 864 in versioned assets and 0 in unversioned
    archive.skip(4)?;

    let mut object_version = ObjectVersion(archive.read_i32()?);
    let mut object_version_ue5 = match legacy_file_version <= -8 {
        true => ObjectVersionUE5(archive.read_i32()?),
        false => ObjectVersionUE5::UNKNOWN,
    };

    // unversioned cooked assets write zero versions; assume the latest layout
    if object_version == ObjectVersion::UNKNOWN {
        object_version = ObjectVersion::AUTOMATIC;
        if legacy_file_version <= -8 {
            object_version_ue5 = ObjectVersionUE5::AUTOMATIC;
        }
    }

    let _file_licensee_version = archive.read_i32()?;

    // custom versions, 20 bytes each in the guid-keyed formats
    let custom_version_count = archive.read_i32()?;
    if !(0..=10_000).contains(&custom_version_count) {
        return Err(Error::invalid_file(format!(
            "Implausible custom version count {custom_version_count}"
        )));
    }
    archive.skip(custom_version_count as i64 * 20)?;

    let total_header_size = archive.read_i32()?;
    if total_header_size <= 0 {
        return Err(Error::invalid_file(format!(
            "Invalid header size {total_header_size}"
        )));
    }

    let _folder_name = archive.read_fstring()?;

    let package_flags = EPackageFlags::from_bits_retain(archive.read_u32()?);
    let has_editor_only_data = !package_flags.contains(EPackageFlags::FILTER_EDITOR_ONLY);

    let name_count = archive.read_i32()?;
    let name_offset = archive.read_i32()?;

    if object_version_ue5 >= ObjectVersionUE5::ADD_SOFTOBJECTPATH_LIST {
        let _soft_object_paths_count = archive.read_i32()?;
        let _soft_object_paths_offset = archive.read_i32()?;
    }

    if object_version >= ObjectVersion::VER_UE4_ADDED_PACKAGE_SUMMARY_LOCALIZATION_ID
        && has_editor_only_data
    {
        let _localization_id = archive.read_fstring()?;
    }

    if object_version >= ObjectVersion::VER_UE4_SERIALIZE_TEXT_IN_PACKAGES {
        let _gatherable_text_data_count = archive.read_i32()?;
        let _gatherable_text_data_offset = archive.read_i32()?;
    }

    let export_count = archive.read_i32()?;
    let export_offset = archive.read_i32()?;
    let import_count = archive.read_i32()?;
    let import_offset = archive.read_i32()?;
    let _depends_offset = archive.read_i32()?;

    for (count, offset) in [
        (name_count, name_offset),
        (export_count, export_offset),
        (import_count, import_offset),
    ] {
        if count < 0 || offset < 0 || offset as u64 > archive.data_length() {
            return Err(Error::invalid_file(format!(
                "Table with count {count} at offset {offset} is out of bounds"
            )));
        }
    }

    let name_table = read_name_table(archive, name_offset as u64, name_count, object_version)?;

    let raw_imports = read_imports(
        archive,
        import_offset as u64,
        import_count,
        &name_table,
        object_version,
        object_version_ue5,
        has_editor_only_data,
    )?;
    let imports = link_imports(raw_imports);

    let exports = read_exports(
        archive,
        export_offset as u64,
        export_count,
        &name_table,
        object_version,
        object_version_ue5,
    )?;

    Ok(AssetMetadata {
        package_name: package_name.to_string(),
        name_table,
        imports,
        exports,
        header_size: total_header_size as u32,
        cooked_header_size: total_header_size as u32,
        is_unversioned: package_flags.contains(EPackageFlags::UNVERSIONED_PROPERTIES),
        is_zen: false,
        imported_public_export_hashes: Vec::new(),
        imported_package_names: Vec::new(),
    })
}

fn read_name_table<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    offset: u64,
    count: i32,
    object_version: ObjectVersion,
) -> Result<Vec<String>, Error> {
    archive.set_position(offset)?;

    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = archive.read_fstring()?.unwrap_or_default();

        if object_version >= ObjectVersion::VER_UE4_NAME_HASHES_SERIALIZED && !name.is_empty() {
            let _hash = archive.read_u32()?;
        }

        names.push(name);
    }

    Ok(names)
}

fn read_fname<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    name_table: &[String],
) -> Result<String, Error> {
    let index = archive.read_i32()?;
    let number = archive.read_i32()?;

    let name = name_table
        .get(index as usize)
        .ok_or(Error::NameOutOfRange(index, name_table.len()))?;

    Ok(match number {
        0 => name.clone(),
        number => format!("{}_{}", name, number - 1),
    })
}

fn read_imports<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    offset: u64,
    count: i32,
    name_table: &[String],
    object_version: ObjectVersion,
    object_version_ue5: ObjectVersionUE5,
    has_editor_only_data: bool,
) -> Result<Vec<RawImport>, Error> {
    archive.set_position(offset)?;

    let mut imports = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let class_package = read_fname(archive, name_table)?;
        let class_name = read_fname(archive, name_table)?;
        let outer_index = PackageIndex::new(archive.read_i32()?);
        let object_name = read_fname(archive, name_table)?;

        let package_name = match object_version >= ObjectVersion::VER_UE4_NON_OUTER_PACKAGE_IMPORT
            && has_editor_only_data
        {
            true => Some(read_fname(archive, name_table)?),
            false => None,
        };

        if object_version_ue5 >= ObjectVersionUE5::OPTIONAL_RESOURCES {
            let _import_optional = archive.read_i32()?;
        }

        imports.push(RawImport {
            class_package,
            class_name,
            outer_index,
            object_name,
            package_name,
        });
    }

    Ok(imports)
}

/// Derive each import's package from its outer chain: the outermost import
/// names the package. Imports that are themselves packages use their own
/// name.
fn link_imports(raw_imports: Vec<RawImport>) -> Vec<AssetImport> {
    let package_of = |import: &RawImport| -> String {
        if let Some(package_name) = &import.package_name {
            return package_name.clone();
        }

        if import.outer_index.is_null() {
            return match import.class_name == "Package" {
                true => import.object_name.clone(),
                false => import.class_package.clone(),
            };
        }

        let mut current = import.outer_index;
        for _ in 0..raw_imports.len() {
            let Some(outer) = raw_imports.get(current.as_import() as usize) else {
                break;
            };
            if outer.outer_index.is_null() {
                return outer.object_name.clone();
            }
            current = outer.outer_index;
        }

        import.class_package.clone()
    };

    raw_imports
        .iter()
        .map(|import| {
            AssetImport::resolved_at_parse(
                import.object_name.clone(),
                import.class_name.clone(),
                package_of(import),
            )
        })
        .collect()
}

fn read_exports<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    offset: u64,
    count: i32,
    name_table: &[String],
    object_version: ObjectVersion,
    object_version_ue5: ObjectVersionUE5,
) -> Result<Vec<AssetExport>, Error> {
    archive.set_position(offset)?;

    let mut exports = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let class_index = PackageIndex::new(archive.read_i32()?);
        let super_index = PackageIndex::new(archive.read_i32()?);

        let template_index =
            match object_version >= ObjectVersion::VER_UE4_TEMPLATE_INDEX_IN_COOKED_EXPORTS {
                true => PackageIndex::new(archive.read_i32()?),
                false => PackageIndex::default(),
            };

        let outer_index = PackageIndex::new(archive.read_i32()?);
        let name = read_fname(archive, name_table)?;
        let object_flags = archive.read_u32()?;

        let (serial_size, serial_offset) =
            match object_version < ObjectVersion::VER_UE4_64BIT_EXPORTMAP_SERIALSIZES {
                true => (archive.read_i32()? as i64, archive.read_i32()? as i64),
                false => (archive.read_i64()?, archive.read_i64()?),
            };

        let _forced_export = archive.read_i32()?;
        let _not_for_client = archive.read_i32()?;
        let _not_for_server = archive.read_i32()?;

        if object_version_ue5 < ObjectVersionUE5::REMOVE_OBJECT_EXPORT_PACKAGE_GUID {
            archive.skip(16)?;
        }

        if object_version_ue5 >= ObjectVersionUE5::TRACK_OBJECT_EXPORT_IS_INHERITED {
            let _is_inherited_instance = archive.read_i32()?;
        }

        let _package_flags = archive.read_u32()?;

        if object_version >= ObjectVersion::VER_UE4_LOAD_FOR_EDITOR_GAME {
            let _not_always_loaded_for_editor_game = archive.read_i32()?;
        }

        if object_version >= ObjectVersion::VER_UE4_COOKED_ASSETS_IN_EDITOR_SUPPORT {
            let _is_asset = archive.read_i32()?;
        }

        if object_version_ue5 >= ObjectVersionUE5::OPTIONAL_RESOURCES {
            let _generate_public_hash = archive.read_i32()?;
        }

        if object_version >= ObjectVersion::VER_UE4_PRELOAD_DEPENDENCIES_IN_COOKED_EXPORTS {
            // first dependency offset plus the four dependency list sizes
            archive.skip(20)?;
        }

        exports.push(AssetExport {
            name,
            serial_offset: serial_offset.max(0) as u64,
            serial_size: serial_size.max(0) as u64,
            outer: outer_index.into(),
            class_ref: class_index.into(),
            super_ref: super_index.into(),
            template_ref: template_index.into(),
            object_flags,
            public_export_hash: 0,
            ..Default::default()
        });
    }

    Ok(exports)
}
