//! Shared fixture builders for the integration tests: in-memory Zen package
//! headers and IoStore container pairs.

#![allow(dead_code)]

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_fstring(buf: &mut Vec<u8>, value: &str) {
    write_u32(buf, value.len() as u32 + 1);
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}

/// Encode a name batch of ASCII names.
pub fn encode_name_batch(names: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(names.len() as i32).to_le_bytes());
    out.extend_from_slice(&(names.iter().map(|e| e.len() as i32).sum::<i32>()).to_le_bytes());
    out.extend_from_slice(&0xC164_0000u64.to_le_bytes()); // hash version
    for _ in names {
        out.extend_from_slice(&0u64.to_le_bytes()); // hashes, unchecked
    }
    for name in names {
        out.push((name.len() >> 8) as u8);
        out.push(name.len() as u8);
    }
    for name in names {
        out.extend_from_slice(name.as_bytes());
    }
    out
}

/// One export of a [`ZenPackageSpec`]
pub struct ZenExportSpec {
    pub name: &'static str,
    /// When set, the export name is written as a `Global`-scoped mapped name
    /// with this index into the global name batch, and `name` is ignored
    pub global_name_index: Option<u32>,
    /// Raw class `PackageObjectIndex`
    pub class: u64,
    pub public_export_hash: u64,
    pub object_flags: u32,
    /// Serialized property bytes appended after the header
    pub payload: Vec<u8>,
}

/// Declarative Zen package header, encoded by [`ZenPackageSpec::build`]
pub struct ZenPackageSpec {
    pub package_name: &'static str,
    pub extra_names: Vec<&'static str>,
    /// Raw import map entries
    pub imports: Vec<u64>,
    pub exports: Vec<ZenExportSpec>,
    pub imported_hashes: Vec<u64>,
    pub imported_package_names: Vec<&'static str>,
    pub unversioned: bool,
}

impl ZenPackageSpec {
    fn names(&self) -> Vec<&'static str> {
        let mut names = vec![self.package_name];
        names.extend(&self.extra_names);
        names
    }

    fn name_index(&self, name: &str) -> u32 {
        self.names()
            .iter()
            .position(|e| *e == name)
            .expect("name listed in the fixture") as u32
    }

    /// Encode with the UE 5.3+ three-offset trailer.
    pub fn build(&self) -> Vec<u8> {
        self.encode(true)
    }

    /// Encode with the UE 5.0 single graph-data trailer.
    pub fn build_five_zero(&self) -> Vec<u8> {
        self.encode(false)
    }

    fn encode(&self, five_three: bool) -> Vec<u8> {
        let name_batch = encode_name_batch(&self.names());

        let summary_len: u32 = if five_three { 52 } else { 44 };
        let hashes_offset = summary_len + name_batch.len() as u32;
        let import_map_offset = hashes_offset + self.imported_hashes.len() as u32 * 8;
        let export_map_offset = import_map_offset + self.imports.len() as u32 * 8;
        let bundle_entries_offset = export_map_offset + self.exports.len() as u32 * 72;

        let mut names_section = Vec::new();
        write_u32(
            &mut names_section,
            self.imported_package_names.len() as u32,
        );
        for name in &self.imported_package_names {
            write_fstring(&mut names_section, name);
        }

        let header_size = bundle_entries_offset + names_section.len() as u32;

        let mut out = Vec::new();
        write_u32(&mut out, 0); // has versioning info
        write_u32(&mut out, header_size);
        write_u32(&mut out, self.name_index(self.package_name)); // mapped name
        write_u32(&mut out, 0); // mapped name extra
        write_u32(&mut out, if self.unversioned { 0x2000 } else { 0 });
        write_u32(&mut out, 100); // cooked header size
        write_u32(&mut out, hashes_offset);
        write_u32(&mut out, import_map_offset);
        write_u32(&mut out, export_map_offset);
        write_u32(&mut out, bundle_entries_offset);

        match five_three {
            true => {
                write_u32(&mut out, bundle_entries_offset);
                write_u32(&mut out, bundle_entries_offset);
                write_u32(&mut out, bundle_entries_offset);
            }
            false => write_u32(&mut out, bundle_entries_offset),
        }
        assert_eq!(out.len() as u32, summary_len);

        out.extend_from_slice(&name_batch);

        for hash in &self.imported_hashes {
            write_u64(&mut out, *hash);
        }

        for import in &self.imports {
            write_u64(&mut out, *import);
        }

        // cooked serial offsets are relative to the legacy-format header
        // size, which the summary declares as 100
        let mut payload_cursor = 100u64;
        for export in &self.exports {
            write_u64(&mut out, payload_cursor);
            write_u64(&mut out, export.payload.len() as u64);
            match export.global_name_index {
                // scope bits 2 = global name table
                Some(index) => write_u32(&mut out, index | (2 << 30)),
                None => write_u32(&mut out, self.name_index(export.name)),
            }
            write_u32(&mut out, 0); // mapped name extra
            write_u64(&mut out, u64::MAX); // outer
            write_u64(&mut out, export.class);
            write_u64(&mut out, u64::MAX); // super
            write_u64(&mut out, u64::MAX); // template
            write_u64(&mut out, export.public_export_hash);
            write_u32(&mut out, export.object_flags);
            out.extend_from_slice(&[0u8; 4]); // filter flags + padding

            payload_cursor += export.payload.len() as u64;
        }

        out.extend_from_slice(&names_section);
        assert_eq!(out.len() as u32, header_size);

        for export in &self.exports {
            out.extend_from_slice(&export.payload);
        }

        out
    }
}

/// Name table of [`build_legacy_tagged_asset`] fixtures.
pub const LEGACY_NAMES: &[&str] = &[
    "None",           // 0
    "Package",        // 1
    "Class",          // 2
    "/Script/Engine", // 3
    "Actor",          // 4
    "MyTagged",       // 5
    "MyInt",          // 6
    "IntProperty",    // 7
];

fn write_legacy_fname(buf: &mut Vec<u8>, index: i32) {
    buf.extend_from_slice(&index.to_le_bytes());
    write_u32(buf, 0);
}

/// Build a cooked legacy `.uasset` header whose single export's payload of
/// `serial_size` bytes lives in the companion `.uexp` (serial offset equals
/// the header length).
pub fn build_legacy_tagged_asset(serial_size: u64) -> Vec<u8> {
    let summary = |name_offset: i32, export_offset: i32, import_offset: i32| -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0x9E2A83C1u32.to_le_bytes());
        out.extend_from_slice(&(-7i32).to_le_bytes());
        write_u32(&mut out, 0); // legacy ue3 version
        write_u32(&mut out, 0); // unversioned
        write_u32(&mut out, 0); // licensee version
        write_u32(&mut out, 0); // custom version count
        write_u32(&mut out, 4096); // total header size
        write_fstring(&mut out, "None");
        write_u32(&mut out, 0x8000_0000); // filter editor only, tagged payloads
        write_u32(&mut out, LEGACY_NAMES.len() as u32);
        write_u32(&mut out, name_offset as u32);
        write_u32(&mut out, 0); // gatherable text count
        write_u32(&mut out, 0); // gatherable text offset
        write_u32(&mut out, 1); // export count
        write_u32(&mut out, export_offset as u32);
        write_u32(&mut out, 2); // import count
        write_u32(&mut out, import_offset as u32);
        write_u32(&mut out, 0); // depends offset
        out
    };

    let mut name_table = Vec::new();
    for name in LEGACY_NAMES {
        write_fstring(&mut name_table, name);
        write_u32(&mut name_table, 0); // serialized name hash
    }

    let mut imports = Vec::new();
    // the /Script/Engine package
    write_legacy_fname(&mut imports, 3);
    write_legacy_fname(&mut imports, 1);
    write_u32(&mut imports, 0);
    write_legacy_fname(&mut imports, 3);
    // Actor, outered to the package import
    write_legacy_fname(&mut imports, 3);
    write_legacy_fname(&mut imports, 2);
    imports.extend_from_slice(&(-1i32).to_le_bytes());
    write_legacy_fname(&mut imports, 4);

    let summary_len = summary(0, 0, 0).len() as i32;
    let name_offset = summary_len;
    let import_offset = name_offset + name_table.len() as i32;
    let export_offset = import_offset + imports.len() as i32;

    // one export record; 104 bytes at these versions
    let asset_len = export_offset as u64 + 104;

    let mut exports = Vec::new();
    exports.extend_from_slice(&(-2i32).to_le_bytes()); // class: imports[1]
    write_u32(&mut exports, 0); // super
    write_u32(&mut exports, 0); // template
    write_u32(&mut exports, 0); // outer
    write_legacy_fname(&mut exports, 5); // MyTagged
    write_u32(&mut exports, 1); // object flags: public
    exports.extend_from_slice(&(serial_size as i64).to_le_bytes());
    exports.extend_from_slice(&(asset_len as i64).to_le_bytes()); // serial offset
    write_u32(&mut exports, 0); // forced export
    write_u32(&mut exports, 0); // not for client
    write_u32(&mut exports, 0); // not for server
    exports.extend_from_slice(&[0u8; 16]); // package guid
    write_u32(&mut exports, 0); // package flags
    write_u32(&mut exports, 0); // not always loaded for editor game
    write_u32(&mut exports, 0); // is asset
    for _ in 0..5 {
        write_u32(&mut exports, 0); // preload dependency fields
    }
    assert_eq!(exports.len(), 104);

    let mut asset = summary(name_offset, export_offset, import_offset);
    asset.extend_from_slice(&name_table);
    asset.extend_from_slice(&imports);
    asset.extend_from_slice(&exports);
    assert_eq!(asset.len() as u64, asset_len);
    asset
}

/// Build a minimal v8b pak with uncompressed entries.
pub fn build_pak(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let write_record = |buf: &mut Vec<u8>, offset: u64, size: u64| {
        write_u64(buf, offset);
        write_u64(buf, size); // compressed
        write_u64(buf, size); // decompressed
        write_u32(buf, 0); // method: none
        buf.extend_from_slice(&[0u8; 20]); // hash
        buf.push(0); // flags
        write_u32(buf, 0x10000); // compression block size
    };

    let mut pak = Vec::new();
    let mut offsets = Vec::new();
    for (_, data) in files {
        offsets.push(pak.len() as u64);
        write_record(&mut pak, 0, data.len() as u64);
        pak.extend_from_slice(data);
    }

    let index_offset = pak.len() as u64;
    let mut index = Vec::new();
    write_fstring(&mut index, "../../../MyGame/Content/");
    write_u32(&mut index, files.len() as u32);
    for ((name, data), offset) in files.iter().zip(&offsets) {
        write_fstring(&mut index, name);
        write_record(&mut index, *offset, data.len() as u64);
    }
    pak.extend_from_slice(&index);

    // footer: guid, encrypted flag, magic, version, offset, size, hash, methods
    pak.extend_from_slice(&[0u8; 16]);
    pak.push(0);
    pak.extend_from_slice(&[0xe1, 0x12, 0x6f, 0x5a]);
    write_u32(&mut pak, 8);
    write_u64(&mut pak, index_offset);
    write_u64(&mut pak, index.len() as u64);
    pak.extend_from_slice(&[0u8; 20]);
    for _ in 0..5 {
        pak.extend_from_slice(&[0u8; 0x20]);
    }

    pak
}

/// Build an uncompressed, unencrypted `.utoc`/`.ucas` pair holding the given
/// files under the `/Game/` mount point.
pub fn build_iostore_pair(files: &[(&str, Vec<u8>)]) -> (Vec<u8>, Vec<u8>) {
    const BLOCK_SIZE: u32 = 0x10000;

    let mut ucas = Vec::new();
    let mut locations = Vec::new();
    for (_, data) in files {
        locations.push((ucas.len() as u64, data.len() as u64));
        ucas.extend_from_slice(data);
    }
    assert!(ucas.len() <= BLOCK_SIZE as usize, "fixture exceeds one block");

    let mut directory_index = Vec::new();
    write_fstring(&mut directory_index, "/Game/");

    // the root directory, files chained from entry 0
    write_u32(&mut directory_index, 1);
    write_u32(&mut directory_index, u32::MAX);
    write_u32(&mut directory_index, u32::MAX);
    write_u32(&mut directory_index, u32::MAX);
    write_u32(
        &mut directory_index,
        if files.is_empty() { u32::MAX } else { 0 },
    );

    write_u32(&mut directory_index, files.len() as u32);
    for (index, _) in files.iter().enumerate() {
        write_u32(&mut directory_index, index as u32); // name
        write_u32(
            &mut directory_index,
            if index + 1 < files.len() {
                index as u32 + 1
            } else {
                u32::MAX
            },
        );
        write_u32(&mut directory_index, index as u32); // chunk index
    }

    write_u32(&mut directory_index, files.len() as u32);
    for (name, _) in files {
        write_fstring(&mut directory_index, name);
    }

    let mut utoc = Vec::new();
    utoc.extend_from_slice(b"-==--==--==--==-");
    utoc.push(3); // version: PartitionSize
    utoc.extend_from_slice(&[0u8; 3]);
    write_u32(&mut utoc, 144); // header size
    write_u32(&mut utoc, files.len() as u32); // entry count
    write_u32(&mut utoc, 1); // compressed block count
    write_u32(&mut utoc, 12); // compressed block entry size
    write_u32(&mut utoc, 0); // compression method count
    write_u32(&mut utoc, 32); // compression method length
    write_u32(&mut utoc, BLOCK_SIZE);
    write_u32(&mut utoc, directory_index.len() as u32);
    write_u32(&mut utoc, 1); // partition count
    write_u64(&mut utoc, 0); // container id
    utoc.extend_from_slice(&[0u8; 16]); // encryption key guid
    utoc.push(0x01); // container flags: indexed
    utoc.extend_from_slice(&[0u8; 3]);
    write_u32(&mut utoc, 0); // perfect hash seeds count
    write_u64(&mut utoc, u64::MAX); // partition size
    write_u32(&mut utoc, 0); // chunks without perfect hash count
    utoc.extend_from_slice(&[0u8; 44]);
    assert_eq!(utoc.len(), 144);

    // chunk ids: sequential ids, type ExportBundleData
    for (index, _) in files.iter().enumerate() {
        write_u64(&mut utoc, index as u64 + 1);
        utoc.extend_from_slice(&[0u8, 0u8, 0u8, 1u8]);
    }

    // 40-bit big-endian offset and length pairs
    for (offset, length) in &locations {
        for value in [offset, length] {
            utoc.push((value >> 32) as u8);
            utoc.push((value >> 24) as u8);
            utoc.push((value >> 16) as u8);
            utoc.push((value >> 8) as u8);
            utoc.push(*value as u8);
        }
    }

    // one shared block covering the whole data file, method None
    let mut block = [0u8; 12];
    block[5..8].copy_from_slice(&(ucas.len() as u32).to_le_bytes()[..3]);
    block[8..11].copy_from_slice(&(ucas.len() as u32).to_le_bytes()[..3]);
    utoc.extend_from_slice(&block);

    utoc.extend_from_slice(&directory_index);

    (utoc, ucas)
}
