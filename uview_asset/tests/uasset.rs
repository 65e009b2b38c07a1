use std::io::Cursor;

use uview_asset::archive::RawArchive;
use uview_asset::error::Error;
use uview_asset::metadata::uasset;
use uview_asset::types::ObjectRef;

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_fstring(buf: &mut Vec<u8>, value: &str) {
    write_i32(buf, value.len() as i32 + 1);
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}

fn write_fname(buf: &mut Vec<u8>, index: i32, number: i32) {
    write_i32(buf, index);
    write_i32(buf, number);
}

const NAMES: &[&str] = &[
    "None",           // 0
    "Package",        // 1
    "Class",          // 2
    "/Script/Engine", // 3
    "Actor",          // 4
    "MyActor",        // 5
];

/// Unversioned, editor-stripped summary of a cooked UE4 package.
fn build_summary(name_offset: i32, export_offset: i32, import_offset: i32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x9E2A83C1u32.to_le_bytes());
    write_i32(&mut out, -7); // legacy version
    write_i32(&mut out, 0); // legacy ue3 version
    write_i32(&mut out, 0); // unversioned
    write_i32(&mut out, 0); // licensee version
    write_i32(&mut out, 0); // custom version count
    write_i32(&mut out, 4096); // total header size
    write_fstring(&mut out, "None"); // folder name
    write_u32(&mut out, 0x8000_2000); // filter editor only | unversioned props
    write_i32(&mut out, NAMES.len() as i32);
    write_i32(&mut out, name_offset);
    write_i32(&mut out, 0); // gatherable text count
    write_i32(&mut out, 0); // gatherable text offset
    write_i32(&mut out, 1); // export count
    write_i32(&mut out, export_offset);
    write_i32(&mut out, 2); // import count
    write_i32(&mut out, import_offset);
    write_i32(&mut out, 0); // depends offset
    write_i32(&mut out, 0); // soft package reference count
    write_i32(&mut out, 0); // soft package reference offset
    write_i32(&mut out, 0); // searchable names offset
    write_i32(&mut out, 0); // thumbnail table offset
    out
}

fn build_name_table() -> Vec<u8> {
    let mut out = Vec::new();
    for name in NAMES {
        write_fstring(&mut out, name);
        write_u32(&mut out, 0); // serialized name hash
    }
    out
}

fn build_imports() -> Vec<u8> {
    let mut out = Vec::new();

    // the /Script/Engine package
    write_fname(&mut out, 3, 0); // class package
    write_fname(&mut out, 1, 0); // class: Package
    write_i32(&mut out, 0); // outer
    write_fname(&mut out, 3, 0); // object name

    // Actor, outered to the package import
    write_fname(&mut out, 3, 0);
    write_fname(&mut out, 2, 0); // class: Class
    write_i32(&mut out, -1); // outer: imports[0]
    write_fname(&mut out, 4, 0);

    out
}

fn build_exports() -> Vec<u8> {
    let mut out = Vec::new();
    write_i32(&mut out, -2); // class: imports[1]
    write_i32(&mut out, 0); // super
    write_i32(&mut out, 0); // template
    write_i32(&mut out, 0); // outer
    write_fname(&mut out, 5, 0); // MyActor
    write_u32(&mut out, 1); // object flags: public
    out.extend_from_slice(&24i64.to_le_bytes()); // serial size
    out.extend_from_slice(&4096i64.to_le_bytes()); // serial offset
    write_i32(&mut out, 0); // forced export
    write_i32(&mut out, 0); // not for client
    write_i32(&mut out, 0); // not for server
    out.extend_from_slice(&[0u8; 16]); // package guid
    write_u32(&mut out, 0); // package flags
    write_i32(&mut out, 0); // not always loaded for editor game
    write_i32(&mut out, 0); // is asset
    write_i32(&mut out, 0); // first export dependency offset
    write_i32(&mut out, 0);
    write_i32(&mut out, 0);
    write_i32(&mut out, 0);
    write_i32(&mut out, 0);
    out
}

fn build_asset() -> Vec<u8> {
    let summary_len = build_summary(0, 0, 0).len() as i32;
    let name_table = build_name_table();
    let imports = build_imports();
    let exports = build_exports();

    let name_offset = summary_len;
    let import_offset = name_offset + name_table.len() as i32;
    let export_offset = import_offset + imports.len() as i32;

    let mut asset = build_summary(name_offset, export_offset, import_offset);
    asset.extend_from_slice(&name_table);
    asset.extend_from_slice(&imports);
    asset.extend_from_slice(&exports);
    asset
}

#[test]
fn parse_cooked_header() -> Result<(), Error> {
    let mut archive = RawArchive::new(Cursor::new(build_asset()))?;
    let metadata = uasset::parse(&mut archive, "/Game/MyActor")?;

    assert_eq!(metadata.package_name, "/Game/MyActor");
    assert!(!metadata.is_zen);
    assert!(metadata.is_unversioned);
    assert_eq!(metadata.name_table, NAMES);

    assert_eq!(metadata.imports.len(), 2);
    let package_import = &metadata.imports[0];
    assert_eq!(package_import.name, "/Script/Engine");
    assert_eq!(package_import.package_name, "/Script/Engine");

    let actor_import = &metadata.imports[1];
    assert_eq!(actor_import.name, "Actor");
    assert_eq!(actor_import.class_name, "Class");
    // the package comes from the outer chain
    assert_eq!(actor_import.package_name, "/Script/Engine");
    assert!(actor_import.is_resolved());

    assert_eq!(metadata.exports.len(), 1);
    let export = &metadata.exports[0];
    assert_eq!(export.name, "MyActor");
    assert_eq!(export.class_ref, ObjectRef::Import(1));
    assert_eq!(export.serial_size, 24);
    assert_eq!(export.serial_offset, 4096);
    assert!(export.is_public());

    Ok(())
}

#[test]
fn bad_magic_is_rejected() {
    let mut archive = RawArchive::new(Cursor::new(vec![0u8; 64])).unwrap();
    assert!(uasset::parse(&mut archive, "/Game/X").is_err());
}

#[test]
fn name_suffix_numbers() -> Result<(), Error> {
    // FName numbers greater than zero append `_<number - 1>`
    let mut asset = build_asset();

    // rewrite the export's name to MyActor_3
    let export_name_pos = asset.len() - build_exports().len() + 16;
    asset[export_name_pos + 4..export_name_pos + 8].copy_from_slice(&4i32.to_le_bytes());

    let mut archive = RawArchive::new(Cursor::new(asset))?;
    let metadata = uasset::parse(&mut archive, "/Game/MyActor")?;
    assert_eq!(metadata.exports[0].name, "MyActor_3");
    Ok(())
}
