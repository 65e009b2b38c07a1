use std::path::PathBuf;

use uview_asset::error::Error;
use uview_asset::properties::PropertyValue;
use uview_asset::reader::{ContentReader, ReaderConfig};

mod common;
use common::{build_legacy_tagged_asset, build_pak};

/// Tagged payload: MyInt = 42, then the None sentinel.
fn tagged_payload() -> Vec<u8> {
    let mut out = Vec::new();
    let fname = |out: &mut Vec<u8>, index: i32| {
        out.extend_from_slice(&index.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
    };

    fname(&mut out, 6); // MyInt
    fname(&mut out, 7); // IntProperty
    out.extend_from_slice(&4i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&42i32.to_le_bytes());
    fname(&mut out, 0); // None
    out
}

fn fixture_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("uview_uexp_test_{tag}_{}", std::process::id()))
}

#[test]
fn export_data_split_into_uexp() -> Result<(), Box<dyn std::error::Error>> {
    let payload = tagged_payload();
    let asset = build_legacy_tagged_asset(payload.len() as u64);

    let pak = build_pak(&[
        ("Things/Thing.uasset", asset),
        ("Things/Thing.uexp", payload.clone()),
    ]);

    let root = fixture_root("split");
    std::fs::create_dir_all(&root)?;
    std::fs::write(root.join("content.pak"), pak)?;

    let result = (|| -> Result<(), Box<dyn std::error::Error>> {
        let reader = ContentReader::open(ReaderConfig {
            paks_root: root.clone(),
            ..Default::default()
        })?;
        reader.preload_all_metadata(None)?;

        let group = reader.assets(None).pop().expect("fixture group").clone();
        assert!(group.uexp.is_some());
        assert!(!group.is_map);

        let metadata = reader.read_metadata(&group)?;
        assert_eq!(metadata.package_name, "/Game/Things/Thing");
        assert!(!metadata.is_unversioned);

        // the serial range lies past the primary, in the companion
        let data = reader.read_export_data(&group, 0)?;
        assert_eq!(data, payload);

        let (bag, diagnostics) = reader.deserialize_export(&group, 0)?;
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
        assert_eq!(bag.get("MyInt"), Some(&PropertyValue::Int32(42)));

        // the export's class resolved through the legacy import table
        let export = &metadata.exports[0];
        let class = export.class.get().expect("class resolved");
        assert_eq!(class.name, "Actor");
        assert_eq!(class.package_path, "/Script/Engine");

        Ok(())
    })();

    std::fs::remove_dir_all(&root).ok();
    result
}

#[test]
fn missing_companion_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let asset = build_legacy_tagged_asset(16);
    let pak = build_pak(&[("Things/Lonely.uasset", asset)]);

    let root = fixture_root("missing");
    std::fs::create_dir_all(&root)?;
    std::fs::write(root.join("content.pak"), pak)?;

    let result = (|| -> Result<(), Box<dyn std::error::Error>> {
        let reader = ContentReader::open(ReaderConfig {
            paks_root: root.clone(),
            ..Default::default()
        })?;

        let group = reader.assets(None).pop().expect("fixture group").clone();
        let err = reader
            .read_export_data(&group, 0)
            .expect_err("companion is missing");
        assert!(matches!(err, Error::MissingCompanion(_, _)));

        Ok(())
    })();

    std::fs::remove_dir_all(&root).ok();
    result
}
