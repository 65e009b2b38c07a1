use std::path::PathBuf;

use uview_asset::properties::PropertyValue;
use uview_asset::reader::{ContentReader, ReaderConfig};
use uview_asset::typemap::{
    PropertyDefinition, PropertyKind, PropertyType, TypeDefinition, TypeKind, TypeSource,
};

mod common;
use common::{build_iostore_pair, ZenExportSpec, ZenPackageSpec};

/// Unversioned payload: one non-zero int value of 777.
fn int_payload() -> Vec<u8> {
    let fragment: u16 = 0x0100 | (1 << 9);
    let mut payload = fragment.to_le_bytes().to_vec();
    payload.extend_from_slice(&777i32.to_le_bytes());
    payload
}

fn write_fixture(root: &PathBuf) {
    let package = ZenPackageSpec {
        package_name: "/Game/Props",
        extra_names: vec!["MyObject"],
        imports: vec![],
        exports: vec![ZenExportSpec {
            global_name_index: None,
            name: "MyObject",
            // the object is its own class; resolution takes the local path
            class: 0,
            public_export_hash: 0,
            object_flags: 0,
            payload: int_payload(),
        }],
        imported_hashes: vec![],
        imported_package_names: vec![],
        unversioned: true,
    };

    let (utoc, ucas) = build_iostore_pair(&[("Props.uasset", package.build())]);

    std::fs::create_dir_all(root).unwrap();
    std::fs::write(root.join("props.utoc"), utoc).unwrap();
    std::fs::write(root.join("props.ucas"), ucas).unwrap();
}

#[test]
fn deserialize_unversioned_export() -> Result<(), Box<dyn std::error::Error>> {
    let root = std::env::temp_dir().join(format!(
        "uview_deserialize_test_{}",
        std::process::id()
    ));
    write_fixture(&root);

    let result = (|| -> Result<(), Box<dyn std::error::Error>> {
        let reader = ContentReader::open(ReaderConfig {
            paks_root: root.clone(),
            ..Default::default()
        })?;

        // schema for the export's class, resolved to the export's own name
        reader.types().register_type(TypeDefinition {
            name: "MyObject".to_string(),
            kind: TypeKind::Class,
            source: TypeSource::Manual,
            super_name: None,
            property_count: 1,
            properties: [(
                0u16,
                PropertyDefinition {
                    name: "Health".to_string(),
                    schema_index: 0,
                    array_index: 0,
                    ty: PropertyType::simple(PropertyKind::Int32),
                },
            )]
            .into_iter()
            .collect(),
        });

        reader.preload_all_metadata(None)?;

        let group = reader.assets(None).pop().expect("fixture group").clone();

        let data = reader.read_export_data(&group, 0)?;
        assert_eq!(data, int_payload());

        let (bag, diagnostics) = reader.deserialize_export(&group, 0)?;
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
        assert_eq!(bag.get("Health"), Some(&PropertyValue::Int32(777)));

        Ok(())
    })();

    std::fs::remove_dir_all(&root).ok();
    result
}
