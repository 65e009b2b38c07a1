use std::path::PathBuf;

use uview_asset::reader::{ContentReader, ReaderConfig};

mod common;
use common::{build_iostore_pair, ZenExportSpec, ZenPackageSpec};

const HASH: u64 = 0x00C0_FFEE_0000_1234;

fn write_fixture_containers() -> PathBuf {
    let package_a = ZenPackageSpec {
        package_name: "/Game/A",
        extra_names: vec!["X"],
        imports: vec![],
        exports: vec![ZenExportSpec {
            global_name_index: None,
            name: "X",
            class: u64::MAX,
            public_export_hash: HASH,
            object_flags: 1, // public
            payload: Vec::new(),
        }],
        imported_hashes: vec![],
        imported_package_names: vec![],
        unversioned: true,
    };

    let package_b = ZenPackageSpec {
        package_name: "/Game/B",
        extra_names: vec!["Y"],
        // package import: package 0, hash index 0
        imports: vec![2u64 << 62],
        exports: vec![ZenExportSpec {
            global_name_index: None,
            name: "Y",
            class: u64::MAX,
            public_export_hash: 0,
            object_flags: 0,
            payload: Vec::new(),
        }],
        imported_hashes: vec![HASH],
        imported_package_names: vec!["/Game/A"],
        unversioned: true,
    };

    let (utoc, ucas) = build_iostore_pair(&[
        ("A.uasset", package_a.build()),
        ("B.uasset", package_b.build()),
    ]);

    let root = std::env::temp_dir().join(format!(
        "uview_registry_test_{}_{:?}",
        std::process::id(),
        std::thread::current().id()
    ));
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("test.utoc"), utoc).unwrap();
    std::fs::write(root.join("test.ucas"), ucas).unwrap();
    root
}

#[test]
fn public_hash_resolution() -> Result<(), Box<dyn std::error::Error>> {
    let root = write_fixture_containers();

    let result = (|| -> Result<(), Box<dyn std::error::Error>> {
        let reader = ContentReader::open(ReaderConfig {
            paks_root: root.clone(),
            ..Default::default()
        })?;

        assert_eq!(reader.assets(None).len(), 2);
        assert_eq!(reader.entries(Some("b.uasset")).len(), 1);

        reader.preload_all_metadata(None)?;

        // the hash index knows package A's export
        let info = reader.resolve_export_by_hash(HASH).expect("hash indexed");
        assert_eq!(info.name, "X");
        assert_eq!(info.package_path, "/Game/A");

        // package B's import resolved through the hash
        let group_b = reader.assets(Some("/game/b")).pop().expect("group B").clone();
        let metadata_b = reader.read_metadata(&group_b)?;
        let import = &metadata_b.imports[0];
        assert!(import.is_resolved());
        assert_eq!(import.final_name(), "X");
        assert_eq!(import.final_package_name(), "/Game/A");

        // export path lookups work for both packages
        assert!(reader.resolve_export("/Game/A.X").is_some());
        assert!(reader.resolve_export("/game/b.y").is_some());
        assert_eq!(reader.find_exports_by_name("X").len(), 1);

        // every listed entry opens as a stream of its declared size
        for entry in reader.entries(None) {
            let stream = reader.open_entry(entry)?;
            assert_eq!(stream.len(), entry.size);
        }

        Ok(())
    })();

    std::fs::remove_dir_all(&root).ok();
    result
}

#[test]
fn preload_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let root = write_fixture_containers();

    let result = (|| -> Result<(), Box<dyn std::error::Error>> {
        let reader = ContentReader::open(ReaderConfig {
            paks_root: root.clone(),
            parallelism: Some(2),
            ..Default::default()
        })?;

        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_inner = calls.clone();
        reader.preload_all_metadata(Some(&move |done, total| {
            assert!(done <= total);
            calls_inner.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }))?;
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 2);

        let first = reader.resolve_export("/Game/A.X").expect("resolved");

        reader.preload_all_metadata(None)?;
        let second = reader.resolve_export("/Game/A.X").expect("still resolved");

        // the cached metadata object survives the second preload untouched
        assert!(std::sync::Arc::ptr_eq(&first.0, &second.0));
        assert_eq!(first.1, second.1);

        let info = reader.resolve_export_by_hash(HASH).expect("hash indexed");
        assert_eq!(info.export_index, 0);

        Ok(())
    })();

    std::fs::remove_dir_all(&root).ok();
    result
}
