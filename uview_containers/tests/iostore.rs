use std::io::Cursor;

use uview_containers::iostore::{IoOffsetAndLength, IoStoreBlockEntry, IoStoreToc};
use uview_containers::{ContainerError, EntryKind};

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_fstring(buf: &mut Vec<u8>, value: &str) {
    write_u32(buf, value.len() as u32 + 1);
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}

/// Build a minimal .utoc: one chunk, one directory, one file.
fn build_test_toc() -> Vec<u8> {
    let mut directory_index = Vec::new();
    write_fstring(&mut directory_index, "/Game/");

    // one directory entry: the root, with the file list starting at 0
    write_u32(&mut directory_index, 1);
    write_u32(&mut directory_index, u32::MAX); // name
    write_u32(&mut directory_index, u32::MAX); // first child
    write_u32(&mut directory_index, u32::MAX); // next sibling
    write_u32(&mut directory_index, 0); // first file

    // one file entry: Foo.uasset -> chunk 0
    write_u32(&mut directory_index, 1);
    write_u32(&mut directory_index, 0); // name
    write_u32(&mut directory_index, u32::MAX); // next file
    write_u32(&mut directory_index, 0); // chunk index

    // string table
    write_u32(&mut directory_index, 1);
    write_fstring(&mut directory_index, "Foo.uasset");

    let mut toc = Vec::new();
    toc.extend_from_slice(b"-==--==--==--==-");
    toc.push(3); // version: PartitionSize
    toc.extend_from_slice(&[0u8; 3]);
    write_u32(&mut toc, 144); // header size
    write_u32(&mut toc, 1); // entry count
    write_u32(&mut toc, 0); // compressed block count
    write_u32(&mut toc, 12); // compressed block entry size
    write_u32(&mut toc, 0); // compression method count
    write_u32(&mut toc, 32); // compression method length
    write_u32(&mut toc, 0x10000); // compression block size
    write_u32(&mut toc, directory_index.len() as u32);
    write_u32(&mut toc, 1); // partition count
    toc.extend_from_slice(&0u64.to_le_bytes()); // container id
    toc.extend_from_slice(&[0u8; 16]); // encryption key guid
    toc.push(0x01); // container flags: indexed
    toc.extend_from_slice(&[0u8; 3]);
    write_u32(&mut toc, 0); // perfect hash seeds count
    toc.extend_from_slice(&u64::MAX.to_le_bytes()); // partition size
    write_u32(&mut toc, 0); // chunks without perfect hash count
    toc.extend_from_slice(&[0u8; 44]);
    assert_eq!(toc.len(), 144);

    // chunk id: id 0, index 0, type 1 (ExportBundleData)
    toc.extend_from_slice(&0u64.to_le_bytes());
    toc.extend_from_slice(&[0u8, 0u8, 0u8, 1u8]);

    // offset 0, length 128 as 40-bit big-endian pairs
    toc.extend_from_slice(&[0, 0, 0, 0, 0]);
    toc.extend_from_slice(&[0, 0, 0, 0, 128]);

    toc.extend_from_slice(&directory_index);
    toc
}

#[test]
fn directory_walk() -> Result<(), ContainerError> {
    let toc = IoStoreToc::read(&mut Cursor::new(build_test_toc()), None)?;
    let index = toc.to_index("test.utoc");

    assert_eq!(index.kind, EntryKind::IoStore);
    assert_eq!(index.mount_point, "/Game/");
    assert_eq!(index.entries.len(), 1);

    let entry = &index.entries[0];
    assert_eq!(entry.logical_path, "/Game/Foo.uasset");
    assert_eq!(entry.offset, 0);
    assert_eq!(entry.size, 128);
    assert!(!entry.encrypted);

    Ok(())
}

#[test]
fn chunk_lookup_by_type() -> Result<(), ContainerError> {
    let toc = IoStoreToc::read(&mut Cursor::new(build_test_toc()), None)?;
    let index = toc.to_index("test.utoc");

    let chunk = index.find_chunk_by_type(1).expect("chunk type 1 exists");
    assert_eq!(chunk.offset, 0);
    assert_eq!(chunk.length, 128);

    assert!(index.find_chunk_by_type(5).is_none());

    Ok(())
}

/// Encrypt a directory index and embed it in a minimal toc.
fn build_encrypted_toc(key: &[u8; 32]) -> Vec<u8> {
    use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
    use aes::Aes256;

    let mut directory_index = Vec::new();
    write_fstring(&mut directory_index, "/Game/");
    write_u32(&mut directory_index, 1);
    write_u32(&mut directory_index, u32::MAX);
    write_u32(&mut directory_index, u32::MAX);
    write_u32(&mut directory_index, u32::MAX);
    write_u32(&mut directory_index, 0);
    write_u32(&mut directory_index, 1);
    write_u32(&mut directory_index, 0);
    write_u32(&mut directory_index, u32::MAX);
    write_u32(&mut directory_index, 0);
    write_u32(&mut directory_index, 1);
    write_fstring(&mut directory_index, "Secret.uasset");

    // pad to the AES block size and encrypt in place
    while directory_index.len() % 16 != 0 {
        directory_index.push(0);
    }
    let aes = Aes256::new(&GenericArray::from(*key));
    for block in directory_index.chunks_mut(16) {
        aes.encrypt_block(GenericArray::from_mut_slice(block));
    }

    let mut toc = Vec::new();
    toc.extend_from_slice(b"-==--==--==--==-");
    toc.push(3);
    toc.extend_from_slice(&[0u8; 3]);
    write_u32(&mut toc, 144);
    write_u32(&mut toc, 1); // entry count
    write_u32(&mut toc, 0);
    write_u32(&mut toc, 12);
    write_u32(&mut toc, 0);
    write_u32(&mut toc, 32);
    write_u32(&mut toc, 0x10000);
    write_u32(&mut toc, directory_index.len() as u32);
    write_u32(&mut toc, 1);
    toc.extend_from_slice(&0u64.to_le_bytes());
    toc.extend_from_slice(&[0u8; 16]);
    toc.push(0x01 | 0x02); // indexed, encrypted
    toc.extend_from_slice(&[0u8; 3]);
    write_u32(&mut toc, 0);
    toc.extend_from_slice(&u64::MAX.to_le_bytes());
    write_u32(&mut toc, 0);
    toc.extend_from_slice(&[0u8; 44]);

    toc.extend_from_slice(&0u64.to_le_bytes());
    toc.extend_from_slice(&[0u8, 0u8, 0u8, 1u8]);
    toc.extend_from_slice(&[0, 0, 0, 0, 0]);
    toc.extend_from_slice(&[0, 0, 0, 0, 64]);

    toc.extend_from_slice(&directory_index);
    toc
}

#[test]
fn encrypted_directory_index() -> Result<(), ContainerError> {
    let key = [0x42u8; 32];
    let toc_bytes = build_encrypted_toc(&key);

    let toc = IoStoreToc::read(&mut Cursor::new(&toc_bytes), Some(&key))?;
    let index = toc.to_index("enc.utoc");

    assert_eq!(index.entries.len(), 1);
    assert_eq!(index.entries[0].logical_path, "/Game/Secret.uasset");
    assert!(index.entries[0].encrypted);

    Ok(())
}

#[test]
fn wrong_key_is_detected() {
    let key = [0x42u8; 32];
    let wrong_key = [0x13u8; 32];
    let toc_bytes = build_encrypted_toc(&key);

    // decryption itself succeeds mechanically; the implausible mount point
    // length gives the wrong key away
    let err = IoStoreToc::read(&mut Cursor::new(&toc_bytes), Some(&wrong_key))
        .expect_err("expected error");
    assert!(matches!(err, ContainerError::BadKey));

    let err = IoStoreToc::read(&mut Cursor::new(&toc_bytes), None).expect_err("expected error");
    assert!(matches!(err, ContainerError::NoEncryptionKey));
}

#[test]
fn bad_magic_is_invalid_format() {
    let mut toc = build_test_toc();
    toc[0] = b'x';

    let err = IoStoreToc::read(&mut Cursor::new(toc), None).expect_err("expected error");
    assert!(matches!(err, ContainerError::InvalidFormat(_)));
}

#[test]
fn block_entry_unpacking() -> Result<(), ContainerError> {
    // offset:40 | compressed:24 | uncompressed:24 | method:8
    let mut value = [0u8; 12];
    value[..5].copy_from_slice(&0x01_02_03_04_05u64.to_le_bytes()[..5]);
    value[5..8].copy_from_slice(&0x060000u32.to_le_bytes()[..3]);
    value[8..11].copy_from_slice(&0x070000u32.to_le_bytes()[..3]);
    value[11] = 2;

    let entry = IoStoreBlockEntry::read(&mut Cursor::new(value))?;
    assert_eq!(entry.offset, 0x01_02_03_04_05);
    assert_eq!(entry.compressed_size, 0x060000);
    assert_eq!(entry.uncompressed_size, 0x070000);
    assert_eq!(entry.compression_method_index, 2);

    Ok(())
}

#[test]
fn offset_and_length_big_endian() -> Result<(), ContainerError> {
    let value = [0u8, 0, 0, 1, 2, 0, 0, 0, 0, 128];
    let parsed = IoOffsetAndLength::read(&mut Cursor::new(value))?;
    assert_eq!(parsed.offset, 0x102);
    assert_eq!(parsed.length, 128);

    Ok(())
}
