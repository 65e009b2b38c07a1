//! Name batch decoding, shared by Zen package headers and the global
//! script-objects chunk.

use std::io::{Read, Seek};

use crate::archive::RawArchive;
use crate::error::Error;

/// Longest string a name batch entry may declare; anything longer is
/// replaced by the empty string instead of failing the batch.
const MAX_NAME_LENGTH: i32 = 10_000;

/// Read a name batch: `count`, `string bytes`, `hash version`, per-name
/// hashes, 2-byte headers, then the encoded bytes in declaration order.
pub fn read_name_batch<C: Read + Seek>(archive: &mut RawArchive<C>) -> Result<Vec<String>, Error> {
    let num_names = archive.read_i32()?;
    if num_names <= 0 {
        return Ok(Vec::new());
    }

    let _num_string_bytes = archive.read_i32()?;
    let _hash_version = archive.read_u64()?;

    // cityhash64 of the lowercased string; not verified here
    archive.skip(num_names as i64 * 8)?;

    let mut headers = Vec::with_capacity(num_names as usize);
    for _ in 0..num_names {
        headers.push(archive.read_name_header()?);
    }

    let mut names = Vec::with_capacity(num_names as usize);
    for header in headers {
        if header.len > MAX_NAME_LENGTH {
            let byte_len = match header.is_wide {
                true => header.len as i64 * 2,
                false => header.len as i64,
            };
            archive.skip(byte_len)?;
            names.push(String::new());
            continue;
        }

        let len = match header.is_wide {
            true => -header.len,
            false => header.len,
        };
        names.push(archive.read_fstring_len_noterm(len)?.unwrap_or_default());
    }

    Ok(names)
}
