//! AES-256-ECB decryption helpers

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockSizeUser, KeyInit};
use aes::Aes256;

use crate::error::ContainerError;

/// Aes256 block alignment
pub const ENCRYPTION_ALIGN: u64 = 16;

/// Aes256 encryption key
pub type EncryptionKey = [u8; 32];

/// Build an Aes256 cipher from a raw key.
pub fn cipher(key: &EncryptionKey) -> Aes256 {
    Aes256::new(&GenericArray::from(*key))
}

/// Parse an AES key from either raw 32 bytes or a 0x-prefixed hex string.
pub fn parse_key(key: &str) -> Result<EncryptionKey, ContainerError> {
    let hex = key.strip_prefix("0x").unwrap_or(key);
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ContainerError::invalid_format(format!(
            "Invalid AES key, expected 64 hex digits, got {} characters",
            hex.len()
        )));
    }

    let mut out = [0u8; 32];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| ContainerError::invalid_format("Invalid AES key digit".to_string()))?;
    }
    Ok(out)
}

/// Decrypt data that is aligned to the aes256 block size
pub fn decrypt(aes: &Aes256, data: &mut [u8]) {
    data.chunks_mut(Aes256::block_size())
        .map(GenericArray::from_mut_slice)
        .for_each(|e| aes.decrypt_block(e));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_hex() {
        let key = parse_key(&format!("0x{}", "ab".repeat(32))).unwrap();
        assert_eq!(key, [0xab; 32]);

        assert!(parse_key("0x1234").is_err());
        assert!(parse_key(&"zz".repeat(32)).is_err());
    }
}
