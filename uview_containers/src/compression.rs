//! Decompression dispatch

use std::io::Read;

use flate2::bufread::{GzDecoder, ZlibDecoder};

use crate::error::ContainerError;

/// Compression method
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// None
    #[default]
    None,
    /// Zlib compression
    Zlib,
    /// Gzip compression
    Gzip,
    /// Oodle compression, dispatched but not decodable without an external codec
    Oodle,
    /// Lz4 compression
    Lz4,
    /// Zstandard compression
    Zstd,
    /// Unknown compression format
    Unknown(Box<str>),
}

impl CompressionMethod {
    /// Create a new `CompressionMethod` from the method name
    pub fn new(name: &str) -> Self {
        match name {
            "None" => Self::None,
            "Zlib" => Self::Zlib,
            "Gzip" => Self::Gzip,
            "Oodle" => Self::Oodle,
            "LZ4" => Self::Lz4,
            "Zstd" | "ZStd" => Self::Zstd,
            _ => Self::Unknown(name.to_string().into_boxed_str()),
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMethod::None => f.write_str("None"),
            CompressionMethod::Zlib => f.write_str("Zlib"),
            CompressionMethod::Gzip => f.write_str("Gzip"),
            CompressionMethod::Oodle => f.write_str("Oodle"),
            CompressionMethod::Lz4 => f.write_str("LZ4"),
            CompressionMethod::Zstd => f.write_str("Zstd"),
            CompressionMethod::Unknown(e) => write!(f, "{e}"),
        }
    }
}

/// Decompress data with the given compression method.
///
/// `decompressed` must be sized to the declared uncompressed size; any
/// mismatch with what the codec produces is an error.
pub fn decompress(
    method: &CompressionMethod,
    compressed: &[u8],
    decompressed: &mut [u8],
) -> Result<(), ContainerError> {
    match method {
        CompressionMethod::None => {
            if compressed.len() < decompressed.len() {
                return Err(ContainerError::DecompressedSizeMismatch {
                    expected: decompressed.len(),
                    got: compressed.len(),
                });
            }
            decompressed.copy_from_slice(&compressed[..decompressed.len()]);
            Ok(())
        }
        CompressionMethod::Zlib => Ok(ZlibDecoder::new(compressed).read_exact(decompressed)?),
        CompressionMethod::Gzip => Ok(GzDecoder::new(compressed).read_exact(decompressed)?),
        CompressionMethod::Lz4 => {
            let written = lz4_flex::block::decompress_into(compressed, decompressed)?;
            if written != decompressed.len() {
                return Err(ContainerError::DecompressedSizeMismatch {
                    expected: decompressed.len(),
                    got: written,
                });
            }
            Ok(())
        }
        CompressionMethod::Zstd => {
            let written = zstd::bulk::decompress_to_buffer(compressed, decompressed)?;
            if written != decompressed.len() {
                return Err(ContainerError::DecompressedSizeMismatch {
                    expected: decompressed.len(),
                    got: written,
                });
            }
            Ok(())
        }
        CompressionMethod::Oodle => Err(ContainerError::unsupported_codec("Oodle")),
        CompressionMethod::Unknown(name) => Err(ContainerError::UnsupportedCodec(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_name_round_trip() {
        for name in ["None", "Zlib", "Gzip", "Oodle", "LZ4", "Zstd"] {
            assert_eq!(CompressionMethod::new(name).to_string(), name);
        }
        assert!(matches!(
            CompressionMethod::new("Frobnicate"),
            CompressionMethod::Unknown(_)
        ));
    }

    #[test]
    fn decompress_none_copies() {
        let src = [1u8, 2, 3, 4, 5];
        let mut dst = [0u8; 4];
        decompress(&CompressionMethod::None, &src, &mut dst).unwrap();
        assert_eq!(dst, [1, 2, 3, 4]);
    }

    #[test]
    fn decompress_oodle_unsupported() {
        let mut dst = [0u8; 4];
        assert!(matches!(
            decompress(&CompressionMethod::Oodle, &[0u8; 4], &mut dst),
            Err(ContainerError::UnsupportedCodec(_))
        ));
    }
}
