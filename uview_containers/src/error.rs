//! Container error types

use std::io;
use std::string::{FromUtf16Error, FromUtf8Error};

use num_enum::{TryFromPrimitive, TryFromPrimitiveError};
use thiserror::Error;
use uview_helpers::error::FStringError;

/// Error type used by the container decoders and streams
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Magic mismatch, unsupported version or an impossibly large declared size
    #[error("{0}")]
    InvalidFormat(Box<str>),
    /// Short read relative to a declared size or offset
    #[error("Stream overrun at offset {offset}, needed {needed} bytes, had {available}")]
    StreamOverrun {
        /// Offset the read started at
        offset: u64,
        /// Bytes the read needed
        needed: u64,
        /// Bytes remaining in the source
        available: u64,
    },
    /// Decryption succeeded mechanically but the plaintext failed its sanity check
    #[error("Decrypted data failed its sanity check, the AES key is likely wrong")]
    BadKey,
    /// No decompressor is available for a referenced method
    #[error("Unsupported compression method {0}")]
    UnsupportedCodec(Box<str>),
    /// Declared uncompressed size did not match the decoded output
    #[error("Decompressed size mismatch, expected {expected}, got {got}")]
    DecompressedSizeMismatch {
        /// Declared size
        expected: usize,
        /// Decoded size
        got: usize,
    },
    /// An encrypted container was opened without a key
    #[error("No encryption key was provided for an encrypted container")]
    NoEncryptionKey,
    /// Container format version is not supported
    #[error("Unsupported container version {0}")]
    UnsupportedVersion(u32),
    /// Entry was not found in the container
    #[error("Entry {0} was not found")]
    EntryNotFound(Box<str>),
    /// An enum value is invalid
    #[error("{0}")]
    InvalidEnumValue(Box<str>),

    /// An `std::io::Error` occured
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An `FStringError` occured
    #[error(transparent)]
    FString(#[from] FStringError),
    /// A `FromUtf8Error` occured
    #[error(transparent)]
    Utf8(#[from] FromUtf8Error),
    /// A `FromUtf16Error` occured
    #[error(transparent)]
    Utf16(#[from] FromUtf16Error),
    /// An LZ4 decompression error occured
    #[error(transparent)]
    Lz4(#[from] lz4_flex::block::DecompressError),
}

impl ContainerError {
    /// Create a `ContainerError` for an invalid file
    pub fn invalid_format(msg: String) -> Self {
        ContainerError::InvalidFormat(msg.into_boxed_str())
    }

    /// Create a `ContainerError` for an unsupported compression method
    pub fn unsupported_codec(method: &str) -> Self {
        ContainerError::UnsupportedCodec(method.to_string().into_boxed_str())
    }

    /// Create a `ContainerError` for a missing entry
    pub fn entry_not_found(path: &str) -> Self {
        ContainerError::EntryNotFound(path.to_string().into_boxed_str())
    }

    /// Create a `ContainerError` for a short read
    pub fn overrun(offset: u64, needed: u64, available: u64) -> Self {
        ContainerError::StreamOverrun {
            offset,
            needed,
            available,
        }
    }
}

impl<T: TryFromPrimitive> From<TryFromPrimitiveError<T>> for ContainerError {
    fn from(e: TryFromPrimitiveError<T>) -> Self {
        ContainerError::InvalidEnumValue(e.to_string().into_boxed_str())
    }
}
