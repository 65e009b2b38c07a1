//! All errors thrown by uview_asset

use std::io;
use std::string::{FromUtf16Error, FromUtf8Error};

use num_enum::{TryFromPrimitive, TryFromPrimitiveError};
use thiserror::Error;
use uview_containers::ContainerError;
use uview_helpers::error::FStringError;

/// Thrown when a type-mapping blob failed to deserialize
#[derive(Error, Debug)]
pub enum TypeMapError {
    /// Unsupported blob compression
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(u8),
    /// Invalid compression data
    #[error("Invalid compression data")]
    InvalidCompressionData,
    /// Name table index out of range
    #[error("Name table index out of range, table size: {0}, got: {1}")]
    NameIndexOutOfRange(usize, i32),
    /// Unknown property type tag
    #[error("Unknown property type tag {0}")]
    UnknownPropertyTag(u8),
}

impl TypeMapError {
    /// Create a `TypeMapError` for an unsupported compression
    pub fn unsupported_compression(compression: u8) -> Self {
        TypeMapError::UnsupportedCompression(compression)
    }

    /// Create a `TypeMapError` for a case where a name index was out of range
    pub fn name_index_out_of_range(table_size: usize, index: i32) -> Self {
        TypeMapError::NameIndexOutOfRange(table_size, index)
    }
}

/// Error type
#[derive(Error, Debug)]
pub enum Error {
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
    /// A container-level error occured
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// A `TypeMapError` occured
    #[error(transparent)]
    TypeMap(#[from] TypeMapError),

    /// The file is invalid
    #[error("{0}")]
    InvalidFile(Box<str>),
    /// Expected data was not found
    #[error("{0}")]
    NoData(Box<str>),
    /// An enum value is invalid
    #[error("{0}")]
    InvalidEnumValue(Box<str>),
    /// A name table index is out of range
    #[error("Cannot read name, index: {0}, name table size: {1}")]
    NameOutOfRange(i32, usize),
    /// Export data is split into a companion file that is missing
    #[error("Export data for {0} needs companion file {1} which is missing")]
    MissingCompanion(Box<str>, Box<str>),
    /// Unversioned deserialization needs a schema that is not registered
    #[error("No schema registered for type {0}")]
    MissingSchema(Box<str>),
    /// An export's serial range is invalid
    #[error("Export {0} has invalid serial size {1}")]
    InvalidSerialSize(Box<str>, i64),
}

impl Error {
    /// Create an `Error` when the file was invalid
    pub fn invalid_file(msg: String) -> Self {
        Error::InvalidFile(msg.into_boxed_str())
    }

    /// Create an `Error` for a case where expected data was not found
    pub fn no_data(msg: String) -> Self {
        Error::NoData(msg.into_boxed_str())
    }

    /// Create an `Error` for a missing companion file
    pub fn missing_companion(asset: &str, companion: &str) -> Self {
        Error::MissingCompanion(
            asset.to_string().into_boxed_str(),
            companion.to_string().into_boxed_str(),
        )
    }

    /// Create an `Error` for a missing unversioned schema
    pub fn missing_schema(type_name: &str) -> Self {
        Error::MissingSchema(type_name.to_string().into_boxed_str())
    }
}

impl<T: TryFromPrimitive> From<TryFromPrimitiveError<T>> for Error {
    fn from(e: TryFromPrimitiveError<T>) -> Self {
        Error::InvalidEnumValue(e.to_string().into_boxed_str())
    }
}
