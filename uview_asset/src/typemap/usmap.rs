//! Type-mapping blob reader

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::archive::RawArchive;
use crate::error::{Error, TypeMapError};
use crate::typemap::{
    EnumDefinition, PropertyDefinition, PropertyKind, PropertyType, TypeDefinition, TypeKind,
    TypeRegistry, TypeSource,
};

/// Type-mapping blob version
#[derive(
    Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum ETypeMapVersion {
    /// Initial
    Initial,
    /// Adds package versioning
    PackageVersioning,
    /// Name lengths widen to u16
    LongName,
    /// Enum value counts widen to u16
    LargeEnums,
    /// Enum values carry explicit numeric values
    ExplicitEnumValues,
}

/// Blob payload compression method
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ETypeMapCompression {
    /// None
    None,
    /// Oodle
    Oodle,
    /// Brotli
    Brotli,
    /// ZStandard
    ZStandard,
}

const TYPE_MAP_MAGIC: u16 = 0x30C4;

/// Binary property type tags used inside the payload
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum EPropertyTypeTag {
    Byte = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    Object = 4,
    Name = 5,
    Delegate = 6,
    Double = 7,
    Array = 8,
    Struct = 9,
    Str = 10,
    Text = 11,
    Interface = 12,
    MulticastDelegate = 13,
    WeakObject = 14,
    LazyObject = 15,
    AssetObject = 16,
    SoftObject = 17,
    UInt64 = 18,
    UInt32 = 19,
    UInt16 = 20,
    Int64 = 21,
    Int16 = 22,
    Int8 = 23,
    Map = 24,
    Set = 25,
    Enum = 26,
    FieldPath = 27,
    Optional = 28,
    Unknown = 0xFF,
}

impl From<EPropertyTypeTag> for PropertyKind {
    fn from(tag: EPropertyTypeTag) -> Self {
        match tag {
            EPropertyTypeTag::Byte => PropertyKind::Byte,
            EPropertyTypeTag::Bool => PropertyKind::Bool,
            EPropertyTypeTag::Int => PropertyKind::Int32,
            EPropertyTypeTag::Float => PropertyKind::Float,
            EPropertyTypeTag::Object => PropertyKind::Object,
            EPropertyTypeTag::Name => PropertyKind::Name,
            EPropertyTypeTag::Delegate => PropertyKind::Delegate,
            EPropertyTypeTag::Double => PropertyKind::Double,
            EPropertyTypeTag::Array => PropertyKind::Array,
            EPropertyTypeTag::Struct => PropertyKind::Struct,
            EPropertyTypeTag::Str => PropertyKind::Str,
            EPropertyTypeTag::Text => PropertyKind::Text,
            EPropertyTypeTag::Interface => PropertyKind::Interface,
            EPropertyTypeTag::MulticastDelegate => PropertyKind::MulticastDelegate,
            EPropertyTypeTag::WeakObject => PropertyKind::WeakObject,
            EPropertyTypeTag::LazyObject => PropertyKind::LazyObject,
            EPropertyTypeTag::AssetObject | EPropertyTypeTag::SoftObject => {
                PropertyKind::SoftObject
            }
            EPropertyTypeTag::UInt64 => PropertyKind::UInt64,
            EPropertyTypeTag::UInt32 => PropertyKind::UInt32,
            EPropertyTypeTag::UInt16 => PropertyKind::UInt16,
            EPropertyTypeTag::Int64 => PropertyKind::Int64,
            EPropertyTypeTag::Int16 => PropertyKind::Int16,
            EPropertyTypeTag::Int8 => PropertyKind::Int8,
            EPropertyTypeTag::Map => PropertyKind::Map,
            EPropertyTypeTag::Set => PropertyKind::Set,
            EPropertyTypeTag::Enum => PropertyKind::Enum,
            EPropertyTypeTag::FieldPath => PropertyKind::FieldPath,
            EPropertyTypeTag::Optional => PropertyKind::Optional,
            EPropertyTypeTag::Unknown => PropertyKind::Unknown,
        }
    }
}

/// Payload reader with access to the blob name table
struct PayloadReader<C: Read + Seek> {
    archive: RawArchive<C>,
    version: ETypeMapVersion,
    names: Vec<String>,
}

impl<C: Read + Seek> PayloadReader<C> {
    fn read_name(&mut self) -> Result<String, Error> {
        let index = self.archive.read_i32()?;
        if index < 0 {
            return Err(TypeMapError::name_index_out_of_range(self.names.len(), index).into());
        }
        self.names
            .get(index as usize)
            .cloned()
            .ok_or_else(|| TypeMapError::name_index_out_of_range(self.names.len(), index).into())
    }

    /// Name index where a negative value means "none".
    fn read_name_opt(&mut self) -> Result<Option<String>, Error> {
        let index = self.archive.read_i32()?;
        if index < 0 {
            return Ok(None);
        }
        self.names
            .get(index as usize)
            .cloned()
            .map(Some)
            .ok_or_else(|| TypeMapError::name_index_out_of_range(self.names.len(), index).into())
    }

    fn read_property_type(&mut self) -> Result<PropertyType, Error> {
        let tag_raw = self.archive.read_u8()?;
        let tag = EPropertyTypeTag::try_from(tag_raw)
            .map_err(|_| TypeMapError::UnknownPropertyTag(tag_raw))?;

        let mut ty = PropertyType::simple(tag.into());

        match tag {
            EPropertyTypeTag::Enum => {
                ty.inner = Some(Box::new(self.read_property_type()?));
                ty.enum_name = self.read_name_opt()?;
            }
            EPropertyTypeTag::Struct => {
                ty.struct_name = Some(self.read_name()?);
            }
            EPropertyTypeTag::Array | EPropertyTypeTag::Set | EPropertyTypeTag::Optional => {
                ty.inner = Some(Box::new(self.read_property_type()?));
            }
            EPropertyTypeTag::Map => {
                ty.inner = Some(Box::new(self.read_property_type()?));
                ty.value = Some(Box::new(self.read_property_type()?));
            }
            _ => {}
        }

        Ok(ty)
    }
}

/// Parse a type-mapping blob and register its contents.
pub fn load<C: Read + Seek>(cursor: C, registry: &TypeRegistry) -> Result<(), Error> {
    let mut archive = RawArchive::new(cursor)?;

    if archive.read_u16()? != TYPE_MAP_MAGIC {
        return Err(Error::invalid_file(
            "File is not a valid type-mapping blob".to_string(),
        ));
    }

    let version = ETypeMapVersion::try_from(archive.read_u8()?)?;

    if version >= ETypeMapVersion::PackageVersioning {
        let has_versioning = archive.read_i32()?;
        if has_versioning > 0 {
            let _object_version = archive.read_i32()?;
            let _object_version_ue5 = archive.read_i32()?;
            let custom_version_count = archive.read_i32()?;
            archive.skip(custom_version_count as i64 * 20)?;
            let _net_cl = archive.read_u32()?;
        }
    }

    let compression_raw = archive.read_u8()?;
    let compression = ETypeMapCompression::try_from(compression_raw)
        .map_err(|_| TypeMapError::unsupported_compression(compression_raw))?;

    let compressed_size = archive.read_u32()?;
    let uncompressed_size = archive.read_u32()?;

    let compressed = archive.read_bytes(compressed_size as usize)?;

    let payload = match compression {
        ETypeMapCompression::None => {
            if compressed_size != uncompressed_size {
                return Err(Error::invalid_file(
                    "compressed size != uncompressed size on an uncompressed blob".to_string(),
                ));
            }
            compressed
        }
        ETypeMapCompression::Brotli => {
            let mut decompressed = Vec::with_capacity(uncompressed_size as usize);
            brotli::BrotliDecompress(&mut Cursor::new(compressed), &mut decompressed)
                .map_err(|_| TypeMapError::InvalidCompressionData)?;
            decompressed
        }
        ETypeMapCompression::ZStandard => {
            let mut decompressed = Vec::with_capacity(uncompressed_size as usize);
            zstd::stream::copy_decode(&mut Cursor::new(compressed), &mut decompressed)
                .map_err(|_| TypeMapError::InvalidCompressionData)?;
            decompressed
        }
        ETypeMapCompression::Oodle => {
            return Err(TypeMapError::unsupported_compression(compression_raw).into());
        }
    };

    if payload.len() != uncompressed_size as usize {
        return Err(TypeMapError::InvalidCompressionData.into());
    }

    parse_payload(Cursor::new(payload), version, registry)
}

fn parse_payload<C: Read + Seek>(
    cursor: C,
    version: ETypeMapVersion,
    registry: &TypeRegistry,
) -> Result<(), Error> {
    let mut archive = RawArchive::new(cursor)?;

    let name_count = archive.read_i32()?;
    let mut names = Vec::with_capacity(name_count.max(0) as usize);
    for _ in 0..name_count {
        let length = match version >= ETypeMapVersion::LongName {
            true => archive.read_u16()? as usize,
            false => archive.read_u8()? as usize,
        };
        let bytes = archive.read_bytes(length)?;
        names.push(String::from_utf8(bytes)?);
    }

    let mut reader = PayloadReader {
        archive,
        version,
        names,
    };

    let enum_count = reader.archive.read_i32()?;
    for _ in 0..enum_count {
        let enum_name = reader.read_name()?;

        let value_count = match reader.version >= ETypeMapVersion::LargeEnums {
            true => reader.archive.read_u16()? as i64,
            false => reader.archive.read_u8()? as i64,
        };

        let mut values = BTreeMap::new();
        for ordinal in 0..value_count {
            match reader.version >= ETypeMapVersion::ExplicitEnumValues {
                true => {
                    let value = reader.archive.read_i64()?;
                    let name = reader.read_name()?;
                    values.insert(value, name);
                }
                false => {
                    let name = reader.read_name()?;
                    values.insert(ordinal, name);
                }
            }
        }

        registry.register_enum(EnumDefinition::new(
            enum_name,
            TypeSource::Runtime,
            values,
            None,
        ));
    }

    let type_count = reader.archive.read_i32()?;
    for _ in 0..type_count {
        let type_name = reader.read_name()?;
        let super_name = reader.read_name_opt()?.filter(|e| !e.is_empty());

        let property_count = reader.archive.read_u16()?;
        let serializable_count = reader.archive.read_u16()?;

        let mut properties = BTreeMap::new();
        for _ in 0..serializable_count {
            let schema_index = reader.archive.read_u16()?;
            let array_size = reader.archive.read_u8()?;
            let name = reader.read_name()?;
            let ty = reader.read_property_type()?;

            // static arrays occupy one schema slot per element
            for element in 0..array_size.max(1) as u16 {
                properties.insert(
                    schema_index + element,
                    PropertyDefinition {
                        name: name.clone(),
                        schema_index: schema_index + element,
                        array_index: element,
                        ty: ty.clone(),
                    },
                );
            }
        }

        registry.register_type(TypeDefinition {
            name: type_name,
            kind: TypeKind::Class,
            source: TypeSource::Runtime,
            super_name,
            property_count,
            properties,
        });
    }

    log::debug!(
        "loaded type mappings: {} types, {} enums",
        registry.type_count(),
        registry.enum_count()
    );

    Ok(())
}
