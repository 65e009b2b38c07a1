//! Tagged and unversioned property deserialization

use std::io::{Read, Seek};

use uview_helpers::Guid;

use crate::archive::RawArchive;
use crate::error::Error;
use crate::metadata::{AssetExport, AssetImport};
use crate::typemap::{PropertyKind, PropertyType, TypeRegistry};

pub mod header;
pub mod text;
pub use text::TextValue;

use header::UnversionedHeader;

/// Bound on array, set and map element counts
const MAX_CONTAINER_ELEMENTS: i32 = 1_000_000;
/// Bound on multicast delegate invocation lists
const MAX_DELEGATES: i32 = 10_000;
/// Bound on field path segments
const MAX_FIELD_PATH_SEGMENTS: i32 = 1_000;
/// Diagnostics recorded per read before truncation
const MAX_DIAGNOSTICS: usize = 256;

/// Struct types serialized without a header, field after field in schema
/// order.
const COMPACT_STRUCTS: &[&str] = &[
    "Vector",
    "Vector2D",
    "Vector4",
    "Quat",
    "Rotator",
    "Plane",
    "Matrix",
    "Transform",
    "Box",
    "Box2D",
    "IntPoint",
    "IntVector",
    "Color",
    "LinearColor",
    "Guid",
    "DateTime",
    "Timespan",
    "FrameNumber",
    "FrameRate",
    "SoftObjectPath",
    "SoftClassPath",
    "GameplayTag",
    "GameplayTagContainer",
    "NavAgentSelector",
    "PerPlatformBool",
    "PerPlatformInt",
    "PerPlatformFloat",
    "PerQualityLevelInt",
];

/// Diagnostic codes the property reader emits
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Tagged value consumed a different number of bytes than declared
    SizeMismatch,
    /// Unversioned fragment iteration overshot the flattened properties
    SchemaIndexOutOfRange,
    /// Runaway unversioned header
    TooManyFragments,
    /// Property kind has no reader
    UnknownPropertyKind,
    /// Tagged type name was not recognized
    UnknownTaggedType,
    /// Text history type is not supported
    UnsupportedTextHistoryType,
    /// Read ran past the end of the payload
    StreamOverrun,
    /// Unversioned read without a registered schema
    MissingSchema,
    /// Container element count failed its bound
    ImplausibleCount,
    /// An object reference index did not resolve
    InvalidObjectIndex,
    /// Further diagnostics were dropped
    DiagnosticsTruncated,
}

/// One recoverable problem encountered during a read
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// What happened
    pub code: DiagnosticCode,
    /// Stream position at the point of the problem
    pub position: u64,
    /// Free-form detail
    pub detail: String,
    /// Whether this problem halted the property sequence
    pub fatal: bool,
}

/// A reference to another object, resolved against the import and export
/// tables
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectReference {
    /// Class name of the referenced object, when known
    pub type_name: Option<String>,
    /// Object name
    pub name: Option<String>,
    /// Package path
    pub path: Option<String>,
    /// Raw signed index: positive is `export + 1`, negative `-(import + 1)`
    pub index: i32,
    /// Zero-based export index, -1 when not an export
    pub export_index: i32,
    /// Zero-based import index, -1 when not an import
    pub import_index: i32,
}

impl ObjectReference {
    /// A null reference
    pub fn null() -> Self {
        ObjectReference {
            export_index: -1,
            import_index: -1,
            ..Default::default()
        }
    }

    /// Whether the reference is null
    pub fn is_null(&self) -> bool {
        self.index == 0
    }

    /// Canonical `Type'Path.Name'` form, `None` for null references.
    pub fn canonical(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }

        let type_name = self.type_name.as_deref().unwrap_or("Object");
        let name = self.name.as_deref().unwrap_or_default();

        Some(match self.path.as_deref() {
            Some(path) if !path.is_empty() => format!("{type_name}'{path}.{name}'"),
            _ => format!("{type_name}'{name}'"),
        })
    }
}

/// A single delegate binding
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DelegateValue {
    /// Bound object
    pub object: ObjectReference,
    /// Bound function name
    pub function: String,
}

/// A deserialized property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Signed 8 bit integer
    Int8(i8),
    /// Signed 16 bit integer
    Int16(i16),
    /// Signed 32 bit integer
    Int32(i32),
    /// Signed 64 bit integer
    Int64(i64),
    /// Unsigned 8 bit integer
    Byte(u8),
    /// Unsigned 16 bit integer
    UInt16(u16),
    /// Unsigned 32 bit integer
    UInt32(u32),
    /// Unsigned 64 bit integer
    UInt64(u64),
    /// 32 bit float
    Float(f32),
    /// 64 bit float
    Double(f64),
    /// Name table reference
    Name(String),
    /// Plain string
    Str(Option<String>),
    /// Localized text
    Text(TextValue),
    /// Enum value by qualified name
    Enum(String),
    /// Object reference
    Object(ObjectReference),
    /// Guid payload, used by lazy object references
    Guid(Guid),
    /// Soft object or class path
    SoftObject {
        /// Asset path
        asset_path: String,
        /// Sub-object path
        sub_path: Option<String>,
    },
    /// Single delegate
    Delegate(DelegateValue),
    /// Multicast delegate invocation list
    MulticastDelegate(Vec<DelegateValue>),
    /// Field path segments
    FieldPath(Vec<String>),
    /// Dynamic array
    Array(Vec<PropertyValue>),
    /// Set
    Set(Vec<PropertyValue>),
    /// Map entries in serialization order
    Map(Vec<(PropertyValue, PropertyValue)>),
    /// Nested struct
    Struct(PropertyBag),
    /// Optional value
    Optional(Option<Box<PropertyValue>>),
    /// No value could be produced
    Null,
}

/// Ordered name to value mapping for one object or struct
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyBag {
    /// Type the bag was read against
    pub type_name: String,
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyBag {
    /// Create an empty bag for a type.
    pub fn new(type_name: &str) -> Self {
        PropertyBag {
            type_name: type_name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Append a property, preserving insertion order.
    pub fn insert(&mut self, name: String, value: PropertyValue) {
        self.entries.push((name, value));
    }

    /// Look up a property by name.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, PropertyValue)> {
        self.entries.iter()
    }
}

/// Value position relative to its container, driving serialization details
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ValueContext {
    /// Top-level property
    Normal,
    /// Known zero; produce a default without consuming bytes
    Zero,
    /// Element of an array, set or map
    Item,
}

/// Everything a property read needs to resolve names, references and
/// schemas, plus the diagnostics it produces.
pub struct ReadContext<'a> {
    /// Package name table
    pub name_table: &'a [String],
    /// Package imports
    pub imports: &'a [AssetImport],
    /// Package exports
    pub exports: &'a [AssetExport],
    /// Type registry for schemas and enums
    pub types: &'a TypeRegistry,
    /// Path of the package being read
    pub package_path: &'a str,
    /// Whether payloads use unversioned serialization
    pub unversioned: bool,
    /// Diagnostics recorded so far
    pub diagnostics: Vec<Diagnostic>,
    /// Set when a fatal problem halted the current property sequence
    pub fatal: bool,
}

impl<'a> ReadContext<'a> {
    /// Create a context over a package's tables.
    pub fn new(
        name_table: &'a [String],
        imports: &'a [AssetImport],
        exports: &'a [AssetExport],
        types: &'a TypeRegistry,
        package_path: &'a str,
        unversioned: bool,
    ) -> Self {
        ReadContext {
            name_table,
            imports,
            exports,
            types,
            package_path,
            unversioned,
            diagnostics: Vec::new(),
            fatal: false,
        }
    }

    /// Record a recoverable diagnostic.
    fn diag(&mut self, code: DiagnosticCode, position: u64, detail: String) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.push(Diagnostic {
                code: DiagnosticCode::DiagnosticsTruncated,
                position,
                detail: "further diagnostics dropped".to_string(),
                fatal: false,
            });
        }
        if self.diagnostics.len() > MAX_DIAGNOSTICS {
            return;
        }

        log::debug!("property diagnostic {code:?} at {position}: {detail}");
        self.diagnostics.push(Diagnostic {
            code,
            position,
            detail,
            fatal: false,
        });
    }

    /// Record a fatal diagnostic and halt the current sequence.
    fn fatal_diag(&mut self, code: DiagnosticCode, position: u64, detail: String) {
        if self.diagnostics.len() <= MAX_DIAGNOSTICS {
            self.diagnostics.push(Diagnostic {
                code,
                position,
                detail,
                fatal: true,
            });
        }
        self.fatal = true;
    }

    /// Whether any recorded diagnostic was fatal.
    pub fn has_fatal_error(&self) -> bool {
        self.fatal
    }
}

fn read_fname<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &ReadContext,
) -> Result<String, Error> {
    let index = archive.read_i32()?;
    let number = archive.read_i32()?;

    let name = ctx
        .name_table
        .get(index as usize)
        .ok_or(Error::NameOutOfRange(index, ctx.name_table.len()))?;

    Ok(match number {
        0 => name.clone(),
        number => format!("{}_{}", name, number - 1),
    })
}

fn resolve_object_index(ctx: &mut ReadContext, index: i32, position: u64) -> ObjectReference {
    if index == 0 {
        return ObjectReference::null();
    }

    if index > 0 {
        let export_index = index - 1;
        let Some(export) = ctx.exports.get(export_index as usize) else {
            ctx.diag(
                DiagnosticCode::InvalidObjectIndex,
                position,
                format!("export index {export_index} out of range"),
            );
            return ObjectReference {
                index,
                export_index: -1,
                import_index: -1,
                ..Default::default()
            };
        };

        let type_name = export.final_class_name();
        return ObjectReference {
            type_name: (!type_name.is_empty()).then(|| type_name.to_string()),
            name: Some(export.name.clone()),
            path: Some(ctx.package_path.to_string()),
            index,
            export_index,
            import_index: -1,
        };
    }

    let import_index = -index - 1;
    let Some(import) = ctx.imports.get(import_index as usize) else {
        ctx.diag(
            DiagnosticCode::InvalidObjectIndex,
            position,
            format!("import index {import_index} out of range"),
        );
        return ObjectReference {
            index,
            export_index: -1,
            import_index: -1,
            ..Default::default()
        };
    };

    ObjectReference {
        type_name: Some(import.final_class_name().to_string()),
        name: Some(import.final_name().to_string()),
        path: Some(import.final_package_name().to_string()),
        index,
        export_index: -1,
        import_index,
    }
}

/// Read a tagged property sequence until its `None` sentinel.
///
/// Problems surface as diagnostics on the context; the bag holds whatever
/// was read before any fatal problem.
pub fn read_tagged<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
    bag: &mut PropertyBag,
) -> Result<(), Error> {
    while !ctx.fatal {
        let position = archive.position();

        let name = match read_fname(archive, ctx) {
            Ok(name) => name,
            Err(_) => {
                ctx.fatal_diag(
                    DiagnosticCode::StreamOverrun,
                    position,
                    "tagged property name could not be read".to_string(),
                );
                break;
            }
        };

        if name == "None" {
            break;
        }

        let type_name = match read_fname(archive, ctx) {
            Ok(type_name) => type_name,
            Err(_) => {
                ctx.fatal_diag(
                    DiagnosticCode::StreamOverrun,
                    position,
                    format!("type of tagged property {name} could not be read"),
                );
                break;
            }
        };

        let size = archive.read_i32()?;
        let array_index = archive.read_i32()?;

        let kind = PropertyKind::from_type_name(&type_name);
        if kind == PropertyKind::Unknown {
            ctx.diag(
                DiagnosticCode::UnknownTaggedType,
                position,
                format!("unknown tagged type {type_name} for property {name}"),
            );
            archive.skip(size.max(0) as i64)?;
            continue;
        }

        let mut ty = PropertyType::simple(kind);
        let mut bool_value = false;

        match kind {
            PropertyKind::Struct => {
                ty.struct_name = Some(read_fname(archive, ctx)?);
                archive.skip(16)?; // struct guid
            }
            PropertyKind::Bool => {
                bool_value = archive.read_u8()? != 0;
            }
            PropertyKind::Byte | PropertyKind::Enum => {
                let enum_name = read_fname(archive, ctx)?;
                if enum_name != "None" {
                    ty.enum_name = Some(enum_name);
                }
            }
            PropertyKind::Array | PropertyKind::Set => {
                let inner = read_fname(archive, ctx)?;
                ty.inner = Some(Box::new(PropertyType::simple(
                    PropertyKind::from_type_name(&inner),
                )));
            }
            PropertyKind::Map => {
                let key = read_fname(archive, ctx)?;
                let value = read_fname(archive, ctx)?;
                ty.inner = Some(Box::new(PropertyType::simple(
                    PropertyKind::from_type_name(&key),
                )));
                ty.value = Some(Box::new(PropertyType::simple(
                    PropertyKind::from_type_name(&value),
                )));
            }
            _ => {}
        }

        let value = match kind {
            // the value lives in the tag; the payload is empty
            PropertyKind::Bool => PropertyValue::Bool(bool_value),
            _ => {
                let start = archive.position();
                let value = read_value(archive, ctx, &ty, ValueContext::Normal)?;

                let consumed = archive.position() - start;
                if consumed != size as u64 {
                    ctx.diag(
                        DiagnosticCode::SizeMismatch,
                        start,
                        format!(
                            "property {name} declared {size} bytes but the reader consumed \
                             {consumed}"
                        ),
                    );
                    archive.set_position(start + size.max(0) as u64)?;
                }
                value
            }
        };

        let key = match array_index > 0 {
            true => format!("{name}[{array_index}]"),
            false => name,
        };
        bag.insert(key, value);
    }

    Ok(())
}

/// Read an unversioned property record driven by the flattened schema of
/// `type_name`.
pub fn read_unversioned<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
    type_name: &str,
    bag: &mut PropertyBag,
) -> Result<(), Error> {
    let Some(flattened) = ctx.types.flattened_properties(type_name) else {
        ctx.fatal_diag(
            DiagnosticCode::MissingSchema,
            archive.position(),
            format!("no schema registered for type {type_name}"),
        );
        return Ok(());
    };

    let header = match UnversionedHeader::read(archive) {
        Ok(header) => header,
        Err(_) => {
            ctx.fatal_diag(
                DiagnosticCode::TooManyFragments,
                archive.position(),
                format!("runaway unversioned header for type {type_name}"),
            );
            return Ok(());
        }
    };

    let mut schema_index = 0usize;
    let mut zero_mask_index = 0usize;

    for fragment in &header.fragments {
        schema_index += fragment.skip_num as usize;

        for _ in 0..fragment.value_num {
            if ctx.fatal {
                return Ok(());
            }

            let is_zero = match fragment.has_zeros {
                true => {
                    let bit = header.zero_mask.get(zero_mask_index).map(|e| *e).unwrap_or(false);
                    zero_mask_index += 1;
                    bit
                }
                false => false,
            };

            let Some(Some(property)) = flattened.get(schema_index).map(|e| e.as_ref()) else {
                // the wire has no self-describing length here, the rest of
                // the record cannot be recovered
                ctx.fatal_diag(
                    DiagnosticCode::SchemaIndexOutOfRange,
                    archive.position(),
                    format!(
                        "schema index {schema_index} is outside the {} flattened properties \
                         of {type_name}",
                        flattened.len()
                    ),
                );
                return Ok(());
            };

            let value_context = match is_zero {
                true => ValueContext::Zero,
                false => ValueContext::Normal,
            };
            let value = read_value(archive, ctx, &property.def.ty, value_context)?;

            let key = match property.def.array_index > 0 {
                true => format!("{}[{}]", property.def.name, property.def.array_index),
                false => property.def.name.clone(),
            };
            bag.insert(key, value);

            schema_index += 1;
        }
    }

    Ok(())
}

fn read_value<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
    ty: &PropertyType,
    value_context: ValueContext,
) -> Result<PropertyValue, Error> {
    if value_context == ValueContext::Zero {
        return Ok(zero_value(ctx, ty));
    }

    let position = archive.position();

    let value = match ty.kind {
        PropertyKind::Bool => PropertyValue::Bool(archive.read_u8()? != 0),
        PropertyKind::Int8 => PropertyValue::Int8(archive.read_i8()?),
        PropertyKind::Int16 => PropertyValue::Int16(archive.read_i16()?),
        PropertyKind::Int32 => PropertyValue::Int32(archive.read_i32()?),
        PropertyKind::Int64 => PropertyValue::Int64(archive.read_i64()?),
        PropertyKind::Byte => match &ty.enum_name {
            // enum-backed bytes store a qualified name in tagged data
            Some(_) if !ctx.unversioned => PropertyValue::Enum(read_fname(archive, ctx)?),
            _ => PropertyValue::Byte(archive.read_u8()?),
        },
        PropertyKind::UInt16 => PropertyValue::UInt16(archive.read_u16()?),
        PropertyKind::UInt32 => PropertyValue::UInt32(archive.read_u32()?),
        PropertyKind::UInt64 => PropertyValue::UInt64(archive.read_u64()?),
        PropertyKind::Float => PropertyValue::Float(archive.read_f32()?),
        PropertyKind::Double => PropertyValue::Double(archive.read_f64()?),
        PropertyKind::Name => PropertyValue::Name(read_fname(archive, ctx)?),
        PropertyKind::Str => PropertyValue::Str(archive.read_fstring()?),
        PropertyKind::Text => match text::read_text(archive, ctx.name_table)? {
            Some(text) => PropertyValue::Text(text),
            None => {
                ctx.diag(
                    DiagnosticCode::UnsupportedTextHistoryType,
                    position,
                    "text history type has no reader".to_string(),
                );
                PropertyValue::Null
            }
        },
        PropertyKind::Object | PropertyKind::Class | PropertyKind::WeakObject
        | PropertyKind::Interface => {
            let index = archive.read_i32()?;
            PropertyValue::Object(resolve_object_index(ctx, index, position))
        }
        PropertyKind::LazyObject => PropertyValue::Guid(archive.read_guid()?),
        PropertyKind::SoftObject | PropertyKind::SoftClass => read_soft_object(archive, ctx)?,
        PropertyKind::Enum => read_enum(archive, ctx, ty)?,
        PropertyKind::Delegate => PropertyValue::Delegate(read_delegate(archive, ctx)?),
        PropertyKind::MulticastDelegate => {
            let count = archive.read_i32()?;
            if !(0..=MAX_DELEGATES).contains(&count) {
                ctx.diag(
                    DiagnosticCode::ImplausibleCount,
                    position,
                    format!("multicast delegate count {count}"),
                );
                return Ok(PropertyValue::MulticastDelegate(Vec::new()));
            }

            let mut delegates = Vec::with_capacity(count as usize);
            for _ in 0..count {
                delegates.push(read_delegate(archive, ctx)?);
            }
            PropertyValue::MulticastDelegate(delegates)
        }
        PropertyKind::FieldPath => {
            let count = archive.read_i32()?;
            if !(0..=MAX_FIELD_PATH_SEGMENTS).contains(&count) {
                ctx.diag(
                    DiagnosticCode::ImplausibleCount,
                    position,
                    format!("field path segment count {count}"),
                );
                return Ok(PropertyValue::FieldPath(Vec::new()));
            }

            let mut path = Vec::with_capacity(count as usize);
            for _ in 0..count {
                path.push(read_fname(archive, ctx)?);
            }
            let _resolved_owner = archive.read_i32()?;
            PropertyValue::FieldPath(path)
        }
        PropertyKind::Array => {
            PropertyValue::Array(read_elements(archive, ctx, ty.inner.as_deref())?)
        }
        PropertyKind::Set => {
            let num_to_remove = archive.read_i32()?;
            if !(0..=MAX_CONTAINER_ELEMENTS).contains(&num_to_remove) {
                ctx.diag(
                    DiagnosticCode::ImplausibleCount,
                    position,
                    format!("set removal count {num_to_remove}"),
                );
                return Ok(PropertyValue::Set(Vec::new()));
            }
            PropertyValue::Set(read_elements(archive, ctx, ty.inner.as_deref())?)
        }
        PropertyKind::Map => read_map(archive, ctx, ty)?,
        PropertyKind::Struct => {
            PropertyValue::Struct(read_struct(archive, ctx, ty.struct_name.as_deref())?)
        }
        PropertyKind::Optional => {
            let has_value = archive.read_bool()?;
            match (has_value, ty.inner.as_deref()) {
                (true, Some(inner)) => PropertyValue::Optional(Some(Box::new(read_value(
                    archive,
                    ctx,
                    inner,
                    ValueContext::Item,
                )?))),
                _ => PropertyValue::Optional(None),
            }
        }
        PropertyKind::Unknown => {
            ctx.diag(
                DiagnosticCode::UnknownPropertyKind,
                position,
                "property kind has no reader".to_string(),
            );
            PropertyValue::Null
        }
    };

    Ok(value)
}

fn read_elements<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
    inner: Option<&PropertyType>,
) -> Result<Vec<PropertyValue>, Error> {
    let position = archive.position();
    let count = archive.read_i32()?;

    if !(0..=MAX_CONTAINER_ELEMENTS).contains(&count) {
        ctx.diag(
            DiagnosticCode::ImplausibleCount,
            position,
            format!("container element count {count}"),
        );
        return Ok(Vec::new());
    }

    let inner = inner.cloned().unwrap_or_default();

    let mut elements = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        if ctx.fatal {
            break;
        }
        elements.push(read_value(archive, ctx, &inner, ValueContext::Item)?);
    }

    Ok(elements)
}

fn read_map<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
    ty: &PropertyType,
) -> Result<PropertyValue, Error> {
    let position = archive.position();
    let key_ty = ty.inner.clone().map(|e| *e).unwrap_or_default();
    let value_ty = ty.value.clone().map(|e| *e).unwrap_or_default();

    let num_to_remove = archive.read_i32()?;
    if !(0..=MAX_CONTAINER_ELEMENTS).contains(&num_to_remove) {
        ctx.diag(
            DiagnosticCode::ImplausibleCount,
            position,
            format!("map removal count {num_to_remove}"),
        );
        return Ok(PropertyValue::Map(Vec::new()));
    }

    // removed entries serialize their keys only
    for _ in 0..num_to_remove {
        read_value(archive, ctx, &key_ty, ValueContext::Item)?;
    }

    let count = archive.read_i32()?;
    if !(0..=MAX_CONTAINER_ELEMENTS).contains(&count) {
        ctx.diag(
            DiagnosticCode::ImplausibleCount,
            position,
            format!("map element count {count}"),
        );
        return Ok(PropertyValue::Map(Vec::new()));
    }

    let mut entries = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        if ctx.fatal {
            break;
        }
        let key = read_value(archive, ctx, &key_ty, ValueContext::Item)?;
        let value = read_value(archive, ctx, &value_ty, ValueContext::Item)?;
        entries.push((key, value));
    }

    Ok(PropertyValue::Map(entries))
}

fn read_soft_object<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
) -> Result<PropertyValue, Error> {
    match ctx.unversioned {
        // package and asset names, then the sub-path
        true => {
            let package = read_fname(archive, ctx)?;
            let asset = read_fname(archive, ctx)?;
            let sub_path = archive.read_fstring()?;

            let asset_path = match asset.is_empty() || asset == "None" {
                true => package,
                false => format!("{package}.{asset}"),
            };
            Ok(PropertyValue::SoftObject {
                asset_path,
                sub_path,
            })
        }
        false => {
            let asset_path = archive.read_fstring()?.unwrap_or_default();
            let sub_path = archive.read_fstring()?;
            Ok(PropertyValue::SoftObject {
                asset_path,
                sub_path,
            })
        }
    }
}

fn read_enum<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
    ty: &PropertyType,
) -> Result<PropertyValue, Error> {
    if !ctx.unversioned {
        return Ok(PropertyValue::Enum(read_fname(archive, ctx)?));
    }

    // schema-driven enums store the underlying numeric value
    let underlying = ty
        .inner
        .as_deref()
        .map(|e| e.kind)
        .unwrap_or(PropertyKind::Byte);

    let raw = match underlying {
        PropertyKind::Byte | PropertyKind::Int8 => archive.read_u8()? as i64,
        PropertyKind::Int16 | PropertyKind::UInt16 => archive.read_i16()? as i64,
        PropertyKind::Int32 | PropertyKind::UInt32 => archive.read_i32()? as i64,
        _ => archive.read_i64()?,
    };

    let resolved = ty
        .enum_name
        .as_deref()
        .and_then(|name| ctx.types.get_enum(name))
        .and_then(|definition| definition.name_of(raw).map(|e| e.to_string()));

    Ok(PropertyValue::Enum(
        resolved.unwrap_or_else(|| raw.to_string()),
    ))
}

fn read_delegate<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
) -> Result<DelegateValue, Error> {
    let position = archive.position();
    let object_index = archive.read_i32()?;
    let function = read_fname(archive, ctx)?;

    Ok(DelegateValue {
        object: resolve_object_index(ctx, object_index, position),
        function,
    })
}

fn read_struct<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    ctx: &mut ReadContext,
    struct_name: Option<&str>,
) -> Result<PropertyBag, Error> {
    let struct_name = struct_name.unwrap_or_default();
    let mut bag = PropertyBag::new(struct_name);

    let is_compact = COMPACT_STRUCTS.contains(&struct_name);

    if is_compact {
        if let Some(flattened) = ctx.types.flattened_properties(struct_name) {
            for property in flattened.iter().flatten() {
                if ctx.fatal {
                    break;
                }
                let value = read_value(archive, ctx, &property.def.ty, ValueContext::Normal)?;
                bag.insert(property.def.name.clone(), value);
            }
            return Ok(bag);
        }

        if ctx.unversioned {
            ctx.fatal_diag(
                DiagnosticCode::MissingSchema,
                archive.position(),
                format!("no schema registered for compact struct {struct_name}"),
            );
            return Ok(bag);
        }
    }

    match ctx.unversioned {
        true => read_unversioned(archive, ctx, struct_name, &mut bag)?,
        false => read_tagged(archive, ctx, &mut bag)?,
    }

    Ok(bag)
}

fn zero_value(ctx: &ReadContext, ty: &PropertyType) -> PropertyValue {
    match ty.kind {
        PropertyKind::Bool => PropertyValue::Bool(false),
        PropertyKind::Int8 => PropertyValue::Int8(0),
        PropertyKind::Int16 => PropertyValue::Int16(0),
        PropertyKind::Int32 => PropertyValue::Int32(0),
        PropertyKind::Int64 => PropertyValue::Int64(0),
        PropertyKind::Byte => PropertyValue::Byte(0),
        PropertyKind::UInt16 => PropertyValue::UInt16(0),
        PropertyKind::UInt32 => PropertyValue::UInt32(0),
        PropertyKind::UInt64 => PropertyValue::UInt64(0),
        PropertyKind::Float => PropertyValue::Float(0.0),
        PropertyKind::Double => PropertyValue::Double(0.0),
        PropertyKind::Name => PropertyValue::Name("None".to_string()),
        PropertyKind::Str => PropertyValue::Str(None),
        PropertyKind::Text => PropertyValue::Text(TextValue::default()),
        PropertyKind::Object
        | PropertyKind::Class
        | PropertyKind::WeakObject
        | PropertyKind::Interface => PropertyValue::Object(ObjectReference::null()),
        PropertyKind::LazyObject => PropertyValue::Guid(Guid::default()),
        PropertyKind::SoftObject | PropertyKind::SoftClass => PropertyValue::SoftObject {
            asset_path: String::new(),
            sub_path: None,
        },
        PropertyKind::Enum => {
            let resolved = ty
                .enum_name
                .as_deref()
                .and_then(|name| ctx.types.get_enum(name))
                .and_then(|definition| definition.name_of(0).map(|e| e.to_string()));
            PropertyValue::Enum(resolved.unwrap_or_else(|| "0".to_string()))
        }
        PropertyKind::Delegate => PropertyValue::Delegate(DelegateValue::default()),
        PropertyKind::MulticastDelegate => PropertyValue::MulticastDelegate(Vec::new()),
        PropertyKind::FieldPath => PropertyValue::FieldPath(Vec::new()),
        PropertyKind::Array => PropertyValue::Array(Vec::new()),
        PropertyKind::Set => PropertyValue::Set(Vec::new()),
        PropertyKind::Map => PropertyValue::Map(Vec::new()),
        PropertyKind::Struct => {
            let struct_name = ty.struct_name.as_deref().unwrap_or_default();
            let mut bag = PropertyBag::new(struct_name);

            if let Some(flattened) = ctx.types.flattened_properties(struct_name) {
                for property in flattened.iter().flatten() {
                    let value = zero_value(ctx, &property.def.ty);
                    bag.insert(property.def.name.clone(), value);
                }
            }
            PropertyValue::Struct(bag)
        }
        PropertyKind::Optional => PropertyValue::Optional(None),
        PropertyKind::Unknown => PropertyValue::Null,
    }
}
