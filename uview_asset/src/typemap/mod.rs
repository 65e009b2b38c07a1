//! Type registry: schemas for unversioned property deserialization

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

pub mod json;
pub mod usmap;

/// Property kind, the closed set of value shapes the deserializer knows
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Boolean
    Bool,
    /// Signed 8 bit integer
    Int8,
    /// Signed 16 bit integer
    Int16,
    /// Signed 32 bit integer
    Int32,
    /// Signed 64 bit integer
    Int64,
    /// Unsigned 8 bit integer, "ByteProperty"
    Byte,
    /// Unsigned 16 bit integer
    UInt16,
    /// Unsigned 32 bit integer
    UInt32,
    /// Unsigned 64 bit integer
    UInt64,
    /// 32 bit float
    Float,
    /// 64 bit float
    Double,
    /// Name table reference
    Name,
    /// Plain string
    Str,
    /// Localized text
    Text,
    /// Object reference
    Object,
    /// Weak object reference
    WeakObject,
    /// Lazy object reference
    LazyObject,
    /// Soft object path
    SoftObject,
    /// Soft class path
    SoftClass,
    /// Interface reference
    Interface,
    /// Class reference, serialized like an object reference
    Class,
    /// Enum value
    Enum,
    /// Dynamic array
    Array,
    /// Set
    Set,
    /// Map
    Map,
    /// Nested struct
    Struct,
    /// Optional value
    Optional,
    /// Single delegate
    Delegate,
    /// Multicast delegate
    MulticastDelegate,
    /// Field path
    FieldPath,
    /// Unknown kind; value bytes cannot be interpreted
    Unknown,
}

impl PropertyKind {
    /// Map a tagged-property type name to a kind.
    pub fn from_type_name(name: &str) -> PropertyKind {
        match name {
            "BoolProperty" => PropertyKind::Bool,
            "Int8Property" => PropertyKind::Int8,
            "Int16Property" => PropertyKind::Int16,
            "IntProperty" => PropertyKind::Int32,
            "Int64Property" => PropertyKind::Int64,
            "ByteProperty" => PropertyKind::Byte,
            "UInt16Property" => PropertyKind::UInt16,
            "UInt32Property" => PropertyKind::UInt32,
            "UInt64Property" => PropertyKind::UInt64,
            "FloatProperty" => PropertyKind::Float,
            "DoubleProperty" => PropertyKind::Double,
            "NameProperty" => PropertyKind::Name,
            "StrProperty" => PropertyKind::Str,
            "TextProperty" => PropertyKind::Text,
            "ObjectProperty" => PropertyKind::Object,
            "WeakObjectProperty" => PropertyKind::WeakObject,
            "LazyObjectProperty" => PropertyKind::LazyObject,
            "SoftObjectProperty" | "AssetObjectProperty" => PropertyKind::SoftObject,
            "SoftClassProperty" => PropertyKind::SoftClass,
            "InterfaceProperty" => PropertyKind::Interface,
            "ClassProperty" => PropertyKind::Class,
            "EnumProperty" => PropertyKind::Enum,
            "ArrayProperty" => PropertyKind::Array,
            "SetProperty" => PropertyKind::Set,
            "MapProperty" => PropertyKind::Map,
            "StructProperty" => PropertyKind::Struct,
            "OptionalProperty" => PropertyKind::Optional,
            "DelegateProperty" => PropertyKind::Delegate,
            "MulticastDelegateProperty"
            | "MulticastInlineDelegateProperty"
            | "MulticastSparseDelegateProperty" => PropertyKind::MulticastDelegate,
            "FieldPathProperty" => PropertyKind::FieldPath,
            _ => PropertyKind::Unknown,
        }
    }
}

impl Default for PropertyKind {
    fn default() -> Self {
        PropertyKind::Unknown
    }
}

/// A property's full type: kind plus the nested details some kinds carry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyType {
    /// Kind
    pub kind: PropertyKind,
    /// Struct type name, for `Struct`
    pub struct_name: Option<String>,
    /// Enum type name, for `Enum` and enum-backed `Byte`
    pub enum_name: Option<String>,
    /// Element type, for `Array`/`Set`/`Optional`/`Enum` underlying
    pub inner: Option<Box<PropertyType>>,
    /// Value type, for `Map` (`inner` is the key type)
    pub value: Option<Box<PropertyType>>,
}

impl PropertyType {
    /// A type with just a kind.
    pub fn simple(kind: PropertyKind) -> Self {
        PropertyType {
            kind,
            ..Default::default()
        }
    }
}

/// One schema slot of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    /// Property name
    pub name: String,
    /// Slot index within the declaring type
    pub schema_index: u16,
    /// Element index for static arrays, 0 otherwise
    pub array_index: u16,
    /// Property type
    pub ty: PropertyType,
}

/// Whether a type is a class or a plain struct
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// UClass-like type
    Class,
    /// UScriptStruct-like type
    Struct,
}

/// Where a type definition came from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TypeSource {
    /// A type-mapping blob
    Runtime,
    /// Declared by an asset, registered through the lazy resolver
    Asset,
    /// Registered directly by the caller
    Manual,
}

/// A class or struct schema
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Type name
    pub name: String,
    /// Class or struct
    pub kind: TypeKind,
    /// Origin
    pub source: TypeSource,
    /// Parent type name
    pub super_name: Option<String>,
    /// Local schema slot count, including unserialized and inherited-offset
    /// padding slots
    pub property_count: u16,
    /// Serialized properties by local schema index; may be sparse
    pub properties: BTreeMap<u16, PropertyDefinition>,
}

/// An enum schema
#[derive(Debug, Clone)]
pub struct EnumDefinition {
    /// Enum name
    pub name: String,
    /// Origin
    pub source: TypeSource,
    /// Values by numeric value
    pub values: BTreeMap<i64, String>,
    /// Reverse index
    name_to_value: HashMap<String, i64>,
    /// Declared underlying type name, when known
    pub underlying_type: Option<String>,
}

impl EnumDefinition {
    /// Create an enum definition, building the reverse index.
    pub fn new(
        name: String,
        source: TypeSource,
        values: BTreeMap<i64, String>,
        underlying_type: Option<String>,
    ) -> Self {
        let name_to_value = values.iter().map(|(k, v)| (v.clone(), *k)).collect();
        EnumDefinition {
            name,
            source,
            values,
            name_to_value,
            underlying_type,
        }
    }

    /// Look up a value by name.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.name_to_value.get(name).copied()
    }

    /// Look up a name by value.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values.get(&value).map(|e| e.as_str())
    }
}

impl Default for EnumDefinition {
    fn default() -> Self {
        EnumDefinition::new(String::new(), TypeSource::Manual, BTreeMap::new(), None)
    }
}

/// One slot of a flattened property array
#[derive(Debug, Clone)]
pub struct FlattenedProperty {
    /// The property definition
    pub def: PropertyDefinition,
    /// Name of the type level that declared it
    pub owner: String,
}

/// Inheritance-merged property array: the derived type's slots first, each
/// ancestor's appended after.
pub type FlattenedProperties = Vec<Option<FlattenedProperty>>;

/// A lazily resolved type, as returned by a [`TypeResolver`]
pub struct ResolvedType {
    /// Parent type name
    pub super_name: Option<String>,
    /// Serialized properties with local schema indices
    pub properties: Vec<PropertyDefinition>,
    /// Local slot count; when zero, derived from the properties
    pub property_count: u16,
}

/// Caller-supplied callback resolving asset-declared types on cache miss
pub type TypeResolver = dyn Fn(&str) -> Option<ResolvedType> + Send + Sync;

/// Holds every known class/struct/enum schema, with case-insensitive lookup
/// and flattened-property caching.
pub struct TypeRegistry {
    types: RwLock<HashMap<String, Arc<TypeDefinition>>>,
    enums: RwLock<HashMap<String, Arc<EnumDefinition>>>,
    flattened: RwLock<HashMap<String, Arc<FlattenedProperties>>>,
    negative: RwLock<HashSet<String>>,
    resolver: RwLock<Option<Box<TypeResolver>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.read().len())
            .field("enums", &self.enums.read().len())
            .finish()
    }
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        TypeRegistry {
            types: RwLock::new(HashMap::new()),
            enums: RwLock::new(HashMap::new()),
            flattened: RwLock::new(HashMap::new()),
            negative: RwLock::new(HashSet::new()),
            resolver: RwLock::new(None),
        }
    }

    /// Install the lazy resolver used on type cache misses.
    pub fn set_resolver(&self, resolver: Box<TypeResolver>) {
        *self.resolver.write() = Some(resolver);
    }

    /// Register a type definition. An already-registered name keeps its
    /// first definition.
    pub fn register_type(&self, definition: TypeDefinition) {
        let key = definition.name.to_lowercase();
        self.types
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(definition));
    }

    /// Register an enum definition.
    pub fn register_enum(&self, definition: EnumDefinition) {
        let key = definition.name.to_lowercase();
        self.enums
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(definition));
    }

    /// Register an asset-declared enum with no values. Values only come from
    /// a mapping blob; until one supplies them, lookups fall back to the raw
    /// ordinal.
    pub fn register_asset_enum(&self, name: &str) {
        self.register_enum(EnumDefinition::new(
            name.to_string(),
            TypeSource::Asset,
            BTreeMap::new(),
            None,
        ));
    }

    /// Number of registered types.
    pub fn type_count(&self) -> usize {
        self.types.read().len()
    }

    /// Number of registered enums.
    pub fn enum_count(&self) -> usize {
        self.enums.read().len()
    }

    /// Look up a type, consulting the lazy resolver on miss.
    pub fn get_type(&self, name: &str) -> Option<Arc<TypeDefinition>> {
        let key = name.to_lowercase();

        if let Some(definition) = self.types.read().get(&key) {
            return Some(definition.clone());
        }

        if self.negative.read().contains(&key) {
            return None;
        }

        let resolved = {
            let resolver = self.resolver.read();
            resolver.as_ref().and_then(|e| e(name))
        };

        match resolved {
            Some(resolved) => {
                let property_count = match resolved.property_count {
                    0 => resolved
                        .properties
                        .iter()
                        .map(|e| e.schema_index + 1)
                        .max()
                        .unwrap_or(0),
                    count => count,
                };

                let definition = TypeDefinition {
                    name: name.to_string(),
                    kind: TypeKind::Class,
                    source: TypeSource::Asset,
                    super_name: resolved.super_name,
                    property_count,
                    properties: resolved
                        .properties
                        .into_iter()
                        .map(|e| (e.schema_index, e))
                        .collect(),
                };
                self.register_type(definition);
                self.types.read().get(&key).cloned()
            }
            None => {
                self.negative.write().insert(key);
                None
            }
        }
    }

    /// Look up an enum.
    pub fn get_enum(&self, name: &str) -> Option<Arc<EnumDefinition>> {
        self.enums.read().get(&name.to_lowercase()).cloned()
    }

    /// Inheritance-flattened property array for a type.
    ///
    /// The derived type's local slots occupy the lowest indices, each
    /// ancestor's slots follow; the total length is the sum of every level's
    /// local count. Cached per verbatim name.
    pub fn flattened_properties(&self, name: &str) -> Option<Arc<FlattenedProperties>> {
        if let Some(flattened) = self.flattened.read().get(name) {
            return Some(flattened.clone());
        }

        let mut chain = Vec::new();
        let mut current = self.get_type(name)?;
        loop {
            chain.push(current.clone());
            match current.super_name.clone() {
                Some(super_name) if !super_name.is_empty() => {
                    match self.get_type(&super_name) {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
                _ => break,
            }

            // inheritance chains are short; this breaks reference cycles
            if chain.len() > 256 {
                break;
            }
        }

        let total: usize = chain.iter().map(|e| e.property_count as usize).sum();
        let mut flattened: FlattenedProperties = vec![None; total];

        let mut level_offset = 0usize;
        for level in &chain {
            for (schema_index, def) in &level.properties {
                let slot = level_offset + *schema_index as usize;
                if slot < flattened.len() {
                    flattened[slot] = Some(FlattenedProperty {
                        def: def.clone(),
                        owner: level.name.clone(),
                    });
                }
            }
            level_offset += level.property_count as usize;
        }

        let flattened = Arc::new(flattened);
        self.flattened
            .write()
            .insert(name.to_string(), flattened.clone());
        Some(flattened)
    }
}
