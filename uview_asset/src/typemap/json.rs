//! SDK-exported JSON type-mapping ingestion
//!
//! Carries the same content as the binary blob with string type tags.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;

use crate::error::Error;
use crate::typemap::{
    EnumDefinition, PropertyDefinition, PropertyKind, PropertyType, TypeDefinition, TypeKind,
    TypeRegistry, TypeSource,
};

#[derive(Deserialize)]
struct JsonBlob {
    #[serde(default)]
    enums: Vec<JsonEnum>,
    #[serde(default)]
    types: Vec<JsonType>,
}

#[derive(Deserialize)]
struct JsonEnum {
    name: String,
    #[serde(default)]
    values: Vec<JsonEnumValue>,
    #[serde(default, rename = "underlyingType")]
    underlying_type: Option<String>,
}

#[derive(Deserialize)]
struct JsonEnumValue {
    value: i64,
    name: String,
}

#[derive(Deserialize)]
struct JsonType {
    name: String,
    #[serde(default, rename = "super")]
    super_name: Option<String>,
    #[serde(default, rename = "propertyCount")]
    property_count: u16,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonProperty {
    #[serde(rename = "schemaIndex")]
    schema_index: u16,
    #[serde(default, rename = "arraySize")]
    array_size: u8,
    name: String,
    #[serde(rename = "type")]
    ty: JsonPropertyType,
}

#[derive(Deserialize)]
struct JsonPropertyType {
    /// String tag, e.g. `IntProperty` or `ArrayProperty`
    kind: String,
    #[serde(default, rename = "structName")]
    struct_name: Option<String>,
    #[serde(default, rename = "enumName")]
    enum_name: Option<String>,
    #[serde(default)]
    inner: Option<Box<JsonPropertyType>>,
    #[serde(default)]
    value: Option<Box<JsonPropertyType>>,
}

impl From<JsonPropertyType> for PropertyType {
    fn from(json: JsonPropertyType) -> Self {
        PropertyType {
            kind: PropertyKind::from_type_name(&json.kind),
            struct_name: json.struct_name,
            enum_name: json.enum_name,
            inner: json.inner.map(|e| Box::new((*e).into())),
            value: json.value.map(|e| Box::new((*e).into())),
        }
    }
}

/// Load a JSON type-mapping document and register its contents.
pub fn load<R: Read>(reader: R, registry: &TypeRegistry) -> Result<(), Error> {
    let blob: JsonBlob = serde_json::from_reader(reader)
        .map_err(|e| Error::invalid_file(format!("Invalid type-mapping JSON: {e}")))?;

    for json_enum in blob.enums {
        let values: BTreeMap<i64, String> = json_enum
            .values
            .into_iter()
            .map(|e| (e.value, e.name))
            .collect();

        registry.register_enum(EnumDefinition::new(
            json_enum.name,
            TypeSource::Runtime,
            values,
            json_enum.underlying_type,
        ));
    }

    for json_type in blob.types {
        let mut properties = BTreeMap::new();
        let mut max_slot = 0u16;

        for json_property in json_type.properties {
            let ty: PropertyType = json_property.ty.into();

            for element in 0..json_property.array_size.max(1) as u16 {
                let schema_index = json_property.schema_index + element;
                max_slot = max_slot.max(schema_index + 1);

                properties.insert(
                    schema_index,
                    PropertyDefinition {
                        name: json_property.name.clone(),
                        schema_index,
                        array_index: element,
                        ty: ty.clone(),
                    },
                );
            }
        }

        let property_count = match json_type.property_count {
            0 => max_slot,
            count => count,
        };

        registry.register_type(TypeDefinition {
            name: json_type.name,
            kind: TypeKind::Class,
            source: TypeSource::Runtime,
            super_name: json_type.super_name.filter(|e| !e.is_empty()),
            property_count,
            properties,
        });
    }

    Ok(())
}
