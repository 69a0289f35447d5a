//! ECSchema JSON reader.
//!
//! JSON documents spell every reference as `Schema.Item` and carry typed
//! custom attribute values; otherwise they go through the same assembly as XML.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::base::{EcVersion, ItemRef, SchemaKey, SchemaVersion};
use crate::context::ReadContext;
use crate::interchange::assemble::{KoqText, RefStyle, ReferenceDecl, SchemaDraft, assemble, raw_ref};
use crate::interchange::{DocumentFormat, ReadError};
use crate::schema::{
    ArrayBounds, ClassModifier, ClassType, CompositeSpec, CustomAttribute, CustomAttributes, EcClass,
    EcProperty, EnumBackingType, EnumValue, Enumeration, Format, FormatType, InstanceValue, ItemInfo,
    KindOfQuantity, Multiplicity, NavigationDirection, Phenomenon, PrimitiveType, PrimitiveTypeRef,
    PropertyCategory, PropertyKind, RelationshipConstraint, RelationshipInfo, Schema, SchemaItem,
    StrengthDirection, StrengthType, Unit, UnitLabel, UnitSystem,
};

const FORMAT: DocumentFormat = DocumentFormat::Json;

type Object = Map<String, Value>;

/// Read a schema document and register it in `ctx`.
pub(crate) fn read_document(input: &[u8], ctx: &mut ReadContext) -> Result<Arc<Schema>, ReadError> {
    let value: Value = serde_json::from_slice(input).map_err(|e| ReadError::json(format!("Parse error: {e}")))?;
    let draft = DocumentReader::read(&value)?;
    assemble(draft, ctx)
}

#[derive(Deserialize)]
struct Header {
    name: String,
    version: Option<String>,
}

/// Name and version from the document header.
pub(crate) fn peek_schema_key(input: &[u8]) -> Option<SchemaKey> {
    let header: Header = serde_json::from_slice(input).ok()?;
    let version = header
        .version
        .as_deref()
        .and_then(SchemaVersion::parse)
        .unwrap_or(SchemaVersion::new(1, 0, 0));
    Some(SchemaKey::from_version(header.name, version))
}

/// Generation named by a `$schema` URI such as `.../json_schemas/ec/32/ecschema`.
fn ec_version_of(uri: &str) -> Option<EcVersion> {
    let uri = uri.trim().trim_end_matches('/');
    if !uri.to_ascii_lowercase().ends_with("ecschema") {
        return None;
    }
    let version = uri
        .split('/')
        .find_map(|segment| match segment {
            "30" => Some(EcVersion::V3_0),
            "31" => Some(EcVersion::V3_1),
            "32" => Some(EcVersion::V3_2),
            _ => None,
        })
        .unwrap_or(EcVersion::V3_2);
    Some(version)
}

struct DocumentReader {
    draft: SchemaDraft,
}

impl DocumentReader {
    fn read(value: &Value) -> Result<SchemaDraft, ReadError> {
        let root = value
            .as_object()
            .ok_or_else(|| ReadError::invalid(FORMAT, "schema document must be an object"))?;
        let mut reader = Self::read_header(root)?;

        if let Some(references) = root.get("references") {
            for reference in as_array(references, "references")? {
                let decl = read_reference(as_object(reference, "reference")?)?;
                reader.draft.references.push(decl);
            }
        }
        if let Some(cas) = root.get("customAttributes") {
            reader.draft.custom_attributes = read_custom_attributes(cas, "schema")?;
        }
        if let Some(items) = root.get("items") {
            let items = as_object(items, "items")?;
            for (name, item) in items {
                reader.read_item(name, as_object(item, name)?)?;
            }
        }
        Ok(reader.draft)
    }

    // ========================================================================
    // HEADER
    // ========================================================================

    fn read_header(root: &Object) -> Result<Self, ReadError> {
        let uri = str_field(root, "$schema").ok_or_else(|| ReadError::missing_attribute(FORMAT, "schema", "$schema"))?;
        let ec_version = ec_version_of(uri)
            .ok_or_else(|| ReadError::invalid(FORMAT, format!("unrecognized $schema '{uri}'")))?;

        let name = required_name(root, "name", "schema")?;
        let version_text = required_str(root, "version", "schema")?;
        let version = SchemaVersion::parse(version_text).ok_or_else(|| {
            ReadError::invalid(FORMAT, format!("schema '{name}' has invalid version '{version_text}'"))
        })?;
        let alias = required_name(root, "alias", "schema")?;

        let mut draft = SchemaDraft::new(FORMAT, ec_version, RefStyle::SchemaName, name, alias, version);
        draft.display_label = str_field(root, "label").map(str::to_string);
        draft.description = str_field(root, "description").unwrap_or_default().to_string();
        Ok(Self { draft })
    }

    // ========================================================================
    // ITEMS
    // ========================================================================

    fn read_item(&mut self, name: &str, obj: &Object) -> Result<(), ReadError> {
        let item_type = required_str(obj, "schemaItemType", name)?;
        let item: SchemaItem = match item_type {
            "EntityClass" => read_class(name, obj, ClassType::Entity)?,
            "Mixin" => {
                let applies_to = raw_ref(required_str(obj, "appliesTo", name)?, RefStyle::SchemaName);
                read_class(
                    name,
                    obj,
                    ClassType::Mixin {
                        applies_to: Some(applies_to),
                    },
                )?
            }
            "StructClass" => read_class(name, obj, ClassType::Struct)?,
            "CustomAttributeClass" => read_class(
                name,
                obj,
                ClassType::CustomAttribute {
                    applies_to: non_empty_str(obj, "appliesTo").map(str::to_string),
                },
            )?,
            "RelationshipClass" => read_relationship(name, obj)?,
            "Enumeration" => read_enumeration(name, obj)?,
            "KindOfQuantity" => {
                let mut koq = KindOfQuantity::new(name);
                read_info(&mut koq.info, obj);
                if let Some(error) = f64_field(obj, "relativeError") {
                    koq.relative_error = error;
                }
                self.draft.koq_texts.push(KoqText {
                    koq: name.to_string(),
                    persistence_unit: non_empty_str(obj, "persistenceUnit").map(str::to_string),
                    presentation_units: string_list(obj, "presentationUnits"),
                });
                koq.into()
            }
            "PropertyCategory" => {
                let mut category = PropertyCategory::new(name);
                read_info(&mut category.info, obj);
                category.priority = i32_field(obj, "priority").unwrap_or(0);
                category.into()
            }
            "UnitSystem" => {
                let mut system = UnitSystem::new(name);
                read_info(&mut system.info, obj);
                system.into()
            }
            "Phenomenon" => {
                let mut phenomenon = Phenomenon::new(name, required_str(obj, "definition", name)?);
                read_info(&mut phenomenon.info, obj);
                phenomenon.into()
            }
            "Unit" | "Constant" | "InvertedUnit" => read_unit(name, item_type, obj)?,
            "Format" => read_format(name, obj)?,
            other => {
                return Err(ReadError::invalid(
                    FORMAT,
                    format!("item '{name}' has unknown schemaItemType '{other}'"),
                ));
            }
        };
        trace!(item = name, item_type, "read schema item");
        self.draft.push_item(item)
    }
}

fn read_reference(obj: &Object) -> Result<ReferenceDecl, ReadError> {
    let name = required_name(obj, "name", "reference")?;
    let version_text = required_str(obj, "version", "reference")?;
    let version = SchemaVersion::parse(version_text).ok_or_else(|| {
        ReadError::invalid(FORMAT, format!("reference to '{name}' has invalid version '{version_text}'"))
    })?;
    Ok(ReferenceDecl {
        name,
        version,
        alias: non_empty_str(obj, "alias").map(|a| a.trim().to_string()),
    })
}

// ============================================================================
// CLASSES
// ============================================================================

fn read_class(name: &str, obj: &Object, class_type: ClassType) -> Result<SchemaItem, ReadError> {
    let mut class = EcClass::new(name, class_type);
    read_info(&mut class.info, obj);
    if let Some(text) = non_empty_str(obj, "modifier") {
        match ClassModifier::parse(text) {
            Some(modifier) => class.modifier = modifier,
            None => warn!(class = name, modifier = text, "unknown class modifier; using None"),
        }
    }
    if let Some(base) = non_empty_str(obj, "baseClass") {
        class.base_classes.push(raw_ref(base, RefStyle::SchemaName));
    }
    for mixin in string_list(obj, "mixins") {
        class.base_classes.push(raw_ref(&mixin, RefStyle::SchemaName));
    }
    if let Some(properties) = obj.get("properties") {
        for property in as_array(properties, "properties")? {
            class.insert_property_raw(read_property(name, as_object(property, "property")?)?);
        }
    }
    if let Some(cas) = obj.get("customAttributes") {
        class.custom_attributes = read_custom_attributes(cas, name)?;
    }
    Ok(class.into())
}

fn read_relationship(name: &str, obj: &Object) -> Result<SchemaItem, ReadError> {
    let strength = match non_empty_str(obj, "strength") {
        None => StrengthType::default(),
        Some(text) => StrengthType::parse(text).ok_or_else(|| {
            ReadError::invalid(FORMAT, format!("relationship '{name}' has invalid strength '{text}'"))
        })?,
    };
    let direction = match non_empty_str(obj, "strengthDirection") {
        None => StrengthDirection::default(),
        Some(text) => StrengthDirection::parse(text).ok_or_else(|| {
            ReadError::invalid(FORMAT, format!("relationship '{name}' has invalid strength direction '{text}'"))
        })?,
    };
    let constraint = |end: &str| -> Result<RelationshipConstraint, ReadError> {
        let value = obj
            .get(end)
            .ok_or_else(|| ReadError::missing_attribute(FORMAT, name, end))?;
        read_constraint(as_object(value, end)?, &format!("{name}.{end}"))
    };
    let info = RelationshipInfo {
        strength,
        direction,
        source: constraint("source")?,
        target: constraint("target")?,
    };
    read_class(name, obj, ClassType::Relationship(Box::new(info)))
}

fn read_constraint(obj: &Object, owner: &str) -> Result<RelationshipConstraint, ReadError> {
    let multiplicity_text = required_str(obj, "multiplicity", owner)?;
    let multiplicity = Multiplicity::parse(multiplicity_text).ok_or_else(|| {
        ReadError::invalid(FORMAT, format!("{owner} has invalid multiplicity '{multiplicity_text}'"))
    })?;
    let is_polymorphic = obj
        .get("polymorphic")
        .and_then(Value::as_bool)
        .ok_or_else(|| ReadError::missing_attribute(FORMAT, owner, "polymorphic"))?;
    let mut constraint = RelationshipConstraint {
        role_label: str_field(obj, "roleLabel").unwrap_or_default().to_string(),
        is_polymorphic,
        multiplicity,
        abstract_constraint: non_empty_str(obj, "abstractConstraint").map(|t| raw_ref(t, RefStyle::SchemaName)),
        ..RelationshipConstraint::default()
    };
    constraint.constraint_classes = string_list(obj, "constraintClasses")
        .iter()
        .map(|c| raw_ref(c, RefStyle::SchemaName))
        .collect();
    if let Some(cas) = obj.get("customAttributes") {
        constraint.custom_attributes = read_custom_attributes(cas, owner)?;
    }
    Ok(constraint)
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn read_property(class: &str, obj: &Object) -> Result<EcProperty, ReadError> {
    let name = required_name(obj, "name", class)?;
    let owner = format!("{class}.{name}");
    let kind_text = required_str(obj, "type", &owner)?;
    let kind = match kind_text {
        "PrimitiveProperty" => PropertyKind::Primitive {
            ty: primitive_type_ref(required_str(obj, "typeName", &owner)?),
        },
        "PrimitiveArrayProperty" => PropertyKind::PrimitiveArray {
            ty: primitive_type_ref(required_str(obj, "typeName", &owner)?),
            bounds: array_bounds(obj),
        },
        "StructProperty" => PropertyKind::Struct {
            struct_class: raw_ref(required_str(obj, "typeName", &owner)?, RefStyle::SchemaName),
        },
        "StructArrayProperty" => PropertyKind::StructArray {
            struct_class: raw_ref(required_str(obj, "typeName", &owner)?, RefStyle::SchemaName),
            bounds: array_bounds(obj),
        },
        "NavigationProperty" => PropertyKind::Navigation {
            relationship: raw_ref(required_str(obj, "relationshipName", &owner)?, RefStyle::SchemaName),
            direction: non_empty_str(obj, "direction")
                .and_then(NavigationDirection::parse)
                .unwrap_or_default(),
        },
        other => {
            return Err(ReadError::invalid(
                FORMAT,
                format!("property '{owner}' has unknown type '{other}'"),
            ));
        }
    };

    let mut property = EcProperty::new(&name, kind);
    property.display_label = str_field(obj, "label").map(str::to_string);
    property.description = str_field(obj, "description").unwrap_or_default().to_string();
    property.is_readonly = obj.get("isReadOnly").and_then(Value::as_bool).unwrap_or(false);
    property.priority = i32_field(obj, "priority").unwrap_or(0);
    property.category = non_empty_str(obj, "category").map(|t| raw_ref(t, RefStyle::SchemaName));
    property.kind_of_quantity = non_empty_str(obj, "kindOfQuantity").map(|t| raw_ref(t, RefStyle::SchemaName));
    property.extended_type = non_empty_str(obj, "extendedTypeName").map(str::to_string);
    property.min_length = u32_field(obj, "minLength");
    property.max_length = u32_field(obj, "maxLength");
    property.min_value = f64_field(obj, "minValue");
    property.max_value = f64_field(obj, "maxValue");
    if let Some(cas) = obj.get("customAttributes") {
        property.custom_attributes = read_custom_attributes(cas, &owner)?;
    }
    Ok(property)
}

fn primitive_type_ref(type_name: &str) -> PrimitiveTypeRef {
    match PrimitiveType::from_type_name(type_name) {
        Some(primitive) => PrimitiveTypeRef::Primitive(primitive),
        None => PrimitiveTypeRef::Enumeration(raw_ref(type_name, RefStyle::SchemaName)),
    }
}

fn array_bounds(obj: &Object) -> ArrayBounds {
    ArrayBounds {
        min_occurs: u32_field(obj, "minOccurs").unwrap_or(0),
        max_occurs: u32_field(obj, "maxOccurs"),
    }
}

// ============================================================================
// ENUMERATIONS, UNITS AND FORMATS
// ============================================================================

fn read_enumeration(name: &str, obj: &Object) -> Result<SchemaItem, ReadError> {
    let backing_text = required_str(obj, "type", name)?;
    let backing = PrimitiveType::from_type_name(backing_text)
        .and_then(EnumBackingType::from_primitive)
        .ok_or_else(|| {
            ReadError::invalid(FORMAT, format!("enumeration '{name}' has unsupported type '{backing_text}'"))
        })?;
    let mut enumeration = Enumeration::new(name, backing);
    read_info(&mut enumeration.info, obj);
    enumeration.is_strict = obj.get("isStrict").and_then(Value::as_bool).unwrap_or(true);

    let enumerators: &[Value] = match obj.get("enumerators") {
        Some(value) => as_array(value, "enumerators")?.as_slice(),
        None => &[],
    };
    for value in enumerators {
        let entry = as_object(value, "enumerator")?;
        let enumerator_name = required_name(entry, "name", name)?;
        let value_text = match entry.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(ReadError::missing_attribute(FORMAT, &enumerator_name, "value")),
        };
        let value = EnumValue::parse(&value_text, backing).ok_or_else(|| {
            ReadError::invalid(
                FORMAT,
                format!("enumerator value '{value_text}' of '{name}' does not match its backing type"),
            )
        })?;
        let enumerator = enumeration
            .add_enumerator(&enumerator_name, value)
            .map_err(|e| ReadError::from_model(FORMAT, format!("enumeration '{name}'"), e))?;
        enumerator.display_label = str_field(entry, "label").map(str::to_string);
        enumerator.description = str_field(entry, "description").unwrap_or_default().to_string();
    }
    Ok(enumeration.into())
}

fn read_unit(name: &str, item_type: &str, obj: &Object) -> Result<SchemaItem, ReadError> {
    let required_ref = |key: &str| -> Result<ItemRef, ReadError> {
        Ok(raw_ref(required_str(obj, key, name)?, RefStyle::SchemaName))
    };
    let mut unit = match item_type {
        "InvertedUnit" => Unit::inverted(name, required_ref("invertsUnit")?, required_ref("unitSystem")?),
        "Constant" => {
            let mut constant = Unit::constant(
                name,
                required_ref("phenomenon")?,
                required_str(obj, "definition", name)?,
                f64_field(obj, "numerator").unwrap_or(1.0),
            );
            constant.denominator = f64_field(obj, "denominator");
            constant
        }
        _ => {
            let mut unit = Unit::new(
                name,
                required_ref("phenomenon")?,
                required_ref("unitSystem")?,
                required_str(obj, "definition", name)?,
            );
            unit.numerator = f64_field(obj, "numerator");
            unit.denominator = f64_field(obj, "denominator");
            unit.offset = f64_field(obj, "offset");
            unit
        }
    };
    read_info(&mut unit.info, obj);
    Ok(unit.into())
}

fn read_format(name: &str, obj: &Object) -> Result<SchemaItem, ReadError> {
    let type_text = required_str(obj, "type", name)?;
    let format_type = FormatType::parse(type_text)
        .ok_or_else(|| ReadError::invalid(FORMAT, format!("format '{name}' has unknown type '{type_text}'")))?;
    let mut format = Format::new(name, format_type);
    read_info(&mut format.info, obj);
    format.precision = u32_field(obj, "precision");
    format.round_factor = f64_field(obj, "roundFactor");
    format.min_width = u32_field(obj, "minWidth");
    format.show_sign_option = str_field(obj, "showSignOption").map(str::to_string);
    format.format_traits = string_list(obj, "formatTraits");
    format.decimal_separator = str_field(obj, "decimalSeparator").map(str::to_string);
    format.thousand_separator = str_field(obj, "thousandSeparator").map(str::to_string);
    format.uom_separator = str_field(obj, "uomSeparator").map(str::to_string);
    format.scientific_type = str_field(obj, "scientificType").map(str::to_string);
    format.station_offset_size = u32_field(obj, "stationOffsetSize");
    format.station_separator = str_field(obj, "stationSeparator").map(str::to_string);

    if let Some(composite) = obj.get("composite") {
        let composite = as_object(composite, "composite")?;
        let mut units = Vec::new();
        if let Some(list) = composite.get("units") {
            for entry in as_array(list, "composite units")? {
                let entry = as_object(entry, "composite unit")?;
                units.push(UnitLabel {
                    unit: raw_ref(required_str(entry, "name", name)?, RefStyle::SchemaName),
                    label: str_field(entry, "label").map(str::to_string),
                });
            }
        }
        format.composite = Some(CompositeSpec {
            spacer: str_field(composite, "spacer").map(str::to_string),
            include_zero: composite.get("includeZero").and_then(Value::as_bool),
            units,
        });
    }
    Ok(format.into())
}

// ============================================================================
// CUSTOM ATTRIBUTES
// ============================================================================

/// Instances are objects with a `className` of `Schema.Class`; every other
/// member is a property value.
fn read_custom_attributes(value: &Value, owner: &str) -> Result<CustomAttributes, ReadError> {
    let mut attributes = CustomAttributes::new();
    for instance in as_array(value, "customAttributes")? {
        let instance = as_object(instance, "custom attribute")?;
        let class_name = required_str(instance, "className", owner)?;
        let mut attribute = CustomAttribute::new(raw_ref(class_name, RefStyle::SchemaName));
        for (member, value) in instance {
            if member == "className" {
                continue;
            }
            if let Some(v) = instance_value(value) {
                attribute.values.insert(member.clone(), v);
            }
        }
        attributes.set(attribute);
    }
    Ok(attributes)
}

fn instance_value(value: &Value) -> Option<InstanceValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(InstanceValue::Primitive(b.to_string())),
        Value::Number(n) => Some(InstanceValue::Primitive(n.to_string())),
        Value::String(s) => Some(InstanceValue::Primitive(s.clone())),
        Value::Array(members) => Some(InstanceValue::Array(
            members
                .iter()
                .filter_map(instance_value)
                .map(|v| (String::new(), v))
                .collect(),
        )),
        Value::Object(map) => Some(InstanceValue::Struct(
            map.iter()
                .filter_map(|(k, v)| instance_value(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
    }
}

// ============================================================================
// VALUE HELPERS
// ============================================================================

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Object, ReadError> {
    value
        .as_object()
        .ok_or_else(|| ReadError::invalid(FORMAT, format!("{what} must be an object")))
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, ReadError> {
    value
        .as_array()
        .ok_or_else(|| ReadError::invalid(FORMAT, format!("{what} must be an array")))
}

fn str_field<'a>(obj: &'a Object, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn non_empty_str<'a>(obj: &'a Object, key: &str) -> Option<&'a str> {
    str_field(obj, key).filter(|s| !s.trim().is_empty())
}

fn required_str<'a>(obj: &'a Object, key: &str, owner: &str) -> Result<&'a str, ReadError> {
    str_field(obj, key).ok_or_else(|| ReadError::missing_attribute(FORMAT, owner, key))
}

fn required_name(obj: &Object, key: &str, owner: &str) -> Result<String, ReadError> {
    let name = required_str(obj, key, owner)?.trim();
    if name.is_empty() {
        return Err(ReadError::invalid(FORMAT, format!("{owner} has an empty {key}")));
    }
    Ok(name.to_string())
}

fn read_info(info: &mut ItemInfo, obj: &Object) {
    info.display_label = str_field(obj, "label").map(str::to_string);
    info.description = str_field(obj, "description").unwrap_or_default().to_string();
}

/// A list given either as a JSON array of strings or as one `;`-separated string.
fn string_list(obj: &Object, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(text)) => text
            .split(';')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn f64_field(obj: &Object, key: &str) -> Option<f64> {
    let value = obj.get(key)?;
    let parsed = value.as_f64();
    if parsed.is_none() && !value.is_null() {
        warn!(key, value = %value, "ignoring non-numeric value");
    }
    parsed
}

fn u32_field(obj: &Object, key: &str) -> Option<u32> {
    let value = obj.get(key)?;
    let parsed = value.as_u64().and_then(|n| u32::try_from(n).ok());
    if parsed.is_none() && !value.is_null() {
        warn!(key, value = %value, "ignoring value that is not a non-negative integer");
    }
    parsed
}

fn i32_field(obj: &Object, key: &str) -> Option<i32> {
    let value = obj.get(key)?;
    let parsed = value.as_i64().and_then(|n| i32::try_from(n).ok());
    if parsed.is_none() && !value.is_null() {
        warn!(key, value = %value, "ignoring non-integer value");
    }
    parsed
}
