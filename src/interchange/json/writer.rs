//! ECSchema JSON writer.
//!
//! References are written as `Schema.Item`, local ones included. Custom
//! attribute values are typed by the custom attribute class that defines them.

use serde_json::{Map, Value, json};

use crate::base::{EcVersion, ItemRef};
use crate::interchange::{WriteError, WriteOptions};
use crate::schema::{
    ArrayBounds, ClassModifier, ClassType, CustomAttributes, EcClass, EcProperty, EnumValue, Enumeration, Format,
    InstanceValue, ItemInfo, KindOfQuantity, PrimitiveType, PrimitiveTypeRef, PropertyKind, RelationshipConstraint,
    Schema, SchemaItem, Unit, UnitKind,
};

/// `$schema` URI of the documents this writer produces.
pub const ECSCHEMA_JSON_URI: &str = "https://dev.bentley.com/json_schemas/ec/32/ecschema";

type Object = Map<String, Value>;

pub(crate) fn write_document(schema: &Schema, options: &WriteOptions) -> Result<Vec<u8>, WriteError> {
    if options.ec_version != EcVersion::V3_2 {
        return Err(WriteError::Unsupported(format!(
            "JSON documents are written as EC 3.2, not {}",
            options.ec_version
        )));
    }
    let value = schema_to_json(schema);
    let mut bytes =
        serde_json::to_vec_pretty(&value).map_err(|e| WriteError::json(format!("Serialization error: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn schema_to_json(schema: &Schema) -> Value {
    let mut obj = Object::new();
    put(&mut obj, "$schema", ECSCHEMA_JSON_URI);
    put(&mut obj, "name", schema.name());
    put(&mut obj, "version", schema.version().to_string());
    put(&mut obj, "alias", schema.alias());
    put_info(&mut obj, schema.info());

    let references: Vec<Value> = schema
        .reference_entries()
        .map(|r| json!({ "name": r.schema.name(), "version": r.schema.version().to_string() }))
        .collect();
    if !references.is_empty() {
        put(&mut obj, "references", references);
    }
    put_custom_attributes(&mut obj, schema, &schema.custom_attributes);

    let mut items = Object::new();
    for item in schema.items_in_write_order() {
        items.insert(item.name().to_string(), item_to_json(schema, item));
    }
    if !items.is_empty() {
        put(&mut obj, "items", items);
    }
    Value::Object(obj)
}

fn full_name(r: &ItemRef) -> String {
    format!("{}.{}", r.schema, r.name)
}

fn item_to_json(schema: &Schema, item: &SchemaItem) -> Value {
    let mut obj = Object::new();
    match item {
        SchemaItem::Class(class) => class_to_json(&mut obj, schema, class),
        SchemaItem::Enumeration(e) => enumeration_to_json(&mut obj, e),
        SchemaItem::KindOfQuantity(koq) => koq_to_json(&mut obj, koq),
        SchemaItem::PropertyCategory(category) => {
            put(&mut obj, "schemaItemType", "PropertyCategory");
            put_info(&mut obj, &category.info);
            put(&mut obj, "priority", category.priority);
        }
        SchemaItem::UnitSystem(system) => {
            put(&mut obj, "schemaItemType", "UnitSystem");
            put_info(&mut obj, &system.info);
        }
        SchemaItem::Phenomenon(phenomenon) => {
            put(&mut obj, "schemaItemType", "Phenomenon");
            put_info(&mut obj, &phenomenon.info);
            put(&mut obj, "definition", phenomenon.definition.as_str());
        }
        SchemaItem::Unit(unit) => unit_to_json(&mut obj, unit),
        SchemaItem::Format(format) => format_to_json(&mut obj, format),
    }
    Value::Object(obj)
}

// ============================================================================
// CLASSES
// ============================================================================

fn class_to_json(obj: &mut Object, schema: &Schema, class: &EcClass) {
    let item_type = match &class.class_type {
        ClassType::Entity => "EntityClass",
        ClassType::Mixin { .. } => "Mixin",
        ClassType::Struct => "StructClass",
        ClassType::CustomAttribute { .. } => "CustomAttributeClass",
        ClassType::Relationship(_) => "RelationshipClass",
    };
    put(obj, "schemaItemType", item_type);
    if class.modifier != ClassModifier::None && !class.is_mixin() {
        put(obj, "modifier", class.modifier.as_str());
    }
    put_info(obj, &class.info);

    let mut bases = class.base_classes().iter();
    if let Some(first) = bases.next() {
        put(obj, "baseClass", full_name(first));
    }
    let mixins: Vec<String> = bases.map(full_name).collect();
    if !mixins.is_empty() {
        put(obj, "mixins", mixins);
    }

    match &class.class_type {
        ClassType::Mixin { applies_to } => put_opt(obj, "appliesTo", applies_to.as_ref().map(full_name)),
        ClassType::CustomAttribute { applies_to } => put_opt(obj, "appliesTo", applies_to.clone()),
        ClassType::Relationship(rel) => {
            put(obj, "strength", rel.strength.as_str());
            put(obj, "strengthDirection", rel.direction.as_str());
            put(obj, "source", constraint_to_json(schema, &rel.source));
            put(obj, "target", constraint_to_json(schema, &rel.target));
        }
        ClassType::Entity | ClassType::Struct => {}
    }

    let properties: Vec<Value> = class.properties().map(|p| property_to_json(schema, p)).collect();
    if !properties.is_empty() {
        put(obj, "properties", properties);
    }
    put_custom_attributes(obj, schema, &class.custom_attributes);
}

fn constraint_to_json(schema: &Schema, constraint: &RelationshipConstraint) -> Value {
    let mut obj = Object::new();
    put(&mut obj, "multiplicity", constraint.multiplicity.to_string());
    put(&mut obj, "roleLabel", constraint.role_label.as_str());
    put(&mut obj, "polymorphic", constraint.is_polymorphic);
    put_opt(&mut obj, "abstractConstraint", constraint.abstract_constraint.as_ref().map(full_name));
    let classes: Vec<String> = constraint.constraint_classes.iter().map(full_name).collect();
    put(&mut obj, "constraintClasses", classes);
    put_custom_attributes(&mut obj, schema, &constraint.custom_attributes);
    Value::Object(obj)
}

fn property_to_json(schema: &Schema, property: &EcProperty) -> Value {
    let mut obj = Object::new();
    put(&mut obj, "name", property.name());
    match &property.kind {
        PropertyKind::Primitive { ty } => {
            put(&mut obj, "type", "PrimitiveProperty");
            put(&mut obj, "typeName", type_name(ty));
        }
        PropertyKind::PrimitiveArray { ty, bounds } => {
            put(&mut obj, "type", "PrimitiveArrayProperty");
            put(&mut obj, "typeName", type_name(ty));
            put_bounds(&mut obj, bounds);
        }
        PropertyKind::Struct { struct_class } => {
            put(&mut obj, "type", "StructProperty");
            put(&mut obj, "typeName", full_name(struct_class));
        }
        PropertyKind::StructArray { struct_class, bounds } => {
            put(&mut obj, "type", "StructArrayProperty");
            put(&mut obj, "typeName", full_name(struct_class));
            put_bounds(&mut obj, bounds);
        }
        PropertyKind::Navigation { relationship, direction } => {
            put(&mut obj, "type", "NavigationProperty");
            put(&mut obj, "relationshipName", full_name(relationship));
            put(&mut obj, "direction", direction.as_str());
        }
    }
    put_opt(&mut obj, "label", property.display_label.clone());
    if !property.description.is_empty() {
        put(&mut obj, "description", property.description.as_str());
    }
    if property.is_readonly {
        put(&mut obj, "isReadOnly", true);
    }
    if property.priority != 0 {
        put(&mut obj, "priority", property.priority);
    }
    put_opt(&mut obj, "category", property.category.as_ref().map(full_name));
    put_opt(&mut obj, "kindOfQuantity", property.kind_of_quantity.as_ref().map(full_name));
    put_opt(&mut obj, "extendedTypeName", property.extended_type.clone());
    put_opt(&mut obj, "minLength", property.min_length);
    put_opt(&mut obj, "maxLength", property.max_length);
    put_opt(&mut obj, "minValue", property.min_value);
    put_opt(&mut obj, "maxValue", property.max_value);
    put_custom_attributes(&mut obj, schema, &property.custom_attributes);
    Value::Object(obj)
}

fn type_name(ty: &PrimitiveTypeRef) -> String {
    match ty {
        PrimitiveTypeRef::Primitive(p) => p.type_name().to_string(),
        PrimitiveTypeRef::Enumeration(r) => full_name(r),
    }
}

fn put_bounds(obj: &mut Object, bounds: &ArrayBounds) {
    put(obj, "minOccurs", bounds.min_occurs);
    put_opt(obj, "maxOccurs", bounds.max_occurs);
}

// ============================================================================
// OTHER ITEMS
// ============================================================================

fn enumeration_to_json(obj: &mut Object, enumeration: &Enumeration) {
    put(obj, "schemaItemType", "Enumeration");
    put_info(obj, &enumeration.info);
    put(obj, "type", enumeration.backing_type.primitive().type_name());
    put(obj, "isStrict", enumeration.is_strict);
    let enumerators: Vec<Value> = enumeration
        .enumerators()
        .iter()
        .map(|e| {
            let mut entry = Object::new();
            put(&mut entry, "name", e.name());
            let value = match &e.value {
                EnumValue::Integer(i) => json!(i),
                EnumValue::String(s) => json!(s),
            };
            entry.insert("value".to_string(), value);
            put_opt(&mut entry, "label", e.display_label.clone());
            if !e.description.is_empty() {
                put(&mut entry, "description", e.description.as_str());
            }
            Value::Object(entry)
        })
        .collect();
    put(obj, "enumerators", enumerators);
}

fn koq_to_json(obj: &mut Object, koq: &KindOfQuantity) {
    put(obj, "schemaItemType", "KindOfQuantity");
    put_info(obj, &koq.info);
    put(obj, "relativeError", koq.relative_error);
    put_opt(obj, "persistenceUnit", koq.persistence_unit.as_ref().map(full_name));
    let formats: Vec<String> = koq.presentation_formats.iter().map(|f| f.to_full_name_string()).collect();
    if !formats.is_empty() {
        put(obj, "presentationUnits", formats);
    }
}

fn unit_to_json(obj: &mut Object, unit: &Unit) {
    let item_type = match unit.kind {
        UnitKind::Regular => "Unit",
        UnitKind::Constant => "Constant",
        UnitKind::Inverted { .. } => "InvertedUnit",
    };
    put(obj, "schemaItemType", item_type);
    put_info(obj, &unit.info);
    put_opt(obj, "invertsUnit", unit.inverts().map(full_name));
    put_opt(obj, "phenomenon", unit.phenomenon.as_ref().map(full_name));
    put_opt(obj, "unitSystem", unit.unit_system.as_ref().map(full_name));
    put_opt(obj, "definition", unit.definition.clone());
    put_opt(obj, "numerator", unit.numerator);
    put_opt(obj, "denominator", unit.denominator);
    put_opt(obj, "offset", unit.offset);
}

fn format_to_json(obj: &mut Object, format: &Format) {
    put(obj, "schemaItemType", "Format");
    put_info(obj, &format.info);
    put(obj, "type", format.format_type.as_str());
    put_opt(obj, "precision", format.precision);
    put_opt(obj, "roundFactor", format.round_factor);
    put_opt(obj, "minWidth", format.min_width);
    put_opt(obj, "showSignOption", format.show_sign_option.clone());
    if !format.format_traits.is_empty() {
        put(obj, "formatTraits", format.format_traits.clone());
    }
    put_opt(obj, "decimalSeparator", format.decimal_separator.clone());
    put_opt(obj, "thousandSeparator", format.thousand_separator.clone());
    put_opt(obj, "uomSeparator", format.uom_separator.clone());
    put_opt(obj, "scientificType", format.scientific_type.clone());
    put_opt(obj, "stationOffsetSize", format.station_offset_size);
    put_opt(obj, "stationSeparator", format.station_separator.clone());
    if let Some(composite) = &format.composite {
        let mut c = Object::new();
        put_opt(&mut c, "spacer", composite.spacer.clone());
        put_opt(&mut c, "includeZero", composite.include_zero);
        let units: Vec<Value> = composite
            .units
            .iter()
            .map(|u| {
                let mut entry = Object::new();
                put(&mut entry, "name", full_name(&u.unit));
                put_opt(&mut entry, "label", u.label.clone());
                Value::Object(entry)
            })
            .collect();
        put(&mut c, "units", units);
        put(obj, "composite", c);
    }
}

// ============================================================================
// CUSTOM ATTRIBUTES
// ============================================================================

fn put_custom_attributes(obj: &mut Object, schema: &Schema, cas: &CustomAttributes) {
    if cas.is_empty() {
        return;
    }
    let instances: Vec<Value> = cas
        .iter()
        .map(|ca| {
            let mut instance = Object::new();
            put(&mut instance, "className", full_name(&ca.class));
            let definition = schema.resolve_class_with_owner(&ca.class);
            for (name, value) in &ca.values {
                let typed = match definition {
                    Some((owner, class)) => member_value(owner, class, name, value),
                    None => untyped_value(value),
                };
                instance.insert(name.clone(), typed);
            }
            Value::Object(instance)
        })
        .collect();
    put(obj, "customAttributes", instances);
}

fn member_value(owner: &Schema, class: &EcClass, member: &str, value: &InstanceValue) -> Value {
    match owner.find_property(class.name(), member, true) {
        Some(property) => typed_value(owner, &property.kind, value),
        None => untyped_value(value),
    }
}

/// Array members recurse with the array's own kind, so their primitive or
/// struct element type applies to each member.
fn typed_value(owner: &Schema, kind: &PropertyKind, value: &InstanceValue) -> Value {
    match (kind, value) {
        (
            PropertyKind::Primitive { ty } | PropertyKind::PrimitiveArray { ty, .. },
            InstanceValue::Primitive(text),
        ) => primitive_value(owner, ty, text),
        (
            PropertyKind::PrimitiveArray { .. } | PropertyKind::StructArray { .. },
            InstanceValue::Array(members),
        ) => Value::Array(members.iter().map(|(_, m)| typed_value(owner, kind, m)).collect()),
        (
            PropertyKind::Struct { struct_class } | PropertyKind::StructArray { struct_class, .. },
            InstanceValue::Struct(map),
        ) => {
            let definition = owner.resolve_class_with_owner(struct_class);
            let mut obj = Object::new();
            for (name, member) in map {
                let typed = match definition {
                    Some((schema, class)) => member_value(schema, class, name, member),
                    None => untyped_value(member),
                };
                obj.insert(name.clone(), typed);
            }
            Value::Object(obj)
        }
        _ => untyped_value(value),
    }
}

fn primitive_value(owner: &Schema, ty: &PrimitiveTypeRef, text: &str) -> Value {
    let primitive = match ty {
        PrimitiveTypeRef::Primitive(p) => *p,
        PrimitiveTypeRef::Enumeration(r) => owner
            .resolve::<Enumeration>(r)
            .map_or(PrimitiveType::String, |e| e.backing_type.primitive()),
    };
    let trimmed = text.trim();
    let typed = match primitive {
        PrimitiveType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        PrimitiveType::Integer | PrimitiveType::Long => trimmed.parse::<i64>().ok().map(Value::from),
        PrimitiveType::Double => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        _ => None,
    };
    typed.unwrap_or_else(|| Value::String(text.to_string()))
}

fn untyped_value(value: &InstanceValue) -> Value {
    match value {
        InstanceValue::Primitive(text) => Value::String(text.clone()),
        InstanceValue::Array(members) => Value::Array(members.iter().map(|(_, m)| untyped_value(m)).collect()),
        InstanceValue::Struct(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), untyped_value(v))).collect()),
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn put(obj: &mut Object, key: &str, value: impl Into<Value>) {
    obj.insert(key.to_string(), value.into());
}

fn put_opt<T: Into<Value>>(obj: &mut Object, key: &str, value: Option<T>) {
    if let Some(value) = value {
        put(obj, key, value);
    }
}

fn put_info(obj: &mut Object, info: &ItemInfo) {
    put_opt(obj, "label", info.display_label.clone());
    if !info.description.is_empty() {
        put(obj, "description", info.description.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CustomAttribute, EnumBackingType};

    fn write(schema: &Schema) -> Value {
        let bytes = write_document(schema, &WriteOptions::default()).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_write_classes_and_references_as_full_names() {
        let mut schema = Schema::create("Test", "ts", 1, 0, 0).unwrap();
        schema.create_entity_class("Base").unwrap();
        schema.create_entity_class("Derived").unwrap();
        schema.add_base_class("Derived", &schema.item_ref("Base"), false).unwrap();
        schema
            .create_enumeration("Color", EnumBackingType::Integer)
            .unwrap()
            .add_enumerator("Red", EnumValue::Integer(1))
            .unwrap();

        let doc = write(&schema);
        assert_eq!(doc["$schema"], ECSCHEMA_JSON_URI);
        assert_eq!(doc["alias"], "ts");
        assert_eq!(doc["items"]["Derived"]["baseClass"], "Test.Base");
        assert_eq!(doc["items"]["Color"]["type"], "int");
        assert_eq!(doc["items"]["Color"]["enumerators"][0]["value"], 1);
    }

    #[test]
    fn test_custom_attribute_values_are_typed() {
        let mut schema = Schema::create("Test", "ts", 1, 0, 0).unwrap();
        schema.create_custom_attribute_class("Settings").unwrap();
        for property in [
            EcProperty::primitive("Enabled", PrimitiveType::Boolean),
            EcProperty::primitive("Count", PrimitiveType::Integer),
            EcProperty::primitive_array("Names", PrimitiveType::String),
        ] {
            schema.add_property("Settings", property, false).unwrap();
        }
        let ca = CustomAttribute::new(schema.item_ref("Settings"))
            .with_value("Enabled", "True")
            .with_value("Count", "3")
            .with_value(
                "Names",
                InstanceValue::Array(vec![("string".into(), "a".into()), ("string".into(), "b".into())]),
            )
            .with_value("Unknown", "x");
        schema.set_schema_custom_attribute(ca).unwrap();

        let doc = write(&schema);
        let instance = &doc["customAttributes"][0];
        assert_eq!(instance["className"], "Test.Settings");
        assert_eq!(instance["Enabled"], true);
        assert_eq!(instance["Count"], 3);
        assert_eq!(instance["Names"], json!(["a", "b"]));
        assert_eq!(instance["Unknown"], "x");
    }

    #[test]
    fn test_only_latest_version_is_written() {
        let schema = Schema::create("Test", "ts", 1, 0, 0).unwrap();
        let result = write_document(&schema, &WriteOptions::new(EcVersion::V3_1));
        assert!(matches!(result, Err(WriteError::Unsupported(_))));
    }
}
