//! Property conflict resolution through document reads.
//!
//! A derived class redeclaring an inherited property with an incompatible
//! type is renamed to `<alias>_<name>_` when the read context resolves
//! conflicts, and rejected otherwise.

use ecschema::schema::standard::CONVERSION_SCHEMA_NAME;
use ecschema::schema::{PrimitiveType, PropertyRename};
use ecschema::{EcError, EcProperty, ReadContext, ReadError, Schema};
use rstest::rstest;

const EC2: &str = "http://www.bentley.com/schemas/Bentley.ECXML.2.0";
const EC32: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.2";

fn legacy_document(base_first: bool) -> String {
    let a = r#"<ECClass typeName="A" isDomainClass="True">
            <ECProperty propertyName="Color" typeName="int"/>
        </ECClass>"#;
    let b = r#"<ECClass typeName="B" isDomainClass="True">
            <BaseClass>A</BaseClass>
            <ECProperty propertyName="Color" typeName="string"/>
        </ECClass>"#;
    let (first, second) = if base_first { (a, b) } else { (b, a) };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ECSchema schemaName="testSchema" nameSpacePrefix="ts" version="01.00" xmlns="{EC2}">
    {first}
    {second}
</ECSchema>"#
    )
}

// ============================================================================
// Document reads
// ============================================================================

#[rstest]
#[case::base_declared_first(true)]
#[case::derived_declared_first(false)]
fn test_incompatible_override_is_renamed(#[case] base_first: bool) {
    let mut ctx = ReadContext::new().with_resolve_conflicts(true);
    let schema = ctx.read_xml_string(&legacy_document(base_first)).unwrap();

    assert_eq!(schema.property_count("A", true), 1);
    assert_eq!(schema.property_count("B", true), 2);

    let renamed = schema.find_property("B", "ts_Color_", false).unwrap();
    assert_eq!(renamed.primitive_type(), Some(PrimitiveType::String));
    let original = schema.find_property("A", "Color", false).unwrap();
    assert_eq!(original.primitive_type(), Some(PrimitiveType::Integer));

    assert_eq!(
        schema.renamed_properties("B"),
        vec![PropertyRename {
            old_name: "Color".into(),
            new_name: "ts_Color_".into(),
        }]
    );
    assert!(schema.get_referenced_schema(CONVERSION_SCHEMA_NAME).is_some());
}

#[test]
fn test_declaration_order_does_not_change_result() {
    let mut ctx = ReadContext::new().with_resolve_conflicts(true);
    let first = ctx.read_xml_string(&legacy_document(true)).unwrap();
    let mut ctx = ReadContext::new().with_resolve_conflicts(true);
    let second = ctx.read_xml_string(&legacy_document(false)).unwrap();

    let names = |s: &Schema, class: &str| -> Vec<String> {
        let mut names: Vec<String> = s.all_properties(class).iter().map(|p| p.name().to_string()).collect();
        names.sort();
        names
    };
    assert_eq!(names(&first, "B"), names(&second, "B"));
    assert_eq!(first.renamed_properties("B"), second.renamed_properties("B"));
}

fn rename(old: &str, new: &str) -> PropertyRename {
    PropertyRename {
        old_name: old.into(),
        new_name: new.into(),
    }
}

#[test]
fn test_second_base_conflict_renames_earlier_base() {
    let xml = format!(
        r#"<ECSchema schemaName="testSchema" alias="ts" version="01.00.00" xmlns="{EC32}">
    <ECEntityClass typeName="Fruit">
        <ECProperty propertyName="Color" typeName="int"/>
    </ECEntityClass>
    <ECEntityClass typeName="Food">
        <ECProperty propertyName="Color" typeName="string"/>
    </ECEntityClass>
    <ECEntityClass typeName="Apple">
        <BaseClass>Fruit</BaseClass>
        <BaseClass>Food</BaseClass>
        <ECProperty propertyName="Color" typeName="double"/>
    </ECEntityClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new().with_resolve_conflicts(true);
    let schema = ctx.read_xml_string(&xml).unwrap();

    let fruit = schema.get_class("Fruit").unwrap();
    assert!(fruit.local_property("Color").is_none());
    let fruit_color = fruit.local_property("ts_Color_").unwrap();
    assert_eq!(fruit_color.primitive_type(), Some(PrimitiveType::Integer));

    let food_color = schema.find_property("Food", "Color", false).unwrap();
    assert_eq!(food_color.primitive_type(), Some(PrimitiveType::String));

    let apple = schema.get_class("Apple").unwrap();
    let apple_color = apple.local_property("ts_Color__").unwrap();
    assert_eq!(apple_color.primitive_type(), Some(PrimitiveType::Double));
    assert_eq!(schema.property_count("Apple", true), 3);

    assert_eq!(schema.renamed_properties("Fruit"), vec![rename("Color", "ts_Color_")]);
    assert!(schema.renamed_properties("Food").is_empty());
    assert_eq!(schema.renamed_properties("Apple"), vec![rename("Color", "ts_Color__")]);
}

#[test]
fn test_renamed_name_clash_escalates_in_derived_class() {
    let xml = format!(
        r#"<ECSchema schemaName="testSchema" alias="ts" version="01.00.00" xmlns="{EC32}">
    <ECEntityClass typeName="Fruit">
        <ECProperty propertyName="Color" typeName="int"/>
    </ECEntityClass>
    <ECEntityClass typeName="Apple">
        <BaseClass>Fruit</BaseClass>
        <ECProperty propertyName="Color" typeName="string"/>
    </ECEntityClass>
    <ECEntityClass typeName="Gala">
        <BaseClass>Apple</BaseClass>
        <ECProperty propertyName="ts_Color_" typeName="double"/>
    </ECEntityClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new().with_resolve_conflicts(true);
    let schema = ctx.read_xml_string(&xml).unwrap();

    let fruit_color = schema.find_property("Fruit", "Color", false).unwrap();
    assert_eq!(fruit_color.primitive_type(), Some(PrimitiveType::Integer));
    let apple_color = schema.find_property("Apple", "ts_Color_", false).unwrap();
    assert_eq!(apple_color.primitive_type(), Some(PrimitiveType::String));
    let gala = schema.get_class("Gala").unwrap();
    assert!(gala.local_property("ts_Color_").is_none());
    let gala_color = gala.local_property("ts_ts_Color__").unwrap();
    assert_eq!(gala_color.primitive_type(), Some(PrimitiveType::Double));
    assert_eq!(schema.property_count("Gala", true), 3);

    assert_eq!(schema.renamed_properties("Apple"), vec![rename("Color", "ts_Color_")]);
    assert_eq!(schema.renamed_properties("Gala"), vec![rename("ts_Color_", "ts_ts_Color__")]);
}

#[test]
fn test_conflict_without_resolution_fails_read() {
    let xml = format!(
        r#"<ECSchema schemaName="testSchema" alias="ts" version="01.00.00" xmlns="{EC32}">
    <ECEntityClass typeName="A">
        <ECProperty propertyName="Color" typeName="int"/>
    </ECEntityClass>
    <ECEntityClass typeName="B">
        <BaseClass>A</BaseClass>
        <ECProperty propertyName="Color" typeName="string"/>
    </ECEntityClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let result = ctx.read_xml_string(&xml);
    assert!(matches!(result, Err(ReadError::InvalidECSchemaXml(_))));
    assert_eq!(ctx.cached_schemas().count(), 0);
}

#[test]
fn test_case_only_override_in_legacy_document_adopts_base_casing() {
    let xml = format!(
        r#"<ECSchema schemaName="Legacy" nameSpacePrefix="lg" version="01.00" xmlns="{EC2}">
    <ECClass typeName="A" isDomainClass="True">
        <ECProperty propertyName="Color" typeName="int"/>
    </ECClass>
    <ECClass typeName="B" isDomainClass="True">
        <BaseClass>A</BaseClass>
        <ECProperty propertyName="COLOR" typeName="int"/>
    </ECClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let schema = ctx.read_xml_string(&xml).unwrap();
    let class = schema.get_class("B").unwrap();
    assert_eq!(class.local_property("color").unwrap().name(), "Color");
    assert_eq!(schema.property_count("B", true), 1);
}

// ============================================================================
// Programmatic edits
// ============================================================================

#[test]
fn test_failed_property_creation_leaves_no_property() {
    let mut schema = Schema::create("testSchema", "ts", 1, 0, 0).unwrap();
    schema.create_entity_class("A").unwrap();
    schema
        .add_property("A", EcProperty::primitive("Color", PrimitiveType::Integer), false)
        .unwrap();
    schema.create_entity_class("B").unwrap();
    let a = schema.item_ref("A");
    schema.add_base_class("B", &a, false).unwrap();

    let result = schema.add_property("B", EcProperty::primitive("Color", PrimitiveType::String), false);
    assert!(matches!(result, Err(EcError::DataTypeMismatch(_))));
    assert!(schema.get_class("B").unwrap().local_property("Color").is_none());
    assert_eq!(schema.property_count("B", true), 1);
}

#[test]
fn test_renamed_property_survives_round_trip() {
    let mut ctx = ReadContext::new().with_resolve_conflicts(true);
    let schema = ctx.read_xml_string(&legacy_document(true)).unwrap();
    let xml = schema.write_xml_string(&Default::default()).unwrap();

    let mut ctx = ReadContext::new();
    let reread = ctx.read_xml_string(&xml).unwrap();
    assert!(reread.find_property("B", "ts_Color_", false).is_some());
    assert_eq!(reread.renamed_properties("B").len(), 1);
}
