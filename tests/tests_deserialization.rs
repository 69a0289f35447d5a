//! Document reads: outcome codes, version conversion and JSON input.

use ecschema::schema::{ClassModifier, EnumValue, InstanceValue, Multiplicity, PrimitiveType, PrimitiveTypeRef};
use ecschema::{EcVersion, ItemRef, ReadContext, ReadError, ReadStatus, Schema};
use rstest::rstest;

const EC2: &str = "http://www.bentley.com/schemas/Bentley.ECXML.2.0";
const EC30: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.0";
const EC31: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.1";
const EC32: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.2";

fn read_status(xml: &str) -> ReadStatus {
    let mut ctx = ReadContext::new();
    ReadStatus::from(&ctx.read_xml_string(xml))
}

// ============================================================================
// Outcome codes
// ============================================================================

#[rstest]
#[case::valid(
    format!(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0" xmlns="{EC32}"><ECEntityClass typeName="A"/></ECSchema>"#),
    ReadStatus::Success
)]
#[case::malformed(
    format!(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0" xmlns="{EC32}"><ECEntityClass typeName="A"></ECSchema>"#),
    ReadStatus::FailedToParseXml
)]
#[case::missing_alias(
    format!(r#"<ECSchema schemaName="T" version="1.0.0" xmlns="{EC32}"/>"#),
    ReadStatus::InvalidECSchemaXml
)]
#[case::empty_type_name(
    format!(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0" xmlns="{EC32}"><ECEntityClass typeName=""/></ECSchema>"#),
    ReadStatus::InvalidECSchemaXml
)]
#[case::unresolved_base_class(
    format!(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0" xmlns="{EC32}">
        <ECEntityClass typeName="A"><BaseClass>Missing</BaseClass></ECEntityClass>
    </ECSchema>"#),
    ReadStatus::InvalidECSchemaXml
)]
#[case::duplicate_type_name(
    format!(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0" xmlns="{EC32}">
        <ECEntityClass typeName="A"/><ECStructClass typeName="a"/>
    </ECSchema>"#),
    ReadStatus::DuplicateTypeName
)]
#[case::missing_reference(
    format!(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0" xmlns="{EC32}">
        <ECSchemaReference name="Nowhere" version="01.00.00" alias="nw"/>
    </ECSchema>"#),
    ReadStatus::ReferencedSchemaNotFound
)]
fn test_read_status(#[case] xml: String, #[case] expected: ReadStatus) {
    assert_eq!(read_status(&xml), expected);
}

#[test]
fn test_same_schema_twice_is_duplicate() {
    let xml = format!(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0" xmlns="{EC32}"/>"#);
    let mut ctx = ReadContext::new();
    ctx.read_xml_string(&xml).unwrap();
    let second = ctx.read_xml_string(&xml);
    assert_eq!(ReadStatus::from(&second), ReadStatus::DuplicateSchema);
}

#[test]
fn test_legacy_duplicate_type_name_keeps_later_definition() {
    let xml = format!(
        r#"<ECSchema schemaName="Old" nameSpacePrefix="o" version="01.00" xmlns="{EC2}">
    <ECClass typeName="A" isDomainClass="True" description="first"/>
    <ECClass typeName="A" isDomainClass="True" description="second"/>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let schema = ctx.read_xml_string(&xml).unwrap();
    assert_eq!(schema.class_count(), 1);
    assert_eq!(schema.get_class("A").unwrap().info.description, "second");
}

// ============================================================================
// Version conversion
// ============================================================================

#[test]
fn test_legacy_relationship_is_normalized() {
    let xml = format!(
        r#"<ECSchema schemaName="Old" nameSpacePrefix="o" version="01.00" xmlns="{EC2}">
    <ECClass typeName="Base" isDomainClass="False"/>
    <ECClass typeName="Pipe" isDomainClass="True"><BaseClass>Base</BaseClass></ECClass>
    <ECClass typeName="Valve" isDomainClass="True"><BaseClass>Base</BaseClass></ECClass>
    <ECRelationshipClass typeName="Connects" isDomainClass="True" displayLabel="Connects To">
        <Source cardinality="(1,1)" polymorphic="True"><Class class="Pipe"/></Source>
        <Target cardinality="(0,N)" polymorphic="False"><Class class="Pipe"/><Class class="Valve"/></Target>
    </ECRelationshipClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let schema = ctx.read_xml_string(&xml).unwrap();

    assert_eq!(schema.original_ec_version, EcVersion::V2_0);
    assert_eq!(schema.get_class("Base").unwrap().modifier, ClassModifier::Abstract);
    let rel = schema.get_class("Connects").unwrap().relationship().unwrap();
    assert_eq!(rel.source.multiplicity, Multiplicity::ONE_ONE);
    assert_eq!(rel.target.multiplicity, Multiplicity::ZERO_MANY);
    assert!(!rel.target.is_polymorphic);
    assert_eq!(rel.source.role_label, "Connects To");
    assert_eq!(rel.target.role_label, "Connects To (Reversed)");
    assert_eq!(
        rel.target.effective_abstract_constraint(),
        Some(&ItemRef::new("Old", "Base"))
    );
}

#[test]
fn test_legacy_enumerators_are_named_from_values() {
    let xml = format!(
        r#"<ECSchema schemaName="Colors" alias="c" version="01.00.00" xmlns="{EC30}">
    <ECEnumeration typeName="Shade" backingTypeName="int">
        <ECEnumerator value="1" displayLabel="Light"/>
        <ECEnumerator value="2" displayLabel="Dark"/>
    </ECEnumeration>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let schema = ctx.read_xml_string(&xml).unwrap();
    let shade = schema.get_enumeration("Shade").unwrap();
    let names: Vec<_> = shade.enumerators().iter().map(|e| e.name().to_string()).collect();
    assert_eq!(names, vec!["Shade1", "Shade2"]);
    assert_eq!(shade.enumerators()[1].value, EnumValue::Integer(2));
}

#[test]
fn test_legacy_kind_of_quantity_units_are_found_by_name() {
    let units = format!(
        r#"<ECSchema schemaName="Units" alias="u" version="01.00.00" xmlns="{EC32}">
    <UnitSystem typeName="SI"/>
    <Phenomenon typeName="LENGTH" definition="LENGTH"/>
    <Unit typeName="M" phenomenon="LENGTH" unitSystem="SI" definition="M"/>
    <Unit typeName="FT" phenomenon="LENGTH" unitSystem="SI" definition="0.3048*M"/>
    <Format typeName="DefaultRealU" type="decimal" precision="6" formatTraits="keepSingleZero|showUnitLabel"/>
</ECSchema>"#
    );
    let koq = format!(
        r#"<ECSchema schemaName="Quantities" alias="q" version="01.00.00" xmlns="{EC31}">
    <ECSchemaReference name="Units" version="01.00.00" alias="u"/>
    <KindOfQuantity typeName="Length" persistenceUnit="M(DefaultReal)" presentationUnits="FT;M" relativeError="0.0001"/>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    ctx.read_xml_string(&units).unwrap();
    let schema = ctx.read_xml_string(&koq).unwrap();
    let length = schema.get_kind_of_quantity("Length").unwrap();
    assert_eq!(length.persistence_unit, Some(ItemRef::new("Units", "M")));
    assert_eq!(length.presentation_formats.len(), 2);
    assert_eq!(length.presentation_formats[0].units[0].unit, ItemRef::new("Units", "FT"));
    assert_eq!(length.presentation_formats[0].format, ItemRef::new("Units", "DefaultRealU"));
    assert_eq!(length.relative_error, 0.0001);
}

#[test]
fn test_mixin_marker_becomes_mixin_class() {
    let xml = format!(
        r#"<ECSchema schemaName="M" alias="m" version="01.00.00" xmlns="{EC32}">
    <ECSchemaReference name="CoreCustomAttributes" version="01.00.03" alias="CoreCA"/>
    <ECEntityClass typeName="Element"/>
    <ECEntityClass typeName="IHasColor" modifier="Abstract">
        <ECCustomAttributes>
            <IsMixin xmlns="CoreCustomAttributes.01.00.03">
                <AppliesToEntityClass>Element</AppliesToEntityClass>
            </IsMixin>
        </ECCustomAttributes>
    </ECEntityClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let schema = ctx.read_xml_string(&xml).unwrap();
    let mixin = schema.get_class("IHasColor").unwrap();
    assert!(mixin.is_mixin());
    assert!(mixin.custom_attributes.is_empty());
    assert_eq!(schema.referenced_schema_count(), 0);
}

// ============================================================================
// Custom attributes
// ============================================================================

#[test]
fn test_custom_attribute_values_are_shaped_by_class() {
    let xml = format!(
        r#"<ECSchema schemaName="Meta" alias="mt" version="01.00.00" xmlns="{EC32}">
    <ECStructClass typeName="Range">
        <ECProperty propertyName="Low" typeName="double"/>
        <ECProperty propertyName="High" typeName="double"/>
    </ECStructClass>
    <ECCustomAttributeClass typeName="Limits" appliesTo="Any">
        <ECStructProperty propertyName="Range" typeName="Range"/>
        <ECArrayProperty propertyName="Tags" typeName="string"/>
    </ECCustomAttributeClass>
    <ECEntityClass typeName="Gauge">
        <ECCustomAttributes>
            <Limits xmlns="Meta.01.00.00">
                <Range><Low>0</Low><High>10.5</High></Range>
                <Tags><string>a</string><string>b</string></Tags>
            </Limits>
        </ECCustomAttributes>
    </ECEntityClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let schema = ctx.read_xml_string(&xml).unwrap();
    let ca = schema
        .get_class("Gauge")
        .unwrap()
        .custom_attributes
        .get(&ItemRef::new("Meta", "Limits"))
        .unwrap();
    match ca.get("Range") {
        Some(InstanceValue::Struct(members)) => {
            assert_eq!(members.get("High"), Some(&InstanceValue::from("10.5")));
        }
        other => panic!("expected struct value, got {other:?}"),
    }
    assert!(matches!(ca.get("Tags"), Some(InstanceValue::Array(m)) if m.len() == 2));
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn test_read_json_document() {
    let json = r#"{
        "$schema": "https://dev.bentley.com/json_schemas/ec/32/ecschema",
        "name": "Inventory",
        "version": "01.02.03",
        "alias": "inv",
        "description": "Stock items",
        "items": {
            "Item": {
                "schemaItemType": "EntityClass",
                "modifier": "Abstract",
                "properties": [
                    { "name": "Sku", "type": "PrimitiveProperty", "typeName": "string", "isReadOnly": true },
                    { "name": "Count", "type": "PrimitiveProperty", "typeName": "int", "minValue": 0 }
                ]
            },
            "Part": {
                "schemaItemType": "EntityClass",
                "baseClass": "Inventory.Item",
                "properties": [
                    { "name": "Weights", "type": "PrimitiveArrayProperty", "typeName": "double", "minOccurs": 1 }
                ]
            }
        }
    }"#;
    let mut ctx = ReadContext::new();
    let schema = ctx.read_json_string(json).unwrap();

    assert_eq!(schema.full_name(), "Inventory.01.02.03");
    assert_eq!(schema.description(), "Stock items");
    assert_eq!(schema.property_count("Part", true), 3);
    assert!(schema.find_property("Part", "sku", true).unwrap().is_readonly);
    let (ty, bounds) = schema
        .find_property("Part", "Weights", false)
        .unwrap()
        .as_primitive_array()
        .unwrap();
    assert_eq!(ty, &PrimitiveTypeRef::Primitive(PrimitiveType::Double));
    assert_eq!(bounds.min_occurs, 1);
}

#[rstest]
#[case::malformed("{ not json", ReadStatus::FailedToParseJson)]
#[case::xml_content(r#"<ECSchema schemaName="T" alias="ts" version="1.0.0"/>"#, ReadStatus::FailedToParseJson)]
#[case::missing_schema_uri(r#"{"name":"T","version":"1.0.0","alias":"t"}"#, ReadStatus::InvalidECSchemaJson)]
#[case::unknown_item_type(
    r#"{"$schema":"https://dev.bentley.com/json_schemas/ec/32/ecschema","name":"T","version":"1.0.0","alias":"t",
        "items":{"X":{"schemaItemType":"Gadget"}}}"#,
    ReadStatus::InvalidECSchemaJson
)]
fn test_json_read_status(#[case] json: &str, #[case] expected: ReadStatus) {
    let mut ctx = ReadContext::new();
    assert_eq!(ReadStatus::from(&ctx.read_json_string(json)), expected);
}

#[test]
fn test_file_content_must_match_its_extension() {
    let dir = tempfile::TempDir::new().unwrap();
    let json_path = dir.path().join("Plant.01.00.00.ecschema.json");
    std::fs::write(
        &json_path,
        format!(r#"<ECSchema schemaName="Plant" alias="pl" version="01.00.00" xmlns="{EC32}"/>"#),
    )
    .unwrap();
    let mut ctx = ReadContext::new();
    assert!(matches!(ctx.read_file(&json_path), Err(ReadError::FailedToParseJson(_))));

    let xml_path = dir.path().join("Plant.01.00.00.ecschema.xml");
    std::fs::write(&xml_path, r#"{"name":"Plant","version":"01.00.00","alias":"pl"}"#).unwrap();
    assert!(matches!(ctx.read_file(&xml_path), Err(ReadError::FailedToParseXml(_))));
    assert_eq!(ctx.cached_schemas().count(), 0);
}

#[test]
fn test_json_and_xml_agree() {
    let xml = format!(
        r#"<ECSchema schemaName="Shapes" alias="sh" version="01.00.00" xmlns="{EC32}">
    <ECEntityClass typeName="Shape" modifier="Abstract">
        <ECProperty propertyName="Area" typeName="double"/>
    </ECEntityClass>
    <ECEntityClass typeName="Circle"><BaseClass>Shape</BaseClass></ECEntityClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new();
    let from_xml = ctx.read_xml_string(&xml).unwrap();
    let json = from_xml.write_json_string(&Default::default()).unwrap();

    let mut ctx = ReadContext::new();
    let from_json: std::sync::Arc<Schema> = ctx.read_json_string(&json).unwrap();
    assert_eq!(
        from_json.write_xml_string(&Default::default()).unwrap(),
        from_xml.write_xml_string(&Default::default()).unwrap()
    );
}
