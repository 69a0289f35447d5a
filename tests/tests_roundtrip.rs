//! Write-then-read round trips through strings and files.

use std::sync::Arc;

use ecschema::schema::{
    CustomAttribute, EnumBackingType, EnumValue, FormatOverride, FormatType, InstanceValue, PrimitiveType, UnitLabel,
};
use ecschema::{EcProperty, EcVersion, ItemRef, ReadContext, Schema, WriteOptions};
use rstest::rstest;
use tempfile::TempDir;

fn units_schema() -> Arc<Schema> {
    let mut units = Schema::create("Units", "u", 1, 0, 0).unwrap();
    units.create_unit_system("SI").unwrap();
    units.create_phenomenon("LENGTH", "LENGTH").unwrap();
    let (length, si) = (units.item_ref("LENGTH"), units.item_ref("SI"));
    units.create_unit("M", "M", length.clone(), si.clone()).unwrap();
    {
        let ft = units.create_unit("FT", "IN", length, si).unwrap();
        ft.numerator = Some(12.0);
        ft.offset = Some(0.25);
    }
    {
        let format = units.create_format("DefaultRealU", FormatType::Decimal).unwrap();
        format.precision = Some(6);
        format.format_traits = vec!["keepSingleZero".to_string(), "showUnitLabel".to_string()];
    }
    units.into_shared()
}

/// A schema touching most item kinds, referencing `units`.
fn plant_schema(units: &Arc<Schema>) -> Schema {
    let mut schema = Schema::create("Plant", "pl", 1, 2, 3).unwrap();
    schema.set_description("Process plant");
    schema.set_display_label(Some("Plant Schema".to_string()));
    schema.add_referenced_schema(units.clone()).unwrap();

    {
        let phase = schema.create_enumeration("Phase", EnumBackingType::String).unwrap();
        phase.add_enumerator("Liquid", EnumValue::String("L".into())).unwrap();
        phase
            .add_enumerator("Gas", EnumValue::String("G".into()))
            .unwrap()
            .display_label = Some("Gaseous".to_string());
    }
    schema.create_property_category("Process", 7).unwrap();
    {
        let koq = schema.create_kind_of_quantity("Length").unwrap();
        koq.persistence_unit = Some(ItemRef::new("Units", "M"));
        koq.relative_error = 0.0001;
        let mut presentation = FormatOverride::new(ItemRef::new("Units", "DefaultRealU"));
        presentation.precision = Some(4);
        presentation.units.push(UnitLabel::with_label(ItemRef::new("Units", "FT"), "ft"));
        koq.presentation_formats.push(presentation);
    }
    schema.create_custom_attribute_class("Note").unwrap();
    schema
        .add_property("Note", EcProperty::primitive("Text", PrimitiveType::String), false)
        .unwrap();

    schema.create_entity_class("Equipment").unwrap().info.description = "Anything installed".to_string();
    schema.create_entity_class("Tank").unwrap();
    let equipment = schema.item_ref("Equipment");
    schema.add_base_class("Tank", &equipment, false).unwrap();
    let (length, process, phase) = (
        schema.item_ref("Length"),
        schema.item_ref("Process"),
        schema.item_ref("Phase"),
    );
    schema
        .add_property(
            "Tank",
            EcProperty::primitive("Height", PrimitiveType::Double)
                .with_kind_of_quantity(length)
                .with_category(process),
            false,
        )
        .unwrap();
    schema
        .add_property("Tank", EcProperty::enumeration("Contents", phase), false)
        .unwrap();

    let mut note = CustomAttribute::new(schema.item_ref("Note"));
    note.values.insert("Text".to_string(), InstanceValue::from("inspected"));
    schema.set_class_custom_attribute("Tank", note).unwrap();
    schema
}

fn context_with(units: &Arc<Schema>) -> ReadContext {
    let mut ctx = ReadContext::new();
    ctx.add_schema(units.clone()).unwrap();
    ctx
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_xml_round_trip_is_stable() {
    let units = units_schema();
    let schema = plant_schema(&units);
    let options = WriteOptions::default();
    let first = schema.write_xml_string(&options).unwrap();

    let mut ctx = context_with(&units);
    let reread = ctx.read_xml_string(&first).unwrap();
    assert_eq!(reread.write_xml_string(&options).unwrap(), first);

    assert_eq!(reread.display_label(), "Plant Schema");
    assert_eq!(reread.get_class("Equipment").unwrap().info.description, "Anything installed");
    let height = reread.find_property("Tank", "Height", true).unwrap();
    assert_eq!(height.kind_of_quantity, Some(ItemRef::new("Plant", "Length")));
    assert_eq!(height.category, Some(ItemRef::new("Plant", "Process")));
    let koq = reread.get_kind_of_quantity("Length").unwrap();
    assert_eq!(koq, schema.get_kind_of_quantity("Length").unwrap());
    let note = reread
        .get_class("Tank")
        .unwrap()
        .custom_attributes
        .get(&ItemRef::new("Plant", "Note"))
        .unwrap();
    assert_eq!(note.get("Text"), Some(&InstanceValue::from("inspected")));
}

#[test]
fn test_unit_numbers_round_trip_exactly() {
    let units = units_schema();
    let xml = units.write_xml_string(&WriteOptions::default()).unwrap();
    let mut ctx = ReadContext::new();
    let reread = ctx.read_xml_string(&xml).unwrap();
    let ft = reread.get_unit("FT").unwrap();
    assert_eq!(ft.numerator, Some(12.0));
    assert_eq!(ft.offset, Some(0.25));
    assert_eq!(ft.definition.as_deref(), Some("IN"));
    assert_eq!(reread.get_format("DefaultRealU").unwrap().format_traits.len(), 2);
}

#[test]
fn test_json_round_trip_is_stable() {
    let units = units_schema();
    let schema = plant_schema(&units);
    let options = WriteOptions::default();
    let first = schema.write_json_string(&options).unwrap();

    let mut ctx = context_with(&units);
    let reread = ctx.read_json_string(&first).unwrap();
    assert_eq!(reread.write_json_string(&options).unwrap(), first);
    assert_eq!(
        reread.write_xml_string(&options).unwrap(),
        schema.write_xml_string(&options).unwrap()
    );
}

#[test]
fn test_references_keep_insertion_order() {
    let mut second = Schema::create("Second", "s2", 1, 0, 0).unwrap();
    second.create_entity_class("B").unwrap();
    let second = second.into_shared();
    let mut first = Schema::create("First", "s1", 1, 0, 0).unwrap();
    first.create_entity_class("A").unwrap();
    let first = first.into_shared();

    let mut schema = Schema::create("User", "usr", 1, 0, 0).unwrap();
    schema.add_referenced_schema(second.clone()).unwrap();
    schema.add_referenced_schema(first.clone()).unwrap();
    let xml = schema.write_xml_string(&WriteOptions::default()).unwrap();
    let second_at = xml.find(r#"name="Second""#).unwrap();
    let first_at = xml.find(r#"name="First""#).unwrap();
    assert!(second_at < first_at);

    let mut ctx = ReadContext::new();
    ctx.add_schema(first).unwrap();
    ctx.add_schema(second).unwrap();
    let reread = ctx.read_xml_string(&xml).unwrap();
    let names: Vec<_> = reread.referenced_schemas().map(|s| s.name().to_string()).collect();
    assert_eq!(names, vec!["Second", "First"]);
}

#[rstest]
#[case::canonical(false, vec!["Alpha", "Zulu"])]
#[case::preserved(true, vec!["Zulu", "Alpha"])]
fn test_element_order(#[case] preserve: bool, #[case] expected: Vec<&str>) {
    let xml = r#"<ECSchema schemaName="Order" alias="o" version="01.00.00" xmlns="http://www.bentley.com/schemas/Bentley.ECXML.3.2">
    <ECEntityClass typeName="Zulu"/>
    <ECEntityClass typeName="Alpha"/>
</ECSchema>"#;
    let mut ctx = ReadContext::new().with_preserve_element_order(preserve);
    let schema = ctx.read_xml_string(xml).unwrap();
    let written = schema.write_xml_string(&WriteOptions::default()).unwrap();
    let zulu = written.find(r#"typeName="Zulu""#).unwrap();
    let alpha = written.find(r#"typeName="Alpha""#).unwrap();
    let order = if zulu < alpha { vec!["Zulu", "Alpha"] } else { vec!["Alpha", "Zulu"] };
    assert_eq!(order, expected);
}

#[test]
fn test_canonical_order_puts_bases_first() {
    let mut schema = Schema::create("Order", "o", 1, 0, 0).unwrap();
    schema.create_entity_class("Alpha").unwrap();
    schema.create_entity_class("Zulu").unwrap();
    let zulu = schema.item_ref("Zulu");
    schema.add_base_class("Alpha", &zulu, false).unwrap();
    let written = schema.write_xml_string(&WriteOptions::default()).unwrap();
    assert!(written.find(r#"typeName="Zulu""#).unwrap() < written.find(r#"typeName="Alpha""#).unwrap());
}

#[test]
fn test_canonical_order_writes_local_unit_before_kind_of_quantity() {
    let mut schema = Schema::create("Order", "o", 1, 0, 0).unwrap();
    schema.create_unit_system("SI").unwrap();
    schema.create_phenomenon("LENGTH", "LENGTH").unwrap();
    let (length, si) = (schema.item_ref("LENGTH"), schema.item_ref("SI"));
    schema.create_unit("M", "M", length, si).unwrap();
    let m = schema.item_ref("M");
    schema.create_kind_of_quantity("Distance").unwrap().persistence_unit = Some(m);
    let written = schema.write_xml_string(&WriteOptions::default()).unwrap();
    let unit_at = written.find(r#"typeName="M""#).unwrap();
    let koq_at = written.find(r#"typeName="Distance""#).unwrap();
    assert!(unit_at < koq_at);

    let mut ctx = ReadContext::new();
    let reread = ctx.read_xml_string(&written).unwrap();
    assert_eq!(reread.write_xml_string(&WriteOptions::default()).unwrap(), written);
}

// ============================================================================
// Legacy targets
// ============================================================================

#[test]
fn test_write_legacy_generation_strips_units() {
    let units = units_schema();
    let schema = plant_schema(&units);
    let xml = schema.write_xml_string(&WriteOptions::new(EcVersion::V3_1)).unwrap();

    assert!(xml.contains("Bentley.ECXML.3.1"));
    assert!(!xml.contains(r#"<ECSchemaReference name="Units""#));
    assert!(xml.contains(r#"persistenceUnit="M""#));
    assert!(xml.contains(r#"presentationUnits="FT(DefaultRealU)""#));

    let mut ctx = ReadContext::new();
    let reread = ctx.read_xml_string(&xml).unwrap();
    assert_eq!(reread.original_ec_version, EcVersion::V3_1);
    assert!(reread.get_class("Tank").is_some());
}

#[test]
fn test_json_requires_latest_generation() {
    let units = units_schema();
    let result = units.write_json_string(&WriteOptions::new(EcVersion::V3_1));
    assert!(result.is_err());
}

// ============================================================================
// Files
// ============================================================================

#[rstest]
#[case::xml("Plant.01.02.03.ecschema.xml")]
#[case::json("Plant.01.02.03.ecschema.json")]
fn test_file_round_trip(#[case] file_name: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(file_name);
    let units = units_schema();
    let schema = plant_schema(&units);
    let options = WriteOptions::default();
    if file_name.ends_with(".xml") {
        schema.write_xml_file(&path, &options).unwrap();
    } else {
        schema.write_json_file(&path, &options).unwrap();
    }

    let mut ctx = context_with(&units);
    let reread = ctx.read_file(&path).unwrap();
    assert_eq!(reread.full_name(), "Plant.01.02.03");
    assert_eq!(
        reread.write_xml_string(&options).unwrap(),
        schema.write_xml_string(&options).unwrap()
    );
}

#[test]
fn test_read_file_with_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Plant.yaml");
    std::fs::write(&path, "name: Plant").unwrap();
    let mut ctx = ReadContext::new();
    assert!(ctx.read_file(&path).is_err());
}
