//! Reference graph, locaters and pruned loads.

use std::sync::Arc;

use ecschema::{
    EcError, ItemRef, ReadContext, Schema, SchemaKey, SchemaMatchType, SearchPathLocater, StringSchemaLocater,
    WriteOptions,
};
use rstest::rstest;
use tempfile::TempDir;

const EC32: &str = "http://www.bentley.com/schemas/Bentley.ECXML.3.2";

fn yard() -> String {
    format!(
        r#"<ECSchema schemaName="Yard" alias="x" version="01.00.00" xmlns="{EC32}">
    <ECEntityClass typeName="Thing"/>
</ECSchema>"#
    )
}

/// References the pruned `Extra` under alias `ex` and `Yard` under alias `x`.
fn beta() -> String {
    format!(
        r#"<ECSchema schemaName="Beta" alias="b" version="01.00.00" xmlns="{EC32}">
    <ECSchemaReference name="Extra" version="01.00.00" alias="ex"/>
    <ECSchemaReference name="Yard" version="01.00.00" alias="x"/>
    <ECEntityClass typeName="Gate">
        <BaseClass>x:Thing</BaseClass>
        <ECStructProperty propertyName="Hinge" typeName="ex:Hinge"/>
    </ECEntityClass>
</ECSchema>"#
    )
}

/// References the pruned `Extra` under alias `x`, the alias `Beta` uses for `Yard`.
fn alpha() -> String {
    format!(
        r#"<ECSchema schemaName="Alpha" alias="a" version="01.00.00" xmlns="{EC32}">
    <ECSchemaReference name="Extra" version="01.00.00" alias="x"/>
    <ECSchemaReference name="Beta" version="01.00.00" alias="b"/>
    <ECEntityClass typeName="Door">
        <BaseClass>b:Gate</BaseClass>
        <BaseClass>x:Widget</BaseClass>
        <ECCustomAttributes>
            <Marker xmlns="Extra.01.00.00"/>
        </ECCustomAttributes>
        <ECProperty propertyName="Width" typeName="double" kindOfQuantity="x:Length"/>
        <ECStructProperty propertyName="Frame" typeName="x:Frame"/>
        <ECProperty propertyName="Color" typeName="string"/>
    </ECEntityClass>
</ECSchema>"#
    )
}

// ============================================================================
// Prune
// ============================================================================

#[test]
fn test_prune_drops_only_dependent_content() {
    let locater = StringSchemaLocater::new();
    locater.add_schema_string(&beta()).unwrap();
    locater.add_schema_string(&yard()).unwrap();
    let mut ctx = ReadContext::new().with_pruned_schema("Extra").with_locater(locater);

    let schema = ctx.read_xml_string(&alpha()).unwrap();
    assert!(schema.get_referenced_schema("Extra").is_none());
    assert!(schema.get_referenced_schema("Beta").is_some());

    let door = schema.get_class("Door").unwrap();
    assert_eq!(door.base_classes(), &[ItemRef::new("Beta", "Gate")]);
    assert!(door.custom_attributes.is_empty());
    assert!(door.local_property("Frame").is_none());
    assert!(door.local_property("Color").is_some());
    let width = door.local_property("Width").unwrap();
    assert!(width.kind_of_quantity.is_none());
}

#[test]
fn test_prune_aliases_do_not_leak_into_sibling_schema() {
    let locater = StringSchemaLocater::new();
    locater.add_schema_string(&beta()).unwrap();
    locater.add_schema_string(&yard()).unwrap();
    let mut ctx = ReadContext::new().with_pruned_schema("Extra").with_locater(locater);

    let alpha = ctx.read_xml_string(&alpha()).unwrap();
    let beta = alpha.get_referenced_schema("Beta").unwrap();

    let gate = beta.get_class("Gate").unwrap();
    assert_eq!(gate.base_classes(), &[ItemRef::new("Yard", "Thing")]);
    assert!(gate.local_property("Hinge").is_none());
    assert!(alpha.is_a(&ItemRef::new("Alpha", "Door"), &ItemRef::new("Yard", "Thing")));
}

#[test]
fn test_without_prune_missing_reference_fails() {
    let locater = StringSchemaLocater::new();
    locater.add_schema_string(&beta()).unwrap();
    locater.add_schema_string(&yard()).unwrap();
    let mut ctx = ReadContext::new().with_locater(locater);
    assert!(ctx.read_xml_string(&alpha()).is_err());
}

// ============================================================================
// Reference graph
// ============================================================================

fn chain() -> (Arc<Schema>, Arc<Schema>, Schema) {
    let mut base = Schema::create("Base", "bs", 1, 0, 0).unwrap();
    base.create_entity_class("Element").unwrap();
    let base = base.into_shared();
    let mut middle = Schema::create("Middle", "md", 1, 0, 0).unwrap();
    middle.add_referenced_schema(base.clone()).unwrap();
    let middle = middle.into_shared();
    let mut top = Schema::create("Top", "tp", 1, 0, 0).unwrap();
    top.add_referenced_schema(middle.clone()).unwrap();
    (base, middle, top)
}

#[test]
fn test_reference_closure() {
    let (base, middle, top) = chain();
    assert!(top.is_schema_referenced("Base"));
    assert!(top.is_schema_referenced("Middle"));
    assert!(!middle.is_schema_referenced("Top"));
    assert!(!base.is_schema_referenced("Middle"));
}

#[test]
fn test_add_reference_is_idempotent() {
    let (base, middle, mut top) = chain();
    top.add_referenced_schema(middle).unwrap();
    assert_eq!(top.referenced_schema_count(), 1);
    top.add_referenced_schema(base).unwrap();
    assert_eq!(top.referenced_schema_count(), 2);
}

#[test]
fn test_reference_in_use_cannot_be_removed() {
    let (base, _, _) = chain();
    let mut schema = Schema::create("User", "usr", 1, 0, 0).unwrap();
    schema.add_referenced_schema(base).unwrap();
    schema.create_entity_class("Wall").unwrap();
    schema
        .add_base_class("Wall", &ItemRef::new("Base", "Element"), false)
        .unwrap();
    assert!(matches!(
        schema.remove_referenced_schema("Base"),
        Err(EcError::SchemaInUse(_))
    ));
    assert_eq!(schema.referenced_schema_count(), 1);
}

#[test]
fn test_unreferenced_item_is_rejected() {
    let (base, _, _) = chain();
    let mut schema = Schema::create("User", "usr", 1, 0, 0).unwrap();
    schema.create_entity_class("Wall").unwrap();
    let result = schema.add_base_class("Wall", &ItemRef::new(base.name(), "Element"), false);
    assert!(result.is_err());
    assert!(schema.get_class("Wall").unwrap().base_classes().is_empty());
}

// ============================================================================
// Locating
// ============================================================================

#[rstest]
#[case::exact(SchemaMatchType::Exact, (1, 2, 3), Some("Lib.01.02.03"))]
#[case::exact_missing(SchemaMatchType::Exact, (1, 2, 0), None)]
#[case::latest(SchemaMatchType::Latest, (1, 0, 0), Some("Lib.02.00.00"))]
#[case::read_compatible(SchemaMatchType::LatestReadCompatible, (1, 0, 0), Some("Lib.01.02.03"))]
#[case::write_compatible(SchemaMatchType::LatestWriteCompatible, (1, 2, 0), Some("Lib.01.02.03"))]
#[case::write_incompatible(SchemaMatchType::LatestWriteCompatible, (1, 3, 0), None)]
fn test_locate_match_types(
    #[case] match_type: SchemaMatchType,
    #[case] wanted: (u32, u32, u32),
    #[case] expected: Option<&str>,
) {
    let locater = StringSchemaLocater::new();
    for version in ["01.00.05", "01.02.03", "02.00.00"] {
        let xml = format!(r#"<ECSchema schemaName="Lib" alias="lib" version="{version}" xmlns="{EC32}"/>"#);
        locater.add_schema_string(&xml).unwrap();
    }
    let mut ctx = ReadContext::new().with_locater(locater);
    let key = SchemaKey::new("Lib", wanted.0, wanted.1, wanted.2);
    let found = ctx.locate_schema(&key, match_type).map(|s| s.full_name());
    assert_eq!(found.as_deref(), expected);
}

#[test]
fn test_located_schema_is_cached() {
    let locater = StringSchemaLocater::new();
    locater.add_schema_string(&yard()).unwrap();
    let mut ctx = ReadContext::new().with_locater(locater);
    let key = SchemaKey::new("Yard", 1, 0, 0);
    let first = ctx.locate_schema(&key, SchemaMatchType::Exact).unwrap();
    let second = ctx.locate_schema(&key, SchemaMatchType::Exact).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(ctx.cached_schemas().count(), 1);
}

#[test]
fn test_standard_schemas_are_located() {
    let mut ctx = ReadContext::new();
    let key = SchemaKey::new("CoreCustomAttributes", 1, 0, 0);
    let core = ctx.locate_schema(&key, SchemaMatchType::LatestReadCompatible).unwrap();
    assert_eq!(core.alias(), "CoreCA");
}

#[test]
fn test_search_path_locater_reads_from_disk() {
    let dir = TempDir::new().unwrap();
    let mut yard_schema = ReadContext::new();
    let yard_schema = yard_schema.read_xml_string(&yard()).unwrap();
    yard_schema
        .write_json_file(dir.path().join("Yard.01.00.00.ecschema.json"), &WriteOptions::default())
        .unwrap();
    std::fs::write(dir.path().join("Yard.notes.txt"), "ignored").unwrap();

    let user = format!(
        r#"<ECSchema schemaName="User" alias="usr" version="01.00.00" xmlns="{EC32}">
    <ECSchemaReference name="Yard" version="01.00.00" alias="x"/>
    <ECEntityClass typeName="Shed"><BaseClass>x:Thing</BaseClass></ECEntityClass>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new().with_locater(SearchPathLocater::new([dir.path()]));
    let schema = ctx.read_xml_string(&user).unwrap();
    assert!(schema.is_a(&ItemRef::new("User", "Shed"), &ItemRef::new("Yard", "Thing")));
    assert_eq!(ctx.cached_schemas().count(), 2);
}

#[test]
fn test_reference_cycle_is_not_followed() {
    let locater = StringSchemaLocater::new();
    locater
        .add_schema_string(&format!(
            r#"<ECSchema schemaName="Loop" alias="lp" version="01.00.00" xmlns="{EC32}">
    <ECSchemaReference name="Start" version="01.00.00" alias="st"/>
</ECSchema>"#
        ))
        .unwrap();
    let start = format!(
        r#"<ECSchema schemaName="Start" alias="st" version="01.00.00" xmlns="{EC32}">
    <ECSchemaReference name="Loop" version="01.00.00" alias="lp"/>
</ECSchema>"#
    );
    let mut ctx = ReadContext::new().with_locater(locater);
    assert!(ctx.read_xml_string(&start).is_err());
}
