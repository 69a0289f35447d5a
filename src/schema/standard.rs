//! Built-in schemas the engine depends on.
//!
//! `ECv3ConversionAttributes` carries the `RenamedPropertiesMapping` custom
//! attribute class the conflict resolver records renames with.
//! `CoreCustomAttributes` carries `IsMixin`, the custom attribute XML documents
//! use to mark entity classes as mixins. Each schema is built once and shared,
//! so every schema that needs one references the same instance.

use std::sync::{Arc, LazyLock};

use crate::base::{ItemRef, SchemaVersion};

use super::class::{ClassType, EcClass};
use super::item::SchemaItem;
use super::property::{EcProperty, PrimitiveType};
use super::Schema;

pub const CONVERSION_SCHEMA_NAME: &str = "ECv3ConversionAttributes";
pub const CONVERSION_SCHEMA_ALIAS: &str = "V2ToV3";
pub const CONVERSION_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0, 1);
pub const RENAMED_PROPERTIES_MAPPING: &str = "RenamedPropertiesMapping";
pub const PROPERTY_MAPPING: &str = "PropertyMapping";

pub const CORE_SCHEMA_NAME: &str = "CoreCustomAttributes";
pub const CORE_SCHEMA_ALIAS: &str = "CoreCA";
pub const CORE_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0, 3);
pub const IS_MIXIN: &str = "IsMixin";
pub const APPLIES_TO_ENTITY_CLASS: &str = "AppliesToEntityClass";

static CONVERSION_ATTRIBUTES: LazyLock<Arc<Schema>> = LazyLock::new(|| Arc::new(build_conversion_attributes()));
static CORE_CUSTOM_ATTRIBUTES: LazyLock<Arc<Schema>> = LazyLock::new(|| Arc::new(build_core_custom_attributes()));

/// The shared `ECv3ConversionAttributes` schema.
pub fn conversion_attributes() -> Arc<Schema> {
    Arc::clone(&CONVERSION_ATTRIBUTES)
}

/// Reference to the `RenamedPropertiesMapping` custom attribute class.
pub fn renamed_properties_mapping_class() -> ItemRef {
    ItemRef::new(CONVERSION_SCHEMA_NAME, RENAMED_PROPERTIES_MAPPING)
}

/// The shared `CoreCustomAttributes` schema.
pub fn core_custom_attributes() -> Arc<Schema> {
    Arc::clone(&CORE_CUSTOM_ATTRIBUTES)
}

/// Reference to the `IsMixin` custom attribute class.
pub fn is_mixin_class() -> ItemRef {
    ItemRef::new(CORE_SCHEMA_NAME, IS_MIXIN)
}

/// All built-in schemas, for locaters.
pub fn standard_schemas() -> Vec<Arc<Schema>> {
    vec![conversion_attributes(), core_custom_attributes()]
}

fn build_conversion_attributes() -> Schema {
    let mut schema = Schema::new_unchecked(
        CONVERSION_SCHEMA_NAME,
        CONVERSION_SCHEMA_ALIAS,
        CONVERSION_SCHEMA_VERSION,
    );
    schema.set_description("Custom attributes recording conversions applied while upgrading schemas.");

    let mut mapping = EcClass::new(
        RENAMED_PROPERTIES_MAPPING,
        ClassType::CustomAttribute {
            applies_to: Some("AnyClass".to_string()),
        },
    );
    mapping.info.description =
        "Maps the original names of properties renamed to resolve conflicts to their new names.".to_string();
    let mut property = EcProperty::primitive(PROPERTY_MAPPING, PrimitiveType::String);
    property.description = "Pairs of 'oldName|newName' separated by ';'.".to_string();
    mapping.insert_property_raw(property);
    schema.replace_item_raw(SchemaItem::Class(mapping));
    schema
}

fn build_core_custom_attributes() -> Schema {
    let mut schema = Schema::new_unchecked(CORE_SCHEMA_NAME, CORE_SCHEMA_ALIAS, CORE_SCHEMA_VERSION);
    schema.set_description("Custom attributes that carry core schema semantics.");

    let mut is_mixin = EcClass::new(
        IS_MIXIN,
        ClassType::CustomAttribute {
            applies_to: Some("EntityClass".to_string()),
        },
    );
    is_mixin.info.description = "Marks an abstract entity class as a mixin.".to_string();
    let mut property = EcProperty::primitive(APPLIES_TO_ENTITY_CLASS, PrimitiveType::String);
    property.description = "Entity class the mixin may be applied to.".to_string();
    is_mixin.insert_property_raw(property);
    schema.replace_item_raw(SchemaItem::Class(is_mixin));
    schema
}
