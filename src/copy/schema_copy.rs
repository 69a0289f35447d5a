//! Whole-schema copy.

use tracing::debug;

use crate::error::EcResult;
use crate::schema::Schema;

use super::item_copy::ItemCopier;
use super::CopyOptions;

/// Copy `source` into a new, independent schema with the same identity.
///
/// References are shared with the source, never duplicated. Items are copied
/// in dependency order with declaration order breaking ties, so base classes
/// and constraint classes exist before the classes that need them.
pub fn copy_schema(source: &Schema) -> EcResult<Schema> {
    let mut target = Schema::with_version(source.name(), source.alias(), source.version())?;
    target.set_display_label(source.info().display_label.clone());
    target.set_description(source.description());
    target.checksum = source.checksum.clone();
    target.original_ec_version = source.original_ec_version;
    target.preserve_element_order = source.preserve_element_order;
    target.ec3_2_compatible = source.is_ec3_2_compatible();

    for reference in source.reference_entries() {
        target.add_referenced_schema_with_alias(reference.schema.clone(), &reference.alias)?;
    }

    let order: Vec<String> = source
        .items_in_dependency_order()
        .into_iter()
        .map(|item| item.name().to_string())
        .collect();
    {
        let options = CopyOptions::new(true);
        let mut copier = ItemCopier::new(&mut target, source, None, options);
        for name in &order {
            copier.copy_item(name)?;
        }
    }
    target.custom_attributes = source.custom_attributes.clone();
    // declaration order, not copy order
    let declared: Vec<String> = source.items().map(|i| i.name().to_string()).collect();
    target.reorder_items(&declared);

    debug!(schema = %target.full_name(), items = target.item_count(), "copied schema");
    Ok(target)
}

impl Schema {
    /// Copy this schema. See [`copy_schema`].
    pub fn copy_schema(&self) -> EcResult<Schema> {
        copy_schema(self)
    }
}
