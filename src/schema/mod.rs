//! The schema model and its named item store.
//!
//! A [`Schema`] exclusively owns its items, indexed case-insensitively by name
//! and kept in declaration order. Cross-item and cross-schema links are
//! [`ItemRef`]s resolved through the owning schema, and referenced schemas are
//! shared, frozen `Arc<Schema>` values.
//!
//! ```text
//! Schema
//! ├── items: IndexMap<NameKey, SchemaItem>        (declaration order)
//! ├── references: IndexMap<NameKey, SchemaReference>  (insertion order)
//! └── custom_attributes
//! ```
//!
//! Hierarchy, conflict resolution, reference management and validation are
//! implemented as further `impl Schema` blocks in sibling modules.

mod class;
mod conflict;
mod custom_attribute;
mod enumeration;
mod hierarchy;
mod order;
mod item;
mod property;
mod references;
pub mod standard;
mod units;
mod validate;

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::base::{EcVersion, ItemRef, NameKey, SchemaKey, SchemaVersion, is_valid_name};
use crate::error::{EcError, EcResult};

pub use class::{
    ClassModifier, ClassType, EcClass, Multiplicity, RelationshipConstraint, RelationshipInfo,
    StrengthDirection, StrengthType,
};
pub use conflict::{PropertyRename, are_compatible};
pub(crate) use conflict::ConflictPolicy;
pub use custom_attribute::{CustomAttribute, CustomAttributes, InstanceValue};
pub use enumeration::{EnumBackingType, EnumValue, Enumeration, Enumerator};
pub use item::{ItemInfo, ItemKind, ItemVariant, PropertyCategory, SchemaItem};
pub use property::{
    ArrayBounds, EcProperty, NavigationDirection, PrimitiveType, PrimitiveTypeRef, PropertyKind,
};
pub use hierarchy::VisibleProperty;
pub use order::{CANONICAL_KIND_ORDER, dependency_order};
pub use references::{SchemaReference, is_schema_referenced};
pub use units::{
    CompositeSpec, Format, FormatOverride, FormatType, KindOfQuantity, MAX_COMPOSITE_UNITS,
    Phenomenon, Unit, UnitKind, UnitLabel, UnitSystem,
};
pub use validate::{IssueLevel, ValidationIssue, ValidationReport};

/// A named, versioned, aliased container of schema items.
#[derive(Clone, Debug)]
pub struct Schema {
    info: ItemInfo,
    alias: String,
    version: SchemaVersion,
    pub checksum: Option<String>,
    /// Document generation this schema was read from.
    pub original_ec_version: EcVersion,
    /// Write items in declaration order instead of the canonical order.
    pub preserve_element_order: bool,
    pub(crate) ec3_2_compatible: bool,
    items: IndexMap<NameKey, SchemaItem>,
    pub(crate) references: IndexMap<NameKey, SchemaReference>,
    pub custom_attributes: CustomAttributes,
}

impl Schema {
    /// Create an empty schema. Fails with `InvalidName` for an invalid name or alias.
    pub fn create(name: &str, alias: &str, read: u32, write: u32, minor: u32) -> EcResult<Schema> {
        Self::with_version(name, alias, SchemaVersion::new(read, write, minor))
    }

    pub fn with_version(name: &str, alias: &str, version: SchemaVersion) -> EcResult<Schema> {
        if !is_valid_name(name) {
            return Err(EcError::invalid_name(name));
        }
        if !is_valid_name(alias) {
            return Err(EcError::invalid_name(alias));
        }
        Ok(Self::new_unchecked(name, alias, version))
    }

    /// Construct without name validation, for built-in schemas and readers that
    /// validate on their own.
    pub(crate) fn new_unchecked(name: &str, alias: &str, version: SchemaVersion) -> Schema {
        Self {
            info: ItemInfo::new(name),
            alias: alias.to_string(),
            version,
            checksum: None,
            original_ec_version: EcVersion::LATEST,
            preserve_element_order: false,
            ec3_2_compatible: true,
            items: IndexMap::new(),
            references: IndexMap::new(),
            custom_attributes: CustomAttributes::new(),
        }
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn set_alias(&mut self, alias: &str) -> EcResult<()> {
        if !is_valid_name(alias) {
            return Err(EcError::invalid_name(alias));
        }
        self.alias = alias.to_string();
        Ok(())
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn set_version(&mut self, version: SchemaVersion) {
        self.version = version;
    }

    pub fn key(&self) -> SchemaKey {
        SchemaKey {
            name: self.name().to_string(),
            version: self.version,
            checksum: self.checksum.clone(),
        }
    }

    /// `Name.RR.WW.MM`
    pub fn full_name(&self) -> String {
        self.key().full_name()
    }

    pub fn display_label(&self) -> &str {
        self.info.display_label()
    }

    pub fn is_display_label_defined(&self) -> bool {
        self.info.is_display_label_defined()
    }

    pub fn set_display_label(&mut self, label: Option<String>) {
        self.info.display_label = label;
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.info.description = description.into();
    }

    pub fn info(&self) -> &ItemInfo {
        &self.info
    }

    /// Whether the schema meets the latest validation level.
    pub fn is_ec3_2_compatible(&self) -> bool {
        self.ec3_2_compatible
    }

    /// Reference to a local item by name.
    pub fn item_ref(&self, name: &str) -> ItemRef {
        ItemRef::new(self.name(), name)
    }

    /// Freeze for sharing as a referenced schema.
    pub fn into_shared(self) -> Arc<Schema> {
        Arc::new(self)
    }

    // ========================================================================
    // ITEM STORE
    // ========================================================================

    /// Add an item. Classes go through [`Schema::add_class`] without conflict resolution.
    pub fn add_item(&mut self, item: SchemaItem) -> EcResult<&mut SchemaItem> {
        let name = item.name().to_string();
        match item {
            SchemaItem::Class(class) => {
                self.add_class(class, false)?;
            }
            other => {
                self.check_new_item_name(other.name())?;
                for dep in other.dependencies() {
                    self.ensure_referenceable(&dep)?;
                }
                self.insert_item_raw(other)?;
            }
        }
        self.items
            .get_mut(&NameKey::new(&name))
            .ok_or_else(|| EcError::not_found("item", name))
    }

    /// Add a class together with its base classes and properties.
    ///
    /// The class is attached first as an empty shell, then each base class and
    /// property is added through the hierarchy checks. Any failure removes the
    /// class again.
    pub fn add_class(&mut self, mut class: EcClass, resolve_conflicts: bool) -> EcResult<&mut EcClass> {
        self.check_new_item_name(class.name())?;
        let bases = std::mem::take(&mut class.base_classes);
        let properties: Vec<EcProperty> = std::mem::take(&mut class.properties).into_values().collect();
        let shell = SchemaItem::Class(class);
        for dep in shell.dependencies() {
            self.ensure_referenceable(&dep)?;
        }
        let name = shell.name().to_string();
        self.insert_item_raw(shell)?;

        let attach = |schema: &mut Schema| -> EcResult<()> {
            for base in &bases {
                schema.add_base_class(&name, base, resolve_conflicts)?;
            }
            for property in properties {
                schema.add_property(&name, property, resolve_conflicts)?;
            }
            Ok(())
        };
        if let Err(err) = attach(self) {
            self.items.shift_remove(&NameKey::new(&name));
            return Err(err);
        }
        self.get_class_mut(&name)
            .ok_or_else(|| EcError::not_found("class", name))
    }

    pub fn create_entity_class(&mut self, name: &str) -> EcResult<&mut EcClass> {
        self.add_class(EcClass::new(name, ClassType::Entity), false)
    }

    pub fn create_struct_class(&mut self, name: &str) -> EcResult<&mut EcClass> {
        self.add_class(EcClass::new(name, ClassType::Struct), false)
    }

    pub fn create_custom_attribute_class(&mut self, name: &str) -> EcResult<&mut EcClass> {
        self.add_class(
            EcClass::new(name, ClassType::CustomAttribute { applies_to: None }),
            false,
        )
    }

    pub fn create_mixin_class(&mut self, name: &str, applies_to: ItemRef) -> EcResult<&mut EcClass> {
        let mut class = EcClass::new(
            name,
            ClassType::Mixin {
                applies_to: Some(applies_to),
            },
        );
        class.modifier = ClassModifier::Abstract;
        self.add_class(class, false)
    }

    pub fn create_relationship_class(&mut self, name: &str) -> EcResult<&mut EcClass> {
        self.add_class(
            EcClass::new(name, ClassType::Relationship(Box::default())),
            false,
        )
    }

    pub fn create_enumeration(&mut self, name: &str, backing: EnumBackingType) -> EcResult<&mut Enumeration> {
        self.add_typed(Enumeration::new(name, backing))
    }

    pub fn create_property_category(&mut self, name: &str, priority: i32) -> EcResult<&mut PropertyCategory> {
        let mut category = PropertyCategory::new(name);
        category.priority = priority;
        self.add_typed(category)
    }

    pub fn create_kind_of_quantity(&mut self, name: &str) -> EcResult<&mut KindOfQuantity> {
        self.add_typed(KindOfQuantity::new(name))
    }

    pub fn create_phenomenon(&mut self, name: &str, definition: &str) -> EcResult<&mut Phenomenon> {
        self.add_typed(Phenomenon::new(name, definition))
    }

    pub fn create_unit_system(&mut self, name: &str) -> EcResult<&mut UnitSystem> {
        self.add_typed(UnitSystem::new(name))
    }

    pub fn create_unit(
        &mut self,
        name: &str,
        definition: &str,
        phenomenon: ItemRef,
        unit_system: ItemRef,
    ) -> EcResult<&mut Unit> {
        self.add_typed(Unit::new(name, phenomenon, unit_system, definition))
    }

    pub fn create_constant(
        &mut self,
        name: &str,
        definition: &str,
        phenomenon: ItemRef,
        numerator: f64,
    ) -> EcResult<&mut Unit> {
        self.add_typed(Unit::constant(name, phenomenon, definition, numerator))
    }

    /// Create the reciprocal of `inverts`. The phenomenon is taken from the inverted unit.
    pub fn create_inverted_unit(&mut self, name: &str, inverts: ItemRef, unit_system: ItemRef) -> EcResult<&mut Unit> {
        let phenomenon = self
            .resolve::<Unit>(&inverts)
            .ok_or_else(|| EcError::not_found("unit", inverts.to_string()))?
            .phenomenon
            .clone();
        let mut unit = Unit::inverted(name, inverts, unit_system);
        unit.phenomenon = phenomenon;
        self.add_typed(unit)
    }

    pub fn create_format(&mut self, name: &str, format_type: FormatType) -> EcResult<&mut Format> {
        self.add_typed(Format::new(name, format_type))
    }

    fn add_typed<T: ItemVariant>(&mut self, value: T) -> EcResult<&mut T> {
        let name = value.item_info().name().to_string();
        let item = self.add_item(value.into_item())?;
        T::from_item_mut(item).ok_or_else(|| EcError::not_found(T::KIND.as_str(), name))
    }

    /// Remove a local item. Fails with `ItemInUse` while another local item refers to it.
    pub fn delete_item(&mut self, name: &str) -> EcResult<SchemaItem> {
        let key = NameKey::new(name);
        let target = self
            .items
            .get(&key)
            .map(|item| self.item_ref(item.name()))
            .ok_or_else(|| EcError::not_found("item", name))?;
        for (other_key, item) in &self.items {
            if *other_key == key {
                continue;
            }
            if item.dependencies().contains(&target) {
                return Err(EcError::ItemInUse {
                    item: target.to_string(),
                    user: item.name().to_string(),
                });
            }
        }
        debug!(item = %target, "deleting schema item");
        self.items
            .shift_remove(&key)
            .ok_or_else(|| EcError::not_found("item", name))
    }

    pub fn get_item(&self, name: &str) -> Option<&SchemaItem> {
        self.items.get(&NameKey::new(name))
    }

    pub fn get_item_mut(&mut self, name: &str) -> Option<&mut SchemaItem> {
        self.items.get_mut(&NameKey::new(name))
    }

    pub fn contains_item(&self, name: &str) -> bool {
        self.items.contains_key(&NameKey::new(name))
    }

    pub fn get<T: ItemVariant>(&self, name: &str) -> Option<&T> {
        self.get_item(name).and_then(T::from_item)
    }

    pub fn get_mut<T: ItemVariant>(&mut self, name: &str) -> Option<&mut T> {
        self.get_item_mut(name).and_then(T::from_item_mut)
    }

    pub fn get_class(&self, name: &str) -> Option<&EcClass> {
        self.get(name)
    }

    pub fn get_class_mut(&mut self, name: &str) -> Option<&mut EcClass> {
        self.get_mut(name)
    }

    pub fn get_enumeration(&self, name: &str) -> Option<&Enumeration> {
        self.get(name)
    }

    pub fn get_kind_of_quantity(&self, name: &str) -> Option<&KindOfQuantity> {
        self.get(name)
    }

    pub fn get_property_category(&self, name: &str) -> Option<&PropertyCategory> {
        self.get(name)
    }

    pub fn get_unit(&self, name: &str) -> Option<&Unit> {
        self.get(name)
    }

    pub fn get_phenomenon(&self, name: &str) -> Option<&Phenomenon> {
        self.get(name)
    }

    pub fn get_unit_system(&self, name: &str) -> Option<&UnitSystem> {
        self.get(name)
    }

    pub fn get_format(&self, name: &str) -> Option<&Format> {
        self.get(name)
    }

    /// Items in declaration order.
    pub fn items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.values()
    }

    pub fn items_of<'a, T: ItemVariant + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        self.items.values().filter_map(T::from_item)
    }

    pub fn classes(&self) -> impl Iterator<Item = &EcClass> {
        self.items_of::<EcClass>()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn count_of(&self, kind: ItemKind) -> usize {
        self.items.values().filter(|i| i.kind() == kind).count()
    }

    pub fn class_count(&self) -> usize {
        self.count_of(ItemKind::Class)
    }

    // ========================================================================
    // CUSTOM ATTRIBUTES
    // ========================================================================

    /// Attach a custom attribute to the schema itself.
    pub fn set_schema_custom_attribute(&mut self, attribute: CustomAttribute) -> EcResult<()> {
        self.check_custom_attribute(&attribute)?;
        self.custom_attributes.set(attribute);
        Ok(())
    }

    pub fn set_class_custom_attribute(&mut self, class: &str, attribute: CustomAttribute) -> EcResult<()> {
        self.check_custom_attribute(&attribute)?;
        let target = self
            .get_class_mut(class)
            .ok_or_else(|| EcError::not_found("class", class))?;
        target.custom_attributes.set(attribute);
        Ok(())
    }

    pub fn set_property_custom_attribute(
        &mut self,
        class: &str,
        property: &str,
        attribute: CustomAttribute,
    ) -> EcResult<()> {
        self.check_custom_attribute(&attribute)?;
        let target = self
            .get_class_mut(class)
            .ok_or_else(|| EcError::not_found("class", class))?
            .local_property_mut(property)
            .ok_or_else(|| EcError::not_found("property", format!("{class}.{property}")))?;
        target.custom_attributes.set(attribute);
        Ok(())
    }

    fn check_custom_attribute(&mut self, attribute: &CustomAttribute) -> EcResult<()> {
        self.ensure_referenceable(&attribute.class)?;
        let class = self
            .resolve_class(&attribute.class)
            .ok_or_else(|| EcError::not_found("custom attribute class", attribute.class.to_string()))?;
        if !class.is_custom_attribute_class() {
            return Err(EcError::PropertyNotSupported(format!(
                "'{}' is not a custom attribute class",
                attribute.class
            )));
        }
        Ok(())
    }

    // ========================================================================
    // INTERNAL STORE ACCESS
    // ========================================================================

    pub(crate) fn check_new_item_name(&self, name: &str) -> EcResult<()> {
        if !is_valid_name(name) {
            return Err(EcError::invalid_name(name));
        }
        if self.contains_item(name) {
            return Err(EcError::already_exists(self.name(), name));
        }
        Ok(())
    }

    /// Insert with only name checks; dependent content is validated later.
    pub(crate) fn insert_item_raw(&mut self, item: SchemaItem) -> EcResult<()> {
        self.check_new_item_name(item.name())?;
        self.items.insert(NameKey::new(item.name()), item);
        Ok(())
    }

    /// Replace an existing item of the same name, keeping its position.
    pub(crate) fn replace_item_raw(&mut self, item: SchemaItem) {
        self.items.insert(NameKey::new(item.name()), item);
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut SchemaItem> {
        self.items.values_mut()
    }

    /// Reorder items to follow `names`; unlisted items go last in their current order.
    pub(crate) fn reorder_items(&mut self, names: &[String]) {
        let rank: rustc_hash::FxHashMap<NameKey, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (NameKey::new(n), i))
            .collect();
        let rank_of = |k: &NameKey| rank.get(k).copied().unwrap_or(usize::MAX);
        self.items.sort_by(|a, _, b, _| rank_of(a).cmp(&rank_of(b)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_schema_rejects_invalid_name() {
        assert!(matches!(
            Schema::create("", "ts", 1, 0, 0),
            Err(EcError::InvalidName(_))
        ));
        assert!(matches!(
            Schema::create("TestSchema", "", 1, 0, 0),
            Err(EcError::InvalidName(_))
        ));
        let schema = Schema::create("TestSchema", "ts", 1, 0, 2).unwrap();
        assert_eq!(schema.full_name(), "TestSchema.01.00.02");
        assert_eq!(schema.display_label(), "TestSchema");
    }

    #[test]
    fn test_item_names_are_unique_case_insensitively() {
        let mut schema = Schema::create("TestSchema", "ts", 1, 0, 0).unwrap();
        schema.create_entity_class("Widget").unwrap();
        assert!(matches!(
            schema.create_struct_class("WIDGET"),
            Err(EcError::NamedItemAlreadyExists { .. })
        ));
        assert!(matches!(
            schema.create_enumeration("widget", EnumBackingType::Integer),
            Err(EcError::NamedItemAlreadyExists { .. })
        ));
        assert!(matches!(
            schema.create_entity_class("bad name"),
            Err(EcError::InvalidName(_))
        ));
        assert_eq!(schema.get_class("wIdGeT").unwrap().name(), "Widget");
        assert_eq!(schema.item_count(), 1);
    }

    #[test]
    fn test_typed_lookup() {
        let mut schema = Schema::create("TestSchema", "ts", 1, 0, 0).unwrap();
        schema.create_unit_system("SI").unwrap();
        schema.create_phenomenon("LENGTH", "LENGTH").unwrap();
        let length = schema.item_ref("LENGTH");
        let si = schema.item_ref("SI");
        schema.create_unit("M", "M", length, si).unwrap();

        assert!(schema.get_unit("m").is_some());
        assert!(schema.get_class("M").is_none());
        assert_eq!(schema.count_of(ItemKind::Unit), 1);
        let names: Vec<_> = schema.items().map(|i| i.name()).collect();
        assert_eq!(names, vec!["SI", "LENGTH", "M"]);
        let units: Vec<&Unit> = schema.items_of::<Unit>().collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].info.name(), "M");
        assert_eq!(schema.items_of::<Phenomenon>().count(), 1);
        assert_eq!(schema.classes().count(), 0);
    }

    #[test]
    fn test_delete_item_in_use() {
        let mut schema = Schema::create("TestSchema", "ts", 1, 0, 0).unwrap();
        schema.create_unit_system("SI").unwrap();
        schema.create_phenomenon("LENGTH", "LENGTH").unwrap();
        let (length, si) = (schema.item_ref("LENGTH"), schema.item_ref("SI"));
        schema.create_unit("M", "M", length, si).unwrap();

        assert!(matches!(schema.delete_item("SI"), Err(EcError::ItemInUse { .. })));
        schema.delete_item("M").unwrap();
        schema.delete_item("SI").unwrap();
        assert!(schema.get_unit_system("SI").is_none());
        assert!(matches!(schema.delete_item("SI"), Err(EcError::NotFound { .. })));
    }

    #[test]
    fn test_inverted_unit_takes_phenomenon() {
        let mut schema = Schema::create("TestSchema", "ts", 1, 0, 0).unwrap();
        schema.create_unit_system("SI").unwrap();
        schema.create_phenomenon("SLOPE", "LENGTH*LENGTH(-1)").unwrap();
        let (slope, si) = (schema.item_ref("SLOPE"), schema.item_ref("SI"));
        schema.create_unit("M_PER_M", "M*M(-1)", slope, si.clone()).unwrap();
        let inverts = schema.item_ref("M_PER_M");
        let inv = schema.create_inverted_unit("M_PER_M_INV", inverts, si).unwrap();
        assert_eq!(inv.phenomenon.as_ref().unwrap().name, "SLOPE");
    }

    #[test]
    fn test_item_referencing_unknown_schema_is_rejected() {
        let mut schema = Schema::create("TestSchema", "ts", 1, 0, 0).unwrap();
        let result = schema.create_unit(
            "M",
            "M",
            ItemRef::new("Units", "LENGTH"),
            ItemRef::new("Units", "SI"),
        );
        assert!(matches!(result, Err(EcError::ItemNotReferenceable { .. })));
        assert!(schema.get_unit("M").is_none());
    }
}
