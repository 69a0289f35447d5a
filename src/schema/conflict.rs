//! Property conflict resolution.
//!
//! A property conflicts with another visible in the same hierarchy when the
//! names match case-insensitively. Compatible types make it an override;
//! incompatible types are either rejected (`DataTypeMismatch`) or, when
//! resolution is enabled, the newly introduced property is renamed to
//! `<alias>_<name>_`, appending `_` while that name is held by an incompatible
//! property. When a second base class brings in a clashing property, the
//! declaration inherited through the earlier base is the one renamed. Each rename is recorded on the owning class as a
//! `RenamedPropertiesMapping` custom attribute holding `old|new` pairs.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::base::{ItemRef, NameKey, is_valid_name};
use crate::error::{EcError, EcResult};

use super::custom_attribute::{CustomAttribute, InstanceValue};
use super::enumeration::Enumeration;
use super::hierarchy::{VisibleProperty, visible_properties};
use super::item::SchemaItem;
use super::property::{EcProperty, PrimitiveType, PrimitiveTypeRef, PropertyKind};
use super::references::SchemaReference;
use super::standard;
use super::Schema;

/// Separates `old|new` pairs inside one `PropertyMapping` value.
const MAPPING_SEPARATOR: char = ';';

/// One recorded rename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyRename {
    pub old_name: String,
    pub new_name: String,
}

/// How conflicts found while extending a hierarchy are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ConflictPolicy {
    /// Rename properties whose types are incompatible with a visible property.
    pub rename_incompatible: bool,
    /// Let a compatible override that differs only in case adopt the base casing.
    pub adopt_base_casing: bool,
}

impl ConflictPolicy {
    pub fn from_flag(resolve_conflicts: bool) -> Self {
        Self {
            rename_incompatible: resolve_conflicts,
            adopt_base_casing: resolve_conflicts,
        }
    }
}

/// A property that must change name before a hierarchy change can land.
#[derive(Clone, Debug)]
pub(crate) struct Conflict {
    schema: String,
    class: String,
    property: String,
    /// `Some` for a case-only clash: adopt this casing. `None`: find a free name.
    adopt: Option<String>,
}

// ============================================================================
// COMPATIBILITY
// ============================================================================

/// Whether `a` and `b` can stand in an override relationship.
///
/// Primitive types must match exactly, except that an enumeration and its
/// backing type are interchangeable. Struct, array and navigation properties
/// must refer to the same struct class or relationship.
pub fn are_compatible(ctx: &Schema, a: &EcProperty, b: &EcProperty) -> bool {
    match (&a.kind, &b.kind) {
        (PropertyKind::Primitive { ty: ta }, PropertyKind::Primitive { ty: tb })
        | (PropertyKind::PrimitiveArray { ty: ta, .. }, PropertyKind::PrimitiveArray { ty: tb, .. }) => {
            primitive_compatible(ctx, ta, tb)
        }
        (PropertyKind::Struct { struct_class: sa }, PropertyKind::Struct { struct_class: sb })
        | (
            PropertyKind::StructArray { struct_class: sa, .. },
            PropertyKind::StructArray { struct_class: sb, .. },
        ) => sa == sb,
        (
            PropertyKind::Navigation {
                relationship: ra,
                direction: da,
            },
            PropertyKind::Navigation {
                relationship: rb,
                direction: db,
            },
        ) => ra == rb && da == db,
        _ => false,
    }
}

fn primitive_compatible(ctx: &Schema, a: &PrimitiveTypeRef, b: &PrimitiveTypeRef) -> bool {
    match (a, b) {
        (PrimitiveTypeRef::Primitive(x), PrimitiveTypeRef::Primitive(y)) => x == y,
        (PrimitiveTypeRef::Enumeration(x), PrimitiveTypeRef::Enumeration(y)) => x == y,
        (PrimitiveTypeRef::Enumeration(e), PrimitiveTypeRef::Primitive(p))
        | (PrimitiveTypeRef::Primitive(p), PrimitiveTypeRef::Enumeration(e)) => {
            backing_type(ctx, e) == Some(*p)
        }
    }
}

fn backing_type(ctx: &Schema, enumeration: &ItemRef) -> Option<PrimitiveType> {
    ctx.resolve::<Enumeration>(enumeration)
        .map(|e| e.backing_type.primitive())
}

/// The topmost declaration `property` overrides, staying within its schema.
fn root_declaration<'a>(property: VisibleProperty<'a>, key: &NameKey) -> VisibleProperty<'a> {
    let mut root = property;
    while let Some(up) = visible_properties(root.owner, root.class, false).get(key).copied() {
        if !std::ptr::eq(up.owner, root.owner) {
            break;
        }
        root = up;
    }
    root
}

impl Schema {
    // ========================================================================
    // PROPERTY CREATION
    // ========================================================================

    /// Add a property to local class `class`.
    ///
    /// When an inherited property of the same name exists the new property is
    /// an override and must be compatible with it. With `resolve_conflicts`
    /// an incompatible property is renamed instead of rejected; the returned
    /// property carries the final name.
    pub fn add_property(
        &mut self,
        class: &str,
        property: EcProperty,
        resolve_conflicts: bool,
    ) -> EcResult<&mut EcProperty> {
        self.add_property_with(class, property, ConflictPolicy::from_flag(resolve_conflicts))
    }

    pub(crate) fn add_property_with(
        &mut self,
        class: &str,
        mut property: EcProperty,
        policy: ConflictPolicy,
    ) -> EcResult<&mut EcProperty> {
        if !is_valid_name(property.name()) {
            return Err(EcError::invalid_name(property.name()));
        }
        let owner = self
            .get_class(class)
            .ok_or_else(|| EcError::not_found("class", class))?;
        let class_name = owner.name().to_string();
        let class_ref = self.item_ref(&class_name);
        if owner.local_property(property.name()).is_some() {
            return Err(EcError::already_exists(class_ref.to_string(), property.name()));
        }
        let deps = {
            let mut deps = Vec::new();
            property.visit_refs(&mut |r| deps.push(r.clone()));
            deps
        };
        for dep in &deps {
            if !self.is_referenceable(dep) && !self.is_schema_referenced(&dep.schema) {
                return Err(EcError::not_referenceable(self.name(), dep));
            }
        }

        let inherited = visible_properties(self, owner, false)
            .get(&NameKey::new(property.name()))
            .map(|v| (v.property.name().to_string(), are_compatible(self, &property, v.property)));

        let mut renamed_from = None;
        let mut derived_conflicts = Vec::new();
        match inherited {
            Some((base_name, true)) => {
                if base_name != property.name() {
                    if !policy.adopt_base_casing {
                        return Err(EcError::already_exists(class_ref.to_string(), base_name));
                    }
                    debug!(class = %class_ref, from = property.name(), to = %base_name, "adopting base property casing");
                    property.set_name(base_name);
                }
            }
            Some((base_name, false)) => {
                if !policy.rename_incompatible {
                    return Err(EcError::mismatch(format!(
                        "property '{}' of '{class_ref}' is incompatible with inherited property '{base_name}'",
                        property.name()
                    )));
                }
                let new_name = self.fresh_property_name(&class_name, &property, &[]);
                warn!(class = %class_ref, from = property.name(), to = %new_name, "renaming conflicting property");
                renamed_from = Some(property.name().to_string());
                property.set_name(new_name);
            }
            None => {
                derived_conflicts = self.derived_property_conflicts(&class_name, &property);
                self.check_conflicts_resolvable(&derived_conflicts, policy)?;
            }
        }

        let needs_snapshot = !derived_conflicts.is_empty() || renamed_from.is_some();
        let snapshot = needs_snapshot.then(|| self.clone_items());
        let final_name = property.name().to_string();
        let result = (|| -> EcResult<()> {
            for dep in &deps {
                self.ensure_referenceable(dep)?;
            }
            if let Some(c) = self.get_class_mut(&class_name) {
                c.insert_property_raw(property);
            }
            if let Some(old) = &renamed_from {
                self.record_rename(&class_name, old, &final_name)?;
            }
            for conflict in &derived_conflicts {
                self.apply_conflict(conflict, &[class_name.as_str()])?;
            }
            Ok(())
        })();
        if let Err(err) = result {
            if let Some(snapshot) = snapshot {
                self.restore_items(snapshot);
            } else if let Some(c) = self.get_class_mut(&class_name) {
                c.remove_local_property(&final_name);
            }
            return Err(err);
        }
        self.get_class_mut(&class_name)
            .and_then(|c| c.local_property_mut(&final_name))
            .ok_or_else(|| EcError::not_found("property", final_name))
    }

    /// Properties in local classes derived from `class` that `property` would clash with.
    fn derived_property_conflicts(&self, class: &str, property: &EcProperty) -> Vec<Conflict> {
        let key = NameKey::new(property.name());
        let class_ref = self.item_ref(class);
        let mut conflicts = Vec::new();
        for derived in self.derived_classes(&class_ref) {
            let Some(local) = derived.local_property(property.name()) else {
                continue;
            };
            if visible_properties(self, derived, false).contains_key(&key) {
                continue;
            }
            let adopt = if are_compatible(self, property, local) {
                if local.name() == property.name() {
                    continue;
                }
                Some(property.name().to_string())
            } else {
                None
            };
            conflicts.push(Conflict {
                schema: self.name().to_string(),
                class: derived.name().to_string(),
                property: local.name().to_string(),
                adopt,
            });
        }
        conflicts
    }

    // ========================================================================
    // BASE CLASS CONFLICTS
    // ========================================================================

    /// Properties that must be renamed for `base` to be attached to `class`.
    ///
    /// Each property the base exposes is compared with, in order: the property
    /// of the same name already inherited through earlier bases (its topmost
    /// declaration is renamed, together with its overrides), a local property
    /// of `class` (the local one is renamed), and local overrides in classes
    /// derived from `class`.
    pub(crate) fn base_class_conflicts(&self, class: &str, base: &ItemRef) -> Vec<Conflict> {
        let Some(derived) = self.get_class(class) else {
            return Vec::new();
        };
        let Some((base_owner, base_class)) = self.resolve_class_with_owner(base) else {
            return Vec::new();
        };
        let existing = visible_properties(self, derived, false);
        let incoming = visible_properties(base_owner, base_class, true);
        let descendants = self.derived_classes(&self.item_ref(class));

        let mut conflicts = Vec::new();
        for (key, inc) in &incoming {
            if let Some(current) = existing.get(key) {
                if current.is_same(inc) {
                    continue;
                }
                if are_compatible(self, inc.property, current.property) {
                    if inc.property.name() != current.property.name() {
                        conflicts.push(Conflict {
                            schema: inc.owner.name().to_string(),
                            class: inc.class.name().to_string(),
                            property: inc.property.name().to_string(),
                            adopt: Some(current.property.name().to_string()),
                        });
                    }
                    continue;
                }
                // The earlier base's declaration gives way unless only the incoming one can be renamed.
                let root = root_declaration(*current, key);
                let renamed = if root.owner.name().eq_ignore_ascii_case(self.name())
                    || !inc.owner.name().eq_ignore_ascii_case(self.name())
                {
                    root
                } else {
                    *inc
                };
                conflicts.push(Conflict {
                    schema: renamed.owner.name().to_string(),
                    class: renamed.class.name().to_string(),
                    property: renamed.property.name().to_string(),
                    adopt: None,
                });
                continue;
            }
            let overriders = std::iter::once(derived)
                .chain(descendants.iter().copied())
                .filter_map(|c| c.local_property(inc.property.name()).map(|p| (c, p)));
            for (c, local) in overriders {
                if !std::ptr::eq(c, derived) && visible_properties(self, c, false).contains_key(key) {
                    continue;
                }
                let adopt = if are_compatible(self, inc.property, local) {
                    if inc.property.name() == local.name() {
                        continue;
                    }
                    Some(inc.property.name().to_string())
                } else {
                    None
                };
                conflicts.push(Conflict {
                    schema: self.name().to_string(),
                    class: c.name().to_string(),
                    property: local.name().to_string(),
                    adopt,
                });
            }
        }
        conflicts
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    pub(crate) fn check_conflicts_resolvable(&self, conflicts: &[Conflict], policy: ConflictPolicy) -> EcResult<()> {
        for conflict in conflicts {
            let qualified = format!("{}:{}.{}", conflict.schema, conflict.class, conflict.property);
            match &conflict.adopt {
                Some(casing) if !policy.adopt_base_casing => {
                    return Err(EcError::already_exists(qualified, casing.clone()));
                }
                None if !policy.rename_incompatible => {
                    return Err(EcError::mismatch(format!(
                        "property '{qualified}' conflicts with an inherited property of another type"
                    )));
                }
                _ => {}
            }
            if !conflict.schema.eq_ignore_ascii_case(self.name()) {
                return Err(EcError::mismatch(format!(
                    "property '{qualified}' conflicts but is declared in another schema and cannot be renamed"
                )));
            }
        }
        Ok(())
    }

    /// Rename one conflicting property. `scopes` are extra local classes whose
    /// visible properties the new name must not collide with.
    pub(crate) fn apply_conflict(&mut self, conflict: &Conflict, scopes: &[&str]) -> EcResult<()> {
        let Some(property) = self
            .get_class(&conflict.class)
            .and_then(|c| c.local_property(&conflict.property))
            .cloned()
        else {
            debug!(class = %conflict.class, property = %conflict.property, "conflict already resolved by an earlier rename");
            return Ok(());
        };
        let (new_name, record) = match &conflict.adopt {
            Some(casing) => (casing.clone(), false),
            None => (self.fresh_property_name(&conflict.class, &property, scopes), true),
        };
        if record {
            warn!(class = %conflict.class, from = %conflict.property, to = %new_name, "renaming conflicting property");
        } else {
            debug!(class = %conflict.class, from = %conflict.property, to = %new_name, "adopting base property casing");
        }
        self.rename_with_cascade(&conflict.class, &conflict.property, &new_name, record)
    }

    /// First free name of the form `<alias>_<name>_`, `<alias>_<name>__`, ...
    ///
    /// A candidate held by a compatible property in another class is adopted
    /// (the renamed property then overrides it). A candidate held by an
    /// incompatible property, or by any other property of `declaring`, is skipped.
    fn fresh_property_name(&self, declaring: &str, property: &EcProperty, scopes: &[&str]) -> String {
        let mut classes: Vec<&str> = vec![declaring];
        classes.extend_from_slice(scopes);
        let declaring_ref = self.item_ref(declaring);
        let derived: Vec<String> = self
            .derived_classes(&declaring_ref)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        classes.extend(derived.iter().map(String::as_str));

        let views: Vec<_> = classes
            .iter()
            .filter_map(|c| self.get_class(c))
            .map(|c| visible_properties(self, c, true))
            .collect();

        let mut candidate = format!("{}_{}_", self.alias(), property.name());
        loop {
            let key = NameKey::new(&candidate);
            let occupant = views.iter().find_map(|view| view.get(&key));
            match occupant {
                None => return candidate,
                Some(o)
                    if !o.class.name().eq_ignore_ascii_case(declaring)
                        && are_compatible(self, property, o.property) =>
                {
                    return o.property.name().to_string();
                }
                Some(_) => candidate.push('_'),
            }
        }
    }

    /// Rename `old` to `new` in `class` and in local derived classes that
    /// override it with the same name.
    fn rename_with_cascade(&mut self, class: &str, old: &str, new: &str, record: bool) -> EcResult<()> {
        let class_ref = self.item_ref(class);
        let overriders: Vec<String> = self
            .derived_classes(&class_ref)
            .iter()
            .filter(|d| d.local_property(old).is_some())
            .map(|d| d.name().to_string())
            .collect();

        for target in std::iter::once(class.to_string()).chain(overriders) {
            let Some(c) = self.get_class_mut(&target) else {
                continue;
            };
            let Some(actual_old) = c.local_property(old).map(|p| p.name().to_string()) else {
                continue;
            };
            c.rename_local_property(&actual_old, new);
            if record && !actual_old.eq_ignore_ascii_case(new) {
                self.record_rename(&target, &actual_old, new)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // RENAME MAPPING
    // ========================================================================

    /// Append `old|new` to the class's `RenamedPropertiesMapping`, referencing
    /// the conversion attributes schema on first use.
    fn record_rename(&mut self, class: &str, old: &str, new: &str) -> EcResult<()> {
        let ca_class = standard::renamed_properties_mapping_class();
        if !self.name().eq_ignore_ascii_case(standard::CONVERSION_SCHEMA_NAME)
            && self.get_referenced_schema(standard::CONVERSION_SCHEMA_NAME).is_none()
        {
            self.add_referenced_schema(standard::conversion_attributes())?;
        }
        let entry = format!("{old}|{new}");
        let c = self
            .get_class_mut(class)
            .ok_or_else(|| EcError::not_found("class", class))?;
        match c.custom_attributes.get_mut(&ca_class) {
            Some(ca) => {
                let joined = match ca.get(standard::PROPERTY_MAPPING).and_then(|v| v.as_str()) {
                    Some(existing) if !existing.is_empty() => format!("{existing}{MAPPING_SEPARATOR}{entry}"),
                    _ => entry,
                };
                ca.values
                    .insert(standard::PROPERTY_MAPPING.to_string(), InstanceValue::Primitive(joined));
            }
            None => c
                .custom_attributes
                .set(CustomAttribute::new(ca_class).with_value(standard::PROPERTY_MAPPING, entry)),
        }
        Ok(())
    }

    /// Renames recorded on a local class, in recording order.
    pub fn renamed_properties(&self, class: &str) -> Vec<PropertyRename> {
        let Some(c) = self.get_class(class) else {
            return Vec::new();
        };
        c.custom_attributes
            .get_by_name(standard::RENAMED_PROPERTIES_MAPPING)
            .and_then(|ca| ca.get(standard::PROPERTY_MAPPING))
            .and_then(|v| v.as_str())
            .map(|text| {
                text.split(MAPPING_SEPARATOR)
                    .filter_map(|pair| pair.split_once('|'))
                    .map(|(old, new)| PropertyRename {
                        old_name: old.trim().to_string(),
                        new_name: new.trim().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // ROLLBACK
    // ========================================================================

    pub(crate) fn clone_items(&self) -> (IndexMap<NameKey, SchemaItem>, IndexMap<NameKey, SchemaReference>) {
        (self.items.clone(), self.references.clone())
    }

    pub(crate) fn restore_items(&mut self, snapshot: (IndexMap<NameKey, SchemaItem>, IndexMap<NameKey, SchemaReference>)) {
        let (items, references) = snapshot;
        self.items = items;
        self.references = references;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::enumeration::EnumBackingType;

    fn schema() -> Schema {
        Schema::create("TestSchema", "ts", 1, 0, 0).unwrap()
    }

    fn prim(name: &str, ty: PrimitiveType) -> EcProperty {
        EcProperty::primitive(name, ty)
    }

    /// A { Color: int }, B : A
    fn base_and_derived() -> Schema {
        let mut s = schema();
        s.create_entity_class("A").unwrap();
        s.add_property("A", prim("Color", PrimitiveType::Integer), false).unwrap();
        s.create_entity_class("B").unwrap();
        let a = s.item_ref("A");
        s.add_base_class("B", &a, false).unwrap();
        s
    }

    #[test]
    fn test_incompatible_override_rejected_without_resolution() {
        let mut s = base_and_derived();
        let result = s.add_property("B", prim("Color", PrimitiveType::String), false);
        assert!(matches!(result, Err(EcError::DataTypeMismatch(_))));
        assert!(s.get_class("B").unwrap().local_property("Color").is_none());
        assert_eq!(s.referenced_schema_count(), 0);
    }

    #[test]
    fn test_incompatible_override_renamed_with_resolution() {
        let mut s = base_and_derived();
        let p = s.add_property("B", prim("Color", PrimitiveType::String), true).unwrap();
        assert_eq!(p.name(), "ts_Color_");

        assert_eq!(s.property_count("A", true), 1);
        assert_eq!(s.property_count("B", true), 2);
        assert_eq!(
            s.renamed_properties("B"),
            vec![PropertyRename {
                old_name: "Color".into(),
                new_name: "ts_Color_".into()
            }]
        );
        assert!(s.get_referenced_schema(standard::CONVERSION_SCHEMA_NAME).is_some());
    }

    #[test]
    fn test_compatible_override_keeps_name() {
        let mut s = base_and_derived();
        let p = s.add_property("B", prim("Color", PrimitiveType::Integer), false).unwrap();
        assert_eq!(p.name(), "Color");
        assert_eq!(s.property_count("B", true), 1);
        assert!(s.renamed_properties("B").is_empty());
    }

    #[test]
    fn test_case_only_override() {
        let mut s = base_and_derived();
        assert!(matches!(
            s.add_property("B", prim("COLOR", PrimitiveType::Integer), false),
            Err(EcError::NamedItemAlreadyExists { .. })
        ));
        let p = s.add_property("B", prim("COLOR", PrimitiveType::Integer), true).unwrap();
        assert_eq!(p.name(), "Color");
    }

    #[test]
    fn test_candidate_taken_by_incompatible_property() {
        let mut s = schema();
        s.create_entity_class("A").unwrap();
        s.add_property("A", prim("Color", PrimitiveType::Integer), false).unwrap();
        s.add_property("A", prim("ts_Color_", PrimitiveType::Double), false).unwrap();
        s.create_entity_class("B").unwrap();
        let a = s.item_ref("A");
        s.add_base_class("B", &a, false).unwrap();

        let p = s.add_property("B", prim("Color", PrimitiveType::String), true).unwrap();
        assert_eq!(p.name(), "ts_Color__");
    }

    #[test]
    fn test_candidate_held_by_compatible_property_is_adopted() {
        let mut s = schema();
        s.create_entity_class("A").unwrap();
        s.add_property("A", prim("Color", PrimitiveType::Integer), false).unwrap();
        s.add_property("A", prim("ts_color_", PrimitiveType::String), false).unwrap();
        s.create_entity_class("B").unwrap();
        let a = s.item_ref("A");
        s.add_base_class("B", &a, false).unwrap();

        let p = s.add_property("B", prim("Color", PrimitiveType::String), true).unwrap();
        assert_eq!(p.name(), "ts_color_");
    }

    #[test]
    fn test_enumeration_compatible_with_backing_type() {
        let mut s = schema();
        s.create_enumeration("Colors", EnumBackingType::Integer).unwrap();
        let colors = s.item_ref("Colors");
        let mut other = schema();
        other.create_enumeration("Shade", EnumBackingType::String).unwrap();

        assert!(are_compatible(
            &s,
            &EcProperty::enumeration("Color", colors.clone()),
            &prim("Color", PrimitiveType::Integer)
        ));
        assert!(!are_compatible(
            &s,
            &EcProperty::enumeration("Color", colors),
            &prim("Color", PrimitiveType::String)
        ));
        assert!(!are_compatible(
            &s,
            &prim("Color", PrimitiveType::Long),
            &prim("Color", PrimitiveType::Integer)
        ));
    }

    #[test]
    fn test_base_property_added_after_derived_renames_derived() {
        let mut s = schema();
        s.create_entity_class("A").unwrap();
        s.create_entity_class("B").unwrap();
        let a = s.item_ref("A");
        s.add_base_class("B", &a, false).unwrap();
        s.add_property("B", prim("Color", PrimitiveType::String), false).unwrap();

        assert!(matches!(
            s.add_property("A", prim("Color", PrimitiveType::Integer), false),
            Err(EcError::DataTypeMismatch(_))
        ));
        assert!(s.get_class("A").unwrap().local_property("Color").is_none());

        s.add_property("A", prim("Color", PrimitiveType::Integer), true).unwrap();
        assert!(s.get_class("B").unwrap().local_property("ts_Color_").is_some());
        assert_eq!(s.property_count("B", true), 2);
    }

    #[test]
    fn test_second_base_with_conflicting_property() {
        let mut s = schema();
        s.create_entity_class("Fruit").unwrap();
        s.add_property("Fruit", prim("Color", PrimitiveType::Integer), false).unwrap();
        s.create_entity_class("Food").unwrap();
        s.add_property("Food", prim("Color", PrimitiveType::String), false).unwrap();
        s.create_entity_class("Apple").unwrap();
        let (fruit, food) = (s.item_ref("Fruit"), s.item_ref("Food"));
        s.add_base_class("Apple", &fruit, false).unwrap();

        assert!(matches!(
            s.add_base_class("Apple", &food, false),
            Err(EcError::DataTypeMismatch(_))
        ));
        assert_eq!(s.get_class("Apple").unwrap().base_classes().len(), 1);

        s.add_base_class("Apple", &food, true).unwrap();
        assert!(s.get_class("Fruit").unwrap().local_property("ts_Color_").is_some());
        assert_eq!(s.get_class("Food").unwrap().local_property("Color").unwrap().name(), "Color");
        assert_eq!(s.property_count("Apple", true), 2);
        assert_eq!(s.renamed_properties("Fruit")[0].new_name, "ts_Color_");
        assert!(s.renamed_properties("Food").is_empty());
    }

    #[test]
    fn test_rename_cascades_to_overrides() {
        let mut s = schema();
        s.create_entity_class("Fruit").unwrap();
        s.add_property("Fruit", prim("Color", PrimitiveType::Integer), false).unwrap();
        s.create_entity_class("Snack").unwrap();
        let fruit = s.item_ref("Fruit");
        s.add_base_class("Snack", &fruit, false).unwrap();
        s.add_property("Snack", prim("Color", PrimitiveType::Integer), false).unwrap();
        s.create_entity_class("Food").unwrap();
        s.add_property("Food", prim("Color", PrimitiveType::String), false).unwrap();

        s.create_entity_class("Apple").unwrap();
        let (snack, food) = (s.item_ref("Snack"), s.item_ref("Food"));
        s.add_base_class("Apple", &snack, false).unwrap();
        s.add_base_class("Apple", &food, true).unwrap();

        assert!(s.get_class("Fruit").unwrap().local_property("ts_Color_").is_some());
        assert!(s.get_class("Snack").unwrap().local_property("ts_Color_").is_some());
        assert!(s.get_class("Food").unwrap().local_property("Color").is_some());
        assert_eq!(s.renamed_properties("Snack").len(), 1);
        assert_eq!(s.property_count("Apple", true), 2);
    }

    #[test]
    fn test_conflict_in_referenced_schema_cannot_be_resolved() {
        let mut base = Schema::create("Base", "b", 1, 0, 0).unwrap();
        base.create_entity_class("Food").unwrap();
        base.add_property("Food", prim("Color", PrimitiveType::String), false).unwrap();
        let base = base.into_shared();

        let mut s = schema();
        s.add_referenced_schema(base).unwrap();
        s.create_entity_class("Fruit").unwrap();
        s.add_property("Fruit", prim("Color", PrimitiveType::Integer), false).unwrap();
        s.create_entity_class("Apple").unwrap();
        let fruit = s.item_ref("Fruit");
        s.add_base_class("Apple", &fruit, false).unwrap();

        let result = s.add_base_class("Apple", &ItemRef::new("Base", "Food"), true);
        assert!(matches!(result, Err(EcError::DataTypeMismatch(_))));
    }

    #[test]
    fn test_invalid_and_duplicate_property_names() {
        let mut s = base_and_derived();
        assert!(matches!(
            s.add_property("A", prim("", PrimitiveType::Integer), true),
            Err(EcError::InvalidName(_))
        ));
        assert!(matches!(
            s.add_property("A", prim("color", PrimitiveType::Integer), true),
            Err(EcError::NamedItemAlreadyExists { .. })
        ));
        assert!(matches!(
            s.add_property("Missing", prim("X", PrimitiveType::Integer), true),
            Err(EcError::NotFound { .. })
        ));
    }
}
