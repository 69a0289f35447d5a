//! Class hierarchy: base classes, `is_a`, and inherited property visibility.
//!
//! Multiple inheritance is linearized by base class declaration order: when two
//! bases expose the same property name, the first base's property is the one
//! visible in the derived class. A local property takes the slot of the
//! inherited property it overrides.

use indexmap::IndexMap;
use tracing::debug;

use crate::base::{ItemRef, NameKey};
use crate::error::{EcError, EcResult};

use super::class::{ClassModifier, ClassType, EcClass};
use super::conflict::{ConflictPolicy, are_compatible};
use super::property::EcProperty;
use super::Schema;

/// Deep hierarchies beyond this are treated as corrupt rather than walked forever.
const MAX_HIERARCHY_DEPTH: usize = 256;

/// A property as seen from some class, with the class that declares it.
#[derive(Clone, Copy, Debug)]
pub struct VisibleProperty<'a> {
    pub owner: &'a Schema,
    pub class: &'a EcClass,
    pub property: &'a EcProperty,
}

impl VisibleProperty<'_> {
    pub fn declaring_class(&self) -> ItemRef {
        self.owner.item_ref(self.class.name())
    }

    pub fn is_same(&self, other: &VisibleProperty<'_>) -> bool {
        std::ptr::eq(self.property, other.property)
    }
}

/// Properties visible in `class` (owned by `owner`), keyed case-insensitively.
pub(crate) fn visible_properties<'a>(
    owner: &'a Schema,
    class: &'a EcClass,
    include_local: bool,
) -> IndexMap<NameKey, VisibleProperty<'a>> {
    let mut out = IndexMap::new();
    collect_visible(owner, class, include_local, 0, &mut out);
    out
}

fn collect_visible<'a>(
    owner: &'a Schema,
    class: &'a EcClass,
    include_local: bool,
    depth: usize,
    out: &mut IndexMap<NameKey, VisibleProperty<'a>>,
) {
    if depth > MAX_HIERARCHY_DEPTH {
        return;
    }
    for base in class.base_classes() {
        let Some((base_owner, base_class)) = owner.resolve_class_with_owner(base) else {
            continue;
        };
        let mut from_base = IndexMap::new();
        collect_visible(base_owner, base_class, true, depth + 1, &mut from_base);
        for (key, visible) in from_base {
            out.entry(key).or_insert(visible);
        }
    }
    if include_local {
        for property in class.properties() {
            out.insert(
                NameKey::new(property.name()),
                VisibleProperty {
                    owner,
                    class,
                    property,
                },
            );
        }
    }
}

impl Schema {
    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Inherited and local properties of a local class, overrides collapsed.
    pub fn all_properties(&self, class: &str) -> Vec<&EcProperty> {
        let Some(c) = self.get_class(class) else {
            return Vec::new();
        };
        visible_properties(self, c, true)
            .into_values()
            .map(|v| v.property)
            .collect()
    }

    pub fn property_count(&self, class: &str, include_base: bool) -> usize {
        match self.get_class(class) {
            Some(c) if include_base => visible_properties(self, c, true).len(),
            Some(c) => c.local_property_count(),
            None => 0,
        }
    }

    /// Case-insensitive property lookup, optionally through base classes.
    pub fn find_property(&self, class: &str, name: &str, include_base: bool) -> Option<&EcProperty> {
        let c = self.get_class(class)?;
        if let Some(local) = c.local_property(name) {
            return Some(local);
        }
        if !include_base {
            return None;
        }
        visible_properties(self, c, false)
            .get(&NameKey::new(name))
            .map(|v| v.property)
    }

    /// The inherited property a local property overrides, if any.
    pub fn base_property(&self, class: &str, property: &str) -> Option<VisibleProperty<'_>> {
        let c = self.get_class(class)?;
        visible_properties(self, c, false)
            .get(&NameKey::new(property))
            .copied()
    }

    /// Whether `class` is `base` or derives from it, directly or transitively.
    pub fn is_a(&self, class: &ItemRef, base: &ItemRef) -> bool {
        self.is_a_depth(class, base, 0)
    }

    fn is_a_depth(&self, class: &ItemRef, base: &ItemRef, depth: usize) -> bool {
        if class == base {
            return true;
        }
        if depth > MAX_HIERARCHY_DEPTH {
            return false;
        }
        let Some((owner, c)) = self.resolve_class_with_owner(class) else {
            return false;
        };
        c.base_classes()
            .iter()
            .any(|b| owner.is_a_depth(b, base, depth + 1))
    }

    /// Local classes deriving (transitively) from `class`, excluding `class` itself.
    pub fn derived_classes(&self, class: &ItemRef) -> Vec<&EcClass> {
        self.classes()
            .filter(|c| {
                let r = self.item_ref(c.name());
                r != *class && self.is_a(&r, class)
            })
            .collect()
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Append `base` to the base classes of local class `class`.
    ///
    /// Properties the new base brings in are checked against the properties
    /// already visible in `class` and in its local derived classes. Conflicts
    /// fail with `DataTypeMismatch` unless `resolve_conflicts` is set, in which
    /// case the newly introduced property is renamed in its declaring class.
    pub fn add_base_class(&mut self, class: &str, base: &ItemRef, resolve_conflicts: bool) -> EcResult<()> {
        self.add_base_class_with(class, base, ConflictPolicy::from_flag(resolve_conflicts))
    }

    pub(crate) fn add_base_class_with(&mut self, class: &str, base: &ItemRef, policy: ConflictPolicy) -> EcResult<()> {
        let derived = self
            .get_class(class)
            .ok_or_else(|| EcError::not_found("class", class))?;
        let class_ref = self.item_ref(derived.name());
        let class_name = derived.name().to_string();
        if !self.is_referenceable(base) && !self.is_schema_referenced(&base.schema) {
            return Err(EcError::not_referenceable(self.name(), base));
        }
        let base_class = self
            .resolve_class(base)
            .ok_or_else(|| EcError::not_found("class", base.to_string()))?;

        if derived.base_classes().contains(base) {
            return Err(EcError::already_exists(class_ref.to_string(), base.to_string()));
        }
        if base_class.modifier == ClassModifier::Sealed {
            return Err(EcError::PropertyNotSupported(format!("'{base}' is sealed")));
        }
        let base_is_rel = matches!(base_class.class_type, ClassType::Relationship(_));
        let derived_is_rel = matches!(derived.class_type, ClassType::Relationship(_));
        if base_is_rel != derived_is_rel {
            return Err(EcError::mismatch(format!(
                "'{base}' is a {} class and cannot be a base of {} class '{class_ref}'",
                base_class.class_type.type_name(),
                derived.class_type.type_name()
            )));
        }
        if *base == class_ref || self.is_a(base, &class_ref) {
            return Err(EcError::BaseClassCycle {
                class: class_ref.to_string(),
                base: base.to_string(),
            });
        }

        let conflicts = self.base_class_conflicts(&class_name, base);
        if conflicts.is_empty() {
            self.ensure_referenceable(base)?;
            self.push_base_class(&class_name, base.clone());
            return Ok(());
        }
        self.check_conflicts_resolvable(&conflicts, policy)?;

        let snapshot = self.clone_items();
        let result = (|| -> EcResult<()> {
            self.ensure_referenceable(base)?;
            self.push_base_class(&class_name, base.clone());
            for conflict in &conflicts {
                self.apply_conflict(conflict, &[class_name.as_str()])?;
            }
            Ok(())
        })();
        if result.is_err() {
            self.restore_items(snapshot);
        }
        result
    }

    fn push_base_class(&mut self, class: &str, base: ItemRef) {
        if let Some(c) = self.get_class_mut(class) {
            debug!(class = c.name(), base = %base, "attaching base class");
            c.base_classes.push(base);
        }
    }

    /// Detach a base class. Properties renamed because of it keep their names.
    pub fn remove_base_class(&mut self, class: &str, base: &ItemRef) -> EcResult<()> {
        let c = self
            .get_class_mut(class)
            .ok_or_else(|| EcError::not_found("class", class))?;
        let idx = c
            .base_classes
            .iter()
            .position(|b| b == base)
            .ok_or_else(|| EcError::not_found("base class", base.to_string()))?;
        c.base_classes.remove(idx);
        Ok(())
    }

    /// Remove a local property. Overrides in derived classes are kept.
    pub fn remove_property(&mut self, class: &str, property: &str) -> EcResult<EcProperty> {
        self.get_class_mut(class)
            .ok_or_else(|| EcError::not_found("class", class))?
            .remove_local_property(property)
            .ok_or_else(|| EcError::not_found("property", format!("{class}.{property}")))
    }

    /// Whether two properties may stand in an override relationship.
    pub fn properties_compatible(&self, a: &EcProperty, b: &EcProperty) -> bool {
        are_compatible(self, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::property::PrimitiveType;

    fn schema() -> Schema {
        Schema::create("TestSchema", "ts", 1, 0, 0).unwrap()
    }

    #[test]
    fn test_is_a_and_cycles() {
        let mut s = schema();
        s.create_entity_class("A").unwrap();
        s.create_entity_class("B").unwrap();
        s.create_entity_class("C").unwrap();
        let (a, b, c) = (s.item_ref("A"), s.item_ref("B"), s.item_ref("C"));
        s.add_base_class("B", &a, false).unwrap();
        s.add_base_class("C", &b, false).unwrap();

        assert!(s.is_a(&c, &a));
        assert!(!s.is_a(&a, &c));
        assert!(matches!(
            s.add_base_class("A", &c, false),
            Err(EcError::BaseClassCycle { .. })
        ));
        assert!(matches!(
            s.add_base_class("A", &a, false),
            Err(EcError::BaseClassCycle { .. })
        ));
        assert!(matches!(
            s.add_base_class("C", &b, false),
            Err(EcError::NamedItemAlreadyExists { .. })
        ));
        assert_eq!(s.derived_classes(&a).len(), 2);
    }

    #[test]
    fn test_inherited_properties_and_overrides() {
        let mut s = schema();
        s.create_entity_class("A").unwrap();
        s.add_property("A", EcProperty::primitive("Name", PrimitiveType::String), false)
            .unwrap();
        s.add_property("A", EcProperty::primitive("Size", PrimitiveType::Double), false)
            .unwrap();
        s.create_entity_class("B").unwrap();
        let a = s.item_ref("A");
        s.add_base_class("B", &a, false).unwrap();
        s.add_property("B", EcProperty::primitive("Extra", PrimitiveType::Integer), false)
            .unwrap();
        s.add_property("B", EcProperty::primitive("Size", PrimitiveType::Double), false)
            .unwrap();

        let names: Vec<_> = s.all_properties("B").iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Name", "Size", "Extra"]);
        assert_eq!(s.property_count("B", true), 3);
        assert_eq!(s.property_count("B", false), 2);
        assert!(s.find_property("B", "name", true).is_some());
        assert!(s.find_property("B", "name", false).is_none());

        let base = s.base_property("B", "Size").unwrap();
        assert_eq!(base.declaring_class(), a);
    }

    #[test]
    fn test_sealed_and_relationship_bases_rejected() {
        let mut s = schema();
        s.create_entity_class("Sealed").unwrap().modifier = ClassModifier::Sealed;
        s.create_entity_class("Child").unwrap();
        s.create_relationship_class("Rel").unwrap();
        let sealed = s.item_ref("Sealed");
        let rel = s.item_ref("Rel");

        assert!(matches!(
            s.add_base_class("Child", &sealed, false),
            Err(EcError::PropertyNotSupported(_))
        ));
        assert!(matches!(
            s.add_base_class("Child", &rel, false),
            Err(EcError::DataTypeMismatch(_))
        ));
        assert!(s.get_class("Child").unwrap().base_classes().is_empty());
    }

    #[test]
    fn test_remove_base_class() {
        let mut s = schema();
        s.create_entity_class("A").unwrap();
        s.create_entity_class("B").unwrap();
        let a = s.item_ref("A");
        s.add_base_class("B", &a, false).unwrap();
        s.remove_base_class("B", &a).unwrap();
        assert!(!s.is_a(&s.item_ref("B"), &a));
        assert!(matches!(
            s.remove_base_class("B", &a),
            Err(EcError::NotFound { .. })
        ));
    }
}
