//! Classes: entity, mixin, struct, custom attribute and relationship classes.

use std::fmt;

use indexmap::IndexMap;

use crate::base::{ItemRef, NameKey};

use super::custom_attribute::CustomAttributes;
use super::item::ItemInfo;
use super::property::EcProperty;

// ============================================================================
// MODIFIERS
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClassModifier {
    #[default]
    None,
    Abstract,
    Sealed,
}

impl ClassModifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Abstract => "Abstract",
            Self::Sealed => "Sealed",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "abstract" => Some(Self::Abstract),
            "sealed" => Some(Self::Sealed),
            _ => None,
        }
    }
}

// ============================================================================
// RELATIONSHIPS
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StrengthType {
    #[default]
    Referencing,
    Holding,
    Embedding,
}

impl StrengthType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Referencing => "referencing",
            Self::Holding => "holding",
            Self::Embedding => "embedding",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "referencing" => Some(Self::Referencing),
            "holding" => Some(Self::Holding),
            "embedding" => Some(Self::Embedding),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StrengthDirection {
    #[default]
    Forward,
    Backward,
}

impl StrengthDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "forward" => Some(Self::Forward),
            "backward" => Some(Self::Backward),
            _ => None,
        }
    }
}

/// Constraint multiplicity. `upper == None` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Multiplicity {
    pub lower: u32,
    pub upper: Option<u32>,
}

impl Default for Multiplicity {
    fn default() -> Self {
        Self::ZERO_ONE
    }
}

impl Multiplicity {
    pub const ZERO_ONE: Self = Self { lower: 0, upper: Some(1) };
    pub const ZERO_MANY: Self = Self { lower: 0, upper: None };
    pub const ONE_ONE: Self = Self { lower: 1, upper: Some(1) };
    pub const ONE_MANY: Self = Self { lower: 1, upper: None };

    pub fn new(lower: u32, upper: Option<u32>) -> Self {
        Self { lower, upper }
    }

    /// Parse `(0..*)`, `(1..1)` and friends.
    pub fn parse(text: &str) -> Option<Self> {
        let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
        let (lower, upper) = inner.split_once("..")?;
        Self::from_bounds(lower, upper)
    }

    /// Parse a legacy cardinality: `(0,N)`, `(1, 1)`, `UNBOUNDED`, `1`, `N`.
    pub fn parse_legacy(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            let (lower, upper) = inner.split_once(',')?;
            return Self::from_bounds(lower, upper);
        }
        match text.to_ascii_uppercase().as_str() {
            "UNBOUNDED" | "N" | "*" => Some(Self::ZERO_MANY),
            other => {
                let upper: u32 = other.parse().ok()?;
                Some(Self::new(0, Some(upper)))
            }
        }
    }

    fn from_bounds(lower: &str, upper: &str) -> Option<Self> {
        let lower = lower.trim().parse().ok()?;
        let upper = match upper.trim() {
            "*" | "N" | "n" => None,
            u => Some(u.parse().ok()?),
        };
        if matches!(upper, Some(u) if u < lower) {
            return None;
        }
        Some(Self::new(lower, upper))
    }

    /// `(lower,N)` legacy form.
    pub fn to_legacy_string(&self) -> String {
        match self.upper {
            Some(u) => format!("({},{})", self.lower, u),
            None => format!("({},N)", self.lower),
        }
    }

    /// True when `self` allows no more than `other` does.
    pub fn is_narrower_or_equal(&self, other: &Multiplicity) -> bool {
        let upper_ok = match (self.upper, other.upper) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a <= b,
        };
        self.lower >= other.lower && upper_ok
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(u) => write!(f, "({}..{})", self.lower, u),
            None => write!(f, "({}..*)", self.lower),
        }
    }
}

/// One end of a relationship.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipConstraint {
    pub role_label: String,
    pub is_polymorphic: bool,
    pub multiplicity: Multiplicity,
    pub abstract_constraint: Option<ItemRef>,
    pub constraint_classes: Vec<ItemRef>,
    pub custom_attributes: CustomAttributes,
}

impl RelationshipConstraint {
    /// The explicit abstract constraint, or the single constraint class.
    pub fn effective_abstract_constraint(&self) -> Option<&ItemRef> {
        self.abstract_constraint.as_ref().or_else(|| match self.constraint_classes.as_slice() {
            [only] => Some(only),
            _ => None,
        })
    }

    fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        if let Some(r) = &self.abstract_constraint {
            f(r);
        }
        for r in &self.constraint_classes {
            f(r);
        }
        self.custom_attributes.visit_refs(f);
    }

    fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        if let Some(r) = &mut self.abstract_constraint {
            f(r);
        }
        for r in &mut self.constraint_classes {
            f(r);
        }
        self.custom_attributes.visit_refs_mut(f);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipInfo {
    pub strength: StrengthType,
    pub direction: StrengthDirection,
    pub source: RelationshipConstraint,
    pub target: RelationshipConstraint,
}

// ============================================================================
// CLASS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum ClassType {
    Entity,
    /// Entity mixin restricted to subclasses of `applies_to`.
    Mixin { applies_to: Option<ItemRef> },
    Struct,
    /// Custom attribute class; `applies_to` is the container-type list as written.
    CustomAttribute { applies_to: Option<String> },
    Relationship(Box<RelationshipInfo>),
}

impl ClassType {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Mixin { .. } => "mixin",
            Self::Struct => "struct",
            Self::CustomAttribute { .. } => "custom attribute",
            Self::Relationship(_) => "relationship",
        }
    }

    /// True when both are the same variant, ignoring payloads.
    pub fn same_variant(&self, other: &ClassType) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A class: base classes in declaration order plus ordered local properties.
///
/// Base classes and properties are changed through the owning schema, which
/// enforces hierarchy and conflict rules.
#[derive(Clone, Debug, PartialEq)]
pub struct EcClass {
    pub info: ItemInfo,
    pub class_type: ClassType,
    pub modifier: ClassModifier,
    pub(crate) base_classes: Vec<ItemRef>,
    pub(crate) properties: IndexMap<NameKey, EcProperty>,
    pub custom_attributes: CustomAttributes,
}

impl EcClass {
    pub fn new(name: impl Into<String>, class_type: ClassType) -> Self {
        Self {
            info: ItemInfo::new(name),
            class_type,
            modifier: ClassModifier::None,
            base_classes: Vec::new(),
            properties: IndexMap::new(),
            custom_attributes: CustomAttributes::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn base_classes(&self) -> &[ItemRef] {
        &self.base_classes
    }

    pub fn has_base_classes(&self) -> bool {
        !self.base_classes.is_empty()
    }

    /// Local properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &EcProperty> {
        self.properties.values()
    }

    pub fn local_property(&self, name: &str) -> Option<&EcProperty> {
        self.properties.get(&NameKey::new(name))
    }

    pub fn local_property_mut(&mut self, name: &str) -> Option<&mut EcProperty> {
        self.properties.get_mut(&NameKey::new(name))
    }

    pub fn local_property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.class_type, ClassType::Entity | ClassType::Mixin { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.class_type, ClassType::Struct)
    }

    pub fn is_custom_attribute_class(&self) -> bool {
        matches!(self.class_type, ClassType::CustomAttribute { .. })
    }

    pub fn is_mixin(&self) -> bool {
        matches!(self.class_type, ClassType::Mixin { .. })
    }

    pub fn relationship(&self) -> Option<&RelationshipInfo> {
        match &self.class_type {
            ClassType::Relationship(info) => Some(info),
            _ => None,
        }
    }

    pub fn relationship_mut(&mut self) -> Option<&mut RelationshipInfo> {
        match &mut self.class_type {
            ClassType::Relationship(info) => Some(info),
            _ => None,
        }
    }

    /// Insert without any hierarchy checks; used while a document is assembled.
    pub(crate) fn insert_property_raw(&mut self, property: EcProperty) {
        self.properties.insert(NameKey::new(property.name()), property);
    }

    /// Rename a local property in place, keeping its declaration position.
    pub(crate) fn rename_local_property(&mut self, old: &str, new: &str) -> bool {
        let Some(idx) = self.properties.get_index_of(&NameKey::new(old)) else {
            return false;
        };
        let Some((_, mut property)) = self.properties.shift_remove_index(idx) else {
            return false;
        };
        property.set_name(new);
        let (end, _) = self.properties.insert_full(NameKey::new(new), property);
        self.properties.move_index(end, idx);
        true
    }

    pub(crate) fn remove_local_property(&mut self, name: &str) -> Option<EcProperty> {
        self.properties.shift_remove(&NameKey::new(name))
    }

    pub fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        for base in &self.base_classes {
            f(base);
        }
        match &self.class_type {
            ClassType::Mixin {
                applies_to: Some(r),
            } => f(r),
            ClassType::Relationship(info) => {
                info.source.visit_refs(f);
                info.target.visit_refs(f);
            }
            _ => {}
        }
        for property in self.properties.values() {
            property.visit_refs(f);
        }
        self.custom_attributes.visit_refs(f);
    }

    pub fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        for base in &mut self.base_classes {
            f(base);
        }
        match &mut self.class_type {
            ClassType::Mixin {
                applies_to: Some(r),
            } => f(r),
            ClassType::Relationship(info) => {
                info.source.visit_refs_mut(f);
                info.target.visit_refs_mut(f);
            }
            _ => {}
        }
        for property in self.properties.values_mut() {
            property.visit_refs_mut(f);
        }
        self.custom_attributes.visit_refs_mut(f);
    }

    /// References that must exist before this class can be attached in a
    /// dependency-ordered pass: base classes, mixin target and constraint classes.
    pub fn structural_dependencies(&self) -> Vec<ItemRef> {
        let mut deps = self.base_classes.clone();
        match &self.class_type {
            ClassType::Mixin {
                applies_to: Some(r),
            } => deps.push(r.clone()),
            ClassType::Relationship(info) => {
                for constraint in [&info.source, &info.target] {
                    deps.extend(constraint.abstract_constraint.iter().cloned());
                    deps.extend(constraint.constraint_classes.iter().cloned());
                }
            }
            _ => {}
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::property::PrimitiveType;
    use rstest::rstest;

    #[rstest]
    #[case("(0..1)", Multiplicity::ZERO_ONE)]
    #[case("(0..*)", Multiplicity::ZERO_MANY)]
    #[case("(1..1)", Multiplicity::ONE_ONE)]
    #[case(" (2..5) ", Multiplicity::new(2, Some(5)))]
    fn test_multiplicity_parse(#[case] text: &str, #[case] expected: Multiplicity) {
        assert_eq!(Multiplicity::parse(text), Some(expected));
        assert_eq!(Multiplicity::parse(&expected.to_string()), Some(expected));
    }

    #[rstest]
    #[case("(0,N)", Multiplicity::ZERO_MANY)]
    #[case("(0, 1)", Multiplicity::ZERO_ONE)]
    #[case("(1,1)", Multiplicity::ONE_ONE)]
    #[case("UNBOUNDED", Multiplicity::ZERO_MANY)]
    #[case("1", Multiplicity::ZERO_ONE)]
    fn test_multiplicity_parse_legacy(#[case] text: &str, #[case] expected: Multiplicity) {
        assert_eq!(Multiplicity::parse_legacy(text), Some(expected));
    }

    #[test]
    fn test_multiplicity_rejects_inverted_bounds() {
        assert_eq!(Multiplicity::parse("(3..1)"), None);
        assert_eq!(Multiplicity::parse("0..1"), None);
    }

    #[test]
    fn test_rename_keeps_position() {
        let mut class = EcClass::new("A", ClassType::Entity);
        class.insert_property_raw(EcProperty::primitive("First", PrimitiveType::Integer));
        class.insert_property_raw(EcProperty::primitive("Color", PrimitiveType::String));
        class.insert_property_raw(EcProperty::primitive("Last", PrimitiveType::Double));

        assert!(class.rename_local_property("color", "ts_Color_"));
        let names: Vec<_> = class.properties().map(|p| p.name()).collect();
        assert_eq!(names, vec!["First", "ts_Color_", "Last"]);
        assert!(class.local_property("Color").is_none());
        assert!(class.local_property("TS_COLOR_").is_some());
    }

    #[test]
    fn test_effective_abstract_constraint() {
        let mut c = RelationshipConstraint::default();
        assert!(c.effective_abstract_constraint().is_none());
        c.constraint_classes.push(ItemRef::new("S", "A"));
        assert_eq!(c.effective_abstract_constraint().unwrap().name, "A");
        c.constraint_classes.push(ItemRef::new("S", "B"));
        assert!(c.effective_abstract_constraint().is_none());
    }
}
