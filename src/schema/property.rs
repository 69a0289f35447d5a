//! Class properties.
//!
//! A property's kind is a closed sum type; the `as_*` accessors return `None`
//! when the property is of another kind.

use crate::base::ItemRef;

use super::custom_attribute::CustomAttributes;

// ============================================================================
// PRIMITIVE TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Binary,
    Boolean,
    DateTime,
    Double,
    Integer,
    Long,
    Point2d,
    Point3d,
    String,
    IGeometry,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 10] = [
        Self::Binary,
        Self::Boolean,
        Self::DateTime,
        Self::Double,
        Self::Integer,
        Self::Long,
        Self::Point2d,
        Self::Point3d,
        Self::String,
        Self::IGeometry,
    ];

    /// Type name as written in documents.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Boolean => "boolean",
            Self::DateTime => "dateTime",
            Self::Double => "double",
            Self::Integer => "int",
            Self::Long => "long",
            Self::Point2d => "point2d",
            Self::Point3d => "point3d",
            Self::String => "string",
            Self::IGeometry => "Bentley.Geometry.Common.IGeometry",
        }
    }

    /// Parse a document type name. Accepts the common aliases.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let ty = match lower.as_str() {
            "binary" | "bytes" => Self::Binary,
            "boolean" | "bool" => Self::Boolean,
            "datetime" => Self::DateTime,
            "double" => Self::Double,
            "int" | "integer" => Self::Integer,
            "long" => Self::Long,
            "point2d" => Self::Point2d,
            "point3d" => Self::Point3d,
            "string" => Self::String,
            "bentley.geometry.common.igeometry" | "igeometry" => Self::IGeometry,
            _ => return None,
        };
        Some(ty)
    }
}

/// The value type of a primitive or primitive-array property.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTypeRef {
    Primitive(PrimitiveType),
    Enumeration(ItemRef),
}

impl From<PrimitiveType> for PrimitiveTypeRef {
    fn from(ty: PrimitiveType) -> Self {
        Self::Primitive(ty)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NavigationDirection {
    #[default]
    Forward,
    Backward,
}

impl NavigationDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "Forward",
            Self::Backward => "Backward",
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

/// Array occurrence bounds. `max_occurs == None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ArrayBounds {
    pub min_occurs: u32,
    pub max_occurs: Option<u32>,
}

// ============================================================================
// PROPERTY KIND
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKind {
    Primitive {
        ty: PrimitiveTypeRef,
    },
    Struct {
        struct_class: ItemRef,
    },
    PrimitiveArray {
        ty: PrimitiveTypeRef,
        bounds: ArrayBounds,
    },
    StructArray {
        struct_class: ItemRef,
        bounds: ArrayBounds,
    },
    Navigation {
        relationship: ItemRef,
        direction: NavigationDirection,
    },
}

impl PropertyKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Primitive { .. } => "primitive",
            Self::Struct { .. } => "struct",
            Self::PrimitiveArray { .. } => "primitive array",
            Self::StructArray { .. } => "struct array",
            Self::Navigation { .. } => "navigation",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::PrimitiveArray { .. } | Self::StructArray { .. })
    }
}

// ============================================================================
// PROPERTY
// ============================================================================

/// A property owned by exactly one class.
///
/// The base property an override refines is not stored; it is found on demand
/// by walking the owning class's base classes.
#[derive(Clone, Debug, PartialEq)]
pub struct EcProperty {
    name: String,
    pub display_label: Option<String>,
    pub description: String,
    pub kind: PropertyKind,
    pub is_readonly: bool,
    pub priority: i32,
    pub category: Option<ItemRef>,
    pub kind_of_quantity: Option<ItemRef>,
    pub extended_type: Option<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub custom_attributes: CustomAttributes,
}

impl EcProperty {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            display_label: None,
            description: String::new(),
            kind,
            is_readonly: false,
            priority: 0,
            category: None,
            kind_of_quantity: None,
            extended_type: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            custom_attributes: CustomAttributes::new(),
        }
    }

    pub fn primitive(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Self::new(
            name,
            PropertyKind::Primitive {
                ty: PrimitiveTypeRef::Primitive(ty),
            },
        )
    }

    pub fn enumeration(name: impl Into<String>, enumeration: ItemRef) -> Self {
        Self::new(
            name,
            PropertyKind::Primitive {
                ty: PrimitiveTypeRef::Enumeration(enumeration),
            },
        )
    }

    pub fn structure(name: impl Into<String>, struct_class: ItemRef) -> Self {
        Self::new(name, PropertyKind::Struct { struct_class })
    }

    pub fn primitive_array(name: impl Into<String>, ty: impl Into<PrimitiveTypeRef>) -> Self {
        Self::new(
            name,
            PropertyKind::PrimitiveArray {
                ty: ty.into(),
                bounds: ArrayBounds::default(),
            },
        )
    }

    pub fn struct_array(name: impl Into<String>, struct_class: ItemRef) -> Self {
        Self::new(
            name,
            PropertyKind::StructArray {
                struct_class,
                bounds: ArrayBounds::default(),
            },
        )
    }

    pub fn navigation(
        name: impl Into<String>,
        relationship: ItemRef,
        direction: NavigationDirection,
    ) -> Self {
        Self::new(
            name,
            PropertyKind::Navigation {
                relationship,
                direction,
            },
        )
    }

    pub fn with_kind_of_quantity(mut self, koq: ItemRef) -> Self {
        self.kind_of_quantity = Some(koq);
        self
    }

    pub fn with_category(mut self, category: ItemRef) -> Self {
        self.category = Some(category);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn display_label(&self) -> &str {
        self.display_label.as_deref().unwrap_or(&self.name)
    }

    /// Primitive type of a primitive property.
    pub fn as_primitive(&self) -> Option<&PrimitiveTypeRef> {
        match &self.kind {
            PropertyKind::Primitive { ty } => Some(ty),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&ItemRef> {
        match &self.kind {
            PropertyKind::Struct { struct_class } => Some(struct_class),
            _ => None,
        }
    }

    pub fn as_primitive_array(&self) -> Option<(&PrimitiveTypeRef, &ArrayBounds)> {
        match &self.kind {
            PropertyKind::PrimitiveArray { ty, bounds } => Some((ty, bounds)),
            _ => None,
        }
    }

    pub fn as_struct_array(&self) -> Option<(&ItemRef, &ArrayBounds)> {
        match &self.kind {
            PropertyKind::StructArray {
                struct_class,
                bounds,
            } => Some((struct_class, bounds)),
            _ => None,
        }
    }

    pub fn as_navigation(&self) -> Option<(&ItemRef, NavigationDirection)> {
        match &self.kind {
            PropertyKind::Navigation {
                relationship,
                direction,
            } => Some((relationship, *direction)),
            _ => None,
        }
    }

    /// Plain primitive type, when the property is a primitive of a built-in type.
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match self.as_primitive()? {
            PrimitiveTypeRef::Primitive(ty) => Some(*ty),
            PrimitiveTypeRef::Enumeration(_) => None,
        }
    }

    pub fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        match &self.kind {
            PropertyKind::Primitive { ty } | PropertyKind::PrimitiveArray { ty, .. } => {
                if let PrimitiveTypeRef::Enumeration(e) = ty {
                    f(e);
                }
            }
            PropertyKind::Struct { struct_class } | PropertyKind::StructArray { struct_class, .. } => {
                f(struct_class)
            }
            PropertyKind::Navigation { relationship, .. } => f(relationship),
        }
        if let Some(cat) = &self.category {
            f(cat);
        }
        if let Some(koq) = &self.kind_of_quantity {
            f(koq);
        }
        self.custom_attributes.visit_refs(f);
    }

    pub fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        match &mut self.kind {
            PropertyKind::Primitive { ty } | PropertyKind::PrimitiveArray { ty, .. } => {
                if let PrimitiveTypeRef::Enumeration(e) = ty {
                    f(e);
                }
            }
            PropertyKind::Struct { struct_class } | PropertyKind::StructArray { struct_class, .. } => {
                f(struct_class)
            }
            PropertyKind::Navigation { relationship, .. } => f(relationship),
        }
        if let Some(cat) = &mut self.category {
            f(cat);
        }
        if let Some(koq) = &mut self.kind_of_quantity {
            f(koq);
        }
        self.custom_attributes.visit_refs_mut(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("int", PrimitiveType::Integer)]
    #[case("string", PrimitiveType::String)]
    #[case("dateTime", PrimitiveType::DateTime)]
    #[case("Bentley.Geometry.Common.IGeometry", PrimitiveType::IGeometry)]
    fn test_primitive_type_names(#[case] name: &str, #[case] ty: PrimitiveType) {
        assert_eq!(PrimitiveType::from_type_name(name), Some(ty));
        assert_eq!(PrimitiveType::from_type_name(ty.type_name()), Some(ty));
    }

    #[test]
    fn test_unknown_type_name() {
        assert_eq!(PrimitiveType::from_type_name("banana"), None);
    }

    #[test]
    fn test_kind_accessors() {
        let p = EcProperty::primitive("Color", PrimitiveType::Integer);
        assert_eq!(p.primitive_type(), Some(PrimitiveType::Integer));
        assert!(p.as_struct().is_none());
        assert!(p.as_navigation().is_none());

        let nav = EcProperty::navigation("Parent", ItemRef::new("S", "Rel"), NavigationDirection::Backward);
        let (rel, dir) = nav.as_navigation().unwrap();
        assert_eq!(rel.name, "Rel");
        assert_eq!(dir, NavigationDirection::Backward);
        assert!(nav.as_primitive().is_none());
    }

    #[test]
    fn test_visit_refs_covers_koq_and_category() {
        let p = EcProperty::enumeration("Kind", ItemRef::new("S", "E"))
            .with_kind_of_quantity(ItemRef::new("S", "Length"))
            .with_category(ItemRef::new("S", "Cat"));
        let mut seen = Vec::new();
        p.visit_refs(&mut |r| seen.push(r.name.clone()));
        assert_eq!(seen, vec!["E", "Cat", "Length"]);
    }
}
