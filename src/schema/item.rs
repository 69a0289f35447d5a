//! Named schema items and the closed set of item variants.

use crate::base::ItemRef;

use super::class::EcClass;
use super::enumeration::Enumeration;
use super::units::{Format, KindOfQuantity, Phenomenon, Unit, UnitSystem};

// ============================================================================
// ITEM INFO
// ============================================================================

/// Name, label and description shared by every schema item.
///
/// The name is fixed once the item is stored in a schema; renames go through
/// the owning schema so its case-insensitive index stays consistent.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemInfo {
    name: String,
    pub display_label: Option<String>,
    pub description: String,
}

impl ItemInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_label: None,
            description: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit label, or the name when none is set.
    pub fn display_label(&self) -> &str {
        self.display_label.as_deref().unwrap_or(&self.name)
    }

    pub fn is_display_label_defined(&self) -> bool {
        self.display_label.is_some()
    }
}

// ============================================================================
// PROPERTY CATEGORY
// ============================================================================

/// Grouping hint for properties in user interfaces.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyCategory {
    pub info: ItemInfo,
    pub priority: i32,
}

impl PropertyCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ItemInfo::new(name),
            priority: 0,
        }
    }
}

// ============================================================================
// ITEM KINDS
// ============================================================================

/// Discriminant of [`SchemaItem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Enumeration,
    UnitSystem,
    Phenomenon,
    Unit,
    Format,
    KindOfQuantity,
    PropertyCategory,
    Class,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enumeration => "enumeration",
            Self::UnitSystem => "unit system",
            Self::Phenomenon => "phenomenon",
            Self::Unit => "unit",
            Self::Format => "format",
            Self::KindOfQuantity => "kind of quantity",
            Self::PropertyCategory => "property category",
            Self::Class => "class",
        }
    }
}

/// Any independently named thing a schema can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaItem {
    Class(EcClass),
    Enumeration(Enumeration),
    KindOfQuantity(KindOfQuantity),
    PropertyCategory(PropertyCategory),
    Unit(Unit),
    Phenomenon(Phenomenon),
    UnitSystem(UnitSystem),
    Format(Format),
}

macro_rules! each_variant {
    ($value:expr, $item:ident => $body:expr) => {
        match $value {
            SchemaItem::Class($item) => $body,
            SchemaItem::Enumeration($item) => $body,
            SchemaItem::KindOfQuantity($item) => $body,
            SchemaItem::PropertyCategory($item) => $body,
            SchemaItem::Unit($item) => $body,
            SchemaItem::Phenomenon($item) => $body,
            SchemaItem::UnitSystem($item) => $body,
            SchemaItem::Format($item) => $body,
        }
    };
}

impl SchemaItem {
    pub fn info(&self) -> &ItemInfo {
        each_variant!(self, item => &item.info)
    }

    pub fn info_mut(&mut self) -> &mut ItemInfo {
        each_variant!(self, item => &mut item.info)
    }

    pub fn name(&self) -> &str {
        self.info().name()
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Class(_) => ItemKind::Class,
            Self::Enumeration(_) => ItemKind::Enumeration,
            Self::KindOfQuantity(_) => ItemKind::KindOfQuantity,
            Self::PropertyCategory(_) => ItemKind::PropertyCategory,
            Self::Unit(_) => ItemKind::Unit,
            Self::Phenomenon(_) => ItemKind::Phenomenon,
            Self::UnitSystem(_) => ItemKind::UnitSystem,
            Self::Format(_) => ItemKind::Format,
        }
    }

    pub fn as_class(&self) -> Option<&EcClass> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut EcClass> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Visit every item reference held by this item, including nested properties
    /// and custom attribute instances.
    pub fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        match self {
            Self::Class(c) => c.visit_refs(f),
            Self::KindOfQuantity(k) => k.visit_refs(f),
            Self::Unit(u) => u.visit_refs(f),
            Self::Format(fmt) => fmt.visit_refs(f),
            Self::Enumeration(_)
            | Self::PropertyCategory(_)
            | Self::Phenomenon(_)
            | Self::UnitSystem(_) => {}
        }
    }

    pub fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        match self {
            Self::Class(c) => c.visit_refs_mut(f),
            Self::KindOfQuantity(k) => k.visit_refs_mut(f),
            Self::Unit(u) => u.visit_refs_mut(f),
            Self::Format(fmt) => fmt.visit_refs_mut(f),
            Self::Enumeration(_)
            | Self::PropertyCategory(_)
            | Self::Phenomenon(_)
            | Self::UnitSystem(_) => {}
        }
    }

    /// All references held by this item, deduplicated, in visit order.
    pub fn dependencies(&self) -> Vec<ItemRef> {
        let mut deps: Vec<ItemRef> = Vec::new();
        self.visit_refs(&mut |r| {
            if !deps.contains(r) {
                deps.push(r.clone());
            }
        });
        deps
    }
}

// ============================================================================
// TYPED ACCESS
// ============================================================================

/// Typed view over one [`SchemaItem`] variant.
///
/// Lets lookups like `schema.get::<Unit>("M")` return the concrete type or `None`.
pub trait ItemVariant: Sized {
    const KIND: ItemKind;

    fn from_item(item: &SchemaItem) -> Option<&Self>;
    fn from_item_mut(item: &mut SchemaItem) -> Option<&mut Self>;
    fn into_item(self) -> SchemaItem;
    fn item_info(&self) -> &ItemInfo;
}

macro_rules! impl_item_variant {
    ($ty:ty, $variant:ident) => {
        impl ItemVariant for $ty {
            const KIND: ItemKind = ItemKind::$variant;

            fn from_item(item: &SchemaItem) -> Option<&Self> {
                match item {
                    SchemaItem::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_item_mut(item: &mut SchemaItem) -> Option<&mut Self> {
                match item {
                    SchemaItem::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_item(self) -> SchemaItem {
                SchemaItem::$variant(self)
            }

            fn item_info(&self) -> &ItemInfo {
                &self.info
            }
        }

        impl From<$ty> for SchemaItem {
            fn from(value: $ty) -> Self {
                SchemaItem::$variant(value)
            }
        }
    };
}

impl_item_variant!(EcClass, Class);
impl_item_variant!(Enumeration, Enumeration);
impl_item_variant!(KindOfQuantity, KindOfQuantity);
impl_item_variant!(PropertyCategory, PropertyCategory);
impl_item_variant!(Unit, Unit);
impl_item_variant!(Phenomenon, Phenomenon);
impl_item_variant!(UnitSystem, UnitSystem);
impl_item_variant!(Format, Format);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label_falls_back_to_name() {
        let mut info = ItemInfo::new("Widget");
        assert_eq!(info.display_label(), "Widget");
        assert!(!info.is_display_label_defined());

        info.display_label = Some("Fancy Widget".into());
        assert_eq!(info.display_label(), "Fancy Widget");
        assert_eq!(info.name(), "Widget");
    }

    #[test]
    fn test_typed_access() {
        let item: SchemaItem = PropertyCategory::new("Geometry").into();
        assert_eq!(item.kind(), ItemKind::PropertyCategory);
        assert!(PropertyCategory::from_item(&item).is_some());
        assert!(Unit::from_item(&item).is_none());
        assert!(item.dependencies().is_empty());
    }
}
