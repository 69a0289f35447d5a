//! Custom attribute instances attached to schemas, classes, properties and constraints.

use indexmap::IndexMap;

use crate::base::ItemRef;

/// Value of one custom attribute property.
#[derive(Clone, Debug, PartialEq)]
pub enum InstanceValue {
    /// Primitive value in its invariant text form.
    Primitive(String),
    /// Array members, each tagged with the element name it was written with.
    Array(Vec<(String, InstanceValue)>),
    Struct(IndexMap<String, InstanceValue>),
}

impl InstanceValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Primitive(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for InstanceValue {
    fn from(value: &str) -> Self {
        Self::Primitive(value.to_string())
    }
}

impl From<String> for InstanceValue {
    fn from(value: String) -> Self {
        Self::Primitive(value)
    }
}

/// One custom attribute instance: the custom attribute class plus its property values.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomAttribute {
    pub class: ItemRef,
    pub values: IndexMap<String, InstanceValue>,
}

impl CustomAttribute {
    pub fn new(class: ItemRef) -> Self {
        Self {
            class,
            values: IndexMap::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<InstanceValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&InstanceValue> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Ordered set of custom attribute instances, at most one per class.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomAttributes(Vec<CustomAttribute>);

impl CustomAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced instance keeps its original position.
    pub fn set(&mut self, attribute: CustomAttribute) {
        match self.0.iter_mut().find(|ca| ca.class == attribute.class) {
            Some(existing) => *existing = attribute,
            None => self.0.push(attribute),
        }
    }

    pub fn get(&self, class: &ItemRef) -> Option<&CustomAttribute> {
        self.0.iter().find(|ca| &ca.class == class)
    }

    pub fn get_mut(&mut self, class: &ItemRef) -> Option<&mut CustomAttribute> {
        self.0.iter_mut().find(|ca| &ca.class == class)
    }

    /// Lookup by class name alone, ignoring the schema.
    pub fn get_by_name(&self, class_name: &str) -> Option<&CustomAttribute> {
        self.0
            .iter()
            .find(|ca| ca.class.name.eq_ignore_ascii_case(class_name))
    }

    pub fn contains(&self, class: &ItemRef) -> bool {
        self.get(class).is_some()
    }

    pub fn remove(&mut self, class: &ItemRef) -> Option<CustomAttribute> {
        let idx = self.0.iter().position(|ca| &ca.class == class)?;
        Some(self.0.remove(idx))
    }

    pub fn retain(&mut self, keep: impl FnMut(&CustomAttribute) -> bool) {
        self.0.retain(keep);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomAttribute> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CustomAttribute> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        for ca in &self.0 {
            f(&ca.class);
        }
    }

    pub(crate) fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        for ca in &mut self.0 {
            f(&mut ca.class);
        }
    }
}

impl<'a> IntoIterator for &'a CustomAttributes {
    type Item = &'a CustomAttribute;
    type IntoIter = std::slice::Iter<'a, CustomAttribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for CustomAttributes {
    type Item = CustomAttribute;
    type IntoIter = std::vec::IntoIter<CustomAttribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut cas = CustomAttributes::new();
        cas.set(CustomAttribute::new(ItemRef::new("S", "First")).with_value("A", "1"));
        cas.set(CustomAttribute::new(ItemRef::new("S", "Second")));
        cas.set(CustomAttribute::new(ItemRef::new("s", "first")).with_value("A", "2"));

        let names: Vec<_> = cas.iter().map(|ca| ca.class.name.as_str()).collect();
        assert_eq!(names, vec!["first", "Second"]);
        assert_eq!(
            cas.get_by_name("FIRST").and_then(|ca| ca.get("a")).and_then(|v| v.as_str()),
            Some("2")
        );
    }

    #[test]
    fn test_remove() {
        let mut cas = CustomAttributes::new();
        let class = ItemRef::new("S", "Only");
        cas.set(CustomAttribute::new(class.clone()));
        assert!(cas.remove(&class).is_some());
        assert!(cas.is_empty());
        assert!(cas.remove(&class).is_none());
    }
}
