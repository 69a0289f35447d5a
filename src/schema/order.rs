//! Item ordering for serialization and whole-schema copies.
//!
//! Canonical order groups items by kind and sorts each group by name. One
//! dependency pass over the whole sequence then moves every local dependency
//! in front of the item that needs it, across groups too. Preserved order is
//! plain declaration order.

use rustc_hash::FxHashSet;

use crate::base::{ItemRef, NameKey};

use super::item::{ItemKind, SchemaItem};
use super::Schema;

/// Kind groups in canonical write order.
pub const CANONICAL_KIND_ORDER: [ItemKind; 8] = [
    ItemKind::Enumeration,
    ItemKind::Class,
    ItemKind::KindOfQuantity,
    ItemKind::PropertyCategory,
    ItemKind::UnitSystem,
    ItemKind::Phenomenon,
    ItemKind::Unit,
    ItemKind::Format,
];

/// Local items an item must follow. Classes only order on their structural
/// links; navigation and struct properties may point forward.
fn ordering_dependencies(item: &SchemaItem) -> Vec<ItemRef> {
    match item {
        SchemaItem::Class(class) => class.structural_dependencies(),
        other => other.dependencies(),
    }
}

/// Reorder `seed` so local dependencies come first, keeping `seed` order
/// otherwise. Dependencies outside `seed` are ignored; cycles are broken at
/// the first revisit.
pub fn dependency_order<'a>(schema: &'a Schema, seed: Vec<&'a SchemaItem>) -> Vec<&'a SchemaItem> {
    let members: FxHashSet<NameKey> = seed.iter().map(|i| NameKey::new(i.name())).collect();
    let mut visited = FxHashSet::default();
    let mut out = Vec::with_capacity(seed.len());
    for item in seed {
        visit(schema, item, &members, &mut visited, &mut out);
    }
    out
}

fn visit<'a>(
    schema: &'a Schema,
    item: &'a SchemaItem,
    members: &FxHashSet<NameKey>,
    visited: &mut FxHashSet<NameKey>,
    out: &mut Vec<&'a SchemaItem>,
) {
    if !visited.insert(NameKey::new(item.name())) {
        return;
    }
    for dep in ordering_dependencies(item) {
        if !dep.is_in(schema.name()) || !members.contains(&dep.key()) {
            continue;
        }
        if let Some(dep_item) = schema.get_item(&dep.name) {
            visit(schema, dep_item, members, visited, out);
        }
    }
    out.push(item);
}

impl Schema {
    /// Items in the order a writer emits them.
    pub fn items_in_write_order(&self) -> Vec<&SchemaItem> {
        if self.preserve_element_order {
            return self.items().collect();
        }
        let mut seed = Vec::with_capacity(self.item_count());
        for kind in CANONICAL_KIND_ORDER {
            let mut group: Vec<&SchemaItem> = self.items().filter(|i| i.kind() == kind).collect();
            group.sort_by_key(|i| i.name().to_ascii_lowercase());
            seed.extend(group);
        }
        dependency_order(self, seed)
    }

    /// Declaration order with local dependencies moved first.
    pub fn items_in_dependency_order(&self) -> Vec<&SchemaItem> {
        dependency_order(self, self.items().collect())
    }
}
