//! Schema references: the reference graph, alias scope and cross-schema lookup.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::base::{ItemRef, NameKey, SchemaKey, SchemaMatchType};
use crate::error::{EcError, EcResult};

use super::class::EcClass;
use super::item::{ItemVariant, SchemaItem};
use super::Schema;

/// A referenced schema together with the alias this schema knows it by.
///
/// The alias starts as the referenced schema's own alias and is made unique
/// within the referencing schema when it collides.
#[derive(Clone, Debug)]
pub struct SchemaReference {
    pub schema: Arc<Schema>,
    pub alias: String,
}

/// True when `b` appears in `a`'s transitive reference closure.
pub fn is_schema_referenced(a: &Schema, b: &Schema) -> bool {
    a.is_schema_referenced(b.name())
}

impl Schema {
    // ========================================================================
    // REFERENCE LIST
    // ========================================================================

    /// Append a reference. Adding the same schema key again is a no-op.
    pub fn add_referenced_schema(&mut self, schema: Arc<Schema>) -> EcResult<()> {
        let key = NameKey::new(schema.name());
        if schema.name().eq_ignore_ascii_case(self.name()) || schema.is_schema_referenced(self.name()) {
            return Err(EcError::SchemaReferenceCycle {
                schema: self.name().to_string(),
                referenced: schema.name().to_string(),
            });
        }
        if let Some(existing) = self.references.get(&key) {
            if existing.schema.key() == schema.key() {
                return Ok(());
            }
            return Err(EcError::already_exists(self.name(), schema.full_name()));
        }
        let alias = self.unique_reference_alias(schema.alias());
        debug!(schema = self.name(), referenced = %schema.full_name(), alias = %alias, "adding schema reference");
        self.references.insert(key, SchemaReference { schema, alias });
        Ok(())
    }

    /// Add a reference under an explicit alias, as read from a document.
    pub(crate) fn add_referenced_schema_with_alias(&mut self, schema: Arc<Schema>, alias: &str) -> EcResult<()> {
        self.add_referenced_schema(schema.clone())?;
        let key = NameKey::new(schema.name());
        let alias_taken = self.alias.eq_ignore_ascii_case(alias)
            || self
                .references
                .iter()
                .any(|(k, r)| *k != key && r.alias.eq_ignore_ascii_case(alias));
        if !alias_taken {
            if let Some(entry) = self.references.get_mut(&key) {
                entry.alias = alias.to_string();
            }
        }
        Ok(())
    }

    fn unique_reference_alias(&self, wanted: &str) -> String {
        let taken = |candidate: &str| {
            self.alias.eq_ignore_ascii_case(candidate)
                || self
                    .references
                    .values()
                    .any(|r| r.alias.eq_ignore_ascii_case(candidate))
        };
        if !taken(wanted) {
            return wanted.to_string();
        }
        (1..)
            .map(|n| format!("{wanted}{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| wanted.to_string())
    }

    /// Remove a direct reference. Fails with `SchemaInUse` while anything depends on it.
    pub fn remove_referenced_schema(&mut self, name: &str) -> EcResult<Arc<Schema>> {
        let key = NameKey::new(name);
        if !self.references.contains_key(&key) {
            return Err(EcError::SchemaNotFound(name.to_string()));
        }
        if self.uses_schema(name) {
            return Err(EcError::SchemaInUse(name.to_string()));
        }
        self.references
            .shift_remove(&key)
            .map(|r| r.schema)
            .ok_or_else(|| EcError::SchemaNotFound(name.to_string()))
    }

    /// Direct references in insertion order.
    pub fn referenced_schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.references.values().map(|r| &r.schema)
    }

    pub fn reference_entries(&self) -> impl Iterator<Item = &SchemaReference> {
        self.references.values()
    }

    pub fn referenced_schema_count(&self) -> usize {
        self.references.len()
    }

    pub fn get_referenced_schema(&self, name: &str) -> Option<&Arc<Schema>> {
        self.references.get(&NameKey::new(name)).map(|r| &r.schema)
    }

    /// First direct reference whose key satisfies `key` under `match_type`.
    pub fn find_referenced_schema(&self, key: &SchemaKey, match_type: SchemaMatchType) -> Option<&Arc<Schema>> {
        self.referenced_schemas()
            .find(|s| s.key().matches(key, match_type))
    }

    /// Whether `name` is in this schema's transitive reference closure.
    pub fn is_schema_referenced(&self, name: &str) -> bool {
        self.find_in_closure(name).is_some()
    }

    fn find_in_closure(&self, name: &str) -> Option<&Schema> {
        let mut queue: VecDeque<&Schema> = self.referenced_schemas().map(|s| s.as_ref()).collect();
        let mut seen: FxHashSet<NameKey> = FxHashSet::default();
        while let Some(schema) = queue.pop_front() {
            if !seen.insert(NameKey::new(schema.name())) {
                continue;
            }
            if schema.name().eq_ignore_ascii_case(name) {
                return Some(schema);
            }
            queue.extend(schema.referenced_schemas().map(|s| s.as_ref()));
        }
        None
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// This schema, a direct reference or a transitively referenced schema.
    pub fn resolve_schema(&self, name: &str) -> Option<&Schema> {
        if self.name().eq_ignore_ascii_case(name) {
            return Some(self);
        }
        if let Some(direct) = self.get_referenced_schema(name) {
            return Some(direct);
        }
        self.find_in_closure(name)
    }

    /// Schema name for an alias used inside this schema.
    pub fn resolve_alias(&self, alias: &str) -> Option<&str> {
        if alias.is_empty() || self.alias.eq_ignore_ascii_case(alias) {
            return Some(self.name());
        }
        self.references
            .values()
            .find(|r| r.alias.eq_ignore_ascii_case(alias))
            .map(|r| r.schema.name())
    }

    /// Alias under which this schema knows `schema_name`.
    pub fn alias_of(&self, schema_name: &str) -> Option<&str> {
        if self.name().eq_ignore_ascii_case(schema_name) {
            return Some(&self.alias);
        }
        self.references
            .get(&NameKey::new(schema_name))
            .map(|r| r.alias.as_str())
    }

    pub fn resolve_item(&self, r: &ItemRef) -> Option<&SchemaItem> {
        self.resolve_schema(&r.schema)?.get_item(&r.name)
    }

    pub fn resolve<T: ItemVariant>(&self, r: &ItemRef) -> Option<&T> {
        self.resolve_item(r).and_then(T::from_item)
    }

    pub fn resolve_class(&self, r: &ItemRef) -> Option<&EcClass> {
        self.resolve(r)
    }

    /// Resolve a class together with the schema that owns it.
    pub fn resolve_class_with_owner(&self, r: &ItemRef) -> Option<(&Schema, &EcClass)> {
        let owner = self.resolve_schema(&r.schema)?;
        Some((owner, owner.get_class(&r.name)?))
    }

    /// Whether an item in `r.schema` may be referenced from here without changes.
    pub fn is_referenceable(&self, r: &ItemRef) -> bool {
        r.is_in(self.name()) || self.references.contains_key(&NameKey::new(&r.schema))
    }

    /// Make `r` referenceable: local and direct references pass; a schema reached
    /// only transitively is promoted to a direct reference.
    pub(crate) fn ensure_referenceable(&mut self, r: &ItemRef) -> EcResult<()> {
        if self.is_referenceable(r) {
            return Ok(());
        }
        match self.shared_schema(&r.schema) {
            Some(schema) => self.add_referenced_schema(schema),
            None => Err(EcError::not_referenceable(self.name(), r)),
        }
    }

    pub(crate) fn shared_schema(&self, name: &str) -> Option<Arc<Schema>> {
        let mut queue: VecDeque<&Arc<Schema>> = self.referenced_schemas().collect();
        while let Some(schema) = queue.pop_front() {
            if schema.name().eq_ignore_ascii_case(name) {
                return Some(Arc::clone(schema));
            }
            queue.extend(schema.referenced_schemas());
        }
        None
    }

    /// Whether any item, property or custom attribute refers into `schema_name`.
    pub(crate) fn uses_schema(&self, schema_name: &str) -> bool {
        let mut used = false;
        let mut check = |r: &ItemRef| used |= r.is_in(schema_name);
        for item in self.items() {
            item.visit_refs(&mut check);
        }
        self.custom_attributes.visit_refs(&mut check);
        used
    }
}
