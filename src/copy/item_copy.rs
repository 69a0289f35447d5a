//! Item and property copier.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::base::{ItemRef, NameKey};
use crate::error::{EcError, EcResult};
use crate::schema::{EcProperty, Schema, SchemaItem};

use super::CopyOptions;

/// One copy operation into `target`.
///
/// Tracks what the operation has produced so dependencies shared by several
/// copied items are copied once, and so a name collision with an item the
/// operation itself created is not an error.
pub(crate) struct ItemCopier<'a> {
    target: &'a mut Schema,
    source: &'a Schema,
    /// Needed to reference the source schema itself when dependencies are not copied.
    source_shared: Option<&'a Arc<Schema>>,
    options: CopyOptions,
    copied: FxHashSet<NameKey>,
    in_progress: FxHashSet<NameKey>,
}

impl<'a> ItemCopier<'a> {
    pub(crate) fn new(
        target: &'a mut Schema,
        source: &'a Schema,
        source_shared: Option<&'a Arc<Schema>>,
        options: CopyOptions,
    ) -> Self {
        Self {
            target,
            source,
            source_shared,
            options,
            copied: FxHashSet::default(),
            in_progress: FxHashSet::default(),
        }
    }

    fn same_schema(&self) -> bool {
        self.source.name().eq_ignore_ascii_case(self.target.name())
    }

    pub(crate) fn has_copied(&self, name: &str) -> bool {
        self.copied.contains(&NameKey::new(name))
    }

    /// Copy source item `name`, its same-schema dependencies first when
    /// `copy_references` is set.
    pub(crate) fn copy_item(&mut self, name: &str) -> EcResult<()> {
        let key = NameKey::new(name);
        if self.copied.contains(&key) || self.in_progress.contains(&key) {
            return Ok(());
        }
        let item = self
            .source
            .get_item(name)
            .ok_or_else(|| EcError::not_found("item", format!("{}:{name}", self.source.name())))?
            .clone();
        if self.target.contains_item(item.name()) {
            return Err(EcError::already_exists(self.target.name(), item.name()));
        }

        self.in_progress.insert(key.clone());
        let item = self.rewire_item(item)?;
        trace!(item = item.name(), target = self.target.name(), "copying item");
        match item {
            SchemaItem::Class(class) => {
                self.target.add_class(class, self.options.resolve_conflicts)?;
            }
            other => {
                self.target.add_item(other)?;
            }
        }
        self.in_progress.remove(&key);
        self.copied.insert(key);
        Ok(())
    }

    /// Copy one property into local class `class` of the target.
    pub(crate) fn copy_property(&mut self, class: &str, mut property: EcProperty) -> EcResult<String> {
        let mut refs = Vec::new();
        property.visit_refs(&mut |r| refs.push(r.clone()));
        for r in &refs {
            self.prepare(r)?;
        }
        if let Some((from, to)) = self.rehome() {
            property.visit_refs_mut(&mut |r| {
                if r.is_in(&from) {
                    r.schema = to.clone();
                }
            });
        }
        let added = self
            .target
            .add_property(class, property, self.options.resolve_conflicts)?;
        Ok(added.name().to_string())
    }

    fn rewire_item(&mut self, mut item: SchemaItem) -> EcResult<SchemaItem> {
        let mut refs = Vec::new();
        item.visit_refs(&mut |r| refs.push(r.clone()));
        for r in &refs {
            self.prepare(r)?;
        }
        if let Some((from, to)) = self.rehome() {
            item.visit_refs_mut(&mut |r| {
                if r.is_in(&from) {
                    r.schema = to.clone();
                }
            });
        }
        Ok(item)
    }

    /// Source and target schema names when same-schema references must be
    /// pointed at the copies.
    fn rehome(&self) -> Option<(String, String)> {
        (self.options.copy_references && !self.same_schema())
            .then(|| (self.source.name().to_string(), self.target.name().to_string()))
    }

    /// Make the target able to hold a reference to `r`, copying it when it is
    /// a same-schema dependency and `copy_references` is set.
    fn prepare(&mut self, r: &ItemRef) -> EcResult<()> {
        if r.is_in(self.source.name()) {
            if self.options.copy_references {
                if self.target.contains_item(&r.name) && !self.has_copied(&r.name) {
                    if self.same_schema() {
                        return Ok(());
                    }
                    return Err(EcError::already_exists(self.target.name(), &r.name));
                }
                return self.copy_item(&r.name);
            }
            if self.same_schema() {
                return Ok(());
            }
            let source = self
                .source_shared
                .ok_or_else(|| EcError::not_referenceable(self.target.name(), r))?;
            if !self.target.is_referenceable(r) {
                debug!(target = self.target.name(), referenced = source.name(), "referencing source schema of copied item");
            }
            return self.target.add_referenced_schema(Arc::clone(source));
        }
        if self.target.is_referenceable(r) {
            return Ok(());
        }
        let foreign = self
            .source
            .shared_schema(&r.schema)
            .ok_or_else(|| EcError::not_referenceable(self.source.name(), r))?;
        debug!(target = self.target.name(), referenced = foreign.name(), "referencing schema of copied dependency");
        self.target.add_referenced_schema(foreign)
    }
}

impl Schema {
    /// Copy item `name` of `source` into this schema.
    ///
    /// Fails with `NamedItemAlreadyExists` when this schema already has an
    /// item of that name. A failed copy leaves this schema unchanged,
    /// including dependencies copied before the failure.
    pub fn copy_item(&mut self, source: &Arc<Schema>, name: &str, options: CopyOptions) -> EcResult<&mut SchemaItem> {
        let snapshot = self.clone_items();
        let result = ItemCopier::new(self, source, Some(source), options).copy_item(name);
        if let Err(err) = result {
            debug!(item = name, source = source.name(), error = %err, "copy failed, rolling back");
            self.restore_items(snapshot);
            return Err(err);
        }
        self.get_item_mut(name)
            .ok_or_else(|| EcError::not_found("item", name))
    }

    /// Copy property `property` of `source_class` in `source` into local class
    /// `class`. The property may be inherited in the source class.
    ///
    /// Returns the name the property was added under, which differs from the
    /// source name when a conflict was resolved by renaming.
    pub fn copy_property(
        &mut self,
        class: &str,
        source: &Arc<Schema>,
        source_class: &str,
        property: &str,
        options: CopyOptions,
    ) -> EcResult<String> {
        let copy = source
            .find_property(source_class, property, true)
            .ok_or_else(|| EcError::not_found("property", format!("{source_class}.{property}")))?
            .clone();
        if self.get_class(class).is_none() {
            return Err(EcError::not_found("class", class));
        }
        let snapshot = self.clone_items();
        let result = ItemCopier::new(self, source, Some(source), options).copy_property(class, copy);
        if result.is_err() {
            self.restore_items(snapshot);
        }
        result
    }
}
