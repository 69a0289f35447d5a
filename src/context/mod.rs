//! Read context: configuration and shared state for one logical load.
//!
//! A [`ReadContext`] carries the options a load runs with (conflict
//! resolution, element order, schemas to prune), the registered
//! [`SchemaLocater`]s and a cache of every schema read or located so far.
//! Readers and locaters both go through the context, so a schema referenced
//! twice in one load is read once and shared.
//!
//! A context is scoped to one load and is not shared across threads; create a
//! new one per independent load.

mod locater;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::base::{NameKey, SchemaKey, SchemaMatchType};
use crate::interchange::ReadError;
use crate::schema::Schema;

pub use locater::{SchemaLocater, StandardSchemaLocater};
pub(crate) use locater::best_match;

/// Configuration and cache for reading schemas.
pub struct ReadContext {
    resolve_conflicts: bool,
    preserve_element_order: bool,
    schemas_to_prune: Vec<String>,
    locaters: Vec<Arc<dyn SchemaLocater>>,
    cache: Vec<Arc<Schema>>,
    in_flight: FxHashSet<NameKey>,
}

impl Default for ReadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadContext")
            .field("resolve_conflicts", &self.resolve_conflicts)
            .field("preserve_element_order", &self.preserve_element_order)
            .field("schemas_to_prune", &self.schemas_to_prune)
            .field("locaters", &self.locaters.iter().map(|l| l.name()).collect::<Vec<_>>())
            .field("cached", &self.cache.iter().map(|s| s.full_name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ReadContext {
    pub fn new() -> Self {
        Self {
            resolve_conflicts: false,
            preserve_element_order: false,
            schemas_to_prune: Vec::new(),
            locaters: Vec::new(),
            cache: Vec::new(),
            in_flight: FxHashSet::default(),
        }
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    /// Rename incompatible properties instead of failing the read.
    pub fn with_resolve_conflicts(mut self, resolve_conflicts: bool) -> Self {
        self.resolve_conflicts = resolve_conflicts;
        self
    }

    /// Keep items in document order when the schema is written again.
    pub fn with_preserve_element_order(mut self, preserve: bool) -> Self {
        self.preserve_element_order = preserve;
        self
    }

    /// Drop every dependency on the named schema while reading.
    pub fn with_pruned_schema(mut self, name: impl Into<String>) -> Self {
        self.schemas_to_prune.push(name.into());
        self
    }

    pub fn with_locater(mut self, locater: impl SchemaLocater + 'static) -> Self {
        self.add_locater(Arc::new(locater));
        self
    }

    pub fn set_resolve_conflicts(&mut self, resolve_conflicts: bool) {
        self.resolve_conflicts = resolve_conflicts;
    }

    pub fn set_preserve_element_order(&mut self, preserve: bool) {
        self.preserve_element_order = preserve;
    }

    pub fn add_locater(&mut self, locater: Arc<dyn SchemaLocater>) {
        debug!(locater = locater.name(), "adding schema locater");
        self.locaters.push(locater);
    }

    pub fn resolve_conflicts(&self) -> bool {
        self.resolve_conflicts
    }

    pub fn preserve_element_order(&self) -> bool {
        self.preserve_element_order
    }

    pub fn schemas_to_prune(&self) -> &[String] {
        &self.schemas_to_prune
    }

    pub fn is_pruned(&self, schema_name: &str) -> bool {
        self.schemas_to_prune
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema_name))
    }

    // ========================================================================
    // CACHE
    // ========================================================================

    /// Register an already-built schema. Fails with `DuplicateSchema` when a
    /// schema with the same name and version is already present.
    pub fn add_schema(&mut self, schema: Arc<Schema>) -> Result<(), ReadError> {
        let key = schema.key();
        if self.cache.iter().any(|s| s.key() == key) {
            return Err(ReadError::DuplicateSchema(key.full_name()));
        }
        debug!(schema = %key, "caching schema");
        self.cache.push(schema);
        Ok(())
    }

    /// Schemas read or located so far, in load order.
    pub fn cached_schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.cache.iter()
    }

    pub fn find_cached(&self, key: &SchemaKey, match_type: SchemaMatchType) -> Option<Arc<Schema>> {
        best_match(&self.cache, key, match_type).cloned()
    }

    // ========================================================================
    // LOCATING
    // ========================================================================

    /// Find a schema: the cache first, then registered locaters in order,
    /// then the built-in standard schemas.
    ///
    /// A schema that is still being read is never returned, so circular
    /// references fail instead of recursing.
    pub fn locate_schema(&mut self, key: &SchemaKey, match_type: SchemaMatchType) -> Option<Arc<Schema>> {
        if let Some(found) = self.find_cached(key, match_type) {
            trace!(schema = %found.full_name(), "located schema in cache");
            return Some(found);
        }
        if self.in_flight.contains(&NameKey::new(&key.name)) {
            debug!(schema = %key, "schema is still being read; not locating it again");
            return None;
        }
        let locaters = self.locaters.clone();
        let standard: Arc<dyn SchemaLocater> = Arc::new(StandardSchemaLocater);
        for locater in locaters.iter().chain(std::iter::once(&standard)) {
            let Some(found) = locater.locate(key, match_type, self) else {
                continue;
            };
            debug!(schema = %found.full_name(), locater = locater.name(), "located schema");
            if self.find_cached(&found.key(), SchemaMatchType::Exact).is_none() {
                self.cache.push(found.clone());
            }
            return Some(found);
        }
        debug!(schema = %key, ?match_type, "schema not found");
        None
    }

    /// Mark a schema as being read. Fails with `DuplicateSchema` when the key
    /// is already cached.
    pub(crate) fn begin_read(&mut self, key: &SchemaKey) -> Result<(), ReadError> {
        if self.cache.iter().any(|s| s.key() == *key) {
            return Err(ReadError::DuplicateSchema(key.full_name()));
        }
        self.in_flight.insert(NameKey::new(&key.name));
        Ok(())
    }

    pub(crate) fn end_read(&mut self, key: &SchemaKey) {
        self.in_flight.remove(&NameKey::new(&key.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::standard::CORE_SCHEMA_NAME;

    #[test]
    fn test_add_schema_rejects_duplicate_key() {
        let mut ctx = ReadContext::new();
        ctx.add_schema(Schema::create("A", "a", 1, 0, 0).unwrap().into_shared())
            .unwrap();
        let err = ctx
            .add_schema(Schema::create("a", "a", 1, 0, 0).unwrap().into_shared())
            .unwrap_err();
        assert!(matches!(err, ReadError::DuplicateSchema(_)));
        ctx.add_schema(Schema::create("A", "a", 1, 0, 1).unwrap().into_shared())
            .unwrap();
        assert_eq!(ctx.cached_schemas().count(), 2);
    }

    #[test]
    fn test_locate_prefers_cache_then_standard() {
        let mut ctx = ReadContext::new();
        let a = Schema::create("A", "a", 1, 0, 3).unwrap().into_shared();
        ctx.add_schema(a.clone()).unwrap();
        let found = ctx
            .locate_schema(&SchemaKey::new("A", 1, 0, 0), SchemaMatchType::LatestWriteCompatible)
            .unwrap();
        assert!(Arc::ptr_eq(&found, &a));
        assert!(ctx.locate_schema(&SchemaKey::new("A", 1, 0, 0), SchemaMatchType::Exact).is_none());

        let core = ctx
            .locate_schema(&SchemaKey::new(CORE_SCHEMA_NAME, 1, 0, 0), SchemaMatchType::LatestWriteCompatible)
            .unwrap();
        assert_eq!(core.name(), CORE_SCHEMA_NAME);
        assert_eq!(ctx.cached_schemas().count(), 2);
    }

    #[test]
    fn test_builders_and_prune_list() {
        let ctx = ReadContext::new()
            .with_resolve_conflicts(true)
            .with_preserve_element_order(true)
            .with_pruned_schema("BadRef");
        assert!(ctx.resolve_conflicts());
        assert!(ctx.preserve_element_order());
        assert!(ctx.is_pruned("badref"));
        assert!(!ctx.is_pruned("GoodRef"));
    }

    #[test]
    fn test_in_flight_schema_is_not_located() {
        let mut ctx = ReadContext::new();
        let key = SchemaKey::new(CORE_SCHEMA_NAME, 1, 0, 0);
        ctx.begin_read(&key).unwrap();
        assert!(ctx.locate_schema(&key, SchemaMatchType::Latest).is_none());
        ctx.end_read(&key);
        assert!(ctx.locate_schema(&key, SchemaMatchType::Latest).is_some());
    }
}
