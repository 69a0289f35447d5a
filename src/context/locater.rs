//! Schema locaters: pluggable sources the read context asks for referenced schemas.

use std::sync::Arc;

use crate::base::{SchemaKey, SchemaMatchType};
use crate::schema::Schema;
use crate::schema::standard::standard_schemas;

use super::ReadContext;

/// A source of schemas.
///
/// `locate` receives the read context so a locater that has to parse a
/// document can read it through the same context: located schemas land in
/// the context cache and their own references resolve through the same
/// locaters.
pub trait SchemaLocater: Send + Sync {
    /// Human-readable name, for logs.
    fn name(&self) -> &'static str;

    /// Find a schema satisfying `key` under `match_type`.
    fn locate(&self, key: &SchemaKey, match_type: SchemaMatchType, ctx: &mut ReadContext) -> Option<Arc<Schema>>;
}

/// Pick the newest schema among `candidates` that satisfies the request.
pub(crate) fn best_match<'a>(
    candidates: impl IntoIterator<Item = &'a Arc<Schema>>,
    key: &SchemaKey,
    match_type: SchemaMatchType,
) -> Option<&'a Arc<Schema>> {
    candidates
        .into_iter()
        .filter(|s| s.key().matches(key, match_type))
        .max_by_key(|s| s.version())
}

/// Serves the built-in standard schemas.
#[derive(Debug, Default)]
pub struct StandardSchemaLocater;

impl SchemaLocater for StandardSchemaLocater {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn locate(&self, key: &SchemaKey, match_type: SchemaMatchType, _ctx: &mut ReadContext) -> Option<Arc<Schema>> {
        let schemas = standard_schemas();
        best_match(&schemas, key, match_type).cloned()
    }
}
