//! # ecschema
//!
//! EC schema metadata model: typed, versioned schemas of classes, properties,
//! enumerations and units, with item copying, property conflict resolution and
//! XML/JSON interchange.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! connect      → token collaborators, single-flight token refresh
//!   ↓
//! interchange  → XML and JSON readers/writers, version conversion
//!   ↓
//! context      → ReadContext: schema cache, locaters, load options
//!   ↓
//! copy         → item and schema copying between schema graphs
//!   ↓
//! schema       → Schema, items, hierarchy, conflicts, references, validation
//!   ↓
//! base         → names, ItemRef, SchemaKey and version types
//! ```

// ============================================================================
// MODULES (dependency order: base → schema → copy → context → interchange)
// ============================================================================

/// Foundation types: case-insensitive names, item references, schema keys
pub mod base;

/// Error type for schema mutation
pub mod error;

/// The schema model and its named item store
pub mod schema;

/// Item and schema copying
pub mod copy;

/// Read context: schema cache, locaters, load options
pub mod context;

/// Schema document formats: ECSchema XML and JSON
pub mod interchange;

/// Token collaborators for authenticated schema services
#[cfg(feature = "connect")]
pub mod connect;

// Re-export foundation types
pub use base::{EcVersion, ItemRef, NameKey, SchemaKey, SchemaMatchType, SchemaVersion};

pub use context::{ReadContext, SchemaLocater};
pub use copy::{CopyOptions, copy_schema};
pub use error::{EcError, EcResult};
pub use interchange::{ReadError, ReadStatus, SearchPathLocater, StringSchemaLocater, WriteError, WriteOptions};
pub use schema::{EcClass, EcProperty, Schema, SchemaItem};
