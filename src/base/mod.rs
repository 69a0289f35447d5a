//! Foundation types for the EC schema model.
//!
//! This module provides the primitive vocabulary used everywhere else:
//! - [`NameKey`] - case-insensitive lookup key for named items
//! - [`ItemRef`] - non-owning `Schema:Item` reference
//! - [`SchemaVersion`], [`SchemaKey`], [`SchemaMatchType`] - schema identity
//! - [`EcVersion`] - document format generations (2.0 through 3.2)
//!
//! This module has NO dependencies on other ecschema modules.

mod name;
mod version;

pub use name::{ItemRef, NameKey, is_valid_name};
pub use version::{EcVersion, SchemaKey, SchemaMatchType, SchemaVersion};
