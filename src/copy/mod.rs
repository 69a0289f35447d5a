//! Copying items, properties and whole schemas between schema graphs.
//!
//! The copier keeps reference integrity: every reference in a copy either
//! points at an item copied in the same operation or at the original item
//! through a schema reference the target gains on demand.
//!
//! ```text
//! copy_references = false      copy_references = true
//!
//!   Source:KOQ ──► Source:M      Source:KOQ ──► Source:M
//!        │ copy                       │ copy        │ copy
//!        ▼                            ▼             ▼
//!   Target:KOQ ──► Source:M      Target:KOQ ──► Target:M
//!   (Target references Source)
//! ```
//!
//! Items in a third schema are always referenced, never copied. Unit and
//! phenomenon definition strings are copied as text and never followed.

mod item_copy;
mod schema_copy;

pub use schema_copy::copy_schema;

/// Options for [`Schema::copy_item`](crate::schema::Schema::copy_item) and
/// [`Schema::copy_property`](crate::schema::Schema::copy_property).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Deep-copy dependencies that live in the source item's own schema.
    pub copy_references: bool,
    /// Rename conflicting properties instead of failing.
    pub resolve_conflicts: bool,
}

impl CopyOptions {
    pub fn new(copy_references: bool) -> Self {
        Self {
            copy_references,
            resolve_conflicts: false,
        }
    }

    pub fn with_resolve_conflicts(mut self, resolve_conflicts: bool) -> Self {
        self.resolve_conflicts = resolve_conflicts;
        self
    }
}
