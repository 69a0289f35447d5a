//! Identifiers, case-insensitive keys and cross-item references.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Returns true when `name` is a valid EC identifier.
///
/// Identifiers start with an ASCII letter or underscore and continue with
/// ASCII letters, digits or underscores.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// NAME KEY
// ============================================================================

/// Lookup key for named items.
///
/// Names are stored with their original casing but compared case-insensitively,
/// so every map keyed by name uses the lowercased form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameKey(String);

impl NameKey {
    pub fn new(name: &str) -> Self {
        Self(name.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NameKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<&String> for NameKey {
    fn from(name: &String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// ITEM REFERENCE
// ============================================================================

/// Non-owning reference to a schema item: the owning schema's name plus the item name.
///
/// References are resolved through the schema that holds them, never through
/// a pointer, so schemas can be frozen and shared without ownership cycles.
/// Equality and hashing ignore case on both parts.
#[derive(Clone, Debug)]
pub struct ItemRef {
    pub schema: String,
    pub name: String,
}

impl ItemRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `Schema:Item` (or `Schema.Item`) into a reference.
    pub fn parse_qualified(qualified: &str) -> Option<Self> {
        let (schema, name) = qualified
            .split_once(':')
            .or_else(|| qualified.split_once('.'))?;
        if schema.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(schema, name))
    }

    /// True when the reference points into the named schema.
    pub fn is_in(&self, schema_name: &str) -> bool {
        self.schema.eq_ignore_ascii_case(schema_name)
    }

    pub fn key(&self) -> NameKey {
        NameKey::new(&self.name)
    }

    /// Same item name, rehomed into another schema.
    pub fn with_schema(&self, schema: &str) -> Self {
        Self::new(schema, self.name.clone())
    }
}

impl PartialEq for ItemRef {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for ItemRef {}

impl Hash for ItemRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.to_ascii_lowercase().hash(state);
        self.name.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.schema, self.name)
    }
}
