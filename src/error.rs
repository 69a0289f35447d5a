//! Error types for schema mutation.

use thiserror::Error;

/// Errors returned by operations that create, modify, copy or delete schema content.
///
/// Every operation returning this error leaves the schema untouched on failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcError {
    /// Name is empty or not a valid identifier.
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// A case-insensitive match already exists in the same scope.
    #[error("'{name}' already exists in '{scope}'")]
    NamedItemAlreadyExists { scope: String, name: String },

    /// Lookup target does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Schema is neither local nor referenced.
    #[error("schema '{0}' not found")]
    SchemaNotFound(String),

    /// Property types are incompatible and conflict resolution is off.
    #[error("data type mismatch: {0}")]
    DataTypeMismatch(String),

    /// Operation is invalid for this kind of item or property.
    #[error("not supported: {0}")]
    PropertyNotSupported(String),

    /// Override changes the primitive type of its base property.
    #[error("invalid primitive override: {0}")]
    InvalidPrimitiveOverride(String),

    /// Attaching the base class would make the hierarchy circular.
    #[error("adding base class '{base}' to '{class}' would create a cycle")]
    BaseClassCycle { class: String, base: String },

    /// Adding the reference would make the reference graph circular.
    #[error("referencing '{referenced}' from '{schema}' would create a cycle")]
    SchemaReferenceCycle { schema: String, referenced: String },

    /// Schema reference cannot be removed while items depend on it.
    #[error("schema '{0}' is still in use")]
    SchemaInUse(String),

    /// Item cannot be removed while other items depend on it.
    #[error("'{item}' is still used by '{user}'")]
    ItemInUse { item: String, user: String },

    /// Item lives in a schema that is not local and not referenced.
    #[error("'{item}' is not reachable from schema '{schema}'")]
    ItemNotReferenceable { schema: String, item: String },
}

impl EcError {
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    pub fn already_exists(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NamedItemAlreadyExists {
            scope: scope.into(),
            name: name.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::DataTypeMismatch(message.into())
    }

    pub fn not_referenceable(schema: impl Into<String>, item: impl ToString) -> Self {
        Self::ItemNotReferenceable {
            schema: schema.into(),
            item: item.to_string(),
        }
    }
}

/// Result alias for schema operations.
pub type EcResult<T> = Result<T, EcError>;
