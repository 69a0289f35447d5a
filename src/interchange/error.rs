//! Error types for reading and writing schema documents.

use std::fmt;

use thiserror::Error;

use crate::error::EcError;

/// Errors that can occur while reading a schema document.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The document is not well-formed XML.
    #[error("XML parse error: {0}")]
    FailedToParseXml(String),

    /// The document is not well-formed JSON.
    #[error("JSON parse error: {0}")]
    FailedToParseJson(String),

    /// Well-formed XML that violates the schema model.
    #[error("Invalid ECSchema XML: {0}")]
    InvalidECSchemaXml(String),

    /// Well-formed JSON that violates the schema model.
    #[error("Invalid ECSchema JSON: {0}")]
    InvalidECSchemaJson(String),

    /// A schema with the same key is already loaded in the read context.
    #[error("Schema '{0}' is already loaded")]
    DuplicateSchema(String),

    /// Two items in one document share a name.
    #[error("Duplicate type name '{name}' in schema '{schema}'")]
    DuplicateTypeName { schema: String, name: String },

    /// A referenced schema could not be located.
    #[error("Referenced schema '{referenced}' of '{schema}' not found")]
    ReferencedSchemaNotFound { schema: String, referenced: String },

    /// IO error during read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    /// Create an XML parse error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::FailedToParseXml(message.into())
    }

    /// Create a JSON parse error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::FailedToParseJson(message.into())
    }

    /// Create an invalid-document error for the given format.
    pub fn invalid(format: DocumentFormat, message: impl Into<String>) -> Self {
        match format {
            DocumentFormat::Xml => Self::InvalidECSchemaXml(message.into()),
            DocumentFormat::Json => Self::InvalidECSchemaJson(message.into()),
        }
    }

    /// Create a missing attribute error.
    pub fn missing_attribute(format: DocumentFormat, element: &str, name: &str) -> Self {
        Self::invalid(format, format!("{element} is missing required attribute '{name}'"))
    }

    /// Wrap a model error raised while assembling a document.
    pub fn from_model(format: DocumentFormat, context: impl fmt::Display, err: EcError) -> Self {
        Self::invalid(format, format!("{context}: {err}"))
    }

    /// Status code for callers that branch on outcomes.
    pub fn status(&self) -> ReadStatus {
        match self {
            Self::FailedToParseXml(_) => ReadStatus::FailedToParseXml,
            Self::FailedToParseJson(_) => ReadStatus::FailedToParseJson,
            Self::InvalidECSchemaXml(_) => ReadStatus::InvalidECSchemaXml,
            Self::InvalidECSchemaJson(_) => ReadStatus::InvalidECSchemaJson,
            Self::DuplicateSchema(_) => ReadStatus::DuplicateSchema,
            Self::DuplicateTypeName { .. } => ReadStatus::DuplicateTypeName,
            Self::ReferencedSchemaNotFound { .. } => ReadStatus::ReferencedSchemaNotFound,
            Self::Io(_) => ReadStatus::FailedToReadFile,
        }
    }
}

/// Outcome codes of a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadStatus {
    Success,
    FailedToParseXml,
    FailedToParseJson,
    InvalidECSchemaXml,
    InvalidECSchemaJson,
    DuplicateSchema,
    DuplicateTypeName,
    ReferencedSchemaNotFound,
    FailedToReadFile,
}

impl<T> From<&Result<T, ReadError>> for ReadStatus {
    fn from(result: &Result<T, ReadError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => err.status(),
        }
    }
}

/// Which document syntax an error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    Xml,
    Json,
}

/// Errors that can occur while writing a schema document.
#[derive(Debug, Error)]
pub enum WriteError {
    /// XML serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// The schema uses something the target version cannot express.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// IO error during write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WriteError {
    /// Create an XML error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create a JSON error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ReadError::invalid(DocumentFormat::Xml, "bad");
        assert_eq!(err.status(), ReadStatus::InvalidECSchemaXml);
        let err = ReadError::invalid(DocumentFormat::Json, "bad");
        assert_eq!(err.status(), ReadStatus::InvalidECSchemaJson);

        let ok: Result<(), ReadError> = Ok(());
        assert_eq!(ReadStatus::from(&ok), ReadStatus::Success);
        let dup: Result<(), ReadError> = Err(ReadError::DuplicateSchema("A.01.00.00".into()));
        assert_eq!(ReadStatus::from(&dup), ReadStatus::DuplicateSchema);
    }

    #[test]
    fn test_messages() {
        let err = ReadError::missing_attribute(DocumentFormat::Xml, "ECSchema", "schemaName");
        assert_eq!(
            err.to_string(),
            "Invalid ECSchema XML: ECSchema is missing required attribute 'schemaName'"
        );
    }
}
