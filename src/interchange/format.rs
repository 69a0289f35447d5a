//! Common trait for schema document formats.

use std::sync::Arc;

use crate::base::EcVersion;
use crate::context::ReadContext;
use crate::schema::Schema;

use super::{ReadError, WriteError};

/// Options for writing a schema document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Document generation to write. Older generations drop what they cannot express.
    pub ec_version: EcVersion,
}

impl WriteOptions {
    pub fn new(ec_version: EcVersion) -> Self {
        Self { ec_version }
    }
}

/// A schema document format.
///
/// Reading goes through a [`ReadContext`], which locates referenced schemas
/// and caches the result; writing takes the target generation from
/// [`WriteOptions`].
pub trait SchemaFormat: Send + Sync {
    /// Human-readable name of the format.
    fn name(&self) -> &'static str;

    /// File name suffix(es) for this format, without the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Parse a document and register the schema in `ctx`.
    fn parse(&self, input: &[u8], ctx: &mut ReadContext) -> Result<Arc<Schema>, ReadError>;

    /// Write a schema.
    fn write(&self, schema: &Schema, options: &WriteOptions) -> Result<Vec<u8>, WriteError>;

    /// Quick well-formedness check that doesn't fully parse the content.
    fn validate(&self, input: &[u8]) -> Result<(), ReadError>;

    /// Read a schema: reject content of the wrong syntax up front, then parse.
    fn read(&self, input: &[u8], ctx: &mut ReadContext) -> Result<Arc<Schema>, ReadError> {
        self.validate(input)?;
        self.parse(input, ctx)
    }
}

/// First meaningful character of `input`, skipping a byte order mark and whitespace.
fn leading_char(input: &[u8]) -> Result<Option<char>, std::str::Utf8Error> {
    let content = std::str::from_utf8(input)?;
    Ok(content.trim_start_matches('\u{feff}').trim_start().chars().next())
}

// ============================================================================
// FORMATS
// ============================================================================

/// ECSchema XML, generations 2.0 through 3.2.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormat;

impl SchemaFormat for XmlFormat {
    fn name(&self) -> &'static str {
        "ECSchema XML"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ecschema.xml", "xml"]
    }

    fn parse(&self, input: &[u8], ctx: &mut ReadContext) -> Result<Arc<Schema>, ReadError> {
        super::xml::read_document(input, ctx)
    }

    fn write(&self, schema: &Schema, options: &WriteOptions) -> Result<Vec<u8>, WriteError> {
        super::xml::write_document(schema, options)
    }

    fn validate(&self, input: &[u8]) -> Result<(), ReadError> {
        match leading_char(input).map_err(|e| ReadError::xml(format!("Invalid UTF-8: {e}")))? {
            Some('<') => Ok(()),
            _ => Err(ReadError::xml("Not an XML document")),
        }
    }
}

/// ECSchema JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl SchemaFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "ECSchema JSON"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ecschema.json", "json"]
    }

    fn parse(&self, input: &[u8], ctx: &mut ReadContext) -> Result<Arc<Schema>, ReadError> {
        super::json::read_document(input, ctx)
    }

    fn write(&self, schema: &Schema, options: &WriteOptions) -> Result<Vec<u8>, WriteError> {
        super::json::write_document(schema, options)
    }

    fn validate(&self, input: &[u8]) -> Result<(), ReadError> {
        match leading_char(input).map_err(|e| ReadError::json(format!("Invalid UTF-8: {e}")))? {
            Some('{') => Ok(()),
            _ => Err(ReadError::json("Not a JSON object")),
        }
    }
}
