//! ECSchema JSON documents (`.ecschema.json`).

mod reader;
mod writer;

pub(crate) use reader::{peek_schema_key, read_document};
pub(crate) use writer::write_document;
pub use writer::ECSCHEMA_JSON_URI;
