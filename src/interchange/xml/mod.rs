//! ECSchema XML documents (`.ecschema.xml`), generations 2.0 through 3.2.

mod dom;
mod reader;
mod writer;

pub(crate) use reader::{peek_schema_key, read_document};
pub(crate) use writer::write_document;
