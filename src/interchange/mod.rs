//! Schema document formats.
//!
//! Two syntaxes are supported:
//!
//! - **XML** - ECSchema XML, generations 2.0 through 3.2
//! - **JSON** - ECSchema JSON (3.2)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                  ┌──────────────┐
//! │ .ecschema.xml│                  │.ecschema.json│
//! └──────┬───────┘                  └──────┬───────┘
//!        │ xml::reader                     │ json::reader
//!        ▼                                 ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ SchemaDraft: items with references as spelled            │
//! └──────────────────────────────────────────────────────────┘
//!        │ assemble (locate references, resolve, validate)
//!        ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ Arc<Schema>, cached in the ReadContext                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use ecschema::{EcVersion, ReadContext, WriteOptions};
//!
//! let mut ctx = ReadContext::new();
//! let schema = ctx.read_xml_file("Plant.ecschema.xml")?;
//! let legacy = schema.write_xml_string(&WriteOptions::new(EcVersion::V3_1))?;
//! ```

mod assemble;
mod error;
mod format;
mod io;
mod json;
mod locater;
mod xml;

pub use error::{DocumentFormat, ReadError, ReadStatus, WriteError};
pub use format::{JsonFormat, SchemaFormat, WriteOptions, XmlFormat};
pub use json::ECSCHEMA_JSON_URI;
pub use locater::{SearchPathLocater, StringSchemaLocater};

/// Pick a format from a file's extension (`.xml`, `.ecschema.json`, ...).
pub fn detect_format(path: &std::path::Path) -> Option<Box<dyn SchemaFormat>> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let formats: [Box<dyn SchemaFormat>; 2] = [Box::new(XmlFormat), Box::new(JsonFormat)];
    formats.into_iter().find(|f| f.extensions().contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_detect_format() {
        let xml = detect_format(Path::new("dir/Plant.01.00.00.ecschema.xml")).unwrap();
        assert_eq!(xml.name(), "ECSchema XML");
        let json = detect_format(Path::new("Plant.ecschema.JSON")).unwrap();
        assert_eq!(json.name(), "ECSchema JSON");
        assert!(detect_format(Path::new("Plant.yaml")).is_none());
        assert!(detect_format(Path::new("Plant")).is_none());
    }
}
