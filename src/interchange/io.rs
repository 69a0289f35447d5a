//! String and file entry points for reading and writing schemas.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::context::ReadContext;
use crate::schema::Schema;

use super::format::{JsonFormat, SchemaFormat, WriteOptions, XmlFormat};
use super::{ReadError, WriteError, detect_format};

impl ReadContext {
    /// Read an ECSchema XML document.
    pub fn read_xml_string(&mut self, xml: &str) -> Result<Arc<Schema>, ReadError> {
        XmlFormat.read(xml.as_bytes(), self)
    }

    pub fn read_xml_bytes(&mut self, xml: &[u8]) -> Result<Arc<Schema>, ReadError> {
        XmlFormat.read(xml, self)
    }

    pub fn read_xml_file(&mut self, path: impl AsRef<Path>) -> Result<Arc<Schema>, ReadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading schema file");
        let content = std::fs::read(path)?;
        XmlFormat.read(&content, self)
    }

    /// Read an ECSchema JSON document.
    pub fn read_json_string(&mut self, json: &str) -> Result<Arc<Schema>, ReadError> {
        JsonFormat.read(json.as_bytes(), self)
    }

    pub fn read_json_file(&mut self, path: impl AsRef<Path>) -> Result<Arc<Schema>, ReadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading schema file");
        let content = std::fs::read(path)?;
        JsonFormat.read(&content, self)
    }

    /// Read a file in the format its extension names.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<Arc<Schema>, ReadError> {
        let path = path.as_ref();
        let format = detect_format(path).ok_or_else(|| {
            ReadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no schema format for '{}'", path.display()),
            ))
        })?;
        debug!(path = %path.display(), format = format.name(), "reading schema file");
        let content = std::fs::read(path)?;
        format.read(&content, self)
    }
}

impl Schema {
    pub fn write_xml_string(&self, options: &WriteOptions) -> Result<String, WriteError> {
        let bytes = XmlFormat.write(self, options)?;
        String::from_utf8(bytes).map_err(|e| WriteError::xml(format!("Invalid UTF-8: {e}")))
    }

    pub fn write_xml_file(&self, path: impl AsRef<Path>, options: &WriteOptions) -> Result<(), WriteError> {
        let bytes = XmlFormat.write(self, options)?;
        std::fs::write(path.as_ref(), bytes)?;
        debug!(schema = %self.full_name(), path = %path.as_ref().display(), "wrote schema file");
        Ok(())
    }

    pub fn write_json_string(&self, options: &WriteOptions) -> Result<String, WriteError> {
        let bytes = JsonFormat.write(self, options)?;
        String::from_utf8(bytes).map_err(|e| WriteError::json(format!("Invalid UTF-8: {e}")))
    }

    pub fn write_json_file(&self, path: impl AsRef<Path>, options: &WriteOptions) -> Result<(), WriteError> {
        let bytes = JsonFormat.write(self, options)?;
        std::fs::write(path.as_ref(), bytes)?;
        debug!(schema = %self.full_name(), path = %path.as_ref().display(), "wrote schema file");
        Ok(())
    }
}
