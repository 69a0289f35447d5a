//! Schema locaters backed by documents: in-memory strings and search paths.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::base::{NameKey, SchemaKey, SchemaMatchType};
use crate::context::{ReadContext, SchemaLocater};
use crate::schema::Schema;

use super::format::{JsonFormat, SchemaFormat, XmlFormat};

/// File suffixes the search path locater recognizes.
const XML_SUFFIX: &str = ".ecschema.xml";
const JSON_SUFFIX: &str = ".ecschema.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocumentKind {
    Xml,
    Json,
}

impl DocumentKind {
    /// Sniff the syntax from the first non-whitespace byte after any byte order mark.
    fn sniff(content: &[u8]) -> Self {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
        match content.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Self::Json,
            _ => Self::Xml,
        }
    }

    fn peek(self, content: &[u8]) -> Option<SchemaKey> {
        match self {
            Self::Xml => super::xml::peek_schema_key(content),
            Self::Json => super::json::peek_schema_key(content),
        }
    }

    fn read(self, content: &[u8], ctx: &mut ReadContext) -> Result<Arc<Schema>, super::ReadError> {
        match self {
            Self::Xml => XmlFormat.read(content, ctx),
            Self::Json => JsonFormat.read(content, ctx),
        }
    }
}

struct Document {
    key: SchemaKey,
    kind: DocumentKind,
    content: Arc<[u8]>,
}

/// Pick the newest document satisfying the request.
fn best_document<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    key: &SchemaKey,
    match_type: SchemaMatchType,
) -> Option<&'a Document> {
    documents
        .into_iter()
        .filter(|d| d.key.matches(key, match_type))
        .max_by_key(|d| d.key.version)
}

fn read_located(document: &Document, ctx: &mut ReadContext, source: &str) -> Option<Arc<Schema>> {
    match document.kind.read(&document.content, ctx) {
        Ok(schema) => Some(schema),
        Err(e) => {
            warn!(schema = %document.key, source, error = %e, "located schema failed to read");
            None
        }
    }
}

// ============================================================================
// STRING LOCATER
// ============================================================================

/// Serves schema documents registered as strings.
///
/// Documents are only parsed when a reference asks for them.
#[derive(Default)]
pub struct StringSchemaLocater {
    documents: RwLock<Vec<Document>>,
}

impl StringSchemaLocater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an XML or JSON document. Returns the key read from its header,
    /// or `None` when the header can't be read.
    pub fn add_schema_string(&self, content: &str) -> Option<SchemaKey> {
        let bytes = content.as_bytes();
        let kind = DocumentKind::sniff(bytes);
        let key = kind.peek(bytes)?;
        trace!(schema = %key, ?kind, "registering schema string");
        self.documents.write().push(Document {
            key: key.clone(),
            kind,
            content: Arc::from(bytes),
        });
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl SchemaLocater for StringSchemaLocater {
    fn name(&self) -> &'static str {
        "string"
    }

    fn locate(&self, key: &SchemaKey, match_type: SchemaMatchType, ctx: &mut ReadContext) -> Option<Arc<Schema>> {
        // Release the lock before reading; the read may locate further schemas.
        let document = {
            let documents = self.documents.read();
            let found = best_document(documents.iter(), key, match_type)?;
            Document {
                key: found.key.clone(),
                kind: found.kind,
                content: Arc::clone(&found.content),
            }
        };
        read_located(&document, ctx, "string")
    }
}

// ============================================================================
// SEARCH PATH LOCATER
// ============================================================================

/// Finds `Name.ecschema.xml`, `Name.RR.WW.MM.ecschema.xml` and their JSON
/// counterparts in a list of directories.
#[derive(Debug, Default, Clone)]
pub struct SearchPathLocater {
    paths: Vec<PathBuf>,
}

impl SearchPathLocater {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Candidate documents for `name` in one directory.
    fn candidates(dir: &Path, name: &NameKey) -> Vec<Document> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "skipping unreadable search path");
                return Vec::new();
            }
        };
        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(kind) = document_kind(file_name) else {
                continue;
            };
            let schema_part = file_name.split('.').next().unwrap_or_default();
            if NameKey::new(schema_part) != *name {
                continue;
            }
            let content = match std::fs::read(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read schema file");
                    continue;
                }
            };
            match kind.peek(&content) {
                Some(key) => found.push(Document {
                    key,
                    kind,
                    content: Arc::from(content),
                }),
                None => warn!(path = %path.display(), "schema file has no readable header"),
            }
        }
        found
    }
}

fn document_kind(file_name: &str) -> Option<DocumentKind> {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(XML_SUFFIX) {
        Some(DocumentKind::Xml)
    } else if lower.ends_with(JSON_SUFFIX) {
        Some(DocumentKind::Json)
    } else {
        None
    }
}

impl SchemaLocater for SearchPathLocater {
    fn name(&self) -> &'static str {
        "search path"
    }

    fn locate(&self, key: &SchemaKey, match_type: SchemaMatchType, ctx: &mut ReadContext) -> Option<Arc<Schema>> {
        let name = NameKey::new(&key.name);
        for dir in &self.paths {
            let candidates = Self::candidates(dir, &name);
            if let Some(document) = best_document(&candidates, key, match_type) {
                trace!(schema = %document.key, path = %dir.display(), "found schema file");
                return read_located(document, ctx, "search path");
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ECSchema schemaName="Base" alias="bs" version="01.00.04" xmlns="http://www.bentley.com/schemas/Bentley.ECXML.3.2">
    <ECEntityClass typeName="Element"/>
</ECSchema>"#;

    #[test]
    fn test_sniff_and_suffixes() {
        assert_eq!(DocumentKind::sniff(b"  {\"name\":1}"), DocumentKind::Json);
        assert_eq!(DocumentKind::sniff(b"<ECSchema/>"), DocumentKind::Xml);
        assert_eq!(DocumentKind::sniff(b"\xEF\xBB\xBF{\"name\":1}"), DocumentKind::Json);
        assert_eq!(document_kind("Base.01.00.04.ECSchema.xml"), Some(DocumentKind::Xml));
        assert_eq!(document_kind("Base.ecschema.json"), Some(DocumentKind::Json));
        assert_eq!(document_kind("Base.xml"), None);
    }

    #[test]
    fn test_string_locater_reads_on_demand() {
        let locater = StringSchemaLocater::new();
        let key = locater.add_schema_string(BASE_XML).unwrap();
        assert_eq!(key.full_name(), "Base.01.00.04");
        assert_eq!(locater.len(), 1);

        let mut ctx = ReadContext::new();
        let found = locater
            .locate(&SchemaKey::new("Base", 1, 0, 0), SchemaMatchType::LatestWriteCompatible, &mut ctx)
            .unwrap();
        assert!(found.get_class("Element").is_some());
        assert_eq!(ctx.cached_schemas().count(), 1);

        assert!(
            locater
                .locate(&SchemaKey::new("Base", 2, 0, 0), SchemaMatchType::Exact, &mut ctx)
                .is_none()
        );
    }

    #[test]
    fn test_search_path_locater() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Base.01.00.04.ecschema.xml"), BASE_XML).unwrap();
        std::fs::write(dir.path().join("Other.ecschema.xml"), "<broken").unwrap();

        let locater = SearchPathLocater::new([dir.path()]);
        let mut ctx = ReadContext::new();
        let found = locater.locate(&SchemaKey::new("base", 1, 0, 0), SchemaMatchType::Latest, &mut ctx);
        assert_eq!(found.unwrap().full_name(), "Base.01.00.04");

        let missing = locater.locate(&SchemaKey::new("Other", 1, 0, 0), SchemaMatchType::Latest, &mut ctx);
        assert!(missing.is_none());
    }
}
