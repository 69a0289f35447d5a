//! A small element tree over quick-xml.
//!
//! Schema documents are small and read non-linearly (references before items,
//! classes before custom attributes), so both directions go through an owned
//! tree instead of streaming.

use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::interchange::{ReadError, WriteError};

/// One XML element with its attributes, text and child elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct XmlElement {
    /// Tag name as written, including any prefix.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Tag name without a namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local(k) == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, treating an all-whitespace value as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.trim().is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name() == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.local_name() == name)
    }

    // ========================================================================
    // BUILDING
    // ========================================================================

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.push_attr(name, value);
        self
    }

    pub fn push_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.push((name.to_string(), value.into()));
    }

    /// Push the attribute only when a value is present.
    pub fn push_opt_attr(&mut self, name: &str, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.push_attr(name, value);
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    // ========================================================================
    // PARSING
    // ========================================================================

    /// Parse a document and return its root element.
    pub fn parse(input: &[u8]) -> Result<XmlElement, ReadError> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    stack.push(Self::from_start(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let element = Self::from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ReadError::xml("Unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| ReadError::xml(format!("Text error: {e}")))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(ref e)) => {
                    let text = std::str::from_utf8(e)
                        .map_err(|e| ReadError::xml(format!("CDATA error: {e}")))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ReadError::xml(format!(
                        "XML parse error at position {}: {e}",
                        reader.error_position()
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(ReadError::xml(format!("Unclosed element '{}'", open.name)));
        }
        root.ok_or_else(|| ReadError::xml("Document has no root element"))
    }

    fn from_start(e: &BytesStart<'_>) -> Result<XmlElement, ReadError> {
        let name = std::str::from_utf8(e.name().as_ref())
            .map_err(|e| ReadError::xml(format!("Invalid tag name: {e}")))?
            .to_string();
        let mut element = XmlElement::new(name);
        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|e| ReadError::xml(format!("Attribute error: {e}")))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| ReadError::xml(format!("Attribute key error: {e}")))?;
            let value = attr
                .unescape_value()
                .map_err(|e| ReadError::xml(format!("Attribute value error: {e}")))?;
            element.attributes.push((key.to_string(), value.to_string()));
        }
        Ok(element)
    }

    // ========================================================================
    // WRITING
    // ========================================================================

    /// Serialize as a document with an XML declaration.
    pub fn to_document(&self) -> Result<Vec<u8>, WriteError> {
        let mut buffer = Cursor::new(Vec::new());
        let mut writer = Writer::new_with_indent(&mut buffer, b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| WriteError::xml(format!("Write error: {e}")))?;
        self.write_to(&mut writer)?;
        let mut output = buffer.into_inner();
        output.push(b'\n');
        Ok(output)
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), WriteError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() && self.text.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| WriteError::xml(format!("Write error: {e}")));
        }
        writer
            .write_event(Event::Start(start))
            .map_err(|e| WriteError::xml(format!("Write error: {e}")))?;
        if !self.text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.text)))
                .map_err(|e| WriteError::xml(format!("Write error: {e}")))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| WriteError::xml(format!("Write error: {e}")))?;
        Ok(())
    }
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) -> Result<(), ReadError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ReadError::xml("Document has more than one root element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
            <ECSchema schemaName="Test" xmlns="urn:x">
                <ECEntityClass typeName="A"><BaseClass>ts:B</BaseClass></ECEntityClass>
                <ECEntityClass typeName="B" />
            </ECSchema>"#;
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.local_name(), "ECSchema");
        assert_eq!(root.attr("schemaName"), Some("Test"));
        assert_eq!(root.children_named("ECEntityClass").count(), 2);
        let a = root.child("ECEntityClass").unwrap();
        assert_eq!(a.child("BaseClass").unwrap().text, "ts:B");
    }

    #[test]
    fn test_prefixed_names_match_locally() {
        let root = XmlElement::parse(br#"<ec:ECSchema ec:schemaName="T"><ec:ECClass/></ec:ECSchema>"#).unwrap();
        assert_eq!(root.local_name(), "ECSchema");
        assert_eq!(root.attr("schemaName"), Some("T"));
        assert!(root.child("ECClass").is_some());
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            XmlElement::parse(b"<A><B></A>"),
            Err(ReadError::FailedToParseXml(_))
        ));
        assert!(matches!(
            XmlElement::parse(b"<A>"),
            Err(ReadError::FailedToParseXml(_))
        ));
        assert!(matches!(XmlElement::parse(b""), Err(ReadError::FailedToParseXml(_))));
    }

    #[test]
    fn test_write_escapes_and_round_trips() {
        let mut root = XmlElement::new("Root").with_attr("label", "a < b & \"c\"");
        root.push_child(XmlElement::new("Leaf").with_text("x & y"));
        root.push_child(XmlElement::new("Empty"));
        let bytes = root.to_document().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<Empty/>"));

        let back = XmlElement::parse(&bytes).unwrap();
        assert_eq!(back, root);
    }
}
