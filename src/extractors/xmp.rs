//! XMP metadata extraction.
//!
//! Reads the catalog `/Metadata` packet (ISO 32000-1:2008, Section 14.3.2)
//! into the handful of properties the sealing workflow touches. Everything
//! else that has a simple text value is kept in [`XmpMetadata::custom`] so a
//! rewritten packet does not lose it.

use crate::document::HostDocument;
use crate::error::Result;
use crate::object::Object;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

/// XMP metadata read from (or about to be written to) a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmpMetadata {
    /// Document title (dc:title)
    pub dc_title: Option<String>,
    /// Document creators/authors (dc:creator)
    pub dc_creator: Vec<String>,
    /// Document description (dc:description)
    pub dc_description: Option<String>,
    /// Tool used to create the document (xmp:CreatorTool)
    pub xmp_creator_tool: Option<String>,
    /// Creation date (xmp:CreateDate)
    pub xmp_create_date: Option<String>,
    /// Last modification date (xmp:ModifyDate)
    pub xmp_modify_date: Option<String>,
    /// PDF producer (pdf:Producer)
    pub pdf_producer: Option<String>,
    /// PDF keywords (pdf:Keywords)
    pub pdf_keywords: Option<String>,
    /// Other simple properties (`prefix:Name` -> value)
    pub custom: BTreeMap<String, String>,
    /// Namespace declarations seen on `rdf:Description` (prefix -> URI)
    pub namespaces: BTreeMap<String, String>,
}

impl XmpMetadata {
    /// Create a new empty XMP metadata instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if any property is present.
    pub fn is_empty(&self) -> bool {
        self.dc_title.is_none()
            && self.dc_creator.is_empty()
            && self.dc_description.is_none()
            && self.xmp_creator_tool.is_none()
            && self.xmp_create_date.is_none()
            && self.xmp_modify_date.is_none()
            && self.pdf_producer.is_none()
            && self.pdf_keywords.is_none()
            && self.custom.is_empty()
    }

    /// Set the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.dc_title = Some(title.into());
        self
    }

    /// Add a creator/author.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.dc_creator.push(creator.into());
        self
    }

    /// Add a custom property under a declared namespace.
    pub fn with_custom(mut self, prefix: &str, uri: &str, name: &str, value: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.to_string(), uri.to_string());
        self.custom.insert(format!("{}:{}", prefix, name), value.into());
        self
    }

    fn assign(&mut self, property: &str, text: String) {
        match property {
            "dc:title" => {
                self.dc_title.get_or_insert(text);
            },
            "dc:creator" => self.dc_creator.push(text),
            "dc:description" => {
                self.dc_description.get_or_insert(text);
            },
            "xmp:CreatorTool" => self.xmp_creator_tool = Some(text),
            "xmp:CreateDate" => self.xmp_create_date = Some(text),
            "xmp:ModifyDate" => self.xmp_modify_date = Some(text),
            "pdf:Producer" => self.pdf_producer = Some(text),
            "pdf:Keywords" => self.pdf_keywords = Some(text),
            other => {
                self.custom.insert(other.to_string(), text);
            },
        }
    }

    /// Namespace declarations and shorthand properties on `rdf:Description`.
    fn absorb_description(&mut self, e: &BytesStart<'_>) {
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.insert(prefix.to_string(), value.into_owned());
            } else if !key.starts_with("rdf:") && !key.starts_with("xml:") && key.contains(':') {
                self.assign(&key, value.into_owned());
            }
        }
    }
}

/// XMP metadata extractor.
pub struct XmpExtractor;

impl XmpExtractor {
    /// Extract XMP metadata from the document catalog.
    ///
    /// Returns `Ok(None)` when there is no usable `/Metadata` stream.
    pub fn extract(doc: &HostDocument) -> Result<Option<XmpMetadata>> {
        match Self::packet(doc)? {
            Some(xml) => Self::parse_xmp(&xml),
            None => Ok(None),
        }
    }

    /// The raw XML of the catalog `/Metadata` stream, if any.
    pub fn packet(doc: &HostDocument) -> Result<Option<String>> {
        let catalog = doc.catalog()?;
        let stream = match doc.resolve_key(catalog, "Metadata") {
            Some(obj @ Object::Stream { .. }) => obj,
            Some(other) => {
                log::debug!("Catalog /Metadata is a {}, not a stream", other.type_name());
                return Ok(None);
            },
            None => return Ok(None),
        };
        match stream.decode_stream_data() {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) => {
                log::warn!("Could not decode XMP stream: {}", e);
                Ok(None)
            },
        }
    }

    /// Parse XMP XML content.
    ///
    /// Returns `Ok(None)` if there is no `x:xmpmeta` or `rdf:RDF` element.
    pub fn parse_xmp(xml: &str) -> Result<Option<XmpMetadata>> {
        let start = xml.find("<x:xmpmeta").or_else(|| xml.find("<rdf:RDF"));
        let end = match xml.rfind("</x:xmpmeta>") {
            Some(e) => Some(e + "</x:xmpmeta>".len()),
            None => xml.rfind("</rdf:RDF>").map(|e| e + "</rdf:RDF>".len()),
        };
        let content = match (start, end) {
            (Some(s), Some(e)) if s < e => &xml[s..e],
            _ => return Ok(None),
        };

        let mut metadata = XmpMetadata::new();
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut element_stack: Vec<String> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name == "rdf:Description" {
                        metadata.absorb_description(&e);
                    }
                    element_stack.push(name);
                },
                Ok(Event::Empty(e)) => {
                    if e.name().as_ref() == b"rdf:Description" {
                        metadata.absorb_description(&e);
                    }
                },
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map(|t| t.trim().to_string()).unwrap_or_default();
                    if text.is_empty() {
                        continue;
                    }
                    // Skip rdf:li / rdf:Alt / rdf:Seq / rdf:Bag wrappers
                    let property = element_stack
                        .iter()
                        .rev()
                        .find(|el| !el.starts_with("rdf:") && !el.starts_with("x:"))
                        .cloned();
                    if let Some(prop) = property {
                        metadata.assign(&prop, text);
                    }
                },
                Ok(Event::End(_)) => {
                    element_stack.pop();
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    log::warn!("XMP parsing error at {}: {:?}", reader.buffer_position(), e);
                    break;
                },
                _ => {},
            }
        }

        Ok(Some(metadata))
    }
}
