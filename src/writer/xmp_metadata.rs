//! XMP metadata writing.
//!
//! Generates XMP packets for the catalog `/Metadata` stream
//! (ISO 32000-1:2008, Section 14.3.2). Properties read from an existing
//! packet are written back, so replacing a packet only adds to it.

use crate::extractors::xmp::XmpMetadata;

/// XMP namespace URIs
const NS_X: &str = "adobe:ns:meta/";
const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";
const NS_PDF: &str = "http://ns.adobe.com/pdf/1.3/";

/// Namespace of the signing envelope property.
pub const NS_PDFSEAL: &str = "http://ns.pdfseal.org/envelope/1.0/";
/// Prefix bound to [`NS_PDFSEAL`].
pub const PDFSEAL_PREFIX: &str = "pdfseal";

/// Prefixes always declared on `rdf:Description`.
const BUILTIN_PREFIXES: [&str; 5] = ["x", "rdf", "dc", "xmp", "pdf"];

/// XMP metadata writer/builder.
pub struct XmpWriter {
    metadata: XmpMetadata,
}

impl XmpWriter {
    /// Create a new XMP writer from metadata.
    pub fn new(metadata: XmpMetadata) -> Self {
        Self { metadata }
    }

    /// Set the document title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.dc_title = Some(title.into());
        self
    }

    /// Replace the creators with a single author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.metadata.dc_creator = vec![author.into()];
        self
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.metadata.dc_description = Some(desc.into());
        self
    }

    /// Set the modification date (ISO 8601 format).
    pub fn modify_date(mut self, date: impl Into<String>) -> Self {
        self.metadata.xmp_modify_date = Some(date.into());
        self
    }

    /// Set the PDF producer.
    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.metadata.pdf_producer = Some(producer.into());
        self
    }

    /// Set a property in an arbitrary namespace.
    pub fn property(mut self, prefix: &str, uri: &str, name: &str, value: impl Into<String>) -> Self {
        self.metadata = self.metadata.with_custom(prefix, uri, name, value);
        self
    }

    /// Set the `pdfseal:Envelope` property.
    pub fn envelope(self, blob: impl Into<String>) -> Self {
        self.property(PDFSEAL_PREFIX, NS_PDFSEAL, "Envelope", blob)
    }

    /// Build the XMP packet as an XML string.
    pub fn build(self) -> String {
        self.to_xml()
    }

    /// Build the XMP packet as bytes.
    pub fn build_bytes(self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }

    fn to_xml(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<x:xmpmeta xmlns:x="{}">"#, NS_X));
        xml.push('\n');
        xml.push_str(&format!(r#"  <rdf:RDF xmlns:rdf="{}">"#, NS_RDF));
        xml.push('\n');

        xml.push_str("    <rdf:Description rdf:about=\"\"\n");
        xml.push_str(&format!("        xmlns:dc=\"{}\"\n", NS_DC));
        xml.push_str(&format!("        xmlns:xmp=\"{}\"\n", NS_XMP));
        xml.push_str(&format!("        xmlns:pdf=\"{}\"", NS_PDF));
        for (prefix, uri) in &self.metadata.namespaces {
            if BUILTIN_PREFIXES.contains(&prefix.as_str()) || !is_xml_name(prefix) {
                continue;
            }
            xml.push_str(&format!("\n        xmlns:{}=\"{}\"", prefix, escape_xml(uri)));
        }
        xml.push_str(">\n");

        // Dublin Core
        if let Some(title) = &self.metadata.dc_title {
            push_alt(&mut xml, "dc:title", title);
        }

        if !self.metadata.dc_creator.is_empty() {
            xml.push_str("      <dc:creator>\n");
            xml.push_str("        <rdf:Seq>\n");
            for creator in &self.metadata.dc_creator {
                xml.push_str(&format!("          <rdf:li>{}</rdf:li>\n", escape_xml(creator)));
            }
            xml.push_str("        </rdf:Seq>\n");
            xml.push_str("      </dc:creator>\n");
        }

        if let Some(desc) = &self.metadata.dc_description {
            push_alt(&mut xml, "dc:description", desc);
        }

        // XMP Core
        push_simple(&mut xml, "xmp:CreatorTool", self.metadata.xmp_creator_tool.as_deref());
        push_simple(&mut xml, "xmp:CreateDate", self.metadata.xmp_create_date.as_deref());
        push_simple(&mut xml, "xmp:ModifyDate", self.metadata.xmp_modify_date.as_deref());

        // Adobe PDF
        push_simple(&mut xml, "pdf:Producer", self.metadata.pdf_producer.as_deref());
        push_simple(&mut xml, "pdf:Keywords", self.metadata.pdf_keywords.as_deref());

        for (key, value) in &self.metadata.custom {
            if !self.is_declared(key) {
                log::debug!("Dropping XMP property {} with undeclared namespace", key);
                continue;
            }
            push_simple(&mut xml, key, Some(value));
        }

        xml.push_str("    </rdf:Description>\n");
        xml.push_str("  </rdf:RDF>\n");
        xml.push_str("</x:xmpmeta>\n");

        // Padding for in-place editing
        for _ in 0..40 {
            xml.push_str("                                                  \n");
        }

        xml.push_str(r#"<?xpacket end="w"?>"#);
        xml
    }

    fn is_declared(&self, qualified: &str) -> bool {
        let Some((prefix, local)) = qualified.split_once(':') else {
            return false;
        };
        is_xml_name(local)
            && (BUILTIN_PREFIXES.contains(&prefix)
                || (is_xml_name(prefix) && self.metadata.namespaces.contains_key(prefix)))
    }
}

fn push_simple(xml: &mut String, element: &str, value: Option<&str>) {
    if let Some(value) = value {
        xml.push_str(&format!("      <{0}>{1}</{0}>\n", element, escape_xml(value)));
    }
}

fn push_alt(xml: &mut String, element: &str, value: &str) {
    xml.push_str(&format!("      <{}>\n", element));
    xml.push_str("        <rdf:Alt>\n");
    xml.push_str(&format!(
        "          <rdf:li xml:lang=\"x-default\">{}</rdf:li>\n",
        escape_xml(value)
    ));
    xml.push_str("        </rdf:Alt>\n");
    xml.push_str(&format!("      </{}>\n", element));
}

fn is_xml_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Current time in ISO 8601 format.
pub fn iso_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::xmp::XmpExtractor;

    #[test]
    fn test_xmp_writer_basic() {
        let xml = XmpWriter::new(XmpMetadata::new())
            .title("Test Document")
            .author("John Doe")
            .description("A test document")
            .build();

        assert!(xml.starts_with("<?xpacket begin"));
        assert!(xml.contains("<dc:title>"));
        assert!(xml.contains("Test Document"));
        assert!(xml.contains("<rdf:li>John Doe</rdf:li>"));
        assert!(xml.contains("A test document"));
        assert!(xml.ends_with("<?xpacket end=\"w\"?>"));
    }

    #[test]
    fn test_xmp_writer_xml_escape() {
        let xml = XmpWriter::new(XmpMetadata::new()).title("Test & Document <special>").build();
        assert!(xml.contains("Test &amp; Document &lt;special&gt;"));
    }

    #[test]
    fn test_envelope_property_declares_namespace() {
        let xml = XmpWriter::new(XmpMetadata::new()).envelope(r#"{"id":"x"}"#).build();
        assert!(xml.contains(&format!("xmlns:pdfseal=\"{}\"", NS_PDFSEAL)));
        assert!(xml.contains("<pdfseal:Envelope>{&quot;id&quot;:&quot;x&quot;}</pdfseal:Envelope>"));
    }

    #[test]
    fn test_existing_properties_survive_rewrite() {
        let original = XmpWriter::new(XmpMetadata::new())
            .title("Report")
            .producer("Acme")
            .property("acme", "http://acme.example/ns/", "Ticket", "T-1")
            .build();
        let parsed = XmpExtractor::parse_xmp(&original).unwrap().unwrap();

        let rewritten = XmpWriter::new(parsed).envelope("{}").build();
        let reparsed = XmpExtractor::parse_xmp(&rewritten).unwrap().unwrap();
        assert_eq!(reparsed.dc_title.as_deref(), Some("Report"));
        assert_eq!(reparsed.pdf_producer.as_deref(), Some("Acme"));
        assert_eq!(reparsed.custom.get("acme:Ticket").map(String::as_str), Some("T-1"));
        assert_eq!(reparsed.custom.get("pdfseal:Envelope").map(String::as_str), Some("{}"));
    }

    #[test]
    fn test_undeclared_prefix_dropped() {
        let mut metadata = XmpMetadata::new();
        metadata.custom.insert("ghost:Value".to_string(), "boo".to_string());
        let xml = XmpWriter::new(metadata).build();
        assert!(!xml.contains("ghost:Value"));
    }

    #[test]
    fn test_iso_timestamp_shape() {
        let ts = iso_timestamp();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
    }
}
