//! Minimal one-page document from plain text.
//!
//! Used when there is no document yet, only text to sign. The output is a
//! pure function of the input: no dates, IDs or other varying values are
//! written, so the same text always hashes to the same digest.

use super::pdf_writer::assemble;
use crate::decoders::FlateDecoder;
use crate::object::{Dict, Object, ObjectRef};

/// US Letter, in points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;

/// Builds a single-page Helvetica document showing some text.
///
/// Lines are split on `\n`; text is not wrapped. Characters outside Latin-1
/// are shown as `?`.
///
/// ```
/// use pdf_seal::writer::TextDocumentBuilder;
///
/// let a = TextDocumentBuilder::new("Hello World").build();
/// let b = TextDocumentBuilder::new("Hello World").build();
/// assert_eq!(a, b);
/// assert!(a.starts_with(b"%PDF-1.7"));
/// ```
#[derive(Debug, Clone)]
pub struct TextDocumentBuilder {
    text: String,
    font_size: f32,
    title: Option<String>,
    compress: bool,
}

impl TextDocumentBuilder {
    /// Start a document showing `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: 12.0,
            title: None,
            compress: false,
        }
    }

    /// Set the font size in points.
    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    /// Set `/Title` in the information dictionary.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Compress the page content with FlateDecode.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Build the content stream bytes.
    fn content(&self) -> Vec<u8> {
        let leading = self.font_size * 1.2;
        let mut content = format!(
            "BT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
            fmt_num(self.font_size),
            fmt_num(leading),
            fmt_num(MARGIN),
            fmt_num(PAGE_HEIGHT - MARGIN - self.font_size)
        )
        .into_bytes();

        for (i, line) in self.text.split('\n').enumerate() {
            if i > 0 {
                content.extend_from_slice(b"T*\n");
            }
            content.push(b'(');
            for c in line.trim_end_matches('\r').chars() {
                let byte = u8::try_from(u32::from(c)).unwrap_or(b'?');
                match byte {
                    b'(' | b')' | b'\\' => {
                        content.push(b'\\');
                        content.push(byte);
                    },
                    0x20..=0x7E => content.push(byte),
                    _ => content.extend_from_slice(format!("\\{:03o}", byte).as_bytes()),
                }
            }
            content.extend_from_slice(b") Tj\n");
        }
        content.extend_from_slice(b"ET\n");
        content
    }

    /// Produce the document bytes.
    pub fn build(&self) -> Vec<u8> {
        let catalog = ObjectRef::new(1, 0);
        let pages = ObjectRef::new(2, 0);
        let page = ObjectRef::new(3, 0);
        let contents = ObjectRef::new(4, 0);
        let font = ObjectRef::new(5, 0);
        let info = ObjectRef::new(6, 0);

        let mut content_dict = Dict::new();
        let raw = self.content();
        let data = if self.compress {
            match FlateDecoder::encode(&raw) {
                Ok(compressed) => {
                    content_dict.insert("Filter".to_string(), Object::name("FlateDecode"));
                    compressed
                },
                Err(e) => {
                    log::warn!("Content compression failed, writing uncompressed: {}", e);
                    raw
                },
            }
        } else {
            raw
        };

        let objects = vec![
            (catalog, dict(&[("Type", Object::name("Catalog")), ("Pages", Object::Reference(pages))])),
            (
                pages,
                dict(&[
                    ("Type", Object::name("Pages")),
                    ("Kids", Object::Array(vec![Object::Reference(page)])),
                    ("Count", Object::Integer(1)),
                ]),
            ),
            (
                page,
                dict(&[
                    ("Type", Object::name("Page")),
                    ("Parent", Object::Reference(pages)),
                    (
                        "MediaBox",
                        Object::Array(vec![
                            Object::Integer(0),
                            Object::Integer(0),
                            Object::Real(PAGE_WIDTH as f64),
                            Object::Real(PAGE_HEIGHT as f64),
                        ]),
                    ),
                    ("Contents", Object::Reference(contents)),
                    (
                        "Resources",
                        dict(&[("Font", dict(&[("F1", Object::Reference(font))]))]),
                    ),
                ]),
            ),
            (
                contents,
                Object::Stream {
                    dict: content_dict,
                    data: bytes::Bytes::from(data),
                },
            ),
            (
                font,
                dict(&[
                    ("Type", Object::name("Font")),
                    ("Subtype", Object::name("Type1")),
                    ("BaseFont", Object::name("Helvetica")),
                    ("Encoding", Object::name("WinAnsiEncoding")),
                ]),
            ),
            (info, self.info_dict()),
        ];

        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), Object::Integer(7));
        trailer.insert("Root".to_string(), Object::Reference(catalog));
        trailer.insert("Info".to_string(), Object::Reference(info));

        assemble(1, 7, objects.iter().map(|(r, o)| (*r, o)), trailer)
    }

    fn info_dict(&self) -> Object {
        let mut info = Dict::new();
        info.insert("Producer".to_string(), Object::text(&format!("pdf_seal {}", crate::VERSION)));
        if let Some(title) = &self.title {
            info.insert("Title".to_string(), Object::text(title));
        }
        Object::Dictionary(info)
    }
}

fn dict(entries: &[(&str, Object)]) -> Object {
    Object::Dictionary(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

fn fmt_num(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HostDocument;

    #[test]
    fn test_build_is_deterministic() {
        let a = TextDocumentBuilder::new("Hello World").build();
        let b = TextDocumentBuilder::new("Hello World").build();
        assert_eq!(a, b);
        assert_ne!(a, TextDocumentBuilder::new("Hello World!").build());
    }

    #[test]
    fn test_built_document_parses() {
        let bytes = TextDocumentBuilder::new("Line one\nLine (two)").title("Note").build();
        let doc = HostDocument::from_bytes(bytes).unwrap();
        let catalog = doc.catalog().unwrap();
        let pages = doc.resolve_key(catalog, "Pages").and_then(Object::as_dict).unwrap();
        assert_eq!(pages.get("Count").and_then(Object::as_integer), Some(1));
        assert_eq!(
            doc.info().unwrap().get("Title").and_then(Object::as_text).as_deref(),
            Some("Note")
        );
    }

    #[test]
    fn test_content_escapes_and_lines() {
        let content = TextDocumentBuilder::new("a(b)\nc\\d\u{e9}\u{4e16}").content();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("(a\\(b\\)) Tj"));
        assert!(text.contains("T*"));
        assert!(text.contains("(c\\\\d\\351?) Tj"));
    }

    #[test]
    fn test_compressed_content_decodes() {
        let bytes = TextDocumentBuilder::new("Hello").compress(true).build();
        let doc = HostDocument::from_bytes(bytes).unwrap();
        let stream = doc.get(ObjectRef::new(4, 0)).unwrap();
        let decoded = stream.decode_stream_data().unwrap();
        assert!(String::from_utf8_lossy(&decoded).contains("(Hello) Tj"));
    }
}
