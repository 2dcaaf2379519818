//! The four embedding channels.

use super::EmbeddingChannel;
use crate::config::ChannelKind;
use crate::document::HostDocument;
use crate::error::{Error, Result};
use crate::extractors::xmp::{XmpExtractor, XmpMetadata};
use crate::object::{get_lenient, Dict, Object};
use crate::signatures::FORMAT_VERSION;
use crate::writer::{XmpWriter, NS_PDFSEAL, PDFSEAL_PREFIX};

/// Information dictionary key of the dedicated entry.
pub const INFO_KEY: &str = "SealEnvelope";
/// Catalog key referencing the envelope dictionary.
pub const CATALOG_KEY: &str = "PdfSeal_Envelope";
/// XMP property local name.
const XMP_PROPERTY: &str = "Envelope";

/// Channel implementation for a kind.
pub fn channel_for(kind: ChannelKind) -> Box<dyn EmbeddingChannel> {
    match kind {
        ChannelKind::InfoEntry => Box::new(InfoEntryChannel),
        ChannelKind::Keywords => Box::new(KeywordsChannel),
        ChannelKind::Catalog => Box::new(CatalogChannel),
        ChannelKind::Xmp => Box::new(XmpChannel),
    }
}

/// Text of a stored value.
///
/// Strings are decoded as PDF text; arrays (one level) are joined the way a
/// keyword collection is; streams are decoded.
fn value_text(doc: &HostDocument, obj: &Object) -> Option<String> {
    match doc.resolve(obj) {
        Object::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| scalar_text(doc.resolve(item)))
                .collect();
            (!parts.is_empty()).then(|| join_collection(&parts))
        },
        stream @ Object::Stream { .. } => stream
            .decode_stream_data()
            .map_err(|e| log::debug!("Channel stream not decodable: {}", e))
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        other => scalar_text(other),
    }
}

fn scalar_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(_) => obj.as_text(),
        Object::Name(name) => Some(name.clone()),
        _ => None,
    }
}

/// Join collection items into one text value.
fn join_collection<S: AsRef<str>>(items: &[S]) -> String {
    items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
}

/// Remove `key` and its casing/slash variants.
fn remove_lenient(dict: &mut Dict, key: &str) -> bool {
    let mut removed = false;
    while let Some((found, _)) = get_lenient(dict, key) {
        let found = found.to_string();
        dict.remove(&found);
        removed = true;
    }
    removed
}

fn info_text(doc: &HostDocument, key: &str) -> Option<String> {
    let info = doc.info()?;
    let (_, value) = get_lenient(info, key)?;
    value_text(doc, value).filter(|t| !t.trim().is_empty())
}

/// Custom `/SealEnvelope` key in the information dictionary.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfoEntryChannel;

impl EmbeddingChannel for InfoEntryChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::InfoEntry
    }

    fn write(&self, doc: &mut HostDocument, blob: &str) -> Result<()> {
        let info = doc.ensure_info();
        let dict = doc.dict_mut(info)?;
        remove_lenient(dict, INFO_KEY);
        dict.insert(INFO_KEY.to_string(), Object::text(blob));
        Ok(())
    }

    fn read(&self, doc: &HostDocument) -> Option<String> {
        info_text(doc, INFO_KEY)
    }

    fn clear(&self, doc: &mut HostDocument) -> Result<bool> {
        let info = doc.ensure_info();
        Ok(remove_lenient(doc.dict_mut(info)?, INFO_KEY))
    }
}

/// The standard `/Keywords` entry.
///
/// `/Keywords` is a text string; the envelope is its only keyword, stored
/// as-is. Existing keywords are replaced. Array values written by other
/// tools are still read.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordsChannel;

impl EmbeddingChannel for KeywordsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Keywords
    }

    fn write(&self, doc: &mut HostDocument, blob: &str) -> Result<()> {
        let info = doc.ensure_info();
        let dict = doc.dict_mut(info)?;
        remove_lenient(dict, "Keywords");
        dict.insert("Keywords".to_string(), Object::text(blob));
        Ok(())
    }

    fn read(&self, doc: &HostDocument) -> Option<String> {
        info_text(doc, "Keywords")
    }

    fn clear(&self, doc: &mut HostDocument) -> Result<bool> {
        let info = doc.ensure_info();
        Ok(remove_lenient(doc.dict_mut(info)?, "Keywords"))
    }
}

/// Indirect `<< /Type /PdfSeal_Envelope /Data (...) /Version (...) >>`
/// referenced from the catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogChannel;

impl EmbeddingChannel for CatalogChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Catalog
    }

    fn write(&self, doc: &mut HostDocument, blob: &str) -> Result<()> {
        let catalog_ref = doc.catalog_ref()?;

        let mut envelope = Dict::new();
        envelope.insert("Type".to_string(), Object::name(CATALOG_KEY));
        envelope.insert("Data".to_string(), Object::text(blob));
        envelope.insert("Version".to_string(), Object::text(FORMAT_VERSION));
        let envelope = Object::Dictionary(envelope);

        let existing = doc
            .catalog()?
            .get(CATALOG_KEY)
            .and_then(Object::as_reference)
            .filter(|r| matches!(doc.get(*r), Some(Object::Dictionary(_))));
        let reference = match existing {
            Some(reference) => {
                doc.set_object(reference, envelope);
                reference
            },
            None => doc.add_object(envelope),
        };

        let catalog = doc.dict_mut(catalog_ref)?;
        remove_lenient(catalog, CATALOG_KEY);
        catalog.insert(CATALOG_KEY.to_string(), Object::Reference(reference));
        Ok(())
    }

    fn read(&self, doc: &HostDocument) -> Option<String> {
        let catalog = doc.catalog().ok()?;
        let (_, value) = get_lenient(catalog, CATALOG_KEY)?;
        let text = match doc.resolve(value) {
            Object::Dictionary(dict) => {
                let (_, data) = get_lenient(dict, "Data")?;
                value_text(doc, data)
            },
            other => value_text(doc, other),
        };
        text.filter(|t| !t.trim().is_empty())
    }

    fn clear(&self, doc: &mut HostDocument) -> Result<bool> {
        let catalog_ref = doc.catalog_ref()?;
        Ok(remove_lenient(doc.dict_mut(catalog_ref)?, CATALOG_KEY))
    }
}

/// `pdfseal:Envelope` property in the catalog XMP packet.
///
/// Other properties of an existing packet are carried over.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmpChannel;

impl XmpChannel {
    /// Qualified names under which an envelope may be stored.
    fn envelope_keys(metadata: &XmpMetadata) -> Vec<String> {
        let mut keys: Vec<String> = metadata
            .namespaces
            .iter()
            .filter(|(_, uri)| uri.as_str() == NS_PDFSEAL)
            .map(|(prefix, _)| format!("{}:{}", prefix, XMP_PROPERTY))
            .collect();
        keys.push(format!("{}:{}", PDFSEAL_PREFIX, XMP_PROPERTY));
        keys
    }

    fn existing(doc: &HostDocument) -> XmpMetadata {
        match XmpExtractor::extract(doc) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                log::warn!("Existing XMP packet unreadable, starting a new one: {}", e);
                XmpMetadata::new()
            },
        }
    }

    fn store(doc: &mut HostDocument, packet: Vec<u8>) -> Result<()> {
        let catalog_ref = doc.catalog_ref()?;
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("Metadata"));
        dict.insert("Subtype".to_string(), Object::name("XML"));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from(packet),
        };

        let existing = doc
            .catalog()?
            .get("Metadata")
            .and_then(Object::as_reference)
            .filter(|r| matches!(doc.get(*r), Some(Object::Stream { .. })));
        match existing {
            Some(reference) => doc.set_object(reference, stream),
            None => {
                let reference = doc.add_object(stream);
                doc.dict_mut(catalog_ref)?
                    .insert("Metadata".to_string(), Object::Reference(reference));
            },
        }
        Ok(())
    }
}

impl EmbeddingChannel for XmpChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Xmp
    }

    fn write(&self, doc: &mut HostDocument, blob: &str) -> Result<()> {
        let mut metadata = Self::existing(doc);
        for key in Self::envelope_keys(&metadata) {
            metadata.custom.remove(&key);
        }
        let packet = XmpWriter::new(metadata).envelope(blob).build_bytes();
        Self::store(doc, packet).map_err(|e| Error::ChannelWrite {
            channel: ChannelKind::Xmp.name(),
            reason: e.to_string(),
        })
    }

    fn read(&self, doc: &HostDocument) -> Option<String> {
        let metadata = XmpExtractor::extract(doc).ok().flatten()?;
        Self::envelope_keys(&metadata)
            .iter()
            .find_map(|key| metadata.custom.get(key))
            .or_else(|| {
                metadata
                    .custom
                    .iter()
                    .find(|(k, _)| k.to_ascii_lowercase().ends_with(":envelope"))
                    .map(|(_, v)| v)
            })
            .filter(|t| !t.trim().is_empty())
            .cloned()
    }

    fn clear(&self, doc: &mut HostDocument) -> Result<bool> {
        let mut metadata = Self::existing(doc);
        let mut removed = false;
        for key in Self::envelope_keys(&metadata) {
            removed |= metadata.custom.remove(&key).is_some();
        }
        if removed {
            Self::store(doc, XmpWriter::new(metadata).build_bytes())?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TextDocumentBuilder;

    const BLOB: &str = r#"{"signature":"ab","publicKey":"04","documentHash":"00"}"#;

    fn doc() -> HostDocument {
        HostDocument::from_bytes(TextDocumentBuilder::new("Hello World").build()).unwrap()
    }

    #[test]
    fn test_each_channel_round_trips() {
        for kind in ChannelKind::ALL {
            let channel = channel_for(kind);
            assert_eq!(channel.kind(), kind);
            let mut doc = doc();
            assert!(channel.read(&doc).is_none(), "{} not empty", kind);
            channel.write(&mut doc, BLOB).unwrap();
            assert_eq!(channel.read(&doc).as_deref(), Some(BLOB), "{}", kind);
            assert!(channel.clear(&mut doc).unwrap());
            assert!(channel.read(&doc).is_none(), "{} not cleared", kind);
        }
    }

    #[test]
    fn test_channels_independent() {
        let mut doc = doc();
        InfoEntryChannel.write(&mut doc, BLOB).unwrap();
        assert!(KeywordsChannel.read(&doc).is_none());
        assert!(CatalogChannel.read(&doc).is_none());
        assert!(XmpChannel.read(&doc).is_none());
    }

    #[test]
    fn test_info_key_variants() {
        let mut doc = doc();
        let info = doc.ensure_info();
        doc.dict_mut(info)
            .unwrap()
            .insert("/sealenvelope".to_string(), Object::text(BLOB));
        assert_eq!(InfoEntryChannel.read(&doc).as_deref(), Some(BLOB));

        InfoEntryChannel.write(&mut doc, "{}").unwrap();
        let dict = doc.info().unwrap();
        assert!(!dict.contains_key("/sealenvelope"));
        assert_eq!(InfoEntryChannel.read(&doc).as_deref(), Some("{}"));
    }

    #[test]
    fn test_keywords_array_value() {
        let mut doc = doc();
        let info = doc.ensure_info();
        doc.dict_mut(info)
            .unwrap()
            .insert("Keywords".to_string(), Object::Array(vec![Object::text(BLOB)]));
        assert_eq!(KeywordsChannel.read(&doc).as_deref(), Some(BLOB));
    }

    #[test]
    fn test_keywords_written_as_text_string() {
        let mut doc = doc();
        KeywordsChannel.write(&mut doc, BLOB).unwrap();
        let stored = doc.info().unwrap().get("Keywords").unwrap();
        assert!(matches!(stored, Object::String(_)));
        assert_eq!(stored.as_text().as_deref(), Some(BLOB));
    }

    #[test]
    fn test_catalog_rewrite_reuses_object() {
        let mut doc = doc();
        CatalogChannel.write(&mut doc, "first").unwrap();
        let count = doc.objects().count();
        CatalogChannel.write(&mut doc, "second").unwrap();
        assert_eq!(doc.objects().count(), count);
        assert_eq!(CatalogChannel.read(&doc).as_deref(), Some("second"));

        let reference = doc.catalog().unwrap().get(CATALOG_KEY).and_then(Object::as_reference).unwrap();
        let dict = doc.get(reference).and_then(Object::as_dict).unwrap();
        assert_eq!(dict.get("Type").and_then(Object::as_name), Some(CATALOG_KEY));
        assert_eq!(dict.get("Version").and_then(Object::as_text).as_deref(), Some(FORMAT_VERSION));
    }

    #[test]
    fn test_xmp_keeps_other_properties() {
        let mut doc = doc();
        let packet = XmpWriter::new(XmpMetadata::new().with_title("Kept")).build_bytes();
        XmpChannel::store(&mut doc, packet).unwrap();

        XmpChannel.write(&mut doc, BLOB).unwrap();
        let metadata = XmpExtractor::extract(&doc).unwrap().unwrap();
        assert_eq!(metadata.dc_title.as_deref(), Some("Kept"));
        assert_eq!(XmpChannel.read(&doc).as_deref(), Some(BLOB));
    }

    #[test]
    fn test_xmp_foreign_prefix() {
        let mut doc = doc();
        let packet = XmpWriter::new(XmpMetadata::new())
            .property("seal", NS_PDFSEAL, "Envelope", BLOB)
            .build_bytes();
        XmpChannel::store(&mut doc, packet).unwrap();
        assert_eq!(XmpChannel.read(&doc).as_deref(), Some(BLOB));

        XmpChannel.write(&mut doc, "{}").unwrap();
        let metadata = XmpExtractor::extract(&doc).unwrap().unwrap();
        assert!(!metadata.custom.contains_key("seal:Envelope"));
        assert_eq!(XmpChannel.read(&doc).as_deref(), Some("{}"));
    }

    #[test]
    fn test_unicode_blob() {
        let mut doc = doc();
        let blob = r#"{"author":"Zoë 世界","signature":"ab"}"#;
        InfoEntryChannel.write(&mut doc, blob).unwrap();
        assert_eq!(InfoEntryChannel.read(&doc).as_deref(), Some(blob));
    }
}
