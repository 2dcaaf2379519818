//! Cross-reference reconstruction for damaged files.
//!
//! When `startxref` is missing or the chain it points to is broken, the whole
//! file is scanned for `N G obj` headers. The last definition of an object
//! number wins, matching what an incremental update would have produced.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object, parse_object};
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;

lazy_static! {
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(\d+)\s+(\d+)\s+obj\b").expect("valid regex");
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"trailer\s*<<").expect("valid regex");
}

/// Rebuild a cross-reference table by scanning `data` for object headers.
///
/// The trailer is assembled from every `trailer` dictionary and every
/// `/Type /XRef` stream dictionary found, later ones winning. If no `/Root`
/// turns up, the last object typed `/Catalog` is used.
///
/// # Errors
///
/// Returns `Error::InvalidPdf` if no object headers are found at all.
pub fn reconstruct_xref(data: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning {} bytes", data.len());

    let mut xref = CrossRefTable::new();
    let mut trailer = Dict::new();
    let mut catalog: Option<u32> = None;

    for capture in RE_OBJ_HEADER.captures_iter(data) {
        let (Some(whole), Some(id), Some(gen)) = (capture.get(0), capture.get(1), capture.get(2)) else {
            continue;
        };
        // A digit run glued to a preceding regular character is not a header.
        if whole.start() > 0 && !is_boundary(data[whole.start() - 1]) {
            continue;
        }
        let (Some(id), Some(gen)) = (parse_num::<u32>(id.as_bytes()), parse_num::<u16>(gen.as_bytes())) else {
            log::warn!("Unparseable object header at offset {}", whole.start());
            continue;
        };

        let offset = whole.start();
        match parse_indirect_object(&data[offset..], None) {
            Ok((_, indirect)) => {
                match &indirect.object {
                    Object::Stream { dict, .. } if is_type(dict, "XRef") => {
                        merge_trailer_keys(&mut trailer, dict);
                    },
                    Object::Dictionary(dict) if is_type(dict, "Catalog") => catalog = Some(id),
                    _ => {},
                }
                xref.add_entry(id, XRefEntry::InUse { offset, gen });
            },
            Err(e) => log::debug!("Skipping unreadable object {} {} at {}: {}", id, gen, offset, e),
        }
    }

    if xref.is_empty() {
        return Err(Error::InvalidPdf("no objects found while reconstructing xref".to_string()));
    }

    for m in RE_TRAILER.find_iter(data) {
        let dict_start = m.end() - 2;
        if let Ok((_, Object::Dictionary(dict))) = parse_object(&data[dict_start..]) {
            merge_trailer_keys(&mut trailer, &dict);
        }
    }

    if !trailer.contains_key("Root") {
        if let Some(id) = catalog {
            log::warn!("No trailer /Root found, using catalog object {}", id);
            trailer.insert("Root".to_string(), Object::Reference(crate::object::ObjectRef::new(id, 0)));
        }
    }
    // Offsets from the scan are authoritative; a stale chain must not be followed.
    trailer.remove("Prev");
    trailer.remove("XRefStm");
    xref.set_trailer(trailer);

    log::info!("Reconstructed xref with {} objects", xref.len());
    Ok(xref)
}

fn is_boundary(c: u8) -> bool {
    crate::lexer::is_whitespace(c) || crate::lexer::is_delimiter(c)
}

fn is_type(dict: &Dict, kind: &str) -> bool {
    dict.get("Type").and_then(Object::as_name) == Some(kind)
}

/// Copy the document-level trailer keys from a later dictionary.
fn merge_trailer_keys(trailer: &mut Dict, source: &Dict) {
    for key in ["Root", "Info", "ID", "Size", "Encrypt"] {
        if let Some(value) = source.get(key) {
            trailer.insert(key.to_string(), value.clone());
        }
    }
}

fn parse_num<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_simple() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
trailer\n<< /Size 3 /Root 1 0 R >>\n%%EOF";
        let xref = reconstruct_xref(data).unwrap();
        assert_eq!(xref.len(), 2);
        assert_eq!(xref.get(1), Some(&XRefEntry::InUse { offset: 9, gen: 0 }));
        assert!(xref.trailer().unwrap().contains_key("Root"));
    }

    #[test]
    fn test_reconstruct_last_definition_wins() {
        let data = b"%PDF-1.4\n1 0 obj\n(old)\nendobj\n1 0 obj\n(new)\nendobj\n";
        let xref = reconstruct_xref(data).unwrap();
        match xref.get(1) {
            Some(XRefEntry::InUse { offset, .. }) => assert!(*offset > 20),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_reconstruct_finds_catalog_without_trailer() {
        let data = b"%PDF-1.7\n4 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let xref = reconstruct_xref(data).unwrap();
        let root = xref.trailer().unwrap().get("Root").and_then(Object::as_reference);
        assert_eq!(root.map(|r| r.id), Some(4));
    }

    #[test]
    fn test_reconstruct_ignores_glued_digits() {
        let data = b"%PDF-1.4\n(x11 0 obj) 3 0 obj\n(real)\nendobj\n";
        let xref = reconstruct_xref(data).unwrap();
        assert!(xref.get(3).is_some());
        assert!(xref.get(11).is_none());
    }

    #[test]
    fn test_reconstruct_nothing_found() {
        assert!(reconstruct_xref(b"%PDF-1.4\nnothing here").is_err());
    }
}
