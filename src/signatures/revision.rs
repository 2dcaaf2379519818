//! Locating the signing revision.
//!
//! An envelope is written as one incremental update appended to the pristine
//! bytes, so a signed file reads as:
//!
//! ```text
//! [ pristine bytes ........ %%EOF ] [ objs  xref  trailer  %%EOF\n ]
//!   digest == document_hash            signing revision
//! ```
//!
//! The pristine prefix is everything up to the second-to-last `%%EOF` marker
//! and the end-of-line bytes that follow it. The last revision counts as the
//! signing revision only if it ends exactly as the writer ends it and changes
//! nothing but the envelope carriers: the information dictionary, the XMP
//! stream, envelope dictionaries and the catalog keys pointing at them.

use super::types::Digest;
use crate::document::HostDocument;
use crate::envelope::CATALOG_KEY;
use crate::object::{Dict, Object, ObjectRef};
use sha2::{Digest as _, Sha256};

const EOF_MARKER: &[u8] = b"%%EOF";

/// Exact bytes the writer closes a revision with.
const REVISION_END: &[u8] = b"%%EOF\n";

/// Longest run of trailing whitespace tried after the pristine `%%EOF`.
const MAX_TRAILING_WHITESPACE: usize = 16;

/// Length of the pristine prefix of `bytes`, if they are that prefix hashing
/// to `expected` followed by one envelope-only revision.
///
/// `doc` is `bytes` already parsed.
pub fn pristine_prefix_len(bytes: &[u8], doc: &HostDocument, expected: &Digest) -> Option<usize> {
    if !bytes.ends_with(REVISION_END) {
        return None;
    }
    let last = bytes.len() - REVISION_END.len();
    let previous = rfind(&bytes[..last], EOF_MARKER)?;
    let len = matching_prefix_len(bytes, previous + EOF_MARKER.len(), last, expected)?;

    let pristine = match HostDocument::from_bytes(&bytes[..len]) {
        Ok(pristine) => pristine,
        Err(e) => {
            log::debug!("Pristine prefix does not parse: {}", e);
            return None;
        },
    };
    if envelope_only(&pristine, doc) {
        Some(len)
    } else {
        log::debug!("Signing revision changes more than the envelope carriers");
        None
    }
}

/// Try each prefix ending in the whitespace run after the marker at `start`.
fn matching_prefix_len(bytes: &[u8], start: usize, limit: usize, expected: &Digest) -> Option<usize> {
    let run = bytes[start..limit]
        .iter()
        .take(MAX_TRAILING_WHITESPACE)
        .take_while(|b| matches!(b, b'\r' | b'\n' | b' ' | b'\t' | b'\0'))
        .count();

    let mut hasher = Sha256::new();
    hasher.update(&bytes[..start]);
    for extra in 0..=run {
        if extra > 0 {
            hasher.update(&bytes[start + extra - 1..start + extra]);
        }
        let digest = Digest::from_bytes(hasher.clone().finalize().into());
        if digest == *expected {
            return Some(start + extra);
        }
    }
    None
}

/// Roles an object may play in a signing revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Carrier {
    /// Trailer `/Info` dictionary
    Info,
    /// Catalog `/Metadata` XMP stream
    Metadata,
    /// Catalog envelope dictionary
    Envelope,
}

impl Carrier {
    const ALL: [Carrier; 3] = [Carrier::Info, Carrier::Metadata, Carrier::Envelope];

    /// The value `doc` stores in this carrier's slot.
    fn slot(self, doc: &HostDocument) -> Option<&Object> {
        match self {
            Carrier::Info => doc.trailer().get("Info"),
            Carrier::Metadata => doc.catalog().ok()?.get("Metadata"),
            Carrier::Envelope => doc.catalog().ok()?.get(CATALOG_KEY),
        }
    }

    fn fits(self, obj: &Object) -> bool {
        match self {
            Carrier::Info => matches!(obj, Object::Dictionary(_)),
            Carrier::Metadata => matches!(
                obj,
                Object::Stream { dict, .. } if dict.get("Type").and_then(Object::as_name) == Some("Metadata")
            ),
            Carrier::Envelope => is_envelope_dict(obj),
        }
    }
}

/// Whether every difference between `before` and `after` is an envelope carrier.
///
/// A carrier slot may only point at a fresh object number or at the object
/// the pristine document already used for that role, and a rewritten carrier
/// must have the shape of its role.
fn envelope_only(before: &HostDocument, after: &HostDocument) -> bool {
    let (Ok(root), Ok(root_before)) = (after.catalog_ref(), before.catalog_ref()) else {
        return false;
    };
    if root != root_before {
        return false;
    }
    if before.objects().any(|(reference, _)| after.get(reference).is_none()) {
        return false;
    }

    let mut carriers: Vec<(ObjectRef, Carrier)> = Vec::new();
    for carrier in Carrier::ALL {
        let Some(reference) = carrier.slot(after).and_then(Object::as_reference) else {
            continue;
        };
        let pristine = carrier.slot(before).and_then(Object::as_reference);
        let fresh = before.get(reference).is_none();
        if Some(reference) != pristine && !fresh {
            log::debug!("{:?} redirected to existing object {}", carrier, reference);
            return false;
        }
        if reference == root {
            return false;
        }
        carriers.push((reference, carrier));
    }

    after.objects().all(|(reference, obj)| {
        if before.get(reference) == Some(obj) {
            return true;
        }
        if reference == root {
            return catalog_unchanged(before.get(reference), obj);
        }
        carriers
            .iter()
            .any(|&(carrier_ref, carrier)| carrier_ref == reference && carrier.fits(obj))
    })
}

fn is_envelope_dict(obj: &Object) -> bool {
    obj.as_dict()
        .and_then(|d| d.get("Type"))
        .and_then(Object::as_name)
        == Some(CATALOG_KEY)
}

/// Catalogs equal once the envelope-carrying keys are removed.
fn catalog_unchanged(before: Option<&Object>, after: &Object) -> bool {
    let strip = |obj: &Object| -> Option<Dict> {
        let mut dict = obj.as_dict()?.clone();
        dict.remove("Metadata");
        dict.remove(CATALOG_KEY);
        Some(dict)
    };
    match (before.and_then(strip), strip(after)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SealOptions;
    use crate::signatures::{CanonicalHasher, DocumentSigner, KeyPair, SignRequest};
    use crate::writer::{write_incremental, TextDocumentBuilder};

    fn sign(original: &[u8]) -> Vec<u8> {
        let keys = KeyPair::from_private(&[0x11; 32]).unwrap();
        DocumentSigner::new(SealOptions::default())
            .sign(original, &keys, &SignRequest::new("Ada"))
            .unwrap()
            .bytes
    }

    fn prefix_of(bytes: &[u8], original: &[u8]) -> Option<usize> {
        let doc = HostDocument::from_bytes(bytes).unwrap();
        pristine_prefix_len(bytes, &doc, &CanonicalHasher::digest(original))
    }

    #[test]
    fn test_signed_output_splits_at_original() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let signed = sign(&original);
        assert_eq!(prefix_of(&signed, &original), Some(original.len()));
    }

    #[test]
    fn test_original_without_final_newline() {
        let mut original = TextDocumentBuilder::new("Hello World").build();
        while original.ends_with(b"\n") {
            original.pop();
        }
        let signed = sign(&original);
        assert_eq!(prefix_of(&signed, &original), Some(original.len()));
    }

    #[test]
    fn test_trailing_bytes_break_the_split() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let mut signed = sign(&original);
        signed.push(b' ');
        assert_eq!(prefix_of(&signed, &original), None);
    }

    #[test]
    fn test_second_revision_breaks_the_split() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let signed = sign(&original);
        let mut doc = HostDocument::from_bytes(signed.as_slice()).unwrap();
        let info = doc.ensure_info();
        doc.dict_mut(info).unwrap().insert("Title".to_string(), Object::text("Later"));
        let updated = write_incremental(&doc).unwrap();
        assert_eq!(prefix_of(&updated, &original), None);
    }

    #[test]
    fn test_info_only_revision_is_accepted() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let mut doc = HostDocument::from_bytes(original.as_slice()).unwrap();
        let info = doc.ensure_info();
        doc.dict_mut(info).unwrap().insert("Title".to_string(), Object::text("Signed"));
        let updated = write_incremental(&doc).unwrap();
        assert_eq!(prefix_of(&updated, &original), Some(original.len()));
    }

    #[test]
    fn test_page_change_is_rejected() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let mut doc = HostDocument::from_bytes(original.as_slice()).unwrap();
        doc.dict_mut(ObjectRef::new(3, 0))
            .unwrap()
            .insert("Rotate".to_string(), Object::Integer(90));
        let updated = write_incremental(&doc).unwrap();
        assert_eq!(prefix_of(&updated, &original), None);
    }

    #[test]
    fn test_metadata_redirected_to_contents_is_rejected() {
        let original = TextDocumentBuilder::new("Pay Alice 10 EUR").build();
        let mut doc = HostDocument::from_bytes(original.as_slice()).unwrap();
        let contents = ObjectRef::new(4, 0);
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("Metadata"));
        doc.set_object(
            contents,
            Object::Stream {
                dict,
                data: bytes::Bytes::from_static(b"BT (Pay Mallory) Tj ET"),
            },
        );
        let catalog = doc.catalog_ref().unwrap();
        doc.dict_mut(catalog)
            .unwrap()
            .insert("Metadata".to_string(), Object::Reference(contents));
        let updated = write_incremental(&doc).unwrap();
        assert_eq!(prefix_of(&updated, &original), None);
    }

    #[test]
    fn test_info_redirected_to_page_is_rejected() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let prev = crate::xref::find_xref_offset(&original).unwrap();
        let mut bytes = original.clone();
        let page_offset = bytes.len();
        bytes.extend_from_slice(
            b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Rotate 90 >>\nendobj\n",
        );
        let xref_offset = bytes.len();
        bytes.extend_from_slice(
            format!(
                "xref\n3 1\n{:010} 00000 n \ntrailer\n<< /Size 7 /Root 1 0 R /Info 3 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
                page_offset, prev, xref_offset
            )
            .as_bytes(),
        );
        assert_eq!(prefix_of(&bytes, &original), None);
    }

    #[test]
    fn test_envelope_dict_over_page_is_rejected() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let mut doc = HostDocument::from_bytes(original.as_slice()).unwrap();
        let mut envelope = Dict::new();
        envelope.insert("Type".to_string(), Object::name(CATALOG_KEY));
        envelope.insert("Data".to_string(), Object::text("{}"));
        doc.set_object(ObjectRef::new(3, 0), Object::Dictionary(envelope));
        let updated = write_incremental(&doc).unwrap();
        assert_eq!(prefix_of(&updated, &original), None);
    }

    #[test]
    fn test_rewriting_existing_carriers_is_accepted() {
        let original = TextDocumentBuilder::new("Hello World").build();
        let signed = sign(&original);
        let resigned = sign(&signed);
        assert_eq!(prefix_of(&resigned, &signed), Some(signed.len()));
    }
}
