//! PDF file assembly.
//!
//! Two output layouts are supported:
//!
//! - **Incremental update**: the original bytes are kept untouched and the
//!   changed objects, a new xref section and a trailer pointing back with
//!   `/Prev` are appended (ISO 32000-1:2008, Section 7.5.6).
//! - **Full rewrite**: header, every object, one classic xref table and a
//!   fresh trailer.

use super::object_serializer::ObjectSerializer;
use crate::config::SaveMode;
use crate::document::HostDocument;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};

/// Trailer keys that only make sense for the section they were read from.
const SECTION_KEYS: [&str; 9] = [
    "Prev",
    "XRefStm",
    "Type",
    "W",
    "Index",
    "Filter",
    "DecodeParms",
    "Length",
    "DL",
];

/// Widest run of unused object numbers written out as free entries.
const MAX_FREE_GAP: u32 = 64;

/// Save `doc` with the requested layout.
///
/// Incremental saves fall back to a full rewrite when the document's
/// cross-reference chain had to be reconstructed.
pub fn save(doc: &HostDocument, mode: SaveMode) -> Result<Vec<u8>> {
    match (mode, doc.startxref()) {
        (SaveMode::Incremental, Some(_)) => write_incremental(doc),
        (SaveMode::Incremental, None) => {
            log::info!("Source xref was reconstructed, writing a full rewrite instead of an update");
            write_full(doc)
        },
        (SaveMode::FullRewrite, _) => write_full(doc),
    }
}

/// Append the modified objects of `doc` as an incremental update.
///
/// # Errors
///
/// Returns `Error::InvalidXref` if the document has no usable `startxref`.
pub fn write_incremental(doc: &HostDocument) -> Result<Vec<u8>> {
    let prev = doc.startxref().ok_or(Error::InvalidXref)?;
    let serializer = ObjectSerializer::compact();

    let mut out = doc.source().to_vec();
    if !out.ends_with(b"\n") && !out.ends_with(b"\r") {
        out.push(b'\n');
    }

    let mut entries: Vec<(ObjectRef, usize)> = Vec::new();
    for (reference, obj) in doc.modified_objects() {
        entries.push((reference, out.len()));
        out.extend_from_slice(&serializer.serialize_indirect(reference, obj));
    }

    let mut trailer = section_trailer(doc.trailer());
    trailer.insert("Size".to_string(), Object::Integer(doc.next_object_id() as i64));
    trailer.insert("Prev".to_string(), Object::Integer(prev as i64));

    let xref_offset = out.len();
    write_xref_table(&mut out, &entries, false);
    write_trailer(&mut out, &serializer, &trailer, xref_offset);

    log::debug!(
        "Incremental update: {} objects appended after {} original bytes",
        entries.len(),
        doc.source().len()
    );
    Ok(out)
}

/// Write every object of `doc` into a fresh file.
///
/// Cross-reference streams and object streams are dropped; their contents
/// were already unpacked into ordinary objects.
pub fn write_full(doc: &HostDocument) -> Result<Vec<u8>> {
    let objects = doc.objects().filter(|(_, obj)| !is_container_stream(obj));
    let (major, minor) = doc.version();
    let mut trailer = section_trailer(doc.trailer());
    trailer.insert("Size".to_string(), Object::Integer(doc.next_object_id() as i64));
    Ok(assemble(major, minor, objects, trailer))
}

/// Assemble a complete file from objects and a trailer.
///
/// `trailer` must already carry `/Size`.
pub fn assemble<'a>(
    major: u8,
    minor: u8,
    objects: impl Iterator<Item = (ObjectRef, &'a Object)>,
    trailer: Dict,
) -> Vec<u8> {
    let serializer = ObjectSerializer::compact();
    let mut out = format!("%PDF-{}.{}\n", major, minor).into_bytes();
    // Binary marker so transfer tools treat the file as binary
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut entries: Vec<(ObjectRef, usize)> = Vec::new();
    for (reference, obj) in objects {
        entries.push((reference, out.len()));
        out.extend_from_slice(&serializer.serialize_indirect(reference, obj));
    }

    let xref_offset = out.len();
    write_xref_table(&mut out, &entries, true);
    write_trailer(&mut out, &serializer, &trailer, xref_offset);
    out
}

fn is_container_stream(obj: &Object) -> bool {
    matches!(
        obj,
        Object::Stream { dict, .. }
            if matches!(dict.get("Type").and_then(Object::as_name), Some("XRef" | "ObjStm"))
    )
}

fn section_trailer(trailer: &Dict) -> Dict {
    let mut out = trailer.clone();
    for key in SECTION_KEYS {
        out.remove(key);
    }
    out
}

/// Write a classic xref table.
///
/// Entries are grouped into contiguous subsections. With `complete`, the
/// table starts with the free head at object 0 and short runs of missing
/// numbers are written as free entries; wider gaps start a new subsection.
fn write_xref_table(out: &mut Vec<u8>, entries: &[(ObjectRef, usize)], complete: bool) {
    let mut sorted: Vec<(u32, u16, Option<usize>)> = entries
        .iter()
        .map(|(r, offset)| (r.id, r.gen, Some(*offset)))
        .collect();
    sorted.sort_by_key(|(id, _, _)| *id);

    if complete {
        let mut filled = Vec::with_capacity(sorted.len() + 1);
        filled.push((0, 65535, None));
        let mut next = 1u32;
        for entry in sorted.into_iter().filter(|(id, _, _)| *id != 0) {
            let id = entry.0;
            if id > next && id - next <= MAX_FREE_GAP {
                filled.extend((next..id).map(|gap| (gap, 0, None)));
            }
            next = id.saturating_add(1);
            filled.push(entry);
        }
        sorted = filled;
    }

    out.extend_from_slice(b"xref\n");
    let mut i = 0;
    while i < sorted.len() {
        let start = sorted[i].0;
        let mut end = i + 1;
        while end < sorted.len() && sorted[end].0 == sorted[end - 1].0 + 1 {
            end += 1;
        }
        out.extend_from_slice(format!("{} {}\n", start, end - i).as_bytes());
        for (_, gen, offset) in &sorted[i..end] {
            let line = match offset {
                Some(offset) => format!("{:010} {:05} n \n", offset, gen),
                None => format!("{:010} {:05} f \n", 0, gen),
            };
            out.extend_from_slice(line.as_bytes());
        }
        i = end;
    }
}

fn write_trailer(out: &mut Vec<u8>, serializer: &ObjectSerializer, trailer: &Dict, xref_offset: usize) {
    out.extend_from_slice(b"trailer\n");
    out.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer.clone())));
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
}
