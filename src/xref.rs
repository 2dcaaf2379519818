//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets in the file. Both
//! traditional tables (PDF 1.0-1.4) and cross-reference streams (PDF 1.5+)
//! are supported, including `/Prev` chains left by incremental updates and
//! hybrid files that carry an `/XRefStm` next to a classic table.

use crate::error::{Error, Result};
use crate::lexer::{skip_ws, token, Token};
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::{HashMap, HashSet};

/// Longest `/Prev` chain followed before giving up.
const MAX_PREV_CHAIN: usize = 100;

/// Largest subsection count accepted from a classic table.
const MAX_SUBSECTION: u32 = 1_000_000;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object slot
    Free,
    /// Object stored directly at a byte offset
    InUse {
        /// Byte offset of `id gen obj`
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream (PDF 1.5+)
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream: u32,
        /// Index of the object within that stream
        index: u32,
    },
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    /// Trailer dictionary (for xref streams, this is the stream dictionary)
    trailer: Option<Dict>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&Dict> {
        self.trailer.as_ref()
    }

    /// Take ownership of the trailer dictionary.
    pub fn take_trailer(&mut self) -> Option<Dict> {
        self.trailer.take()
    }

    /// Add an entry, replacing any previous one.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(&id, &entry)| (id, entry))
    }

    /// Merge entries from an older section.
    ///
    /// Entries in `self` win; `self`'s trailer keys win over `older`'s.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (obj_num, entry) in older.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }
        match (&mut self.trailer, older.trailer) {
            (Some(current), Some(prev)) => {
                for (key, value) in prev {
                    current.entry(key).or_insert(value);
                }
            },
            (None, prev) => self.trailer = prev,
            _ => {},
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest object number in the table.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }
}

/// Find the byte offset named by the last `startxref` in the file.
///
/// # Errors
///
/// Returns `Error::InvalidXref` if the keyword is missing or the offset is
/// not a number inside the file.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let pos = tail
        .windows(9)
        .rposition(|w| w == b"startxref")
        .ok_or(Error::InvalidXref)?;

    match token(&tail[pos + 9..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 && (offset as usize) < data.len() => Ok(offset as usize),
        _ => Err(Error::InvalidXref),
    }
}

/// Parse the cross-reference section at `offset` and every section reachable
/// through `/Prev` (and `/XRefStm`) from it.
pub fn parse_xref_chain(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    parse_xref_recursive(data, offset, &mut visited)
}

fn parse_xref_recursive(data: &[u8], offset: usize, visited: &mut HashSet<usize>) -> Result<CrossRefTable> {
    if visited.len() >= MAX_PREV_CHAIN {
        return Err(Error::InvalidPdf(format!("xref /Prev chain longer than {}", MAX_PREV_CHAIN)));
    }
    if !visited.insert(offset) {
        return Err(Error::InvalidPdf(format!("xref /Prev chain loops back to offset {}", offset)));
    }

    let mut xref = parse_xref_section(data, offset)?;
    log::debug!("Parsed xref section at offset {} with {} entries", offset, xref.len());

    let (prev, xref_stm) = match xref.trailer() {
        Some(trailer) => (
            trailer.get("Prev").and_then(Object::as_integer),
            trailer.get("XRefStm").and_then(Object::as_integer),
        ),
        None => (None, None),
    };

    // Hybrid files: the stream holds entries the classic table hides from old readers.
    if let Some(stm_offset) = xref_stm.filter(|&o| o >= 0 && (o as usize) < data.len()) {
        match parse_xref_stream(data, stm_offset as usize) {
            Ok(mut stream_xref) => {
                stream_xref.trailer = None;
                xref.merge_from(stream_xref);
            },
            Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
        }
    }

    if let Some(prev_offset) = prev {
        if prev_offset < 0 || prev_offset as usize >= data.len() {
            return Err(Error::InvalidPdf(format!("/Prev offset {} outside file", prev_offset)));
        }
        let older = parse_xref_recursive(data, prev_offset as usize, visited)?;
        xref.merge_from(older);
    }

    Ok(xref)
}

/// Parse one cross-reference section, detecting its flavour.
pub fn parse_xref_section(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let at = data.get(offset..).ok_or(Error::InvalidXref)?;
    let at = skip_ws(at);
    if at.starts_with(b"xref") {
        parse_traditional_xref(data, offset)
    } else if at.first().is_some_and(u8::is_ascii_digit) {
        parse_xref_stream(data, offset)
    } else {
        Err(Error::InvalidXref)
    }
}

/// Parse a traditional cross-reference table.
///
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// ...
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
///
/// Malformed entry lines are recorded as free so later numbering stays aligned.
pub fn parse_traditional_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let input = skip_ws(data.get(offset..).ok_or(Error::InvalidXref)?);
    let mut rest = input.strip_prefix(b"xref").ok_or(Error::InvalidXref)?;
    let mut xref = CrossRefTable::new();

    loop {
        rest = skip_ws(rest);
        if let Some(after) = rest.strip_prefix(b"trailer") {
            let (_, trailer) = parse_object(after).map_err(|e| Error::ParseError {
                offset,
                reason: format!("trailer dictionary: {}", e),
            })?;
            match trailer {
                Object::Dictionary(dict) => xref.set_trailer(dict),
                other => {
                    return Err(Error::InvalidObjectType {
                        expected: "Dictionary".to_string(),
                        found: other.type_name().to_string(),
                    })
                },
            }
            return Ok(xref);
        }

        let (after_start, start) = read_u32(rest).ok_or(Error::InvalidXref)?;
        let (after_count, count) = read_u32(after_start).ok_or(Error::InvalidXref)?;
        if count > MAX_SUBSECTION {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }
        rest = after_count;

        for i in 0..count {
            let line_start = skip_ws(rest);
            if line_start.starts_with(b"trailer") {
                log::warn!("Expected {} xref entries but found {} before trailer", count, i);
                rest = line_start;
                break;
            }
            let line_end = line_start
                .iter()
                .position(|&c| c == b'\n' || c == b'\r')
                .unwrap_or(line_start.len());
            let line = String::from_utf8_lossy(&line_start[..line_end]);
            rest = &line_start[line_end..];

            let parts: Vec<&str> = line.split_whitespace().collect();
            let entry = match parts.as_slice() {
                [off, gen, flag, ..] => match (off.parse::<usize>(), gen.parse::<u16>(), flag.chars().next()) {
                    (Ok(off), Ok(gen), Some('n' | 'N')) => XRefEntry::InUse { offset: off, gen },
                    (Ok(_), Ok(_), Some('f' | 'F')) => XRefEntry::Free,
                    _ => {
                        log::warn!("Malformed xref entry {:?}, treating as free", line);
                        XRefEntry::Free
                    },
                },
                _ => {
                    log::warn!("Malformed xref entry {:?}, treating as free", line);
                    XRefEntry::Free
                },
            };
            xref.add_entry(start.saturating_add(i), entry);
        }
    }
}

fn read_u32(input: &[u8]) -> Option<(&[u8], u32)> {
    match token(input) {
        Ok((rest, Token::Integer(n))) if (0..=u32::MAX as i64).contains(&n) => Some((rest, n as u32)),
        _ => None,
    }
}

/// Parse a cross-reference stream (`/Type /XRef`).
///
/// Each entry is `/W [w1 w2 w3]` bytes wide: type (0 free, 1 offset,
/// 2 compressed), then two type-dependent fields. `/Index` lists the
/// subsection ranges and defaults to `[0 Size]`.
pub fn parse_xref_stream(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let input = data.get(offset..).ok_or(Error::InvalidXref)?;
    let (_, indirect) = parse_indirect_object(input, None)?;
    let stream = indirect.object;

    let dict = match &stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    if let Some(kind) = dict.get("Type").and_then(Object::as_name) {
        if kind != "XRef" {
            return Err(Error::InvalidPdf(format!("expected /Type /XRef, got /Type /{}", kind)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| w.iter().filter_map(Object::as_integer).map(|n| n.max(0) as usize).collect())
        .unwrap_or_default();
    let &[w1, w2, w3] = widths.as_slice() else {
        return Err(Error::InvalidPdf("invalid /W array in xref stream".to_string()));
    };
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 || w1 > 8 || w2 > 8 || w3 > 8 {
        return Err(Error::InvalidPdf("invalid /W widths in xref stream".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_integer()? as u32, pair[1].as_integer()? as u32)))
            .collect(),
        None => vec![(0, size.max(0) as u32)],
    };

    let decoded = stream.decode_stream_data()?;
    let mut rows = decoded.chunks_exact(entry_size);
    let mut xref = CrossRefTable::new();

    for (start, count) in ranges {
        for i in 0..count {
            let Some(row) = rows.next() else {
                log::warn!("Xref stream at {} is shorter than its /Index claims", offset);
                break;
            };
            // A zero-width type field means type 1.
            let kind = if w1 == 0 { 1 } else { read_int(&row[..w1]) };
            let field2 = read_int(&row[w1..w1 + w2]);
            let field3 = read_int(&row[w1 + w2..]);

            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: field2 as usize,
                    gen: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are treated as null references (7.5.8.3).
                _ => XRefEntry::Free,
            };
            xref.add_entry(start.saturating_add(i), entry);
        }
    }

    if let Object::Stream { dict, .. } = stream {
        xref.set_trailer(dict);
    }
    Ok(xref)
}

/// Read a big-endian unsigned integer of up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::FlateDecoder;

    const CLASSIC: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n\
trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n45\n%%EOF\n";

    #[test]
    fn test_find_xref_offset() {
        assert_eq!(find_xref_offset(CLASSIC).unwrap(), 45);
        assert!(matches!(find_xref_offset(b"%PDF-1.4 no xref"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_find_xref_offset_out_of_range() {
        assert!(find_xref_offset(b"%PDF-1.4\nstartxref\n99999\n%%EOF").is_err());
    }

    #[test]
    fn test_parse_traditional_xref() {
        let xref = parse_xref_chain(CLASSIC, 45).unwrap();
        assert_eq!(xref.len(), 2);
        assert_eq!(xref.get(0), Some(&XRefEntry::Free));
        assert_eq!(xref.get(1), Some(&XRefEntry::InUse { offset: 9, gen: 0 }));
        let trailer = xref.trailer().unwrap();
        assert_eq!(trailer.get("Size").and_then(Object::as_integer), Some(2));
    }

    #[test]
    fn test_malformed_entry_becomes_free() {
        let data = b"xref\n0 2\n0000000000 65535 f \ngarbage\ntrailer\n<< /Size 2 >>";
        let xref = parse_traditional_xref(data, 0).unwrap();
        assert_eq!(xref.get(1), Some(&XRefEntry::Free));
    }

    #[test]
    fn test_prev_chain_newer_wins() {
        let mut data = CLASSIC.to_vec();
        let second = data.len();
        data.extend_from_slice(
            b"xref\n1 1\n0000000100 00000 n \ntrailer\n<< /Size 2 /Prev 45 /Info 9 0 R >>\n",
        );
        let xref = parse_xref_chain(&data, second).unwrap();
        assert_eq!(xref.get(1), Some(&XRefEntry::InUse { offset: 100, gen: 0 }));
        assert_eq!(xref.get(0), Some(&XRefEntry::Free));
        let trailer = xref.trailer().unwrap();
        assert!(trailer.contains_key("Info"));
        assert!(trailer.contains_key("Root"));
    }

    #[test]
    fn test_prev_loop_detected() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>";
        assert!(parse_xref_chain(data, 0).is_err());
    }

    #[test]
    fn test_parse_xref_stream() {
        // Rows: type(1) offset(2) gen(1); PNG Up predictor with 4 columns.
        let rows: [[u8; 4]; 3] = [[0, 0, 0, 255], [1, 0, 15, 0], [2, 0, 5, 1]];
        let mut raw = Vec::new();
        let mut prev = [0u8; 4];
        for row in rows {
            raw.push(2);
            for i in 0..4 {
                raw.push(row[i].wrapping_sub(prev[i]));
            }
            prev = row;
        }
        let compressed = FlateDecoder::encode(&raw).unwrap();

        let mut data = format!(
            "7 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Filter /FlateDecode \
             /DecodeParms << /Predictor 12 /Columns 4 >> /Length {} >>\nstream\n",
            compressed.len()
        )
        .into_bytes();
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let xref = parse_xref_section(&data, 0).unwrap();
        assert_eq!(xref.get(0), Some(&XRefEntry::Free));
        assert_eq!(xref.get(1), Some(&XRefEntry::InUse { offset: 15, gen: 0 }));
        assert_eq!(xref.get(2), Some(&XRefEntry::Compressed { stream: 5, index: 1 }));
        assert!(xref.trailer().unwrap().contains_key("Root"));
    }

    #[test]
    fn test_read_int() {
        assert_eq!(read_int(&[0x01, 0x00]), 256);
        assert_eq!(read_int(&[]), 0);
    }
}
