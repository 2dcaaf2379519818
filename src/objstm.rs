//! Object stream parsing (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs several objects into one
//! compressed stream:
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 2 /First 9 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15        % pairs of (object number, offset relative to /First)
//! << /A 1 >> [1 2]  % object bodies
//! endstream
//! ```

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Upper bound on `/N`, far above anything a real writer produces.
const MAX_OBJECTS_PER_STREAM: usize = 100_000;

/// Parse every object in an object stream, keyed by object number.
///
/// Objects whose bodies fail to parse are skipped with a warning; a broken
/// header (missing `/N` or `/First`, short offset table) is an error.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    let count = dict
        .get("N")
        .and_then(Object::as_integer)
        .filter(|&n| n >= 0)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N".to_string()))? as usize;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .filter(|&n| n >= 0)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First".to_string()))? as usize;
    if count > MAX_OBJECTS_PER_STREAM {
        return Err(Error::InvalidPdf(format!("object stream /N {} exceeds limit", count)));
    }

    let data = stream_obj.decode_stream_data()?;
    if first > data.len() {
        return Err(Error::InvalidPdf(format!(
            "object stream /First {} beyond decoded length {}",
            first,
            data.len()
        )));
    }

    let mut header = &data[..first];
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let (rest, id) = header_int(header)?;
        let (rest, offset) = header_int(rest)?;
        offsets.push((id as u32, offset as usize));
        header = rest;
    }

    let mut objects = HashMap::with_capacity(count);
    for (id, offset) in offsets {
        let Some(body) = data.get(first + offset..) else {
            log::warn!("Object {} offset {} lies outside its object stream", id, offset);
            continue;
        };
        match parse_object(body) {
            Ok((_, obj)) => {
                objects.insert(id, obj);
            },
            Err(e) => log::warn!("Failed to parse object {} in object stream: {}", id, e),
        }
    }

    Ok(objects)
}

fn header_int(input: &[u8]) -> Result<(&[u8], i64)> {
    match token(input) {
        Ok((rest, Token::Integer(n))) if n >= 0 => Ok((rest, n)),
        _ => Err(Error::InvalidPdf("malformed object stream offset table".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::FlateDecoder;
    use crate::object::Dict;

    fn objstm(body: &[u8], n: i64, first: i64, compress: bool) -> Object {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("ObjStm"));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        let data = if compress {
            dict.insert("Filter".to_string(), Object::name("FlateDecode"));
            FlateDecoder::encode(body).unwrap()
        } else {
            body.to_vec()
        };
        Object::Stream {
            dict,
            data: bytes::Bytes::from(data),
        }
    }

    #[test]
    fn test_parse_object_stream() {
        let body = b"10 0 11 11 << /A 1 >> [1 2]";
        let objects = parse_object_stream(&objstm(body, 2, 11, true)).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects.get(&10).unwrap().as_dict().is_some());
        assert_eq!(objects.get(&11).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_n_is_error() {
        let mut obj = objstm(b"", 0, 0, false);
        if let Object::Stream { dict, .. } = &mut obj {
            dict.remove("N");
        }
        assert!(parse_object_stream(&obj).is_err());
    }

    #[test]
    fn test_short_offset_table_is_error() {
        assert!(parse_object_stream(&objstm(b"10 0 (x)", 2, 5, false)).is_err());
    }

    #[test]
    fn test_not_a_stream() {
        assert!(parse_object_stream(&Object::Null).is_err());
    }
}
