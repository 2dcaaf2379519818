//! PDF object parser.
//!
//! Recursive descent over lexer tokens. Composite objects (arrays,
//! dictionaries, streams) recurse into [`parse_object`] for their members.
//! Nesting depth is bounded so hostile inputs cannot exhaust the stack.

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, token, Token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Maximum array/dictionary nesting (ISO 32000-1:2008, Annex C).
const MAX_NESTING: usize = 100;

/// Resolves an indirect `/Length` while a stream is being parsed.
pub type LengthResolver<'r> = &'r dyn Fn(ObjectRef) -> Option<usize>;

/// Decode escape sequences in PDF literal strings (ISO 32000-1:2008, 7.3.4.2).
///
/// ```
/// # use pdf_seal::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"a\\(b\\)\\101"), b"a(b)A");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'(' | b')' | b'\\' => out.push(next),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = (next - b'0') as u32;
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    value = value * 8 + (raw[i] - b'0') as u32;
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xFF) as u8);
            },
            // Unknown escape: the backslash is dropped (ISO 32000-1:2008, 7.3.4.2)
            other => out.push(other),
        }
    }

    out
}

/// Decode a hex string body to bytes. Whitespace is ignored and an odd
/// trailing digit is padded with 0.
///
/// ```
/// use pdf_seal::parser::decode_hex;
/// assert_eq!(decode_hex(b"48 65 6C6C 6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"7").unwrap(), vec![0x70]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .copied()
        .filter(|&c| !is_whitespace(c))
        .collect();

    digits
        .chunks(2)
        .map(|chunk| {
            let hi = hex_value(chunk[0])?;
            let lo = match chunk.get(1) {
                Some(&c) => hex_value(c)?,
                None => 0,
            };
            Ok(hi << 4 | lo)
        })
        .collect()
}

fn hex_value(c: u8) -> Result<u8> {
    (c as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("invalid hex digit {:?}", c as char),
        })
}

/// Parse a PDF object from input bytes.
///
/// ```
/// use pdf_seal::parser::parse_object;
/// let (_, obj) = parse_object(b"<< /Type /Catalog /Pages 2 0 R >>").unwrap();
/// assert!(obj.as_dict().is_some());
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, 0, None)
}

fn nom_fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

fn parse_nested<'a>(
    input: &'a [u8],
    depth: usize,
    lengths: Option<LengthResolver<'_>>,
) -> IResult<&'a [u8], Object> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Integer(i) => {
            // "id gen R" is a reference; anything else leaves the integer alone.
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if (0..=u32::MAX as i64).contains(&i) && (0..=u16::MAX as i64).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(rest, nom::error::ErrorKind::HexDigit))),
        },
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::ArrayStart => parse_array(rest, depth, lengths),
        Token::DictStart => {
            let (after_dict, dict) = parse_dictionary(rest, depth, lengths)?;
            match token(after_dict) {
                Ok((after_kw, Token::StreamStart)) => {
                    let (after_stream, data) = parse_stream_data(after_kw, &dict, lengths)?;
                    Ok((
                        after_stream,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::from(data),
                        },
                    ))
                },
                _ => Ok((after_dict, Object::Dictionary(dict))),
            }
        },
        _ => nom_fail(input, nom::error::ErrorKind::Tag),
    }
}

fn parse_array<'a>(
    mut input: &'a [u8],
    depth: usize,
    lengths: Option<LengthResolver<'_>>,
) -> IResult<&'a [u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        if crate::lexer::skip_ws(input).is_empty() {
            log::debug!("Unclosed array at end of input, keeping {} items", items.len());
            return Ok((input, Object::Array(items)));
        }
        let (rest, item) = parse_nested(input, depth + 1, lengths)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dictionary<'a>(
    mut input: &'a [u8],
    depth: usize,
    lengths: Option<LengthResolver<'_>>,
) -> IResult<&'a [u8], Dict> {
    let mut dict = Dict::new();
    loop {
        let (rest, tok) = match token(input) {
            Ok(ok) => ok,
            Err(_) if crate::lexer::skip_ws(input).is_empty() => {
                log::debug!("Unclosed dictionary at end of input, keeping {} keys", dict.len());
                return Ok((input, dict));
            },
            Err(e) => return Err(e),
        };
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_nested(rest, depth + 1, lengths)?;
                // A null value is equivalent to an absent entry (7.3.7).
                if !value.is_null() {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => return nom_fail(input, nom::error::ErrorKind::Tag),
        }
    }
}

/// Read stream bytes after the `stream` keyword (ISO 32000-1:2008, 7.3.8.1).
///
/// A direct `/Length` (or one the resolver can answer) is trusted when it
/// lands on `endstream`; otherwise the data runs up to the next `endstream`.
fn parse_stream_data<'a>(
    input: &'a [u8],
    dict: &Dict,
    lengths: Option<LengthResolver<'_>>,
) -> IResult<&'a [u8], Vec<u8>> {
    let input = if let Some(rest) = input.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\n").or_else(|| input.strip_prefix(b"\r")) {
        rest
    } else {
        input
    };

    let declared = match dict.get("Length") {
        Some(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
        Some(Object::Reference(r)) => lengths.and_then(|resolve| resolve(*r)),
        _ => None,
    };

    if let Some(length) = declared.filter(|&n| n <= input.len()) {
        if let Ok((rest, Token::StreamEnd)) = token(&input[length..]) {
            return Ok((rest, input[..length].to_vec()));
        }
        log::debug!("Stream /Length {} does not end at endstream, scanning", length);
    }

    match find_endstream(input) {
        Some(pos) => {
            let mut data = &input[..pos];
            // Drop the EOL that precedes `endstream`.
            if let Some(stripped) = data.strip_suffix(b"\r\n") {
                data = stripped;
            } else if let Some(stripped) = data.strip_suffix(b"\n").or_else(|| data.strip_suffix(b"\r")) {
                data = stripped;
            }
            let rest = &input[pos + b"endstream".len()..];
            Ok((rest, data.to_vec()))
        },
        None => nom_fail(input, nom::error::ErrorKind::Eof),
    }
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    input.windows(9).position(|w| w == b"endstream")
}

/// An indirect object definition: `id gen obj ... endobj`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    /// Reference of the definition
    pub reference: ObjectRef,
    /// Object body
    pub object: Object,
}

/// Parse an indirect object definition at the start of `input`.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object<'a>(
    input: &'a [u8],
    lengths: Option<LengthResolver<'_>>,
) -> Result<(&'a [u8], IndirectObject)> {
    let structural = |reason: &str| Error::ParseError {
        offset: 0,
        reason: reason.to_string(),
    };

    let (rest, id) = match token(input) {
        Ok((rest, Token::Integer(id))) if id >= 0 => (rest, id as u32),
        _ => return Err(structural("expected object number")),
    };
    let (rest, gen) = match token(rest) {
        Ok((rest, Token::Integer(gen))) if (0..=u16::MAX as i64).contains(&gen) => (rest, gen as u16),
        _ => return Err(structural("expected generation number")),
    };
    let rest = match token(rest) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(structural("expected 'obj' keyword")),
    };

    let (rest, object) = parse_nested(rest, 0, lengths)
        .map_err(|e| structural(&format!("object {} {}: {}", id, gen, e)))?;

    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => {
            log::debug!("Object {} {} has no endobj", id, gen);
            rest
        },
    };

    Ok((
        rest,
        IndirectObject {
            reference: ObjectRef::new(id, gen),
            object,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_object(b"null").unwrap().1, Object::Null);
        assert_eq!(parse_object(b"true").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"-123").unwrap().1, Object::Integer(-123));
        assert_eq!(parse_object(b"/Type").unwrap().1, Object::Name("Type".to_string()));
    }

    #[test]
    fn test_parse_reference_vs_integers() {
        assert_eq!(parse_object(b"10 0 R").unwrap().1, Object::Reference(ObjectRef::new(10, 0)));
        let (_, arr) = parse_object(b"[1 2 3]").unwrap();
        assert_eq!(
            arr,
            Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(3)])
        );
    }

    #[test]
    fn test_parse_dictionary_with_nested() {
        let (_, obj) = parse_object(b"<< /Info 3 0 R /Kids [4 0 R] /Meta << /A (x) >> >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Info").unwrap().as_reference(), Some(ObjectRef::new(3, 0)));
        assert_eq!(dict.get("Kids").unwrap().as_array().unwrap().len(), 1);
        assert!(dict.get("Meta").unwrap().as_dict().is_some());
    }

    #[test]
    fn test_null_values_are_dropped() {
        let (_, obj) = parse_object(b"<< /A null /B 1 >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert!(!dict.contains_key("A"));
        assert!(dict.contains_key("B"));
    }

    #[test]
    fn test_literal_string_escapes() {
        let (_, obj) = parse_object(b"(\\{\\\"signature\\\"\\n)").unwrap();
        assert_eq!(obj.as_string().unwrap(), b"{\"signature\"\n");
    }

    #[test]
    fn test_octal_escape() {
        assert_eq!(decode_literal_string_escapes(b"Section \\247 1"), b"Section \xa7 1");
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(parse_object(b"<48656C6C6F>").unwrap().1, Object::String(b"Hello".to_vec()));
        assert!(decode_hex(b"4G").is_err());
    }

    #[test]
    fn test_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nHelloendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_with_wrong_length_scans() {
        let input = b"<< /Length 99 >>\nstream\nHello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let input = b"1 0 obj\n<< /Length 2 0 R >>\nstream\nab\nendstream\nendobj";
        let resolve = |r: ObjectRef| if r.id == 2 { Some(2) } else { None };
        let (_, ind) = parse_indirect_object(input, Some(&resolve)).unwrap();
        match ind.object {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"ab"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_indirect_object() {
        let (rest, ind) = parse_indirect_object(b"7 1 obj (x) endobj trailing", None).unwrap();
        assert_eq!(ind.reference, ObjectRef::new(7, 1));
        assert_eq!(ind.object, Object::String(b"x".to_vec()));
        assert_eq!(rest, b" trailing");
    }

    #[test]
    fn test_parse_indirect_object_rejects_garbage() {
        assert!(parse_indirect_object(b"hello world", None).is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "[".repeat(MAX_NESTING + 5);
        assert!(parse_object(deep.as_bytes()).is_err());
    }
}
