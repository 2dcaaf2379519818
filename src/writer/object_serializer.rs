//! PDF object serialization.
//!
//! Serializes objects to their byte representation (ISO 32000-1:2008,
//! Section 7.3). Dictionary keys are written in sorted order so the same
//! object always produces the same bytes.

use crate::object::{Dict, Object, ObjectRef};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn serialize_indirect(&self, reference: ObjectRef, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", reference.id, reference.gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    fn write_object(&self, w: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => w.extend_from_slice(b"null"),
            Object::Boolean(b) => w.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => w.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(w, *r),
            Object::String(s) => write_string(w, s),
            Object::Name(n) => write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => self.write_stream(w, dict, data),
            Object::Reference(r) => w.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes()),
        }
    }

    fn write_array(&self, w: &mut Vec<u8>, arr: &[Object]) {
        w.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                w.push(b' ');
            }
            self.write_object(w, obj);
        }
        w.push(b']');
    }

    fn write_dictionary(&self, w: &mut Vec<u8>, dict: &Dict) {
        w.extend_from_slice(b"<<");

        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        for key in keys {
            if let Some(value) = dict.get(key) {
                w.extend_from_slice(if self.compact { b" " } else { b"\n  " });
                write_name(w, key);
                w.push(b' ');
                self.write_object(w, value);
            }
        }

        if !dict.is_empty() {
            w.extend_from_slice(if self.compact { b" " } else { b"\n" });
        }
        w.extend_from_slice(b">>");
    }

    /// `/Length` always reflects the data actually written.
    fn write_stream(&self, w: &mut Vec<u8>, dict: &Dict, data: &[u8]) {
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(w, &dict);
        w.extend_from_slice(b"\nstream\n");
        w.extend_from_slice(data);
        w.extend_from_slice(b"\nendstream");
    }
}

/// Write a real number with at most five decimal places.
fn write_real(w: &mut Vec<u8>, value: f64) {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        w.extend_from_slice((value as i64).to_string().as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        w.extend_from_slice(trimmed.as_bytes());
    }
}

/// Literal syntax `(...)` for printable ASCII, hex `<...>` otherwise.
fn write_string(w: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if printable {
        w.push(b'(');
        for &byte in data {
            match byte {
                b'(' => w.extend_from_slice(b"\\("),
                b')' => w.extend_from_slice(b"\\)"),
                b'\\' => w.extend_from_slice(b"\\\\"),
                b'\n' => w.extend_from_slice(b"\\n"),
                b'\r' => w.extend_from_slice(b"\\r"),
                b'\t' => w.extend_from_slice(b"\\t"),
                _ => w.push(byte),
            }
        }
        w.push(b')');
    } else {
        w.push(b'<');
        w.extend_from_slice(hex::encode_upper(data).as_bytes());
        w.push(b'>');
    }
}

/// Names start with `/`; delimiters, whitespace and non-ASCII bytes use `#xx`.
fn write_name(w: &mut Vec<u8>, name: &str) {
    w.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'
            | b'"'
            | b'$'..=b'&'
            | b'\''
            | b'*'..=b'.'
            | b'0'..=b'9'
            | b';'
            | b'='
            | b'?'
            | b'@'
            | b'A'..=b'Z'
            | b'^'..=b'z'
            | b'|'
            | b'~' => w.push(byte),
            _ => w.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_object;

    #[test]
    fn test_serialize_primitives() {
        let s = ObjectSerializer::compact();
        assert_eq!(s.serialize(&Object::Null), b"null");
        assert_eq!(s.serialize(&Object::Boolean(false)), b"false");
        assert_eq!(s.serialize(&Object::Integer(-7)), b"-7");
        assert_eq!(s.serialize(&Object::Real(2.5)), b"2.5");
        assert_eq!(s.serialize(&Object::Real(3.0)), b"3");
    }

    #[test]
    fn test_serialize_string_escapes() {
        let s = ObjectSerializer::compact();
        assert_eq!(s.serialize(&Object::String(b"a(b)\\c".to_vec())), b"(a\\(b\\)\\\\c)");
        assert_eq!(s.serialize(&Object::String(vec![0xFE, 0xFF, 0x00, 0x41])), b"<FEFF0041>");
    }

    #[test]
    fn test_serialize_name_escapes() {
        let s = ObjectSerializer::compact();
        assert_eq!(s.serialize(&Object::name("A B")), b"/A#20B");
        assert_eq!(s.serialize(&Object::name("PdfSeal_Envelope")), b"/PdfSeal_Envelope");
        assert_eq!(s.serialize(&Object::name("a/b")), b"/a#2Fb");
    }

    #[test]
    fn test_dictionary_keys_sorted() {
        let mut dict = Dict::new();
        dict.insert("Zeta".to_string(), Object::Integer(1));
        dict.insert("Alpha".to_string(), Object::Integer(2));
        let out = ObjectSerializer::compact().serialize_to_string(&Object::Dictionary(dict));
        assert_eq!(out, "<< /Alpha 2 /Zeta 1 >>");
    }

    #[test]
    fn test_stream_length_rewritten() {
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), Object::Integer(999));
        let obj = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"abc"),
        };
        let out = ObjectSerializer::new().serialize_to_string(&obj);
        assert!(out.contains("/Length 3"));
        assert!(out.contains("stream\nabc\nendstream"));
    }

    #[test]
    fn test_serialized_json_parses_back() {
        let json = br#"{"signature":"ab","note":"x (y) \\ z"}"#.to_vec();
        let bytes = ObjectSerializer::compact().serialize(&Object::String(json.clone()));
        let (_, parsed) = parse_object(&bytes).unwrap();
        assert_eq!(parsed, Object::String(json));
    }

    #[test]
    fn test_serialize_indirect() {
        let out = ObjectSerializer::compact().serialize_indirect(ObjectRef::new(4, 0), &Object::Integer(1));
        assert_eq!(out, b"4 0 obj\n1\nendobj\n");
    }
}
