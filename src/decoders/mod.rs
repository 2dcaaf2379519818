//! Stream decoders for the filters found around document metadata.
//!
//! Signing only has to look inside cross-reference streams, object streams and
//! XMP packets. In practice those use FlateDecode, optionally with a PNG
//! predictor, so that is the only compression handled here.

use crate::error::{Error, Result};
use crate::object::Object;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::decode_predictor;

/// Decompression bomb limits.
const MAX_DECOMPRESSION_RATIO: usize = 100;
const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode parameters for predictor-encoded streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (bytes per row for xref streams)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read predictor parameters from a `/DecodeParms` entry.
    ///
    /// For an array of parameter dictionaries, the first dictionary wins.
    pub fn from_object(params: Option<&Object>) -> Option<Self> {
        let dict = match params? {
            Object::Dictionary(d) => d,
            Object::Array(arr) => arr.iter().find_map(|o| o.as_dict())?,
            _ => return None,
        };
        let get = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|o| o.as_integer())
                .unwrap_or(default)
        };
        Some(Self {
            predictor: get("Predictor", 1),
            columns: get("Columns", 1).max(1) as usize,
            colors: get("Colors", 1).max(1) as usize,
            bits_per_component: get("BitsPerComponent", 8).max(1) as usize,
        })
    }

    /// Bytes of sample data per row (without the PNG tag byte).
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }
}

/// Decode stream data through a filter pipeline, then undo any predictor.
pub fn decode_stream(data: &[u8], filters: &[String], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            _ => return Err(Error::UnsupportedFilter(filter_name.clone())),
        };
        current = decoder.decode(&current)?;

        let ratio = current.len() / data.len().max(1);
        if ratio > MAX_DECOMPRESSION_RATIO && current.len() > 1024 * 1024 {
            return Err(Error::Decode(format!(
                "{} output exceeds ratio limit {}:1 ({} -> {} bytes)",
                decoder.name(),
                MAX_DECOMPRESSION_RATIO,
                data.len(),
                current.len()
            )));
        }
        if current.len() > MAX_DECOMPRESSED_SIZE {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                MAX_DECOMPRESSED_SIZE
            )));
        }
    }

    match params {
        Some(params) if params.predictor > 1 => decode_predictor(&current, params),
        _ => Ok(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_unsupported_filter() {
        let err = decode_stream(b"abc", &["LZWDecode".to_string()], None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFilter(name) if name == "LZWDecode"));
    }

    #[test]
    fn test_no_filters_is_identity() {
        assert_eq!(decode_stream(b"abc", &[], None).unwrap(), b"abc");
    }

    #[test]
    fn test_decode_params_from_dict() {
        let mut dict = HashMap::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(5));
        let params = DecodeParams::from_object(Some(&Object::Dictionary(dict))).unwrap();
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
        assert_eq!(params.pixel_bytes_per_row(), 5);
    }

    #[test]
    fn test_decode_params_absent() {
        assert!(DecodeParams::from_object(None).is_none());
        assert!(DecodeParams::from_object(Some(&Object::Null)).is_none());
    }
}
