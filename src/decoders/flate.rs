//! FlateDecode (zlib/deflate) implementation.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!(
                    "FlateDecode partial recovery: extracted {} bytes before corruption: {}",
                    output.len(),
                    e
                );
                Ok(output)
            },
            Err(e) => {
                // Some writers emit raw deflate without the zlib wrapper.
                log::debug!("Zlib decode failed ({}), trying raw deflate", e);
                output.clear();
                match DeflateDecoder::new(input).read_to_end(&mut output) {
                    Ok(_) => Ok(output),
                    Err(_) if !output.is_empty() => Ok(output),
                    Err(deflate_err) => Err(Error::Decode(format!(
                        "FlateDecode failed: zlib: {}, deflate: {}",
                        e, deflate_err
                    ))),
                }
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

impl FlateDecoder {
    /// Compress data with the zlib wrapper expected by FlateDecode.
    pub fn encode(input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_round_trip() {
        let original = b"1 0 2 14 << /Type /Catalog >> << /Producer (x) >>";
        let compressed = FlateDecoder::encode(original).unwrap();
        assert_ne!(compressed, original.to_vec());
        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_raw_deflate_fallback() {
        use flate2::write::DeflateEncoder;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate data").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(FlateDecoder.decode(&raw).unwrap(), b"raw deflate data");
    }

    #[test]
    fn test_flate_garbage_fails() {
        assert!(FlateDecoder.decode(b"\xff\xfe\xfd not compressed").is_err());
    }
}
