//! PNG predictor decoding.
//!
//! Cross-reference streams are almost always written with `/Predictor 12`
//! (PNG Up). Each row carries its own tag byte, so the tag is honoured for
//! every predictor in the 10-15 range.

use super::DecodeParams;
use crate::error::{Error, Result};

/// Undo the predictor named in `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let width = params.pixel_bytes_per_row();
    let row_len = width + 1;
    let bpp = (params.colors * params.bits_per_component).div_ceil(8).max(1);

    if data.len() % row_len != 0 {
        log::warn!(
            "Predictor data length {} is not a multiple of row size {}, ignoring tail",
            data.len(),
            row_len
        );
    }

    let mut output: Vec<u8> = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; width];

    for row in data.chunks_exact(row_len) {
        let tag = row[0];
        let mut current = row[1..].to_vec();
        for i in 0..width {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let delta = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag))),
            };
            current[i] = current[i].wrapping_add(delta);
        }
        output.extend_from_slice(&current);
        prev = current;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(columns: usize) -> DecodeParams {
        DecodeParams {
            predictor: 12,
            columns,
            ..DecodeParams::default()
        }
    }

    #[test]
    fn test_png_up() {
        // Two rows of 3 bytes, second row encoded as difference from the first.
        let data = [2, 1, 2, 3, 2, 1, 1, 1];
        let out = decode_predictor(&data, &params(3)).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_none_and_sub() {
        let data = [0, 5, 6, 1, 1, 1];
        let out = decode_predictor(&data, &params(2)).unwrap();
        assert_eq!(out, vec![5, 6, 1, 2]);
    }

    #[test]
    fn test_no_predictor() {
        let p = DecodeParams::default();
        assert_eq!(decode_predictor(b"abc", &p).unwrap(), b"abc");
    }

    #[test]
    fn test_invalid_tag() {
        assert!(decode_predictor(&[9, 1, 2], &params(2)).is_err());
    }
}
