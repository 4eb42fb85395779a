//! Compact binary mask blob.
//!
//! Layout before zlib compression (all integers little-endian):
//!
//! ```text
//! [start_value u8][height u16][width u16][num_runs u32][run u16; num_runs]
//! ```
//!
//! Pixels are row-major. Runs alternate starting with `start_value`
//! (0 = background, 1 = foreground). A run longer than `u16::MAX` is split
//! with a zero-length run of the opposite value in between.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{GrayImage, Luma};

use crate::rle::{check_size, MaskCodecError};

const HEADER_LEN: usize = 9;

/// Whether `bytes` look like a zlib stream (and therefore a blob rather
/// than JSON text).
pub fn is_blob(bytes: &[u8]) -> bool {
    match bytes {
        [cmf, flg, ..] => {
            *cmf & 0x0f == 8 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}

/// Encode a bitmap (pixels above 127 are foreground).
pub fn encode(bitmap: &GrayImage) -> Result<Vec<u8>, MaskCodecError> {
    let (width, height) = bitmap.dimensions();
    let (Ok(h16), Ok(w16)) = (u16::try_from(height), u16::try_from(width)) else {
        return Err(MaskCodecError::InvalidSize { height, width });
    };

    let mut runs: Vec<u32> = Vec::new();
    let mut pixels = bitmap.pixels().map(|p| p[0] > 127);
    let start_value = match pixels.next() {
        Some(first) => {
            let mut current = first;
            let mut run = 1u32;
            for fg in pixels {
                if fg == current {
                    run += 1;
                } else {
                    runs.push(run);
                    run = 1;
                    current = fg;
                }
            }
            runs.push(run);
            first
        }
        None => false,
    };

    let mut table: Vec<u16> = Vec::with_capacity(runs.len());
    for run in runs {
        let mut remaining = run;
        while remaining > u32::from(u16::MAX) {
            table.push(u16::MAX);
            table.push(0);
            remaining -= u32::from(u16::MAX);
        }
        table.push(remaining as u16);
    }

    let mut raw = Vec::with_capacity(HEADER_LEN + table.len() * 2);
    raw.push(u8::from(start_value));
    raw.extend_from_slice(&h16.to_le_bytes());
    raw.extend_from_slice(&w16.to_le_bytes());
    raw.extend_from_slice(&(table.len() as u32).to_le_bytes());
    for run in &table {
        raw.extend_from_slice(&run.to_le_bytes());
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|e| MaskCodecError::Blob(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| MaskCodecError::Blob(e.to_string()))
}

/// Decode a blob into a bitmap (255 = foreground).
///
/// A run table shorter than the header claims is tolerated; pixels not
/// covered by any run stay background.
pub fn decode(bytes: &[u8]) -> Result<GrayImage, MaskCodecError> {
    let mut raw = Vec::new();
    ZlibDecoder::new(bytes)
        .read_to_end(&mut raw)
        .map_err(|e| MaskCodecError::Blob(e.to_string()))?;

    if raw.len() < HEADER_LEN {
        return Err(MaskCodecError::Blob(format!(
            "header truncated ({} bytes)",
            raw.len()
        )));
    }

    let mut value = raw[0] != 0;
    let height = u32::from(u16::from_le_bytes([raw[1], raw[2]]));
    let width = u32::from(u16::from_le_bytes([raw[3], raw[4]]));
    let num_runs = u32::from_le_bytes([raw[5], raw[6], raw[7], raw[8]]) as usize;
    check_size(height, width)?;

    let mut bitmap = GrayImage::new(width, height);
    let total = height as usize * width as usize;
    let mut pos = 0usize;

    for chunk in raw[HEADER_LEN..].chunks_exact(2).take(num_runs) {
        let run = usize::from(u16::from_le_bytes([chunk[0], chunk[1]])).min(total - pos);
        if value {
            for p in pos..pos + run {
                bitmap.put_pixel((p % width as usize) as u32, (p / width as usize) as u32, Luma([255]));
            }
        }
        pos += run;
        value = !value;
        if pos >= total {
            break;
        }
    }

    Ok(bitmap)
}

/// Base64 text form of [`encode`].
pub fn encode_base64(bitmap: &GrayImage) -> Result<String, MaskCodecError> {
    Ok(STANDARD.encode(encode(bitmap)?))
}

/// Inverse of [`encode_base64`].
pub fn decode_base64(text: &str) -> Result<GrayImage, MaskCodecError> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| MaskCodecError::Blob(format!("invalid base64: {e}")))?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bitmap() -> GrayImage {
        GrayImage::from_fn(7, 5, |x, y| {
            if (2..5).contains(&x) && (1..4).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_encode_decode_preserves_pixels() {
        let bitmap = sample_bitmap();
        let blob = encode(&bitmap).unwrap();
        assert!(is_blob(&blob));
        assert_eq!(decode(&blob).unwrap(), bitmap);
    }

    #[test]
    fn test_foreground_start_value() {
        let bitmap = GrayImage::from_pixel(3, 2, Luma([255]));
        let blob = encode(&bitmap).unwrap();
        let decoded = decode(&blob).unwrap();
        assert!(decoded.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_long_runs_are_split() {
        // 400 x 200 = 80_000 background pixels, a single run above u16::MAX.
        let bitmap = GrayImage::new(400, 200);
        let blob = encode(&bitmap).unwrap();

        let mut raw = Vec::new();
        ZlibDecoder::new(blob.as_slice()).read_to_end(&mut raw).unwrap();
        let num_runs = u32::from_le_bytes([raw[5], raw[6], raw[7], raw[8]]);
        assert_eq!(num_runs, 3);

        assert_eq!(decode(&blob).unwrap(), bitmap);
    }

    #[test]
    fn test_truncated_run_table_is_tolerated() {
        let mut raw = vec![1u8];
        raw.extend_from_slice(&2u16.to_le_bytes());
        raw.extend_from_slice(&2u16.to_le_bytes());
        raw.extend_from_slice(&5u32.to_le_bytes());
        raw.extend_from_slice(&1u16.to_le_bytes());

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let blob = encoder.finish().unwrap();

        let bitmap = decode(&blob).unwrap();
        assert_eq!(bitmap.get_pixel(0, 0)[0], 255);
        assert_eq!(bitmap.pixels().filter(|p| p[0] == 255).count(), 1);
    }

    #[test]
    fn test_json_is_not_a_blob() {
        assert!(!is_blob(br#"{"counts": [1, 2]}"#));
        assert!(!is_blob(b"[1,2]"));
    }

    #[test]
    fn test_base64_form() {
        let bitmap = sample_bitmap();
        let text = encode_base64(&bitmap).unwrap();
        assert_eq!(decode_base64(&text).unwrap(), bitmap);
    }
}
