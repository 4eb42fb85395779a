//! COCO-style run-length encoded masks.
//!
//! Runs alternate background/foreground starting with background, over
//! pixels in column-major order. `size` is `[height, width]`.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest mask area accepted from a payload, in pixels.
pub const MAX_MASK_PIXELS: u64 = 1 << 27;

/// Errors raised while decoding or encoding a mask payload.
#[derive(Debug, thiserror::Error)]
pub enum MaskCodecError {
    #[error("Mask payload is empty")]
    Empty,

    #[error("Mask has no size and no default size was supplied")]
    MissingSize,

    #[error("Mask size {height}x{width} is not usable")]
    InvalidSize { height: u32, width: u32 },

    #[error("Invalid run-length string: {0}")]
    InvalidCounts(String),

    #[error("Unsupported mask payload: {0}")]
    Unsupported(String),

    #[error("Corrupt mask blob: {0}")]
    Blob(String),
}

/// A run-length encoded binary mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleMask {
    /// `[height, width]` in pixels.
    pub size: [u32; 2],

    /// Alternating background/foreground run lengths.
    pub counts: Vec<u32>,
}

impl RleMask {
    pub fn new(height: u32, width: u32, counts: Vec<u32>) -> Self {
        Self {
            size: [height, width],
            counts,
        }
    }

    pub fn height(&self) -> u32 {
        self.size[0]
    }

    pub fn width(&self) -> u32 {
        self.size[1]
    }

    /// Number of foreground pixels, i.e. the sum of the odd-indexed runs.
    pub fn foreground_count(&self) -> u64 {
        self.counts
            .iter()
            .skip(1)
            .step_by(2)
            .map(|&c| u64::from(c))
            .sum()
    }

    /// Parse any of the accepted JSON shapes:
    ///
    /// - `{"counts": ..., "size": [h, w]}` with `counts` a string or array
    /// - a bare run-length string
    /// - a bare array of run lengths
    ///
    /// `default_size` is `(width, height)` and fills in a missing `size`.
    pub fn from_json(value: &Value, default_size: Option<(u32, u32)>) -> Result<Self, MaskCodecError> {
        let (counts, size) = match value {
            Value::Object(map) => {
                let counts = map
                    .get("counts")
                    .ok_or_else(|| MaskCodecError::Unsupported("object without counts".into()))?;
                let size = match map.get("size") {
                    Some(size) => Some(parse_size(size)?),
                    None => None,
                };
                (parse_counts(counts)?, size)
            }
            other => (parse_counts(other)?, None),
        };

        let size = size
            .or_else(|| default_size.map(|(w, h)| [h, w]))
            .ok_or(MaskCodecError::MissingSize)?;
        Ok(Self { size, counts })
    }

    /// Parse a JSON document held in raw bytes. Unquoted run-length strings
    /// are accepted as well.
    pub fn from_bytes(bytes: &[u8], default_size: Option<(u32, u32)>) -> Result<Self, MaskCodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| MaskCodecError::Unsupported("payload is not UTF-8".into()))?
            .trim();
        if text.is_empty() {
            return Err(MaskCodecError::Empty);
        }

        // A bare COCO string may itself parse as a JSON number.
        match serde_json::from_str::<Value>(text) {
            Ok(value @ (Value::Object(_) | Value::Array(_) | Value::String(_))) => {
                Self::from_json(&value, default_size)
            }
            _ => Self::from_json(&Value::String(text.to_string()), default_size),
        }
    }

    /// Build from a bitmap; pixels above 127 are foreground.
    pub fn from_bitmap(bitmap: &GrayImage) -> Self {
        let (width, height) = bitmap.dimensions();
        let mut counts = Vec::new();
        let mut current = false;
        let mut run = 0u32;

        for x in 0..width {
            for y in 0..height {
                let fg = bitmap.get_pixel(x, y)[0] > 127;
                if fg != current {
                    counts.push(run);
                    run = 0;
                    current = fg;
                }
                run += 1;
            }
        }
        counts.push(run);

        Self::new(height, width, counts)
    }

    /// Decode to a bitmap (255 = foreground).
    ///
    /// Runs past the end of the frame are truncated; a short run table
    /// leaves the rest as background.
    pub fn to_bitmap(&self) -> Result<GrayImage, MaskCodecError> {
        let (height, width) = (self.height(), self.width());
        check_size(height, width)?;

        let mut bitmap = GrayImage::new(width, height);
        let total = u64::from(height) * u64::from(width);
        let mut pos = 0u64;

        for (idx, &run) in self.counts.iter().enumerate() {
            let run = u64::from(run).min(total - pos);
            if idx % 2 == 1 {
                for p in pos..pos + run {
                    let x = (p / u64::from(height)) as u32;
                    let y = (p % u64::from(height)) as u32;
                    bitmap.put_pixel(x, y, Luma([255]));
                }
            }
            pos += run;
            if pos >= total {
                break;
            }
        }

        Ok(bitmap)
    }

    /// Encode the counts in the COCO compressed string form.
    pub fn to_coco_string(&self) -> String {
        encode_coco_counts(&self.counts)
    }
}

/// Reject sizes that are empty, wider than the blob header can carry, or too
/// large to allocate.
pub(crate) fn check_size(height: u32, width: u32) -> Result<(), MaskCodecError> {
    let side_ok = (1..=u32::from(u16::MAX)).contains(&height) && (1..=u32::from(u16::MAX)).contains(&width);
    if !side_ok || u64::from(height) * u64::from(width) > MAX_MASK_PIXELS {
        return Err(MaskCodecError::InvalidSize { height, width });
    }
    Ok(())
}

fn parse_size(value: &Value) -> Result<[u32; 2], MaskCodecError> {
    let dims: Vec<u32> = value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_f64())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u32)
                .collect()
        })
        .unwrap_or_default();
    match dims.as_slice() {
        [h, w] => Ok([*h, *w]),
        _ => Err(MaskCodecError::Unsupported(format!("size {value}"))),
    }
}

fn parse_counts(value: &Value) -> Result<Vec<u32>, MaskCodecError> {
    match value {
        Value::String(s) => parse_counts_str(s),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| MaskCodecError::InvalidCounts(v.to_string()))
            })
            .collect(),
        other => Err(MaskCodecError::Unsupported(format!(
            "counts of type {}",
            json_type(other)
        ))),
    }
}

/// A string containing separators is a list of integers; anything else is
/// the COCO compressed form.
fn parse_counts_str(s: &str) -> Result<Vec<u32>, MaskCodecError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(MaskCodecError::Empty);
    }

    let has_separator = s.contains(|c: char| c.is_whitespace() || c == ',');
    if has_separator {
        return s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<u32>()
                    .map_err(|_| MaskCodecError::InvalidCounts(tok.to_string()))
            })
            .collect();
    }

    decode_coco_counts(s)
}

/// Decode the COCO compressed counts string (LEB128-like, 5 bits per char,
/// offset by 48, counts after the second delta-coded against `counts[i-2]`).
pub fn decode_coco_counts(s: &str) -> Result<Vec<u32>, MaskCodecError> {
    let bytes = s.as_bytes();
    let mut counts: Vec<i64> = Vec::new();
    let mut p = 0;

    while p < bytes.len() {
        let mut x: i64 = 0;
        let mut k = 0u32;
        loop {
            let Some(&byte) = bytes.get(p) else {
                return Err(MaskCodecError::InvalidCounts(s.to_string()));
            };
            if !(48..=111).contains(&byte) || k >= 12 {
                return Err(MaskCodecError::InvalidCounts(s.to_string()));
            }
            let c = i64::from(byte - 48);
            x |= (c & 0x1f) << (5 * k);
            let more = c & 0x20 != 0;
            p += 1;
            k += 1;
            if !more {
                if c & 0x10 != 0 {
                    x |= -1i64 << (5 * k);
                }
                break;
            }
        }
        if counts.len() > 2 {
            x += counts[counts.len() - 2];
        }
        counts.push(x);
    }

    counts
        .into_iter()
        .map(|c| u32::try_from(c).map_err(|_| MaskCodecError::InvalidCounts(s.to_string())))
        .collect()
}

/// Inverse of [`decode_coco_counts`].
pub fn encode_coco_counts(counts: &[u32]) -> String {
    let mut out = String::new();
    for (i, &count) in counts.iter().enumerate() {
        let mut x = i64::from(count);
        if i > 2 {
            x -= i64::from(counts[i - 2]);
        }
        loop {
            let mut c = x & 0x1f;
            x >>= 5;
            let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                c |= 0x20;
            }
            out.push(char::from((c + 48) as u8));
            if !more {
                break;
            }
        }
    }
    out
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
