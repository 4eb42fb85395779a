//! Pixel geometry for crop and pad filters.

use cropaway_crop_model::NormalizedRect;

/// Force a dimension even, decrementing odd values, with a floor of 2.
///
/// Chroma-subsampled pixel formats reject odd sizes.
pub fn force_even(value: u32) -> u32 {
    (value - value % 2).max(2)
}

/// An integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crop placement within a source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropGeometry {
    /// Even-corrected source size; the pad target when dimensions are
    /// preserved.
    pub frame_width: u32,
    pub frame_height: u32,

    /// Even-sized crop rectangle placed inside the frame.
    pub crop: PixelRect,
}

impl CropGeometry {
    /// Denormalize `rect` against a `source_width` x `source_height` frame.
    pub fn from_normalized(rect: &NormalizedRect, source_width: u32, source_height: u32) -> Self {
        let frame_width = force_even(source_width);
        let frame_height = force_even(source_height);
        let rect = rect.clamped();

        let width = force_even(scale(rect.width, source_width)).min(frame_width);
        let height = force_even(scale(rect.height, source_height)).min(frame_height);
        let x = scale(rect.x, source_width).min(frame_width - width);
        let y = scale(rect.y, source_height).min(frame_height - height);

        Self {
            frame_width,
            frame_height,
            crop: PixelRect {
                x,
                y,
                width,
                height,
            },
        }
    }

    /// Whether the crop covers the whole frame.
    pub fn is_full_frame(&self) -> bool {
        self.crop.x == 0
            && self.crop.y == 0
            && self.crop.width == self.frame_width
            && self.crop.height == self.frame_height
    }

    /// `crop=w:h:x:y`
    pub fn crop_filter(&self) -> String {
        format!(
            "crop={}:{}:{}:{}",
            self.crop.width, self.crop.height, self.crop.x, self.crop.y
        )
    }

    /// `pad=W:H:x:y:color=...`, putting the crop back at its original
    /// offset. `transparent` fills with zero alpha.
    pub fn pad_filter(&self, transparent: bool) -> String {
        let color = if transparent { "black@0" } else { "black" };
        format!(
            "pad={}:{}:{}:{}:color={color}",
            self.frame_width, self.frame_height, self.crop.x, self.crop.y
        )
    }
}

fn scale(normalized: f64, pixels: u32) -> u32 {
    let value = (normalized * f64::from(pixels)).round();
    if value.is_finite() && value > 0.0 {
        value as u32
    } else {
        0
    }
}
