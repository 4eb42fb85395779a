//! Bitmap mask utilities.

use cropaway_crop_model::NormalizedRect;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::rle::MaskCodecError;

fn is_foreground(p: &Luma<u8>) -> bool {
    p[0] > 127
}

/// Normalized bounding box of the foreground. An empty mask yields the
/// full frame.
pub fn bounding_box(mask: &GrayImage) -> NormalizedRect {
    let (width, height) = mask.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for (x, y, p) in mask.enumerate_pixels() {
        if is_foreground(p) {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x == u32::MAX {
        return NormalizedRect::FULL;
    }

    let w = f64::from(width);
    let h = f64::from(height);
    NormalizedRect::new(
        f64::from(min_x) / w,
        f64::from(min_y) / h,
        f64::from(max_x - min_x + 1) / w,
        f64::from(max_y - min_y + 1) / h,
    )
}

/// Nearest-neighbour resize; keeps the mask binary.
pub fn resize_nearest(mask: &GrayImage, width: u32, height: u32) -> GrayImage {
    if mask.dimensions() == (width, height) {
        return mask.clone();
    }
    imageops::resize(mask, width, height, FilterType::Nearest)
}

/// Weighted union: a pixel is kept when the weights of the masks covering
/// it exceed half the total weight. Without weights every mask counts 1.
pub fn combine(masks: &[GrayImage], weights: Option<&[f32]>) -> Result<GrayImage, MaskCodecError> {
    let Some(first) = masks.first() else {
        return Err(MaskCodecError::Empty);
    };
    let (width, height) = first.dimensions();
    if let Some(bad) = masks.iter().find(|m| m.dimensions() != (width, height)) {
        let (w, h) = bad.dimensions();
        return Err(MaskCodecError::InvalidSize { height: h, width: w });
    }

    let weights: Vec<f32> = match weights {
        Some(w) if w.len() == masks.len() => w.to_vec(),
        Some(w) => {
            return Err(MaskCodecError::Unsupported(format!(
                "{} weights for {} masks",
                w.len(),
                masks.len()
            )))
        }
        None => vec![1.0; masks.len()],
    };
    let threshold = 0.5 * weights.iter().sum::<f32>();

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let score: f32 = masks
            .iter()
            .zip(&weights)
            .filter(|(m, _)| is_foreground(m.get_pixel(x, y)))
            .map(|(_, w)| *w)
            .sum();
        if score > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    }))
}
