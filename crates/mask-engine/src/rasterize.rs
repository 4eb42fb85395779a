//! Crop region rasterization.
//!
//! Turns a [`CropRegion`] into an 8-bit alpha mask of a requested pixel
//! size: 255 keeps a pixel, 0 discards it.

use std::collections::HashMap;
use std::sync::Mutex;

use cropaway_common::error::{CropawayError, CropawayResult};
use cropaway_crop_model::{CropRegion, FreehandVertex, NormalizedPoint, NormalizedRect};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::blob;
use crate::ops::resize_nearest;
use crate::rle::{MaskCodecError, RleMask};

/// 8-bit grayscale mask; white keeps, black discards.
pub type AlphaMask = GrayImage;

const KEEP: Luma<u8> = Luma([255]);
const DISCARD: Luma<u8> = Luma([0]);

/// Canvases kept per size by the pool.
const MAX_POOLED_PER_SIZE: usize = 4;

/// Reasons a region could not be rasterized.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Canvas size {width}x{height} is empty")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("Freehand path has {0} usable points, at least 3 are required")]
    TooFewPoints(usize),

    #[error("Segmentation mask could not be decoded: {0}")]
    Decode(#[from] MaskCodecError),
}

/// Mask rasterizer with an optional canvas pool.
///
/// `source_size` is the source video's pixel size; it stands in for a
/// segmentation mask's missing `size` field.
#[derive(Debug, Default)]
pub struct Rasterizer {
    source_size: Option<(u32, u32)>,
    pool: Mutex<HashMap<(u32, u32), Vec<GrayImage>>>,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source video's `(width, height)`.
    pub fn with_source_size(mut self, width: u32, height: u32) -> Self {
        self.source_size = Some((width, height));
        self
    }

    /// Rasterize, degrading to a full-white (no-op) mask when the region
    /// is unusable.
    pub fn rasterize(&self, region: &CropRegion, width: u32, height: u32) -> AlphaMask {
        match self.try_rasterize(region, width, height) {
            Ok(mask) => mask,
            Err(err) => {
                tracing::warn!(
                    mode = ?region.mode(),
                    width,
                    height,
                    error = %err,
                    "Falling back to full-frame mask"
                );
                let mut canvas = self.acquire(width, height);
                fill(&mut canvas, KEEP);
                canvas
            }
        }
    }

    /// Rasterize, surfacing unusable regions as a generation error.
    pub fn rasterize_strict(&self, region: &CropRegion, width: u32, height: u32) -> CropawayResult<AlphaMask> {
        self.try_rasterize(region, width, height)
            .map_err(|e| CropawayError::generation(e.to_string()))
    }

    /// Hand a mask back to the pool once it is no longer needed.
    pub fn recycle(&self, mask: AlphaMask) {
        let key = mask.dimensions();
        if key.0 == 0 || key.1 == 0 {
            return;
        }
        if let Ok(mut pool) = self.pool.lock() {
            let slot = pool.entry(key).or_default();
            if slot.len() < MAX_POOLED_PER_SIZE {
                slot.push(mask);
            }
        }
    }

    fn try_rasterize(&self, region: &CropRegion, width: u32, height: u32) -> Result<AlphaMask, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyCanvas { width, height });
        }

        match region {
            CropRegion::Rectangle { rect } => {
                let mut canvas = self.acquire(width, height);
                draw_rect(&mut canvas, rect);
                Ok(canvas)
            }
            CropRegion::Circle { center, radius } => {
                let mut canvas = self.acquire(width, height);
                draw_circle(&mut canvas, center, *radius);
                Ok(canvas)
            }
            CropRegion::Freehand { vertices } => {
                let points = path_points(vertices, width, height);
                if points.len() < 3 {
                    return Err(RasterError::TooFewPoints(points.len()));
                }
                let mut canvas = self.acquire(width, height);
                draw_polygon_mut(&mut canvas, &points, KEEP);
                Ok(canvas)
            }
            CropRegion::Segmentation { mask, .. } => {
                let bitmap = decode_payload(mask, self.source_size.or(Some((width, height))))?;
                Ok(resize_nearest(&bitmap, width, height))
            }
        }
    }

    /// A black canvas of the given size, reused from the pool when possible.
    fn acquire(&self, width: u32, height: u32) -> GrayImage {
        let pooled = self
            .pool
            .lock()
            .ok()
            .and_then(|mut pool| pool.get_mut(&(width, height)).and_then(Vec::pop));
        match pooled {
            Some(mut canvas) => {
                fill(&mut canvas, DISCARD);
                canvas
            }
            None => GrayImage::new(width, height),
        }
    }
}

/// Rasterize with a one-off rasterizer and no source size hint.
pub fn rasterize(region: &CropRegion, width: u32, height: u32) -> AlphaMask {
    Rasterizer::new().rasterize(region, width, height)
}

/// Decode a segmentation payload: a compact blob, its base64 text, or RLE
/// JSON.
///
/// `default_size` is `(width, height)`.
pub fn decode_payload(bytes: &[u8], default_size: Option<(u32, u32)>) -> Result<GrayImage, MaskCodecError> {
    if bytes.is_empty() {
        return Err(MaskCodecError::Empty);
    }
    if blob::is_blob(bytes) {
        return blob::decode(bytes);
    }
    if let Some(bitmap) = std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| blob::decode_base64(text).ok())
    {
        return Ok(bitmap);
    }
    RleMask::from_bytes(bytes, default_size)?.to_bitmap()
}

fn fill(canvas: &mut GrayImage, value: Luma<u8>) {
    for p in canvas.pixels_mut() {
        *p = value;
    }
}

fn draw_rect(canvas: &mut GrayImage, rect: &NormalizedRect) {
    let (w, h) = canvas.dimensions();
    let rect = rect.clamped();
    let x0 = (rect.x * f64::from(w)).round() as u32;
    let y0 = (rect.y * f64::from(h)).round() as u32;
    let x1 = (rect.right() * f64::from(w)).round().min(f64::from(w)) as u32;
    let y1 = (rect.bottom() * f64::from(h)).round().min(f64::from(h)) as u32;
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    draw_filled_rect_mut(
        canvas,
        Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0),
        KEEP,
    );
}

fn draw_circle(canvas: &mut GrayImage, center: &NormalizedPoint, radius: f64) {
    if !center.is_finite() || !radius.is_finite() {
        return;
    }
    let (w, h) = canvas.dimensions();
    let r_px = radius * f64::from(w.min(h));
    if r_px < 0.5 {
        return;
    }
    let cx = (center.x * f64::from(w)).round() as i32;
    let cy = (center.y * f64::from(h)).round() as i32;
    draw_filled_circle_mut(canvas, (cx, cy), r_px.round() as i32, KEEP);
}

/// Closed path through the vertices in pixel space. Bezier segments are
/// flattened when any vertex carries handles.
fn path_points(vertices: &[FreehandVertex], width: u32, height: u32) -> Vec<Point<i32>> {
    let vertices: Vec<&FreehandVertex> = vertices.iter().filter(|v| v.point.is_finite()).collect();
    let w = f64::from(width);
    let h = f64::from(height);
    let to_px = |p: NormalizedPoint| (p.x * w, p.y * h);

    let mut raw: Vec<(f64, f64)> = Vec::new();
    let curved = vertices.len() >= 3 && vertices.iter().any(|v| v.has_handles());
    if curved {
        for (i, v) in vertices.iter().enumerate() {
            let next = vertices[(i + 1) % vertices.len()];
            let p0 = to_px(v.point);
            let c1 = to_px(handle_or_anchor(v.point, v.control_out));
            let c2 = to_px(handle_or_anchor(next.point, next.control_in));
            let p3 = to_px(next.point);
            flatten_cubic(p0, c1, c2, p3, &mut raw);
        }
    } else {
        raw.extend(vertices.iter().map(|v| to_px(v.point)));
    }

    let mut points: Vec<Point<i32>> = Vec::with_capacity(raw.len());
    for (x, y) in raw {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        let point = Point::new(x.round() as i32, y.round() as i32);
        if points.last() != Some(&point) {
            points.push(point);
        }
    }
    // The polygon is closed implicitly; a repeated endpoint is rejected by
    // the fill routine.
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn handle_or_anchor(anchor: NormalizedPoint, handle: Option<NormalizedPoint>) -> NormalizedPoint {
    match handle {
        Some(offset) if offset.is_finite() => anchor.offset_by(&offset),
        _ => anchor,
    }
}

/// Push `p0` and the interior samples of the cubic; `p3` is left to the
/// next segment.
fn flatten_cubic(
    p0: (f64, f64),
    c1: (f64, f64),
    c2: (f64, f64),
    p3: (f64, f64),
    out: &mut Vec<(f64, f64)>,
) {
    let dist = |a: (f64, f64), b: (f64, f64)| ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
    let hull = dist(p0, c1) + dist(c1, c2) + dist(c2, p3);
    let steps = if hull.is_finite() {
        ((hull / 4.0).ceil() as usize).clamp(2, 64)
    } else {
        2
    };

    out.push(p0);
    for i in 1..steps {
        let t = i as f64 / steps as f64;
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        out.push((
            a * p0.0 + b * c1.0 + c * c2.0 + d * p3.0,
            a * p0.1 + b * c1.1 + c * c2.1 + d * p3.1,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropaway_crop_model::CropMode;

    fn kept(mask: &AlphaMask) -> usize {
        mask.pixels().filter(|p| p[0] == 255).count()
    }

    #[test]
    fn test_rectangle_fill() {
        let region = CropRegion::Rectangle {
            rect: NormalizedRect::new(0.25, 0.25, 0.5, 0.5),
        };
        let mask = rasterize(&region, 100, 40);
        assert_eq!(kept(&mask), 50 * 20);
        assert_eq!(mask.get_pixel(25, 10)[0], 255);
        assert_eq!(mask.get_pixel(24, 10)[0], 0);
        assert_eq!(mask.get_pixel(75, 30)[0], 0);
    }

    #[test]
    fn test_zero_size_rectangle_is_all_black() {
        let region = CropRegion::Rectangle {
            rect: NormalizedRect::new(0.5, 0.5, 0.0, 0.0),
        };
        assert_eq!(kept(&rasterize(&region, 10, 10)), 0);
    }

    #[test]
    fn test_circle_uses_short_side() {
        let region = CropRegion::Circle {
            center: NormalizedPoint::new(0.5, 0.5),
            radius: 0.25,
        };
        let mask = rasterize(&region, 200, 100);
        // Radius 25px around (100, 50).
        assert_eq!(mask.get_pixel(100, 50)[0], 255);
        assert_eq!(mask.get_pixel(120, 50)[0], 255);
        assert_eq!(mask.get_pixel(130, 50)[0], 0);
        assert_eq!(mask.get_pixel(100, 80)[0], 0);
    }

    #[test]
    fn test_freehand_polygon() {
        let region = CropRegion::Freehand {
            vertices: vec![
                FreehandVertex::corner(0.1, 0.1),
                FreehandVertex::corner(0.9, 0.1),
                FreehandVertex::corner(0.9, 0.9),
                FreehandVertex::corner(0.1, 0.9),
            ],
        };
        let mask = rasterize(&region, 100, 100);
        assert_eq!(mask.get_pixel(50, 50)[0], 255);
        assert_eq!(mask.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_freehand_bezier_bulges_outward() {
        let square = [(0.3, 0.3), (0.7, 0.3), (0.7, 0.7), (0.3, 0.7)];
        let straight = CropRegion::Freehand {
            vertices: square.iter().map(|&(x, y)| FreehandVertex::corner(x, y)).collect(),
        };
        // Handles pushing every edge outwards.
        let curved = CropRegion::Freehand {
            vertices: square
                .iter()
                .map(|&(x, y)| {
                    let dx = if x < 0.5 { -0.1 } else { 0.1 };
                    let dy = if y < 0.5 { -0.1 } else { 0.1 };
                    FreehandVertex::smooth(
                        NormalizedPoint::new(x, y),
                        NormalizedPoint::new(dx, dy),
                        NormalizedPoint::new(dx, dy),
                    )
                })
                .collect(),
        };
        let a = kept(&rasterize(&straight, 100, 100));
        let b = kept(&rasterize(&curved, 100, 100));
        assert!(b > a, "curved path should cover more pixels ({b} <= {a})");
    }

    #[test]
    fn test_degenerate_freehand_falls_back_to_full_white() {
        let region = CropRegion::Freehand {
            vertices: vec![FreehandVertex::corner(0.1, 0.1), FreehandVertex::corner(0.5, 0.5)],
        };
        let mask = rasterize(&region, 8, 8);
        assert_eq!(kept(&mask), 64);
    }

    #[test]
    fn test_strict_surfaces_generation_error() {
        let region = CropRegion::Freehand { vertices: vec![] };
        let err = Rasterizer::new().rasterize_strict(&region, 8, 8).unwrap_err();
        assert!(matches!(err, CropawayError::Generation { .. }));
    }

    #[test]
    fn test_undecodable_segmentation_falls_back() {
        let region = CropRegion::Segmentation {
            mask: b"not a mask {".to_vec(),
            bounding_box: NormalizedRect::FULL,
        };
        assert_eq!(kept(&rasterize(&region, 4, 4)), 16);
        assert!(Rasterizer::new().rasterize_strict(&region, 4, 4).is_err());
    }

    #[test]
    fn test_absurd_segmentation_size_falls_back() {
        let region = CropRegion::Segmentation {
            mask: br#"{"counts": [1], "size": [4294967295, 4294967295]}"#.to_vec(),
            bounding_box: NormalizedRect::FULL,
        };
        assert_eq!(kept(&rasterize(&region, 4, 4)), 16);
        assert!(Rasterizer::new().rasterize_strict(&region, 4, 4).is_err());
    }

    #[test]
    fn test_segmentation_uses_source_size_and_resamples() {
        // 2x2 source mask with the left column kept; size omitted.
        let region = CropRegion::Segmentation {
            mask: b"[0, 2, 2]".to_vec(),
            bounding_box: NormalizedRect::FULL,
        };
        let rasterizer = Rasterizer::new().with_source_size(2, 2);
        let mask = rasterizer.rasterize(&region, 10, 10);
        assert_eq!(mask.dimensions(), (10, 10));
        assert_eq!(mask.get_pixel(2, 7)[0], 255);
        assert_eq!(mask.get_pixel(8, 2)[0], 0);
        assert_eq!(kept(&mask), 50);
    }

    #[test]
    fn test_segmentation_blob_payload() {
        let bitmap = GrayImage::from_fn(4, 4, |x, _| if x < 2 { KEEP } else { DISCARD });
        let region = CropRegion::Segmentation {
            mask: blob::encode(&bitmap).unwrap(),
            bounding_box: NormalizedRect::FULL,
        };
        assert_eq!(rasterize(&region, 4, 4), bitmap);
    }

    #[test]
    fn test_segmentation_base64_blob_payload() {
        let bitmap = GrayImage::from_fn(4, 4, |_, y| if y < 1 { KEEP } else { DISCARD });
        let region = CropRegion::Segmentation {
            mask: blob::encode_base64(&bitmap).unwrap().into_bytes(),
            bounding_box: NormalizedRect::FULL,
        };
        assert_eq!(rasterize(&region, 4, 4), bitmap);
    }

    #[test]
    fn test_pool_reuses_canvas_cleanly() {
        let rasterizer = Rasterizer::new();
        let full = rasterizer.rasterize(&CropRegion::full_frame(CropMode::Rectangle), 16, 16);
        assert_eq!(kept(&full), 256);
        rasterizer.recycle(full);

        let small = rasterizer.rasterize(
            &CropRegion::Rectangle {
                rect: NormalizedRect::new(0.0, 0.0, 0.5, 0.5),
            },
            16,
            16,
        );
        assert_eq!(kept(&small), 64);
    }
}
