//! Normalized rectangles and points.
//!
//! All coordinates are normalized to `[0.0, 1.0]` relative to the source
//! frame; they are denormalized only at rasterization/export time.

use serde::{Deserialize, Serialize};

/// A rectangle within the source frame.
///
/// `(0.0, 0.0)` is top-left, `(1.0, 1.0)` is bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    /// Left edge (normalized).
    pub x: f64,
    /// Top edge (normalized).
    pub y: f64,
    /// Width (normalized).
    pub width: f64,
    /// Height (normalized).
    pub height: f64,
}

impl NormalizedRect {
    /// The whole frame (no crop).
    pub const FULL: NormalizedRect = NormalizedRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Create a rectangle, clamping it inside the frame.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        Self {
            x,
            y,
            width: width.clamp(0.0, 1.0 - x),
            height: height.clamp(0.0, 1.0 - y),
        }
    }

    /// Convert a center-form box `[cx, cy, w, h]` to origin form.
    ///
    /// No clamping is applied; the result is exactly
    /// `[cx - w/2, cy - h/2, w, h]`.
    pub fn from_center_form(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// The center point of this rectangle.
    pub fn center(&self) -> NormalizedPoint {
        NormalizedPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether this rectangle covers the whole frame.
    pub fn is_full(&self) -> bool {
        const EPS: f64 = 1e-9;
        self.x.abs() < EPS
            && self.y.abs() < EPS
            && self.right() >= 1.0 - EPS
            && self.bottom() >= 1.0 - EPS
    }

    /// Clamp into the unit square.
    pub fn clamped(&self) -> Self {
        Self::new(self.x, self.y, self.width, self.height)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &NormalizedRect) -> NormalizedRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        NormalizedRect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Linearly interpolate each component.
    pub fn lerp(a: &NormalizedRect, b: &NormalizedRect, t: f64) -> NormalizedRect {
        NormalizedRect {
            x: lerp(a.x, b.x, t),
            y: lerp(a.y, b.y, t),
            width: lerp(a.width, b.width, t),
            height: lerp(a.height, b.height, t),
        }
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// A 2D normalized point (or offset, for bezier control handles).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub const CENTER: NormalizedPoint = NormalizedPoint { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise sum (point + offset).
    pub fn offset_by(&self, offset: &NormalizedPoint) -> NormalizedPoint {
        NormalizedPoint::new(self.x + offset.x, self.y + offset.y)
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &NormalizedPoint, b: &NormalizedPoint, t: f64) -> NormalizedPoint {
        NormalizedPoint {
            x: lerp(a.x, b.x, t),
            y: lerp(a.y, b.y, t),
        }
    }

    /// Whether both components are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Scalar linear interpolation. `t` is not clamped so that callers can
/// pass eased values directly.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_rect() {
        assert!(NormalizedRect::FULL.is_full());
        assert!(!NormalizedRect::new(0.1, 0.0, 0.9, 1.0).is_full());
    }

    #[test]
    fn test_new_clamps_to_frame() {
        let rect = NormalizedRect::new(0.8, -0.2, 0.5, 2.0);
        assert!((rect.x - 0.8).abs() < 1e-9);
        assert_eq!(rect.y, 0.0);
        assert!(rect.right() <= 1.0 + 1e-9);
        assert!(rect.bottom() <= 1.0 + 1e-9);
    }

    #[test]
    fn test_center_form_conversion() {
        let rect = NormalizedRect::from_center_form(0.5, 0.4, 0.2, 0.1);
        assert!((rect.x - 0.4).abs() < 1e-12);
        assert!((rect.y - 0.35).abs() < 1e-12);
        assert_eq!(rect.width, 0.2);
        assert_eq!(rect.height, 0.1);
    }

    #[test]
    fn test_union() {
        let a = NormalizedRect::new(0.1, 0.1, 0.2, 0.2);
        let b = NormalizedRect::new(0.5, 0.6, 0.1, 0.1);
        let u = a.union(&b);
        assert!((u.x - 0.1).abs() < 1e-9);
        assert!((u.right() - 0.6).abs() < 1e-9);
        assert!((u.bottom() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_lerp() {
        let a = NormalizedRect::FULL;
        let b = NormalizedRect::new(0.25, 0.25, 0.5, 0.5);
        let mid = NormalizedRect::lerp(&a, &b, 0.5);
        assert!((mid.x - 0.125).abs() < 1e-9);
        assert!((mid.width - 0.75).abs() < 1e-9);
    }
}
