//! Crop regions: the closed set of shapes a crop can take.

use serde::{Deserialize, Serialize};

use crate::geometry::{NormalizedPoint, NormalizedRect};

/// Which crop shape is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    Rectangle,
    Circle,
    Freehand,
    Segmentation,
}

/// A crop description for a single instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CropRegion {
    /// Axis-aligned rectangle.
    Rectangle { rect: NormalizedRect },

    /// Circle; the radius is relative to `min(width, height)` of the frame.
    Circle {
        center: NormalizedPoint,
        radius: f64,
    },

    /// Closed path through the vertices, in order.
    Freehand { vertices: Vec<FreehandVertex> },

    /// Opaque mask payload produced by segmentation.
    ///
    /// `mask` holds either RLE JSON (object, string or array form) or the
    /// compact binary mask blob.
    Segmentation {
        #[serde(default)]
        mask: Vec<u8>,
        bounding_box: NormalizedRect,
    },
}

/// A freehand path vertex with optional cubic bezier handles.
///
/// Handles are offsets relative to `point`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreehandVertex {
    pub point: NormalizedPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_in: Option<NormalizedPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_out: Option<NormalizedPoint>,
}

impl FreehandVertex {
    /// A corner vertex without handles.
    pub fn corner(x: f64, y: f64) -> Self {
        Self {
            point: NormalizedPoint::new(x, y),
            control_in: None,
            control_out: None,
        }
    }

    /// A smooth vertex with handles.
    pub fn smooth(point: NormalizedPoint, control_in: NormalizedPoint, control_out: NormalizedPoint) -> Self {
        Self {
            point,
            control_in: Some(control_in),
            control_out: Some(control_out),
        }
    }

    /// Whether either handle is present.
    pub fn has_handles(&self) -> bool {
        self.control_in.is_some() || self.control_out.is_some()
    }
}

impl CropRegion {
    /// The active mode.
    pub fn mode(&self) -> CropMode {
        match self {
            CropRegion::Rectangle { .. } => CropMode::Rectangle,
            CropRegion::Circle { .. } => CropMode::Circle,
            CropRegion::Freehand { .. } => CropMode::Freehand,
            CropRegion::Segmentation { .. } => CropMode::Segmentation,
        }
    }

    /// The fixed full-frame default for a mode.
    pub fn full_frame(mode: CropMode) -> Self {
        CropState::default().region(mode)
    }

    /// A full-frame rectangle.
    pub fn rectangle(rect: NormalizedRect) -> Self {
        CropRegion::Rectangle { rect }
    }

    /// Normalized bounding box of the region on a frame of the given pixel
    /// size. The aspect ratio matters for circles, whose radius scales with
    /// the shorter side.
    pub fn bounding_box(&self, width_px: u32, height_px: u32) -> NormalizedRect {
        match self {
            CropRegion::Rectangle { rect } => rect.clamped(),
            CropRegion::Circle { center, radius } => {
                let w = width_px.max(1) as f64;
                let h = height_px.max(1) as f64;
                let r_px = radius.max(0.0) * w.min(h);
                let rx = r_px / w;
                let ry = r_px / h;
                NormalizedRect::new(center.x - rx, center.y - ry, 2.0 * rx, 2.0 * ry)
            }
            CropRegion::Freehand { vertices } => {
                let points: Vec<NormalizedPoint> = vertices
                    .iter()
                    .flat_map(|v| {
                        let handle_in = v.control_in.map(|c| v.point.offset_by(&c));
                        let handle_out = v.control_out.map(|c| v.point.offset_by(&c));
                        std::iter::once(v.point).chain(handle_in).chain(handle_out)
                    })
                    .filter(NormalizedPoint::is_finite)
                    .collect();
                if points.len() < 3 {
                    return NormalizedRect::FULL;
                }
                let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
                let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
                let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
                let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
                let min_x = min_x.clamp(0.0, 1.0);
                let min_y = min_y.clamp(0.0, 1.0);
                NormalizedRect::new(min_x, min_y, max_x.min(1.0) - min_x, max_y.min(1.0) - min_y)
            }
            CropRegion::Segmentation { bounding_box, .. } => bounding_box.clamped(),
        }
    }
}

/// A full snapshot of every mode's fields.
///
/// Keyframes store this so a track can be re-read in any mode; only the
/// active mode's fields are meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropState {
    pub rect: NormalizedRect,
    pub circle_center: NormalizedPoint,
    pub circle_radius: f64,
    pub vertices: Vec<FreehandVertex>,
    pub mask: Vec<u8>,
    pub mask_bounding_box: NormalizedRect,
}

impl Default for CropState {
    fn default() -> Self {
        Self {
            rect: NormalizedRect::FULL,
            circle_center: NormalizedPoint::CENTER,
            circle_radius: 0.5,
            vertices: Vec::new(),
            mask: Vec::new(),
            mask_bounding_box: NormalizedRect::FULL,
        }
    }
}

impl CropState {
    /// Read the snapshot as a region of the given mode.
    pub fn region(&self, mode: CropMode) -> CropRegion {
        match mode {
            CropMode::Rectangle => CropRegion::Rectangle { rect: self.rect },
            CropMode::Circle => CropRegion::Circle {
                center: self.circle_center,
                radius: self.circle_radius,
            },
            CropMode::Freehand => CropRegion::Freehand {
                vertices: self.vertices.clone(),
            },
            CropMode::Segmentation => CropRegion::Segmentation {
                mask: self.mask.clone(),
                bounding_box: self.mask_bounding_box,
            },
        }
    }

    /// Snapshot a region, leaving other modes' fields at their defaults.
    pub fn from_region(region: &CropRegion) -> Self {
        let mut state = CropState::default();
        state.apply(region);
        state
    }

    /// Overwrite the fields belonging to the region's mode.
    pub fn apply(&mut self, region: &CropRegion) {
        match region {
            CropRegion::Rectangle { rect } => self.rect = *rect,
            CropRegion::Circle { center, radius } => {
                self.circle_center = *center;
                self.circle_radius = *radius;
            }
            CropRegion::Freehand { vertices } => self.vertices = vertices.clone(),
            CropRegion::Segmentation { mask, bounding_box } => {
                self.mask = mask.clone();
                self.mask_bounding_box = *bounding_box;
            }
        }
    }
}
