//! Cropaway Crop Model
//!
//! Defines the core data contracts for crop exports:
//! - **Geometry:** Normalized rectangles and points
//! - **Regions:** Rectangle, circle, freehand path, and segmentation mask crops
//! - **Keyframes:** Timestamped crop snapshots with easing, and their evaluation
//! - **Jobs:** Export requests and source metadata
//!
//! All coordinates are normalized to `[0.0, 1.0]` relative to the source
//! frame so that regions survive resolution changes between proxy and
//! full-quality media.

pub mod geometry;
pub mod interpolate;
pub mod job;
pub mod keyframe;
pub mod region;

pub use geometry::*;
pub use interpolate::*;
pub use job::*;
pub use keyframe::*;
pub use region::*;
