//! Cropaway Mask Engine
//!
//! Turns crop regions into pixel masks:
//! - **Rasterization:** Rectangle, circle, freehand path, and segmentation
//!   regions rendered to 8-bit alpha masks
//! - **RLE:** COCO-style run-length masks in object, string, and array form
//! - **Blob:** Compact zlib-compressed mask storage
//!
//! This crate is pure computation with no process or network I/O.

pub mod blob;
pub mod ops;
pub mod rasterize;
pub mod rle;

pub use rasterize::{rasterize, AlphaMask, RasterError, Rasterizer};
pub use rle::{MaskCodecError, RleMask};
