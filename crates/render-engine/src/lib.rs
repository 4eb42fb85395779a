//! Cropaway Render Engine
//!
//! Drives an external FFmpeg-compatible transcoder to apply crops to
//! source video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ──┬── probe (ffprobe JSON) ──► SourceInfo
//!              │
//! CropRegion ──┼── Rectangle ──► crop[,pad]            (-vf)
//!              │
//!              └── Circle/Freehand/Segmentation
//!                        │
//!                        ▼
//!                  mask.png / mask_%06d.png
//!                        │
//!                        ▼
//!                  alphamerge | multiply blend [,crop]  (-filter_complex)
//!                        │
//!                        ▼
//!              negotiated encoder (hardware → software)
//!                        │
//!                        ▼
//!                    output file
//! ```

pub mod codec;
pub mod command;
pub mod encoder;
pub mod export;
pub mod filter;
pub mod geometry;
pub mod probe;
pub mod progress;

pub use encoder::{shared_negotiator, CodecFamily, EncoderChoice, EncoderNegotiator, EncoderProbe, FfmpegProbe};
pub use export::{ExportPipeline, ExportPlan};
pub use filter::{MaskInput, VideoPlan};
pub use geometry::{force_even, CropGeometry, PixelRect};
pub use probe::probe_source;
pub use progress::{ExportProgress, ExportStage, ProgressCallback};
