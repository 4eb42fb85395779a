//! Cropaway Segmentation - Remote object tracking
//!
//! Uploads a source clip (or a bitrate-reduced proxy of it) to a hosted
//! video segmentation model, polls the queued job, and normalizes the
//! returned per-frame masks and boxes into a [`TrackingResult`].

pub mod api;
pub mod client;
pub mod media;
pub mod result;
pub mod state;

pub use api::{JobPhase, JobUrls, StorageToken, TrackingPrompt};
pub use client::SegmentationClient;
pub use media::MediaPreparer;
pub use result::{normalize_result, TrackingResult};
pub use state::TrackingState;
