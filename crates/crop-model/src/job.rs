//! Export job description and source media metadata.
//!
//! An export job ties together a source file, an output path, the crop to
//! apply, and the output policy. The caller owns the job; the export
//! pipeline updates its status and progress as it runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::interpolate::interpolate;
use crate::keyframe::KeyframeTrack;
use crate::region::{CropMode, CropRegion};

/// The crop applied by a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobRegion {
    /// One region for the whole clip.
    Static { region: CropRegion },

    /// A keyframe track read in `mode`.
    Track { track: KeyframeTrack, mode: CropMode },
}

impl JobRegion {
    /// Region in effect at `timestamp`.
    pub fn region_at(&self, timestamp: f64) -> CropRegion {
        match self {
            JobRegion::Static { region } => region.clone(),
            JobRegion::Track { track, mode } => interpolate(track, timestamp, *mode),
        }
    }

    /// The crop mode of this job.
    pub fn mode(&self) -> CropMode {
        match self {
            JobRegion::Static { region } => region.mode(),
            JobRegion::Track { mode, .. } => *mode,
        }
    }
}

/// Which export path renders the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Geometry is evaluated once (at t = 0) and applied through a single
    /// filter graph.
    #[default]
    Static,

    /// Every output frame gets its own mask from the track.
    Keyframed,
}

/// Output shaping policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputPolicy {
    /// Keep the source frame size, padding around the crop.
    pub preserve_dimensions: bool,

    /// Emit an alpha channel (transparent outside the crop) instead of
    /// blending onto black.
    pub alpha_channel: bool,
}

/// Lifecycle of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Video stream metadata of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,

    /// Codec name as reported by the prober (e.g. `h264`, `hevc`).
    pub codec_name: String,

    /// Pixel format (e.g. `yuv420p10le`).
    #[serde(default)]
    pub pix_fmt: Option<String>,

    /// Bits per component.
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u8,

    /// Video bitrate in bits per second.
    #[serde(default)]
    pub bit_rate: Option<u64>,

    /// Frames per second.
    #[serde(default)]
    pub frame_rate: Option<f64>,

    /// Duration in seconds.
    #[serde(default)]
    pub duration_secs: Option<f64>,

    #[serde(default)]
    pub color_primaries: Option<String>,
    #[serde(default)]
    pub color_transfer: Option<String>,
    #[serde(default)]
    pub color_space: Option<String>,

    /// Whether the container has at least one audio stream.
    #[serde(default)]
    pub has_audio: bool,
}

fn default_bit_depth() -> u8 {
    8
}

impl SourceInfo {
    /// Minimal metadata for a source of known size.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            codec_name: "h264".to_string(),
            pix_fmt: None,
            bit_depth: 8,
            bit_rate: None,
            frame_rate: None,
            duration_secs: None,
            color_primaries: None,
            color_transfer: None,
            color_space: None,
            has_audio: false,
        }
    }

    /// Whether the transfer characteristics mark the source as HDR.
    pub fn is_hdr(&self) -> bool {
        matches!(
            self.color_transfer.as_deref(),
            Some("smpte2084") | Some("arib-std-b67")
        )
    }
}

/// A single export request.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Source video.
    pub source_path: PathBuf,

    /// Output file path.
    pub output_path: PathBuf,

    /// Crop to apply.
    pub region: JobRegion,

    /// Rendering path.
    pub mode: ExportMode,

    /// Output shaping policy.
    pub policy: OutputPolicy,

    /// Pre-probed source metadata. Probed on demand when `None`.
    pub source: Option<SourceInfo>,

    /// Current status (updated by the pipeline).
    pub status: JobStatus,

    /// Current progress in `[0, 1]` (updated by the pipeline).
    pub progress: f64,
}

impl ExportJob {
    /// A queued job with default policy and the static export path.
    pub fn new(source_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>, region: JobRegion) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: output_path.into(),
            region,
            mode: ExportMode::Static,
            policy: OutputPolicy::default(),
            source: None,
            status: JobStatus::Queued,
            progress: 0.0,
        }
    }

    pub fn with_policy(mut self, policy: OutputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = Some(source);
        self
    }

    /// Record progress, clamped to `[0, 1]`.
    pub fn set_progress(&mut self, progress: f64) {
        if progress.is_finite() {
            self.progress = progress.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormalizedRect;
    use crate::keyframe::{Interpolation, Keyframe};

    #[test]
    fn test_new_job_is_queued() {
        let job = ExportJob::new(
            "in.mp4",
            "out.mp4",
            JobRegion::Static {
                region: CropRegion::full_frame(CropMode::Rectangle),
            },
        );
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.mode, ExportMode::Static);
        assert!(!job.policy.preserve_dimensions);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn test_track_region_is_evaluated_at_time() {
        let mut track = KeyframeTrack::new();
        track
            .insert(Keyframe::from_region(
                0.0,
                Interpolation::Linear,
                &CropRegion::rectangle(NormalizedRect::new(0.0, 0.0, 1.0, 1.0)),
            ))
            .unwrap();
        track
            .insert(Keyframe::from_region(
                2.0,
                Interpolation::Linear,
                &CropRegion::rectangle(NormalizedRect::new(0.5, 0.0, 0.5, 1.0)),
            ))
            .unwrap();

        let region = JobRegion::Track {
            track,
            mode: CropMode::Rectangle,
        };
        let CropRegion::Rectangle { rect } = region.region_at(1.0) else {
            panic!("expected rectangle");
        };
        assert!((rect.x - 0.25).abs() < 1e-9);
        assert_eq!(region.mode(), CropMode::Rectangle);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut job = ExportJob::new(
            "in.mp4",
            "out.mp4",
            JobRegion::Static {
                region: CropRegion::full_frame(CropMode::Circle),
            },
        );
        job.set_progress(1.7);
        assert_eq!(job.progress, 1.0);
        job.set_progress(f64::NAN);
        assert_eq!(job.progress, 1.0);
    }

    #[test]
    fn test_source_info_defaults_from_partial_json() {
        let info: SourceInfo =
            serde_json::from_str(r#"{"width": 1920, "height": 1080, "codec_name": "hevc"}"#)
                .unwrap();
        assert_eq!(info.bit_depth, 8);
        assert!(!info.is_hdr());
    }
}
