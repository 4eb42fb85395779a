//! Filter graph synthesis.
//!
//! Rectangle crops are a linear `-vf` chain. Every other shape goes
//! through a two-input `-filter_complex` graph: the source on input 0 and
//! a grayscale mask (a looped still or an image sequence) on input 1.

use std::path::PathBuf;

use cropaway_crop_model::OutputPolicy;

use crate::geometry::{force_even, CropGeometry};

/// Output label of a complex graph.
pub const GRAPH_OUTPUT: &str = "[vout]";

/// Where the mask for a masked graph comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskInput {
    /// One PNG, looped for the whole clip.
    Still(PathBuf),

    /// A numbered PNG sequence (`mask_%06d.png`) read at `fps`.
    Sequence { pattern: PathBuf, fps: f64 },
}

impl MaskInput {
    /// Input arguments for the mask, placed after the source input.
    pub fn input_args(&self) -> Vec<String> {
        match self {
            MaskInput::Still(path) => vec![
                "-loop".to_string(),
                "1".to_string(),
                "-i".to_string(),
                path.display().to_string(),
            ],
            MaskInput::Sequence { pattern, fps } => vec![
                "-framerate".to_string(),
                format_rate(*fps),
                "-start_number".to_string(),
                "0".to_string(),
                "-i".to_string(),
                pattern.display().to_string(),
            ],
        }
    }
}

/// How the video stream is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoPlan {
    /// The crop is a no-op; copy the stream.
    StreamCopy,

    /// A single-input `-vf` chain.
    Simple { filter: String },

    /// A two-input `-filter_complex` graph ending in [`GRAPH_OUTPUT`].
    Masked { graph: String, mask: MaskInput },
}

impl VideoPlan {
    pub fn requires_encode(&self) -> bool {
        !matches!(self, VideoPlan::StreamCopy)
    }
}

/// Crop chain for a rectangle, or `None` when the crop covers the frame.
///
/// With `preserve_dimensions` the crop is padded back to the frame size at
/// its original offset; alpha output converts to a format with an alpha
/// plane first so the padding is transparent.
pub fn rectangle_chain(geometry: &CropGeometry, policy: &OutputPolicy) -> Option<String> {
    if geometry.is_full_frame() {
        return None;
    }

    let mut chain = vec![geometry.crop_filter()];
    if policy.preserve_dimensions {
        if policy.alpha_channel {
            chain.push("format=yuva444p".to_string());
        }
        chain.push(geometry.pad_filter(policy.alpha_channel));
    }
    Some(chain.join(","))
}

/// Merge graph for a mask-driven crop.
///
/// Alpha output turns the mask into the alpha plane; opaque output
/// multiplies the frame by the mask so discarded pixels go black.
/// `crop_to` trims the result to a bounding box. `frame_crop` trims an
/// odd-sized source to its even frame when nothing else does.
pub fn mask_graph(alpha: bool, crop_to: Option<&CropGeometry>, frame_crop: Option<(u32, u32)>) -> String {
    let mut graph = if alpha {
        "[0:v]format=yuva444p[src];[1:v]format=gray[mask];\
         [src][mask]alphamerge=shortest=1[merged]"
            .to_string()
    } else {
        "[0:v]format=gbrp[src];[1:v]format=gray,format=gbrp[mask];\
         [src][mask]blend=all_mode=multiply:shortest=1[merged]"
            .to_string()
    };

    let tail = match (crop_to, frame_crop) {
        (Some(geometry), _) if !geometry.is_full_frame() => geometry.crop_filter(),
        (_, Some((width, height))) => format!(
            "crop={}:{}:0:0",
            force_even(width),
            force_even(height)
        ),
        _ => "null".to_string(),
    };
    graph.push_str(&format!(";[merged]{tail}{GRAPH_OUTPUT}"));
    graph
}

/// Frame rate as passed on the command line, without trailing zeros.
pub fn format_rate(fps: f64) -> String {
    let text = format!("{fps:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropaway_crop_model::NormalizedRect;

    fn half_crop() -> CropGeometry {
        CropGeometry::from_normalized(&NormalizedRect::new(0.25, 0.25, 0.5, 0.5), 1920, 1080)
    }

    #[test]
    fn test_rectangle_without_preserve_is_bare_crop() {
        let chain = rectangle_chain(&half_crop(), &OutputPolicy::default());
        assert_eq!(chain.as_deref(), Some("crop=960:540:480:270"));
    }

    #[test]
    fn test_rectangle_preserve_pads_back() {
        let policy = OutputPolicy {
            preserve_dimensions: true,
            alpha_channel: false,
        };
        assert_eq!(
            rectangle_chain(&half_crop(), &policy).as_deref(),
            Some("crop=960:540:480:270,pad=1920:1080:480:270:color=black")
        );

        let policy = OutputPolicy {
            preserve_dimensions: true,
            alpha_channel: true,
        };
        assert_eq!(
            rectangle_chain(&half_crop(), &policy).as_deref(),
            Some("crop=960:540:480:270,format=yuva444p,pad=1920:1080:480:270:color=black@0")
        );
    }

    #[test]
    fn test_full_frame_rectangle_has_no_chain() {
        let geometry = CropGeometry::from_normalized(&NormalizedRect::FULL, 1920, 1080);
        assert_eq!(rectangle_chain(&geometry, &OutputPolicy::default()), None);
    }

    #[test]
    fn test_alpha_mask_graph() {
        let graph = mask_graph(true, None, None);
        assert!(graph.contains("alphamerge"));
        assert!(graph.ends_with("[merged]null[vout]"));
    }

    #[test]
    fn test_opaque_mask_graph_crops_to_bbox() {
        let graph = mask_graph(false, Some(&half_crop()), None);
        assert!(graph.contains("blend=all_mode=multiply"));
        assert!(graph.ends_with("[merged]crop=960:540:480:270[vout]"));
    }

    #[test]
    fn test_odd_frame_is_trimmed_even() {
        let graph = mask_graph(true, None, Some((1921, 1081)));
        assert!(graph.ends_with("[merged]crop=1920:1080:0:0[vout]"));
    }

    #[test]
    fn test_mask_input_args() {
        let still = MaskInput::Still(PathBuf::from("/tmp/m.png"));
        assert_eq!(still.input_args(), vec!["-loop", "1", "-i", "/tmp/m.png"]);

        let seq = MaskInput::Sequence {
            pattern: PathBuf::from("/tmp/mask_%06d.png"),
            fps: 29.97,
        };
        assert_eq!(seq.input_args()[1], "29.97");
        assert_eq!(seq.input_args().last().map(String::as_str), Some("/tmp/mask_%06d.png"));
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(30.0), "30");
        assert_eq!(format_rate(23.976023), "23.976");
        assert_eq!(format_rate(12.5), "12.5");
    }
}
