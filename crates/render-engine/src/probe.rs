//! Source metadata via `ffprobe -print_format json`.

use std::path::Path;
use std::time::Duration;

use cropaway_common::error::{CropawayError, CropawayResult};
use cropaway_common::timecode::parse_frame_rate;
use cropaway_crop_model::SourceInfo;
use serde::Deserialize;

use crate::command::ToolCommand;

/// Probe the first video stream of `path`.
pub async fn probe_source(ffprobe: &Path, path: &Path, timeout: Duration) -> CropawayResult<SourceInfo> {
    if !path.exists() {
        return Err(CropawayError::resource(format!(
            "Source file not found: {}",
            path.display()
        )));
    }

    let mut cmd = ToolCommand::new(ffprobe);
    cmd.args([
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ])
    .arg(path.to_string_lossy().as_ref())
    .timeout(timeout);

    let output = cmd.execute().await?;
    let info = parse_probe_output(&output.stdout)?;
    tracing::debug!(
        path = %path.display(),
        codec = %info.codec_name,
        width = info.width,
        height = info.height,
        fps = ?info.frame_rate,
        "Probed source"
    );
    Ok(info)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    bits_per_raw_sample: Option<String>,
    bit_rate: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_space: Option<String>,
}

/// Map ffprobe JSON to [`SourceInfo`].
pub fn parse_probe_output(json: &str) -> CropawayResult<SourceInfo> {
    let output: ProbeOutput = serde_json::from_str(json)?;
    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let video = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| CropawayError::resource("Source has no video stream"))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(CropawayError::resource("Video stream has no dimensions")),
    };

    let bit_depth = video
        .bits_per_raw_sample
        .as_deref()
        .and_then(|s| s.parse::<u8>().ok())
        .or_else(|| video.pix_fmt.as_deref().map(bit_depth_from_pix_fmt))
        .unwrap_or(8);

    let frame_rate = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate));

    let duration_secs = video
        .duration
        .as_deref()
        .or(output.format.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let bit_rate = video
        .bit_rate
        .as_deref()
        .or(output.format.bit_rate.as_deref())
        .and_then(|s| s.parse::<u64>().ok());

    Ok(SourceInfo {
        width,
        height,
        codec_name: video.codec_name.unwrap_or_else(|| "unknown".to_string()),
        pix_fmt: video.pix_fmt,
        bit_depth,
        bit_rate,
        frame_rate,
        duration_secs,
        color_primaries: known_tag(video.color_primaries),
        color_transfer: known_tag(video.color_transfer),
        color_space: known_tag(video.color_space),
        has_audio,
    })
}

/// Bit depth implied by a pixel format name (`yuv420p10le` -> 10).
fn bit_depth_from_pix_fmt(pix_fmt: &str) -> u8 {
    let trimmed = pix_fmt.trim_end_matches("le").trim_end_matches("be");
    if trimmed.ends_with("16") {
        16
    } else if trimmed.ends_with("12") {
        12
    } else if trimmed.ends_with("10") {
        10
    } else {
        8
    }
}

/// ffprobe reports unset color tags as `unknown`; drop those.
fn known_tag(tag: Option<String>) -> Option<String> {
    tag.filter(|t| !t.is_empty() && t != "unknown" && t != "unspecified")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HDR_SAMPLE: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "hevc",
                "width": 3840,
                "height": 2160,
                "pix_fmt": "yuv420p10le",
                "avg_frame_rate": "24000/1001",
                "r_frame_rate": "24000/1001",
                "color_primaries": "bt2020",
                "color_transfer": "smpte2084",
                "color_space": "bt2020nc"
            },
            { "codec_type": "audio", "codec_name": "aac" }
        ],
        "format": { "duration": "12.500000", "bit_rate": "25000000" }
    }"#;

    #[test]
    fn test_parse_hdr_source() {
        let info = parse_probe_output(HDR_SAMPLE).unwrap();
        assert_eq!((info.width, info.height), (3840, 2160));
        assert_eq!(info.codec_name, "hevc");
        assert_eq!(info.bit_depth, 10);
        assert_eq!(info.bit_rate, Some(25_000_000));
        assert!((info.frame_rate.unwrap() - 23.976).abs() < 0.001);
        assert_eq!(info.duration_secs, Some(12.5));
        assert!(info.is_hdr());
        assert!(info.has_audio);
    }

    #[test]
    fn test_unknown_color_tags_are_dropped() {
        let json = r#"{"streams": [{"codec_type": "video", "codec_name": "h264",
            "width": 1920, "height": 1080, "pix_fmt": "yuv420p",
            "bits_per_raw_sample": "8", "r_frame_rate": "30/1",
            "color_primaries": "unknown"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.color_primaries, None);
        assert_eq!(info.frame_rate, Some(30.0));
        assert!(!info.has_audio);
        assert_eq!(info.duration_secs, None);
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(CropawayError::Resource { .. })
        ));
    }

    #[test]
    fn test_bit_depth_from_pix_fmt() {
        assert_eq!(bit_depth_from_pix_fmt("yuv420p"), 8);
        assert_eq!(bit_depth_from_pix_fmt("yuv422p10le"), 10);
        assert_eq!(bit_depth_from_pix_fmt("p010le"), 10);
        assert_eq!(bit_depth_from_pix_fmt("yuv444p12be"), 12);
    }
}
