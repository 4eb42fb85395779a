//! Video codec arguments.

use cropaway_crop_model::{OutputPolicy, SourceInfo};

use crate::encoder::{CodecFamily, EncoderChoice};

/// Codec family for an export: alpha output needs ProRes 4444, otherwise
/// the source codec family is kept (H.264 when unrecognized).
pub fn output_family(source: &SourceInfo, policy: &OutputPolicy) -> CodecFamily {
    if policy.alpha_channel {
        return CodecFamily::ProRes;
    }
    CodecFamily::from_codec_name(&source.codec_name).unwrap_or(CodecFamily::H264)
}

/// CRF for software encoders, by output height.
pub fn adaptive_crf(height: u32) -> u32 {
    if height <= 480 {
        12
    } else if height <= 720 {
        14
    } else if height <= 1080 {
        15
    } else {
        18
    }
}

/// Bitrate used by hardware encoders when the source does not report one.
pub fn default_bitrate_kbps(height: u32) -> u64 {
    if height <= 480 {
        2_500
    } else if height <= 720 {
        5_000
    } else if height <= 1080 {
        8_000
    } else {
        20_000
    }
}

/// Settle a negotiated encoder against the source. Hardware H.264 encoders
/// are 8-bit only, so deeper sources go to the software encoder.
pub fn encoder_for_source(choice: EncoderChoice, source: &SourceInfo) -> EncoderChoice {
    if choice.family == CodecFamily::H264 && choice.hardware && source.bit_depth > 8 {
        tracing::info!(
            encoder = %choice.encoder,
            bit_depth = source.bit_depth,
            "Hardware H.264 cannot keep the source depth, using software"
        );
        return EncoderChoice::software(CodecFamily::H264);
    }
    choice
}

/// Pixel format for the encoded stream.
pub fn pixel_format(choice: &EncoderChoice, source: &SourceInfo, policy: &OutputPolicy) -> &'static str {
    if choice.family == CodecFamily::ProRes {
        return if policy.alpha_channel {
            "yuva444p10le"
        } else {
            "yuv422p10le"
        };
    }

    match (source.bit_depth > 8, choice.hardware) {
        (true, true) => "p010le",
        (true, false) => "yuv420p10le",
        (false, _) => "yuv420p",
    }
}

/// `-c:v` plus rate control and pixel format for an encode producing
/// frames of `output_height` rows.
pub fn video_codec_args(
    choice: &EncoderChoice,
    source: &SourceInfo,
    policy: &OutputPolicy,
    output_height: u32,
    software_preset: &str,
) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), choice.encoder.clone()];

    if choice.family == CodecFamily::ProRes {
        let profile = if policy.alpha_channel { "4444" } else { "hq" };
        args.extend(["-profile:v".to_string(), profile.to_string()]);
    } else if choice.hardware {
        let kbps = source
            .bit_rate
            .map(|bps| bps / 1000)
            .unwrap_or_else(|| default_bitrate_kbps(output_height))
            .max(1000);
        args.extend(["-b:v".to_string(), format!("{kbps}k")]);
    } else {
        args.extend([
            "-crf".to_string(),
            adaptive_crf(output_height).to_string(),
        ]);
        match choice.encoder.as_str() {
            "libx264" | "libx265" => {
                args.extend(["-preset".to_string(), software_preset.to_string()]);
            }
            // Constant-quality mode for libvpx needs a zero bitrate cap.
            "libvpx-vp9" => args.extend(["-b:v".to_string(), "0".to_string()]),
            _ => {}
        }
    }

    args.extend([
        "-pix_fmt".to_string(),
        pixel_format(choice, source, policy).to_string(),
    ]);
    args.extend(color_args(source));
    args
}

/// Color tags copied from the source so that HDR/SDR classification
/// survives the re-encode.
pub fn color_args(source: &SourceInfo) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(primaries) = &source.color_primaries {
        args.extend(["-color_primaries".to_string(), primaries.clone()]);
    }
    if let Some(transfer) = &source.color_transfer {
        args.extend(["-color_trc".to_string(), transfer.clone()]);
    }
    if let Some(space) = &source.color_space {
        args.extend(["-colorspace".to_string(), space.clone()]);
    }
    args
}
