//! Cropaway CLI: command-line interface for crop export and object tracking.
//!
//! Usage:
//!   cropaway export <SOURCE> -o <OUT>   Crop a video to a region or keyframe track
//!   cropaway track <SOURCE>             Track an object with the segmentation service
//!   cropaway encoders                   Show the encoder chosen for each codec family
//!   cropaway mask -o <PNG>              Rasterize a region to an alpha mask image

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cropaway_common::config::AppConfig;
use cropaway_common::error::CropawayError;
use tokio_util::sync::CancellationToken;

mod commands;
mod region;

use region::{ModeArg, RegionArgs};

#[derive(Parser)]
#[command(
    name = "cropaway",
    about = "Crop videos to rectangles, circles, freehand paths, and tracked masks",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Transcoder binary (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a cropped copy of a video
    Export {
        /// Source video
        source: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        region: RegionArgs,

        /// Mode a keyframe track is read in
        #[arg(long, value_enum, default_value = "segmentation")]
        mode: ModeArg,

        /// Rasterize the track for every output frame instead of once
        #[arg(long, requires = "track")]
        keyframed: bool,

        /// Keep the source frame size, padding around the crop
        #[arg(long)]
        preserve: bool,

        /// Transparent outside the crop (ProRes 4444 output)
        #[arg(long)]
        alpha: bool,
    },

    /// Track an object through a video with the remote segmentation service
    Track {
        /// Source video
        source: PathBuf,

        /// Describe the object to track
        #[arg(long, conflicts_with = "point", required_unless_present = "point")]
        text: Option<String>,

        /// A normalized `x,y` point on the object in the first frame
        #[arg(long, value_name = "X,Y")]
        point: Option<String>,

        /// Where to write the keyframe track
        #[arg(short, long, default_value = "track.json")]
        output: PathBuf,

        /// Keep every Nth tracked frame as a keyframe
        #[arg(long, default_value = "1")]
        stride: usize,

        /// Frame rate of the result indices (probed when omitted)
        #[arg(long)]
        fps: Option<f64>,
    },

    /// Show the encoder negotiated for each codec family
    Encoders,

    /// Rasterize a region to a grayscale alpha mask
    Mask {
        #[command(flatten)]
        region: RegionArgs,

        /// Mode a keyframe track is read in
        #[arg(long, value_enum, default_value = "segmentation")]
        mode: ModeArg,

        /// Track time to sample, in seconds
        #[arg(long, default_value = "0.0")]
        at: f64,

        /// Sample the track over this many seconds from `--at` and keep
        /// pixels covered in more than half of the samples
        #[arg(long, requires = "track")]
        span: Option<f64>,

        /// Mask width
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Mask height
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,

        /// Fail on undecodable mask payloads instead of writing a full-frame mask
        #[arg(long)]
        strict: bool,
    },
}

/// Exit status for a run stopped by Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match run(Cli::parse()).await {
        Err(err) if is_cancelled(&err) => std::process::exit(EXIT_CANCELLED),
        other => other,
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CropawayError>(), Some(CropawayError::Cancelled))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(ffmpeg) = cli.ffmpeg {
        config.export.ffmpeg_path = Some(ffmpeg);
    }
    cropaway_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Export {
            source,
            output,
            region,
            mode,
            keyframed,
            preserve,
            alpha,
        } => {
            let region = region.job_region(mode)?;
            commands::export::run(
                &config,
                source,
                output,
                region,
                keyframed,
                preserve,
                alpha,
                cancel_on_ctrl_c(),
            )
            .await
        }
        Commands::Track {
            source,
            text,
            point,
            output,
            stride,
            fps,
        } => {
            commands::track::run(
                &config,
                source,
                text,
                point,
                output,
                stride,
                fps,
                cancel_on_ctrl_c(),
            )
            .await
        }
        Commands::Encoders => commands::encoders::run(&config).await,
        Commands::Mask {
            region,
            mode,
            at,
            span,
            width,
            height,
            output,
            strict,
        } => commands::mask::run(region.job_region(mode)?, at, span, width, height, output, strict),
    }
}

/// A token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_recognized_through_anyhow() {
        assert!(is_cancelled(&anyhow::Error::from(CropawayError::Cancelled)));
        assert!(!is_cancelled(&anyhow::Error::from(CropawayError::configuration("x"))));
        assert!(!is_cancelled(&anyhow::anyhow!("plain failure")));
    }
}
