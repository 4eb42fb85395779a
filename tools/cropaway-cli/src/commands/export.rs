//! Export a cropped video.

use std::io::Write;
use std::path::PathBuf;

use cropaway_common::config::AppConfig;
use cropaway_common::error::CropawayError;
use cropaway_crop_model::{ExportJob, ExportMode, JobRegion, OutputPolicy};
use cropaway_render_engine::{ExportPipeline, ExportProgress, ExportStage, ProgressCallback};
use tokio_util::sync::CancellationToken;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    source: PathBuf,
    output: PathBuf,
    region: JobRegion,
    keyframed: bool,
    preserve: bool,
    alpha: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    println!("Exporting: {}", source.display());
    println!("  Output: {}", output.display());
    println!("  Crop: {:?}", region.mode());

    let mode = if keyframed {
        ExportMode::Keyframed
    } else {
        ExportMode::Static
    };
    let mut job = ExportJob::new(source, output, region)
        .with_mode(mode)
        .with_policy(OutputPolicy {
            preserve_dimensions: preserve,
            alpha_channel: alpha,
        });

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        let eta = p
            .eta_secs
            .map(|s| format!("{s:.0}s"))
            .unwrap_or_else(|| "?".to_string());
        match p.stage {
            ExportStage::Preparing => print!("\r  Preparing...                    "),
            ExportStage::Rendering => print!("\r  Rendering masks: {:.1}%        ", p.progress * 100.0),
            ExportStage::Encoding => print!("\r  Progress: {:.1}% (ETA: {eta})  ", p.progress * 100.0),
            ExportStage::Complete => print!("\r  Progress: 100.0%               "),
        }
        let _ = std::io::stdout().flush();
    });

    let pipeline = ExportPipeline::new(&config.export);
    match pipeline.export(&mut job, Some(progress_cb), cancel).await {
        Ok(path) => {
            println!("\nExport complete: {}", path.display());
            Ok(())
        }
        Err(CropawayError::Cancelled) => {
            println!("\nExport cancelled");
            Err(CropawayError::Cancelled.into())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
