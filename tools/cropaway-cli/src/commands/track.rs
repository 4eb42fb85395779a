//! Track an object with the remote segmentation service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cropaway_common::config::AppConfig;
use cropaway_common::error::CropawayError;
use cropaway_common::timecode::FrameClock;
use cropaway_crop_model::NormalizedPoint;
use cropaway_render_engine::ExportPipeline;
use cropaway_segmentation::{MediaPreparer, SegmentationClient, TrackingPrompt};
use tokio_util::sync::CancellationToken;

use crate::region::parse_numbers;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    source: PathBuf,
    text: Option<String>,
    point: Option<String>,
    output: PathBuf,
    stride: usize,
    fps: Option<f64>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let prompt = match (text, point) {
        (Some(text), _) => TrackingPrompt::Text(text),
        (None, Some(spec)) => {
            let [x, y] = parse_numbers::<2>(&spec).context("--point")?;
            TrackingPrompt::Point(NormalizedPoint::new(x, y))
        }
        (None, None) => anyhow::bail!("either --text or --point is required"),
    };

    let preparer: Arc<dyn MediaPreparer> = Arc::new(ExportPipeline::new(&config.export));
    let frame_rate = match fps {
        Some(fps) => fps,
        None => preparer
            .probe(&source)
            .await?
            .frame_rate
            .unwrap_or(FrameClock::DEFAULT_FPS),
    };

    let client = SegmentationClient::new(config.segmentation.clone(), preparer)?
        .with_temp_root(config.export.resolved_temp_root());

    let mut states = client.subscribe();
    let reporter = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            println!("  Tracking: {state}");
        }
    });

    println!("Tracking object in: {}", source.display());
    let outcome = client.track(&source, prompt, frame_rate, cancel).await;
    drop(client);
    let _ = reporter.await;

    let result = match outcome {
        Ok(result) => result,
        Err(CropawayError::Cancelled) => {
            println!("Tracking cancelled");
            return Err(CropawayError::Cancelled.into());
        }
        Err(e) => return Err(e.into()),
    };

    let track = result.to_keyframe_track(frame_rate, stride)?;
    let json = serde_json::to_string_pretty(&track)?;
    std::fs::write(&output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Tracked {} frames ({} keyframes) -> {}",
        result.frame_count,
        track.len(),
        output.display()
    );
    Ok(())
}
