//! Rasterize a crop region to a PNG alpha mask.

use std::path::PathBuf;

use anyhow::Context;
use cropaway_crop_model::{sample, CropRegion, JobRegion};
use cropaway_mask_engine::{ops, AlphaMask, Rasterizer};

/// Samples taken across `--span`.
const SPAN_SAMPLES: u32 = 10;

pub fn run(
    region: JobRegion,
    at: f64,
    span: Option<f64>,
    width: u32,
    height: u32,
    output: PathBuf,
    strict: bool,
) -> anyhow::Result<()> {
    anyhow::ensure!(width > 0 && height > 0, "mask size must be non-zero");

    let rasterizer = Rasterizer::new().with_source_size(width, height);
    let render = |region: &CropRegion| -> anyhow::Result<AlphaMask> {
        if strict {
            Ok(rasterizer.rasterize_strict(region, width, height)?)
        } else {
            Ok(rasterizer.rasterize(region, width, height))
        }
    };

    // Over a span, keep pixels inside the region for more than half the samples.
    let mask = match (&region, span) {
        (JobRegion::Track { track, mode }, Some(span)) if span > 0.0 => {
            let step = span / f64::from(SPAN_SAMPLES);
            let masks = sample(track, *mode, at, at + span, step)
                .iter()
                .map(|(_, region)| render(region))
                .collect::<anyhow::Result<Vec<_>>>()?;
            ops::combine(&masks, None)?
        }
        _ => render(&region.region_at(at))?,
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    mask.save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let covered = mask.pixels().filter(|p| p[0] > 127).count();
    let total = (width as usize) * (height as usize);
    println!(
        "Wrote {}x{} {:?} mask ({:.1}% inside) -> {}",
        width,
        height,
        region.mode(),
        covered as f64 * 100.0 / total as f64,
        output.display()
    );
    Ok(())
}
