//! Local media preparation needed before upload.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cropaway_common::error::CropawayResult;
use cropaway_crop_model::SourceInfo;
use cropaway_render_engine::ExportPipeline;
use tokio_util::sync::CancellationToken;

/// Probing and proxy encoding, as the tracking client needs them.
#[async_trait]
pub trait MediaPreparer: Send + Sync {
    /// Pixel dimensions and stream metadata of `source`.
    async fn probe(&self, source: &Path) -> CropawayResult<SourceInfo>;

    /// Write a lower-bitrate, same-resolution copy of `source` to `output`.
    async fn encode_proxy(
        &self,
        source: &Path,
        output: &Path,
        bitrate_kbps: u32,
        cancel: CancellationToken,
    ) -> CropawayResult<PathBuf>;
}

#[async_trait]
impl MediaPreparer for ExportPipeline {
    async fn probe(&self, source: &Path) -> CropawayResult<SourceInfo> {
        ExportPipeline::probe(self, source).await
    }

    async fn encode_proxy(
        &self,
        source: &Path,
        output: &Path,
        bitrate_kbps: u32,
        cancel: CancellationToken,
    ) -> CropawayResult<PathBuf> {
        ExportPipeline::encode_proxy(self, source, output, bitrate_kbps, cancel).await
    }
}
