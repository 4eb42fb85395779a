//! Export pipeline.
//!
//! Plans a single transcoder invocation for an [`ExportJob`], runs it with
//! progress reporting and cancellation, and removes every temporary file
//! it created on the way out.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cropaway_common::config::ExportDefaults;
use cropaway_common::error::{CropawayError, CropawayResult};
use cropaway_common::timecode::FrameClock;
use cropaway_crop_model::{
    CropRegion, ExportJob, ExportMode, JobRegion, JobStatus, NormalizedRect, OutputPolicy,
    SourceInfo,
};
use cropaway_mask_engine::{ops, AlphaMask, Rasterizer};
use image::ImageFormat;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::command::{resolve_tool, STDERR_TAIL_LINES};
use crate::encoder::{shared_negotiator, CodecFamily, EncoderChoice, EncoderNegotiator};
use crate::filter::{mask_graph, rectangle_chain, MaskInput, VideoPlan, GRAPH_OUTPUT};
use crate::geometry::CropGeometry;
use crate::probe::probe_source;
use crate::progress::{self, ExportProgress, ExportStage, ProgressCallback, ProgressState};

/// Prefix of per-job temp directories.
pub const TEMP_PREFIX: &str = "cropaway-export-";

/// Time a terminated transcoder gets before its process group is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// How long output readers may lag behind the transcoder's exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const MASK_STILL: &str = "mask.png";
const MASK_SEQUENCE: &str = "mask_%06d.png";

/// A planned transcoder invocation.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    /// Full argument list, output path last.
    pub args: Vec<String>,

    /// How the video stream is produced.
    pub video: VideoPlan,

    /// Encoder used, `None` for stream copy.
    pub encoder: Option<EncoderChoice>,

    /// Expected output duration, for progress.
    pub duration_secs: Option<f64>,
}

/// Messages from the output reader tasks.
#[derive(Debug)]
enum ReaderEvent {
    /// Position from a completed `-progress` block.
    Structured(f64),

    /// Position scraped from a diagnostic stats line.
    Stats(f64),
}

/// Drives the external transcoder for export jobs.
///
/// One transcoder child runs per pipeline at a time; concurrent calls
/// queue on an internal lock.
pub struct ExportPipeline {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    probe_timeout: Duration,
    software_preset: String,
    temp_root: PathBuf,
    negotiator: Arc<EncoderNegotiator>,
    run_lock: Mutex<()>,
}

impl ExportPipeline {
    pub fn new(defaults: &ExportDefaults) -> Self {
        let ffmpeg = defaults
            .ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let ffprobe = defaults
            .ffprobe_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffprobe"));

        let probe_timeout = Duration::from_secs(defaults.probe_timeout_secs.max(1));
        Self {
            negotiator: shared_negotiator(ffmpeg.clone(), probe_timeout),
            ffmpeg,
            ffprobe,
            probe_timeout,
            software_preset: defaults.software_preset.clone(),
            temp_root: defaults.resolved_temp_root(),
            run_lock: Mutex::new(()),
        }
    }

    /// Use a specific negotiator instead of the process-wide one.
    pub fn with_negotiator(mut self, negotiator: Arc<EncoderNegotiator>) -> Self {
        self.negotiator = negotiator;
        self
    }

    pub fn negotiator(&self) -> &Arc<EncoderNegotiator> {
        &self.negotiator
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Probe a source file with the configured prober.
    pub async fn probe(&self, path: &Path) -> CropawayResult<SourceInfo> {
        let ffprobe = resolve_tool(&self.ffprobe)?;
        probe_source(&ffprobe, path, self.probe_timeout).await
    }

    /// Export `job`, updating its status and progress as it runs.
    ///
    /// On success the job is `Completed` with progress 1.0 and the output
    /// path is returned. Cancellation leaves it `Cancelled`, any other
    /// error `Failed`. A partial output file is left in place on failure.
    pub async fn export(
        &self,
        job: &mut ExportJob,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> CropawayResult<PathBuf> {
        tracing::info!(
            source = %job.source_path.display(),
            output = %job.output_path.display(),
            crop_mode = ?job.region.mode(),
            export_mode = ?job.mode,
            "Starting export"
        );
        let started = Instant::now();

        let result = self.run_job(job, progress.as_ref(), &cancel).await;
        job.status = match &result {
            Ok(_) => JobStatus::Completed,
            Err(CropawayError::Cancelled) => JobStatus::Cancelled,
            Err(_) => JobStatus::Failed,
        };

        match &result {
            Ok(path) => tracing::info!(
                output = %path.display(),
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Export finished"
            ),
            Err(CropawayError::Cancelled) => tracing::info!("Export cancelled"),
            Err(err) => tracing::warn!(error = %err, "Export failed"),
        }
        result
    }

    async fn run_job(
        &self,
        job: &mut ExportJob,
        progress: Option<&ProgressCallback>,
        cancel: &CancellationToken,
    ) -> CropawayResult<PathBuf> {
        if job.output_path.as_os_str().is_empty() {
            return Err(CropawayError::configuration("Output path is empty"));
        }
        let ffmpeg = resolve_tool(&self.ffmpeg)?;
        if !job.source_path.exists() {
            return Err(CropawayError::resource(format!(
                "Source file not found: {}",
                job.source_path.display()
            )));
        }
        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        job.status = JobStatus::Processing;
        job.set_progress(0.0);
        report(
            progress,
            ExportProgress {
                progress: 0.0,
                stage: ExportStage::Preparing,
                eta_secs: None,
            },
        );

        let source = match &job.source {
            Some(source) => source.clone(),
            None => {
                let source = self.probe(&job.source_path).await?;
                job.source = Some(source.clone());
                source
            }
        };

        let _running = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CropawayError::Cancelled),
            guard = self.run_lock.lock() => guard,
        };

        tokio::fs::create_dir_all(&self.temp_root).await?;
        let workdir = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.temp_root)?;

        let outcome = self
            .render(job, &source, &ffmpeg, workdir.path(), progress, cancel)
            .await;

        if let Err(err) = workdir.close() {
            tracing::warn!(error = %err, "Failed to remove export temp directory");
        }
        outcome?;

        job.set_progress(1.0);
        Ok(job.output_path.clone())
    }

    async fn render(
        &self,
        job: &mut ExportJob,
        source: &SourceInfo,
        ffmpeg: &Path,
        workdir: &Path,
        progress: Option<&ProgressCallback>,
        cancel: &CancellationToken,
    ) -> CropawayResult<()> {
        report(
            progress,
            ExportProgress {
                progress: 0.0,
                stage: ExportStage::Rendering,
                eta_secs: None,
            },
        );

        let plan = self.build_plan(job, source, workdir, cancel).await?;
        tracing::info!(
            stream_copy = !plan.video.requires_encode(),
            encoder = plan.encoder.as_ref().map(|c| c.encoder.as_str()).unwrap_or("copy"),
            args_len = plan.args.len(),
            "Export plan built"
        );
        tracing::debug!(args = ?plan.args, "Transcoder arguments");

        let mut on_progress = |update: ExportProgress| {
            job.set_progress(update.progress);
            report(progress, update);
        };
        self.run_transcoder(ffmpeg, &plan.args, plan.duration_secs, &mut on_progress, cancel)
            .await
    }

    /// Plan the transcoder invocation for `job`, writing any mask images
    /// into `workdir`.
    pub async fn build_plan(
        &self,
        job: &ExportJob,
        source: &SourceInfo,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> CropawayResult<ExportPlan> {
        let (video, output_height) = match job.mode {
            ExportMode::Static => self.plan_static(job, source, workdir).await?,
            ExportMode::Keyframed => self.plan_keyframed(job, source, workdir, cancel).await?,
        };

        let encoder = if video.requires_encode() {
            let family = codec::output_family(source, &job.policy);
            let negotiated = self.negotiate(family, cancel).await?;
            Some(codec::encoder_for_source(negotiated, source))
        } else {
            None
        };

        if job.policy.alpha_channel && video.requires_encode() && !alpha_container(&job.output_path) {
            tracing::warn!(
                output = %job.output_path.display(),
                "Alpha output is ProRes 4444; use a .mov container"
            );
        }

        let mut args = strings(&["-hide_banner", "-nostdin", "-i"]);
        args.push(job.source_path.display().to_string());

        match &video {
            VideoPlan::StreamCopy => {
                args.extend(strings(&["-map", "0:v:0", "-map", "0:a?", "-c:v", "copy"]));
            }
            VideoPlan::Simple { filter } => {
                args.extend(strings(&["-map", "0:v:0", "-map", "0:a?", "-vf"]));
                args.push(filter.clone());
            }
            VideoPlan::Masked { graph, mask } => {
                args.extend(mask.input_args());
                args.push("-filter_complex".to_string());
                args.push(graph.clone());
                args.extend(strings(&["-map", GRAPH_OUTPUT, "-map", "0:a?"]));
            }
        }

        if let Some(choice) = &encoder {
            args.extend(codec::video_codec_args(
                choice,
                source,
                &job.policy,
                output_height,
                &self.software_preset,
            ));
        }

        args.extend(strings(&[
            "-c:a",
            "copy",
            "-map_metadata",
            "0",
            "-progress",
            "pipe:1",
            "-y",
        ]));
        args.push(job.output_path.display().to_string());

        Ok(ExportPlan {
            args,
            video,
            encoder,
            duration_secs: source.duration_secs,
        })
    }

    /// Geometry evaluated once, at t = 0.
    async fn plan_static(
        &self,
        job: &ExportJob,
        source: &SourceInfo,
        workdir: &Path,
    ) -> CropawayResult<(VideoPlan, u32)> {
        let region = job.region.region_at(0.0);

        if let CropRegion::Rectangle { rect } = &region {
            let geometry = CropGeometry::from_normalized(rect, source.width, source.height);
            return Ok(match rectangle_chain(&geometry, &job.policy) {
                None => (VideoPlan::StreamCopy, geometry.frame_height),
                Some(filter) => {
                    let height = if job.policy.preserve_dimensions {
                        geometry.frame_height
                    } else {
                        geometry.crop.height
                    };
                    (VideoPlan::Simple { filter }, height)
                }
            });
        }

        let (width, height) = (source.width, source.height);
        let mask_path = workdir.join(MASK_STILL);
        let target = mask_path.clone();
        let bbox = tokio::task::spawn_blocking(move || -> CropawayResult<NormalizedRect> {
            let rasterizer = Rasterizer::new().with_source_size(width, height);
            let mask = rasterizer.rasterize(&region, width, height);
            save_mask(&mask, &target)?;
            Ok(ops::bounding_box(&mask))
        })
        .await
        .map_err(|e| CropawayError::export(format!("Mask rasterization task failed: {e}")))??;

        Ok(masked_plan(source, &job.policy, &bbox, MaskInput::Still(mask_path)))
    }

    /// One mask per output frame, sampled from the track at the source
    /// frame rate.
    async fn plan_keyframed(
        &self,
        job: &ExportJob,
        source: &SourceInfo,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> CropawayResult<(VideoPlan, u32)> {
        let clock = FrameClock::new(source.frame_rate.unwrap_or(FrameClock::DEFAULT_FPS));
        let track_end = match &job.region {
            JobRegion::Track { track, .. } => track.time_range().map(|(_, end)| end),
            JobRegion::Static { .. } => None,
        };
        let duration = source.duration_secs.or(track_end).unwrap_or(0.0);
        let frames = clock.frame_count(duration).max(1);

        let region = job.region.clone();
        let (width, height) = (source.width, source.height);
        let dir = workdir.to_path_buf();
        let cancel = cancel.clone();
        let bbox = tokio::task::spawn_blocking(move || -> CropawayResult<NormalizedRect> {
            let rasterizer = Rasterizer::new().with_source_size(width, height);
            let mut union: Option<NormalizedRect> = None;
            for frame in 0..frames {
                if cancel.is_cancelled() {
                    return Err(CropawayError::Cancelled);
                }
                let current = region.region_at(clock.frame_to_secs(frame));
                let mask = rasterizer.rasterize(&current, width, height);
                save_mask(&mask, &dir.join(format!("mask_{frame:06}.png")))?;
                let bbox = ops::bounding_box(&mask);
                union = Some(match union {
                    Some(acc) => acc.union(&bbox),
                    None => bbox,
                });
                rasterizer.recycle(mask);
            }
            Ok(union.unwrap_or(NormalizedRect::FULL))
        })
        .await
        .map_err(|e| CropawayError::export(format!("Mask rasterization task failed: {e}")))??;

        tracing::debug!(frames, fps = clock.fps(), "Rasterized per-frame masks");

        let mask = MaskInput::Sequence {
            pattern: workdir.join(MASK_SEQUENCE),
            fps: clock.fps(),
        };
        Ok(masked_plan(source, &job.policy, &bbox, mask))
    }

    /// Negotiate an encoder, giving up as soon as `cancel` fires. An
    /// abandoned first-use probe leaves the family uncached.
    async fn negotiate(&self, family: CodecFamily, cancel: &CancellationToken) -> CropawayResult<EncoderChoice> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CropawayError::Cancelled),
            choice = self.negotiator.negotiate(family) => Ok(choice),
        }
    }

    /// Re-encode `source` as a same-resolution H.264 proxy at
    /// `bitrate_kbps`, without audio. A partial proxy is removed on failure.
    pub async fn encode_proxy(
        &self,
        source: &Path,
        output: &Path,
        bitrate_kbps: u32,
        cancel: CancellationToken,
    ) -> CropawayResult<PathBuf> {
        let ffmpeg = resolve_tool(&self.ffmpeg)?;
        if !source.exists() {
            return Err(CropawayError::resource(format!(
                "Source file not found: {}",
                source.display()
            )));
        }

        let choice = self.negotiate(CodecFamily::H264, &cancel).await?;
        let args = proxy_args(source, output, &choice, bitrate_kbps);
        tracing::info!(
            source = %source.display(),
            encoder = %choice.encoder,
            bitrate_kbps,
            "Encoding upload proxy"
        );

        let _running = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CropawayError::Cancelled),
            guard = self.run_lock.lock() => guard,
        };

        let mut ignore = |_: ExportProgress| {};
        let result = self
            .run_transcoder(&ffmpeg, &args, None, &mut ignore, &cancel)
            .await;
        if result.is_err() && output.exists() {
            if let Err(err) = tokio::fs::remove_file(output).await {
                tracing::warn!(error = %err, path = %output.display(), "Failed to remove partial proxy");
            }
        }
        result.map(|()| output.to_path_buf())
    }

    /// Run the transcoder to completion.
    ///
    /// Both output streams are drained by reader tasks; the structured
    /// progress channel wins over the stats fallback once it has spoken.
    async fn run_transcoder(
        &self,
        ffmpeg: &Path,
        args: &[String],
        duration_secs: Option<f64>,
        on_progress: &mut (dyn FnMut(ExportProgress) + Send),
        cancel: &CancellationToken,
    ) -> CropawayResult<()> {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| CropawayError::resource(format!("Failed to start transcoder: {e}")))?;
        tracing::info!(pid = child.id(), args_len = args.len(), "Transcoder started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CropawayError::export("Failed to capture transcoder stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CropawayError::export("Failed to capture transcoder stderr"))?;

        let (tx, mut rx) = mpsc::channel(64);
        let stdout_task = tokio::spawn(read_structured(stdout, tx.clone()));
        let stderr_task = tokio::spawn(read_diagnostics(stderr, tx));

        let mut structured = false;
        let mut handle = |event: ReaderEvent| {
            let position = match event {
                ReaderEvent::Structured(secs) => {
                    structured = true;
                    secs
                }
                ReaderEvent::Stats(secs) if !structured => secs,
                ReaderEvent::Stats(_) => return,
            };
            let fraction = progress::fraction(position, duration_secs);
            on_progress(ExportProgress {
                progress: fraction,
                stage: ExportStage::Encoding,
                eta_secs: progress::eta(fraction, started.elapsed().as_secs_f64()),
            });
        };

        let status = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(pid = child.id(), "Terminating transcoder");
                    terminate(&mut child).await;
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(CropawayError::Cancelled);
                }
                status = child.wait() => break status?,
                Some(event) = rx.recv() => handle(event),
            }
        };

        // Deliver what the readers still hold, unless a stray descendant
        // keeps the pipes open.
        let drain = async {
            while let Some(event) = rx.recv().await {
                handle(event);
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("Transcoder output still open after exit");
        }
        drop(rx);
        let _ = stdout_task.await;
        let diagnostics = stderr_task.await.unwrap_or_default();

        if !status.success() {
            tracing::warn!(code = ?status.code(), "Transcoder exited with failure");
            return Err(CropawayError::transcoder(status.code(), diagnostics));
        }

        on_progress(ExportProgress {
            progress: 1.0,
            stage: ExportStage::Complete,
            eta_secs: Some(0.0),
        });
        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Transcoder finished"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("ffmpeg", &self.ffmpeg)
            .field("ffprobe", &self.ffprobe)
            .field("temp_root", &self.temp_root)
            .finish_non_exhaustive()
    }
}

/// Video plan around a mask; crops to `bbox` unless dimensions are kept.
fn masked_plan(
    source: &SourceInfo,
    policy: &OutputPolicy,
    bbox: &NormalizedRect,
    mask: MaskInput,
) -> (VideoPlan, u32) {
    let frame = CropGeometry::from_normalized(&NormalizedRect::FULL, source.width, source.height);
    let frame_crop = ((frame.frame_width, frame.frame_height) != (source.width, source.height))
        .then_some((source.width, source.height));

    if policy.preserve_dimensions {
        let graph = mask_graph(policy.alpha_channel, None, frame_crop);
        return (VideoPlan::Masked { graph, mask }, frame.frame_height);
    }

    let geometry = CropGeometry::from_normalized(bbox, source.width, source.height);
    let graph = mask_graph(policy.alpha_channel, Some(&geometry), frame_crop);
    (VideoPlan::Masked { graph, mask }, geometry.crop.height)
}

fn proxy_args(source: &Path, output: &Path, choice: &EncoderChoice, bitrate_kbps: u32) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-nostdin", "-i"]);
    args.push(source.display().to_string());
    args.extend(strings(&["-map", "0:v:0", "-c:v"]));
    args.push(choice.encoder.clone());
    args.push("-b:v".to_string());
    args.push(format!("{}k", bitrate_kbps.max(100)));
    args.extend(strings(&["-pix_fmt", "yuv420p", "-an", "-progress", "pipe:1", "-y"]));
    args.push(output.display().to_string());
    args
}

fn save_mask(mask: &AlphaMask, path: &Path) -> CropawayResult<()> {
    mask.save_with_format(path, ImageFormat::Png).map_err(|e| {
        CropawayError::export(format!("Failed to write mask {}: {e}", path.display()))
    })
}

fn alpha_container(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mov") || ext.eq_ignore_ascii_case("mkv"))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn report(progress: Option<&ProgressCallback>, update: ExportProgress) {
    if let Some(cb) = progress {
        cb(update);
    }
}

async fn read_structured<R: AsyncRead + Unpin>(stream: R, tx: mpsc::Sender<ReaderEvent>) {
    let mut lines = BufReader::new(stream).lines();
    let mut state = ProgressState::default();
    while let Ok(Some(line)) = lines.next_line().await {
        if state.feed_line(&line) {
            let _ = tx.send(ReaderEvent::Structured(state.out_time_secs)).await;
        }
    }
}

/// Drain the diagnostic stream, returning its last lines. Stats lines end
/// in a bare carriage return, so both terminators split lines.
async fn read_diagnostics<R: AsyncRead + Unpin>(stream: R, tx: mpsc::Sender<ReaderEvent>) -> String {
    let mut reader = BufReader::new(stream);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for &byte in &chunk[..read] {
            if byte != b'\n' && byte != b'\r' {
                pending.push(byte);
                continue;
            }
            if let Some(secs) = take_line(&mut pending, &mut tail) {
                let _ = tx.send(ReaderEvent::Stats(secs)).await;
            }
        }
    }
    if let Some(secs) = take_line(&mut pending, &mut tail) {
        let _ = tx.send(ReaderEvent::Stats(secs)).await;
    }

    Vec::from(tail).join("\n")
}

fn take_line(pending: &mut Vec<u8>, tail: &mut VecDeque<String>) -> Option<f64> {
    let line = String::from_utf8_lossy(pending).trim().to_string();
    pending.clear();
    if line.is_empty() {
        return None;
    }
    let position = progress::parse_stats_time(&line);
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
    position
}

/// Stop the child and everything it spawned: SIGTERM to its process
/// group, then SIGKILL if it outlives the grace period.
#[cfg(unix)]
async fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let group = -(pid as libc::pid_t);

    // SAFETY: kill(2) only signals; the child leads its own group.
    unsafe {
        libc::kill(group, libc::SIGTERM);
    }
    if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
        return;
    }

    tracing::warn!(pid, "Transcoder ignored SIGTERM, killing process group");
    // SAFETY: as above.
    unsafe {
        libc::kill(group, libc::SIGKILL);
    }
    let _ = child.wait().await;
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) {
    if let Err(err) = child.kill().await {
        tracing::warn!(error = %err, "Failed to kill transcoder");
    }
}
