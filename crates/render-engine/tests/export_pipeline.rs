//! End-to-end export runs against a scripted stand-in for the transcoder.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cropaway_common::config::ExportDefaults;
use cropaway_common::error::CropawayError;
use cropaway_crop_model::{
    CropRegion, ExportJob, JobRegion, JobStatus, NormalizedPoint, NormalizedRect, SourceInfo,
};
use cropaway_render_engine::{
    CodecFamily, EncoderNegotiator, EncoderProbe, ExportPipeline, ExportProgress, ExportStage,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct NoHardware;

#[async_trait]
impl EncoderProbe for NoHardware {
    async fn probe(&self, _family: CodecFamily, _encoder: &str) -> bool {
        false
    }
}

struct Harness {
    _fixtures: TempDir,
    temp_root: TempDir,
    source: PathBuf,
    output: PathBuf,
    pipeline: ExportPipeline,
}

impl Harness {
    fn new(script_body: &str) -> Self {
        let fixtures = tempfile::tempdir().unwrap();
        let temp_root = tempfile::tempdir().unwrap();

        let script = fixtures.path().join("fake-ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let source = fixtures.path().join("in.mp4");
        std::fs::write(&source, b"not really video").unwrap();
        let output = fixtures.path().join("out").join("cropped.mp4");

        let defaults = ExportDefaults {
            ffmpeg_path: Some(script),
            temp_root: Some(temp_root.path().to_path_buf()),
            ..ExportDefaults::default()
        };
        let pipeline = ExportPipeline::new(&defaults)
            .with_negotiator(Arc::new(EncoderNegotiator::new(Arc::new(NoHardware))));

        Self {
            _fixtures: fixtures,
            temp_root,
            source,
            output,
            pipeline,
        }
    }

    fn job(&self, region: CropRegion) -> ExportJob {
        let mut source = SourceInfo::with_dimensions(64, 48);
        source.duration_secs = Some(10.0);
        source.frame_rate = Some(25.0);
        ExportJob::new(&self.source, &self.output, JobRegion::Static { region }).with_source(source)
    }

    fn residual_temp_entries(&self) -> usize {
        std::fs::read_dir(self.temp_root.path()).unwrap().count()
    }
}

fn recorder() -> (Arc<Mutex<Vec<ExportProgress>>>, Box<dyn Fn(ExportProgress) + Send + Sync>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, Box::new(move |p| sink.lock().unwrap().push(p)))
}

fn circle() -> CropRegion {
    CropRegion::Circle {
        center: NormalizedPoint::CENTER,
        radius: 0.3,
    }
}

const SUCCEEDS: &str = r#"
for last; do :; done
echo "frame=1"
echo "out_time_us=5000000"
echo "progress=continue"
printf 'frame=  2 fps=0.0 time=00:00:06.00 bitrate=1.0kbits/s\r' >&2
: > "$last"
echo "out_time_us=10000000"
echo "progress=end"
exit 0
"#;

#[tokio::test]
async fn test_successful_export_reports_progress_and_completes() {
    let harness = Harness::new(SUCCEEDS);
    let mut job = harness.job(CropRegion::rectangle(NormalizedRect::new(0.25, 0.25, 0.5, 0.5)));
    let (seen, callback) = recorder();

    let output = harness
        .pipeline
        .export(&mut job, Some(callback), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output, harness.output);
    assert!(output.exists());
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 1.0);

    let seen = seen.lock().unwrap();
    let last = seen.last().copied().unwrap();
    assert_eq!(last.stage, ExportStage::Complete);
    assert_eq!(last.progress, 1.0);
    assert!(seen[..seen.len() - 1].iter().all(|p| p.progress <= 0.99));
    assert!(seen
        .iter()
        .any(|p| p.stage == ExportStage::Encoding && (p.progress - 0.5).abs() < 1e-9));

    assert_eq!(harness.residual_temp_entries(), 0);
}

#[tokio::test]
async fn test_arguments_reach_the_transcoder() {
    let fixtures = tempfile::tempdir().unwrap();
    let args_file = fixtures.path().join("args.txt");
    let body = format!(
        "printf '%s\\n' \"$@\" > '{}'\necho progress=end\nexit 0",
        args_file.display()
    );
    let harness = Harness::new(&body);
    let mut job = harness.job(circle());

    harness
        .pipeline
        .export(&mut job, None, CancellationToken::new())
        .await
        .unwrap();

    let args = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert!(args.contains(&"-filter_complex"));
    assert!(args.windows(2).any(|w| w == ["-c:a", "copy"]));
    assert!(args.windows(2).any(|w| w == ["-map_metadata", "0"]));
    assert!(args.windows(2).any(|w| w == ["-progress", "pipe:1"]));
    assert!(args.iter().any(|a| a.ends_with("mask.png")));
    assert_eq!(args.last().copied(), Some(harness.output.to_str().unwrap()));

    // The mask lived in the job's temp directory, which is gone now.
    assert_eq!(harness.residual_temp_entries(), 0);
}

#[tokio::test]
async fn test_failure_surfaces_exit_code_and_diagnostics() {
    let harness = Harness::new("echo 'Invalid argument' >&2\necho 'Conversion failed!' >&2\nexit 2");
    let mut job = harness.job(circle());

    let err = harness
        .pipeline
        .export(&mut job, None, CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        CropawayError::Transcoder {
            exit_code,
            stderr_tail,
        } => {
            assert_eq!(exit_code, Some(2));
            assert_eq!(stderr_tail, "Invalid argument\nConversion failed!");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.residual_temp_entries(), 0);
}

#[tokio::test]
async fn test_cancel_kills_transcoder_and_removes_temp_files() {
    let harness = Harness::new(
        "echo out_time_us=1000000\necho progress=continue\nsleep 30\necho progress=end",
    );
    let mut job = harness.job(circle());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let callback: Box<dyn Fn(ExportProgress) + Send + Sync> = Box::new(move |p| {
        if p.stage == ExportStage::Encoding {
            trigger.cancel();
        }
    });

    let started = Instant::now();
    let result = harness.pipeline.export(&mut job, Some(callback), cancel).await;

    assert!(matches!(result, Err(CropawayError::Cancelled)));
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(harness.residual_temp_entries(), 0);
}

#[tokio::test]
async fn test_preconditions() {
    let harness = Harness::new(SUCCEEDS);

    let mut job = harness.job(circle());
    job.output_path = PathBuf::new();
    let err = harness
        .pipeline
        .export(&mut job, None, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CropawayError::Configuration { .. }));
    assert_eq!(job.status, JobStatus::Failed);

    let mut job = harness.job(circle());
    job.source_path = harness.source.with_file_name("missing.mp4");
    let err = harness
        .pipeline
        .export(&mut job, None, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CropawayError::Resource { .. }));

    let defaults = ExportDefaults {
        ffmpeg_path: Some(Path::new("/nonexistent/bin/ffmpeg").to_path_buf()),
        ..ExportDefaults::default()
    };
    let pipeline = ExportPipeline::new(&defaults);
    let mut job = harness.job(circle());
    let err = pipeline
        .export(&mut job, None, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CropawayError::Resource { .. }));
}

#[tokio::test]
async fn test_proxy_failure_removes_partial_output() {
    let harness = Harness::new("for last; do :; done\necho partial > \"$last\"\nexit 1");
    let proxy = harness.temp_root.path().join("proxy.mp4");

    let err = harness
        .pipeline
        .encode_proxy(&harness.source, &proxy, 4000, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CropawayError::Transcoder { exit_code: Some(1), .. }));
    assert!(!proxy.exists());
}
