//! Hardware/software encoder negotiation.
//!
//! Each codec family has an ordered candidate list: platform hardware
//! encoders first, then a software encoder that is always assumed to be
//! present. Hardware candidates are verified with a tiny synthetic encode;
//! the first that works is cached for the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};

/// Video codec families the exporter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecFamily {
    H264,
    Hevc,
    ProRes,
    Vp9,
    Av1,
}

impl CodecFamily {
    pub fn all() -> &'static [CodecFamily] {
        &[
            CodecFamily::H264,
            CodecFamily::Hevc,
            CodecFamily::ProRes,
            CodecFamily::Vp9,
            CodecFamily::Av1,
        ]
    }

    /// Family of a decoder/codec name as reported by ffprobe.
    pub fn from_codec_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "avc1" => Some(CodecFamily::H264),
            "hevc" | "h265" | "hvc1" => Some(CodecFamily::Hevc),
            "prores" => Some(CodecFamily::ProRes),
            "vp9" => Some(CodecFamily::Vp9),
            "av1" => Some(CodecFamily::Av1),
            _ => None,
        }
    }

    /// Hardware encoder identifiers in priority order for this platform.
    pub fn hardware_candidates(self) -> &'static [&'static str] {
        if cfg!(target_os = "macos") {
            match self {
                CodecFamily::H264 => &["h264_videotoolbox"],
                CodecFamily::Hevc => &["hevc_videotoolbox"],
                CodecFamily::ProRes => &["prores_videotoolbox"],
                CodecFamily::Vp9 | CodecFamily::Av1 => &[],
            }
        } else {
            match self {
                CodecFamily::H264 => &["h264_nvenc", "h264_qsv", "h264_amf"],
                CodecFamily::Hevc => &["hevc_nvenc", "hevc_qsv", "hevc_amf"],
                CodecFamily::ProRes => &[],
                CodecFamily::Vp9 => &["vp9_qsv"],
                CodecFamily::Av1 => &["av1_nvenc", "av1_qsv", "av1_amf"],
            }
        }
    }

    /// Software fallback, assumed available without probing.
    pub fn software_encoder(self) -> &'static str {
        match self {
            CodecFamily::H264 => "libx264",
            CodecFamily::Hevc => "libx265",
            CodecFamily::ProRes => "prores_ks",
            CodecFamily::Vp9 => "libvpx-vp9",
            CodecFamily::Av1 => "libsvtav1",
        }
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodecFamily::H264 => "H.264",
            CodecFamily::Hevc => "HEVC",
            CodecFamily::ProRes => "ProRes",
            CodecFamily::Vp9 => "VP9",
            CodecFamily::Av1 => "AV1",
        };
        f.write_str(name)
    }
}

/// A resolved encoder for a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderChoice {
    pub family: CodecFamily,
    pub encoder: String,
    pub hardware: bool,
}

impl EncoderChoice {
    pub fn software(family: CodecFamily) -> Self {
        Self {
            family,
            encoder: family.software_encoder().to_string(),
            hardware: false,
        }
    }
}

/// Checks whether an encoder actually works on this machine.
#[async_trait]
pub trait EncoderProbe: Send + Sync {
    async fn probe(&self, family: CodecFamily, encoder: &str) -> bool;
}

/// Probe by encoding a fraction of a second of synthetic video.
#[derive(Debug, Clone)]
pub struct FfmpegProbe {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegProbe {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EncoderProbe for FfmpegProbe {
    async fn probe(&self, family: CodecFamily, encoder: &str) -> bool {
        let pix_fmt = match family {
            CodecFamily::ProRes => "yuv422p10le",
            _ => "yuv420p",
        };

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args([
            "-hide_banner",
            "-nostdin",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=256x256:r=30:d=0.2",
            "-frames:v",
            "5",
            "-c:v",
            encoder,
            "-pix_fmt",
            pix_fmt,
            "-f",
            "null",
            "-",
        ])
        .timeout(self.timeout);

        match cmd.execute().await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(encoder, error = %err, "Encoder probe failed");
                false
            }
        }
    }
}

/// Resolves and caches one encoder per codec family.
pub struct EncoderNegotiator {
    probe: Arc<dyn EncoderProbe>,
    cache: Mutex<HashMap<CodecFamily, EncoderChoice>>,
}

impl EncoderNegotiator {
    pub fn new(probe: Arc<dyn EncoderProbe>) -> Self {
        Self {
            probe,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The encoder for `family`, probing hardware candidates on first use.
    ///
    /// The cache lock is held while probing so that concurrent first
    /// callers wait for a single probe run.
    pub async fn negotiate(&self, family: CodecFamily) -> EncoderChoice {
        let mut cache = self.cache.lock().await;
        if let Some(choice) = cache.get(&family) {
            return choice.clone();
        }

        let mut choice = EncoderChoice::software(family);
        for candidate in family.hardware_candidates() {
            if self.probe.probe(family, candidate).await {
                choice = EncoderChoice {
                    family,
                    encoder: (*candidate).to_string(),
                    hardware: true,
                };
                break;
            }
        }

        tracing::info!(
            family = %family,
            encoder = %choice.encoder,
            hardware = choice.hardware,
            "Encoder negotiated"
        );
        cache.insert(family, choice.clone());
        choice
    }

    /// Families resolved so far.
    pub async fn cached(&self) -> Vec<EncoderChoice> {
        let cache = self.cache.lock().await;
        let mut choices: Vec<EncoderChoice> = cache.values().cloned().collect();
        choices.sort_by_key(|c| c.family as u8);
        choices
    }
}

impl fmt::Debug for EncoderNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderNegotiator").finish_non_exhaustive()
    }
}

static SHARED: OnceLock<Arc<EncoderNegotiator>> = OnceLock::new();

/// The process-wide negotiator. The first caller's transcoder path and
/// probe timeout win.
pub fn shared_negotiator(ffmpeg_path: impl Into<PathBuf>, probe_timeout: Duration) -> Arc<EncoderNegotiator> {
    SHARED
        .get_or_init(|| {
            let probe = FfmpegProbe::new(ffmpeg_path).with_timeout(probe_timeout);
            Arc::new(EncoderNegotiator::new(Arc::new(probe)))
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts only the listed encoders, counting calls.
    struct FakeProbe {
        accept: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EncoderProbe for FakeProbe {
        async fn probe(&self, _family: CodecFamily, encoder: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.accept.contains(&encoder)
        }
    }

    fn negotiator(accept: Vec<&'static str>) -> (Arc<FakeProbe>, EncoderNegotiator) {
        let probe = Arc::new(FakeProbe {
            accept,
            calls: AtomicUsize::new(0),
        });
        let negotiator = EncoderNegotiator::new(probe.clone());
        (probe, negotiator)
    }

    #[tokio::test]
    async fn test_falls_back_to_software() {
        let (_, negotiator) = negotiator(vec![]);
        let choice = negotiator.negotiate(CodecFamily::H264).await;
        assert_eq!(choice, EncoderChoice::software(CodecFamily::H264));
        assert!(!choice.hardware);
    }

    #[tokio::test]
    async fn test_first_working_hardware_candidate_wins() {
        let candidates = CodecFamily::Hevc.hardware_candidates();
        let Some(&last) = candidates.last() else {
            return;
        };
        let (_, negotiator) = negotiator(vec![last]);
        let choice = negotiator.negotiate(CodecFamily::Hevc).await;
        assert_eq!(choice.encoder, last);
        assert!(choice.hardware);
    }

    #[tokio::test]
    async fn test_family_is_probed_once() {
        let (probe, negotiator) = negotiator(vec![]);
        let negotiator = Arc::new(negotiator);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let negotiator = negotiator.clone();
            handles.push(tokio::spawn(async move {
                negotiator.negotiate(CodecFamily::H264).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        negotiator.negotiate(CodecFamily::H264).await;

        assert_eq!(
            probe.calls.load(Ordering::SeqCst),
            CodecFamily::H264.hardware_candidates().len()
        );
    }

    #[tokio::test]
    async fn test_cached_lists_resolved_families() {
        let (_, negotiator) = negotiator(vec![]);
        negotiator.negotiate(CodecFamily::Av1).await;
        negotiator.negotiate(CodecFamily::H264).await;
        let families: Vec<CodecFamily> =
            negotiator.cached().await.into_iter().map(|c| c.family).collect();
        assert_eq!(families, vec![CodecFamily::H264, CodecFamily::Av1]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_probe_is_bounded_by_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let probe = FfmpegProbe::new(&script).with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        assert!(!probe.probe(CodecFamily::H264, "h264_nvenc").await);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_family_from_codec_name() {
        assert_eq!(CodecFamily::from_codec_name("h264"), Some(CodecFamily::H264));
        assert_eq!(CodecFamily::from_codec_name("HEVC"), Some(CodecFamily::Hevc));
        assert_eq!(CodecFamily::from_codec_name("mpeg2video"), None);
    }
}
