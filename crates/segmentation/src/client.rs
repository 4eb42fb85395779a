//! Tracking client: upload, submit, poll, normalize.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cropaway_common::config::SegmentationConfig;
use cropaway_common::error::{CropawayError, CropawayResult, RemoteStage};
use cropaway_crop_model::SourceInfo;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::{submit_body, JobPhase, JobUrls, StorageToken, SubmitResponse, TrackingPrompt, UploadResponse};
use crate::media::MediaPreparer;
use crate::result::{normalize_result, TrackingResult};
use crate::state::TrackingState;

/// Prefix of temp directories holding upload proxies.
pub const PROXY_TEMP_PREFIX: &str = "cropaway-proxy-";

/// Attempts at fetching a finished job's result before giving up.
const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Characters of a response body kept in error messages.
const BODY_SNIPPET_CHARS: usize = 300;

/// Outcome of a request that may be retried.
enum Fetched {
    Body(Value),
    Transient(String),
}

/// Client for the remote segmentation service.
///
/// One tracking request runs at a time per client; its progress is
/// published on a watch channel (see [`SegmentationClient::subscribe`]).
pub struct SegmentationClient {
    http: reqwest::Client,
    config: SegmentationConfig,
    preparer: Arc<dyn MediaPreparer>,
    temp_root: PathBuf,
    poll_interval: Duration,
    poll_timeout: Duration,
    state: watch::Sender<TrackingState>,
}

impl SegmentationClient {
    pub fn new(config: SegmentationConfig, preparer: Arc<dyn MediaPreparer>) -> CropawayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| CropawayError::configuration(format!("Failed to build HTTP client: {e}")))?;
        let (state, _) = watch::channel(TrackingState::Idle);

        Ok(Self {
            http,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            config,
            preparer,
            temp_root: std::env::temp_dir(),
            state,
        })
    }

    /// Directory under which upload proxies are written.
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Watch the tracking state.
    pub fn subscribe(&self) -> watch::Receiver<TrackingState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TrackingState {
        self.state.borrow().clone()
    }

    fn set_state(&self, state: TrackingState) {
        tracing::debug!(state = %state, "Tracking state changed");
        self.state.send_replace(state);
    }

    /// Track an object through `source`.
    ///
    /// The credential is checked before any network traffic. Cancellation
    /// is honoured at every await and returns the client to `Idle`.
    pub async fn track(
        &self,
        source: &Path,
        prompt: TrackingPrompt,
        frame_rate: f64,
        cancel: CancellationToken,
    ) -> CropawayResult<TrackingResult> {
        let claimed = self.state.send_if_modified(|state| {
            if state.is_busy() {
                return false;
            }
            *state = TrackingState::Uploading;
            true
        });
        if !claimed {
            return Err(CropawayError::configuration(
                "A tracking request is already running on this client",
            ));
        }

        let result = self.run(source, &prompt, frame_rate, &cancel).await;
        match &result {
            Ok(tracked) => {
                tracing::info!(
                    frames = tracked.frame_count,
                    masks = tracked.masks.len(),
                    "Tracking completed"
                );
                self.set_state(TrackingState::Completed {
                    frame_count: tracked.frame_count,
                });
            }
            Err(CropawayError::Cancelled) => {
                tracing::info!("Tracking cancelled");
                self.set_state(TrackingState::Idle);
            }
            Err(err) => {
                tracing::warn!(error = %err, "Tracking failed");
                self.set_state(TrackingState::Error {
                    message: err.to_string(),
                });
            }
        }
        result
    }

    async fn run(
        &self,
        source: &Path,
        prompt: &TrackingPrompt,
        frame_rate: f64,
        cancel: &CancellationToken,
    ) -> CropawayResult<TrackingResult> {
        let api_key = self.config.resolved_api_key().ok_or_else(|| {
            CropawayError::configuration(
                "No segmentation API key configured (set segmentation.api_key or CROPAWAY_SEGMENTATION_KEY)",
            )
        })?;
        if !source.exists() {
            return Err(CropawayError::resource(format!(
                "Source file not found: {}",
                source.display()
            )));
        }

        let info = cancellable(cancel, self.preparer.probe(source)).await??;
        let source_size = (info.width, info.height);

        let video_url = self.upload(source, &info, &api_key, cancel).await?;
        tracing::info!(video_url = %video_url, "Source uploaded");

        self.set_state(TrackingState::Processing {
            queue_position: None,
        });
        let urls = self
            .submit(&video_url, prompt, source_size, &api_key, cancel)
            .await?;
        tracing::info!(request_id = %urls.request_id, "Tracking job submitted");

        let body = self.poll(&urls, &api_key, cancel).await?;
        normalize_result(&body, source_size, frame_rate)
    }

    /// Upload the source, or a proxy of it when it is over the size
    /// threshold. The proxy is deleted whatever the outcome.
    async fn upload(
        &self,
        source: &Path,
        info: &SourceInfo,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> CropawayResult<String> {
        let size = tokio::fs::metadata(source).await?.len();
        if size <= self.config.proxy_threshold_bytes {
            return self.upload_file(source, api_key, cancel).await;
        }

        tracing::info!(
            size_bytes = size,
            threshold_bytes = self.config.proxy_threshold_bytes,
            width = info.width,
            height = info.height,
            "Source over upload threshold, encoding proxy"
        );
        tokio::fs::create_dir_all(&self.temp_root).await?;
        let workdir = tempfile::Builder::new()
            .prefix(PROXY_TEMP_PREFIX)
            .tempdir_in(&self.temp_root)?;
        let proxy = workdir.path().join("proxy.mp4");

        let result = async {
            self.preparer
                .encode_proxy(source, &proxy, self.config.proxy_bitrate_kbps, cancel.clone())
                .await?;
            self.upload_file(&proxy, api_key, cancel).await
        }
        .await;

        if let Err(err) = workdir.close() {
            tracing::warn!(error = %err, "Failed to remove upload proxy");
        }
        result
    }

    async fn upload_file(&self, path: &Path, api_key: &str, cancel: &CancellationToken) -> CropawayResult<String> {
        let bytes = tokio::fs::read(path).await?;

        let token: StorageToken = self
            .send_json(
                self.http
                    .post(&self.config.storage_token_url)
                    .header(AUTHORIZATION, format!("Key {api_key}"))
                    .json(&json!({})),
                RemoteStage::Upload,
                cancel,
            )
            .await?;
        if token.is_expired(Utc::now()) {
            tracing::warn!(expires_at = ?token.expires_at, "Storage token already expired");
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "source.mp4".to_string());
        tracing::debug!(bytes = bytes.len(), file = %file_name, "Uploading");

        let uploaded: UploadResponse = self
            .send_json(
                self.http
                    .post(token.upload_url())
                    .header(AUTHORIZATION, token.authorization())
                    .header(CONTENT_TYPE, content_type(path))
                    .header("X-Fal-File-Name", file_name)
                    .body(bytes),
                RemoteStage::Upload,
                cancel,
            )
            .await?;
        Ok(uploaded.access_url)
    }

    async fn submit(
        &self,
        video_url: &str,
        prompt: &TrackingPrompt,
        source_size: (u32, u32),
        api_key: &str,
        cancel: &CancellationToken,
    ) -> CropawayResult<JobUrls> {
        let url = format!(
            "{}/{}",
            self.config.queue_base_url.trim_end_matches('/'),
            self.config.model_path.trim_matches('/')
        );
        let submitted: SubmitResponse = self
            .send_json(
                self.http
                    .post(url)
                    .header(AUTHORIZATION, format!("Key {api_key}"))
                    .json(&submit_body(video_url, prompt, source_size)),
                RemoteStage::Submit,
                cancel,
            )
            .await?;
        Ok(JobUrls::resolve(
            submitted,
            &self.config.queue_base_url,
            &self.config.model_path,
        ))
    }

    /// Poll until the job completes, fails, or the ceiling is reached.
    async fn poll(&self, urls: &JobUrls, api_key: &str, cancel: &CancellationToken) -> CropawayResult<Value> {
        let deadline = Instant::now() + self.poll_timeout;

        loop {
            match self.get(&urls.status_url, api_key, RemoteStage::Process, cancel).await? {
                Fetched::Transient(reason) => {
                    tracing::warn!(reason = %reason, "Status poll failed, retrying");
                }
                Fetched::Body(body) => match JobPhase::from_status(&body) {
                    JobPhase::Queued { position } => {
                        self.set_state(TrackingState::Processing {
                            queue_position: position,
                        });
                    }
                    JobPhase::Running => {
                        self.set_state(TrackingState::Processing {
                            queue_position: None,
                        });
                    }
                    JobPhase::Completed => return self.download(urls, api_key, cancel).await,
                    JobPhase::ImplicitlyCompleted => return Ok(body),
                    JobPhase::Failed(message) => {
                        return Err(CropawayError::remote(RemoteStage::Process, message));
                    }
                    JobPhase::Unknown(status) => {
                        tracing::debug!(status = %status, "Unrecognized job status");
                    }
                },
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(CropawayError::timeout(format!(
                    "Tracking job {} did not finish within {:?}",
                    urls.request_id, self.poll_timeout
                )));
            }
            cancellable(cancel, tokio::time::sleep(self.poll_interval)).await?;
        }
    }

    async fn download(&self, urls: &JobUrls, api_key: &str, cancel: &CancellationToken) -> CropawayResult<Value> {
        let mut last_failure = String::new();
        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            match self.get(&urls.response_url, api_key, RemoteStage::Download, cancel).await? {
                Fetched::Body(body) => return Ok(body),
                Fetched::Transient(reason) => {
                    tracing::warn!(attempt, reason = %reason, "Result download failed");
                    last_failure = reason;
                }
            }
            if attempt < DOWNLOAD_ATTEMPTS {
                cancellable(cancel, tokio::time::sleep(self.poll_interval)).await?;
            }
        }
        Err(CropawayError::remote(RemoteStage::Download, last_failure))
    }

    /// GET a JSON body. Network errors, 429 and 5xx are transient; other
    /// failures are final.
    async fn get(
        &self,
        url: &str,
        api_key: &str,
        stage: RemoteStage,
        cancel: &CancellationToken,
    ) -> CropawayResult<Fetched> {
        let request = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Key {api_key}"));
        let response = match cancellable(cancel, request.send()).await? {
            Ok(response) => response,
            Err(err) => return Ok(Fetched::Transient(err.to_string())),
        };

        let status = response.status();
        let text = match cancellable(cancel, response.text()).await? {
            Ok(text) => text,
            Err(err) => return Ok(Fetched::Transient(err.to_string())),
        };

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Fetched::Transient(format!("HTTP {status}: {}", snippet(&text))));
        }
        if !status.is_success() {
            return Err(CropawayError::remote(
                stage,
                format!("HTTP {status}: {}", snippet(&text)),
            ));
        }
        serde_json::from_str(&text)
            .map(Fetched::Body)
            .map_err(|e| CropawayError::remote(RemoteStage::Parse, format!("Invalid JSON from {url}: {e}")))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        stage: RemoteStage,
        cancel: &CancellationToken,
    ) -> CropawayResult<T> {
        let response = cancellable(cancel, request.send())
            .await?
            .map_err(|e| CropawayError::remote(stage, format!("Request failed: {e}")))?;
        let status = response.status();
        let text = cancellable(cancel, response.text())
            .await?
            .map_err(|e| CropawayError::remote(stage, format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(CropawayError::remote(
                stage,
                format!("HTTP {status}: {}", snippet(&text)),
            ));
        }
        serde_json::from_str(&text).map_err(|e| {
            CropawayError::remote(
                RemoteStage::Parse,
                format!("Unexpected {stage} response: {e}: {}", snippet(&text)),
            )
        })
    }
}

impl std::fmt::Debug for SegmentationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationClient")
            .field("queue_base_url", &self.config.queue_base_url)
            .field("model_path", &self.config.model_path)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Await `future` unless `cancel` fires first.
async fn cancellable<F: Future>(cancel: &CancellationToken, future: F) -> CropawayResult<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CropawayError::Cancelled),
        output = future => Ok(output),
    }
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((end, _)) => format!("{}…", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "video/mp4",
    }
}
