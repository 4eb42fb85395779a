//! Wire types of the remote segmentation service.
//!
//! The service follows a queue protocol: files are pushed to a CDN with a
//! short-lived storage token, a job is submitted against a model path, and
//! its status URL is polled until the result URL can be fetched.

use chrono::{DateTime, Utc};
use cropaway_crop_model::NormalizedPoint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What to track.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingPrompt {
    /// Free-text description of the object.
    Text(String),

    /// A foreground point on the first frame.
    Point(NormalizedPoint),
}

/// Storage token issued before an upload.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageToken {
    pub token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// CDN base URL the upload goes to.
    pub base_url: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StorageToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }

    pub fn upload_url(&self) -> String {
        format!("{}/files/upload", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub access_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub request_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
}

/// Where to poll a submitted job and fetch its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUrls {
    pub request_id: String,
    pub status_url: String,
    pub response_url: String,
}

impl JobUrls {
    /// Service-provided URLs, falling back to the id-keyed queue layout.
    pub fn resolve(submit: SubmitResponse, queue_base_url: &str, model_path: &str) -> Self {
        let base = format!(
            "{}/{}/requests/{}",
            queue_base_url.trim_end_matches('/'),
            model_path.trim_matches('/'),
            submit.request_id
        );
        Self {
            status_url: submit
                .status_url
                .unwrap_or_else(|| format!("{base}/status")),
            response_url: submit.response_url.unwrap_or(base),
            request_id: submit.request_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct PointPrompt {
    x: i64,
    y: i64,
    label: u8,
    frame_index: u32,
}

/// Submit body for `video_url` and `prompt`. Point prompts are sent in
/// source pixels.
pub fn submit_body(video_url: &str, prompt: &TrackingPrompt, source_size: (u32, u32)) -> Value {
    match prompt {
        TrackingPrompt::Text(text) => json!({
            "video_url": video_url,
            "prompt": text,
        }),
        TrackingPrompt::Point(point) => {
            let (width, height) = source_size;
            let point = PointPrompt {
                x: denormalize(point.x, width),
                y: denormalize(point.y, height),
                label: 1,
                frame_index: 0,
            };
            json!({
                "video_url": video_url,
                "point_prompts": [point],
            })
        }
    }
}

fn denormalize(value: f64, pixels: u32) -> i64 {
    let max = i64::from(pixels.saturating_sub(1));
    ((value.clamp(0.0, 1.0) * f64::from(pixels)).round() as i64).min(max)
}

/// Job phase read from a status response.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPhase {
    Queued { position: Option<u64> },
    Running,
    Completed,
    Failed(String),
    /// No status field, but the body already carries results.
    ImplicitlyCompleted,
    Unknown(String),
}

impl JobPhase {
    pub fn from_status(body: &Value) -> Self {
        let Some(status) = body.get("status").and_then(Value::as_str) else {
            return if has_result_fields(body) {
                JobPhase::ImplicitlyCompleted
            } else {
                JobPhase::Unknown(String::new())
            };
        };

        match status.to_ascii_uppercase().as_str() {
            "IN_QUEUE" | "QUEUED" => JobPhase::Queued {
                position: body.get("queue_position").and_then(Value::as_u64),
            },
            "IN_PROGRESS" | "RUNNING" => JobPhase::Running,
            "COMPLETED" | "OK" => JobPhase::Completed,
            "FAILED" | "ERROR" => JobPhase::Failed(error_text(body)),
            other => JobPhase::Unknown(other.to_string()),
        }
    }
}

/// Whether a body looks like a result document.
pub fn has_result_fields(body: &Value) -> bool {
    ["masks", "boxes", "metadata"]
        .iter()
        .any(|key| body.get(key).is_some_and(|v| !v.is_null()))
}

fn error_text(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(other) if !other.is_null() => other.to_string(),
        _ => body
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("job failed without an error message")
            .to_string(),
    }
}
