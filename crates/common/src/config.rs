//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable consulted when no segmentation key is configured.
pub const SEGMENTATION_KEY_ENV: &str = "CROPAWAY_SEGMENTATION_KEY";

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Export and transcoder settings.
    pub export: ExportDefaults,

    /// Remote segmentation service settings.
    pub segmentation: SegmentationConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Transcoder and export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Explicit transcoder binary. Resolved from `PATH` when unset.
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit prober binary. Resolved from `PATH` when unset.
    pub ffprobe_path: Option<PathBuf>,

    /// Upper bound for a single hardware encoder probe or source probe
    /// (seconds).
    pub probe_timeout_secs: u64,

    /// Preset passed to software encoders.
    pub software_preset: String,

    /// Directory under which per-job temp directories are created.
    /// Defaults to the system temp directory.
    pub temp_root: Option<PathBuf>,
}

/// Remote segmentation/tracking service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// API key. Falls back to `CROPAWAY_SEGMENTATION_KEY`.
    pub api_key: Option<String>,

    /// Endpoint issuing short-lived storage tokens.
    pub storage_token_url: String,

    /// Base URL of the job queue.
    pub queue_base_url: String,

    /// Model path appended to the queue base URL on submit.
    pub model_path: String,

    /// Seconds between status polls.
    pub poll_interval_secs: u64,

    /// Hard ceiling for the whole poll phase (seconds).
    pub poll_timeout_secs: u64,

    /// Sources larger than this are proxied before upload.
    pub proxy_threshold_bytes: u64,

    /// Video bitrate of the upload proxy, in kbps.
    pub proxy_bitrate_kbps: u32,

    /// Per-request timeout (seconds).
    pub request_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "cropaway=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: 10,
            software_preset: "medium".to_string(),
            temp_root: None,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            storage_token_url: "https://rest.alpha.fal.ai/storage/auth/token?storage_type=fal-cdn-v3"
                .to_string(),
            queue_base_url: "https://queue.fal.run".to_string(),
            model_path: "fal-ai/sam-3/video".to_string(),
            poll_interval_secs: 2,
            poll_timeout_secs: 30 * 60,
            proxy_threshold_bytes: 100 * 1024 * 1024,
            proxy_bitrate_kbps: 4000,
            request_timeout_secs: 120,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl SegmentationConfig {
    /// The configured API key, or the environment fallback.
    /// Blank values count as missing.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(SEGMENTATION_KEY_ENV).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl ExportDefaults {
    /// Root directory for per-job temporary files.
    pub fn resolved_temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cropaway").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"segmentation": {"poll_interval_secs": 5}}"#).unwrap();
        assert_eq!(parsed.segmentation.poll_interval_secs, 5);
        assert_eq!(parsed.segmentation.poll_timeout_secs, 1800);
        assert_eq!(parsed.export.probe_timeout_secs, 10);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let config = SegmentationConfig {
            api_key: Some("   ".to_string()),
            ..SegmentationConfig::default()
        };
        // Env fallback is only consulted when the field is None.
        assert_eq!(config.resolved_api_key(), None);
    }

    #[test]
    fn test_explicit_temp_root_wins() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = ExportDefaults {
            temp_root: Some(dir.path().to_path_buf()),
            ..ExportDefaults::default()
        };
        assert_eq!(defaults.resolved_temp_root(), dir.path());
    }
}
