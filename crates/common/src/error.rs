//! Error types shared across Cropaway crates.

use std::fmt;

/// Stage of a remote segmentation job an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteStage {
    Upload,
    Submit,
    Process,
    Download,
    Parse,
}

impl fmt::Display for RemoteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemoteStage::Upload => "upload",
            RemoteStage::Submit => "submit",
            RemoteStage::Process => "process",
            RemoteStage::Download => "download",
            RemoteStage::Parse => "parse",
        };
        f.write_str(label)
    }
}

/// Top-level error type for Cropaway operations.
#[derive(Debug, thiserror::Error)]
pub enum CropawayError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Resource unavailable: {message}")]
    Resource { message: String },

    #[error("Mask generation failed: {message}")]
    Generation { message: String },

    #[error("Remote service error during {stage}: {message}")]
    RemoteService { stage: RemoteStage, message: String },

    #[error("Transcoder exited with {}: {stderr_tail}", describe_exit(.exit_code))]
    Transcoder {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type alias using CropawayError.
pub type CropawayResult<T> = Result<T, CropawayError>;

impl CropawayError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource {
            message: msg.into(),
        }
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
        }
    }

    pub fn remote(stage: RemoteStage, msg: impl Into<String>) -> Self {
        Self::RemoteService {
            stage,
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout {
            message: msg.into(),
        }
    }

    pub fn transcoder(exit_code: Option<i32>, stderr_tail: impl Into<String>) -> Self {
        Self::Transcoder {
            exit_code,
            stderr_tail: stderr_tail.into(),
        }
    }

    /// Whether this error came from a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The remote stage, if this is a remote service error.
    pub fn remote_stage(&self) -> Option<RemoteStage> {
        match self {
            Self::RemoteService { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
