//! Observable tracking state.

use std::fmt;

/// Where a tracking request is in its lifecycle.
///
/// `Idle → Uploading → Processing → Completed | Error`. A cancelled
/// request returns to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    Idle,
    Uploading,
    Processing {
        /// Position in the service queue, while queued.
        queue_position: Option<u64>,
    },
    Completed {
        frame_count: usize,
    },
    Error {
        message: String,
    },
}

impl TrackingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingState::Completed { .. } | TrackingState::Error { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, TrackingState::Uploading | TrackingState::Processing { .. })
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingState::Idle => f.write_str("idle"),
            TrackingState::Uploading => f.write_str("uploading"),
            TrackingState::Processing {
                queue_position: Some(position),
            } => write!(f, "queued (position {position})"),
            TrackingState::Processing { queue_position: None } => f.write_str("processing"),
            TrackingState::Completed { frame_count } => write!(f, "completed ({frame_count} frames)"),
            TrackingState::Error { message } => write!(f, "error: {message}"),
        }
    }
}
