//! Timecode and frame-rate utilities.
//!
//! Tracking results are indexed by frame while crop keyframes are indexed
//! by seconds. This module converts between the two and parses the clock
//! and rate notations emitted by the external transcoder.

/// A constant frame rate used to map frame indices to timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Fallback rate used when a source does not report one.
    pub const DEFAULT_FPS: f64 = 30.0;

    /// Create a clock at the given rate. Non-finite or non-positive
    /// rates fall back to [`Self::DEFAULT_FPS`].
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            Self::DEFAULT_FPS
        };
        Self { fps }
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(&self) -> f64 {
        1.0 / self.fps
    }

    /// Presentation time of a frame, in seconds.
    pub fn frame_to_secs(&self, frame: usize) -> f64 {
        frame as f64 / self.fps
    }

    /// Frame containing the given timestamp (floor, clamped at 0).
    pub fn secs_to_frame(&self, secs: f64) -> usize {
        if !secs.is_finite() || secs <= 0.0 {
            return 0;
        }
        // Nudge so that exact frame boundaries survive float error.
        (secs * self.fps + 1e-6).floor() as usize
    }

    /// Number of frames needed to cover `duration_secs`.
    pub fn frame_count(&self, duration_secs: f64) -> usize {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return 0;
        }
        (duration_secs * self.fps - 1e-6).ceil().max(1.0) as usize
    }
}

/// Parse a rational or decimal frame rate such as `30000/1001` or `25`.
///
/// Returns `None` for `0/0` and other degenerate values.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse::<f64>().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Parse a transcoder clock value (`HH:MM:SS.frac`, `MM:SS.frac` or plain
/// seconds) into seconds.
pub fn parse_clock(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let negative = raw.starts_with('-');
    let body = raw.trim_start_matches('-');

    let mut total = 0.0f64;
    for part in body.split(':') {
        let value = part.parse::<f64>().ok()?;
        if value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }

    if negative {
        // The transcoder reports negative times before the first frame.
        return Some(0.0);
    }
    Some(total)
}
