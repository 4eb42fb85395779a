//! Transcoder progress parsing.
//!
//! The structured `-progress pipe:1` channel is preferred; the `time=`
//! field of the diagnostic stream is a fallback for builds or invocations
//! where the structured channel stays silent.

use std::sync::OnceLock;

use cropaway_common::timecode::parse_clock;
use regex::Regex;

/// Reported progress never reaches 1.0 before the process has exited
/// successfully.
pub const PROGRESS_CEILING: f64 = 0.99;

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Stage of the export.
    pub stage: ExportStage,

    /// Estimated time remaining in seconds, when known.
    pub eta_secs: Option<f64>,
}

/// Stages of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Encoding,
    Complete,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Accumulated key/value state from the structured progress channel.
#[derive(Debug, Default)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ProgressState {
    /// Feed one `key=value` pair. Returns true at the end of a block
    /// (`progress=continue|end`).
    pub fn update(&mut self, key: &str, value: &str) -> bool {
        match key {
            // Despite the name, `out_time_ms` is in microseconds.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    if us >= 0.0 {
                        self.out_time_secs = us / 1_000_000.0;
                    }
                }
                false
            }
            "out_time" => {
                if let Some(secs) = parse_clock(value) {
                    self.out_time_secs = secs;
                }
                false
            }
            "progress" => {
                self.complete = value.trim() == "end";
                true
            }
            _ => false,
        }
    }

    /// Feed a raw line; returns true at the end of a block.
    pub fn feed_line(&mut self, line: &str) -> bool {
        match line.trim().split_once('=') {
            Some((key, value)) => self.update(key.trim(), value),
            None => false,
        }
    }
}

fn time_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"time=\s*(-?\d+:\d{2}:\d{2}(?:\.\d+)?)").ok())
        .as_ref()
}

/// Extract the encoded position from a diagnostic line
/// (`frame= 120 fps= 60 ... time=00:00:04.00 ...`).
pub fn parse_stats_time(line: &str) -> Option<f64> {
    let caps = time_pattern()?.captures(line)?;
    parse_clock(caps.get(1)?.as_str())
}

/// Fraction of `duration_secs` covered by `position_secs`, held below
/// [`PROGRESS_CEILING`].
pub fn fraction(position_secs: f64, duration_secs: Option<f64>) -> f64 {
    match duration_secs {
        Some(d) if d > 0.0 && position_secs.is_finite() => {
            (position_secs / d).clamp(0.0, PROGRESS_CEILING)
        }
        _ => 0.0,
    }
}

/// Remaining time given progress so far.
pub fn eta(progress: f64, elapsed_secs: f64) -> Option<f64> {
    if progress <= 0.0 {
        return None;
    }
    Some(((elapsed_secs / progress) - elapsed_secs).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_block() {
        let mut state = ProgressState::default();
        let block = "frame=120\nout_time_us=4000000\nout_time=00:00:04.000000\nprogress=continue\n";
        let ends: Vec<bool> = block.lines().map(|l| state.feed_line(l)).collect();
        assert_eq!(ends, vec![false, false, false, true]);
        assert!((state.out_time_secs - 4.0).abs() < 1e-9);
        assert!(!state.complete);

        assert!(state.feed_line("progress=end"));
        assert!(state.complete);
    }

    #[test]
    fn test_negative_out_time_is_ignored() {
        let mut state = ProgressState::default();
        state.feed_line("out_time_us=2000000");
        state.feed_line("out_time_ms=-9223372036854775807");
        assert!((state.out_time_secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_line_fallback() {
        let line = "frame=  240 fps= 59 q=28.0 size=    1024kB time=00:01:02.50 bitrate= 134.2kbits/s speed=1.9x";
        assert_eq!(parse_stats_time(line), Some(62.5));
        assert_eq!(parse_stats_time("Input #0, mov,mp4"), None);
        assert_eq!(parse_stats_time("time=N/A bitrate=N/A"), None);
    }

    #[test]
    fn test_fraction_is_clamped_below_one() {
        assert_eq!(fraction(5.0, Some(10.0)), 0.5);
        assert_eq!(fraction(10.0, Some(10.0)), PROGRESS_CEILING);
        assert_eq!(fraction(12.0, Some(10.0)), PROGRESS_CEILING);
        assert_eq!(fraction(3.0, None), 0.0);
    }

    #[test]
    fn test_eta() {
        assert_eq!(eta(0.0, 10.0), None);
        assert_eq!(eta(0.5, 10.0), Some(10.0));
    }
}
