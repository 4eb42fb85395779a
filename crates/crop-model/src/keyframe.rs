//! Keyframes and keyframe tracks.

use serde::{Deserialize, Serialize};

use crate::region::{CropRegion, CropState};

/// How values travel from one keyframe to the next.
///
/// The policy of the *earlier* keyframe of a pair governs the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Freeze at the earlier keyframe until the next one is reached.
    Hold,
}

impl Interpolation {
    /// Map raw progress `t` in `[0, 1]` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Interpolation::Linear => t,
            Interpolation::EaseIn => t * t,
            Interpolation::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Interpolation::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Interpolation::Hold => 0.0,
        }
    }
}

/// A timestamped, fully specified crop state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Seconds from the start of the source.
    pub timestamp: f64,

    /// Policy for the segment starting at this keyframe.
    #[serde(default)]
    pub interpolation: Interpolation,

    /// Snapshot of every mode's fields.
    pub state: CropState,
}

impl Keyframe {
    pub fn new(timestamp: f64, interpolation: Interpolation, state: CropState) -> Self {
        Self {
            timestamp,
            interpolation,
            state,
        }
    }

    /// A keyframe snapshotting a single region.
    pub fn from_region(timestamp: f64, interpolation: Interpolation, region: &CropRegion) -> Self {
        Self::new(timestamp, interpolation, CropState::from_region(region))
    }
}

/// Errors raised when editing a track.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Keyframe timestamp must be finite and non-negative, got {timestamp}")]
    InvalidTimestamp { timestamp: f64 },
}

/// Keyframes kept sorted ascending by timestamp, unique per timestamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct KeyframeTrack {
    keyframes: Vec<Keyframe>,
}

impl KeyframeTrack {
    /// Timestamps closer than this are considered the same instant.
    pub const TIME_EPSILON: f64 = 1e-6;

    pub fn new() -> Self {
        Self::default()
    }

    /// Build a track from unsorted keyframes. Later duplicates win.
    pub fn from_keyframes(keyframes: Vec<Keyframe>) -> Result<Self, TrackError> {
        let mut track = Self::new();
        for keyframe in keyframes {
            track.insert(keyframe)?;
        }
        Ok(track)
    }

    /// Insert a keyframe, replacing any keyframe at the same timestamp.
    pub fn insert(&mut self, keyframe: Keyframe) -> Result<(), TrackError> {
        if !keyframe.timestamp.is_finite() || keyframe.timestamp < 0.0 {
            return Err(TrackError::InvalidTimestamp {
                timestamp: keyframe.timestamp,
            });
        }

        match self.find(keyframe.timestamp) {
            Ok(idx) => self.keyframes[idx] = keyframe,
            Err(idx) => self.keyframes.insert(idx, keyframe),
        }
        Ok(())
    }

    /// Remove the keyframe at `timestamp`, if any.
    pub fn remove_at(&mut self, timestamp: f64) -> Option<Keyframe> {
        self.find(timestamp)
            .ok()
            .map(|idx| self.keyframes.remove(idx))
    }

    /// Keyframe at exactly `timestamp`.
    pub fn get(&self, timestamp: f64) -> Option<&Keyframe> {
        self.find(timestamp).ok().map(|idx| &self.keyframes[idx])
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Interpolation only kicks in with two or more keyframes.
    pub fn is_animated(&self) -> bool {
        self.keyframes.len() >= 2
    }

    pub fn first(&self) -> Option<&Keyframe> {
        self.keyframes.first()
    }

    pub fn last(&self) -> Option<&Keyframe> {
        self.keyframes.last()
    }

    /// `(first, last)` timestamps.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((self.first()?.timestamp, self.last()?.timestamp))
    }

    /// Binary search with the track's time tolerance.
    fn find(&self, timestamp: f64) -> Result<usize, usize> {
        let idx = self
            .keyframes
            .partition_point(|k| k.timestamp < timestamp - Self::TIME_EPSILON);
        match self.keyframes.get(idx) {
            Some(k) if (k.timestamp - timestamp).abs() <= Self::TIME_EPSILON => Ok(idx),
            _ => Err(idx),
        }
    }
}

// Deserialization goes through `from_keyframes` so that documents written by
// other tools still satisfy the ordering invariant.
impl<'de> Deserialize<'de> for KeyframeTrack {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawTrack {
            #[serde(default)]
            keyframes: Vec<Keyframe>,
        }

        let raw = RawTrack::deserialize(deserializer)?;
        KeyframeTrack::from_keyframes(raw.keyframes).map_err(serde::de::Error::custom)
    }
}
