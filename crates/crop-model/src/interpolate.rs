//! Evaluate a keyframe track at an arbitrary timestamp.

use crate::geometry::{lerp, NormalizedPoint, NormalizedRect};
use crate::keyframe::KeyframeTrack;
use crate::region::{CropMode, CropRegion, CropState};

/// Crop region of `track` at `timestamp`, read in `mode`.
///
/// - empty track: the mode's full-frame default
/// - one keyframe, or a timestamp at/outside the track bounds: the
///   boundary keyframe's snapshot, unchanged
/// - otherwise numeric fields are blended with the earlier keyframe's
///   easing, while freehand paths and segmentation masks switch over
///   at eased progress 0.5
pub fn interpolate(track: &KeyframeTrack, timestamp: f64, mode: CropMode) -> CropRegion {
    let keyframes = track.keyframes();
    let (Some(first), Some(last)) = (keyframes.first(), keyframes.last()) else {
        return CropRegion::full_frame(mode);
    };

    if keyframes.len() == 1 || timestamp.is_nan() || timestamp <= first.timestamp {
        return first.state.region(mode);
    }
    if timestamp >= last.timestamp {
        return last.state.region(mode);
    }

    // First keyframe strictly after `timestamp`; bounds checks above
    // guarantee 1 <= idx < len.
    let idx = keyframes.partition_point(|k| k.timestamp <= timestamp);
    let prev = &keyframes[idx - 1];
    let next = &keyframes[idx];

    let span = next.timestamp - prev.timestamp;
    if span <= 0.0 {
        return prev.state.region(mode);
    }

    let raw_t = (timestamp - prev.timestamp) / span;
    let eased = prev.interpolation.apply(raw_t);
    blend(&prev.state, &next.state, eased, mode)
}

/// Sample `track` every `step_secs` over `[start, end]` (inclusive).
pub fn sample(
    track: &KeyframeTrack,
    mode: CropMode,
    start: f64,
    end: f64,
    step_secs: f64,
) -> Vec<(f64, CropRegion)> {
    if step_secs.is_nan() || step_secs <= 0.0 || end < start {
        return vec![(start, interpolate(track, start, mode))];
    }

    let steps = ((end - start) / step_secs).floor() as usize;
    (0..=steps)
        .map(|i| {
            let t = start + i as f64 * step_secs;
            (t, interpolate(track, t, mode))
        })
        .collect()
}

fn blend(prev: &CropState, next: &CropState, t: f64, mode: CropMode) -> CropRegion {
    match mode {
        CropMode::Rectangle => CropRegion::Rectangle {
            rect: NormalizedRect::lerp(&prev.rect, &next.rect, t),
        },
        CropMode::Circle => CropRegion::Circle {
            center: NormalizedPoint::lerp(&prev.circle_center, &next.circle_center, t),
            radius: lerp(prev.circle_radius, next.circle_radius, t),
        },
        CropMode::Freehand | CropMode::Segmentation => {
            if t < 0.5 {
                prev.region(mode)
            } else {
                next.region(mode)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::{Interpolation, Keyframe};
    use crate::region::FreehandVertex;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> CropRegion {
        CropRegion::Rectangle {
            rect: NormalizedRect { x, y, width: w, height: h },
        }
    }

    fn track_of(frames: Vec<(f64, Interpolation, CropRegion)>) -> KeyframeTrack {
        KeyframeTrack::from_keyframes(
            frames
                .into_iter()
                .map(|(t, i, r)| Keyframe::from_region(t, i, &r))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_track_returns_default() {
        let track = KeyframeTrack::new();
        for t in [-1.0, 0.0, 3.5, 1e9] {
            assert_eq!(
                interpolate(&track, t, CropMode::Rectangle),
                CropRegion::Rectangle {
                    rect: NormalizedRect::FULL
                }
            );
        }
        assert_eq!(
            interpolate(&track, 0.0, CropMode::Circle),
            CropRegion::full_frame(CropMode::Circle)
        );
    }

    #[test]
    fn test_out_of_range_returns_boundary_snapshot() {
        let a = rect(0.1, 0.1, 0.5, 0.5);
        let b = rect(0.3, 0.2, 0.4, 0.4);
        let track = track_of(vec![
            (1.0, Interpolation::Linear, a.clone()),
            (3.0, Interpolation::Linear, b.clone()),
        ]);
        assert_eq!(interpolate(&track, 0.0, CropMode::Rectangle), a);
        assert_eq!(interpolate(&track, 1.0, CropMode::Rectangle), a);
        assert_eq!(interpolate(&track, 3.0, CropMode::Rectangle), b);
        assert_eq!(interpolate(&track, 10.0, CropMode::Rectangle), b);
    }

    #[test]
    fn test_single_keyframe_is_constant() {
        let a = rect(0.2, 0.2, 0.3, 0.3);
        let track = track_of(vec![(5.0, Interpolation::EaseIn, a.clone())]);
        assert_eq!(interpolate(&track, 0.0, CropMode::Rectangle), a);
        assert_eq!(interpolate(&track, 7.0, CropMode::Rectangle), a);
    }

    #[test]
    fn test_linear_midpoint_is_mean() {
        let track = track_of(vec![
            (0.0, Interpolation::Linear, rect(0.0, 0.2, 1.0, 0.6)),
            (2.0, Interpolation::Linear, rect(0.4, 0.0, 0.5, 0.4)),
        ]);
        let CropRegion::Rectangle { rect: mid } = interpolate(&track, 1.0, CropMode::Rectangle)
        else {
            panic!("expected rectangle");
        };
        assert!((mid.x - 0.2).abs() < 1e-12);
        assert!((mid.y - 0.1).abs() < 1e-12);
        assert!((mid.width - 0.75).abs() < 1e-12);
        assert!((mid.height - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear_midpoint_circle() {
        let a = CropRegion::Circle {
            center: NormalizedPoint::new(0.2, 0.4),
            radius: 0.1,
        };
        let b = CropRegion::Circle {
            center: NormalizedPoint::new(0.6, 0.8),
            radius: 0.3,
        };
        let track = track_of(vec![
            (0.0, Interpolation::Linear, a),
            (4.0, Interpolation::Linear, b),
        ]);
        let CropRegion::Circle { center, radius } = interpolate(&track, 2.0, CropMode::Circle)
        else {
            panic!("expected circle");
        };
        assert!((center.x - 0.4).abs() < 1e-12);
        assert!((center.y - 0.6).abs() < 1e-12);
        assert!((radius - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_hold_freezes_at_previous() {
        let a = rect(0.1, 0.1, 0.2, 0.2);
        let track = track_of(vec![
            (0.0, Interpolation::Hold, a.clone()),
            (1.0, Interpolation::Linear, rect(0.5, 0.5, 0.5, 0.5)),
        ]);
        for t in [0.001, 0.25, 0.5, 0.999] {
            assert_eq!(interpolate(&track, t, CropMode::Rectangle), a);
        }
    }

    #[test]
    fn test_ease_in_is_slower_than_linear() {
        let track = track_of(vec![
            (0.0, Interpolation::EaseIn, rect(0.0, 0.0, 1.0, 1.0)),
            (1.0, Interpolation::Linear, rect(1.0, 0.0, 1.0, 1.0)),
        ]);
        let CropRegion::Rectangle { rect: r } = interpolate(&track, 0.5, CropMode::Rectangle)
        else {
            panic!("expected rectangle");
        };
        assert!((r.x - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_freehand_hands_off_discretely() {
        let a = CropRegion::Freehand {
            vertices: vec![
                FreehandVertex::corner(0.0, 0.0),
                FreehandVertex::corner(0.5, 0.0),
                FreehandVertex::corner(0.5, 0.5),
            ],
        };
        let b = CropRegion::Freehand {
            vertices: vec![
                FreehandVertex::corner(0.5, 0.5),
                FreehandVertex::corner(1.0, 0.5),
                FreehandVertex::corner(1.0, 1.0),
            ],
        };
        let track = track_of(vec![
            (0.0, Interpolation::Linear, a.clone()),
            (1.0, Interpolation::Linear, b.clone()),
        ]);
        assert_eq!(interpolate(&track, 0.49, CropMode::Freehand), a);
        assert_eq!(interpolate(&track, 0.5, CropMode::Freehand), b);
    }

    #[test]
    fn test_segmentation_hand_off_follows_eased_progress() {
        let a = CropRegion::Segmentation {
            mask: vec![1],
            bounding_box: NormalizedRect::FULL,
        };
        let b = CropRegion::Segmentation {
            mask: vec![2],
            bounding_box: NormalizedRect::new(0.1, 0.1, 0.5, 0.5),
        };
        let track = track_of(vec![
            (0.0, Interpolation::EaseIn, a.clone()),
            (1.0, Interpolation::Linear, b.clone()),
        ]);
        // Raw t = 0.6 eases to 0.36, still before the hand-off.
        assert_eq!(interpolate(&track, 0.6, CropMode::Segmentation), a);
        assert_eq!(interpolate(&track, 0.8, CropMode::Segmentation), b);
    }

    #[test]
    fn test_sample_covers_range() {
        let track = track_of(vec![
            (0.0, Interpolation::Linear, rect(0.0, 0.0, 1.0, 1.0)),
            (1.0, Interpolation::Linear, rect(0.5, 0.0, 0.5, 1.0)),
        ]);
        let samples = sample(&track, CropMode::Rectangle, 0.0, 1.0, 0.25);
        assert_eq!(samples.len(), 5);
        assert!((samples[4].0 - 1.0).abs() < 1e-12);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn interpolation() -> impl Strategy<Value = Interpolation> {
            prop_oneof![
                Just(Interpolation::Linear),
                Just(Interpolation::EaseIn),
                Just(Interpolation::EaseOut),
                Just(Interpolation::EaseInOut),
                Just(Interpolation::Hold),
            ]
        }

        proptest! {
            #[test]
            fn easing_stays_in_unit_range(kind in interpolation(), t in -1.0f64..2.0) {
                let eased = kind.apply(t);
                prop_assert!((0.0..=1.0).contains(&eased));
            }

            #[test]
            fn rectangles_stay_between_keyframes(
                kind in interpolation(),
                xa in 0.0f64..0.5,
                xb in 0.0f64..0.5,
                t in 0.0f64..2.0,
            ) {
                let track = track_of(vec![
                    (0.0, kind, rect(xa, 0.0, 0.5, 0.5)),
                    (2.0, Interpolation::Linear, rect(xb, 0.0, 0.5, 0.5)),
                ]);
                match interpolate(&track, t, CropMode::Rectangle) {
                    CropRegion::Rectangle { rect } => {
                        prop_assert!(rect.x >= xa.min(xb) - 1e-9);
                        prop_assert!(rect.x <= xa.max(xb) + 1e-9);
                    }
                    other => prop_assert!(false, "unexpected region: {:?}", other),
                }
            }
        }
    }
}
