//! Tracking results and their normalization.

use std::collections::BTreeMap;

use cropaway_common::error::{CropawayError, CropawayResult, RemoteStage};
use cropaway_common::timecode::FrameClock;
use cropaway_crop_model::{CropRegion, Interpolation, Keyframe, KeyframeTrack, NormalizedRect};
use cropaway_mask_engine::{blob, ops, RleMask};
use serde_json::Value;

/// Frame-indexed masks and boxes for one tracked object.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingResult {
    pub masks: BTreeMap<usize, RleMask>,

    /// Origin-form, normalized boxes.
    pub boxes: BTreeMap<usize, NormalizedRect>,

    /// Highest observed frame index plus one.
    pub frame_count: usize,

    /// Frame rate the indices refer to.
    pub frame_rate: f64,
}

impl TrackingResult {
    /// Segmentation keyframes for every `stride`-th masked frame (and the
    /// last one), each holding a compact mask blob and its bounding box.
    pub fn to_keyframe_track(&self, frame_rate: f64, stride: usize) -> CropawayResult<KeyframeTrack> {
        let clock = FrameClock::new(frame_rate);
        let stride = stride.max(1);
        let last = self.masks.keys().next_back().copied();

        let mut keyframes = Vec::new();
        for (&frame, rle) in &self.masks {
            if frame % stride != 0 && Some(frame) != last {
                continue;
            }
            let bitmap = rle
                .to_bitmap()
                .map_err(|e| CropawayError::generation(format!("frame {frame}: {e}")))?;
            let bounding_box = self
                .boxes
                .get(&frame)
                .copied()
                .unwrap_or_else(|| ops::bounding_box(&bitmap));
            let mask = blob::encode(&bitmap)
                .map_err(|e| CropawayError::generation(format!("frame {frame}: {e}")))?;

            keyframes.push(Keyframe::from_region(
                clock.frame_to_secs(frame),
                Interpolation::Linear,
                &CropRegion::Segmentation { mask, bounding_box },
            ));
        }

        KeyframeTrack::from_keyframes(keyframes).map_err(|e| CropawayError::generation(e.to_string()))
    }
}

/// Normalize a result document.
///
/// `masks` entries are read by position unless wrapped with an explicit
/// frame index; `boxes` are center-form `[cx, cy, w, h]`; `metadata` items
/// only fill frames no mask covers yet. `source_size` is `(width, height)`.
pub fn normalize_result(body: &Value, source_size: (u32, u32), frame_rate: f64) -> CropawayResult<TrackingResult> {
    let mut masks = BTreeMap::new();
    let mut boxes = BTreeMap::new();

    for (position, entry) in array(body, "masks").iter().enumerate() {
        let (frame, payload) = unwrap_frame_entry(entry, position);
        if let Some(mask) = decode_mask(payload, frame, source_size) {
            masks.insert(frame, mask);
        }
    }

    for (position, entry) in array(body, "boxes").iter().enumerate() {
        match parse_box(entry, source_size) {
            Some(rect) => {
                boxes.insert(position, rect);
            }
            None if !entry.is_null() => {
                tracing::debug!(frame = position, "Ignoring malformed box");
            }
            None => {}
        }
    }

    for (position, item) in array(body, "metadata").iter().enumerate() {
        let frame = frame_index(item).unwrap_or(position);
        if masks.contains_key(&frame) {
            continue;
        }
        if let Some(mask) = item
            .get("mask")
            .or_else(|| item.get("rle"))
            .and_then(|payload| decode_mask(payload, frame, source_size))
            .or_else(|| {
                item.get("mask_base64")
                    .and_then(Value::as_str)
                    .and_then(|text| decode_blob_text(text, frame))
            })
        {
            masks.insert(frame, mask);
        }
        if let Some(rect) = item
            .get("box")
            .or_else(|| item.get("bbox"))
            .and_then(|b| parse_box(b, source_size))
        {
            boxes.entry(frame).or_insert(rect);
        }
    }

    if masks.is_empty() {
        return Err(CropawayError::remote(RemoteStage::Parse, "no detection data"));
    }

    let frame_count = masks
        .keys()
        .chain(boxes.keys())
        .max()
        .map_or(0, |&max| max + 1);

    tracing::debug!(
        masks = masks.len(),
        boxes = boxes.len(),
        frame_count,
        "Normalized tracking result"
    );

    Ok(TrackingResult {
        masks,
        boxes,
        frame_count,
        frame_rate,
    })
}

fn array<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn frame_index(item: &Value) -> Option<usize> {
    item.get("frame_index")
        .or_else(|| item.get("index"))
        .or_else(|| item.get("frame"))
        .and_then(Value::as_u64)
        .map(|i| i as usize)
}

/// Split `{frame_index, mask}` wrappers; anything else is a bare mask at
/// its array position.
fn unwrap_frame_entry(entry: &Value, position: usize) -> (usize, &Value) {
    if let Value::Object(map) = entry {
        if !map.contains_key("counts") {
            if let Some(payload) = map.get("mask").or_else(|| map.get("rle")) {
                return (frame_index(entry).unwrap_or(position), payload);
            }
        }
    }
    (position, entry)
}

fn decode_mask(payload: &Value, frame: usize, source_size: (u32, u32)) -> Option<RleMask> {
    if payload.is_null() {
        return None;
    }
    match RleMask::from_json(payload, Some(source_size)) {
        Ok(mask) => Some(mask),
        Err(err) => {
            tracing::warn!(frame, error = %err, "Skipping undecodable mask");
            None
        }
    }
}

fn decode_blob_text(text: &str, frame: usize) -> Option<RleMask> {
    match blob::decode_base64(text) {
        Ok(bitmap) => Some(RleMask::from_bitmap(&bitmap)),
        Err(err) => {
            tracing::warn!(frame, error = %err, "Skipping undecodable mask blob");
            None
        }
    }
}

/// Center-form box to origin form. Boxes with any component above 1 are
/// taken to be in pixels.
fn parse_box(entry: &Value, (width, height): (u32, u32)) -> Option<NormalizedRect> {
    let values: Vec<f64> = entry
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<_>>>()?;
    let [cx, cy, w, h] = <[f64; 4]>::try_from(values).ok()?;
    if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
        return None;
    }

    if [cx, cy, w, h].iter().any(|&v| v > 1.0) {
        let sw = f64::from(width.max(1));
        let sh = f64::from(height.max(1));
        return Some(NormalizedRect::from_center_form(cx / sw, cy / sh, w / sw, h / sh));
    }
    Some(NormalizedRect::from_center_form(cx, cy, w, h))
}
