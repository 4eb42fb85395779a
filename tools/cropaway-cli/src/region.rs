//! Crop region arguments shared by `export` and `mask`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use cropaway_crop_model::{
    CropMode, CropRegion, FreehandVertex, JobRegion, KeyframeTrack, NormalizedPoint, NormalizedRect,
};

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct RegionArgs {
    /// Rectangle as normalized `x,y,width,height`
    #[arg(long, value_name = "X,Y,W,H")]
    pub rect: Option<String>,

    /// Circle as normalized `cx,cy,radius` (radius relative to the shorter side)
    #[arg(long, value_name = "CX,CY,R")]
    pub circle: Option<String>,

    /// Freehand polygon as normalized `x,y` pairs separated by spaces or `;`
    #[arg(long, value_name = "POINTS")]
    pub polygon: Option<String>,

    /// Keyframe track JSON (as written by `cropaway track`)
    #[arg(long, value_name = "FILE")]
    pub track: Option<PathBuf>,
}

/// Crop mode a keyframe track is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Rectangle,
    Circle,
    Freehand,
    Segmentation,
}

impl From<ModeArg> for CropMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Rectangle => CropMode::Rectangle,
            ModeArg::Circle => CropMode::Circle,
            ModeArg::Freehand => CropMode::Freehand,
            ModeArg::Segmentation => CropMode::Segmentation,
        }
    }
}

impl RegionArgs {
    /// The job region described by the arguments. `mode` only applies to
    /// tracks.
    pub fn job_region(&self, mode: ModeArg) -> anyhow::Result<JobRegion> {
        if let Some(path) = &self.track {
            return Ok(JobRegion::Track {
                track: load_track(path)?,
                mode: mode.into(),
            });
        }
        Ok(JobRegion::Static {
            region: self.static_region()?,
        })
    }

    fn static_region(&self) -> anyhow::Result<CropRegion> {
        if let Some(spec) = &self.rect {
            let [x, y, width, height] = parse_numbers::<4>(spec).context("--rect")?;
            return Ok(CropRegion::Rectangle {
                rect: NormalizedRect::new(x, y, width, height),
            });
        }
        if let Some(spec) = &self.circle {
            let [cx, cy, radius] = parse_numbers::<3>(spec).context("--circle")?;
            return Ok(CropRegion::Circle {
                center: NormalizedPoint::new(cx, cy),
                radius,
            });
        }
        if let Some(spec) = &self.polygon {
            return Ok(CropRegion::Freehand {
                vertices: parse_polygon(spec).context("--polygon")?,
            });
        }
        bail!("no crop region given")
    }
}

pub fn load_track(path: &Path) -> anyhow::Result<KeyframeTrack> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read track {}", path.display()))?;
    let track: KeyframeTrack = serde_json::from_str(&content)
        .with_context(|| format!("Invalid keyframe track {}", path.display()))?;
    if track.is_empty() {
        bail!("Keyframe track {} has no keyframes", path.display());
    }
    Ok(track)
}

/// Parse exactly `N` comma-separated numbers.
pub fn parse_numbers<const N: usize>(spec: &str) -> anyhow::Result<[f64; N]> {
    let values = spec
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("'{}' is not a number", part.trim()))
        })
        .collect::<anyhow::Result<Vec<f64>>>()?;
    let count = values.len();
    <[f64; N]>::try_from(values).map_err(|_| anyhow::anyhow!("expected {N} values, got {count}"))
}

fn parse_polygon(spec: &str) -> anyhow::Result<Vec<FreehandVertex>> {
    let vertices = spec
        .split(|c: char| c == ';' || c.is_whitespace())
        .filter(|pair| !pair.is_empty())
        .map(|pair| parse_numbers::<2>(pair).map(|[x, y]| FreehandVertex::corner(x, y)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if vertices.len() < 3 {
        bail!("a polygon needs at least 3 points, got {}", vertices.len());
    }
    Ok(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RegionArgs {
        RegionArgs {
            rect: None,
            circle: None,
            polygon: None,
            track: None,
        }
    }

    #[test]
    fn test_rect_argument() {
        let region = RegionArgs {
            rect: Some("0.25, 0.25, 0.5, 0.5".into()),
            ..args()
        }
        .job_region(ModeArg::Rectangle)
        .unwrap();
        assert_eq!(
            region,
            JobRegion::Static {
                region: CropRegion::Rectangle {
                    rect: NormalizedRect::new(0.25, 0.25, 0.5, 0.5)
                }
            }
        );
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let err = RegionArgs {
            circle: Some("0.5,0.5".into()),
            ..args()
        }
        .job_region(ModeArg::Circle)
        .unwrap_err();
        assert!(format!("{err:#}").contains("expected 3 values, got 2"));
    }

    #[test]
    fn test_polygon_argument() {
        let region = RegionArgs {
            polygon: Some("0.1,0.1; 0.9,0.1 0.5,0.9".into()),
            ..args()
        }
        .job_region(ModeArg::Freehand)
        .unwrap();
        match region {
            JobRegion::Static {
                region: CropRegion::Freehand { vertices },
            } => {
                assert_eq!(vertices.len(), 3);
                assert_eq!(vertices[2].point, NormalizedPoint::new(0.5, 0.9));
            }
            other => panic!("unexpected region: {other:?}"),
        }
        assert!(parse_polygon("0.1,0.1 0.2,0.2").is_err());
    }

    #[test]
    fn test_track_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("track.json");
        std::fs::write(
            &path,
            r#"{"keyframes": [
                {"timestamp": 1.0, "interpolation": "linear", "state": {"rect": {"x": 0.5, "y": 0.0, "width": 0.5, "height": 0.5}}},
                {"timestamp": 0.0, "interpolation": "linear", "state": {"rect": {"x": 0.0, "y": 0.0, "width": 0.5, "height": 0.5}}}
            ]}"#,
        )
        .unwrap();

        let region = RegionArgs {
            track: Some(path),
            ..args()
        }
        .job_region(ModeArg::Rectangle)
        .unwrap();
        match region.region_at(0.5) {
            CropRegion::Rectangle { rect } => assert!((rect.x - 0.25).abs() < 1e-9),
            other => panic!("unexpected region: {other:?}"),
        }
    }
}
