//! Reconstruction configuration.
//!
//! Every section has defaults, so an empty YAML document (or no file at all)
//! gives a usable configuration. The two pipeline switches, `rescale` and
//! `interpolate`, are off unless the caller enables them.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the persisted 3D map inside the observation directory.
pub const DEFAULT_OUTPUT_FILE: &str = "led_map_3d.csv";

/// Top-level configuration for the reconstruction worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructorConfig {
    /// Worker polling interval. Also bounds shutdown and change-detection latency.
    pub poll_interval_ms: u64,

    /// File name of the persisted 3D map, relative to the observation directory.
    pub output_file: String,

    /// Rescale the reconstruction to physical units.
    pub rescale: bool,

    /// Fill LEDs that failed to triangulate from their neighbours.
    pub interpolate: bool,

    /// Options forwarded to the reconstruction engine.
    pub mapper: MapperOptions,

    /// Placeholder intrinsics shared by every pseudo-image.
    pub camera: PlaceholderCamera,

    /// Reference geometry used when `rescale` is enabled.
    pub scale: ScaleReference,

    /// Gap-filling policy used when `interpolate` is enabled.
    pub interpolation: InterpolationStrategy,

    /// External engine invocation.
    pub engine: EngineConfig,

    /// Capacity of the map update channel. Updates are dropped when full.
    pub update_channel_capacity: usize,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            rescale: false,
            interpolate: false,
            mapper: MapperOptions::default(),
            camera: PlaceholderCamera::default(),
            scale: ScaleReference::default(),
            interpolation: InterpolationStrategy::default(),
            engine: EngineConfig::default(),
            update_channel_capacity: 4,
        }
    }
}

impl ReconstructorConfig {
    /// Load from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Incremental mapper options handed to the engine.
///
/// Every match here is an exact LED identity match rather than an appearance
/// heuristic, and image pairs share few of them, so the thresholds sit well
/// below the engine's photographic defaults (noted per field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    /// Minimum matches for an image pair to be used (generic default 15).
    pub min_num_matches: usize,

    /// Minimum inliers to register a new image (generic default 30).
    pub abs_pose_min_num_inliers: usize,

    /// Minimum inliers for the initial image pair (generic default 100).
    pub init_min_num_inliers: usize,

    /// Discard tracks seen by only two images. Two-view LED tracks are
    /// trustworthy, so this stays false.
    pub ignore_two_view_tracks: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            min_num_matches: 9,
            abs_pose_min_num_inliers: 9,
            init_min_num_inliers: 50,
            ignore_two_view_tracks: false,
        }
    }
}

/// Intrinsics registered for the pseudo-images.
///
/// The capturing camera is not calibrated per viewpoint, so one shared
/// placeholder is registered and the engine refines it. The defaults describe
/// a unit image with centred principal point, which suits 2D maps stored in
/// normalised coordinates. Set `width`/`height`/`cx`/`cy`/`focal` to the
/// sensor size for maps in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderCamera {
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
    /// Radial distortion coefficient.
    pub k: f64,
}

impl Default for PlaceholderCamera {
    fn default() -> Self {
        Self {
            model: "SIMPLE_RADIAL".to_string(),
            width: 1,
            height: 1,
            focal: 1.0,
            cx: 0.5,
            cy: 0.5,
            k: 0.0,
        }
    }
}

impl PlaceholderCamera {
    /// Parameter vector in SIMPLE_RADIAL order: f, cx, cy, k.
    pub fn params(&self) -> Vec<f64> {
        vec![self.focal, self.cx, self.cy, self.k]
    }
}

/// Known geometry used to convert reconstruction units to physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScaleReference {
    /// Map the median distance between consecutive LEDs to `target`.
    InterLedDistance { target: f64 },

    /// Map the distance between two named viewpoints to a measured `distance`.
    CameraBaseline {
        first: String,
        second: String,
        distance: f64,
    },
}

impl Default for ScaleReference {
    fn default() -> Self {
        Self::InterLedDistance { target: 1.0 }
    }
}

/// How a filled position is weighted between the two bounding LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Weighting {
    /// Straight line between the bounding LEDs, evenly spaced by id.
    Linear,

    /// Inverse id-distance weighting, `w = 1 / d^power`. `power = 1` is linear.
    InverseDistance { power: f64 },
}

/// What to do with absent LEDs before the first or after the last present one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    LeaveAbsent,
    /// Continue the line through the two nearest present LEDs.
    Extrapolate,
}

/// Gap-filling policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationStrategy {
    /// Longest run of absent LEDs that will be filled.
    pub max_gap: usize,

    pub weighting: Weighting,

    pub boundary: BoundaryPolicy,

    /// Skip a gap when its per-LED spacing differs from the median
    /// inter-LED distance by more than this fraction.
    pub max_spacing_error: Option<f64>,
}

impl Default for InterpolationStrategy {
    fn default() -> Self {
        Self {
            max_gap: 5,
            weighting: Weighting::Linear,
            boundary: BoundaryPolicy::LeaveAbsent,
            max_spacing_error: None,
        }
    }
}

/// External engine command line.
///
/// `args` may contain the placeholders `{database}`, `{image_path}`,
/// `{output_path}` and `{options}`; they are substituted per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Kill the engine after this many seconds. None waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("led-sfm-mapper"),
            args: vec![
                "--database".to_string(),
                "{database}".to_string(),
                "--image-path".to_string(),
                "{image_path}".to_string(),
                "--output-path".to_string(),
                "{output_path}".to_string(),
                "--options".to_string(),
                "{options}".to_string(),
            ],
            timeout_secs: Some(600),
        }
    }
}
