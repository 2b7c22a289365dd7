//! Reconstruction artifact written by the engine.
//!
//! The engine writes one model per connected component under numbered
//! sub-directories of the output path; only model `0` is consumed. Its
//! presence is the success signal.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::map::{CameraPose, ImageId};

/// File name of the reconstruction inside a model directory.
pub const ARTIFACT_FILE: &str = "reconstruction.json";

/// Well-known location of the first model under `output_path`.
pub fn artifact_path(output_path: &Path) -> PathBuf {
    output_path.join("0").join(ARTIFACT_FILE)
}

/// Registered image with its world-to-camera pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactImage {
    pub image_id: ImageId,
    pub name: String,
    /// Rotation quaternion as `[w, x, y, z]`.
    pub rotation: [f64; 4],
    pub translation: [f64; 3],
}

impl ArtifactImage {
    /// Pose of this image, named after its viewpoint.
    pub fn pose(&self, name: impl Into<String>) -> CameraPose {
        let [w, x, y, z] = self.rotation;
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
        let [tx, ty, tz] = self.translation;
        CameraPose::new(self.image_id, name, rotation, Vector3::new(tx, ty, tz))
    }
}

/// One observation of a 3D point: image and keypoint index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackElement {
    pub image_id: ImageId,
    pub keypoint_idx: u32,
}

/// Triangulated point and the keypoints it was triangulated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPoint {
    pub point3d_id: u64,
    pub xyz: [f64; 3],
    /// Mean reprojection error over the track.
    pub error: f64,
    pub track: Vec<TrackElement>,
}

impl ArtifactPoint {
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.xyz[0], self.xyz[1], self.xyz[2])
    }
}

/// Engine output: registered images and triangulated points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionArtifact {
    pub images: Vec<ArtifactImage>,
    pub points3d: Vec<ArtifactPoint>,
}

impl ReconstructionArtifact {
    /// Write to the well-known location under `output_path`.
    pub fn write_to(&self, output_path: &Path) -> std::io::Result<PathBuf> {
        let path = artifact_path(output_path);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(path)
    }
}
