//! Map extraction - Converts the engine's model into an LED map.
//!
//! The engine indexes everything by its own point and image ids. Each 3D
//! point's track lists the (image, keypoint) pairs it was triangulated from,
//! and the keypoint table built during synthesis turns those back into LED
//! identities. Engine ids do not survive this step.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::database::KeypointTable;
use crate::engine::{ArtifactPoint, ReconstructionArtifact, artifact_path};
use crate::error::ReconstructionError;
use crate::map::{CameraPose, ImageId, Led3D, LedMap3D};

/// Extracted LED map and recovered viewpoint poses.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub map: LedMap3D,
    pub cameras: Vec<CameraPose>,
}

/// Load the engine's model from under `output_path`.
///
/// Returns `Ok(None)` when the engine left no model, which is how it reports
/// an under-constrained problem.
pub fn load_artifact(
    output_path: &Path,
) -> Result<Option<ReconstructionArtifact>, ReconstructionError> {
    let path = artifact_path(output_path);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ReconstructionError::resource(
                format!("Failed to open {}", path.display()),
                e,
            ));
        }
    };

    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|source| ReconstructionError::Artifact { path, source })
}

/// Resolve every triangulated point back to its LED.
///
/// Every LED in `table` gets an entry; LEDs without a point stay absent.
/// A point whose track covers several LEDs is assigned to each of them, and
/// when two points claim the same LED the one with the lower error wins.
pub fn extract(artifact: &ReconstructionArtifact, table: &KeypointTable) -> Extraction {
    let cameras: Vec<CameraPose> = artifact
        .images
        .iter()
        .map(|image| {
            let name = table.name(image.image_id).unwrap_or(&image.name);
            image.pose(name)
        })
        .collect();

    let centers: BTreeMap<ImageId, Vector3<f64>> = cameras
        .iter()
        .map(|camera| (camera.image_id, camera.center()))
        .collect();

    let mut map = LedMap3D::with_absent(table.leds());
    let mut unresolved = 0usize;

    for point in &artifact.points3d {
        let mut leds: Vec<_> = point
            .track
            .iter()
            .filter_map(|element| table.led(element.image_id, element.keypoint_idx))
            .collect();
        leds.sort();
        leds.dedup();

        if leds.is_empty() {
            unresolved += 1;
            continue;
        }
        if leds.len() > 1 {
            warn!(
                "Point {} merges observations of {} different LEDs",
                point.point3d_id,
                leds.len()
            );
        }

        for id in leds {
            let better = map
                .get(id)
                .and_then(|existing| existing.error)
                .is_none_or(|existing_error| point.error < existing_error);
            if better {
                map.insert(id, led_from_point(point, &centers));
            }
        }
    }

    if unresolved > 0 {
        warn!("{} points could not be resolved to an LED", unresolved);
    }

    debug!(
        "[Extract] {} cameras, {} points, {}/{} LEDs triangulated",
        cameras.len(),
        artifact.points3d.len(),
        map.num_present(),
        map.len()
    );

    Extraction { map, cameras }
}

fn led_from_point(point: &ArtifactPoint, centers: &BTreeMap<ImageId, Vector3<f64>>) -> Led3D {
    let position = point.position();
    let mut led = Led3D::triangulated(position);
    led.error = Some(point.error);
    led.normal = view_normal(&position, point, centers);
    led
}

/// Mean unit direction from the point towards the cameras that observed it.
fn view_normal(
    position: &Vector3<f64>,
    point: &ArtifactPoint,
    centers: &BTreeMap<ImageId, Vector3<f64>>,
) -> Option<Vector3<f64>> {
    let mut sum = Vector3::zeros();
    for element in &point.track {
        let Some(center) = centers.get(&element.image_id) else {
            continue;
        };
        let dir = center - position;
        let dist = dir.norm();
        if dist > 1e-10 {
            sum += dir / dist;
        }
    }

    let norm = sum.norm();
    (norm > 1e-10).then(|| sum / norm)
}
