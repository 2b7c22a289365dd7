//! Correspondence database records and the keypoint association table.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::PlaceholderCamera;
use crate::map::{ImageId, LedId};

/// Camera registered for the pseudo-images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbCamera {
    pub camera_id: u32,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub params: Vec<f64>,
    /// Whether `params` carry a trusted focal length. Always false here.
    pub prior_focal_length: bool,
}

impl DbCamera {
    pub fn placeholder(camera_id: u32, camera: &PlaceholderCamera) -> Self {
        Self {
            camera_id,
            model: camera.model.clone(),
            width: camera.width,
            height: camera.height,
            params: camera.params(),
            prior_focal_length: false,
        }
    }
}

/// One pseudo-image: a viewpoint and its keypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbImage {
    pub image_id: ImageId,
    /// File name of the placeholder image under the image root.
    pub name: String,
    pub camera_id: u32,
    /// Keypoint coordinates; the index into this list is the keypoint index.
    pub keypoints: Vec<[f64; 2]>,
}

/// Matches between two images, as `[keypoint_idx_a, keypoint_idx_b]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMatches {
    pub image_a: ImageId,
    pub image_b: ImageId,
    pub matches: Vec<[u32; 2]>,
}

/// Synthetic multi-view matching problem handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceDatabase {
    pub cameras: Vec<DbCamera>,
    pub images: Vec<DbImage>,
    pub pairs: Vec<PairMatches>,
}

impl CorrespondenceDatabase {
    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn num_keypoints(&self) -> usize {
        self.images.iter().map(|image| image.keypoints.len()).sum()
    }

    /// Total match edges over all image pairs.
    pub fn num_matches(&self) -> usize {
        self.pairs.iter().map(|pair| pair.matches.len()).sum()
    }

    /// Largest number of matches shared by any single image pair.
    pub fn max_pair_matches(&self) -> usize {
        self.pairs
            .iter()
            .map(|pair| pair.matches.len())
            .max()
            .unwrap_or(0)
    }

    pub fn image(&self, image_id: ImageId) -> Option<&DbImage> {
        self.images.iter().find(|image| image.image_id == image_id)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// A pseudo-image's viewpoint name and the LED behind each keypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEntry {
    pub name: String,
    pub leds: Vec<LedId>,
}

/// Association from (image, keypoint index) back to LED identity.
///
/// Built in the same pass as the database and owned by the run that built it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeypointTable {
    images: BTreeMap<ImageId, ImageEntry>,
}

impl KeypointTable {
    pub fn insert(&mut self, image_id: ImageId, name: impl Into<String>, leds: Vec<LedId>) {
        self.images.insert(
            image_id,
            ImageEntry {
                name: name.into(),
                leds,
            },
        );
    }

    /// LED observed at `keypoint_idx` in `image_id`.
    pub fn led(&self, image_id: ImageId, keypoint_idx: u32) -> Option<LedId> {
        self.images
            .get(&image_id)?
            .leds
            .get(keypoint_idx as usize)
            .copied()
    }

    /// Viewpoint name of `image_id`.
    pub fn name(&self, image_id: ImageId) -> Option<&str> {
        self.images.get(&image_id).map(|entry| entry.name.as_str())
    }

    /// Every LED seen in at least one image.
    pub fn leds(&self) -> BTreeSet<LedId> {
        self.images
            .values()
            .flat_map(|entry| entry.leds.iter().copied())
            .collect()
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }
}
