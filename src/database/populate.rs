//! Correspondence synthesis from identity-labelled 2D maps.
//!
//! Appearance matching is replaced by identity matching:
//! 1. Register one placeholder camera shared by every pseudo-image
//! 2. Register one pseudo-image per 2D map, in input order
//! 3. Register one keypoint per observed LED, in ascending LedId order
//! 4. For every image pair, add one match per LED observed by both
//!
//! An LED seen by k images therefore yields C(k,2) matches, and an LED seen
//! by a single image contributes a keypoint but no match. Nothing is filtered
//! here; outlier handling is left to the engine's thresholds.

use std::collections::HashMap;

use tracing::debug;

use crate::config::PlaceholderCamera;
use crate::error::{MIN_VIEWS, ReconstructionError};
use crate::map::{ImageId, LedId, LedMap2D};

use super::types::{CorrespondenceDatabase, DbCamera, DbImage, KeypointTable, PairMatches};

/// Id of the single shared placeholder camera.
const CAMERA_ID: u32 = 1;

/// Output of synthesis: the database for the engine and the table needed to
/// map the engine's results back to LEDs.
#[derive(Debug, Clone, PartialEq)]
pub struct Correspondences {
    pub database: CorrespondenceDatabase,
    pub keypoints: KeypointTable,
}

/// Placeholder image file name for `image_id`.
pub fn image_file_name(image_id: ImageId) -> String {
    format!("image_{:04}.png", image_id.0)
}

/// Build the correspondence database for `maps`.
///
/// Returns `TooFewViews` for fewer than two maps.
pub fn populate(
    maps: &[LedMap2D],
    camera: &PlaceholderCamera,
) -> Result<Correspondences, ReconstructionError> {
    if maps.len() < MIN_VIEWS {
        return Err(ReconstructionError::TooFewViews { views: maps.len() });
    }

    let mut database = CorrespondenceDatabase {
        cameras: vec![DbCamera::placeholder(CAMERA_ID, camera)],
        ..Default::default()
    };
    let mut keypoints = KeypointTable::default();

    // Per image: LedId -> keypoint index
    let mut keypoint_indices: Vec<HashMap<LedId, u32>> = Vec::with_capacity(maps.len());

    for (view, map) in maps.iter().enumerate() {
        let image_id = ImageId::new(view as u32 + 1);

        let leds: Vec<LedId> = map.ids().collect();
        keypoint_indices.push(
            leds.iter()
                .enumerate()
                .map(|(idx, &id)| (id, idx as u32))
                .collect(),
        );

        database.images.push(DbImage {
            image_id,
            name: image_file_name(image_id),
            camera_id: CAMERA_ID,
            keypoints: map.iter().map(|(_, p)| [p.x, p.y]).collect(),
        });
        keypoints.insert(image_id, map.name.clone(), leds);
    }

    for a in 0..maps.len() {
        for b in (a + 1)..maps.len() {
            let matches: Vec<[u32; 2]> = maps[a]
                .ids()
                .filter_map(|id| {
                    let idx_b = keypoint_indices[b].get(&id)?;
                    Some([keypoint_indices[a][&id], *idx_b])
                })
                .collect();

            if matches.is_empty() {
                continue;
            }

            database.pairs.push(PairMatches {
                image_a: ImageId::new(a as u32 + 1),
                image_b: ImageId::new(b as u32 + 1),
                matches,
            });
        }
    }

    debug!(
        "[Populate] {} images, {} keypoints, {} pairs, {} matches (best pair {})",
        database.num_images(),
        database.num_keypoints(),
        database.pairs.len(),
        database.num_matches(),
        database.max_pair_matches()
    );

    Ok(Correspondences {
        database,
        keypoints,
    })
}
