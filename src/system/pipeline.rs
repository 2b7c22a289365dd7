//! One synchronous reconstruction run.
//!
//! A run stages the correspondence database in a scratch directory, hands it
//! to the engine, extracts the LED map from whatever model the engine left
//! behind and post-processes it. Nothing outlives the run except the map.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cleaning::{fill_gaps, rescale_to_reference};
use crate::config::ReconstructorConfig;
use crate::database::{Correspondences, populate};
use crate::engine::{EngineJob, ReconstructionEngine};
use crate::error::ReconstructionError;
use crate::io::{load_observation_maps, write_led_map_3d};
use crate::map::{LedMap2D, LedMap3D};
use crate::reconstruction::{Extraction, extract, load_artifact};

/// Database file name inside the staging directory.
pub const DATABASE_FILE: &str = "database.json";

/// Placeholder image root inside the staging directory.
const IMAGE_DIR: &str = "images";

/// Engine output root inside the staging directory.
const OUTPUT_DIR: &str = "sparse";

/// A persisted run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub map: LedMap3D,
    pub num_views: usize,
    pub path: PathBuf,
}

/// Reconstruction pipeline: config plus engine.
pub struct Pipeline {
    config: ReconstructorConfig,
    engine: Arc<dyn ReconstructionEngine>,
}

impl Pipeline {
    pub fn new(config: ReconstructorConfig, engine: Arc<dyn ReconstructionEngine>) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &ReconstructorConfig {
        &self.config
    }

    /// Reconstruct `maps` into a 3D LED map.
    ///
    /// Performs no writes outside a private staging directory, which is
    /// removed before returning.
    pub fn process(&self, maps: &[LedMap2D]) -> Result<LedMap3D, ReconstructionError> {
        let correspondences = populate(maps, &self.config.camera)?;

        let best = correspondences.database.max_pair_matches();
        let required = self.config.mapper.min_num_matches;
        if best < required {
            return Err(ReconstructionError::TooFewMatches { best, required });
        }

        let staging = tempfile::Builder::new()
            .prefix("led-sfm-")
            .tempdir()
            .map_err(|e| ReconstructionError::resource("Failed to create staging directory", e))?;

        let extraction = self.run_engine(staging.path(), correspondences)?;

        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directory: {}", e);
        }

        let Extraction {
            mut map,
            mut cameras,
        } = extraction;

        if map.num_present() == 0 {
            return Err(ReconstructionError::NoReconstruction);
        }

        if self.config.rescale {
            match rescale_to_reference(&mut map, &mut cameras, &self.config.scale) {
                Some(factor) => info!("Rescaled reconstruction by {:.6}", factor),
                None => warn!("Scale reference could not be measured, leaving map unscaled"),
            }
        }

        if self.config.interpolate {
            let filled = fill_gaps(&mut map, &self.config.interpolation);
            info!("Interpolated {} missing LEDs", filled);
        }

        Ok(map)
    }

    /// Load every observation map in `directory`, reconstruct, and persist
    /// the result next to them.
    ///
    /// On any error the previously persisted map is left untouched.
    pub fn reload(&self, directory: &Path) -> Result<RunOutput, ReconstructionError> {
        let maps = load_observation_maps(directory).map_err(|e| {
            ReconstructionError::resource(
                format!("Failed to list observation maps in {}", directory.display()),
                e,
            )
        })?;

        info!("Reconstructing from {} observation maps", maps.len());
        let map = self.process(&maps)?;

        let path = directory.join(&self.config.output_file);
        write_led_map_3d(&path, &map).map_err(|e| {
            ReconstructionError::resource(format!("Failed to write {}", path.display()), e)
        })?;

        info!(
            "Wrote {} LEDs ({} absent) to {}",
            map.num_present(),
            map.num_absent(),
            path.display()
        );

        Ok(RunOutput {
            map,
            num_views: maps.len(),
            path,
        })
    }

    fn run_engine(
        &self,
        root: &Path,
        correspondences: Correspondences,
    ) -> Result<Extraction, ReconstructionError> {
        let Correspondences {
            database,
            keypoints,
        } = correspondences;

        let database_path = root.join(DATABASE_FILE);
        let image_path = root.join(IMAGE_DIR);
        let output_path = root.join(OUTPUT_DIR);

        let staging_error =
            |e: std::io::Error| ReconstructionError::resource("Failed to stage engine inputs", e);

        fs::create_dir_all(&image_path).map_err(staging_error)?;
        fs::create_dir_all(&output_path).map_err(staging_error)?;
        database.write_json(&database_path).map_err(staging_error)?;
        // The engine resolves image names against the image root
        for image in &database.images {
            File::create(image_path.join(&image.name)).map_err(staging_error)?;
        }

        debug!(
            "[Pipeline] staged {} images, {} keypoints, {} matches",
            database.num_images(),
            database.num_keypoints(),
            database.num_matches()
        );

        let job = EngineJob {
            database_path: &database_path,
            image_path: &image_path,
            output_path: &output_path,
            options: &self.config.mapper,
        };
        if let Err(e) = self.engine.reconstruct(&job) {
            warn!("Reconstruction engine reported an error: {}", e);
        }

        let artifact = load_artifact(&output_path)?.ok_or(ReconstructionError::NoReconstruction)?;
        Ok(extract(&artifact, &keypoints))
    }
}
