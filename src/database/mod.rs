//! Correspondence database synthesis.
//!
//! Turns identity-labelled 2D maps into the keypoints-and-matches database a
//! generic incremental SfM engine expects, plus a [`KeypointTable`] that maps
//! the engine's (image, keypoint) references back to LED identities.

pub mod populate;
pub mod types;

pub use populate::{Correspondences, image_file_name, populate};
pub use types::{CorrespondenceDatabase, DbCamera, DbImage, KeypointTable, PairMatches};
