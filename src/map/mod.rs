//! Map module - LED map data structures.
//!
//! This module contains:
//! - [`LedMap2D`] - LEDs seen from one viewpoint, id to image coordinate
//! - [`LedMap3D`] - Reconstructed LEDs, id to optional 3D position
//! - [`CameraPose`] - Recovered viewpoint poses
//!
//! LEDs are addressed by [`LedId`] everywhere; the engine's internal point
//! and track ids never leave the extraction step.

pub mod camera;
pub mod led_map_2d;
pub mod led_map_3d;
pub mod types;

pub use camera::CameraPose;
pub use led_map_2d::LedMap2D;
pub use led_map_3d::{Led3D, LedMap3D, LedSource};
pub use types::{ImageId, LedId};
