//! LED structure-from-motion.
//!
//! Reconstructs the 3D positions of individually addressable LEDs from 2D
//! observation maps captured at several viewpoints. Each LED's identity is
//! known in every view, so correspondences are synthesised rather than
//! matched, and a generic incremental SfM engine does the geometry.

pub mod cleaning;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod io;
pub mod map;
pub mod reconstruction;
pub mod system;

#[cfg(test)]
mod test_helpers;
