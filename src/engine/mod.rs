//! Reconstruction engine boundary.
//!
//! The incremental SfM engine is an external collaborator. The pipeline hands
//! it a database file, an image root and an output directory, then looks for
//! the artifact at [`artifact_path`]. Whether the engine returned an error or
//! not, only the artifact decides success: under-constrained geometry is a
//! normal outcome that simply leaves no model behind.

pub mod artifact;
pub mod command;

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

use crate::config::MapperOptions;

pub use artifact::{
    ARTIFACT_FILE, ArtifactImage, ArtifactPoint, ReconstructionArtifact, TrackElement,
    artifact_path,
};
pub use command::CommandEngine;

/// Inputs of one engine invocation.
#[derive(Debug, Clone, Copy)]
pub struct EngineJob<'a> {
    pub database_path: &'a Path,
    pub image_path: &'a Path,
    pub output_path: &'a Path,
    pub options: &'a MapperOptions,
}

/// Failure reported by an engine invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine exited with {status}")]
    Exit { status: ExitStatus },

    #[error("engine timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("engine io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// An incremental structure-from-motion engine.
///
/// Implementations must write their model to `artifact_path(job.output_path)`
/// on success and must not panic on degenerate input.
pub trait ReconstructionEngine: Send + Sync {
    fn reconstruct(&self, job: &EngineJob<'_>) -> Result<(), EngineError>;
}
