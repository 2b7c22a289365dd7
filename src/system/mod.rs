//! Reconstruction orchestration and thread management.
//!
//! This module contains the [`Pipeline`] that performs one synchronous run
//! and the [`Reconstructor`] that drives it from a background thread, along
//! with shared run state and the update messages the worker publishes.

pub mod messages;
pub mod pipeline;
mod reconstructor;
pub mod shared_state;

pub use crate::error::{FailureKind, ReconstructionError};
pub use messages::MapUpdate;
pub use pipeline::{Pipeline, RunOutput};
pub use reconstructor::Reconstructor;
pub use shared_state::{SharedState, WorkerState};
