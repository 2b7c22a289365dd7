//! Error taxonomy for a reconstruction run.
//!
//! None of these are fatal to the worker. Insufficient data and failed
//! reconstructions are expected under low-data conditions; resource failures
//! are logged louder but handled the same way: no map is persisted and the
//! previous one stays in place.

use std::path::PathBuf;

use thiserror::Error;

/// Minimum number of viewpoints a reconstruction needs.
pub const MIN_VIEWS: usize = 2;

/// Why a run produced no map.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("insufficient data: {views} observation map(s), need at least {min}", min = MIN_VIEWS)]
    TooFewViews { views: usize },

    #[error("insufficient data: best image pair shares {best} LEDs, need {required}")]
    TooFewMatches { best: usize, required: usize },

    #[error("reconstruction engine produced no model")]
    NoReconstruction,

    #[error("malformed reconstruction at {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification used for logging and by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Too few maps or shared LEDs to attempt a reconstruction.
    InsufficientData,
    /// The engine ran but produced nothing usable.
    ReconstructionFailure,
    /// Staging, listing or persisting failed.
    ResourceFailure,
}

impl ReconstructionError {
    pub fn resource(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Resource {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::TooFewViews { .. } | Self::TooFewMatches { .. } => FailureKind::InsufficientData,
            Self::NoReconstruction | Self::Artifact { .. } => FailureKind::ReconstructionFailure,
            Self::Resource { .. } => FailureKind::ResourceFailure,
        }
    }

    pub fn is_insufficient_data(&self) -> bool {
        self.kind() == FailureKind::InsufficientData
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            ReconstructionError::TooFewViews { views: 1 }.kind(),
            FailureKind::InsufficientData
        );
        assert!(ReconstructionError::TooFewMatches { best: 3, required: 9 }.is_insufficient_data());
        assert_eq!(
            ReconstructionError::NoReconstruction.kind(),
            FailureKind::ReconstructionFailure
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            ReconstructionError::resource("staging", io).kind(),
            FailureKind::ResourceFailure
        );
    }

    #[test]
    fn test_messages() {
        let err = ReconstructionError::TooFewViews { views: 1 };
        assert_eq!(
            err.to_string(),
            "insufficient data: 1 observation map(s), need at least 2"
        );
        let err = ReconstructionError::TooFewViews { views: 0 };
        assert!(err.to_string().ends_with(&format!("need at least {}", MIN_VIEWS)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ReconstructionError::resource("Failed to create staging directory", io);
        assert_eq!(err.to_string(), "Failed to create staging directory: gone");
    }
}
