//! Core ID types shared by the 2D maps, the correspondence database and the 3D map.

use serde::{Deserialize, Serialize};

/// Identity of one physical LED.
///
/// LedIds are stable across viewpoints and across runs on the same structure.
/// Consecutive ids are assumed to be physical neighbours (e.g. along a strip),
/// which is what gap filling relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedId(pub u32);

impl LedId {
    /// Create a new LedId with the given value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Id of the next LED along the strip, if representable.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl std::fmt::Display for LedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LED{}", self.0)
    }
}

/// Identifier of a pseudo-image in the correspondence database.
///
/// ImageIds are 1-based and assigned in the order the 2D maps are handed to
/// the synthesizer, which is also the id space the engine reports poses in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u32);

impl ImageId {
    /// Create a new ImageId with the given value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IMG{}", self.0)
    }
}
