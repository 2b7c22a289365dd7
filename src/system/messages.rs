//! Messages published by the reconstruction worker.

use std::time::Duration;

use crate::map::LedMap3D;

/// Sent after every successful run, once the map has been persisted.
#[derive(Debug, Clone)]
pub struct MapUpdate {
    /// The map as written to disk.
    pub map: LedMap3D,

    /// Number of observation maps the run used.
    pub num_views: usize,

    /// Wall time of the run, staging through persistence.
    pub elapsed: Duration,
}
