//! Polling change detection for the observation directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use super::led_csv::is_observation_file;

/// Modification state of one observation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

type Signature = BTreeMap<String, FileStamp>;

/// Detects additions, removals and modifications of observation maps.
///
/// Only `led_map_2d_*.csv` files contribute to the signature, so persisting
/// the 3D map into the same directory never counts as a change.
#[derive(Debug)]
pub struct DirectoryMonitor {
    directory: PathBuf,
    last: Signature,
}

impl DirectoryMonitor {
    /// Start monitoring `directory`. The current contents become the baseline.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        let directory = directory.into();
        let last = signature(&directory);
        Self { directory, last }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of observation files in the last recorded signature.
    pub fn num_files(&self) -> usize {
        self.last.len()
    }

    /// Whether the directory changed since the previous call.
    ///
    /// The recorded signature is replaced on every call, so a change is
    /// reported exactly once.
    pub fn has_changed(&mut self) -> bool {
        let current = signature(&self.directory);
        let changed = current != self.last;
        self.last = current;
        changed
    }
}

fn signature(directory: &Path) -> Signature {
    let mut signature = Signature::new();

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", directory.display(), e);
            return signature;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !is_observation_file(&path) {
            continue;
        }
        // Files can vanish between listing and stat; they show up next call.
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        signature.insert(
            name,
            FileStamp {
                modified: metadata.modified().ok(),
                len: metadata.len(),
            },
        );
    }

    signature
}
