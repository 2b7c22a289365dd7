//! CSV readers and writers for LED maps.
//!
//! 2D maps: `led_map_2d_<view>.csv` with header `index,u,v`.
//! 3D map:  `led_map_3d.csv` with header `index,x,y,z,xn,yn,zn,error`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, Trim};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::map::{Led3D, LedId, LedMap2D, LedMap3D};

/// File name prefix of per-viewpoint observation maps.
pub const OBSERVATION_PREFIX: &str = "led_map_2d_";

/// File extension shared by all LED map files.
pub const MAP_EXTENSION: &str = "csv";

#[derive(Debug, Deserialize)]
struct Row2D {
    index: u32,
    u: f64,
    v: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Row3D {
    index: u32,
    x: f64,
    y: f64,
    z: f64,
    xn: Option<f64>,
    yn: Option<f64>,
    zn: Option<f64>,
    error: Option<f64>,
}

impl Row3D {
    fn from_led(id: LedId, led: &Led3D) -> Self {
        Self {
            index: id.0,
            x: led.position.x,
            y: led.position.y,
            z: led.position.z,
            xn: led.normal.map(|n| n.x),
            yn: led.normal.map(|n| n.y),
            zn: led.normal.map(|n| n.z),
            error: led.error,
        }
    }

    fn into_led(self) -> (LedId, Led3D) {
        let normal = match (self.xn, self.yn, self.zn) {
            (Some(x), Some(y), Some(z)) => Some(Vector3::new(x, y, z)),
            _ => None,
        };
        let mut led = Led3D::triangulated(Vector3::new(self.x, self.y, self.z));
        led.normal = normal;
        led.error = self.error;
        (LedId::new(self.index), led)
    }
}

/// Whether `path` names a per-viewpoint observation map.
pub fn is_observation_file(path: &Path) -> bool {
    let has_prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(OBSERVATION_PREFIX));
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MAP_EXTENSION));
    has_prefix && has_extension
}

/// Observation map files in `dir`, sorted by file name.
pub fn observation_files<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_observation_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load one 2D map. The map is named after the file stem.
pub fn load_led_map_2d<P: AsRef<Path>>(path: P) -> Result<LedMap2D> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("Invalid file name {}", path.display()))?;

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut map = LedMap2D::new(name);
    for row in rdr.deserialize::<Row2D>() {
        let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
        if !(row.u.is_finite() && row.v.is_finite()) {
            continue;
        }
        map.insert(LedId::new(row.index), Vector2::new(row.u, row.v));
    }

    if map.is_empty() {
        bail!("{} contains no LEDs", path.display());
    }
    Ok(map)
}

/// Load every valid observation map in `dir`, in file name order.
///
/// Unreadable or empty files are skipped with a warning: one bad capture
/// should not block reconstruction from the others. Only listing `dir`
/// itself can fail.
pub fn load_observation_maps<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<LedMap2D>> {
    let mut maps = Vec::new();
    for path in observation_files(dir)? {
        match load_led_map_2d(&path) {
            Ok(map) => {
                debug!("Loaded {} with {} LEDs", map.name, map.len());
                maps.push(map);
            }
            Err(e) => warn!("Skipping observation map: {:#}", e),
        }
    }
    Ok(maps)
}

/// Write the present LEDs of `map` to `path`, replacing it atomically.
///
/// The rows go to a temporary file in the same directory which is synced
/// and then renamed over `path`, so readers see either the old or the new
/// file, never a partial one.
pub fn write_led_map_3d<P: AsRef<Path>>(path: P, map: &LedMap3D) -> std::io::Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::Builder::new()
        .prefix(".led_map_3d")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file_mut());
        for (id, led) in map.present() {
            writer.serialize(Row3D::from_led(id, led))?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a persisted 3D map. Every row becomes a present, triangulated LED.
pub fn load_led_map_3d<P: AsRef<Path>>(path: P) -> Result<LedMap3D> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut map = LedMap3D::new();
    for row in rdr.deserialize::<Row3D>() {
        let (id, led) = row
            .with_context(|| format!("Malformed row in {}", path.display()))?
            .into_led();
        map.insert(id, led);
    }
    Ok(map)
}
