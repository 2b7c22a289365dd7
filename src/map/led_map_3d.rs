//! LedMap3D - The reconstructed LED positions.
//!
//! Every LED known to a run has an entry. Entries are `None` when the LED
//! failed to triangulate; the post-processing stages rescale present entries
//! and may fill absent ones in place.

use std::collections::BTreeMap;

use nalgebra::Vector3;

use super::types::LedId;

/// How a present position was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedSource {
    /// Triangulated by the reconstruction engine.
    Triangulated,
    /// Filled in from neighbouring LEDs after reconstruction.
    Interpolated,
}

/// A single reconstructed LED.
#[derive(Debug, Clone, PartialEq)]
pub struct Led3D {
    /// Position in the reconstruction frame.
    pub position: Vector3<f64>,

    /// Unit vector pointing from the LED towards the cameras that saw it.
    pub normal: Option<Vector3<f64>>,

    /// Mean reprojection error reported by the engine, in image units.
    pub error: Option<f64>,

    pub source: LedSource,
}

impl Led3D {
    /// A triangulated LED with no normal or error attached yet.
    pub fn triangulated(position: Vector3<f64>) -> Self {
        Self {
            position,
            normal: None,
            error: None,
            source: LedSource::Triangulated,
        }
    }

    pub fn interpolated(position: Vector3<f64>, normal: Option<Vector3<f64>>) -> Self {
        Self {
            position,
            normal,
            error: None,
            source: LedSource::Interpolated,
        }
    }
}

/// Mapping from LED identity to an optional 3D position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedMap3D {
    leds: BTreeMap<LedId, Option<Led3D>>,
}

impl LedMap3D {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map where every given LED is known but absent.
    pub fn with_absent(ids: impl IntoIterator<Item = LedId>) -> Self {
        Self {
            leds: ids.into_iter().map(|id| (id, None)).collect(),
        }
    }

    /// Set a present entry, returning the previous one if it was present.
    pub fn insert(&mut self, id: LedId, led: Led3D) -> Option<Led3D> {
        self.leds.insert(id, Some(led)).flatten()
    }

    /// Register an LED as known but absent, keeping it if already present.
    pub fn insert_absent(&mut self, id: LedId) {
        self.leds.entry(id).or_insert(None);
    }

    /// Present entry for `id`, if any.
    pub fn get(&self, id: LedId) -> Option<&Led3D> {
        self.leds.get(&id).and_then(Option::as_ref)
    }

    pub fn position(&self, id: LedId) -> Option<Vector3<f64>> {
        self.get(id).map(|led| led.position)
    }

    /// Whether the map has an entry (present or absent) for `id`.
    pub fn contains(&self, id: LedId) -> bool {
        self.leds.contains_key(&id)
    }

    pub fn is_present(&self, id: LedId) -> bool {
        self.get(id).is_some()
    }

    /// All known ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = LedId> + '_ {
        self.leds.keys().copied()
    }

    /// All entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (LedId, Option<&Led3D>)> {
        self.leds.iter().map(|(id, led)| (*id, led.as_ref()))
    }

    /// Present entries in ascending id order.
    pub fn present(&self) -> impl Iterator<Item = (LedId, &Led3D)> {
        self.leds
            .iter()
            .filter_map(|(id, led)| led.as_ref().map(|led| (*id, led)))
    }

    pub fn present_mut(&mut self) -> impl Iterator<Item = (LedId, &mut Led3D)> {
        self.leds
            .iter_mut()
            .filter_map(|(id, led)| led.as_mut().map(|led| (*id, led)))
    }

    /// Ids known to the map but without a position.
    pub fn absent_ids(&self) -> impl Iterator<Item = LedId> + '_ {
        self.leds
            .iter()
            .filter(|(_, led)| led.is_none())
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    pub fn num_present(&self) -> usize {
        self.leds.values().filter(|led| led.is_some()).count()
    }

    pub fn num_absent(&self) -> usize {
        self.len() - self.num_present()
    }

    /// Median distance between consecutive present LEDs (id n and n + 1).
    ///
    /// Returns None when no two consecutive LEDs are both present.
    pub fn median_inter_led_distance(&self) -> Option<f64> {
        let mut distances: Vec<f64> = self
            .present()
            .filter_map(|(id, led)| {
                let next = self.get(id.next()?)?;
                Some((next.position - led.position).norm())
            })
            .collect();

        if distances.is_empty() {
            return None;
        }

        distances.sort_by(|a, b| a.total_cmp(b));
        let mid = distances.len() / 2;
        if distances.len() % 2 == 0 {
            Some(0.5 * (distances[mid - 1] + distances[mid]))
        } else {
            Some(distances[mid])
        }
    }
}
