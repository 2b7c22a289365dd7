//! LedMap2D - The LEDs seen from one viewpoint.

use std::collections::BTreeMap;

use nalgebra::Vector2;

use super::types::LedId;

/// Per-viewpoint mapping from LED identity to its 2D image coordinate.
///
/// A map is usually partial: LEDs hidden from this viewpoint are simply absent.
/// Entries are kept in ascending LedId order so that anything derived from the
/// map (keypoint indices in particular) is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct LedMap2D {
    /// Viewpoint name, used as the pseudo-image name in the database.
    pub name: String,

    /// Observed LEDs and their image coordinates.
    points: BTreeMap<LedId, Vector2<f64>>,
}

impl LedMap2D {
    /// Create an empty map for the named viewpoint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: BTreeMap::new(),
        }
    }

    /// Build a map from (id, u, v) triples. Later duplicates replace earlier ones.
    pub fn from_points(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (LedId, Vector2<f64>)>,
    ) -> Self {
        Self {
            name: name.into(),
            points: points.into_iter().collect(),
        }
    }

    /// Record (or replace) an observation.
    pub fn insert(&mut self, id: LedId, point: Vector2<f64>) -> Option<Vector2<f64>> {
        self.points.insert(id, point)
    }

    pub fn get(&self, id: LedId) -> Option<&Vector2<f64>> {
        self.points.get(&id)
    }

    pub fn contains(&self, id: LedId) -> bool {
        self.points.contains_key(&id)
    }

    /// Observations in ascending LedId order.
    pub fn iter(&self) -> impl Iterator<Item = (LedId, &Vector2<f64>)> {
        self.points.iter().map(|(id, p)| (*id, p))
    }

    pub fn ids(&self) -> impl Iterator<Item = LedId> + '_ {
        self.points.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_is_sorted_by_id() {
        let map = LedMap2D::from_points(
            "view",
            [
                (LedId::new(5), Vector2::new(0.5, 0.5)),
                (LedId::new(1), Vector2::new(0.1, 0.1)),
                (LedId::new(3), Vector2::new(0.3, 0.3)),
            ],
        );

        let ids: Vec<LedId> = map.ids().collect();
        assert_eq!(ids, vec![LedId::new(1), LedId::new(3), LedId::new(5)]);
    }

    #[test]
    fn test_insert_replaces_duplicate() {
        let mut map = LedMap2D::new("view");
        assert!(map.insert(LedId::new(0), Vector2::new(1.0, 2.0)).is_none());
        let previous = map.insert(LedId::new(0), Vector2::new(3.0, 4.0));

        assert_eq!(previous, Some(Vector2::new(1.0, 2.0)));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(LedId::new(0)), Some(&Vector2::new(3.0, 4.0)));
    }
}
