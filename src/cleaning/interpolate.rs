//! Gap filling for LEDs that failed to triangulate.
//!
//! Consecutive LedIds are physical neighbours. A run of absent LEDs bounded
//! by present LEDs on both sides is filled along the line between them. The
//! pass is single and deterministic: only LEDs present before the pass act
//! as anchors, so a fill never feeds another fill.

use nalgebra::Vector3;
use tracing::debug;

use crate::config::{BoundaryPolicy, InterpolationStrategy, Weighting};
use crate::map::{Led3D, LedId, LedMap3D};

/// A present LED used as interpolation anchor.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    id: u32,
    position: Vector3<f64>,
    normal: Option<Vector3<f64>>,
}

/// Fill absent LEDs from their neighbours. Returns the number filled.
pub fn fill_gaps(map: &mut LedMap3D, strategy: &InterpolationStrategy) -> usize {
    let anchors: Vec<Anchor> = map
        .present()
        .map(|(id, led)| Anchor {
            id: id.0,
            position: led.position,
            normal: led.normal,
        })
        .collect();

    if anchors.is_empty() {
        return 0;
    }

    let expected_spacing = strategy
        .max_spacing_error
        .and_then(|_| map.median_inter_led_distance());

    let mut fills: Vec<(LedId, Led3D)> = Vec::new();

    for pair in anchors.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let gap = (b.id - a.id - 1) as usize;
        if gap == 0 || gap > strategy.max_gap {
            continue;
        }

        let steps = (gap + 1) as f64;
        if let (Some(max_error), Some(expected)) = (strategy.max_spacing_error, expected_spacing) {
            let spacing = (b.position - a.position).norm() / steps;
            if (spacing - expected).abs() > max_error * expected {
                debug!(
                    "[FillGaps] skipping LED{}..LED{}: spacing {:.4} vs expected {:.4}",
                    a.id, b.id, spacing, expected
                );
                continue;
            }
        }

        for k in 1..=gap {
            let t = weight(k as f64, steps, strategy.weighting);
            let position = a.position.lerp(&b.position, t);
            let normal = blend_normals(a.normal, b.normal, t);
            fills.push((LedId::new(a.id + k as u32), Led3D::interpolated(position, normal)));
        }
    }

    if strategy.boundary == BoundaryPolicy::Extrapolate && anchors.len() >= 2 {
        fills.extend(extrapolate_boundaries(map, &anchors, strategy.max_gap));
    }

    let filled = fills.len();
    for (id, led) in fills {
        map.insert(id, led);
    }

    debug!("[FillGaps] filled {} LEDs", filled);
    filled
}

/// Fraction of the way from the lower to the upper anchor for the LED
/// `k` steps above the lower anchor, with `steps` between the anchors.
fn weight(k: f64, steps: f64, weighting: Weighting) -> f64 {
    match weighting {
        Weighting::Linear => k / steps,
        Weighting::InverseDistance { power } => {
            let w_lower = 1.0 / k.powf(power);
            let w_upper = 1.0 / (steps - k).powf(power);
            w_upper / (w_lower + w_upper)
        }
    }
}

fn blend_normals(
    a: Option<Vector3<f64>>,
    b: Option<Vector3<f64>>,
    t: f64,
) -> Option<Vector3<f64>> {
    match (a, b) {
        (Some(a), Some(b)) => {
            let n = a.lerp(&b, t);
            let norm = n.norm();
            (norm > 1e-10).then(|| n / norm)
        }
        (Some(n), None) | (None, Some(n)) => Some(n),
        (None, None) => None,
    }
}

/// Continue the line through the two outermost anchors on each end, for
/// absent LEDs known to the map and within `max_gap` of the anchor.
fn extrapolate_boundaries(
    map: &LedMap3D,
    anchors: &[Anchor],
    max_gap: usize,
) -> Vec<(LedId, Led3D)> {
    let mut fills = Vec::new();

    let (first, second) = (&anchors[0], &anchors[1]);
    let step = (second.position - first.position) / (second.id - first.id) as f64;
    for id in map.ids().take_while(|id| id.0 < first.id) {
        let distance = (first.id - id.0) as usize;
        if distance <= max_gap {
            let position = first.position - step * distance as f64;
            fills.push((id, Led3D::interpolated(position, first.normal)));
        }
    }

    let (last, before_last) = (&anchors[anchors.len() - 1], &anchors[anchors.len() - 2]);
    let step = (last.position - before_last.position) / (last.id - before_last.id) as f64;
    for id in map.ids().filter(|id| id.0 > last.id) {
        let distance = (id.0 - last.id) as usize;
        if distance <= max_gap {
            let position = last.position + step * distance as f64;
            fills.push((id, Led3D::interpolated(position, last.normal)));
        }
    }

    fills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::LedSource;
    use approx::assert_relative_eq;

    fn map_with(ids: impl IntoIterator<Item = u32>, present: &[(u32, [f64; 3])]) -> LedMap3D {
        let mut map = LedMap3D::with_absent(ids.into_iter().map(LedId::new));
        for &(id, [x, y, z]) in present {
            map.insert(LedId::new(id), Led3D::triangulated(Vector3::new(x, y, z)));
        }
        map
    }

    #[test]
    fn test_fills_bounded_gap() {
        let mut map = map_with(1..=5, &[(1, [0.0, 0.0, 0.0]), (5, [4.0, 8.0, 0.0])]);

        let filled = fill_gaps(&mut map, &InterpolationStrategy::default());

        assert_eq!(filled, 3);
        assert_eq!(map.num_absent(), 0);
        assert_relative_eq!(map.position(LedId::new(2)).unwrap(), Vector3::new(1.0, 2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(map.position(LedId::new(3)).unwrap(), Vector3::new(2.0, 4.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(map.position(LedId::new(4)).unwrap(), Vector3::new(3.0, 6.0, 0.0), epsilon = 1e-12);
        assert_eq!(map.get(LedId::new(3)).unwrap().source, LedSource::Interpolated);
        assert_eq!(map.get(LedId::new(1)).unwrap().source, LedSource::Triangulated);
    }

    #[test]
    fn test_fills_ids_missing_from_map() {
        // LEDs 1..=3 were never observed at all
        let mut map = map_with([], &[(0, [0.0, 0.0, 0.0]), (4, [4.0, 0.0, 0.0])]);

        assert_eq!(fill_gaps(&mut map, &InterpolationStrategy::default()), 3);
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn test_leave_absent_boundary() {
        let mut map = map_with(1..=4, &[(2, [0.0, 0.0, 0.0]), (3, [1.0, 0.0, 0.0])]);

        let filled = fill_gaps(&mut map, &InterpolationStrategy::default());

        assert_eq!(filled, 0);
        assert!(!map.is_present(LedId::new(1)));
        assert!(!map.is_present(LedId::new(4)));
    }

    #[test]
    fn test_extrapolate_boundary() {
        let mut map = map_with(0..=5, &[
            (2, [2.0, 0.0, 0.0]),
            (3, [3.0, 0.0, 0.0]),
            (4, [4.0, 1.0, 0.0]),
        ]);
        let strategy = InterpolationStrategy {
            boundary: BoundaryPolicy::Extrapolate,
            ..InterpolationStrategy::default()
        };

        let filled = fill_gaps(&mut map, &strategy);

        assert_eq!(filled, 3);
        assert_relative_eq!(map.position(LedId::new(1)).unwrap(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(map.position(LedId::new(0)).unwrap(), Vector3::new(0.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(map.position(LedId::new(5)).unwrap(), Vector3::new(5.0, 2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_extrapolate_needs_two_anchors() {
        let mut map = map_with(0..=2, &[(1, [1.0, 0.0, 0.0])]);
        let strategy = InterpolationStrategy {
            boundary: BoundaryPolicy::Extrapolate,
            ..InterpolationStrategy::default()
        };

        assert_eq!(fill_gaps(&mut map, &strategy), 0);
    }

    #[test]
    fn test_gap_longer_than_max_is_kept() {
        let mut map = map_with(0..=7, &[(0, [0.0, 0.0, 0.0]), (7, [7.0, 0.0, 0.0])]);
        let strategy = InterpolationStrategy {
            max_gap: 5,
            ..InterpolationStrategy::default()
        };

        assert_eq!(fill_gaps(&mut map, &strategy), 0);
        assert_eq!(map.num_absent(), 6);
    }

    #[test]
    fn test_single_pass_does_not_chain() {
        // Gap 1..=6 is too long; filling never creates new anchors mid-pass.
        let mut map = map_with(0..=9, &[
            (0, [0.0, 0.0, 0.0]),
            (7, [7.0, 0.0, 0.0]),
            (9, [9.0, 0.0, 0.0]),
        ]);
        let strategy = InterpolationStrategy {
            max_gap: 5,
            ..InterpolationStrategy::default()
        };

        assert_eq!(fill_gaps(&mut map, &strategy), 1);
        assert!(map.is_present(LedId::new(8)));
        assert!(!map.is_present(LedId::new(6)));
    }

    #[test]
    fn test_inverse_distance_power_one_is_linear() {
        for k in 1..4 {
            assert_relative_eq!(
                weight(k as f64, 4.0, Weighting::InverseDistance { power: 1.0 }),
                weight(k as f64, 4.0, Weighting::Linear),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_inverse_distance_pulls_towards_nearer_anchor() {
        let mut map = map_with(0..=4, &[(0, [0.0, 0.0, 0.0]), (4, [4.0, 0.0, 0.0])]);
        let strategy = InterpolationStrategy {
            weighting: Weighting::InverseDistance { power: 2.0 },
            ..InterpolationStrategy::default()
        };

        assert_eq!(fill_gaps(&mut map, &strategy), 3);
        // Middle stays in the middle, the others move towards their nearer anchor
        assert_relative_eq!(map.position(LedId::new(2)).unwrap().x, 2.0, epsilon = 1e-12);
        assert!(map.position(LedId::new(1)).unwrap().x < 1.0);
        assert!(map.position(LedId::new(3)).unwrap().x > 3.0);
    }

    #[test]
    fn test_spacing_check_rejects_implausible_gap() {
        // Regular spacing of 1, except the gap 3..=5 which spans 20 units.
        let mut map = map_with(0..=8, &[
            (0, [0.0, 0.0, 0.0]),
            (1, [1.0, 0.0, 0.0]),
            (2, [2.0, 0.0, 0.0]),
            (3, [3.0, 0.0, 0.0]),
            (5, [23.0, 0.0, 0.0]),
            (6, [24.0, 0.0, 0.0]),
            (8, [26.0, 0.0, 0.0]),
        ]);
        let strategy = InterpolationStrategy {
            max_spacing_error: Some(0.2),
            ..InterpolationStrategy::default()
        };

        assert_eq!(fill_gaps(&mut map, &strategy), 1);
        assert!(!map.is_present(LedId::new(4)));
        assert_relative_eq!(map.position(LedId::new(7)).unwrap().x, 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normals_are_blended() {
        let mut map = LedMap3D::new();
        let mut a = Led3D::triangulated(Vector3::new(0.0, 0.0, 0.0));
        a.normal = Some(Vector3::new(1.0, 0.0, 0.0));
        let mut b = Led3D::triangulated(Vector3::new(2.0, 0.0, 0.0));
        b.normal = Some(Vector3::new(0.0, 1.0, 0.0));
        map.insert(LedId::new(0), a);
        map.insert(LedId::new(2), b);

        fill_gaps(&mut map, &InterpolationStrategy::default());

        let normal = map.get(LedId::new(1)).unwrap().normal.unwrap();
        let s = 0.5_f64.sqrt();
        assert_relative_eq!(normal, Vector3::new(s, s, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_map() {
        let mut map = map_with(0..3, &[]);
        assert_eq!(fill_gaps(&mut map, &InterpolationStrategy::default()), 0);
    }
}
