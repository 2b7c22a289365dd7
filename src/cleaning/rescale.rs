//! Unit rescaling.
//!
//! The engine reconstructs in an arbitrary gauge. A single scale factor is
//! derived from known reference geometry and applied uniformly to the LEDs
//! and the recovered cameras.

use tracing::debug;

use crate::config::ScaleReference;
use crate::map::{CameraPose, LedMap3D};

/// Multiply every present LED position and every camera by `factor`.
///
/// Absent LEDs stay absent; normals and errors are scale free and untouched.
pub fn rescale(map: &mut LedMap3D, cameras: &mut [CameraPose], factor: f64) {
    for (_, led) in map.present_mut() {
        led.position *= factor;
    }
    for camera in cameras.iter_mut() {
        camera.scale(factor);
    }
}

/// Scale factor that maps the reconstruction onto `reference`.
///
/// Returns None when the reference cannot be measured in this reconstruction
/// or the result would be degenerate.
pub fn scale_factor(
    map: &LedMap3D,
    cameras: &[CameraPose],
    reference: &ScaleReference,
) -> Option<f64> {
    let (measured, target) = match reference {
        ScaleReference::InterLedDistance { target } => (map.median_inter_led_distance()?, *target),
        ScaleReference::CameraBaseline {
            first,
            second,
            distance,
        } => {
            let a = cameras.iter().find(|camera| &camera.name == first)?;
            let b = cameras.iter().find(|camera| &camera.name == second)?;
            ((a.center() - b.center()).norm(), *distance)
        }
    };

    debug!("[Rescale] measured {:.6}, target {:.6}", measured, target);

    if !(measured.is_finite() && measured > f64::EPSILON) {
        return None;
    }
    let factor = target / measured;
    (factor.is_finite() && factor > 0.0).then_some(factor)
}

/// Compute the factor for `reference` and apply it. Returns the factor used.
pub fn rescale_to_reference(
    map: &mut LedMap3D,
    cameras: &mut [CameraPose],
    reference: &ScaleReference,
) -> Option<f64> {
    let factor = scale_factor(map, cameras, reference)?;
    rescale(map, cameras, factor);
    Some(factor)
}
