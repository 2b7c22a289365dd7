//! Recovered viewpoint poses.

use nalgebra::{UnitQuaternion, Vector3};

use super::types::ImageId;

/// Pose of one viewpoint as recovered by the reconstruction engine.
///
/// Stored world-to-camera (`p_cam = R * p_world + t`), the convention the
/// engine reports in. Use [`CameraPose::center`] for the camera position.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    pub image_id: ImageId,

    /// Viewpoint name (the 2D map's name).
    pub name: String,

    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl CameraPose {
    pub fn new(
        image_id: ImageId,
        name: impl Into<String>,
        rotation: UnitQuaternion<f64>,
        translation: Vector3<f64>,
    ) -> Self {
        Self {
            image_id,
            name: name.into(),
            rotation,
            translation,
        }
    }

    /// Camera centre in world coordinates: `C = -R^T * t`.
    pub fn center(&self) -> Vector3<f64> {
        -(self.rotation.inverse() * self.translation)
    }

    /// Scale the world this pose lives in by `factor`.
    ///
    /// Rotation is scale invariant; scaling the translation scales the centre.
    pub fn scale(&mut self, factor: f64) {
        self.translation *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_identity_rotation() {
        let pose = CameraPose::new(
            ImageId::new(1),
            "a",
            UnitQuaternion::identity(),
            Vector3::new(1.0, -2.0, 3.0),
        );

        assert_relative_eq!(pose.center(), Vector3::new(-1.0, 2.0, -3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_center_rotated() {
        // 90 degrees about Z, camera sitting at (1, 0, 0) in the world
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        let center = Vector3::new(1.0, 0.0, 0.0);
        let translation = -(rotation * center);
        let pose = CameraPose::new(ImageId::new(1), "a", rotation, translation);

        assert_relative_eq!(pose.center(), center, epsilon = 1e-12);
    }

    #[test]
    fn test_scale_moves_center() {
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.3);
        let center = Vector3::new(2.0, 1.0, -4.0);
        let mut pose = CameraPose::new(ImageId::new(2), "b", rotation, -(rotation * center));

        pose.scale(2.5);

        assert_relative_eq!(pose.center(), center * 2.5, epsilon = 1e-12);
    }
}
