/*!
Core math aliases and the timestamped pose sample.

This module intentionally contains no algorithms. It defines the data
exchanged between:
- the TOI solver (pose-to-pose swept queries)
- the roll integrator (committed pose sequence)
- the roll predictor (scratch poses and prediction anchors)
- presentation sampling (time-indexed interpolation)
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// World up axis. The actor capsule is Y-aligned when upright.
#[inline]
pub fn world_up() -> Vec3 {
    Vec3::y()
}

/// A timestamped rigid pose sample (world space).
///
/// Poses are immutable value types: the simulation never mutates one in
/// place, it constructs a new sample whenever it advances. Each consumer
/// (integrator, predictor, presentation) holds its own copy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Simulation time this sample was taken at (seconds).
    pub time: f32,
    /// World-space position of the capsule center (meters).
    pub translation: Vec3,
    /// World-space orientation of the capsule.
    pub rotation: Quat,
}

impl Pose {
    #[inline]
    pub fn new(time: f32, translation: Vec3, rotation: Quat) -> Self {
        Self {
            time,
            translation,
            rotation,
        }
    }

    /// Identity-orientation pose at the origin, time zero.
    #[inline]
    pub fn identity() -> Self {
        Self {
            time: 0.0,
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }

    /// Same pose re-stamped at a different time.
    #[inline]
    pub fn at_time(&self, time: f32) -> Self {
        Self { time, ..*self }
    }

    /// Convert to nalgebra `Isometry3` for parry3d queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(
            na::Translation3::new(self.translation.x, self.translation.y, self.translation.z),
            self.rotation,
        )
    }

    /// Interpolate between two pose samples at fraction `t` in `[0, 1]`.
    ///
    /// Position is interpolated linearly, rotation spherically, and the
    /// timestamp linearly. `t` is clamped to the unit range.
    pub fn interpolate(a: &Pose, b: &Pose, t: f32) -> Pose {
        let t = t.clamp(0.0, 1.0);
        let rotation = a
            .rotation
            .try_slerp(&b.rotation, t, 1.0e-6)
            .unwrap_or(b.rotation);
        Pose {
            time: a.time + (b.time - a.time) * t,
            translation: a.translation + (b.translation - a.translation) * t,
            rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn interpolate_endpoints_return_inputs() {
        let a = Pose::new(1.0, Vec3::new(1.0, 2.0, 3.0), Quat::identity());
        let b = Pose::new(
            2.0,
            Vec3::new(4.0, 5.0, 6.0),
            Quat::from_axis_angle(&na::Vector3::y_axis(), FRAC_PI_2),
        );

        let at_a = Pose::interpolate(&a, &b, 0.0);
        let at_b = Pose::interpolate(&a, &b, 1.0);

        assert!((at_a.translation - a.translation).norm() < 1.0e-6);
        assert!((at_b.translation - b.translation).norm() < 1.0e-6);
        assert!(at_a.rotation.angle_to(&a.rotation) < 1.0e-5);
        assert!(at_b.rotation.angle_to(&b.rotation) < 1.0e-5);
        assert!((at_a.time - 1.0).abs() < 1.0e-6);
        assert!((at_b.time - 2.0).abs() < 1.0e-6);
    }

    #[test]
    fn interpolate_midpoint_halves_rotation_angle() {
        let a = Pose::identity();
        let b = Pose::new(
            1.0,
            Vec3::new(2.0, 0.0, 0.0),
            Quat::from_axis_angle(&na::Vector3::y_axis(), FRAC_PI_2),
        );

        let mid = Pose::interpolate(&a, &b, 0.5);
        assert!((mid.translation.x - 1.0).abs() < 1.0e-6);
        assert!((mid.rotation.angle() - FRAC_PI_2 * 0.5).abs() < 1.0e-4);
        assert!((mid.time - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn interpolate_clamps_out_of_range_fractions() {
        let a = Pose::identity();
        let b = Pose::new(1.0, Vec3::new(1.0, 0.0, 0.0), Quat::identity());

        let before = Pose::interpolate(&a, &b, -0.5);
        let after = Pose::interpolate(&a, &b, 1.5);

        assert!((before.translation - a.translation).norm() < 1.0e-6);
        assert!((after.translation - b.translation).norm() < 1.0e-6);
    }
}
