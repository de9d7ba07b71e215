/*!
End-of-roll pose prediction.

The committed pose is the truth, but it moves in possibly several sub-steps
per tick and is visually noisy. External stabilizers (a follow camera, for
example) instead track the predicted end-of-roll pose, recomputed whenever a
roll begins or a temp pivot changes the rotation center, and interpolate
toward it by wall-clock time.

The computation is side-effect-free by construction: it samples a read-only
ground probe for the surface normal, applies the remaining rotation to a
scratch copy of the current pose, and returns the sample. The committed
pose is never touched.
*/

use nalgebra as na;

use crate::{
    ground,
    pivot::PivotState,
    query::CollisionQuery,
    settings::{DIST_EPS, RollSettings},
    types::{Pose, Quat, Vec3, world_up},
};

/// The pair of prediction anchors published to external consumers.
///
/// `start` is the previous prediction target, retained as the start-of-roll
/// anchor; `target` is the predicted end of the current roll. Presentation
/// samples interpolate between the two by elapsed time.
#[derive(Clone, Copy, Debug)]
pub struct RollPrediction {
    pub start: Pose,
    pub target: Pose,
}

impl RollPrediction {
    /// Both anchors collapsed onto one pose (used at initialization, before
    /// any roll exists).
    #[inline]
    pub fn pinned(pose: Pose) -> Self {
        Self {
            start: pose,
            target: pose,
        }
    }

    /// Sample the stabilized pose at wall-clock time `now` (seconds, same
    /// clock as the pose timestamps).
    pub fn sample(&self, now: f32) -> Pose {
        let span = self.target.time - self.start.time;
        if span <= DIST_EPS {
            return self.target;
        }
        Pose::interpolate(&self.start, &self.target, (now - self.start.time) / span)
    }
}

/// Compute the pose at the end of the current roll without committing it.
///
/// Remaining rotation is the rising contribution (angle left to bring the
/// local axis upright, when rising) plus the falling contribution (angle
/// from world-up to the roll direction projected onto the ground plane).
/// The zero-initial-velocity kinematic relation `θ = ½·a·t²` gives the
/// time-to-target from `angular_accel`.
pub fn predict_roll_end(
    world: &impl CollisionQuery,
    settings: &RollSettings,
    pivots: &PivotState,
    pose: &Pose,
    roll_direction: Vec3,
    anim_rising: bool,
    angular_accel: f32,
) -> Pose {
    if angular_accel <= 0.0 || roll_direction.norm_squared() <= DIST_EPS * DIST_EPS {
        return *pose;
    }

    let up = world_up();
    let center = pivots.rotation_center(pose, settings);
    let local_up = {
        let v = pivots.other_position(pose, settings) - center;
        let len = v.norm();
        if len <= DIST_EPS { up } else { v / len }
    };

    // Ground normal from the read-only probe; world up when airborne.
    let normal = ground::probe(world, settings, center)
        .map(|hit| hit.normal)
        .unwrap_or(up);

    // Roll direction projected onto the ground plane.
    let projected = {
        let p = roll_direction - normal * roll_direction.dot(&normal);
        let len = p.norm();
        if len <= DIST_EPS { roll_direction } else { p / len }
    };

    let rising_deg = if anim_rising {
        local_up.angle(&up).to_degrees()
    } else {
        0.0
    };
    let falling_deg = up.angle(&projected).to_degrees();
    let remaining_deg = rising_deg + falling_deg;

    // θ = ½·a·t², starting from zero angular velocity.
    let time_to_end = (2.0 * remaining_deg / angular_accel).sqrt();

    // Apply the remaining rotation to a scratch copy around the rotation
    // center: first finish rising, then fall toward the projected roll
    // direction.
    let rise_q = if anim_rising {
        rotation_between_or_identity(local_up, up)
    } else {
        Quat::identity()
    };
    let fall_q = rotation_between_or_identity(up, projected);
    let delta = fall_q * rise_q;

    Pose::new(
        pose.time + time_to_end,
        center + delta * (pose.translation - center),
        delta * pose.rotation,
    )
}

/// `rotation_between` with the antiparallel case resolved about world up.
fn rotation_between_or_identity(from: Vec3, to: Vec3) -> Quat {
    Quat::rotation_between(&from, &to).unwrap_or_else(|| {
        Quat::from_axis_angle(&na::Vector3::y_axis(), std::f32::consts::PI)
    })
}
