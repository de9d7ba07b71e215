/*!
Time-of-impact solver for pose-to-pose capsule sweeps.

Given an initial and a final pose describing one sub-step of rolling motion
(translation plus rotation), this finds the latest interpolation fraction at
which the capsule is still collision-free.

Algorithm
- Broad phase: one swept-volume overlap test over the whole motion. A miss
  exits early with "no collision" — this is a rejection optimization, not a
  precision step.
- Narrow phase: iterative refinement over the fraction `t ∈ [0, 1]` with a
  geometrically shrinking step (1, 1/4, 1/16, ...). Each proposed fraction
  is accepted only if the statically placed capsule does not overlap
  anything there. This is not bisection: a rejected step never advances the
  accepted fraction, it only shrinks the next proposal.
- Refinement: one directed capsule cast from the contact pose toward the
  final pose to recover a best-effort contact point on the blocking surface.

Precision is bounded by the final step size (`0.25^iterations`), not by a
fixed epsilon; callers needing tighter fractions raise the iteration count.
*/

use crate::{
    query::{CollisionQuery, ColliderId},
    settings::{DIST_EPS, RollSettings},
    types::{Pose, Vec3},
};

/// The blocking collider found by a sweep, with a best-effort contact point.
#[derive(Clone, Copy, Debug)]
pub struct SweepHit {
    /// First collider reported as overlapping past the safe fraction.
    pub collider: ColliderId,
    /// Approximate contact point on the collider surface, if the refinement
    /// cast found one.
    pub point: Option<Vec3>,
}

/// Outcome of a pose-to-pose sweep.
#[derive(Clone, Copy, Debug)]
pub struct SweepResult {
    /// Latest collision-free pose along the interpolation. Equals the final
    /// pose when no collision was found.
    pub contact: Pose,
    /// Accepted safe fraction in `[0, 1]`.
    pub fraction: f32,
    /// `None` is the normal "no collision" outcome, not an error.
    pub hit: Option<SweepHit>,
}

impl SweepResult {
    #[inline]
    fn clear(end: &Pose) -> Self {
        Self {
            contact: *end,
            fraction: 1.0,
            hit: None,
        }
    }
}

/// Sweep the actor capsule from `start` to `end`.
///
/// Deterministic for identical inputs and a static world. When several
/// colliders overlap a rejected fraction, the first reported one is taken
/// as the authoritative blocker (an accepted simplification; this is not a
/// guaranteed closest-hit).
pub fn sweep(
    world: &impl CollisionQuery,
    settings: &RollSettings,
    start: &Pose,
    end: &Pose,
    iterations: u32,
) -> SweepResult {
    // Broad phase: a capsule spanning the travel, inflated to the moving
    // shape's combined half-length, encloses the capsule at any orientation
    // along the motion.
    let swept_radius = (settings.height + 2.0 * settings.radius) * 0.5;
    if !world.swept_capsule_overlaps(
        start.translation,
        end.translation,
        swept_radius,
        settings.collision_layers,
    ) {
        return SweepResult::clear(end);
    }

    // Narrow phase: geometric step refinement.
    let mut contact_t: f32 = 0.0;
    let mut step: f32 = 1.0;
    let mut blocker: Option<ColliderId> = None;

    for _ in 0..iterations {
        let test_t = (contact_t + step).min(1.0);
        let pose = Pose::interpolate(start, end, test_t);
        let overlapping = world.capsule_overlaps_at(
            pose.translation,
            pose.rotation,
            settings.radius,
            settings.height,
            settings.collision_layers,
        );
        match overlapping.first() {
            // No overlap at the proposed fraction: accept it.
            None => contact_t = test_t,
            // Overlap: keep the accepted fraction, remember the blocker,
            // and retry with a smaller step.
            Some(&id) => blocker = Some(id),
        }
        step *= 0.25;
    }

    let Some(collider) = blocker else {
        // The broad phase volume overlapped something, but the capsule
        // itself never did at any tested fraction.
        return SweepResult::clear(end);
    };

    let contact = Pose::interpolate(start, end, contact_t);
    let point = refine_contact_point(world, settings, &contact, end);
    SweepResult {
        contact,
        fraction: contact_t,
        hit: Some(SweepHit { collider, point }),
    }
}

/// One directed cast from the contact pose toward the final pose to find a
/// more specific point on the blocking surface. Best-effort: absent for
/// pure-rotation sub-steps or when the cast finds nothing.
fn refine_contact_point(
    world: &impl CollisionQuery,
    settings: &RollSettings,
    contact: &Pose,
    end: &Pose,
) -> Option<Vec3> {
    let travel = end.translation - contact.translation;
    let len = travel.norm();
    if len <= DIST_EPS {
        return None;
    }
    let dir = travel / len;

    let axis = contact.rotation * Vec3::y();
    let cap = settings.cap_offset();
    let a = contact.translation - axis * cap;
    let b = contact.translation + axis * cap;

    world
        .capsule_cast(
            a,
            b,
            settings.radius,
            dir,
            len + settings.radius,
            settings.collision_layers,
        )
        .map(|hit| hit.point)
}
