/*!
Ground snapping for the rolling capsule.

After each committed sub-step the controller probes straight down from the
active pivot (temp pivot first when one exists), keeps every hit within the
slope limit, takes the closest, and corrects the vertical position so the
reported ground distance equals the configured hover height. Hovering a
little above the surface instead of resting on it keeps overlap queries
from flickering between contact and no-contact.

If no ground is found the pose is returned unchanged: the character holds
position relative to the ground layer. Falling/off-ledge sliding is an
explicit non-goal of this controller (see DESIGN.md).
*/

use crate::{
    pivot::PivotState,
    query::CollisionQuery,
    settings::{DIST_EPS, RollSettings},
    types::{Pose, Vec3, world_up},
};

/// The selected ground contact under the active pivot.
#[derive(Clone, Copy, Debug)]
pub struct GroundHit {
    /// World-space contact point.
    pub point: Vec3,
    /// World-space surface normal (points away from the ground).
    pub normal: Vec3,
    /// Probe travel to the contact (meters).
    pub distance: f32,
}

/// Read-only ground probe from `origin`: downward sphere cast across the
/// ground layers, slope-limit filtered, closest hit wins.
///
/// Shared by the snap correction and the roll predictor (which must not
/// move anything).
pub fn probe(world: &impl CollisionQuery, settings: &RollSettings, origin: Vec3) -> Option<GroundHit> {
    let down = -world_up();
    let hits = world.sphere_cast_all(
        origin,
        settings.ground_search_radius,
        down,
        settings.snap_max_distance,
        settings.ground_layers,
    );

    let mut best: Option<GroundHit> = None;
    for hit in hits {
        let to_hit = hit.point - origin;
        // A hit directly underfoot has no meaningful direction; accept it.
        if to_hit.norm_squared() > DIST_EPS * DIST_EPS {
            let angle = to_hit.angle(&down).to_degrees();
            if angle > settings.slope_limit {
                continue;
            }
        }
        if best.as_ref().map_or(true, |b| hit.distance < b.distance) {
            best = Some(GroundHit {
                point: hit.point,
                normal: hit.normal,
                distance: hit.distance,
            });
        }
    }
    best
}

/// Snap `pose` to the ground under the active pivot.
///
/// Returns the corrected pose (a new sample; the input is never mutated)
/// and the hit used, or the unchanged pose and `None` when the character is
/// airborne relative to the ground layers.
pub fn snap(
    world: &impl CollisionQuery,
    settings: &RollSettings,
    pivots: &PivotState,
    pose: &Pose,
) -> (Pose, Option<GroundHit>) {
    let origin = pivots.rotation_center(pose, settings);
    match probe(world, settings, origin) {
        Some(hit) => {
            // Shift vertically until the probe would report exactly the
            // hover height.
            let correction = settings.hover_height - hit.distance;
            let snapped = Pose::new(
                pose.time,
                pose.translation + world_up() * correction,
                pose.rotation,
            );
            (snapped, Some(hit))
        }
        None => (*pose, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{query::LayerMask, types::Quat, world::StaticWorld};

    const GROUND: LayerMask = LayerMask(0b01);

    fn settings() -> RollSettings {
        RollSettings {
            ground_layers: GROUND,
            ..RollSettings::default()
        }
    }

    fn flat_world() -> StaticWorld {
        let mut world = StaticWorld::new();
        world.add_plane(Vec3::y(), 0.0, GROUND);
        world
    }

    #[test]
    fn snap_restores_exact_hover_height() {
        // Wherever the capsule starts within probe range, the post-snap
        // probe distance equals the configured hover height.
        let world = flat_world();
        let s = settings();
        let pivots = PivotState::default();

        for start_y in [0.62f32, 0.65, 0.7, 0.78] {
            let pose = Pose::new(0.0, Vec3::new(0.0, start_y, 0.0), Quat::identity());
            let (snapped, hit) = snap(&world, &s, &pivots, &pose);
            assert!(hit.is_some(), "expected ground under start_y={start_y}");

            let origin = pivots.rotation_center(&snapped, &s);
            let after = probe(&world, &s, origin).expect("ground after snap");
            assert!(
                (after.distance - s.hover_height).abs() < 1.0e-3,
                "hover violated from start_y={start_y}: {}",
                after.distance
            );
        }
    }

    #[test]
    fn snap_is_identity_when_airborne() {
        let world = flat_world();
        let s = settings();
        let pivots = PivotState::default();

        // Pivot far above the snap search range.
        let pose = Pose::new(0.0, Vec3::new(0.0, 5.0, 0.0), Quat::identity());
        let (snapped, hit) = snap(&world, &s, &pivots, &pose);
        assert!(hit.is_none());
        assert!((snapped.translation - pose.translation).norm() < 1.0e-6);
    }

    #[test]
    fn probe_rejects_hits_outside_the_slope_limit() {
        // A wall face beside the probe produces contacts far off straight
        // down; they must not count as ground.
        let mut world = StaticWorld::new();
        world.add_cuboid(
            Vec3::new(0.5, 2.0, 2.0),
            Vec3::new(0.58, 2.0, 0.0),
            Quat::identity(),
            GROUND,
        );
        let s = settings();

        // Probe origin grazing the wall face at x = 0.08; the cast reports
        // a sideways contact, which fails the straight-down angle check.
        assert!(probe(&world, &s, Vec3::new(0.0, 1.0, 0.0)).is_none());
    }

    #[test]
    fn probe_prefers_the_closest_qualifying_hit() {
        let mut world = flat_world();
        // A thin slab hovering above the plane, directly under the probe.
        world.add_cuboid(
            Vec3::new(0.5, 0.05, 0.5),
            Vec3::new(0.0, 0.3, 0.0),
            Quat::identity(),
            GROUND,
        );
        let s = settings();

        let hit = probe(&world, &s, Vec3::new(0.0, 0.6, 0.0)).expect("slab under probe");
        // The slab top (y = 0.35) is closer than the plane (y = 0).
        assert!((hit.point.y - 0.35).abs() < 0.02);
    }
}
