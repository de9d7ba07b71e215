/*!
The collision query provider contract.

The locomotion core never talks to a geometry engine directly. Everything it
needs from the world goes through [`CollisionQuery`], filtered by a
[`LayerMask`]: swept-volume rejection for the TOI broad phase, static capsule
overlap for the TOI narrow phase, and sphere/capsule casts for ground
snapping and obstacle probing. A parry3d-backed implementation over immutable
statics lives in [`crate::world`]; hosts with their own geometry engine
implement this trait instead.

All operations are synchronous and must be deterministic for a static world.
*/

use crate::types::{Quat, Vec3};

/// A bit filter selecting which colliders a query may see.
///
/// Collision layers (what blocks the rolling capsule) and ground layers
/// (what the capsule snaps to) are distinct filters supplied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    /// True if the two masks share at least one layer bit.
    #[inline]
    pub fn intersects(self, other: LayerMask) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for LayerMask {
    type Output = LayerMask;

    #[inline]
    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

/// Opaque handle to a collider owned by the query provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColliderId(pub u32);

/// A single cast hit reported by the provider.
#[derive(Clone, Copy, Debug)]
pub struct CastHit {
    /// World-space contact point.
    pub point: Vec3,
    /// World-space contact normal, oriented to oppose the cast direction.
    pub normal: Vec3,
    /// Travel along the cast direction at which the hit occurred (meters).
    /// Zero when the cast shape starts already touching.
    pub distance: f32,
    /// The collider that was hit.
    pub collider: ColliderId,
}

/// Geometry queries the locomotion core consumes.
///
/// Notes
/// - `radius`/`height` follow the actor convention: `height` is the full
///   capsule height including both caps, so the cylinder half-length is
///   `height / 2 - radius`.
/// - Every operation only considers colliders whose layers intersect
///   `filter`.
pub trait CollisionQuery {
    /// Broad-phase rejection test: does a capsule spanning `from`..`to`,
    /// inflated by `radius`, overlap anything? Callers pass the moving
    /// shape's combined half-length as `radius` so the swept volume encloses
    /// the capsule at any orientation along the motion.
    fn swept_capsule_overlaps(&self, from: Vec3, to: Vec3, radius: f32, filter: LayerMask)
    -> bool;

    /// All colliders overlapping a Y-aligned (in local space) capsule placed
    /// at `center` with orientation `rotation`. Order must be deterministic
    /// for a static world.
    fn capsule_overlaps_at(
        &self,
        center: Vec3,
        rotation: Quat,
        radius: f32,
        height: f32,
        filter: LayerMask,
    ) -> Vec<ColliderId>;

    /// Cast a sphere and report every hit within `max_distance`, ordered by
    /// ascending travel distance.
    fn sphere_cast_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Vec<CastHit>;

    /// Cast a sphere and report the earliest hit, if any.
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Option<CastHit>;

    /// Cast a capsule spanning the segment `point_a`..`point_b` (cap
    /// centers) and report every hit within `max_distance`, ordered by
    /// ascending travel distance. Probes that start near the ground report
    /// the ground at distance zero before anything else, so callers that
    /// look past it need the full list.
    fn capsule_cast_all(
        &self,
        point_a: Vec3,
        point_b: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Vec<CastHit>;

    /// Cast a capsule spanning the segment `point_a`..`point_b` (cap
    /// centers) and report the earliest hit, if any.
    fn capsule_cast(
        &self,
        point_a: Vec3,
        point_b: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Option<CastHit>;

    /// True if a sphere at `center` overlaps any collider.
    fn check_sphere(&self, center: Vec3, radius: f32, filter: LayerMask) -> bool;
}
