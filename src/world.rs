/*!
A parry3d-backed collision query provider over immutable world statics.

The locomotion core only consumes the [`CollisionQuery`] trait; this module
is the reference implementation for hosts (and tests) that do not bring
their own geometry engine. Shapes are stored as world-space poses plus
parry3d trait objects, each tagged with the layers it belongs to.

Notes
- Every moving shape used for casts is built with an identity rotation, so
  parry's shape-local witness points and normals translate to world space
  with a pure translation.
- Hit normals follow the sweep convention used throughout the crate: they
  are flipped, when needed, to oppose the cast direction.
*/

use nalgebra as na;
use parry3d::{
    query::{self, ShapeCastOptions},
    shape::{self as pshape, SharedShape},
};

use crate::{
    query::{CastHit, ColliderId, CollisionQuery, LayerMask},
    settings::DIST_EPS,
    types::{Iso, Quat, Vec3},
};

/// One immutable collider: a parry3d shape at a world pose, tagged with the
/// layers it belongs to.
pub struct StaticCollider {
    pub shape: SharedShape,
    pub iso: Iso,
    pub layers: LayerMask,
}

/// Immutable static world. Build once, query many times.
#[derive(Default)]
pub struct StaticWorld {
    colliders: Vec<StaticCollider>,
}

impl StaticWorld {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Add an infinite plane satisfying `normal ⋅ x = dist`.
    pub fn add_plane(&mut self, normal: Vec3, dist: f32, layers: LayerMask) -> ColliderId {
        let unit_n = na::Unit::new_normalize(normal);
        let iso = Iso::from_parts(
            na::Translation3::from(normal.normalize() * dist),
            Quat::identity(),
        );
        self.push(SharedShape::new(pshape::HalfSpace { normal: unit_n }), iso, layers)
    }

    /// Add an oriented box with the given local half-extents.
    pub fn add_cuboid(
        &mut self,
        half_extents: Vec3,
        translation: Vec3,
        rotation: Quat,
        layers: LayerMask,
    ) -> ColliderId {
        let iso = Iso::from_parts(na::Translation3::from(translation), rotation);
        self.push(SharedShape::new(pshape::Cuboid::new(half_extents)), iso, layers)
    }

    /// Add a sphere (rotation irrelevant).
    pub fn add_sphere(&mut self, radius: f32, center: Vec3, layers: LayerMask) -> ColliderId {
        let iso = Iso::from_parts(na::Translation3::from(center), Quat::identity());
        self.push(SharedShape::new(pshape::Ball::new(radius)), iso, layers)
    }

    /// Add a capsule with a Y-aligned local axis. `half_height` is half the
    /// cylinder section, so the total height is `2 * half_height + 2 * radius`.
    pub fn add_capsule(
        &mut self,
        radius: f32,
        half_height: f32,
        translation: Vec3,
        rotation: Quat,
        layers: LayerMask,
    ) -> ColliderId {
        let iso = Iso::from_parts(na::Translation3::from(translation), rotation);
        self.push(
            SharedShape::new(pshape::Capsule::new_y(half_height, radius)),
            iso,
            layers,
        )
    }

    fn push(&mut self, shape: SharedShape, iso: Iso, layers: LayerMask) -> ColliderId {
        let id = ColliderId(self.colliders.len() as u32);
        self.colliders.push(StaticCollider { shape, iso, layers });
        id
    }

    /// Cast a moving shape along `vel` (full travel encoded in the vector)
    /// and return the earliest hit per collider, unsorted.
    fn cast_against(
        &self,
        moving: &dyn pshape::Shape,
        moving_iso: &Iso,
        vel: Vec3,
        filter: LayerMask,
    ) -> Vec<CastHit> {
        let travel = vel.norm();
        if travel <= DIST_EPS {
            return Vec::new();
        }

        let mut opts = ShapeCastOptions::with_max_time_of_impact(1.0);
        opts.stop_at_penetration = true;
        opts.compute_impact_geometry_on_penetration = true;

        let mut hits = Vec::new();
        for (i, c) in self.colliders.iter().enumerate() {
            if !c.layers.intersects(filter) {
                continue;
            }
            if let Ok(Some(hit)) = query::cast_shapes(
                moving_iso,
                &vel,
                moving,
                &c.iso,
                &na::Vector3::zeros(),
                &*c.shape,
                opts,
            ) {
                // Witness point is in the moving shape's local frame at the
                // time of impact; bring it to world space.
                let impact_iso = Iso::from_parts(
                    na::Translation3::from(
                        moving_iso.translation.vector + vel * hit.time_of_impact,
                    ),
                    moving_iso.rotation,
                );
                let point = impact_iso.transform_point(&hit.witness1).coords;

                // Normal on the moving shape; ensure it opposes the motion.
                let mut normal = hit.normal1.into_inner();
                if normal.dot(&vel) > 0.0 {
                    normal = -normal;
                }

                hits.push(CastHit {
                    point,
                    normal,
                    distance: hit.time_of_impact * travel,
                    collider: ColliderId(i as u32),
                });
            }
        }
        hits
    }
}

impl CollisionQuery for StaticWorld {
    fn swept_capsule_overlaps(
        &self,
        from: Vec3,
        to: Vec3,
        radius: f32,
        filter: LayerMask,
    ) -> bool {
        // Degenerate zero-length sweeps collapse to a sphere.
        let swept: SharedShape = if (to - from).norm_squared() <= DIST_EPS * DIST_EPS {
            SharedShape::new(pshape::Ball::new(radius))
        } else {
            SharedShape::new(pshape::Capsule::new(
                na::Point3::from(from),
                na::Point3::from(to),
                radius,
            ))
        };
        let iso = if (to - from).norm_squared() <= DIST_EPS * DIST_EPS {
            Iso::from_parts(na::Translation3::from(from), Quat::identity())
        } else {
            // Segment endpoints are world-space already.
            Iso::identity()
        };

        self.colliders.iter().any(|c| {
            c.layers.intersects(filter)
                && matches!(
                    query::intersection_test(&iso, &*swept, &c.iso, &*c.shape),
                    Ok(true)
                )
        })
    }

    fn capsule_overlaps_at(
        &self,
        center: Vec3,
        rotation: Quat,
        radius: f32,
        height: f32,
        filter: LayerMask,
    ) -> Vec<ColliderId> {
        let capsule = pshape::Capsule::new_y((height * 0.5 - radius).max(0.0), radius);
        let iso = Iso::from_parts(na::Translation3::from(center), rotation);

        let mut out = Vec::new();
        for (i, c) in self.colliders.iter().enumerate() {
            if !c.layers.intersects(filter) {
                continue;
            }
            if matches!(
                query::intersection_test(&iso, &capsule, &c.iso, &*c.shape),
                Ok(true)
            ) {
                out.push(ColliderId(i as u32));
            }
        }
        out
    }

    fn sphere_cast_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Vec<CastHit> {
        let ball = pshape::Ball::new(radius);
        let iso = Iso::from_parts(na::Translation3::from(origin), Quat::identity());
        let mut hits = self.cast_against(&ball, &iso, direction * max_distance, filter);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Option<CastHit> {
        self.sphere_cast_all(origin, radius, direction, max_distance, filter)
            .into_iter()
            .next()
    }

    fn capsule_cast_all(
        &self,
        point_a: Vec3,
        point_b: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Vec<CastHit> {
        let capsule = if (point_b - point_a).norm_squared() <= DIST_EPS * DIST_EPS {
            pshape::Capsule::new(
                na::Point3::from(point_a),
                na::Point3::from(point_a + Vec3::y() * DIST_EPS),
                radius,
            )
        } else {
            pshape::Capsule::new(na::Point3::from(point_a), na::Point3::from(point_b), radius)
        };
        let mut hits = self.cast_against(
            &capsule,
            &Iso::identity(),
            direction * max_distance,
            filter,
        );
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn capsule_cast(
        &self,
        point_a: Vec3,
        point_b: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: LayerMask,
    ) -> Option<CastHit> {
        self.capsule_cast_all(point_a, point_b, radius, direction, max_distance, filter)
            .into_iter()
            .next()
    }

    fn check_sphere(&self, center: Vec3, radius: f32, filter: LayerMask) -> bool {
        let ball = pshape::Ball::new(radius);
        let iso = Iso::from_parts(na::Translation3::from(center), Quat::identity());
        self.colliders.iter().any(|c| {
            c.layers.intersects(filter)
                && matches!(
                    query::intersection_test(&iso, &ball, &c.iso, &*c.shape),
                    Ok(true)
                )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUND: LayerMask = LayerMask(0b01);
    const WALLS: LayerMask = LayerMask(0b10);

    fn flat_world() -> StaticWorld {
        let mut world = StaticWorld::new();
        world.add_plane(Vec3::y(), 0.0, GROUND);
        world
    }

    #[test]
    fn sphere_cast_reports_travel_distance_to_plane() {
        let world = flat_world();

        // Sphere of radius 0.1 starting 1.0 above the plane travels 0.9 down.
        let hit = world
            .sphere_cast(Vec3::new(0.0, 1.0, 0.0), 0.1, -Vec3::y(), 2.0, GROUND)
            .unwrap();
        assert!((hit.distance - 0.9).abs() < 1.0e-4);
        // Normal opposes the downward cast.
        assert!(hit.normal.y > 0.9);
        // Contact point sits on the plane, directly below the origin.
        assert!(hit.point.y.abs() < 1.0e-3);
        assert!(hit.point.x.abs() < 1.0e-3);
    }

    #[test]
    fn casts_respect_layer_filters() {
        let world = flat_world();
        assert!(
            world
                .sphere_cast(Vec3::new(0.0, 1.0, 0.0), 0.1, -Vec3::y(), 2.0, WALLS)
                .is_none()
        );
    }

    #[test]
    fn capsule_overlap_detects_penetration_only() {
        let mut world = flat_world();
        world.add_cuboid(
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(3.0, 0.5, 0.0),
            Quat::identity(),
            WALLS,
        );

        // Standing clear of both shapes.
        let clear = world.capsule_overlaps_at(
            Vec3::new(0.0, 0.7, 0.0),
            Quat::identity(),
            0.25,
            1.0,
            GROUND | WALLS,
        );
        assert!(clear.is_empty());

        // Lowered into the plane.
        let sunk = world.capsule_overlaps_at(
            Vec3::new(0.0, 0.4, 0.0),
            Quat::identity(),
            0.25,
            1.0,
            GROUND | WALLS,
        );
        assert_eq!(sunk.len(), 1);

        // Pushed into the box, but filtered to ground layers only.
        let boxed = world.capsule_overlaps_at(
            Vec3::new(2.6, 0.7, 0.0),
            Quat::identity(),
            0.25,
            1.0,
            GROUND,
        );
        assert!(boxed.is_empty());
    }

    #[test]
    fn swept_capsule_overlap_is_a_coarse_rejection_test() {
        let mut world = StaticWorld::new();
        world.add_cuboid(
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(5.0, 0.0, 0.0),
            Quat::identity(),
            WALLS,
        );

        // Motion passing through the box is caught.
        assert!(world.swept_capsule_overlaps(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            0.75,
            WALLS,
        ));
        // Motion far away is rejected.
        assert!(!world.swept_capsule_overlaps(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(10.0, 5.0, 0.0),
            0.75,
            WALLS,
        ));
        // Degenerate zero-length sweep collapses to a sphere test.
        assert!(!world.swept_capsule_overlaps(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            0.75,
            WALLS,
        ));
    }

    #[test]
    fn check_sphere_matches_overlap_semantics() {
        let world = flat_world();
        assert!(world.check_sphere(Vec3::new(0.0, 0.05, 0.0), 0.1, GROUND));
        assert!(!world.check_sphere(Vec3::new(0.0, 0.2, 0.0), 0.1, GROUND));
    }
}
