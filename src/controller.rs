/*!
The roll integrator: a fixed-timestep controller that rolls a capsule by
pivoting it alternately on its two tips.

Per simulation tick the controller:
- starts a roll if none is active (non-zero move input required),
- repeatedly steps the rotation toward its phase target (upright while
  rising, the roll direction while falling) around the active pivot,
- resolves mid-step collisions with the TOI solver, committing the pose at
  the safe fraction and classifying the obstacle (crest flip, step climb,
  or wall stop),
- snaps to ground after every committed step,
- and accelerates the angular velocity once per tick.

The sub-step loop is bounded by a hard attempt cap so a tick always
terminates; running out of attempts with residual time is reported with a
warning and the tick simply ends early (the pose may visually penetrate
geometry for one tick). A wall stop (case 3) zeroes the angular velocity
and ends the tick: angular progress never silently continues through
geometry.

The caller owns the loop: `simulate_tick` at a fixed rate on the simulation
side, `sample_presentation` at whatever rate the presentation side runs.
Neither suspends or blocks.
*/

use nalgebra as na;

use crate::{
    ground,
    pivot::PivotState,
    predict::{self, RollPrediction},
    query::CollisionQuery,
    settings::{
        ANGLE_EPS_DEG, DIST_EPS, MAX_SUBSTEP_ATTEMPTS, MIN_INPUT_SQ, RollSettings, SettingsError,
        TIME_EPS,
    },
    toi,
    types::{Pose, Quat, Vec3, world_up},
};

/// Locomotion state machine.
///
/// `Slowing` and `Midair` are declared for hosts that want to reserve them,
/// but no implemented transition enters either: deceleration tails and
/// jump/air locomotion are out of scope (see DESIGN.md).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RollState {
    #[default]
    Idle,
    Rolling,
    Slowing,
    Midair,
}

/// Raw locomotion input for one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveInput {
    /// 2D move vector (x = strafe, y = forward). Zero means "no input".
    pub axes: na::Vector2<f32>,
    /// Camera yaw about world up (radians).
    pub camera_yaw: f32,
}

impl MoveInput {
    #[inline]
    pub fn new(axes: na::Vector2<f32>, camera_yaw: f32) -> Self {
        Self { axes, camera_yaw }
    }

    /// World-space move direction: the normalized move vector mapped into
    /// the ground plane and rotated by the camera yaw about world up.
    /// `None` when there is no meaningful input; zero input never starts a
    /// roll.
    pub fn world_direction(&self) -> Option<Vec3> {
        if self.axes.norm_squared() < MIN_INPUT_SQ {
            return None;
        }
        let flat = Vec3::new(self.axes.x, 0.0, self.axes.y).normalize();
        let yaw = Quat::from_axis_angle(&na::Vector3::y_axis(), self.camera_yaw);
        Some(yaw * flat)
    }
}

/// Classification of a mid-roll collision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Obstacle {
    /// Case 1: the roll crested over the pivot; begin the next roll.
    Flip,
    /// Case 2: a climbable ledge; anchor a temp pivot at this point.
    Step(Vec3),
    /// Case 3: a wall; stop angular progress for this tick.
    Blocked,
}

/// Decide what a mid-roll collision means.
///
/// `local_up` is the pre-step pivot axis and `step_rotation` the attempted
/// rotation; the forward probe direction is the component of the swung axis
/// perpendicular to `local_up` (i.e. `cross(cross(localUp, swung), localUp)`).
pub(crate) fn classify_obstacle(
    world: &impl CollisionQuery,
    settings: &RollSettings,
    pose: &Pose,
    pivots: &PivotState,
    local_up: Vec3,
    step_rotation: Quat,
    roll_direction: Vec3,
) -> Obstacle {
    let up = world_up();
    let pivot = pivots.pivot_position(pose, settings);
    let other = pivots.other_position(pose, settings);

    let forward = {
        let swung = step_rotation * local_up;
        let perp = swung - local_up * local_up.dot(&swung);
        let len = perp.norm();
        if len <= DIST_EPS {
            roll_direction
        } else {
            perp / len
        }
    };

    // Case 1: crest. A short probe from the opposite pivot finds ground
    // below it, and the roll has tipped far enough that the pivot axis is
    // within the slope limit of the roll direction.
    if let Some(hit) = world.sphere_cast(
        other,
        settings.radius,
        forward,
        settings.probe_distance,
        settings.collision_layers,
    ) {
        let to_hit = hit.point - other;
        let below_angle = if to_hit.norm_squared() <= DIST_EPS * DIST_EPS {
            0.0
        } else {
            to_hit.angle(&-up).to_degrees()
        };
        let tipped_angle = roll_direction.angle(&local_up).to_degrees();
        if below_angle < settings.slope_limit && tipped_angle < settings.slope_limit {
            return Obstacle::Flip;
        }
    }

    // Case 2: step climb. A capsule probe spanning the two pivots finds an
    // obstacle past the active pivot that is low enough to roll over. The
    // probe grazes the ground whenever the actor is grounded, so walk every
    // hit and take the first qualifying one.
    for hit in world.capsule_cast_all(
        pivot,
        other,
        settings.radius,
        forward,
        settings.probe_distance,
        settings.collision_layers,
    ) {
        let along_axis = (hit.point - pivot).dot(&local_up);
        let rise = (hit.point - pivot).dot(&up);
        let below_center = hit.point.y < pose.translation.y;
        if along_axis > 0.0 && (rise <= settings.step_limit || below_center) {
            return Obstacle::Step(hit.point);
        }
    }

    // Case 3: wall.
    Obstacle::Blocked
}

/// Rotate `from` toward `to` by at most `max_deg` degrees.
fn rotate_towards(from: Vec3, to: Vec3, max_deg: f32) -> Vec3 {
    let angle = from.angle(&to).to_degrees();
    if angle <= max_deg {
        return to;
    }
    match Quat::rotation_between(&from, &to) {
        Some(full) => {
            let axis = full
                .axis()
                .unwrap_or(na::Vector3::y_axis());
            Quat::from_axis_angle(&axis, max_deg.to_radians()) * from
        }
        // Antiparallel: steer about world up.
        None => Quat::from_axis_angle(&na::Vector3::y_axis(), max_deg.to_radians()) * from,
    }
}

/// `rotation_between` with the antiparallel case resolved about an axis
/// perpendicular to `from` (using `hint` to pick it).
fn rotation_between_or_flip(from: Vec3, to: Vec3, hint: Vec3) -> Quat {
    Quat::rotation_between(&from, &to).unwrap_or_else(|| {
        let axis = na::Unit::try_new(from.cross(&hint), DIST_EPS)
            .unwrap_or(na::Vector3::y_axis());
        Quat::from_axis_angle(&axis, std::f32::consts::PI)
    })
}

/// Fixed-timestep rolling locomotion controller for one capsule actor.
pub struct RollController {
    settings: RollSettings,
    committed: Pose,
    pivots: PivotState,
    state: RollState,
    /// Unit roll direction, or zero when no roll is active.
    roll_direction: Vec3,
    /// Roll cadence (rolls per second).
    current_move_speed: f32,
    /// Degrees per second squared.
    current_angular_accel: f32,
    /// Degrees per second.
    current_angular_velocity: f32,
    /// True while lifting the trailing tip toward upright; false while
    /// falling toward the roll direction.
    anim_rising: bool,
    prediction: RollPrediction,
    /// Absolute simulation time (seconds).
    time: f32,
}

impl RollController {
    /// Build a controller at an initial pose. Fails fast on malformed
    /// configuration; nothing is validated mid-simulation.
    pub fn new(settings: RollSettings, initial: Pose) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings,
            committed: initial,
            pivots: PivotState::default(),
            state: RollState::Idle,
            roll_direction: Vec3::zeros(),
            current_move_speed: settings.start_move_speed,
            current_angular_accel: 0.0,
            current_angular_velocity: 0.0,
            anim_rising: false,
            prediction: RollPrediction::pinned(initial),
            time: initial.time,
        })
    }

    /// Reset to a pose, clearing all roll state (including any temp pivot).
    pub fn initialize(&mut self, pose: Pose) {
        self.committed = pose;
        self.pivots = PivotState::default();
        self.state = RollState::Idle;
        self.roll_direction = Vec3::zeros();
        self.current_move_speed = self.settings.start_move_speed;
        self.current_angular_accel = 0.0;
        self.current_angular_velocity = 0.0;
        self.anim_rising = false;
        self.prediction = RollPrediction::pinned(pose);
        self.time = pose.time;
    }

    /// Latest committed pose, for model/render interpolation.
    #[inline]
    pub fn pose(&self) -> Pose {
        self.committed
    }

    #[inline]
    pub fn state(&self) -> RollState {
        self.state
    }

    /// Stabilized end-of-roll prediction anchors.
    #[inline]
    pub fn prediction(&self) -> RollPrediction {
        self.prediction
    }

    /// Sample the stabilized predicted pose at time `now` for an external
    /// consumer (e.g. a follow camera). Read-only; safe to call at any rate.
    #[inline]
    pub fn sample_presentation(&self, now: f32) -> Pose {
        self.prediction.sample(now)
    }

    #[inline]
    pub fn is_on_feet(&self) -> bool {
        self.pivots.is_on_feet()
    }

    #[inline]
    pub fn is_rising(&self) -> bool {
        self.anim_rising
    }

    #[inline]
    pub fn move_speed(&self) -> f32 {
        self.current_move_speed
    }

    #[inline]
    pub fn roll_direction(&self) -> Vec3 {
        self.roll_direction
    }

    #[inline]
    pub fn has_temp_pivot(&self) -> bool {
        self.pivots.has_temp()
    }

    /// Advance the simulation by one fixed timestep.
    pub fn simulate_tick(&mut self, world: &impl CollisionQuery, input: MoveInput, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.time += dt;

        let Some(desired) = input.world_direction() else {
            if matches!(self.state, RollState::Rolling | RollState::Slowing) {
                self.state = RollState::Idle;
                self.roll_direction = Vec3::zeros();
                self.current_angular_velocity = 0.0;
            }
            self.committed = self.committed.at_time(self.time);
            return;
        };

        if self.state == RollState::Idle {
            self.state = RollState::Rolling;
        }
        if self.roll_direction.norm_squared() <= DIST_EPS * DIST_EPS {
            self.start_roll(world, desired, false);
        }

        let up = world_up();
        let mut remaining = dt;
        let mut attempts = 0u32;

        while remaining > TIME_EPS && attempts < MAX_SUBSTEP_ATTEMPTS {
            attempts += 1;

            let center = self.pivots.rotation_center(&self.committed, &self.settings);
            let other = self.pivots.other_position(&self.committed, &self.settings);
            let local_up = {
                let v = other - center;
                let len = v.norm();
                if len <= DIST_EPS { up } else { v / len }
            };

            // Reaching upright ends the rising phase.
            if self.anim_rising && local_up.angle(&up).to_degrees() < ANGLE_EPS_DEG {
                self.anim_rising = false;
            }

            let target_axis = if self.anim_rising { up } else { self.roll_direction };
            let full = rotation_between_or_flip(local_up, target_axis, self.roll_direction);
            let full_deg = full.angle().to_degrees();
            if full_deg <= ANGLE_EPS_DEG {
                // Phase target reached; nothing left to integrate this tick.
                break;
            }

            let step_deg = (self.current_angular_velocity * remaining).min(full_deg);
            if step_deg <= 0.0 {
                // Angular velocity still zero (roll just started).
                break;
            }

            let axis = match full.axis() {
                Some(axis) => axis,
                None => break,
            };
            let step_q = Quat::from_axis_angle(&axis, step_deg.to_radians());
            let stepped = Pose::new(
                self.committed.time + remaining,
                center + step_q * (self.committed.translation - center),
                step_q * self.committed.rotation,
            );

            let swept = toi::sweep(
                world,
                &self.settings,
                &self.committed,
                &stepped,
                self.settings.toi_iterations,
            );
            match swept.hit {
                None => {
                    // Free motion consumes the whole remaining budget.
                    self.commit(world, stepped);
                    remaining = 0.0;
                }
                Some(_) => {
                    let consumed = remaining * swept.fraction;
                    let contact = swept.contact.at_time(self.committed.time + consumed);
                    self.commit(world, contact);
                    remaining -= consumed;

                    match classify_obstacle(
                        world,
                        &self.settings,
                        &self.committed,
                        &self.pivots,
                        local_up,
                        step_q,
                        self.roll_direction,
                    ) {
                        Obstacle::Flip => self.start_roll(world, desired, true),
                        Obstacle::Step(point) => {
                            self.pivots.set_temp(point, &self.committed);
                            self.recompute_prediction(world);
                        }
                        Obstacle::Blocked => {
                            self.current_angular_velocity = 0.0;
                            log::debug!(
                                "roll blocked by unclimbable obstacle; stopping angular progress for this tick"
                            );
                            remaining = 0.0;
                        }
                    }
                }
            }
        }

        if remaining > TIME_EPS && attempts >= MAX_SUBSTEP_ATTEMPTS {
            // Degenerate frame: reported, never fatal. The pose may visually
            // penetrate geometry until next tick.
            log::warn!(
                "sub-step attempt cap ({MAX_SUBSTEP_ATTEMPTS}) reached with {remaining:.5}s of tick time unresolved"
            );
        }

        // Once per tick, not per sub-step.
        self.current_angular_velocity += self.current_angular_accel * dt;
        self.committed = self.committed.at_time(self.time);
    }

    /// Begin a roll. `continuation` is a pivot flip mid-run; otherwise this
    /// is a fresh roll from rest.
    fn start_roll(&mut self, world: &impl CollisionQuery, desired: Vec3, continuation: bool) {
        if continuation {
            // Bound the turn rate as cadence increases.
            let max_turn = self.settings.max_angle_delta / self.current_move_speed;
            self.roll_direction = rotate_towards(self.roll_direction, desired, max_turn);
            self.anim_rising = true;
            self.pivots.flip();
            self.current_move_speed =
                (self.current_move_speed + self.settings.move_accel).min(self.settings.move_speed);
        } else {
            self.roll_direction = desired;
            self.anim_rising = false;
            self.current_move_speed = self.settings.start_move_speed;
        }

        // Roll cadence fixes the angular acceleration: a half-turn must
        // complete within the non-paused part of the roll period.
        let period = (1.0 - self.settings.pause_fraction) / self.current_move_speed;
        self.current_angular_accel = 360.0 / (period * period);
        self.current_angular_velocity = 0.0;

        // A fresh roll never inherits the previous ledge pivot.
        self.pivots.clear_temp();
        self.recompute_prediction(world);
    }

    /// Commit a pose: ground-snap it and publish it as the latest sample.
    fn commit(&mut self, world: &impl CollisionQuery, pose: Pose) {
        let (snapped, _hit) = ground::snap(world, &self.settings, &self.pivots, &pose);
        self.committed = snapped;
    }

    fn recompute_prediction(&mut self, world: &impl CollisionQuery) {
        let target = predict::predict_roll_end(
            world,
            &self.settings,
            &self.pivots,
            &self.committed,
            self.roll_direction,
            self.anim_rising,
            self.current_angular_accel,
        );
        // The previous target becomes the start-of-roll anchor.
        self.prediction = RollPrediction {
            start: self.prediction.target,
            target,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{query::LayerMask, world::StaticWorld};

    const DT: f32 = 1.0 / 60.0;

    fn settings() -> RollSettings {
        RollSettings::default()
    }

    fn flat_world() -> StaticWorld {
        let mut world = StaticWorld::new();
        world.add_plane(Vec3::y(), 0.0, LayerMask::ALL);
        world
    }

    /// Upright start with the feet tip at the ground-snap equilibrium.
    fn start_pose() -> Pose {
        Pose::new(0.0, Vec3::new(0.0, 0.65, 0.0), Quat::identity())
    }

    fn forward_input() -> MoveInput {
        MoveInput::new(na::Vector2::new(0.0, 1.0), 0.0)
    }

    fn controller() -> RollController {
        RollController::new(settings(), start_pose()).unwrap()
    }

    #[test]
    fn input_mapping_rotates_through_camera_yaw() {
        let forward = MoveInput::new(na::Vector2::new(0.0, 1.0), 0.0)
            .world_direction()
            .unwrap();
        assert!((forward - Vec3::z()).norm() < 1.0e-5);

        // Yaw of +90 degrees about world up turns +Z into +X.
        let turned = MoveInput::new(na::Vector2::new(0.0, 1.0), std::f32::consts::FRAC_PI_2)
            .world_direction()
            .unwrap();
        assert!((turned - Vec3::x()).norm() < 1.0e-5);

        assert!(MoveInput::default().world_direction().is_none());
    }

    #[test]
    fn idle_and_rolling_transitions_follow_input() {
        let world = flat_world();
        let mut c = controller();
        assert_eq!(c.state(), RollState::Idle);

        c.simulate_tick(&world, forward_input(), DT);
        assert_eq!(c.state(), RollState::Rolling);
        assert!(c.roll_direction().norm() > 0.9);

        c.simulate_tick(&world, MoveInput::default(), DT);
        assert_eq!(c.state(), RollState::Idle);
        assert!(c.roll_direction().norm() < 1.0e-6);

        c.simulate_tick(&world, forward_input(), DT);
        assert_eq!(c.state(), RollState::Rolling);
        // A roll from idle restarts at the starting cadence.
        assert!((c.move_speed() - settings().start_move_speed).abs() < 1.0e-6);
    }

    #[test]
    fn zero_input_never_starts_a_roll() {
        let world = flat_world();
        let mut c = controller();
        let before = c.pose();

        for _ in 0..30 {
            c.simulate_tick(&world, MoveInput::default(), DT);
        }
        assert_eq!(c.state(), RollState::Idle);
        assert!((c.pose().translation - before.translation).norm() < 1.0e-5);
    }

    #[test]
    fn flat_ground_roll_flips_pivot_and_gains_speed() {
        let world = flat_world();
        let s = settings();
        let mut c = controller();

        let mut flipped_at = None;
        for tick in 0..600 {
            let was_on_feet = c.is_on_feet();
            c.simulate_tick(&world, forward_input(), DT);
            if c.is_on_feet() != was_on_feet {
                flipped_at = Some(tick);
                break;
            }
        }
        let flipped_at = flipped_at.expect("a flat-ground roll must crest and flip");
        // The first roll needs a meaningful fraction of a second.
        assert!(flipped_at > 10);

        // One continuation: cadence grew by exactly one increment.
        assert!((c.move_speed() - (s.start_move_speed + s.move_accel)).abs() < 1.0e-5);
        assert!(!c.is_on_feet());
        // The flip begins the rising phase of the next roll.
        assert!(c.is_rising());
        // Forward progress happened along the roll direction.
        assert!(c.pose().translation.z > 0.2);
    }

    #[test]
    fn repeated_rolls_cap_the_cadence() {
        let world = flat_world();
        let s = settings();
        let mut c = controller();

        for _ in 0..3000 {
            c.simulate_tick(&world, forward_input(), DT);
        }
        assert!(c.move_speed() <= s.move_speed + 1.0e-5);
        assert!(c.move_speed() > s.start_move_speed);
        // Still rolling forward, well past the start.
        assert!(c.pose().translation.z > 1.0);
    }

    #[test]
    fn low_ledge_spawns_a_temp_pivot_without_flipping() {
        let mut world = flat_world();
        // A ledge just under the step limit, right in the roll path
        // (front face at z = 0.35, top at y = 0.25).
        world.add_cuboid(
            Vec3::new(2.0, 0.125, 0.5),
            Vec3::new(0.0, 0.125, 0.85),
            Quat::identity(),
            LayerMask::ALL,
        );
        let mut c = controller();

        let mut got_temp = false;
        for _ in 0..600 {
            let was_on_feet = c.is_on_feet();
            c.simulate_tick(&world, forward_input(), DT);
            assert_eq!(
                c.is_on_feet(),
                was_on_feet,
                "hit the ledge side: must classify as a step, not a crest"
            );
            if c.has_temp_pivot() {
                got_temp = true;
                break;
            }
        }
        assert!(got_temp, "a ledge under the step limit must spawn a temp pivot");
        assert_eq!(c.state(), RollState::Rolling);
    }

    #[test]
    fn tall_wall_stops_the_roll_without_clipping() {
        let mut world = flat_world();
        // A wall too tall to step and too steep to crest (front face at
        // z = 0.35).
        world.add_cuboid(
            Vec3::new(2.0, 2.0, 0.5),
            Vec3::new(0.0, 2.0, 0.85),
            Quat::identity(),
            LayerMask::ALL,
        );
        let s = settings();
        let mut c = controller();

        for _ in 0..600 {
            c.simulate_tick(&world, forward_input(), DT);
            assert!(c.is_on_feet(), "a wall must not be classified as a crest");
            assert!(!c.has_temp_pivot(), "a wall must not be classified as a step");

            // No part of the capsule ever passes the wall face.
            let pose = c.pose();
            let axis = pose.rotation * Vec3::y();
            let cap = s.cap_offset();
            let reach = (pose.translation + axis * cap).z.max((pose.translation - axis * cap).z)
                + s.radius;
            assert!(reach <= 0.35 + 0.02, "capsule clipped through the wall: {reach}");
        }
    }

    #[test]
    fn crest_flip_requires_both_slope_gates() {
        // Gating property: with the capsule barely tipped (pivot axis far
        // from the roll direction), a ground contact is never a crest, no
        // matter what the probes hit.
        let world = flat_world();
        let s = settings();
        let pivots = PivotState::default();

        let tilt = |deg: f32| {
            let q = Quat::from_axis_angle(&na::Vector3::x_axis(), deg.to_radians());
            let local_up = q * Vec3::y();
            let feet = Vec3::new(0.0, 0.15, 0.0);
            (Pose::new(0.0, feet + local_up * s.tip_offset(), q), local_up)
        };
        let nudge = Quat::from_axis_angle(&na::Vector3::x_axis(), 0.02);

        // Tipped only 30 degrees: roll direction is 60 degrees from the
        // pivot axis, beyond the 45-degree slope limit.
        let (pose, local_up) = tilt(30.0);
        let verdict = classify_obstacle(&world, &s, &pose, &pivots, local_up, nudge, Vec3::z());
        assert_ne!(verdict, Obstacle::Flip);

        // Tipped 80 degrees: both gates pass and the contact is a crest.
        let (pose, local_up) = tilt(80.0);
        let verdict = classify_obstacle(&world, &s, &pose, &pivots, local_up, nudge, Vec3::z());
        assert_eq!(verdict, Obstacle::Flip);
    }

    #[test]
    fn continuation_turn_rate_is_clamped() {
        // rotate_towards bounds steering per flip.
        let turned = rotate_towards(Vec3::z(), Vec3::x(), 30.0);
        assert!((turned.angle(&Vec3::z()).to_degrees() - 30.0).abs() < 0.1);
        assert!(turned.y.abs() < 1.0e-6);

        // Within the clamp the target is reached exactly.
        let reached = rotate_towards(Vec3::z(), Vec3::x(), 120.0);
        assert!((reached - Vec3::x()).norm() < 1.0e-5);
    }

    #[test]
    fn prediction_updates_when_a_roll_starts() {
        let world = flat_world();
        let mut c = controller();

        let before = c.prediction();
        assert!((before.target.translation - start_pose().translation).norm() < 1.0e-6);

        c.simulate_tick(&world, forward_input(), DT);
        let after = c.prediction();
        // The new target leads the committed pose along the roll direction.
        assert!(after.target.translation.z > c.pose().translation.z + 0.2);
        assert!(after.target.time > c.pose().time);
    }

    #[test]
    fn presentation_sampling_does_not_disturb_the_simulation() {
        let world = flat_world();
        let mut c = controller();
        c.simulate_tick(&world, forward_input(), DT);

        let committed = c.pose();
        let _ = c.sample_presentation(committed.time);
        let _ = c.sample_presentation(committed.time + 0.5);

        let after = c.pose();
        assert_eq!(
            committed.translation.z.to_bits(),
            after.translation.z.to_bits()
        );
        assert_eq!(committed.time.to_bits(), after.time.to_bits());
    }

    #[test]
    fn malformed_settings_fail_construction() {
        let bad = RollSettings {
            radius: -1.0,
            ..RollSettings::default()
        };
        assert!(RollController::new(bad, Pose::identity()).is_err());
    }
}
