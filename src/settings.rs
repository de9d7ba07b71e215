/*!
Roll controller settings and tolerances.

These constants centralize the parameters used by the roll integrator, the
TOI solver, obstacle classification, and ground snapping. Keeping them
together makes tuning easier and helps ensure deterministic behavior across
platforms.

Notes
- Distances are in meters, time in seconds, angles in degrees unless a
  field says otherwise. Angular speed/acceleration are kept in degrees
  internally (the roll cadence formula is degree-based) and converted to
  radians only when building quaternions.
- Favor practical world-space tolerances over machine epsilon for robust
  behavior.
*/

use crate::query::LayerMask;

/// Narrow-phase refinement iterations for the TOI solver.
/// Precision is bounded by the final step size (0.25^iterations), so raise
/// this if a caller needs tighter contact fractions.
pub const DEFAULT_TOI_ITERATIONS: u32 = 50;

/// Hard cap on collision-resolution attempts within one tick. Guarantees
/// the sub-step loop terminates regardless of pathological geometry.
pub const MAX_SUBSTEP_ATTEMPTS: u32 = 10;

/// Residual tick time below this is considered fully consumed (seconds).
pub const TIME_EPS: f32 = 1.0e-6;

/// Angular threshold under which the rising phase counts as complete and
/// rotation targets count as reached (degrees).
pub const ANGLE_EPS_DEG: f32 = 0.5;

/// Practical small distance for comparisons (meters).
pub const DIST_EPS: f32 = 1.0e-6;

/// Minimum squared input-axis magnitude that counts as move input.
/// Anything below is treated as "no input" and never starts a roll.
pub const MIN_INPUT_SQ: f32 = 1.0e-6;

/// Tuning for the rolling-capsule controller.
///
/// Validated once at construction ([`RollSettings::validate`]); malformed
/// configuration is a precondition violation, never handled mid-simulation.
#[derive(Clone, Copy, Debug)]
pub struct RollSettings {
    /// Capsule radius (meters).
    pub radius: f32,
    /// Full capsule height including both caps (meters). The pivot points
    /// are the capsule tips at `±height / 2` along the local axis.
    pub height: f32,

    /// Maximum roll cadence (rolls per second).
    pub move_speed: f32,
    /// Cadence a fresh roll starts at (rolls per second).
    pub start_move_speed: f32,
    /// Cadence gained on each pivot flip, up to `move_speed`.
    pub move_accel: f32,
    /// Fraction of each roll period spent paused between rolls.
    pub pause_fraction: f32,
    /// Turn clamp numerator (degrees): a continuation may steer the roll
    /// direction by at most `max_angle_delta / current speed` per flip.
    pub max_angle_delta: f32,

    /// Maximum climbable incline, measured from straight down (degrees).
    pub slope_limit: f32,
    /// Maximum climbable ledge height above the active pivot (meters).
    pub step_limit: f32,
    /// Reach of the obstacle-classification probes (meters).
    pub probe_distance: f32,

    /// Clearance held between the active pivot's ground probe and the
    /// detected ground (meters).
    pub hover_height: f32,
    /// Radius of the downward ground probe sphere (meters).
    pub ground_search_radius: f32,
    /// How far below the active pivot the ground probe looks (meters).
    pub snap_max_distance: f32,

    /// Layers that block the rolling capsule.
    pub collision_layers: LayerMask,
    /// Layers the capsule snaps to as ground.
    pub ground_layers: LayerMask,

    /// TOI narrow-phase iteration count.
    pub toi_iterations: u32,
}

impl Default for RollSettings {
    fn default() -> Self {
        Self {
            radius: 0.25,
            height: 1.0,
            move_speed: 2.0,
            start_move_speed: 0.75,
            move_accel: 0.25,
            pause_fraction: 0.15,
            max_angle_delta: 45.0,
            slope_limit: 45.0,
            step_limit: 0.3,
            probe_distance: 0.4,
            hover_height: 0.05,
            ground_search_radius: 0.1,
            snap_max_distance: 0.5,
            collision_layers: LayerMask::ALL,
            ground_layers: LayerMask::ALL,
            toi_iterations: DEFAULT_TOI_ITERATIONS,
        }
    }
}

impl RollSettings {
    /// Half the capsule height: distance from center to either pivot tip.
    #[inline]
    pub fn tip_offset(&self) -> f32 {
        self.height * 0.5
    }

    /// Distance from the capsule center to either cap center.
    #[inline]
    pub fn cap_offset(&self) -> f32 {
        self.height * 0.5 - self.radius
    }

    /// Check preconditions. Called once by the controller constructor.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.radius > 0.0) {
            return Err(SettingsError::NonPositiveRadius);
        }
        if !(self.height > 2.0 * self.radius) {
            return Err(SettingsError::HeightTooSmall);
        }
        if !(self.move_speed > 0.0) || !(self.start_move_speed > 0.0) {
            return Err(SettingsError::NonPositiveSpeed);
        }
        if !(0.0..1.0).contains(&self.pause_fraction) {
            return Err(SettingsError::PauseFractionOutOfRange);
        }
        if !(self.slope_limit > 0.0) || self.slope_limit >= 90.0 {
            return Err(SettingsError::SlopeLimitOutOfRange);
        }
        if self.toi_iterations == 0 {
            return Err(SettingsError::ZeroToiIterations);
        }
        Ok(())
    }
}

/// Configuration precondition violations reported at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsError {
    NonPositiveRadius,
    /// `height` must exceed `2 * radius` so the capsule has a cylinder
    /// section and two distinct pivot tips.
    HeightTooSmall,
    NonPositiveSpeed,
    PauseFractionOutOfRange,
    SlopeLimitOutOfRange,
    ZeroToiIterations,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            SettingsError::NonPositiveRadius => "capsule radius must be positive",
            SettingsError::HeightTooSmall => "capsule height must exceed twice the radius",
            SettingsError::NonPositiveSpeed => "move speeds must be positive",
            SettingsError::PauseFractionOutOfRange => "pause fraction must be in [0, 1)",
            SettingsError::SlopeLimitOutOfRange => "slope limit must be in (0, 90) degrees",
            SettingsError::ZeroToiIterations => "TOI iteration count must be non-zero",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for SettingsError {}
