/*!
Rolling capsule locomotion.

A character capsule that moves by rolling end over end, pivoting alternately
on its two tips, instead of sliding. The crate provides:

- [`controller::RollController`]: the fixed-timestep integrator, the pivot
  state machine with temporary ledge pivots, ground snapping, and the
  collision cases (crest flip, step climb, wall stop),
- [`toi`]: the pose-to-pose time-of-impact solver the integrator steps with,
- [`predict`]: stabilized end-of-roll pose prediction for presentation
  consumers such as a follow camera,
- [`query::CollisionQuery`]: the geometry provider seam, with a
  parry3d-backed static-world implementation in [`world`].

The simulation side calls [`controller::RollController::simulate_tick`] at a
fixed rate; the presentation side samples
[`controller::RollController::sample_presentation`] at its own rate. All
units are meters, seconds, and (for configuration) degrees.
*/

pub mod controller;
pub mod ground;
pub mod pivot;
pub mod predict;
pub mod query;
pub mod settings;
pub mod toi;
pub mod types;
pub mod world;

pub use controller::{MoveInput, RollController, RollState};
pub use pivot::PivotEnd;
pub use predict::RollPrediction;
pub use query::{CastHit, ColliderId, CollisionQuery, LayerMask};
pub use settings::{RollSettings, SettingsError};
pub use toi::{SweepHit, SweepResult};
pub use types::{Pose, Quat, Vec3};
pub use world::StaticWorld;
