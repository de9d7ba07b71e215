/*!
Pivot bookkeeping for the rolling capsule.

A roll pivots the body around one of the two capsule tips. Which tip is the
live pivot flips on every roll continuation. Climbing a small ledge spawns a
temporary pivot anchored to the ledge edge; while it exists it is the
authoritative rotation center, and the tip pivots remain foot/head anchors
used for obstacle case analysis.

The temp pivot is an owned, scoped value: at most one exists at a time, a
replacement destroys its predecessor, and a fresh roll never inherits one.
It is stored as an offset in the character's local frame (no scene-graph
node), so it moves with the body and is recomputed from the committed pose
on each query.
*/

use crate::{
    settings::RollSettings,
    types::{Pose, Vec3},
};

/// Which capsule tip currently acts as the live pivot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PivotEnd {
    Feet,
    Head,
}

impl PivotEnd {
    #[inline]
    fn opposite(self) -> PivotEnd {
        match self {
            PivotEnd::Feet => PivotEnd::Head,
            PivotEnd::Head => PivotEnd::Feet,
        }
    }
}

/// Live pivot selection plus the optional temporary ledge pivot.
#[derive(Clone, Copy, Debug)]
pub struct PivotState {
    live: PivotEnd,
    /// Ledge pivot as an offset in the character's local frame, if any.
    temp: Option<Vec3>,
}

impl Default for PivotState {
    fn default() -> Self {
        Self {
            live: PivotEnd::Feet,
            temp: None,
        }
    }
}

impl PivotState {
    /// True while the feet tip is the live pivot.
    #[inline]
    pub fn is_on_feet(&self) -> bool {
        self.live == PivotEnd::Feet
    }

    /// Toggle which tip is the live pivot (a roll continuation).
    #[inline]
    pub fn flip(&mut self) {
        self.live = self.live.opposite();
    }

    fn tip_position(&self, end: PivotEnd, pose: &Pose, settings: &RollSettings) -> Vec3 {
        let axis = pose.rotation * Vec3::y();
        let offset = settings.tip_offset();
        match end {
            PivotEnd::Feet => pose.translation - axis * offset,
            PivotEnd::Head => pose.translation + axis * offset,
        }
    }

    /// World position of the live pivot tip (ignores any temp pivot).
    #[inline]
    pub fn pivot_position(&self, pose: &Pose, settings: &RollSettings) -> Vec3 {
        self.tip_position(self.live, pose, settings)
    }

    /// World position of the opposite tip.
    #[inline]
    pub fn other_position(&self, pose: &Pose, settings: &RollSettings) -> Vec3 {
        self.tip_position(self.live.opposite(), pose, settings)
    }

    /// World position of the authoritative rotation center: the temp pivot
    /// when one exists, the live tip otherwise.
    pub fn rotation_center(&self, pose: &Pose, settings: &RollSettings) -> Vec3 {
        match self.temp {
            Some(local) => pose.translation + pose.rotation * local,
            None => self.pivot_position(pose, settings),
        }
    }

    #[inline]
    pub fn has_temp(&self) -> bool {
        self.temp.is_some()
    }

    /// Anchor a temporary pivot at a world-space point, expressed relative
    /// to the committed pose so it follows the body. Any existing temp
    /// pivot is released first.
    pub fn set_temp(&mut self, world_point: Vec3, pose: &Pose) {
        let local = pose.rotation.inverse() * (world_point - pose.translation);
        // Option replacement drops the previous pivot before storing the
        // new one, which is the at-most-one invariant.
        self.temp = Some(local);
    }

    /// Release the temporary pivot, if any.
    #[inline]
    pub fn clear_temp(&mut self) {
        self.temp = None;
    }
}
