//! Ground-truth state of one nozzle.

use serde::Serialize;

/// Physical state of a nozzle as known only to the process model.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct NozzleState {
    pub lowered: bool,
    pub vacuum_on: bool,
    /// Feeder the held part came from.
    pub held_feeder: Option<usize>,
    /// Orientation of the held part in degrees: the pick misalignment once
    /// measured, plus every rotation applied since.
    pub accumulated_rotation: f64,
    /// Last pick misalignment measured for this nozzle.
    pub pick_error: f64,
}

impl NozzleState {
    pub const fn is_holding(&self) -> bool {
        self.held_feeder.is_some()
    }

    /// Whether lowering and vacuum together should pick a part here.
    pub const fn ready_to_pick(&self) -> bool {
        self.lowered && self.vacuum_on && self.held_feeder.is_none()
    }
}
