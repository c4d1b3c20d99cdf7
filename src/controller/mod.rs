//! Placement controller
//!
//! Decides, one tick at a time, which instruction the machine runs next.
//! The controller never sees the process model directly: it reads readiness
//! and measured errors from the [`ControllerPort`] and operator keys from the
//! [`KeyRegister`], and infers any rejected instruction purely from readiness
//! not coming back.
//!
//! Two modes share the [`cycle::NozzleCycle`] lower/vacuum/raise sequence:
//!
//! - [`ManualController`]: operator-driven, centre nozzle only
//! - [`AutonomousController`]: sorted work order, all three nozzles per batch

mod autonomous;
mod cycle;
mod link;
mod manual;

pub use autonomous::{placement_sequence, AutoState, AutonomousController};
pub use cycle::{CycleKind, CycleStep, NozzleCycle};
pub use manual::{ManualController, ManualState};

use crate::channel::ControllerPort;
use crate::config::MachineConfig;
use crate::narration::Narration;
use crate::operator::KeyRegister;
use crate::simulator::TickOutcome;
use crate::types::{OperationMode, WorkOrder};

pub enum Controller {
    Manual(ManualController),
    Autonomous(AutonomousController),
}

impl Controller {
    /// Build the controller for the work order's mode.
    ///
    /// The key register is only read in manual mode.
    pub fn new(order: WorkOrder, config: MachineConfig, port: ControllerPort, keys: KeyRegister) -> Self {
        match order.mode {
            OperationMode::Manual => Self::Manual(ManualController::new(order.parts, config, port, keys)),
            OperationMode::Autonomous => Self::Autonomous(AutonomousController::new(order.parts, config, port)),
        }
    }

    pub const fn mode(&self) -> OperationMode {
        match self {
            Self::Manual(_) => OperationMode::Manual,
            Self::Autonomous(_) => OperationMode::Autonomous,
        }
    }

    /// Run one poll cycle. Returns [`TickOutcome::Stopped`] once quit has
    /// been requested.
    pub fn tick(&mut self) -> TickOutcome {
        if self.port().quit_requested() {
            return TickOutcome::Stopped;
        }
        match self {
            Self::Manual(c) => c.tick(),
            Self::Autonomous(c) => c.tick(),
        }
        TickOutcome::Running
    }

    /// Every part in the work order has been placed.
    pub fn is_finished(&self) -> bool {
        match self {
            Self::Manual(c) => c.is_finished(),
            Self::Autonomous(c) => c.is_finished(),
        }
    }

    /// Finished and parked at home.
    pub fn is_done(&self) -> bool {
        let home = match self {
            Self::Manual(c) => c.state() == ManualState::Home,
            Self::Autonomous(c) => c.state() == AutoState::Home,
        };
        home && self.is_finished()
    }

    pub fn state_name(&self) -> String {
        match self {
            Self::Manual(c) => c.state().to_string(),
            Self::Autonomous(c) => c.state().to_string(),
        }
    }

    pub fn drain_narration(&mut self) -> Vec<Narration> {
        match self {
            Self::Manual(c) => c.drain_narration(),
            Self::Autonomous(c) => c.drain_narration(),
        }
    }

    pub fn port(&self) -> &ControllerPort {
        match self {
            Self::Manual(c) => c.port(),
            Self::Autonomous(c) => c.port(),
        }
    }
}
