//! Controller-side plumbing shared by both modes: channel access and
//! transition narration.

use tracing::debug;

use crate::channel::ControllerPort;
use crate::narration::{Narration, Narrator, Origin};
use crate::types::{Instruction, PlacementOrder};

pub struct Link {
    port: ControllerPort,
    narrator: Narrator,
}

impl Link {
    pub const fn new(port: ControllerPort) -> Self {
        Self {
            port,
            narrator: Narrator::new(Origin::Controller),
        }
    }

    pub fn port(&self) -> &ControllerPort {
        &self.port
    }

    pub fn ready(&self) -> bool {
        self.port.is_ready()
    }

    /// The machine is idle but left the last instruction unexecuted.
    pub fn refused(&self) -> bool {
        self.port.instruction_refused()
    }

    pub fn now(&self) -> f64 {
        self.port.sim_time()
    }

    /// Write `instruction` to the channel, replacing one the simulator has
    /// not accepted. Returns `false` (and the caller stays in its state) if
    /// the machine is still executing.
    pub fn issue(&mut self, instruction: Instruction) -> bool {
        match self.port.issue(&instruction) {
            Ok(seq) => {
                debug!(seq, code = %instruction.code(), "[Controller] instruction issued");
                true
            }
            Err(e) => {
                debug!("[Controller] {e}");
                false
            }
        }
    }

    /// Narrate a state change.
    pub fn enter(&mut self, state: impl std::fmt::Display, reason: impl std::fmt::Display) {
        let now = self.now();
        self.narrator.info(now, format!("New state: {state:<20} {reason}"));
    }

    /// Narrate a detail line under the current state.
    pub fn note(&mut self, message: impl Into<String>) {
        let now = self.now();
        self.narrator.info(now, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let now = self.now();
        self.narrator.warn(now, message);
    }

    pub fn describe_part(&mut self, index: usize, part: &PlacementOrder) {
        self.note(format!(
            "Part {index}: Designation: {}  Footprint: {}  Value: {:.2}  x: {:.2}  y: {:.2}  theta: {:.2}  Feeder: {}",
            part.designation, part.footprint, part.value, part.x, part.y, part.theta, part.feeder
        ));
    }

    pub fn drain(&mut self) -> Vec<Narration> {
        self.narrator.drain()
    }
}
