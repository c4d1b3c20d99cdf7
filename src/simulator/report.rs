//! End-of-run summary of the process model.

use serde::Serialize;

use super::NozzleState;
use crate::types::{PerNozzle, PlacedPartRecord, Point};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimulationReport {
    pub sim_time: f64,
    pub head: Point,
    pub nozzles: PerNozzle<NozzleState>,
    pub pcb_loaded: bool,
    pub placed: Vec<PlacedPartRecord>,
    pub dropped: usize,
}

impl std::fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Simulation ended at t={:.2}s with head at {}", self.sim_time, self.head)?;
        writeln!(f, "Placed parts: {}  Dropped parts: {}", self.placed.len(), self.dropped)?;
        for (i, p) in self.placed.iter().enumerate() {
            writeln!(
                f,
                "  Part {i} from feeder {} placed at ({:.2}, {:.2}) with rotation {:.2} degrees",
                p.feeder, p.x, p.y, p.theta
            )?;
        }
        for (nozzle, state) in self.nozzles.iter() {
            if let Some(feeder) = state.held_feeder {
                writeln!(f, "  {} nozzle still holding part from feeder {feeder}", nozzle.name())?;
            }
        }
        Ok(())
    }
}
