//! PnP Machine: pick-and-place controller and process model
//!
//! A gantry with three nozzles picks components from tape feeders and places
//! them on a PCB. Two cooperating state machines share one status record:
//!
//! ## Architecture
//!
//! - **Controller**: manual (operator keys) or autonomous placement sequencing
//! - **Simulator**: executes one instruction at a time against simulated time,
//!   injects pick and preplace misalignment
//! - **Channel**: single-writer-per-field status and instruction record
//! - **Runtime**: real-time tokio tasks, or a deterministic lockstep bench

pub mod channel;
pub mod config;
pub mod controller;
pub mod narration;
pub mod operator;
pub mod runtime;
pub mod simulator;
pub mod types;
pub mod worklist;

// Re-export machine configuration
pub use config::{ConfigError, MachineConfig};

// Re-export commonly used types
pub use types::{
    Instruction, InstructionCode, Nozzle, OperationMode, PerNozzle, PhotoDirection, PlacedPartRecord,
    PlacementOrder, Point, WorkOrder,
};

// Re-export the state machines and their shared record
pub use channel::{ControllerPort, MachineChannel, SimulatorPort, StatusSnapshot};
pub use controller::Controller;
pub use simulator::{SimulationReport, Simulator, TickOutcome};

// Re-export runtime entry points
pub use runtime::{Bench, RunOptions};
pub use worklist::{load_work_order, WorklistError};
