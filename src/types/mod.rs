//! Shared data structures for the pick-and-place machine
//!
//! - Nozzle identity and per-nozzle storage
//! - Instruction vocabulary carried by the status channel
//! - Work order, machine coordinates and placement records

mod instruction;
mod nozzle;
mod placement;

pub use instruction::*;
pub use nozzle::*;
pub use placement::*;
