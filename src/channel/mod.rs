//! Machine status channel
//!
//! The one shared record between the placement controller and the process
//! model. Every field has a single writer:
//!
//! | Field | Writer |
//! |-------|--------|
//! | `pending_instruction` (+ arguments) | controller writes, simulator clears on acceptance |
//! | last examined sequence number | simulator |
//! | `ready_for_next_instruction`, `sim_time`, error fields | simulator |
//! | `quit` | either side (set only) |
//!
//! Access goes through the role-typed [`ControllerPort`] and [`SimulatorPort`]
//! so neither side can write the other's fields. The mutex exists only to
//! make multi-field reads and writes atomic snapshots; no decision logic
//! runs while it is held.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::types::{Instruction, InstructionCode, Nozzle, PendingInstruction, PerNozzle};

/// Point-in-time copy of the status record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub ready_for_next_instruction: bool,
    pub sim_time: f64,
    pub pick_error_theta: PerNozzle<f64>,
    pub preplace_error_x: f64,
    pub preplace_error_y: f64,
    pub pending_instruction: Option<PendingInstruction>,
    pub quit: bool,
}

impl StatusSnapshot {
    /// Power-on state: idle, no errors, nothing pending.
    pub fn reset(sim_time: f64) -> Self {
        Self {
            ready_for_next_instruction: true,
            sim_time,
            pick_error_theta: PerNozzle::splat(0.0),
            preplace_error_x: 0.0,
            preplace_error_y: 0.0,
            pending_instruction: None,
            quit: false,
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::reset(0.0)
    }
}

/// The controller tried to write an instruction while the machine is still
/// executing the previous one.
#[derive(Debug, Error)]
#[error("{rejected} not issued: previous instruction still executing")]
pub struct ChannelBusy {
    pub rejected: InstructionCode,
}

#[derive(Debug, Default)]
struct Record {
    status: StatusSnapshot,
    issued: u64,
    examined: u64,
}

/// Owner handle for the shared record. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MachineChannel {
    record: Arc<Mutex<Record>>,
}

impl MachineChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller_port(&self) -> ControllerPort {
        ControllerPort {
            channel: self.clone(),
        }
    }

    pub fn simulator_port(&self) -> SimulatorPort {
        SimulatorPort {
            channel: self.clone(),
        }
    }

    /// Read-only view for observers (display, tests).
    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().status.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        // Every write is a plain field store; a poisoned record is still whole.
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Controller side
// ============================================================================

/// Controller's view: reads status, writes instructions and `quit`.
#[derive(Debug, Clone)]
pub struct ControllerPort {
    channel: MachineChannel,
}

impl ControllerPort {
    pub fn snapshot(&self) -> StatusSnapshot {
        self.channel.snapshot()
    }

    /// True when the simulator is idle and has taken the last instruction
    /// off the channel.
    ///
    /// A rejected instruction stays pending, so this stays false until a
    /// different instruction is accepted.
    pub fn is_ready(&self) -> bool {
        let record = self.channel.lock();
        record.status.ready_for_next_instruction && record.status.pending_instruction.is_none()
    }

    /// True when the simulator has looked at the pending instruction and
    /// left it on the channel. The machine is idle; issuing replaces it.
    pub fn instruction_refused(&self) -> bool {
        let record = self.channel.lock();
        record.status.ready_for_next_instruction
            && record
                .status
                .pending_instruction
                .is_some_and(|p| p.seq <= record.examined)
    }

    pub fn sim_time(&self) -> f64 {
        self.channel.lock().status.sim_time
    }

    pub fn pick_error_theta(&self, nozzle: Nozzle) -> f64 {
        self.channel.lock().status.pick_error_theta[nozzle]
    }

    /// Latest look-down misalignment as `(x, y)`.
    pub fn preplace_error(&self) -> (f64, f64) {
        let record = self.channel.lock();
        (record.status.preplace_error_x, record.status.preplace_error_y)
    }

    /// Write an instruction for the simulator. Returns its sequence number.
    ///
    /// Refused only while the machine is executing. An instruction the
    /// simulator has not accepted yet is overwritten.
    pub fn issue(&self, instruction: &Instruction) -> Result<u64, ChannelBusy> {
        let mut record = self.channel.lock();
        if !record.status.ready_for_next_instruction {
            return Err(ChannelBusy {
                rejected: instruction.code(),
            });
        }
        record.issued += 1;
        let seq = record.issued;
        record.status.pending_instruction = Some(PendingInstruction::encode(instruction, seq));
        Ok(seq)
    }

    pub fn request_quit(&self) {
        self.channel.lock().status.quit = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.channel.lock().status.quit
    }
}

// ============================================================================
// Simulator side
// ============================================================================

/// Process model's view: publishes status, consumes instructions.
#[derive(Debug)]
pub struct SimulatorPort {
    channel: MachineChannel,
}

impl SimulatorPort {
    pub fn pending(&self) -> Option<PendingInstruction> {
        self.channel.lock().status.pending_instruction
    }

    /// Take the instruction with sequence number `seq` off the channel and
    /// mark the machine busy, in one step.
    pub fn accept(&self, seq: u64) -> bool {
        let mut record = self.channel.lock();
        match record.status.pending_instruction {
            Some(p) if p.seq == seq => {
                record.status.pending_instruction = None;
                record.status.ready_for_next_instruction = false;
                record.examined = seq;
                true
            }
            _ => false,
        }
    }

    /// Leave instruction `seq` on the channel but record that it was looked at.
    pub fn decline(&self, seq: u64) {
        let mut record = self.channel.lock();
        record.examined = record.examined.max(seq);
    }

    pub fn complete(&self) {
        self.channel.lock().status.ready_for_next_instruction = true;
    }

    pub fn publish_time(&self, sim_time: f64) {
        self.channel.lock().status.sim_time = sim_time;
    }

    pub fn publish_pick_error(&self, nozzle: Nozzle, theta: f64) {
        self.channel.lock().status.pick_error_theta[nozzle] = theta;
    }

    pub fn publish_preplace_error(&self, x: f64, y: f64) {
        let mut record = self.channel.lock();
        record.status.preplace_error_x = x;
        record.status.preplace_error_y = y;
    }

    pub fn request_quit(&self) {
        self.channel.lock().status.quit = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.channel.lock().status.quit
    }

    /// Return every simulator-owned field to power-on values. `quit` stays set.
    pub fn reset_after_quit(&self, sim_time: f64) {
        let mut record = self.channel.lock();
        let quit = record.status.quit;
        record.status = StatusSnapshot::reset(sim_time);
        record.status.quit = quit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_accept_clears_pending_and_ready() {
        let channel = MachineChannel::new();
        let controller = channel.controller_port();
        let simulator = channel.simulator_port();

        let seq = controller.issue(&Instruction::LoadPcb).unwrap();
        assert!(!controller.is_ready(), "pending instruction must gate readiness");
        assert!(simulator.accept(seq));

        let status = channel.snapshot();
        assert!(status.pending_instruction.is_none());
        assert!(!status.ready_for_next_instruction);
        assert!(!controller.is_ready());

        simulator.complete();
        assert!(controller.is_ready());
    }

    #[test]
    fn test_second_issue_while_executing_is_refused() {
        let channel = MachineChannel::new();
        let controller = channel.controller_port();
        let first = controller.issue(&Instruction::LoadPcb).unwrap();
        assert!(channel.simulator_port().accept(first));

        let err = controller.issue(&Instruction::UnloadPcb).unwrap_err();
        assert_eq!(err.rejected, InstructionCode::UnloadPcb);
        assert!(channel.snapshot().pending_instruction.is_none());
    }

    #[test]
    fn test_unaccepted_instruction_is_overwritten() {
        let channel = MachineChannel::new();
        let controller = channel.controller_port();
        let simulator = channel.simulator_port();
        let first = controller.issue(&Instruction::LoadPcb).unwrap();
        let second = controller.issue(&Instruction::UnloadPcb).unwrap();
        assert!(second > first);

        let pending = channel.snapshot().pending_instruction.unwrap();
        assert_eq!(pending.seq, second);
        assert_eq!(pending.code, InstructionCode::UnloadPcb);
        assert!(!simulator.accept(first));
        assert!(simulator.accept(second));
    }

    #[test]
    fn test_declined_instruction_reads_as_refused() {
        let channel = MachineChannel::new();
        let controller = channel.controller_port();
        let simulator = channel.simulator_port();
        let seq = controller.issue(&Instruction::LoadPcb).unwrap();
        assert!(!controller.instruction_refused());

        simulator.decline(seq);
        assert!(controller.instruction_refused());
        assert!(!controller.is_ready());

        // A replacement has not been looked at yet.
        controller.issue(&Instruction::UnloadPcb).unwrap();
        assert!(!controller.instruction_refused());
    }

    #[test]
    fn test_accept_ignores_stale_sequence() {
        let channel = MachineChannel::new();
        let seq = channel.controller_port().issue(&Instruction::LoadPcb).unwrap();
        assert!(!channel.simulator_port().accept(seq + 1));
        assert!(channel.snapshot().pending_instruction.is_some());
    }

    #[test]
    fn test_reset_after_quit_keeps_quit() {
        let channel = MachineChannel::new();
        let simulator = channel.simulator_port();
        simulator.publish_preplace_error(3.0, -2.0);
        channel.controller_port().request_quit();
        simulator.reset_after_quit(4.5);

        let status = channel.snapshot();
        assert!(status.quit);
        assert!(status.ready_for_next_instruction);
        assert_eq!(status.preplace_error_x, 0.0);
        assert_eq!(status.sim_time, 4.5);
    }
}
