//! Operator-driven placement with the centre nozzle.
//!
//! ```text
//!  HOME ──digit──▶ MOVE_TO_FEEDER ──ready──▶ WAIT ◀──────────────────────┐
//!                                             │ p  ─▶ LOWER/VAC/RAISE ───┤ (pick)
//!                                             │ c  ─▶ MOVE_TO_CAMERA ─▶ LOOK_UP_PHOTO
//!                                             │        ─▶ MOVE_TO_PCB ─▶ LOOK_DOWN_PHOTO
//!                                             │        ─▶ CHECK_ERROR ───┤
//!                                             │ r,a ─▶ CORRECT_ERRORS ───┤
//!                                             │ h  ─▶ MOVE_TO_HOME ─▶ HOME
//!                                             └ p (holding) ─▶ LOWER/VAC/RAISE ─▶ HOME or MOVE_TO_HOME
//! ```
//!
//! Keys are read only in `HOME` and `WAIT`; a key pressed while the machine
//! is busy waits in the register until one of those states is reached.
//! If the machine refuses an instruction the controller drops back to `WAIT`,
//! where the next key replaces the refused instruction.

use std::fmt;

use super::cycle::{CycleKind, CycleStep, NozzleCycle};
use super::link::Link;
use crate::channel::ControllerPort;
use crate::config::MachineConfig;
use crate::narration::Narration;
use crate::operator::KeyRegister;
use crate::types::{Instruction, Nozzle, PhotoDirection, PlacementOrder};

/// Manual mode picks and places with this nozzle only.
const MANUAL_NOZZLE: Nozzle = Nozzle::Centre;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualState {
    Home,
    MoveToFeeder,
    Wait,
    LowerCentre,
    Vacuum,
    RaiseCentre,
    MoveToCamera,
    LookUpPhoto,
    MoveToPcb,
    LookDownPhoto,
    CheckError,
    CorrectErrors,
    MoveToHome,
}

impl ManualState {
    const fn for_step(step: CycleStep) -> Self {
        match step {
            CycleStep::Lower => Self::LowerCentre,
            CycleStep::Vacuum => Self::Vacuum,
            CycleStep::Raise => Self::RaiseCentre,
        }
    }
}

impl fmt::Display for ManualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Home => "HOME",
            Self::MoveToFeeder => "MOVE_TO_FEEDER",
            Self::Wait => "WAIT",
            Self::LowerCentre => "LOWER_CNTR_NOZZLE",
            Self::Vacuum => "VAC_CNTR_NOZZLE",
            Self::RaiseCentre => "RAISE_CNTR_NOZZLE",
            Self::MoveToCamera => "MOVE_TO_CAMERA",
            Self::LookUpPhoto => "LOOK_UP_PHOTO",
            Self::MoveToPcb => "MOVE_TO_PCB",
            Self::LookDownPhoto => "LOOK_DOWN_PHOTO",
            Self::CheckError => "CHECK_ERROR",
            Self::CorrectErrors => "CORRECT_ERRORS",
            Self::MoveToHome => "MOVE_TO_HOME",
        };
        f.pad(name)
    }
}

pub struct ManualController {
    config: MachineConfig,
    parts: Vec<PlacementOrder>,
    keys: KeyRegister,
    link: Link,
    state: ManualState,
    part_index: usize,
    holding: bool,
    cycle: Option<NozzleCycle>,
    finished: bool,
    requested_theta: f64,
    preplace_diff: (f64, f64),
}

impl ManualController {
    pub fn new(
        parts: Vec<PlacementOrder>,
        config: MachineConfig,
        port: ControllerPort,
        keys: KeyRegister,
    ) -> Self {
        let mut link = Link::new(port);
        link.note(format!(
            "Initial state: {}  Operating in manual control mode, there are {} parts to place",
            ManualState::Home,
            parts.len()
        ));
        if let Some(first) = parts.first() {
            link.describe_part(0, first);
        }
        Self {
            config,
            parts,
            keys,
            link,
            state: ManualState::Home,
            part_index: 0,
            holding: false,
            cycle: None,
            finished: false,
            requested_theta: 0.0,
            preplace_diff: (0.0, 0.0),
        }
    }

    pub const fn state(&self) -> ManualState {
        self.state
    }

    /// Every part in the work order has been placed.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub const fn is_holding(&self) -> bool {
        self.holding
    }

    /// Rotation the next `r` will request.
    pub const fn requested_theta(&self) -> f64 {
        self.requested_theta
    }

    /// Offset the next `a` will request.
    pub const fn preplace_diff(&self) -> (f64, f64) {
        self.preplace_diff
    }

    pub fn drain_narration(&mut self) -> Vec<Narration> {
        self.link.drain()
    }

    pub(super) fn port(&self) -> &ControllerPort {
        self.link.port()
    }

    pub fn tick(&mut self) {
        if !matches!(self.state, ManualState::Home | ManualState::Wait) && self.link.refused() {
            self.cycle = None;
            self.go(ManualState::Wait, "Instruction not accepted, waiting for next instruction");
        }

        let key = match self.state {
            ManualState::Home | ManualState::Wait => self.keys.take(),
            _ => None,
        };

        match self.state {
            ManualState::Home => {
                if let Some(key) = key {
                    if !self.finished {
                        self.select_feeder(key);
                    }
                }
            }
            ManualState::MoveToFeeder => {
                if self.link.ready() {
                    self.go(ManualState::Wait, "Arrived at feeder, waiting for next instruction");
                }
            }
            ManualState::Wait => {
                if let Some(key) = key {
                    self.on_wait_key(key);
                }
            }
            ManualState::LowerCentre | ManualState::Vacuum | ManualState::RaiseCentre => {
                if self.link.ready() {
                    self.advance_cycle();
                }
            }
            ManualState::MoveToCamera => {
                if self.link.ready() && self.link.issue(Instruction::TakePhoto(PhotoDirection::Lookup)) {
                    self.go(ManualState::LookUpPhoto, "Arrived at camera. Taking look-up photo of part");
                }
            }
            ManualState::LookUpPhoto => {
                if self.link.ready() {
                    self.move_to_pcb();
                }
            }
            ManualState::MoveToPcb => {
                if self.link.ready() {
                    self.go(ManualState::LookDownPhoto, "Now at PCB. Taking look-down photo");
                }
            }
            ManualState::LookDownPhoto => {
                if self.link.issue(Instruction::TakePhoto(PhotoDirection::Lookdown)) {
                    self.go(
                        ManualState::CheckError,
                        "Look-down photo acquired. Checking for errors in alignment",
                    );
                }
            }
            ManualState::CheckError => {
                if self.link.ready() {
                    self.compute_corrections();
                }
            }
            ManualState::CorrectErrors => {
                if self.link.ready() {
                    self.go(ManualState::Wait, "Misalignment corrected, ready for next instruction");
                }
            }
            ManualState::MoveToHome => {
                if self.link.ready() {
                    self.go(ManualState::Home, "Gantry in Home position. Press q to quit.");
                }
            }
        }
    }

    fn go(&mut self, state: ManualState, reason: impl fmt::Display) {
        self.state = state;
        self.link.enter(state, reason);
    }

    fn on_wait_key(&mut self, key: char) {
        match key {
            'p' | 'P' => {
                let (kind, reason) = if self.holding {
                    (CycleKind::Place, "Issued instruction to place part on PCB. Lowering nozzle")
                } else {
                    (CycleKind::Pick, "Issued instruction to pick up part. Lowering centre nozzle")
                };
                let cycle = NozzleCycle::begin(MANUAL_NOZZLE, kind);
                if self.link.issue(cycle.instruction()) {
                    self.cycle = Some(cycle);
                    self.go(ManualState::LowerCentre, reason);
                }
            }
            'c' | 'C' => {
                if self.link.issue(move_to(self.config.lookup_camera())) {
                    self.go(ManualState::MoveToCamera, "Issued instruction to move to look-up camera");
                }
            }
            'r' | 'R' => {
                let rotate = Instruction::RotateNozzle {
                    nozzle: MANUAL_NOZZLE,
                    degrees: self.requested_theta,
                };
                if self.link.issue(rotate) {
                    self.go(ManualState::CorrectErrors, "Correcting part misalignment on nozzle");
                }
            }
            'a' | 'A' => {
                let (dx, dy) = self.preplace_diff;
                if self.link.issue(Instruction::AmendPosition { dx, dy }) {
                    self.go(ManualState::CorrectErrors, "Correcting preplace misalignment of gantry");
                }
            }
            'h' | 'H' => {
                if self.link.issue(move_to(self.config.home())) {
                    self.go(ManualState::MoveToHome, "Moving to home position");
                }
            }
            _ => self.select_feeder(key),
        }
    }

    /// Digit keys send the gantry to that feeder. Anything else is ignored.
    fn select_feeder(&mut self, key: char) {
        let Some(feeder) = key.to_digit(10).map(|d| d as usize) else {
            return;
        };
        let Some(position) = self.config.feeder(feeder) else {
            self.link.warn(format!("WARNING  No tape feeder {feeder} fitted to this machine"));
            return;
        };
        if let Some(expected) = self.parts.get(self.part_index).map(|p| p.feeder) {
            if expected != feeder {
                self.link.warn(format!("WARNING  The next part is in feeder {expected}."));
            }
        }
        if self.link.issue(move_to(position)) {
            self.go(
                ManualState::MoveToFeeder,
                format!("Issued instruction to move to tape feeder {feeder}"),
            );
        }
    }

    fn advance_cycle(&mut self) {
        let Some(cycle) = self.cycle else {
            return;
        };
        match cycle.advance() {
            Some(next) => {
                if self.link.issue(next.instruction()) {
                    self.cycle = Some(next);
                    self.go(ManualState::for_step(next.step), next.reason());
                }
            }
            None => {
                self.cycle = None;
                match cycle.kind {
                    CycleKind::Pick => {
                        self.holding = true;
                        self.go(ManualState::Wait, "Part acquired, ready for next instruction");
                    }
                    CycleKind::Place => self.part_placed(),
                }
            }
        }
    }

    fn part_placed(&mut self) {
        self.holding = false;
        self.part_index += 1;
        let placed = self.part_index - 1;
        if let Some(next) = self.parts.get(self.part_index) {
            let next = next.clone();
            self.go(ManualState::Home, format!("Part {placed} placed on PCB successfully"));
            self.link.describe_part(self.part_index, &next);
        } else {
            self.finished = true;
            if self.link.issue(move_to(self.config.home())) {
                self.go(ManualState::MoveToHome, "All parts have been placed! Moving to home");
            } else {
                self.go(ManualState::Home, "All parts have been placed!");
            }
        }
    }

    fn move_to_pcb(&mut self) {
        let Some(target) = self.parts.get(self.part_index).map(PlacementOrder::target) else {
            self.go(ManualState::Wait, "No part left to place, waiting for next instruction");
            return;
        };
        if self.link.issue(move_to(target)) {
            self.go(ManualState::MoveToPcb, "Look-up photo acquired. Moving to PCB");
        }
    }

    fn compute_corrections(&mut self) {
        let target_theta = self.parts.get(self.part_index).map_or(0.0, |p| p.theta);
        let pick_error = self.link.port().pick_error_theta(MANUAL_NOZZLE);
        let (ex, ey) = self.link.port().preplace_error();

        self.requested_theta = target_theta - pick_error;
        // The head sits at target + error, so the correction is the negated error.
        self.preplace_diff = (-ex, -ey);

        self.link.note(format!(
            "Part misalignment error: {pick_error:.2}, preplace misalignment error: x={ex:.2} y={ey:.2}"
        ));
        self.go(ManualState::Wait, "Waiting for next instruction. Recommend error correction");
    }
}

fn move_to(p: crate::types::Point) -> Instruction {
    Instruction::MoveHead { x: p.x, y: p.y }
}
