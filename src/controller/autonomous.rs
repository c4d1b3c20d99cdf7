//! Fully automatic placement using all three nozzles.
//!
//! Parts are visited in [`placement_sequence`] order. Each batch fills the
//! free nozzles left to right, one feeder stop per nozzle, then:
//!
//! 1. one look-up photo at the camera measures every held part,
//! 2. rotation corrections run most-recently-picked first,
//! 3. parts are placed in pick order, each after its own look-down photo
//!    and position amendment.
//!
//! `HOME` is revisited between batches until the work order is exhausted.

use std::fmt;

use super::cycle::{CycleKind, NozzleCycle};
use super::link::Link;
use crate::channel::ControllerPort;
use crate::config::MachineConfig;
use crate::narration::Narration;
use crate::types::{Instruction, Nozzle, PerNozzle, PhotoDirection, PlacementOrder, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoState {
    Home,
    MoveToFeeder,
    Cycle(NozzleCycle),
    MoveToCamera,
    LookUpPhoto,
    CheckError,
    FixNozzleError(Nozzle),
    MoveToPcb,
    LookDownPhoto,
    FixPreplaceError,
    MoveToHome,
}

impl fmt::Display for AutoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Home => "HOME",
            Self::MoveToFeeder => "MOVE_TO_FEEDER",
            Self::Cycle(cycle) => cycle.label(),
            Self::MoveToCamera => "MOVE_TO_CAMERA",
            Self::LookUpPhoto => "LOOK_UP_PHOTO",
            Self::CheckError => "CHECK_ERROR",
            Self::FixNozzleError(_) => "FIX_NOZZLE_ERROR",
            Self::MoveToPcb => "MOVE_TO_PCB",
            Self::LookDownPhoto => "LOOK_DOWN_PHOTO",
            Self::FixPreplaceError => "FIX_PREPLACE_ERROR",
            Self::MoveToHome => "MOVE_TO_HOME",
        };
        f.pad(name)
    }
}

/// Indices of `parts` sorted by feeder, then by target y.
///
/// The sort is stable, so parts sharing both keep their file order.
pub fn placement_sequence(parts: &[PlacementOrder]) -> Vec<usize> {
    let mut sequence: Vec<usize> = (0..parts.len()).collect();
    sequence.sort_by(|&a, &b| {
        parts[a]
            .feeder
            .cmp(&parts[b].feeder)
            .then_with(|| parts[a].y.total_cmp(&parts[b].y))
    });
    sequence
}

pub struct AutonomousController {
    config: MachineConfig,
    parts: Vec<PlacementOrder>,
    sequence: Vec<usize>,
    link: Link,
    state: AutoState,
    /// Position in `sequence` of the next part to pick.
    next_pick: usize,
    /// Part index held by each nozzle.
    held: PerNozzle<Option<usize>>,
    /// Loaded nozzles in the order they picked; placement follows this.
    pick_order: Vec<Nozzle>,
    /// Nozzles still awaiting rotation correction; the last entry goes first.
    to_correct: Vec<Nozzle>,
    requested_theta: PerNozzle<f64>,
    /// Photo whose results `CHECK_ERROR` is waiting to evaluate.
    photo: Option<PhotoDirection>,
    placed: usize,
}

impl AutonomousController {
    pub fn new(parts: Vec<PlacementOrder>, config: MachineConfig, port: ControllerPort) -> Self {
        let mut link = Link::new(port);
        link.note(format!(
            "Initial state: {}  Operating in automatic mode, there are {} parts to place",
            AutoState::Home,
            parts.len()
        ));
        let sequence = placement_sequence(&parts);
        for &index in &sequence {
            link.describe_part(index, &parts[index]);
        }
        Self {
            config,
            parts,
            sequence,
            link,
            state: AutoState::Home,
            next_pick: 0,
            held: PerNozzle::default(),
            pick_order: Vec::with_capacity(3),
            to_correct: Vec::with_capacity(3),
            requested_theta: PerNozzle::default(),
            photo: None,
            placed: 0,
        }
    }

    pub const fn state(&self) -> AutoState {
        self.state
    }

    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    pub fn is_finished(&self) -> bool {
        self.placed == self.parts.len()
    }

    pub const fn placed_count(&self) -> usize {
        self.placed
    }

    pub fn drain_narration(&mut self) -> Vec<Narration> {
        self.link.drain()
    }

    pub(super) fn port(&self) -> &ControllerPort {
        self.link.port()
    }

    pub fn tick(&mut self) {
        match self.state {
            AutoState::Home => {
                if self.link.ready() {
                    self.start_batch();
                }
            }
            AutoState::MoveToFeeder => {
                if self.link.ready() {
                    self.start_pick();
                }
            }
            AutoState::Cycle(cycle) => {
                if self.link.ready() {
                    self.advance_cycle(cycle);
                }
            }
            AutoState::MoveToCamera => {
                if self.link.ready() && self.link.issue(Instruction::TakePhoto(PhotoDirection::Lookup)) {
                    self.go(AutoState::LookUpPhoto, "Arrived at camera. Taking look-up photo of part");
                }
            }
            AutoState::LookUpPhoto => {
                if self.link.ready() {
                    self.photo = Some(PhotoDirection::Lookup);
                    self.go(
                        AutoState::CheckError,
                        "Look-up photo acquired. Checking errors and calculating corrections",
                    );
                }
            }
            AutoState::CheckError => {
                if self.link.ready() {
                    self.check_error();
                }
            }
            AutoState::FixNozzleError(nozzle) => {
                if self.link.ready() {
                    let rotate = Instruction::RotateNozzle {
                        nozzle,
                        degrees: self.requested_theta[nozzle],
                    };
                    if self.link.issue(rotate) {
                        self.to_correct.pop();
                        self.go(AutoState::CheckError, "Checking for errors...");
                    }
                }
            }
            AutoState::MoveToPcb => {
                if self.link.ready() {
                    self.go(AutoState::LookDownPhoto, "Now at PCB. Taking look-down photo");
                }
            }
            AutoState::LookDownPhoto => {
                if self.link.issue(Instruction::TakePhoto(PhotoDirection::Lookdown)) {
                    self.photo = Some(PhotoDirection::Lookdown);
                    self.go(
                        AutoState::CheckError,
                        "Look-down photo acquired. Checking for errors in gantry alignment",
                    );
                }
            }
            AutoState::FixPreplaceError => {
                if self.link.ready() {
                    self.start_place();
                }
            }
            AutoState::MoveToHome => {
                if self.link.ready() {
                    self.go(
                        AutoState::Home,
                        "Gantry in Home position. Placement complete. Press q to quit.",
                    );
                }
            }
        }
    }

    fn go(&mut self, state: AutoState, reason: impl fmt::Display) {
        self.state = state;
        self.link.enter(state, reason);
    }

    fn free_nozzle(&self) -> Option<Nozzle> {
        Nozzle::ALL.into_iter().find(|&n| self.held[n].is_none())
    }

    fn next_part(&self) -> Option<usize> {
        self.sequence.get(self.next_pick).copied()
    }

    /// Gantry position that puts `nozzle` over the feeder of `part`.
    fn feeder_stop(&mut self, part: usize, nozzle: Nozzle) -> Option<Point> {
        let feeder = self.parts[part].feeder;
        let Some(position) = self.config.feeder(feeder) else {
            self.link.warn(format!("WARNING  No tape feeder {feeder} fitted to this machine"));
            return None;
        };
        Some(self.config.head_position_for(nozzle, position))
    }

    // ------------------------------------------------------------------------
    // Picking
    // ------------------------------------------------------------------------

    fn start_batch(&mut self) {
        let (Some(part), Some(nozzle)) = (self.next_part(), self.free_nozzle()) else {
            return;
        };
        let Some(stop) = self.feeder_stop(part, nozzle) else {
            return;
        };
        if self.link.issue(move_to(stop)) {
            let feeder = self.parts[part].feeder;
            self.go(AutoState::MoveToFeeder, format!("Moving to tape feeder {feeder}"));
        }
    }

    fn start_pick(&mut self) {
        let Some(nozzle) = self.free_nozzle() else {
            self.move_to_camera("All nozzles loaded, moving to look-up camera");
            return;
        };
        let cycle = NozzleCycle::begin(nozzle, CycleKind::Pick);
        if self.link.issue(cycle.instruction()) {
            self.go(
                AutoState::Cycle(cycle),
                format!("Arrived at feeder, lowering {nozzle} nozzle"),
            );
        }
    }

    fn advance_cycle(&mut self, cycle: NozzleCycle) {
        match cycle.advance() {
            Some(next) => {
                if self.link.issue(next.instruction()) {
                    self.go(AutoState::Cycle(next), next.reason());
                }
            }
            None => match cycle.kind {
                CycleKind::Pick => self.picked(cycle.nozzle),
                CycleKind::Place => self.placed(cycle.nozzle),
            },
        }
    }

    fn picked(&mut self, nozzle: Nozzle) {
        self.held[nozzle] = self.next_part();
        self.next_pick += 1;
        self.pick_order.push(nozzle);
        self.to_correct.push(nozzle);

        let upcoming = self.next_part().zip(self.free_nozzle());
        match upcoming {
            None if self.free_nozzle().is_none() => {
                self.move_to_camera("All parts acquired, moving to look-up camera");
            }
            None => self.move_to_camera("Part acquired, moving to look-up camera"),
            Some((part, next_nozzle)) => {
                let Some(stop) = self.feeder_stop(part, next_nozzle) else {
                    self.move_to_camera("Part acquired, moving to look-up camera");
                    return;
                };
                if self.link.issue(move_to(stop)) {
                    let feeder = self.parts[part].feeder;
                    self.go(AutoState::MoveToFeeder, format!("Moving to feeder {feeder}"));
                }
            }
        }
    }

    fn move_to_camera(&mut self, reason: &str) {
        if self.link.issue(move_to(self.config.lookup_camera())) {
            self.go(AutoState::MoveToCamera, reason);
        }
    }

    // ------------------------------------------------------------------------
    // Corrections
    // ------------------------------------------------------------------------

    fn check_error(&mut self) {
        match self.photo {
            Some(PhotoDirection::Lookup) => self.check_pick_error(),
            Some(PhotoDirection::Lookdown) => self.check_preplace_error(),
            None => {}
        }
    }

    fn check_pick_error(&mut self) {
        let Some(&nozzle) = self.to_correct.last() else {
            self.photo = None;
            self.move_to_next_target("No further errors. Moving to PCB");
            return;
        };
        let target = self.held[nozzle].map_or(0.0, |part| self.parts[part].theta);
        let error = self.link.port().pick_error_theta(nozzle);
        let correction = target - error;
        self.requested_theta[nozzle] = correction;
        self.link.note(format!(
            "{} part misalignment error: {error:.2}  Correction required: {correction:.2} degrees",
            nozzle.name()
        ));
        self.go(
            AutoState::FixNozzleError(nozzle),
            format!("Correction made to {nozzle} nozzle for part alignment"),
        );
    }

    fn check_preplace_error(&mut self) {
        let (ex, ey) = self.link.port().preplace_error();
        self.link.note(format!("Preplace misalignment error: x={ex:.2} y={ey:.2}"));
        // The head sits at target + error, so the correction is the negated error.
        if self.link.issue(Instruction::AmendPosition { dx: -ex, dy: -ey }) {
            self.photo = None;
            self.go(AutoState::FixPreplaceError, "Correction made to gantry position");
        }
    }

    // ------------------------------------------------------------------------
    // Placing
    // ------------------------------------------------------------------------

    /// Move to the target of the earliest-picked part still held.
    fn move_to_next_target(&mut self, reason: &str) {
        let Some(target) = self
            .pick_order
            .first()
            .and_then(|&n| self.held[n])
            .map(|part| self.parts[part].target())
        else {
            return;
        };
        if self.link.issue(move_to(target)) {
            self.go(AutoState::MoveToPcb, reason);
        }
    }

    fn start_place(&mut self) {
        let Some(&nozzle) = self.pick_order.first() else {
            return;
        };
        let cycle = NozzleCycle::begin(nozzle, CycleKind::Place);
        if self.link.issue(cycle.instruction()) {
            self.go(
                AutoState::Cycle(cycle),
                format!("Now lowering {nozzle} nozzle to place part on PCB"),
            );
        }
    }

    fn placed(&mut self, nozzle: Nozzle) {
        let part = self.held[nozzle].take();
        self.pick_order.retain(|&n| n != nozzle);
        self.placed += 1;
        if let Some(part) = part {
            self.link.note(format!("Part {part} placed on PCB successfully"));
        }

        if let Some(next) = self.pick_order.first().and_then(|&n| self.held[n]) {
            let target = self.parts[next].target();
            self.move_to_next_target(&format!(
                "Moving to next position x: {:.2} y: {:.2}",
                target.x, target.y
            ));
        } else if self.is_finished() {
            if self.link.issue(move_to(self.config.home())) {
                self.go(AutoState::MoveToHome, "All parts have been placed! Moving to home");
            }
        } else {
            self.go(AutoState::Home, "Moving to next feeder");
        }
    }
}

fn move_to(p: Point) -> Instruction {
    Instruction::MoveHead { x: p.x, y: p.y }
}
