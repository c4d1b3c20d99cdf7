//! Lower / vacuum / raise sub-cycle shared by every nozzle.
//!
//! A pick applies vacuum between lowering and raising; a place releases it.
//! Both controllers drive a [`NozzleCycle`] one step per completed
//! instruction instead of spelling the sequence out per nozzle.

use crate::types::{Instruction, Nozzle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Pick,
    Place,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    Lower,
    Vacuum,
    Raise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NozzleCycle {
    pub nozzle: Nozzle,
    pub kind: CycleKind,
    pub step: CycleStep,
}

impl NozzleCycle {
    pub const fn begin(nozzle: Nozzle, kind: CycleKind) -> Self {
        Self {
            nozzle,
            kind,
            step: CycleStep::Lower,
        }
    }

    /// Instruction that carries out the current step.
    pub const fn instruction(&self) -> Instruction {
        match (self.step, self.kind) {
            (CycleStep::Lower, _) => Instruction::LowerNozzle(self.nozzle),
            (CycleStep::Vacuum, CycleKind::Pick) => Instruction::ApplyVacuum(self.nozzle),
            (CycleStep::Vacuum, CycleKind::Place) => Instruction::ReleaseVacuum(self.nozzle),
            (CycleStep::Raise, _) => Instruction::RaiseNozzle(self.nozzle),
        }
    }

    /// The step after this one, or `None` once the nozzle is back up.
    pub const fn advance(self) -> Option<Self> {
        let step = match self.step {
            CycleStep::Lower => CycleStep::Vacuum,
            CycleStep::Vacuum => CycleStep::Raise,
            CycleStep::Raise => return None,
        };
        Some(Self { step, ..self })
    }

    /// State label in the controller's narration, e.g. `VAC_LEFT_NOZZLE`.
    pub const fn label(&self) -> &'static str {
        match (self.step, self.nozzle) {
            (CycleStep::Lower, Nozzle::Left) => "LOWER_LEFT_NOZZLE",
            (CycleStep::Lower, Nozzle::Centre) => "LOWER_CNTR_NOZZLE",
            (CycleStep::Lower, Nozzle::Right) => "LOWER_RIGHT_NOZZLE",
            (CycleStep::Vacuum, Nozzle::Left) => "VAC_LEFT_NOZZLE",
            (CycleStep::Vacuum, Nozzle::Centre) => "VAC_CNTR_NOZZLE",
            (CycleStep::Vacuum, Nozzle::Right) => "VAC_RIGHT_NOZZLE",
            (CycleStep::Raise, Nozzle::Left) => "RAISE_LEFT_NOZZLE",
            (CycleStep::Raise, Nozzle::Centre) => "RAISE_CNTR_NOZZLE",
            (CycleStep::Raise, Nozzle::Right) => "RAISE_RIGHT_NOZZLE",
        }
    }

    /// Narration reason for entering the current step.
    pub const fn reason(&self) -> &'static str {
        match (self.step, self.kind) {
            (CycleStep::Lower, CycleKind::Pick) => "Lowering nozzle to pick up part",
            (CycleStep::Lower, CycleKind::Place) => "Lowering nozzle to place part on PCB",
            (CycleStep::Vacuum, CycleKind::Pick) => "Applying vacuum",
            (CycleStep::Vacuum, CycleKind::Place) => "Releasing vacuum to place part",
            (CycleStep::Raise, _) => "Raising nozzle",
        }
    }
}
