//! Instruction vocabulary shared by the controller and the process model.

use serde::{Deserialize, Serialize};

use super::Nozzle;

/// Instruction codes as they appear in the status channel.
///
/// The channel carries the code plus up to three untyped arguments; the
/// typed [`Instruction`] is what both sides reason about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InstructionCode {
    MoveHead,
    RotateNozzle,
    LowerNozzle,
    RaiseNozzle,
    ApplyVacuum,
    ReleaseVacuum,
    TakePhoto,
    AmendPosition,
    LoadPcb,
    UnloadPcb,
}

impl std::fmt::Display for InstructionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MoveHead => "MOVE_HEAD",
            Self::RotateNozzle => "ROTATE_NOZZLE",
            Self::LowerNozzle => "LOWER_NOZZLE",
            Self::RaiseNozzle => "RAISE_NOZZLE",
            Self::ApplyVacuum => "APPLY_VACUUM",
            Self::ReleaseVacuum => "RELEASE_VACUUM",
            Self::TakePhoto => "TAKE_PHOTO",
            Self::AmendPosition => "AMEND_HEAD_POSITION",
            Self::LoadPcb => "LOAD_PCB",
            Self::UnloadPcb => "UNLOAD_PCB",
        };
        write!(f, "{name}")
    }
}

/// Which camera a photo is taken with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PhotoDirection {
    /// Fixed camera looking up at parts held on the nozzles.
    Lookup,
    /// Gantry camera looking down at the PCB.
    Lookdown,
}

impl PhotoDirection {
    pub const fn index(self) -> i64 {
        match self {
            Self::Lookup => 0,
            Self::Lookdown => 1,
        }
    }

    pub const fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Lookup),
            1 => Some(Self::Lookdown),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhotoDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lookup => write!(f, "lookup"),
            Self::Lookdown => write!(f, "lookdown"),
        }
    }
}

/// A physical instruction with typed arguments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Instruction {
    /// Move the gantry to an absolute position.
    MoveHead { x: f64, y: f64 },
    /// Rotate a nozzle by a relative angle in degrees.
    RotateNozzle { nozzle: Nozzle, degrees: f64 },
    LowerNozzle(Nozzle),
    RaiseNozzle(Nozzle),
    ApplyVacuum(Nozzle),
    ReleaseVacuum(Nozzle),
    TakePhoto(PhotoDirection),
    /// Shift the gantry by a relative offset.
    AmendPosition { dx: f64, dy: f64 },
    LoadPcb,
    UnloadPcb,
}

impl Instruction {
    pub const fn code(&self) -> InstructionCode {
        match self {
            Self::MoveHead { .. } => InstructionCode::MoveHead,
            Self::RotateNozzle { .. } => InstructionCode::RotateNozzle,
            Self::LowerNozzle(_) => InstructionCode::LowerNozzle,
            Self::RaiseNozzle(_) => InstructionCode::RaiseNozzle,
            Self::ApplyVacuum(_) => InstructionCode::ApplyVacuum,
            Self::ReleaseVacuum(_) => InstructionCode::ReleaseVacuum,
            Self::TakePhoto(_) => InstructionCode::TakePhoto,
            Self::AmendPosition { .. } => InstructionCode::AmendPosition,
            Self::LoadPcb => InstructionCode::LoadPcb,
            Self::UnloadPcb => InstructionCode::UnloadPcb,
        }
    }

    /// Flatten into the channel's `(arg1, arg2, arg3)` argument slots.
    ///
    /// Coordinates and angles use the float slots; nozzle and camera
    /// selectors use the integer slot.
    pub const fn args(&self) -> (f64, f64, i64) {
        match *self {
            Self::MoveHead { x, y } => (x, y, 0),
            Self::AmendPosition { dx, dy } => (dx, dy, 0),
            Self::RotateNozzle { nozzle, degrees } => (degrees, 0.0, nozzle.index() as i64),
            Self::LowerNozzle(n)
            | Self::RaiseNozzle(n)
            | Self::ApplyVacuum(n)
            | Self::ReleaseVacuum(n) => (0.0, 0.0, n.index() as i64),
            Self::TakePhoto(direction) => (0.0, 0.0, direction.index()),
            Self::LoadPcb | Self::UnloadPcb => (0.0, 0.0, 0),
        }
    }
}

/// An instruction as written into the status channel by the controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PendingInstruction {
    pub code: InstructionCode,
    pub arg1: f64,
    pub arg2: f64,
    pub arg3: i64,
    /// Issue counter, unique per instruction written by the controller.
    pub seq: u64,
}

impl PendingInstruction {
    pub const fn encode(instruction: &Instruction, seq: u64) -> Self {
        let (arg1, arg2, arg3) = instruction.args();
        Self {
            code: instruction.code(),
            arg1,
            arg2,
            arg3,
            seq,
        }
    }
}
