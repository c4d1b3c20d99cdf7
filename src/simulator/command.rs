//! Decoding and validating instructions taken from the channel.

use thiserror::Error;

use crate::config::MachineConfig;
use crate::types::{Instruction, InstructionCode, Nozzle, PendingInstruction, PhotoDirection, Point};

/// Why the process model refused an instruction. Only ever narrated;
/// nothing crosses the channel.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CommandRejected {
    #[error("destination out of range")]
    DestinationOutOfRange,

    #[error("one or more nozzles down")]
    NozzlesDown,

    #[error("nozzle out of range")]
    NozzleOutOfRange,

    #[error("specified camera is not Lookup or Lookdown")]
    UnknownCamera,

    #[error("angle is not a finite number")]
    NonFiniteAngle,
}

/// Turn the channel's untyped arguments back into an [`Instruction`].
pub fn decode(pending: &PendingInstruction) -> Result<Instruction, CommandRejected> {
    let nozzle = || Nozzle::from_index(pending.arg3).ok_or(CommandRejected::NozzleOutOfRange);
    Ok(match pending.code {
        InstructionCode::MoveHead => Instruction::MoveHead {
            x: pending.arg1,
            y: pending.arg2,
        },
        InstructionCode::RotateNozzle => Instruction::RotateNozzle {
            nozzle: nozzle()?,
            degrees: pending.arg1,
        },
        InstructionCode::LowerNozzle => Instruction::LowerNozzle(nozzle()?),
        InstructionCode::RaiseNozzle => Instruction::RaiseNozzle(nozzle()?),
        InstructionCode::ApplyVacuum => Instruction::ApplyVacuum(nozzle()?),
        InstructionCode::ReleaseVacuum => Instruction::ReleaseVacuum(nozzle()?),
        InstructionCode::TakePhoto => Instruction::TakePhoto(
            PhotoDirection::from_index(pending.arg3).ok_or(CommandRejected::UnknownCamera)?,
        ),
        InstructionCode::AmendPosition => Instruction::AmendPosition {
            dx: pending.arg1,
            dy: pending.arg2,
        },
        InstructionCode::LoadPcb => Instruction::LoadPcb,
        InstructionCode::UnloadPcb => Instruction::UnloadPcb,
    })
}

/// Check an instruction against the machine's current physical state.
pub fn check_preconditions(
    instruction: &Instruction,
    config: &MachineConfig,
    head: Point,
    any_nozzle_down: bool,
) -> Result<(), CommandRejected> {
    match *instruction {
        Instruction::MoveHead { x, y } => check_head_move(config, Point::new(x, y), any_nozzle_down),
        Instruction::AmendPosition { dx, dy } => {
            check_head_move(config, head.offset(dx, dy), any_nozzle_down)
        }
        Instruction::RotateNozzle { degrees, .. } if !degrees.is_finite() => {
            Err(CommandRejected::NonFiniteAngle)
        }
        _ => Ok(()),
    }
}

fn check_head_move(
    config: &MachineConfig,
    destination: Point,
    any_nozzle_down: bool,
) -> Result<(), CommandRejected> {
    if any_nozzle_down {
        Err(CommandRejected::NozzlesDown)
    } else if !config.in_workspace(destination) {
        Err(CommandRejected::DestinationOutOfRange)
    } else {
        Ok(())
    }
}

/// Simulated seconds an accepted instruction takes.
pub fn duration(instruction: &Instruction, config: &MachineConfig, head: Point) -> f64 {
    let t = &config.timing;
    match *instruction {
        Instruction::MoveHead { x, y } => head.distance_to(Point::new(x, y)) / config.head.full_speed,
        Instruction::AmendPosition { dx, dy } => dx.hypot(dy) / config.head.full_speed,
        Instruction::RotateNozzle { degrees, .. } => degrees.abs() / config.head.rotate_speed,
        Instruction::LowerNozzle(_) => t.nozzle_lower_secs,
        Instruction::RaiseNozzle(_) => t.nozzle_raise_secs,
        Instruction::ApplyVacuum(_) => t.vacuum_apply_secs,
        Instruction::ReleaseVacuum(_) => t.vacuum_release_secs,
        Instruction::TakePhoto(_) => t.photo_secs,
        Instruction::LoadPcb | Instruction::UnloadPcb => t.pcb_load_unload_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(code: InstructionCode, arg1: f64, arg2: f64, arg3: i64) -> PendingInstruction {
        PendingInstruction {
            code,
            arg1,
            arg2,
            arg3,
            seq: 1,
        }
    }

    #[test]
    fn test_decode_rejects_bad_selectors() {
        assert_eq!(
            decode(&raw(InstructionCode::LowerNozzle, 0.0, 0.0, 3)),
            Err(CommandRejected::NozzleOutOfRange)
        );
        assert_eq!(
            decode(&raw(InstructionCode::TakePhoto, 0.0, 0.0, 2)),
            Err(CommandRejected::UnknownCamera)
        );
    }

    #[test]
    fn test_decode_matches_encode() {
        let rotate = Instruction::RotateNozzle {
            nozzle: Nozzle::Right,
            degrees: 12.5,
        };
        assert_eq!(decode(&PendingInstruction::encode(&rotate, 4)), Ok(rotate));
    }

    #[test]
    fn test_nozzle_down_checked_before_range() {
        let config = MachineConfig::default();
        let far = Instruction::MoveHead { x: 2000.0, y: 0.0 };
        assert_eq!(
            check_preconditions(&far, &config, Point::default(), true),
            Err(CommandRejected::NozzlesDown)
        );
        assert_eq!(
            check_preconditions(&far, &config, Point::default(), false),
            Err(CommandRejected::DestinationOutOfRange)
        );
    }

    #[test]
    fn test_amend_checks_resulting_position() {
        let config = MachineConfig::default();
        let amend = Instruction::AmendPosition { dx: 10.0, dy: 0.0 };
        assert!(check_preconditions(&amend, &config, Point::new(985.0, 0.0), false).is_ok());
        assert_eq!(
            check_preconditions(&amend, &config, Point::new(995.0, 0.0), false),
            Err(CommandRejected::DestinationOutOfRange)
        );
    }

    #[test]
    fn test_durations() {
        let config = MachineConfig::default();
        let head = Point::new(0.0, 0.0);
        let mv = Instruction::MoveHead { x: 300.0, y: 400.0 };
        assert!((duration(&mv, &config, head) - 0.5).abs() < 1e-12);
        let rotate = Instruction::RotateNozzle {
            nozzle: Nozzle::Left,
            degrees: -90.0,
        };
        assert!((duration(&rotate, &config, head) - 0.25).abs() < 1e-12);
        assert_eq!(duration(&Instruction::LowerNozzle(Nozzle::Centre), &config, head), 0.1);
        assert_eq!(duration(&Instruction::LoadPcb, &config, head), 1.0);
    }
}
