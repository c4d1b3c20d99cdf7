//! Machine Scenario Tests
//!
//! Drives the controller and the process model together through the
//! lockstep bench and checks the observable outcome: where parts end up,
//! what the narration says, and how the shared status record behaves.
//!
//! Every run is seeded, so misalignment draws are reproducible.

use pnp_machine::channel::MachineChannel;
use pnp_machine::config::MachineConfig;
use pnp_machine::controller::{placement_sequence, Controller, ManualState};
use pnp_machine::narration::Severity;
use pnp_machine::simulator::{Phase, Simulator};
use pnp_machine::types::{Instruction, Nozzle, Point};
use pnp_machine::worklist::parse_work_order;
use pnp_machine::Bench;

/// Generous upper bound on controller ticks for any scenario here.
const MAX_STEPS: u64 = 50_000;

fn bench(centroid: &str, seed: u64) -> Bench {
    Bench::new(
        MachineConfig::default(),
        parse_work_order(centroid).unwrap(),
        Some(seed),
    )
}

fn manual_state(bench: &Bench) -> ManualState {
    match bench.controller() {
        Controller::Manual(c) => c.state(),
        Controller::Autonomous(_) => panic!("expected manual controller"),
    }
}

fn transcript_contains(bench: &Bench, needle: &str) -> bool {
    bench.transcript().iter().any(|line| line.message.contains(needle))
}

// ============================================================================
// Process model against the raw channel
// ============================================================================

/// Issue, then tick until ready comes back.
fn run(sim: &mut Simulator, channel: &MachineChannel, instruction: Instruction) {
    let port = channel.controller_port();
    port.issue(&instruction).unwrap();
    for _ in 0..100_000 {
        sim.tick();
        if port.is_ready() {
            return;
        }
    }
    panic!("{instruction:?} never completed");
}

#[test]
fn only_one_instruction_is_ever_in_flight() {
    let channel = MachineChannel::new();
    let mut sim = Simulator::new(MachineConfig::default(), channel.simulator_port(), Some(1));
    let port = channel.controller_port();

    port.issue(&Instruction::MoveHead { x: 900.0, y: 900.0 }).unwrap();
    // Not yet accepted: the newer instruction replaces it.
    port.issue(&Instruction::MoveHead { x: 500.0, y: 500.0 }).unwrap();
    assert!(!port.is_ready());

    sim.tick();
    // Accepted and executing: busy, further instructions refused.
    assert!(matches!(
        sim.phase(),
        Phase::Executing { instruction: Instruction::MoveHead { x, y }, .. } if x == 500.0 && y == 500.0
    ));
    assert!(channel.snapshot().pending_instruction.is_none());
    assert!(port.issue(&Instruction::LowerNozzle(Nozzle::Centre)).is_err());
}

#[test]
fn in_bounds_move_lands_exactly() {
    let channel = MachineChannel::new();
    let mut sim = Simulator::new(MachineConfig::default(), channel.simulator_port(), Some(1));
    run(&mut sim, &channel, Instruction::MoveHead { x: 123.456, y: -78.9 });
    assert_eq!(sim.head(), Point::new(123.456, -78.9));
}

#[test]
fn out_of_range_move_is_narrated_and_stalls() {
    let channel = MachineChannel::new();
    let mut sim = Simulator::new(MachineConfig::default(), channel.simulator_port(), Some(1));
    let port = channel.controller_port();
    sim.drain_narration();

    port.issue(&Instruction::MoveHead { x: 2000.0, y: 0.0 }).unwrap();
    for _ in 0..20 {
        sim.tick();
    }

    let lines = sim.drain_narration();
    let bad: Vec<_> = lines
        .iter()
        .filter(|l| l.message.starts_with("Bad MOVE_HEAD"))
        .collect();
    assert_eq!(bad.len(), 1, "rejection narrated once: {lines:?}");
    assert_eq!(bad[0].severity, Severity::Warning);
    assert_eq!(sim.head(), Point::new(0.0, 0.0));
    assert!(!port.is_ready());
    assert!(port.instruction_refused());
    assert!(channel.snapshot().ready_for_next_instruction);
    assert!(channel.snapshot().pending_instruction.is_some());
}

#[test]
fn valid_move_after_a_refused_one_completes() {
    let channel = MachineChannel::new();
    let mut sim = Simulator::new(MachineConfig::default(), channel.simulator_port(), Some(1));
    let port = channel.controller_port();

    port.issue(&Instruction::MoveHead { x: 2000.0, y: 0.0 }).unwrap();
    for _ in 0..5 {
        sim.tick();
    }
    assert!(port.instruction_refused());

    run(&mut sim, &channel, Instruction::MoveHead { x: 100.0, y: 100.0 });
    assert_eq!(sim.head(), Point::new(100.0, 100.0));
    assert!(channel.snapshot().pending_instruction.is_none());
}

#[test]
fn move_with_a_nozzle_down_is_refused() {
    let channel = MachineChannel::new();
    let mut sim = Simulator::new(MachineConfig::default(), channel.simulator_port(), Some(1));
    run(&mut sim, &channel, Instruction::LowerNozzle(Nozzle::Right));

    channel
        .controller_port()
        .issue(&Instruction::MoveHead { x: 10.0, y: 10.0 })
        .unwrap();
    for _ in 0..50 {
        sim.tick();
    }
    assert_eq!(sim.head(), Point::new(0.0, 0.0));
    assert_eq!(sim.phase(), Phase::Idle);
}

#[test]
fn pickup_happens_whichever_of_lower_and_vacuum_comes_last() {
    for vacuum_first in [false, true] {
        let channel = MachineChannel::new();
        let mut sim = Simulator::new(MachineConfig::default(), channel.simulator_port(), Some(1));
        run(&mut sim, &channel, Instruction::MoveHead { x: 150.0, y: -100.0 });

        let lower = Instruction::LowerNozzle(Nozzle::Centre);
        let vacuum = Instruction::ApplyVacuum(Nozzle::Centre);
        let (first, second) = if vacuum_first { (vacuum, lower) } else { (lower, vacuum) };
        run(&mut sim, &channel, first);
        assert_eq!(sim.nozzle(Nozzle::Centre).held_feeder, None);
        run(&mut sim, &channel, second);
        assert_eq!(sim.nozzle(Nozzle::Centre).held_feeder, Some(1));
    }
}

#[test]
fn a_released_part_is_either_placed_or_dropped() {
    let channel = MachineChannel::new();
    let mut sim = Simulator::new(MachineConfig::default(), channel.simulator_port(), Some(1));
    run(&mut sim, &channel, Instruction::MoveHead { x: 50.0, y: -100.0 });
    run(&mut sim, &channel, Instruction::LowerNozzle(Nozzle::Centre));
    run(&mut sim, &channel, Instruction::ApplyVacuum(Nozzle::Centre));
    run(&mut sim, &channel, Instruction::RaiseNozzle(Nozzle::Centre));
    run(&mut sim, &channel, Instruction::MoveHead { x: 200.0, y: 300.0 });
    // Released while raised: dropped, never placed.
    run(&mut sim, &channel, Instruction::ReleaseVacuum(Nozzle::Centre));

    assert_eq!(sim.dropped_parts(), 1);
    assert!(sim.placed_parts().is_empty());
    assert!(!sim.nozzle(Nozzle::Centre).is_holding());
}

#[test]
fn polling_without_instructions_changes_only_time() {
    let mut bench = bench("m 1 R1 0603 1 100 100 0 0", 2);
    let before = bench.channel().snapshot();
    for _ in 0..200 {
        bench.step();
    }
    let after = bench.channel().snapshot();

    assert!(after.sim_time > before.sim_time);
    assert_eq!(after.pending_instruction, before.pending_instruction);
    assert_eq!(after.ready_for_next_instruction, before.ready_for_next_instruction);
    assert_eq!(bench.simulator().head(), Point::new(0.0, 0.0));
    assert_eq!(manual_state(&bench), ManualState::Home);
}

// ============================================================================
// Manual mode
// ============================================================================

#[test]
fn manual_pick_camera_place_puts_one_part_on_the_board() {
    let mut bench = bench("m 1 R1 0603 1 100 100 0 0", 4);
    assert_eq!(bench.feed_keys("0pcp", 2_000), 4);
    bench.run_until(Bench::is_done, MAX_STEPS);

    assert!(matches!(
        manual_state(&bench),
        ManualState::Home | ManualState::MoveToHome
    ));
    let report = bench.report();
    assert_eq!(report.placed.len(), 1);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.placed[0].feeder, 0);
    assert!(transcript_contains(&bench, "All parts have been placed!"));
}

#[test]
fn manual_corrections_land_the_part_on_target() {
    let mut bench = bench("m 1 C7 0805 0.1 250 400 90 3", 9);
    assert_eq!(bench.feed_keys("3pcrap", 2_000), 6);
    assert!(bench.run_until(Bench::is_done, MAX_STEPS));

    let placed = bench.report().placed;
    assert_eq!(placed.len(), 1);
    assert!((placed[0].x - 250.0).abs() < 1e-6, "x = {}", placed[0].x);
    assert!((placed[0].y - 400.0).abs() < 1e-6, "y = {}", placed[0].y);
    assert!((placed[0].theta - 90.0).abs() < 1e-6, "theta = {}", placed[0].theta);
}

#[test]
fn manual_wrong_feeder_is_advised_but_honoured() {
    let mut bench = bench("m 1 R1 0603 1 100 100 0 2", 4);
    bench.feed_keys("5", 2_000);
    assert!(bench.run_until(Bench::awaiting_key, 2_000));

    assert_eq!(manual_state(&bench), ManualState::Wait);
    assert_eq!(bench.simulator().head(), Point::new(550.0, -100.0));
    assert!(transcript_contains(&bench, "The next part is in feeder 2."));
}

#[test]
fn manual_operator_recovers_from_an_unreachable_target() {
    let mut bench = bench("m 1 R1 0603 1 1500 100 0 0", 4);
    assert_eq!(bench.feed_keys("0pch", 5_000), 4);
    assert!(bench.run_until(Bench::awaiting_key, 5_000));

    assert!(transcript_contains(&bench, "Bad MOVE_HEAD command"));
    assert!(transcript_contains(&bench, "Instruction not accepted"));
    assert_eq!(manual_state(&bench), ManualState::Home);
    assert_eq!(bench.simulator().head(), Point::new(0.0, 0.0));
    assert!(bench.channel().snapshot().pending_instruction.is_none());
    match bench.controller() {
        Controller::Manual(c) => assert!(c.is_holding()),
        Controller::Autonomous(_) => panic!("expected manual controller"),
    }
}

#[test]
fn quit_key_stops_both_sides() {
    let mut bench = bench("m 1 R1 0603 1 100 100 0 0", 4);
    bench.feed_keys("0q", 2_000);
    bench.run_until(|b| b.simulator().is_stopped(), 100);

    assert!(bench.simulator().is_stopped());
    assert!(bench.channel().snapshot().quit);
    assert!(transcript_contains(&bench, "Terminating..."));
}

// ============================================================================
// Autonomous mode
// ============================================================================

#[test]
fn placement_order_sorts_by_feeder_then_y() {
    let order = parse_work_order(
        "a 4 \
         A 0603 1 10 50 0 2 \
         B 0603 1 10 10 0 1 \
         C 0603 1 10 30 0 2 \
         D 0603 1 10 20 0 1",
    )
    .unwrap();
    assert_eq!(placement_sequence(&order.parts), vec![1, 3, 2, 0]);
}

#[test]
fn autonomous_run_places_every_part_on_target() {
    let centroid = "a 5 \
        R1 0603 100 120 340 0 2 \
        R2 0603 100 520 80 90 2 \
        C1 0805 0.1 700 610 -45 0 \
        U1 SOIC8 0 330 220 180 4 \
        L1 0805 10 860 900 30 0";
    let order = parse_work_order(centroid).unwrap();
    let mut bench = bench(centroid, 21);
    assert!(bench.run_until(Bench::is_done, MAX_STEPS), "run did not finish");

    let report = bench.report();
    assert_eq!(report.dropped, 0);
    assert_eq!(report.placed.len(), order.parts.len());
    assert_eq!(report.head, Point::new(0.0, 0.0));

    let sequence = placement_sequence(&order.parts);
    for (record, &index) in report.placed.iter().zip(&sequence) {
        let part = &order.parts[index];
        assert_eq!(record.feeder, part.feeder, "{}", part.designation);
        assert!((record.x - part.x).abs() < 1e-6, "{} x = {}", part.designation, record.x);
        assert!((record.y - part.y).abs() < 1e-6, "{} y = {}", part.designation, record.y);
        assert!(
            (record.theta - part.theta).abs() < 1e-6,
            "{} theta = {}",
            part.designation,
            record.theta
        );
    }
    assert!(!bench
        .transcript()
        .iter()
        .any(|l| l.message.starts_with("Bad ")));
}

#[test]
fn same_seed_gives_the_same_transcript() {
    let centroid = "a 2 R1 0603 1 100 100 10 0 R2 0603 1 200 200 20 1";
    let mut first = bench(centroid, 77);
    let mut second = bench(centroid, 77);
    first.run_until(Bench::is_done, MAX_STEPS);
    second.run_until(Bench::is_done, MAX_STEPS);
    assert_eq!(first.transcript(), second.transcript());
}
