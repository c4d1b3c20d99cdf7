//! Process model
//!
//! Owns ground truth for the gantry and its three nozzles and executes one
//! instruction at a time against simulated time.
//!
//! ```text
//!           valid pending instruction
//!   Idle ─────────────────────────────▶ Executing(instruction, finish_time)
//!    ▲                                        │
//!    └────────── sim_time ≥ finish_time ──────┘ (apply effect, ready = true)
//! ```
//!
//! An invalid instruction is narrated as a bad command and left on the
//! channel; the model stays `Idle`. Simulated time advances by exactly one
//! poll interval per [`Simulator::tick`] and is published every tick.

mod command;
mod nozzle;
mod report;

pub use command::{check_preconditions, decode, duration, CommandRejected};
pub use nozzle::NozzleState;
pub use report::SimulationReport;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};

use crate::channel::SimulatorPort;
use crate::config::MachineConfig;
use crate::narration::{Narration, Narrator, Origin};
use crate::types::{
    Instruction, Nozzle, PendingInstruction, PerNozzle, PhotoDirection, PlacedPartRecord, Point,
};

/// Instruction execution state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Idle,
    Executing {
        instruction: Instruction,
        finish_time: f64,
    },
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// Quit was observed; the model has reset and will not tick again.
    Stopped,
}

pub struct Simulator {
    config: MachineConfig,
    port: SimulatorPort,
    rng: StdRng,
    ticks: u64,
    head: Point,
    nozzles: PerNozzle<NozzleState>,
    pcb_loaded: bool,
    phase: Phase,
    placed: Vec<PlacedPartRecord>,
    dropped: usize,
    /// Sequence number of the last rejected instruction, so each bad
    /// command is narrated once rather than every tick.
    last_rejected: Option<u64>,
    narrator: Narrator,
    stopped: bool,
}

impl Simulator {
    /// Create a simulator at home with all nozzles raised and empty.
    ///
    /// `seed` makes misalignment draws reproducible.
    pub fn new(config: MachineConfig, port: SimulatorPort, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let head = config.home();
        port.publish_time(0.0);
        let mut narrator = Narrator::new(Origin::Simulator);
        narrator.info(0.0, "Pick and place machine simulation started successfully!");
        Self {
            config,
            port,
            rng,
            ticks: 0,
            head,
            nozzles: PerNozzle::default(),
            pcb_loaded: false,
            phase: Phase::Idle,
            placed: Vec::new(),
            dropped: 0,
            last_rejected: None,
            narrator,
            stopped: false,
        }
    }

    /// Advance one poll interval.
    pub fn tick(&mut self) -> TickOutcome {
        if self.stopped {
            return TickOutcome::Stopped;
        }
        let now = self.sim_time();
        if self.port.quit_requested() {
            self.shut_down(now);
            return TickOutcome::Stopped;
        }

        match self.phase {
            Phase::Idle => {
                if let Some(pending) = self.port.pending() {
                    self.consider(pending, now);
                }
            }
            Phase::Executing {
                instruction,
                finish_time,
            } if now >= finish_time => {
                self.finish(instruction, now);
                self.phase = Phase::Idle;
                self.port.complete();
            }
            Phase::Executing { .. } => {}
        }

        self.ticks += 1;
        self.port.publish_time(self.sim_time());
        TickOutcome::Running
    }

    /// Shut down as if quit had been observed. No-op once stopped.
    pub fn terminate(&mut self) {
        if !self.stopped {
            self.port.request_quit();
            self.shut_down(self.sim_time());
        }
    }

    pub fn sim_time(&self) -> f64 {
        self.ticks as f64 * self.config.polling.simulator_interval_secs()
    }

    pub const fn head(&self) -> Point {
        self.head
    }

    pub fn nozzle(&self, nozzle: Nozzle) -> &NozzleState {
        &self.nozzles[nozzle]
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub fn placed_parts(&self) -> &[PlacedPartRecord] {
        &self.placed
    }

    pub const fn dropped_parts(&self) -> usize {
        self.dropped
    }

    pub const fn pcb_loaded(&self) -> bool {
        self.pcb_loaded
    }

    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn drain_narration(&mut self) -> Vec<Narration> {
        self.narrator.drain()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            sim_time: self.sim_time(),
            head: self.head,
            nozzles: self.nozzles,
            pcb_loaded: self.pcb_loaded,
            placed: self.placed.clone(),
            dropped: self.dropped,
        }
    }

    // ------------------------------------------------------------------------
    // Acceptance
    // ------------------------------------------------------------------------

    fn consider(&mut self, pending: PendingInstruction, now: f64) {
        let any_down = self.nozzles.values().any(|n| n.lowered);
        let checked = decode(&pending).and_then(|instruction| {
            check_preconditions(&instruction, &self.config, self.head, any_down).map(|()| instruction)
        });

        match checked {
            Ok(instruction) => {
                if !self.port.accept(pending.seq) {
                    return;
                }
                let finish_time = now + duration(&instruction, &self.config, self.head);
                self.announce(&instruction, now);
                self.phase = Phase::Executing {
                    instruction,
                    finish_time,
                };
            }
            Err(reason) => {
                self.port.decline(pending.seq);
                if self.last_rejected != Some(pending.seq) {
                    self.last_rejected = Some(pending.seq);
                    tracing::debug!(seq = pending.seq, code = %pending.code, "instruction rejected");
                    self.narrator
                        .warn(now, format!("Bad {} command: {reason}", pending.code));
                }
            }
        }
    }

    fn announce(&mut self, instruction: &Instruction, now: f64) {
        let message = match *instruction {
            Instruction::MoveHead { x, y } => {
                format!("Head moving from {} to {}", self.head, Point::new(x, y))
            }
            Instruction::AmendPosition { dx, dy } => {
                format!("Head moving from {} to {}", self.head, self.head.offset(dx, dy))
            }
            Instruction::RotateNozzle { nozzle, degrees } => {
                format!("{} nozzle being rotated by {degrees:.2} degrees", nozzle.name())
            }
            Instruction::LowerNozzle(n) => format!("{} nozzle being lowered", n.name()),
            Instruction::RaiseNozzle(n) => format!("{} nozzle being raised", n.name()),
            Instruction::ApplyVacuum(n) => format!("{} nozzle is about to apply vacuum", n.name()),
            Instruction::ReleaseVacuum(n) => {
                format!("{} nozzle is about to release vacuum", n.name())
            }
            Instruction::TakePhoto(direction) => {
                format!("Photo about to be taken by {direction} camera")
            }
            Instruction::LoadPcb => "PCB about to be loaded into pick and place machine".to_string(),
            Instruction::UnloadPcb => "PCB about to be unloaded".to_string(),
        };
        self.narrator.info(now, message);
    }

    // ------------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------------

    fn finish(&mut self, instruction: Instruction, now: f64) {
        match instruction {
            Instruction::MoveHead { x, y } => {
                self.head = Point::new(x, y);
                self.narrator
                    .info(now, format!("Head arrived at nominal location {}", self.head));
            }
            Instruction::AmendPosition { dx, dy } => {
                self.head = self.head.offset(dx, dy);
                self.narrator
                    .info(now, format!("Head position amended to {}", self.head));
            }
            Instruction::RotateNozzle { nozzle, degrees } => {
                let state = &mut self.nozzles[nozzle];
                state.accumulated_rotation += degrees;
                let message = format!(
                    "{} nozzle finished rotating by {degrees:.2} degrees, effective rotation including misalignment theta_error={:.2} degrees is {:.2} degrees",
                    nozzle.name(),
                    state.pick_error,
                    state.accumulated_rotation
                );
                self.narrator.info(now, message);
            }
            Instruction::LowerNozzle(nozzle) => {
                self.nozzles[nozzle].lowered = true;
                self.narrator.info(now, format!("{} nozzle lowered", nozzle.name()));
                self.try_pickup(nozzle, now);
            }
            Instruction::RaiseNozzle(nozzle) => {
                self.nozzles[nozzle].lowered = false;
                self.narrator.info(now, format!("{} nozzle raised", nozzle.name()));
            }
            Instruction::ApplyVacuum(nozzle) => {
                self.nozzles[nozzle].vacuum_on = true;
                self.narrator
                    .info(now, format!("{} nozzle now has vacuum applied", nozzle.name()));
                self.try_pickup(nozzle, now);
            }
            Instruction::ReleaseVacuum(nozzle) => {
                self.nozzles[nozzle].vacuum_on = false;
                self.narrator
                    .info(now, format!("{} nozzle now has vacuum released", nozzle.name()));
                self.release_part(nozzle, now);
            }
            Instruction::TakePhoto(PhotoDirection::Lookup) => self.lookup_photo(now),
            Instruction::TakePhoto(PhotoDirection::Lookdown) => self.lookdown_photo(now),
            Instruction::LoadPcb => {
                self.pcb_loaded = true;
                self.narrator.info(now, "PCB has been loaded");
            }
            Instruction::UnloadPcb => {
                self.pcb_loaded = false;
                self.narrator.info(now, "PCB has been unloaded");
            }
        }
    }

    /// Pick a part if this nozzle is now lowered with vacuum on over a
    /// feeder. Called after whichever of lower/vacuum completes.
    fn try_pickup(&mut self, nozzle: Nozzle, now: f64) {
        if !self.nozzles[nozzle].ready_to_pick() {
            return;
        }
        let at = self.config.nozzle_position(self.head, nozzle);
        match self.config.feeder_at(at) {
            Some(feeder) => {
                self.nozzles[nozzle].held_feeder = Some(feeder);
                self.narrator.info(
                    now,
                    format!("{} nozzle has picked up part from feeder {feeder}", nozzle.name()),
                );
            }
            None => self.narrator.warn(
                now,
                format!("No tape feeder underneath nozzle {nozzle} when vacuum applied so no part picked up"),
            ),
        }
    }

    fn release_part(&mut self, nozzle: Nozzle, now: f64) {
        let state = self.nozzles[nozzle];
        let Some(feeder) = state.held_feeder else {
            return;
        };
        self.nozzles[nozzle].held_feeder = None;

        if state.lowered && self.head.is_over_pcb() {
            let record = PlacedPartRecord {
                x: self.head.x,
                y: self.head.y,
                theta: state.accumulated_rotation,
                feeder,
            };
            self.placed.push(record);
            self.narrator.info(
                now,
                format!(
                    "{} nozzle has placed part from feeder {feeder} at {} with rotation {:.2} degrees",
                    nozzle.name(),
                    self.head,
                    record.theta
                ),
            );
            self.narrate_placed_summary(now);

            let state = &mut self.nozzles[nozzle];
            state.accumulated_rotation = 0.0;
            state.pick_error = 0.0;
            self.port.publish_pick_error(nozzle, 0.0);
            self.port.publish_preplace_error(0.0, 0.0);
        } else if state.lowered {
            self.dropped += 1;
            self.narrator.warn(
                now,
                format!(
                    "{} nozzle has DROPPED part from feeder {feeder} at {} outside the PCB",
                    nozzle.name(),
                    self.head
                ),
            );
        } else {
            self.dropped += 1;
            self.narrator.warn(
                now,
                format!(
                    "{} nozzle has DROPPED part from feeder {feeder} at {}",
                    nozzle.name(),
                    self.head
                ),
            );
        }
    }

    fn narrate_placed_summary(&mut self, now: f64) {
        self.narrator.info(now, "Summary of placed parts so far:");
        let lines: Vec<String> = self
            .placed
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "  Part {i} from feeder {} placed at ({:.2}, {:.2}) with rotation {:.2} degrees",
                    p.feeder, p.x, p.y, p.theta
                )
            })
            .collect();
        for line in lines {
            self.narrator.info(now, line);
        }
    }

    fn lookup_photo(&mut self, now: f64) {
        if !self.head.coincides_with(self.config.lookup_camera()) {
            self.narrator.info(
                now,
                format!("Lookup photo taken at {}, away from the lookup camera: nothing measured", self.head),
            );
            return;
        }
        self.narrator.info(now, "Photo taken by lookup camera");
        let width = self.config.misalignment.max_theta_pick;
        for nozzle in Nozzle::ALL {
            if !self.nozzles[nozzle].is_holding() {
                continue;
            }
            let error = draw(&mut self.rng, width);
            let state = &mut self.nozzles[nozzle];
            state.pick_error = error;
            state.accumulated_rotation = error;
            self.port.publish_pick_error(nozzle, error);
            self.narrator.info(
                now,
                format!(
                    "Picked part on {} nozzle has misalignment theta_error={error:.2} degrees",
                    nozzle.name()
                ),
            );
        }
    }

    fn lookdown_photo(&mut self, now: f64) {
        if !self.head.is_over_pcb() {
            self.narrator.info(
                now,
                format!("Lookdown photo taken at {}, away from the PCB: nothing measured", self.head),
            );
            return;
        }
        self.narrator.info(now, "Photo taken by lookdown camera");
        let ex = draw(&mut self.rng, self.config.misalignment.max_x_preplace);
        let ey = draw(&mut self.rng, self.config.misalignment.max_y_preplace);
        self.narrator.info(
            now,
            format!("Head has preplace misalignment x_error={ex:.2} y_error={ey:.2}"),
        );
        self.head = self.head.offset(ex, ey);
        self.port.publish_preplace_error(ex, ey);
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    fn shut_down(&mut self, now: f64) {
        self.narrator.info(now, "Terminating...");
        tracing::info!(
            placed = self.placed.len(),
            dropped = self.dropped,
            "[Simulator] quit observed, resetting machine"
        );
        self.phase = Phase::Idle;
        self.head = self.config.home();
        self.nozzles = PerNozzle::default();
        self.port.reset_after_quit(now);
        self.stopped = true;
    }
}

/// Uniform draw in `±width/2`.
fn draw(rng: &mut StdRng, width: f64) -> f64 {
    let half = width.abs() / 2.0;
    Uniform::new_inclusive(-half, half).sample(rng)
}
