//! Deterministic lockstep bench
//!
//! Runs the controller and the process model in one thread against
//! simulated time only. Per step the controller acts once, then the
//! simulator ticks `simulator_hz / controller_hz` times, which keeps the
//! controller exactly as slow relative to the machine as it is in real time.

use crate::channel::MachineChannel;
use crate::config::MachineConfig;
use crate::controller::{Controller, ManualState};
use crate::narration::{interleave, Narration};
use crate::operator::{deliver, KeyRegister};
use crate::simulator::{SimulationReport, Simulator, TickOutcome};
use crate::types::WorkOrder;

pub struct Bench {
    channel: MachineChannel,
    simulator: Simulator,
    controller: Controller,
    keys: KeyRegister,
    ticks_per_step: u32,
    steps: u64,
    exit_when_done: bool,
    transcript: Vec<Narration>,
}

impl Bench {
    pub fn new(config: MachineConfig, order: WorkOrder, seed: Option<u64>) -> Self {
        let channel = MachineChannel::new();
        let keys = KeyRegister::new();
        let ticks_per_step = config.polling.simulator_ticks_per_controller_tick();
        let simulator = Simulator::new(config.clone(), channel.simulator_port(), seed);
        let controller = Controller::new(order, config, channel.controller_port(), keys.clone());
        let mut bench = Self {
            channel,
            simulator,
            controller,
            keys,
            ticks_per_step,
            steps: 0,
            exit_when_done: false,
            transcript: Vec::new(),
        };
        bench.collect();
        bench
    }

    /// Raise quit once the controller is finished and home.
    #[must_use]
    pub fn exit_when_done(mut self, enabled: bool) -> Self {
        self.exit_when_done = enabled;
        self
    }

    /// Deliver an operator key. Returns `true` if it requested quit.
    pub fn press(&self, key: char) -> bool {
        deliver(key, &self.keys, &self.channel.controller_port())
    }

    /// Advance one controller tick.
    pub fn step(&mut self) -> TickOutcome {
        self.controller.tick();
        if self.exit_when_done && self.controller.is_done() {
            self.channel.controller_port().request_quit();
        }
        let mut outcome = TickOutcome::Running;
        for _ in 0..self.ticks_per_step {
            outcome = self.simulator.tick();
            if outcome == TickOutcome::Stopped {
                break;
            }
        }
        self.steps += 1;
        self.collect();
        outcome
    }

    /// Step until `done` holds or `max_steps` have run. Returns whether
    /// `done` was reached.
    pub fn run_until(&mut self, mut done: impl FnMut(&Self) -> bool, max_steps: u64) -> bool {
        for _ in 0..max_steps {
            if done(self) {
                return true;
            }
            if self.step() == TickOutcome::Stopped {
                return done(self);
            }
        }
        done(self)
    }

    /// Manual controller idle in `HOME` or `WAIT` with no key queued.
    pub fn awaiting_key(&self) -> bool {
        let port = self.channel.controller_port();
        match &self.controller {
            Controller::Manual(c) => {
                matches!(c.state(), ManualState::Home | ManualState::Wait)
                    && !self.keys.is_pending()
                    && (port.is_ready() || port.instruction_refused())
            }
            Controller::Autonomous(_) => false,
        }
    }

    /// Feed operator keys one at a time, each once the controller is
    /// waiting for input. Returns how many keys were delivered.
    pub fn feed_keys(&mut self, script: &str, max_steps_per_key: u64) -> usize {
        let mut delivered = 0;
        for key in script.chars().filter(|c| !c.is_whitespace()) {
            if !self.run_until(Self::awaiting_key, max_steps_per_key) {
                break;
            }
            let quit = self.press(key);
            delivered += 1;
            self.step();
            if quit {
                break;
            }
        }
        delivered
    }

    /// Request quit and let both sides observe it.
    pub fn quit(&mut self) {
        self.channel.controller_port().request_quit();
        self.run_until(|b| b.simulator.is_stopped(), 4);
    }

    pub const fn controller(&self) -> &Controller {
        &self.controller
    }

    pub const fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    pub const fn keys(&self) -> &KeyRegister {
        &self.keys
    }

    pub const fn channel(&self) -> &MachineChannel {
        &self.channel
    }

    pub const fn steps(&self) -> u64 {
        self.steps
    }

    pub fn sim_time(&self) -> f64 {
        self.simulator.sim_time()
    }

    pub fn is_done(&self) -> bool {
        self.controller.is_done()
    }

    /// All narration so far, in simulated-time order.
    pub fn transcript(&self) -> &[Narration] {
        &self.transcript
    }

    pub fn take_transcript(&mut self) -> Vec<Narration> {
        std::mem::take(&mut self.transcript)
    }

    pub fn report(&self) -> SimulationReport {
        self.simulator.report()
    }

    fn collect(&mut self) {
        let merged = interleave(self.controller.drain_narration(), self.simulator.drain_narration());
        self.transcript.extend(merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worklist::parse_work_order;

    fn bench(centroid: &str) -> Bench {
        Bench::new(MachineConfig::default(), parse_work_order(centroid).unwrap(), Some(11))
    }

    #[test]
    fn test_step_advances_two_simulator_ticks() {
        let mut bench = bench("a 1 R1 0603 1 100 100 0 0");
        bench.step();
        bench.step();
        assert!((bench.sim_time() - 0.04).abs() < 1e-12);
        assert_eq!(bench.steps(), 2);
    }

    #[test]
    fn test_transcript_is_time_ordered() {
        let mut bench = bench("a 1 R1 0603 1 100 100 0 0");
        bench.run_until(Bench::is_done, 5_000);
        assert!(bench.is_done());
        let times: Vec<f64> = bench.transcript().iter().map(|n| n.sim_time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_exit_when_done_stops_simulator() {
        let mut bench = bench("a 1 R1 0603 1 100 100 0 0").exit_when_done(true);
        bench.run_until(|b| b.simulator().is_stopped(), 5_000);
        assert!(bench.simulator().is_stopped());
        assert!(bench.channel().snapshot().quit);
        // Placement history survives the reset.
        assert_eq!(bench.report().placed.len(), 1);
    }

    #[test]
    fn test_feed_keys_waits_for_input_states() {
        let mut bench = bench("m 1 R1 0603 1 100 100 0 2");
        assert_eq!(bench.feed_keys("2p", 1_000), 2);
        assert!(bench.run_until(Bench::awaiting_key, 1_000));
        match bench.controller() {
            Controller::Manual(c) => {
                assert_eq!(c.state(), ManualState::Wait);
                assert!(c.is_holding());
            }
            Controller::Autonomous(_) => panic!("expected manual controller"),
        }
    }
}
