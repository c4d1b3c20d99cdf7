//! Real-time tasks
//!
//! Each state machine runs in its own tokio task on a fixed-rate interval.
//! Tasks report their [`TaskName`] back through a `JoinSet` so the
//! supervisor can log completions and cancel everything on failure.

use anyhow::Result;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::channel::MachineChannel;
use crate::controller::Controller;
use crate::narration::Narration;
use crate::operator::{deliver, KeyEvent, KeyRegister, KeySource};
use crate::simulator::{Simulator, TickOutcome};

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    Simulator,
    Controller,
    Keyboard,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulator => write!(f, "Simulator"),
            Self::Controller => write!(f, "Controller"),
            Self::Keyboard => write!(f, "Keyboard"),
        }
    }
}

/// Options shared by the real-time tasks.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Time compression: 2.0 runs the machine twice as fast as real time.
    pub speed: f64,
    /// Raise quit once every part is placed and the gantry is home.
    pub exit_when_done: bool,
    /// Raise quit when simulated time reaches this many seconds.
    pub max_sim_seconds: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            exit_when_done: false,
            max_sim_seconds: None,
        }
    }
}

impl RunOptions {
    /// Wall-clock period for a loop polling at `hz`.
    pub fn period(&self, hz: u32) -> Duration {
        let speed = if self.speed.is_finite() && self.speed > 0.0 {
            self.speed
        } else {
            1.0
        };
        Duration::from_secs_f64(1.0 / (f64::from(hz.max(1)) * speed))
    }
}

fn emit_all(lines: Vec<Narration>) {
    for line in &lines {
        line.emit();
    }
}

// ============================================================================
// Task Spawners
// ============================================================================

/// Spawn the process model loop.
///
/// The task ends when the simulator observes quit, and then cancels the
/// other tasks. On external cancellation it shuts the simulator down first
/// so the final report is still logged.
pub fn spawn_simulator(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut simulator: Simulator,
    channel: MachineChannel,
    hz: u32,
    options: RunOptions,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let period = options.period(hz);
        info!("[Simulator] Task starting, polling every {:?}", period);
        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("[Simulator] Received shutdown signal");
                    simulator.terminate();
                    emit_all(simulator.drain_narration());
                    break;
                }
                _ = interval.tick() => {
                    let outcome = simulator.tick();
                    emit_all(simulator.drain_narration());
                    if outcome == TickOutcome::Stopped {
                        cancel_token.cancel();
                        break;
                    }
                    if let Some(limit) = options.max_sim_seconds {
                        if simulator.sim_time() >= limit {
                            warn!("[Simulator] Simulated time limit of {limit:.1}s reached, requesting quit");
                            channel.simulator_port().request_quit();
                        }
                    }
                }
            }
        }

        let report = simulator.report();
        info!(
            placed = report.placed.len(),
            dropped = report.dropped,
            sim_time = report.sim_time,
            "[Simulator] Final report:\n{report}"
        );
        Ok(TaskName::Simulator)
    });
}

/// Spawn the placement controller loop.
pub fn spawn_controller(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut controller: Controller,
    hz: u32,
    options: RunOptions,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let period = options.period(hz);
        info!(
            "[Controller] Task starting in {} mode, polling every {:?}",
            controller.mode(),
            period
        );
        let mut interval = tokio::time::interval(period);
        let mut quit_raised = false;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("[Controller] Received shutdown signal in state {}", controller.state_name());
                    break;
                }
                _ = interval.tick() => {
                    let outcome = controller.tick();
                    emit_all(controller.drain_narration());
                    if outcome == TickOutcome::Stopped {
                        info!("[Controller] Quit observed in state {}", controller.state_name());
                        break;
                    }
                    if options.exit_when_done && !quit_raised && controller.is_done() {
                        info!("[Controller] All parts placed, requesting quit");
                        controller.port().request_quit();
                        quit_raised = true;
                    }
                }
            }
        }
        Ok(TaskName::Controller)
    });
}

/// Spawn the operator input reader.
///
/// End of input only ends this task; the machine keeps running until quit.
pub fn spawn_keyboard<S: KeySource>(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut source: S,
    keys: KeyRegister,
    channel: MachineChannel,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[Keyboard] Reading operator keys from {}", source.source_name());
        let port = channel.controller_port();
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("[Keyboard] Received shutdown signal");
                    break;
                }
                event = source.next_key() => {
                    match event? {
                        KeyEvent::Key(key) => {
                            if deliver(key, &keys, &port) {
                                info!("[Keyboard] Quit requested by operator");
                                break;
                            }
                        }
                        KeyEvent::Eof => {
                            info!("[Keyboard] End of input");
                            break;
                        }
                    }
                }
            }
        }
        Ok(TaskName::Keyboard)
    });
}

// ============================================================================
// Supervisor
// ============================================================================

/// Monitor tasks until all complete; cancel everything if one fails.
pub async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: All tasks spawned, monitoring...");

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => {
                info!("Supervisor: Task {} completed normally", task_name);
            }
            Ok(Err(e)) => {
                error!("Supervisor: Task failed with error: {}", e);
                cancel_token.cancel();
                return Err(e);
            }
            Err(e) => {
                error!("Supervisor: Task panicked: {}", e);
                cancel_token.cancel();
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }

    info!("Supervisor: All tasks completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::operator::ScriptedKeys;
    use crate::worklist::parse_work_order;

    #[test]
    fn test_period_scales_with_speed() {
        let options = RunOptions {
            speed: 10.0,
            ..RunOptions::default()
        };
        assert_eq!(options.period(100), Duration::from_millis(1));
        assert_eq!(RunOptions::default().period(50), Duration::from_millis(20));
    }

    #[test]
    fn test_bad_speed_falls_back_to_real_time() {
        let options = RunOptions {
            speed: 0.0,
            ..RunOptions::default()
        };
        assert_eq!(options.period(100), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_autonomous_run_completes_and_quits() {
        let config = MachineConfig::default();
        let order = parse_work_order("a 2 R1 0603 1 100 100 0 0 R2 0603 1 200 200 90 1").unwrap();
        let channel = MachineChannel::new();
        let keys = KeyRegister::new();
        let controller = Controller::new(order, config.clone(), channel.controller_port(), keys);
        let simulator = Simulator::new(config.clone(), channel.simulator_port(), Some(3));
        let options = RunOptions {
            speed: 50.0,
            exit_when_done: true,
            max_sim_seconds: Some(120.0),
        };

        let cancel_token = CancellationToken::new();
        let mut task_set = JoinSet::new();
        spawn_simulator(
            &mut task_set,
            simulator,
            channel.clone(),
            config.polling.simulator_hz,
            options,
            cancel_token.clone(),
        );
        spawn_controller(
            &mut task_set,
            controller,
            config.polling.controller_hz,
            options,
            cancel_token.clone(),
        );

        let run = run_supervisor(&mut task_set, cancel_token);
        tokio::time::timeout(Duration::from_secs(30), run)
            .await
            .expect("run timed out")
            .unwrap();
        assert!(channel.snapshot().quit);
    }

    #[tokio::test]
    async fn test_keyboard_quit_key_raises_flag() {
        let channel = MachineChannel::new();
        let keys = KeyRegister::new();
        let cancel_token = CancellationToken::new();
        let mut task_set = JoinSet::new();
        spawn_keyboard(
            &mut task_set,
            ScriptedKeys::new("3q", Duration::ZERO),
            keys.clone(),
            channel.clone(),
            cancel_token.clone(),
        );
        run_supervisor(&mut task_set, cancel_token).await.unwrap();
        assert!(channel.snapshot().quit);
        assert_eq!(keys.take(), Some('3'));
    }
}
