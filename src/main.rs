//! PnP Machine - pick-and-place controller with simulated gantry
//!
//! Loads a centroid file (work order), then runs the placement controller
//! against the process model until the operator quits.
//!
//! # Usage
//!
//! ```bash
//! # Manual mode: type keys (0-9, p, c, r, a, h, q) followed by Enter
//! cargo run --release -- --centroid centroid.txt
//!
//! # Autonomous work order at 10x speed, quit when placement is complete
//! cargo run --release -- --centroid demos/centroid_auto.txt --speed 10 --exit-when-done
//!
//! # Deterministic single-threaded run with a scripted operator
//! cargo run --release -- --centroid demos/centroid_manual.txt --lockstep --keys 0pcrap3pcrap
//! ```
//!
//! # Environment Variables
//!
//! - `PNP_CONFIG`: Path to a machine config TOML (see `MachineConfig`)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pnp_machine::channel::MachineChannel;
use pnp_machine::config::{defaults, MachineConfig};
use pnp_machine::controller::Controller;
use pnp_machine::operator::{KeyRegister, ScriptedKeys, StdinKeys};
use pnp_machine::runtime::{self, Bench, RunOptions, TaskName};
use pnp_machine::simulator::Simulator;
use pnp_machine::types::{OperationMode, WorkOrder};
use pnp_machine::worklist;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pnp-machine")]
#[command(about = "Pick-and-place machine controller with simulated gantry")]
#[command(version)]
struct CliArgs {
    /// Centroid file listing the parts to place
    #[arg(long, default_value = defaults::DEFAULT_CENTROID_FILE)]
    centroid: PathBuf,

    /// Machine config TOML (overrides PNP_CONFIG and ./machine_config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for misalignment injection
    #[arg(long)]
    seed: Option<u64>,

    /// Time compression factor (1 = real time)
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Scripted operator keys instead of stdin, e.g. "0pcp"
    #[arg(long)]
    keys: Option<String>,

    /// Quit once every part is placed and the gantry is home
    #[arg(long)]
    exit_when_done: bool,

    /// Run both state machines in one thread against simulated time only
    #[arg(long)]
    lockstep: bool,

    /// Quit when simulated time reaches this many seconds
    #[arg(long)]
    max_sim_seconds: Option<f64>,

    /// Emit logs and the final report as JSON
    #[arg(long)]
    log_json: bool,
}

/// Simulated seconds a lockstep run may take when no limit is given.
const LOCKSTEP_DEFAULT_SIM_SECONDS: f64 = 3600.0;

/// Delay between scripted keys in real-time mode, before speed scaling.
const SCRIPTED_KEY_DELAY_SECS: f64 = 1.0;

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<MachineConfig> {
    match path {
        Some(path) => {
            let config = MachineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load machine config {}", path.display()))?;
            info!(path = %path.display(), "Loaded machine config from --config");
            Ok(config)
        }
        None => Ok(MachineConfig::load()),
    }
}

fn load_order(path: &Path, config: &MachineConfig) -> Result<WorkOrder> {
    let order = worklist::load_work_order(path)
        .with_context(|| format!("Problem with centroid file {}", path.display()))?;
    worklist::check_feeders(&order, config).context("Work order does not fit this machine")?;
    Ok(order)
}

// ============================================================================
// Lockstep Mode
// ============================================================================

fn run_lockstep(args: &CliArgs, config: MachineConfig, order: WorkOrder) -> Result<()> {
    let limit = args.max_sim_seconds.unwrap_or(LOCKSTEP_DEFAULT_SIM_SECONDS);
    let max_steps = (limit * f64::from(config.polling.controller_hz)).ceil().max(1.0) as u64;
    let mode = order.mode;

    let mut bench = Bench::new(config, order, args.seed).exit_when_done(true);

    if mode == OperationMode::Manual {
        match &args.keys {
            Some(keys) => {
                let delivered = bench.feed_keys(keys, max_steps);
                info!("Delivered {delivered} scripted keys");
            }
            None => warn!("Manual work order in lockstep mode without --keys: nothing will be placed"),
        }
    }

    if !bench.run_until(Bench::is_done, max_steps) {
        warn!(
            "Stopped after {:.2}s of simulated time in state {}",
            bench.sim_time(),
            bench.controller().state_name()
        );
    }
    bench.quit();

    for line in bench.take_transcript() {
        line.emit();
    }

    let report = bench.report();
    if args.log_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

// ============================================================================
// Real-Time Mode
// ============================================================================

async fn run_realtime(args: &CliArgs, config: MachineConfig, order: WorkOrder) -> Result<()> {
    let channel = MachineChannel::new();
    let keys = KeyRegister::new();
    let options = RunOptions {
        speed: args.speed,
        exit_when_done: args.exit_when_done,
        max_sim_seconds: args.max_sim_seconds,
    };

    let simulator = Simulator::new(config.clone(), channel.simulator_port(), args.seed);
    let controller = Controller::new(order, config.clone(), channel.controller_port(), keys.clone());

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    info!("Supervisor: Initializing task monitoring");
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    runtime::spawn_simulator(
        &mut task_set,
        simulator,
        channel.clone(),
        config.polling.simulator_hz,
        options,
        cancel_token.clone(),
    );
    runtime::spawn_controller(
        &mut task_set,
        controller,
        config.polling.controller_hz,
        options,
        cancel_token.clone(),
    );

    let reading_stdin = args.keys.is_none();
    match &args.keys {
        Some(script) => {
            let delay = options.period(1).mul_f64(SCRIPTED_KEY_DELAY_SECS);
            let source = ScriptedKeys::new(script, delay);
            runtime::spawn_keyboard(&mut task_set, source, keys, channel, cancel_token.clone());
        }
        None => {
            runtime::spawn_keyboard(&mut task_set, StdinKeys::new(), keys, channel, cancel_token.clone());
        }
    }

    runtime::run_supervisor(&mut task_set, cancel_token).await?;

    if reading_stdin {
        // The stdin reader thread blocks until the next line; do not wait for it.
        info!("✓ PnP Machine shutdown complete");
        std::process::exit(0);
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(args.config.as_deref())?;
    let order = load_order(&args.centroid, &config)?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  PnP Machine - Pick and Place Controller");
    info!("  Started {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");
    info!("Work order: {} ({} mode, {} parts)", args.centroid.display(), order.mode, order.parts.len());
    info!(
        "Machine: {} feeders, simulator {} Hz, controller {} Hz",
        config.feeders.positions.len(),
        config.polling.simulator_hz,
        config.polling.controller_hz
    );
    if let Some(seed) = args.seed {
        info!("Misalignment seed: {seed}");
    }
    info!("");

    if args.lockstep {
        info!("Mode: lockstep (simulated time only)");
        run_lockstep(&args, config, order)?;
    } else {
        info!("Mode: real time at {}x", args.speed);
        if order.mode == OperationMode::Manual && args.keys.is_none() {
            info!("Keys: 0-9 feeder, p pick/place, c camera, r rotate, a amend, h home, q quit (then Enter)");
        }
        run_realtime(&args, config, order).await?;
    }

    info!("");
    info!("✓ PnP Machine shutdown complete");
    Ok(())
}
