//! Centroid File Generator
//!
//! Writes a random but valid work order for the PnP machine to stdout.
//! Parts land well inside the PCB so every nozzle can reach them, and
//! only feeders the default machine has fitted are used.
//!
//! # Usage
//! ```bash
//! ./centroid-gen --count 12 --mode autonomous --seed 7 > centroid.txt
//! ./pnp-machine --centroid centroid.txt --lockstep
//! ```

use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Uniform};

use pnp_machine::config::defaults;
use pnp_machine::types::{OperationMode, PlacementOrder, WorkOrder};
use pnp_machine::worklist::format_work_order;

// ============================================================================
// Board Constants
// ============================================================================

/// Keep parts this far from the PCB edges (mm)
const EDGE_MARGIN: f64 = 20.0;
/// Largest usable PCB coordinate (mm)
const BOARD_EXTENT: f64 = 960.0;

/// Footprints with a designator prefix and a plausible value range
const FOOTPRINTS: &[(&str, &str, f64, f64)] = &[
    ("R", "0603", 10.0, 100_000.0),
    ("R", "0805", 1.0, 10_000.0),
    ("C", "0603", 0.000_01, 0.1),
    ("C", "1206", 0.1, 100.0),
    ("L", "0805", 1.0, 470.0),
    ("D", "SOD123", 0.0, 0.0),
    ("U", "SOIC8", 0.0, 0.0),
];

/// Rotations a pick-and-place job usually asks for (degrees)
const ROTATIONS: &[f64] = &[0.0, 90.0, 180.0, -90.0, 45.0];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Manual,
    Autonomous,
}

impl From<Mode> for OperationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Manual => Self::Manual,
            Mode::Autonomous => Self::Autonomous,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "centroid-gen")]
#[command(about = "Random centroid file generator for the PnP machine")]
#[command(version = "1.0")]
struct Args {
    /// Number of components to place
    #[arg(short, long, default_value = "10",
          value_parser = clap::value_parser!(u32).range(1..=defaults::MAX_COMPONENTS_TO_PLACE as i64))]
    count: u32,

    /// Operating mode written into the file
    #[arg(short, long, value_enum, default_value = "autonomous")]
    mode: Mode,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Number of feeders to draw from
    #[arg(short, long, default_value = "10",
          value_parser = clap::value_parser!(u32).range(1..=defaults::MAX_FEEDERS as i64))]
    feeders: u32,
}

// ============================================================================
// Generation
// ============================================================================

fn generate(args: &Args) -> WorkOrder {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let coordinate = Uniform::new(EDGE_MARGIN, BOARD_EXTENT);

    // Each feeder carries one footprint for the whole job.
    let stock: Vec<usize> = (0..args.feeders)
        .map(|_| rng.gen_range(0..FOOTPRINTS.len()))
        .collect();
    let mut counters = [0usize; 26];

    let parts = (0..args.count)
        .map(|_| {
            let feeder = rng.gen_range(0..stock.len());
            let (prefix, footprint, low, high) = FOOTPRINTS[stock[feeder]];
            let slot = usize::from(prefix.as_bytes()[0] - b'A');
            counters[slot] += 1;
            let value = if high > low { rng.gen_range(low..high) } else { 0.0 };
            PlacementOrder {
                designation: format!("{prefix}{}", counters[slot]),
                footprint: footprint.to_string(),
                value,
                x: round2(coordinate.sample(&mut rng)),
                y: round2(coordinate.sample(&mut rng)),
                theta: ROTATIONS.choose(&mut rng).copied().unwrap_or(0.0),
                feeder,
            }
        })
        .collect();

    WorkOrder {
        mode: args.mode.into(),
        parts,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn main() {
    let args = Args::parse();
    let order = generate(&args);
    print!("{}", format_work_order(&order));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnp_machine::config::MachineConfig;
    use pnp_machine::worklist::{check_feeders, parse_work_order};

    fn args(count: u32, feeders: u32, seed: u64) -> Args {
        Args {
            count,
            mode: Mode::Autonomous,
            seed: Some(seed),
            feeders,
        }
    }

    #[test]
    fn test_generated_order_loads_back() {
        let order = generate(&args(25, 4, 99));
        let text = format_work_order(&order);
        let parsed = parse_work_order(&text).unwrap();
        assert_eq!(parsed.parts.len(), 25);
        assert_eq!(parsed.mode, OperationMode::Autonomous);
        check_feeders(&parsed, &MachineConfig::default()).unwrap();
        assert!(parsed.parts.iter().all(|p| p.feeder < 4));
    }

    #[test]
    fn test_parts_stay_inside_board() {
        let order = generate(&args(100, 10, 5));
        for p in &order.parts {
            assert!((EDGE_MARGIN..=BOARD_EXTENT).contains(&p.x), "x = {}", p.x);
            assert!((EDGE_MARGIN..=BOARD_EXTENT).contains(&p.y), "y = {}", p.y);
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        assert_eq!(generate(&args(8, 3, 42)), generate(&args(8, 3, 42)));
    }
}
