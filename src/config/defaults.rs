//! Machine default constants.
//!
//! Built-in values used when no `machine_config.toml` is present.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Workspace
// ============================================================================

/// Gantry travel limits (machine units).
pub const MIN_X: f64 = -200.0;
pub const MAX_X: f64 = 1000.0;
pub const MIN_Y: f64 = -200.0;
pub const MAX_Y: f64 = 1000.0;

/// Home position of the gantry.
pub const HOME_X: f64 = 0.0;
pub const HOME_Y: f64 = 0.0;

// ============================================================================
// Stations
// ============================================================================

/// Number of tape feeders fitted by default. Operator keys `0`-`9` select
/// them, so this is also the hard upper bound.
pub const FEEDER_COUNT: usize = 10;

/// Hard upper bound on configured feeders.
pub const MAX_FEEDERS: usize = 10;

/// x of feeder 0; subsequent feeders step by [`FEEDER_PITCH`].
pub const FEEDER_FIRST_X: f64 = 50.0;
pub const FEEDER_PITCH: f64 = 100.0;

/// All feeders sit on one rail below the PCB.
pub const FEEDER_Y: f64 = -100.0;

/// Fixed look-up camera position.
pub const LOOKUP_CAMERA_X: f64 = -100.0;
pub const LOOKUP_CAMERA_Y: f64 = 100.0;

// ============================================================================
// Head
// ============================================================================

/// Distance along x between adjacent nozzles.
pub const NOZZLE_SEPARATION: f64 = 20.0;

/// Gantry travel speed (units/s).
pub const HEAD_FULL_SPEED: f64 = 1000.0;

/// Nozzle rotation speed (degrees/s).
pub const NOZZLE_ROTATE_SPEED: f64 = 360.0;

// ============================================================================
// Actuation Timing (seconds)
// ============================================================================

pub const NOZZLE_LOWER_TIME: f64 = 0.1;
pub const NOZZLE_RAISE_TIME: f64 = 0.1;
pub const VACUUM_APPLY_TIME: f64 = 0.05;
pub const VACUUM_RELEASE_TIME: f64 = 0.05;
pub const PHOTO_TAKE_TIME: f64 = 0.05;
pub const PCB_LOAD_UNLOAD_TIME: f64 = 1.0;

// ============================================================================
// Misalignment Injection
// ============================================================================

/// Full width of the pick rotation error; draws are uniform in ±width/2.
pub const MAX_THETA_PICK_MISALIGNMENT: f64 = 10.0;

/// Full width of the pre-place position errors.
pub const MAX_X_PREPLACE_MISALIGNMENT: f64 = 20.0;
pub const MAX_Y_PREPLACE_MISALIGNMENT: f64 = 20.0;

// ============================================================================
// Polling
// ============================================================================

/// Process model tick rate (Hz).
pub const SIMULATOR_POLL_RATE_HZ: u32 = 100;

/// Controller tick rate (Hz). Must not exceed the simulator rate.
pub const CONTROLLER_POLL_RATE_HZ: u32 = 50;

// ============================================================================
// Work Order
// ============================================================================

/// Largest work order the loader accepts.
pub const MAX_COMPONENTS_TO_PLACE: usize = 100;

/// Default work order path.
pub const DEFAULT_CENTROID_FILE: &str = "centroid.txt";
