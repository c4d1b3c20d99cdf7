//! Machine configuration structures and loading logic.
//!
//! All structs derive `Serialize` + `Deserialize` for TOML round-tripping.
//! Every field has a default matching the stock machine, so a partial TOML
//! file only needs to specify the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::{Nozzle, Point};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "PNP_CONFIG";

/// Config file looked for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "machine_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Physical description of the machine: geometry, speeds, actuation
/// timing, misalignment injection, and poll rates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MachineConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub feeders: FeederConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub head: HeadConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub misalignment: MisalignmentConfig,

    #[serde(default)]
    pub polling: PollingConfig,
}

impl MachineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PNP_CONFIG` environment variable
    /// 2. `./machine_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded machine config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded machine config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are logged as warnings; out-of-range values fail.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check that the configuration describes a machine that can run.
    ///
    /// Suspicious-but-legal values are logged, not returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_physical_ranges(self);
        for w in &warnings {
            warn!(field = %w.field, "{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    // ------------------------------------------------------------------------
    // Derived geometry
    // ------------------------------------------------------------------------

    pub const fn home(&self) -> Point {
        Point::new(self.workspace.home_x, self.workspace.home_y)
    }

    pub const fn lookup_camera(&self) -> Point {
        Point::new(self.camera.lookup_x, self.camera.lookup_y)
    }

    /// Position of feeder `index`, if fitted.
    pub fn feeder(&self, index: usize) -> Option<Point> {
        self.feeders.positions.get(index).copied()
    }

    /// Index of the feeder directly under `position`, if any.
    pub fn feeder_at(&self, position: Point) -> Option<usize> {
        self.feeders
            .positions
            .iter()
            .position(|f| f.coincides_with(position))
    }

    /// Effective position of `nozzle` when the gantry is at `head`.
    pub fn nozzle_position(&self, head: Point, nozzle: Nozzle) -> Point {
        head.offset(nozzle.offset_steps() * self.head.nozzle_separation, 0.0)
    }

    /// Gantry position that puts `nozzle` directly over `target`.
    pub fn head_position_for(&self, nozzle: Nozzle, target: Point) -> Point {
        target.offset(-nozzle.offset_steps() * self.head.nozzle_separation, 0.0)
    }

    pub fn in_workspace(&self, p: Point) -> bool {
        let w = &self.workspace;
        p.x >= w.min_x && p.x <= w.max_x && p.y >= w.min_y && p.y <= w.max_y
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n{}", format_errors(.0))]
    Validation(Vec<String>),
}

fn format_errors(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Workspace
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    #[serde(default = "default_min_x")]
    pub min_x: f64,
    #[serde(default = "default_max_x")]
    pub max_x: f64,
    #[serde(default = "default_min_y")]
    pub min_y: f64,
    #[serde(default = "default_max_y")]
    pub max_y: f64,
    #[serde(default = "default_home_x")]
    pub home_x: f64,
    #[serde(default = "default_home_y")]
    pub home_y: f64,
}

fn default_min_x() -> f64 {
    defaults::MIN_X
}
fn default_max_x() -> f64 {
    defaults::MAX_X
}
fn default_min_y() -> f64 {
    defaults::MIN_Y
}
fn default_max_y() -> f64 {
    defaults::MAX_Y
}
fn default_home_x() -> f64 {
    defaults::HOME_X
}
fn default_home_y() -> f64 {
    defaults::HOME_Y
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            min_x: default_min_x(),
            max_x: default_max_x(),
            min_y: default_min_y(),
            max_y: default_max_y(),
            home_x: default_home_x(),
            home_y: default_home_y(),
        }
    }
}

// ============================================================================
// Feeders
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeederConfig {
    /// Feeder positions, indexed by feeder number.
    #[serde(default = "default_feeder_positions")]
    pub positions: Vec<Point>,
}

fn default_feeder_positions() -> Vec<Point> {
    (0..defaults::FEEDER_COUNT)
        .map(|i| {
            Point::new(
                defaults::FEEDER_FIRST_X + defaults::FEEDER_PITCH * i as f64,
                defaults::FEEDER_Y,
            )
        })
        .collect()
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            positions: default_feeder_positions(),
        }
    }
}

// ============================================================================
// Camera
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default = "default_lookup_x")]
    pub lookup_x: f64,
    #[serde(default = "default_lookup_y")]
    pub lookup_y: f64,
}

fn default_lookup_x() -> f64 {
    defaults::LOOKUP_CAMERA_X
}
fn default_lookup_y() -> f64 {
    defaults::LOOKUP_CAMERA_Y
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            lookup_x: default_lookup_x(),
            lookup_y: default_lookup_y(),
        }
    }
}

// ============================================================================
// Head
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadConfig {
    #[serde(default = "default_nozzle_separation")]
    pub nozzle_separation: f64,
    /// Units per second.
    #[serde(default = "default_full_speed")]
    pub full_speed: f64,
    /// Degrees per second.
    #[serde(default = "default_rotate_speed")]
    pub rotate_speed: f64,
}

fn default_nozzle_separation() -> f64 {
    defaults::NOZZLE_SEPARATION
}
fn default_full_speed() -> f64 {
    defaults::HEAD_FULL_SPEED
}
fn default_rotate_speed() -> f64 {
    defaults::NOZZLE_ROTATE_SPEED
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            nozzle_separation: default_nozzle_separation(),
            full_speed: default_full_speed(),
            rotate_speed: default_rotate_speed(),
        }
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Fixed actuation durations in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    #[serde(default = "default_lower_secs")]
    pub nozzle_lower_secs: f64,
    #[serde(default = "default_raise_secs")]
    pub nozzle_raise_secs: f64,
    #[serde(default = "default_vacuum_apply_secs")]
    pub vacuum_apply_secs: f64,
    #[serde(default = "default_vacuum_release_secs")]
    pub vacuum_release_secs: f64,
    #[serde(default = "default_photo_secs")]
    pub photo_secs: f64,
    #[serde(default = "default_pcb_load_unload_secs")]
    pub pcb_load_unload_secs: f64,
}

fn default_lower_secs() -> f64 {
    defaults::NOZZLE_LOWER_TIME
}
fn default_raise_secs() -> f64 {
    defaults::NOZZLE_RAISE_TIME
}
fn default_vacuum_apply_secs() -> f64 {
    defaults::VACUUM_APPLY_TIME
}
fn default_vacuum_release_secs() -> f64 {
    defaults::VACUUM_RELEASE_TIME
}
fn default_photo_secs() -> f64 {
    defaults::PHOTO_TAKE_TIME
}
fn default_pcb_load_unload_secs() -> f64 {
    defaults::PCB_LOAD_UNLOAD_TIME
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            nozzle_lower_secs: default_lower_secs(),
            nozzle_raise_secs: default_raise_secs(),
            vacuum_apply_secs: default_vacuum_apply_secs(),
            vacuum_release_secs: default_vacuum_release_secs(),
            photo_secs: default_photo_secs(),
            pcb_load_unload_secs: default_pcb_load_unload_secs(),
        }
    }
}

// ============================================================================
// Misalignment Injection
// ============================================================================

/// Full widths of the uniform error draws; each draw lies in ±width/2.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MisalignmentConfig {
    #[serde(default = "default_max_theta_pick")]
    pub max_theta_pick: f64,
    #[serde(default = "default_max_x_preplace")]
    pub max_x_preplace: f64,
    #[serde(default = "default_max_y_preplace")]
    pub max_y_preplace: f64,
}

fn default_max_theta_pick() -> f64 {
    defaults::MAX_THETA_PICK_MISALIGNMENT
}
fn default_max_x_preplace() -> f64 {
    defaults::MAX_X_PREPLACE_MISALIGNMENT
}
fn default_max_y_preplace() -> f64 {
    defaults::MAX_Y_PREPLACE_MISALIGNMENT
}

impl Default for MisalignmentConfig {
    fn default() -> Self {
        Self {
            max_theta_pick: default_max_theta_pick(),
            max_x_preplace: default_max_x_preplace(),
            max_y_preplace: default_max_y_preplace(),
        }
    }
}

// ============================================================================
// Polling
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    #[serde(default = "default_simulator_hz")]
    pub simulator_hz: u32,
    #[serde(default = "default_controller_hz")]
    pub controller_hz: u32,
}

fn default_simulator_hz() -> u32 {
    defaults::SIMULATOR_POLL_RATE_HZ
}
fn default_controller_hz() -> u32 {
    defaults::CONTROLLER_POLL_RATE_HZ
}

impl PollingConfig {
    /// Simulated seconds per simulator tick.
    pub fn simulator_interval_secs(&self) -> f64 {
        1.0 / f64::from(self.simulator_hz)
    }

    /// Simulator ticks run per controller tick in lockstep mode (at least 1).
    pub fn simulator_ticks_per_controller_tick(&self) -> u32 {
        (self.simulator_hz / self.controller_hz.max(1)).max(1)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            simulator_hz: default_simulator_hz(),
            controller_hz: default_controller_hz(),
        }
    }
}
