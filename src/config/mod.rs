//! Machine Configuration Module
//!
//! Describes the physical machine (workspace limits, feeder and camera
//! stations, head speeds, actuation timing, misalignment injection, poll
//! rates) in a TOML file, with built-in defaults for the stock machine.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line (fatal if it fails)
//! 2. `PNP_CONFIG` environment variable (path to TOML file)
//! 3. `machine_config.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded config is passed by value to the simulator and controller;
//! there is no global instance.

pub mod defaults;
mod machine_config;
pub mod validation;

pub use machine_config::*;
