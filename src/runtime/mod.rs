//! Runtime
//!
//! Two ways to drive the machine:
//!
//! - real time: simulator, controller and keyboard each run as a tokio task
//!   under a `JoinSet` supervisor with a shared `CancellationToken`
//! - lockstep: [`Bench`] steps both state machines in one thread against
//!   simulated time only, for tests and reproducible runs

mod lockstep;
mod tasks;

pub use lockstep::Bench;
pub use tasks::{run_supervisor, spawn_controller, spawn_keyboard, spawn_simulator, RunOptions, TaskName};
