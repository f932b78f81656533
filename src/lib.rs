//! # robovac
//!
//! Simulation engine for an autonomous cleaning robot. The robot wanders a
//! bounded grid at random until every reachable open cell has been visited,
//! and a runner streams per-tick progress frames to observers.

pub mod map;
pub use map::GridMap;
pub use map::StepError;

pub mod runner;
pub use runner::RunError;
pub use runner::Runner;
pub use runner::RunState;
pub use runner::StatusFrame;

pub mod server;

mod cell;
pub use cell::Cell;
pub use cell::Direction;
