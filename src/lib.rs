//! Weekly course slot scheduling.
//!
//! Courses are placed into time slots so that every course gets exactly one
//! slot, day patterns and start times stay balanced, voting faculty stay out
//! of the reserved governance slot, and total faculty satisfaction is
//! maximised.
//!
//! # Modules
//!
//! - **`data`**: slot catalog, courses, preference matrix, assignments
//! - **`consensus`**: Kemeny-Young slot popularity
//! - **`satisfaction`**: per course/slot utility with seeded tie-breaking
//! - **`model`**: linearized binary program
//! - **`solver`**: `MipSolver` boundary and the HiGHS implementation
//! - **`verify`**: independent regulation checks
//! - **`pipeline`**: one end-to-end run
//! - **`server`**: JSON endpoint

pub mod config;
pub mod consensus;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod program;
pub mod satisfaction;
pub mod server;
pub mod solver;
pub mod verify;

pub use error::SchedulerError;
pub use pipeline::{ScheduleOutcome, SchedulingOptimizer};
