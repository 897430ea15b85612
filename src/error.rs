use thiserror::Error;

use crate::config::ConfigError;
use crate::data::ScheduleEntry;
use crate::program::ConstraintFamily;
use crate::verify::VerificationReport;

/// Everything a scheduling run can fail with.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed or out-of-range input; raised before any modeling.
    #[error("invalid input data: {0}")]
    Data(String),

    /// The model cannot be built, e.g. a course with no available slot.
    #[error("invalid model: {0}")]
    Model(String),

    #[error("no schedule satisfies every hard constraint (suspected: {})", format_families(.suspected))]
    Infeasible { suspected: Vec<ConstraintFamily> },

    #[error("solver exhausted its budget without finding a feasible schedule")]
    TimedOut,

    #[error("solver failure: {0}")]
    Solver(String),

    #[error("inconsistent solver result: {0}")]
    Decode(String),

    /// Carries the rejected schedule so it can still be inspected.
    #[error("schedule failed verification: {}", .report.violations().join("; "))]
    Verification {
        report: Box<VerificationReport>,
        entries: Vec<ScheduleEntry>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn format_families(families: &[ConstraintFamily]) -> String {
    if families.is_empty() {
        return "unknown".to_string();
    }
    families
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
