//! End-to-end optimization run: validate, estimate popularity, score, build,
//! solve, verify.

use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::consensus::{ConsensusRanking, PreferenceAggregator};
use crate::data::{Assignment, ScheduleEntry, ScheduleProblem, SchedulingInput, SlotCatalog};
use crate::error::SchedulerError;
use crate::model::AssignmentModelBuilder;
use crate::program::ConstraintFamily;
use crate::satisfaction::{SatisfactionMatrix, SatisfactionModel};
use crate::solver::{HighsSolver, MipSolver, SolveStatus, solve_model};
use crate::verify::{VerificationReport, verify};

/// Slot popularity as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotPopularity {
    pub slot: String,
    pub popularity: f64,
    pub insufficient_data: bool,
}

/// The final output of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    /// `TimedOut` and `FeasibleSuboptimal` results are never optimal.
    pub status: SolveStatus,
    pub entries: Vec<ScheduleEntry>,
    #[serde(skip)]
    pub assignment: Assignment,
    pub satisfaction_total: f64,
    pub report: VerificationReport,
    pub slot_popularity: Vec<SlotPopularity>,
    pub kemeny_score: u64,
    pub solve_time_ms: u128,
}

impl ScheduleOutcome {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

pub struct SchedulingOptimizer<S = HighsSolver> {
    config: SchedulerConfig,
    catalog: SlotCatalog,
    solver: S,
}

impl SchedulingOptimizer<HighsSolver> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_solver(config, SlotCatalog::weekly(), HighsSolver)
    }
}

impl<S: MipSolver> SchedulingOptimizer<S> {
    pub fn with_solver(config: SchedulerConfig, catalog: SlotCatalog, solver: S) -> Self {
        Self {
            config,
            catalog,
            solver,
        }
    }

    pub fn optimize(&self, input: &SchedulingInput) -> Result<ScheduleOutcome, SchedulerError> {
        let problem = ScheduleProblem::from_input(input, self.catalog.clone())?;
        let seed = input.seed.unwrap_or(self.config.run.seed);
        self.optimize_problem(&problem, seed)
    }

    pub fn optimize_problem(&self, problem: &ScheduleProblem, seed: u64) -> Result<ScheduleOutcome, SchedulerError> {
        self.config.validate()?;
        info!(
            "Optimizing {} courses over {} slots (seed {}).",
            problem.course_count(),
            problem.slot_count(),
            seed
        );
        let ranking = PreferenceAggregator::new(self.config.consensus.clone()).aggregate(&problem.preferences);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scores = SatisfactionModel::new(self.config.satisfaction.clone())?.score(
            &problem.preferences,
            &ranking,
            &mut rng,
        );

        let model = AssignmentModelBuilder::new(problem, &scores, self.config.balance.clone()).build()?;
        let budget = self.config.budget();
        let result = solve_model(&self.solver, &model, &budget)?;

        let assignment = match (result.status, result.assignment) {
            (SolveStatus::Infeasible, _) => {
                let suspected = self.diagnose_infeasibility(problem, &scores)?;
                return Err(SchedulerError::Infeasible { suspected });
            }
            (SolveStatus::TimedOut, None) => return Err(SchedulerError::TimedOut),
            (status, None) => {
                return Err(SchedulerError::Solver(format!(
                    "solver reported {status:?} without a solution"
                )));
            }
            (status, Some(assignment)) => {
                if status != SolveStatus::Optimal {
                    warn!("Returning a {:?} schedule; it is not proven optimal.", status);
                }
                assignment
            }
        };

        let report = verify(problem, &assignment, &self.config.balance);
        if !report.passed() {
            return Err(SchedulerError::Verification {
                report: Box::new(report),
                entries: entries(problem, &assignment, &scores),
            });
        }
        info!(
            "Schedule verified: MWF {}, TT {}, start-time spread {}.",
            report.stats.mwf_count, report.stats.tt_count, report.stats.time_diff
        );

        Ok(ScheduleOutcome {
            status: result.status,
            entries: entries(problem, &assignment, &scores),
            satisfaction_total: scores.total(&assignment),
            assignment,
            report,
            slot_popularity: slot_popularity(problem, &ranking),
            kemeny_score: ranking.kemeny_score,
            solve_time_ms: result.elapsed.as_millis(),
        })
    }

    /// Re-solves with each relaxable family left out in turn and returns those
    /// whose removal makes the model feasible. When no single family does,
    /// every relaxable family is suspected.
    fn diagnose_infeasibility(
        &self,
        problem: &ScheduleProblem,
        scores: &SatisfactionMatrix,
    ) -> Result<Vec<ConstraintFamily>, SchedulerError> {
        let budget = self.config.budget();
        let mut suspected = Vec::new();
        for family in ConstraintFamily::RELAXABLE {
            let model = AssignmentModelBuilder::new(problem, scores, self.config.balance.clone())
                .relax(family)
                .build()?;
            let solution = self.solver.solve(model.program(), &budget)?;
            if matches!(
                solution.status,
                SolveStatus::Optimal | SolveStatus::FeasibleSuboptimal
            ) || (solution.status == SolveStatus::TimedOut && solution.values.is_some())
            {
                suspected.push(family);
            }
        }
        if suspected.is_empty() {
            suspected = ConstraintFamily::RELAXABLE.to_vec();
        }
        warn!(
            "Model is infeasible; suspected constraint families: {:?}",
            suspected
        );
        Ok(suspected)
    }
}

fn entries(problem: &ScheduleProblem, assignment: &Assignment, scores: &SatisfactionMatrix) -> Vec<ScheduleEntry> {
    assignment
        .placements
        .iter()
        .filter_map(|p| {
            let slot = problem.slots.get(p.slot)?;
            let course = problem.courses.get(p.course)?;
            Some(ScheduleEntry {
                course: course.id.clone(),
                slot: slot.label.clone(),
                time: slot.description.clone(),
                satisfaction: scores.score(p.course, p.slot),
            })
        })
        .collect()
}

fn slot_popularity(problem: &ScheduleProblem, ranking: &ConsensusRanking) -> Vec<SlotPopularity> {
    problem
        .slots
        .iter()
        .map(|(idx, slot)| SlotPopularity {
            slot: slot.label.clone(),
            popularity: ranking.popularity(idx),
            insufficient_data: ranking.insufficient.contains(&idx),
        })
        .collect()
}
