use crate::data::{Assignment, Placement};
use crate::error::SchedulerError;
use crate::model::AssignmentModel;
use crate::program::{LinearExpr, LinearProgram, Relation, VarKind};
use good_lp::solvers::SolutionStatus;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver, variable,
};
use itertools::Itertools;
use log::{info, trace, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Outcome class reported by the solving capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    FeasibleSuboptimal,
    Infeasible,
    TimedOut,
}

/// Limits imposed on a single solver call.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveBudget {
    pub time_limit: Option<Duration>,
    pub node_limit: Option<u64>,
    pub mip_rel_gap: Option<f64>,
    pub threads: u32,
    pub random_seed: i32,
    pub log_to_console: bool,
}

impl Default for SolveBudget {
    fn default() -> Self {
        Self {
            time_limit: None,
            node_limit: None,
            mip_rel_gap: None,
            threads: 1,
            random_seed: 1234,
            log_to_console: false,
        }
    }
}

/// Raw answer of a solver: one value per program variable, when it has any.
#[derive(Debug, Clone, PartialEq)]
pub struct MipSolution {
    pub status: SolveStatus,
    pub values: Option<Vec<f64>>,
}

/// Any mixed-integer engine that maximises a [`LinearProgram`].
pub trait MipSolver {
    fn solve(&self, program: &LinearProgram, budget: &SolveBudget) -> Result<MipSolution, SchedulerError>;
}

/// HiGHS through good_lp.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsSolver;

fn to_expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    let mut out = Expression::with_capacity(expr.terms.len());
    for &(var, coef) in &expr.terms {
        out.add_mul(coef, vars[var.0]);
    }
    out
}

impl MipSolver for HighsSolver {
    fn solve(&self, program: &LinearProgram, budget: &SolveBudget) -> Result<MipSolution, SchedulerError> {
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = program
            .variables
            .iter()
            .map(|def| {
                let definition = match def.kind {
                    VarKind::Binary => variable().binary(),
                    VarKind::Continuous { lower, upper } => variable().min(lower).max(upper),
                };
                problem.add(definition.name(def.name.clone()))
            })
            .collect();

        let objective = to_expression(&program.objective, &vars);
        let mut model = problem
            .maximise(objective)
            .using(default_solver)
            .set_option("threads", i32::try_from(budget.threads).unwrap_or(1))
            .set_option("random_seed", budget.random_seed)
            .set_option(
                "log_to_console",
                if budget.log_to_console { "true" } else { "false" },
            );
        if let Some(limit) = budget.time_limit {
            model = model.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(nodes) = budget.node_limit {
            model = model.set_option("mip_max_nodes", i32::try_from(nodes).unwrap_or(i32::MAX));
        }
        if let Some(gap) = budget.mip_rel_gap {
            model = model.set_option("mip_rel_gap", gap);
        }

        for c in &program.constraints {
            let lhs = to_expression(&c.expr, &vars);
            let rhs = c.rhs;
            let added = match c.relation {
                Relation::LessOrEqual => constraint!(lhs <= rhs),
                Relation::GreaterOrEqual => constraint!(lhs >= rhs),
                Relation::Equal => constraint!(lhs == rhs),
            };
            model.add_constraint(added);
        }
        trace!(
            "Handing {} variables and {} constraints to HiGHS.",
            vars.len(),
            program.constraints.len()
        );

        info!("Starting ILP solver...");
        match model.solve() {
            Ok(solution) => {
                let status = match solution.status() {
                    SolutionStatus::Optimal => SolveStatus::Optimal,
                    SolutionStatus::GapLimit => SolveStatus::FeasibleSuboptimal,
                    SolutionStatus::TimeLimit => SolveStatus::TimedOut,
                    #[allow(unreachable_patterns)]
                    _ => SolveStatus::FeasibleSuboptimal,
                };
                let values = vars.iter().map(|v| solution.value(*v)).collect();
                Ok(MipSolution {
                    status,
                    values: Some(values),
                })
            }
            Err(ResolutionError::Infeasible) => Ok(MipSolution {
                status: SolveStatus::Infeasible,
                values: None,
            }),
            Err(ResolutionError::Unbounded) => {
                Err(SchedulerError::Solver("model is unbounded".to_string()))
            }
            // a time or node limit hit before any feasible point was found
            Err(ResolutionError::Other("NoSolutionFound")) => Ok(MipSolution {
                status: SolveStatus::TimedOut,
                values: None,
            }),
            Err(e) => Err(SchedulerError::Solver(e.to_string())),
        }
    }
}

/// What one solve produced, decoded into an assignment when there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub assignment: Option<Assignment>,
    pub objective: Option<f64>,
    pub elapsed: Duration,
}

/// Reads the assignment off the binary values. A course decoded to zero or
/// several slots is an error.
pub fn decode_assignment(model: &AssignmentModel, values: &[f64]) -> Result<Assignment, SchedulerError> {
    if values.len() != model.program().variables.len() {
        return Err(SchedulerError::Decode(format!(
            "solver returned {} values for {} variables",
            values.len(),
            model.program().variables.len()
        )));
    }
    let chosen = model
        .assignment_vars()
        .iter()
        .filter(|(_, _, var)| values[var.0] > 0.5)
        .map(|&(course, slot, _)| (course, slot))
        .into_group_map();

    let mut placements = Vec::with_capacity(model.course_count());
    for course in 0..model.course_count() {
        match chosen.get(&course).map(Vec::as_slice) {
            Some([slot]) => placements.push(Placement { course, slot: *slot }),
            None | Some([]) => {
                return Err(SchedulerError::Decode(format!(
                    "course {course} was assigned no slot"
                )));
            }
            Some(slots) => {
                return Err(SchedulerError::Decode(format!(
                    "course {course} was assigned {} slots: {:?}",
                    slots.len(),
                    slots
                )));
            }
        }
    }
    Ok(Assignment::new(placements))
}

/// Solves the model and decodes the result.
pub fn solve_model<S: MipSolver>(
    solver: &S,
    model: &AssignmentModel,
    budget: &SolveBudget,
) -> Result<SolveResult, SchedulerError> {
    let start_time = Instant::now();
    let solution = solver.solve(model.program(), budget)?;
    let elapsed = start_time.elapsed();
    info!("Solver finished with {:?} in {:.2?}", solution.status, elapsed);

    let (assignment, objective) = match (solution.status, solution.values) {
        (SolveStatus::Infeasible, _) | (_, None) => (None, None),
        (SolveStatus::TimedOut, Some(values)) => match decode_assignment(model, &values) {
            Ok(assignment) => (Some(assignment), Some(model.program().objective_value(&values))),
            Err(e) => {
                warn!("Discarding incumbent after time limit: {}", e);
                (None, None)
            }
        },
        (_, Some(values)) => {
            let assignment = decode_assignment(model, &values)?;
            (Some(assignment), Some(model.program().objective_value(&values)))
        }
    };

    Ok(SolveResult {
        status: solution.status,
        assignment,
        objective,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BalanceConfig, ConsensusConfig, SatisfactionConfig};
    use crate::consensus::PreferenceAggregator;
    use crate::data::{Course, PreferenceMatrix, ScheduleProblem, SlotCatalog};
    use crate::model::AssignmentModelBuilder;
    use crate::satisfaction::SatisfactionModel;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Replays a fixed answer.
    struct CannedSolver(MipSolution);

    impl MipSolver for CannedSolver {
        fn solve(&self, _: &LinearProgram, _: &SolveBudget) -> Result<MipSolution, SchedulerError> {
            Ok(self.0.clone())
        }
    }

    fn model(rows: Vec<Vec<i32>>) -> AssignmentModel {
        let courses = (0..rows.len())
            .map(|i| Course {
                id: format!("C{i}"),
                faculty: None,
                voting: false,
            })
            .collect();
        let prefs = PreferenceMatrix::new(rows, 10).unwrap();
        let problem = ScheduleProblem::new(SlotCatalog::weekly(), courses, prefs).unwrap();
        let ranking = PreferenceAggregator::new(ConsensusConfig::default()).aggregate(&problem.preferences);
        let scores = SatisfactionModel::new(SatisfactionConfig::default()).unwrap().score(
            &problem.preferences,
            &ranking,
            &mut ChaCha8Rng::seed_from_u64(3),
        );
        AssignmentModelBuilder::new(&problem, &scores, BalanceConfig::default())
            .build()
            .unwrap()
    }

    fn values_for(model: &AssignmentModel, placements: &[(usize, usize)]) -> Vec<f64> {
        let mut values = vec![0.0; model.program().variables.len()];
        for &(c, t) in placements {
            values[model.var(c, t).unwrap().0] = 1.0;
        }
        values
    }

    #[test]
    fn decodes_one_slot_per_course() {
        let m = model(vec![vec![1; 10], vec![1; 10]]);
        let values = values_for(&m, &[(0, 3), (1, 6)]);
        let assignment = decode_assignment(&m, &values).unwrap();
        assert_eq!(assignment, Assignment::from_slots(&[3, 6]));
    }

    #[test]
    fn rejects_course_with_two_slots_or_none() {
        let m = model(vec![vec![1; 10], vec![1; 10]]);
        let doubled = values_for(&m, &[(0, 3), (0, 4), (1, 6)]);
        assert!(matches!(
            decode_assignment(&m, &doubled),
            Err(SchedulerError::Decode(_))
        ));
        let missing = values_for(&m, &[(0, 3)]);
        assert!(matches!(
            decode_assignment(&m, &missing),
            Err(SchedulerError::Decode(msg)) if msg.contains("course 1")
        ));
    }

    #[test]
    fn surfaces_statuses() {
        let m = model(vec![vec![1; 10]]);
        let values = values_for(&m, &[(0, 2)]);

        let gap = CannedSolver(MipSolution {
            status: SolveStatus::FeasibleSuboptimal,
            values: Some(values.clone()),
        });
        let result = solve_model(&gap, &m, &SolveBudget::default()).unwrap();
        assert_eq!(result.status, SolveStatus::FeasibleSuboptimal);
        assert_eq!(result.assignment, Some(Assignment::from_slots(&[2])));

        let infeasible = CannedSolver(MipSolution {
            status: SolveStatus::Infeasible,
            values: None,
        });
        let result = solve_model(&infeasible, &m, &SolveBudget::default()).unwrap();
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(result.assignment.is_none());
    }

    #[test]
    fn timed_out_without_usable_incumbent_has_no_assignment() {
        let m = model(vec![vec![1; 10]]);
        let timed_out = CannedSolver(MipSolution {
            status: SolveStatus::TimedOut,
            values: Some(vec![0.0; m.program().variables.len()]),
        });
        let result = solve_model(&timed_out, &m, &SolveBudget::default()).unwrap();
        assert_eq!(result.status, SolveStatus::TimedOut);
        assert!(result.assignment.is_none());
    }

    #[test]
    fn optimal_with_bad_values_is_decode_error() {
        let m = model(vec![vec![1; 10]]);
        let broken = CannedSolver(MipSolution {
            status: SolveStatus::Optimal,
            values: Some(vec![1.0; m.program().variables.len()]),
        });
        assert!(matches!(
            solve_model(&broken, &m, &SolveBudget::default()),
            Err(SchedulerError::Decode(_))
        ));
    }

    #[test]
    fn highs_reports_exhausted_time_limit_as_timed_out() {
        let rows: Vec<Vec<i32>> = (0..60)
            .map(|c| (0..10).map(|t| ((c * 7 + t * 3) % 10 + 1) as i32).collect())
            .collect();
        let m = model(rows);
        let budget = SolveBudget {
            time_limit: Some(Duration::from_nanos(1)),
            ..SolveBudget::default()
        };
        let solution = HighsSolver.solve(m.program(), &budget).unwrap();
        assert_eq!(solution.status, SolveStatus::TimedOut);
    }

    #[test]
    fn highs_solves_small_model() {
        let m = model(vec![
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1],
        ]);
        let result = solve_model(&HighsSolver, &m, &SolveBudget::default()).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        let assignment = result.assignment.unwrap();
        assert_eq!(assignment.placements.len(), 2);
        let values = values_for(
            &m,
            &assignment
                .placements
                .iter()
                .map(|p| (p.course, p.slot))
                .collect::<Vec<_>>(),
        );
        let objective = result.objective.unwrap();
        assert!((objective - m.program().objective_value(&values)).abs() < 1e-6);
    }
}
