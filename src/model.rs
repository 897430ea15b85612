//! Binary program for the course/slot assignment.
//!
//! x(c,t) = 1 if course c meets in slot t, 0 otherwise. Only pairs the course
//! ranked as available get a variable, which enforces availability without an
//! explicit constraint. The balance rules need |.| and max/min, neither of
//! which is linear, so:
//!
//! - `|A - B| <= d` becomes `A - B <= d` and `B - A <= d`;
//! - `max_k u_k - min_k u_k <= s` becomes `lo <= u_k <= hi` for every start
//!   group k plus `hi - lo <= s`, with `lo`/`hi` continuous and chosen by the
//!   solver.

use std::collections::BTreeSet;

use log::{info, trace};

use crate::config::BalanceConfig;
use crate::data::{CourseIdx, DayPattern, ScheduleProblem, SlotIdx};
use crate::error::SchedulerError;
use crate::program::{ConstraintFamily, LinearExpr, LinearProgram, Relation, VarId, VarKind};
use crate::satisfaction::SatisfactionMatrix;

/// The built program plus the map from variables back to (course, slot).
#[derive(Debug, Clone)]
pub struct AssignmentModel {
    program: LinearProgram,
    assignment_vars: Vec<(CourseIdx, SlotIdx, VarId)>,
    course_count: usize,
    relaxed: BTreeSet<ConstraintFamily>,
}

impl AssignmentModel {
    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    pub fn assignment_vars(&self) -> &[(CourseIdx, SlotIdx, VarId)] {
        &self.assignment_vars
    }

    pub fn var(&self, course: CourseIdx, slot: SlotIdx) -> Option<VarId> {
        self.assignment_vars
            .iter()
            .find(|(c, t, _)| *c == course && *t == slot)
            .map(|(_, _, v)| *v)
    }

    pub fn course_count(&self) -> usize {
        self.course_count
    }

    pub fn relaxed(&self) -> &BTreeSet<ConstraintFamily> {
        &self.relaxed
    }
}

fn vars_where(
    vars: &[(CourseIdx, SlotIdx, VarId)],
    keep: impl Fn(CourseIdx, SlotIdx) -> bool,
) -> LinearExpr {
    LinearExpr::sum(vars.iter().filter(|(c, t, _)| keep(*c, *t)).map(|(_, _, v)| *v))
}

pub struct AssignmentModelBuilder<'a> {
    problem: &'a ScheduleProblem,
    scores: &'a SatisfactionMatrix,
    balance: BalanceConfig,
    relaxed: BTreeSet<ConstraintFamily>,
}

impl<'a> AssignmentModelBuilder<'a> {
    pub fn new(problem: &'a ScheduleProblem, scores: &'a SatisfactionMatrix, balance: BalanceConfig) -> Self {
        Self {
            problem,
            scores,
            balance,
            relaxed: BTreeSet::new(),
        }
    }

    /// Leaves out one constraint family; only the balance and voting families
    /// can be dropped.
    pub fn relax(mut self, family: ConstraintFamily) -> Self {
        if ConstraintFamily::RELAXABLE.contains(&family) {
            self.relaxed.insert(family);
        }
        self
    }

    fn enforces(&self, family: ConstraintFamily) -> bool {
        !self.relaxed.contains(&family)
    }

    pub fn build(self) -> Result<AssignmentModel, SchedulerError> {
        let problem = self.problem;
        let course_count = problem.course_count();
        let slot_count = problem.slot_count();
        if course_count == 0 {
            return Err(SchedulerError::Model("no courses to schedule".to_string()));
        }
        if slot_count == 0 {
            return Err(SchedulerError::Model("no slots to schedule into".to_string()));
        }
        if self.scores.course_count() != course_count {
            return Err(SchedulerError::Model(format!(
                "satisfaction matrix covers {} courses, problem has {}",
                self.scores.course_count(),
                course_count
            )));
        }
        for (c, course) in problem.courses.iter().enumerate() {
            if !(0..slot_count).any(|t| problem.preferences.is_available(c, t)) {
                return Err(SchedulerError::Model(format!(
                    "course '{}' is unavailable for every slot",
                    course.id
                )));
            }
        }

        info!(
            "Setting up ILP model with {} courses and {} slots...",
            course_count, slot_count
        );
        let mut program = LinearProgram::new();
        let mut assignment_vars = Vec::new();

        // pre-filter unavailable pairs
        for c in 0..course_count {
            for t in 0..slot_count {
                if problem.preferences.is_available(c, t) {
                    let var = program.add_variable(format!("x[{c},{t}]"), VarKind::Binary);
                    program.objective.add(self.scores.score(c, t), var);
                    assignment_vars.push((c, t, var));
                }
            }
        }
        trace!(
            "Generated {} assignment variables out of a theoretical maximum of {}.",
            assignment_vars.len(),
            course_count * slot_count
        );

        info!("Adding 'exactly one slot' constraints...");
        for (c, course) in problem.courses.iter().enumerate() {
            program.add_constraint(
                ConstraintFamily::ExactlyOneSlot,
                format!("one slot for {}", course.id),
                vars_where(&assignment_vars, |cc, _| cc == c),
                Relation::Equal,
                1.0,
            );
        }

        if self.enforces(ConstraintFamily::DayPatternBalance) {
            info!("Adding 'day pattern balance' constraints...");
            let mwf = problem.slots.slots_with_day(DayPattern::Mwf);
            let tt = problem.slots.slots_with_day(DayPattern::Tt);
            let a = vars_where(&assignment_vars, |_, t| mwf.contains(&t));
            let b = vars_where(&assignment_vars, |_, t| tt.contains(&t));
            let d = f64::from(self.balance.day_pattern_tolerance);
            program.add_constraint(
                ConstraintFamily::DayPatternBalance,
                "MWF - TT <= tolerance",
                a.clone().minus(&b),
                Relation::LessOrEqual,
                d,
            );
            program.add_constraint(
                ConstraintFamily::DayPatternBalance,
                "TT - MWF <= tolerance",
                b.minus(&a),
                Relation::LessOrEqual,
                d,
            );
        }

        if self.enforces(ConstraintFamily::StartTimeBalance) {
            info!("Adding 'start time balance' constraints...");
            let bound = course_count as f64;
            let lo = program.add_variable("lo", VarKind::Continuous { lower: 0.0, upper: bound });
            let hi = program.add_variable("hi", VarKind::Continuous { lower: 0.0, upper: bound });
            for (group, members) in problem.slots.start_groups() {
                let usage = vars_where(&assignment_vars, |_, t| members.contains(&t));
                let label = problem.slots.start_label(group);
                program.add_constraint(
                    ConstraintFamily::StartTimeBalance,
                    format!("{label} >= lo"),
                    usage.clone().minus(&LinearExpr::sum([lo])),
                    Relation::GreaterOrEqual,
                    0.0,
                );
                program.add_constraint(
                    ConstraintFamily::StartTimeBalance,
                    format!("{label} <= hi"),
                    usage.minus(&LinearExpr::sum([hi])),
                    Relation::LessOrEqual,
                    0.0,
                );
            }
            program.add_constraint(
                ConstraintFamily::StartTimeBalance,
                "hi - lo <= tolerance",
                LinearExpr::sum([hi]).minus(&LinearExpr::sum([lo])),
                Relation::LessOrEqual,
                f64::from(self.balance.start_time_tolerance),
            );
        }

        if self.enforces(ConstraintFamily::VotingExclusion) {
            for slot in problem.slots.voting_excluded() {
                let occupied = vars_where(&assignment_vars, |c, t| t == slot && problem.courses[c].voting);
                if occupied.is_empty() {
                    continue;
                }
                info!("Adding 'voting faculty exclusion' constraint for slot {slot}...");
                program.add_constraint(
                    ConstraintFamily::VotingExclusion,
                    format!("no voting faculty in slot {slot}"),
                    occupied,
                    Relation::Equal,
                    0.0,
                );
            }
        }

        trace!(
            "Model has {} variables and {} constraints.",
            program.variables.len(),
            program.constraints.len()
        );
        Ok(AssignmentModel {
            program,
            assignment_vars,
            course_count,
            relaxed: self.relaxed,
        })
    }
}
