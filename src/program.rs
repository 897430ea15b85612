//! Solver-agnostic linear program.
//!
//! The assignment model is written against these types so any mixed-integer
//! engine can be plugged in behind [`crate::solver::MipSolver`].

use serde::Serialize;
use std::fmt;

/// Index of a variable inside its [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum VarKind {
    Binary,
    /// Bounds may be infinite.
    Continuous { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
}

/// Sum of coefficient * variable terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
        }
    }

    pub fn add(&mut self, coef: f64, var: VarId) -> &mut Self {
        self.terms.push((var, coef));
        self
    }

    /// `self - other`
    pub fn minus(mut self, other: &LinearExpr) -> Self {
        self.terms.extend(other.terms.iter().map(|&(v, c)| (v, -c)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

/// Which regulation a constraint encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintFamily {
    ExactlyOneSlot,
    Availability,
    DayPatternBalance,
    StartTimeBalance,
    VotingExclusion,
}

impl ConstraintFamily {
    /// Families that can be dropped while diagnosing infeasibility.
    pub const RELAXABLE: [ConstraintFamily; 3] = [
        ConstraintFamily::DayPatternBalance,
        ConstraintFamily::StartTimeBalance,
        ConstraintFamily::VotingExclusion,
    ];
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintFamily::ExactlyOneSlot => "exactly one slot",
            ConstraintFamily::Availability => "availability",
            ConstraintFamily::DayPatternBalance => "day pattern balance",
            ConstraintFamily::StartTimeBalance => "start time balance",
            ConstraintFamily::VotingExclusion => "voting faculty exclusion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearConstraint {
    pub family: ConstraintFamily,
    pub name: String,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.relation {
            Relation::LessOrEqual => lhs <= self.rhs + tolerance,
            Relation::GreaterOrEqual => lhs >= self.rhs - tolerance,
            Relation::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// A maximisation problem over binary and continuous variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinearProgram {
    pub variables: Vec<VarDef>,
    pub objective: LinearExpr,
    pub constraints: Vec<LinearConstraint>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, kind: VarKind) -> VarId {
        self.variables.push(VarDef {
            name: name.into(),
            kind,
        });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        family: ConstraintFamily,
        name: impl Into<String>,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) {
        self.constraints.push(LinearConstraint {
            family,
            name: name.into(),
            expr,
            relation,
            rhs,
        });
    }

    pub fn constraints_of(&self, family: ConstraintFamily) -> impl Iterator<Item = &LinearConstraint> {
        self.constraints.iter().filter(move |c| c.family == family)
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.evaluate(values)
    }
}
