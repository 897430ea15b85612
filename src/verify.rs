//! Independent check of an assignment against every regulation.
//!
//! Nothing here trusts the solver: all quantities are recounted from the
//! placements. The verifier never fails; a broken assignment still yields a
//! complete report.

use std::collections::BTreeMap;

use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::config::BalanceConfig;
use crate::data::{Assignment, DayPattern, Placement, ScheduleProblem};
use crate::program::ConstraintFamily;

/// Result of one regulation check. `slack = limit - measured`; negative
/// when the regulation is violated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintCheck {
    pub family: ConstraintFamily,
    pub holds: bool,
    pub measured: i64,
    pub limit: i64,
    pub slack: i64,
    pub detail: String,
}

impl ConstraintCheck {
    fn new(family: ConstraintFamily, measured: i64, limit: i64, detail: String) -> Self {
        Self {
            family,
            holds: measured <= limit,
            measured,
            limit,
            slack: limit - measured,
            detail,
        }
    }
}

/// Counts behind the balance checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStats {
    pub mwf_count: usize,
    pub tt_count: usize,
    /// Start label -> courses starting then, in start-group order.
    pub time_counts: Vec<(String, usize)>,
    pub slot_counts: Vec<usize>,
    pub balance_diff: usize,
    pub time_diff: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub checks: Vec<ConstraintCheck>,
    pub stats: AssignmentStats,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.holds)
    }

    pub fn check(&self, family: ConstraintFamily) -> Option<&ConstraintCheck> {
        self.checks.iter().find(|c| c.family == family)
    }

    pub fn violations(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.holds)
            .map(|c| format!("{}: {}", c.family, c.detail))
            .collect()
    }
}

pub fn verify(problem: &ScheduleProblem, assignment: &Assignment, balance: &BalanceConfig) -> VerificationReport {
    let slot_count = problem.slot_count();
    let course_count = problem.course_count();

    // placements referring to courses or slots that do not exist
    let (valid, unknown): (Vec<&Placement>, Vec<&Placement>) = assignment
        .placements
        .iter()
        .partition(|p| p.course < course_count && p.slot < slot_count);

    let per_course = valid.iter().map(|p| p.course).counts();
    let unplaced = (0..course_count)
        .filter(|c| !per_course.contains_key(c))
        .count();
    let extra: usize = per_course.values().map(|n| n - 1).sum();
    let one_slot = ConstraintCheck::new(
        ConstraintFamily::ExactlyOneSlot,
        (unplaced + extra + unknown.len()) as i64,
        0,
        format!(
            "{unplaced} course(s) without a slot, {extra} extra placement(s), {} unknown placement(s)",
            unknown.len()
        ),
    );

    let unavailable = valid
        .iter()
        .filter(|p| !problem.preferences.is_available(p.course, p.slot))
        .map(|p| problem.courses[p.course].id.as_str())
        .collect::<Vec<_>>();
    let availability = ConstraintCheck::new(
        ConstraintFamily::Availability,
        unavailable.len() as i64,
        0,
        if unavailable.is_empty() {
            "every course meets in a slot it ranked".to_string()
        } else {
            format!("placed in an unavailable slot: {}", unavailable.join(", "))
        },
    );

    let mut slot_counts = vec![0usize; slot_count];
    for p in &valid {
        slot_counts[p.slot] += 1;
    }
    let day_count = |day: DayPattern| -> usize {
        problem
            .slots
            .slots_with_day(day)
            .iter()
            .map(|&t| slot_counts[t])
            .sum()
    };
    let mwf_count = day_count(DayPattern::Mwf);
    let tt_count = day_count(DayPattern::Tt);
    let balance_diff = mwf_count.abs_diff(tt_count);
    let day_balance = ConstraintCheck::new(
        ConstraintFamily::DayPatternBalance,
        balance_diff as i64,
        i64::from(balance.day_pattern_tolerance),
        format!("MWF {mwf_count}, TT {tt_count}"),
    );

    let time_counts: Vec<(String, usize)> = problem
        .slots
        .start_groups()
        .into_iter()
        .map(|(group, members)| {
            (
                problem.slots.start_label(group),
                members.iter().map(|&t| slot_counts[t]).sum(),
            )
        })
        .collect();
    let time_diff = match time_counts.iter().map(|(_, n)| *n).minmax() {
        MinMaxResult::NoElements | MinMaxResult::OneElement(_) => 0,
        MinMaxResult::MinMax(min, max) => max - min,
    };
    let start_balance = ConstraintCheck::new(
        ConstraintFamily::StartTimeBalance,
        time_diff as i64,
        i64::from(balance.start_time_tolerance),
        time_counts
            .iter()
            .map(|(label, n)| format!("{label}: {n}"))
            .join(", "),
    );

    let excluded = problem.slots.voting_excluded();
    let offenders: BTreeMap<&str, &str> = valid
        .iter()
        .filter(|p| excluded.contains(&p.slot) && problem.courses[p.course].voting)
        .map(|p| {
            (
                problem.courses[p.course].id.as_str(),
                problem.slots.get(p.slot).map_or("", |s| s.label.as_str()),
            )
        })
        .collect();
    let voting = ConstraintCheck::new(
        ConstraintFamily::VotingExclusion,
        offenders.len() as i64,
        0,
        if offenders.is_empty() {
            "no voting faculty course in a reserved slot".to_string()
        } else {
            offenders
                .iter()
                .map(|(course, slot)| format!("{course} in {slot}"))
                .join(", ")
        },
    );

    VerificationReport {
        checks: vec![one_slot, availability, day_balance, start_balance, voting],
        stats: AssignmentStats {
            mwf_count,
            tt_count,
            time_counts,
            slot_counts,
            balance_diff,
            time_diff,
        },
    }
}
