use course_slot_scheduler::SchedulerError;
use course_slot_scheduler::config::SchedulerConfig;
use course_slot_scheduler::data::{
    CoursePreferences, CourseRecord, DayPattern, FacultyRecord, SchedulingInput, Slot, SlotCatalog,
};
use course_slot_scheduler::pipeline::SchedulingOptimizer;
use course_slot_scheduler::program::ConstraintFamily;
use course_slot_scheduler::solver::{HighsSolver, SolveStatus};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn preferences(rows: Vec<Vec<i32>>) -> Vec<CoursePreferences> {
    rows.into_iter()
        .enumerate()
        .map(|(i, ranks)| CoursePreferences {
            course: format!("C{i}"),
            ranks,
        })
        .collect()
}

fn input(rows: Vec<Vec<i32>>) -> SchedulingInput {
    SchedulingInput {
        preferences: preferences(rows),
        ..SchedulingInput::default()
    }
}

/// C0 is taught by a voting faculty member, everyone else is not.
fn input_with_voting(rows: Vec<Vec<i32>>) -> SchedulingInput {
    let courses = (0..rows.len())
        .map(|i| CourseRecord {
            id: format!("C{i}"),
            faculty: if i == 0 { "Adams".into() } else { format!("F{i}") },
        })
        .collect();
    let faculty = (0..rows.len())
        .map(|i| FacultyRecord {
            name: if i == 0 { "Adams".into() } else { format!("F{i}") },
            voting: i == 0,
        })
        .collect();
    SchedulingInput {
        courses,
        faculty,
        preferences: preferences(rows),
        seed: Some(17),
    }
}

fn optimizer() -> SchedulingOptimizer {
    SchedulingOptimizer::new(SchedulerConfig::default())
}

fn random_rows(seed: u64, courses: usize) -> Vec<Vec<i32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..courses)
        .map(|_| {
            let mut row: Vec<i32> = (0..10).map(|_| rng.random_range(1..=10)).collect();
            // at most two unavailable slots per course
            for _ in 0..rng.random_range(0..=2) {
                let t = rng.random_range(0..10);
                row[t] = 0;
            }
            row
        })
        .collect()
}

#[test]
fn uniform_preferences_are_balanced() {
    let outcome = optimizer().optimize(&input(vec![vec![1; 10]; 10])).unwrap();
    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert!(outcome.report.passed());
    assert!(outcome.report.stats.balance_diff <= 2);
    assert!(outcome.report.stats.time_diff <= 2);
    assert_eq!(outcome.entries.len(), 10);
}

#[test]
fn random_instances_satisfy_every_regulation() {
    for seed in 0..5 {
        let rows = random_rows(seed, 14);
        let outcome = optimizer().optimize(&input_with_voting(rows.clone())).unwrap();
        assert!(outcome.report.passed(), "{:?}", outcome.report.violations());

        let placements = &outcome.assignment.placements;
        assert_eq!(placements.len(), rows.len());
        for (course, p) in placements.iter().enumerate() {
            assert_eq!(p.course, course);
            assert_ne!(rows[course][p.slot], 0, "course {course} placed in an unavailable slot");
        }

        let stats = &outcome.report.stats;
        assert_eq!(stats.mwf_count + stats.tt_count, rows.len());
        assert!(stats.mwf_count.abs_diff(stats.tt_count) <= 2);
        let counts: Vec<usize> = stats.time_counts.iter().map(|(_, n)| *n).collect();
        assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 2);
        assert_ne!(outcome.assignment.slot_of(0), Some(9));
    }
}

#[test]
fn voting_course_never_gets_reserved_slot() {
    let mut rows = vec![vec![1; 10]; 10];
    rows[0] = vec![10, 10, 10, 10, 10, 10, 10, 10, 10, 1];
    let outcome = optimizer().optimize(&input_with_voting(rows)).unwrap();
    assert_ne!(outcome.assignment.slot_of(0), Some(9));
    let check = outcome.report.check(ConstraintFamily::VotingExclusion).unwrap();
    assert!(check.holds);
    assert_eq!(check.measured, 0);
}

#[test]
fn voting_course_with_only_reserved_slot_is_infeasible() {
    let mut rows = vec![vec![1; 10]; 4];
    rows[0] = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
    let err = optimizer().optimize(&input_with_voting(rows)).unwrap_err();
    match err {
        SchedulerError::Infeasible { suspected } => {
            assert_eq!(suspected, vec![ConstraintFamily::VotingExclusion]);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn same_seed_gives_identical_schedule() {
    let rows = random_rows(99, 12);
    let first = optimizer().optimize(&input_with_voting(rows.clone())).unwrap();
    let second = optimizer().optimize(&input_with_voting(rows)).unwrap();
    assert_eq!(first.entries, second.entries);
    assert_eq!(first.slot_popularity, second.slot_popularity);
    assert_eq!(first.satisfaction_total.to_bits(), second.satisfaction_total.to_bits());
    assert_eq!(first.kemeny_score, second.kemeny_score);
}

#[test]
fn two_courses_sharing_their_only_slot() {
    // one MWF and one TT slot at the same start time; no per-slot capacity
    // exists, so both courses land in slot 1 and |MWF - TT| = 2 is allowed
    let slot = |label: &str, day: DayPattern| Slot {
        label: label.to_string(),
        description: format!("{day} 9:00-10:15"),
        day,
        start_group: 1,
        start_label: "9:00".to_string(),
        voting_excluded: false,
    };
    let catalog = SlotCatalog::new(vec![slot("s1", DayPattern::Mwf), slot("s2", DayPattern::Tt)]).unwrap();
    let optimizer = SchedulingOptimizer::with_solver(SchedulerConfig::default(), catalog, HighsSolver);
    let outcome = optimizer.optimize(&input(vec![vec![1, 0], vec![1, 0]])).unwrap();
    assert_eq!(outcome.assignment.slot_of(0), Some(0));
    assert_eq!(outcome.assignment.slot_of(1), Some(0));
    let day = outcome.report.check(ConstraintFamily::DayPatternBalance).unwrap();
    assert_eq!((day.measured, day.slack), (2, 0));
}

#[test]
fn forcing_every_course_onto_mwf_is_infeasible() {
    let mwf_only = vec![1, 0, 2, 0, 3, 0, 4, 0, 5, 0];
    let err = optimizer().optimize(&input(vec![mwf_only; 4])).unwrap_err();
    match err {
        SchedulerError::Infeasible { suspected } => {
            assert_eq!(suspected, vec![ConstraintFamily::DayPatternBalance]);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn course_without_available_slot_is_model_error() {
    let err = optimizer()
        .optimize(&input(vec![vec![1; 10], vec![0; 10]]))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Model(msg) if msg.contains("C1")));
}

#[test]
fn preferred_slots_win_when_regulations_allow() {
    // every course has a distinct favourite and the favourites are balanced
    let rows: Vec<Vec<i32>> = (0..10)
        .map(|c| (0..10).map(|t| if t == c { 1 } else { 9 }).collect())
        .collect();
    let outcome = optimizer().optimize(&input(rows)).unwrap();
    for c in 0..10 {
        assert_eq!(outcome.assignment.slot_of(c), Some(c));
    }
    assert!(outcome.report.passed());
}

#[test]
fn exhausted_time_limit_is_reported_as_timed_out() {
    let mut config = SchedulerConfig::default();
    config.solver.time_limit_secs = Some(1e-9);
    let rows = random_rows(7, 60);
    match SchedulingOptimizer::new(config).optimize(&input(rows)) {
        Err(SchedulerError::TimedOut) => {}
        Ok(outcome) => assert_eq!(outcome.status, SolveStatus::TimedOut),
        Err(other) => panic!("unexpected error {other}"),
    }
}
