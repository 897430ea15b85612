use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::SchedulerError;
use log::warn;

// Type aliases for clarity
pub type CourseIdx = usize;
pub type SlotIdx = usize;
pub type Rank = u8;

/// Highest rank a preference may carry; 0 marks an unavailable slot.
pub const MAX_RANK: Rank = 10;

/// Weekly meeting pattern of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DayPattern {
    #[serde(rename = "MWF")]
    Mwf,
    #[serde(rename = "TT")]
    Tt,
}

impl fmt::Display for DayPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayPattern::Mwf => write!(f, "MWF"),
            DayPattern::Tt => write!(f, "TT"),
        }
    }
}

/// A weekly time slot a course can be placed in.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub label: String,
    pub description: String,
    pub day: DayPattern,
    /// Start-time group, 1..=5.
    pub start_group: u8,
    pub start_label: String,
    /// Reserved for the faculty governance meeting.
    pub voting_excluded: bool,
}

/// The ordered set of slots one run schedules into.
#[derive(Debug, Clone, Serialize)]
pub struct SlotCatalog {
    slots: Vec<Slot>,
}

impl SlotCatalog {
    pub const START_GROUPS: u8 = 5;

    pub fn new(slots: Vec<Slot>) -> Result<Self, SchedulerError> {
        if slots.is_empty() {
            return Err(SchedulerError::Model("slot catalog is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for slot in &slots {
            if !seen.insert(slot.label.as_str()) {
                return Err(SchedulerError::Data(format!(
                    "duplicate slot label '{}'",
                    slot.label
                )));
            }
            if !(1..=Self::START_GROUPS).contains(&slot.start_group) {
                return Err(SchedulerError::Data(format!(
                    "slot '{}' has start group {} outside 1..={}",
                    slot.label,
                    slot.start_group,
                    Self::START_GROUPS
                )));
            }
        }
        Ok(Self { slots })
    }

    /// The fixed ten-slot week: MWF and TT at each of five start times, with
    /// TT 3:00-4:15 reserved for voting faculty meetings.
    pub fn weekly() -> Self {
        const TIMES: [(&str, &str); 5] = [
            ("9:00", "10:15"),
            ("10:30", "11:45"),
            ("12:00", "1:15"),
            ("1:30", "2:45"),
            ("3:00", "4:15"),
        ];
        let mut slots = Vec::with_capacity(TIMES.len() * 2);
        for (group, (start, end)) in TIMES.iter().enumerate() {
            for day in [DayPattern::Mwf, DayPattern::Tt] {
                slots.push(Slot {
                    label: format!("s{}", slots.len() + 1),
                    description: format!("{day} {start}-{end}"),
                    day,
                    start_group: group as u8 + 1,
                    start_label: start.to_string(),
                    voting_excluded: day == DayPattern::Tt && group + 1 == TIMES.len(),
                });
            }
        }
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, idx: SlotIdx) -> Option<&Slot> {
        self.slots.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotIdx, &Slot)> {
        self.slots.iter().enumerate()
    }

    pub fn slots_with_day(&self, day: DayPattern) -> Vec<SlotIdx> {
        self.iter()
            .filter(|(_, s)| s.day == day)
            .map(|(i, _)| i)
            .collect()
    }

    /// Start groups present in the catalog, ascending, with their slots.
    pub fn start_groups(&self) -> Vec<(u8, Vec<SlotIdx>)> {
        let mut groups: Vec<(u8, Vec<SlotIdx>)> = Vec::new();
        for (idx, slot) in self.iter() {
            match groups.iter_mut().find(|(g, _)| *g == slot.start_group) {
                Some((_, members)) => members.push(idx),
                None => groups.push((slot.start_group, vec![idx])),
            }
        }
        groups.sort_by_key(|(g, _)| *g);
        groups
    }

    pub fn start_label(&self, group: u8) -> String {
        self.slots
            .iter()
            .find(|s| s.start_group == group)
            .map(|s| s.start_label.clone())
            .unwrap_or_else(|| format!("group {group}"))
    }

    pub fn voting_excluded(&self) -> Vec<SlotIdx> {
        self.iter()
            .filter(|(_, s)| s.voting_excluded)
            .map(|(i, _)| i)
            .collect()
    }
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self::weekly()
    }
}

/// Course metadata as supplied by the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: String,
    pub faculty: String,
}

/// Faculty metadata as supplied by the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyRecord {
    pub name: String,
    #[serde(default)]
    pub voting: bool,
}

/// One course's ranks, one entry per slot in catalog order.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePreferences {
    pub course: String,
    pub ranks: Vec<i32>,
}

/// The complete input for one scheduling run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    #[serde(default)]
    pub courses: Vec<CourseRecord>,
    #[serde(default)]
    pub faculty: Vec<FacultyRecord>,
    pub preferences: Vec<CoursePreferences>,
    /// Overrides the configured tie-break seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A course as seen by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub faculty: Option<String>,
    pub voting: bool,
}

/// Course x slot ranks, validated to lie in 0..=MAX_RANK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceMatrix {
    slot_count: usize,
    ranks: Vec<Vec<Rank>>,
}

impl PreferenceMatrix {
    pub fn new(rows: Vec<Vec<i32>>, slot_count: usize) -> Result<Self, SchedulerError> {
        let mut ranks = Vec::with_capacity(rows.len());
        for (c, row) in rows.into_iter().enumerate() {
            if row.len() != slot_count {
                return Err(SchedulerError::Data(format!(
                    "preference row {c} has {} ranks, expected {slot_count}",
                    row.len()
                )));
            }
            let converted = row
                .into_iter()
                .enumerate()
                .map(|(t, r)| match Rank::try_from(r) {
                    Ok(rank) if rank <= MAX_RANK => Ok(rank),
                    _ => Err(SchedulerError::Data(format!(
                        "preference row {c}, slot {t}: rank {r} outside 0..={MAX_RANK}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            ranks.push(converted);
        }
        Ok(Self { slot_count, ranks })
    }

    pub fn course_count(&self) -> usize {
        self.ranks.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn rank(&self, course: CourseIdx, slot: SlotIdx) -> Rank {
        self.ranks[course][slot]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Rank]> {
        self.ranks.iter().map(Vec::as_slice)
    }

    pub fn is_available(&self, course: CourseIdx, slot: SlotIdx) -> bool {
        self.ranks[course][slot] != 0
    }

    /// Returns a copy with one rank replaced.
    pub fn with_rank(&self, course: CourseIdx, slot: SlotIdx, rank: Rank) -> Result<Self, SchedulerError> {
        if rank > MAX_RANK {
            return Err(SchedulerError::Data(format!(
                "rank {rank} outside 0..={MAX_RANK}"
            )));
        }
        if course >= self.course_count() || slot >= self.slot_count() {
            return Err(SchedulerError::Data(format!(
                "no preference for course {course}, slot {slot}"
            )));
        }
        let mut copy = self.clone();
        copy.ranks[course][slot] = rank;
        Ok(copy)
    }
}

/// Validated, index-based view of one run's input.
#[derive(Debug, Clone)]
pub struct ScheduleProblem {
    pub slots: SlotCatalog,
    pub courses: Vec<Course>,
    pub preferences: PreferenceMatrix,
}

impl ScheduleProblem {
    pub fn new(
        slots: SlotCatalog,
        courses: Vec<Course>,
        preferences: PreferenceMatrix,
    ) -> Result<Self, SchedulerError> {
        if courses.len() != preferences.course_count() {
            return Err(SchedulerError::Data(format!(
                "{} courses but {} preference rows",
                courses.len(),
                preferences.course_count()
            )));
        }
        if preferences.slot_count() != slots.len() {
            return Err(SchedulerError::Data(format!(
                "preferences cover {} slots, catalog has {}",
                preferences.slot_count(),
                slots.len()
            )));
        }
        Ok(Self {
            slots,
            courses,
            preferences,
        })
    }

    /// Joins preferences with course and faculty metadata. Courses are taken
    /// from the preference rows, in their order.
    pub fn from_input(input: &SchedulingInput, slots: SlotCatalog) -> Result<Self, SchedulerError> {
        let faculty_voting: HashMap<&str, bool> = input
            .faculty
            .iter()
            .map(|f| (f.name.as_str(), f.voting))
            .collect();
        let course_faculty: HashMap<&str, &str> = input
            .courses
            .iter()
            .map(|c| (c.id.as_str(), c.faculty.as_str()))
            .collect();

        let mut seen = HashSet::new();
        let mut courses = Vec::with_capacity(input.preferences.len());
        for pref in &input.preferences {
            if !seen.insert(pref.course.as_str()) {
                return Err(SchedulerError::Data(format!(
                    "course '{}' has more than one preference row",
                    pref.course
                )));
            }
            let faculty = course_faculty.get(pref.course.as_str()).copied();
            let voting = match faculty {
                Some(name) => match faculty_voting.get(name) {
                    Some(v) => *v,
                    None => {
                        warn!(
                            "Faculty '{}' of course '{}' is not listed; treating as non-voting.",
                            name, pref.course
                        );
                        false
                    }
                },
                None => {
                    warn!(
                        "Course '{}' has no course metadata; treating as non-voting.",
                        pref.course
                    );
                    false
                }
            };
            courses.push(Course {
                id: pref.course.clone(),
                faculty: faculty.map(str::to_string),
                voting,
            });
        }

        let rows = input.preferences.iter().map(|p| p.ranks.clone()).collect();
        let preferences = PreferenceMatrix::new(rows, slots.len())?;
        Self::new(slots, courses, preferences)
    }

    pub fn course_count(&self) -> usize {
        self.courses.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// A single course placed in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub course: CourseIdx,
    pub slot: SlotIdx,
}

/// Course -> slot mapping. Built by the solver adapter or by hand; the
/// verifier accepts any list of placements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub placements: Vec<Placement>,
}

impl Assignment {
    pub fn new(mut placements: Vec<Placement>) -> Self {
        placements.sort();
        Self { placements }
    }

    /// One slot per course, in course order.
    pub fn from_slots(slots: &[SlotIdx]) -> Self {
        Self::new(
            slots
                .iter()
                .enumerate()
                .map(|(course, &slot)| Placement { course, slot })
                .collect(),
        )
    }

    pub fn slot_of(&self, course: CourseIdx) -> Option<SlotIdx> {
        self.placements
            .iter()
            .find(|p| p.course == course)
            .map(|p| p.slot)
    }
}

/// One row of the result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub course: String,
    pub slot: String,
    pub time: String,
    pub satisfaction: f64,
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}) satisfaction {:.2}",
            self.course, self.slot, self.time, self.satisfaction
        )
    }
}
