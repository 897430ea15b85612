use log::trace;
use rand::Rng;
use serde::Serialize;

use crate::config::{ConfigError, SatisfactionConfig};
use crate::consensus::ConsensusRanking;
use crate::data::{Assignment, CourseIdx, PreferenceMatrix, Rank, SlotIdx};

/// Non-negative utility of placing each course in each slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatisfactionMatrix {
    scores: Vec<Vec<f64>>,
}

impl SatisfactionMatrix {
    pub fn score(&self, course: CourseIdx, slot: SlotIdx) -> f64 {
        self.scores[course][slot]
    }

    pub fn course_count(&self) -> usize {
        self.scores.len()
    }

    pub fn row(&self, course: CourseIdx) -> &[f64] {
        &self.scores[course]
    }

    /// Summed satisfaction of an assignment; unknown placements count as 0.
    pub fn total(&self, assignment: &Assignment) -> f64 {
        assignment
            .placements
            .iter()
            .filter_map(|p| self.scores.get(p.course).and_then(|row| row.get(p.slot)))
            .sum()
    }
}

/// Turns ranks and slot popularity into satisfaction scores:
/// `max(0, (base - rank) - popularity + e)` with `e` uniform in the tie-break
/// range, and 0 for unavailable slots.
pub struct SatisfactionModel {
    config: SatisfactionConfig,
}

impl SatisfactionModel {
    /// Rejects an empty tie-break range, which could not be sampled.
    pub fn new(config: SatisfactionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn satisfaction(&self, rank: Rank, popularity: f64, tie_break: f64) -> f64 {
        if rank == 0 {
            return 0.0;
        }
        let base = self.config.base_score - f64::from(rank);
        (base - popularity + tie_break).max(0.0)
    }

    /// One tie-break is drawn for every pair in course-major order, available
    /// or not, so the random stream is independent of the rank values.
    pub fn score<R: Rng>(
        &self,
        prefs: &PreferenceMatrix,
        ranking: &ConsensusRanking,
        rng: &mut R,
    ) -> SatisfactionMatrix {
        let range = self.config.tie_break_min..self.config.tie_break_max;
        let scores: Vec<Vec<f64>> = (0..prefs.course_count())
            .map(|c| {
                (0..prefs.slot_count())
                    .map(|t| {
                        let tie_break = rng.random_range(range.clone());
                        self.satisfaction(prefs.rank(c, t), ranking.popularity(t), tie_break)
                    })
                    .collect()
            })
            .collect();
        trace!(
            "Built {}x{} satisfaction matrix.",
            prefs.course_count(),
            prefs.slot_count()
        );
        SatisfactionMatrix { scores }
    }
}
