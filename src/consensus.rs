//! Slot popularity from a Kemeny-Young consensus ranking.
//!
//! Every course's non-zero ranks are a partial order over slots. The consensus
//! order minimises the summed Kendall-tau distance to all of them. Two
//! strategies are available:
//!
//! - [`ExactKemeny`]: dynamic programming over subsets of rated slots,
//!   O(2^k * k^2) time and O(2^k) memory. Exact, used up to a configured slot
//!   count.
//! - [`BordaCount`]: orders slots by pairwise net wins. Used on request, or as
//!   the fallback when the exact search would exceed the slot limit.
//!
//! Both break ties by slot index, so the result depends only on the input.

use log::{info, trace, warn};
use serde::Serialize;

use crate::config::{ConsensusConfig, ConsensusMethod};
use crate::data::{PreferenceMatrix, Rank, SlotIdx};

/// `w[i][j]`: how many courses rank slot i strictly better than slot j.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairwiseWeights {
    size: usize,
    counts: Vec<u64>,
}

impl PairwiseWeights {
    pub fn from_preferences(prefs: &PreferenceMatrix) -> Self {
        let size = prefs.slot_count();
        let mut counts = vec![0u64; size * size];
        for row in prefs.rows() {
            for i in 0..size {
                for j in 0..size {
                    if prefers(row, i, j) {
                        counts[i * size + j] += 1;
                    }
                }
            }
        }
        Self { size, counts }
    }

    pub fn get(&self, i: SlotIdx, j: SlotIdx) -> u64 {
        self.counts[i * self.size + j]
    }
}

fn prefers(row: &[Rank], i: SlotIdx, j: SlotIdx) -> bool {
    row[i] != 0 && row[j] != 0 && row[i] < row[j]
}

/// Number of slot pairs whose relative order in `order` disagrees with one
/// course's ranks. Unranked slots contribute no pairs.
pub fn kendall_tau(order: &[SlotIdx], ranks: &[Rank]) -> u64 {
    let mut disagreements = 0;
    for (pos, &ahead) in order.iter().enumerate() {
        for &behind in &order[pos + 1..] {
            if prefers(ranks, behind, ahead) {
                disagreements += 1;
            }
        }
    }
    disagreements
}

/// Total Kendall-tau distance of `order` to every course.
pub fn kemeny_score(order: &[SlotIdx], weights: &PairwiseWeights) -> u64 {
    let mut score = 0;
    for (pos, &ahead) in order.iter().enumerate() {
        for &behind in &order[pos + 1..] {
            score += weights.get(behind, ahead);
        }
    }
    score
}

/// Orders a set of slots, most desired first.
pub trait ConsensusStrategy {
    fn method(&self) -> ConsensusMethod;

    /// `slots` is ascending; the returned order is a permutation of it.
    fn order(&self, weights: &PairwiseWeights, slots: &[SlotIdx]) -> Vec<SlotIdx>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKemeny;

impl ConsensusStrategy for ExactKemeny {
    fn method(&self) -> ConsensusMethod {
        ConsensusMethod::Exact
    }

    fn order(&self, weights: &PairwiseWeights, slots: &[SlotIdx]) -> Vec<SlotIdx> {
        let k = slots.len();
        if k < 2 {
            return slots.to_vec();
        }
        let full = (1usize << k) - 1;

        // cost of placing local item j next, with `placed` already ahead of it:
        // every remaining item some course prefers over j now sits behind j.
        let step_cost = |placed: usize, j: usize| -> u64 {
            (0..k)
                .filter(|&i| i != j && placed & (1 << i) == 0)
                .map(|i| weights.get(slots[i], slots[j]))
                .sum()
        };

        // best[mask]: minimum cost of ordering the items outside `mask`
        let mut best = vec![u64::MAX; full + 1];
        best[full] = 0;
        for mask in (0..full).rev() {
            for j in (0..k).filter(|&j| mask & (1 << j) == 0) {
                let candidate = step_cost(mask, j) + best[mask | (1 << j)];
                if candidate < best[mask] {
                    best[mask] = candidate;
                }
            }
        }

        let mut order = Vec::with_capacity(k);
        let mut mask = 0usize;
        while mask != full {
            let next = (0..k)
                .filter(|&j| mask & (1 << j) == 0)
                .find(|&j| step_cost(mask, j) + best[mask | (1 << j)] == best[mask]);
            match next {
                Some(j) => {
                    order.push(slots[j]);
                    mask |= 1 << j;
                }
                // unreachable for a consistent table; keep what remains in index order
                None => {
                    order.extend((0..k).filter(|&j| mask & (1 << j) == 0).map(|j| slots[j]));
                    break;
                }
            }
        }
        order
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BordaCount;

impl ConsensusStrategy for BordaCount {
    fn method(&self) -> ConsensusMethod {
        ConsensusMethod::Borda
    }

    fn order(&self, weights: &PairwiseWeights, slots: &[SlotIdx]) -> Vec<SlotIdx> {
        let net_wins = |j: SlotIdx| -> i64 {
            slots
                .iter()
                .filter(|&&i| i != j)
                .map(|&i| weights.get(j, i) as i64 - weights.get(i, j) as i64)
                .sum()
        };
        let mut order = slots.to_vec();
        // stable sort keeps ascending slot index among equal scores
        order.sort_by_key(|&j| std::cmp::Reverse(net_wins(j)));
        order
    }
}

/// Consensus over slots plus the popularity penalty derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusRanking {
    /// Rated slots, most desired first.
    pub order: Vec<SlotIdx>,
    /// Penalty per slot in [0, 1]; the most desired slot gets 1.
    pub popularity: Vec<f64>,
    pub method: ConsensusMethod,
    /// Summed Kendall-tau distance of `order` to every course.
    pub kemeny_score: u64,
    /// Slots no course ranked; they carry the maximal penalty.
    pub insufficient: Vec<SlotIdx>,
}

impl ConsensusRanking {
    pub const MAX_PENALTY: f64 = 1.0;
    const NEUTRAL_PENALTY: f64 = 0.5;

    pub fn popularity(&self, slot: SlotIdx) -> f64 {
        self.popularity[slot]
    }
}

pub struct PreferenceAggregator {
    config: ConsensusConfig,
}

impl PreferenceAggregator {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    fn strategy_for(&self, rated: usize) -> Box<dyn ConsensusStrategy> {
        match self.config.method {
            ConsensusMethod::Exact if rated <= self.config.exact_slot_limit => Box::new(ExactKemeny),
            ConsensusMethod::Exact => {
                warn!(
                    "{} rated slots exceed the exact Kemeny limit of {}; using Borda count.",
                    rated, self.config.exact_slot_limit
                );
                Box::new(BordaCount)
            }
            ConsensusMethod::Borda => Box::new(BordaCount),
        }
    }

    /// Ranks are range-checked when the [`PreferenceMatrix`] is built, so
    /// aggregation itself cannot fail.
    pub fn aggregate(&self, prefs: &PreferenceMatrix) -> ConsensusRanking {
        let slot_count = prefs.slot_count();
        let (rated, insufficient): (Vec<SlotIdx>, Vec<SlotIdx>) = (0..slot_count)
            .partition(|&t| prefs.rows().any(|row| row[t] != 0));
        for &slot in &insufficient {
            warn!(
                "No course ranked slot {}; assigning the maximal popularity penalty.",
                slot
            );
        }

        let weights = PairwiseWeights::from_preferences(prefs);
        let strategy = self.strategy_for(rated.len());
        let order = strategy.order(&weights, &rated);
        let score = kemeny_score(&order, &weights);
        trace!("Consensus order {:?} with Kemeny score {}", order, score);

        let mut popularity = vec![ConsensusRanking::MAX_PENALTY; slot_count];
        let last = order.len().saturating_sub(1);
        for (pos, &slot) in order.iter().enumerate() {
            popularity[slot] = if last == 0 {
                ConsensusRanking::NEUTRAL_PENALTY
            } else {
                (last - pos) as f64 / last as f64
            };
        }
        info!(
            "Slot popularity estimated with {:?} over {} rated slots.",
            strategy.method(),
            rated.len()
        );

        ConsensusRanking {
            order,
            popularity,
            method: strategy.method(),
            kemeny_score: score,
            insufficient,
        }
    }
}
