//! Statistics Aggregator: rank-indexed counters for one identification run,
//! tracked independently for the `ja` (fingerprint-only) and `ja_comb`
//! (fingerprint ∩ SNI ∩ session-hash) modes.

use serde::{Deserialize, Serialize};

/// Per-mode counters (spec §4.6). `correct` is indexed by rank (0-based:
/// `correct[0]` counts rank-1 hits) and always has length `candidate_size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeStatistics {
    pub correct: Vec<usize>,
    pub incorrect: usize,
    pub empty_candidates: usize,
    pub len_of_candidates: Vec<usize>,
    pub pure_context: usize,
    pub context_using_whole_db: usize,
}

impl ModeStatistics {
    pub fn new(candidate_size: usize) -> Self {
        ModeStatistics {
            correct: vec![0; candidate_size.max(1)],
            incorrect: 0,
            empty_candidates: 0,
            len_of_candidates: Vec::new(),
            pure_context: 0,
            context_using_whole_db: 0,
        }
    }

    /// Records one focal row's outcome: `rank` is the 0-based position of
    /// the true app within `top_apps`, or `None` if absent.
    pub fn record(&mut self, true_app: &str, top_apps: &[String]) {
        self.len_of_candidates.push(top_apps.len());

        if top_apps.is_empty() {
            self.empty_candidates += 1;
            return;
        }

        match top_apps.iter().position(|a| a == true_app) {
            Some(rank) if rank < self.correct.len() => self.correct[rank] += 1,
            _ => self.incorrect += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.len_of_candidates.len()
    }

    /// `Σ correct / N`.
    pub fn overall_accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct.iter().sum::<usize>() as f64 / total as f64
    }

    /// `correct[k] / N` for each configured rank.
    pub fn per_rank_accuracy(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.correct.len()];
        }
        self.correct
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }

    /// `incorrect / N`.
    pub fn error_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.incorrect as f64 / total as f64
    }

    pub fn mean_candidates(&self) -> f64 {
        if self.len_of_candidates.is_empty() {
            return 0.0;
        }
        self.len_of_candidates.iter().sum::<usize>() as f64 / self.len_of_candidates.len() as f64
    }

    pub fn median_candidates(&self) -> f64 {
        if self.len_of_candidates.is_empty() {
            return 0.0;
        }
        let mut sorted = self.len_of_candidates.clone();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        }
    }

    /// Smallest length with the highest occurrence count; ties broken by
    /// the smallest length (deterministic, independent of hashing order).
    pub fn mode_candidates(&self) -> usize {
        if self.len_of_candidates.is_empty() {
            return 0;
        }
        let mut counts: Vec<(usize, usize)> = Vec::new();
        for &len in &self.len_of_candidates {
            match counts.iter_mut().find(|(l, _)| *l == len) {
                Some((_, c)) => *c += 1,
                None => counts.push((len, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts[0].0
    }

    pub fn min_candidates(&self) -> usize {
        self.len_of_candidates.iter().copied().min().unwrap_or(0)
    }

    pub fn max_candidates(&self) -> usize {
        self.len_of_candidates.iter().copied().max().unwrap_or(0)
    }
}

/// Top-level statistics for a full identification run: one `ModeStatistics`
/// per mode, plus fingerprint-evidence counters that are mode-independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsAggregator {
    pub ja: ModeStatistics,
    pub ja_comb: ModeStatistics,
    /// Focal rows whose `ja_cands` subset was empty (no fingerprint evidence).
    pub empty_ja: usize,
    /// Focal rows whose `ja_comb_cands` subset was empty.
    pub empty_comb: usize,
    pub total: usize,
}

impl StatisticsAggregator {
    pub fn new(candidate_size: usize) -> Self {
        StatisticsAggregator {
            ja: ModeStatistics::new(candidate_size),
            ja_comb: ModeStatistics::new(candidate_size),
            empty_ja: 0,
            empty_comb: 0,
            total: 0,
        }
    }

    /// Merges another aggregator's counters into `self`, elementwise. Used
    /// to fold per-row-parallel partial results into one total (order of
    /// merge does not matter — every field is a sum or a concatenation).
    pub fn merge(&mut self, other: StatisticsAggregator) {
        self.ja.merge(other.ja);
        self.ja_comb.merge(other.ja_comb);
        self.empty_ja += other.empty_ja;
        self.empty_comb += other.empty_comb;
        self.total += other.total;
    }
}

impl ModeStatistics {
    fn merge(&mut self, other: ModeStatistics) {
        for (a, b) in self.correct.iter_mut().zip(other.correct.iter()) {
            *a += b;
        }
        self.incorrect += other.incorrect;
        self.empty_candidates += other.empty_candidates;
        self.len_of_candidates.extend(other.len_of_candidates);
        self.pure_context += other.pure_context;
        self.context_using_whole_db += other.context_using_whole_db;
    }
}
