//! Pattern Miner: per-application Apriori-style frequent itemset mining.
//!
//! Training rows for one application are one-hot encoded (each distinct
//! coerced attribute value becomes an item) and mined level-wise for all
//! itemsets with `support >= min_support`. Apriori is small and well
//! understood, so it is re-implemented directly here rather than pulled in
//! as a dependency (spec §9).

use crate::config::Config;
use crate::record::{Record, RecordStore};
use hashbrown::HashSet;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// An unordered set of context tokens that co-occurred frequently within one
/// application's training rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itemset {
    pub tokens: BTreeSet<String>,
    pub support: f64,
    pub normalized_support: f64,
}

impl Itemset {
    fn new(tokens: BTreeSet<String>, support: f64) -> Self {
        let normalized_support = (1.0 + support).ln();
        Itemset {
            tokens,
            support,
            normalized_support,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn is_subset_of(&self, other: &HashSet<String>) -> bool {
        self.tokens.iter().all(|t| other.contains(t))
    }
}

/// Ordered, per-application table of itemsets after filtering. Duplicates
/// are possible only across distinct filter slices and are kept (they bias
/// scoring by coverage — spec §4.3).
pub type PatternTable = Vec<Itemset>;

/// Application name -> its filtered pattern table.
pub type PatternStore = IndexMap<String, PatternTable>;

/// Mines per-application frequent itemsets and applies the configured
/// filter list.
pub struct PatternMiner<'a> {
    config: &'a Config,
}

impl<'a> PatternMiner<'a> {
    pub fn new(config: &'a Config) -> Self {
        PatternMiner { config }
    }

    /// Builds the full `PatternStore` from a `RecordStore`'s training rows,
    /// one application at a time (parallel across applications via rayon;
    /// spec §5 names this an independent, embarrassingly-parallel phase).
    pub fn build_store(&self, record_store: &RecordStore) -> PatternStore {
        let groups = record_store.train_by_app();
        let mut app_names: Vec<String> = groups.keys().cloned().collect();
        app_names.sort();

        let entries: Vec<(String, PatternTable)> = app_names
            .par_iter()
            .map(|app| {
                let rows = &groups[app];
                let raw = self.mine_app(rows);
                if raw.is_empty() {
                    warn!(app = %app, "no itemsets at configured min_support; storing empty table");
                }
                let table = self.apply_filters(&raw);
                (app.clone(), table)
            })
            .collect();

        let mut store = PatternStore::new();
        for (app, table) in entries {
            store.insert(app, table);
        }
        store
    }

    /// Mines all frequent itemsets (any cardinality) for one application's
    /// rows, deduplicated by identity and sorted by support descending.
    pub fn mine_app(&self, rows: &[&Record]) -> Vec<Itemset> {
        let transactions: Vec<BTreeSet<String>> = rows
            .iter()
            .map(|r| r.context_tokens(&self.config.context_attributes).into_iter().collect())
            .collect();

        if transactions.is_empty() {
            return Vec::new();
        }

        let total = transactions.len() as f64;
        let min_support = self.config.min_support;

        let mut frequent: Vec<(BTreeSet<String>, f64)> = Vec::new();

        // Level 1: single-item itemsets.
        let mut item_counts: IndexMap<String, usize> = IndexMap::new();
        for tx in &transactions {
            for item in tx {
                *item_counts.entry(item.clone()).or_insert(0) += 1;
            }
        }
        let mut level: Vec<(BTreeSet<String>, f64)> = item_counts
            .into_iter()
            .filter_map(|(item, count)| {
                let support = count as f64 / total;
                if support >= min_support {
                    Some((BTreeSet::from([item]), support))
                } else {
                    None
                }
            })
            .collect();
        level.sort_by(|a, b| a.0.iter().next().cmp(&b.0.iter().next()));
        frequent.extend(level.iter().cloned());

        // Levels 2..k: classic Apriori candidate generation + pruning.
        while !level.is_empty() {
            let candidates = Self::apriori_gen(&level);
            if candidates.is_empty() {
                break;
            }

            let mut next_level = Vec::new();
            for candidate in candidates {
                let count = transactions
                    .iter()
                    .filter(|tx| candidate.is_subset(tx))
                    .count();
                let support = count as f64 / total;
                if support >= min_support {
                    next_level.push((candidate, support));
                }
            }

            if next_level.is_empty() {
                break;
            }
            frequent.extend(next_level.iter().cloned());
            level = next_level;
        }

        let mut itemsets: Vec<Itemset> = frequent
            .into_iter()
            .map(|(tokens, support)| Itemset::new(tokens, support))
            .collect();
        itemsets.sort_by(|a, b| b.support.partial_cmp(&a.support).unwrap());
        itemsets
    }

    /// Standard Apriori-gen: joins pairs of frequent (k)-itemsets that share
    /// all but their last element (in sorted order), then prunes any
    /// candidate with an infrequent (k)-subset.
    fn apriori_gen(level: &[(BTreeSet<String>, f64)]) -> Vec<BTreeSet<String>> {
        let known: HashSet<&BTreeSet<String>> = level.iter().map(|(s, _)| s).collect();
        let sorted_sets: Vec<Vec<String>> = level
            .iter()
            .map(|(s, _)| s.iter().cloned().collect())
            .collect();

        let mut candidates: Vec<BTreeSet<String>> = Vec::new();
        let mut seen_candidates: HashSet<BTreeSet<String>> = HashSet::new();

        for i in 0..sorted_sets.len() {
            for j in (i + 1)..sorted_sets.len() {
                let a = &sorted_sets[i];
                let b = &sorted_sets[j];
                if a.len() != b.len() {
                    continue;
                }
                let k = a.len();
                if k == 0 || a[..k - 1] != b[..k - 1] {
                    continue;
                }

                let mut joined: BTreeSet<String> = a.iter().cloned().collect();
                joined.insert(b[k - 1].clone());

                if joined.len() != k + 1 || seen_candidates.contains(&joined) {
                    continue;
                }

                // Prune: every (k)-subset of the candidate must itself be frequent.
                let all_subsets_frequent = joined.iter().all(|excluded| {
                    let subset: BTreeSet<String> = joined
                        .iter()
                        .filter(|t| *t != excluded)
                        .cloned()
                        .collect();
                    known.contains(&subset)
                });

                if all_subsets_frequent {
                    seen_candidates.insert(joined.clone());
                    candidates.push(joined);
                }
            }
        }

        candidates
    }

    /// Applies the configured filter list: for each filter, the first
    /// `head` entries (from the support-descending list) whose cardinality
    /// satisfies `operator` are kept. The final table is the concatenation
    /// of the per-filter slices, in configured order; duplicates across
    /// filters are kept deliberately (spec §4.3, §9 Open Questions).
    fn apply_filters(&self, raw: &[Itemset]) -> PatternTable {
        if self.config.pattern_filters.is_empty() {
            return raw.to_vec();
        }

        let mut table = PatternTable::new();
        for filter in &self.config.pattern_filters {
            let slice: Vec<Itemset> = raw
                .iter()
                .filter(|itemset| filter.operator.matches(itemset.len(), filter.length))
                .take(filter.head)
                .cloned()
                .collect();
            table.extend(slice);
        }
        table
    }
}
