//! Context Identifier: the driver that shuffles the test sequence, slides a
//! window over it, and scores each focal row against progressively broader
//! pattern sets (the Fallback Ladder), folding per-row outcomes into a
//! single `StatisticsAggregator`.

use crate::config::Config;
use crate::fingerprint::{FingerprintField, FingerprintIndex};
use crate::mining::{PatternStore, PatternTable};
use crate::record::Record;
use crate::scoring;
use crate::stats::StatisticsAggregator;
use hashbrown::HashSet;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::VecDeque;
use tracing::warn;

/// Deterministically reorders test rows: group by `trace_id` within each
/// `app` (first-seen order), then round-robin one trace per app (in
/// first-seen app order) until every app's trace list is exhausted. Rows
/// within a selected trace keep their original relative order (spec §4.5,
/// scenario S5).
pub fn shuffle_test_rows(test: &[Record]) -> Vec<Record> {
    let mut traces: IndexMap<(String, String), Vec<Record>> = IndexMap::new();
    for row in test {
        traces
            .entry((row.app.clone(), row.trace_id.clone()))
            .or_default()
            .push(row.clone());
    }

    let mut app_trace_ids: IndexMap<String, VecDeque<String>> = IndexMap::new();
    for (app, trace_id) in traces.keys() {
        app_trace_ids
            .entry(app.clone())
            .or_default()
            .push_back(trace_id.clone());
    }

    let mut output = Vec::with_capacity(test.len());
    loop {
        let mut progressed = false;
        for (app, queue) in app_trace_ids.iter_mut() {
            if let Some(trace_id) = queue.pop_front() {
                progressed = true;
                if let Some(rows) = traces.get(&(app.clone(), trace_id)) {
                    output.extend(rows.iter().cloned());
                }
            }
        }
        if !progressed {
            break;
        }
    }
    output
}

/// Bounds of the sliding window covering focal index `i` out of `n` rows:
/// `start = clamp(i - floor(w/2), 0, max(n - w, 0))`, window `[start, end)`
/// with `end = min(start + w, n)` (spec §3 `TestWindow`).
fn window_bounds(i: usize, n: usize, w: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let half = (w / 2) as isize;
    let max_start = (n as isize - w as isize).max(0);
    let start = (i as isize - half).clamp(0, max_start) as usize;
    let end = (start + w).min(n);
    (start, end)
}

/// Filters `store` to the given application names, preserving the store's
/// own (alphabetical) iteration order.
fn project(store: &PatternStore, apps: &HashSet<String>) -> IndexMap<String, PatternTable> {
    store
        .iter()
        .filter(|(app, _)| apps.contains(app.as_str()))
        .map(|(app, table)| (app.clone(), table.clone()))
        .collect()
}

fn complement(store: &PatternStore, apps: &HashSet<String>) -> IndexMap<String, PatternTable> {
    store
        .iter()
        .filter(|(app, _)| !apps.contains(app.as_str()))
        .map(|(app, table)| (app.clone(), table.clone()))
        .collect()
}

fn whole_store(store: &PatternStore) -> IndexMap<String, PatternTable> {
    store
        .iter()
        .map(|(app, table)| (app.clone(), table.clone()))
        .collect()
}

/// One focal row's outcome for a single mode: the ranked top-list, plus
/// which fallback tiers fired.
struct LadderResult {
    top_apps: Vec<String>,
    used_whole_db: bool,
    used_pure_context: bool,
}

/// Runs the Fallback Ladder: subset -> complement -> full store.
fn fallback_ladder(
    subset_apps: &HashSet<String>,
    store: &PatternStore,
    tls_set: &HashSet<String>,
    top_n: usize,
) -> LadderResult {
    if subset_apps.is_empty() {
        let full_patterns = whole_store(store);
        let top_apps = scoring::score(&full_patterns, tls_set, top_n)
            .into_iter()
            .map(|c| c.app)
            .collect();
        return LadderResult {
            top_apps,
            used_whole_db: true,
            used_pure_context: false,
        };
    }

    let subset_patterns = project(store, subset_apps);
    let subset_result = scoring::score(&subset_patterns, tls_set, top_n);
    if !subset_result.is_empty() {
        return LadderResult {
            top_apps: subset_result.into_iter().map(|c| c.app).collect(),
            used_whole_db: false,
            used_pure_context: false,
        };
    }

    let complement_patterns = complement(store, subset_apps);
    let complement_result = scoring::score(&complement_patterns, tls_set, top_n);
    if !complement_result.is_empty() {
        return LadderResult {
            top_apps: complement_result.into_iter().map(|c| c.app).collect(),
            used_whole_db: false,
            used_pure_context: true,
        };
    }

    let full_patterns = whole_store(store);
    let full_result = scoring::score(&full_patterns, tls_set, top_n);
    LadderResult {
        top_apps: full_result.into_iter().map(|c| c.app).collect(),
        used_whole_db: false,
        used_pure_context: true,
    }
}

/// Borrows a `FingerprintIndex` and `PatternStore` read-only and drives
/// identification over a shuffled, windowed test sequence.
pub struct ContextIdentifier<'a> {
    config: &'a Config,
    index: &'a FingerprintIndex,
    store: &'a PatternStore,
}

impl<'a> ContextIdentifier<'a> {
    pub fn new(config: &'a Config, index: &'a FingerprintIndex, store: &'a PatternStore) -> Self {
        ContextIdentifier {
            config,
            index,
            store,
        }
    }

    /// Logs `EmptyTrainingWarning` for every application seen in `test` but
    /// absent from the pattern store (no training rows survived ingest for
    /// it, so no patterns could ever have been mined).
    pub fn warn_untrained_apps(&self, test: &[Record]) {
        let mut seen = HashSet::new();
        for row in test {
            if seen.insert(row.app.clone()) && !self.store.contains_key(&row.app) {
                warn!(app = %row.app, "application has no training rows; absent from pattern store");
            }
        }
    }

    /// Runs the full identification loop over `test`, returning merged
    /// statistics for both modes. Per-focal-row work is independent and is
    /// parallelized with rayon; partial aggregators are folded afterward.
    pub fn identify(&self, test: &[Record]) -> StatisticsAggregator {
        self.warn_untrained_apps(test);

        let shuffled = shuffle_test_rows(test);
        let n = shuffled.len();
        let w = self.config.sliding_window_size;
        let top_n = self.config.max_candidates_length;

        if n == 0 {
            return StatisticsAggregator::new(top_n);
        }

        (0..n)
            .into_par_iter()
            .map(|i| {
                let (start, end) = window_bounds(i, n, w);
                let window = &shuffled[start..end];
                let row = &shuffled[i];

                let token_rows: Vec<Vec<String>> = window
                    .iter()
                    .map(|r| r.context_tokens(&self.config.context_attributes))
                    .collect();
                let tls_set =
                    scoring::window_token_set(token_rows.iter().map(|v| v.as_slice()));

                let mut partial = StatisticsAggregator::new(top_n);
                partial.total = 1;

                let ja_cands = self
                    .index
                    .candidates(FingerprintField::Primary, row.primary_hash.as_deref());
                if ja_cands.is_empty() {
                    partial.empty_ja += 1;
                }
                let ja_result = fallback_ladder(&ja_cands, self.store, &tls_set, top_n);
                partial.ja.record(&row.app, &ja_result.top_apps);
                if ja_result.used_whole_db {
                    partial.ja.context_using_whole_db += 1;
                }
                if ja_result.used_pure_context {
                    partial.ja.pure_context += 1;
                }

                let comb_cands = self.index.combined(
                    row.primary_hash.as_deref(),
                    row.session_hash.as_deref(),
                    row.sni.as_deref(),
                );
                if comb_cands.is_empty() {
                    partial.empty_comb += 1;
                }
                let comb_result = fallback_ladder(&comb_cands, self.store, &tls_set, top_n);
                partial.ja_comb.record(&row.app, &comb_result.top_apps);
                if comb_result.used_whole_db {
                    partial.ja_comb.context_using_whole_db += 1;
                }
                if comb_result.used_pure_context {
                    partial.ja_comb.pure_context += 1;
                }

                partial
            })
            .reduce(
                || StatisticsAggregator::new(top_n),
                |mut a, b| {
                    a.merge(b);
                    a
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FingerprintKind;
    use hashbrown::HashMap as HbMap;

    fn rec(app: &str, trace: &str, primary: Option<&str>) -> Record {
        Record {
            app: app.to_string(),
            trace_id: trace.to_string(),
            primary_hash: primary.map(str::to_string),
            session_hash: None,
            sni: None,
            extra: HbMap::new(),
        }
    }

    #[test]
    fn shuffle_round_robins_traces_across_apps_scenario_s5() {
        let test = vec![
            rec("A", "a1", None),
            rec("A", "a2", None),
            rec("B", "b1", None),
            rec("C", "c1", None),
            rec("C", "c2", None),
            rec("C", "c3", None),
        ];
        let shuffled = shuffle_test_rows(&test);
        let traces: Vec<String> = shuffled.iter().map(|r| r.trace_id.clone()).collect();
        assert_eq!(traces, vec!["a1", "b1", "c1", "a2", "c2", "c3"]);
    }

    #[test]
    fn window_bounds_clip_to_valid_range() {
        // n=10, w=4, i=0 -> start clipped to 0
        assert_eq!(window_bounds(0, 10, 4), (0, 4));
        // i near the end clips the window to stay full
        assert_eq!(window_bounds(9, 10, 4), (6, 10));
        // window larger than n: whole sequence
        assert_eq!(window_bounds(2, 3, 10), (0, 3));
    }

    fn config() -> Config {
        Config {
            dataset_path: "d.csv".into(),
            ja_version: FingerprintKind::V3,
            sliding_window_size: 1,
            min_support: 0.1,
            max_candidates_length: 2,
            pattern_filters: vec![],
            context_attributes: vec![],
            test_ratio: 0.25,
            csv_report_path: None,
            debug: false,
        }
    }

    #[test]
    fn empty_subset_uses_whole_store_and_increments_counter() {
        let cfg = config();
        let index = FingerprintIndex::default();
        let store = PatternStore::new();
        let identifier = ContextIdentifier::new(&cfg, &index, &store);
        let test = vec![rec("A", "t1", Some("unseen"))];
        let stats = identifier.identify(&test);
        assert_eq!(stats.ja.context_using_whole_db, 1);
        assert_eq!(stats.total, 1);
    }
}
