//! Similarity Scorer: ranks applications by how well their mined itemsets
//! explain a sliding window of observed context tokens.
//!
//! `idf` here is computed per itemset (not per token): how many of the
//! applications currently under consideration have that exact itemset
//! anywhere in their table. This makes the scorer's notion of "rare,
//! discriminating pattern" relative to whatever candidate set it was
//! called with — the full store, or the narrower subset/complement the
//! Context Identifier's fallback ladder hands it (spec §4.4, §4.5).

use crate::mining::{Itemset, PatternTable};
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;

/// One application's aggregate score against a window, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub app: String,
    pub score: f64,
}

/// The set of context tokens a window of records contributes, deduplicated
/// across rows and attributes (spec §4.4's `tls_set`).
pub fn window_token_set<'a>(
    token_rows: impl IntoIterator<Item = &'a [String]>,
) -> HashSet<String> {
    let mut set = HashSet::new();
    for tokens in token_rows {
        for token in tokens {
            set.insert(token.clone());
        }
    }
    set
}

/// Per-itemset document frequency over one scoring call's candidate set:
/// how many applications' tables contain this exact itemset (duplicates
/// within one app's table count once).
struct DocumentFrequency {
    total_apps: usize,
    counts: HashMap<std::collections::BTreeSet<String>, usize>,
}

impl DocumentFrequency {
    fn build(patterns: &IndexMap<String, PatternTable>) -> Self {
        let mut counts: HashMap<std::collections::BTreeSet<String>, usize> = HashMap::new();
        for table in patterns.values() {
            let mut seen_in_app: HashSet<&std::collections::BTreeSet<String>> = HashSet::new();
            for itemset in table {
                if seen_in_app.insert(&itemset.tokens) {
                    *counts.entry(itemset.tokens.clone()).or_insert(0) += 1;
                }
            }
        }
        DocumentFrequency {
            total_apps: patterns.len(),
            counts,
        }
    }

    /// `idf(p) = ln(1 + total_apps / document_frequency(p))`.
    fn idf(&self, itemset: &Itemset) -> f64 {
        let df = *self.counts.get(&itemset.tokens).unwrap_or(&0);
        let df = (df as f64).max(1.0);
        (1.0 + self.total_apps as f64 / df).ln()
    }
}

fn jaccard(a: &std::collections::BTreeSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.iter().filter(|t| b.contains(t.as_str())).count() as f64;
    let union = (a.len() + b.len()) as f64 - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Scores every application in `patterns` against `tls_set` and returns
/// ranked, normalized candidates restricted to the top `top_n` (spec
/// §4.4). Applications whose composite score is not strictly positive are
/// dropped before normalization and ranking.
pub fn score(
    patterns: &IndexMap<String, PatternTable>,
    tls_set: &HashSet<String>,
    top_n: usize,
) -> Vec<Candidate> {
    if patterns.is_empty() {
        return Vec::new();
    }

    let dfs = DocumentFrequency::build(patterns);
    let mut raw: Vec<Candidate> = Vec::new();

    for (app, table) in patterns {
        let mut total = 0.0;
        for itemset in table {
            if itemset.tokens.is_empty() {
                continue;
            }
            let idf = dfs.idf(itemset);
            let jac = jaccard(&itemset.tokens, tls_set);
            total += (jac + 1.0) * idf;

            if itemset.is_subset_of(tls_set) {
                total += itemset.len() as f64 * 10.0 * idf * (itemset.normalized_support + 1.0);
            }
        }

        if total > 0.0 {
            raw.push(Candidate {
                app: app.clone(),
                score: total,
            });
        }
    }

    normalize(&mut raw);
    raw.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    raw.into_iter().take(top_n).collect()
}

/// Min-max normalizes scores into `[0, 1]`. When every score is equal (a
/// single candidate, or a genuine tie across all of them), every candidate
/// is set to 0.5 rather than dividing by a zero range.
fn normalize(candidates: &mut [Candidate]) {
    if candidates.is_empty() {
        return;
    }
    let min = candidates.iter().map(|c| c.score).fold(f64::INFINITY, f64::min);
    let max = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);

    if (max - min).abs() < f64::EPSILON {
        for c in candidates.iter_mut() {
            c.score = 0.5;
        }
    } else {
        for c in candidates.iter_mut() {
            c.score = (c.score - min) / (max - min);
        }
    }
}
