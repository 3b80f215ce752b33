//! Fingerprint Index: per-key inverted index from an observed value to the
//! set of applications that exhibited it in training.

use crate::record::Record;
use hashbrown::{HashMap, HashSet};

/// The three fingerprint key fields an index can be queried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintField {
    Primary,
    Session,
    Sni,
}

/// Inverted index: `field value -> set of applications`, one map per field.
/// Invariant: only non-absent values are ever inserted or retrieved.
#[derive(Debug, Clone, Default)]
pub struct FingerprintIndex {
    primary: HashMap<String, HashSet<String>>,
    session: HashMap<String, HashSet<String>>,
    sni: HashMap<String, HashSet<String>>,
}

impl FingerprintIndex {
    /// Builds the index from training rows: for each of the three key
    /// fields, if present, associates the value with the row's app.
    pub fn build(train: &[Record]) -> Self {
        let mut index = FingerprintIndex::default();
        for row in train {
            if let Some(ref value) = row.primary_hash {
                index
                    .primary
                    .entry(value.clone())
                    .or_default()
                    .insert(row.app.clone());
            }
            if let Some(ref value) = row.session_hash {
                index
                    .session
                    .entry(value.clone())
                    .or_default()
                    .insert(row.app.clone());
            }
            if let Some(ref value) = row.sni {
                index
                    .sni
                    .entry(value.clone())
                    .or_default()
                    .insert(row.app.clone());
            }
        }
        index
    }

    fn map_for(&self, field: FingerprintField) -> &HashMap<String, HashSet<String>> {
        match field {
            FingerprintField::Primary => &self.primary,
            FingerprintField::Session => &self.session,
            FingerprintField::Sni => &self.sni,
        }
    }

    /// Returns the applications observed with `value` on `field` in
    /// training. An absent `value` or an unknown value yields the empty set.
    pub fn candidates(&self, field: FingerprintField, value: Option<&str>) -> HashSet<String> {
        match value {
            None => HashSet::new(),
            Some(v) => self
                .map_for(field)
                .get(v)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Intersects the non-empty per-field candidate sets for `(primary,
    /// session, sni)`. Empty sets are treated as "no evidence from this
    /// field" rather than eliminating candidates; if all three are empty,
    /// returns the empty set.
    pub fn combined(
        &self,
        primary: Option<&str>,
        session: Option<&str>,
        sni: Option<&str>,
    ) -> HashSet<String> {
        let sets: Vec<HashSet<String>> = [
            self.candidates(FingerprintField::Primary, primary),
            self.candidates(FingerprintField::Session, session),
            self.candidates(FingerprintField::Sni, sni),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

        match sets.split_first() {
            None => HashSet::new(),
            Some((first, rest)) => {
                let mut acc = first.clone();
                for s in rest {
                    acc = acc.intersection(s).cloned().collect();
                }
                acc
            }
        }
    }
}
