//! Record Store: the in-memory columnar table of training and test rows.
//!
//! A `Record` is immutable once built; `RecordStore::ingest` reads a
//! semicolon-delimited CSV, drops DNS-style `Type == "A"` rows, coerces the
//! configured context attributes to strings, and splits per-trace into a
//! train/test pair. The split is also exposed as a standalone pure function
//! so it can be tested without any CSV parsing involved.

use crate::config::{Config, FingerprintKind};
use crate::error::IngestError;
use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::warn;

/// Sentinel marking a context attribute that was structurally absent from a
/// row. Distinct per attribute so that "column X was absent" never collides
/// with "column Y was absent" or with a real value.
fn missing_token(attribute: &str) -> String {
    format!("\u{0}missing:{attribute}")
}

/// One training or test row. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub app: String,
    pub trace_id: String,
    pub primary_hash: Option<String>,
    pub session_hash: Option<String>,
    pub sni: Option<String>,
    /// Configured context attributes, coerced to strings; missing values are
    /// never inserted here — absence is checked via `context_values`.
    pub extra: HashMap<String, String>,
}

impl Record {
    /// Returns the tokens this record contributes to an Apriori transaction
    /// or a similarity scorer's `tls_set`, one per configured context
    /// attribute (spec §4.3, §4.4): the attribute's raw coerced value, or a
    /// per-attribute missing-value sentinel if the attribute was absent.
    pub fn context_tokens(&self, context_attributes: &[String]) -> Vec<String> {
        context_attributes
            .iter()
            .map(|attr| {
                self.extra
                    .get(attr)
                    .cloned()
                    .unwrap_or_else(|| missing_token(attr))
            })
            .collect()
    }
}

/// In-memory columnar table of training and test rows.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    pub train: Vec<Record>,
    pub test: Vec<Record>,
}

const REQUIRED_BASE_COLUMNS: [&str; 4] = ["AppName", "Filename", "SNI", "Type"];

impl RecordStore {
    /// Reads a semicolon-delimited CSV from `reader`, drops `Type == "A"`
    /// rows, projects to the configured context attributes, and splits
    /// per-trace into train/test. Fails with `IngestError` on an empty file,
    /// malformed CSV, or missing required columns.
    pub fn ingest<R: Read>(reader: R, config: &Config) -> Result<Self, IngestError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        Self::validate_headers(&headers, config)?;

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            if let Some(row) = Self::row_to_record(&headers, &record, config) {
                rows.push(row);
            }
        }

        if rows.is_empty() {
            return Err(IngestError::EmptyFile(config.dataset_path.clone()));
        }

        let (train, test) = Self::split_by_trace(rows, config.test_ratio);
        let train = Self::dedup_exact(train);

        Ok(RecordStore { train, test })
    }

    fn validate_headers(
        headers: &csv::StringRecord,
        config: &Config,
    ) -> Result<(), IngestError> {
        let present: Vec<&str> = headers.iter().collect();
        let mut missing = Vec::new();

        for col in REQUIRED_BASE_COLUMNS {
            if !present.contains(&col) {
                missing.push(col.to_string());
            }
        }
        let (primary_col, session_col) = config.ja_version.columns();
        for col in [primary_col, session_col] {
            if !present.contains(&col) {
                missing.push(col.to_string());
            }
        }
        for attr in &config.context_attributes {
            if !present.contains(&attr.as_str()) {
                missing.push(attr.clone());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::MissingColumns(missing))
        }
    }

    /// Converts one CSV row to a `Record`, or `None` if the row is a
    /// DNS-style row (`Type == "A"`) that must be dropped.
    fn row_to_record(
        headers: &csv::StringRecord,
        row: &csv::StringRecord,
        config: &Config,
    ) -> Option<Record> {
        let get = |col: &str| -> Option<String> {
            headers
                .iter()
                .position(|h| h == col)
                .and_then(|i| row.get(i))
                .map(|s| s.to_string())
        };

        if get("Type").as_deref() == Some("A") {
            return None;
        }

        let app = get("AppName").unwrap_or_default();
        let trace_id = get("Filename").unwrap_or_default();
        let (primary_col, session_col) = config.ja_version.columns();

        let primary_hash = get(primary_col).filter(|s| !s.is_empty());
        let session_hash = get(session_col).filter(|s| !s.is_empty());
        let sni = get("SNI").filter(|s| !s.is_empty());

        let mut extra = HashMap::new();
        for attr in &config.context_attributes {
            if let Some(value) = get(attr).filter(|s| !s.is_empty()) {
                extra.insert(attr.clone(), value);
            }
        }

        Some(Record {
            app,
            trace_id,
            primary_hash,
            session_hash,
            sni,
            extra,
        })
    }

    /// Pure function: groups `rows` by `trace_id` (preserving first-seen
    /// order) and splits each group deterministically (no shuffle) into a
    /// train prefix and a test suffix at `test_ratio`. Groups of size 1 are
    /// appended entirely to training.
    pub fn split_by_trace(rows: Vec<Record>, test_ratio: f64) -> (Vec<Record>, Vec<Record>) {
        let mut groups: IndexMap<String, Vec<Record>> = IndexMap::new();
        for row in rows {
            groups.entry(row.trace_id.clone()).or_default().push(row);
        }

        let mut train = Vec::new();
        let mut test = Vec::new();

        for (trace_id, group) in groups {
            if group.len() == 1 {
                warn!(trace_id = %trace_id, "trace has a single row; appended to training");
                train.extend(group);
                continue;
            }

            let test_len = ((group.len() as f64) * test_ratio).ceil() as usize;
            let train_len = group.len() - test_len;
            let (train_part, test_part) = group.split_at(train_len);
            train.extend_from_slice(train_part);
            test.extend_from_slice(test_part);
        }

        (train, test)
    }

    /// Removes exact-duplicate training rows.
    fn dedup_exact(rows: Vec<Record>) -> Vec<Record> {
        let mut seen = hashbrown::HashSet::new();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key = (
                row.app.clone(),
                row.trace_id.clone(),
                row.primary_hash.clone(),
                row.session_hash.clone(),
                row.sni.clone(),
                {
                    let mut kv: Vec<_> = row.extra.iter().collect();
                    kv.sort();
                    format!("{kv:?}")
                },
            );
            if seen.insert(key) {
                out.push(row);
            }
        }
        out
    }

    /// Groups `self.train` by application name, preserving first-seen order.
    pub fn train_by_app(&self) -> IndexMap<String, Vec<&Record>> {
        let mut groups: IndexMap<String, Vec<&Record>> = IndexMap::new();
        for row in &self.train {
            groups.entry(row.app.clone()).or_default().push(row);
        }
        groups
    }
}
