//! Run configuration.
//!
//! A single immutable `Config` is built once, validated, and threaded by
//! reference through every other component — there is no process-wide
//! mutable configuration state.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Column names that are structural (never usable as a context attribute).
const RESERVED_ATTRIBUTES: [&str; 2] = ["AppName", "Filename"];

/// Selects which hash pair is read as the primary/session fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingerprintKind {
    V3,
    V4,
}

impl FingerprintKind {
    /// CSV column names for (primary, session) in this version.
    pub fn columns(self) -> (&'static str, &'static str) {
        match self {
            FingerprintKind::V3 => ("JA3hash", "JA3Shash"),
            FingerprintKind::V4 => ("JA4hash", "JA4Shash"),
        }
    }
}

/// Comparison operator applied to an itemset's cardinality by a pattern
/// filter (spec §4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOperator {
    pub fn matches(self, cardinality: usize, length: usize) -> bool {
        match self {
            FilterOperator::Eq => cardinality == length,
            FilterOperator::Ne => cardinality != length,
            FilterOperator::Lt => cardinality < length,
            FilterOperator::Le => cardinality <= length,
            FilterOperator::Gt => cardinality > length,
            FilterOperator::Ge => cardinality >= length,
        }
    }
}

/// One configured pattern filter: `{operator, length, head}` of spec §4.3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFilter {
    pub operator: FilterOperator,
    pub length: usize,
    pub head: usize,
}

/// Run configuration, built once and validated before any processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset_path: String,
    pub ja_version: FingerprintKind,
    pub sliding_window_size: usize,
    pub min_support: f64,
    pub max_candidates_length: usize,
    pub pattern_filters: Vec<PatternFilter>,
    pub context_attributes: Vec<String>,
    pub test_ratio: f64,
    pub csv_report_path: Option<String>,
    pub debug: bool,
}

impl Config {
    /// Validates every out-of-range / contradictory combination named in
    /// spec §7. Call once, before building any other component.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sliding_window_size == 0 {
            return Err(ConfigError::InvalidWindowSize(self.sliding_window_size));
        }
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(ConfigError::InvalidMinSupport(self.min_support));
        }
        if self.max_candidates_length == 0 {
            return Err(ConfigError::InvalidCandidateLength(
                self.max_candidates_length,
            ));
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(ConfigError::InvalidTestRatio(self.test_ratio));
        }
        for (index, filter) in self.pattern_filters.iter().enumerate() {
            if filter.length == 0 {
                return Err(ConfigError::InvalidFilterLength {
                    index,
                    length: filter.length,
                });
            }
            if filter.head == 0 {
                return Err(ConfigError::InvalidFilterHead {
                    index,
                    head: filter.head,
                });
            }
        }
        for attr in &self.context_attributes {
            if RESERVED_ATTRIBUTES.contains(&attr.as_str()) {
                return Err(ConfigError::ReservedAttribute(attr.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            dataset_path: "dataset.csv".into(),
            ja_version: FingerprintKind::V3,
            sliding_window_size: 5,
            min_support: 0.15,
            max_candidates_length: 3,
            pattern_filters: vec![PatternFilter {
                operator: FilterOperator::Ge,
                length: 2,
                head: 10,
            }],
            context_attributes: vec!["SNI".to_string()],
            test_ratio: 0.25,
            csv_report_path: None,
            debug: false,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_window() {
        let mut c = base_config();
        c.sliding_window_size = 0;
        assert_eq!(
            c.validate(),
            Err(ConfigError::InvalidWindowSize(0))
        );
    }

    #[test]
    fn rejects_out_of_range_support() {
        let mut c = base_config();
        c.min_support = 0.0;
        assert!(c.validate().is_err());
        c.min_support = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_test_ratio() {
        let mut c = base_config();
        c.test_ratio = 0.0;
        assert!(c.validate().is_err());
        c.test_ratio = 1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_zero_length_filter() {
        let mut c = base_config();
        c.pattern_filters[0].length = 0;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidFilterLength { .. })
        ));
    }

    #[test]
    fn rejects_reserved_context_attribute() {
        let mut c = base_config();
        c.context_attributes.push("AppName".to_string());
        assert!(matches!(
            c.validate(),
            Err(ConfigError::ReservedAttribute(_))
        ));
    }

    #[test]
    fn fingerprint_kind_columns() {
        assert_eq!(FingerprintKind::V3.columns(), ("JA3hash", "JA3Shash"));
        assert_eq!(FingerprintKind::V4.columns(), ("JA4hash", "JA4Shash"));
    }
}
