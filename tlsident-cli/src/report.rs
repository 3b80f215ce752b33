//! Report Writer: appends one semicolon-delimited row per mode to the
//! configured report path, writing the header only when the file is new or
//! empty (spec §6's "Report output" field contract).

use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tlsident_core::config::Config;
use tlsident_core::stats::ModeStatistics;

#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub is_comb: bool,
    pub context_attributes: String,
    pub pattern_filters: String,
    pub min_support: f64,
    pub candidate_size: usize,
    pub ja_version: String,
    pub correct: usize,
    pub incorrect: usize,
    pub empty_candidates: usize,
    pub total: usize,
    pub overall_accuracy: f64,
    pub error_rate: f64,
    pub mean_candidates: f64,
    pub median_candidates: f64,
    pub mode_candidates: usize,
    pub min_candidates: usize,
    pub max_candidates: usize,
    pub per_rank_correct: String,
    pub per_rank_accuracy: String,
}

impl ReportRow {
    pub fn from_stats(is_comb: bool, config: &Config, stats: &ModeStatistics) -> Self {
        let ja_version = match config.ja_version {
            tlsident_core::config::FingerprintKind::V3 => "3",
            tlsident_core::config::FingerprintKind::V4 => "4",
        };
        let pattern_filters = config
            .pattern_filters
            .iter()
            .map(|f| format!("{:?}:{}:{}", f.operator, f.length, f.head))
            .collect::<Vec<_>>()
            .join(",");

        ReportRow {
            is_comb,
            context_attributes: config.context_attributes.join(","),
            pattern_filters,
            min_support: config.min_support,
            candidate_size: config.max_candidates_length,
            ja_version: ja_version.to_string(),
            correct: stats.correct.iter().sum(),
            incorrect: stats.incorrect,
            empty_candidates: stats.empty_candidates,
            total: stats.total(),
            overall_accuracy: stats.overall_accuracy(),
            error_rate: stats.error_rate(),
            mean_candidates: stats.mean_candidates(),
            median_candidates: stats.median_candidates(),
            mode_candidates: stats.mode_candidates(),
            min_candidates: stats.min_candidates(),
            max_candidates: stats.max_candidates(),
            per_rank_correct: format!("{:?}", stats.correct),
            per_rank_accuracy: format!("{:?}", stats.per_rank_accuracy()),
        }
    }
}

/// Appends `rows` to `path`, creating the file (with header) if it does not
/// already exist or is empty.
pub fn append_report(path: &str, rows: &[ReportRow]) -> Result<(), csv::Error> {
    let needs_header = !Path::new(path)
        .metadata()
        .map(|m| m.len() > 0)
        .unwrap_or(false);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(needs_header)
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
