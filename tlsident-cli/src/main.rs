//! Command-line runner for `tlsident`: ingest a capture dataset, train
//! per-application pattern tables, identify applications over the held-out
//! test split, and print (and optionally append) a summary report.

mod report;

use clap::Parser;
use report::ReportRow;
use std::fs::File;
use thiserror::Error;
use tlsident_core::config::{Config, FilterOperator, PatternFilter};
use tlsident_core::error::{ConfigError, IngestError};
use tlsident_core::fingerprint::FingerprintIndex;
use tlsident_core::identify::ContextIdentifier;
use tlsident_core::mining::PatternMiner;
use tlsident_core::record::RecordStore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tlsident")]
#[command(about = "Fingerprint + context-based identification of TLS client applications")]
struct Cli {
    /// Path to the semicolon-delimited capture dataset.
    #[arg(long)]
    dataset_path: String,

    /// Which hash pair to read as primary/session fingerprint.
    #[arg(long, default_value_t = 3)]
    ja_version: u8,

    /// Sliding window size used by the Context Identifier.
    #[arg(long, default_value_t = 5)]
    window_size: usize,

    /// Minimum support for an itemset to be retained by the Pattern Miner.
    #[arg(long, default_value_t = 0.1)]
    min_support: f64,

    /// Top-N candidate list size returned by the Similarity Scorer.
    #[arg(long, default_value_t = 5)]
    max_candidates_length: usize,

    /// Repeatable `operator:length:head` pattern filter, e.g. `>=:2:10`.
    #[arg(long = "pattern-filter", value_parser = parse_pattern_filter)]
    pattern_filters: Vec<PatternFilter>,

    /// Repeatable context attribute column name.
    #[arg(long = "context-attribute")]
    context_attributes: Vec<String>,

    /// Fraction of each trace held out for testing.
    #[arg(long, default_value_t = 0.25)]
    test_ratio: f64,

    /// Optional path to append one summary row per mode.
    #[arg(long)]
    csv_report_path: Option<String>,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn parse_pattern_filter(raw: &str) -> Result<PatternFilter, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [op, length, head] = parts.as_slice() else {
        return Err(format!(
            "expected `operator:length:head`, got {raw:?}"
        ));
    };
    let operator = match *op {
        "==" => FilterOperator::Eq,
        "!=" => FilterOperator::Ne,
        "<" => FilterOperator::Lt,
        "<=" => FilterOperator::Le,
        ">" => FilterOperator::Gt,
        ">=" => FilterOperator::Ge,
        other => return Err(format!("unknown filter operator {other:?}")),
    };
    let length: usize = length
        .parse()
        .map_err(|_| format!("invalid filter length {length:?}"))?;
    let head: usize = head
        .parse()
        .map_err(|_| format!("invalid filter head {head:?}"))?;
    Ok(PatternFilter {
        operator,
        length,
        head,
    })
}

impl Cli {
    fn ja_version(&self) -> Result<tlsident_core::config::FingerprintKind, CliError> {
        match self.ja_version {
            3 => Ok(tlsident_core::config::FingerprintKind::V3),
            4 => Ok(tlsident_core::config::FingerprintKind::V4),
            other => Err(CliError::InvalidJaVersion(other)),
        }
    }

    fn into_config(self) -> Result<Config, CliError> {
        let ja_version = self.ja_version()?;
        Ok(Config {
            dataset_path: self.dataset_path,
            ja_version,
            sliding_window_size: self.window_size,
            min_support: self.min_support,
            max_candidates_length: self.max_candidates_length,
            pattern_filters: self.pattern_filters,
            context_attributes: self.context_attributes,
            test_ratio: self.test_ratio,
            csv_report_path: self.csv_report_path,
            debug: self.debug,
        })
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error("unsupported --ja-version {0}; expected 3 or 4")]
    InvalidJaVersion(u8),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("failed to write report to {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("failed to serialize debug statistics: {source}")]
    Debug {
        #[source]
        source: serde_json::Error,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let dataset_path = cli.dataset_path.clone();
    let config = cli.into_config()?;
    config.validate()?;

    let file = File::open(&dataset_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CliError::Ingest(IngestError::FileNotFound(dataset_path.clone()))
        } else {
            CliError::Ingest(IngestError::Io(e))
        }
    })?;

    let record_store = RecordStore::ingest(file, &config)?;
    info!(
        train = record_store.train.len(),
        test = record_store.test.len(),
        "ingested dataset"
    );

    let index = FingerprintIndex::build(&record_store.train);
    let miner = PatternMiner::new(&config);
    let pattern_store = miner.build_store(&record_store);
    info!(applications = pattern_store.len(), "mined pattern store");

    let identifier = ContextIdentifier::new(&config, &index, &pattern_store);
    let stats = identifier.identify(&record_store.test);

    println!("Identification summary ({} rows)", stats.total);
    println!(
        "  ja:       accuracy={:.4} error_rate={:.4} empty_candidates={}",
        stats.ja.overall_accuracy(),
        stats.ja.error_rate(),
        stats.ja.empty_candidates
    );
    println!(
        "  ja_comb:  accuracy={:.4} error_rate={:.4} empty_candidates={}",
        stats.ja_comb.overall_accuracy(),
        stats.ja_comb.error_rate(),
        stats.ja_comb.empty_candidates
    );
    println!(
        "  fingerprint evidence absent: ja={} comb={}",
        stats.empty_ja, stats.empty_comb
    );

    if config.debug {
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|source| CliError::Debug { source })?;
        println!("{json}");
    }

    if let Some(path) = &config.csv_report_path {
        let rows = vec![
            ReportRow::from_stats(false, &config, &stats.ja),
            ReportRow::from_stats(true, &config, &stats.ja_comb),
        ];
        report::append_report(path, &rows).map_err(|source| CliError::Report {
            path: path.clone(),
            source,
        })?;
        info!(path = %path, "appended report rows");
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
