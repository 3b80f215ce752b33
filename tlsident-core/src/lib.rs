//! Fingerprint- and context-based TLS client application identification.
//!
//! A dataset of captured TLS handshakes is ingested and split per capture
//! trace into training and test rows. Training rows build a
//! [`fingerprint::FingerprintIndex`] (exact hash lookups) and, per
//! application, a [`mining::PatternStore`] of frequent context itemsets
//! mined with Apriori. Identification slides a window over a deterministically
//! reordered test sequence and scores each focal row's neighbourhood against
//! progressively broader pattern sets — fingerprint-matched first, falling
//! back to context alone when fingerprint evidence is absent or exhausted —
//! accumulating rank-indexed statistics in both a fingerprint-only (`ja`) and
//! a combined (`ja_comb`) mode.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod identify;
pub mod mining;
pub mod record;
pub mod scoring;
pub mod stats;

pub use config::{Config, FingerprintKind, FilterOperator, PatternFilter};
pub use error::{ConfigError, IngestError};
pub use fingerprint::{FingerprintField, FingerprintIndex};
pub use identify::ContextIdentifier;
pub use mining::{Itemset, PatternMiner, PatternStore, PatternTable};
pub use record::{Record, RecordStore};
pub use stats::{ModeStatistics, StatisticsAggregator};
