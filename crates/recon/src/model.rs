use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::Difference;
use crate::key::CompositeKey;
use crate::record::Record;

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One read of the whole reference set; finds reference-only rows.
    #[default]
    Full,
    /// One fetch bounded to the source keys; never finds reference-only rows.
    Batch,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

// ---------------------------------------------------------------------------
// Result buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MatchedPair {
    pub key: CompositeKey,
    pub source: Record,
    pub reference: Record,
    /// True iff `differences` is empty.
    pub identical: bool,
    pub differences: Difference,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyedRecord {
    pub key: CompositeKey,
    pub record: Record,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchResult {
    pub matched: Vec<MatchedPair>,
    pub source_only: Vec<KeyedRecord>,
    pub reference_only: Vec<KeyedRecord>,
    #[serde(skip)]
    pub(crate) stats: RunStats,
}

/// Counters gathered while indexing; reported through `summary`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RunStats {
    pub source_rows: usize,
    pub reference_rows: usize,
    pub source_duplicates: usize,
    pub reference_duplicates: usize,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.source_only.is_empty() && self.reference_only.is_empty()
    }

    /// Matched pairs whose fields differ.
    pub fn differing(&self) -> impl Iterator<Item = &MatchedPair> {
        self.matched.iter().filter(|m| !m.identical)
    }

    /// True when every source row matched an identical reference row and no
    /// one-sided rows were found.
    pub fn is_reconciled(&self) -> bool {
        self.source_only.is_empty()
            && self.reference_only.is_empty()
            && self.matched.iter().all(|m| m.identical)
    }

    pub fn summary(&self) -> ReconSummary {
        let identical = self.matched.iter().filter(|m| m.identical).count();
        ReconSummary {
            source_rows: self.stats.source_rows,
            reference_rows: self.stats.reference_rows,
            matched: self.matched.len(),
            identical,
            differing: self.matched.len() - identical,
            source_only: self.source_only.len(),
            reference_only: self.reference_only.len(),
            source_duplicates: self.stats.source_duplicates,
            reference_duplicates: self.stats.reference_duplicates,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + report envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub source_rows: usize,
    pub reference_rows: usize,
    pub matched: usize,
    pub identical: usize,
    pub differing: usize,
    pub source_only: usize,
    pub reference_only: usize,
    /// Source rows dropped by last-write-wins indexing.
    pub source_duplicates: usize,
    /// Reference rows dropped by last-write-wins indexing.
    pub reference_duplicates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub strategy: Strategy,
    pub primary_keys: Vec<String>,
    pub engine_version: String,
    pub run_at: String,
}

impl ReconMeta {
    pub fn new(
        config_name: impl Into<String>,
        strategy: Strategy,
        primary_keys: Vec<String>,
    ) -> Self {
        ReconMeta {
            config_name: config_name.into(),
            strategy,
            primary_keys,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub result: MatchResult,
}

impl ReconReport {
    pub fn new(meta: ReconMeta, result: MatchResult) -> Self {
        ReconReport {
            summary: result.summary(),
            meta,
            result,
        }
    }
}
