//! `keyrecon`: primary-key record reconciliation engine.
//!
//! Pure engine crate: receives a source record collection and a reference
//! capability, returns matched / source-only / reference-only buckets with
//! field-level differences. File loading and sinks live alongside as
//! collaborators; the engine itself never touches IO beyond the reference
//! fetch.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod key;
pub mod model;
pub mod predicate;
pub mod reconcile;
pub mod record;
pub mod sink;
pub mod source;
pub mod sqlite;
pub mod value;

pub use config::ReconConfig;
pub use diff::{diff, fields_match, ComparePolicy, Difference, FieldDiff};
pub use error::{FetchError, ReconError, Result};
pub use key::{build_index, CompositeKey, KeyIndex, KeySpec};
pub use model::{MatchResult, MatchedPair, ReconReport, ReconSummary, Strategy};
pub use reconcile::{reconcile, reconcile_batch, reconcile_full, Reconciler};
pub use record::{FieldName, Record};
pub use source::{MemoryReference, ReferenceSource};
pub use value::FieldValue;
