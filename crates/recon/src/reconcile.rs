//! The matching engine.
//!
//! Two strategies classify records into matched / source-only /
//! reference-only. They differ in how the reference side is read and in two
//! documented behaviors:
//!
//! - `Full` keeps every source record, including repeated keys. A repeated
//!   source key after the first match finds its reference row already
//!   consumed and lands in `source_only`.
//! - `Batch` indexes the source first, so repeated source keys collapse
//!   (last-write-wins) before the fetch. It only asks for keys the source
//!   has, so `reference_only` is always empty.

use log::{debug, info, warn};

use crate::diff::{diff, ComparePolicy};
use crate::error::{ReconError, Result};
use crate::key::{build_index, CompositeKey, KeySpec};
use crate::model::{KeyedRecord, MatchResult, MatchedPair, RunStats, Strategy};
use crate::predicate::KeyPredicate;
use crate::record::Record;
use crate::source::ReferenceSource;

/// Reconciliation settings shared by both strategies.
#[derive(Debug, Clone)]
pub struct Reconciler {
    keys: KeySpec,
    policy: ComparePolicy,
    max_keys_per_fetch: Option<usize>,
}

impl Reconciler {
    pub fn new(keys: KeySpec) -> Self {
        Reconciler {
            keys,
            policy: ComparePolicy::default(),
            max_keys_per_fetch: None,
        }
    }

    pub fn with_policy(mut self, policy: ComparePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Split batch fetches into chunks of at most `n` keys. Unset means a
    /// single fetch for the whole key set.
    pub fn with_max_keys_per_fetch(mut self, n: Option<usize>) -> Self {
        self.max_keys_per_fetch = n.filter(|n| *n > 0);
        self
    }

    pub fn keys(&self) -> &KeySpec {
        &self.keys
    }

    pub fn run<R: ReferenceSource>(
        &self,
        source: Vec<Record>,
        reference: &R,
        strategy: Strategy,
    ) -> Result<MatchResult> {
        let result = match strategy {
            Strategy::Full => self.full(source, reference)?,
            Strategy::Batch => self.batch(source, reference)?,
        };
        let s = result.summary();
        info!(
            "{strategy} reconciliation against '{}': \
             matched={} identical={} source_only={} reference_only={}",
            reference.name(),
            s.matched,
            s.identical,
            s.source_only,
            s.reference_only
        );
        Ok(result)
    }

    /// Full-scan: one read of the whole reference set.
    pub fn full<R: ReferenceSource>(
        &self,
        source: Vec<Record>,
        reference: &R,
    ) -> Result<MatchResult> {
        let fetched = reference
            .fetch_all()
            .map_err(|e| ReconError::lookup(reference.name(), e))?;
        let reference_rows = fetched.len();
        let mut index = build_index(fetched, &self.keys);
        debug!(
            "full scan: {} source rows, {reference_rows} reference rows, \
             {} distinct reference keys",
            source.len(),
            index.len()
        );

        let mut consumed = vec![false; index.len()];
        let mut result = MatchResult {
            stats: RunStats {
                source_rows: source.len(),
                reference_rows,
                source_duplicates: 0,
                reference_duplicates: index.duplicates_collapsed(),
            },
            ..Default::default()
        };

        for record in source {
            let key = self.keys.key_for(&record);
            match index.position(&key) {
                Some(i) if !consumed[i] => {
                    consumed[i] = true;
                    let reference_record = index.take_at(i);
                    result.matched.push(self.pair(key, record, reference_record));
                }
                _ => result.source_only.push(KeyedRecord { key, record }),
            }
        }

        for ((key, record), used) in index.into_entries().into_iter().zip(consumed) {
            if !used {
                result.reference_only.push(KeyedRecord { key, record });
            }
        }
        Ok(result)
    }

    /// Targeted-batch: fetch only the keys present in the source.
    pub fn batch<R: ReferenceSource>(
        &self,
        source: Vec<Record>,
        reference: &R,
    ) -> Result<MatchResult> {
        let source_rows = source.len();
        if source.is_empty() {
            return Ok(MatchResult::default());
        }

        let source_index = build_index(source, &self.keys);
        let keys: Vec<CompositeKey> = source_index.keys().cloned().collect();
        let chunk = self.max_keys_per_fetch.unwrap_or(keys.len()).max(1);

        let mut fetched = Vec::new();
        for part in keys.chunks(chunk) {
            let predicate = KeyPredicate::for_keys(self.keys.fields(), part);
            let rows = reference
                .fetch_by_keys(self.keys.fields(), part, &predicate)
                .map_err(|e| ReconError::lookup(reference.name(), e))?;
            fetched.extend(rows);
        }
        let reference_rows = fetched.len();
        let mut reference_index = build_index(fetched, &self.keys);
        debug!(
            "batch: {} distinct source keys in {} fetch(es), \
             {reference_rows} reference rows returned",
            keys.len(),
            keys.len().div_ceil(chunk)
        );

        let unrequested = reference_index
            .keys()
            .filter(|k| !source_index.contains_key(k))
            .count();
        if unrequested > 0 {
            warn!(
                "'{}' returned {unrequested} record(s) for keys that were not requested; \
                 ignoring them",
                reference.name()
            );
        }

        let mut result = MatchResult {
            stats: RunStats {
                source_rows,
                reference_rows,
                source_duplicates: source_index.duplicates_collapsed(),
                reference_duplicates: reference_index.duplicates_collapsed(),
            },
            ..Default::default()
        };

        for (key, record) in source_index.into_entries() {
            match reference_index.position(&key) {
                Some(i) => {
                    let reference_record = reference_index.take_at(i);
                    result.matched.push(self.pair(key, record, reference_record));
                }
                None => result.source_only.push(KeyedRecord { key, record }),
            }
        }
        Ok(result)
    }

    fn pair(&self, key: CompositeKey, source: Record, reference: Record) -> MatchedPair {
        let differences = diff(&source, &reference, &self.keys, &self.policy);
        MatchedPair {
            key,
            identical: differences.is_empty(),
            differences,
            source,
            reference,
        }
    }
}

/// Full-scan reconciliation with the default compare policy.
pub fn reconcile_full<R: ReferenceSource>(
    source: Vec<Record>,
    reference: &R,
    keys: &KeySpec,
) -> Result<MatchResult> {
    Reconciler::new(keys.clone()).full(source, reference)
}

/// Targeted-batch reconciliation with the default compare policy.
pub fn reconcile_batch<R: ReferenceSource>(
    source: Vec<Record>,
    reference: &R,
    keys: &KeySpec,
) -> Result<MatchResult> {
    Reconciler::new(keys.clone()).batch(source, reference)
}

/// Reconcile `source` against `reference` by `primary_keys` using `strategy`.
pub fn reconcile<R, S>(
    source: Vec<Record>,
    reference: &R,
    primary_keys: &[S],
    strategy: Strategy,
) -> Result<MatchResult>
where
    R: ReferenceSource,
    S: AsRef<str>,
{
    let keys = KeySpec::new(primary_keys)?;
    Reconciler::new(keys).run(source, reference, strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::record::FieldName;
    use crate::source::MemoryReference;
    use crate::value::FieldValue;

    fn rec(id: i64, name: &str) -> Record {
        Record::new().with("id", id).with("name", name)
    }

    fn ids(records: &[KeyedRecord]) -> Vec<String> {
        records.iter().map(|r| r.key.to_string()).collect()
    }

    #[test]
    fn scenario_changed_name() {
        let reference = MemoryReference::new("ref", vec![rec(1, "B")]);
        for strategy in [Strategy::Full, Strategy::Batch] {
            let result = reconcile(vec![rec(1, "A")], &reference, &["id"], strategy).unwrap();
            assert_eq!(result.matched.len(), 1);
            let m = &result.matched[0];
            assert!(!m.identical);
            assert_eq!(m.differences.len(), 1);
            let d = &m.differences[&FieldName::new("name")];
            assert_eq!(d.source, FieldValue::Text("A".into()));
            assert_eq!(d.reference, FieldValue::Text("B".into()));
        }
    }

    #[test]
    fn scenario_source_only() {
        let reference = MemoryReference::new("ref", vec![]);
        for strategy in [Strategy::Full, Strategy::Batch] {
            let result = reconcile(vec![rec(2, "X")], &reference, &["id"], strategy).unwrap();
            assert!(result.matched.is_empty());
            assert!(result.reference_only.is_empty());
            assert_eq!(result.source_only.len(), 1);
            assert_eq!(result.source_only[0].record, rec(2, "X"));
        }
    }

    #[test]
    fn scenario_full_scan_empty_source_reports_reference_only() {
        let reference = MemoryReference::new("ref", vec![rec(3, "Z")]);
        let result = reconcile(Vec::new(), &reference, &["id"], Strategy::Full).unwrap();
        assert!(result.matched.is_empty());
        assert!(result.source_only.is_empty());
        assert_eq!(result.reference_only.len(), 1);
        assert_eq!(result.reference_only[0].record, rec(3, "Z"));
    }

    #[test]
    fn batch_empty_source_is_a_noop() {
        let reference = MemoryReference::new("ref", vec![rec(3, "Z")]);
        let result = reconcile(Vec::new(), &reference, &["id"], Strategy::Batch).unwrap();
        assert!(result.is_empty());
        assert_eq!(reference.key_fetches(), 0);
    }

    #[test]
    fn batch_never_reports_reference_only() {
        let reference = MemoryReference::new("ref", vec![rec(1, "A"), rec(9, "extra")]);
        let result = reconcile(vec![rec(1, "A")], &reference, &["id"], Strategy::Batch).unwrap();
        assert!(result.reference_only.is_empty());
        assert_eq!(result.matched.len(), 1);
        assert!(result.matched[0].identical);
        assert_eq!(reference.key_fetches(), 1);
        assert_eq!(reference.full_fetches(), 0);
    }

    #[test]
    fn full_scan_reads_reference_once() {
        let reference = MemoryReference::new("ref", vec![rec(1, "A"), rec(2, "B")]);
        let keys = KeySpec::new(["id"]).unwrap();
        let result = reconcile_full(vec![rec(1, "A"), rec(3, "C")], &reference, &keys).unwrap();
        assert_eq!(reference.full_fetches(), 1);
        assert_eq!(ids(&result.source_only), vec!["3"]);
        assert_eq!(ids(&result.reference_only), vec!["2"]);
    }

    #[test]
    fn disjoint_keys_partition_inputs() {
        let reference = MemoryReference::new("ref", vec![rec(10, "r"), rec(11, "s")]);
        let source = vec![rec(1, "a"), rec(2, "b")];
        let result = reconcile(source, &reference, &["id"], Strategy::Full).unwrap();
        assert!(result.matched.is_empty());
        assert_eq!(ids(&result.source_only), vec!["1", "2"]);
        assert_eq!(ids(&result.reference_only), vec!["10", "11"]);
    }

    #[test]
    fn duplicate_source_keys_differ_between_strategies() {
        let reference = MemoryReference::new("ref", vec![rec(1, "third")]);
        let source = vec![rec(1, "first"), rec(1, "second"), rec(1, "third")];

        // batch collapses to the last record before fetching
        let batch = reconcile(source.clone(), &reference, &["id"], Strategy::Batch).unwrap();
        assert_eq!(batch.matched.len(), 1);
        assert_eq!(batch.matched[0].source, rec(1, "third"));
        assert!(batch.matched[0].identical);
        assert_eq!(batch.summary().source_duplicates, 2);

        // full scan keeps every source record; the reference row is consumed once
        let full = reconcile(source, &reference, &["id"], Strategy::Full).unwrap();
        assert_eq!(full.matched.len(), 1);
        assert_eq!(full.matched[0].source, rec(1, "first"));
        assert_eq!(full.source_only.len(), 2);
        let keys: std::collections::HashSet<String> =
            full.source_only.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn duplicate_reference_keys_keep_last() {
        let reference = MemoryReference::new("ref", vec![rec(1, "old"), rec(1, "new")]);
        let result = reconcile(vec![rec(1, "new")], &reference, &["id"], Strategy::Full).unwrap();
        assert!(result.matched[0].identical);
        assert_eq!(result.summary().reference_duplicates, 1);
    }

    #[test]
    fn composite_keys_with_chunked_fetches() {
        let row = |id: i64, region: &str, v: &str| {
            Record::new().with("id", id).with("region", region).with("v", v)
        };
        let reference = MemoryReference::new(
            "ref",
            vec![row(1, "eu", "a"), row(1, "us", "b"), row(2, "eu", "c")],
        );
        let source = vec![row(1, "eu", "a"), row(1, "us", "x"), row(2, "us", "c")];
        let reconciler = Reconciler::new(KeySpec::new(["ID", "Region"]).unwrap())
            .with_max_keys_per_fetch(Some(2));
        let result = reconciler.run(source, &reference, Strategy::Batch).unwrap();
        assert_eq!(reference.key_fetches(), 2);
        assert_eq!(result.matched.len(), 2);
        assert_eq!(result.differing().count(), 1);
        assert_eq!(ids(&result.source_only), vec!["2||us"]);
    }

    #[test]
    fn policy_excludes_key_fields() {
        let reference =
            MemoryReference::new("ref", vec![Record::new().with("id", 1i64).with("name", "A")]);
        let source = vec![Record::new().with("ID", "1").with("name", "A")];
        let reconciler = Reconciler::new(KeySpec::new(["id"]).unwrap()).with_policy(ComparePolicy {
            exclude_key_fields: true,
            ignore_fields: Vec::new(),
        });
        let result = reconciler.full(source, &reference).unwrap();
        assert!(result.is_reconciled());
    }

    struct Failing;

    impl ReferenceSource for Failing {
        fn name(&self) -> &str {
            "warehouse"
        }

        fn fetch_all(&self) -> std::result::Result<Vec<Record>, FetchError> {
            Err("connection refused".into())
        }

        fn fetch_by_keys(
            &self,
            _: &[FieldName],
            _: &[CompositeKey],
            _: &KeyPredicate,
        ) -> std::result::Result<Vec<Record>, FetchError> {
            Err("token expired".into())
        }
    }

    #[test]
    fn lookup_failure_is_propagated() {
        let err = reconcile(vec![rec(1, "A")], &Failing, &["id"], Strategy::Full).unwrap_err();
        assert_eq!(err.collaborator(), Some("warehouse"));
        assert!(err.to_string().contains("connection refused"));

        let err = reconcile(vec![rec(1, "A")], &Failing, &["id"], Strategy::Batch).unwrap_err();
        assert!(err.to_string().contains("token expired"));
    }

    #[test]
    fn empty_primary_key_list_is_rejected() {
        let reference = MemoryReference::new("ref", vec![]);
        let empty: [&str; 0] = [];
        assert!(matches!(
            reconcile(vec![rec(1, "A")], &reference, &empty, Strategy::Full),
            Err(ReconError::ConfigValidation(_))
        ));
    }
}
