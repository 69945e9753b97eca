// Property-based tests for key construction and reconciliation buckets.
// CI: 128 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::{BTreeMap, HashSet};

use keyrecon::model::Strategy as ReconStrategy;
use keyrecon::{reconcile, KeySpec, MemoryReference, Record};
use proptest::prelude::*;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Arbitrary cell: short text, sometimes containing the key delimiter.
fn arb_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"[a-z0-9]{0,6}",
        1 => r"[a-z]{0,3}\|\|[a-z]{0,3}",
    ]
}

fn row(id: u32, region: &str, payload: &str) -> Record {
    Record::new()
        .with("id", i64::from(id))
        .with("region", region)
        .with("payload", payload)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    /// Field insertion order never changes the computed key.
    #[test]
    fn key_is_independent_of_field_order(
        fields in prop::collection::btree_map(r"[a-z]{1,5}", arb_cell(), 2..8),
        shuffle_seed in any::<u64>(),
    ) {
        let names: Vec<&String> = fields.keys().collect();
        let spec = KeySpec::new(names.iter().take(2).map(|s| s.as_str())).unwrap();

        let forward: Record = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let mut entries: Vec<(&String, &String)> = fields.iter().collect();
        let len = entries.len();
        entries.rotate_left((shuffle_seed as usize) % len);
        entries.reverse();
        let reordered: Record =
            entries.into_iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        prop_assert_eq!(spec.key_for(&forward), spec.key_for(&reordered));
    }

    /// Disjoint key sets: nothing matches and the two one-sided buckets
    /// partition the inputs exactly (full scan).
    #[test]
    fn disjoint_inputs_partition(
        source_ids in prop::collection::btree_set(0u32..500, 0..30),
        reference_ids in prop::collection::btree_set(500u32..1000, 0..30),
    ) {
        let source: Vec<Record> = source_ids.iter().map(|id| row(*id, "eu", "s")).collect();
        let reference = MemoryReference::new(
            "ref",
            reference_ids.iter().map(|id| row(*id, "eu", "r")).collect(),
        );
        let result = reconcile(source, &reference, &["id", "region"], ReconStrategy::Full).unwrap();

        prop_assert!(result.matched.is_empty());
        prop_assert_eq!(result.source_only.len(), source_ids.len());
        prop_assert_eq!(result.reference_only.len(), reference_ids.len());
    }

    /// No composite key appears in more than one bucket, and batch never
    /// reports reference-only rows.
    #[test]
    fn buckets_are_disjoint(
        source_rows in prop::collection::vec((0u32..40, arb_cell()), 0..40),
        reference_rows in prop::collection::vec((0u32..40, arb_cell()), 0..40),
    ) {
        let source: Vec<Record> = source_rows.iter().map(|(id, p)| row(*id, "eu", p)).collect();
        let reference = MemoryReference::new(
            "ref",
            reference_rows.iter().map(|(id, p)| row(*id, "eu", p)).collect(),
        );

        let batch = reconcile(source.clone(), &reference, &["id"], ReconStrategy::Batch).unwrap();
        prop_assert!(batch.reference_only.is_empty());
        let matched: HashSet<String> = batch.matched.iter().map(|m| m.key.to_string()).collect();
        let only: HashSet<String> = batch.source_only.iter().map(|r| r.key.to_string()).collect();
        prop_assert!(matched.is_disjoint(&only));

        let full = reconcile(source, &reference, &["id"], ReconStrategy::Full).unwrap();
        let full_matched: HashSet<String> =
            full.matched.iter().map(|m| m.key.to_string()).collect();
        let full_ref_only: HashSet<String> =
            full.reference_only.iter().map(|r| r.key.to_string()).collect();
        prop_assert!(full_matched.is_disjoint(&full_ref_only));
        // both strategies agree on which keys matched
        prop_assert_eq!(&matched, &full_matched);
        prop_assert_eq!(full.matched.len() + full.source_only.len(), source_rows.len());
    }

    /// Identical records always match with an empty diff; `identical` tracks
    /// the diff exactly.
    #[test]
    fn identical_flag_tracks_diff(
        rows in prop::collection::btree_map(0u32..100, (arb_cell(), arb_cell()), 1..20),
        flip in any::<bool>(),
    ) {
        let source: Vec<Record> = rows.iter().map(|(id, (a, _))| row(*id, "eu", a)).collect();
        let reference_rows: Vec<Record> = rows
            .iter()
            .map(|(id, (a, b))| row(*id, "eu", if flip { b } else { a }))
            .collect();
        let reference = MemoryReference::new("ref", reference_rows);
        let result = reconcile(source, &reference, &["id"], ReconStrategy::Full).unwrap();

        let expected: BTreeMap<String, bool> = rows
            .iter()
            .map(|(id, (a, b))| (id.to_string(), !flip || a == b))
            .collect();
        for m in &result.matched {
            prop_assert_eq!(m.identical, m.differences.is_empty());
            prop_assert_eq!(Some(&m.identical), expected.get(&m.key.to_string()));
            prop_assert!(m.differences.len() <= 1);
        }
        prop_assert_eq!(result.matched.len(), rows.len());
    }
}
