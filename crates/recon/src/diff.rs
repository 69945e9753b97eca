//! Field-level equality and difference computation for a matched pair.
//!
//! Comparison walks the source record's fields only. Fields that exist solely
//! on the reference record are never compared; a source field missing from
//! the reference compares against `Null`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::KeySpec;
use crate::record::{FieldName, Record};
use crate::value::FieldValue;

/// Which fields take part in equality. Default: every source field,
/// primary keys included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ComparePolicy {
    #[serde(default)]
    pub exclude_key_fields: bool,
    #[serde(default)]
    pub ignore_fields: Vec<String>,
}

impl ComparePolicy {
    fn skips(&self, field: &FieldName, keys: &KeySpec) -> bool {
        (self.exclude_key_fields && keys.is_key_field(field))
            || self.ignore_fields.iter().any(|f| FieldName::new(f) == *field)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub source: FieldValue,
    pub reference: FieldValue,
}

/// Differing fields keyed by normalized field name.
pub type Difference = BTreeMap<FieldName, FieldDiff>;

/// Compare `source` against `reference` field by field.
pub fn diff(
    source: &Record,
    reference: &Record,
    keys: &KeySpec,
    policy: &ComparePolicy,
) -> Difference {
    let mut out = Difference::new();
    for (name, source_value) in source.iter() {
        if policy.skips(name, keys) {
            continue;
        }
        let reference_value = reference.get(name).unwrap_or(&FieldValue::Null);
        if !source_value.loosely_eq(reference_value) {
            out.insert(
                name.clone(),
                FieldDiff {
                    source: source_value.clone(),
                    reference: reference_value.clone(),
                },
            );
        }
    }
    out
}

/// True iff `diff` would be empty.
pub fn fields_match(
    source: &Record,
    reference: &Record,
    keys: &KeySpec,
    policy: &ComparePolicy,
) -> bool {
    source.iter().all(|(name, source_value)| {
        policy.skips(name, keys)
            || source_value.loosely_eq(reference.get(name).unwrap_or(&FieldValue::Null))
    })
}
