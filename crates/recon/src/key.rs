//! Composite primary keys and the key index built over a record collection.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Serialize, Serializer};

use crate::error::{ReconError, Result};
use crate::record::{FieldName, Record};
use crate::value::NULL_SENTINEL;

/// Separator used when a composite key is rendered as a single string.
pub const KEY_DELIMITER: &str = "||";

// ---------------------------------------------------------------------------
// Key spec
// ---------------------------------------------------------------------------

/// Ordered list of primary-key field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    fields: Vec<FieldName>,
}

impl KeySpec {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields: Vec<FieldName> = Vec::new();
        for name in names {
            let field = FieldName::new(name.as_ref());
            if field.as_str().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "primary key field name is empty".into(),
                ));
            }
            if fields.contains(&field) {
                return Err(ReconError::ConfigValidation(format!(
                    "primary key field '{field}' listed twice"
                )));
            }
            fields.push(field);
        }
        if fields.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one primary key field is required".into(),
            ));
        }
        Ok(KeySpec { fields })
    }

    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_key_field(&self, name: &FieldName) -> bool {
        self.fields.contains(name)
    }

    /// Build the composite key for `record`. A missing or null key field
    /// resolves to [`NULL_SENTINEL`], so this never fails.
    pub fn key_for(&self, record: &Record) -> CompositeKey {
        let parts = self
            .fields
            .iter()
            .map(|f| match record.get(f) {
                Some(v) if !v.is_null() => v.key_repr(),
                _ => NULL_SENTINEL.to_string(),
            })
            .collect();
        CompositeKey { parts }
    }
}

// ---------------------------------------------------------------------------
// Composite key
// ---------------------------------------------------------------------------

/// Key components in primary-key order.
///
/// Equality and hashing are on the component list, so a component that
/// itself contains [`KEY_DELIMITER`] cannot collide with a different split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    parts: Vec<String>,
}

impl CompositeKey {
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CompositeKey {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Length-prefixed rendering (`<len>:<part>` per component). Unambiguous
    /// for any component content.
    pub fn encoded(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            out.push_str(&part.len().to_string());
            out.push(':');
            out.push_str(part);
        }
        out
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(KEY_DELIMITER))
    }
}

impl Serialize for CompositeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Records indexed by composite key, in first-seen key order.
///
/// Collision policy is last-write-wins: a later record with an existing key
/// replaces the earlier one in its slot. Each replacement is counted in
/// `duplicates_collapsed`.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    entries: Vec<(CompositeKey, Record)>,
    positions: HashMap<CompositeKey, usize>,
    duplicates_collapsed: usize,
}

impl KeyIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates_collapsed(&self) -> usize {
        self.duplicates_collapsed
    }

    pub fn position(&self, key: &CompositeKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&Record> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &Record)> {
        self.entries.iter().map(|(k, r)| (k, r))
    }

    pub fn into_entries(self) -> Vec<(CompositeKey, Record)> {
        self.entries
    }

    /// Move the record out of slot `i`, leaving an empty record in its place.
    /// The slot keeps its key, so `position` still resolves to it.
    pub(crate) fn take_at(&mut self, i: usize) -> Record {
        std::mem::take(&mut self.entries[i].1)
    }

    fn insert(&mut self, key: CompositeKey, record: Record) {
        match self.positions.get(&key) {
            Some(&i) => {
                debug!("duplicate key {key}: later record replaces earlier one");
                self.entries[i].1 = record;
                self.duplicates_collapsed += 1;
            }
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, record));
            }
        }
    }
}

/// Index `records` by their composite key under `spec` (last-write-wins).
pub fn build_index<I>(records: I, spec: &KeySpec) -> KeyIndex
where
    I: IntoIterator<Item = Record>,
{
    let mut index = KeyIndex::default();
    for record in records {
        let key = spec.key_for(&record);
        index.insert(key, record);
    }
    index
}
