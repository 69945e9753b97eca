//! Record sources: the reference capability the engine consumes and the CSV
//! loader used for source (and flat-file reference) ingestion.

use std::cell::Cell;
use std::io::Read;
use std::path::Path;

use crate::error::{FetchError, Result};
use crate::key::CompositeKey;
use crate::predicate::KeyPredicate;
use crate::record::{FieldName, Record};
use crate::value::FieldValue;

// ---------------------------------------------------------------------------
// Reference capability
// ---------------------------------------------------------------------------

/// The reference side of a reconciliation.
///
/// Implementations own connection handling, timeouts and retries. Errors are
/// returned as-is and wrapped by the engine together with `name()`.
pub trait ReferenceSource {
    /// Collaborator name used in lookup-failure errors.
    fn name(&self) -> &str;

    /// Every reference record.
    fn fetch_all(&self) -> std::result::Result<Vec<Record>, FetchError>;

    /// Exactly the reference records whose key is in `keys`. `predicate` is
    /// the same constraint pre-built for stores that speak predicates.
    fn fetch_by_keys(
        &self,
        key_fields: &[FieldName],
        keys: &[CompositeKey],
        predicate: &KeyPredicate,
    ) -> std::result::Result<Vec<Record>, FetchError>;
}

impl<T: ReferenceSource + ?Sized> ReferenceSource for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_all(&self) -> std::result::Result<Vec<Record>, FetchError> {
        (**self).fetch_all()
    }

    fn fetch_by_keys(
        &self,
        key_fields: &[FieldName],
        keys: &[CompositeKey],
        predicate: &KeyPredicate,
    ) -> std::result::Result<Vec<Record>, FetchError> {
        (**self).fetch_by_keys(key_fields, keys, predicate)
    }
}

impl<T: ReferenceSource + ?Sized> ReferenceSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_all(&self) -> std::result::Result<Vec<Record>, FetchError> {
        (**self).fetch_all()
    }

    fn fetch_by_keys(
        &self,
        key_fields: &[FieldName],
        keys: &[CompositeKey],
        predicate: &KeyPredicate,
    ) -> std::result::Result<Vec<Record>, FetchError> {
        (**self).fetch_by_keys(key_fields, keys, predicate)
    }
}

/// Vector-backed reference. Counts calls so fetch patterns can be observed.
#[derive(Debug, Default)]
pub struct MemoryReference {
    name: String,
    records: Vec<Record>,
    full_fetches: Cell<usize>,
    key_fetches: Cell<usize>,
}

impl MemoryReference {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        MemoryReference {
            name: name.into(),
            records,
            ..Default::default()
        }
    }

    pub fn full_fetches(&self) -> usize {
        self.full_fetches.get()
    }

    pub fn key_fetches(&self) -> usize {
        self.key_fetches.get()
    }
}

impl ReferenceSource for MemoryReference {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_all(&self) -> std::result::Result<Vec<Record>, FetchError> {
        self.full_fetches.set(self.full_fetches.get() + 1);
        Ok(self.records.clone())
    }

    fn fetch_by_keys(
        &self,
        _key_fields: &[FieldName],
        _keys: &[CompositeKey],
        predicate: &KeyPredicate,
    ) -> std::result::Result<Vec<Record>, FetchError> {
        self.key_fetches.set(self.key_fetches.get() + 1);
        Ok(self
            .records
            .iter()
            .filter(|r| predicate.matches(r))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// CSV ingestion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Treat empty cells as `Null` rather than empty text.
    pub empty_as_null: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            empty_as_null: true,
        }
    }
}

/// Read CSV with a header row into records. Headers are normalized to lower
/// case; every value is ingested as text.
pub fn load_csv_records<R: Read>(reader: R, options: &CsvOptions) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .from_reader(reader);

    let headers: Vec<FieldName> = reader.headers()?.iter().map(FieldName::new).collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = Record::with_capacity(headers.len());
        for (name, cell) in headers.iter().zip(row.iter()) {
            let value = if cell.is_empty() && options.empty_as_null {
                FieldValue::Null
            } else {
                FieldValue::Text(cell.to_string())
            };
            record.insert(name.clone(), value);
        }
        records.push(record);
    }
    Ok(records)
}

pub fn load_csv_file(path: &Path, options: &CsvOptions) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path)?;
    load_csv_records(file, options)
}

/// Flat-file reference: loaded once, then served like `MemoryReference`.
pub fn csv_reference(path: &Path, options: &CsvOptions) -> Result<MemoryReference> {
    let records = load_csv_file(path, options)?;
    Ok(MemoryReference::new(path.display().to_string(), records))
}
