//! SQLite-backed reference store.

use std::path::Path;

use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::error::{FetchError, ReconError, Result};
use crate::key::CompositeKey;
use crate::predicate::{quote_ident, KeyPredicate};
use crate::record::{FieldName, Record};
use crate::source::ReferenceSource;
use crate::value::FieldValue;

/// Bind variables per statement; 999 is the lowest limit SQLite builds ship with.
const MAX_BINDS_PER_STATEMENT: usize = 999;
/// Keys per statement. Each composite key adds one `OR` level and SQLite caps
/// expression depth at 1000.
const MAX_KEYS_PER_STATEMENT: usize = 500;

/// Reference rows read from one SQLite table.
///
/// `fetch_by_keys` splits large key sets over several statements and
/// concatenates the rows, so callers still see a single fetch. BLOB key
/// columns are not supported by `fetch_by_keys`: key components are hex text
/// and never compare equal to a blob. Use the full-scan strategy for those.
pub struct SqliteReference {
    conn: Connection,
    table: String,
    label: String,
}

impl SqliteReference {
    /// Open `path` read-only and read from `table`.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        check_table_name(table)?;
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| ReconError::lookup(format!("sqlite:{}", path.display()), e))?;
        Ok(Self::with_connection(conn, table, format!("sqlite:{}/{table}", path.display())))
    }

    /// Wrap an existing connection (in-memory databases, tests).
    pub fn with_connection(conn: Connection, table: &str, label: impl Into<String>) -> Self {
        SqliteReference {
            conn,
            table: table.to_string(),
            label: label.into(),
        }
    }

    fn query(
        &self,
        where_clause: Option<(String, Vec<String>)>,
    ) -> std::result::Result<Vec<Record>, FetchError> {
        let mut sql = format!("SELECT * FROM {}", quote_table(&self.table));
        let mut params = Vec::new();
        if let Some((clause, bind)) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params = bind;
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<FieldName> =
            stmt.column_names().into_iter().map(FieldName::new).collect();

        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let mut record = Record::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                record.insert(name.clone(), to_field_value(row.get_ref(i)?));
            }
            Ok(record)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

impl ReferenceSource for SqliteReference {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch_all(&self) -> std::result::Result<Vec<Record>, FetchError> {
        self.query(None)
    }

    fn fetch_by_keys(
        &self,
        key_fields: &[FieldName],
        keys: &[CompositeKey],
        predicate: &KeyPredicate,
    ) -> std::result::Result<Vec<Record>, FetchError> {
        if *predicate == KeyPredicate::Nothing {
            return Ok(Vec::new());
        }
        let per_statement = keys_per_statement(key_fields.len());
        if predicate.key_count() <= per_statement {
            return self.query(Some(predicate.to_sql()));
        }

        debug!(
            "{}: {} keys over {} statements",
            self.label,
            keys.len(),
            keys.len().div_ceil(per_statement)
        );
        let mut records = Vec::new();
        for part in keys.chunks(per_statement) {
            let chunk = KeyPredicate::for_keys(key_fields, part);
            records.extend(self.query(Some(chunk.to_sql()))?);
        }
        Ok(records)
    }
}

fn keys_per_statement(key_fields: usize) -> usize {
    (MAX_BINDS_PER_STATEMENT / key_fields.max(1)).clamp(1, MAX_KEYS_PER_STATEMENT)
}

fn quote_table(table: &str) -> String {
    table.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

fn to_field_value(v: ValueRef<'_>) -> FieldValue {
    match v {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Int(i),
        ValueRef::Real(f) => FieldValue::Float(f),
        ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => FieldValue::Bytes(b.to_vec()),
    }
}

/// Table names are interpolated into SQL, so only plain identifiers
/// (optionally schema-qualified) are accepted.
pub fn check_table_name(table: &str) -> Result<()> {
    let ok = !table.is_empty()
        && table.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if ok {
        Ok(())
    } else {
        Err(ReconError::ConfigValidation(format!("invalid table name '{table}'")))
    }
}
