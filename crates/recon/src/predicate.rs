//! Fetch constraint for the targeted-batch strategy.
//!
//! A single key field becomes one membership test. Several key fields cannot
//! be expressed as one membership test, so each composite key becomes an
//! all-fields-equal conjunction and the conjunctions are disjoined.
//!
//! A component equal to [`NULL_SENTINEL`] stands for a null or missing field,
//! so the SQL rendering also accepts `IS NULL` for it.

use crate::key::CompositeKey;
use crate::record::{FieldName, Record};
use crate::value::{FieldValue, NULL_SENTINEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conjunction {
    pub terms: Vec<(FieldName, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPredicate {
    /// No keys requested; matches nothing.
    Nothing,
    In { field: FieldName, values: Vec<String> },
    AnyOf(Vec<Conjunction>),
}

impl KeyPredicate {
    pub fn for_keys<'a, I>(key_fields: &[FieldName], keys: I) -> Self
    where
        I: IntoIterator<Item = &'a CompositeKey>,
    {
        let keys: Vec<&CompositeKey> = keys.into_iter().collect();
        if keys.is_empty() || key_fields.is_empty() {
            return KeyPredicate::Nothing;
        }
        if let [field] = key_fields {
            return KeyPredicate::In {
                field: field.clone(),
                values: keys.iter().filter_map(|k| k.parts().first().cloned()).collect(),
            };
        }
        KeyPredicate::AnyOf(
            keys.iter()
                .map(|k| Conjunction {
                    terms: key_fields.iter().cloned().zip(k.parts().iter().cloned()).collect(),
                })
                .collect(),
        )
    }

    /// Evaluate against an in-memory record using canonical key renderings.
    pub fn matches(&self, record: &Record) -> bool {
        let component = |field: &FieldName| {
            record.get(field).unwrap_or(&FieldValue::Null).key_repr()
        };
        match self {
            KeyPredicate::Nothing => false,
            KeyPredicate::In { field, values } => {
                let v = component(field);
                values.iter().any(|x| *x == v)
            }
            KeyPredicate::AnyOf(conjunctions) => conjunctions
                .iter()
                .any(|c| c.terms.iter().all(|(f, x)| component(f) == *x)),
        }
    }

    /// Render a `WHERE` fragment with `?` placeholders and the bind values in
    /// placeholder order. Identifiers are double-quoted.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        match self {
            KeyPredicate::Nothing => ("1 = 0".to_string(), Vec::new()),
            KeyPredicate::In { field, values } => {
                let column = quote_ident(field.as_str());
                let placeholders = vec!["?"; values.len()].join(",");
                let membership = format!("{column} IN ({placeholders})");
                let sql = if values.iter().any(|v| v == NULL_SENTINEL) {
                    format!("({membership} OR {column} IS NULL)")
                } else {
                    membership
                };
                (sql, values.clone())
            }
            KeyPredicate::AnyOf(conjunctions) => {
                let mut params = Vec::new();
                let clauses: Vec<String> = conjunctions
                    .iter()
                    .map(|c| {
                        let terms: Vec<String> = c
                            .terms
                            .iter()
                            .map(|(f, v)| {
                                params.push(v.clone());
                                equals_sql(&quote_ident(f.as_str()), v)
                            })
                            .collect();
                        format!("({})", terms.join(" AND "))
                    })
                    .collect();
                (clauses.join(" OR "), params)
            }
        }
    }

    /// Number of keys this predicate asks for.
    pub fn key_count(&self) -> usize {
        match self {
            KeyPredicate::Nothing => 0,
            KeyPredicate::In { values, .. } => values.len(),
            KeyPredicate::AnyOf(c) => c.len(),
        }
    }
}

fn equals_sql(column: &str, value: &str) -> String {
    if value == NULL_SENTINEL {
        format!("({column} = ? OR {column} IS NULL)")
    } else {
        format!("{column} = ?")
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
