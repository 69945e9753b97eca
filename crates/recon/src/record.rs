use std::borrow::Borrow;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::value::FieldValue;

/// A field name normalized to lower case at construction.
///
/// All case-insensitive lookups go through this type; nothing else in the
/// crate lower-cases names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    pub fn new(name: &str) -> Self {
        FieldName(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        FieldName::new(s)
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        FieldName::new(&s)
    }
}

impl Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An ordered mapping from normalized field name to value.
///
/// Insertion order is preserved; inserting an existing name (in any case)
/// replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(FieldName, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Record {
            fields: Vec::with_capacity(n),
        }
    }

    pub fn insert(&mut self, name: impl Into<FieldName>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder form of `insert`.
    pub fn with(mut self, name: impl Into<FieldName>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &FieldName) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Lookup by raw name; matched case-insensitively.
    pub fn get_ci(&self, name: &str) -> Option<&FieldValue> {
        self.get(&FieldName::new(name))
    }

    pub fn contains(&self, name: &FieldName) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n, v))
    }

    pub fn names(&self) -> impl Iterator<Item = &FieldName> {
        self.fields.iter().map(|(n, _)| n)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<FieldName>, V: Into<FieldValue>> FromIterator<(N, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (n, v) in iter {
            record.insert(n, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercased() {
        let r = Record::new().with("CustomerID", 7i64).with("Name", "Ada");
        let names: Vec<&str> = r.names().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["customerid", "name"]);
        assert_eq!(r.get_ci("CUSTOMERID"), Some(&FieldValue::Int(7)));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut r = Record::new().with("a", 1i64).with("b", 2i64);
        r.insert("A", 10i64);
        assert_eq!(r.len(), 2);
        let first = r.iter().next().unwrap();
        assert_eq!(first.0.as_str(), "a");
        assert_eq!(first.1, &FieldValue::Int(10));
    }

    #[test]
    fn serializes_in_insertion_order() {
        let r = Record::new().with("z", 1i64).with("a", "x");
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"z":1,"a":"x"}"#);
    }
}
