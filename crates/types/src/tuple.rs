//! Named-field records flowing between operators

use crate::errors::{Result, TupleError};
use crate::value::{MacAddr, Value};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::net::Ipv4Addr;

/// A record mapping field names to values.
///
/// Fields are kept sorted by name, so iteration, rendering and
/// [`Tuple::key_string`] are deterministic regardless of insertion order.
///
/// # Example
///
/// ```rust
/// use flowwatch_types::{Tuple, Value};
///
/// let tuple = Tuple::new()
///     .with("time", Value::Float(0.5))
///     .with("l4.flags", Value::Int(2));
/// assert_eq!(tuple.get_int("l4.flags").unwrap(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuple {
    fields: BTreeMap<String, Value>,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Insert a field, returning the previous value if any
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Look up a field, failing with `MissingField` when absent
    pub fn require(&self, field: &str) -> Result<&Value> {
        self.fields
            .get(field)
            .ok_or_else(|| TupleError::missing(field))
    }

    pub fn get_int(&self, field: &str) -> Result<i64> {
        let value = self.require(field)?;
        value
            .as_int()
            .ok_or_else(|| TupleError::mismatch(field, "int", value.kind()))
    }

    pub fn get_float(&self, field: &str) -> Result<f64> {
        let value = self.require(field)?;
        value
            .as_float()
            .ok_or_else(|| TupleError::mismatch(field, "float", value.kind()))
    }

    pub fn get_ipv4(&self, field: &str) -> Result<Ipv4Addr> {
        let value = self.require(field)?;
        value
            .as_ipv4()
            .ok_or_else(|| TupleError::mismatch(field, "ipv4", value.kind()))
    }

    pub fn get_mac(&self, field: &str) -> Result<MacAddr> {
        let value = self.require(field)?;
        value
            .as_mac()
            .ok_or_else(|| TupleError::mismatch(field, "mac", value.kind()))
    }

    /// Left-biased union: fields already in `self` win over `other`.
    pub fn union(&self, other: &Tuple) -> Tuple {
        let mut merged = self.clone();
        for (field, value) in &other.fields {
            merged.fields.entry(field.clone()).or_insert(*value);
        }
        merged
    }

    /// Right-biased merge: fields of `other` overwrite those in `self`.
    pub fn extend_from(&mut self, other: &Tuple) {
        for (field, value) in &other.fields {
            self.fields.insert(field.clone(), *value);
        }
    }

    /// Keep only the listed fields; absent ones are skipped.
    pub fn project<S: AsRef<str>>(&self, fields: &[S]) -> Tuple {
        let mut projected = Tuple::new();
        for field in fields {
            let field = field.as_ref();
            if let Some(value) = self.fields.get(field) {
                projected.fields.insert(field.to_string(), *value);
            }
        }
        projected
    }

    /// Keep the listed fields under new names, given as `(old, new)` pairs.
    pub fn project_renamed<S: AsRef<str>>(&self, pairs: &[(S, S)]) -> Tuple {
        let mut projected = Tuple::new();
        for (old, new) in pairs {
            if let Some(value) = self.fields.get(old.as_ref()) {
                projected.fields.insert(new.as_ref().to_string(), *value);
            }
        }
        projected
    }

    /// Deterministic serialization used to group and join on this tuple.
    ///
    /// Logically equal tuples always produce the same string; values of
    /// different variants never collide.
    pub fn key_string(&self) -> String {
        let mut key = String::with_capacity(self.fields.len() * 16);
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                key.push(';');
            }
            key.push_str(field);
            key.push('=');
            value.write_key_fragment(&mut key);
        }
        key
    }
}

/// Renders as `"field" => value, ` for every field.
impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, value) in &self.fields {
            write!(f, "\"{field}\" => {value}, ")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Tuple {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Tuple {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
