//! Field access for collection items.
//!
//! Items in a collection are opaque to the engine except through the
//! [`Record`] trait, which exposes fields by name. Structs get an
//! implementation from `#[derive(Record)]`; [`DataRecord`] is a dynamic,
//! map-backed record for data whose shape is only known at runtime (for
//! example rows parsed from JSON).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::Value;

/// Named field access for collection items.
pub trait Record: Send + Sync + 'static {
    /// Read a field by name. Returns `None` if the field does not exist.
    fn field(&self, name: &str) -> Option<Value>;

    /// Write a field by name.
    ///
    /// Returns `false` if the field does not exist, is read-only, or the
    /// value has the wrong type for it.
    fn set_field(&mut self, name: &str, value: Value) -> bool;

    /// Names of every field, in a stable order.
    fn field_names(&self) -> Vec<String>;
}

/// A collection item shared between the source collection and its views.
///
/// Item identity is pointer identity: two `SharedItem`s refer to the same
/// item when [`Arc::ptr_eq`] says so.
pub type SharedItem<R> = Arc<RwLock<R>>;

/// Wrap a record so it can be placed in a collection.
pub fn shared<R: Record>(record: R) -> SharedItem<R> {
    Arc::new(RwLock::new(record))
}

/// A dynamic record backed by an ordered map of field names to values.
///
/// # Example
///
/// ```
/// use horizon_collections::{DataRecord, Record, Value};
///
/// let mut row = DataRecord::new().with("name", "Ada").with("age", 36);
/// assert_eq!(row.field("name"), Some(Value::from("Ada")));
///
/// row.set_field("age", Value::from(37));
/// assert_eq!(row.get("age"), Some(&Value::Int(37)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRecord {
    fields: BTreeMap<String, Value>,
}

impl DataRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field and return the record (builder pattern).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a field by reference.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a mutable reference to a field.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Whether the record has a field with this name.
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a record from a JSON value.
    ///
    /// Returns `None` unless the value is a JSON object.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => Some(Self::from_json_map(map)),
            _ => None,
        }
    }

    pub(crate) fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }

    /// Convert the record into a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
                .collect(),
        )
    }
}

impl Record for DataRecord {
    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        self.fields.insert(name.to_owned(), value);
        true
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DataRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for DataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

/// A flat copy of a record's field values, taken when an edit begins.
///
/// Only the top-level fields are captured. Nested records are copied as
/// values, but nothing reachable through shared pointers inside an item is
/// tracked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSnapshot {
    fields: Vec<(String, Value)>,
}

impl RecordSnapshot {
    /// Capture every field of `record`.
    pub fn capture<R: Record + ?Sized>(record: &R) -> Self {
        let fields = record
            .field_names()
            .into_iter()
            .map(|name| {
                let value = record.field(&name).unwrap_or_default();
                (name, value)
            })
            .collect();
        Self { fields }
    }

    /// Write the captured values back onto `record`.
    pub fn restore<R: Record + ?Sized>(&self, record: &mut R) {
        for (name, value) in &self.fields {
            record.set_field(name, value.clone());
        }
    }

    /// Whether `record` still holds exactly the captured values.
    ///
    /// Compares key by key in both directions: every captured field must be
    /// unchanged, and the record must not have gained fields.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        let unchanged = self
            .fields
            .iter()
            .all(|(name, value)| record.field(name).unwrap_or_default() == *value);
        unchanged
            && record
                .field_names()
                .iter()
                .all(|name| self.fields.iter().any(|(captured, _)| captured == name))
    }

    /// Captured `(name, value)` pairs.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}
