//! Property-path bindings.
//!
//! A [`Binding`] resolves a dotted path such as `customer.address[0].city`
//! against a [`Record`]. The first segment names a field of the record;
//! later segments navigate nested [`Value::Record`]s and [`Value::List`]s.
//! Paths that cannot be resolved read as [`Value::Null`].

use std::fmt;

use crate::record::Record;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPart {
    Field(String),
    Index(usize),
}

/// A parsed property path with a getter and setter.
///
/// # Example
///
/// ```
/// use horizon_collections::{Binding, DataRecord, Value};
///
/// let address = DataRecord::new().with("city", "Oslo");
/// let customer = DataRecord::new().with("addresses", vec![Value::from(address)]);
/// let order = DataRecord::new().with("customer", customer);
///
/// let binding = Binding::new("customer.addresses[0].city");
/// assert_eq!(binding.get_value(&order), Value::from("Oslo"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    path: String,
    parts: Vec<PathPart>,
}

impl Binding {
    /// Parse a binding path.
    ///
    /// Segments are separated by `.`; a segment may carry one or more list
    /// indexes in brackets. Bracketed text that is not a number is kept as
    /// part of the field name.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let parts = parse_path(&path);
        Self { path, parts }
    }

    /// The original path string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Read the bound value from a record.
    pub fn get_value<R: Record + ?Sized>(&self, record: &R) -> Value {
        let Some((PathPart::Field(first), rest)) = self.parts.split_first() else {
            return Value::Null;
        };
        match record.field(first) {
            Some(value) => navigate(&value, rest).cloned().unwrap_or_default(),
            None => Value::Null,
        }
    }

    /// Read the bound value starting from a plain value instead of a record.
    ///
    /// Used when aggregating over lists of values.
    pub fn get_from_value(&self, value: &Value) -> Value {
        navigate(value, &self.parts).cloned().unwrap_or_default()
    }

    /// Write the bound value into a record.
    ///
    /// Returns `false` when an intermediate segment is missing or has the
    /// wrong shape, or when the record rejects the write.
    pub fn set_value<R: Record + ?Sized>(&self, record: &mut R, value: Value) -> bool {
        let Some((PathPart::Field(first), rest)) = self.parts.split_first() else {
            return false;
        };
        if rest.is_empty() {
            return record.set_field(first, value);
        }
        let Some(mut top) = record.field(first) else {
            return false;
        };
        match navigate_mut(&mut top, rest) {
            Some(slot) => *slot = value,
            None => return false,
        }
        record.set_field(first, top)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for Binding {
    fn from(path: &str) -> Self {
        Binding::new(path)
    }
}

fn parse_path(path: &str) -> Vec<PathPart> {
    let mut parts = Vec::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (name, mut rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        let mut indexes = Vec::new();
        let mut literal = false;
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                literal = true;
                break;
            };
            match stripped[..end].trim().parse::<usize>() {
                Ok(index) => indexes.push(index),
                Err(_) => {
                    literal = true;
                    break;
                }
            }
            rest = &stripped[end + 1..];
        }
        if literal || !rest.is_empty() {
            parts.push(PathPart::Field(segment.to_owned()));
            continue;
        }
        if !name.is_empty() {
            parts.push(PathPart::Field(name.to_owned()));
        }
        parts.extend(indexes.into_iter().map(PathPart::Index));
    }
    parts
}

fn navigate<'a>(value: &'a Value, parts: &[PathPart]) -> Option<&'a Value> {
    let mut current = value;
    for part in parts {
        current = match (part, current) {
            (PathPart::Field(name), Value::Record(record)) => record.get(name)?,
            (PathPart::Index(index), Value::List(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn navigate_mut<'a>(value: &'a mut Value, parts: &[PathPart]) -> Option<&'a mut Value> {
    let mut current = value;
    for part in parts {
        current = match (part, current) {
            (PathPart::Field(name), Value::Record(record)) => {
                if !record.contains_field(name) {
                    record.insert(name.clone(), Value::Null);
                }
                record.get_mut(name)?
            }
            (PathPart::Index(index), Value::List(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataRecord;

    fn order() -> DataRecord {
        let line = DataRecord::new().with("sku", "A-1").with("qty", 2);
        let customer = DataRecord::new().with("name", "Ada");
        DataRecord::new()
            .with("id", 7)
            .with("customer", customer)
            .with("lines", vec![Value::from(line)])
    }

    #[test]
    fn test_parse_path() {
        let binding = Binding::new("lines[0].qty");
        assert_eq!(
            binding.parts,
            vec![
                PathPart::Field("lines".into()),
                PathPart::Index(0),
                PathPart::Field("qty".into())
            ]
        );
        assert_eq!(binding.path(), "lines[0].qty");
    }

    #[test]
    fn test_non_numeric_brackets_are_literal() {
        let binding = Binding::new("weird[x]");
        assert_eq!(binding.parts, vec![PathPart::Field("weird[x]".into())]);
    }

    #[test]
    fn test_get_value_nested() {
        let record = order();
        assert_eq!(Binding::new("id").get_value(&record), Value::Int(7));
        assert_eq!(Binding::new("customer.name").get_value(&record), Value::from("Ada"));
        assert_eq!(Binding::new("lines[0].sku").get_value(&record), Value::from("A-1"));
        assert_eq!(Binding::new("lines[3].sku").get_value(&record), Value::Null);
        assert_eq!(Binding::new("nope.deeper").get_value(&record), Value::Null);
        assert_eq!(Binding::new("").get_value(&record), Value::Null);
    }

    #[test]
    fn test_set_value_nested() {
        let mut record = order();
        assert!(Binding::new("lines[0].qty").set_value(&mut record, Value::Int(5)));
        assert_eq!(Binding::new("lines[0].qty").get_value(&record), Value::Int(5));

        assert!(Binding::new("customer.email").set_value(&mut record, Value::from("a@b")));
        assert_eq!(Binding::new("customer.email").get_value(&record), Value::from("a@b"));

        assert!(!Binding::new("id.inner").set_value(&mut record, Value::Int(1)));
        assert!(!Binding::new("lines[9].qty").set_value(&mut record, Value::Int(1)));
    }

    #[test]
    fn test_get_from_value() {
        let value = Value::from(order());
        assert_eq!(Binding::new("customer.name").get_from_value(&value), Value::from("Ada"));
    }
}
