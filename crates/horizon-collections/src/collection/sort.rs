//! Sort descriptions and the composite item comparator.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::binding::Binding;
use crate::observable::ItemIdentity;
use crate::record::{Record, SharedItem};
use crate::value::Value;

/// Transforms a sort value before comparison.
///
/// Arguments are the sort description, the item, the bound value, and
/// whether this is the first call in the current sort pass (so the
/// converter can do one-time setup).
pub type SortConverterFn<R> = Arc<dyn Fn(&SortDescription, &R, Value, bool) -> Value + Send + Sync>;

/// Custom value comparison.
///
/// Returning `None` falls back to the built-in comparison. The result is
/// interpreted for ascending order and reversed for descending sorts.
pub type SortComparerFn = Arc<dyn Fn(&Value, &Value) -> Option<Ordering> + Send + Sync>;

/// A sort key: a property path and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDescription {
    binding: Binding,
    ascending: bool,
}

impl SortDescription {
    /// Create a sort description for `property`.
    pub fn new(property: impl Into<String>, ascending: bool) -> Self {
        Self {
            binding: Binding::new(property),
            ascending,
        }
    }

    /// Shorthand for an ascending sort.
    pub fn ascending(property: impl Into<String>) -> Self {
        Self::new(property, true)
    }

    /// Shorthand for a descending sort.
    pub fn descending(property: impl Into<String>) -> Self {
        Self::new(property, false)
    }

    /// The property path being sorted on.
    pub fn property(&self) -> &str {
        self.binding.path()
    }

    /// Whether the sort is ascending.
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// The binding used to read sort values.
    pub fn binding(&self) -> &Binding {
        &self.binding
    }
}

impl ItemIdentity for SortDescription {
    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
}

/// Optional hooks applied by the comparator.
pub(crate) struct SortHooks<'a, R> {
    pub converter: Option<&'a SortConverterFn<R>>,
    pub comparer: Option<&'a SortComparerFn>,
}

/// Compare two records under a list of sort descriptions.
///
/// `first_call` is cleared after the converter has been invoked once.
pub(crate) fn compare_records<R: Record>(
    descriptions: &[SortDescription],
    hooks: &SortHooks<'_, R>,
    a: &R,
    b: &R,
    first_call: &mut bool,
) -> Ordering {
    for description in descriptions {
        let mut v1 = description.binding.get_value(a);
        let mut v2 = description.binding.get_value(b);

        if let Some(converter) = hooks.converter {
            v1 = converter(description, a, v1, *first_call);
            v2 = converter(description, b, v2, false);
            *first_call = false;
        }

        if let Some(comparer) = hooks.comparer {
            if let Some(ordering) = comparer(&v1, &v2) {
                return if description.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
            }
        }

        let ordering = compare_sort_values(v1, v2, description.ascending);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compare two sort values for one description.
///
/// Nulls (and NaNs) sort after everything else in both directions. Strings
/// whose lowercase forms differ compare case-insensitively; strings that
/// differ only in case compare by their exact text.
pub(crate) fn compare_sort_values(v1: Value, v2: Value, ascending: bool) -> Ordering {
    let v1 = if v1.is_nan() { Value::Null } else { v1 };
    let v2 = if v2.is_nan() { Value::Null } else { v2 };

    let ordering = match (&v1, &v2) {
        (Value::Null, Value::Null) => return Ordering::Equal,
        (_, Value::Null) => return Ordering::Less,
        (Value::Null, _) => return Ordering::Greater,
        (Value::String(s1), Value::String(s2)) => {
            let (l1, l2) = (s1.to_lowercase(), s2.to_lowercase());
            if l1 != l2 { l1.cmp(&l2) } else { s1.cmp(s2) }
        }
        _ => v1.compare_total(&v2),
    };

    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

/// Sort shared items in place.
pub(crate) fn sort_items<R: Record>(
    items: &mut [SharedItem<R>],
    descriptions: &[SortDescription],
    hooks: &SortHooks<'_, R>,
    stable: bool,
) {
    let mut first_call = true;
    let mut compare = |a: &SharedItem<R>, b: &SharedItem<R>| {
        if Arc::ptr_eq(a, b) {
            return Ordering::Equal;
        }
        let (a, b) = (a.read_recursive(), b.read_recursive());
        compare_records(descriptions, hooks, &*a, &*b, &mut first_call)
    };
    if stable {
        items.sort_by(&mut compare);
    } else {
        items.sort_unstable_by(&mut compare);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{shared, DataRecord};

    fn rows(values: &[(i64, &str)]) -> Vec<SharedItem<DataRecord>> {
        values
            .iter()
            .map(|(n, s)| shared(DataRecord::new().with("n", *n).with("s", *s)))
            .collect()
    }

    fn column(items: &[SharedItem<DataRecord>], field: &str) -> Vec<Value> {
        items.iter().map(|i| i.read().field(field).unwrap_or_default()).collect()
    }

    const NO_HOOKS: SortHooks<'static, DataRecord> = SortHooks {
        converter: None,
        comparer: None,
    };

    #[test]
    fn test_nulls_sort_last_in_both_directions() {
        for ascending in [true, false] {
            assert_eq!(compare_sort_values(Value::Int(1), Value::Null, ascending), Ordering::Less);
            assert_eq!(compare_sort_values(Value::Null, Value::Int(1), ascending), Ordering::Greater);
            assert_eq!(
                compare_sort_values(Value::Float(f64::NAN), Value::Int(1), ascending),
                Ordering::Greater
            );
        }
    }

    #[test]
    fn test_descending_reverses_values() {
        assert_eq!(compare_sort_values(Value::Int(1), Value::Int(2), false), Ordering::Greater);
    }

    #[test]
    fn test_case_rule() {
        // Different letters: case is ignored.
        assert_eq!(compare_sort_values("apple".into(), "Banana".into(), true), Ordering::Less);
        // Same letters, different case: exact comparison keeps ties deterministic.
        assert_eq!(compare_sort_values("Apple".into(), "apple".into(), true), Ordering::Less);
        assert_eq!(compare_sort_values("apple".into(), "apple".into(), true), Ordering::Equal);
    }

    #[test]
    fn test_multi_level_sort() {
        let mut items = rows(&[(2, "b"), (1, "z"), (2, "a"), (1, "y")]);
        let descriptions = vec![SortDescription::ascending("n"), SortDescription::descending("s")];
        sort_items(&mut items, &descriptions, &NO_HOOKS, false);
        assert_eq!(
            column(&items, "s"),
            vec![Value::from("z"), Value::from("y"), Value::from("b"), Value::from("a")]
        );
    }

    #[test]
    fn test_stable_sort_preserves_ties() {
        let mut items = rows(&[(1, "a"), (0, "b"), (1, "c"), (0, "d"), (1, "e")]);
        sort_items(&mut items, &[SortDescription::ascending("n")], &NO_HOOKS, true);
        assert_eq!(
            column(&items, "s"),
            vec!["b", "d", "a", "c", "e"].into_iter().map(Value::from).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_converter_first_call_flag() {
        let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let converter: SortConverterFn<DataRecord> = Arc::new(move |_, _, value, first| {
            calls_clone.lock().push(first);
            match value {
                Value::String(s) => Value::from(s.len()),
                other => other,
            }
        });
        let hooks = SortHooks {
            converter: Some(&converter),
            comparer: None,
        };

        let mut items = rows(&[(0, "ccc"), (0, "a"), (0, "bb")]);
        sort_items(&mut items, &[SortDescription::ascending("s")], &hooks, true);

        assert_eq!(
            column(&items, "s"),
            vec![Value::from("a"), Value::from("bb"), Value::from("ccc")]
        );
        let calls = calls.lock();
        assert!(calls[0]);
        assert!(calls[1..].iter().all(|first| !first));
    }

    #[test]
    fn test_custom_comparer_is_flipped_for_descending() {
        let comparer: SortComparerFn = Arc::new(|a, b| {
            let (a, b) = (a.as_i64()?, b.as_i64()?);
            Some((a % 10).cmp(&(b % 10)))
        });
        let hooks = SortHooks {
            converter: None,
            comparer: Some(&comparer),
        };
        let mut items = rows(&[(21, "x"), (13, "y"), (9, "z")]);
        sort_items(&mut items, &[SortDescription::descending("n")], &hooks, true);
        assert_eq!(column(&items, "n"), vec![Value::Int(9), Value::Int(13), Value::Int(21)]);
    }
}
