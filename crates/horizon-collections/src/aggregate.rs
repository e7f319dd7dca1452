//! Aggregate calculations over item lists.

use std::fmt;
use std::str::FromStr;

use horizon_collections_core::logging::targets;

use crate::binding::Binding;
use crate::error::{CollectionError, Result};
use crate::record::{Record, SharedItem};
use crate::value::Value;

/// The kind of aggregate to calculate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// No aggregate. Asking for it is an error.
    #[default]
    None,
    /// Sum of numeric values.
    Sum,
    /// Count of non-null values.
    Cnt,
    /// Average of numeric values.
    Avg,
    /// Largest value.
    Max,
    /// Smallest value.
    Min,
    /// Difference between the largest and smallest values.
    Rng,
    /// Sample standard deviation.
    Std,
    /// Sample variance.
    Var,
    /// Population standard deviation.
    StdPop,
    /// Population variance.
    VarPop,
    /// Count of all items, including nulls.
    CntAll,
}

impl Aggregate {
    /// Every aggregate kind, in declaration order.
    pub const ALL: [Aggregate; 12] = [
        Aggregate::None,
        Aggregate::Sum,
        Aggregate::Cnt,
        Aggregate::Avg,
        Aggregate::Max,
        Aggregate::Min,
        Aggregate::Rng,
        Aggregate::Std,
        Aggregate::Var,
        Aggregate::StdPop,
        Aggregate::VarPop,
        Aggregate::CntAll,
    ];

    /// The lowercase name of the aggregate.
    pub fn name(self) -> &'static str {
        match self {
            Aggregate::None => "none",
            Aggregate::Sum => "sum",
            Aggregate::Cnt => "cnt",
            Aggregate::Avg => "avg",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Rng => "rng",
            Aggregate::Std => "std",
            Aggregate::Var => "var",
            Aggregate::StdPop => "stdpop",
            Aggregate::VarPop => "varpop",
            Aggregate::CntAll => "cntall",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregate {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Aggregate::ALL
            .into_iter()
            .find(|aggregate| aggregate.name() == lower)
            .ok_or_else(|| CollectionError::InvalidAggregate(s.to_owned()))
    }
}

/// Something an aggregate can be calculated over.
pub trait AggregateSource {
    /// The value to aggregate for this item.
    ///
    /// Returns `None` when the item itself is the value but cannot be
    /// expressed as a [`Value`]; such items count as non-null and
    /// non-numeric.
    fn aggregate_value(&self, binding: Option<&Binding>) -> Option<Value>;
}

impl AggregateSource for Value {
    fn aggregate_value(&self, binding: Option<&Binding>) -> Option<Value> {
        Some(match binding {
            Some(binding) => binding.get_from_value(self),
            None => self.clone(),
        })
    }
}

impl<R: Record> AggregateSource for SharedItem<R> {
    fn aggregate_value(&self, binding: Option<&Binding>) -> Option<Value> {
        binding.map(|binding| binding.get_value(&*self.read_recursive()))
    }
}

/// Calculate an aggregate over `items`.
///
/// `binding` selects the field to aggregate; without it the items
/// themselves are aggregated. Booleans count as `0`/`1` in numeric
/// aggregates. Variances and standard deviations are `0` when fewer than two
/// numeric values are present.
///
/// # Example
///
/// ```
/// use horizon_collections::{get_aggregate, Aggregate, Value};
///
/// let values = vec![Value::from(1), Value::from(2), Value::from(3)];
/// let sum = get_aggregate(Aggregate::Sum, &values, None).unwrap();
/// assert_eq!(sum, Value::from(6));
/// ```
pub fn get_aggregate<T: AggregateSource>(
    aggregate: Aggregate,
    items: &[T],
    binding: Option<&str>,
) -> Result<Value> {
    let binding = binding.map(Binding::new);
    let totals = || {
        let mut totals = Totals::default();
        for item in items {
            totals.add(item.aggregate_value(binding.as_ref()));
        }
        totals
    };

    let value = match aggregate {
        Aggregate::None => {
            tracing::warn!(target: targets::AGGREGATE, "aggregate requested without a kind");
            return Err(CollectionError::InvalidAggregate(aggregate.name().to_owned()));
        }
        Aggregate::CntAll => Value::from(items.len()),
        Aggregate::Cnt => Value::from(totals().count),
        Aggregate::Sum => Value::Float(totals().sum),
        Aggregate::Avg => Value::Float(totals().mean()),
        Aggregate::Max => totals().max.unwrap_or_default(),
        Aggregate::Min => totals().min.unwrap_or_default(),
        Aggregate::Rng => totals().range(),
        Aggregate::VarPop => Value::Float(totals().variance(false)),
        Aggregate::Var => Value::Float(totals().variance(true)),
        Aggregate::StdPop => Value::Float(totals().variance(false).sqrt()),
        Aggregate::Std => Value::Float(totals().variance(true).sqrt()),
    };
    tracing::trace!(target: targets::AGGREGATE, %aggregate, items = items.len(), "aggregate calculated");
    Ok(value)
}

/// Running totals collected in a single pass.
#[derive(Default)]
struct Totals {
    count: usize,
    numeric_count: usize,
    sum: f64,
    sum_of_squares: f64,
    min: Option<Value>,
    max: Option<Value>,
}

impl Totals {
    fn add(&mut self, value: Option<Value>) {
        let value = match value {
            None => {
                self.count += 1;
                return;
            }
            Some(Value::Null) => return,
            Some(value) => value,
        };

        self.count += 1;
        if let Some(number) = value.numeric().filter(|n| !n.is_nan()) {
            self.numeric_count += 1;
            self.sum += number;
            self.sum_of_squares += number * number;
        }

        if self
            .min
            .as_ref()
            .is_none_or(|min| value.compare(min) == Some(std::cmp::Ordering::Less))
        {
            self.min = Some(value.clone());
        }
        if self
            .max
            .as_ref()
            .is_none_or(|max| value.compare(max) == Some(std::cmp::Ordering::Greater))
        {
            self.max = Some(value);
        }
    }

    fn mean(&self) -> f64 {
        if self.numeric_count == 0 {
            0.0
        } else {
            self.sum / self.numeric_count as f64
        }
    }

    fn variance(&self, sample: bool) -> f64 {
        let n = self.numeric_count;
        if n <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let population = (self.sum_of_squares / n as f64 - mean * mean).max(0.0);
        if sample {
            population * n as f64 / (n - 1) as f64
        } else {
            population
        }
    }

    fn range(&self) -> Value {
        match (&self.min, &self.max) {
            (Some(Value::Date(min)), Some(Value::Date(max))) => {
                Value::from((*max - *min).num_milliseconds())
            }
            (Some(min), Some(max)) => match (min.numeric(), max.numeric()) {
                (Some(min), Some(max)) => Value::Float(max - min),
                _ => Value::Null,
            },
            _ => Value::Null,
        }
    }
}
