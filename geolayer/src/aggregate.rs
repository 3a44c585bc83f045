//! Reduction of lists of values into a single number or category.

use std::fmt::{Display, Formatter};

use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};

use crate::dataset::{format_number, Value};

/// Aggregation technique applied to the values of a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    /// Number of values, missing ones included.
    Count,
    /// Sum of numeric values.
    Sum,
    /// Arithmetic mean of numeric values.
    #[serde(rename = "average")]
    Mean,
    /// Median of numeric values.
    Median,
    /// Population variance of numeric values.
    Variance,
    /// Population standard deviation of numeric values.
    Stdev,
    /// Most frequent value.
    Mode,
    /// Minimum of numeric values.
    #[serde(rename = "minimum")]
    Min,
    /// Maximum of numeric values.
    #[serde(rename = "maximum")]
    Max,
    /// Number of distinct values.
    CountUnique,
}

impl Aggregation {
    /// Name shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Sum => "Sum",
            Self::Mean => "Average",
            Self::Median => "Median",
            Self::Variance => "Variance",
            Self::Stdev => "Standard Deviation",
            Self::Mode => "Mode",
            Self::Min => "Minimum",
            Self::Max => "Maximum",
            Self::CountUnique => "Unique Count",
        }
    }
}

impl Display for Aggregation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of an aggregation. Only [`Aggregation::Mode`] produces text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    /// Numeric result.
    Number(f64),
    /// Categorical result.
    Text(String),
}

impl AggregateValue {
    /// Numeric result, `None` for text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl From<AggregateValue> for Value {
    fn from(value: AggregateValue) -> Self {
        match value {
            AggregateValue::Number(v) => Value::Real(v),
            AggregateValue::Text(v) => Value::String(v),
        }
    }
}

impl PartialEq<f64> for AggregateValue {
    fn eq(&self, other: &f64) -> bool {
        self.as_number() == Some(*other)
    }
}

impl PartialEq<&str> for AggregateValue {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Self::Text(v) if v == other)
    }
}

/// A value that can be aggregated.
pub trait Aggregatable {
    /// Numeric value. `None` excludes the value from numeric aggregations.
    fn to_number(&self) -> Option<f64>;

    /// Key under which the value is counted in frequency tables. `None` excludes the value.
    fn frequency_key(&self) -> Option<String>;
}

impl Aggregatable for f64 {
    fn to_number(&self) -> Option<f64> {
        (!self.is_nan()).then_some(*self)
    }

    fn frequency_key(&self) -> Option<String> {
        self.to_number().map(format_number)
    }
}

impl Aggregatable for Option<f64> {
    fn to_number(&self) -> Option<f64> {
        self.and_then(|v| v.to_number())
    }

    fn frequency_key(&self) -> Option<String> {
        self.and_then(|v| v.frequency_key())
    }
}

impl Aggregatable for Value {
    fn to_number(&self) -> Option<f64> {
        self.as_f64()
    }

    fn frequency_key(&self) -> Option<String> {
        self.category_key()
    }
}

impl<T: Aggregatable + ?Sized> Aggregatable for &T {
    fn to_number(&self) -> Option<f64> {
        (*self).to_number()
    }

    fn frequency_key(&self) -> Option<String> {
        (*self).frequency_key()
    }
}

/// Aggregates the values with the given technique.
///
/// Missing values are excluded from everything except [`Aggregation::Count`]. Numeric aggregations of a
/// list without numbers return `0`, the mode of such a list is an empty string.
pub fn aggregate<T: Aggregatable>(values: &[T], aggregation: Aggregation) -> AggregateValue {
    use AggregateValue::Number;

    match aggregation {
        Aggregation::Count => Number(values.len() as f64),
        Aggregation::CountUnique => Number(get_frequency(values).len() as f64),
        Aggregation::Mode => AggregateValue::Text(get_mode(values).unwrap_or_default()),
        Aggregation::Sum => Number(reduce_numbers(values, |n| sum(&n))),
        Aggregation::Mean => Number(reduce_numbers(values, |n| mean(&n))),
        Aggregation::Median => Number(reduce_numbers(values, median)),
        Aggregation::Variance => Number(reduce_numbers(values, |n| variance(&n))),
        Aggregation::Stdev => Number(reduce_numbers(values, |n| variance(&n).sqrt())),
        Aggregation::Min => Number(reduce_numbers(values, |n| {
            n.into_iter().fold(f64::INFINITY, f64::min)
        })),
        Aggregation::Max => Number(reduce_numbers(values, |n| {
            n.into_iter().fold(f64::NEG_INFINITY, f64::max)
        })),
    }
}

fn reduce_numbers<T: Aggregatable>(values: &[T], reduce: impl FnOnce(Vec<f64>) -> f64) -> f64 {
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.to_number()).collect();
    if numbers.is_empty() {
        0.0
    } else {
        reduce(numbers)
    }
}

fn sum(numbers: &[f64]) -> f64 {
    numbers.iter().sum()
}

fn mean(numbers: &[f64]) -> f64 {
    sum(numbers) / numbers.len() as f64
}

fn median(mut numbers: Vec<f64>) -> f64 {
    numbers.sort_by(f64::total_cmp);
    let mid = numbers.len() / 2;
    if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    } else {
        numbers[mid]
    }
}

fn variance(numbers: &[f64]) -> f64 {
    let mean = mean(numbers);
    numbers.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / numbers.len() as f64
}

/// Occurrence counts of the values.
///
/// Keys that are canonical non-negative integers come first in ascending numeric order, all other keys
/// follow in the order of their first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frequency {
    entries: Vec<(String, usize)>,
}

impl Frequency {
    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no value was counted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of the key.
    pub fn get(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .find_map(|(k, count)| (k == key).then_some(*count))
    }

    /// Iterates over `(key, count)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(k, count)| (k.as_str(), *count))
    }
}

/// Counts occurrences of every non-missing value.
pub fn get_frequency<T: Aggregatable>(values: &[T]) -> Frequency {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<(String, usize)> = vec![];

    for key in values.iter().filter_map(|v| v.frequency_key()) {
        match positions.get(&key) {
            Some(position) => entries[*position].1 += 1,
            None => {
                positions.insert(key.clone(), entries.len());
                entries.push((key, 1));
            }
        }
    }

    // Stable sort keeps the insertion order of non-index keys.
    entries.sort_by_key(|(key, _)| match array_index(key) {
        Some(index) => (0, index),
        None => (1, 0),
    });

    Frequency { entries }
}

/// Most frequent value. Ties are resolved in favour of the key that comes first in [`Frequency`] order.
pub fn get_mode<T: Aggregatable>(values: &[T]) -> Option<String> {
    let frequency = get_frequency(values);
    let mut mode: Option<(&str, usize)> = None;
    for (key, count) in frequency.iter() {
        if mode.map_or(true, |(_, max)| count > max) {
            mode = Some((key, count));
        }
    }

    mode.map(|(key, _)| key.to_string())
}

/// Canonical array index: decimal digits without leading zeros, below `2^32 - 1`.
fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }

    key.parse::<u32>().ok().filter(|v| *v != u32::MAX)
}
