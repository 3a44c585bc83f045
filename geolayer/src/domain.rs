//! Domains of visual channel fields.

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Field};
use crate::scale::ScaleType;

/// Smallest lower bound of a log domain. Log scales cannot map zero.
pub const LOG_DOMAIN_MIN: f64 = 1e-5;

/// Set of input values a scale maps from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "camelCase")]
pub enum Domain {
    /// `[min, max]` extent.
    Ordered([f64; 2]),
    /// All values, sorted ascending.
    Quantile(Vec<f64>),
    /// Distinct category keys, sorted.
    Ordinal(Vec<String>),
}

impl Default for Domain {
    fn default() -> Self {
        Domain::Ordered([0.0, 1.0])
    }
}

impl Domain {
    /// Number of values in the domain. An ordered domain always has two.
    pub fn len(&self) -> usize {
        match self {
            Domain::Ordered(_) => 2,
            Domain::Quantile(values) => values.len(),
            Domain::Ordinal(values) => values.len(),
        }
    }

    /// Returns true for an empty quantile or ordinal domain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Domain of the field for the given scale type, computed over the rows of
/// [`Dataset::filtered_index_for_domain`].
///
/// Without a field the domain is `[0, 1]`. Without any non-missing values it is `[0, 0]`.
pub fn compute_domain(dataset: &Dataset, field: Option<&Field>, scale_type: ScaleType) -> Domain {
    let Some(field) = field else {
        return Domain::default();
    };
    let indices = &dataset.filtered_index_for_domain;

    match scale_type {
        ScaleType::Ordinal | ScaleType::Point => {
            ordinal_domain(dataset.values(field, indices).filter_map(|v| v.category_key()))
        }
        ScaleType::Quantile => {
            let mut values: Vec<f64> = dataset
                .values(field, indices)
                .filter_map(|v| v.as_f64())
                .collect();
            if values.is_empty() {
                return Domain::Quantile(vec![0.0, 0.0]);
            }
            values.sort_by(f64::total_cmp);
            Domain::Quantile(values)
        }
        ScaleType::Log => {
            let [min, max] = extent(dataset.values(field, indices).filter_map(|v| v.as_f64()));
            Domain::Ordered([if min == 0.0 { LOG_DOMAIN_MIN } else { min }, max])
        }
        ScaleType::Quantize | ScaleType::Linear | ScaleType::Sqrt => {
            Domain::Ordered(extent(dataset.values(field, indices).filter_map(|v| v.as_f64())))
        }
    }
}

/// `[min, max]` of the values, `[0, 0]` if there are none.
pub fn extent(values: impl Iterator<Item = f64>) -> [f64; 2] {
    values
        .fold(None, |acc: Option<[f64; 2]>, v| match acc {
            Some([min, max]) => Some([min.min(v), max.max(v)]),
            None => Some([v, v]),
        })
        .unwrap_or([0.0, 0.0])
}

/// Distinct keys sorted numerically if all of them are numbers, lexicographically otherwise.
fn ordinal_domain(keys: impl Iterator<Item = String>) -> Domain {
    let mut keys: Vec<String> = keys.collect();
    let numbers: Option<Vec<f64>> = keys.iter().map(|k| k.parse::<f64>().ok()).collect();

    match numbers {
        Some(_) => keys.sort_by(|a, b| {
            let a = a.parse::<f64>().unwrap_or(f64::NAN);
            let b = b.parse::<f64>().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        }),
        None => keys.sort(),
    }
    keys.dedup();

    Domain::Ordinal(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FieldType, Value};

    fn dataset() -> Dataset {
        let rows = vec![
            vec![Value::from("orange"), Value::from(10i64), Value::Real(0.0)],
            vec![Value::from("apple"), Value::from(2i64), Value::Real(5.0)],
            vec![Value::Null, Value::Null, Value::Null],
            vec![Value::from("banana"), Value::from(7i64), Value::Real(1.5)],
            vec![Value::from("apple"), Value::from(2i64), Value::Real(3.0)],
        ];
        Dataset::new(
            "fruits",
            vec![
                Field::new("name", FieldType::String, 0),
                Field::new("count", FieldType::Integer, 1),
                Field::new("weight", FieldType::Real, 2),
            ],
            rows,
        )
    }

    #[test]
    fn no_field() {
        assert_eq!(
            compute_domain(&dataset(), None, ScaleType::Quantize),
            Domain::Ordered([0.0, 1.0])
        );
    }

    #[test]
    fn domains_by_scale_type() {
        let dataset = dataset();
        let name = dataset.field("name");
        let count = dataset.field("count");
        let weight = dataset.field("weight");

        assert_eq!(
            compute_domain(&dataset, name, ScaleType::Ordinal),
            Domain::Ordinal(vec!["apple".into(), "banana".into(), "orange".into()])
        );
        assert_eq!(
            compute_domain(&dataset, count, ScaleType::Point),
            Domain::Ordinal(vec!["2".into(), "7".into(), "10".into()])
        );
        assert_eq!(
            compute_domain(&dataset, count, ScaleType::Quantile),
            Domain::Quantile(vec![2.0, 2.0, 7.0, 10.0])
        );
        assert_eq!(
            compute_domain(&dataset, weight, ScaleType::Quantize),
            Domain::Ordered([0.0, 5.0])
        );
        assert_eq!(
            compute_domain(&dataset, weight, ScaleType::Log),
            Domain::Ordered([LOG_DOMAIN_MIN, 5.0])
        );
    }

    #[test]
    fn domain_uses_rows_for_domain_only() {
        let dataset = dataset()
            .with_filtered_index(vec![1])
            .with_filtered_index_for_domain(vec![0, 3]);
        let count = dataset.field("count");
        assert_eq!(
            compute_domain(&dataset, count, ScaleType::Linear),
            Domain::Ordered([7.0, 10.0])
        );
    }

    #[test]
    fn all_missing_values() {
        let dataset = dataset().with_filtered_index_for_domain(vec![2]);
        let weight = dataset.field("weight");
        assert_eq!(
            compute_domain(&dataset, weight, ScaleType::Sqrt),
            Domain::Ordered([0.0, 0.0])
        );
        assert_eq!(
            compute_domain(&dataset, weight, ScaleType::Quantile),
            Domain::Quantile(vec![0.0, 0.0])
        );
        assert_eq!(
            compute_domain(&dataset, dataset.field("name"), ScaleType::Ordinal),
            Domain::Ordinal(vec![])
        );
    }

    #[test]
    fn domain_serialization() {
        insta::assert_snapshot!(
            serde_json::to_string(&Domain::Ordered([0.0, 2.5])).unwrap(),
            @r#"{"type":"ordered","values":[0.0,2.5]}"#
        );
    }
}
