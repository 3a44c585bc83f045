//! Scales mapping domain values onto visual ranges.

use std::fmt::{Display, Formatter};

use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};

use crate::dataset::Value;
use crate::domain::Domain;

/// Kind of scale used by a visual channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    /// Categories mapped onto range values in domain order.
    Ordinal,
    /// Equal-count buckets.
    Quantile,
    /// Equal-width buckets.
    Quantize,
    /// Linear interpolation.
    Linear,
    /// Square root interpolation.
    Sqrt,
    /// Logarithmic interpolation. Non-positive values have no mapping.
    Log,
    /// Categories mapped onto evenly spaced points of a continuous range.
    Point,
}

impl Display for ScaleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ordinal => "ordinal",
            Self::Quantile => "quantile",
            Self::Quantize => "quantize",
            Self::Linear => "linear",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Point => "point",
        };
        write!(f, "{name}")
    }
}

/// Range value that can be blended between two range stops.
pub trait Interpolate: Clone {
    /// Value at `t` between `self` (`t = 0`) and `other` (`t = 1`).
    fn interpolate(&self, other: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Transform {
    Linear,
    Sqrt,
    Log,
}

impl Transform {
    fn apply(&self, v: f64) -> Option<f64> {
        match self {
            Transform::Linear => Some(v),
            Transform::Sqrt => Some(v.signum() * v.abs().sqrt()),
            Transform::Log => (v > 0.0).then(|| v.ln()),
        }
    }
}

/// A scale built from a [`Domain`] and a list of range values.
#[derive(Debug, Clone)]
pub enum Scale<R> {
    /// Buckets split by thresholds: a value maps to the range value of the number of thresholds that are
    /// less than or equal to it.
    Threshold {
        /// Sorted bucket boundaries, one less than the range values.
        thresholds: Vec<f64>,
        /// Range values.
        range: Vec<R>,
    },
    /// Categories mapped onto range values, cycling through the range if it is shorter than the domain.
    Ordinal {
        /// Position of every category in the domain.
        lookup: HashMap<String, usize>,
        /// Range values.
        range: Vec<R>,
    },
    /// Categories mapped onto evenly spaced points between the first and the last range values.
    Point {
        /// Position of every category in the domain.
        lookup: HashMap<String, usize>,
        /// Start of the range.
        start: R,
        /// End of the range.
        end: R,
    },
    /// Continuous interpolation between the first and the last range values. Values outside of the
    /// domain are extrapolated.
    Continuous {
        /// Interpolation transform.
        transform: ScaleType,
        /// Transformed domain.
        domain: [f64; 2],
        /// Start of the range.
        start: R,
        /// End of the range.
        end: R,
    },
}

impl<R: Interpolate> Scale<R> {
    /// Builds a scale of the given type.
    ///
    /// Returns `None` if the domain does not fit the scale type, the range is empty or a log scale gets a
    /// non-positive domain.
    pub fn new(scale_type: ScaleType, domain: &Domain, range: &[R]) -> Option<Self> {
        let first = range.first()?;
        let last = range.last()?;

        match (scale_type, domain) {
            (ScaleType::Quantize, Domain::Ordered([x0, x1])) => Some(Self::Threshold {
                thresholds: quantize_thresholds(*x0, *x1, range.len()),
                range: range.to_vec(),
            }),
            (ScaleType::Quantile, Domain::Quantile(values)) => Some(Self::Threshold {
                thresholds: quantile_thresholds(values, range.len()),
                range: range.to_vec(),
            }),
            (ScaleType::Ordinal, Domain::Ordinal(values)) => Some(Self::Ordinal {
                lookup: category_lookup(values),
                range: range.to_vec(),
            }),
            (ScaleType::Point, Domain::Ordinal(values)) => Some(Self::Point {
                lookup: category_lookup(values),
                start: first.clone(),
                end: last.clone(),
            }),
            (
                transform @ (ScaleType::Linear | ScaleType::Sqrt | ScaleType::Log),
                Domain::Ordered([d0, d1]),
            ) => {
                let t = transform_of(transform);
                Some(Self::Continuous {
                    transform,
                    domain: [t.apply(*d0)?, t.apply(*d1)?],
                    start: first.clone(),
                    end: last.clone(),
                })
            }
            _ => None,
        }
    }

    /// Maps a number onto the range. Categorical scales look the number up by its category key.
    pub fn scale_number(&self, value: f64) -> Option<R> {
        match self {
            Self::Threshold { thresholds, range } => {
                if value.is_nan() {
                    return None;
                }
                let index = thresholds.partition_point(|t| *t <= value);
                range.get(index).cloned()
            }
            Self::Continuous {
                transform,
                domain: [d0, d1],
                start,
                end,
            } => {
                let v = transform_of(*transform).apply(value)?;
                let t = if d1 == d0 { 0.5 } else { (v - d0) / (d1 - d0) };
                t.is_finite().then(|| start.interpolate(end, t))
            }
            Self::Ordinal { .. } | Self::Point { .. } => {
                self.scale(&Value::Real(value))
            }
        }
    }

    /// Maps a cell onto the range. Missing values and values outside of a categorical domain have no
    /// mapping.
    pub fn scale(&self, value: &Value) -> Option<R> {
        match self {
            Self::Threshold { .. } | Self::Continuous { .. } => self.scale_number(value.as_f64()?),
            Self::Ordinal { lookup, range } => {
                let index = lookup.get(&value.category_key()?)?;
                range.get(index % range.len()).cloned()
            }
            Self::Point { lookup, start, end } => {
                let index = *lookup.get(&value.category_key()?)?;
                let t = if lookup.len() < 2 {
                    0.5
                } else {
                    index as f64 / (lookup.len() - 1) as f64
                };
                Some(start.interpolate(end, t))
            }
        }
    }
}

fn transform_of(scale_type: ScaleType) -> Transform {
    match scale_type {
        ScaleType::Sqrt => Transform::Sqrt,
        ScaleType::Log => Transform::Log,
        _ => Transform::Linear,
    }
}

fn category_lookup(values: &[String]) -> HashMap<String, usize> {
    let mut lookup = HashMap::with_capacity(values.len());
    for (index, value) in values.iter().enumerate() {
        lookup.entry(value.clone()).or_insert(index);
    }

    lookup
}

/// `n - 1` thresholds splitting `[x0, x1]` into `n` buckets of equal width.
fn quantize_thresholds(x0: f64, x1: f64, n: usize) -> Vec<f64> {
    let count = n.saturating_sub(1);
    (0..count)
        .map(|i| {
            let i = i as f64;
            let count = count as f64;
            ((i + 1.0) * x1 - (i - count) * x0) / (count + 1.0)
        })
        .collect()
}

/// `n - 1` thresholds splitting sorted samples into `n` buckets of equal count.
fn quantile_thresholds(sorted: &[f64], n: usize) -> Vec<f64> {
    if sorted.is_empty() {
        return vec![];
    }

    (1..n)
        .map(|i| quantile_sorted(sorted, i as f64 / n as f64))
        .collect()
}

/// Quantile of sorted samples with linear interpolation between closest ranks.
pub(crate) fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if p <= 0.0 || n < 2 {
        return sorted[0];
    }
    if p >= 1.0 {
        return sorted[n - 1];
    }

    let position = (n - 1) as f64 * p;
    let lower = position.floor() as usize;
    let value0 = sorted[lower];
    let value1 = sorted[lower + 1];

    value0 + (value1 - value0) * (position - lower as f64)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    use super::*;
    use crate::color::Color;

    #[test]
    fn quantize() {
        let scale = Scale::new(
            ScaleType::Quantize,
            &Domain::Ordered([0.0, 3.0]),
            &[10.0, 20.0, 30.0],
        )
        .unwrap();
        assert_matches!(&scale, Scale::Threshold { thresholds, .. } if thresholds == &vec![1.0, 2.0]);

        assert_eq!(scale.scale_number(0.0), Some(10.0));
        assert_eq!(scale.scale_number(0.99), Some(10.0));
        assert_eq!(scale.scale_number(1.0), Some(20.0));
        assert_eq!(scale.scale_number(2.5), Some(30.0));
        assert_eq!(scale.scale_number(10.0), Some(30.0));
        assert_eq!(scale.scale_number(-10.0), Some(10.0));
        assert_eq!(scale.scale(&Value::Null), None);
        assert_eq!(scale.scale_number(f64::NAN), None);
    }

    #[test]
    fn quantile() {
        let domain = Domain::Quantile(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let scale = Scale::new(ScaleType::Quantile, &domain, &[10.0, 20.0]).unwrap();
        assert_eq!(scale.scale_number(2.9), Some(10.0));
        assert_eq!(scale.scale_number(3.0), Some(20.0));
        assert_eq!(scale.scale(&Value::Integer(5)), Some(20.0));
    }

    #[test]
    fn quantile_of_sorted_samples() {
        let samples = [3.0, 6.0, 7.0, 8.0, 8.0, 10.0, 13.0, 15.0, 16.0, 20.0];
        assert_abs_diff_eq!(quantile_sorted(&samples, 0.25), 7.25);
        assert_abs_diff_eq!(quantile_sorted(&samples, 0.5), 9.0);
        assert_abs_diff_eq!(quantile_sorted(&samples, 1.0), 20.0);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn ordinal() {
        let colors = [Color::rgb(1, 0, 0), Color::rgb(2, 0, 0), Color::rgb(3, 0, 0)];
        let domain = Domain::Ordinal(vec!["apple".into(), "banana".into(), "orange".into()]);
        let scale = Scale::new(ScaleType::Ordinal, &domain, &colors).unwrap();

        assert_eq!(scale.scale(&Value::from("banana")), Some(colors[1]));
        assert_eq!(scale.scale(&Value::from("kiwi")), None);

        let short = Scale::new(ScaleType::Ordinal, &domain, &colors[..2]).unwrap();
        assert_eq!(short.scale(&Value::from("orange")), Some(colors[0]));
    }

    #[test]
    fn ordinal_numbers_use_category_keys() {
        let domain = Domain::Ordinal(vec!["1".into(), "2".into()]);
        let scale = Scale::new(ScaleType::Ordinal, &domain, &[5.0, 6.0]).unwrap();
        assert_eq!(scale.scale(&Value::Integer(2)), Some(6.0));
        assert_eq!(scale.scale_number(1.0), Some(5.0));
    }

    #[test]
    fn point() {
        let domain = Domain::Ordinal(vec!["a".into(), "b".into(), "c".into()]);
        let scale = Scale::new(ScaleType::Point, &domain, &[0.0, 10.0]).unwrap();
        assert_eq!(scale.scale(&Value::from("a")), Some(0.0));
        assert_eq!(scale.scale(&Value::from("b")), Some(5.0));
        assert_eq!(scale.scale(&Value::from("c")), Some(10.0));

        let single = Scale::new(ScaleType::Point, &Domain::Ordinal(vec!["a".into()]), &[0.0, 10.0])
            .unwrap();
        assert_eq!(single.scale(&Value::from("a")), Some(5.0));
    }

    #[test]
    fn continuous() {
        let domain = Domain::Ordered([0.0, 100.0]);
        let linear = Scale::new(ScaleType::Linear, &domain, &[0.0, 10.0]).unwrap();
        assert_eq!(linear.scale_number(50.0), Some(5.0));
        assert_eq!(linear.scale_number(200.0), Some(20.0));

        let sqrt = Scale::new(ScaleType::Sqrt, &domain, &[0.0, 10.0]).unwrap();
        assert_abs_diff_eq!(sqrt.scale_number(25.0).unwrap(), 5.0);

        let log = Scale::new(ScaleType::Log, &Domain::Ordered([1.0, 100.0]), &[0.0, 2.0]).unwrap();
        assert_abs_diff_eq!(log.scale_number(10.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(log.scale_number(0.0), None);
        assert_eq!(log.scale_number(-1.0), None);

        assert!(Scale::new(ScaleType::Log, &Domain::Ordered([0.0, 1.0]), &[0.0, 1.0]).is_none());
    }

    #[test]
    fn degenerate_domain_maps_to_range_middle() {
        let scale = Scale::new(ScaleType::Linear, &Domain::Ordered([3.0, 3.0]), &[0.0, 10.0]).unwrap();
        assert_eq!(scale.scale_number(3.0), Some(5.0));
        assert_eq!(scale.scale_number(100.0), Some(5.0));
    }

    #[test]
    fn mismatched_domain() {
        let domain = Domain::Ordinal(vec!["a".into()]);
        assert!(Scale::new(ScaleType::Linear, &domain, &[0.0, 1.0]).is_none());
        assert!(Scale::<f64>::new(ScaleType::Ordinal, &domain, &[]).is_none());
    }
}
