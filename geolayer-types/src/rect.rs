//! Axis-aligned rectangles and geographic bounds.

use num_traits::Num;
use serde::{Deserialize, Serialize};

const LNG_LIMIT: [f64; 2] = [-180.0, 180.0];
const LAT_LIMIT: [f64; 2] = [-90.0, 90.0];

/// Axis-aligned rectangle. For geographic data `x` is longitude and `y` is latitude.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect<N = f64> {
    /// Minimum x (longitude).
    pub x_min: N,
    /// Minimum y (latitude).
    pub y_min: N,
    /// Maximum x (longitude).
    pub x_max: N,
    /// Maximum y (latitude).
    pub y_max: N,
}

impl<N: Num + Copy> Rect<N> {
    /// Creates a new rectangle.
    pub fn new(x_min: N, y_min: N, x_max: N, y_max: N) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// `[x_min, y_min, x_max, y_max]`, i.e. `[minLng, minLat, maxLng, maxLat]` for geographic bounds.
    pub fn to_array(&self) -> [N; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

impl Rect<f64> {
    /// Folds `(lng, lat)` pairs into geographic bounds.
    ///
    /// Each axis is reduced independently: a pair with a missing (non-finite) longitude still contributes its
    /// latitude. The result is clamped to `[-180, 180]` and `[-90, 90]`. Returns `None` if either axis has no
    /// finite values at all.
    pub fn from_lng_lat(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut lng: Option<(f64, f64)> = None;
        let mut lat: Option<(f64, f64)> = None;

        for (x, y) in pairs {
            if x.is_finite() {
                lng = Some(extend(lng, x));
            }
            if y.is_finite() {
                lat = Some(extend(lat, y));
            }
        }

        let (x_min, x_max) = lng?;
        let (y_min, y_max) = lat?;

        Some(Self {
            x_min: x_min.max(LNG_LIMIT[0]),
            y_min: y_min.max(LAT_LIMIT[0]),
            x_max: x_max.min(LNG_LIMIT[1]),
            y_max: y_max.min(LAT_LIMIT[1]),
        })
    }
}

fn extend(range: Option<(f64, f64)>, value: f64) -> (f64, f64) {
    match range {
        Some((min, max)) => (min.min(value), max.max(value)),
        None => (value, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lng_lat_bounds_skip_missing_axis_values() {
        let rect = Rect::from_lng_lat([
            (-122.40894, 37.778564),
            (f64::NAN, 38.281445),
            (-121.96353, 37.37006),
        ])
        .expect("no bounds");

        assert_eq!(rect.to_array(), [-122.40894, 37.37006, -121.96353, 38.281445]);
    }

    #[test]
    fn lng_lat_bounds_empty() {
        assert!(Rect::from_lng_lat([]).is_none());
        assert!(Rect::from_lng_lat([(f64::NAN, 1.0)]).is_none());
    }

    #[test]
    fn lng_lat_bounds_are_clamped() {
        let rect = Rect::from_lng_lat([(-200.0, -95.0), (10.0, 10.0)]).expect("no bounds");
        assert_eq!(rect.to_array(), [-180.0, -90.0, 10.0, 10.0]);
    }
}
