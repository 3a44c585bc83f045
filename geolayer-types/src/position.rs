//! Geographic positions.

use approx::AbsDiffEq;
use nalgebra::Point3;
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// A point on the surface of the Earth given by longitude and latitude in degrees.
pub trait GeoPoint {
    /// Numeric type used to represent coordinates.
    type Num: Float;

    /// Latitude in degrees.
    fn lat(&self) -> Self::Num;
    /// Longitude in degrees.
    fn lon(&self) -> Self::Num;

    /// Returns true if both coordinates are finite numbers.
    fn is_finite(&self) -> bool {
        self.lat().is_finite() && self.lon().is_finite()
    }
}

/// Position of a rendered item: longitude, latitude (degrees) and altitude.
///
/// This is the value returned by `getPosition`, `sourcePosition` and `targetPosition` accessors. A position
/// is only handed to the renderer if [`Position::is_finite`] holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    lng: f64,
    lat: f64,
    alt: f64,
}

impl Position {
    /// Creates a new position.
    pub const fn new(lng: f64, lat: f64, alt: f64) -> Self {
        Self { lng, lat, alt }
    }

    /// Creates a position on the ground level.
    pub const fn lnglat(lng: f64, lat: f64) -> Self {
        Self::new(lng, lat, 0.0)
    }

    /// Longitude in degrees.
    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Altitude.
    pub fn alt(&self) -> f64 {
        self.alt
    }

    /// Returns true if every component of the position is finite.
    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite() && self.alt.is_finite()
    }

    /// `[lng, lat, alt]` array as consumed by the renderer.
    pub fn to_array(&self) -> [f64; 3] {
        [self.lng, self.lat, self.alt]
    }
}

impl GeoPoint for Position {
    type Num = f64;

    fn lat(&self) -> f64 {
        self.lat
    }

    fn lon(&self) -> f64 {
        self.lng
    }
}

impl From<[f64; 3]> for Position {
    fn from(value: [f64; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl From<Position> for [f64; 3] {
    fn from(value: Position) -> Self {
        value.to_array()
    }
}

impl From<Point3<f64>> for Position {
    fn from(value: Point3<f64>) -> Self {
        Self::new(value.x, value.y, value.z)
    }
}

impl From<Position> for Point3<f64> {
    fn from(value: Position) -> Self {
        Point3::new(value.lng, value.lat, value.alt)
    }
}

impl AbsDiffEq for Position {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.lng.abs_diff_eq(&other.lng, epsilon)
            && self.lat.abs_diff_eq(&other.lat, epsilon)
            && self.alt.abs_diff_eq(&other.alt, epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finiteness() {
        assert!(Position::new(31.2, 29.9, 0.0).is_finite());
        assert!(!Position::new(f64::NAN, 29.9, 0.0).is_finite());
        assert!(!Position::new(31.2, f64::INFINITY, 0.0).is_finite());
        assert!(!Position::new(31.2, 29.9, f64::NAN).is_finite());
    }

    #[test]
    fn nalgebra_conversion() {
        let position = Position::new(1.0, 2.0, 3.0);
        let point: Point3<f64> = position.into();
        assert_eq!(point, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(Position::from(point), position);
        assert_eq!(<[f64; 3]>::from(position), [1.0, 2.0, 3.0]);
    }
}
