use geojson::Position as JsonPosition;

use crate::error::GeolayerTypesError;
use crate::position::{GeoPoint, Position};

/// A GeoJSON position that is known to have at least two coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJsonPoint(JsonPosition);

impl TryFrom<JsonPosition> for GeoJsonPoint {
    type Error = GeolayerTypesError;

    fn try_from(value: JsonPosition) -> Result<Self, Self::Error> {
        if value.len() < 2 {
            Err(GeolayerTypesError::Conversion(
                "point must contain at least 2 dimensions".to_string(),
            ))
        } else {
            Ok(GeoJsonPoint(value))
        }
    }
}

impl GeoJsonPoint {
    /// Altitude of the point, `0` if the position is two dimensional.
    pub fn alt(&self) -> f64 {
        self.0.get(2).copied().unwrap_or(0.0)
    }
}

impl GeoPoint for GeoJsonPoint {
    type Num = f64;

    fn lat(&self) -> Self::Num {
        self.0[1]
    }

    fn lon(&self) -> Self::Num {
        self.0[0]
    }
}

impl From<&GeoJsonPoint> for Position {
    fn from(value: &GeoJsonPoint) -> Self {
        Position::new(value.lon(), value.lat(), value.alt())
    }
}
