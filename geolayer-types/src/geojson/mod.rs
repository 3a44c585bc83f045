//! Helpers to walk [`geojson::Geometry`] values: collecting their vertices for bounds computation and
//! classifying them into point, line and polygon families.

use geojson::{LineStringType, Value};

use crate::error::GeolayerTypesError;

mod point;
pub use point::GeoJsonPoint;

/// Geometry family of a GeoJSON geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// `Point` or `MultiPoint`.
    Point,
    /// `LineString` or `MultiLineString`.
    Line,
    /// `Polygon` or `MultiPolygon`.
    Polygon,
}

/// Collects all vertices of the geometry. Fails if any of the positions has less than two coordinates.
pub fn collect_points(value: &Value) -> Result<Vec<GeoJsonPoint>, GeolayerTypesError> {
    let mut points = vec![];
    push_points(value, &mut points)?;
    Ok(points)
}

fn push_points(value: &Value, out: &mut Vec<GeoJsonPoint>) -> Result<(), GeolayerTypesError> {
    match value {
        Value::Point(p) => out.push(GeoJsonPoint::try_from(p.clone())?),
        Value::MultiPoint(points) | Value::LineString(points) => push_line(points, out)?,
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for line in lines {
                push_line(line, out)?;
            }
        }
        Value::MultiPolygon(polygons) => {
            for line in polygons.iter().flatten() {
                push_line(line, out)?;
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                push_points(&geometry.value, out)?;
            }
        }
    }

    Ok(())
}

fn push_line(
    line_string: &LineStringType,
    out: &mut Vec<GeoJsonPoint>,
) -> Result<(), GeolayerTypesError> {
    for p in line_string {
        out.push(GeoJsonPoint::try_from(p.clone())?);
    }

    Ok(())
}

/// Geometry families present in the geometry. Collections report every family of their members.
pub fn geometry_kinds(value: &Value) -> Vec<GeometryKind> {
    match value {
        Value::Point(_) | Value::MultiPoint(_) => vec![GeometryKind::Point],
        Value::LineString(_) | Value::MultiLineString(_) => vec![GeometryKind::Line],
        Value::Polygon(_) | Value::MultiPolygon(_) => vec![GeometryKind::Polygon],
        Value::GeometryCollection(geometries) => geometries
            .iter()
            .flat_map(|g| geometry_kinds(&g.value))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoPoint;

    #[test]
    fn polygon_points() {
        let value = Value::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]);

        let points = collect_points(&value).expect("valid polygon");
        assert_eq!(points.len(), 4);
        assert_eq!(points[2].lon(), 1.0);
        assert_eq!(points[2].lat(), 1.0);
        assert_eq!(geometry_kinds(&value), vec![GeometryKind::Polygon]);
    }

    #[test]
    fn invalid_position() {
        let value = Value::LineString(vec![vec![0.0, 0.0], vec![1.0]]);
        assert!(collect_points(&value).is_err());
    }

    #[test]
    fn collection_kinds() {
        let value = Value::GeometryCollection(vec![
            geojson::Geometry::new(Value::Point(vec![1.0, 2.0])),
            geojson::Geometry::new(Value::LineString(vec![vec![0.0, 0.0], vec![1.0, 1.0]])),
        ]);

        assert_eq!(
            geometry_kinds(&value),
            vec![GeometryKind::Point, GeometryKind::Line]
        );
        assert_eq!(collect_points(&value).expect("valid").len(), 3);
    }
}
