use std::sync::Arc;

use geojson::{GeoJson, Geometry};
use geolayer_types::Position;

use crate::dataset::{Dataset, Datasets, Field, FieldType, Value};

mod scenarios;

/// Positions of the rows of [`points_dataset`] that have one.
pub const POSITIONS: [Position; 3] = [
    Position::lnglat(31.13, 29.98),
    Position::lnglat(31.24, 30.04),
    Position::lnglat(29.9, 31.2),
];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn datasets(dataset: Dataset) -> Datasets {
    init_logger();
    let mut datasets = Datasets::default();
    datasets.insert(dataset.id.clone(), dataset);
    datasets
}

fn real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

/// Points with a missing latitude in row 2 and a missing value in row 1.
pub fn points_dataset() -> Dataset {
    let rows = [
        (Some(29.98), 31.13, Some(1.0), "giza"),
        (Some(30.04), 31.24, None, "zoo"),
        (None, 31.0, Some(9.0), "nile"),
        (Some(31.2), 29.9, Some(16.0), "alex"),
    ];

    Dataset::new(
        "points",
        vec![
            Field::new("lat", FieldType::Real, 0),
            Field::new("lng", FieldType::Real, 1),
            Field::new("value", FieldType::Real, 2),
            Field::new("name", FieldType::String, 3),
        ],
        rows.into_iter()
            .map(|(lat, lng, value, name)| {
                vec![real(lat), Value::Real(lng), real(value), Value::from(name)]
            })
            .collect(),
    )
}

/// Trips between pickup and dropoff positions. Row 3 has no pickup latitude.
pub fn trips_dataset() -> Dataset {
    let rows = [
        (Some(40.75196075), -73.99389648, 40.7868576, -73.9831543, "orange peel", 12.0),
        (Some(40.71858978), -73.95, 40.74, -73.86306, "banana peel", 26.0),
        (Some(40.73), -73.98397827, 40.76, -73.9, "apple tree", 11.5),
        (None, -73.97, 40.75, -73.91, "banana peel", 20.0),
    ];

    Dataset::new(
        "trips",
        vec![
            Field::new("trip_id", FieldType::Integer, 0),
            Field::new("pickup_lat", FieldType::Real, 1),
            Field::new("pickup_lng", FieldType::Real, 2),
            Field::new("dropoff_lat", FieldType::Real, 3),
            Field::new("dropoff_lng", FieldType::Real, 4),
            Field::new("fruit", FieldType::String, 5),
            Field::new("fare", FieldType::Real, 6),
        ],
        rows.into_iter()
            .enumerate()
            .map(|(i, (lat0, lng0, lat1, lng1, fruit, fare))| {
                vec![
                    Value::Integer(i as i64),
                    real(lat0),
                    Value::Real(lng0),
                    Value::Real(lat1),
                    Value::Real(lng1),
                    Value::from(fruit),
                    Value::Real(fare),
                ]
            })
            .collect(),
    )
}

/// Shapes stored as GeoJSON text or parsed geometries. Rows 0 and 3 have no valid shape.
pub fn shapes_dataset() -> Dataset {
    let polygon = r#"{
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[31.0, 29.9], [31.3, 29.9], [31.3, 30.1], [31.0, 29.9]]]
        },
        "properties": {"fillColor": [255, 0, 0], "elevation": 10}
    }"#;
    let point = GeoJson::Geometry(Geometry::new(geojson::Value::Point(vec![31.2, 30.0])));
    let line = r#"{"type": "LineString", "coordinates": [[30.9, 30.2], [31.1, 30.3]]}"#;

    let shapes = [
        Value::Null,
        Value::from(polygon),
        Value::GeoJson(Arc::new(point)),
        Value::from("not a shape"),
        Value::from(line),
    ];

    Dataset::new(
        "shapes",
        vec![
            Field::new("id", FieldType::Integer, 0),
            Field::new("shape", FieldType::Geojson, 1),
            Field::new("value", FieldType::Real, 2),
        ],
        shapes
            .into_iter()
            .enumerate()
            .map(|(i, shape)| vec![Value::Integer(i as i64), shape, Value::Real(i as f64)])
            .collect(),
    )
}

/// Events with icons. Row 2 has no longitude, rows 4 and 6 have no icon.
pub fn icons_dataset() -> Dataset {
    let rows = [
        (37.778564, Some(-122.40894), "accel"),
        (37.78824, Some(-122.40894), "add-person"),
        (38.281445, None, "alert"),
        (37.79354, Some(-122.40121), "android"),
        (37.456535, Some(-122.136795), ""),
        (37.40066, Some(-122.10239), "attach"),
        (37.798237, Some(-122.41889), ""),
        (37.37006, Some(-121.96353), "car-suv"),
    ];

    Dataset::new(
        "icons",
        vec![
            Field::new("time", FieldType::Timestamp, 0),
            Field::new("event_lat", FieldType::Real, 1),
            Field::new("event_lng", FieldType::Real, 2),
            Field::new("icon", FieldType::String, 3),
        ],
        rows.into_iter()
            .enumerate()
            .map(|(i, (lat, lng, icon))| {
                vec![
                    Value::Timestamp(1_467_144_126_000 + i as i64 * 60_000),
                    Value::Real(lat),
                    real(lng),
                    Value::from(icon),
                ]
            })
            .collect(),
    )
}
