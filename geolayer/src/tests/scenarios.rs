//! End-to-end behavior of layers across formatting passes.

use std::sync::Arc;

use assert_matches::assert_matches;

use super::{datasets, points_dataset, POSITIONS};
use crate::aggregate::Aggregation;
use crate::channel::ChannelChange;
use crate::color::{Color, ColorRange};
use crate::config::{ChannelSlot, LayerConfig};
use crate::dataset::{
    Dataset, Field, FieldType, FilterRange, GpuFilter, Value, NULL_FILTER_VALUE,
};
use crate::domain::Domain;
use crate::layer::{Layer, LayerKind, LayerState};
use crate::scale::ScaleType;
use crate::triggers::Recompute;

fn point_config() -> LayerConfig {
    let mut config = Layer::default_config(LayerKind::Point)
        .with_column("lat", "lat")
        .with_column("lng", "lng");
    config.data_id = Some("points".into());
    config
}

fn value_field() -> Field {
    Field::new("value", FieldType::Real, 2)
}

fn grid_dataset() -> Dataset {
    let rows = (0..5)
        .map(|i| {
            vec![
                Value::Real(30.0 + i as f64 * 0.001),
                Value::Real(31.2),
                Value::Real(i as f64 + 1.0),
            ]
        })
        .collect();

    Dataset::new(
        "grid",
        vec![
            Field::new("lat", FieldType::Real, 0),
            Field::new("lng", FieldType::Real, 1),
            Field::new("time", FieldType::Real, 2),
        ],
        rows,
    )
}

#[test]
fn grid_counts_filtered_points() {
    let mut config = Layer::default_config(LayerKind::Grid)
        .with_column("lat", "lat")
        .with_column("lng", "lng");
    config.data_id = Some("grid".into());
    let mut layer = Layer::new("grid", LayerKind::Grid, config);

    let dataset = grid_dataset().with_filtered_index(vec![0, 2, 4]);
    let data = layer.format_layer_data(&datasets(dataset.clone()));
    assert_eq!(data.data.len(), 3);
    let get_color_value = data.get_color_value.as_ref().unwrap();
    assert_eq!(get_color_value(data.data.as_slice()), 3.0);

    // Times of the items are 1, 3 and 5.
    let time = Field::new("time", FieldType::Real, 2);
    let filtered = dataset.with_gpu_filter(GpuFilter {
        filter_range: FilterRange::new([1.0, 0.0, 0.0, 0.0], [3.0, 0.0, 0.0, 0.0]),
        filter_fields: [Some(time), None, None, None],
    });
    let data = layer.format_layer_data(&datasets(filtered));
    let get_color_value = data.get_color_value.as_ref().unwrap();
    assert_eq!(get_color_value(data.data.as_slice()), 2.0);
    let get_elevation_value = data.get_elevation_value.as_ref().unwrap();
    assert_eq!(get_elevation_value(data.data.as_slice()), 2.0);
}

#[test]
fn arc_ordinal_color() {
    let dataset = Dataset::new(
        "fruits",
        vec![
            Field::new("lat0", FieldType::Real, 0),
            Field::new("lng0", FieldType::Real, 1),
            Field::new("lat1", FieldType::Real, 2),
            Field::new("lng1", FieldType::Real, 3),
            Field::new("fruit", FieldType::String, 4),
        ],
        ["orange", "banana", "apple"]
            .into_iter()
            .map(|fruit| {
                vec![
                    Value::Real(40.7),
                    Value::Real(-73.9),
                    Value::Real(40.8),
                    Value::Real(-74.0),
                    Value::from(fruit),
                ]
            })
            .collect(),
    );

    let mut config = Layer::default_config(LayerKind::Arc)
        .with_column("lat0", "lat0")
        .with_column("lng0", "lng0")
        .with_column("lat1", "lat1")
        .with_column("lng1", "lng1")
        .with_field(
            ChannelSlot::Color,
            Some(Field::new("fruit", FieldType::String, 4)),
        )
        .with_scale(ChannelSlot::Color, ScaleType::Ordinal);
    config.data_id = Some("fruits".into());
    config.vis_config.color_range = ColorRange::from_hex(&["#FF0000", "#00FF00", "#0000FF"]);

    let mut layer = Layer::new("arcs", LayerKind::Arc, config);
    let data = layer.format_layer_data(&datasets(dataset));

    assert_eq!(
        layer.config().channel(ChannelSlot::Color).map(|c| &c.domain),
        Some(&Domain::Ordinal(vec![
            "apple".into(),
            "banana".into(),
            "orange".into()
        ]))
    );
    let banana = &data.data[1];
    assert_eq!(
        data.get_source_color.as_ref().unwrap().get(banana),
        Color::rgb(0, 255, 0)
    );
}

#[test]
fn non_finite_positions_are_dropped() {
    let mut dataset = points_dataset();
    let mut rows = dataset.all_data.as_ref().clone();
    rows[0][1] = Value::Real(f64::INFINITY);
    dataset.all_data = Arc::new(rows);

    let mut layer = Layer::new("points", LayerKind::Point, point_config());
    let data = layer.format_layer_data(&datasets(dataset));

    let indices: Vec<usize> = data.data.iter().map(|item| item.index).collect();
    assert_eq!(indices, vec![1, 3]);
    assert!(data
        .data
        .iter()
        .all(|item| item.position.is_some_and(|p| p.is_finite())));
}

#[test]
fn domain_ignores_live_filter() {
    let config = point_config()
        .with_field(ChannelSlot::Color, Some(value_field()))
        .with_scale(ChannelSlot::Color, ScaleType::Quantize);
    let mut layer = Layer::new("points", LayerKind::Point, config);

    let dataset = points_dataset();
    layer.format_layer_data(&datasets(dataset.clone()));
    let domain = layer.config().channel(ChannelSlot::Color).map(|c| c.domain.clone());
    assert_eq!(domain, Some(Domain::Ordered([1.0, 16.0])));

    let data = layer.format_layer_data(&datasets(dataset.clone().with_filtered_index(vec![0])));
    assert_eq!(data.data.len(), 1);
    assert_eq!(
        layer.config().channel(ChannelSlot::Color).map(|c| c.domain.clone()),
        domain
    );

    layer.format_layer_data(&datasets(dataset.with_filtered_index_for_domain(vec![0, 2])));
    assert_eq!(
        layer.config().channel(ChannelSlot::Color).map(|c| c.domain.clone()),
        Some(Domain::Ordered([1.0, 9.0]))
    );
}

#[test]
fn opacity_change_is_style_only() {
    let mut layer = Layer::new("points", LayerKind::Point, point_config());
    let datasets = datasets(points_dataset());
    let first = layer.format_layer_data(&datasets);
    let bounds = layer.meta().bounds;
    assert!(bounds.is_some());

    let mut vis = layer.config().vis_config.clone();
    vis.opacity = 0.3;
    let delta = layer.update_layer_vis_config(vis);
    assert_eq!(delta.changed_keys, vec!["opacity"]);
    assert_eq!(delta.recompute, Recompute::Style);
    assert_eq!(layer.state(), LayerState::Configured);

    let second = layer.format_layer_data(&datasets);
    assert_eq!(layer.state(), LayerState::Formatted);
    assert_eq!(layer.meta().bounds, bounds);
    assert!(Arc::ptr_eq(&first.data, &second.data));
    assert!(first
        .get_position
        .as_ref()
        .unwrap()
        .ptr_eq(second.get_position.as_ref().unwrap()));
}

#[test]
fn unchanged_layer_reuses_payload() {
    let config = point_config()
        .with_field(ChannelSlot::Size, Some(value_field()))
        .with_scale(ChannelSlot::Size, ScaleType::Sqrt);
    let mut layer = Layer::new("points", LayerKind::Point, config);
    let datasets = datasets(points_dataset());
    let first = layer.format_layer_data(&datasets);

    let unchanged = layer.config().as_ref().clone();
    assert_eq!(layer.update_layer_config(unchanged).recompute, Recompute::Nothing);

    let second = layer.format_layer_data(&datasets);
    assert!(first
        .get_radius
        .as_ref()
        .unwrap()
        .ptr_eq(second.get_radius.as_ref().unwrap()));
}

#[test]
fn radius_change_rebuilds_accessors_but_keeps_items() {
    let mut layer = Layer::new("points", LayerKind::Point, point_config());
    let datasets = datasets(points_dataset());
    let first = layer.format_layer_data(&datasets);

    let mut vis = layer.config().vis_config.clone();
    vis.radius_range = [0.0, 20.0];
    assert_eq!(layer.update_layer_vis_config(vis).recompute, Recompute::Full);

    let second = layer.format_layer_data(&datasets);
    assert!(Arc::ptr_eq(&first.data, &second.data));
    assert_eq!(
        second.update_triggers["getRadius"]["radiusRange"],
        serde_json::json!([0.0, 20.0])
    );
}

#[test]
fn new_rows_without_positions_keep_bounds() {
    let mut layer = Layer::new("points", LayerKind::Point, point_config());
    layer.format_layer_data(&datasets(points_dataset()));
    let bounds = layer.meta().bounds;

    let mut empty = points_dataset();
    empty.all_data = Arc::new(vec![vec![Value::Null, Value::Null, Value::Null, Value::Null]]);
    empty.filtered_index = vec![0];
    empty.filtered_index_for_domain = vec![0];
    let data = layer.format_layer_data(&datasets(empty));

    assert!(data.data.is_empty());
    assert_eq!(layer.meta().bounds, bounds);
}

#[test]
fn lifecycle() {
    let mut layer = Layer::new(
        "points",
        LayerKind::Point,
        Layer::default_config(LayerKind::Point),
    );
    assert_eq!(layer.state(), LayerState::Uninitialized);
    let data = layer.format_layer_data(&datasets(points_dataset()));
    assert_eq!(data.keys(), vec!["data"]);
    assert_eq!(layer.state(), LayerState::Uninitialized);

    layer.update_layer_config(point_config());
    assert_eq!(layer.state(), LayerState::Configured);

    let mut missing = point_config();
    missing.data_id = Some("unknown".into());
    layer.update_layer_config(missing);
    let data = layer.format_layer_data(&datasets(points_dataset()));
    assert!(data.data.is_empty());
    assert_ne!(layer.state(), LayerState::Formatted);

    layer.update_layer_config(point_config());
    let data = layer.format_layer_data(&datasets(points_dataset()));
    assert_eq!(data.data.len(), 3);
    assert_eq!(layer.state(), LayerState::Formatted);
}

#[test]
fn visual_channel_validation() {
    let mut layer = Layer::new("points", LayerKind::Point, point_config());
    let name = Field::new("name", FieldType::String, 3);
    let config = layer
        .config()
        .as_ref()
        .clone()
        .with_field(ChannelSlot::Size, Some(name));

    let changes = layer.update_layer_visual_channel(config, "size", &points_dataset());
    assert_eq!(
        changes,
        vec![ChannelChange::ScaleReset {
            channel: "size",
            from: ScaleType::Linear,
            to: ScaleType::Point
        }]
    );
    assert_eq!(
        layer.config().channel(ChannelSlot::Size).map(|c| c.domain.clone()),
        Some(Domain::Ordinal(vec![
            "alex".into(),
            "giza".into(),
            "nile".into(),
            "zoo".into()
        ]))
    );
    assert!(layer.validate_visual_channel("unknown").is_empty());
}

#[test]
fn grid_aggregation_validation() {
    let mut config = Layer::default_config(LayerKind::Grid)
        .with_column("lat", "lat")
        .with_column("lng", "lng")
        .with_field(
            ChannelSlot::Color,
            Some(Field::new("name", FieldType::String, 3)),
        );
    config.data_id = Some("points".into());
    let mut layer = Layer::new("grid", LayerKind::Grid, config);

    let changes = layer.validate_visual_channel("color");
    assert_matches!(
        changes[0],
        ChannelChange::AggregationReset {
            from: Aggregation::Mean,
            to: Aggregation::Mode,
            ..
        }
    );
    assert_eq!(layer.config().scale(ChannelSlot::Color), ScaleType::Ordinal);
    assert_eq!(
        layer
            .visual_channel_description("color")
            .and_then(|d| d.measure),
        Some("Mode of name".to_string())
    );
}

#[test]
fn null_filter_values() {
    let dataset = points_dataset().with_gpu_filter(GpuFilter {
        filter_range: FilterRange::default(),
        filter_fields: [Some(value_field()), None, None, None],
    });
    let mut layer = Layer::new("points", LayerKind::Point, point_config());
    let data = layer.format_layer_data(&datasets(dataset));

    let get_filter_value = data.get_filter_value.as_ref().unwrap();
    assert_eq!(get_filter_value.get(&data.data[0]), [1.0, 0.0, 0.0, 0.0]);
    assert_eq!(
        get_filter_value.get(&data.data[1]),
        [NULL_FILTER_VALUE, 0.0, 0.0, 0.0]
    );
    assert_eq!(data.data[2].position, Some(POSITIONS[2]));
}

#[test]
fn settings_of_layer_type() {
    let layer = Layer::new("points", LayerKind::Point, point_config());
    let labels: Vec<&str> = layer
        .vis_config_settings()
        .iter()
        .map(|s| s.label)
        .collect();
    assert_eq!(labels[0], "Radius");
    assert!(labels.contains(&"Stroke Color"));
    assert_eq!(labels.len(), 10);
}

#[test]
fn domain_update_refreshes_accessors() {
    let mut config = point_config()
        .with_field(ChannelSlot::Color, Some(value_field()))
        .with_scale(ChannelSlot::Color, ScaleType::Quantize);
    config.vis_config.color_range = ColorRange::from_hex(&["#010101", "#020202", "#030303"]);

    let dataset = points_dataset();
    let mut layer = Layer::new("points", LayerKind::Point, config.clone());
    let first = layer.format_layer_data(&datasets(dataset.clone()));

    let narrowed = dataset.with_filtered_index_for_domain(vec![0]);
    assert!(layer.update_layer_domain(&narrowed));
    assert_eq!(layer.state(), LayerState::Configured);
    assert_eq!(layer.pending(), Recompute::Style);

    let second = layer.format_layer_data(&datasets(narrowed.clone()));
    assert!(Arc::ptr_eq(&first.data, &second.data));
    assert!(!first
        .get_fill_color
        .as_ref()
        .unwrap()
        .ptr_eq(second.get_fill_color.as_ref().unwrap()));

    let mut fresh = Layer::new("fresh", LayerKind::Point, config);
    let expected = fresh.format_layer_data(&datasets(narrowed));
    let colors = |data: &crate::layer::LayerData| -> Vec<Color> {
        data.data
            .iter()
            .map(|item| data.get_fill_color.as_ref().unwrap().get(item))
            .collect()
    };
    assert_eq!(colors(&second), colors(&expected));
}
