use std::sync::Arc;

use geolayer_types::{Position, Rect};
use serde_json::json;

use super::{
    channel_triggers, point_bounds, point_position, Accessor, FormatContext, LayerData,
    LayerFormatter, LayerItem, LayerKind,
};
use crate::aggregator::make_aggregator;
use crate::channel::{ChannelAggregation, ChannelRange, ChannelScale, VisualChannel};
use crate::config::{ChannelSlot, LayerConfig, VisConfig};
use crate::scale::ScaleType;

const CHANNELS: &[VisualChannel] = &[
    VisualChannel {
        key: "color",
        label: "Color",
        accessor: "getColorValue",
        slot: ChannelSlot::Color,
        range: ChannelRange::Color,
        aggregation: Some(ChannelAggregation::Color),
        channel_scale: ChannelScale::ColorAggr,
        default_measure: Some("Point Count"),
        condition: None,
    },
    VisualChannel {
        key: "size",
        label: "Height",
        accessor: "getElevationValue",
        slot: ChannelSlot::Size,
        range: ChannelRange::Size,
        aggregation: Some(ChannelAggregation::Size),
        channel_scale: ChannelScale::SizeAggr,
        default_measure: Some("Point Count"),
        condition: Some(|config: &LayerConfig| config.vis_config.enable3d),
    },
];

/// Rendering properties of a grid layer. The renderer bins the items into cells of `cell_size` meters and
/// maps the aggregated cell values onto colors and elevations.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRenderProps {
    /// Cell size in meters.
    pub cell_size: f64,
    /// Fraction of the cell covered by the drawn cell.
    pub coverage: f64,
    /// RGB triplets of the color range.
    pub color_range: Arc<Vec<[u8; 3]>>,
    /// Scale of cell colors.
    pub color_scale_type: ScaleType,
    /// Cells with color values outside of these percentiles are hidden.
    pub percentile: [f64; 2],
    /// Extrude the cells.
    pub extruded: bool,
    /// Elevation multiplier.
    pub elevation_scale: f64,
    /// Elevation range.
    pub elevation_range: [f64; 2],
    /// Scale of cell elevations.
    pub elevation_scale_type: ScaleType,
    /// Cells with elevation values outside of these percentiles are hidden.
    pub elevation_percentile: [f64; 2],
}

/// Points binned into a grid by the renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridLayer;

impl LayerFormatter for GridLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Grid
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["lat", "lng"]
    }

    fn visual_channels(&self) -> &'static [VisualChannel] {
        CHANNELS
    }

    fn non_data_affecting_keys(&self) -> &'static [&'static str] {
        &[
            "enable3d",
            "colorRange",
            "colorDomain",
            "sizeRange",
            "sizeScale",
            "sizeDomain",
            "percentile",
            "coverage",
            "elevationPercentile",
            "elevationScale",
        ]
    }

    fn vis_config_keys(&self) -> &'static [&'static str] {
        &[
            "opacity",
            "worldUnitSize",
            "colorRange",
            "coverage",
            "sizeRange",
            "percentile",
            "elevationPercentile",
            "elevationScale",
            "colorAggregation",
            "sizeAggregation",
            "enable3d",
        ]
    }

    fn default_vis_config(&self) -> VisConfig {
        VisConfig {
            size_range: [0.0, 500.0],
            ..Default::default()
        }
    }

    fn resolve_position(&self, ctx: &FormatContext<'_>, index: usize) -> Option<LayerItem> {
        let row = ctx.dataset.all_data.get(index)?;
        point_position(ctx.columns, row).map(|position| LayerItem::with_position(index, position))
    }

    fn compute_bounds(&self, ctx: &FormatContext<'_>) -> Option<Rect> {
        point_bounds(ctx, "lat", "lng")
    }

    fn format_data(
        &self,
        ctx: &mut FormatContext<'_>,
        data: Arc<Vec<LayerItem>>,
        get_position: Accessor<Position>,
    ) -> LayerData {
        let config = ctx.config;
        let vis = &config.vis_config;
        let rows = &ctx.dataset.all_data;
        let filter_range = ctx.dataset.gpu_filter.filter_range;
        let [color, size] = [&CHANNELS[0], &CHANNELS[1]];

        let get_color_value = make_aggregator(
            config.field(ChannelSlot::Color),
            vis.color_aggregation,
            filter_range,
            ctx.filter_value_accessor(),
            rows.clone(),
        );
        let get_elevation_value = make_aggregator(
            config.field(ChannelSlot::Size),
            vis.size_aggregation,
            filter_range,
            ctx.filter_value_accessor(),
            rows.clone(),
        );

        let colors = ctx.colors.colors(&vis.color_range);
        let grid = GridRenderProps {
            cell_size: vis.world_unit_size * 1000.0,
            coverage: vis.coverage,
            color_range: Arc::new(colors.iter().map(|c| c.to_rgb_array()).collect()),
            color_scale_type: config.scale(ChannelSlot::Color),
            percentile: vis.percentile,
            extruded: vis.enable3d,
            elevation_scale: vis.elevation_scale,
            elevation_range: vis.size_range,
            elevation_scale_type: config.scale(ChannelSlot::Size),
            elevation_percentile: vis.elevation_percentile,
        };

        let mut layer_data = LayerData {
            data,
            get_position: Some(get_position),
            get_color_value: Some(get_color_value),
            get_elevation_value: Some(get_elevation_value),
            grid: Some(grid),
            ..Default::default()
        };

        let filter = json!({
            "filterRange": filter_range,
            "filterFields": ctx.filter_value_triggers(),
        });
        let triggers = &mut layer_data.update_triggers;
        triggers.insert("getPosition", ctx.column_triggers());
        triggers.insert("getColorValue", channel_triggers(color, config, filter.clone()));
        triggers.insert("getElevationValue", channel_triggers(size, config, filter));
        triggers.insert("getFilterValue", ctx.filter_value_triggers());

        layer_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregation;
    use crate::dataset::{Field, FieldType};
    use crate::layer::Layer;
    use crate::tests::{datasets, points_dataset};

    fn config() -> LayerConfig {
        let mut config = Layer::default_config(LayerKind::Grid)
            .with_column("lat", "lat")
            .with_column("lng", "lng");
        config.data_id = Some("points".into());
        config
    }

    #[test]
    fn render_props() {
        let mut config = config();
        config.vis_config.world_unit_size = 0.5;
        config.vis_config.enable3d = true;

        let mut layer = Layer::new("grid", LayerKind::Grid, config);
        assert!(layer.is_aggregated());
        let data = layer.format_layer_data(&datasets(points_dataset()));

        assert_eq!(
            data.keys(),
            vec!["data", "getColorValue", "getElevationValue", "getPosition"]
        );
        let grid = data.grid.as_ref().unwrap();
        assert_eq!(grid.cell_size, 500.0);
        assert!(grid.extruded);
        assert_eq!(grid.elevation_range, [0.0, 500.0]);
        assert_eq!(grid.color_range.len(), 6);
        assert_eq!(grid.color_range[0], [0x5A, 0x18, 0x46]);
    }

    #[test]
    fn color_value_aggregates_field() {
        let mut config = config().with_field(
            ChannelSlot::Color,
            Some(Field::new("value", FieldType::Real, 2)),
        );
        config.vis_config.color_aggregation = Aggregation::Sum;

        let mut layer = Layer::new("grid", LayerKind::Grid, config);
        let data = layer.format_layer_data(&datasets(points_dataset()));

        let get_color_value = data.get_color_value.as_ref().unwrap();
        assert_eq!(get_color_value(data.data.as_slice()), 17.0);
        let get_elevation_value = data.get_elevation_value.as_ref().unwrap();
        assert_eq!(get_elevation_value(data.data.as_slice()), 3.0);
    }

    #[test]
    fn measure_description() {
        let mut config = config().with_field(
            ChannelSlot::Color,
            Some(Field::new("value", FieldType::Real, 2)),
        );
        config.vis_config.color_aggregation = Aggregation::Mean;
        let layer = Layer::new("grid", LayerKind::Grid, config);

        let color = layer.visual_channel_description("color").unwrap();
        assert_eq!(color.label, "Color");
        assert_eq!(color.measure.as_deref(), Some("Average of value"));
        let size = layer.visual_channel_description("size").unwrap();
        assert_eq!(size.measure.as_deref(), Some("Point Count"));
    }

    #[test]
    fn color_range_change_is_style_only() {
        let mut layer = Layer::new("grid", LayerKind::Grid, config());
        let datasets = datasets(points_dataset());
        let first = layer.format_layer_data(&datasets);

        let mut vis = layer.config().vis_config.clone();
        vis.color_range = crate::color::ColorRange::from_hex(&["#000000", "#FFFFFF"]);
        let delta = layer.update_layer_vis_config(vis);
        assert_eq!(delta.recompute, crate::triggers::Recompute::Style);

        let second = layer.format_layer_data(&datasets);
        assert!(Arc::ptr_eq(&first.data, &second.data));
        assert_eq!(
            second.grid.as_ref().unwrap().color_range.as_slice(),
            &[[0, 0, 0], [255, 255, 255]]
        );
    }
}
