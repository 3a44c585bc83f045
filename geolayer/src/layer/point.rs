use std::sync::Arc;

use geolayer_types::{Position, Rect};
use serde_json::json;

use super::{
    channel_triggers, point_bounds, point_position, radius_accessor, Accessor, FormatContext,
    LayerData, LayerFormatter, LayerItem, LayerKind, TextLabelData,
};
use crate::channel::{bind_channel, ChannelRange, ChannelScale, VisualChannel};
use crate::color::Color;
use crate::config::{ChannelSlot, LayerConfig, TextLabel};
use crate::dataset::{Row, Value};

const CHANNELS: &[VisualChannel] = &[
    VisualChannel {
        key: "color",
        label: "Color",
        accessor: "getFillColor",
        slot: ChannelSlot::Color,
        range: ChannelRange::Color,
        aggregation: None,
        channel_scale: ChannelScale::Color,
        default_measure: None,
        condition: None,
    },
    VisualChannel {
        key: "strokeColor",
        label: "Stroke Color",
        accessor: "getLineColor",
        slot: ChannelSlot::StrokeColor,
        range: ChannelRange::StrokeColor,
        aggregation: None,
        channel_scale: ChannelScale::Color,
        default_measure: None,
        condition: Some(|config: &LayerConfig| config.vis_config.outline),
    },
    VisualChannel {
        key: "size",
        label: "Radius",
        accessor: "getRadius",
        slot: ChannelSlot::Size,
        range: ChannelRange::Radius,
        aggregation: None,
        channel_scale: ChannelScale::Radius,
        default_measure: None,
        condition: None,
    },
];

/// Circles at the positions of the `lat`, `lng` and optional `altitude` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointLayer;

impl LayerFormatter for PointLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Point
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["lat", "lng"]
    }

    fn optional_columns(&self) -> &'static [&'static str] {
        &["altitude"]
    }

    fn visual_channels(&self) -> &'static [VisualChannel] {
        CHANNELS
    }

    fn vis_config_keys(&self) -> &'static [&'static str] {
        &[
            "radius",
            "fixedRadius",
            "opacity",
            "outline",
            "thickness",
            "strokeColor",
            "colorRange",
            "strokeColorRange",
            "radiusRange",
            "filled",
        ]
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
        let [color, stroke_color, size] = [&CHANNELS[0], &CHANNELS[1], &CHANNELS[2]];

        let fill_colors = ctx.colors.colors(&vis.color_range);
        let stroke_colors = ctx.colors.colors(&vis.stroke_color_range);
        let line_color = vis.stroke_color.unwrap_or(config.color);

        let get_radius = radius_accessor(config, size, rows);

        let mut layer_data = LayerData {
            get_fill_color: Some(bind_channel(
                config,
                color,
                rows,
                fill_colors.as_slice(),
                config.color,
                Color::TRANSPARENT,
            )),
            get_line_color: Some(bind_channel(
                config,
                stroke_color,
                rows,
                stroke_colors.as_slice(),
                line_color,
                Color::TRANSPARENT,
            )),
            get_radius: Some(get_radius),
            get_filter_value: Some(ctx.filter_value_accessor()),
            text_labels: text_labels(&config.text_label, rows, &data),
            ..Default::default()
        };

        let triggers = &mut layer_data.update_triggers;
        triggers.insert("getPosition", ctx.column_triggers());
        triggers.insert(
            "getFillColor",
            channel_triggers(color, config, json!({ "color": config.color })),
        );
        triggers.insert(
            "getLineColor",
            channel_triggers(
                stroke_color,
                config,
                json!({ "strokeColor": line_color, "outline": vis.outline }),
            ),
        );
        triggers.insert(
            "getRadius",
            channel_triggers(size, config, json!({ "fixedRadius": vis.fixed_radius })),
        );
        triggers.insert("getFilterValue", ctx.filter_value_triggers());

        layer_data.data = data;
        layer_data.get_position = Some(get_position);
        layer_data
    }
}

/// Text labels with a field. Every label lists the distinct characters of its texts so the renderer can
/// build a font atlas.
fn text_labels(labels: &[TextLabel], rows: &Arc<Vec<Row>>, data: &[LayerItem]) -> Vec<TextLabelData> {
    labels
        .iter()
        .filter_map(|label| {
            let field_index = label.field.as_ref()?.table_field_index;
            let text_of = {
                let rows = rows.clone();
                move |item: &LayerItem| match rows.get(item.index).and_then(|row| row.get(field_index)) {
                    Some(value) if !value.is_null() => label_text(value),
                    _ => String::new(),
                }
            };

            let mut character_set: Vec<char> = vec![];
            for item in data {
                for c in text_of(item).chars() {
                    if !character_set.contains(&c) {
                        character_set.push(c);
                    }
                }
            }

            Some(TextLabelData {
                label: label.clone(),
                character_set,
                get_text: Accessor::function(text_of),
            })
        })
        .collect()
}

fn label_text(value: &Value) -> String {
    match value {
        Value::GeoJson(_) => String::new(),
        other => other.to_string(),
    }
}
