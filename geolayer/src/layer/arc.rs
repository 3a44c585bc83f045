use std::sync::Arc;

use geolayer_types::{Position, Rect};
use serde_json::json;

use super::{
    channel_triggers, Accessor, FormatContext, LayerData, LayerFormatter, LayerItem, LayerKind,
};
use crate::channel::{bind_channel, ChannelRange, ChannelScale, VisualChannel};
use crate::color::Color;
use crate::config::ChannelSlot;

const CHANNELS: &[VisualChannel] = &[
    VisualChannel {
        key: "sourceColor",
        label: "Source Color",
        accessor: "getSourceColor",
        slot: ChannelSlot::Color,
        range: ChannelRange::Color,
        aggregation: None,
        channel_scale: ChannelScale::Color,
        default_measure: None,
        condition: None,
    },
    VisualChannel {
        key: "targetColor",
        label: "Target Color",
        accessor: "getTargetColor",
        slot: ChannelSlot::Color,
        range: ChannelRange::Color,
        aggregation: None,
        channel_scale: ChannelScale::Color,
        default_measure: None,
        condition: None,
    },
    VisualChannel {
        key: "size",
        label: "Stroke Width",
        accessor: "getWidth",
        slot: ChannelSlot::Size,
        range: ChannelRange::Size,
        aggregation: None,
        channel_scale: ChannelScale::Size,
        default_measure: None,
        condition: None,
    },
];

/// Arcs from `lat0`/`lng0` to `lat1`/`lng1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcLayer;

fn endpoint(ctx: &FormatContext<'_>, row: &crate::dataset::Row, lat: &str, lng: &str) -> Position {
    Position::lnglat(ctx.columns.number(row, lng), ctx.columns.number(row, lat))
}

impl LayerFormatter for ArcLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Arc
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["lat0", "lng0", "lat1", "lng1"]
    }

    fn visual_channels(&self) -> &'static [VisualChannel] {
        CHANNELS
    }

    fn vis_config_keys(&self) -> &'static [&'static str] {
        &["opacity", "thickness", "colorRange", "sizeRange", "targetColor"]
    }

    fn resolve_position(&self, ctx: &FormatContext<'_>, index: usize) -> Option<LayerItem> {
        let row = ctx.dataset.all_data.get(index)?;
        let source = endpoint(ctx, row, "lat0", "lng0");
        let target = endpoint(ctx, row, "lat1", "lng1");
        if !source.is_finite() || !target.is_finite() {
            return None;
        }

        Some(LayerItem {
            index,
            source_position: Some(source),
            target_position: Some(target),
            ..Default::default()
        })
    }

    fn compute_bounds(&self, ctx: &FormatContext<'_>) -> Option<Rect> {
        let columns = ctx.columns;
        Rect::from_lng_lat(ctx.dataset.all_data.iter().flat_map(|row| {
            [
                (columns.number(row, "lng0"), columns.number(row, "lat0")),
                (columns.number(row, "lng1"), columns.number(row, "lat1")),
            ]
        }))
    }

    fn format_data(
        &self,
        ctx: &mut FormatContext<'_>,
        data: Arc<Vec<LayerItem>>,
        _get_position: Accessor<Position>,
    ) -> LayerData {
        let config = ctx.config;
        let vis = &config.vis_config;
        let rows = &ctx.dataset.all_data;
        let [source_color, target_color, size] = [&CHANNELS[0], &CHANNELS[1], &CHANNELS[2]];

        let colors = ctx.colors.colors(&vis.color_range);
        let target_constant = vis.target_color.unwrap_or(config.color);

        let mut layer_data = LayerData {
            data,
            get_source_color: Some(bind_channel(
                config,
                source_color,
                rows,
                colors.as_slice(),
                config.color,
                Color::TRANSPARENT,
            )),
            get_target_color: Some(bind_channel(
                config,
                target_color,
                rows,
                colors.as_slice(),
                target_constant,
                Color::TRANSPARENT,
            )),
            get_width: Some(bind_channel(config, size, rows, &vis.size_range, 1.0, 0.0)),
            get_filter_value: Some(ctx.filter_value_accessor()),
            ..Default::default()
        };

        let triggers = &mut layer_data.update_triggers;
        triggers.insert("sourcePosition", ctx.column_triggers());
        triggers.insert("targetPosition", ctx.column_triggers());
        triggers.insert(
            "getSourceColor",
            channel_triggers(source_color, config, json!({ "color": config.color })),
        );
        triggers.insert(
            "getTargetColor",
            channel_triggers(
                target_color,
                config,
                json!({ "color": config.color, "targetColor": target_constant }),
            ),
        );
        triggers.insert("getWidth", channel_triggers(size, config, json!({})));
        triggers.insert("getFilterValue", ctx.filter_value_triggers());

        layer_data
    }
}
