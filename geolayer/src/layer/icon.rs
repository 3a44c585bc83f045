use std::sync::Arc;

use geolayer_types::{Position, Rect};
use serde_json::json;

use super::{
    channel_triggers, point_bounds, point_position, radius_accessor, Accessor, FormatContext,
    LayerData, LayerFormatter, LayerItem, LayerKind,
};
use crate::channel::{bind_channel, ChannelRange, ChannelScale, VisualChannel};
use crate::color::Color;
use crate::config::ChannelSlot;

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

/// Icons named by the `icon` column, drawn at `lat`/`lng`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IconLayer;

impl LayerFormatter for IconLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Icon
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["lat", "lng", "icon"]
    }

    fn visual_channels(&self) -> &'static [VisualChannel] {
        CHANNELS
    }

    fn vis_config_keys(&self) -> &'static [&'static str] {
        &["radius", "fixedRadius", "opacity", "colorRange", "radiusRange"]
    }

    fn resolve_position(&self, ctx: &FormatContext<'_>, index: usize) -> Option<LayerItem> {
        let row = ctx.dataset.all_data.get(index)?;
        let icon = ctx.columns.value(row, "icon")?.as_str()?;
        if icon.is_empty() {
            return None;
        }

        let position = point_position(ctx.columns, row)?;
        Some(LayerItem {
            icon: Some(icon.to_string()),
            ..LayerItem::with_position(index, position)
        })
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
        let [color, size] = [&CHANNELS[0], &CHANNELS[1]];

        let colors = ctx.colors.colors(&vis.color_range);

        let mut layer_data = LayerData {
            data,
            get_position: Some(get_position),
            get_fill_color: Some(bind_channel(
                config,
                color,
                rows,
                colors.as_slice(),
                config.color,
                Color::TRANSPARENT,
            )),
            get_radius: Some(radius_accessor(config, size, rows)),
            get_filter_value: Some(ctx.filter_value_accessor()),
            ..Default::default()
        };

        let triggers = &mut layer_data.update_triggers;
        triggers.insert("getPosition", ctx.column_triggers());
        triggers.insert(
            "getFillColor",
            channel_triggers(color, config, json!({ "color": config.color })),
        );
        triggers.insert(
            "getRadius",
            channel_triggers(size, config, json!({ "fixedRadius": vis.fixed_radius })),
        );
        triggers.insert("getFilterValue", ctx.filter_value_triggers());

        layer_data
    }
}
