use std::sync::Arc;

use geolayer_types::{Position, Rect};

use super::{
    point_bounds, point_position, Accessor, FormatContext, LayerData, LayerFormatter, LayerItem,
    LayerKind,
};
use crate::channel::VisualChannel;

/// 3D models placed at `lat`, `lng` and optional `altitude`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenegraphLayer;

impl LayerFormatter for ScenegraphLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Scenegraph
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["lat", "lng"]
    }

    fn optional_columns(&self) -> &'static [&'static str] {
        &["altitude"]
    }

    fn visual_channels(&self) -> &'static [VisualChannel] {
        &[]
    }

    fn vis_config_keys(&self) -> &'static [&'static str] {
        &["opacity"]
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
        let mut layer_data = LayerData {
            data,
            get_position: Some(get_position),
            get_filter_value: Some(ctx.filter_value_accessor()),
            ..Default::default()
        };
        layer_data
            .update_triggers
            .insert("getPosition", ctx.column_triggers());
        layer_data
            .update_triggers
            .insert("getFilterValue", ctx.filter_value_triggers());

        layer_data
    }
}
