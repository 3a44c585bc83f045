use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use geojson::{GeoJson, Geometry, JsonObject};
use geolayer_types::geojson::{collect_points, geometry_kinds, GeometryKind};
use geolayer_types::{GeoPoint, Position, Rect};
use serde::Serialize;
use serde_json::json;

use super::{
    channel_triggers, Accessor, FormatContext, LayerData, LayerFormatter, LayerItem, LayerKind,
};
use crate::channel::{bind_channel, ChannelRange, ChannelScale, VisualChannel};
use crate::color::Color;
use crate::config::{ChannelSlot, LayerConfig};
use crate::dataset::{Row, Value};

const DEFAULT_ELEVATION: f64 = 500.0;
const DEFAULT_LINE_WIDTH: f64 = 1.0;
const DEFAULT_RADIUS: f64 = 1.0;

const CHANNELS: &[VisualChannel] = &[
    VisualChannel {
        key: "color",
        label: "Fill Color",
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
        condition: Some(|config: &LayerConfig| config.vis_config.stroked),
    },
    VisualChannel {
        key: "size",
        label: "Stroke Width",
        accessor: "getLineWidth",
        slot: ChannelSlot::Size,
        range: ChannelRange::Size,
        aggregation: None,
        channel_scale: ChannelScale::Size,
        default_measure: None,
        condition: None,
    },
    VisualChannel {
        key: "height",
        label: "Height",
        accessor: "getElevation",
        slot: ChannelSlot::Height,
        range: ChannelRange::Height,
        aggregation: None,
        channel_scale: ChannelScale::Size,
        default_measure: None,
        condition: Some(|config: &LayerConfig| config.vis_config.enable3d),
    },
    VisualChannel {
        key: "radius",
        label: "Radius",
        accessor: "getRadius",
        slot: ChannelSlot::Radius,
        range: ChannelRange::Radius,
        aggregation: None,
        channel_scale: ChannelScale::Radius,
        default_measure: None,
        condition: None,
    },
];

/// A feature parsed from the GeoJSON column of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    /// Index of the row.
    pub index: usize,
    /// Geometry of the feature.
    pub geometry: Geometry,
    /// Properties of the feature. `fillColor`, `lineColor`, `lineWidth`, `elevation` and `radius` override
    /// the visual channels.
    pub properties: JsonObject,
}

impl GeoFeature {
    /// Parses the cell. Cells that are not a single geometry or feature with valid coordinates give `None`.
    pub fn from_cell(index: usize, cell: &Value) -> Option<Self> {
        let geojson = match cell {
            Value::GeoJson(geojson) => geojson.as_ref().clone(),
            Value::String(text) => match text.parse::<GeoJson>() {
                Ok(geojson) => geojson,
                Err(err) => {
                    log::debug!("Row {index}: invalid GeoJSON: {err}");
                    return None;
                }
            },
            _ => return None,
        };

        let (geometry, properties) = match geojson {
            GeoJson::Geometry(geometry) => (geometry, JsonObject::new()),
            GeoJson::Feature(feature) => (feature.geometry?, feature.properties.unwrap_or_default()),
            GeoJson::FeatureCollection(_) => {
                log::debug!("Row {index}: feature collections are not supported");
                return None;
            }
        };

        let points = collect_points(&geometry.value).ok()?;
        if points.is_empty() || !points.iter().all(|p| p.is_finite()) {
            return None;
        }

        Some(Self {
            index,
            geometry,
            properties,
        })
    }

    fn property<T>(&self, key: &str, parse: impl FnOnce(&serde_json::Value) -> Option<T>) -> Option<T> {
        self.properties.get(key).and_then(parse)
    }
}

/// Geometry families present in a GeoJSON layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureTypes {
    /// Has points.
    pub point: bool,
    /// Has lines.
    pub line: bool,
    /// Has polygons.
    pub polygon: bool,
}

impl FeatureTypes {
    fn add(&mut self, kind: GeometryKind) {
        match kind {
            GeometryKind::Point => self.point = true,
            GeometryKind::Line => self.line = true,
            GeometryKind::Polygon => self.polygon = true,
        }
    }
}

#[derive(Clone)]
struct FeatureCache {
    rows: Arc<Vec<Row>>,
    column: usize,
    features: Arc<Vec<Option<Arc<GeoFeature>>>>,
}

/// Features of the `geojson` column.
#[derive(Clone, Default)]
pub struct GeoJsonLayer {
    cache: Option<FeatureCache>,
}

impl Debug for GeoJsonLayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoJsonLayer")
            .field("features", &self.cache.as_ref().map(|c| c.features.len()))
            .finish()
    }
}

impl GeoJsonLayer {
    fn features(&self) -> &[Option<Arc<GeoFeature>>] {
        self.cache.as_ref().map_or(&[], |c| c.features.as_slice())
    }
}

impl LayerFormatter for GeoJsonLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::GeoJson
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["geojson"]
    }

    fn visual_channels(&self) -> &'static [VisualChannel] {
        CHANNELS
    }

    fn vis_config_keys(&self) -> &'static [&'static str] {
        &[
            "opacity",
            "strokeOpacity",
            "thickness",
            "strokeColor",
            "colorRange",
            "strokeColorRange",
            "radius",
            "sizeRange",
            "radiusRange",
            "heightRange",
            "elevationScale",
            "stroked",
            "filled",
            "enable3d",
            "wireframe",
        ]
    }

    fn prepare(&mut self, ctx: &FormatContext<'_>) {
        let Some(column) = ctx.columns.index("geojson") else {
            self.cache = None;
            return;
        };
        let rows = &ctx.dataset.all_data;
        if let Some(cache) = &self.cache {
            if Arc::ptr_eq(&cache.rows, rows) && cache.column == column {
                return;
            }
        }

        log::debug!("Parsing {} GeoJSON features", rows.len());
        let features = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                row.get(column)
                    .and_then(|cell| GeoFeature::from_cell(index, cell))
                    .map(Arc::new)
            })
            .collect();

        self.cache = Some(FeatureCache {
            rows: rows.clone(),
            column,
            features: Arc::new(features),
        });
    }

    fn resolve_position(&self, _ctx: &FormatContext<'_>, index: usize) -> Option<LayerItem> {
        let feature = self.features().get(index)?.clone()?;
        Some(LayerItem {
            index,
            feature: Some(feature),
            ..Default::default()
        })
    }

    fn compute_bounds(&self, _ctx: &FormatContext<'_>) -> Option<Rect> {
        Rect::from_lng_lat(
            self.features()
                .iter()
                .flatten()
                .filter_map(|f| collect_points(&f.geometry.value).ok())
                .flatten()
                .map(|p| (p.lon(), p.lat())),
        )
    }

    fn feature_types(&self, _ctx: &FormatContext<'_>) -> Option<FeatureTypes> {
        let mut types = FeatureTypes::default();
        for feature in self.features().iter().flatten() {
            for kind in geometry_kinds(&feature.geometry.value) {
                types.add(kind);
            }
        }

        Some(types)
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
        let [color, stroke_color, size, height, radius] = [
            &CHANNELS[0],
            &CHANNELS[1],
            &CHANNELS[2],
            &CHANNELS[3],
            &CHANNELS[4],
        ];

        let fill_colors = ctx.colors.colors(&vis.color_range);
        let stroke_colors = ctx.colors.colors(&vis.stroke_color_range);
        let line_color = vis.stroke_color.unwrap_or(config.color);

        let get_fill_color = bind_channel(
            config,
            color,
            rows,
            fill_colors.as_slice(),
            config.color,
            Color::TRANSPARENT,
        );
        let get_line_color = bind_channel(
            config,
            stroke_color,
            rows,
            stroke_colors.as_slice(),
            line_color,
            Color::TRANSPARENT,
        );
        let get_line_width =
            bind_channel(config, size, rows, &vis.size_range, DEFAULT_LINE_WIDTH, 0.0);
        let get_elevation =
            bind_channel(config, height, rows, &vis.height_range, DEFAULT_ELEVATION, 0.0);
        let get_radius = bind_channel(config, radius, rows, &vis.radius_range, DEFAULT_RADIUS, 0.0);

        let mut layer_data = LayerData {
            get_fill_color: Some(with_property(&data, get_fill_color, "fillColor", color_property)),
            get_line_color: Some(with_property(&data, get_line_color, "lineColor", color_property)),
            get_line_width: Some(with_property(&data, get_line_width, "lineWidth", number_property)),
            get_elevation: Some(with_property(&data, get_elevation, "elevation", number_property)),
            get_radius: Some(with_property(&data, get_radius, "radius", number_property)),
            get_filter_value: Some(ctx.filter_value_accessor()),
            ..Default::default()
        };

        let triggers = &mut layer_data.update_triggers;
        triggers.insert(
            "getFillColor",
            channel_triggers(color, config, json!({ "color": config.color })),
        );
        triggers.insert(
            "getLineColor",
            channel_triggers(stroke_color, config, json!({ "strokeColor": line_color })),
        );
        triggers.insert("getLineWidth", channel_triggers(size, config, json!({})));
        triggers.insert(
            "getElevation",
            channel_triggers(height, config, json!({ "enable3d": vis.enable3d })),
        );
        triggers.insert("getRadius", channel_triggers(radius, config, json!({})));
        triggers.insert("getFilterValue", ctx.filter_value_triggers());

        layer_data.data = data;
        layer_data
    }
}

/// Reads the feature property before falling back to the accessor. The accessor is returned unchanged if no
/// item has the property.
fn with_property<T>(
    data: &[LayerItem],
    accessor: Accessor<T>,
    key: &'static str,
    parse: fn(&serde_json::Value) -> Option<T>,
) -> Accessor<T>
where
    T: Clone + Send + Sync + 'static,
{
    let has_property = data
        .iter()
        .any(|item| item.feature.as_ref().is_some_and(|f| f.properties.contains_key(key)));
    if !has_property {
        return accessor;
    }

    Accessor::function(move |item: &LayerItem| {
        item.feature
            .as_ref()
            .and_then(|f| f.property(key, parse))
            .unwrap_or_else(|| accessor.get(item))
    })
}

fn number_property(value: &serde_json::Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// `[r, g, b]`, `[r, g, b, a]` or a hex string.
fn color_property(value: &serde_json::Value) -> Option<Color> {
    match value {
        serde_json::Value::String(hex) => Color::try_from_hex(hex),
        serde_json::Value::Array(components) if matches!(components.len(), 3 | 4) => {
            let mut rgba = [255u8; 4];
            for (target, component) in rgba.iter_mut().zip(components) {
                *target = component.as_f64()?.round().clamp(0.0, 255.0) as u8;
            }
            Some(Color::rgba(rgba[0], rgba[1], rgba[2], rgba[3]))
        }
        _ => None,
    }
}
