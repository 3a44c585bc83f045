//! Serializable layer configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregation;
use crate::color::{Color, ColorRange};
use crate::dataset::Field;
use crate::domain::Domain;
use crate::error::GeolayerError;
use crate::scale::ScaleType;

/// Configurable field slot of a layer. Every slot owns a `*Field`, `*Scale` and `*Domain` config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelSlot {
    /// Fill or source color.
    Color,
    /// Outline color.
    StrokeColor,
    /// Size: radius of points, width of arcs and lines, elevation of grid cells.
    Size,
    /// Height of extruded polygons.
    Height,
    /// Radius of point features of GeoJSON layers.
    Radius,
}

impl ChannelSlot {
    /// Config key of the slot's field.
    pub fn field_key(&self) -> &'static str {
        match self {
            Self::Color => "colorField",
            Self::StrokeColor => "strokeColorField",
            Self::Size => "sizeField",
            Self::Height => "heightField",
            Self::Radius => "radiusField",
        }
    }

    /// Config key of the slot's scale.
    pub fn scale_key(&self) -> &'static str {
        match self {
            Self::Color => "colorScale",
            Self::StrokeColor => "strokeColorScale",
            Self::Size => "sizeScale",
            Self::Height => "heightScale",
            Self::Radius => "radiusScale",
        }
    }

    /// Config key of the slot's domain.
    pub fn domain_key(&self) -> &'static str {
        match self {
            Self::Color => "colorDomain",
            Self::StrokeColor => "strokeColorDomain",
            Self::Size => "sizeDomain",
            Self::Height => "heightDomain",
            Self::Radius => "radiusDomain",
        }
    }

    /// Scale a slot starts with.
    pub fn default_scale(&self) -> ScaleType {
        match self {
            Self::Color | Self::StrokeColor => ScaleType::Quantile,
            Self::Size | Self::Height | Self::Radius => ScaleType::Linear,
        }
    }
}

/// Field, scale and domain selected for a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSelection {
    /// Field driving the channel. Without a field the channel has a constant value.
    pub field: Option<Field>,
    /// Scale mapping field values onto the channel range.
    pub scale: ScaleType,
    /// Domain of the field, computed by the layer.
    #[serde(default)]
    pub domain: Domain,
}

impl ChannelSelection {
    /// Selection without a field.
    pub fn new(scale: ScaleType) -> Self {
        Self {
            field: None,
            scale,
            domain: Domain::default(),
        }
    }
}

/// Column of a layer mapped onto a dataset field by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerColumn {
    /// Name of the dataset field.
    pub value: Option<String>,
    /// Optional columns may stay unset.
    #[serde(default)]
    pub optional: bool,
}

impl LayerColumn {
    /// Required column mapped onto the field.
    pub fn required(field_name: &str) -> Self {
        Self {
            value: Some(field_name.to_string()),
            optional: false,
        }
    }

    /// Optional column, possibly unmapped.
    pub fn optional(field_name: Option<&str>) -> Self {
        Self {
            value: field_name.map(str::to_string),
            optional: true,
        }
    }
}

/// Columns of a layer by column name, e.g. `lat` or `lng0`.
pub type LayerColumns = BTreeMap<String, LayerColumn>;

/// Text label drawn next to point features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextLabel {
    /// Field providing the text.
    pub field: Option<Field>,
    /// Font size in pixels.
    pub size: f64,
    /// Text color.
    pub color: Color,
    /// Pixel offset of the label.
    pub offset: [f64; 2],
    /// Horizontal anchor: `start`, `middle` or `end`.
    pub anchor: String,
    /// Vertical alignment: `top`, `center` or `bottom`.
    pub alignment: String,
}

impl Default for TextLabel {
    fn default() -> Self {
        Self {
            field: None,
            size: 18.0,
            color: Color::WHITE,
            offset: [0.0, 0.0],
            anchor: "start".to_string(),
            alignment: "center".to_string(),
        }
    }
}

/// Visual properties of a layer.
///
/// Every layer type reads only the properties it supports; the defaults of the others are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisConfig {
    /// Layer opacity in `[0, 1]`.
    pub opacity: f64,
    /// Opacity of outlines in `[0, 1]`.
    pub stroke_opacity: f64,
    /// Stroke width in pixels.
    pub thickness: f64,
    /// Constant point radius in pixels.
    pub radius: f64,
    /// Use size field values as radii in meters instead of scaling them.
    pub fixed_radius: bool,
    /// Draw point outlines.
    pub outline: bool,
    /// Fill polygons and points.
    pub filled: bool,
    /// Draw polygon outlines.
    pub stroked: bool,
    /// Extrude polygons and grid cells.
    pub enable3d: bool,
    /// Draw extruded polygons as wireframes.
    pub wireframe: bool,
    /// Range of the color channel.
    pub color_range: ColorRange,
    /// Range of the stroke color channel.
    pub stroke_color_range: ColorRange,
    /// Range of point radii in pixels.
    pub radius_range: [f64; 2],
    /// Range of widths, or of elevations for grid layers.
    pub size_range: [f64; 2],
    /// Range of polygon heights.
    pub height_range: [f64; 2],
    /// Elevation multiplier.
    pub elevation_scale: f64,
    /// Constant outline color. Falls back to the layer color.
    pub stroke_color: Option<Color>,
    /// Constant target color of arcs. Falls back to the layer color.
    pub target_color: Option<Color>,
    /// Grid cell size in kilometers.
    pub world_unit_size: f64,
    /// Fraction of the grid cell covered by the drawn cell.
    pub coverage: f64,
    /// Percentile range of color values of grid cells that are drawn.
    pub percentile: [f64; 2],
    /// Percentile range of elevation values of grid cells that are drawn.
    pub elevation_percentile: [f64; 2],
    /// Aggregation of the color field within a grid cell.
    pub color_aggregation: Aggregation,
    /// Aggregation of the size field within a grid cell.
    pub size_aggregation: Aggregation,
}

impl Default for VisConfig {
    fn default() -> Self {
        Self {
            opacity: 0.8,
            stroke_opacity: 0.8,
            thickness: 2.0,
            radius: 10.0,
            fixed_radius: false,
            outline: false,
            filled: true,
            stroked: false,
            enable3d: false,
            wireframe: false,
            color_range: ColorRange::default(),
            stroke_color_range: ColorRange::default(),
            radius_range: [0.0, 50.0],
            size_range: [0.0, 10.0],
            height_range: [0.0, 500.0],
            elevation_scale: 5.0,
            stroke_color: None,
            target_color: None,
            world_unit_size: 1.0,
            coverage: 1.0,
            percentile: [0.0, 100.0],
            elevation_percentile: [0.0, 100.0],
            color_aggregation: Aggregation::Mean,
            size_aggregation: Aggregation::Mean,
        }
    }
}

macro_rules! changed_keys {
    ($prev:expr, $next:expr, $out:expr, { $($field:ident => $key:literal),* $(,)? }) => {
        $(
            if $prev.$field != $next.$field {
                $out.push($key);
            }
        )*
    };
}

impl VisConfig {
    /// Config keys whose values differ between `self` and `other`.
    pub fn changed_keys(&self, other: &VisConfig) -> Vec<&'static str> {
        let mut keys = vec![];
        changed_keys!(self, other, keys, {
            opacity => "opacity",
            stroke_opacity => "strokeOpacity",
            thickness => "thickness",
            radius => "radius",
            fixed_radius => "fixedRadius",
            outline => "outline",
            filled => "filled",
            stroked => "stroked",
            enable3d => "enable3d",
            wireframe => "wireframe",
            color_range => "colorRange",
            stroke_color_range => "strokeColorRange",
            radius_range => "radiusRange",
            size_range => "sizeRange",
            height_range => "heightRange",
            elevation_scale => "elevationScale",
            stroke_color => "strokeColor",
            target_color => "targetColor",
            world_unit_size => "worldUnitSize",
            coverage => "coverage",
            percentile => "percentile",
            elevation_percentile => "elevationPercentile",
            color_aggregation => "colorAggregation",
            size_aggregation => "sizeAggregation",
        });

        keys
    }
}

/// Configuration of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerConfig {
    /// Id of the dataset the layer draws.
    pub data_id: Option<String>,
    /// Layer name shown to the user.
    pub label: String,
    /// Constant color used when the color channel has no field.
    pub color: Color,
    /// Columns of the layer.
    pub columns: LayerColumns,
    /// Layer is drawn.
    pub is_visible: bool,
    /// Layer is hidden from the layer list.
    pub hidden: bool,
    /// Field, scale and domain of every slot.
    pub channels: BTreeMap<ChannelSlot, ChannelSelection>,
    /// Text labels.
    pub text_label: Vec<TextLabel>,
    /// Visual properties.
    pub vis_config: VisConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            data_id: None,
            label: "new layer".to_string(),
            color: Color::rgb(18, 147, 154),
            columns: LayerColumns::new(),
            is_visible: true,
            hidden: false,
            channels: BTreeMap::new(),
            text_label: vec![],
            vis_config: VisConfig::default(),
        }
    }
}

impl LayerConfig {
    /// Decodes a configuration from JSON. Missing properties get their default values.
    pub fn from_json(json: &str) -> Result<Self, GeolayerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Selection of the slot.
    pub fn channel(&self, slot: ChannelSlot) -> Option<&ChannelSelection> {
        self.channels.get(&slot)
    }

    /// Selection of the slot, created with the slot's default scale if missing.
    pub fn channel_mut(&mut self, slot: ChannelSlot) -> &mut ChannelSelection {
        self.channels
            .entry(slot)
            .or_insert_with(|| ChannelSelection::new(slot.default_scale()))
    }

    /// Field of the slot.
    pub fn field(&self, slot: ChannelSlot) -> Option<&Field> {
        self.channel(slot)?.field.as_ref()
    }

    /// Scale of the slot.
    pub fn scale(&self, slot: ChannelSlot) -> ScaleType {
        self.channel(slot)
            .map(|c| c.scale)
            .unwrap_or_else(|| slot.default_scale())
    }

    /// Returns a copy of the config with the field of the slot replaced.
    pub fn with_field(mut self, slot: ChannelSlot, field: Option<Field>) -> Self {
        self.channel_mut(slot).field = field;
        self
    }

    /// Returns a copy of the config with the scale of the slot replaced.
    pub fn with_scale(mut self, slot: ChannelSlot, scale: ScaleType) -> Self {
        self.channel_mut(slot).scale = scale;
        self
    }

    /// Returns a copy of the config with the column mapped onto the field.
    pub fn with_column(mut self, column: &str, field_name: &str) -> Self {
        let optional = self.columns.get(column).is_some_and(|c| c.optional);
        self.columns.insert(
            column.to_string(),
            LayerColumn {
                value: Some(field_name.to_string()),
                optional,
            },
        );
        self
    }

    /// Config keys whose values differ between `self` and `other`. Visual properties are reported by
    /// their own keys, e.g. `opacity`.
    pub fn changed_keys(&self, other: &LayerConfig) -> Vec<&'static str> {
        let mut keys = vec![];
        changed_keys!(self, other, keys, {
            data_id => "dataId",
            label => "label",
            color => "color",
            columns => "columns",
            is_visible => "isVisible",
            hidden => "hidden",
            text_label => "textLabel",
        });

        let slots = self.channels.keys().chain(other.channels.keys());
        let mut seen = vec![];
        for slot in slots {
            if seen.contains(slot) {
                continue;
            }
            seen.push(*slot);

            let prev = self.channel(*slot);
            let next = other.channel(*slot);
            if prev.map(|c| &c.field) != next.map(|c| &c.field) {
                keys.push(slot.field_key());
            }
            if prev.map(|c| c.scale) != next.map(|c| c.scale) {
                keys.push(slot.scale_key());
            }
            if prev.map(|c| &c.domain) != next.map(|c| &c.domain) {
                keys.push(slot.domain_key());
            }
        }

        keys.extend(self.vis_config.changed_keys(&other.vis_config));
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FieldType;

    #[test]
    fn changed_keys() {
        let prev = LayerConfig::default();
        let mut next = prev.clone();
        assert!(prev.changed_keys(&next).is_empty());

        next.vis_config.opacity = 0.2;
        next.label = "points".into();
        next = next.with_field(
            ChannelSlot::Color,
            Some(Field::new("value", FieldType::Real, 1)),
        );

        assert_eq!(
            prev.changed_keys(&next),
            vec!["label", "colorField", "colorScale", "colorDomain", "opacity"]
        );
    }

    #[test]
    fn decode_partial_config() {
        let config = LayerConfig::from_json(
            r##"{
                "dataId": "trips",
                "color": "#FF0000",
                "columns": {"lat": {"value": "lat"}, "lng": {"value": "lng"}},
                "channels": {"color": {"field": {"name": "value", "type": "real", "tableFieldIndex": 2}, "scale": "quantize"}},
                "visConfig": {"opacity": 0.5, "colorAggregation": "maximum"}
            }"##,
        )
        .unwrap();

        assert_eq!(config.data_id.as_deref(), Some("trips"));
        assert_eq!(config.color, Color::rgb(255, 0, 0));
        assert_eq!(config.columns["lat"], LayerColumn::required("lat"));
        assert_eq!(config.scale(ChannelSlot::Color), ScaleType::Quantize);
        assert_eq!(config.scale(ChannelSlot::Size), ScaleType::Linear);
        assert_eq!(
            config.field(ChannelSlot::Color).map(|f| f.table_field_index),
            Some(2)
        );
        assert_eq!(config.vis_config.opacity, 0.5);
        assert_eq!(config.vis_config.color_aggregation, Aggregation::Max);
        assert_eq!(config.vis_config.thickness, 2.0);
        assert!(config.is_visible);
    }

    #[test]
    fn invalid_config() {
        assert!(matches!(
            LayerConfig::from_json("{\"opacity\": }"),
            Err(GeolayerError::Decoding(_))
        ));
    }
}
