//! Visual channels: which fields and scales a channel accepts, validation of the selection and binding of
//! the selection into per-item accessors.

use std::sync::Arc;

use serde_json::json;

use crate::aggregate::Aggregation;
use crate::color::ColorRange;
use crate::config::{ChannelSlot, LayerConfig, VisConfig};
use crate::dataset::{FieldType, Row};
use crate::domain::Domain;
use crate::layer::{Accessor, LayerItem};
use crate::scale::{Interpolate, Scale, ScaleType};

/// Category of a channel that determines which scales it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelScale {
    /// Color of individual items.
    Color,
    /// Radius of individual items.
    Radius,
    /// Size of individual items.
    Size,
    /// Color of aggregated bins.
    ColorAggr,
    /// Size of aggregated bins.
    SizeAggr,
}

impl ChannelScale {
    /// Returns true for channels encoding aggregated bins.
    pub fn is_aggregated(&self) -> bool {
        matches!(self, Self::ColorAggr | Self::SizeAggr)
    }
}

const COLOR_SCALES: &[ScaleType] = &[ScaleType::Quantize, ScaleType::Quantile];
const SIZE_SCALES: &[ScaleType] = &[ScaleType::Linear, ScaleType::Sqrt, ScaleType::Log];

type AggregationTable = &'static [(Aggregation, &'static [ScaleType])];

const NUMERIC_COLOR_AGGREGATIONS: AggregationTable = &[
    (Aggregation::Mean, COLOR_SCALES),
    (Aggregation::Max, COLOR_SCALES),
    (Aggregation::Min, COLOR_SCALES),
    (Aggregation::Median, COLOR_SCALES),
    (Aggregation::Stdev, COLOR_SCALES),
    (Aggregation::Sum, COLOR_SCALES),
    (Aggregation::Variance, COLOR_SCALES),
];

const NUMERIC_SIZE_AGGREGATIONS: AggregationTable = &[
    (Aggregation::Mean, SIZE_SCALES),
    (Aggregation::Max, SIZE_SCALES),
    (Aggregation::Min, SIZE_SCALES),
    (Aggregation::Median, SIZE_SCALES),
    (Aggregation::Stdev, SIZE_SCALES),
    (Aggregation::Sum, SIZE_SCALES),
    (Aggregation::Variance, SIZE_SCALES),
];

const CATEGORICAL_COLOR_AGGREGATIONS: AggregationTable = &[
    (Aggregation::Mode, &[ScaleType::Ordinal]),
    (Aggregation::CountUnique, COLOR_SCALES),
];

const COUNT_COLOR_AGGREGATION: AggregationTable = &[(Aggregation::Count, COLOR_SCALES)];
const COUNT_SIZE_AGGREGATION: AggregationTable = &[(Aggregation::Count, SIZE_SCALES)];

const ALL_FIELD_TYPES: [FieldType; 6] = [
    FieldType::Integer,
    FieldType::Real,
    FieldType::String,
    FieldType::Boolean,
    FieldType::Timestamp,
    FieldType::Geojson,
];

/// Scales a non-aggregated channel accepts for a field of the given type.
pub fn scale_options(field_type: FieldType, channel_scale: ChannelScale) -> &'static [ScaleType] {
    use FieldType::*;

    match (field_type, channel_scale) {
        (Integer | Real | Timestamp, ChannelScale::Color) => COLOR_SCALES,
        (Integer | Real | Timestamp, ChannelScale::Radius) => &[ScaleType::Sqrt],
        (Integer | Real | Timestamp, ChannelScale::Size) => SIZE_SCALES,
        (String | Boolean, ChannelScale::Color) => &[ScaleType::Ordinal],
        (String | Boolean, ChannelScale::Radius | ChannelScale::Size) => &[ScaleType::Point],
        _ => &[],
    }
}

/// Aggregations an aggregated channel accepts, with the scales every aggregation supports. Without a
/// field only counting is possible.
pub fn aggregation_options(field_type: Option<FieldType>, channel_scale: ChannelScale) -> AggregationTable {
    use FieldType::*;

    match (field_type, channel_scale) {
        (None, ChannelScale::ColorAggr) => COUNT_COLOR_AGGREGATION,
        (None, ChannelScale::SizeAggr) => COUNT_SIZE_AGGREGATION,
        (Some(Integer | Real), ChannelScale::ColorAggr) => NUMERIC_COLOR_AGGREGATIONS,
        (Some(Integer | Real), ChannelScale::SizeAggr) => NUMERIC_SIZE_AGGREGATIONS,
        (Some(String | Boolean), ChannelScale::ColorAggr) => CATEGORICAL_COLOR_AGGREGATIONS,
        _ => &[],
    }
}

/// Scales an aggregated channel accepts for the aggregation.
pub fn aggregation_scale_options(
    field_type: Option<FieldType>,
    channel_scale: ChannelScale,
    aggregation: Aggregation,
) -> &'static [ScaleType] {
    aggregation_options(field_type, channel_scale)
        .iter()
        .find_map(|(a, scales)| (*a == aggregation).then_some(*scales))
        .unwrap_or(&[])
}

/// Field types a channel can be bound to.
pub fn supported_field_types(channel_scale: ChannelScale) -> Vec<FieldType> {
    ALL_FIELD_TYPES
        .into_iter()
        .filter(|t| {
            if channel_scale.is_aggregated() {
                !aggregation_options(Some(*t), channel_scale).is_empty()
            } else {
                !scale_options(*t, channel_scale).is_empty()
            }
        })
        .collect()
}

/// Visual property whose range a channel maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRange {
    /// `colorRange`.
    Color,
    /// `strokeColorRange`.
    StrokeColor,
    /// `radiusRange`.
    Radius,
    /// `sizeRange`.
    Size,
    /// `heightRange`.
    Height,
}

impl ChannelRange {
    /// Config key of the range.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Color => "colorRange",
            Self::StrokeColor => "strokeColorRange",
            Self::Radius => "radiusRange",
            Self::Size => "sizeRange",
            Self::Height => "heightRange",
        }
    }

    /// Color range, `None` for numeric ranges.
    pub fn colors<'a>(&self, vis_config: &'a VisConfig) -> Option<&'a ColorRange> {
        match self {
            Self::Color => Some(&vis_config.color_range),
            Self::StrokeColor => Some(&vis_config.stroke_color_range),
            _ => None,
        }
    }

    /// Numeric range, `None` for color ranges.
    pub fn numbers(&self, vis_config: &VisConfig) -> Option<[f64; 2]> {
        match self {
            Self::Radius => Some(vis_config.radius_range),
            Self::Size => Some(vis_config.size_range),
            Self::Height => Some(vis_config.height_range),
            Self::Color | Self::StrokeColor => None,
        }
    }

    fn to_json(self, vis_config: &VisConfig) -> serde_json::Value {
        match (self.colors(vis_config), self.numbers(vis_config)) {
            (Some(colors), _) => json!(colors.colors),
            (None, Some(numbers)) => json!(numbers),
            (None, None) => serde_json::Value::Null,
        }
    }
}

/// Aggregation property of an aggregated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelAggregation {
    /// `colorAggregation`.
    Color,
    /// `sizeAggregation`.
    Size,
}

impl ChannelAggregation {
    /// Config key of the aggregation.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Color => "colorAggregation",
            Self::Size => "sizeAggregation",
        }
    }

    /// Currently selected aggregation.
    pub fn get(&self, vis_config: &VisConfig) -> Aggregation {
        match self {
            Self::Color => vis_config.color_aggregation,
            Self::Size => vis_config.size_aggregation,
        }
    }

    fn set(&self, vis_config: &mut VisConfig, aggregation: Aggregation) {
        match self {
            Self::Color => vis_config.color_aggregation = aggregation,
            Self::Size => vis_config.size_aggregation = aggregation,
        }
    }
}

/// Static description of a visual channel of a layer type.
#[derive(Debug, Clone, Copy)]
pub struct VisualChannel {
    /// Channel name, e.g. `color` or `size`.
    pub key: &'static str,
    /// Name shown to the user.
    pub label: &'static str,
    /// Payload accessor encoding the channel, e.g. `getFillColor`.
    pub accessor: &'static str,
    /// Config slot holding the field, scale and domain.
    pub slot: ChannelSlot,
    /// Visual range the channel maps onto.
    pub range: ChannelRange,
    /// Aggregation of aggregated channels.
    pub aggregation: Option<ChannelAggregation>,
    /// Category determining the accepted fields and scales.
    pub channel_scale: ChannelScale,
    /// Measure shown when no field is selected.
    pub default_measure: Option<&'static str>,
    /// The channel is only encoded if this returns true.
    pub condition: Option<fn(&LayerConfig) -> bool>,
}

impl VisualChannel {
    /// Returns true if the channel is enabled by the config.
    pub fn is_enabled(&self, config: &LayerConfig) -> bool {
        self.condition.map_or(true, |condition| condition(config))
    }

    /// Scales the channel accepts for its current selection.
    ///
    /// Without a field a non-aggregated channel only accepts the default scale of its slot.
    pub fn scale_options(&self, config: &LayerConfig) -> &'static [ScaleType] {
        let field_type = config.field(self.slot).map(|f| f.field_type);
        match self.aggregation {
            Some(aggregation) if self.channel_scale.is_aggregated() => aggregation_scale_options(
                field_type,
                self.channel_scale,
                aggregation.get(&config.vis_config),
            ),
            _ => match field_type {
                Some(field_type) => scale_options(field_type, self.channel_scale),
                None => default_scale_option(self.slot),
            },
        }
    }

    /// Properties the encoded accessor depends on.
    pub fn update_triggers(&self, config: &LayerConfig) -> serde_json::Value {
        let mut triggers = serde_json::Map::new();
        triggers.insert(
            self.slot.field_key().to_string(),
            json!(config.field(self.slot).map(|f| f.name.clone())),
        );
        triggers.insert(
            self.slot.scale_key().to_string(),
            json!(config.scale(self.slot)),
        );
        triggers.insert(
            self.range.key().to_string(),
            self.range.to_json(&config.vis_config),
        );
        if let Some(aggregation) = self.aggregation {
            triggers.insert(
                aggregation.key().to_string(),
                json!(aggregation.get(&config.vis_config)),
            );
        }

        serde_json::Value::Object(triggers)
    }
}

fn default_scale_option(slot: ChannelSlot) -> &'static [ScaleType] {
    match slot.default_scale() {
        ScaleType::Quantile => &[ScaleType::Quantile],
        _ => &[ScaleType::Linear],
    }
}

/// Adjustment made while validating a channel selection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelChange {
    /// The field was removed from the channel.
    FieldCleared {
        /// Channel name.
        channel: &'static str,
        /// Name of the removed field.
        field: String,
    },
    /// The aggregation was replaced by the first supported one.
    AggregationReset {
        /// Channel name.
        channel: &'static str,
        /// Rejected aggregation.
        from: Aggregation,
        /// New aggregation.
        to: Aggregation,
    },
    /// The scale was replaced by the first supported one.
    ScaleReset {
        /// Channel name.
        channel: &'static str,
        /// Rejected scale.
        from: ScaleType,
        /// New scale.
        to: ScaleType,
    },
}

/// Validates the channel selection of the config and returns the corrected config together with the
/// list of corrections.
///
/// The field is cleared if the channel does not accept its type, or if nothing accepts the field with
/// any aggregation or scale. An unsupported aggregation or scale is replaced by the first supported one.
pub fn validate_visual_channel(
    config: &LayerConfig,
    channel: &VisualChannel,
) -> (LayerConfig, Vec<ChannelChange>) {
    let mut config = config.clone();
    let mut changes = vec![];

    validate_field_type(&mut config, channel, &mut changes);
    validate_aggregation(&mut config, channel, &mut changes);
    validate_scale(&mut config, channel, &mut changes);

    for change in &changes {
        log::debug!("Visual channel validation: {change:?}");
    }

    (config, changes)
}

fn clear_field(config: &mut LayerConfig, channel: &VisualChannel, changes: &mut Vec<ChannelChange>) {
    if let Some(field) = config.channel_mut(channel.slot).field.take() {
        changes.push(ChannelChange::FieldCleared {
            channel: channel.key,
            field: field.name,
        });
    }
}

fn validate_field_type(
    config: &mut LayerConfig,
    channel: &VisualChannel,
    changes: &mut Vec<ChannelChange>,
) {
    let Some(field) = config.field(channel.slot) else {
        return;
    };

    if !supported_field_types(channel.channel_scale).contains(&field.field_type) {
        log::warn!(
            "Field {} of type {:?} is not supported by channel {}",
            field.name,
            field.field_type,
            channel.key
        );
        clear_field(config, channel, changes);
    }
}

fn validate_aggregation(
    config: &mut LayerConfig,
    channel: &VisualChannel,
    changes: &mut Vec<ChannelChange>,
) {
    let Some(aggregation) = channel.aggregation else {
        return;
    };
    if !channel.channel_scale.is_aggregated() {
        return;
    }

    let mut options = aggregation_options(
        config.field(channel.slot).map(|f| f.field_type),
        channel.channel_scale,
    );
    if options.is_empty() {
        clear_field(config, channel, changes);
        options = aggregation_options(None, channel.channel_scale);
    }

    let current = aggregation.get(&config.vis_config);
    if !options.iter().any(|(a, _)| *a == current) {
        if let Some((first, _)) = options.first() {
            aggregation.set(&mut config.vis_config, *first);
            changes.push(ChannelChange::AggregationReset {
                channel: channel.key,
                from: current,
                to: *first,
            });
        }
    }
}

fn validate_scale(
    config: &mut LayerConfig,
    channel: &VisualChannel,
    changes: &mut Vec<ChannelChange>,
) {
    let mut options = channel.scale_options(config);
    if options.is_empty() && config.field(channel.slot).is_some() {
        clear_field(config, channel, changes);
        validate_aggregation(config, channel, changes);
        options = channel.scale_options(config);
    }

    let current = config.scale(channel.slot);
    if !options.contains(&current) {
        if let Some(first) = options.first() {
            config.channel_mut(channel.slot).scale = *first;
            changes.push(ChannelChange::ScaleReset {
                channel: channel.key,
                from: current,
                to: *first,
            });
        }
    }
}

/// Scale of the channel's current selection, `None` if the channel has no field, is disabled or its
/// domain does not fit its scale.
pub fn channel_scale<R: Interpolate>(
    config: &LayerConfig,
    channel: &VisualChannel,
    range: &[R],
) -> Option<(usize, Scale<R>)> {
    let selection = config.channel(channel.slot)?;
    let field = selection.field.as_ref()?;
    if !channel.is_enabled(config) {
        return None;
    }

    match Scale::new(selection.scale, &selection.domain, range) {
        Some(scale) => Some((field.table_field_index, scale)),
        None => {
            log::warn!(
                "Cannot build {} scale of channel {} for domain {:?}",
                selection.scale,
                channel.key,
                selection.domain
            );
            None
        }
    }
}

/// Accessor mapping the cell of every item through the scale. Cells that are missing or have no mapping
/// are encoded as `null_value`.
pub fn encode_channel<R>(
    rows: Arc<Vec<Row>>,
    field_index: usize,
    scale: Scale<R>,
    null_value: R,
) -> Accessor<R>
where
    R: Interpolate + Send + Sync + 'static,
{
    Accessor::function(move |item: &LayerItem| {
        rows.get(item.index)
            .and_then(|row| row.get(field_index))
            .and_then(|value| scale.scale(value))
            .unwrap_or_else(|| null_value.clone())
    })
}

/// Binds the channel into an accessor: encoded through its scale if the channel has a field, constant
/// otherwise.
pub fn bind_channel<R>(
    config: &LayerConfig,
    channel: &VisualChannel,
    rows: &Arc<Vec<Row>>,
    range: &[R],
    constant: R,
    null_value: R,
) -> Accessor<R>
where
    R: Interpolate + Send + Sync + 'static,
{
    match channel_scale(config, channel, range) {
        Some((field_index, scale)) => encode_channel(rows.clone(), field_index, scale, null_value),
        None => Accessor::Constant(constant),
    }
}

/// Identity scale over the extent of the domain. Used for sizes given in meters.
pub fn identity_scale(domain: &Domain) -> Option<Scale<f64>> {
    match domain {
        Domain::Ordered(extent) => Scale::new(ScaleType::Linear, domain, extent),
        _ => None,
    }
}
