//! [Layers](Layer) turn a dataset and a [`LayerConfig`] into the payload consumed by the renderer.
//!
//! There are six layer types, each implementing [`LayerFormatter`]:
//! * [`PointLayer`] - circles at `lat`/`lng` columns.
//! * [`ArcLayer`] - arcs between two positions.
//! * [`GridLayer`] - points binned into grid cells by the renderer, colored and extruded by aggregators.
//! * [`GeoJsonLayer`] - features from a GeoJSON column.
//! * [`IconLayer`] - named icons at positions.
//! * [`ScenegraphLayer`] - 3D models at positions.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use geolayer_types::{Position, Rect};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateValue;
use crate::channel::{
    bind_channel, encode_channel, identity_scale, validate_visual_channel, ChannelChange,
    VisualChannel,
};
use crate::color::{Color, ColorRangeCache};
use crate::config::{LayerColumns, LayerConfig, TextLabel, VisConfig};
use crate::dataset::{Dataset, Datasets, GpuFilter};
use crate::domain::compute_domain;
use crate::error::GeolayerError;
use crate::settings::{vis_config_settings, VisConfigSetting};
use crate::triggers::{
    classify_change, ConfigDelta, DataUpdateTriggers, DomainTrigger, Recompute,
    BASE_NON_DATA_AFFECTING_KEYS,
};

mod arc;
mod columns;
mod geojson;
mod grid;
mod icon;
mod point;
mod scenegraph;

pub use arc::ArcLayer;
pub use columns::ResolvedColumns;
pub use geojson::{FeatureTypes, GeoFeature, GeoJsonLayer};
pub use grid::{GridLayer, GridRenderProps};
pub use icon::IconLayer;
pub use point::PointLayer;
pub use scenegraph::ScenegraphLayer;

/// A renderable item: a row of the dataset that passed the filters and has a valid geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerItem {
    /// Index of the row in the dataset.
    pub index: usize,
    /// Position of point-like items.
    pub position: Option<Position>,
    /// Start of arcs.
    pub source_position: Option<Position>,
    /// End of arcs.
    pub target_position: Option<Position>,
    /// Icon name.
    pub icon: Option<String>,
    /// Feature of GeoJSON items.
    pub feature: Option<Arc<GeoFeature>>,
}

impl LayerItem {
    /// Item of the row without geometry.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Point-like item.
    pub fn with_position(index: usize, position: Position) -> Self {
        Self {
            index,
            position: Some(position),
            ..Default::default()
        }
    }
}

/// Value of a rendered property: either the same for every item or computed per item.
pub enum Accessor<T> {
    /// Same value for every item.
    Constant(T),
    /// Value computed from the item.
    Function(Arc<dyn Fn(&LayerItem) -> T + Send + Sync>),
}

impl<T: Clone> Accessor<T> {
    /// Per-item accessor.
    pub fn function(f: impl Fn(&LayerItem) -> T + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    /// Value of the item.
    pub fn get(&self, item: &LayerItem) -> T {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Function(f) => f(item),
        }
    }

    /// The constant value, `None` for per-item accessors.
    pub fn constant(&self) -> Option<&T> {
        match self {
            Self::Constant(value) => Some(value),
            Self::Function(_) => None,
        }
    }

    /// Returns true if both accessors are the same function instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: Clone> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(value) => Self::Constant(value.clone()),
            Self::Function(f) => Self::Function(f.clone()),
        }
    }
}

impl<T: Debug> Debug for Accessor<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Function(_) => f.write_str("Function"),
        }
    }
}

/// Reduces the items of a bin into the value encoded by a channel.
pub type BinAccessor = Arc<dyn Fn(&[LayerItem]) -> AggregateValue + Send + Sync>;

/// Text label of point layers.
#[derive(Debug, Clone)]
pub struct TextLabelData {
    /// Label config.
    pub label: TextLabel,
    /// Distinct characters of all label texts, in order of appearance.
    pub character_set: Vec<char>,
    /// Text of the item.
    pub get_text: Accessor<String>,
}

/// Payload of a layer consumed by the renderer.
///
/// Only the accessors a layer type supports are set. [`LayerData::keys`] lists them by their renderer names.
#[derive(Clone, Default)]
pub struct LayerData {
    /// Items to render.
    pub data: Arc<Vec<LayerItem>>,
    /// `getPosition`.
    pub get_position: Option<Accessor<Position>>,
    /// `getFillColor`.
    pub get_fill_color: Option<Accessor<Color>>,
    /// `getLineColor`.
    pub get_line_color: Option<Accessor<Color>>,
    /// `getRadius`.
    pub get_radius: Option<Accessor<f64>>,
    /// `getElevation`.
    pub get_elevation: Option<Accessor<f64>>,
    /// `getLineWidth`.
    pub get_line_width: Option<Accessor<f64>>,
    /// `getSourceColor`.
    pub get_source_color: Option<Accessor<Color>>,
    /// `getTargetColor`.
    pub get_target_color: Option<Accessor<Color>>,
    /// `getWidth`.
    pub get_width: Option<Accessor<f64>>,
    /// `getFilterValue`.
    pub get_filter_value: Option<Accessor<[f64; 4]>>,
    /// `getColorValue`.
    pub get_color_value: Option<BinAccessor>,
    /// `getElevationValue`.
    pub get_elevation_value: Option<BinAccessor>,
    /// `textLabels`.
    pub text_labels: Vec<TextLabelData>,
    /// Rendering properties of grid layers.
    pub grid: Option<GridRenderProps>,
    /// Properties every accessor depends on. The renderer recomputes an attribute when its triggers change.
    pub update_triggers: BTreeMap<&'static str, serde_json::Value>,
}

impl LayerData {
    /// Payload without items or accessors.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Renderer names of the properties set in the payload, sorted.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec!["data"];
        let optional = [
            ("getPosition", self.get_position.is_some()),
            ("getFillColor", self.get_fill_color.is_some()),
            ("getLineColor", self.get_line_color.is_some()),
            ("getRadius", self.get_radius.is_some()),
            ("getElevation", self.get_elevation.is_some()),
            ("getLineWidth", self.get_line_width.is_some()),
            ("getSourceColor", self.get_source_color.is_some()),
            ("getTargetColor", self.get_target_color.is_some()),
            ("getWidth", self.get_width.is_some()),
            ("getFilterValue", self.get_filter_value.is_some()),
            ("getColorValue", self.get_color_value.is_some()),
            ("getElevationValue", self.get_elevation_value.is_some()),
            ("textLabels", !self.text_labels.is_empty()),
        ];
        keys.extend(optional.into_iter().filter(|(_, set)| *set).map(|(key, _)| key));
        keys.sort_unstable();
        keys
    }
}

impl Debug for LayerData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerData")
            .field("data", &self.data.len())
            .field("keys", &self.keys())
            .finish()
    }
}

/// Cached summary of the layer's data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerMeta {
    /// `[minLng, minLat, maxLng, maxLat]` of all rows.
    pub bounds: Option<Rect>,
    /// Geometry families of GeoJSON layers.
    pub feature_types: Option<FeatureTypes>,
}

/// Lifecycle of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// The layer has no dataset or some of its required columns are not mapped.
    Uninitialized,
    /// The config is complete but has not been formatted since the last change.
    Configured,
    /// The payload matches the config.
    Formatted,
}

/// Type of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Points.
    #[serde(rename = "point")]
    Point,
    /// Arcs.
    #[serde(rename = "arc")]
    Arc,
    /// Grid aggregation.
    #[serde(rename = "grid")]
    Grid,
    /// GeoJSON features.
    #[serde(rename = "geojson")]
    GeoJson,
    /// Icons.
    #[serde(rename = "icon")]
    Icon,
    /// 3D models.
    #[serde(rename = "3D")]
    Scenegraph,
}

impl LayerKind {
    /// Type name of the layer.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Arc => "arc",
            Self::Grid => "grid",
            Self::GeoJson => "geojson",
            Self::Icon => "icon",
            Self::Scenegraph => "3D",
        }
    }

    /// Returns true if the renderer bins the layer's items.
    pub fn is_aggregated(&self) -> bool {
        matches!(self, Self::Grid)
    }
}

/// Everything a formatter reads during a formatting pass.
pub struct FormatContext<'a> {
    /// Dataset of the layer.
    pub dataset: &'a Dataset,
    /// Layer config.
    pub config: &'a LayerConfig,
    /// Columns of the config resolved against the dataset.
    pub columns: &'a ResolvedColumns,
    /// Color range cache of the layer.
    pub colors: &'a mut ColorRangeCache,
}

impl FormatContext<'_> {
    /// Accessor of the GPU filter values of the item.
    pub fn filter_value_accessor(&self) -> Accessor<[f64; 4]> {
        let gpu_filter = self.dataset.gpu_filter.clone();
        let rows = self.dataset.all_data.clone();
        Accessor::function(move |item: &LayerItem| match rows.get(item.index) {
            Some(row) => gpu_filter.filter_value(row),
            None => [0.0; 4],
        })
    }

    /// Update triggers of the filter value accessor.
    pub fn filter_value_triggers(&self) -> serde_json::Value {
        serde_json::json!(self.dataset.gpu_filter.field_names())
    }

    /// Update triggers of position accessors.
    pub fn column_triggers(&self) -> serde_json::Value {
        serde_json::to_value(&self.config.columns).unwrap_or_default()
    }
}

/// Geometry specific part of a layer.
pub trait LayerFormatter {
    /// Type of the layer.
    fn kind(&self) -> LayerKind;

    /// Columns that must be mapped onto dataset fields.
    fn required_columns(&self) -> &'static [&'static str];

    /// Columns that may stay unmapped.
    fn optional_columns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Visual channels of the layer.
    fn visual_channels(&self) -> &'static [VisualChannel];

    /// Config keys, in addition to [`BASE_NON_DATA_AFFECTING_KEYS`], whose change only requires a style
    /// refresh.
    fn non_data_affecting_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Visual properties the layer supports.
    fn vis_config_keys(&self) -> &'static [&'static str];

    /// Default visual properties of the layer.
    fn default_vis_config(&self) -> VisConfig {
        VisConfig::default()
    }

    /// Refreshes caches depending on the dataset before items are resolved.
    fn prepare(&mut self, _ctx: &FormatContext<'_>) {}

    /// Renderable item of the row, `None` if the row has no valid geometry.
    fn resolve_position(&self, ctx: &FormatContext<'_>, index: usize) -> Option<LayerItem>;

    /// Bounds of all rows of the dataset, `None` if no row has a position.
    fn compute_bounds(&self, ctx: &FormatContext<'_>) -> Option<Rect>;

    /// Geometry families of the dataset. Only GeoJSON layers have them.
    fn feature_types(&self, _ctx: &FormatContext<'_>) -> Option<FeatureTypes> {
        None
    }

    /// Builds the payload for the items.
    fn format_data(
        &self,
        ctx: &mut FormatContext<'_>,
        data: Arc<Vec<LayerItem>>,
        get_position: Accessor<Position>,
    ) -> LayerData;
}

/// Layer of any type.
#[derive(Debug, Clone)]
pub enum LayerVariant {
    /// Points.
    Point(PointLayer),
    /// Arcs.
    Arc(ArcLayer),
    /// Grid aggregation.
    Grid(GridLayer),
    /// GeoJSON features.
    GeoJson(GeoJsonLayer),
    /// Icons.
    Icon(IconLayer),
    /// 3D models.
    Scenegraph(ScenegraphLayer),
}

impl LayerVariant {
    /// Formatter of the layer type.
    pub fn new(kind: LayerKind) -> Self {
        match kind {
            LayerKind::Point => Self::Point(PointLayer),
            LayerKind::Arc => Self::Arc(ArcLayer),
            LayerKind::Grid => Self::Grid(GridLayer),
            LayerKind::GeoJson => Self::GeoJson(GeoJsonLayer::default()),
            LayerKind::Icon => Self::Icon(IconLayer),
            LayerKind::Scenegraph => Self::Scenegraph(ScenegraphLayer),
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $layer:ident => $call:expr) => {
        match $self {
            LayerVariant::Point($layer) => $call,
            LayerVariant::Arc($layer) => $call,
            LayerVariant::Grid($layer) => $call,
            LayerVariant::GeoJson($layer) => $call,
            LayerVariant::Icon($layer) => $call,
            LayerVariant::Scenegraph($layer) => $call,
        }
    };
}

impl LayerFormatter for LayerVariant {
    fn kind(&self) -> LayerKind {
        dispatch!(self, l => l.kind())
    }

    fn required_columns(&self) -> &'static [&'static str] {
        dispatch!(self, l => l.required_columns())
    }

    fn optional_columns(&self) -> &'static [&'static str] {
        dispatch!(self, l => l.optional_columns())
    }

    fn visual_channels(&self) -> &'static [VisualChannel] {
        dispatch!(self, l => l.visual_channels())
    }

    fn non_data_affecting_keys(&self) -> &'static [&'static str] {
        dispatch!(self, l => l.non_data_affecting_keys())
    }

    fn vis_config_keys(&self) -> &'static [&'static str] {
        dispatch!(self, l => l.vis_config_keys())
    }

    fn default_vis_config(&self) -> VisConfig {
        dispatch!(self, l => l.default_vis_config())
    }

    fn prepare(&mut self, ctx: &FormatContext<'_>) {
        dispatch!(self, l => l.prepare(ctx))
    }

    fn resolve_position(&self, ctx: &FormatContext<'_>, index: usize) -> Option<LayerItem> {
        dispatch!(self, l => l.resolve_position(ctx, index))
    }

    fn compute_bounds(&self, ctx: &FormatContext<'_>) -> Option<Rect> {
        dispatch!(self, l => l.compute_bounds(ctx))
    }

    fn feature_types(&self, ctx: &FormatContext<'_>) -> Option<FeatureTypes> {
        dispatch!(self, l => l.feature_types(ctx))
    }

    fn format_data(
        &self,
        ctx: &mut FormatContext<'_>,
        data: Arc<Vec<LayerItem>>,
        get_position: Accessor<Position>,
    ) -> LayerData {
        dispatch!(self, l => l.format_data(ctx, data, get_position))
    }
}

/// Legend description of a visual channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescription {
    /// Name of the channel.
    pub label: &'static str,
    /// What the channel measures, e.g. `Average of fare`.
    pub measure: Option<String>,
}

struct PositionCache {
    columns: LayerColumns,
    accessor: Accessor<Position>,
}

/// A configured layer together with the state of its last formatting pass.
pub struct Layer {
    id: String,
    variant: LayerVariant,
    config: Arc<LayerConfig>,
    meta: LayerMeta,
    state: LayerState,
    pending: Recompute,
    data_triggers: Option<DataUpdateTriggers>,
    domain_trigger: Option<DomainTrigger>,
    last_data: Option<LayerData>,
    last_gpu_filter: Option<GpuFilter>,
    positions: Option<PositionCache>,
    colors: ColorRangeCache,
}

impl Debug for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("state", &self.state)
            .field("meta", &self.meta)
            .finish()
    }
}

impl Layer {
    /// Default config of the layer type: every column unmapped, every channel without a field.
    pub fn default_config(kind: LayerKind) -> LayerConfig {
        let variant = LayerVariant::new(kind);
        let mut config = LayerConfig {
            vis_config: variant.default_vis_config(),
            ..Default::default()
        };

        for column in variant.required_columns() {
            config
                .columns
                .insert(column.to_string(), Default::default());
        }
        for column in variant.optional_columns() {
            config
                .columns
                .insert(column.to_string(), crate::config::LayerColumn::optional(None));
        }
        for channel in variant.visual_channels() {
            config.channel_mut(channel.slot);
        }

        config
    }

    /// Creates a layer of the given type.
    pub fn new(id: impl Into<String>, kind: LayerKind, config: LayerConfig) -> Self {
        let variant = LayerVariant::new(kind);
        let mut config = config;
        for channel in variant.visual_channels() {
            config.channel_mut(channel.slot);
        }

        let mut layer = Self {
            id: id.into(),
            variant,
            config: Arc::new(config),
            meta: LayerMeta::default(),
            state: LayerState::Uninitialized,
            pending: Recompute::Full,
            data_triggers: None,
            domain_trigger: None,
            last_data: None,
            last_gpu_filter: None,
            positions: None,
            colors: ColorRangeCache::new(),
        };
        layer.state = layer.unformatted_state();

        layer
    }

    /// Layer id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Type of the layer.
    pub fn kind(&self) -> LayerKind {
        self.variant.kind()
    }

    /// Returns true if the renderer bins the layer's items.
    pub fn is_aggregated(&self) -> bool {
        self.kind().is_aggregated()
    }

    /// Current config. Configs are replaced, never mutated in place.
    pub fn config(&self) -> &Arc<LayerConfig> {
        &self.config
    }

    /// Summary of the last formatted data.
    pub fn meta(&self) -> &LayerMeta {
        &self.meta
    }

    /// Lifecycle state.
    pub fn state(&self) -> LayerState {
        self.state
    }

    /// Recomputation the next formatting pass will do because of config changes.
    pub fn pending(&self) -> Recompute {
        self.pending
    }

    /// Visual channels of the layer.
    pub fn visual_channels(&self) -> &'static [VisualChannel] {
        self.variant.visual_channels()
    }

    /// Config keys whose change only requires a style refresh.
    pub fn non_data_affecting_keys(&self) -> Vec<&'static str> {
        let mut keys = BASE_NON_DATA_AFFECTING_KEYS.to_vec();
        keys.extend_from_slice(self.variant.non_data_affecting_keys());
        keys
    }

    /// Visual properties the user can edit.
    pub fn vis_config_settings(&self) -> Vec<VisConfigSetting> {
        vis_config_settings(self.variant.vis_config_keys())
    }

    /// Legend description of the channel, `None` for unknown channels.
    pub fn visual_channel_description(&self, key: &str) -> Option<ChannelDescription> {
        let channel = self.visual_channel(key)?;
        let measure = match self.config.field(channel.slot) {
            Some(field) => match channel.aggregation {
                Some(aggregation) if self.is_aggregated() => Some(format!(
                    "{} of {}",
                    aggregation.get(&self.config.vis_config),
                    field.name
                )),
                _ => Some(field.name.clone()),
            },
            None => channel.default_measure.map(str::to_string),
        };

        Some(ChannelDescription {
            label: channel.label,
            measure,
        })
    }

    fn visual_channel(&self, key: &str) -> Option<&'static VisualChannel> {
        self.variant.visual_channels().iter().find(|c| c.key == key)
    }

    fn columns_complete(&self, config: &LayerConfig) -> bool {
        config.data_id.is_some()
            && self.variant.required_columns().iter().all(|column| {
                config
                    .columns
                    .get(*column)
                    .is_some_and(|c| c.value.is_some())
            })
    }

    fn unformatted_state(&self) -> LayerState {
        if self.columns_complete(&self.config) {
            LayerState::Configured
        } else {
            LayerState::Uninitialized
        }
    }

    /// Replaces the config and returns what the next formatting pass has to recompute.
    pub fn update_layer_config(&mut self, config: LayerConfig) -> ConfigDelta {
        let delta = classify_change(&self.config, &config, &self.non_data_affecting_keys());
        if delta.recompute == Recompute::Nothing {
            return delta;
        }

        log::debug!(
            "Layer {}: config keys {:?} changed, recompute: {:?}",
            self.id,
            delta.changed_keys,
            delta.recompute
        );
        self.config = Arc::new(config);
        self.pending = self.pending.max(delta.recompute);
        self.state = self.unformatted_state();

        delta
    }

    /// Replaces the visual properties.
    pub fn update_layer_vis_config(&mut self, vis_config: VisConfig) -> ConfigDelta {
        let config = LayerConfig {
            vis_config,
            ..self.config.as_ref().clone()
        };
        self.update_layer_config(config)
    }

    /// Validates the selection of the channel and applies the corrections.
    pub fn validate_visual_channel(&mut self, key: &str) -> Vec<ChannelChange> {
        let Some(channel) = self.visual_channel(key) else {
            log::warn!("Layer {} has no visual channel {key}", self.id);
            return vec![];
        };

        let (config, changes) = validate_visual_channel(&self.config, channel);
        if !changes.is_empty() {
            self.update_layer_config(config);
        }

        changes
    }

    /// Replaces the config after a field or scale of a channel changed, validates the channel and
    /// recomputes its domain.
    pub fn update_layer_visual_channel(
        &mut self,
        config: LayerConfig,
        key: &str,
        dataset: &Dataset,
    ) -> Vec<ChannelChange> {
        self.update_layer_config(config);
        let changes = self.validate_visual_channel(key);
        self.update_layer_domain(dataset);

        changes
    }

    /// Recomputes the domains of all channels with a field from the rows of
    /// [`Dataset::filtered_index_for_domain`]. Aggregated layers have no domains: their bins only exist in
    /// the renderer.
    ///
    /// Returns true if any domain changed.
    pub fn update_layer_domain(&mut self, dataset: &Dataset) -> bool {
        if self.is_aggregated() {
            return false;
        }

        let trigger = DomainTrigger::new(dataset, &self.config);
        if self.domain_trigger.as_ref() == Some(&trigger) {
            return false;
        }

        let mut config = self.config.as_ref().clone();
        for channel in self.variant.visual_channels() {
            let selection = config.channel_mut(channel.slot);
            if selection.field.is_some() {
                selection.domain = compute_domain(dataset, selection.field.as_ref(), selection.scale);
            }
        }

        self.domain_trigger = Some(trigger);
        if config == *self.config {
            return false;
        }

        log::debug!("Layer {}: domains updated", self.id);
        self.config = Arc::new(config);
        self.pending = self.pending.max(Recompute::Style);
        self.state = self.unformatted_state();
        true
    }

    /// Formats the layer's dataset into the renderer payload.
    ///
    /// Never fails: a missing dataset or unmapped required columns produce an empty payload.
    pub fn format_layer_data(&mut self, datasets: &Datasets) -> LayerData {
        match self.try_format(datasets) {
            Ok(data) => {
                self.state = LayerState::Formatted;
                self.pending = Recompute::Nothing;
                self.last_data = Some(data.clone());
                data
            }
            Err(err) => {
                log::warn!("Layer {}: {err}", self.id);
                self.state = self.unformatted_state();
                LayerData::empty()
            }
        }
    }

    fn try_format(&mut self, datasets: &Datasets) -> Result<LayerData, GeolayerError> {
        let data_id = self.config.data_id.clone().ok_or(GeolayerError::NoDataset)?;
        let dataset = datasets
            .get(&data_id)
            .ok_or(GeolayerError::DatasetNotFound(data_id))?;
        let columns = ResolvedColumns::resolve(
            &self.config,
            dataset,
            self.variant.required_columns(),
            self.variant.optional_columns(),
        )?;

        let triggers = DataUpdateTriggers::new(dataset, &self.config);
        let changes = triggers.changes(self.data_triggers.as_ref());
        let domain_changed = !self.is_aggregated()
            && self.domain_trigger.as_ref() != Some(&DomainTrigger::new(dataset, &self.config));
        let reusable = !changes.data && !changes.meta && !domain_changed;

        let mut pending = self.pending;
        if self.last_gpu_filter.as_ref() != Some(&dataset.gpu_filter) {
            pending = pending.max(Recompute::Style);
            self.last_gpu_filter = Some(dataset.gpu_filter.clone());
        }

        if let (true, Some(last)) = (reusable, &self.last_data) {
            match pending {
                Recompute::Nothing => {
                    log::debug!("Layer {}: nothing changed, reusing payload", self.id);
                    return Ok(last.clone());
                }
                Recompute::Style => {
                    log::debug!("Layer {}: style refresh", self.id);
                    let data = last.data.clone();
                    let get_position = self.position_accessor();
                    let config = self.config.clone();
                    let mut ctx = FormatContext {
                        dataset,
                        config: &config,
                        columns: &columns,
                        colors: &mut self.colors,
                    };
                    return Ok(self.variant.format_data(&mut ctx, data, get_position));
                }
                Recompute::Full => {}
            }
        }

        self.update_layer_domain(dataset);

        let config = self.config.clone();
        let mut ctx = FormatContext {
            dataset,
            config: &config,
            columns: &columns,
            colors: &mut self.colors,
        };
        self.variant.prepare(&ctx);

        if changes.meta {
            match self.variant.compute_bounds(&ctx) {
                Some(bounds) => self.meta.bounds = Some(bounds),
                None => log::debug!("Layer {}: no positions, keeping bounds", self.id),
            }
            self.meta.feature_types = self.variant.feature_types(&ctx);
        }

        let data = match (&self.last_data, changes.data) {
            (Some(last), false) => last.data.clone(),
            _ => Arc::new(
                dataset
                    .filtered_index
                    .iter()
                    .filter_map(|index| self.variant.resolve_position(&ctx, *index))
                    .collect(),
            ),
        };

        let get_position = match &self.positions {
            Some(cache) if cache.columns == config.columns => cache.accessor.clone(),
            _ => {
                let accessor = Accessor::function(|item: &LayerItem| item.position.unwrap_or_default());
                self.positions = Some(PositionCache {
                    columns: config.columns.clone(),
                    accessor: accessor.clone(),
                });
                accessor
            }
        };

        let layer_data = self.variant.format_data(&mut ctx, data, get_position);
        self.data_triggers = Some(triggers);

        Ok(layer_data)
    }

    fn position_accessor(&self) -> Accessor<Position> {
        match &self.positions {
            Some(cache) => cache.accessor.clone(),
            None => Accessor::function(|item: &LayerItem| item.position.unwrap_or_default()),
        }
    }
}

/// Update triggers of the channel extended with the constants its accessor falls back to.
pub(crate) fn channel_triggers(
    channel: &VisualChannel,
    config: &LayerConfig,
    constants: serde_json::Value,
) -> serde_json::Value {
    let mut triggers = channel.update_triggers(config);
    if let (Some(triggers), serde_json::Value::Object(constants)) = (triggers.as_object_mut(), constants) {
        triggers.extend(constants);
    }

    triggers
}

/// Radius accessor of point-like layers. With `fixedRadius` the field values are used as radii in meters.
pub(crate) fn radius_accessor(
    config: &LayerConfig,
    size: &VisualChannel,
    rows: &Arc<Vec<crate::dataset::Row>>,
) -> Accessor<f64> {
    let vis = &config.vis_config;
    match (vis.fixed_radius, config.field(size.slot)) {
        (true, Some(field)) => config
            .channel(size.slot)
            .and_then(|selection| identity_scale(&selection.domain))
            .map(|scale| encode_channel(rows.clone(), field.table_field_index, scale, 0.0)),
        _ => None,
    }
    .unwrap_or_else(|| bind_channel(config, size, rows, &vis.radius_range, 1.0, 0.0))
}

/// Item position of point-like layers. `None` if any coordinate is missing or not finite.
///
/// A mapped altitude column with a missing cell makes the position invalid.
pub(crate) fn point_position(columns: &ResolvedColumns, row: &crate::dataset::Row) -> Option<Position> {
    let altitude = if columns.has("altitude") {
        columns.number(row, "altitude")
    } else {
        0.0
    };
    let position = Position::new(columns.number(row, "lng"), columns.number(row, "lat"), altitude);
    position.is_finite().then_some(position)
}

/// Bounds of the `lat`/`lng` columns over all rows of the dataset.
pub(crate) fn point_bounds(ctx: &FormatContext<'_>, lat: &str, lng: &str) -> Option<Rect> {
    Rect::from_lng_lat(
        ctx.dataset
            .all_data
            .iter()
            .map(|row| (ctx.columns.number(row, lng), ctx.columns.number(row, lat))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_identity() {
        let a: Accessor<f64> = Accessor::function(|item| item.index as f64);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Accessor::function(|item| item.index as f64)));
        assert!(!Accessor::Constant(1.0).ptr_eq(&Accessor::Constant(1.0)));
        assert_eq!(a.get(&LayerItem::new(3)), 3.0);
        assert_eq!(a.constant(), None);
    }

    #[test]
    fn layer_kinds() {
        assert_eq!(LayerKind::Scenegraph.type_name(), "3D");
        assert!(LayerKind::Grid.is_aggregated());
        assert!(!LayerKind::Point.is_aggregated());
        assert_eq!(serde_json::to_string(&LayerKind::GeoJson).unwrap(), "\"geojson\"");
    }

    #[test]
    fn empty_payload_keys() {
        assert_eq!(LayerData::empty().keys(), vec!["data"]);
    }
}
