//! Change detection deciding how much of a layer has to be recomputed.

use std::sync::Arc;

use crate::config::{ChannelSlot, LayerColumns, LayerConfig};
use crate::dataset::{Dataset, Row};
use crate::scale::ScaleType;

/// Config keys every layer type can change without touching its data.
pub const BASE_NON_DATA_AFFECTING_KEYS: &[&str] =
    &["label", "opacity", "thickness", "isVisible", "hidden"];

/// Amount of work needed after a config change, ordered from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Recompute {
    /// Nothing changed.
    #[default]
    Nothing,
    /// Only styling changed: accessors are rebuilt, data, positions, domains and bounds are reused.
    Style,
    /// Data may have changed: full formatting pass.
    Full,
}

/// Result of comparing two configs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDelta {
    /// Changed config keys.
    pub changed_keys: Vec<&'static str>,
    /// Required recomputation.
    pub recompute: Recompute,
}

/// Classifies the change between two configs given the keys that do not affect data.
pub fn classify_change(
    prev: &LayerConfig,
    next: &LayerConfig,
    non_data_affecting: &[&str],
) -> ConfigDelta {
    let changed_keys = prev.changed_keys(next);
    let recompute = if changed_keys.is_empty() {
        Recompute::Nothing
    } else if changed_keys
        .iter()
        .all(|key| non_data_affecting.contains(key))
    {
        Recompute::Style
    } else {
        Recompute::Full
    };

    ConfigDelta {
        changed_keys,
        recompute,
    }
}

fn same_rows(a: &Arc<Vec<Row>>, b: &Arc<Vec<Row>>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Inputs of the data items of a layer (`getData`).
#[derive(Debug, Clone)]
pub struct DataTrigger {
    dataset_id: String,
    rows: Arc<Vec<Row>>,
    columns: LayerColumns,
    filtered_index: Vec<usize>,
}

impl PartialEq for DataTrigger {
    fn eq(&self, other: &Self) -> bool {
        self.dataset_id == other.dataset_id
            && same_rows(&self.rows, &other.rows)
            && self.columns == other.columns
            && self.filtered_index == other.filtered_index
    }
}

/// Inputs of the layer meta (`getMeta`).
#[derive(Debug, Clone)]
pub struct MetaTrigger {
    dataset_id: String,
    rows: Arc<Vec<Row>>,
    columns: LayerColumns,
}

impl PartialEq for MetaTrigger {
    fn eq(&self, other: &Self) -> bool {
        self.dataset_id == other.dataset_id
            && same_rows(&self.rows, &other.rows)
            && self.columns == other.columns
    }
}

/// Data triggers of the last formatting pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUpdateTriggers {
    /// `getData` trigger.
    pub get_data: DataTrigger,
    /// `getMeta` trigger.
    pub get_meta: MetaTrigger,
}

/// Which data triggers changed since the previous pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerChanges {
    /// Data items must be rebuilt.
    pub data: bool,
    /// Meta (bounds) must be recomputed.
    pub meta: bool,
}

impl DataUpdateTriggers {
    /// Triggers of the config over the dataset.
    pub fn new(dataset: &Dataset, config: &LayerConfig) -> Self {
        Self {
            get_data: DataTrigger {
                dataset_id: dataset.id.clone(),
                rows: dataset.all_data.clone(),
                columns: config.columns.clone(),
                filtered_index: dataset.filtered_index.clone(),
            },
            get_meta: MetaTrigger {
                dataset_id: dataset.id.clone(),
                rows: dataset.all_data.clone(),
                columns: config.columns.clone(),
            },
        }
    }

    /// Compares the triggers with the ones of the previous pass. Everything changed if there was none.
    pub fn changes(&self, prev: Option<&DataUpdateTriggers>) -> TriggerChanges {
        match prev {
            Some(prev) => TriggerChanges {
                data: self.get_data != prev.get_data,
                meta: self.get_meta != prev.get_meta,
            },
            None => TriggerChanges {
                data: true,
                meta: true,
            },
        }
    }
}

/// Inputs of the channel domains.
#[derive(Debug, Clone)]
pub struct DomainTrigger {
    rows: Arc<Vec<Row>>,
    filtered_index_for_domain: Vec<usize>,
    channels: Vec<(ChannelSlot, Option<String>, ScaleType)>,
}

impl PartialEq for DomainTrigger {
    fn eq(&self, other: &Self) -> bool {
        same_rows(&self.rows, &other.rows)
            && self.filtered_index_for_domain == other.filtered_index_for_domain
            && self.channels == other.channels
    }
}

impl DomainTrigger {
    /// Domain inputs of the config over the dataset.
    pub fn new(dataset: &Dataset, config: &LayerConfig) -> Self {
        Self {
            rows: dataset.all_data.clone(),
            filtered_index_for_domain: dataset.filtered_index_for_domain.clone(),
            channels: config
                .channels
                .iter()
                .map(|(slot, selection)| {
                    (
                        *slot,
                        selection.field.as_ref().map(|f| f.name.clone()),
                        selection.scale,
                    )
                })
                .collect(),
        }
    }
}
