//! Geolayer is the data core of a geospatial visualization: it turns tabular datasets into payloads that a
//! WebGL style renderer can draw.
//!
//! # Quick start
//!
//! ```no_run
//! use geolayer::dataset::{Dataset, Field, FieldType, Value};
//! use geolayer::layer::{Layer, LayerKind};
//!
//! let dataset = Dataset::new(
//!     "trips",
//!     vec![
//!         Field::new("lat", FieldType::Real, 0),
//!         Field::new("lng", FieldType::Real, 1),
//!     ],
//!     vec![vec![Value::Real(29.98), Value::Real(31.13)]],
//! );
//!
//! let mut config = Layer::default_config(LayerKind::Point)
//!     .with_column("lat", "lat")
//!     .with_column("lng", "lng");
//! config.data_id = Some("trips".into());
//!
//! let mut layer = Layer::new("pickups", LayerKind::Point, config);
//! let datasets = [("trips".to_string(), dataset)].into_iter().collect();
//! let data = layer.format_layer_data(&datasets);
//! assert_eq!(data.data.len(), 1);
//! ```
//!
//! # Main components
//!
//! * [`Dataset`](dataset::Dataset) holds the rows of a loaded file together with its current filtering state.
//! * [`LayerConfig`](config::LayerConfig) describes what a layer draws: its columns, the field, scale and
//!   domain of every visual channel and the visual properties. Configs are values: a layer replaces its
//!   config on every change.
//! * [`Layer`](layer::Layer) keeps the state of the last formatting pass and decides, using
//!   [`triggers`], how much of it has to be recomputed after a config or dataset change.
//! * [`channel`] validates channel selections and binds them into per-item
//!   [`Accessor`](layer::Accessor)s through [`scale`]s over [`domain`]s.
//! * [`aggregate`] and [`aggregator`] reduce the items of a grid cell into the values encoded by its
//!   color and height.

pub mod aggregate;
pub mod aggregator;
pub mod channel;
mod color;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod layer;
pub mod scale;
pub mod settings;
pub mod triggers;

pub use color::{Color, ColorRange, ColorRangeCache};
pub use error::GeolayerError;
pub use layer::{Layer, LayerData, LayerKind};

// Reexport geolayer_types
pub use geolayer_types;

#[cfg(test)]
mod tests;
