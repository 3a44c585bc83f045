//! Error types used by the crate.

use thiserror::Error;

/// Geolayer error type.
///
/// Formatting a layer never fails loudly: these errors are logged and turned into an empty payload by
/// [`Layer::format_layer_data`](crate::layer::Layer::format_layer_data).
#[derive(Debug, Error)]
pub enum GeolayerError {
    /// Layer references a dataset that is not loaded.
    #[error("dataset {0} not found")]
    DatasetNotFound(String),
    /// Layer has no dataset assigned.
    #[error("layer is not bound to a dataset")]
    NoDataset,
    /// A required column is not set or references a field the dataset does not have.
    #[error("required column {0} is not resolved")]
    MissingColumn(String),
    /// Error decoding layer configuration.
    #[error("failed to decode configuration")]
    Decoding(#[from] serde_json::Error),
}
