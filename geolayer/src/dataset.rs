//! Tabular datasets consumed by layers.
//!
//! A [`Dataset`] is a list of fields and a shared table of rows. The data provider owns the filtering: it
//! supplies the rows passing all filters ([`Dataset::filtered_index`]), the rows passing all filters except
//! the ones that must not shrink color/size domains ([`Dataset::filtered_index_for_domain`]) and the range
//! filter evaluated on the GPU ([`GpuFilter`]).

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use ahash::HashMap;
use serde::{Deserialize, Serialize};

/// Number of filter dimensions a layer can evaluate on the GPU.
pub const MAX_GPU_FILTERS: usize = 4;

/// Filter value of a cell that has no data: the smallest safe integer `-(2^53 - 1)`, so that the renderer
/// filters it out.
pub const NULL_FILTER_VALUE: f64 = -9_007_199_254_740_991.0;

/// Type of a dataset field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Whole numbers.
    Integer,
    /// Floating point numbers.
    Real,
    /// Text.
    String,
    /// `true`/`false`.
    Boolean,
    /// Milliseconds since Unix epoch.
    Timestamp,
    /// GeoJSON geometries or features.
    Geojson,
}

impl FieldType {
    /// Returns true for field types whose values are compared as numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Real | Self::Timestamp)
    }
}

/// Column of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Field name, unique within the dataset.
    pub name: String,
    /// Value type of the column.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Position of the column's cell in every row.
    pub table_field_index: usize,
}

impl Field {
    /// Creates a new field.
    pub fn new(name: impl Into<String>, field_type: FieldType, table_field_index: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            table_field_index,
        }
    }
}

/// Value of a single cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    /// Integer number.
    Integer(i64),
    /// Real number. `NaN` is treated as a missing value.
    Real(f64),
    /// Text.
    String(String),
    /// Boolean.
    Boolean(bool),
    /// Milliseconds since Unix epoch.
    Timestamp(i64),
    /// Parsed GeoJSON object.
    GeoJson(Arc<geojson::GeoJson>),
}

impl Value {
    /// Returns true if the cell has no data.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Real(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric value of the cell. Strings, geometries and missing values have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) | Value::Timestamp(v) => Some(*v as f64),
            Value::Real(v) if !v.is_nan() => Some(*v),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Text of a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Key identifying the cell's value among categories, e.g. in ordinal domains and frequency tables.
    ///
    /// Numbers are formatted in their shortest form, so `2.0` and `2` share the key `"2"`.
    pub fn category_key(&self) -> Option<String> {
        match self {
            Value::Null | Value::GeoJson(_) => None,
            Value::Real(v) if v.is_nan() => None,
            Value::Real(v) => Some(format_number(*v)),
            other => Some(other.to_string()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(v) | Value::Timestamp(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{}", format_number(*v)),
            Value::String(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::GeoJson(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Formats a number the way it is displayed to the user: integers without the fractional part.
pub(crate) fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Covers `-0.0` as well.
        "0".to_string()
    } else {
        format!("{value}")
    }
}

/// Cell returned for rows that do not have the requested column.
pub(crate) static NULL_VALUE: Value = Value::Null;

/// A row of a dataset. Cells are addressed by [`Field::table_field_index`].
pub type Row = Vec<Value>;

/// Lower and upper bounds of the GPU filter, one pair per filter dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRange {
    /// Lower bounds.
    pub filter_min: [f64; MAX_GPU_FILTERS],
    /// Upper bounds.
    pub filter_max: [f64; MAX_GPU_FILTERS],
}

impl FilterRange {
    /// Creates a filter range.
    pub fn new(filter_min: [f64; MAX_GPU_FILTERS], filter_max: [f64; MAX_GPU_FILTERS]) -> Self {
        Self {
            filter_min,
            filter_max,
        }
    }

    /// The filter is active if any bound is non-zero. An all-zero range filters nothing.
    pub fn is_active(&self) -> bool {
        self.filter_min
            .iter()
            .chain(self.filter_max.iter())
            .any(|v| *v != 0.0)
    }

    /// Returns true if every dimension of the value lies inside its bounds (inclusive).
    pub fn contains(&self, value: &[f64; MAX_GPU_FILTERS]) -> bool {
        value
            .iter()
            .zip(self.filter_min.iter().zip(self.filter_max.iter()))
            .all(|(v, (min, max))| *v >= *min && *v <= *max)
    }
}

/// Range filter applied by the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuFilter {
    /// Bounds of every dimension.
    pub filter_range: FilterRange,
    /// Field filtered in every dimension. Unused dimensions are `None`.
    pub filter_fields: [Option<Field>; MAX_GPU_FILTERS],
}

impl GpuFilter {
    /// Per-dimension filter values of the row.
    ///
    /// Unused dimensions get `0`, missing values get [`NULL_FILTER_VALUE`].
    pub fn filter_value(&self, row: &Row) -> [f64; MAX_GPU_FILTERS] {
        let mut values = [0.0; MAX_GPU_FILTERS];
        for (value, field) in values.iter_mut().zip(self.filter_fields.iter()) {
            if let Some(field) = field {
                *value = row
                    .get(field.table_field_index)
                    .and_then(Value::as_f64)
                    .unwrap_or(NULL_FILTER_VALUE);
            }
        }

        values
    }

    /// Names of the filtered fields, used to detect changes of the filter value accessor.
    pub fn field_names(&self) -> Vec<Option<&str>> {
        self.filter_fields
            .iter()
            .map(|f| f.as_ref().map(|f| f.name.as_str()))
            .collect()
    }
}

/// A loaded dataset together with its current filtering state.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Dataset id, referenced by [`LayerConfig::data_id`](crate::config::LayerConfig::data_id).
    pub id: String,
    /// Fields of the dataset.
    pub fields: Vec<Field>,
    /// All rows. Replacing the rows replaces the `Arc`, which is what data change detection relies on.
    pub all_data: Arc<Vec<Row>>,
    /// Indices of rows passing all filters.
    pub filtered_index: Vec<usize>,
    /// Indices of rows passing the filters that are allowed to affect domains.
    pub filtered_index_for_domain: Vec<usize>,
    /// Filter evaluated by the renderer.
    pub gpu_filter: GpuFilter,
}

impl Dataset {
    /// Creates an unfiltered dataset.
    pub fn new(id: impl Into<String>, fields: Vec<Field>, rows: Vec<Row>) -> Self {
        let all: Vec<usize> = (0..rows.len()).collect();
        Self {
            id: id.into(),
            fields,
            all_data: Arc::new(rows),
            filtered_index: all.clone(),
            filtered_index_for_domain: all,
            gpu_filter: GpuFilter::default(),
        }
    }

    /// Sets the rows passing all filters. Indices outside of the table are dropped.
    pub fn with_filtered_index(mut self, filtered_index: Vec<usize>) -> Self {
        self.filtered_index = self.valid_indices(filtered_index);
        self
    }

    /// Sets the rows used to compute domains. Indices outside of the table are dropped.
    pub fn with_filtered_index_for_domain(mut self, filtered_index: Vec<usize>) -> Self {
        self.filtered_index_for_domain = self.valid_indices(filtered_index);
        self
    }

    /// Sets the GPU filter.
    pub fn with_gpu_filter(mut self, gpu_filter: GpuFilter) -> Self {
        self.gpu_filter = gpu_filter;
        self
    }

    fn valid_indices(&self, indices: Vec<usize>) -> Vec<usize> {
        let len = self.all_data.len();
        let count = indices.len();
        let valid: Vec<usize> = indices.into_iter().filter(|i| *i < len).collect();
        if valid.len() != count {
            log::warn!(
                "Dataset {}: dropped {} filtered indices outside of the table",
                self.id,
                count - valid.len()
            );
        }

        valid
    }

    /// Field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Cell of the row, `None` if either the row or the cell does not exist.
    pub fn value(&self, row: usize, field: &Field) -> Option<&Value> {
        self.all_data.get(row)?.get(field.table_field_index)
    }

    /// Values of the field in the rows selected by `indices`. Rows without the cell are skipped.
    pub fn values<'a>(
        &'a self,
        field: &'a Field,
        indices: &'a [usize],
    ) -> impl Iterator<Item = &'a Value> + 'a {
        indices.iter().filter_map(|i| self.value(*i, field))
    }
}

/// Datasets by id.
pub type Datasets = HashMap<String, Dataset>;
