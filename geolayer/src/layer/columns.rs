use ahash::{HashMap, HashMapExt};

use crate::config::LayerConfig;
use crate::dataset::{Dataset, Row, Value};
use crate::error::GeolayerError;

/// Layer columns mapped onto cell indices of the dataset rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedColumns {
    indices: HashMap<String, usize>,
}

impl ResolvedColumns {
    /// Resolves the columns of the config. Fails if a required column is unmapped or names a field the
    /// dataset does not have. Unresolvable optional columns are left out.
    pub fn resolve(
        config: &LayerConfig,
        dataset: &Dataset,
        required: &[&str],
        optional: &[&str],
    ) -> Result<Self, GeolayerError> {
        let mut indices = HashMap::new();
        for column in required {
            let index = Self::field_index(config, dataset, column)
                .ok_or_else(|| GeolayerError::MissingColumn(column.to_string()))?;
            indices.insert(column.to_string(), index);
        }

        for column in optional {
            if let Some(index) = Self::field_index(config, dataset, column) {
                indices.insert(column.to_string(), index);
            }
        }

        Ok(Self { indices })
    }

    fn field_index(config: &LayerConfig, dataset: &Dataset, column: &str) -> Option<usize> {
        let field_name = config.columns.get(column)?.value.as_deref()?;
        dataset.field(field_name).map(|f| f.table_field_index)
    }

    /// Cell index of the column.
    pub fn index(&self, column: &str) -> Option<usize> {
        self.indices.get(column).copied()
    }

    /// Returns true if the column is mapped.
    pub fn has(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    /// Cell of the column in the row.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Option<&'a Value> {
        row.get(self.index(column)?)
    }

    /// Numeric cell of the column in the row. Missing and non-numeric cells are `NaN`.
    pub fn number(&self, row: &Row, column: &str) -> f64 {
        self.value(row, column)
            .and_then(Value::as_f64)
            .unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::dataset::{Field, FieldType};

    #[test]
    fn resolve_columns() {
        let dataset = Dataset::new(
            "d",
            vec![
                Field::new("latitude", FieldType::Real, 0),
                Field::new("longitude", FieldType::Real, 1),
            ],
            vec![vec![Value::Real(1.0), Value::from("x")]],
        );
        let config = LayerConfig::default()
            .with_column("lat", "latitude")
            .with_column("lng", "longitude")
            .with_column("altitude", "missing");

        let columns =
            ResolvedColumns::resolve(&config, &dataset, &["lat", "lng"], &["altitude"]).unwrap();
        assert_eq!(columns.index("lng"), Some(1));
        assert!(!columns.has("altitude"));
        assert_eq!(columns.number(&dataset.all_data[0], "lat"), 1.0);
        assert!(columns.number(&dataset.all_data[0], "lng").is_nan());

        assert_matches!(
            ResolvedColumns::resolve(&config, &dataset, &["lat", "lng0"], &[]),
            Err(GeolayerError::MissingColumn(column)) if column == "lng0"
        );
    }
}
