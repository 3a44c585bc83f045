//! Aggregators reducing the items of a spatial bin into the value encoded by a channel.

use std::sync::Arc;

use crate::aggregate::{aggregate, AggregateValue, Aggregation};
use crate::dataset::{Field, FilterRange, Row, Value, NULL_VALUE};
use crate::layer::{Accessor, BinAccessor, LayerItem};

/// Builds the function reducing the items of a bin.
///
/// If the filter range is active, items whose filter value lies outside of it are skipped first. Without a
/// field the aggregator counts the remaining items, otherwise it aggregates their values of the field.
pub fn make_aggregator(
    field: Option<&Field>,
    aggregation: Aggregation,
    filter_range: FilterRange,
    get_filter_value: Accessor<[f64; 4]>,
    rows: Arc<Vec<Row>>,
) -> BinAccessor {
    let field_index = field.map(|f| f.table_field_index);
    let filter = filter_range.is_active().then_some(filter_range);

    Arc::new(move |points: &[LayerItem]| {
        let passed: Vec<&LayerItem> = match &filter {
            Some(range) => points
                .iter()
                .filter(|p| range.contains(&get_filter_value.get(p)))
                .collect(),
            None => points.iter().collect(),
        };

        match field_index {
            None => AggregateValue::Number(passed.len() as f64),
            Some(index) => {
                let values: Vec<&Value> = passed
                    .iter()
                    .map(|p| {
                        rows.get(p.index)
                            .and_then(|row| row.get(index))
                            .unwrap_or(&NULL_VALUE)
                    })
                    .collect();
                aggregate(&values, aggregation)
            }
        }
    })
}
