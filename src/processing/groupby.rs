//! Grouped aggregation.

use std::collections::HashMap;

use crate::column::Column;
use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;
use crate::types::GroupKey;

use super::reduce::{reduce_column, ReduceOp};

/// Sum `value` per distinct `key`. The output has two columns, `key` and `<value>_sum`,
/// and one row per distinct non-null key in order of first appearance.
pub fn groupby_sum(df: &DataFrame, key: &str, value: &str) -> FrameResult<DataFrame> {
    groupby_agg(df, key, value, ReduceOp::Sum)
}

/// Aggregate `value` per distinct `key` with `op`; the output column is `<value>_<op>`.
///
/// Rows with a null key belong to no group. Every op except `Count` needs a numeric value
/// column.
pub fn groupby_agg(df: &DataFrame, key: &str, value: &str, op: ReduceOp) -> FrameResult<DataFrame> {
    let key_col = df.column(key)?;
    let value_col = df.column(value)?;
    let value_type = value_col.data_type();
    if op != ReduceOp::Count && !value_type.is_numeric() {
        return Err(FrameError::Type {
            column: value.to_string(),
            message: format!("cannot {} a {value_type} column", op.name()),
        });
    }

    let mut slots: HashMap<GroupKey, usize> = HashMap::new();
    let mut first_rows: Vec<usize> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    for (row, k) in key_col.iter().enumerate() {
        let Some(k) = k.group_key() else { continue };
        let slot = *slots.entry(k).or_insert_with(|| {
            first_rows.push(row);
            members.push(Vec::new());
            members.len() - 1
        });
        members[slot].push(row);
    }

    let aggregated = members
        .iter()
        .map(|rows| reduce_column(value, &value_col.take(rows), op))
        .collect::<FrameResult<Vec<_>>>()?;
    let agg_col = Column::from_values(op.output_type(value_type), aggregated)?;

    DataFrame::from_columns(vec![
        (key.to_string(), key_col.take(&first_rows)),
        (format!("{value}_{}", op.name()), agg_col),
    ])
}

#[cfg(test)]
mod tests {
    use super::{groupby_agg, groupby_sum};
    use crate::column::Column;
    use crate::error::ErrorKind;
    use crate::frame::DataFrame;
    use crate::processing::ReduceOp;
    use crate::types::{DataType, Value};

    fn people() -> DataFrame {
        DataFrame::from_columns(vec![
            (
                "name",
                Column::Utf8(vec![
                    Some("Alice".into()),
                    Some("Bob".into()),
                    Some("Charlie".into()),
                    Some("Dana".into()),
                    Some("Eve".into()),
                ]),
            ),
            (
                "age",
                Column::Int64(vec![Some(30), Some(25), Some(35), None, Some(40)]),
            ),
            (
                "city",
                Column::Utf8(vec![
                    Some("NY".into()),
                    Some("LA".into()),
                    Some("NY".into()),
                    Some("LA".into()),
                    None,
                ]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn sums_per_key_in_first_appearance_order() {
        let out = groupby_sum(&people(), "city", "age").unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(
            out.schema().field_names().collect::<Vec<_>>(),
            vec!["city", "age_sum"]
        );
        assert_eq!(out.row(0).unwrap(), vec![Value::Utf8("NY".into()), Value::Int64(65)]);
        assert_eq!(out.row(1).unwrap(), vec![Value::Utf8("LA".into()), Value::Int64(25)]);
    }

    #[test]
    fn distinct_keys_give_one_row_each() {
        let df = people().head(3);
        let df = DataFrame::from_columns(vec![
            ("name", df.column("name").unwrap().clone()),
            ("age", df.column("age").unwrap().clone()),
            (
                "city",
                Column::Utf8(vec![Some("NY".into()), Some("LA".into()), Some("Chicago".into())]),
            ),
        ])
        .unwrap();
        assert_eq!(groupby_sum(&df, "city", "age").unwrap().shape(), (3, 2));
    }

    #[test]
    fn other_aggregations() {
        let out = groupby_agg(&people(), "city", "age", ReduceOp::Mean).unwrap();
        assert_eq!(out.data_type("age_mean").unwrap(), DataType::Float64);
        assert_eq!(out.value(0, "age_mean").unwrap(), Value::Float64(32.5));
        // LA has one null age.
        assert_eq!(out.value(1, "age_mean").unwrap(), Value::Float64(25.0));

        let out = groupby_agg(&people(), "city", "name", ReduceOp::Count).unwrap();
        assert_eq!(out.value(1, "name_count").unwrap(), Value::Int64(2));
    }

    #[test]
    fn non_numeric_values_are_a_type_error() {
        let err = groupby_sum(&people(), "city", "name").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(
            groupby_sum(&people(), "town", "age").unwrap_err().kind(),
            ErrorKind::Schema
        );
    }
}
