//! Inner equi-join.

use std::collections::HashMap;

use crate::column::Column;
use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;
use crate::types::GroupKey;

/// Suffix appended to right-side column names that clash with a left-side name.
pub const RIGHT_SUFFIX: &str = "_right";

/// Inner join of `left` and `right` on the column `on`, present in both with the same type.
///
/// Every pair of rows with equal keys produces one output row: all of `left`'s columns
/// followed by `right`'s columns minus the key. Output rows follow `left`'s order, and for
/// each left row, `right`'s order. Null keys never match.
///
/// A right column whose name is already on the left gets [`RIGHT_SUFFIX`]. If the suffixed
/// name is taken as well, the join fails with a schema error naming both columns.
pub fn join(left: &DataFrame, right: &DataFrame, on: &str) -> FrameResult<DataFrame> {
    let left_key = left.column(on)?;
    let right_key = right.column(on)?;
    if left_key.data_type() != right_key.data_type() {
        return Err(FrameError::schema(format!(
            "join key '{on}' is {} on the left but {} on the right",
            left_key.data_type(),
            right_key.data_type()
        )));
    }

    let right_names = output_names_for_right(left, right, on)?;

    let mut index: HashMap<GroupKey, Vec<usize>> = HashMap::new();
    for (row, k) in right_key.iter().enumerate() {
        if let Some(k) = k.group_key() {
            index.entry(k).or_default().push(row);
        }
    }

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    for (row, k) in left_key.iter().enumerate() {
        let Some(matches) = k.group_key().and_then(|k| index.get(&k)) else {
            continue;
        };
        for &r in matches {
            left_rows.push(row);
            right_rows.push(r);
        }
    }

    let mut columns = Vec::with_capacity(left.column_count() + right.column_count() - 1);
    for (field, column) in left.schema().fields.iter().zip(left.columns()) {
        columns.push((field.name.clone(), column.take(&left_rows)));
    }
    for (name, column) in right_names {
        columns.push((name, column.take(&right_rows)));
    }
    DataFrame::from_columns(columns)
}

/// Output name of every right column except the key, checked against all other output names.
fn output_names_for_right<'a>(
    left: &DataFrame,
    right: &'a DataFrame,
    on: &str,
) -> FrameResult<Vec<(String, &'a Column)>> {
    let mut taken: Vec<&str> = left.schema().field_names().collect();
    let mut out = Vec::with_capacity(right.column_count().saturating_sub(1));
    for (field, column) in right.schema().fields.iter().zip(right.columns()) {
        if field.name == on {
            continue;
        }
        let name = if taken.contains(&field.name.as_str()) {
            format!("{}{RIGHT_SUFFIX}", field.name)
        } else {
            field.name.clone()
        };
        let clashes_later = right
            .schema()
            .field_names()
            .any(|n| n == name && n != field.name && n != on);
        if taken.contains(&name.as_str()) || clashes_later {
            return Err(FrameError::schema(format!(
                "cannot join: right column '{}' would be renamed to '{name}', \
                 which is already a column name",
                field.name
            )));
        }
        taken.push(&field.name);
        out.push((name, column));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::join;
    use crate::column::Column;
    use crate::error::ErrorKind;
    use crate::frame::DataFrame;
    use crate::types::Value;

    fn left() -> DataFrame {
        DataFrame::from_columns(vec![
            ("id", Column::Int64(vec![Some(1), Some(2), Some(3)])),
            (
                "name",
                Column::Utf8(vec![Some("a".into()), Some("b".into()), Some("c".into())]),
            ),
        ])
        .unwrap()
    }

    fn right(ids: Vec<Option<i64>>) -> DataFrame {
        let n = ids.len();
        DataFrame::from_columns(vec![
            ("id", Column::Int64(ids)),
            ("score", Column::Float64((0..n).map(|i| Some(i as f64)).collect())),
            ("name", Column::Utf8(vec![Some("r".into()); n])),
        ])
        .unwrap()
    }

    #[test]
    fn matching_distinct_keys_give_one_row_each() {
        let out = join(&left(), &right(vec![Some(3), Some(1), Some(2)]), "id").unwrap();
        assert_eq!(out.shape(), (3, 2 + 3 - 1));
        assert_eq!(
            out.schema().field_names().collect::<Vec<_>>(),
            vec!["id", "name", "score", "name_right"]
        );
        // Left order is kept.
        assert_eq!(out.row(0).unwrap()[..3], [
            Value::Int64(1),
            Value::Utf8("a".into()),
            Value::Float64(1.0)
        ]);
    }

    #[test]
    fn duplicate_keys_produce_the_cross_product() {
        let left = DataFrame::from_columns(vec![(
            "id",
            Column::Int64(vec![Some(1), Some(1), Some(2), None]),
        )])
        .unwrap();
        let out = join(&left, &right(vec![Some(1), Some(1), Some(1), None, Some(9)]), "id").unwrap();
        assert_eq!(out.row_count(), 6);
        assert_eq!(
            out.column("score").unwrap().iter().collect::<Vec<_>>()[..3],
            [Value::Float64(0.0), Value::Float64(1.0), Value::Float64(2.0)]
        );
    }

    #[test]
    fn unmatched_keys_are_dropped() {
        let out = join(&left(), &right(vec![Some(7)]), "id").unwrap();
        assert_eq!(out.shape(), (0, 4));
    }

    #[test]
    fn suffixed_name_already_in_use_is_reported() {
        let taken = DataFrame::from_columns(vec![
            ("id", Column::Int64(vec![Some(1)])),
            ("name", Column::Utf8(vec![Some("a".into())])),
            ("name_right", Column::Utf8(vec![Some("b".into())])),
        ])
        .unwrap();
        let err = join(&taken, &right(vec![Some(1)]), "id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("'name' would be renamed to 'name_right'"), "{err}");

        // The right side can hold the suffixed name too.
        let both = DataFrame::from_columns(vec![
            ("id", Column::Int64(vec![Some(1)])),
            ("name", Column::Utf8(vec![Some("r".into())])),
            ("name_right", Column::Utf8(vec![Some("s".into())])),
        ])
        .unwrap();
        let err = join(&left(), &both, "id").unwrap_err();
        assert!(err.to_string().contains("already a column name"), "{err}");
    }

    #[test]
    fn key_type_mismatch_is_a_schema_error() {
        let other = DataFrame::from_columns(vec![("id", Column::Utf8(vec![Some("1".into())]))]).unwrap();
        let err = join(&left(), &other, "id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(
            join(&left(), &right(vec![]), "missing").unwrap_err().kind(),
            ErrorKind::Schema
        );
    }
}
