//! Reduction operations over a single column.

use crate::column::Column;
use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;
use crate::types::{DataType, Value};

/// Built-in reduction operations over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Count all rows (including nulls).
    Count,
    /// Sum numeric values, ignoring nulls.
    Sum,
    /// Minimum numeric value, ignoring nulls.
    Min,
    /// Maximum numeric value, ignoring nulls.
    Max,
    /// Arithmetic mean of numeric values, ignoring nulls.
    Mean,
}

impl ReduceOp {
    /// Lowercase name, used as the suffix of grouped output columns (`age_sum`).
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Count => "count",
            ReduceOp::Sum => "sum",
            ReduceOp::Min => "min",
            ReduceOp::Max => "max",
            ReduceOp::Mean => "mean",
        }
    }

    /// Type of the reduced value for an input column of `input` type.
    pub(crate) fn output_type(self, input: DataType) -> DataType {
        match self {
            ReduceOp::Count => DataType::Int64,
            ReduceOp::Mean => DataType::Float64,
            ReduceOp::Sum | ReduceOp::Min | ReduceOp::Max => input,
        }
    }
}

/// Reduce a column using a built-in [`ReduceOp`].
///
/// - Fails with a schema error if `column` does not exist.
/// - `Count` always returns `Int64(row_count)` and accepts any column type.
/// - `Sum`/`Min`/`Max`/`Mean` require a numeric column (type error otherwise) and return
///   `Null` if there are no non-null values. `Int64` sums stay `Int64`.
pub fn reduce(df: &DataFrame, column: &str, op: ReduceOp) -> FrameResult<Value> {
    reduce_column(column, df.column(column)?, op)
}

/// Reduce a whole column; `name` is only used in error messages.
pub(crate) fn reduce_column(name: &str, column: &Column, op: ReduceOp) -> FrameResult<Value> {
    if op == ReduceOp::Count {
        return Ok(Value::Int64(column.len() as i64));
    }
    match column {
        Column::Int64(values) => reduce_ints(name, values.iter().flatten().copied(), op),
        Column::Float64(values) => Ok(reduce_floats(values.iter().flatten().copied(), op)),
        other => Err(FrameError::Type {
            column: name.to_string(),
            message: format!(
                "{} requires a numeric column, found {}",
                op.name(),
                other.data_type()
            ),
        }),
    }
}

fn reduce_ints(name: &str, values: impl Iterator<Item = i64>, op: ReduceOp) -> FrameResult<Value> {
    let mut acc: Option<i64> = None;
    let mut count = 0usize;
    let mut total = 0f64;
    for v in values {
        count += 1;
        total += v as f64;
        acc = Some(match (op, acc) {
            (_, None) => v,
            (ReduceOp::Sum, Some(a)) => a.checked_add(v).ok_or_else(|| FrameError::Type {
                column: name.to_string(),
                message: "integer overflow in sum".to_string(),
            })?,
            (ReduceOp::Min, Some(a)) => a.min(v),
            (ReduceOp::Max, Some(a)) => a.max(v),
            (ReduceOp::Mean | ReduceOp::Count, Some(a)) => a,
        });
    }
    Ok(match (op, acc) {
        (_, None) => Value::Null,
        (ReduceOp::Mean, Some(_)) => Value::Float64(total / count as f64),
        (_, Some(a)) => Value::Int64(a),
    })
}

fn reduce_floats(values: impl Iterator<Item = f64>, op: ReduceOp) -> Value {
    let mut acc: Option<f64> = None;
    let mut count = 0usize;
    for v in values {
        count += 1;
        acc = Some(match (op, acc) {
            (_, None) => v,
            (ReduceOp::Sum | ReduceOp::Mean | ReduceOp::Count, Some(a)) => a + v,
            (ReduceOp::Min, Some(a)) => a.min(v),
            (ReduceOp::Max, Some(a)) => a.max(v),
        });
    }
    match (op, acc) {
        (_, None) => Value::Null,
        (ReduceOp::Mean, Some(sum)) => Value::Float64(sum / count as f64),
        (_, Some(a)) => Value::Float64(a),
    }
}
