//! Vertical concatenation.

use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;

/// Rows of `top` followed by rows of `bottom`. Both schemas must be identical: same names,
/// same types, same order.
pub fn concat(top: &DataFrame, bottom: &DataFrame) -> FrameResult<DataFrame> {
    if top.schema() != bottom.schema() {
        let describe = |df: &DataFrame| {
            df.schema()
                .fields
                .iter()
                .map(|f| format!("{}:{}", f.name, f.data_type))
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(FrameError::schema(format!(
            "cannot concat frames with different schemas: [{}] vs [{}]",
            describe(top),
            describe(bottom)
        )));
    }
    let mut columns = top.columns().to_vec();
    for (column, other) in columns.iter_mut().zip(bottom.columns()) {
        column.append(other.clone())?;
    }
    DataFrame::new(top.schema().clone(), columns)
}
