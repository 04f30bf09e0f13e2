//! Row filtering for [`crate::DataFrame`].

use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;

use super::query::{CompareOp, Predicate};

/// Returns a new [`DataFrame`] containing only rows where `mask` is `true`.
///
/// `mask` must have exactly one entry per row.
pub fn filter_mask(df: &DataFrame, mask: &[bool]) -> FrameResult<DataFrame> {
    if mask.len() != df.row_count() {
        return Err(FrameError::schema(format!(
            "mask has {} entries but the frame has {} rows",
            mask.len(),
            df.row_count()
        )));
    }
    let indices: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(i, keep)| keep.then_some(i))
        .collect();
    Ok(df.take(&indices))
}

/// Rows where `column == value`, with the literal typed by the column exactly as in
/// [`super::query()`].
pub fn filter_eq(df: &DataFrame, column: &str, value: &str) -> FrameResult<DataFrame> {
    let predicate = Predicate::new(column, CompareOp::Eq, value);
    let mask = predicate.mask(df)?;
    filter_mask(df, &mask)
}
