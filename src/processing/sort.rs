//! Stable single-column sort.

use std::cmp::Ordering;

use crate::error::FrameResult;
use crate::frame::DataFrame;

/// Sort rows by `column`.
///
/// The sort is stable: rows with equal keys keep their relative order. Strings compare by
/// byte value, numbers by value, and nulls go last in either direction.
pub fn sort(df: &DataFrame, column: &str, ascending: bool) -> FrameResult<DataFrame> {
    let keys: Vec<_> = df.column(column)?.iter().collect();
    let mut indices: Vec<usize> = (0..keys.len()).collect();
    indices.sort_by(|&a, &b| {
        let (ka, kb) = (&keys[a], &keys[b]);
        match (ka.is_null(), kb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = ka.compare(kb).unwrap_or(Ordering::Equal);
                if ascending { ord } else { ord.reverse() }
            }
        }
    });
    Ok(df.take(&indices))
}
