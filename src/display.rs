//! Text previews of a [`DataFrame`].
//!
//! Only the row selection (the first `n` rows, in DataFrame order) and the type row are
//! decided here; table layout is left to `comfy-table`.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Table};

use crate::frame::DataFrame;

/// Number of rows rendered by `Display` and by `show` when callers have no preference.
pub const DEFAULT_SHOW_ROWS: usize = 10;

/// Header cells, then one row with each column's type, then up to `n` data rows.
pub fn preview_rows(df: &DataFrame, n: usize) -> (Vec<String>, Vec<String>, Vec<Vec<String>>) {
    let header = df.schema().field_names().map(str::to_owned).collect();
    let types = df
        .schema()
        .fields
        .iter()
        .map(|f| f.data_type.to_string())
        .collect();
    let shown = n.min(df.row_count());
    let rows = (0..shown)
        .map(|r| df.columns().iter().map(|c| c.value(r).to_string()).collect())
        .collect();
    (header, types, rows)
}

/// Render up to `n` rows of `df` as a table, followed by a `(rows, columns)` footer.
pub fn render(df: &DataFrame, n: usize) -> String {
    let (header, types, rows) = preview_rows(df, n);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header.into_iter().map(Cell::new).collect::<Vec<_>>());
    table.add_row(types);
    for row in rows {
        table.add_row(row);
    }

    let (r, c) = df.shape();
    let mut out = table.to_string();
    if r > n {
        out.push_str(&format!("\n... {} more rows", r - n));
    }
    out.push_str(&format!("\nshape: ({r}, {c})"));
    out
}

#[cfg(test)]
mod tests {
    use super::{preview_rows, render};
    use crate::column::Column;
    use crate::frame::DataFrame;

    fn numbered(n: i64) -> DataFrame {
        DataFrame::from_columns(vec![
            ("id", Column::Int64((1..=n).map(Some).collect())),
            (
                "score",
                Column::Float64((1..=n).map(|i| Some(i as f64 * 1.5)).collect()),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn preview_selects_first_n_rows_and_type_row() {
        let df = numbered(15);
        let (header, types, rows) = preview_rows(&df, 10);
        assert_eq!(header, vec!["id", "score"]);
        assert_eq!(types, vec!["int64", "float64"]);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0], vec!["1", "1.5"]);
        assert_eq!(rows[9][0], "10");
    }

    #[test]
    fn preview_caps_at_row_count() {
        let (_, _, rows) = preview_rows(&numbered(15), 20);
        assert_eq!(rows.len(), 15);
    }

    #[test]
    fn render_mentions_hidden_rows_and_shape() {
        let text = render(&numbered(15), 5);
        assert!(text.contains("int64"));
        assert!(text.contains("... 10 more rows"));
        assert!(text.ends_with("shape: (15, 2)"));
    }
}
