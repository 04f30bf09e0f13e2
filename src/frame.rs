//! The [`DataFrame`] facade.
//!
//! A DataFrame owns a [`Schema`] and one [`Column`] per field. It is an immutable value:
//! every operator returns a new DataFrame and leaves its input untouched.

use std::fmt;
use std::path::Path;

use crate::column::Column;
use crate::error::{FrameError, FrameResult};
use crate::ingestion::{self, FileFormat};
use crate::processing::{self, ReduceOp};
use crate::types::{DataType, Field, Schema, Value};

/// Immutable, named, typed columnar table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
    schema: Schema,
    columns: Vec<Column>,
}

impl DataFrame {
    /// Create a DataFrame, validating that:
    ///
    /// - there is exactly one column per schema field, with the field's type
    /// - all columns have the same length
    /// - field names are unique
    pub fn new(schema: Schema, columns: Vec<Column>) -> FrameResult<Self> {
        if schema.len() != columns.len() {
            return Err(FrameError::schema(format!(
                "schema has {} fields but {} columns were provided",
                schema.len(),
                columns.len()
            )));
        }
        if let Some(name) = schema.first_duplicate() {
            return Err(FrameError::schema(format!("duplicate column name '{name}'")));
        }
        for (field, column) in schema.fields.iter().zip(&columns) {
            if field.data_type != column.data_type() {
                return Err(FrameError::schema(format!(
                    "column '{}' declared as {} but holds {} values",
                    field.name,
                    field.data_type,
                    column.data_type()
                )));
            }
        }
        if let Some(first) = columns.first() {
            let len = first.len();
            if let Some((field, column)) = schema
                .fields
                .iter()
                .zip(&columns)
                .find(|(_, c)| c.len() != len)
            {
                return Err(FrameError::schema(format!(
                    "column '{}' has {} rows, expected {len}",
                    field.name,
                    column.len()
                )));
            }
        }
        Ok(Self { schema, columns })
    }

    /// Create a DataFrame from `(name, column)` pairs, deriving the schema from the columns.
    pub fn from_columns<N: Into<String>>(columns: Vec<(N, Column)>) -> FrameResult<Self> {
        let (fields, columns): (Vec<Field>, Vec<Column>) = columns
            .into_iter()
            .map(|(name, col)| (Field::new(name, col.data_type()), col))
            .unzip();
        Self::new(Schema::new(fields), columns)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Split into schema and columns.
    pub fn into_parts(self) -> (Schema, Vec<Column>) {
        (self.schema, self.columns)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count(), self.column_count())
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> FrameResult<&Column> {
        self.schema
            .index_of(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| missing_column(&self.schema, name))
    }

    /// Column by position.
    pub fn column_at(&self, index: usize) -> FrameResult<&Column> {
        self.columns.get(index).ok_or(FrameError::Index {
            index,
            len: self.columns.len(),
        })
    }

    /// Declared type of a column.
    pub fn data_type(&self, name: &str) -> FrameResult<DataType> {
        self.schema
            .field(name)
            .map(|f| f.data_type)
            .ok_or_else(|| missing_column(&self.schema, name))
    }

    /// Single cell by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> FrameResult<Value> {
        self.column(column)?.get(row)
    }

    /// All values of one row, in schema order.
    pub fn row(&self, index: usize) -> FrameResult<Vec<Value>> {
        if index >= self.row_count() {
            return Err(FrameError::Index {
                index,
                len: self.row_count(),
            });
        }
        Ok(self.columns.iter().map(|c| c.value(index)).collect())
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> DataFrame {
        Self {
            schema: self.schema.clone(),
            columns: self.columns.iter().map(|c| c.head(n)).collect(),
        }
    }

    /// Rows at `indices`, in that order. Callers guarantee the indices are in range.
    pub(crate) fn take(&self, indices: &[usize]) -> DataFrame {
        Self {
            schema: self.schema.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    /// Rows where `mask` is `true`, keeping their original order.
    pub fn filter_mask(&self, mask: &[bool]) -> FrameResult<DataFrame> {
        processing::filter_mask(self, mask)
    }

    /// Rows matching a `<column> <op> <literal>` expression, e.g. `"value < 30"`.
    pub fn query(&self, expression: &str) -> FrameResult<DataFrame> {
        processing::query(self, expression)
    }

    /// Rows where `column == value` (same semantics as `query("<column> == <value>")`).
    pub fn filter_eq(&self, column: &str, value: &str) -> FrameResult<DataFrame> {
        processing::filter_eq(self, column, value)
    }

    /// Stable sort by one column; nulls go last regardless of direction.
    pub fn sort(&self, column: &str, ascending: bool) -> FrameResult<DataFrame> {
        processing::sort(self, column, ascending)
    }

    /// Vertical union with a DataFrame of identical schema.
    pub fn concat(&self, other: &DataFrame) -> FrameResult<DataFrame> {
        processing::concat(self, other)
    }

    /// Sum `value` per distinct `key`, in order of first appearance.
    pub fn groupby_sum(&self, key: &str, value: &str) -> FrameResult<DataFrame> {
        processing::groupby_sum(self, key, value)
    }

    /// Aggregate `value` per distinct `key` with a built-in [`ReduceOp`].
    pub fn groupby_agg(&self, key: &str, value: &str, op: ReduceOp) -> FrameResult<DataFrame> {
        processing::groupby_agg(self, key, value, op)
    }

    /// Inner equi-join on a column present in both frames.
    pub fn join(&self, other: &DataFrame, on: &str) -> FrameResult<DataFrame> {
        processing::join(self, other, on)
    }

    /// Reduce one column to a single value.
    pub fn reduce(&self, column: &str, op: ReduceOp) -> FrameResult<Value> {
        processing::reduce(self, column, op)
    }

    /// Render up to `n` rows plus a row of column types as a text table.
    pub fn render(&self, n: usize) -> String {
        crate::display::render(self, n)
    }

    /// Print [`Self::render`] to stdout.
    pub fn show(&self, n: usize) {
        println!("{}", self.render(n));
    }

    pub fn to_csv(&self, path: impl AsRef<Path>) -> FrameResult<()> {
        ingestion::write_path(self, path, FileFormat::Csv)
    }

    pub fn to_parquet(&self, path: impl AsRef<Path>) -> FrameResult<()> {
        ingestion::write_path(self, path, FileFormat::Parquet)
    }

    pub fn to_json(&self, path: impl AsRef<Path>) -> FrameResult<()> {
        ingestion::write_path(self, path, FileFormat::Json)
    }

    pub fn to_excel(&self, path: impl AsRef<Path>) -> FrameResult<()> {
        ingestion::write_path(self, path, FileFormat::Excel)
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(crate::display::DEFAULT_SHOW_ROWS))
    }
}

pub(crate) fn missing_column(schema: &Schema, name: &str) -> FrameError {
    FrameError::schema(format!(
        "missing column '{name}'. columns={:?}",
        schema.field_names().collect::<Vec<_>>()
    ))
}
