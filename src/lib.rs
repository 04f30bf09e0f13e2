//! `grizzly` is an in-memory columnar DataFrame engine with readers for delimited text,
//! SAS7BDAT, Parquet, JSON and Excel files, and a small set of relational operators.
//!
//! The primary entrypoints are the per-format readers re-exported here ([`read_csv`],
//! [`read_sas`], [`read_parquet`], [`read_json`], [`read_excel`]) and
//! [`ingestion::read_path`], which auto-detects the format from the file extension (or you can
//! force a format via [`ingestion::IngestionOptions`]).
//!
//! ## What you can read
//!
//! **File formats (auto-detected by extension):**
//!
//! - **CSV / TSV**: `.csv`, `.tsv`, parsed in parallel chunks above 1 MiB; quoted fields may
//!   contain delimiters and newlines
//! - **SAS7BDAT**: `.sas7bdat` (uncompressed, 32/64-bit, either byte order)
//! - **JSON**: `.json` (array-of-objects) and `.ndjson` (newline-delimited objects)
//! - **Parquet**: `.parquet`, `.pq`
//! - **Excel/workbooks** (requires the Cargo feature `excel`, on by default): `.xlsx`,
//!   `.xls`, `.xlsm`, `.xlsb`, `.ods`
//!
//! **Types:** every column has one [`DataType`]: `Int64`, `Float64`, `Utf8`, `Bool`,
//! `DateTime` or `Null` (no non-null values). Text sources infer types per column through
//! `Int64 -> Float64 -> DateTime -> Bool -> Utf8`; empty cells are nulls.
//!
//! ## Quick example
//!
//! ```no_run
//! # fn main() -> Result<(), grizzly::FrameError> {
//! let df = grizzly::read_csv("people.csv")?;
//! println!("{:?}", df.shape());
//! df.show(10);
//!
//! let young = df.query("age < 30")?.sort("name", true)?;
//! let by_city = df.groupby_sum("city", "age")?;
//! young.to_parquet("young.parquet")?;
//! by_city.to_json("by_city.ndjson")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: readers, writers, unified entrypoints and observers
//! - [`processing`]: relational operators (query/filter/sort/concat/groupby/join/reduce)
//! - [`frame`]: the [`DataFrame`] facade
//! - [`column`] / [`types`]: column storage, schema and value types
//! - [`execution`]: the chunk-parallel engine behind the CSV reader
//! - [`error`]: the error type shared by everything

pub mod column;
pub mod display;
pub mod error;
pub mod execution;
pub mod frame;
pub mod ingestion;
pub mod processing;
pub mod types;

use std::path::Path;

pub use column::Column;
pub use error::{ErrorKind, FrameError, FrameResult};
pub use frame::DataFrame;
pub use processing::ReduceOp;
pub use types::{DataType, Field, Schema, Value};

/// Read a CSV file with default options (comma delimiter, parallel above 1 MiB).
pub fn read_csv(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    ingestion::csv::read_csv_from_path(path, &ingestion::csv::CsvReadOptions::default())
}

/// Read a SAS7BDAT file.
pub fn read_sas(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    ingestion::sas::read_sas_from_path(path)
}

/// Read a Parquet file.
pub fn read_parquet(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    ingestion::parquet::read_parquet_from_path(path)
}

/// Read a JSON array-of-objects or NDJSON file.
pub fn read_json(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    ingestion::json::read_json_from_path(path)
}

/// Read the first sheet of a workbook.
#[cfg(feature = "excel")]
pub fn read_excel(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    ingestion::excel::read_excel_from_path(path, None)
}
