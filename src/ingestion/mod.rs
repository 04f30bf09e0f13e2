//! Readers, writers and the unified entrypoints.
//!
//! Most callers should use [`read_path`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`IngestionOptions`])
//! - decodes the whole file into an in-memory [`crate::DataFrame`]
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`] (parallel, quote-aware)
//! - [`sas`] (SAS7BDAT, read-only)
//! - [`json`]
//! - [`parquet`]
//! - `excel` (Cargo feature `excel`)
//!
//! Every format implements [`FormatCodec`].

pub mod codec;
pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod json;
pub mod observability;
pub mod parquet;
pub mod sas;
pub mod unified;

pub use codec::FormatCodec;
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    StdErrObserver,
};
pub use unified::{read_path, write_path, ExcelSheetSelection, FileFormat, IngestionOptions, IngestionRequest};
