//! Path-level dispatch to the format codecs.
//!
//! [`read_path`] picks a codec from [`IngestionOptions::format`] or, when that is unset, from
//! the file extension. A `.tsv` extension also switches the CSV delimiter to a tab.
//! [`write_path`] dispatches the other way; SAS7BDAT has no encoder.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{ErrorKind, FrameError, FrameResult};
use crate::frame::DataFrame;

use super::codec::FormatCodec;
use super::csv::{CsvCodec, CsvReadOptions};
use super::json::JsonCodec;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};
use super::parquet::ParquetCodec;
use super::sas::SasCodec;

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Delimited text (comma or tab separated).
    Csv,
    /// JSON array-of-objects or NDJSON.
    Json,
    /// Apache Parquet.
    Parquet,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
    /// SAS7BDAT datasets (read-only).
    Sas,
}

impl FileFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" => Some(Self::Csv),
            "json" | "ndjson" => Some(Self::Json),
            "parquet" | "pq" => Some(Self::Parquet),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "sas7bdat" => Some(Self::Sas),
            _ => None,
        }
    }

    /// Infer the format of `path` from its extension.
    pub fn from_path(path: &Path) -> FrameResult<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).ok_or_else(|| {
            FrameError::schema(format!(
                "cannot infer format: path has no extension ({})",
                path.display()
            ))
        })?;
        Self::from_extension(ext).ok_or_else(|| {
            FrameError::schema(format!(
                "cannot infer format from extension '{ext}' for path ({})",
                path.display()
            ))
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
            Self::Excel => "excel",
            Self::Sas => "sas7bdat",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How to choose sheet(s) when reading an Excel workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExcelSheetSelection {
    /// Read the first sheet (default).
    #[default]
    First,
    /// Read a single named sheet.
    Sheet(String),
    /// Read all sheets and concatenate rows.
    AllSheets,
    /// Read only the listed sheets (in order) and concatenate rows.
    Sheets(Vec<String>),
}

/// Settings for [`read_path`].
#[derive(Clone)]
pub struct IngestionOptions {
    /// Forces a codec; `None` infers it from the extension.
    pub format: Option<FileFormat>,
    /// A `.tsv` path overrides `csv.delimiter` with a tab.
    pub csv: CsvReadOptions,
    pub excel_sheet_selection: ExcelSheetSelection,
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Failures at or above this severity also reach `on_alert`.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("csv", &self.csv)
            .field("excel_sheet_selection", &self.excel_sheet_selection)
            .field("observer", &self.observer.as_ref().map(|_| "..."))
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            csv: CsvReadOptions::default(),
            excel_sheet_selection: ExcelSheetSelection::default(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Reads a file of any supported format.
///
/// Every outcome is reported to `options.observer`, if set. I/O failures count as
/// [`IngestionSeverity::Critical`] and everything else as [`IngestionSeverity::Error`].
///
/// ```no_run
/// use std::sync::Arc;
///
/// use grizzly::ingestion::{read_path, IngestionOptions, IngestionSeverity, StdErrObserver};
///
/// # fn main() -> Result<(), grizzly::FrameError> {
/// let opts = IngestionOptions {
///     observer: Some(Arc::new(StdErrObserver)),
///     alert_at_or_above: IngestionSeverity::Critical,
///     ..Default::default()
/// };
/// let df = read_path("people.csv", &opts)?;
/// println!("{df}");
/// # Ok(())
/// # }
/// ```
///
/// A file without an extension needs an explicit format:
///
/// ```no_run
/// use grizzly::ingestion::{read_path, FileFormat, IngestionOptions};
///
/// # fn main() -> Result<(), grizzly::FrameError> {
/// let opts = IngestionOptions {
///     format: Some(FileFormat::Json),
///     ..Default::default()
/// };
/// let df = read_path("events", &opts)?;
/// println!("rows={}", df.row_count());
/// # Ok(())
/// # }
/// ```
pub fn read_path(path: impl AsRef<Path>, options: &IngestionOptions) -> FrameResult<DataFrame> {
    let path = path.as_ref();
    let format = match options.format {
        Some(f) => f,
        None => FileFormat::from_path(path)?,
    };

    let start = Instant::now();
    let mut bytes_read = 0u64;
    let result = std::fs::read(path)
        .map_err(FrameError::from)
        .and_then(|bytes| {
            bytes_read = bytes.len() as u64;
            decode_with(format, path, options, &bytes)
        });

    if let Some(observer) = &options.observer {
        let ctx = IngestionContext {
            path: path.to_path_buf(),
            format,
        };
        let stats = |df: &DataFrame| IngestionStats {
            rows: df.row_count(),
            columns: df.column_count(),
            bytes: bytes_read,
            elapsed: start.elapsed(),
        };
        report(observer.as_ref(), &ctx, result.as_ref().map(stats), options.alert_at_or_above);
    }
    result
}

fn report(
    observer: &dyn IngestionObserver,
    ctx: &IngestionContext,
    outcome: Result<IngestionStats, &FrameError>,
    alert_at: IngestionSeverity,
) {
    match outcome {
        Ok(stats) => observer.on_success(ctx, stats),
        Err(err) => {
            let severity = severity_for_error(err);
            observer.on_failure(ctx, severity, err);
            if severity >= alert_at {
                observer.on_alert(ctx, severity, err);
            }
        }
    }
}

/// Write `df` to `path` in `format`. SAS7BDAT is read-only.
pub fn write_path(df: &DataFrame, path: impl AsRef<Path>, format: FileFormat) -> FrameResult<()> {
    let path = path.as_ref();
    let bytes = match format {
        FileFormat::Csv => {
            let options = if is_tsv(path) {
                CsvReadOptions::tsv()
            } else {
                CsvReadOptions::default()
            };
            CsvCodec { options }.encode(df.schema(), df.columns())?
        }
        FileFormat::Json => JsonCodec.encode(df.schema(), df.columns())?,
        FileFormat::Parquet => ParquetCodec.encode(df.schema(), df.columns())?,
        FileFormat::Excel => excel_encode(df)?,
        FileFormat::Sas => SasCodec.encode(df.schema(), df.columns())?,
    };
    std::fs::write(path, bytes)?;
    Ok(())
}

fn decode_with(
    format: FileFormat,
    path: &Path,
    options: &IngestionOptions,
    bytes: &[u8],
) -> FrameResult<DataFrame> {
    let (schema, columns) = match format {
        FileFormat::Csv => {
            let mut csv = options.csv.clone();
            if is_tsv(path) {
                csv.delimiter = b'\t';
            }
            CsvCodec { options: csv }.decode(bytes)?
        }
        FileFormat::Json => JsonCodec.decode(bytes)?,
        FileFormat::Parquet => ParquetCodec.decode(bytes)?,
        FileFormat::Excel => excel_decode(bytes, &options.excel_sheet_selection)?,
        FileFormat::Sas => SasCodec.decode(bytes)?,
    };
    DataFrame::new(schema, columns)
}

fn is_tsv(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"))
}

#[cfg(feature = "excel")]
fn excel_decode(
    bytes: &[u8],
    selection: &ExcelSheetSelection,
) -> FrameResult<(crate::types::Schema, Vec<crate::column::Column>)> {
    super::excel::ExcelCodec {
        selection: selection.clone(),
    }
    .decode(bytes)
}

#[cfg(not(feature = "excel"))]
fn excel_decode(
    _bytes: &[u8],
    _selection: &ExcelSheetSelection,
) -> FrameResult<(crate::types::Schema, Vec<crate::column::Column>)> {
    Err(excel_disabled())
}

#[cfg(feature = "excel")]
fn excel_encode(df: &DataFrame) -> FrameResult<Vec<u8>> {
    super::excel::ExcelCodec::default().encode(df.schema(), df.columns())
}

#[cfg(not(feature = "excel"))]
fn excel_encode(_df: &DataFrame) -> FrameResult<Vec<u8>> {
    Err(excel_disabled())
}

#[cfg(not(feature = "excel"))]
fn excel_disabled() -> FrameError {
    FrameError::schema("excel support not enabled (enable cargo feature 'excel')")
}

fn severity_for_error(e: &FrameError) -> IngestionSeverity {
    match e.kind() {
        ErrorKind::Io => IngestionSeverity::Critical,
        _ => IngestionSeverity::Error,
    }
}

/// An owned, deferred [`read_path`] call, e.g. for queueing reads.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub path: PathBuf,
    pub options: IngestionOptions,
}

impl IngestionRequest {
    pub fn run(&self) -> FrameResult<DataFrame> {
        read_path(&self.path, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{severity_for_error, FileFormat};
    use crate::error::{ErrorKind, FrameError};
    use crate::ingestion::IngestionSeverity;

    #[test]
    fn extensions_map_to_formats() {
        assert_eq!(FileFormat::from_extension("CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("tsv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("ndjson"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("pq"), Some(FileFormat::Parquet));
        assert_eq!(FileFormat::from_extension("ods"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_extension("sas7bdat"), Some(FileFormat::Sas));
        assert_eq!(FileFormat::from_extension("txt"), None);
    }

    #[test]
    fn paths_without_a_known_extension_are_rejected() {
        let err = FileFormat::from_path(Path::new("data")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("no extension"));
        let err = FileFormat::from_path(Path::new("data.txt")).unwrap_err();
        assert!(err.to_string().contains("'txt'"));
    }

    #[test]
    fn io_failures_are_critical() {
        let io = FrameError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert_eq!(severity_for_error(&io), IngestionSeverity::Critical);
        assert_eq!(
            severity_for_error(&FrameError::format("bad")),
            IngestionSeverity::Error
        );
    }
}
