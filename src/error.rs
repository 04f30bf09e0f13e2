use thiserror::Error;

/// Convenience result type used by every reader, writer and operator.
pub type FrameResult<T> = Result<T, FrameError>;

/// Error type returned by readers, writers and relational operators.
///
/// A single enum is shared across all formats and operators. Use [`FrameError::kind`] to
/// branch on the broad failure category without destructuring.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet codec error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON codec error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "excel")]
    /// Excel reader error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[cfg(feature = "excel")]
    /// Excel writer error (feature-gated behind `excel`).
    #[error("excel write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    /// A binary layout violates the expected structure (bad signature, truncated page, ...).
    #[error("format error: {message}")]
    Format { message: String },

    /// Delimited text is malformed (unterminated quote, field count mismatch, ...).
    ///
    /// `row` is the 0-based data-row index (header excluded) when one applies.
    #[error("parse error{}: {message}", fmt_row(.row))]
    Parse { row: Option<usize>, message: String },

    /// A query expression could not be parsed or evaluated.
    #[error("query error in '{expression}': {message}")]
    Query { expression: String, message: String },

    /// Schemas or column types are incompatible, or a required column is missing.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// An operation was applied to a column of an unsupported type.
    #[error("type error on column '{column}': {message}")]
    Type { column: String, message: String },

    /// Positional access outside of the valid range.
    #[error("index {index} out of range for length {len}")]
    Index { index: usize, len: usize },
}

fn fmt_row(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" at data row {r}"),
        None => String::new(),
    }
}

/// Broad failure category of a [`FrameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Format,
    Parse,
    Query,
    Schema,
    Type,
    Index,
}

impl FrameError {
    /// Classify this error.
    ///
    /// Wrapped codec errors are classified by what they usually mean for the caller: CSV
    /// errors are parse errors (or I/O when the csv crate reports one), Parquet/JSON/Excel
    /// decoding errors are format errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::Io(_) => ErrorKind::Io,
            FrameError::Csv(e) => match e.kind() {
                csv::ErrorKind::Io(_) => ErrorKind::Io,
                _ => ErrorKind::Parse,
            },
            FrameError::Parquet(_) | FrameError::Json(_) => ErrorKind::Format,
            #[cfg(feature = "excel")]
            FrameError::Excel(_) | FrameError::XlsxWrite(_) => ErrorKind::Format,
            FrameError::Format { .. } => ErrorKind::Format,
            FrameError::Parse { .. } => ErrorKind::Parse,
            FrameError::Query { .. } => ErrorKind::Query,
            FrameError::SchemaMismatch { .. } => ErrorKind::Schema,
            FrameError::Type { .. } => ErrorKind::Type,
            FrameError::Index { .. } => ErrorKind::Index,
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        FrameError::Format {
            message: message.into(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        FrameError::SchemaMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn query(expression: &str, message: impl Into<String>) -> Self {
        FrameError::Query {
            expression: expression.to_owned(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, FrameError};

    #[test]
    fn parse_error_message_names_row() {
        let err = FrameError::Parse {
            row: Some(7),
            message: "expected 3 fields, found 2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parse error at data row 7: expected 3 fields, found 2"
        );
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn parse_error_without_row() {
        let err = FrameError::Parse {
            row: None,
            message: "unterminated quoted field".to_string(),
        };
        assert_eq!(err.to_string(), "parse error: unterminated quoted field");
    }

    #[test]
    fn io_errors_classify_as_io() {
        let err: FrameError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
