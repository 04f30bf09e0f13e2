//! Format capability interface.
//!
//! Every file format is one [`FormatCodec`]: it turns raw bytes into a schema plus columns and,
//! when the format is writable, back again. The [`crate::DataFrame`] constructor validates what
//! a codec produces and does not care which codec produced it.

use crate::column::Column;
use crate::error::{FrameError, FrameResult};
use crate::types::Schema;

use super::unified::FileFormat;

/// Decode/encode capability implemented once per file format.
pub trait FormatCodec {
    /// Format handled by this codec.
    fn format(&self) -> FileFormat;

    /// Decode a complete in-memory file.
    fn decode(&self, bytes: &[u8]) -> FrameResult<(Schema, Vec<Column>)>;

    /// Encode a schema and matching columns into file bytes.
    ///
    /// Read-only formats keep the default, which fails with a format error.
    fn encode(&self, schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
        let _ = (schema, columns);
        Err(FrameError::format(format!(
            "writing {} files is not supported",
            self.format()
        )))
    }
}
