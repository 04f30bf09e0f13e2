//! SAS7BDAT decoder.
//!
//! A SAS7BDAT file is a header page followed by `page_count` fixed-size pages. Metadata
//! pages carry subheaders describing the columns; mix pages carry subheaders followed by
//! rows; data pages carry only rows. Decoding happens in two passes over the in-memory file:
//!
//! 1. [`header`]: magic number, layout (32/64-bit), byte order, page size and count.
//! 2. [`meta`]: walk every page with subheaders and assemble the column directory.
//! 3. [`rows`]: walk mix and data pages again and slice each row into typed values.
//!
//! Numeric columns become Float64, or DateTime when their SAS format is a date or datetime
//! format. Character columns become Utf8 (blank values are null). Compressed datasets are
//! rejected.

mod header;
mod meta;
mod rows;

#[cfg(test)]
pub(crate) mod fixture;

use std::path::Path;

use chrono::NaiveDateTime;

use crate::column::Column;
use crate::error::FrameResult;
use crate::frame::DataFrame;
use crate::types::{Field, Schema};

use super::codec::FormatCodec;
use super::unified::FileFormat;

pub use header::{Endianness, SasHeader};
pub use meta::{SasColumn, SasColumnKind};

/// [`FormatCodec`] for SAS7BDAT (read-only).
#[derive(Debug, Clone, Copy, Default)]
pub struct SasCodec;

impl FormatCodec for SasCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Sas
    }

    fn decode(&self, bytes: &[u8]) -> FrameResult<(Schema, Vec<Column>)> {
        decode_sas(bytes)
    }
}

/// Dataset-level metadata: header fields plus the column directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SasInfo {
    pub header: SasHeader,
    pub row_count: usize,
    pub row_length: usize,
    pub columns: Vec<SasColumn>,
}

impl SasInfo {
    pub fn dataset_name(&self) -> &str {
        &self.header.dataset_name
    }

    pub fn created(&self) -> Option<NaiveDateTime> {
        self.header.created
    }
}

/// Read a SAS7BDAT file into a [`DataFrame`].
///
/// A missing or unreadable path fails with an I/O error before any decoding starts.
pub fn read_sas_from_path(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    let bytes = std::fs::read(path)?;
    read_sas_from_bytes(&bytes)
}

/// Decode an in-memory SAS7BDAT file into a [`DataFrame`].
pub fn read_sas_from_bytes(bytes: &[u8]) -> FrameResult<DataFrame> {
    let (schema, columns) = decode_sas(bytes)?;
    DataFrame::new(schema, columns)
}

/// Decode only the header and column directory.
pub fn read_sas_info(bytes: &[u8]) -> FrameResult<SasInfo> {
    let header = header::SasHeader::parse(bytes)?;
    let meta = meta::read_metadata(&header, bytes)?;
    Ok(SasInfo {
        header,
        row_count: meta.row_count,
        row_length: meta.row_length,
        columns: meta.columns,
    })
}

fn decode_sas(bytes: &[u8]) -> FrameResult<(Schema, Vec<Column>)> {
    let header = header::SasHeader::parse(bytes)?;
    let meta = meta::read_metadata(&header, bytes)?;
    let columns = rows::read_rows(&header, &meta, bytes)?;
    let schema = Schema::new(
        meta.columns
            .iter()
            .zip(&columns)
            .map(|(c, col)| Field::new(c.name.clone(), col.data_type()))
            .collect(),
    );
    Ok((schema, columns))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::fixture::{FixtureColumn, FixtureValue, SasFixture};
    use super::{read_sas_from_bytes, read_sas_from_path, read_sas_info, SasColumnKind};
    use crate::error::ErrorKind;
    use crate::types::{DataType, Value};

    use FixtureValue::{Num, Text};

    fn people(is_u64: bool, little_endian: bool) -> SasFixture {
        SasFixture {
            is_u64,
            little_endian,
            columns: vec![
                FixtureColumn::numeric("id"),
                FixtureColumn::character("name", 8).with_label("Full name"),
                FixtureColumn::numeric_width("score", 4),
                FixtureColumn::numeric("born").with_format("DATE9."),
                FixtureColumn::numeric("seen").with_format("DATETIME20."),
            ],
            rows: vec![
                vec![Num(Some(1.0)), Text("Alice"), Num(Some(10.5)), Num(Some(0.0)), Num(Some(90.0))],
                vec![Num(Some(2.0)), Text("Bob"), Num(None), Num(Some(366.0)), Num(None)],
                vec![Num(Some(3.0)), Text(""), Num(Some(-2.25)), Num(None), Num(Some(86_400.0))],
                vec![Num(Some(4.0)), Text("Dana"), Num(Some(7.0)), Num(Some(-1.0)), Num(Some(0.0))],
                vec![Num(None), Text("Eve"), Num(Some(1.0)), Num(Some(1.0)), Num(Some(1.0))],
            ],
            rows_per_data_page: 2,
            ..SasFixture::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn check_people(bytes: &[u8]) {
        let df = read_sas_from_bytes(bytes).unwrap();
        assert_eq!(df.shape(), (5, 5));
        assert_eq!(
            df.schema().field_names().collect::<Vec<_>>(),
            vec!["id", "name", "score", "born", "seen"]
        );
        assert_eq!(df.data_type("id").unwrap(), DataType::Float64);
        assert_eq!(df.data_type("name").unwrap(), DataType::Utf8);
        assert_eq!(df.data_type("born").unwrap(), DataType::DateTime);
        assert_eq!(df.data_type("seen").unwrap(), DataType::DateTime);

        assert_eq!(df.value(0, "id").unwrap(), Value::Float64(1.0));
        assert_eq!(df.value(4, "id").unwrap(), Value::Null);
        assert_eq!(df.value(1, "name").unwrap(), Value::Utf8("Bob".into()));
        assert_eq!(df.value(2, "name").unwrap(), Value::Null);
        // 10.5, -2.25 and 7.0 are exact in a 4-byte truncated double.
        assert_eq!(df.value(0, "score").unwrap(), Value::Float64(10.5));
        assert_eq!(df.value(1, "score").unwrap(), Value::Null);
        assert_eq!(df.value(2, "score").unwrap(), Value::Float64(-2.25));
        assert_eq!(
            df.value(1, "born").unwrap(),
            Value::DateTime(date(1961, 1, 1).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            df.value(3, "born").unwrap(),
            Value::DateTime(date(1959, 12, 31).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            df.value(0, "seen").unwrap(),
            Value::DateTime(date(1960, 1, 1).and_hms_opt(0, 1, 30).unwrap())
        );
        assert_eq!(df.value(1, "seen").unwrap(), Value::Null);
    }

    #[test]
    fn decodes_all_layouts_and_byte_orders() {
        for is_u64 in [false, true] {
            for little in [true, false] {
                check_people(&people(is_u64, little).build());
            }
        }
    }

    #[test]
    fn decodes_rows_on_the_mix_page() {
        for is_u64 in [false, true] {
            let fixture = SasFixture {
                mix_rows: 3,
                ..people(is_u64, true)
            };
            assert_eq!(fixture.page_count(), 2);
            check_people(&fixture.build());
        }
    }

    #[test]
    fn info_exposes_labels_formats_and_header() {
        let info = read_sas_info(&people(true, true).build()).unwrap();
        assert_eq!(info.dataset_name(), "FIXTURE");
        assert_eq!(info.row_count, 5);
        assert_eq!(info.row_length, 8 + 8 + 4 + 8 + 8);
        assert_eq!(info.header.encoding, Some("utf-8"));
        assert_eq!(
            info.created(),
            Some(date(2020, 1, 1).and_hms_opt(0, 0, 0).unwrap())
        );
        let name = &info.columns[1];
        assert_eq!(name.label, "Full name");
        assert_eq!(name.kind, SasColumnKind::Character);
        assert_eq!((name.offset, name.width), (8, 8));
        assert_eq!(info.columns[3].format, "DATE9.");
    }

    #[test]
    fn empty_dataset_has_columns_and_no_rows() {
        let fixture = SasFixture {
            rows: vec![],
            ..people(false, true)
        };
        let df = read_sas_from_bytes(&fixture.build()).unwrap();
        assert_eq!(df.shape(), (0, 5));
    }

    #[test]
    fn bad_magic_is_a_format_error() {
        let mut bytes = people(false, true).build();
        bytes[13] ^= 0xFF;
        let err = read_sas_from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("bad magic number"));
        assert_eq!(read_sas_from_bytes(b"short").unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn truncated_file_is_a_format_error() {
        let bytes = people(false, true).build();
        let err = read_sas_from_bytes(&bytes[..bytes.len() - 100]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("truncated file"));
    }

    #[test]
    fn page_count_mismatch_is_a_format_error() {
        let mut bytes = people(false, true).build();
        bytes.extend(vec![0u8; 4096]);
        let err = read_sas_from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("page count mismatch"));
    }

    #[test]
    fn missing_rows_are_a_format_error() {
        let fixture = people(false, true);
        let mut bytes = fixture.build();
        // Last data page claims zero rows.
        let last_page = 1024 + (fixture.page_count() - 1) * fixture.page_size;
        bytes[last_page + 16 + 2] = 0;
        bytes[last_page + 16 + 3] = 0;
        let err = read_sas_from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("header declares 5 rows, pages hold 4"));
    }

    #[test]
    fn unknown_page_type_is_a_format_error() {
        let mut bytes = people(false, true).build();
        // Page type of the second page.
        bytes[1024 + 4096 + 16] = 0x00;
        bytes[1024 + 4096 + 17] = 0x20;
        let err = read_sas_from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("unrecognized page type"));
    }

    /// Offset of the first subheader with `signature` (64-bit little-endian layout).
    fn find_subheader(bytes: &[u8], signature: [u8; 8]) -> usize {
        1024 + bytes[1024..]
            .windows(8)
            .position(|w| w == signature)
            .expect("subheader present")
    }

    const ROW_SIZE_LE64: [u8; 8] = [0xF7, 0xF7, 0xF7, 0xF7, 0, 0, 0, 0];
    const ATTRIBUTES_LE64: [u8; 8] = [0xFC, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

    #[test]
    fn oversized_row_count_is_a_format_error() {
        let mut bytes = people(true, true).build();
        let at = find_subheader(&bytes, ROW_SIZE_LE64) + 6 * 8;
        bytes[at..at + 8].copy_from_slice(&(1u64 << 60).to_le_bytes());
        let err = read_sas_from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("more than a"), "{err}");
    }

    #[test]
    fn column_offset_past_the_row_is_a_format_error() {
        for offset in [u64::MAX, 100] {
            let mut bytes = people(true, true).build();
            // First attribute entry: data offset right after the signature and 8 padding bytes.
            let at = find_subheader(&bytes, ATTRIBUTES_LE64) + 16;
            bytes[at..at + 8].copy_from_slice(&offset.to_le_bytes());
            let err = read_sas_from_bytes(&bytes).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
            assert!(err.to_string().contains("column 'id' spans bytes"), "{err}");
        }
    }

    #[test]
    fn compressed_datasets_are_rejected() {
        let fixture = SasFixture {
            compressed: true,
            ..people(false, true)
        };
        let err = read_sas_from_bytes(&fixture.build()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("compressed"));
    }

    #[test]
    fn nonexistent_path_is_an_io_error() {
        let err = read_sas_from_path("definitely/not/here.sas7bdat").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
