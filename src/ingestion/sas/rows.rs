//! Row extraction from mix and data pages.

use chrono::NaiveDateTime;

use crate::column::Column;
use crate::error::{FrameError, FrameResult};

use super::header::{days_since_1960, decode_text, seconds_since_1960, Endianness, SasHeader};
use super::meta::{page_header, Metadata, PageKind, SasColumn, SasColumnKind};

const DATE_FORMATS: &[&str] = &[
    "DATE", "DAY", "DDMMYY", "DOWNAME", "JULDAY", "JULIAN", "MMDDYY", "MMYY", "MONNAME",
    "MONTH", "MONYY", "QTR", "WEEKDATE", "WEEKDATX", "WEEKDAY", "WORDDATE", "WORDDATX",
    "YEAR", "YYMM", "YYMMDD", "YYMON", "YYQ", "E8601DA", "B8601DA", "MINGUO", "NENGO",
];

const DATETIME_FORMATS: &[&str] = &[
    "DATETIME", "DTWKDATX", "B8601DN", "B8601DT", "B8601DX", "B8601DZ", "B8601LX", "E8601DN",
    "E8601DT", "E8601DX", "E8601DZ", "E8601LX", "DATEAMPM", "DTDATE", "DTMONYY", "DTYEAR",
    "MDYAMPM",
];

/// Unit of a numeric column carrying a calendar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Temporal {
    Days,
    Seconds,
}

/// Classify a format name such as `DATE9.` or `mmddyy10` by its alphabetic stem.
fn temporal_unit(format: &str) -> Option<Temporal> {
    let stem = format
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == '.')
        .to_ascii_uppercase();
    if stem.is_empty() {
        None
    } else if DATETIME_FORMATS.contains(&stem.as_str()) {
        Some(Temporal::Seconds)
    } else if DATE_FORMATS.iter().any(|f| stem.starts_with(f)) {
        Some(Temporal::Days)
    } else {
        None
    }
}

enum Builder {
    Number(Vec<Option<f64>>),
    Temporal(Temporal, Vec<Option<NaiveDateTime>>),
    Text(Vec<Option<String>>),
}

impl Builder {
    fn for_column(column: &SasColumn, rows: usize) -> Self {
        match column.kind {
            SasColumnKind::Character => Builder::Text(Vec::with_capacity(rows)),
            SasColumnKind::Numeric => match temporal_unit(&column.format) {
                Some(unit) => Builder::Temporal(unit, Vec::with_capacity(rows)),
                None => Builder::Number(Vec::with_capacity(rows)),
            },
        }
    }

    fn push(&mut self, raw: &[u8], endian: Endianness) {
        match self {
            Builder::Number(v) => v.push(decode_number(raw, endian)),
            Builder::Temporal(unit, v) => v.push(decode_number(raw, endian).and_then(|x| match unit {
                Temporal::Days => days_since_1960(x),
                Temporal::Seconds => seconds_since_1960(x),
            })),
            Builder::Text(v) => {
                let s = decode_text(raw);
                v.push((!s.is_empty()).then_some(s));
            }
        }
    }

    fn finish(self) -> Column {
        match self {
            Builder::Number(v) => Column::Float64(v),
            Builder::Temporal(_, v) => Column::DateTime(v),
            Builder::Text(v) => Column::Utf8(v),
        }
    }
}

/// Decode a possibly truncated IEEE double. Truncation drops the low-order mantissa bytes,
/// so the stored bytes are the high-order ones and the rest is zero filled. NaN (every SAS
/// missing value) decodes to `None`.
fn decode_number(raw: &[u8], endian: Endianness) -> Option<f64> {
    let w = raw.len().min(8);
    let mut buf = [0u8; 8];
    let v = match endian {
        Endianness::Little => {
            buf[8 - w..].copy_from_slice(&raw[..w]);
            f64::from_le_bytes(buf)
        }
        Endianness::Big => {
            buf[..w].copy_from_slice(&raw[..w]);
            f64::from_be_bytes(buf)
        }
    };
    (!v.is_nan()).then_some(v)
}

/// Decode every row on mix and data pages, in page order.
pub(super) fn read_rows(header: &SasHeader, meta: &Metadata, bytes: &[u8]) -> FrameResult<Vec<Column>> {
    // Every row occupies `row_length` bytes of some page, so the file bounds the row count.
    let capacity = bytes.len() / meta.row_length.max(1);
    if meta.row_count > capacity {
        return Err(FrameError::format(format!(
            "header declares {} rows of {} bytes, more than a {}-byte file can hold",
            meta.row_count,
            meta.row_length,
            bytes.len()
        )));
    }

    let mut builders: Vec<Builder> = meta
        .columns
        .iter()
        .map(|c| Builder::for_column(c, meta.row_count))
        .collect();

    let mut read = 0usize;
    for index in 0..header.page_count {
        if read == meta.row_count {
            break;
        }
        let page = header.page(bytes, index)?;
        let ph = page_header(header, page, index)?;
        let remaining = meta.row_count - read;
        let (start, rows) = match ph.kind {
            PageKind::Mix => {
                let pointers_end = header.page_bit_offset()
                    + 8
                    + ph.subheader_count * header.subheader_pointer_len();
                (
                    pointers_end + pointers_end % 8,
                    remaining.min(meta.mix_page_row_count),
                )
            }
            PageKind::Data => (header.page_bit_offset() + 8, remaining.min(ph.block_count)),
            PageKind::Meta | PageKind::Amd | PageKind::Compressed => continue,
        };

        for r in 0..rows {
            let past_page = || {
                FrameError::format(format!(
                    "row {} on page {index} extends past the end of the page",
                    read + r
                ))
            };
            let row_start = r
                .checked_mul(meta.row_length)
                .and_then(|n| n.checked_add(start))
                .ok_or_else(past_page)?;
            let row_end = row_start.checked_add(meta.row_length).ok_or_else(past_page)?;
            let row = page.get(row_start..row_end).ok_or_else(past_page)?;
            for (builder, column) in builders.iter_mut().zip(&meta.columns) {
                builder.push(&row[column.offset..column.offset + column.width], header.endianness);
            }
        }
        read += rows;
    }

    if read != meta.row_count {
        return Err(FrameError::format(format!(
            "row count mismatch: header declares {} rows, pages hold {read}",
            meta.row_count
        )));
    }
    Ok(builders.into_iter().map(Builder::finish).collect())
}

#[cfg(test)]
mod tests {
    use super::{decode_number, temporal_unit, Temporal};
    use crate::ingestion::sas::header::Endianness;

    #[test]
    fn truncated_numbers_are_zero_padded() {
        let full = 1234.5f64;
        let le = full.to_le_bytes();
        let be = full.to_be_bytes();
        assert_eq!(decode_number(&le[5..], Endianness::Little), Some(1234.5));
        assert_eq!(decode_number(&be[..3], Endianness::Big), Some(1234.5));
        assert_eq!(decode_number(&le, Endianness::Little), Some(full));
    }

    #[test]
    fn nan_payloads_are_missing() {
        let missing = f64::from_bits(0xFFFE_0000_0000_0000).to_le_bytes();
        assert_eq!(decode_number(&missing, Endianness::Little), None);
        assert_eq!(decode_number(&missing[6..], Endianness::Little), None);
    }

    #[test]
    fn format_names_pick_the_epoch_unit() {
        assert_eq!(temporal_unit("DATE9."), Some(Temporal::Days));
        assert_eq!(temporal_unit("mmddyy10"), Some(Temporal::Days));
        assert_eq!(temporal_unit("DATETIME20."), Some(Temporal::Seconds));
        assert_eq!(temporal_unit("BEST12."), None);
        assert_eq!(temporal_unit(""), None);
    }
}
