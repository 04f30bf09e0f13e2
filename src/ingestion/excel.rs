#![cfg(feature = "excel")]

//! Excel/workbook codec (`.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`).
//!
//! Reading (via `calamine`):
//! - the first non-empty row of a sheet is the header row
//! - every following row is a data row; missing trailing cells are nulls
//! - column types come from the cells: integral numbers are Int64, other numbers Float64,
//!   booleans Bool, dates DateTime, text Utf8 (text columns whose every value parses as a
//!   datetime become DateTime), widened across rows
//! - when several sheets are selected, their headers must match and rows are concatenated
//!
//! Writing (via `rust_xlsxwriter`) produces a single sheet with a header row.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_xlsxwriter::Workbook;

use crate::column::{parse_datetime, Column};
use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;
use crate::types::{DataType, Field, Schema, Value, DATETIME_DISPLAY_FORMAT};

use super::codec::FormatCodec;
use super::unified::{ExcelSheetSelection, FileFormat};

/// [`FormatCodec`] for spreadsheet workbooks.
#[derive(Debug, Clone, Default)]
pub struct ExcelCodec {
    /// Which sheet(s) to read.
    pub selection: ExcelSheetSelection,
}

impl FormatCodec for ExcelCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Excel
    }

    fn decode(&self, bytes: &[u8]) -> FrameResult<(Schema, Vec<Column>)> {
        decode_workbook(bytes.to_vec(), &self.selection)
    }

    fn encode(&self, schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
        encode_workbook(schema, columns)
    }
}

/// Read one sheet (the first one when `sheet_name` is `None`) into a [`DataFrame`].
pub fn read_excel_from_path(
    path: impl AsRef<Path>,
    sheet_name: Option<&str>,
) -> FrameResult<DataFrame> {
    let selection = match sheet_name {
        Some(name) => ExcelSheetSelection::Sheet(name.to_string()),
        None => ExcelSheetSelection::First,
    };
    let bytes = std::fs::read(path)?;
    let (schema, columns) = decode_workbook(bytes, &selection)?;
    DataFrame::new(schema, columns)
}

fn decode_workbook(
    bytes: Vec<u8>,
    selection: &ExcelSheetSelection,
) -> FrameResult<(Schema, Vec<Column>)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let available = workbook.sheet_names();
    let sheets: Vec<String> = match selection {
        ExcelSheetSelection::First => available.into_iter().take(1).collect(),
        ExcelSheetSelection::Sheet(name) => vec![name.clone()],
        ExcelSheetSelection::AllSheets => available,
        ExcelSheetSelection::Sheets(names) => names.clone(),
    };
    if sheets.is_empty() {
        return Err(FrameError::format("workbook has no sheets"));
    }

    let mut header: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<Data>> = Vec::new();
    for sheet in &sheets {
        let range = workbook.worksheet_range(sheet)?;
        let (sheet_header, sheet_rows) = split_header(&range)
            .ok_or_else(|| FrameError::format(format!("sheet '{sheet}' has no header row")))?;
        match &header {
            None => header = Some(sheet_header),
            Some(expected) if *expected != sheet_header => {
                return Err(FrameError::schema(format!(
                    "sheet '{sheet}' headers {sheet_header:?} do not match {expected:?}"
                )));
            }
            Some(_) => {}
        }
        rows.extend(sheet_rows);
    }
    let header = header.unwrap_or_default();

    let mut fields = Vec::with_capacity(header.len());
    let mut columns = Vec::with_capacity(header.len());
    for (idx, name) in header.into_iter().enumerate() {
        let cells: Vec<&Data> = rows
            .iter()
            .map(|r| r.get(idx).unwrap_or(&Data::Empty))
            .collect();
        let column = build_column(&name, &cells)?;
        fields.push(Field::new(name, column.data_type()));
        columns.push(column);
    }
    Ok((Schema::new(fields), columns))
}

/// Header names from the first non-empty row, plus every row below it.
fn split_header(range: &calamine::Range<Data>) -> Option<(Vec<String>, Vec<Vec<Data>>)> {
    let mut iter = range.rows().skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));
    let header_row = iter.next()?;
    let header = header_row
        .iter()
        .enumerate()
        .map(|(i, c)| match cell_to_header_string(c) {
            h if h.trim().is_empty() => format!("column_{i}"),
            h => h.trim().to_string(),
        })
        .collect();
    let rows = iter.map(<[Data]>::to_vec).collect();
    Some((header, rows))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
        Data::Empty => String::new(),
        other => cell_to_string(other),
    }
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        _ => c.to_string(),
    }
}

fn cell_type(c: &Data) -> DataType {
    match c {
        Data::Empty => DataType::Null,
        Data::Int(_) => DataType::Int64,
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => DataType::Int64,
        Data::Float(_) => DataType::Float64,
        Data::Bool(_) => DataType::Bool,
        Data::DateTime(_) => DataType::DateTime,
        Data::DateTimeIso(s) if parse_datetime(s).is_some() => DataType::DateTime,
        _ => DataType::Utf8,
    }
}

fn build_column(name: &str, cells: &[&Data]) -> FrameResult<Column> {
    let present = || cells.iter().copied().filter(|c| !matches!(c, Data::Empty));

    let mut data_type = present().fold(DataType::Null, |acc, c| acc.widen(cell_type(c)));
    if data_type == DataType::Utf8
        && present().all(|c| matches!(c, Data::String(s) if parse_datetime(s).is_some()))
    {
        data_type = DataType::DateTime;
    }

    let values = cells
        .iter()
        .map(|c| convert_cell(name, data_type, c))
        .collect::<FrameResult<Vec<_>>>()?;
    Column::from_values(data_type, values)
}

fn convert_cell(column: &str, data_type: DataType, c: &Data) -> FrameResult<Value> {
    let mismatch = || FrameError::Type {
        column: column.to_string(),
        message: format!("unexpected cell {c} in {data_type} column"),
    };
    if matches!(c, Data::Empty) {
        return Ok(Value::Null);
    }
    match data_type {
        DataType::Null => Err(mismatch()),
        DataType::Utf8 => Ok(Value::Utf8(cell_to_header_string(c))),
        DataType::Int64 => match c {
            Data::Int(i) => Ok(Value::Int64(*i)),
            Data::Float(f) => Ok(Value::Int64(*f as i64)),
            _ => Err(mismatch()),
        },
        DataType::Float64 => match c {
            Data::Int(i) => Ok(Value::Float64(*i as f64)),
            Data::Float(f) => Ok(Value::Float64(*f)),
            _ => Err(mismatch()),
        },
        DataType::Bool => match c {
            Data::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch()),
        },
        DataType::DateTime => match c {
            Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
                .map(Value::DateTime)
                .ok_or_else(mismatch),
            Data::DateTimeIso(s) | Data::String(s) => {
                parse_datetime(s).map(Value::DateTime).ok_or_else(mismatch)
            }
            _ => Err(mismatch()),
        },
    }
}

/// Excel serial dates count days since 1899-12-30; the fraction is the time of day.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let micros = (serial * 86_400_000_000.0).round();
    if !micros.is_finite() {
        return None;
    }
    base.checked_add_signed(Duration::microseconds(micros as i64))
}

fn encode_workbook(schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let rows = columns.first().map_or(0, Column::len);
    for (c, (field, column)) in schema.fields.iter().zip(columns).enumerate() {
        let col = u16::try_from(c)
            .map_err(|_| FrameError::format(format!("too many columns for a sheet: {c}")))?;
        sheet.write_string(0, col, &field.name)?;
        for r in 0..rows {
            let row = u32::try_from(r + 1)
                .map_err(|_| FrameError::format(format!("too many rows for a sheet: {r}")))?;
            match column.get(r)? {
                Value::Null => {}
                Value::Int64(v) => {
                    sheet.write_number(row, col, v as f64)?;
                }
                Value::Float64(v) => {
                    sheet.write_number(row, col, v)?;
                }
                Value::Bool(b) => {
                    sheet.write_boolean(row, col, b)?;
                }
                Value::Utf8(s) => {
                    sheet.write_string(row, col, &s)?;
                }
                Value::DateTime(d) => {
                    sheet.write_string(row, col, d.format(DATETIME_DISPLAY_FORMAT).to_string())?;
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}
