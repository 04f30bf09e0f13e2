//! JSON codec.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single object: `{"a":1}`
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Columns appear in order of first appearance across all objects; nested objects are
//! flattened into dot paths (`{"user":{"name":..}}` becomes column `user.name`). Keys missing
//! from an object are nulls. Column types come from the JSON values, widened across rows;
//! string columns whose every value parses as a datetime become DateTime columns.
//!
//! Writing produces NDJSON, one object per row, keys in column order.

use std::path::Path;

use serde_json::{Map, Number};

use crate::column::{parse_datetime, Column};
use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;
use crate::types::{DataType, Field, Schema, Value, DATETIME_DISPLAY_FORMAT};

use super::codec::FormatCodec;
use super::unified::FileFormat;

/// [`FormatCodec`] for JSON arrays and NDJSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl FormatCodec for JsonCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Json
    }

    fn decode(&self, bytes: &[u8]) -> FrameResult<(Schema, Vec<Column>)> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| FrameError::format(format!("json input is not valid utf-8: {e}")))?;
        decode_json_str(text)
    }

    fn encode(&self, schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
        encode_ndjson(schema, columns)
    }
}

/// Read a JSON or NDJSON file into a [`DataFrame`].
pub fn read_json_from_path(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    let bytes = std::fs::read(path)?;
    let (schema, columns) = JsonCodec.decode(&bytes)?;
    DataFrame::new(schema, columns)
}

/// Parse JSON or NDJSON text into a [`DataFrame`].
pub fn read_json_from_str(input: &str) -> FrameResult<DataFrame> {
    let (schema, columns) = decode_json_str(input)?;
    DataFrame::new(schema, columns)
}

fn decode_json_str(input: &str) -> FrameResult<(Schema, Vec<Column>)> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FrameError::format("json input is empty"));
    }

    // First try parsing as a single JSON value (array or object).
    let records = if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(_) => vec![v],
            _ => {
                return Err(FrameError::format(
                    "json must be an object, an array of objects, or NDJSON",
                ));
            }
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
                FrameError::format(format!("invalid ndjson at line {}: {e}", i + 1))
            })?;
            values.push(v);
        }
        values
    };

    columns_from_records(&records)
}

fn columns_from_records(records: &[serde_json::Value]) -> FrameResult<(Schema, Vec<Column>)> {
    // Column name -> one cell per record (None when the key is absent).
    let mut names: Vec<String> = Vec::new();
    let mut cells: Vec<Vec<Option<&serde_json::Value>>> = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            FrameError::format(format!("record {row} is not a json object"))
        })?;
        let mut flat = Vec::new();
        flatten_object(obj, "", &mut flat);
        for (name, value) in flat {
            let idx = match names.iter().position(|n| *n == name) {
                Some(idx) => idx,
                None => {
                    names.push(name);
                    cells.push(vec![None; row]);
                    names.len() - 1
                }
            };
            if cells[idx].len() > row {
                return Err(FrameError::schema(format!(
                    "record {row}: key path '{}' appears twice after flattening",
                    names[idx]
                )));
            }
            cells[idx].push(Some(value));
        }
        for col in &mut cells {
            col.resize(row + 1, None);
        }
    }

    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for (name, values) in names.into_iter().zip(cells) {
        let column = build_column(&name, &values)?;
        fields.push(Field::new(name, column.data_type()));
        columns.push(column);
    }
    Ok((Schema::new(fields), columns))
}

fn flatten_object<'a>(
    obj: &'a Map<String, serde_json::Value>,
    prefix: &str,
    out: &mut Vec<(String, &'a serde_json::Value)>,
) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            serde_json::Value::Object(nested) if !nested.is_empty() => {
                flatten_object(nested, &name, out)
            }
            _ => out.push((name, value)),
        }
    }
}

fn json_type(v: &serde_json::Value) -> DataType {
    match v {
        serde_json::Value::Null => DataType::Null,
        serde_json::Value::Bool(_) => DataType::Bool,
        serde_json::Value::Number(n) if n.is_i64() => DataType::Int64,
        serde_json::Value::Number(_) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn build_column(name: &str, values: &[Option<&serde_json::Value>]) -> FrameResult<Column> {
    let present = || values.iter().flatten().filter(|v| !v.is_null());

    let mut data_type = present().fold(DataType::Null, |acc, v| acc.widen(json_type(v)));
    if data_type == DataType::Utf8
        && present().all(|v| v.as_str().and_then(parse_datetime).is_some())
    {
        data_type = DataType::DateTime;
    }

    let mismatch = |v: &serde_json::Value| FrameError::Type {
        column: name.to_string(),
        message: format!("unexpected json value {v} in {data_type} column"),
    };
    let cells = values.iter().map(|v| v.filter(|v| !v.is_null()));

    Ok(match data_type {
        DataType::Null => Column::Null(values.len()),
        DataType::Int64 => Column::Int64(
            cells
                .map(|v| v.map(|v| v.as_i64().ok_or_else(|| mismatch(v))).transpose())
                .collect::<FrameResult<_>>()?,
        ),
        DataType::Float64 => Column::Float64(
            cells
                .map(|v| v.map(|v| v.as_f64().ok_or_else(|| mismatch(v))).transpose())
                .collect::<FrameResult<_>>()?,
        ),
        DataType::Bool => Column::Bool(
            cells
                .map(|v| v.map(|v| v.as_bool().ok_or_else(|| mismatch(v))).transpose())
                .collect::<FrameResult<_>>()?,
        ),
        DataType::DateTime => Column::DateTime(
            cells
                .map(|v| {
                    v.map(|v| v.as_str().and_then(parse_datetime).ok_or_else(|| mismatch(v)))
                        .transpose()
                })
                .collect::<FrameResult<_>>()?,
        ),
        DataType::Utf8 => Column::Utf8(
            cells
                .map(|v| {
                    v.map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect(),
        ),
    })
}

fn encode_ndjson(schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
    let rows = columns.first().map_or(0, Column::len);
    let mut out = Vec::new();
    for r in 0..rows {
        let mut obj = Map::with_capacity(columns.len());
        for (field, column) in schema.fields.iter().zip(columns) {
            obj.insert(field.name.clone(), to_json_value(&column.get(r)?));
        }
        serde_json::to_writer(&mut out, &serde_json::Value::Object(obj))?;
        out.push(b'\n');
    }
    Ok(out)
}

fn to_json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int64(v) => serde_json::Value::Number((*v).into()),
        Value::Float64(v) => Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Utf8(s) => serde_json::Value::String(s.clone()),
        Value::DateTime(d) => {
            serde_json::Value::String(d.format(DATETIME_DISPLAY_FORMAT).to_string())
        }
    }
}
