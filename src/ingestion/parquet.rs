//! Parquet codec.
//!
//! Reading uses the Parquet record API over an in-memory buffer; column types come from the
//! file's leaf column descriptors (physical type plus converted type). Only flat schemas are
//! supported.
//!
//! Writing produces a single row group with one OPTIONAL column per field.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime};
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field as ParquetField;
use parquet::schema::types::{ColumnDescriptor, Type as SchemaType};

use crate::column::Column;
use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;
use crate::types::{DataType, Field, Schema, Value};

use super::codec::FormatCodec;
use super::unified::FileFormat;

/// [`FormatCodec`] for Apache Parquet.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetCodec;

impl FormatCodec for ParquetCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Parquet
    }

    fn decode(&self, bytes: &[u8]) -> FrameResult<(Schema, Vec<Column>)> {
        decode_parquet(Bytes::copy_from_slice(bytes))
    }

    fn encode(&self, schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
        encode_parquet(schema, columns)
    }
}

/// Read a Parquet file into a [`DataFrame`].
pub fn read_parquet_from_path(path: impl AsRef<Path>) -> FrameResult<DataFrame> {
    let bytes = std::fs::read(path)?;
    let (schema, columns) = decode_parquet(Bytes::from(bytes))?;
    DataFrame::new(schema, columns)
}

fn decode_parquet(bytes: Bytes) -> FrameResult<(Schema, Vec<Column>)> {
    let reader = SerializedFileReader::new(bytes)?;

    let fields: Vec<Field> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| {
            if c.path().parts().len() != 1 {
                return Err(FrameError::format(format!(
                    "nested parquet column '{}' is not supported",
                    c.path().string()
                )));
            }
            Ok(Field::new(c.name(), column_type(c)))
        })
        .collect::<FrameResult<_>>()?;

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); fields.len()];
    for (row_idx, row) in reader.get_row_iter(None)?.enumerate() {
        let row = row?;
        for ((_, cell), (field, out)) in row.get_column_iter().zip(fields.iter().zip(&mut values)) {
            out.push(convert_parquet_field(row_idx, field, cell)?);
        }
    }

    let columns = fields
        .iter()
        .zip(values)
        .map(|(f, v)| Column::from_values(f.data_type, v))
        .collect::<FrameResult<Vec<_>>>()?;
    Ok((Schema::new(fields), columns))
}

fn column_type(c: &ColumnDescriptor) -> DataType {
    match (c.physical_type(), c.converted_type()) {
        (_, ConvertedType::DECIMAL) => DataType::Utf8,
        (PhysicalType::BOOLEAN, _) => DataType::Bool,
        (PhysicalType::INT32, ConvertedType::DATE) => DataType::DateTime,
        (PhysicalType::INT32 | PhysicalType::INT64, ConvertedType::TIME_MILLIS)
        | (PhysicalType::INT64, ConvertedType::TIME_MICROS) => DataType::Utf8,
        (
            PhysicalType::INT64,
            ConvertedType::TIMESTAMP_MILLIS | ConvertedType::TIMESTAMP_MICROS,
        ) => DataType::DateTime,
        (PhysicalType::INT96, _) => DataType::DateTime,
        (PhysicalType::INT32 | PhysicalType::INT64, _) => DataType::Int64,
        (PhysicalType::FLOAT | PhysicalType::DOUBLE, _) => DataType::Float64,
        (PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY, _) => DataType::Utf8,
    }
}

fn convert_parquet_field(row: usize, field: &Field, f: &ParquetField) -> FrameResult<Value> {
    let mismatch = || FrameError::Type {
        column: field.name.clone(),
        message: format!("row {row}: unexpected parquet value {f} in {} column", field.data_type),
    };
    let timestamp = |dt: Option<DateTime<chrono::Utc>>| -> FrameResult<Value> {
        dt.map(|d| Value::DateTime(d.naive_utc())).ok_or_else(|| {
            FrameError::format(format!("row {row}: timestamp out of range in '{}'", field.name))
        })
    };

    if matches!(f, ParquetField::Null) {
        return Ok(Value::Null);
    }
    match field.data_type {
        DataType::Utf8 => Ok(Value::Utf8(match f {
            ParquetField::Str(s) => s.clone(),
            other => other.to_string(),
        })),
        DataType::Bool => match f {
            ParquetField::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch()),
        },
        DataType::Int64 => match f {
            ParquetField::Byte(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Short(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Int(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Long(v)
            | ParquetField::TimestampMillis(v)
            | ParquetField::TimestampMicros(v) => Ok(Value::Int64(*v)),
            ParquetField::UByte(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::UShort(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::UInt(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::ULong(v) => i64::try_from(*v).map(Value::Int64).map_err(|_| {
                FrameError::Type {
                    column: field.name.clone(),
                    message: format!("row {row}: u64 {v} out of range for int64"),
                }
            }),
            _ => Err(mismatch()),
        },
        DataType::Float64 => match f {
            ParquetField::Float(v) => Ok(Value::Float64(f64::from(*v))),
            ParquetField::Double(v) => Ok(Value::Float64(*v)),
            _ => Err(mismatch()),
        },
        DataType::DateTime => match f {
            ParquetField::Date(days) => {
                timestamp(DateTime::from_timestamp(i64::from(*days) * 86_400, 0))
            }
            ParquetField::TimestampMillis(ms) => timestamp(DateTime::from_timestamp_millis(*ms)),
            ParquetField::TimestampMicros(us) => timestamp(DateTime::from_timestamp_micros(*us)),
            _ => Err(mismatch()),
        },
        DataType::Null => Err(mismatch()),
    }
}

fn encode_parquet(schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
    let message = Arc::new(
        SchemaType::group_type_builder("schema")
            .with_fields(
                schema
                    .fields
                    .iter()
                    .map(|f| leaf_type(f).map(Arc::new))
                    .collect::<FrameResult<Vec<_>>>()?,
            )
            .build()?,
    );
    let props = Arc::new(WriterProperties::builder().build());

    let mut buf = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buf, message, props)?;
    let mut row_group = writer.next_row_group()?;
    for column in columns {
        let Some(mut col_writer) = row_group.next_column()? else {
            return Err(FrameError::format("parquet writer has fewer columns than the schema"));
        };
        match column {
            Column::Int64(v) => {
                let (vals, defs) = split_nulls(v, |x| *x);
                col_writer
                    .typed::<Int64Type>()
                    .write_batch(&vals, Some(defs.as_slice()), None)?;
            }
            Column::DateTime(v) => {
                let (vals, defs) = split_nulls(v, to_micros);
                col_writer
                    .typed::<Int64Type>()
                    .write_batch(&vals, Some(defs.as_slice()), None)?;
            }
            Column::Float64(v) => {
                let (vals, defs) = split_nulls(v, |x| *x);
                col_writer
                    .typed::<DoubleType>()
                    .write_batch(&vals, Some(defs.as_slice()), None)?;
            }
            Column::Bool(v) => {
                let (vals, defs) = split_nulls(v, |x| *x);
                col_writer
                    .typed::<BoolType>()
                    .write_batch(&vals, Some(defs.as_slice()), None)?;
            }
            Column::Utf8(v) => {
                let (vals, defs) = split_nulls(v, |s| ByteArray::from(s.as_str()));
                col_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&vals, Some(defs.as_slice()), None)?;
            }
            Column::Null(n) => {
                col_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&[], Some(vec![0i16; *n].as_slice()), None)?;
            }
        }
        col_writer.close()?;
    }
    row_group.close()?;
    writer.close()?;
    Ok(buf)
}

fn leaf_type(field: &Field) -> FrameResult<SchemaType> {
    let (physical, converted) = match field.data_type {
        DataType::Int64 => (PhysicalType::INT64, ConvertedType::NONE),
        DataType::Float64 => (PhysicalType::DOUBLE, ConvertedType::NONE),
        DataType::Bool => (PhysicalType::BOOLEAN, ConvertedType::NONE),
        DataType::DateTime => (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS),
        DataType::Utf8 | DataType::Null => (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8),
    };
    Ok(SchemaType::primitive_type_builder(&field.name, physical)
        .with_repetition(Repetition::OPTIONAL)
        .with_converted_type(converted)
        .build()?)
}

/// Non-null values plus one definition level per row (1 = present, 0 = null).
fn split_nulls<T, U>(values: &[Option<T>], convert: impl Fn(&T) -> U) -> (Vec<U>, Vec<i16>) {
    let mut vals = Vec::with_capacity(values.len());
    let mut defs = Vec::with_capacity(values.len());
    for v in values {
        match v {
            Some(x) => {
                vals.push(convert(x));
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (vals, defs)
}

fn to_micros(d: &NaiveDateTime) -> i64 {
    d.and_utc().timestamp_micros()
}
