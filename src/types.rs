//! Core data model types.
//!
//! A [`crate::DataFrame`] is described by a [`Schema`] (an ordered list of typed [`Field`]s)
//! and stores one [`crate::column::Column`] per field. Single cells are surfaced as [`Value`]s.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// UTF-8 string.
    Utf8,
    /// Boolean.
    Bool,
    /// Calendar date and time without a time zone.
    DateTime,
    /// Column with no non-null values (type could not be determined).
    Null,
}

impl DataType {
    /// Whether values of this type support arithmetic aggregation.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Least general type able to hold values of both `self` and `other`.
    ///
    /// `Null` is the identity, `Int64` and `Float64` meet at `Float64`, and every other pair of
    /// distinct types falls back to `Utf8`.
    pub fn widen(self, other: DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => a,
            (DataType::Null, t) | (t, DataType::Null) => t,
            (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
                DataType::Float64
            }
            _ => DataType::Utf8,
        }
    }

    /// Short lowercase name used in previews and error messages.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Utf8 => "utf8",
            DataType::Bool => "bool",
            DataType::DateTime => "datetime",
            DataType::Null => "null",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing a DataFrame's columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the first field that appears more than once, if any.
    pub fn first_duplicate(&self) -> Option<&str> {
        self.fields.iter().enumerate().find_map(|(i, f)| {
            self.fields[..i]
                .iter()
                .any(|g| g.name == f.name)
                .then_some(f.name.as_str())
        })
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Boolean.
    Bool(bool),
    /// Date and time.
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Logical type of this value (`Null` for [`Value::Null`]).
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::Utf8(_) => DataType::Utf8,
            Value::Bool(_) => DataType::Bool,
            Value::DateTime(_) => DataType::DateTime,
        }
    }

    /// Numeric view of the value, if it is an `Int64` or `Float64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Type-tagged ordering.
    ///
    /// Values of the same type compare naturally (floats by IEEE total order, strings by byte
    /// value). `Int64` and `Float64` compare numerically with each other. Any comparison
    /// involving `Null` or two unrelated types returns `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float64(a), Value::Float64(b)) => Some(a.total_cmp(b)),
            (Value::Int64(a), Value::Float64(b)) => Some((*a as f64).total_cmp(b)),
            (Value::Float64(a), Value::Int64(b)) => Some(a.total_cmp(&(*b as f64))),
            (Value::Utf8(a), Value::Utf8(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Hashable grouping/join key for the value. `None` for nulls.
    pub fn group_key(&self) -> Option<GroupKey> {
        match self {
            Value::Null => None,
            Value::Int64(v) => Some(GroupKey::Int64(*v)),
            // -0.0 and 0.0 group together.
            Value::Float64(v) => Some(GroupKey::Float64(if *v == 0.0 { 0 } else { v.to_bits() })),
            Value::Utf8(s) => Some(GroupKey::Utf8(s.clone())),
            Value::Bool(b) => Some(GroupKey::Bool(*b)),
            Value::DateTime(d) => Some(GroupKey::DateTime(*d)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Utf8(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::DateTime(d) => write!(f, "{}", d.format(DATETIME_DISPLAY_FORMAT)),
        }
    }
}

/// Format used whenever a DateTime is rendered as text (CSV, JSON, Excel, previews).
pub const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Hashable, equality-comparable representation of a non-null [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Int64(i64),
    /// Bit pattern of the float (zero normalized).
    Float64(u64),
    Utf8(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}
