//! Typed column storage and text type inference.
//!
//! A [`Column`] is a contiguous, single-typed sequence of optional values. Absent values are
//! `None`, never a sentinel. Columns built from text tokens resolve their type once, through
//! the fixed chain `Int64 -> Float64 -> DateTime -> Bool -> Utf8`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{FrameError, FrameResult};
use crate::types::{DataType, Value};

/// A typed column of optional values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
    Bool(Vec<Option<bool>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    /// All-null column of the given length.
    Null(usize),
}

impl Column {
    /// Empty column of the given type.
    pub fn empty(data_type: DataType) -> Self {
        Self::nulls(data_type, 0)
    }

    /// Column of `len` nulls with the given type.
    pub fn nulls(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Int64 => Column::Int64(vec![None; len]),
            DataType::Float64 => Column::Float64(vec![None; len]),
            DataType::Utf8 => Column::Utf8(vec![None; len]),
            DataType::Bool => Column::Bool(vec![None; len]),
            DataType::DateTime => Column::DateTime(vec![None; len]),
            DataType::Null => Column::Null(len),
        }
    }

    /// Build a column of `data_type` from values.
    ///
    /// Every non-null value must have exactly `data_type`, except that `Int64` values are
    /// accepted (and converted) in a `Float64` column.
    pub fn from_values(data_type: DataType, values: Vec<Value>) -> FrameResult<Self> {
        let mismatch = |v: &Value| FrameError::Type {
            column: String::new(),
            message: format!("value {v} of type {} in {data_type} column", v.data_type()),
        };
        let col = match data_type {
            DataType::Int64 => Column::Int64(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::Int64(x) => Ok(Some(x)),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<FrameResult<_>>()?,
            ),
            DataType::Float64 => Column::Float64(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::Float64(x) => Ok(Some(x)),
                        Value::Int64(x) => Ok(Some(x as f64)),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<FrameResult<_>>()?,
            ),
            DataType::Utf8 => Column::Utf8(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::Utf8(s) => Ok(Some(s)),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<FrameResult<_>>()?,
            ),
            DataType::Bool => Column::Bool(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::Bool(b) => Ok(Some(b)),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<FrameResult<_>>()?,
            ),
            DataType::DateTime => Column::DateTime(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::DateTime(d) => Ok(Some(d)),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<FrameResult<_>>()?,
            ),
            DataType::Null => {
                if let Some(v) = values.iter().find(|v| !v.is_null()) {
                    return Err(mismatch(v));
                }
                Column::Null(values.len())
            }
        };
        Ok(col)
    }

    /// Build a column from text tokens, inferring its type.
    ///
    /// `None` and empty tokens become nulls. Utf8 values keep their surrounding whitespace.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[Option<S>]) -> Self {
        let data_type = infer_type(tokens);
        // The inferred type accepts every token by construction.
        Self::parse_tokens(data_type, tokens).unwrap_or_else(|_| {
            Column::Utf8(
                tokens
                    .iter()
                    .map(|t| present(t).map(str::to_owned))
                    .collect(),
            )
        })
    }

    /// Parse text tokens as `data_type`.
    ///
    /// Fails with a type error on the first token that does not parse.
    pub fn parse_tokens<S: AsRef<str>>(
        data_type: DataType,
        tokens: &[Option<S>],
    ) -> FrameResult<Self> {
        fn parse_all<S: AsRef<str>, T>(
            tokens: &[Option<S>],
            data_type: DataType,
            parse: impl Fn(&str) -> Option<T>,
        ) -> FrameResult<Vec<Option<T>>> {
            tokens
                .iter()
                .enumerate()
                .map(|(i, t)| match present(t) {
                    None => Ok(None),
                    Some(s) => parse(s).map(Some).ok_or_else(|| FrameError::Type {
                        column: String::new(),
                        message: format!("token {i} ('{s}') is not a valid {data_type}"),
                    }),
                })
                .collect()
        }

        Ok(match data_type {
            DataType::Int64 => Column::Int64(parse_all(tokens, data_type, parse_i64)?),
            DataType::Float64 => Column::Float64(parse_all(tokens, data_type, parse_f64)?),
            DataType::DateTime => Column::DateTime(parse_all(tokens, data_type, parse_datetime)?),
            DataType::Bool => Column::Bool(parse_all(tokens, data_type, parse_bool)?),
            DataType::Utf8 => Column::Utf8(parse_all(tokens, data_type, |s| Some(s.to_owned()))?),
            DataType::Null => {
                if let Some(s) = tokens.iter().find_map(present) {
                    return Err(FrameError::Type {
                        column: String::new(),
                        message: format!("non-empty token '{s}' in null column"),
                    });
                }
                Column::Null(tokens.len())
            }
        })
    }

    /// Logical type of the column.
    pub fn data_type(&self) -> DataType {
        match self {
            Column::Int64(_) => DataType::Int64,
            Column::Float64(_) => DataType::Float64,
            Column::Utf8(_) => DataType::Utf8,
            Column::Bool(_) => DataType::Bool,
            Column::DateTime(_) => DataType::DateTime,
            Column::Null(_) => DataType::Null,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Utf8(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::DateTime(v) => v.len(),
            Column::Null(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`, failing with an index error when out of range.
    pub fn get(&self, index: usize) -> FrameResult<Value> {
        if index >= self.len() {
            return Err(FrameError::Index {
                index,
                len: self.len(),
            });
        }
        Ok(self.value(index))
    }

    /// Whether the value at `index` is null. Out-of-range indexes report `true`.
    pub fn is_null(&self, index: usize) -> bool {
        match self {
            Column::Int64(v) => v.get(index).is_none_or(Option::is_none),
            Column::Float64(v) => v.get(index).is_none_or(Option::is_none),
            Column::Utf8(v) => v.get(index).is_none_or(Option::is_none),
            Column::Bool(v) => v.get(index).is_none_or(Option::is_none),
            Column::DateTime(v) => v.get(index).is_none_or(Option::is_none),
            Column::Null(_) => true,
        }
    }

    /// Number of null values.
    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    /// Iterate all values in order.
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(move |i| self.value(i))
    }

    /// Unchecked (in the sense of "no `Result`") access; callers guarantee `index < len`.
    pub(crate) fn value(&self, index: usize) -> Value {
        match self {
            Column::Int64(v) => v[index].map_or(Value::Null, Value::Int64),
            Column::Float64(v) => v[index].map_or(Value::Null, Value::Float64),
            Column::Utf8(v) => v[index].clone().map_or(Value::Null, Value::Utf8),
            Column::Bool(v) => v[index].map_or(Value::Null, Value::Bool),
            Column::DateTime(v) => v[index].map_or(Value::Null, Value::DateTime),
            Column::Null(_) => Value::Null,
        }
    }

    /// New column made of the values at `indices`, in that order. Every index must be in
    /// range.
    pub(crate) fn take(&self, indices: &[usize]) -> Column {
        fn pick<T: Clone>(v: &[Option<T>], indices: &[usize]) -> Vec<Option<T>> {
            indices.iter().map(|&i| v[i].clone()).collect()
        }
        match self {
            Column::Int64(v) => Column::Int64(pick(v, indices)),
            Column::Float64(v) => Column::Float64(pick(v, indices)),
            Column::Utf8(v) => Column::Utf8(pick(v, indices)),
            Column::Bool(v) => Column::Bool(pick(v, indices)),
            Column::DateTime(v) => Column::DateTime(pick(v, indices)),
            Column::Null(_) => Column::Null(indices.len()),
        }
    }

    /// New column holding the values where `mask` is `true`. Mask entries past the end of
    /// the column are ignored.
    pub fn filter(&self, mask: &[bool]) -> Column {
        let indices: Vec<usize> = mask
            .iter()
            .take(self.len())
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        self.take(&indices)
    }

    /// First `n` values (or all, if shorter).
    pub fn head(&self, n: usize) -> Column {
        let n = n.min(self.len());
        self.take(&(0..n).collect::<Vec<_>>())
    }

    /// Append `other` to `self`. Both columns must have the same type.
    pub fn append(&mut self, other: Column) -> FrameResult<()> {
        match (self, other) {
            (Column::Int64(a), Column::Int64(b)) => a.extend(b),
            (Column::Float64(a), Column::Float64(b)) => a.extend(b),
            (Column::Utf8(a), Column::Utf8(b)) => a.extend(b),
            (Column::Bool(a), Column::Bool(b)) => a.extend(b),
            (Column::DateTime(a), Column::DateTime(b)) => a.extend(b),
            (Column::Null(a), Column::Null(b)) => *a += b,
            (a, b) => {
                return Err(FrameError::schema(format!(
                    "cannot append {} column to {} column",
                    b.data_type(),
                    a.data_type()
                )));
            }
        }
        Ok(())
    }
}

/// Infer the most specific type able to hold every non-empty token.
pub fn infer_type<S: AsRef<str>>(tokens: &[Option<S>]) -> DataType {
    let mut values = tokens.iter().filter_map(present).peekable();
    if values.peek().is_none() {
        return DataType::Null;
    }
    let candidates: [(DataType, fn(&str) -> bool); 4] = [
        (DataType::Int64, |s| parse_i64(s).is_some()),
        (DataType::Float64, |s| parse_f64(s).is_some()),
        (DataType::DateTime, |s| parse_datetime(s).is_some()),
        (DataType::Bool, |s| parse_bool(s).is_some()),
    ];
    for (data_type, accepts) in candidates {
        if tokens.iter().filter_map(present).all(accepts) {
            return data_type;
        }
    }
    DataType::Utf8
}

/// A token that is neither missing nor the empty string. Whitespace is kept: only the
/// typed parsers trim.
fn present<S: AsRef<str>>(token: &Option<S>) -> Option<&str> {
    token.as_ref().map(AsRef::as_ref).filter(|s| !s.is_empty())
}

pub(crate) fn parse_i64(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

/// Decimal and exponent notation only; `nan`, `inf` and `infinity` stay text.
pub(crate) fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok()
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

const DATETIME_PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_PATTERNS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a token with the fixed set of DateTime patterns. Dates map to midnight.
pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_PATTERNS
        .iter()
        .find_map(|p| NaiveDateTime::parse_from_str(s, p).ok())
        .or_else(|| {
            DATE_PATTERNS
                .iter()
                .find_map(|p| NaiveDate::parse_from_str(s, p).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
