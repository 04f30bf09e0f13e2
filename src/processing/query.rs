//! Single-comparison predicates: `<column> <op> <literal>`.
//!
//! The expression is split on whitespace into a column name, one of the six comparison
//! operators and a literal (everything after the operator). The literal may be wrapped in
//! single or double quotes, which allows it to contain operator characters; an unquoted literal
//! may span several words but must not contain a second operator token.
//!
//! The literal is typed by the column it is compared against:
//!
//! | column      | literal parsed as         | operators       |
//! |-------------|---------------------------|-----------------|
//! | Int64/Float64 | number                  | all six         |
//! | DateTime    | datetime (CSV patterns)   | all six         |
//! | Bool        | `true` / `false`          | `==`, `!=`      |
//! | Utf8        | text, compared exactly    | `==`, `!=`      |
//!
//! Null cells never satisfy a predicate, whatever the operator.

use std::cmp::Ordering;
use std::fmt;

use crate::column::{parse_bool, parse_datetime, parse_f64, parse_i64, Column};
use crate::error::{FrameError, FrameResult};
use crate::frame::DataFrame;
use crate::types::{DataType, Value};

use super::filter::filter_mask;

/// Comparison operator of a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Gt => ord == Ordering::Greater,
            Self::Le => ord != Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `<column> <op> <literal>` expression. The literal stays untyped until it is
/// evaluated against a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub op: CompareOp,
    pub literal: String,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: CompareOp, literal: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            literal: literal.into(),
        }
    }

    /// Parse an expression such as `value < 30` or `city == 'New York'`.
    pub fn parse(expression: &str) -> FrameResult<Self> {
        let err = |msg: &str| FrameError::query(expression, msg);
        let trimmed = expression.trim();

        let (column, rest) = trimmed
            .split_once(char::is_whitespace)
            .ok_or_else(|| err("expected `<column> <op> <literal>`"))?;
        let rest = rest.trim_start();
        let (op_token, literal) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let op = CompareOp::from_token(op_token).ok_or_else(|| {
            FrameError::query(
                expression,
                format!(
                    "unrecognized operator '{op_token}' (expected one of ==, !=, <, >, <=, >=)"
                ),
            )
        })?;

        let literal = literal.trim();
        if literal.is_empty() {
            return Err(err("missing literal after operator"));
        }
        let literal = match unquote(literal) {
            Some(inner) => inner,
            None => {
                if literal.split_whitespace().any(|t| CompareOp::from_token(t).is_some()) {
                    return Err(err("expression contains more than one operator"));
                }
                literal
            }
        };

        Ok(Self::new(column, op, literal))
    }

    /// Evaluate against every row of `df`.
    pub fn mask(&self, df: &DataFrame) -> FrameResult<Vec<bool>> {
        let column = df.column(&self.column).map_err(|_| {
            self.error(format!(
                "unknown column '{}'. columns={:?}",
                self.column,
                df.schema().field_names().collect::<Vec<_>>()
            ))
        })?;
        let literal = self.typed_literal(column.data_type())?;
        Ok(match literal {
            // An all-null column matches nothing.
            None => vec![false; column.len()],
            Some(lit) => mask_column(column, self.op, &lit),
        })
    }

    fn typed_literal(&self, data_type: DataType) -> FrameResult<Option<Value>> {
        let lit = self.literal.as_str();
        let value = match data_type {
            DataType::Null => return Ok(None),
            DataType::Int64 | DataType::Float64 => parse_i64(lit)
                .map(Value::Int64)
                .or_else(|| parse_f64(lit).map(Value::Float64))
                .ok_or_else(|| {
                    self.error(format!(
                        "literal '{lit}' is not a number but column '{}' is {data_type}",
                        self.column
                    ))
                })?,
            DataType::DateTime => parse_datetime(lit).map(Value::DateTime).ok_or_else(|| {
                self.error(format!(
                    "literal '{lit}' is not a datetime but column '{}' is {data_type}",
                    self.column
                ))
            })?,
            DataType::Bool => {
                self.require_equality(data_type)?;
                parse_bool(lit).map(Value::Bool).ok_or_else(|| {
                    self.error(format!(
                        "literal '{lit}' is not a boolean but column '{}' is {data_type}",
                        self.column
                    ))
                })?
            }
            DataType::Utf8 => {
                self.require_equality(data_type)?;
                Value::Utf8(lit.to_string())
            }
        };
        Ok(Some(value))
    }

    fn require_equality(&self, data_type: DataType) -> FrameResult<()> {
        if self.op.is_equality() {
            Ok(())
        } else {
            Err(self.error(format!(
                "operator '{}' is not supported on {data_type} column '{}'",
                self.op, self.column
            )))
        }
    }

    fn error(&self, message: String) -> FrameError {
        FrameError::query(&self.to_string(), message)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.literal)
    }
}

fn unquote(s: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        s.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}

fn mask_column(column: &Column, op: CompareOp, literal: &Value) -> Vec<bool> {
    column
        .iter()
        .map(|v| v.compare(literal).is_some_and(|ord| op.holds(ord)))
        .collect()
}

/// Rows of `df` satisfying `expression`, in their original order.
pub fn query(df: &DataFrame, expression: &str) -> FrameResult<DataFrame> {
    let predicate = Predicate::parse(expression)?;
    let mask = predicate.mask(df)?;
    filter_mask(df, &mask)
}
