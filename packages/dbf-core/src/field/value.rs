//! Typed field values.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::memo::MemoValue;

/// Number read from a Numeric/Float field.
///
/// Text with a decimal point decodes as `Decimal`, otherwise as `Integer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Integer(i64),
    Decimal(f64),
}

impl Numeric {
    pub fn as_f64(&self) -> f64 {
        match self {
            Numeric::Integer(v) => *v as f64,
            Numeric::Decimal(v) => *v,
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Integer(v) => write!(f, "{}", v),
            Numeric::Decimal(v) => write!(f, "{}", v),
        }
    }
}

/// Tri-state logical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Logical {
    True,
    False,
    /// Stored as `?`
    Undetermined,
}

impl Logical {
    /// `None` for undetermined.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Logical::True => Some(true),
            Logical::False => Some(false),
            Logical::Undetermined => None,
        }
    }
}

impl From<bool> for Logical {
    fn from(value: bool) -> Self {
        if value {
            Logical::True
        } else {
            Logical::False
        }
    }
}

impl From<Option<bool>> for Logical {
    fn from(value: Option<bool>) -> Self {
        value.map(Logical::from).unwrap_or(Logical::Undetermined)
    }
}

/// Decoded value of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Character(String),
    Numeric(Numeric),
    Integer(i32),
    Currency(f64),
    Logical(Logical),
    /// `None` for a blank date
    Date(Option<NaiveDate>),
    /// `None` for a zero Julian day
    DateTime(Option<NaiveDateTime>),
    Memo(MemoValue),
}

impl FieldValue {
    /// Variant name used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Character(_) => "character",
            FieldValue::Numeric(_) => "numeric",
            FieldValue::Integer(_) => "integer",
            FieldValue::Currency(_) => "currency",
            FieldValue::Logical(_) => "logical",
            FieldValue::Date(_) => "date",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Memo(_) => "memo",
        }
    }

    /// Numeric view of number-like values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(n) => Some(n.as_f64()),
            FieldValue::Integer(v) => Some(f64::from(*v)),
            FieldValue::Currency(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Character(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Character(s) => f.write_str(s),
            FieldValue::Numeric(n) => write!(f, "{}", n),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Currency(v) => write!(f, "{:.4}", v),
            FieldValue::Logical(Logical::True) => f.write_str("T"),
            FieldValue::Logical(Logical::False) => f.write_str("F"),
            FieldValue::Logical(Logical::Undetermined) => f.write_str("?"),
            FieldValue::Date(Some(d)) => write!(f, "{}", d),
            FieldValue::DateTime(Some(dt)) => write!(f, "{}", dt),
            FieldValue::Date(None) | FieldValue::DateTime(None) => Ok(()),
            FieldValue::Memo(m) => write!(f, "<{:?} memo, {} bytes>", m.kind, m.data.len()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Character(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Character(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Numeric(Numeric::Integer(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Numeric(Numeric::Decimal(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Logical(Logical::from(value))
    }
}

impl From<Logical> for FieldValue {
    fn from(value: Logical) -> Self {
        FieldValue::Logical(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(Some(value))
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(Some(value))
    }
}

impl From<MemoValue> for FieldValue {
    fn from(value: MemoValue) -> Self {
        FieldValue::Memo(value)
    }
}

/// Value slot of a record.
///
/// Decoding with ignore-errors turns a field that cannot be decoded into
/// `Invalid` carrying the error message; the rest of the record still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Valid(FieldValue),
    Invalid(String),
}

impl Cell {
    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            Cell::Valid(v) => Some(v),
            Cell::Invalid(_) => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Cell::Invalid(_))
    }
}

impl From<FieldValue> for Cell {
    fn from(value: FieldValue) -> Self {
        Cell::Valid(value)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Valid(v) => write!(f, "{}", v),
            Cell::Invalid(_) => f.write_str("<invalid>"),
        }
    }
}
