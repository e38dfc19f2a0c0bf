//! Cell value representation.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A single decoded column value, or an application value on its way out.
///
/// Exactly one variant is active and `Null` carries nothing. Values are
/// plain data: once built they are only read.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// NULL value.
    #[default]
    Null,
    /// Character data (CHAR, VARCHAR, NCHAR, NVARCHAR, TEXT, NTEXT, XML).
    String(String),
    /// 16-bit signed integer (SMALLINT, and TINYINT widened).
    Int16(i16),
    /// 32-bit signed integer (INT).
    Int32(i32),
    /// 64-bit signed integer (BIGINT).
    Int64(i64),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// Scaled decimal (DECIMAL, NUMERIC, MONEY, SMALLMONEY).
    Decimal(Decimal),
    /// 32-bit floating point (REAL).
    Float32(f32),
    /// 64-bit floating point (FLOAT).
    Float64(f64),
    /// Boolean (BIT).
    Bool(bool),
    /// Calendar date and time (DATETIME, SMALLDATETIME, DATE, TIME, DATETIME2).
    DateTime(NaiveDateTime),
    /// Date and time with a UTC offset (DATETIMEOFFSET).
    DateTimeOffset(DateTime<FixedOffset>),
    /// Binary data (BINARY, VARBINARY, IMAGE, unknown types).
    Bytes(Bytes),
    /// Unique identifier in canonical byte order (UNIQUEIDENTIFIER).
    Uuid(Uuid),
    /// Opaque structured value, sent as its JSON text.
    Object(serde_json::Value),
}

impl CellValue {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a bool, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an i32, if it fits losslessly.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            Self::Int16(v) => Some(i32::from(*v)),
            Self::UInt16(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    /// Get the value as an i64, if it fits losslessly.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is a float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            Self::Float32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as a decimal, if it is one.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a UUID, if it is one.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a naive date-time, if it is one.
    #[must_use]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::String(_) => "STRING",
            Self::Int16(_) => "INT16",
            Self::Int32(_) => "INT32",
            Self::Int64(_) => "INT64",
            Self::UInt16(_) => "UINT16",
            Self::UInt32(_) => "UINT32",
            Self::UInt64(_) => "UINT64",
            Self::Decimal(_) => "DECIMAL",
            Self::Float32(_) => "FLOAT32",
            Self::Float64(_) => "FLOAT64",
            Self::Bool(_) => "BOOL",
            Self::DateTime(_) => "DATETIME",
            Self::DateTimeOffset(_) => "DATETIMEOFFSET",
            Self::Bytes(_) => "BYTES",
            Self::Uuid(_) => "UUID",
            Self::Object(_) => "OBJECT",
        }
    }
}

/// Renders the value the way it is sent as text (bulk copy, logs).
///
/// Booleans become `1`/`0`, binary becomes lowercase hex and date-times use
/// the fixed `YYYY-MM-DD hh:mm:ss.fff` form. NULL renders as an empty
/// string.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::String(v) => f.write_str(v),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => f.write_str(if *v { "1" } else { "0" }),
            Self::DateTime(v) => write!(f, "{}", v.format(crate::encode::DATETIME_TEXT_FORMAT)),
            Self::DateTimeOffset(v) => write!(f, "{}", v.format(crate::encode::DATETIMEOFFSET_TEXT_FORMAT)),
            Self::Bytes(v) => v.iter().try_for_each(|b| write!(f, "{b:02x}")),
            Self::Uuid(v) => write!(f, "{}", v.hyphenated()),
            Self::Object(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for CellValue {
    fn from(v: u8) -> Self {
        Self::Int16(i16::from(v))
    }
}

impl From<i16> for CellValue {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u16> for CellValue {
    fn from(v: u16) -> Self {
        Self::UInt16(v)
    }
}

impl From<u32> for CellValue {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u64> for CellValue {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f32> for CellValue {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for CellValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for CellValue {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Uuid> for CellValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Decimal> for CellValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for CellValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::DateTimeOffset(v)
    }
}

impl From<serde_json::Value> for CellValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Object(v)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
