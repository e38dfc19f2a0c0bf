//! Trait for converting cell values to Rust types.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use uuid::Uuid;

use crate::error::TypeError;
use crate::value::CellValue;

/// Trait for types that can be read out of a decoded cell.
pub trait FromSql: Sized {
    /// Convert from a cell value to this type.
    fn from_sql(value: &CellValue) -> Result<Self, TypeError>;

    /// Convert from an optional cell value.
    ///
    /// Returns `None` if the value is NULL.
    fn from_sql_nullable(value: &CellValue) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_sql(value).map(Some)
        }
    }
}

fn mismatch(expected: &'static str, value: &CellValue) -> TypeError {
    match value {
        CellValue::Null => TypeError::UnexpectedNull,
        _ => TypeError::TypeMismatch {
            expected,
            actual: value.type_name().to_string(),
        },
    }
}

fn out_of_range(target_type: &'static str) -> TypeError {
    TypeError::OutOfRange { target_type }
}

impl FromSql for bool {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Bool(v) => Ok(*v),
            CellValue::Int16(v) => Ok(*v != 0),
            CellValue::Int32(v) => Ok(*v != 0),
            CellValue::Int64(v) => Ok(*v != 0),
            _ => Err(mismatch("bool", value)),
        }
    }
}

/// Integers widen freely and narrow with a range check.
macro_rules! from_sql_integer {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromSql for $ty {
                fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
                    match value {
                        CellValue::Int16(v) => <$ty>::try_from(*v).map_err(|_| out_of_range($name)),
                        CellValue::Int32(v) => <$ty>::try_from(*v).map_err(|_| out_of_range($name)),
                        CellValue::Int64(v) => <$ty>::try_from(*v).map_err(|_| out_of_range($name)),
                        CellValue::UInt16(v) => <$ty>::try_from(*v).map_err(|_| out_of_range($name)),
                        CellValue::UInt32(v) => <$ty>::try_from(*v).map_err(|_| out_of_range($name)),
                        CellValue::UInt64(v) => <$ty>::try_from(*v).map_err(|_| out_of_range($name)),
                        _ => Err(mismatch($name, value)),
                    }
                }
            }
        )*
    };
}

from_sql_integer!(
    u8 => "u8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
);

impl FromSql for f32 {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Float32(v) => Ok(*v),
            _ => Err(mismatch("f32", value)),
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Float64(v) => Ok(*v),
            CellValue::Float32(v) => Ok(f64::from(*v)),
            CellValue::Int32(v) => Ok(f64::from(*v)),
            CellValue::Int16(v) => Ok(f64::from(*v)),
            _ => Err(mismatch("f64", value)),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::String(v) => Ok(v.clone()),
            CellValue::Object(v) => Ok(v.to_string()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Bytes(v) => Ok(v.to_vec()),
            _ => Err(mismatch("Vec<u8>", value)),
        }
    }
}

impl FromSql for Bytes {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Bytes(v) => Ok(v.clone()),
            _ => Err(mismatch("Bytes", value)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}

impl FromSql for Uuid {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Uuid(v) => Ok(*v),
            CellValue::String(s) => s
                .parse()
                .map_err(|e| TypeError::InvalidUuid(format!("{e}"))),
            _ => Err(mismatch("Uuid", value)),
        }
    }
}

impl FromSql for Decimal {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Decimal(v) => Ok(*v),
            CellValue::Int16(v) => Ok(Decimal::from(*v)),
            CellValue::Int32(v) => Ok(Decimal::from(*v)),
            CellValue::Int64(v) => Ok(Decimal::from(*v)),
            CellValue::Float64(v) => {
                Decimal::from_f64(*v).ok_or_else(|| TypeError::InvalidDecimal(v.to_string()))
            }
            CellValue::String(s) => s
                .parse()
                .map_err(|e| TypeError::InvalidDecimal(format!("{e}"))),
            _ => Err(mismatch("Decimal", value)),
        }
    }
}

impl FromSql for NaiveDateTime {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::DateTime(v) => Ok(*v),
            CellValue::DateTimeOffset(v) => Ok(v.naive_utc()),
            CellValue::String(s) => crate::decode::parse_datetime_text(s)
                .and_then(|v| v.as_datetime())
                .ok_or_else(|| TypeError::InvalidDateTime(s.clone())),
            _ => Err(mismatch("NaiveDateTime", value)),
        }
    }
}

impl FromSql for NaiveDate {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        NaiveDateTime::from_sql(value).map(|dt| dt.date())
    }
}

impl FromSql for NaiveTime {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        NaiveDateTime::from_sql(value).map(|dt| dt.time())
    }
}

impl FromSql for DateTime<FixedOffset> {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::DateTimeOffset(v) => Ok(*v),
            _ => Err(mismatch("DateTime<FixedOffset>", value)),
        }
    }
}

impl FromSql for DateTime<Utc> {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::DateTimeOffset(v) => Ok(v.to_utc()),
            CellValue::DateTime(v) => Ok(DateTime::from_naive_utc_and_offset(*v, Utc)),
            _ => Err(mismatch("DateTime<Utc>", value)),
        }
    }
}

impl FromSql for serde_json::Value {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        match value {
            CellValue::Object(v) => Ok(v.clone()),
            CellValue::String(s) => serde_json::from_str(s).map_err(|e| TypeError::TypeMismatch {
                expected: "JSON",
                actual: format!("invalid JSON: {e}"),
            }),
            CellValue::Null => Ok(serde_json::Value::Null),
            _ => Err(mismatch("JSON", value)),
        }
    }
}

impl FromSql for CellValue {
    fn from_sql(value: &CellValue) -> Result<Self, TypeError> {
        Ok(value.clone())
    }

    fn from_sql_nullable(value: &CellValue) -> Result<Option<Self>, TypeError> {
        Ok((!value.is_null()).then(|| value.clone()))
    }
}
