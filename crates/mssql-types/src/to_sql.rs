//! Trait for converting Rust types to cell values.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::TypeError;
use crate::value::CellValue;

/// Trait for types that can be bound as parameters or bulk-copied.
///
/// This is the total mapping from supported application values onto
/// [`CellValue`]; anything without an implementation cannot be sent.
pub trait ToSql {
    /// Convert this value to a cell value.
    fn to_sql(&self) -> Result<CellValue, TypeError>;
}

macro_rules! to_sql_via_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> Result<CellValue, TypeError> {
                    Ok(CellValue::from(self.clone()))
                }
            }
        )*
    };
}

to_sql_via_from!(
    bool,
    u8,
    i16,
    i32,
    i64,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    Vec<u8>,
    Bytes,
    Uuid,
    Decimal,
    NaiveDateTime,
    DateTime<FixedOffset>,
    serde_json::Value,
    CellValue,
);

impl ToSql for str {
    fn to_sql(&self) -> Result<CellValue, TypeError> {
        Ok(CellValue::String(self.to_owned()))
    }
}

impl ToSql for [u8] {
    fn to_sql(&self) -> Result<CellValue, TypeError> {
        Ok(CellValue::Bytes(Bytes::copy_from_slice(self)))
    }
}

impl ToSql for NaiveDate {
    fn to_sql(&self) -> Result<CellValue, TypeError> {
        Ok(CellValue::DateTime(self.and_time(NaiveTime::MIN)))
    }
}

impl ToSql for i8 {
    fn to_sql(&self) -> Result<CellValue, TypeError> {
        Ok(CellValue::Int16(i16::from(*self)))
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_sql(&self) -> Result<CellValue, TypeError> {
        match self {
            Some(v) => v.to_sql(),
            None => Ok(CellValue::Null),
        }
    }
}

impl<T: ToSql + ?Sized> ToSql for &T {
    fn to_sql(&self) -> Result<CellValue, TypeError> {
        (*self).to_sql()
    }
}
