//! Outbound value encoding for RPC parameters.
//!
//! Maps a [`CellValue`] to the db-lib type code and bytes bound with
//! `dbrpcparam`. Integers, floats and bits use their native binary form,
//! binary data is passed through, and everything the library has no
//! convenient binary form for (decimals, date-times, JSON objects) is sent
//! as text and converted by the server against the declared parameter type.

use bytes::Bytes;
use chrono::{NaiveDateTime, Timelike};
use tds_native::{GuidLayout, TypeCode};

use crate::error::TypeError;
use crate::value::CellValue;

/// Text form of date-times in `Display` and bulk copy. Millisecond
/// precision converts into every date-time column type, `datetime`
/// included.
pub const DATETIME_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Text form of date-times with offset in `Display` and bulk copy.
pub const DATETIMEOFFSET_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %:z";

/// Date-time parameter text at the 100ns precision of `datetime2(7)`,
/// which is how [`declared_type`] declares it. chrono has no 7-digit
/// fraction specifier.
fn datetime2_text(dt: &NaiveDateTime) -> String {
    // Leap seconds carry nanoseconds past one second.
    let ticks = dt.nanosecond() % 1_000_000_000 / 100;
    format!("{}.{ticks:07}", dt.format("%Y-%m-%d %H:%M:%S"))
}

/// Longest string declared as `nvarchar(4000)` rather than `nvarchar(max)`.
const MAX_SHORT_NVARCHAR: usize = 4000;

/// Longest binary declared as `varbinary(8000)` rather than `varbinary(max)`.
const MAX_SHORT_VARBINARY: usize = 8000;

/// An encoded outbound value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    /// Wire type the data is bound as.
    pub type_code: TypeCode,
    /// Bytes to bind; `None` is NULL.
    pub data: Option<Bytes>,
}

impl EncodedValue {
    fn new(type_code: TypeCode, data: impl Into<Bytes>) -> Self {
        Self {
            type_code,
            data: Some(data.into()),
        }
    }

    fn text(text: String) -> Self {
        Self::new(TypeCode::BIG_VARCHAR, text.into_bytes())
    }
}

/// Encode `value` for binding as a parameter.
///
/// `guid_layout` comes from the native library. Identifiers are only
/// swapped into the wire's mixed-endian order when the library expects
/// data in that order; a library that swaps on its own gets canonical
/// bytes. Decoding always swaps, so the asymmetry lives here.
pub fn encode(value: &CellValue, guid_layout: GuidLayout) -> Result<EncodedValue, TypeError> {
    Ok(match value {
        CellValue::Null => EncodedValue {
            type_code: TypeCode::BIG_VARCHAR,
            data: None,
        },
        CellValue::String(s) => EncodedValue::new(TypeCode::BIG_NVARCHAR, s.clone().into_bytes()),
        CellValue::Int16(v) => EncodedValue::new(TypeCode::INT2, v.to_le_bytes().to_vec()),
        CellValue::Int32(v) => EncodedValue::new(TypeCode::INT4, v.to_le_bytes().to_vec()),
        CellValue::Int64(v) => EncodedValue::new(TypeCode::INT8, v.to_le_bytes().to_vec()),
        // Unsigned values widen to the next signed type the server has.
        CellValue::UInt16(v) => EncodedValue::new(TypeCode::INT4, i32::from(*v).to_le_bytes().to_vec()),
        CellValue::UInt32(v) => EncodedValue::new(TypeCode::INT8, i64::from(*v).to_le_bytes().to_vec()),
        CellValue::UInt64(v) => {
            let v = i64::try_from(*v).map_err(|_| TypeError::OutOfRange {
                target_type: "bigint",
            })?;
            EncodedValue::new(TypeCode::INT8, v.to_le_bytes().to_vec())
        }
        CellValue::Float32(v) => EncodedValue::new(TypeCode::REAL, v.to_le_bytes().to_vec()),
        CellValue::Float64(v) => EncodedValue::new(TypeCode::FLT8, v.to_le_bytes().to_vec()),
        CellValue::Bool(v) => EncodedValue::new(TypeCode::BIT, vec![u8::from(*v)]),
        CellValue::Decimal(d) => EncodedValue::text(d.to_string()),
        CellValue::DateTime(dt) => EncodedValue::text(datetime2_text(dt)),
        CellValue::DateTimeOffset(dt) => EncodedValue::text(format!(
            "{} {}",
            datetime2_text(&dt.naive_local()),
            dt.format("%:z")
        )),
        CellValue::Bytes(b) => EncodedValue {
            type_code: TypeCode::BIG_VARBINARY,
            data: Some(b.clone()),
        },
        CellValue::Uuid(u) => {
            let bytes = match guid_layout {
                GuidLayout::MixedEndian => u.to_bytes_le(),
                GuidLayout::BigEndian => *u.as_bytes(),
            };
            EncodedValue::new(TypeCode::UNIQUE, bytes.to_vec())
        }
        CellValue::Object(v) => EncodedValue::new(TypeCode::BIG_NVARCHAR, v.to_string().into_bytes()),
    })
}

/// SQL type used to declare `value` in a parameter signature.
#[must_use]
pub fn declared_type(value: &CellValue) -> String {
    match value {
        CellValue::Null => "nvarchar(4000)".into(),
        CellValue::String(s) if s.chars().count() <= MAX_SHORT_NVARCHAR => "nvarchar(4000)".into(),
        CellValue::String(_) | CellValue::Object(_) => "nvarchar(max)".into(),
        CellValue::Int16(_) => "smallint".into(),
        CellValue::Int32(_) | CellValue::UInt16(_) => "int".into(),
        CellValue::Int64(_) | CellValue::UInt32(_) | CellValue::UInt64(_) => "bigint".into(),
        CellValue::Float32(_) => "real".into(),
        CellValue::Float64(_) => "float".into(),
        CellValue::Bool(_) => "bit".into(),
        CellValue::Decimal(d) => format!("decimal(38, {})", d.scale()),
        CellValue::DateTime(_) => "datetime2(7)".into(),
        CellValue::DateTimeOffset(_) => "datetimeoffset(7)".into(),
        CellValue::Bytes(b) if b.len() <= MAX_SHORT_VARBINARY => "varbinary(8000)".into(),
        CellValue::Bytes(_) => "varbinary(max)".into(),
        CellValue::Uuid(_) => "uniqueidentifier".into(),
    }
}
