//! Semantic column types for schema-carrying tables.

use std::fmt;

use tds_native::{TypeCode, TypeFamily};

use crate::value::CellValue;

/// The semantic type of a column, independent of its wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Character data.
    String,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    /// Scaled decimal.
    Decimal,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Bool,
    /// Date and time.
    DateTime,
    /// Date and time with offset.
    DateTimeOffset,
    /// Binary data.
    Bytes,
    /// Unique identifier.
    Uuid,
    /// Opaque structured value.
    Object,
    /// No information (all-NULL column of unknown wire type).
    Unknown,
}

impl ColumnType {
    /// Derive the type from a wire type code and declared column length.
    ///
    /// Nullable integer and float codes are sized by `declared_len`.
    #[must_use]
    pub fn from_type_code(code: TypeCode, declared_len: usize) -> Self {
        match code {
            TypeCode::INT1 | TypeCode::INT2 => Self::Int16,
            TypeCode::INT4 => Self::Int32,
            TypeCode::INT8 => Self::Int64,
            TypeCode::UINT2 => Self::UInt16,
            TypeCode::UINT4 => Self::UInt32,
            TypeCode::UINT8 => Self::UInt64,
            TypeCode::INTN => match declared_len {
                1 | 2 => Self::Int16,
                8 => Self::Int64,
                _ => Self::Int32,
            },
            TypeCode::REAL => Self::Float32,
            TypeCode::FLTN if declared_len == 4 => Self::Float32,
            TypeCode::DATETIMEOFFSET => Self::DateTimeOffset,
            _ => match code.family() {
                TypeFamily::Float => Self::Float64,
                TypeFamily::Bit => Self::Bool,
                TypeFamily::NarrowText | TypeFamily::WideText => Self::String,
                TypeFamily::Binary | TypeFamily::Unknown => Self::Bytes,
                TypeFamily::LegacyDateTime | TypeFamily::DateTime => Self::DateTime,
                TypeFamily::Decimal | TypeFamily::Money => Self::Decimal,
                TypeFamily::Guid => Self::Uuid,
                TypeFamily::Integer => Self::Int32,
            },
        }
    }

    /// The type of a value, or `None` for NULL.
    #[must_use]
    pub fn of(value: &CellValue) -> Option<Self> {
        Some(match value {
            CellValue::Null => return None,
            CellValue::String(_) => Self::String,
            CellValue::Int16(_) => Self::Int16,
            CellValue::Int32(_) => Self::Int32,
            CellValue::Int64(_) => Self::Int64,
            CellValue::UInt16(_) => Self::UInt16,
            CellValue::UInt32(_) => Self::UInt32,
            CellValue::UInt64(_) => Self::UInt64,
            CellValue::Decimal(_) => Self::Decimal,
            CellValue::Float32(_) => Self::Float32,
            CellValue::Float64(_) => Self::Float64,
            CellValue::Bool(_) => Self::Bool,
            CellValue::DateTime(_) => Self::DateTime,
            CellValue::DateTimeOffset(_) => Self::DateTimeOffset,
            CellValue::Bytes(_) => Self::Bytes,
            CellValue::Uuid(_) => Self::Uuid,
            CellValue::Object(_) => Self::Object,
        })
    }

    /// Infer a column type by sampling the first non-null value.
    pub fn sample<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        values
            .into_iter()
            .find_map(Self::of)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
