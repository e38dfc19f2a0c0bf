//! db-lib data type codes.
//!
//! The native library reports column, return-value and parameter types as
//! plain integers (`SYB*` constants). Codes the driver does not know about
//! are still carried through unchanged so that decoding can degrade to raw
//! bytes instead of failing.

use std::fmt;

/// A db-lib type code as reported by `dbcoltype`/`dbrettype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeCode(pub i32);

impl TypeCode {
    // Fixed-length integers
    /// `tinyint` (unsigned 8-bit).
    pub const INT1: Self = Self(48);
    /// `smallint`.
    pub const INT2: Self = Self(52);
    /// `int`.
    pub const INT4: Self = Self(56);
    /// `bigint`.
    pub const INT8: Self = Self(127);
    /// Nullable integer of 1, 2, 4 or 8 bytes.
    pub const INTN: Self = Self(38);
    /// Sybase unsigned 16-bit integer.
    pub const UINT2: Self = Self(65);
    /// Sybase unsigned 32-bit integer.
    pub const UINT4: Self = Self(66);
    /// Sybase unsigned 64-bit integer.
    pub const UINT8: Self = Self(67);

    // Floating point
    /// `real`.
    pub const REAL: Self = Self(59);
    /// `float`.
    pub const FLT8: Self = Self(62);
    /// Nullable float of 4 or 8 bytes.
    pub const FLTN: Self = Self(109);

    // Bit
    /// `bit`.
    pub const BIT: Self = Self(50);
    /// Nullable `bit`.
    pub const BITN: Self = Self(104);

    // Character data
    /// Fixed-length narrow character.
    pub const CHAR: Self = Self(47);
    /// Variable-length narrow character.
    pub const VARCHAR: Self = Self(39);
    /// Legacy `text`.
    pub const TEXT: Self = Self(35);
    /// `varchar(n)` / `varchar(max)` (large form).
    pub const BIG_VARCHAR: Self = Self(167);
    /// `char(n)` (large form).
    pub const BIG_CHAR: Self = Self(175);
    /// Legacy `ntext`.
    pub const NTEXT: Self = Self(99);
    /// Sybase `nvarchar`.
    pub const NVARCHAR: Self = Self(103);
    /// `nvarchar(n)` / `nvarchar(max)`.
    pub const BIG_NVARCHAR: Self = Self(231);
    /// `nchar(n)`.
    pub const BIG_NCHAR: Self = Self(239);
    /// `xml`.
    pub const XML: Self = Self(241);

    // Binary data
    /// Fixed-length binary.
    pub const BINARY: Self = Self(45);
    /// Variable-length binary.
    pub const VARBINARY: Self = Self(37);
    /// `varbinary(n)` / `varbinary(max)`.
    pub const BIG_VARBINARY: Self = Self(165);
    /// `binary(n)` (large form).
    pub const BIG_BINARY: Self = Self(173);
    /// Legacy `image`.
    pub const IMAGE: Self = Self(34);

    // Legacy date/time
    /// `datetime` (days since 1900 + 1/300 s ticks).
    pub const DATETIME: Self = Self(61);
    /// `smalldatetime` (days since 1900 + minutes).
    pub const DATETIME4: Self = Self(58);
    /// Nullable `datetime`/`smalldatetime`.
    pub const DATETIMN: Self = Self(111);

    // Modern date/time
    /// `date`.
    pub const DATE: Self = Self(40);
    /// `time(n)`.
    pub const TIME: Self = Self(41);
    /// `datetime2(n)`.
    pub const DATETIME2: Self = Self(42);
    /// `datetimeoffset(n)`.
    pub const DATETIMEOFFSET: Self = Self(43);

    // Exact numerics
    /// `decimal(p, s)`.
    pub const DECIMAL: Self = Self(106);
    /// `numeric(p, s)`.
    pub const NUMERIC: Self = Self(108);
    /// `money`.
    pub const MONEY: Self = Self(60);
    /// `smallmoney`.
    pub const MONEY4: Self = Self(122);
    /// Nullable `money`/`smallmoney`.
    pub const MONEYN: Self = Self(110);

    /// `uniqueidentifier`.
    pub const UNIQUE: Self = Self(36);

    /// Raw integer value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Classify this code into the family the codec dispatches on.
    #[must_use]
    pub const fn family(self) -> TypeFamily {
        match self.0 {
            48 | 52 | 56 | 127 | 38 | 65 | 66 | 67 => TypeFamily::Integer,
            59 | 62 | 109 => TypeFamily::Float,
            50 | 104 => TypeFamily::Bit,
            47 | 39 | 35 | 167 | 175 => TypeFamily::NarrowText,
            99 | 103 | 231 | 239 | 241 => TypeFamily::WideText,
            45 | 37 | 165 | 173 | 34 => TypeFamily::Binary,
            61 | 58 | 111 => TypeFamily::LegacyDateTime,
            40 | 41 | 42 | 43 => TypeFamily::DateTime,
            106 | 108 => TypeFamily::Decimal,
            60 | 122 | 110 => TypeFamily::Money,
            36 => TypeFamily::Guid,
            _ => TypeFamily::Unknown,
        }
    }

    /// Fixed-length types take no explicit length when bound as parameters.
    #[must_use]
    pub const fn is_fixed_length(self) -> bool {
        matches!(
            self.0,
            48 | 52 | 56 | 127 | 65 | 66 | 67 | 59 | 62 | 50 | 61 | 58 | 60 | 122
        )
    }

    /// Check if this is a character type (narrow or wide).
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self.family(), TypeFamily::NarrowText | TypeFamily::WideText)
    }

    /// Check if this is a date or time type of either generation.
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(
            self.family(),
            TypeFamily::LegacyDateTime | TypeFamily::DateTime
        )
    }

    /// SQL Server type name, as used in parameter declarations.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self.0 {
            48 => "tinyint",
            52 | 65 => "smallint",
            56 | 66 | 38 => "int",
            127 | 67 => "bigint",
            59 => "real",
            62 | 109 => "float",
            50 | 104 => "bit",
            47 | 175 => "char",
            39 | 167 => "varchar",
            35 => "text",
            99 => "ntext",
            103 | 231 => "nvarchar",
            239 => "nchar",
            241 => "xml",
            45 | 173 => "binary",
            37 | 165 => "varbinary",
            34 => "image",
            61 | 111 => "datetime",
            58 => "smalldatetime",
            40 => "date",
            41 => "time",
            42 => "datetime2",
            43 => "datetimeoffset",
            106 => "decimal",
            108 => "numeric",
            60 | 110 => "money",
            122 => "smallmoney",
            36 => "uniqueidentifier",
            _ => "sql_variant",
        }
    }
}

impl From<i32> for TypeCode {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.sql_name(), self.0)
    }
}

/// Coarse grouping of type codes by wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// Little-endian two's complement (or unsigned) integers.
    Integer,
    /// IEEE 754 floats.
    Float,
    /// Single byte, non-zero is true.
    Bit,
    /// Single-byte or UTF-8 character data.
    NarrowText,
    /// UTF-16LE character data.
    WideText,
    /// Uninterpreted bytes.
    Binary,
    /// `datetime`/`smalldatetime`, cracked by the native library.
    LegacyDateTime,
    /// `date`/`time`/`datetime2`/`datetimeoffset`, converted to text.
    DateTime,
    /// Packed decimal, converted to text.
    Decimal,
    /// Fixed-point money, converted to text.
    Money,
    /// 16-byte mixed-endian identifier.
    Guid,
    /// Anything else.
    Unknown,
}
