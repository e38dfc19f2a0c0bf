//! # mssql-types
//!
//! The wire type codec: cell values and the mapping between them and the
//! data db-lib exchanges with the driver.
//!
//! Inbound, [`Decoder`] turns a column's type code and raw bytes into a
//! [`CellValue`] and never fails. Outbound, [`encode`] produces the type
//! code and bytes bound for an RPC parameter, and [`declared_type`] names
//! the SQL type used in a parameter signature.
//!
//! ## Type Mappings
//!
//! | SQL Server Type | Cell value | Rust Type |
//! |-----------------|------------|-----------|
//! | `BIT` | `Bool` | `bool` |
//! | `TINYINT`, `SMALLINT` | `Int16` | `i16` (`u8` via range check) |
//! | `INT` | `Int32` | `i32` |
//! | `BIGINT` | `Int64` | `i64` |
//! | `REAL` | `Float32` | `f32` |
//! | `FLOAT` | `Float64` | `f64` |
//! | `DECIMAL`/`NUMERIC`/`MONEY` | `Decimal` | `rust_decimal::Decimal` |
//! | `CHAR`/`VARCHAR`/`NCHAR`/`NVARCHAR`/`TEXT`/`XML` | `String` | `String` |
//! | `BINARY`/`VARBINARY`/`IMAGE` | `Bytes` | `Vec<u8>`, `bytes::Bytes` |
//! | `DATETIME`/`DATE`/`TIME`/`DATETIME2` | `DateTime` | `chrono::NaiveDateTime` |
//! | `DATETIMEOFFSET` | `DateTimeOffset` | `chrono::DateTime<FixedOffset>` |
//! | `UNIQUEIDENTIFIER` | `Uuid` | `uuid::Uuid` |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod column_type;
pub mod convert;
pub mod decode;
pub mod encode;
pub mod error;
pub mod from_sql;
pub mod to_sql;
pub mod value;

pub use column_type::ColumnType;
pub use convert::WireConverter;
pub use decode::{Decoder, decode, decode_guid, parse_datetime_text};
pub use encode::{EncodedValue, declared_type, encode};
pub use error::TypeError;
pub use from_sql::FromSql;
pub use to_sql::ToSql;
pub use value::CellValue;
