//! Test fixture utilities.
//!
//! Raw wire values in db-lib's in-memory layout, generated row sets for
//! bulk-copy tests, and the environment used by live-server tests.

use chrono::NaiveDateTime;
use mssql_types::CellValue;
use mssql_types::convert::{datetime_bytes, money_bytes};
use rust_decimal::Decimal;

/// A `uniqueidentifier` as it arrives on the wire, fields 1-3 swapped.
pub const WIRE_GUID: [u8; 16] = [
    0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
];

/// The canonical form of [`WIRE_GUID`].
pub const CANONICAL_GUID: &str = "01020304-0506-0708-090a-0b0c0d0e0f10";

/// Legacy `datetime` bytes for a date-time.
#[must_use]
pub fn legacy_datetime(value: NaiveDateTime) -> Vec<u8> {
    datetime_bytes(value).map(Vec::from).unwrap_or_default()
}

/// `money` bytes for a decimal.
#[must_use]
pub fn money(value: Decimal) -> Vec<u8> {
    money_bytes(value).map(Vec::from).unwrap_or_default()
}

/// `count` rows of `(id INT, name VARCHAR)` for bulk-copy tests.
#[must_use]
pub fn generated_rows(count: usize) -> Vec<Vec<CellValue>> {
    (0..count)
        .map(|i| {
            let id = i32::try_from(i).unwrap_or(i32::MAX);
            vec![CellValue::Int32(id), CellValue::String(format!("row-{i:04}"))]
        })
        .collect()
}

/// Connection settings for tests against a real server.
#[derive(Debug, Clone)]
pub struct LiveServer {
    /// Server host.
    pub host: String,
    /// Login name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Database to switch to, if any.
    pub database: Option<String>,
}

impl LiveServer {
    /// Read `MSSQL_HOST`, `MSSQL_USER`, `MSSQL_PASSWORD` and
    /// `MSSQL_DATABASE`. Returns `None` unless a host is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("MSSQL_HOST").ok()?;
        Some(Self {
            host,
            user: std::env::var("MSSQL_USER").unwrap_or_else(|_| "sa".into()),
            password: std::env::var("MSSQL_PASSWORD").unwrap_or_default(),
            database: std::env::var("MSSQL_DATABASE").ok(),
        })
    }

    /// The settings as an ADO.NET-style connection string.
    #[must_use]
    pub fn connection_string(&self) -> String {
        let mut s = format!(
            "Server={};User Id={};Password={};TrustServerCertificate=true",
            self.host, self.user, self.password
        );
        if let Some(db) = &self.database {
            s.push_str(&format!(";Database={db}"));
        }
        s
    }
}
