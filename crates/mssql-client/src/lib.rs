//! # mssql-client
//!
//! Async SQL Server client over a native db-lib library (FreeTDS).
//!
//! The native library does the protocol work: login, TLS, packet framing
//! and token parsing. This crate turns it into a typed, async API:
//!
//! - **Serialized execution**: each [`Client`] owns one executor thread;
//!   operations run strictly one at a time, in call order
//! - **Typed results**: rows of [`CellValue`]s grouped into
//!   [`ResultTable`]s, with [`FromSql`] access and [`FromRow`] mapping
//! - **Stored procedures**: input/output parameters and return status
//! - **Parameterized queries**: `@p1..@pN` placeholders sent through
//!   `sp_executesql`
//! - **Bulk copy**: rows streamed through the bulk-copy interface
//! - **Server messages**: `PRINT` output and warnings on a broadcast channel
//!
//! ## Connection states
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected
//! ```
//!
//! `connect` on a connected client fails with [`Error::AlreadyConnected`];
//! commands on a disconnected client fail with [`Error::NotConnected`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use mssql_client::{Client, Config, Parameter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_connection_string(
//!         "Server=localhost;Database=test;User Id=sa;Password=Password123;"
//!     )?;
//!
//!     let client = Client::freetds(config)?;
//!     client.connect().await?;
//!
//!     let result = client
//!         .query("SELECT * FROM users WHERE id = @p1", &[&1i32])
//!         .await?;
//!     for row in result.rows() {
//!         let name: String = row.get_by_name("name")?;
//!         println!("User: {}", name);
//!     }
//!
//!     let result = client
//!         .call_procedure(
//!             "dbo.triple",
//!             vec![Parameter::input("x", 5i32), Parameter::output("result", 0i32)],
//!         )
//!         .await?;
//!     println!("{:?} {:?}", result.output("result"), result.return_status);
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod assembler;
pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
mod executor;
pub mod from_row;
mod lifecycle;
pub mod query;
pub mod result;
pub mod row;
pub mod rpc;
pub mod state;
pub mod table;
pub mod to_params;

// Re-export commonly used types
pub use bulk::{BulkInsertBuilder, BulkInsertResult, BulkOptions};
pub use client::Client;
pub use config::{Config, EncryptionMode, TimeoutConfig, default_text_size, set_default_text_size};
pub use error::{Error, Result};
pub use from_row::{FromRow, MapRows, RowIteratorExt, RowMapper};
pub use mssql_types::{CellValue, ColumnType, FromSql, ToSql, TypeError};
pub use query::Query;
pub use result::{NO_ROW_COUNT, QueryResult, ResultTable};
pub use row::{ColMetaData, Column, Row};
pub use rpc::{ParamDirection, Parameter};
pub use state::{AssemblerState, ConnectionState};
pub use table::{TypedColumn, TypedTable};
pub use tds_native::{NativeLibrary, ServerMessage};
pub use to_params::{NamedParam, ParamList, ToParams};
