//! # mssql-testing
//!
//! Test infrastructure for the db-lib SQL Server driver.
//!
//! ## Features
//!
//! - [`MockLibrary`]: an in-memory native library with scripted batches,
//!   stored procedures and bulk-copy tables (no server required)
//! - Failure injection for login, database selection, initialization,
//!   row flow control and bulk-copy completion
//! - A journal of everything the driver asked the library to do, plus
//!   detection of overlapping native calls on one connection
//! - Raw wire fixtures and live-server settings
//!
//! ## Mock Library Example
//!
//! ```rust,ignore
//! use mssql_testing::{MockColumn, MockLibrary, MockResponse};
//! use mssql_types::CellValue;
//!
//! let library = MockLibrary::builder()
//!     .with_response(
//!         "SELECT * FROM users WHERE id = 1",
//!         MockResponse::rows(
//!             vec![MockColumn::int("id"), MockColumn::nvarchar("name", 50)],
//!             vec![vec![CellValue::Int32(1), CellValue::String("Alice".into())]],
//!         ),
//!     )
//!     .build();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock;
pub mod script;

pub use mock::{MockLibrary, MockLibraryBuilder, RecordedCommand};
pub use script::{
    MockColumn, MockProcedure, MockResponse, MockResult, ProcedureCall, ProcedureOutcome,
};
