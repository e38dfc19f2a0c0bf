//! Traits describing the blocking, procedural native library.
//!
//! Handles returned by these traits are not reentrant: the driver only ever
//! touches them from one serialized execution context. None of the handle
//! traits require `Send`; they are created and dropped on the thread that
//! uses them.
//!
//! Column and return-value indices are zero-based here; implementations
//! translate to whatever the library expects.

use crate::bulk::BcpField;
use crate::convert::{Converter, GuidLayout};
use crate::error::Result;
use crate::login::{LoginOption, SessionOption};
use crate::message::ServerMessage;
use crate::rpc::RpcRequest;
use crate::types::TypeCode;

/// Outcome of asking the connection for the next result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsStatus {
    /// A result is available (possibly with zero columns).
    Succeed,
    /// The batch is exhausted.
    NoMoreResults,
    /// The statement failed.
    Fail,
}

/// Outcome of asking the connection for the next row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// A regular row is available.
    Regular,
    /// A compute row with the given id is available.
    Compute(i32),
    /// The current result has no more rows.
    NoMoreRows,
    /// The row buffer is full; ask again.
    BufferFull,
    /// Reading failed.
    Fail,
}

/// Entry point of a native library implementation.
pub trait NativeLibrary: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Process-wide initialization. Must be idempotent: the first outcome
    /// is returned to every later caller.
    fn init(&self) -> Result<()>;

    /// Allocate a fresh login record.
    fn new_login(&self) -> Result<Box<dyn LoginHandle>>;

    /// Byte order expected for outbound `uniqueidentifier` data.
    fn guid_layout(&self) -> GuidLayout {
        GuidLayout::MixedEndian
    }
}

/// A login record. Dropping it frees the record.
pub trait LoginHandle {
    /// Set one login field.
    fn apply(&mut self, option: &LoginOption) -> Result<()>;

    /// Open a connection to `server` using the fields applied so far.
    fn open(&mut self, server: &str) -> Result<Box<dyn ConnectionHandle>>;
}

/// An open connection. Dropping it closes the connection.
pub trait ConnectionHandle {
    /// Switch the current database.
    fn use_database(&mut self, database: &str) -> Result<()>;

    /// Discard any pending results.
    fn cancel(&mut self) -> Result<()>;

    /// Set a session option.
    fn set_option(&mut self, option: SessionOption) -> Result<()>;

    /// Buffer `sql` and send it for execution.
    fn submit(&mut self, sql: &str) -> Result<()>;

    /// Advance to the next result of the current batch.
    fn results(&mut self) -> ResultsStatus;

    /// Number of columns in the current result.
    fn column_count(&self) -> usize;

    /// Name of `column` in the current result.
    fn column_name(&self, column: usize) -> String;

    /// Type of `column` in the current result.
    fn column_type(&self, column: usize) -> TypeCode;

    /// Declared maximum length of `column`.
    fn column_len(&self, column: usize) -> usize;

    /// Advance to the next row of the current result.
    fn next_row(&mut self) -> RowStatus;

    /// Raw data of `column` in the current row, `None` for NULL.
    fn data(&self, column: usize) -> Option<&[u8]>;

    /// Rows affected by the last statement, if the server reported a count.
    fn row_count(&self) -> Option<i64>;

    /// Conversion services bound to this connection.
    fn converter(&self) -> &dyn Converter;

    /// Bind every parameter of `request`, send the call and wait for the
    /// server to accept it. Results are read afterwards with
    /// [`results`](Self::results).
    fn rpc(&mut self, request: &RpcRequest) -> Result<()>;

    /// Number of return values available after the last call's results
    /// were consumed.
    fn return_count(&self) -> usize;

    /// Name of return value `index`.
    fn return_name(&self, index: usize) -> Option<String>;

    /// Type of return value `index`.
    fn return_type(&self, index: usize) -> TypeCode;

    /// Data of return value `index`, `None` for NULL.
    fn return_data(&self, index: usize) -> Option<&[u8]>;

    /// Return status of the last procedure call, if one was supplied.
    fn return_status(&self) -> Option<i32>;

    /// Start a bulk-copy into `table`.
    fn bcp_init(&mut self, table: &str) -> Result<()>;

    /// Bind table column `column` as character data of at most `capacity`
    /// bytes. The data and its length are supplied per row.
    fn bcp_bind(&mut self, column: usize, capacity: usize) -> Result<()>;

    /// Send one row; `fields` has one entry per bound column.
    fn bcp_send_row(&mut self, fields: &[BcpField<'_>]) -> Result<()>;

    /// Commit the rows sent so far, returning how many were committed.
    fn bcp_batch(&mut self) -> Result<i64>;

    /// Finish the bulk-copy, returning the rows committed by this final
    /// step. A negative count from the library is reported as an error.
    fn bcp_done(&mut self) -> Result<i64>;

    /// Take the messages received since the last drain.
    fn drain_messages(&mut self) -> Vec<ServerMessage>;
}
