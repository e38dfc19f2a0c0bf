//! Bulk copy into a table.
//!
//! Rows go through the library's bulk-copy interface as character data:
//! every value is rendered with its text form
//! ([`CellValue`]'s `Display`), copied into a per-column buffer allocated
//! once for the whole operation, and sent with its effective length. NULL
//! is sent as a NULL field.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mssql_client::{BulkInsertBuilder, CellValue};
//!
//! let rows = vec![
//!     vec![CellValue::Int32(1), CellValue::from("alice")],
//!     vec![CellValue::Int32(2), CellValue::from("bob")],
//! ];
//! let result = client
//!     .bulk_insert_with(BulkInsertBuilder::new("dbo.Users").batch_size(1000), rows)
//!     .await?;
//! println!("Inserted {} rows", result.rows_committed);
//! ```
//!
//! ## Limitations
//!
//! Values travel in the client character set. Wide text bound for a
//! narrow column (or the other way round) is converted by the server and
//! may not survive byte for byte. Text longer than the buffer is truncated
//! at a character boundary.

use std::fmt::Write as _;

use mssql_types::CellValue;
use tds_native::bulk::TERMINATOR_LEN;
use tds_native::{BcpField, ConnectionHandle, NativeError};

use crate::error::{Error, Result};
use crate::executor::Session;

/// Default bytes reserved per column.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8000;

/// Options controlling bulk insert behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOptions {
    /// Number of rows per batch commit.
    ///
    /// Default: 0 (single batch for entire operation).
    pub batch_size: usize,

    /// Bytes reserved per column, terminator included.
    ///
    /// Default: 8000
    pub buffer_capacity: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            batch_size: 0,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Result of a bulk insert operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkInsertResult {
    /// Rows handed to the library.
    pub rows_sent: u64,
    /// Rows the server reported as committed.
    pub rows_committed: u64,
    /// Number of batches committed, the final one included.
    pub batches: u32,
}

/// Builder for configuring a bulk insert operation.
#[derive(Debug, Clone)]
pub struct BulkInsertBuilder {
    table_name: String,
    columns: Vec<String>,
    options: BulkOptions,
}

impl BulkInsertBuilder {
    /// Create a new bulk insert builder for the specified table.
    pub fn new<S: Into<String>>(table_name: S) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            options: BulkOptions::default(),
        }
    }

    /// Name the columns being loaded.
    ///
    /// Columns are bound by position, so the names must follow the table's
    /// column order. They fix the row width; without them the first row
    /// decides.
    #[must_use]
    pub fn with_columns(mut self, column_names: &[&str]) -> Self {
        self.columns = column_names.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Set bulk insert options.
    #[must_use]
    pub fn with_options(mut self, options: BulkOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.options.batch_size = size;
        self
    }

    /// Set the per-column buffer capacity.
    #[must_use]
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.options.buffer_capacity = bytes;
        self
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Get the columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get the options.
    pub fn options(&self) -> &BulkOptions {
        &self.options
    }

    fn validate(&self, rows: &[Vec<CellValue>]) -> Result<usize> {
        if self.table_name.trim().is_empty() {
            return Err(Error::Configuration("bulk insert needs a table name".into()));
        }
        if self.options.buffer_capacity <= TERMINATOR_LEN {
            return Err(Error::Configuration(format!(
                "buffer capacity must exceed {TERMINATOR_LEN} byte"
            )));
        }
        let width = if self.columns.is_empty() {
            rows.first().map_or(0, Vec::len)
        } else {
            self.columns.len()
        };
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::Configuration(format!(
                "row {index} has {} values, expected {width}",
                row.len()
            )));
        }
        Ok(width)
    }
}

/// Per-column buffers reused for every row.
pub(crate) struct RowBuffers {
    buffers: Vec<Vec<u8>>,
    lens: Vec<Option<usize>>,
    text: String,
}

impl RowBuffers {
    pub(crate) fn new(columns: usize, capacity: usize) -> Self {
        Self {
            buffers: vec![vec![0; capacity]; columns],
            lens: vec![None; columns],
            text: String::new(),
        }
    }

    /// Render `row` into the buffers.
    pub(crate) fn fill(&mut self, row: &[CellValue]) {
        for ((buffer, len), value) in self.buffers.iter_mut().zip(&mut self.lens).zip(row) {
            if value.is_null() {
                *len = None;
                continue;
            }
            self.text.clear();
            // Writing to a String cannot fail.
            let _ = write!(self.text, "{value}");
            let n = floor_char_boundary(&self.text, buffer.len() - TERMINATOR_LEN);
            if n < self.text.len() {
                tracing::warn!(
                    length = self.text.len(),
                    kept = n,
                    "bulk value truncated to buffer capacity"
                );
            }
            buffer[..n].copy_from_slice(&self.text.as_bytes()[..n]);
            buffer[n] = 0;
            *len = Some(n);
        }
    }

    pub(crate) fn fields(&self) -> Vec<BcpField<'_>> {
        self.buffers
            .iter()
            .zip(&self.lens)
            .map(|(buffer, len)| BcpField {
                buffer,
                len: *len,
            })
            .collect()
    }
}

/// Largest prefix length of `s` that is at most `max` bytes and ends on a
/// character boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

impl Session {
    /// Load `rows` into the builder's table.
    pub(crate) fn bulk_insert(
        &mut self,
        builder: &BulkInsertBuilder,
        rows: &[Vec<CellValue>],
    ) -> Result<BulkInsertResult> {
        let width = builder.validate(rows)?;
        tracing::debug!(
            table = builder.table_name(),
            rows = rows.len(),
            columns = width,
            batch_size = builder.options.batch_size,
            "bulk insert"
        );
        let outcome = {
            let (conn, _) = self.begin_command()?;
            send_rows(conn, builder, width, rows)
        };
        match outcome {
            Ok(result) => {
                self.flush_messages();
                tracing::debug!(
                    table = builder.table_name(),
                    rows = result.rows_committed,
                    batches = result.batches,
                    "bulk insert finished"
                );
                Ok(result)
            }
            Err(e) => Err(self.execution_error(e)),
        }
    }
}

fn send_rows(
    conn: &mut dyn ConnectionHandle,
    builder: &BulkInsertBuilder,
    width: usize,
    rows: &[Vec<CellValue>],
) -> std::result::Result<BulkInsertResult, NativeError> {
    let options = builder.options();
    conn.bcp_init(builder.table_name())?;
    for column in 0..width {
        conn.bcp_bind(column, options.buffer_capacity)?;
    }

    let mut buffers = RowBuffers::new(width, options.buffer_capacity);
    let mut result = BulkInsertResult::default();
    let mut in_batch = 0usize;

    for row in rows {
        buffers.fill(row);
        conn.bcp_send_row(&buffers.fields())?;
        result.rows_sent += 1;
        in_batch += 1;

        if options.batch_size > 0 && in_batch >= options.batch_size {
            let committed = conn.bcp_batch()?;
            result.rows_committed += count(committed);
            result.batches += 1;
            in_batch = 0;
            tracing::debug!(table = builder.table_name(), rows = committed, "bulk batch committed");
        }
    }

    let committed = conn.bcp_done()?;
    if committed < 0 {
        return Err(NativeError::call_failed("bcp_done", format!("returned {committed}")));
    }
    result.rows_committed += count(committed);
    result.batches += 1;
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_reuses_buffers() {
        let mut buffers = RowBuffers::new(3, 16);
        buffers.fill(&[CellValue::Int32(42), CellValue::from("hi"), CellValue::Null]);
        let fields = buffers.fields();
        assert_eq!(fields[0].value(), Some(&b"42"[..]));
        assert_eq!(fields[0].buffer[2], 0);
        assert_eq!(fields[1].value(), Some(&b"hi"[..]));
        assert_eq!(fields[2].value(), None);
        assert_eq!(fields[0].buffer.len(), 16);

        buffers.fill(&[CellValue::Int32(7), CellValue::Null, CellValue::Bool(true)]);
        let fields = buffers.fields();
        assert_eq!(fields[0].value(), Some(&b"7"[..]));
        assert_eq!(fields[1].value(), None);
        assert_eq!(fields[2].value(), Some(&b"1"[..]));
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let mut buffers = RowBuffers::new(1, 5);
        // Four bytes fit; the second 'é' would straddle the limit.
        buffers.fill(&[CellValue::from("aéé")]);
        let fields = buffers.fields();
        assert_eq!(fields[0].value(), Some("aé".as_bytes()));
        assert_eq!(fields[0].buffer[3], 0);
    }

    #[test]
    fn test_floor_char_boundary() {
        assert_eq!(floor_char_boundary("abc", 10), 3);
        assert_eq!(floor_char_boundary("abc", 2), 2);
        assert_eq!(floor_char_boundary("ééé", 3), 2);
        assert_eq!(floor_char_boundary("é", 0), 0);
    }

    #[test]
    fn test_validate_row_width() {
        let rows = vec![vec![CellValue::Int32(1)], vec![CellValue::Int32(2), CellValue::Null]];
        assert!(matches!(
            BulkInsertBuilder::new("t").validate(&rows),
            Err(Error::Configuration(_))
        ));
        let builder = BulkInsertBuilder::new("t").with_columns(&["a", "b"]);
        assert!(builder.validate(&rows[1..]).is_ok());
        assert!(BulkInsertBuilder::new("").validate(&[]).is_err());
        assert!(BulkInsertBuilder::new("t").buffer_capacity(1).validate(&[]).is_err());
    }
}
