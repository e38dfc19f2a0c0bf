//! Result assembly.
//!
//! Drives the native handle through every result of a submitted batch and
//! builds the [`QueryResult`]:
//!
//! ```text
//! Idle -> AwaitingResult -> (HasColumns -> ReadingRows)* -> Idle
//! ```
//!
//! Results with zero columns are row counts from DML and only feed the
//! affected-row total. Compute rows are read past and dropped. A full row
//! buffer is flow control: the row is simply requested again.

use std::sync::Arc;

use mssql_types::{CellValue, Decoder};
use tds_native::{ConnectionHandle, NativeError, ResultsStatus, RowStatus};

use crate::result::{NO_ROW_COUNT, QueryResult, ResultTable};
use crate::row::{ColMetaData, Column, Row};
use crate::state::AssemblerState;

/// Builds a [`QueryResult`] from one command's results.
pub(crate) struct ResultAssembler<'a> {
    conn: &'a mut dyn ConnectionHandle,
    decoder: &'a mut Decoder,
    state: AssemblerState,
}

impl<'a> ResultAssembler<'a> {
    pub(crate) fn new(conn: &'a mut dyn ConnectionHandle, decoder: &'a mut Decoder) -> Self {
        Self {
            conn,
            decoder,
            state: AssemblerState::Idle,
        }
    }

    /// Current state, for diagnostics.
    #[cfg(test)]
    pub(crate) fn state(&self) -> AssemblerState {
        self.state
    }

    /// Read every result of the batch.
    ///
    /// The returned error carries no server text; the caller replaces it
    /// with whatever the message handler captured.
    pub(crate) fn read_all(&mut self) -> Result<QueryResult, NativeError> {
        let mut result = QueryResult::default();
        self.state = AssemblerState::AwaitingResult;

        loop {
            match self.conn.results() {
                ResultsStatus::NoMoreResults => break,
                ResultsStatus::Fail => {
                    self.state = AssemblerState::Idle;
                    return Err(NativeError::call_failed("dbresults", "statement failed"));
                }
                ResultsStatus::Succeed => {}
            }

            let column_count = self.conn.column_count();
            let mut table = if column_count == 0 {
                None
            } else {
                self.state = AssemblerState::HasColumns;
                Some(self.read_rows(column_count)?)
            };

            // For a SELECT, dbcount is the number of rows read, not rows
            // affected, so it stays on the table.
            let count = self.conn.row_count();
            if let (None, Some(count)) = (&table, count) {
                result.rows_affected = accumulate(result.rows_affected, count);
            }
            if let Some(table) = table.as_mut() {
                table.rows_affected = count.unwrap_or(NO_ROW_COUNT);
                tracing::trace!(
                    columns = column_count,
                    rows = table.rows.len(),
                    "result table assembled"
                );
            } else {
                tracing::trace!(rows_affected = ?count, "row count result");
            }
            result.tables.extend(table);
            self.state = AssemblerState::AwaitingResult;
        }

        self.state = AssemblerState::Idle;
        Ok(result)
    }

    fn read_rows(&mut self, column_count: usize) -> Result<ResultTable, NativeError> {
        let columns = (0..column_count)
            .map(|i| {
                Column::new(
                    self.conn.column_name(i),
                    i,
                    self.conn.column_type(i),
                    self.conn.column_len(i),
                )
            })
            .collect();
        let metadata = Arc::new(ColMetaData::new(columns));
        let mut table = ResultTable::new(metadata.clone());

        self.state = AssemblerState::ReadingRows;
        loop {
            match self.conn.next_row() {
                RowStatus::Regular => {
                    let values = self.decode_row(&metadata);
                    tracing::trace!(row = table.rows.len(), "row decoded");
                    table.rows.push(Row::new(metadata.clone(), values));
                }
                RowStatus::Compute(id) => {
                    tracing::trace!(compute_id = id, "skipping compute row");
                }
                RowStatus::BufferFull => {
                    tracing::trace!("row buffer full, retrying");
                }
                RowStatus::NoMoreRows => break,
                RowStatus::Fail => {
                    self.state = AssemblerState::Idle;
                    return Err(NativeError::call_failed("dbnextrow", "row read failed"));
                }
            }
        }

        Ok(table)
    }

    fn decode_row(&mut self, metadata: &ColMetaData) -> Vec<CellValue> {
        let conn = &*self.conn;
        metadata
            .columns
            .iter()
            .map(|column| {
                self.decoder.decode(
                    column.type_code,
                    conn.data(column.index),
                    column.declared_len,
                    conn.converter(),
                )
            })
            .collect()
    }
}

/// Add a statement's count to the running total. The unset sentinel is
/// replaced; a real total only ever grows.
fn accumulate(total: i64, count: i64) -> i64 {
    if count < 0 {
        total
    } else if total < 0 {
        count
    } else {
        total.saturating_add(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mssql_testing::{MockColumn, MockLibrary, MockResponse, MockResult};
    use tds_native::{LoginHandle, NativeLibrary};

    fn connect(library: &MockLibrary) -> Box<dyn ConnectionHandle> {
        library.init().unwrap();
        let mut login: Box<dyn LoginHandle> = library.new_login().unwrap();
        login.open("mock").unwrap()
    }

    fn run(library: &MockLibrary, sql: &str) -> Result<QueryResult, NativeError> {
        let mut conn = connect(library);
        let mut decoder = Decoder::default();
        conn.submit(sql)?;
        let mut assembler = ResultAssembler::new(conn.as_mut(), &mut decoder);
        let result = assembler.read_all();
        assert_eq!(assembler.state(), AssemblerState::Idle);
        result
    }

    #[test]
    fn test_accumulate_is_sticky() {
        assert_eq!(accumulate(NO_ROW_COUNT, 3), 3);
        assert_eq!(accumulate(3, 4), 7);
        assert_eq!(accumulate(7, NO_ROW_COUNT), 7);
        assert_eq!(accumulate(NO_ROW_COUNT, NO_ROW_COUNT), NO_ROW_COUNT);
        assert_eq!(accumulate(0, 0), 0);
    }

    #[test]
    fn test_dml_counts_are_summed() {
        let library = MockLibrary::builder()
            .with_response(
                "dml",
                MockResponse::batch(vec![
                    MockResult::affected(2),
                    MockResult::done(),
                    MockResult::affected(5),
                ]),
            )
            .build();
        let result = run(&library, "dml").unwrap();
        assert!(result.tables.is_empty());
        assert_eq!(result.rows_affected, 7);
    }

    #[test]
    fn test_no_counts_keeps_sentinel() {
        let library = MockLibrary::builder()
            .with_response("noop", MockResponse::batch(vec![MockResult::done()]))
            .build();
        assert_eq!(run(&library, "noop").unwrap().rows_affected, NO_ROW_COUNT);
    }

    #[test]
    fn test_rows_survive_buffer_full() {
        let library = MockLibrary::builder()
            .with_buffer_full()
            .with_response(
                "q",
                MockResponse::rows(
                    vec![MockColumn::int("n")],
                    vec![vec![CellValue::Int32(1)], vec![CellValue::Int32(2)]],
                ),
            )
            .build();
        let result = run(&library, "q").unwrap();
        let values: Vec<i32> = result.rows().iter().map(|r| r.get(0).unwrap()).collect();
        assert_eq!(values, [1, 2]);
    }

    #[test]
    fn test_row_failure_is_an_error() {
        let library = MockLibrary::builder()
            .with_response(
                "q",
                MockResponse::batch(vec![
                    MockResult::rows(
                        vec![MockColumn::int("n")],
                        vec![vec![CellValue::Int32(1)], vec![CellValue::Int32(2)]],
                    )
                    .failing_after(1),
                ]),
            )
            .build();
        assert!(run(&library, "q").is_err());
    }
}
