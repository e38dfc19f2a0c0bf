//! Command results.

use std::collections::HashMap;
use std::sync::Arc;

use mssql_types::CellValue;

use crate::from_row::FromRow;
use crate::row::{ColMetaData, Row};

/// Affected-row sentinel for results that carry no count.
pub const NO_ROW_COUNT: i64 = -1;

/// Rows produced by one statement of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    /// Column metadata, shared with every row.
    pub metadata: Arc<ColMetaData>,
    /// Rows in wire order.
    pub rows: Vec<Row>,
    /// Rows affected by the statement, or [`NO_ROW_COUNT`].
    pub rows_affected: i64,
}

impl ResultTable {
    /// Create an empty table for the given columns.
    pub fn new(metadata: Arc<ColMetaData>) -> Self {
        Self {
            metadata,
            rows: Vec::new(),
            rows_affected: NO_ROW_COUNT,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in wire order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.metadata.columns.iter().map(|c| c.name.as_str())
    }

    /// Map every row through [`FromRow`].
    pub fn map<T: FromRow>(&self) -> crate::Result<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }
}

/// The outcome of one command: every result table in submission order,
/// the summed affected-row count, and anything an RPC returned.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// One table per row-returning statement.
    pub tables: Vec<ResultTable>,
    /// Sum of all reported affected-row counts, or [`NO_ROW_COUNT`] if none
    /// was reported.
    pub rows_affected: i64,
    /// Output parameters by name (RPC only).
    pub output_params: HashMap<String, CellValue>,
    /// Procedure return status (RPC only).
    pub return_status: Option<i32>,
}

impl Default for QueryResult {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            rows_affected: NO_ROW_COUNT,
            output_params: HashMap::new(),
            return_status: None,
        }
    }
}

impl QueryResult {
    /// The first table, if any.
    #[must_use]
    pub fn first_table(&self) -> Option<&ResultTable> {
        self.tables.first()
    }

    /// Rows of the first table; empty when there is none.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        self.tables.first().map_or(&[], |t| t.rows.as_slice())
    }

    /// Consume the result, returning the first table's rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.tables.into_iter().next().map(|t| t.rows).unwrap_or_default()
    }

    /// First column of the first row of the first table.
    #[must_use]
    pub fn scalar(&self) -> Option<&CellValue> {
        self.rows().first().and_then(|r| r.get_raw(0))
    }

    /// Output parameter by name. The leading `@` is optional and the
    /// lookup is case-insensitive.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&CellValue> {
        let wanted = name.trim_start_matches('@');
        self.output_params
            .iter()
            .find(|(k, _)| k.trim_start_matches('@').eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v)
    }

    /// Affected rows as an unsigned total, treating "no count" as zero.
    #[must_use]
    pub fn affected(&self) -> u64 {
        u64::try_from(self.rows_affected).unwrap_or(0)
    }
}
