//! Schema-carrying tables.
//!
//! A [`TypedTable`] reifies a [`ResultTable`] into named, typed columns.
//! Types come from the wire type codes when the library reported them and
//! from the first non-null value otherwise.

use mssql_types::{CellValue, ColumnType};
use tds_native::TypeFamily;

use crate::result::ResultTable;

/// Name and semantic type of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedColumn {
    /// Column name.
    pub name: String,
    /// Semantic type.
    pub column_type: ColumnType,
}

/// A table with a fixed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedTable {
    /// Column descriptors in wire order.
    pub columns: Vec<TypedColumn>,
    /// Row values, one vector per row, in column order.
    pub rows: Vec<Vec<CellValue>>,
}

impl TypedTable {
    /// Build a typed table from a result table.
    #[must_use]
    pub fn from_result_table(table: &ResultTable) -> Self {
        let columns = table
            .metadata
            .columns
            .iter()
            .map(|column| {
                let column_type = if column.type_code.family() == TypeFamily::Unknown {
                    ColumnType::sample(table.rows.iter().filter_map(|r| r.get_raw(column.index)))
                } else {
                    column.column_type()
                };
                TypedColumn {
                    name: column.name.clone(),
                    column_type,
                }
            })
            .collect();

        let rows = table.rows.iter().map(|r| r.values().to_vec()).collect();

        Self { columns, rows }
    }

    /// Index of the named column (case-insensitive).
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// All values of one column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> {
        self.rows.iter().filter_map(move |r| r.get(index))
    }
}
