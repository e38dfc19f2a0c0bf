//! Row representation for query results.
//!
//! Rows are decoded eagerly by the result assembler while the native handle
//! still owns the column buffers. Every row of one result table shares the
//! same [`ColMetaData`], so the per-row cost is the value vector only.
//!
//! ## Access Patterns
//!
//! - `get_raw()` - Borrowed [`CellValue`], no conversion
//! - `get<T>()` - Type-converting accessor through [`FromSql`]
//! - `try_get<T>()` - Like `get`, but NULL and conversion failures are `None`

use std::sync::Arc;

use mssql_types::{CellValue, ColumnType, FromSql, TypeError};
use tds_native::TypeCode;

/// Column metadata describing a result set column.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking semver compatibility. Use
/// [`Column::new()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Column {
    /// Column name, case preserved.
    pub name: String,
    /// Column index (0-based).
    pub index: usize,
    /// Wire type code reported by the library.
    pub type_code: TypeCode,
    /// Declared maximum length in bytes.
    pub declared_len: usize,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, index: usize, type_code: TypeCode, declared_len: usize) -> Self {
        Self {
            name: name.into(),
            index,
            type_code,
            declared_len,
        }
    }

    /// SQL type name (e.g., "int", "nvarchar").
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_code.sql_name()
    }

    /// Semantic type derived from the wire type code.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        ColumnType::from_type_code(self.type_code, self.declared_len)
    }
}

/// Column metadata for a result set.
///
/// Shared across all rows of one result table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColMetaData {
    /// Column definitions.
    pub columns: Arc<[Column]>,
}

impl ColMetaData {
    /// Create new column metadata from a list of columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Get the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get a column by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find a column index by name (case-insensitive).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A row from a query result.
///
/// Values are in wire column order. Name lookup is case-insensitive; when
/// two columns share a name the first one wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    metadata: Arc<ColMetaData>,
    values: Vec<CellValue>,
}

impl Row {
    /// Create a row from decoded values.
    ///
    /// `values` must be in the same order as `metadata.columns`.
    pub fn new(metadata: Arc<ColMetaData>, values: Vec<CellValue>) -> Self {
        debug_assert_eq!(metadata.len(), values.len());
        Self { metadata, values }
    }

    /// Create a row from values alone, naming columns by position.
    ///
    /// Column types are derived from the values; NULLs get the unknown type.
    pub fn from_values(values: Vec<CellValue>) -> Self {
        let columns = values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let (type_code, data) = mssql_types::WireConverter::to_native(value);
                Column::new(
                    format!("column{index}"),
                    index,
                    type_code,
                    data.map_or(0, |d| d.len()),
                )
            })
            .collect();
        Self::new(Arc::new(ColMetaData::new(columns)), values)
    }

    /// Get a value by column index with type conversion.
    ///
    /// Uses the `FromSql` trait to convert the raw value to the requested type.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, TypeError> {
        self.values
            .get(index)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column index",
                actual: format!("index {index} out of bounds"),
            })
            .and_then(T::from_sql)
    }

    /// Get a value by column name with type conversion.
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, TypeError> {
        let index = self
            .metadata
            .find_by_name(name)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column name",
                actual: format!("column '{name}' not found"),
            })?;

        self.get(index)
    }

    /// Try to get a value by column index, returning None if NULL or not found.
    pub fn try_get<T: FromSql>(&self, index: usize) -> Option<T> {
        self.values
            .get(index)
            .and_then(|v| T::from_sql_nullable(v).ok().flatten())
    }

    /// Try to get a value by column name, returning None if NULL or not found.
    pub fn try_get_by_name<T: FromSql>(&self, name: &str) -> Option<T> {
        let index = self.metadata.find_by_name(name)?;
        self.try_get(index)
    }

    /// Get the raw value by index.
    #[must_use]
    pub fn get_raw(&self, index: usize) -> Option<&CellValue> {
        self.values.get(index)
    }

    /// Get the raw value by column name.
    #[must_use]
    pub fn get_raw_by_name(&self, name: &str) -> Option<&CellValue> {
        let index = self.metadata.find_by_name(name)?;
        self.get_raw(index)
    }

    /// Wire type code of the named column.
    #[must_use]
    pub fn type_code(&self, name: &str) -> Option<TypeCode> {
        let index = self.metadata.find_by_name(name)?;
        self.metadata.get(index).map(|c| c.type_code)
    }

    /// Get the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.metadata.columns
    }

    /// Get the shared column metadata.
    #[must_use]
    pub fn metadata(&self) -> &Arc<ColMetaData> {
        &self.metadata
    }

    /// All values in column order.
    #[must_use]
    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    /// Consume the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<CellValue> {
        self.values
    }

    /// Check if a column value is NULL. Missing columns count as NULL.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).is_none_or(CellValue::is_null)
    }

    /// Check if a column value is NULL by name.
    #[must_use]
    pub fn is_null_by_name(&self, name: &str) -> bool {
        self.metadata
            .find_by_name(name)
            .is_none_or(|i| self.is_null(i))
    }

    /// Iterate `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.metadata
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.values.iter())
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a CellValue;
    type IntoIter = std::slice::Iter<'a, CellValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
