//! FromRow trait for row-to-struct mapping.
//!
//! Implementations usually go through [`RowMapper`], which finds the column
//! for a field name by, in order:
//!
//! 1. exact name
//! 2. case-insensitive name
//! 3. snake_case / camelCase equivalence (`user_name` matches `userName`
//!    and `UserName`)
//!
//! ```rust,ignore
//! use mssql_client::{Error, FromRow, Row, RowMapper};
//!
//! struct User {
//!     id: i32,
//!     user_name: String,
//!     email: Option<String>,
//! }
//!
//! impl FromRow for User {
//!     fn from_row(row: &Row) -> Result<Self, Error> {
//!         let m = RowMapper::new(row);
//!         Ok(Self {
//!             id: m.get("id")?,
//!             user_name: m.get("user_name")?,
//!             email: m.get_opt("email")?,
//!         })
//!     }
//! }
//! ```

use mssql_types::FromSql;

use crate::error::Error;
use crate::row::Row;

/// Trait for types that can be constructed from a database row.
pub trait FromRow: Sized {
    /// Construct an instance of this type from a database row.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A required column is missing
    /// - A column value cannot be converted to the expected Rust type
    fn from_row(row: &Row) -> Result<Self, Error>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, Error> {
        Ok(row.clone())
    }
}

/// Field-name based access to a row's columns.
#[derive(Debug, Clone, Copy)]
pub struct RowMapper<'a> {
    row: &'a Row,
}

impl<'a> RowMapper<'a> {
    /// Wrap a row.
    #[must_use]
    pub fn new(row: &'a Row) -> Self {
        Self { row }
    }

    /// Index of the column matching `field`.
    #[must_use]
    pub fn column_for(&self, field: &str) -> Option<usize> {
        let columns = self.row.columns();
        columns
            .iter()
            .position(|c| c.name == field)
            .or_else(|| columns.iter().position(|c| c.name.eq_ignore_ascii_case(field)))
            .or_else(|| {
                let wanted = fold_case_style(field);
                columns.iter().position(|c| fold_case_style(&c.name) == wanted)
            })
    }

    /// Value for `field`. A missing column is an error.
    pub fn get<T: FromSql>(&self, field: &str) -> Result<T, Error> {
        let index = self
            .column_for(field)
            .ok_or_else(|| Error::ColumnNotFound(field.to_string()))?;
        Ok(self.row.get(index)?)
    }

    /// Value for `field`; `None` when the column is missing or NULL.
    pub fn get_opt<T: FromSql>(&self, field: &str) -> Result<Option<T>, Error> {
        match self.column_for(field).and_then(|i| self.row.get_raw(i)) {
            Some(value) => Ok(T::from_sql_nullable(value)?),
            None => Ok(None),
        }
    }
}

/// Lowercase with underscores removed, so that `user_name`, `userName` and
/// `UserName` compare equal.
fn fold_case_style(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Extension trait for iterating over query results as typed structs.
///
/// This trait is automatically implemented for any iterator of `Result<Row, Error>`.
pub trait RowIteratorExt: Iterator<Item = Result<Row, Error>> + Sized {
    /// Map each row to a struct implementing `FromRow`.
    fn map_rows<T: FromRow>(self) -> MapRows<Self, T>;
}

impl<I: Iterator<Item = Result<Row, Error>>> RowIteratorExt for I {
    fn map_rows<T: FromRow>(self) -> MapRows<Self, T> {
        MapRows {
            inner: self,
            _marker: std::marker::PhantomData,
        }
    }
}

/// Iterator adapter that maps rows to typed structs.
pub struct MapRows<I, T> {
    inner: I,
    _marker: std::marker::PhantomData<T>,
}

impl<I, T> Iterator for MapRows<I, T>
where
    I: Iterator<Item = Result<Row, Error>>,
    T: FromRow,
{
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|result| result.and_then(|row| T::from_row(&row)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::row::{ColMetaData, Column};
    use mssql_types::CellValue;
    use std::sync::Arc;
    use tds_native::TypeCode;

    #[derive(Debug)]
    struct TestUser {
        id: i32,
        user_name: String,
        email: Option<String>,
    }

    impl FromRow for TestUser {
        fn from_row(row: &Row) -> Result<Self, Error> {
            let m = RowMapper::new(row);
            Ok(Self {
                id: m.get("id")?,
                user_name: m.get("user_name")?,
                email: m.get_opt("email")?,
            })
        }
    }

    fn row(names: &[&str], values: Vec<CellValue>) -> Row {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, n)| Column::new(*n, i, TypeCode::BIG_VARCHAR, 50))
            .collect();
        Row::new(Arc::new(ColMetaData::new(columns)), values)
    }

    #[test]
    fn test_name_matching_styles() {
        for names in [
            ["id", "user_name", "email"],
            ["ID", "USER_NAME", "Email"],
            ["Id", "userName", "EMAIL"],
            ["id", "UserName", "email"],
        ] {
            let r = row(
                &names,
                vec![CellValue::Int32(1), CellValue::from("alice"), CellValue::Null],
            );
            let user = TestUser::from_row(&r).unwrap();
            assert_eq!(user.id, 1);
            assert_eq!(user.user_name, "alice");
            assert_eq!(user.email, None);
        }
    }

    #[test]
    fn test_exact_match_wins() {
        let r = row(&["username", "user_name"], vec![CellValue::from("a"), CellValue::from("b")]);
        let m = RowMapper::new(&r);
        assert_eq!(m.column_for("user_name"), Some(1));
        assert_eq!(m.column_for("UserName"), Some(0));
    }

    #[test]
    fn test_missing_column() {
        let r = row(&["id"], vec![CellValue::Int32(1)]);
        let err = TestUser::from_row(&r).unwrap_err();
        assert_eq!(err, Error::ColumnNotFound("user_name".into()));
        assert_eq!(RowMapper::new(&r).get_opt::<i32>("nope").unwrap(), None);
    }

    #[test]
    fn test_map_rows_iterator() {
        let rows = vec![
            Ok(row(
                &["id", "user_name", "email"],
                vec![CellValue::Int32(1), CellValue::from("Alice"), CellValue::from("a@x")],
            )),
            Ok(row(
                &["id", "user_name", "email"],
                vec![CellValue::Int32(2), CellValue::from("Bob"), CellValue::Null],
            )),
        ];

        let users: Vec<TestUser> = rows
            .into_iter()
            .map_rows::<TestUser>()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email.as_deref(), Some("a@x"));
        assert_eq!(users[1].user_name, "Bob");
    }
}
