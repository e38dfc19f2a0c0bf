//! Parameterized query builder.
//!
//! Placeholders are positional and named `@p1`, `@p2`, ... in bind order.
//! The query runs through `sp_executesql`, so the server sees typed
//! parameters rather than spliced text.
//!
//! ```rust,ignore
//! use mssql_client::Query;
//!
//! let query = Query::new("SELECT name FROM users WHERE id = @p1 AND active = @p2")
//!     .bind(&42i32)
//!     .bind(&true);
//! let result = client.execute_query(&query).await?;
//! ```

use std::collections::BTreeSet;

use mssql_types::{CellValue, ToSql, TypeError};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::rpc::Parameter;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"@[pP](\d+)\b").expect("placeholder pattern is valid")
});

/// Distinct `@pN` indices referenced by `sql`.
#[must_use]
pub fn placeholders(sql: &str) -> BTreeSet<usize> {
    PLACEHOLDER
        .captures_iter(sql)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect()
}

/// A query with bound parameters.
///
/// Values are converted when bound; a conversion failure is reported when
/// the query is executed.
#[derive(Debug, Clone)]
pub struct Query {
    sql: String,
    params: Vec<std::result::Result<CellValue, TypeError>>,
}

impl Query {
    /// Create a new query from SQL text.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind the next positional parameter.
    ///
    /// Empty strings and empty binary values arrive at the server as NULL;
    /// see [`Parameter`].
    #[must_use]
    pub fn bind<T: ToSql + ?Sized>(mut self, value: &T) -> Self {
        self.params.push(value.to_sql());
        self
    }

    /// Get the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Check the placeholders against the bound values and name the
    /// parameters `@p1..@pN`.
    pub fn parameters(&self) -> Result<Vec<Parameter>> {
        if self.sql.trim().is_empty() {
            return Err(Error::Configuration("no command text".into()));
        }
        let used = placeholders(&self.sql);
        let highest = used.last().copied().unwrap_or(0);
        if highest != self.params.len() || used.len() != highest {
            return Err(Error::Configuration(format!(
                "query references {} placeholder(s) up to @p{highest} but {} value(s) are bound",
                used.len(),
                self.params.len()
            )));
        }
        self.params
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let value = value.clone()?;
                Ok(Parameter::input(format!("@p{}", i + 1), value))
            })
            .collect()
    }
}
