//! Scripted responses for the mock library.
//!
//! A [`MockResponse`] describes everything a submitted batch produces: the
//! result sets in order, informational messages, and where the batch
//! fails, if it does. Cells are given as [`CellValue`]s and laid out in
//! db-lib's in-memory form for the column's wire type when the batch runs.

use std::fmt;
use std::sync::Arc;

use mssql_types::convert::{datetime_bytes, money_bytes};
use mssql_types::{CellValue, Decoder, WireConverter};
use tds_native::{RpcRequest, ServerMessage, TypeCode, TypeFamily};

/// Severity the mock uses for server errors.
pub const ERROR_SEVERITY: i32 = 16;

/// A column of a scripted result set.
#[derive(Debug, Clone, PartialEq)]
pub struct MockColumn {
    /// Column name.
    pub name: String,
    /// Wire type reported for the column.
    pub type_code: TypeCode,
    /// Declared maximum length.
    pub declared_len: usize,
}

impl MockColumn {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, type_code: TypeCode, declared_len: usize) -> Self {
        Self {
            name: name.into(),
            type_code,
            declared_len,
        }
    }

    /// Create an INT column.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::INT4, 4)
    }

    /// Create a BIGINT column.
    pub fn bigint(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::INT8, 8)
    }

    /// Create a nullable integer column of `width` bytes.
    pub fn intn(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, TypeCode::INTN, width)
    }

    /// Create a BIT column.
    pub fn bit(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::BIT, 1)
    }

    /// Create a FLOAT column.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::FLT8, 8)
    }

    /// Create a VARCHAR column.
    pub fn varchar(name: impl Into<String>, max_len: usize) -> Self {
        Self::new(name, TypeCode::BIG_VARCHAR, max_len)
    }

    /// Create an NVARCHAR column.
    pub fn nvarchar(name: impl Into<String>, max_len: usize) -> Self {
        Self::new(name, TypeCode::BIG_NVARCHAR, max_len * 2)
    }

    /// Create a VARBINARY column.
    pub fn varbinary(name: impl Into<String>, max_len: usize) -> Self {
        Self::new(name, TypeCode::BIG_VARBINARY, max_len)
    }

    /// Create a legacy DATETIME column.
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::DATETIME, 8)
    }

    /// Create a DATETIME2 column.
    pub fn datetime2(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::DATETIME2, 8)
    }

    /// Create a DECIMAL column.
    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::NUMERIC, 17)
    }

    /// Create a MONEY column.
    pub fn money(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::MONEY, 8)
    }

    /// Create a UNIQUEIDENTIFIER column.
    pub fn guid(name: impl Into<String>) -> Self {
        Self::new(name, TypeCode::UNIQUE, 16)
    }

    /// Lay `value` out the way db-lib hands it back for this column.
    ///
    /// `Bytes` given for a non-binary column are passed through untouched,
    /// which lets tests feed raw wire data.
    #[must_use]
    pub fn encode_cell(&self, value: &CellValue) -> Option<Vec<u8>> {
        match (self.type_code.family(), value) {
            (_, CellValue::Null) => None,
            (_, CellValue::Bytes(raw)) => Some(raw.to_vec()),
            (TypeFamily::LegacyDateTime, v) => v.as_datetime().and_then(datetime_bytes).map(Vec::from),
            (TypeFamily::Money, v) => v.as_decimal().and_then(money_bytes).map(Vec::from),
            (TypeFamily::Integer, v) if self.type_code == TypeCode::INTN => v.as_i64().map(|n| {
                n.to_le_bytes()[..self.declared_len.clamp(1, 8)].to_vec()
            }),
            (_, v) => WireConverter::to_native(v).1,
        }
    }
}

/// One scripted result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockResult {
    /// Columns; empty for a row-count-only result.
    pub columns: Vec<MockColumn>,
    /// Row data, one value per column.
    pub rows: Vec<Vec<CellValue>>,
    /// Rows affected reported after the result, if any.
    pub row_count: Option<i64>,
    /// Row reading fails after this many rows.
    pub fail_after_rows: Option<usize>,
}

impl MockResult {
    /// A result set with rows. Its count is the number of rows.
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<CellValue>>) -> Self {
        let count = i64::try_from(rows.len()).ok();
        Self {
            columns,
            rows,
            row_count: count,
            fail_after_rows: None,
        }
    }

    /// A DML result reporting `count` affected rows.
    pub fn affected(count: i64) -> Self {
        Self {
            row_count: Some(count),
            ..Self::default()
        }
    }

    /// A result with neither columns nor a count (`SET`, `PRINT`, ...).
    pub fn done() -> Self {
        Self::default()
    }

    /// Drop the reported count.
    #[must_use]
    pub fn without_count(mut self) -> Self {
        self.row_count = None;
        self
    }

    /// Make row reading fail after `rows` rows.
    #[must_use]
    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after_rows = Some(rows);
        self
    }
}

/// Mock response for a submitted batch.
#[derive(Clone)]
pub enum MockResponse {
    /// The batch runs and produces these results.
    Batch {
        /// Result sets in order.
        results: Vec<MockResult>,
        /// Messages raised while the batch runs.
        messages: Vec<ServerMessage>,
        /// After the results, the next `results` call fails with this error.
        trailing_error: Option<ServerMessage>,
    },

    /// The batch is rejected when it is sent.
    Error(ServerMessage),

    /// Compute the response from the SQL text.
    Custom(Arc<dyn Fn(&str) -> MockResponse + Send + Sync>),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch {
                results,
                messages,
                trailing_error,
            } => f
                .debug_struct("Batch")
                .field("results", results)
                .field("messages", messages)
                .field("trailing_error", trailing_error)
                .finish(),
            Self::Error(msg) => f.debug_tuple("Error").field(msg).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// A batch producing `results` in order.
    pub fn batch(results: Vec<MockResult>) -> Self {
        Self::Batch {
            results,
            messages: Vec::new(),
            trailing_error: None,
        }
    }

    /// A single result without columns or count.
    pub fn empty() -> Self {
        Self::batch(vec![MockResult::done()])
    }

    /// A single DML result.
    pub fn affected(count: i64) -> Self {
        Self::batch(vec![MockResult::affected(count)])
    }

    /// A single result set.
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<CellValue>>) -> Self {
        Self::batch(vec![MockResult::rows(columns, rows)])
    }

    /// A single-column, single-row INT result.
    pub fn scalar_int(value: i32) -> Self {
        Self::rows(vec![MockColumn::int("")], vec![vec![CellValue::Int32(value)]])
    }

    /// A single-column, single-row NVARCHAR result.
    pub fn scalar_string(value: impl Into<String>) -> Self {
        let value = value.into();
        let len = value.chars().count().max(1);
        Self::rows(
            vec![MockColumn::nvarchar("", len)],
            vec![vec![CellValue::String(value)]],
        )
    }

    /// A batch rejected with a server error.
    pub fn error(number: i32, message: impl Into<String>) -> Self {
        Self::Error(ServerMessage::new(number, message, ERROR_SEVERITY))
    }

    /// Compute the response from the SQL text.
    pub fn custom(f: impl Fn(&str) -> MockResponse + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Add a message raised while the batch runs.
    #[must_use]
    pub fn with_message(mut self, message: ServerMessage) -> Self {
        if let Self::Batch { messages, .. } = &mut self {
            messages.push(message);
        }
        self
    }

    /// Fail the batch after its results have been read.
    #[must_use]
    pub fn then_fail(mut self, number: i32, message: impl Into<String>) -> Self {
        if let Self::Batch { trailing_error, .. } = &mut self {
            *trailing_error = Some(ServerMessage::new(number, message, ERROR_SEVERITY));
        }
        self
    }

    /// Resolve `Custom` against `sql`.
    pub(crate) fn resolve(&self, sql: &str) -> MockResponse {
        match self {
            Self::Custom(f) => f(sql).resolve(sql),
            other => other.clone(),
        }
    }
}

/// An RPC call as seen by a scripted procedure.
#[derive(Debug)]
pub struct ProcedureCall<'a> {
    request: &'a RpcRequest,
}

impl<'a> ProcedureCall<'a> {
    pub(crate) fn new(request: &'a RpcRequest) -> Self {
        Self { request }
    }

    /// The raw request.
    #[must_use]
    pub fn request(&self) -> &'a RpcRequest {
        self.request
    }

    /// Decoded value of the parameter called `name` (with or without `@`).
    /// Missing parameters read as NULL, and so do zero-length values of
    /// variable-length types: db-lib sends a zero data length as NULL.
    #[must_use]
    pub fn param(&self, name: &str) -> CellValue {
        let name = name.trim_start_matches('@');
        self.request
            .params
            .iter()
            .find(|p| p.name.trim_start_matches('@').eq_ignore_ascii_case(name))
            .map_or(CellValue::Null, |p| {
                let data = p
                    .data
                    .as_deref()
                    .filter(|d| !d.is_empty() || p.type_code.is_fixed_length());
                Decoder::default().decode(p.type_code, data, p.data_len(), &WireConverter)
            })
    }
}

/// What a scripted procedure returns.
#[derive(Debug, Clone)]
pub struct ProcedureOutcome {
    /// Result sets and messages produced by the call.
    pub response: MockResponse,
    /// Output values by parameter name.
    pub outputs: Vec<(String, CellValue)>,
    /// Return status, if the procedure sets one.
    pub return_status: Option<i32>,
}

impl Default for ProcedureOutcome {
    fn default() -> Self {
        Self {
            response: MockResponse::empty(),
            outputs: Vec::new(),
            return_status: None,
        }
    }
}

impl ProcedureOutcome {
    /// An outcome with no results, outputs or status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the results.
    #[must_use]
    pub fn with_response(mut self, response: MockResponse) -> Self {
        self.response = response;
        self
    }

    /// Return `value` through output parameter `name`.
    #[must_use]
    pub fn output(mut self, name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.outputs.push((name.into(), value.into()));
        self
    }

    /// Set the return status.
    #[must_use]
    pub fn status(mut self, status: i32) -> Self {
        self.return_status = Some(status);
        self
    }
}

/// A scripted stored procedure.
pub type MockProcedure = Arc<dyn Fn(&ProcedureCall<'_>) -> ProcedureOutcome + Send + Sync>;
