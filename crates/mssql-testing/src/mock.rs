//! In-memory native library for unit testing.
//!
//! [`MockLibrary`] implements the native traits without a server. Batches
//! are answered from a table of scripted [`MockResponse`]s keyed by SQL
//! text, procedure calls by scripted [`MockProcedure`]s, and bulk-copy
//! rows land in in-memory tables that tests can inspect afterwards.
//!
//! The library records what the driver did (login fields, opened servers,
//! commands, session options) and counts live handles so tests can check
//! that failed connects release everything they acquired.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mssql_testing::{MockLibrary, MockResponse};
//!
//! let library = MockLibrary::builder()
//!     .with_response("SELECT 1", MockResponse::scalar_int(1))
//!     .build();
//! // Hand `library.clone()` to the client as its native library...
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use mssql_types::WireConverter;
use parking_lot::Mutex;
use tds_native::{
    BcpBinding, BcpField, Bootstrap, ConnectionHandle, Converter, GuidLayout, LoginHandle,
    LoginOption, NativeError, NativeLibrary, ResultsStatus, RowStatus, RpcRequest, ServerMessage,
    SessionOption, TypeCode,
};

use crate::script::{
    ERROR_SEVERITY, MockColumn, MockProcedure, MockResponse, MockResult, ProcedureCall,
    ProcedureOutcome,
};

/// Procedure the parameterized-statement path calls.
const EXECUTESQL: &str = "sp_executesql";

/// A command as recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    /// A submitted batch.
    Batch(String),
    /// A procedure call.
    Rpc(RpcRequest),
    /// A bulk-copy started into a table.
    BulkCopy(String),
    /// A database switch.
    UseDatabase(String),
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, MockResponse>,
    default_response: Option<MockResponse>,
    procedures: HashMap<String, MockProcedure>,
    tables: HashMap<String, Vec<Vec<Option<String>>>>,
    login_failure: Option<String>,
    database_failures: HashSet<String>,
    init_failure: Option<String>,
    bulk_done_failure: bool,
    buffer_full: bool,
    delay: Option<Duration>,
}

#[derive(Default)]
struct Journal {
    logins: Vec<Vec<LoginOption>>,
    servers: Vec<String>,
    commands: Vec<RecordedCommand>,
    session_options: Vec<SessionOption>,
}

struct Shared {
    bootstrap: Bootstrap,
    guid_layout: GuidLayout,
    script: Mutex<Script>,
    journal: Mutex<Journal>,
    init_runs: AtomicUsize,
    live_logins: AtomicUsize,
    live_connections: AtomicUsize,
    cancels: AtomicUsize,
    reentrancy_violations: AtomicUsize,
}

/// Builder for [`MockLibrary`].
pub struct MockLibraryBuilder {
    script: Script,
    guid_layout: GuidLayout,
}

impl MockLibraryBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            script: Script {
                default_response: Some(MockResponse::empty()),
                ..Script::default()
            },
            guid_layout: GuidLayout::default(),
        }
    }

    /// Add a response for a specific SQL batch.
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.script.responses.insert(sql.into(), response);
        self
    }

    /// Set the default response for unmatched batches.
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.script.default_response = Some(response);
        self
    }

    /// Reject unmatched batches instead of answering them.
    pub fn strict(mut self) -> Self {
        self.script.default_response = None;
        self
    }

    /// Register a stored procedure. Names match case-insensitively.
    pub fn with_procedure<F>(mut self, name: impl Into<String>, procedure: F) -> Self
    where
        F: Fn(&ProcedureCall<'_>) -> ProcedureOutcome + Send + Sync + 'static,
    {
        self.script
            .procedures
            .insert(name.into().to_lowercase(), Arc::new(procedure));
        self
    }

    /// Create a table that accepts bulk-copy rows.
    pub fn with_table(mut self, name: impl Into<String>) -> Self {
        self.script.tables.insert(name.into(), Vec::new());
        self
    }

    /// Reject every login with `detail`.
    pub fn with_login_failure(mut self, detail: impl Into<String>) -> Self {
        self.script.login_failure = Some(detail.into());
        self
    }

    /// Fail switching to `database`.
    pub fn with_database_failure(mut self, database: impl Into<String>) -> Self {
        self.script.database_failures.insert(database.into());
        self
    }

    /// Fail library initialization.
    pub fn with_init_failure(mut self, detail: impl Into<String>) -> Self {
        self.script.init_failure = Some(detail.into());
        self
    }

    /// Make finishing a bulk-copy report a negative count.
    pub fn with_bulk_done_failure(mut self) -> Self {
        self.script.bulk_done_failure = true;
        self
    }

    /// Report a full row buffer once before every row.
    pub fn with_buffer_full(mut self) -> Self {
        self.script.buffer_full = true;
        self
    }

    /// Hold every submitted batch for `delay` before it completes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = Some(delay);
        self
    }

    /// Byte order the library expects for outbound identifiers.
    pub fn with_guid_layout(mut self, layout: GuidLayout) -> Self {
        self.guid_layout = layout;
        self
    }

    /// Build the library.
    pub fn build(self) -> MockLibrary {
        MockLibrary {
            shared: Arc::new(Shared {
                bootstrap: Bootstrap::new(),
                guid_layout: self.guid_layout,
                script: Mutex::new(self.script),
                journal: Mutex::new(Journal::default()),
                init_runs: AtomicUsize::new(0),
                live_logins: AtomicUsize::new(0),
                live_connections: AtomicUsize::new(0),
                cancels: AtomicUsize::new(0),
                reentrancy_violations: AtomicUsize::new(0),
            }),
        }
    }
}

impl Default for MockLibraryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory native library.
///
/// Clones share the same script and journal.
#[derive(Clone)]
pub struct MockLibrary {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MockLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLibrary")
            .field("live_connections", &self.live_connections())
            .finish_non_exhaustive()
    }
}

impl MockLibrary {
    /// Create a new builder for the mock library.
    pub fn builder() -> MockLibraryBuilder {
        MockLibraryBuilder::new()
    }

    /// Add or replace a response after the library was built.
    pub fn set_response(&self, sql: impl Into<String>, response: MockResponse) {
        self.shared.script.lock().responses.insert(sql.into(), response);
    }

    /// Rows bulk-copied into `table` so far, as the text sent per column.
    pub fn table_rows(&self, table: &str) -> Option<Vec<Vec<Option<String>>>> {
        self.shared.script.lock().tables.get(table).cloned()
    }

    /// Login fields applied, one entry per login record.
    pub fn logins(&self) -> Vec<Vec<LoginOption>> {
        self.shared.journal.lock().logins.clone()
    }

    /// Servers passed to open, in order.
    pub fn opened_servers(&self) -> Vec<String> {
        self.shared.journal.lock().servers.clone()
    }

    /// Commands received, in order.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.shared.journal.lock().commands.clone()
    }

    /// Submitted batch texts, in order.
    pub fn batches(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCommand::Batch(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    /// Session options set on any connection, in order.
    pub fn session_options(&self) -> Vec<SessionOption> {
        self.shared.journal.lock().session_options.clone()
    }

    /// How many times the initialization closure actually ran.
    pub fn init_runs(&self) -> usize {
        self.shared.init_runs.load(Ordering::SeqCst)
    }

    /// Login records allocated and not yet freed.
    pub fn live_logins(&self) -> usize {
        self.shared.live_logins.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed.
    pub fn live_connections(&self) -> usize {
        self.shared.live_connections.load(Ordering::SeqCst)
    }

    /// How many times pending results were cancelled.
    pub fn cancels(&self) -> usize {
        self.shared.cancels.load(Ordering::SeqCst)
    }

    /// Native calls that started while another call on the same
    /// connection was still in flight. Always zero for a correct driver.
    pub fn reentrancy_violations(&self) -> usize {
        self.shared.reentrancy_violations.load(Ordering::SeqCst)
    }
}

impl NativeLibrary for MockLibrary {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn init(&self) -> tds_native::Result<()> {
        self.shared.bootstrap.run(|| {
            self.shared.init_runs.fetch_add(1, Ordering::SeqCst);
            match &self.shared.script.lock().init_failure {
                Some(detail) => Err(NativeError::InitFailed(detail.clone())),
                None => Ok(()),
            }
        })
    }

    fn new_login(&self) -> tds_native::Result<Box<dyn LoginHandle>> {
        self.shared.live_logins.fetch_add(1, Ordering::SeqCst);
        let index = {
            let mut journal = self.shared.journal.lock();
            journal.logins.push(Vec::new());
            journal.logins.len() - 1
        };
        Ok(Box::new(MockLogin {
            shared: Arc::clone(&self.shared),
            index,
        }))
    }

    fn guid_layout(&self) -> GuidLayout {
        self.shared.guid_layout
    }
}

struct MockLogin {
    shared: Arc<Shared>,
    index: usize,
}

impl LoginHandle for MockLogin {
    fn apply(&mut self, option: &LoginOption) -> tds_native::Result<()> {
        if let Some(fields) = self.shared.journal.lock().logins.get_mut(self.index) {
            fields.push(option.clone());
        }
        Ok(())
    }

    fn open(&mut self, server: &str) -> tds_native::Result<Box<dyn ConnectionHandle>> {
        self.shared.journal.lock().servers.push(server.to_string());
        if let Some(detail) = self.shared.script.lock().login_failure.clone() {
            return Err(NativeError::LoginRejected {
                server: server.to_string(),
                detail,
            });
        }
        self.shared.live_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection::new(Arc::clone(&self.shared))))
    }
}

impl Drop for MockLogin {
    fn drop(&mut self) {
        self.shared.live_logins.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Output value captured from a procedure call.
struct ReturnValue {
    name: String,
    type_code: TypeCode,
    data: Option<Vec<u8>>,
}

struct MockConnection {
    shared: Arc<Shared>,
    in_flight: AtomicBool,
    pending: VecDeque<MockResult>,
    trailing_error: Option<ServerMessage>,
    current: Option<MockResult>,
    next_row: usize,
    row: Vec<Option<Vec<u8>>>,
    row_count: Option<i64>,
    buffer_full_pending: bool,
    messages: Vec<ServerMessage>,
    returns: Vec<ReturnValue>,
    return_status: Option<i32>,
    bulk_table: Option<String>,
    bulk_bound: usize,
    bulk_pending: Vec<Vec<Option<String>>>,
    converter: WireConverter,
}

impl MockConnection {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            in_flight: AtomicBool::new(false),
            pending: VecDeque::new(),
            trailing_error: None,
            current: None,
            next_row: 0,
            row: Vec::new(),
            row_count: None,
            buffer_full_pending: false,
            messages: Vec::new(),
            returns: Vec::new(),
            return_status: None,
            bulk_table: None,
            bulk_bound: 0,
            bulk_pending: Vec::new(),
            converter: WireConverter,
        }
    }

    fn record(&self, command: RecordedCommand) {
        self.shared.journal.lock().commands.push(command);
    }

    /// Mark a command as started, noting overlap with one still running.
    fn begin(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.shared
                .reentrancy_violations
                .fetch_add(1, Ordering::SeqCst);
            tracing::error!("native call started while another was in flight");
        }
        let delay = self.shared.script.lock().delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }

    fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    fn reset_results(&mut self) {
        self.pending.clear();
        self.trailing_error = None;
        self.current = None;
        self.next_row = 0;
        self.row.clear();
        self.row_count = None;
    }

    fn load(&mut self, response: MockResponse) -> tds_native::Result<()> {
        match response {
            MockResponse::Batch {
                results,
                messages,
                trailing_error,
            } => {
                self.pending = results.into();
                self.trailing_error = trailing_error;
                self.messages.extend(messages);
                Ok(())
            }
            MockResponse::Error(message) => {
                let detail = message.to_string();
                self.messages.push(message);
                self.finish();
                Err(NativeError::call_failed("dbsqlexec", detail))
            }
            MockResponse::Custom(_) => Err(NativeError::Unsupported("unresolved custom response")),
        }
    }

    fn fail(&mut self, message: ServerMessage) {
        self.messages.push(message);
        self.finish();
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.shared.live_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectionHandle for MockConnection {
    fn use_database(&mut self, database: &str) -> tds_native::Result<()> {
        self.record(RecordedCommand::UseDatabase(database.to_string()));
        if self.shared.script.lock().database_failures.contains(database) {
            let message = ServerMessage::new(
                911,
                format!("Database '{database}' does not exist. Make sure that the name is entered correctly."),
                ERROR_SEVERITY,
            );
            let detail = message.to_string();
            self.messages.push(message);
            return Err(NativeError::call_failed("dbuse", detail));
        }
        self.messages.push(ServerMessage::new(
            5701,
            format!("Changed database context to '{database}'."),
            0,
        ));
        Ok(())
    }

    fn cancel(&mut self) -> tds_native::Result<()> {
        self.shared.cancels.fetch_add(1, Ordering::SeqCst);
        self.reset_results();
        self.finish();
        Ok(())
    }

    fn set_option(&mut self, option: SessionOption) -> tds_native::Result<()> {
        self.shared.journal.lock().session_options.push(option);
        Ok(())
    }

    fn submit(&mut self, sql: &str) -> tds_native::Result<()> {
        self.begin();
        self.record(RecordedCommand::Batch(sql.to_string()));
        self.reset_results();
        let response = {
            let script = self.shared.script.lock();
            script
                .responses
                .get(sql)
                .or(script.default_response.as_ref())
                .map(|r| r.resolve(sql))
        };
        match response {
            Some(response) => self.load(response),
            None => {
                let message = ServerMessage::new(
                    2812,
                    format!("No scripted response for '{sql}'."),
                    ERROR_SEVERITY,
                );
                let detail = message.to_string();
                self.fail(message);
                Err(NativeError::call_failed("dbsqlexec", detail))
            }
        }
    }

    fn results(&mut self) -> ResultsStatus {
        self.current = None;
        self.row.clear();
        match self.pending.pop_front() {
            Some(result) => {
                self.row_count = result.row_count;
                self.next_row = 0;
                self.buffer_full_pending = self.shared.script.lock().buffer_full;
                self.current = Some(result);
                ResultsStatus::Succeed
            }
            None => match self.trailing_error.take() {
                Some(message) => {
                    self.fail(message);
                    ResultsStatus::Fail
                }
                None => {
                    self.finish();
                    ResultsStatus::NoMoreResults
                }
            },
        }
    }

    fn column_count(&self) -> usize {
        self.current.as_ref().map_or(0, |r| r.columns.len())
    }

    fn column_name(&self, column: usize) -> String {
        self.column(column).map(|c| c.name.clone()).unwrap_or_default()
    }

    fn column_type(&self, column: usize) -> TypeCode {
        self.column(column).map_or(TypeCode(0), |c| c.type_code)
    }

    fn column_len(&self, column: usize) -> usize {
        self.column(column).map_or(0, |c| c.declared_len)
    }

    fn next_row(&mut self) -> RowStatus {
        let Some(result) = self.current.as_ref() else {
            return RowStatus::NoMoreRows;
        };
        if self.next_row >= result.rows.len() {
            return RowStatus::NoMoreRows;
        }
        if result.fail_after_rows == Some(self.next_row) {
            self.fail(ServerMessage::new(
                8115,
                "Arithmetic overflow error converting expression to data type int.",
                ERROR_SEVERITY,
            ));
            return RowStatus::Fail;
        }
        if self.buffer_full_pending {
            self.buffer_full_pending = false;
            return RowStatus::BufferFull;
        }
        let values = &result.rows[self.next_row];
        self.row = result
            .columns
            .iter()
            .zip(values)
            .map(|(column, value)| column.encode_cell(value))
            .collect();
        self.next_row += 1;
        self.buffer_full_pending = self.shared.script.lock().buffer_full;
        RowStatus::Regular
    }

    fn data(&self, column: usize) -> Option<&[u8]> {
        self.row.get(column).and_then(|d| d.as_deref())
    }

    fn row_count(&self) -> Option<i64> {
        self.row_count
    }

    fn converter(&self) -> &dyn Converter {
        &self.converter
    }

    fn rpc(&mut self, request: &RpcRequest) -> tds_native::Result<()> {
        self.begin();
        self.record(RecordedCommand::Rpc(request.clone()));
        self.reset_results();
        self.returns.clear();
        self.return_status = None;

        let procedure = self
            .shared
            .script
            .lock()
            .procedures
            .get(&request.procedure.to_lowercase())
            .cloned();
        let call = ProcedureCall::new(request);
        let outcome = match procedure {
            Some(procedure) => procedure(&call),
            None if request.procedure.eq_ignore_ascii_case(EXECUTESQL) => {
                self.executesql(&call)
            }
            None => {
                let message = ServerMessage::new(
                    2812,
                    format!("Could not find stored procedure '{}'.", request.procedure),
                    ERROR_SEVERITY,
                );
                let detail = message.to_string();
                self.fail(message);
                return Err(NativeError::call_failed("dbrpcsend", detail));
            }
        };

        for param in request.params.iter().filter(|p| p.output) {
            let bare = param.name.trim_start_matches('@');
            let value = outcome
                .outputs
                .iter()
                .find(|(name, _)| name.trim_start_matches('@').eq_ignore_ascii_case(bare))
                .map(|(_, v)| v);
            let (type_code, data) = match value {
                Some(v) => WireConverter::to_native(v),
                None => (param.type_code, param.data.clone()),
            };
            self.returns.push(ReturnValue {
                name: param.name.clone(),
                type_code,
                data,
            });
        }
        self.return_status = outcome.return_status;
        let response = outcome.response.resolve(&request.procedure);
        self.load(response)
    }

    fn return_count(&self) -> usize {
        self.returns.len()
    }

    fn return_name(&self, index: usize) -> Option<String> {
        self.returns.get(index).map(|r| r.name.clone())
    }

    fn return_type(&self, index: usize) -> TypeCode {
        self.returns.get(index).map_or(TypeCode(0), |r| r.type_code)
    }

    fn return_data(&self, index: usize) -> Option<&[u8]> {
        self.returns.get(index).and_then(|r| r.data.as_deref())
    }

    fn return_status(&self) -> Option<i32> {
        self.return_status
    }

    fn bcp_init(&mut self, table: &str) -> tds_native::Result<()> {
        self.record(RecordedCommand::BulkCopy(table.to_string()));
        if !self.shared.script.lock().tables.contains_key(table) {
            let message = ServerMessage::new(
                4701,
                format!("Cannot find the object \"{table}\" because it does not exist or you do not have permissions."),
                ERROR_SEVERITY,
            );
            let detail = message.to_string();
            self.messages.push(message);
            return Err(NativeError::call_failed("bcp_init", detail));
        }
        self.bulk_table = Some(table.to_string());
        self.bulk_bound = 0;
        self.bulk_pending.clear();
        Ok(())
    }

    fn bcp_bind(&mut self, column: usize, capacity: usize) -> tds_native::Result<()> {
        if self.bulk_table.is_none() {
            return Err(NativeError::call_failed("bcp_bind", "bulk copy not initialized"));
        }
        BcpBinding::for_capacity(capacity)?;
        self.bulk_bound = self.bulk_bound.max(column + 1);
        Ok(())
    }

    fn bcp_send_row(&mut self, fields: &[BcpField<'_>]) -> tds_native::Result<()> {
        if fields.len() != self.bulk_bound {
            return Err(NativeError::call_failed(
                "bcp_sendrow",
                format!("{} fields sent for {} bound columns", fields.len(), self.bulk_bound),
            ));
        }
        let row = fields
            .iter()
            .map(|f| f.value().map(|v| String::from_utf8_lossy(v).into_owned()))
            .collect();
        self.bulk_pending.push(row);
        Ok(())
    }

    fn bcp_batch(&mut self) -> tds_native::Result<i64> {
        let Some(table) = self.bulk_table.clone() else {
            return Err(NativeError::call_failed("bcp_batch", "bulk copy not initialized"));
        };
        let rows = std::mem::take(&mut self.bulk_pending);
        let count = rows.len();
        if let Some(stored) = self.shared.script.lock().tables.get_mut(&table) {
            stored.extend(rows);
        }
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    fn bcp_done(&mut self) -> tds_native::Result<i64> {
        if self.shared.script.lock().bulk_done_failure {
            self.bulk_table = None;
            self.bulk_pending.clear();
            return Err(NativeError::call_failed("bcp_done", "bulk copy finished with -1"));
        }
        let committed = self.bcp_batch()?;
        self.bulk_table = None;
        Ok(committed)
    }

    fn drain_messages(&mut self) -> Vec<ServerMessage> {
        std::mem::take(&mut self.messages)
    }
}

impl MockConnection {
    fn column(&self, column: usize) -> Option<&MockColumn> {
        self.current.as_ref().and_then(|r| r.columns.get(column))
    }

    /// Answer `sp_executesql` from the batch script using the statement
    /// text, echoing every output parameter's input value.
    fn executesql(&self, call: &ProcedureCall<'_>) -> ProcedureOutcome {
        let stmt = call.param("@stmt");
        let sql = stmt.as_str().unwrap_or_default();
        let response = {
            let script = self.shared.script.lock();
            script
                .responses
                .get(sql)
                .or(script.default_response.as_ref())
                .map(|r| r.resolve(sql))
        };
        ProcedureOutcome::new()
            .with_response(response.unwrap_or_else(|| {
                MockResponse::error(2812, format!("No scripted response for '{sql}'."))
            }))
    }
}
