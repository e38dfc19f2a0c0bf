//! SQL Server client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mssql_types::{CellValue, ToSql};
use tds_native::{NativeLibrary, ServerMessage};
use tokio::sync::broadcast;

use crate::bulk::{BulkInsertBuilder, BulkInsertResult};
use crate::config::Config;
use crate::error::Result;
use crate::executor::Executor;
use crate::from_row::FromRow;
use crate::query::Query;
use crate::result::QueryResult;
use crate::rpc::{Parameter, build_request, executesql_request};
use crate::table::TypedTable;
use crate::to_params::ToParams;

/// A connection to SQL Server.
///
/// Every operation is queued on the connection's own executor thread and
/// runs to completion before the next one starts, in the order the calls
/// were made. The client can therefore be shared (`&Client` or
/// `Arc<Client>`) between tasks; concurrent calls simply wait their turn.
///
/// ```rust,ignore
/// use mssql_client::{Client, Config};
///
/// let client = Client::freetds(Config::from_connection_string(
///     "Server=localhost,1433;Database=test;User Id=sa;Password=Password123;",
/// )?)?;
/// client.connect().await?;
///
/// let result = client.query("SELECT name FROM users WHERE id = @p1", &[&1i32]).await?;
/// for row in result.rows() {
///     let name: String = row.get(0)?;
///     println!("User: {name}");
/// }
///
/// client.disconnect().await?;
/// ```
pub struct Client {
    config: Arc<Config>,
    library: Arc<dyn NativeLibrary>,
    executor: Executor,
    connected: Arc<AtomicBool>,
}

impl Client {
    /// Create a disconnected client over `library`.
    ///
    /// Starts the connection's executor thread; no native call is made
    /// until [`connect`](Self::connect).
    pub fn new(config: Config, library: Arc<dyn NativeLibrary>) -> Result<Self> {
        let executor = Executor::spawn(Arc::clone(&library))?;
        Ok(Self {
            config: Arc::new(config),
            library,
            executor,
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Create a client from an ADO.NET-style connection string.
    pub fn from_connection_string(conn_str: &str, library: Arc<dyn NativeLibrary>) -> Result<Self> {
        Self::new(Config::from_connection_string(conn_str)?, library)
    }

    /// Create a client backed by FreeTDS db-lib.
    #[cfg(feature = "freetds")]
    pub fn freetds(config: Config) -> Result<Self> {
        Self::new(config, Arc::new(tds_native::freetds::FreeTds))
    }

    /// Log in and open the connection.
    ///
    /// Fails with [`Error::AlreadyConnected`](crate::Error::AlreadyConnected) if the client is connected.
    /// On any failure the native handles acquired so far are released and
    /// the client stays disconnected.
    pub async fn connect(&self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let connected = Arc::clone(&self.connected);
        self.executor
            .run(move |session| {
                let outcome = session.connect(&config);
                connected.store(session.state.is_connected(), Ordering::Release);
                outcome
            })
            .await
    }

    /// Close the connection. Does nothing if already closed.
    pub async fn disconnect(&self) -> Result<()> {
        let connected = Arc::clone(&self.connected);
        self.executor
            .run(move |session| {
                session.disconnect();
                connected.store(false, Ordering::Release);
                Ok(())
            })
            .await
    }

    /// Whether the last connect succeeded and no disconnect followed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Run a batch of one or more statements.
    ///
    /// Each statement that produces a result contributes one table to the
    /// returned [`QueryResult`], in submission order.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        self.executor.run(move |session| session.execute(&sql)).await
    }

    /// Run a parameterized statement with `@p1..@pN` placeholders.
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<QueryResult> {
        let query = params
            .iter()
            .fold(Query::new(sql), |query, value| query.bind(*value));
        self.execute_query(&query).await
    }

    /// Run a [`Query`] through `sp_executesql`.
    pub async fn execute_query(&self, query: &Query) -> Result<QueryResult> {
        let params = query.parameters()?;
        tracing::debug!(sql = query.sql(), params_count = params.len(), "executing query");
        let request = executesql_request(query.sql(), &params, self.library.guid_layout())?;
        self.executor.run(move |session| session.call(&request)).await
    }

    /// Run a query and map every row of the first result table.
    pub async fn query_as<T: FromRow>(&self, sql: &str) -> Result<Vec<T>> {
        let result = self.execute(sql).await?;
        match result.first_table() {
            Some(table) => table.map(),
            None => Ok(Vec::new()),
        }
    }

    /// Run a query and reify its first result table with typed columns.
    pub async fn query_table(&self, sql: &str) -> Result<Option<TypedTable>> {
        let result = self.execute(sql).await?;
        Ok(result.first_table().map(TypedTable::from_result_table))
    }

    /// Call a stored procedure.
    ///
    /// Output parameters and the return status are available on the
    /// returned result.
    pub async fn call_procedure(&self, name: &str, params: Vec<Parameter>) -> Result<QueryResult> {
        let request = build_request(name, &params, self.library.guid_layout())?;
        self.executor.run(move |session| session.call(&request)).await
    }

    /// Call a stored procedure with named input parameters.
    pub async fn call_named<P: ToParams + ?Sized>(&self, name: &str, params: &P) -> Result<QueryResult> {
        let params = params
            .to_params()?
            .into_iter()
            .map(Parameter::from)
            .collect();
        self.call_procedure(name, params).await
    }

    /// Bulk copy `rows` into `table`, returning the number of rows the
    /// server committed.
    pub async fn bulk_insert(&self, table: &str, rows: Vec<Vec<CellValue>>) -> Result<u64> {
        let result = self.bulk_insert_with(BulkInsertBuilder::new(table), rows).await?;
        Ok(result.rows_committed)
    }

    /// Bulk copy `rows` with explicit options.
    pub async fn bulk_insert_with(
        &self,
        builder: BulkInsertBuilder,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<BulkInsertResult> {
        self.executor
            .run(move |session| session.bulk_insert(&builder, &rows))
            .await
    }

    /// Subscribe to informational server messages (`PRINT`, database
    /// changes, low-severity warnings).
    ///
    /// Only messages sent after subscribing are received.
    pub fn messages(&self) -> broadcast::Receiver<ServerMessage> {
        self.executor.subscribe()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the native library in use.
    #[must_use]
    pub fn library(&self) -> &Arc<dyn NativeLibrary> {
        &self.library
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.config.native_server())
            .field("library", &self.library.name())
            .field("executor", &self.executor.id())
            .field("connected", &self.is_connected())
            .finish()
    }
}
