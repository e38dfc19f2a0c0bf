//! Connection pool implementation.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use mssql_client::{Client, Config, NativeLibrary};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::{ConnectionLifecycle, ConnectionMetadata};

/// A connection pool for SQL Server.
///
/// Every connection is an independent [`Client`] with its own serialized
/// executor, so callers holding different pooled connections run in
/// parallel. Cloning the pool is cheap and shares the same connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    client_config: Config,
    config: PoolConfig,
    library: Arc<dyn NativeLibrary>,
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<IdleConnection>>,
    total: AtomicU32,
    next_id: AtomicU64,
    closed: AtomicBool,
}

struct IdleConnection {
    client: Client,
    meta: ConnectionMetadata,
}

impl Pool {
    /// Create a builder for a pool.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::default()
    }

    /// Create a pool and open `min_connections` connections up front.
    pub async fn new(
        client_config: Config,
        config: PoolConfig,
        library: Arc<dyn NativeLibrary>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        client_config.validate()?;

        let pool = Self {
            inner: Arc::new(PoolInner {
                slots: Arc::new(Semaphore::new(config.max_connections as usize)),
                client_config,
                config,
                library,
                idle: Mutex::new(Vec::new()),
                total: AtomicU32::new(0),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        };

        for _ in 0..pool.inner.config.min_connections {
            let connection = pool.inner.open().await?;
            pool.inner.idle.lock().push(connection);
        }

        tracing::info!(
            server = %pool.inner.client_config.native_server(),
            min = pool.inner.config.min_connections,
            max = pool.inner.config.max_connections,
            "connection pool created"
        );
        Ok(pool)
    }

    /// Get a connection from the pool.
    ///
    /// Returns an idle connection when one is available, otherwise opens a
    /// new one. When `max_connections` are already checked out this waits
    /// up to `connection_timeout` for one to be returned.
    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!("acquiring connection from pool");
        let timeout = self.inner.config.connection_timeout;
        let permit = match tokio::time::timeout(timeout, Arc::clone(&self.inner.slots).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::PoolClosed),
            Err(_) => {
                tracing::warn!(?timeout, "timed out waiting for a pooled connection");
                return Err(PoolError::AcquisitionTimeout(timeout));
            }
        };

        let mut connection = match self.inner.take_idle().await {
            Some(connection) => connection,
            None => self.inner.open().await?,
        };
        connection.meta.mark_checkout();

        Ok(PooledConnection {
            connection: Some(connection),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let total = self.inner.total.load(Ordering::Acquire);
        let available = u32::try_from(self.inner.idle.lock().len()).unwrap_or(u32::MAX);
        PoolStatus {
            available,
            in_use: total.saturating_sub(available),
            total,
            max: self.inner.config.max_connections,
        }
    }

    /// Close the pool and disconnect every idle connection.
    ///
    /// Connections still checked out are closed when they are returned.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.slots.close();

        let idle = std::mem::take(&mut *self.inner.idle.lock());
        for connection in idle {
            self.inner.discard(connection, "pool closed").await;
        }
        tracing::info!("connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("server", &self.inner.client_config.native_server())
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PoolInner {
    async fn open(&self) -> Result<IdleConnection, PoolError> {
        let client = Client::new(self.client_config.clone(), Arc::clone(&self.library))?;
        client
            .connect()
            .await
            .map_err(|e| PoolError::ConnectionCreation(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let total = self.total.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(id, total, "opened pooled connection");
        Ok(IdleConnection {
            client,
            meta: ConnectionMetadata::new(id),
        })
    }

    /// Pop idle connections until one passes the idle timeout and the
    /// health check.
    async fn take_idle(&self) -> Option<IdleConnection> {
        loop {
            let connection = self.idle.lock().pop()?;

            if !connection.client.is_valid() {
                self.discard(connection, "connection closed").await;
                continue;
            }
            if connection.meta.is_idle_expired(self.config.idle_timeout) {
                self.discard(connection, "idle timeout").await;
                continue;
            }
            if self.config.test_on_checkout {
                match connection.client.health_check(&self.config.health_check_query).await {
                    Ok(latency) => {
                        tracing::trace!(id = connection.meta.id, ?latency, "health check passed");
                    }
                    Err(e) => {
                        tracing::warn!(id = connection.meta.id, error = %e, "health check failed");
                        self.discard(connection, "health check failed").await;
                        continue;
                    }
                }
            }
            return Some(connection);
        }
    }

    async fn discard(&self, connection: IdleConnection, reason: &str) {
        self.total.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(id = connection.meta.id, reason, "closing pooled connection");
        if let Err(e) = connection.client.disconnect().await {
            tracing::debug!(id = connection.meta.id, error = %e, "disconnect failed");
        }
    }

    /// Return a connection after use. Runs inside `Drop`, so it cannot
    /// await; a closed client is dropped and its executor releases the
    /// handles.
    fn check_in(&self, mut connection: IdleConnection) {
        if self.closed.load(Ordering::Acquire) || !connection.client.is_valid() {
            self.total.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(id = connection.meta.id, "dropping returned connection");
            return;
        }
        connection.meta.mark_checkin();
        tracing::trace!(id = connection.meta.id, "returning connection to pool");
        self.idle.lock().push(connection);
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of open connections.
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

/// A connection retrieved from the pool.
///
/// Dereferences to [`Client`]. When dropped, the connection goes back to
/// the pool's idle list.
pub struct PooledConnection {
    connection: Option<IdleConnection>,
    pool: Arc<PoolInner>,
    // Released after `drop` has pushed the connection back.
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Identifier of the underlying connection, stable across checkouts.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.connection.as_ref().map_or(0, |c| c.meta.id)
    }

    /// Number of times the underlying connection has been checked out.
    #[must_use]
    pub fn checkout_count(&self) -> u64 {
        self.connection.as_ref().map_or(0, |c| c.meta.checkout_count)
    }

    /// Detach the connection from the pool.
    ///
    /// The caller owns the returned client and the pool frees its slot.
    pub fn detach(mut self) -> Option<Client> {
        let connection = self.connection.take()?;
        self.pool.total.fetch_sub(1, Ordering::AcqRel);
        Some(connection.client)
    }
}

impl Deref for PooledConnection {
    type Target = Client;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Client {
        // Only `detach` and `drop` take the connection, and both consume it.
        &self
            .connection
            .as_ref()
            .expect("pooled connection is present until dropped")
            .client
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id())
            .field("checkout_count", &self.checkout_count())
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.check_in(connection);
        }
    }
}

/// Builder for [`Pool`].
#[derive(Default)]
pub struct PoolBuilder {
    client_config: Option<Config>,
    config: PoolConfig,
    library: Option<Arc<dyn NativeLibrary>>,
}

impl PoolBuilder {
    /// Configuration used for every connection the pool opens.
    #[must_use]
    pub fn client_config(mut self, config: Config) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Replace the whole pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Native library the connections run on.
    #[must_use]
    pub fn library(mut self, library: Arc<dyn NativeLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.config = self.config.min_connections(count);
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.config = self.config.max_connections(count);
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.connection_timeout(timeout);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.idle_timeout(timeout);
        self
    }

    /// Enable or disable testing connections on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.config = self.config.test_on_checkout(enabled);
        self
    }

    /// Build the pool.
    ///
    /// Without an explicit [`library`](Self::library) the FreeTDS binding
    /// is used when the `freetds` feature is enabled.
    pub async fn build(self) -> Result<Pool, PoolError> {
        let client_config = self
            .client_config
            .ok_or_else(|| PoolError::Configuration("client_config is required".into()))?;
        let library = match self.library {
            Some(library) => library,
            None => default_library()?,
        };
        Pool::new(client_config, self.config, library).await
    }
}

#[cfg(feature = "freetds")]
fn default_library() -> Result<Arc<dyn NativeLibrary>, PoolError> {
    Ok(Arc::new(tds_native::freetds::FreeTds))
}

#[cfg(not(feature = "freetds"))]
fn default_library() -> Result<Arc<dyn NativeLibrary>, PoolError> {
    Err(PoolError::Configuration(
        "no native library configured and the freetds feature is disabled".into(),
    ))
}
