//! Connection lifecycle management.
//!
//! Health checks and bookkeeping for connections while they live in the
//! pool.

use std::time::{Duration, Instant};

use mssql_client::Client;

use crate::error::PoolError;

/// Operations the pool needs from a pooled connection.
#[allow(async_fn_in_trait)]
pub trait ConnectionLifecycle: Send + Sync {
    /// Run `query` and report how long the round trip took.
    async fn health_check(&self, query: &str) -> Result<Duration, PoolError>;

    /// Cheap check that does not touch the server.
    fn is_valid(&self) -> bool;
}

impl ConnectionLifecycle for Client {
    async fn health_check(&self, query: &str) -> Result<Duration, PoolError> {
        let started = Instant::now();
        self.execute(query).await?;
        Ok(started.elapsed())
    }

    fn is_valid(&self) -> bool {
        self.is_connected()
    }
}

/// Metadata about a pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Unique identifier for this connection.
    pub id: u64,
    /// When the connection was created.
    pub created_at: Instant,
    /// When the connection was last checked out or returned.
    pub last_used_at: Instant,
    /// Number of times the connection has been checked out.
    pub checkout_count: u64,
}

impl ConnectionMetadata {
    /// Create metadata for a new connection.
    pub fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used_at: now,
            checkout_count: 0,
        }
    }

    /// Check if the connection has been idle too long.
    #[must_use]
    pub fn is_idle_expired(&self, idle_timeout: Duration) -> bool {
        self.last_used_at.elapsed() > idle_timeout
    }

    /// Mark the connection as checked out.
    pub fn mark_checkout(&mut self) {
        self.last_used_at = Instant::now();
        self.checkout_count += 1;
    }

    /// Mark the connection as returned to idle.
    pub fn mark_checkin(&mut self) {
        self.last_used_at = Instant::now();
    }
}
