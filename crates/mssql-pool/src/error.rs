//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// No connection became free within the timeout.
    #[error("connection acquisition timeout after {0:?}")]
    AcquisitionTimeout(Duration),

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Opening a new connection failed.
    #[error("failed to create connection: {0}")]
    ConnectionCreation(String),

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// Error reported by the underlying client.
    #[error(transparent)]
    Client(#[from] mssql_client::Error),
}

impl PoolError {
    /// Whether retrying the acquisition later can succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::AcquisitionTimeout(_) | Self::ConnectionCreation(_))
    }
}
