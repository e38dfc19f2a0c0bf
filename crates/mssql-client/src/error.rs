//! Client error types.

use tds_native::NativeError;
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration or request (no command text, parameter
    /// count mismatch, malformed connection string).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `connect` called on a connected client.
    #[error("already connected")]
    AlreadyConnected,

    /// Operation attempted without a connection.
    #[error("not connected")]
    NotConnected,

    /// The native library could not allocate a handle or record.
    #[error("resource error: {detail}")]
    Resource {
        /// What could not be allocated.
        detail: String,
        /// Whether the connection survived; false during connect.
        connected: bool,
    },

    /// The server could not be reached or rejected the login.
    #[error("cannot connect to {server}: {detail}")]
    Connectivity {
        /// Target server.
        server: String,
        /// Most recent native message.
        detail: String,
    },

    /// Switching to the requested database failed.
    #[error("cannot use database {database}: {detail}")]
    DatabaseSelection {
        /// Requested database.
        database: String,
        /// Most recent native message.
        detail: String,
    },

    /// A command failed on the server.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Type conversion error.
    #[error("type error: {0}")]
    Type(#[from] mssql_types::TypeError),

    /// No column with the given name.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// The connection's execution context has shut down.
    #[error("connection executor closed")]
    ExecutorClosed,

    /// A job panicked inside the execution context.
    #[error("connection job panicked: {0}")]
    Panicked(String),
}

impl Error {
    /// Check if this error is a connection-state misuse.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::AlreadyConnected | Self::NotConnected)
    }

    /// Check if the connection is still usable after this error.
    ///
    /// Failures during connect leave the client disconnected; everything
    /// else, including an allocation failure mid-command, leaves the
    /// connection as it was.
    #[must_use]
    pub fn is_connection_intact(&self) -> bool {
        !matches!(
            self,
            Self::Connectivity { .. }
                | Self::DatabaseSelection { .. }
                | Self::Resource {
                    connected: false,
                    ..
                }
                | Self::ExecutorClosed
        )
    }

    /// An allocation failure while connecting.
    pub(crate) fn connect_resource(detail: impl Into<String>) -> Self {
        Self::Resource {
            detail: detail.into(),
            connected: false,
        }
    }

    /// Map a native failure raised while executing a command.
    pub(crate) fn execution(err: NativeError) -> Self {
        match err {
            NativeError::CallFailed { detail, .. } => Self::Execution(detail),
            NativeError::AllocationFailed(what) => Self::Resource {
                detail: what.to_string(),
                connected: true,
            },
            other => Self::Execution(other.to_string()),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
