//! Native layer error types.

use thiserror::Error;

/// Errors reported by the native library surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NativeError {
    /// One-time library initialization failed.
    #[error("native library initialization failed: {0}")]
    InitFailed(String),

    /// The library could not allocate a handle or record.
    #[error("native allocation failed: {0}")]
    AllocationFailed(&'static str),

    /// The server rejected the connection or login.
    #[error("login to {server} rejected: {detail}")]
    LoginRejected {
        /// Target server as passed to the open call.
        server: String,
        /// Most recent native message, if any.
        detail: String,
    },

    /// A native call returned FAIL.
    #[error("{call} failed: {detail}")]
    CallFailed {
        /// Name of the native entry point.
        call: &'static str,
        /// Most recent native message, if any.
        detail: String,
    },

    /// An argument cannot be passed to the native library (for example a
    /// string containing an interior NUL).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not available in this library build.
    #[error("unsupported native operation: {0}")]
    Unsupported(&'static str),
}

impl NativeError {
    /// Build a [`NativeError::CallFailed`] for `call`.
    pub fn call_failed(call: &'static str, detail: impl Into<String>) -> Self {
        Self::CallFailed {
            call,
            detail: detail.into(),
        }
    }
}

/// Result type for native operations.
pub type Result<T> = std::result::Result<T, NativeError>;
