//! Connection and result-reading states.
//!
//! ## Connection
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected
//!                      |
//!                      +-> Disconnected (connect failed)
//! ```
//!
//! ## Result reading (per command)
//!
//! ```text
//! Idle -> AwaitingResult -> (HasColumns -> ReadingRows)* -> Idle
//! ```

use std::fmt;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No native connection is open.
    #[default]
    Disconnected,
    /// Login is in progress.
    Connecting,
    /// A native connection is open.
    Connected,
}

impl ConnectionState {
    /// Check if commands may be issued.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Where the result assembler is within one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssemblerState {
    /// No command is being read.
    #[default]
    Idle,
    /// Waiting for the next result of the batch.
    AwaitingResult,
    /// A result with columns is available.
    HasColumns,
    /// Rows of the current result are being read.
    ReadingRows,
}

impl AssemblerState {
    /// Check if the assembler is in the middle of a command.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}
