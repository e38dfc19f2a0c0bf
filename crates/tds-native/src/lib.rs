//! # tds-native
//!
//! The native client-library surface the SQL Server driver is written
//! against.
//!
//! The driver does not speak TDS itself. Socket I/O, the login handshake and
//! TLS are delegated to a blocking, procedural C library in the db-lib
//! family (FreeTDS `libsybdb`). This crate describes that library as a small
//! set of traits so the layers above can be written (and tested) without
//! linking it:
//!
//! - [`NativeLibrary`] - process-wide init and login allocation
//! - [`LoginHandle`] - login record configuration and connection open
//! - [`ConnectionHandle`] - commands, result iteration, RPC, bulk copy
//! - [`Converter`] - the library's own date and decimal conversion routines
//!
//! ## Features
//!
//! - `freetds`: link `libsybdb` and enable [`freetds::FreeTds`]. Set
//!   `SYBDB_LIB_DIR` when the library lives outside the default search path.
//!
//! ## Threading
//!
//! Handles are not reentrant and are deliberately not `Send`. The client
//! creates, uses and drops them on a single dedicated thread per
//! connection.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod bulk;
pub mod convert;
pub mod error;
pub mod library;
pub mod login;
pub mod message;
pub mod rpc;
pub mod types;

#[cfg(feature = "freetds")]
pub mod freetds;

pub use bootstrap::Bootstrap;
pub use bulk::{BcpBinding, BcpField};
pub use convert::{ConvertError, Converter, DateRecord, GuidLayout};
pub use error::{NativeError, Result};
pub use library::{ConnectionHandle, LoginHandle, NativeLibrary, ResultsStatus, RowStatus};
pub use login::{EncryptionMode, LoginOption, SessionOption};
pub use message::{OpenCapture, ServerMessage};
pub use rpc::{OUTPUT_BUFFER_CAPACITY, RpcParam, RpcRequest};
pub use types::{TypeCode, TypeFamily};
