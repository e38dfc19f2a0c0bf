//! # mssql-driver-pool
//!
//! Connection pool for the SQL Server client.
//!
//! A single [`mssql_client::Client`] serializes every operation on its
//! connection. The pool hands out independent clients so concurrent callers
//! get real parallelism across connections.
//!
//! ## Features
//!
//! - Bounded number of checked-out connections with an acquisition timeout
//! - Idle reuse with a health check query on checkout
//! - Idle timeout eviction
//! - Pool status and orderly shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use mssql_driver_pool::{Pool, PoolConfig};
//!
//! let pool = Pool::builder()
//!     .client_config(Config::from_connection_string(conn_str)?)
//!     .min_connections(2)
//!     .max_connections(20)
//!     .idle_timeout(Duration::from_secs(300))
//!     .build()
//!     .await?;
//!
//! let conn = pool.get().await?;
//! let result = conn.execute("SELECT 1").await?;
//! // The connection goes back to the pool on drop.
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use lifecycle::{ConnectionLifecycle, ConnectionMetadata};
pub use pool::{Pool, PoolBuilder, PoolStatus, PooledConnection};
