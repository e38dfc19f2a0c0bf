//! Share a pool of FreeTDS connections between tasks.
//!
//! # Running
//!
//! ```bash
//! export MSSQL_HOST=localhost
//! export MSSQL_USER=sa
//! export MSSQL_PASSWORD=YourStrong@Passw0rd
//!
//! cargo run -p mssql-driver-pool --features freetds --example connection_pool
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use mssql_client::Config;
use mssql_driver_pool::{Pool, PoolError};

#[tokio::main]
async fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt::init();

    let host = std::env::var("MSSQL_HOST").unwrap_or_else(|_| "localhost".into());
    let user = std::env::var("MSSQL_USER").unwrap_or_else(|_| "sa".into());
    let password = std::env::var("MSSQL_PASSWORD").unwrap_or_else(|_| "Password123!".into());
    let config = Config::from_connection_string(&format!(
        "Server={host};User Id={user};Password={password}"
    ))?;

    let pool = Pool::builder()
        .client_config(config)
        .min_connections(2)
        .max_connections(4)
        .connection_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .build()
        .await?;
    println!("Pool ready: {:?}", pool.status());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let conn = pool.get().await?;
                let result = conn
                    .execute(&format!("WAITFOR DELAY '00:00:00.200'; SELECT {i} * {i}"))
                    .await?;
                let square = result.scalar().and_then(|v| v.as_i32());
                println!("task {i} on connection {}: {square:?}", conn.id());
                Ok::<_, PoolError>(())
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("task panicked")?;
    }

    println!("Pool after work: {:?}", pool.status());
    pool.close().await;
    Ok(())
}
