//! Pool behaviour against the in-memory native library.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use mssql_client::Config;
use mssql_driver_pool::{Pool, PoolConfig, PoolError, PoolStatus};
use mssql_testing::{MockLibrary, MockResponse};
use tokio_test::{assert_err, assert_ok};

async fn pool(library: &MockLibrary, config: PoolConfig) -> Pool {
    Pool::new(Config::new().host("mock"), config, Arc::new(library.clone()))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_min_connections_opened_up_front() {
    let library = MockLibrary::builder().build();
    let pool = pool(&library, PoolConfig::new().min_connections(3).max_connections(5)).await;

    assert_eq!(library.live_connections(), 3);
    assert_eq!(
        pool.status(),
        PoolStatus {
            available: 3,
            in_use: 0,
            total: 3,
            max: 5
        }
    );
}

#[tokio::test]
async fn test_idle_connection_is_reused() {
    let library = MockLibrary::builder().build();
    let pool = pool(&library, PoolConfig::new().min_connections(0).test_on_checkout(false)).await;

    let first = assert_ok!(pool.get().await);
    let id = first.id();
    assert_ok!(first.execute("SELECT 1").await);
    drop(first);

    let second = pool.get().await.unwrap();
    assert_eq!(second.id(), id);
    assert_eq!(second.checkout_count(), 2);
    assert_eq!(library.logins().len(), 1);
}

#[tokio::test]
async fn test_status_tracks_checkouts() {
    let library = MockLibrary::builder().build();
    let pool = pool(&library, PoolConfig::new().min_connections(1).max_connections(4)).await;

    let a = pool.get().await.unwrap();
    let b = pool.get().await.unwrap();
    let status = pool.status();
    assert_eq!(status.in_use, 2);
    assert_eq!(status.available, 0);
    assert_eq!(status.total, 2);

    drop(a);
    drop(b);
    assert_eq!(pool.status().available, 2);
    assert_eq!(pool.status().in_use, 0);
}

#[tokio::test]
async fn test_acquisition_times_out_at_capacity() {
    let library = MockLibrary::builder().build();
    let config = PoolConfig::new()
        .min_connections(0)
        .max_connections(1)
        .connection_timeout(Duration::from_millis(50));
    let pool = pool(&library, config).await;

    let _held = assert_ok!(pool.get().await);
    let err = assert_err!(pool.get().await);

    assert!(matches!(err, PoolError::AcquisitionTimeout(t) if t == Duration::from_millis(50)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_waiter_receives_returned_connection() {
    let library = MockLibrary::builder().build();
    let config = PoolConfig::new()
        .min_connections(0)
        .max_connections(1)
        .connection_timeout(Duration::from_secs(5));
    let pool = pool(&library, config).await;

    let held = pool.get().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.get().await.map(|c| c.id()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let id = held.id();
    drop(held);

    assert_eq!(waiter.await.unwrap().unwrap(), id);
    assert_eq!(library.logins().len(), 1);
}

#[tokio::test]
async fn test_checkout_runs_health_check() {
    let library = MockLibrary::builder().build();
    let pool = pool(&library, PoolConfig::new().min_connections(1)).await;

    let conn = pool.get().await.unwrap();

    assert!(conn.is_connected());
    assert_eq!(library.batches(), ["SELECT 1"]);
}

#[tokio::test]
async fn test_unhealthy_connection_is_replaced() {
    let library = MockLibrary::builder()
        .with_response("SELECT 1", MockResponse::error(10054, "connection reset by peer"))
        .build();
    let pool = pool(&library, PoolConfig::new().min_connections(1)).await;

    let conn = pool.get().await.unwrap();

    assert_eq!(conn.id(), 2);
    assert_eq!(library.logins().len(), 2);
    assert_eq!(pool.status().total, 1);
}

#[tokio::test]
async fn test_idle_timeout_evicts_connection() {
    let library = MockLibrary::builder().build();
    let config = PoolConfig::new()
        .min_connections(1)
        .idle_timeout(Duration::from_millis(10))
        .test_on_checkout(false);
    let pool = pool(&library, config).await;

    tokio::time::sleep(Duration::from_millis(30)).await;
    let conn = pool.get().await.unwrap();

    assert_eq!(conn.id(), 2);
    assert_eq!(library.logins().len(), 2);
}

#[tokio::test]
async fn test_close_rejects_new_checkouts() {
    let library = MockLibrary::builder().build();
    let pool = pool(&library, PoolConfig::new().min_connections(2)).await;

    pool.close().await;

    assert!(pool.is_closed());
    assert!(matches!(pool.get().await, Err(PoolError::PoolClosed)));
    assert_eq!(pool.status().total, 0);
    assert_eq!(library.live_connections(), 0);
}

#[tokio::test]
async fn test_connection_returned_after_close_is_dropped() {
    let library = MockLibrary::builder().build();
    let pool = pool(&library, PoolConfig::new().min_connections(0)).await;
    let conn = pool.get().await.unwrap();

    pool.close().await;
    drop(conn);

    assert_eq!(pool.status().total, 0);
    assert_eq!(pool.status().available, 0);
}

#[tokio::test]
async fn test_detach_frees_slot() {
    let library = MockLibrary::builder().build();
    let config = PoolConfig::new()
        .min_connections(0)
        .max_connections(1)
        .connection_timeout(Duration::from_millis(50));
    let pool = pool(&library, config).await;

    let client = pool.get().await.unwrap().detach().unwrap();
    assert!(client.is_connected());
    assert_eq!(pool.status().total, 0);

    let conn = pool.get().await.unwrap();
    assert_ne!(conn.id(), 1);
}

#[tokio::test]
async fn test_creation_failure_is_reported() {
    let library = MockLibrary::builder()
        .with_login_failure("Login failed for user 'sa'.")
        .build();

    let err = Pool::new(
        Config::new().host("mock"),
        PoolConfig::new().min_connections(1),
        Arc::new(library),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PoolError::ConnectionCreation(ref d) if d.contains("Login failed")));
}

#[tokio::test]
async fn test_invalid_configuration_rejected() {
    let library = MockLibrary::builder().build();

    let err = Pool::new(
        Config::new().host("mock"),
        PoolConfig::new().min_connections(5).max_connections(2),
        Arc::new(library.clone()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PoolError::Configuration(_)));

    let err = Pool::new(Config::new().host(""), PoolConfig::new(), Arc::new(library.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Client(mssql_client::Error::Configuration(_))));
    assert!(library.logins().is_empty());
}

#[tokio::test]
async fn test_builder_requires_client_config() {
    let err = Pool::builder()
        .library(Arc::new(MockLibrary::builder().build()))
        .build()
        .await
        .unwrap_err();

    assert!(matches!(err, PoolError::Configuration(ref d) if d.contains("client_config")));
}

#[tokio::test]
async fn test_builder_builds_pool() {
    let library = MockLibrary::builder().build();
    let pool = Pool::builder()
        .client_config(Config::new().host("mock"))
        .library(Arc::new(library.clone()))
        .min_connections(2)
        .max_connections(3)
        .build()
        .await
        .unwrap();

    assert_eq!(pool.config().max_connections, 3);
    assert_eq!(pool.status().available, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_callers_use_separate_connections() {
    let library = MockLibrary::builder()
        .with_delay(Duration::from_millis(5))
        .build();
    let pool = pool(&library, PoolConfig::new().min_connections(0).max_connections(4)).await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let conn = pool.get().await?;
                conn.execute(&format!("SELECT {i}")).await?;
                Ok::<_, PoolError>(())
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert!(pool.status().total <= 4);
    assert_eq!(library.reentrancy_violations(), 0);
}
