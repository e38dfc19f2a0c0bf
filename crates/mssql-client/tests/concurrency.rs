//! Serialized execution under concurrent callers.
//!
//! The mock flags any native call that starts while another one on the same
//! connection is still in flight, and holds every command for a while so
//! overlapping callers would be caught.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use mssql_client::{Client, Config, Error, Parameter};
use mssql_testing::{MockLibrary, MockResponse, ProcedureOutcome};

fn slow_library() -> MockLibrary {
    MockLibrary::builder()
        .with_delay(Duration::from_millis(5))
        .with_default_response(MockResponse::custom(|sql| {
            let n: i32 = sql.trim_start_matches("SELECT ").parse().unwrap_or(-1);
            MockResponse::scalar_int(n)
        }))
        .with_table("t")
        .with_procedure("dbo.echo", |call| {
            ProcedureOutcome::new().status(call.param("n").as_i32().unwrap_or_default())
        })
        .build()
}

async fn connected(library: &MockLibrary) -> Arc<Client> {
    let client = Client::new(Config::new().host("mock"), Arc::new(library.clone())).unwrap();
    client.connect().await.unwrap();
    Arc::new(client)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executes_never_overlap() {
    let library = slow_library();
    let client = connected(&library).await;

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.execute(&format!("SELECT {i}")).await })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.scalar().and_then(|v| v.as_i32()), Some(i32::try_from(i).unwrap()));
    }
    assert_eq!(library.reentrancy_violations(), 0);
    assert_eq!(library.batches().len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_operations_complete_in_issue_order() {
    let library = slow_library();
    let client = connected(&library).await;

    // join_all polls in order, so the jobs are queued in order.
    let futures = (0..20).map(|i| {
        let client = &client;
        async move { client.execute(&format!("SELECT {i}")).await }
    });
    let results = join_all(futures).await;

    assert!(results.iter().all(Result::is_ok));
    let expected: Vec<String> = (0..20).map(|i| format!("SELECT {i}")).collect();
    assert_eq!(library.batches(), expected);
    assert_eq!(library.reentrancy_violations(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_operations_never_overlap() {
    let library = slow_library();
    let client = connected(&library).await;

    let mut tasks = Vec::new();
    for i in 0..10 {
        let c = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            c.execute(&format!("SELECT {i}")).await.map(|_| ())
        }));
        let c = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            c.call_procedure("dbo.echo", vec![Parameter::input("n", i)])
                .await
                .map(|r| assert_eq!(r.return_status, Some(i)))
        }));
        let c = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            c.bulk_insert("t", mssql_testing::fixtures::generated_rows(5))
                .await
                .map(|_| ())
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(library.reentrancy_violations(), 0);
    assert_eq!(library.table_rows("t").unwrap().len(), 50);
}

#[tokio::test]
async fn test_failure_is_reported_to_its_caller_only() {
    let library = MockLibrary::builder()
        .with_response("SELECT bad", MockResponse::error(207, "Invalid column name 'bad'."))
        .build();
    let client = connected(&library).await;

    let (first, bad, last) = tokio::join!(
        client.execute("SELECT 1"),
        client.execute("SELECT bad"),
        client.execute("SELECT 2"),
    );

    assert!(first.is_ok());
    assert!(matches!(bad, Err(Error::Execution(_))));
    assert!(last.is_ok());
}
