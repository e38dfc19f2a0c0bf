//! Live SQL Server tests over FreeTDS.
//!
//! These tests require FreeTDS and a running SQL Server instance. They are
//! ignored by default and can be run with:
//!
//! ```bash
//! export MSSQL_HOST=localhost
//! export MSSQL_USER=sa
//! export MSSQL_PASSWORD=YourPassword
//!
//! cargo test -p mssql-client --features freetds --test live -- --ignored
//! ```
//!
//! For CI/CD, use Docker:
//! ```bash
//! docker run -e 'ACCEPT_EULA=Y' -e 'SA_PASSWORD=YourStrong@Passw0rd' \
//!     -p 1433:1433 mcr.microsoft.com/mssql/server:2022-latest
//! ```

#![cfg(feature = "freetds")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use mssql_client::{CellValue, Client, Config, Error, Parameter};
use mssql_testing::fixtures::{LiveServer, generated_rows};

async fn connect() -> Option<Client> {
    let server = LiveServer::from_env()?;
    let config = Config::from_connection_string(&server.connection_string()).ok()?;
    let client = Client::freetds(config).ok()?;
    client.connect().await.ok()?;
    Some(client)
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_basic_select() {
    let Some(client) = connect().await else {
        return;
    };

    let result = client.execute("SELECT 1 AS one, N'héllo' AS greeting").await.unwrap();

    let row = &result.rows()[0];
    assert_eq!(row.get_by_name::<i32>("one").unwrap(), 1);
    assert_eq!(row.get_by_name::<String>("greeting").unwrap(), "héllo");
    client.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_multiple_result_sets_and_counts() {
    let Some(client) = connect().await else {
        return;
    };

    let result = client
        .execute(
            "CREATE TABLE #t (id INT); \
             INSERT INTO #t VALUES (1), (2), (3); \
             SELECT id FROM #t ORDER BY id; \
             SELECT COUNT(*) FROM #t",
        )
        .await
        .unwrap();

    let selects: Vec<_> = result.tables.iter().filter(|t| !t.rows.is_empty()).collect();
    assert_eq!(selects.len(), 2);
    assert_eq!(selects[0].rows.len(), 3);
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_parameterized_query() {
    let Some(client) = connect().await else {
        return;
    };

    let result = client
        .query("SELECT @p1 + 1 AS n, @p2 AS s", &[&41i32, &"text"])
        .await
        .unwrap();

    assert_eq!(result.rows()[0].get::<i32>(0).unwrap(), 42);
    assert_eq!(result.rows()[0].get::<String>(1).unwrap(), "text");
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_procedure_output_and_status() {
    let Some(client) = connect().await else {
        return;
    };
    client
        .execute(
            "IF OBJECT_ID('tempdb..#triple') IS NOT NULL DROP PROCEDURE #triple; \
             EXEC('CREATE PROCEDURE #triple @x INT, @result INT OUTPUT AS \
                   BEGIN SET @result = @x * 3; RETURN @x END')",
        )
        .await
        .unwrap();

    let result = client
        .call_procedure(
            "#triple",
            vec![Parameter::input("x", 5i32), Parameter::output("result", 0i32)],
        )
        .await
        .unwrap();

    assert_eq!(result.output("result"), Some(&CellValue::Int32(15)));
    assert_eq!(result.return_status, Some(5));
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_bulk_insert_round_trip() {
    let Some(client) = connect().await else {
        return;
    };
    client
        .execute(
            "IF OBJECT_ID('dbo.bulk_target') IS NOT NULL DROP TABLE dbo.bulk_target; \
             CREATE TABLE dbo.bulk_target (id INT, name VARCHAR(20))",
        )
        .await
        .unwrap();

    let inserted = client.bulk_insert("dbo.bulk_target", generated_rows(1000)).await.unwrap();

    assert_eq!(inserted, 1000);
    let result = client
        .execute("SELECT COUNT(*), MAX(name) FROM dbo.bulk_target")
        .await
        .unwrap();
    assert_eq!(result.rows()[0].get::<i32>(0).unwrap(), 1000);
    assert_eq!(result.rows()[0].get::<String>(1).unwrap(), "row-0999");
    client.execute("DROP TABLE dbo.bulk_target").await.unwrap();
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_invalid_object_is_execution_error() {
    let Some(client) = connect().await else {
        return;
    };

    let err = client.execute("SELECT * FROM dbo.no_such_table").await.unwrap_err();

    assert!(matches!(err, Error::Execution(ref d) if d.contains("no_such_table")));
    assert!(client.execute("SELECT 1").await.is_ok());
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn test_print_is_broadcast() {
    let Some(client) = connect().await else {
        return;
    };
    let mut messages = client.messages();

    client.execute("PRINT 'from the server'").await.unwrap();

    let message = messages.recv().await.unwrap();
    assert_eq!(message.message, "from the server");
}
