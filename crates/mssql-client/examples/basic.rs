//! Connect, query, call a procedure and bulk load over FreeTDS.
//!
//! # Running
//!
//! ```bash
//! export MSSQL_HOST=localhost
//! export MSSQL_DATABASE=tempdb
//! export MSSQL_USER=sa
//! export MSSQL_PASSWORD=YourStrong@Passw0rd
//!
//! RUST_LOG=mssql_client=debug cargo run -p mssql-client --features freetds --example basic
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mssql_client::{CellValue, Client, Config, Error, Parameter};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = std::env::var("MSSQL_HOST").unwrap_or_else(|_| "localhost".into());
    let database = std::env::var("MSSQL_DATABASE").unwrap_or_else(|_| "tempdb".into());
    let user = std::env::var("MSSQL_USER").unwrap_or_else(|_| "sa".into());
    let password = std::env::var("MSSQL_PASSWORD").unwrap_or_else(|_| "Password123!".into());

    let config = Config::from_connection_string(&format!(
        "Server={host};Database={database};User Id={user};Password={password};Application Name=basic-example"
    ))?;

    println!("Connecting to {}...", config.native_server());
    let client = Client::freetds(config)?;
    client.connect().await?;

    // PRINT output and other informational messages arrive here.
    let mut messages = client.messages();
    tokio::spawn(async move {
        while let Ok(message) = messages.recv().await {
            println!("server: {message}");
        }
    });

    let result = client.execute("SELECT @@VERSION AS version").await?;
    if let Some(version) = result.scalar() {
        println!("SQL Server version: {version}");
    }

    let result = client
        .query("SELECT @p1 AS name, @p2 * 2 AS doubled", &[&"test", &21i32])
        .await?;
    for row in result.rows() {
        let name: String = row.get_by_name("name")?;
        let doubled: i32 = row.get_by_name("doubled")?;
        println!("{name}: {doubled}");
    }

    client
        .execute(
            "IF OBJECT_ID('tempdb..#triple') IS NOT NULL DROP PROCEDURE #triple; \
             EXEC('CREATE PROCEDURE #triple @x INT, @result INT OUTPUT AS \
                   BEGIN PRINT ''tripling''; SET @result = @x * 3; RETURN 0 END')",
        )
        .await?;
    let result = client
        .call_procedure(
            "#triple",
            vec![Parameter::input("x", 14i32), Parameter::output("result", 0i32)],
        )
        .await?;
    println!(
        "#triple returned {:?} with status {:?}",
        result.output("result"),
        result.return_status
    );

    client
        .execute("CREATE TABLE #people (id INT, name NVARCHAR(50))")
        .await?;
    let rows = (1..=100)
        .map(|i| vec![CellValue::Int32(i), CellValue::from(format!("person {i}"))])
        .collect();
    let inserted = client.bulk_insert("#people", rows).await?;
    println!("Bulk inserted {inserted} rows");

    client.disconnect().await?;
    println!("Disconnected");
    Ok(())
}
