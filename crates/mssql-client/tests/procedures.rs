//! Stored procedure calls and parameterized queries.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use mssql_client::{
    CellValue, Client, Config, Error, FromRow, NO_ROW_COUNT, ParamList, Parameter, Query, Row,
    RowMapper,
};
use mssql_testing::{
    MockColumn, MockLibrary, MockResponse, ProcedureOutcome, RecordedCommand,
};
use tds_native::{GuidLayout, TypeCode};
use uuid::Uuid;

async fn connected(library: &MockLibrary) -> Client {
    let client = Client::new(Config::new().host("mock"), Arc::new(library.clone())).unwrap();
    client.connect().await.unwrap();
    client
}

fn triple() -> MockLibrary {
    MockLibrary::builder()
        .with_procedure("dbo.triple", |call| {
            let x = call.param("x").as_i32().unwrap_or_default();
            ProcedureOutcome::new()
                .output("result", x * 3)
                .status(x)
        })
        .build()
}

#[tokio::test]
async fn test_output_parameter_and_return_status() {
    let library = triple();
    let client = connected(&library).await;

    let result = client
        .call_procedure(
            "dbo.triple",
            vec![Parameter::input("x", 5i32), Parameter::output("result", 0i32)],
        )
        .await
        .unwrap();

    assert_eq!(result.output("result"), Some(&CellValue::Int32(15)));
    assert_eq!(result.output("@RESULT"), Some(&CellValue::Int32(15)));
    assert_eq!(result.return_status, Some(5));
}

#[tokio::test]
async fn test_missing_status_and_outputs_are_absent() {
    let library = MockLibrary::builder()
        .with_procedure("dbo.noop", |_| ProcedureOutcome::new())
        .build();
    let client = connected(&library).await;

    let result = client.call_procedure("dbo.noop", Vec::new()).await.unwrap();

    assert!(result.output_params.is_empty());
    assert_eq!(result.return_status, None);
}

#[tokio::test]
async fn test_procedure_result_sets() {
    let library = MockLibrary::builder()
        .with_procedure("dbo.list", |_| {
            ProcedureOutcome::new().with_response(MockResponse::rows(
                vec![MockColumn::int("id")],
                vec![vec![CellValue::Int32(1)], vec![CellValue::Int32(2)]],
            ))
        })
        .build();
    let client = connected(&library).await;

    let result = client.call_procedure("dbo.list", Vec::new()).await.unwrap();

    assert_eq!(result.rows().len(), 2);
    assert_eq!(result.tables[0].rows_affected, 2);
    assert_eq!(result.rows_affected, NO_ROW_COUNT);
}

#[tokio::test]
async fn test_unknown_procedure_is_execution_error() {
    let library = MockLibrary::builder().build();
    let client = connected(&library).await;

    let err = client.call_procedure("dbo.missing", Vec::new()).await.unwrap_err();

    assert!(matches!(err, Error::Execution(ref d) if d.contains("Could not find stored procedure")));
}

#[tokio::test]
async fn test_named_parameters() {
    let library = triple();
    let client = connected(&library).await;
    let mut params = ParamList::new();
    params.add("@x", &7i32).unwrap();

    let result = client.call_named("dbo.triple", &params).await.unwrap();

    assert_eq!(result.return_status, Some(7));
}

#[tokio::test]
async fn test_empty_string_parameter_arrives_as_null() {
    let library = MockLibrary::builder()
        .with_procedure("dbo.echo", |call| {
            ProcedureOutcome::new()
                .output("empty_copy", call.param("empty"))
                .output("text_copy", call.param("text"))
        })
        .build();
    let client = connected(&library).await;

    let result = client
        .call_procedure(
            "dbo.echo",
            vec![
                Parameter::input("empty", ""),
                Parameter::input("text", "abc"),
                Parameter::output("empty_copy", "-"),
                Parameter::output("text_copy", "-"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(result.output("empty_copy"), Some(&CellValue::Null));
    assert_eq!(result.output("text_copy"), Some(&CellValue::from("abc")));
}

#[tokio::test]
async fn test_guid_parameter_uses_library_layout() {
    let library = MockLibrary::builder()
        .with_guid_layout(GuidLayout::MixedEndian)
        .with_procedure("dbo.echo", |call| {
            ProcedureOutcome::new().output("copy", call.param("id"))
        })
        .build();
    let client = connected(&library).await;
    let id = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();

    let result = client
        .call_procedure(
            "dbo.echo",
            vec![Parameter::input("id", id), Parameter::output("copy", Uuid::nil())],
        )
        .await
        .unwrap();

    let Some(RecordedCommand::Rpc(request)) = library.commands().pop() else {
        unreachable!("expected a procedure call");
    };
    assert_eq!(request.params[0].type_code, TypeCode::UNIQUE);
    assert_eq!(
        request.params[0].data.as_deref().map(|d| d[..4].to_vec()),
        Some(vec![0x04, 0x03, 0x02, 0x01])
    );
    assert_eq!(result.output("copy"), Some(&CellValue::Uuid(id)));
}

#[tokio::test]
async fn test_query_goes_through_executesql() {
    let sql = "SELECT name FROM users WHERE id = @p1 AND active = @p2";
    let library = MockLibrary::builder()
        .with_response(sql, MockResponse::scalar_string("alice"))
        .build();
    let client = connected(&library).await;

    let result = client.query(sql, &[&1i32, &true]).await.unwrap();

    assert_eq!(result.scalar(), Some(&CellValue::from("alice")));
    let Some(RecordedCommand::Rpc(request)) = library.commands().pop() else {
        unreachable!("expected a procedure call");
    };
    assert_eq!(request.procedure, "sp_executesql");
    let names: Vec<&str> = request.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["@stmt", "@params", "@p1", "@p2"]);
    assert_eq!(request.params[1].data.as_deref(), Some(&b"@p1 int, @p2 bit"[..]));
}

#[tokio::test]
async fn test_query_builder_mismatch_is_configuration_error() {
    let library = MockLibrary::builder().build();
    let client = connected(&library).await;

    let query = Query::new("SELECT @p1, @p2").bind(&1i32);
    let err = client.execute_query(&query).await.unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    assert!(library.commands().is_empty());
}

#[derive(Debug, PartialEq)]
struct User {
    id: i32,
    user_name: String,
}

impl FromRow for User {
    fn from_row(row: &Row) -> Result<Self, Error> {
        let m = RowMapper::new(row);
        Ok(Self {
            id: m.get("id")?,
            user_name: m.get("user_name")?,
        })
    }
}

#[tokio::test]
async fn test_rows_map_to_structs() {
    let library = MockLibrary::builder()
        .with_response(
            "SELECT Id, UserName FROM users",
            MockResponse::rows(
                vec![MockColumn::int("Id"), MockColumn::varchar("UserName", 40)],
                vec![
                    vec![CellValue::Int32(1), CellValue::from("alice")],
                    vec![CellValue::Int32(2), CellValue::from("bob")],
                ],
            ),
        )
        .build();
    let client = connected(&library).await;

    let users: Vec<User> = client.query_as("SELECT Id, UserName FROM users").await.unwrap();

    assert_eq!(
        users,
        [
            User { id: 1, user_name: "alice".into() },
            User { id: 2, user_name: "bob".into() },
        ]
    );
}
