//! Mock Library Fidelity Tests
//!
//! These tests check that the mock behaves like db-lib where the driver
//! depends on it: result sequencing, row counts, return values, message
//! delivery and handle lifetimes.
//!
//! ```bash
//! cargo test -p mssql-testing --test mock_fidelity
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mssql_testing::fixtures::{CANONICAL_GUID, WIRE_GUID};
use mssql_testing::{MockColumn, MockLibrary, MockResponse, MockResult, ProcedureOutcome};
use mssql_types::{CellValue, Decoder};
use tds_native::{
    ConnectionHandle, LoginOption, NativeError, NativeLibrary, ResultsStatus, RowStatus, RpcParam,
    RpcRequest, TypeCode,
};

fn connect(library: &MockLibrary) -> Box<dyn ConnectionHandle> {
    library.init().unwrap();
    let mut login = library.new_login().unwrap();
    login.apply(&LoginOption::AppName("fidelity".into())).unwrap();
    login.open("mock").unwrap()
}

#[test]
fn test_batch_yields_results_in_order() {
    let library = MockLibrary::builder()
        .with_response(
            "multi",
            MockResponse::batch(vec![
                MockResult::affected(2),
                MockResult::rows(vec![MockColumn::int("a")], vec![vec![1.into()]]),
            ]),
        )
        .build();
    let mut conn = connect(&library);
    conn.submit("multi").unwrap();

    assert_eq!(conn.results(), ResultsStatus::Succeed);
    assert_eq!(conn.column_count(), 0);
    assert_eq!(conn.row_count(), Some(2));

    assert_eq!(conn.results(), ResultsStatus::Succeed);
    assert_eq!(conn.column_count(), 1);
    assert_eq!(conn.next_row(), RowStatus::Regular);
    assert_eq!(conn.next_row(), RowStatus::NoMoreRows);

    assert_eq!(conn.results(), ResultsStatus::NoMoreResults);
}

#[test]
fn test_rejected_batch_leaves_error_message() {
    let library = MockLibrary::builder()
        .with_response("bad", MockResponse::error(102, "Incorrect syntax near 'bad'."))
        .build();
    let mut conn = connect(&library);
    let err = conn.submit("bad").unwrap_err();
    assert!(matches!(err, NativeError::CallFailed { call: "dbsqlexec", .. }));

    let messages = conn.drain_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].number, 102);
    assert!(conn.drain_messages().is_empty());
}

#[test]
fn test_strict_mode_rejects_unscripted_sql() {
    let library = MockLibrary::builder().strict().build();
    let mut conn = connect(&library);
    assert!(conn.submit("SELECT 1").is_err());
}

#[test]
fn test_buffer_full_precedes_rows() {
    let library = MockLibrary::builder()
        .with_buffer_full()
        .with_response(
            "q",
            MockResponse::rows(vec![MockColumn::int("a")], vec![vec![1.into()], vec![2.into()]]),
        )
        .build();
    let mut conn = connect(&library);
    conn.submit("q").unwrap();
    assert_eq!(conn.results(), ResultsStatus::Succeed);
    let statuses: Vec<RowStatus> = (0..5).map(|_| conn.next_row()).collect();
    assert_eq!(
        statuses,
        vec![
            RowStatus::BufferFull,
            RowStatus::Regular,
            RowStatus::BufferFull,
            RowStatus::Regular,
            RowStatus::NoMoreRows,
        ]
    );
}

#[test]
fn test_raw_guid_is_served_unchanged() {
    let library = MockLibrary::builder()
        .with_response(
            "g",
            MockResponse::rows(
                vec![MockColumn::guid("id")],
                vec![vec![CellValue::from(WIRE_GUID.to_vec())]],
            ),
        )
        .build();
    let mut conn = connect(&library);
    conn.submit("g").unwrap();
    conn.results();
    conn.next_row();
    let value = Decoder::default().decode(
        conn.column_type(0),
        conn.data(0),
        conn.column_len(0),
        conn.converter(),
    );
    assert_eq!(value.as_uuid().unwrap().to_string(), CANONICAL_GUID);
}

#[test]
fn test_procedure_outputs_and_status() {
    let library = MockLibrary::builder()
        .with_procedure("dbo.triple", |call| {
            let n = call.param("@n").as_i64().unwrap_or(0);
            ProcedureOutcome::new().output("@result", n * 3).status(4)
        })
        .build();
    let mut conn = connect(&library);
    let request = RpcRequest::new("dbo.triple")
        .param(RpcParam::input("@n", TypeCode::INT4, Some(5i32.to_le_bytes().to_vec())))
        .param(RpcParam::output("@result", TypeCode::INT8, None));
    conn.rpc(&request).unwrap();
    while conn.results() == ResultsStatus::Succeed {}

    assert_eq!(conn.return_count(), 1);
    assert_eq!(conn.return_name(0).as_deref(), Some("@result"));
    assert_eq!(conn.return_type(0), TypeCode::INT8);
    assert_eq!(conn.return_data(0), Some(&15i64.to_le_bytes()[..]));
    assert_eq!(conn.return_status(), Some(4));
}

#[test]
fn test_failed_login_frees_nothing_twice() {
    let library = MockLibrary::builder()
        .with_login_failure("Login failed for user 'sa'.")
        .build();
    {
        let mut login = library.new_login().unwrap();
        let err = login.open("mock").err().unwrap();
        assert!(matches!(err, NativeError::LoginRejected { .. }));
        assert_eq!(library.live_connections(), 0);
    }
    assert_eq!(library.live_logins(), 0);
}
