//! Benchmarks for mssql-client configuration and row access.

#![allow(missing_docs, clippy::unwrap_used, clippy::approx_constant)]

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use mssql_client::query::placeholders;
use mssql_client::{CellValue, ColMetaData, Column, Config, FromSql, Query, Row, RowMapper};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tds_native::TypeCode;

/// Connection strings are parsed once per client at startup.
fn bench_connection_string_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("connection_string");

    let simple = "Server=localhost;Database=test;User Id=sa;Password=secret;";
    group.throughput(Throughput::Bytes(simple.len() as u64));
    group.bench_function("simple", |b| {
        b.iter(|| black_box(Config::from_connection_string(black_box(simple))))
    });

    let with_port = "Server=localhost,1434;Database=test;User Id=sa;Password=secret;";
    group.throughput(Throughput::Bytes(with_port.len() as u64));
    group.bench_function("with_port", |b| {
        b.iter(|| black_box(Config::from_connection_string(black_box(with_port))))
    });

    let with_instance = "Server=localhost\\SQLEXPRESS;Database=test;User Id=sa;Password=secret;";
    group.throughput(Throughput::Bytes(with_instance.len() as u64));
    group.bench_function("with_instance", |b| {
        b.iter(|| black_box(Config::from_connection_string(black_box(with_instance))))
    });

    let full = "Server=db.example.com,1500;Database=mydb;User Id=app;Password=VeryStrongP@ssw0rd!;\
                Encrypt=strict;ApplicationIntent=ReadOnly;Connect Timeout=30;\
                Application Name=MyApp;Text Size=65536;";
    group.throughput(Throughput::Bytes(full.len() as u64));
    group.bench_function("full", |b| {
        b.iter(|| black_box(Config::from_connection_string(black_box(full))))
    });

    group.finish();
}

/// Typed reads from decoded cells.
fn bench_from_sql_conversions(c: &mut Criterion) {
    let mut group = c.benchmark_group("from_sql");

    let int_value = CellValue::Int32(42);
    group.bench_function("i32_from_int", |b| {
        b.iter(|| black_box(i32::from_sql(black_box(&int_value))))
    });

    let bigint_value = CellValue::Int64(9_876_543_210);
    group.bench_function("i64_from_bigint", |b| {
        b.iter(|| black_box(i64::from_sql(black_box(&bigint_value))))
    });

    let string_value = CellValue::from("Hello, World! This is a test string.");
    group.bench_function("string_from_string", |b| {
        b.iter(|| black_box(String::from_sql(black_box(&string_value))))
    });

    let null_value = CellValue::Null;
    group.bench_function("option_i32_none", |b| {
        b.iter(|| black_box(Option::<i32>::from_sql(black_box(&null_value))))
    });

    let float_value = CellValue::Float64(3.14159265358979);
    group.bench_function("f64_from_double", |b| {
        b.iter(|| black_box(f64::from_sql(black_box(&float_value))))
    });

    group.finish();
}

fn sample_row() -> Row {
    let columns = (0..12)
        .map(|i| Column::new(format!("column_{i}"), i, TypeCode::INT4, 4))
        .collect();
    let values = (0..12).map(CellValue::Int32).collect();
    Row::new(Arc::new(ColMetaData::new(columns)), values)
}

/// Column lookup by position, by name and through the struct mapper.
fn bench_row_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_access");
    let row = sample_row();

    group.bench_function("by_index", |b| {
        b.iter(|| black_box(row.get::<i32>(black_box(11))))
    });

    group.bench_function("by_name", |b| {
        b.iter(|| black_box(row.get_by_name::<i32>(black_box("column_11"))))
    });

    group.bench_function("mapper_case_folded", |b| {
        b.iter(|| black_box(RowMapper::new(&row).get::<i32>(black_box("Column11"))))
    });

    group.finish();
}

/// Placeholder scanning runs for every parameterized query.
fn bench_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("placeholders");

    let sql = "SELECT id, name, email FROM users \
               WHERE tenant = @p1 AND created > @p2 AND status IN (@p3, @p4) \
               ORDER BY created DESC";
    group.throughput(Throughput::Bytes(sql.len() as u64));
    group.bench_function("scan", |b| b.iter(|| black_box(placeholders(black_box(sql)))));

    group.bench_function("bind_and_validate", |b| {
        b.iter(|| {
            let query = Query::new(sql).bind(&7i32).bind("2024-01-01").bind(&1i32).bind(&2i32);
            black_box(query.parameters())
        })
    });

    group.finish();
}

/// Builder calls used during client setup.
fn bench_config_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_builder");

    group.bench_function("minimal", |b| {
        b.iter(|| black_box(Config::new().host("localhost").database("test")))
    });

    group.bench_function("full", |b| {
        b.iter(|| {
            let config = Config::new()
                .host("db.example.com")
                .port(1433)
                .database("mydb")
                .credentials("app", "secret")
                .application_name("benchmark")
                .read_only(true)
                .text_size(65536);
            black_box(config)
        })
    });

    group.bench_function("validate", |b| {
        let config = Config::new()
            .host("db.example.com")
            .credentials("app", "secret")
            .timeouts(mssql_client::TimeoutConfig::new().login_timeout(Duration::from_secs(30)));
        b.iter(|| black_box(config.validate()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_connection_string_parsing,
    bench_from_sql_conversions,
    bench_row_access,
    bench_placeholders,
    bench_config_builder,
);

criterion_main!(benches);
