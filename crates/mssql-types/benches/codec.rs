//! Benchmarks for wire value decoding and parameter encoding.

#![allow(clippy::unwrap_used, missing_docs)]

use std::hint::black_box;

use chrono::NaiveDate;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use mssql_types::{CellValue, Decoder, WireConverter, encode};
use rust_decimal::Decimal;
use tds_native::GuidLayout;

fn bench_decode_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_text");
    let decoder = Decoder::default();

    let ascii = "This is a typical database column value with some content".as_bytes();
    group.throughput(Throughput::Bytes(ascii.len() as u64));
    group.bench_function("utf8", |b| b.iter(|| black_box(decoder.decode_text(black_box(ascii)))));

    let latin1: Vec<u8> = b"caf\xe9 cr\xe8me br\xfbl\xe9e".to_vec();
    group.throughput(Throughput::Bytes(latin1.len() as u64));
    group.bench_function("legacy", |b| {
        b.iter(|| black_box(decoder.decode_text(black_box(&latin1))))
    });

    group.finish();
}

fn bench_decode_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_value");
    let converter = WireConverter;
    let mut decoder = Decoder::default();

    let samples = [
        ("int", CellValue::Int32(123_456)),
        ("bigint", CellValue::Int64(9_876_543_210)),
        ("decimal", CellValue::Decimal(Decimal::new(123_456_789, 4))),
        (
            "datetime2",
            CellValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 6, 15)
                    .unwrap()
                    .and_hms_micro_opt(14, 30, 45, 123_456)
                    .unwrap(),
            ),
        ),
        ("uuid", CellValue::Uuid(uuid::Uuid::new_v4())),
    ];

    for (name, value) in samples {
        let (code, data) = WireConverter::to_native(&value);
        let data = data.unwrap();
        group.bench_function(name, |b| {
            b.iter(|| black_box(decoder.decode(code, Some(black_box(&data)), data.len(), &converter)))
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let values = [
        ("int", CellValue::Int32(42)),
        ("string", CellValue::String("parameter value".into())),
        ("decimal", CellValue::Decimal(Decimal::new(1999, 2))),
    ];

    for (name, value) in values {
        group.bench_function(name, |b| {
            b.iter(|| black_box(encode(black_box(&value), GuidLayout::MixedEndian).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode_text, bench_decode_values, bench_encode);
criterion_main!(benches);
