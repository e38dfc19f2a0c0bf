#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mssql_types::{Decoder, WireConverter};
use tds_native::TypeCode;

/// Fuzz input: a column type and the bytes a result buffer held for it.
#[derive(Debug, Arbitrary)]
struct FuzzInput {
    type_code: u8,
    declared_len: u16,
    null: bool,
    legacy_latin: bool,
    data: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let mut decoder = if input.legacy_latin {
        Decoder::for_label("iso-8859-1").unwrap_or_default()
    } else {
        Decoder::default()
    };
    let data = (!input.null).then_some(input.data.as_slice());

    let value = decoder.decode(
        TypeCode(i32::from(input.type_code)),
        data,
        usize::from(input.declared_len),
        &WireConverter,
    );

    // Rendering a decoded value must never panic either.
    let _ = value.to_string();
});
