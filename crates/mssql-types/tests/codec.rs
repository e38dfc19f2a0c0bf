//! Codec behaviour at the boundaries the native library imposes.
//!
//! Covers scratch buffer growth for long conversions, identifier byte
//! order, decode(encode(v)) for the outbound value kinds, and
//! decode(to_native(v)) agreement for the value kinds the pure-Rust
//! converter supports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use mssql_types::decode::{MAX_CONVERSION_LEN, SCRATCH_CAPACITY};
use mssql_types::{CellValue, Decoder, FromSql, WireConverter, encode};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use tds_native::{ConvertError, Converter, DateRecord, GuidLayout, TypeCode};
use uuid::Uuid;

/// Renders every value as a decimal literal of a fixed width, reporting
/// overflow without a size hint the way db-lib does for character output.
struct WideDecimal {
    digits: usize,
}

impl Converter for WideDecimal {
    fn convert(
        &self,
        _src_type: TypeCode,
        _src: &[u8],
        _dst_type: TypeCode,
        dst: &mut [u8],
    ) -> Result<usize, ConvertError> {
        if dst.len() < self.digits {
            return Err(ConvertError::Overflow { needed: None });
        }
        dst[..self.digits].fill(b'7');
        Ok(self.digits)
    }

    fn crack_datetime(&self, _src: &[u8]) -> Option<DateRecord> {
        None
    }
}

mod scratch_buffer {
    use super::*;

    #[test]
    fn test_output_exactly_filling_scratch_does_not_grow() {
        let converter = WideDecimal { digits: SCRATCH_CAPACITY };
        let mut decoder = Decoder::default();
        let value = decoder.decode(TypeCode::NUMERIC, Some(&[0; 19]), 19, &converter);
        // 64 sevens overflows rust_decimal and degrades to text.
        assert_eq!(value, CellValue::String("7".repeat(SCRATCH_CAPACITY)));
        assert_eq!(decoder.scratch_len(), SCRATCH_CAPACITY);
    }

    #[test]
    fn test_output_one_past_scratch_grows() {
        let converter = WideDecimal { digits: SCRATCH_CAPACITY + 1 };
        let mut decoder = Decoder::default();
        let value = decoder.decode(TypeCode::NUMERIC, Some(&[0; 19]), 19, &converter);
        assert_eq!(value, CellValue::String("7".repeat(SCRATCH_CAPACITY + 1)));
        assert!(decoder.scratch_len() > SCRATCH_CAPACITY);
    }

    #[test]
    fn test_output_beyond_limit_is_null() {
        let converter = WideDecimal { digits: MAX_CONVERSION_LEN + 1 };
        let mut decoder = Decoder::default();
        let value = decoder.decode(TypeCode::NUMERIC, Some(&[0; 19]), 19, &converter);
        assert_eq!(value, CellValue::Null);
    }

    #[test]
    fn test_short_output_after_growth_reuses_buffer() {
        let mut decoder = Decoder::default();
        decoder.decode(TypeCode::NUMERIC, Some(&[0; 19]), 19, &WideDecimal { digits: 200 });
        let grown = decoder.scratch_len();
        let value = decoder.decode(TypeCode::NUMERIC, Some(&[0; 19]), 19, &WideDecimal { digits: 3 });
        assert_eq!(value, CellValue::Decimal(Decimal::from(777)));
        assert_eq!(decoder.scratch_len(), grown);
    }
}

mod text {
    use super::*;

    #[test]
    fn test_text_at_and_past_scratch_size_is_untouched() {
        // Text never goes through the scratch buffer.
        let mut decoder = Decoder::default();
        for len in [SCRATCH_CAPACITY, SCRATCH_CAPACITY + 1] {
            let s = "x".repeat(len);
            let value = decoder.decode(TypeCode::BIG_VARCHAR, Some(s.as_bytes()), 8000, &WireConverter);
            assert_eq!(value.as_str().map(str::len), Some(len));
        }
        assert_eq!(decoder.scratch_len(), SCRATCH_CAPACITY);
    }

    #[test]
    fn test_configured_code_page() {
        let mut decoder = Decoder::for_label("iso-8859-7").unwrap();
        // 0xE1 is Greek small alpha in ISO-8859-7.
        let value = decoder.decode(TypeCode::CHAR, Some(&[0xE1]), 1, &WireConverter);
        assert_eq!(value, CellValue::String("α".into()));
    }
}

mod guid {
    use super::*;

    const WIRE: [u8; 16] = [
        0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
        0xFF,
    ];

    #[test]
    fn test_wire_bytes_decode_to_canonical() {
        let value = Decoder::default().decode(TypeCode::UNIQUE, Some(&WIRE), 16, &WireConverter);
        assert_eq!(
            value,
            CellValue::Uuid(Uuid::from_str("00112233-4455-6677-8899-aabbccddeeff").unwrap())
        );
    }

    #[test]
    fn test_swapped_fields_vector() {
        let wire = [
            0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
            0x0F, 0x10,
        ];
        let value = Decoder::default().decode(TypeCode::UNIQUE, Some(&wire), 16, &WireConverter);
        assert_eq!(
            value.as_uuid().map(|u| u.hyphenated().to_string()),
            Some("01020304-0506-0708-090a-0b0c0d0e0f10".to_string())
        );
    }

    #[test]
    fn test_wrong_length_is_null() {
        let value = Decoder::default().decode(TypeCode::UNIQUE, Some(&WIRE[..15]), 16, &WireConverter);
        assert_eq!(value, CellValue::Null);
    }

    #[test]
    fn test_encode_mixed_endian_matches_wire() {
        let u = Uuid::from_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let encoded = encode(&CellValue::Uuid(u), GuidLayout::MixedEndian).unwrap();
        assert_eq!(encoded.data.unwrap(), Bytes::copy_from_slice(&WIRE));
    }
}

mod typed_access {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_money_keeps_four_places() {
        let bytes = mssql_types::convert::money_bytes(Decimal::from_str("12.5").unwrap()).unwrap();
        let value = Decoder::default().decode(TypeCode::MONEY, Some(&bytes), 8, &WireConverter);
        assert_eq!(Decimal::from_sql(&value).unwrap().to_string(), "12.5000");
    }

    #[test]
    fn test_legacy_datetime_through_cracker() {
        let dt = NaiveDateTime::parse_from_str("2023-11-05 08:09:10", "%Y-%m-%d %H:%M:%S").unwrap();
        let bytes = mssql_types::convert::datetime_bytes(dt).unwrap();
        let value = Decoder::default().decode(TypeCode::DATETIME, Some(&bytes), 8, &WireConverter);
        assert_eq!(NaiveDateTime::from_sql(&value).unwrap(), dt);
    }
}

fn roundtrip(value: &CellValue) -> CellValue {
    let (code, data) = WireConverter::to_native(value);
    let len = data.as_ref().map_or(0, Vec::len);
    Decoder::default().decode(code, data.as_deref(), len, &WireConverter)
}

proptest! {
    #[test]
    fn prop_integers_survive(v in any::<i64>(), w in any::<i32>(), s in any::<i16>()) {
        prop_assert_eq!(roundtrip(&CellValue::Int64(v)), CellValue::Int64(v));
        prop_assert_eq!(roundtrip(&CellValue::Int32(w)), CellValue::Int32(w));
        prop_assert_eq!(roundtrip(&CellValue::Int16(s)), CellValue::Int16(s));
    }

    #[test]
    fn prop_text_survives(s in "\\PC{0,200}") {
        prop_assert_eq!(roundtrip(&CellValue::String(s.clone())), CellValue::String(s));
    }

    #[test]
    fn prop_binary_survives(b in proptest::collection::vec(any::<u8>(), 0..300)) {
        let value = CellValue::Bytes(Bytes::from(b));
        prop_assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn prop_uuid_survives(raw in any::<[u8; 16]>()) {
        let value = CellValue::Uuid(Uuid::from_bytes(raw));
        prop_assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn prop_decimal_survives(mantissa in -999_999_999_999i64..999_999_999_999, scale in 0u32..10) {
        let value = CellValue::Decimal(Decimal::new(mantissa, scale));
        let decoded = roundtrip(&value);
        prop_assert_eq!(decoded.as_decimal(), value.as_decimal());
    }
}

fn encode_decode(value: &CellValue) -> CellValue {
    let encoded = encode(value, GuidLayout::MixedEndian).unwrap();
    let data = encoded.data.as_deref();
    let len = data.map_or(0, <[u8]>::len);
    Decoder::default().decode(encoded.type_code, data, len, &WireConverter)
}

proptest! {
    #[test]
    fn prop_encoded_integers_decode(v in any::<i64>(), w in any::<i32>(), s in any::<i16>()) {
        prop_assert_eq!(encode_decode(&CellValue::Int64(v)), CellValue::Int64(v));
        prop_assert_eq!(encode_decode(&CellValue::Int32(w)), CellValue::Int32(w));
        prop_assert_eq!(encode_decode(&CellValue::Int16(s)), CellValue::Int16(s));
    }

    #[test]
    fn prop_encoded_bool_decodes(b in any::<bool>()) {
        prop_assert_eq!(encode_decode(&CellValue::Bool(b)), CellValue::Bool(b));
    }

    #[test]
    fn prop_encoded_text_decodes(s in "\\PC{0,200}") {
        prop_assert_eq!(encode_decode(&CellValue::String(s.clone())), CellValue::String(s));
    }

    #[test]
    fn prop_encoded_binary_decodes(b in proptest::collection::vec(any::<u8>(), 0..300)) {
        let value = CellValue::Bytes(Bytes::from(b));
        prop_assert_eq!(encode_decode(&value), value);
    }

    #[test]
    fn prop_encoded_uuid_decodes(raw in any::<[u8; 16]>()) {
        let value = CellValue::Uuid(Uuid::from_bytes(raw));
        prop_assert_eq!(encode_decode(&value), value);
    }
}

#[test]
fn test_encoded_null_decodes_to_null() {
    assert_eq!(encode_decode(&CellValue::Null), CellValue::Null);
}
