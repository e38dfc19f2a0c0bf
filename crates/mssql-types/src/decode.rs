//! Wire value decoding.
//!
//! Turns the raw bytes the native library hands out for a column or return
//! value into a [`CellValue`]. Decoding never fails: malformed or
//! unexpected data degrades to a string, raw bytes or NULL so that one odd
//! cell cannot abort a whole query.
//!
//! | Family | Result |
//! |--------|--------|
//! | integers | `Int16`/`Int32`/`Int64`, unsigned Sybase types as `UInt*` |
//! | floats | `Float32`/`Float64` |
//! | bit | `Bool` (any non-zero byte is true) |
//! | text | `String` via UTF-8, legacy code page, then UTF-16LE |
//! | binary | `Bytes` |
//! | `datetime`, `smalldatetime` | `DateTime`, or NULL when out of range |
//! | `date`, `time`, `datetime2` | `DateTime`, or `String` when unparseable |
//! | `datetimeoffset` | `DateTimeOffset`, or `String` when unparseable |
//! | decimal, money | `Decimal` (money keeps at least 4 places) |
//! | `uniqueidentifier` | `Uuid` in canonical order, NULL unless 16 bytes |
//! | anything else | `Bytes` |

use bytes::{Buf, Bytes};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use encoding_rs::Encoding;
use rust_decimal::Decimal;
use tds_native::{ConvertError, Converter, TypeCode, TypeFamily};
use uuid::Uuid;

use crate::value::CellValue;

/// Initial size of the conversion scratch buffer.
pub const SCRATCH_CAPACITY: usize = 64;

/// Conversions needing more room than this are abandoned.
pub const MAX_CONVERSION_LEN: usize = 64 * 1024;

/// Scale money values are normalized to.
pub const MONEY_SCALE: u32 = 4;

/// Patterns for values carrying a UTC offset, most precise first.
const OFFSET_PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S %:z",
];

/// Patterns for date-times without offset, most precise first.
const DATETIME_PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%b %e %Y %I:%M:%S%.f%p",
    "%b %e %Y %I:%M%p",
];

const DATE_PATTERNS: &[&str] = &["%Y-%m-%d", "%b %e %Y"];

const TIME_PATTERNS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%I:%M:%S%.f%p", "%I:%M%p"];

/// Decodes wire values, reusing one scratch buffer for native conversions.
///
/// A decoder belongs to a single connection's execution context; it is
/// cheap to create but keeping one avoids regrowing the scratch buffer.
#[derive(Debug)]
pub struct Decoder {
    legacy: &'static Encoding,
    scratch: Vec<u8>,
}

/// Bytes with no assignment in code page 1252.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

impl Default for Decoder {
    fn default() -> Self {
        Self::new(encoding_rs::WINDOWS_1252)
    }
}

impl Decoder {
    /// Create a decoder using `legacy` as the single-byte text fallback.
    #[must_use]
    pub fn new(legacy: &'static Encoding) -> Self {
        Self {
            legacy,
            scratch: vec![0; SCRATCH_CAPACITY],
        }
    }

    /// Create a decoder from an encoding label such as `windows-1252` or
    /// `latin1`. Returns `None` for unknown labels.
    #[must_use]
    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.as_bytes()).map(Self::new)
    }

    /// The legacy code page in use.
    #[must_use]
    pub fn legacy_encoding(&self) -> &'static Encoding {
        self.legacy
    }

    /// Current scratch buffer size.
    #[must_use]
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    /// Decode one value.
    ///
    /// `data` is `None` for NULL. `declared_len` is the column's declared
    /// size and only disambiguates sized types when `data` is empty.
    pub fn decode(
        &mut self,
        type_code: TypeCode,
        data: Option<&[u8]>,
        declared_len: usize,
        converter: &dyn Converter,
    ) -> CellValue {
        let Some(data) = data else {
            return CellValue::Null;
        };

        match type_code.family() {
            TypeFamily::Integer => decode_integer(type_code, data, declared_len),
            TypeFamily::Float => decode_float(data),
            TypeFamily::Bit => CellValue::Bool(data.iter().any(|b| *b != 0)),
            TypeFamily::NarrowText | TypeFamily::WideText => {
                CellValue::String(self.decode_text(data))
            }
            TypeFamily::Binary | TypeFamily::Unknown => {
                CellValue::Bytes(Bytes::copy_from_slice(data))
            }
            TypeFamily::LegacyDateTime => decode_legacy_datetime(type_code, data, converter),
            TypeFamily::DateTime => self.decode_modern_datetime(type_code, data, converter),
            TypeFamily::Decimal => self.decode_decimal(type_code, data, converter, false),
            TypeFamily::Money => self.decode_decimal(type_code, data, converter, true),
            TypeFamily::Guid => decode_guid(data).map_or(CellValue::Null, CellValue::Uuid),
        }
    }

    /// Decode character data: UTF-8 first, then the legacy code page, then
    /// UTF-16LE. Undecodable data becomes an empty string.
    pub fn decode_text(&self, data: &[u8]) -> String {
        if let Ok(s) = std::str::from_utf8(data) {
            return s.to_owned();
        }
        if let Some(s) = self.decode_legacy(data) {
            tracing::trace!(encoding = self.legacy.name(), "decoded text via legacy code page");
            return s;
        }
        if let Some(s) = decode_utf16le(data) {
            tracing::trace!("decoded text as UTF-16LE");
            return s;
        }
        tracing::warn!(len = data.len(), "undecodable text value replaced by empty string");
        String::new()
    }

    fn decode_legacy(&self, data: &[u8]) -> Option<String> {
        // encoding_rs maps the bytes code page 1252 leaves undefined to C1
        // controls; the server never produces them, so they mean the data
        // is not in this code page.
        if self.legacy == encoding_rs::WINDOWS_1252
            && data.iter().any(|b| CP1252_UNDEFINED.contains(b))
        {
            return None;
        }
        self.legacy
            .decode_without_bom_handling_and_without_replacement(data)
            .map(|s| s.into_owned())
    }

    /// Run a native conversion to character data, growing the scratch
    /// buffer until the output fits.
    fn convert_to_text(
        &mut self,
        src_type: TypeCode,
        src: &[u8],
        converter: &dyn Converter,
    ) -> Option<String> {
        let mut capacity = self.scratch.len().max(SCRATCH_CAPACITY);
        loop {
            if self.scratch.len() < capacity {
                self.scratch.resize(capacity, 0);
            }
            match converter.convert(src_type, src, TypeCode::CHAR, &mut self.scratch[..capacity]) {
                Ok(written) => {
                    let text = String::from_utf8_lossy(&self.scratch[..written]);
                    return Some(text.trim_end_matches('\0').trim().to_owned());
                }
                Err(ConvertError::Overflow { needed }) => {
                    let next = needed.unwrap_or(capacity * 2).max(capacity + 1);
                    if next > MAX_CONVERSION_LEN {
                        tracing::warn!(%src_type, needed = next, "conversion output exceeds limit");
                        return None;
                    }
                    capacity = next;
                }
                Err(e) => {
                    tracing::debug!(%src_type, error = %e, "native conversion failed");
                    return None;
                }
            }
        }
    }

    fn decode_modern_datetime(
        &mut self,
        type_code: TypeCode,
        data: &[u8],
        converter: &dyn Converter,
    ) -> CellValue {
        let Some(text) = self.convert_to_text(type_code, data, converter) else {
            return CellValue::Null;
        };
        match parse_datetime_text(&text) {
            Some(value) => value,
            None => {
                tracing::warn!(%type_code, text = %text, "unrecognized date/time text");
                CellValue::String(text)
            }
        }
    }

    fn decode_decimal(
        &mut self,
        type_code: TypeCode,
        data: &[u8],
        converter: &dyn Converter,
        money: bool,
    ) -> CellValue {
        let Some(text) = self.convert_to_text(type_code, data, converter) else {
            return CellValue::Null;
        };
        match text.parse::<Decimal>() {
            Ok(mut d) => {
                if money && d.scale() < MONEY_SCALE {
                    d.rescale(MONEY_SCALE);
                }
                CellValue::Decimal(d)
            }
            Err(e) => {
                tracing::warn!(%type_code, text = %text, error = %e, "decimal text not representable");
                CellValue::String(text)
            }
        }
    }
}

/// Decode one value with a throwaway [`Decoder`] using `windows-1252` as
/// the legacy code page.
pub fn decode(
    type_code: TypeCode,
    data: Option<&[u8]>,
    declared_len: usize,
    converter: &dyn Converter,
) -> CellValue {
    Decoder::default().decode(type_code, data, declared_len, converter)
}

fn decode_integer(type_code: TypeCode, data: &[u8], declared_len: usize) -> CellValue {
    let width = match type_code {
        TypeCode::INT1 => 1,
        TypeCode::INT2 | TypeCode::UINT2 => 2,
        TypeCode::INT4 | TypeCode::UINT4 => 4,
        TypeCode::INT8 | TypeCode::UINT8 => 8,
        _ if data.is_empty() => declared_len,
        _ => data.len(),
    };
    if data.len() < width {
        return CellValue::Bytes(Bytes::copy_from_slice(data));
    }

    // `Buf` on a byte slice reads byte-wise, so alignment never matters.
    let mut buf = &data[..width];
    match (type_code, width) {
        (TypeCode::UINT2, _) => CellValue::UInt16(buf.get_u16_le()),
        (TypeCode::UINT4, _) => CellValue::UInt32(buf.get_u32_le()),
        (TypeCode::UINT8, _) => CellValue::UInt64(buf.get_u64_le()),
        (_, 1) => CellValue::Int16(i16::from(buf.get_u8())),
        (_, 2) => CellValue::Int16(buf.get_i16_le()),
        (_, 4) => CellValue::Int32(buf.get_i32_le()),
        (_, 8) => CellValue::Int64(buf.get_i64_le()),
        _ => CellValue::Bytes(Bytes::copy_from_slice(data)),
    }
}

fn decode_float(data: &[u8]) -> CellValue {
    let mut buf = data;
    match data.len() {
        4 => CellValue::Float32(buf.get_f32_le()),
        8 => CellValue::Float64(buf.get_f64_le()),
        _ => CellValue::Bytes(Bytes::copy_from_slice(data)),
    }
}

fn decode_legacy_datetime(type_code: TypeCode, data: &[u8], converter: &dyn Converter) -> CellValue {
    let cracked = if data.len() == 8 {
        converter.crack_datetime(data)
    } else {
        // smalldatetime: widen through the library first, then crack.
        let mut widened = [0u8; 8];
        match converter.convert(type_code, data, TypeCode::DATETIME, &mut widened) {
            Ok(8) => converter.crack_datetime(&widened),
            _ => None,
        }
    };

    cracked
        .and_then(|rec| {
            let date = NaiveDate::from_ymd_opt(
                rec.year,
                u32::try_from(rec.month()).ok()?,
                u32::try_from(rec.day).ok()?,
            )?;
            let time = NaiveTime::from_hms_nano_opt(
                u32::try_from(rec.hour).ok()?,
                u32::try_from(rec.minute).ok()?,
                u32::try_from(rec.second).ok()?,
                u32::try_from(rec.nanosecond).ok()?,
            )?;
            Some(CellValue::DateTime(date.and_time(time)))
        })
        .unwrap_or(CellValue::Null)
}

/// Parse date/time text against the fixed pattern list.
///
/// Time-only values are anchored at 1900-01-01 and date-only values at
/// midnight.
#[must_use]
pub fn parse_datetime_text(text: &str) -> Option<CellValue> {
    let text = text.trim();
    let normalized = normalize_legacy_fraction(text);
    let text = normalized.as_deref().unwrap_or(text);

    if let Some(v) = OFFSET_PATTERNS
        .iter()
        .find_map(|p| DateTime::parse_from_str(text, p).ok())
    {
        return Some(CellValue::DateTimeOffset(v));
    }
    if let Some(v) = DATETIME_PATTERNS
        .iter()
        .find_map(|p| NaiveDateTime::parse_from_str(text, p).ok())
    {
        return Some(CellValue::DateTime(v));
    }
    if let Some(v) = DATE_PATTERNS
        .iter()
        .find_map(|p| NaiveDate::parse_from_str(text, p).ok())
    {
        return Some(CellValue::DateTime(v.and_time(NaiveTime::MIN)));
    }
    TIME_PATTERNS
        .iter()
        .find_map(|p| NaiveTime::parse_from_str(text, p).ok())
        .and_then(|t| Some(CellValue::DateTime(time_anchor()?.and_time(t))))
}

fn time_anchor() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
}

/// db-lib's default rendering separates fractional seconds with a colon
/// (`Jan  1 2024 10:15:30:1230000AM`). Rewrite that colon as a dot.
fn normalize_legacy_fraction(text: &str) -> Option<String> {
    let upper = text.to_ascii_uppercase();
    let meridiem = upper.ends_with("AM") || upper.ends_with("PM");
    if !meridiem && !text.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let idx = text.rfind(':')?;
    let (head, tail) = text.split_at(idx);
    let tail = &tail[1..];
    let digits = tail.chars().take_while(char::is_ascii_digit).count();
    // hh:mm:ss:fff has three colons, hh:mm has one.
    if digits == 0 || head.matches(':').count() < 2 {
        return None;
    }
    Some(format!("{head}.{tail}"))
}

/// Swap a wire-order (mixed-endian) identifier into canonical order.
///
/// Returns `None` unless `data` is exactly 16 bytes.
#[must_use]
pub fn decode_guid(data: &[u8]) -> Option<Uuid> {
    let bytes: [u8; 16] = data.try_into().ok()?;
    Some(Uuid::from_bytes_le(bytes))
}

/// Decode UTF-16LE, returning `None` on odd length or unpaired surrogates.
#[must_use]
pub fn decode_utf16le(data: &[u8]) -> Option<String> {
    if data.len() % 2 != 0 {
        return None;
    }
    let units = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::convert::WireConverter;

    fn dec(code: TypeCode, data: &[u8]) -> CellValue {
        decode(code, Some(data), data.len(), &WireConverter)
    }

    #[test]
    fn test_decode_integers() {
        assert_eq!(dec(TypeCode::INT1, &[0xff]), CellValue::Int16(255));
        assert_eq!(dec(TypeCode::INT2, &(-2i16).to_le_bytes()), CellValue::Int16(-2));
        assert_eq!(dec(TypeCode::INT4, &42i32.to_le_bytes()), CellValue::Int32(42));
        assert_eq!(dec(TypeCode::INT8, &i64::MIN.to_le_bytes()), CellValue::Int64(i64::MIN));
        assert_eq!(dec(TypeCode::INTN, &7i64.to_le_bytes()), CellValue::Int64(7));
        assert_eq!(dec(TypeCode::UINT4, &u32::MAX.to_le_bytes()), CellValue::UInt32(u32::MAX));
    }

    #[test]
    fn test_decode_integer_unaligned() {
        // Offset by one so the i32 starts on an odd address.
        let mut raw = vec![0u8];
        raw.extend_from_slice(&0x1234_5678i32.to_le_bytes());
        assert_eq!(dec(TypeCode::INT4, &raw[1..]), CellValue::Int32(0x1234_5678));
    }

    #[test]
    fn test_decode_short_integer_degrades() {
        assert_eq!(
            dec(TypeCode::INT4, &[1, 2]),
            CellValue::Bytes(Bytes::from_static(&[1, 2]))
        );
    }

    #[test]
    fn test_decode_null() {
        assert_eq!(decode(TypeCode::INT4, None, 4, &WireConverter), CellValue::Null);
        assert_eq!(decode(TypeCode::UNIQUE, None, 16, &WireConverter), CellValue::Null);
    }

    #[test]
    fn test_decode_bit_any_nonzero() {
        assert_eq!(dec(TypeCode::BIT, &[0]), CellValue::Bool(false));
        assert_eq!(dec(TypeCode::BIT, &[2]), CellValue::Bool(true));
        assert_eq!(dec(TypeCode::BITN, &[0, 1]), CellValue::Bool(true));
    }

    #[test]
    fn test_decode_floats() {
        assert_eq!(dec(TypeCode::REAL, &1.5f32.to_le_bytes()), CellValue::Float32(1.5));
        assert_eq!(dec(TypeCode::FLTN, &(-0.25f64).to_le_bytes()), CellValue::Float64(-0.25));
    }

    #[test]
    fn test_decode_text_fallbacks() {
        let d = Decoder::default();
        assert_eq!(d.decode_text("héllo".as_bytes()), "héllo");
        // 0xE9 alone is invalid UTF-8 but 'é' in windows-1252.
        assert_eq!(d.decode_text(&[b'c', b'a', b'f', 0xE9]), "café");
    }

    #[test]
    fn test_decode_text_utf16_after_legacy() {
        // 0x81 is unassigned in code page 1252, so UTF-16 gets its turn.
        let d = Decoder::default();
        assert_eq!(d.decode_text(&[0x81, 0x00, 0x2D, 0x4E]), "\u{81}\u{4E2D}");
    }

    #[test]
    fn test_decode_text_legacy_control_bytes_still_decode() {
        let d = Decoder::default();
        // 0x80 is the euro sign in code page 1252.
        assert_eq!(d.decode_text(&[0x80, b'5']), "\u{20AC}5");
    }

    #[test]
    fn test_decode_text_undecodable_is_empty() {
        let d = Decoder::default();
        // Odd length, invalid UTF-8 and unassigned in code page 1252.
        assert_eq!(d.decode_text(&[0x81, 0x81, 0x81]), "");
    }

    #[test]
    fn test_decode_binary_copies() {
        assert_eq!(
            dec(TypeCode::BIG_VARBINARY, &[0, 1, 2]),
            CellValue::Bytes(Bytes::from_static(&[0, 1, 2]))
        );
    }

    #[test]
    fn test_decode_guid_swaps_to_canonical() {
        let wire = [
            0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
            0x0F, 0x10,
        ];
        let v = dec(TypeCode::UNIQUE, &wire);
        assert_eq!(
            v.as_uuid().unwrap().to_string(),
            "01020304-0506-0708-090a-0b0c0d0e0f10"
        );
    }

    #[test]
    fn test_decode_guid_wrong_length_is_null() {
        assert_eq!(dec(TypeCode::UNIQUE, &[1; 15]), CellValue::Null);
        assert_eq!(dec(TypeCode::UNIQUE, &[1; 17]), CellValue::Null);
    }

    #[test]
    fn test_decode_unknown_type_is_bytes() {
        assert_eq!(
            dec(TypeCode(200), &[9, 9]),
            CellValue::Bytes(Bytes::from_static(&[9, 9]))
        );
    }

    #[test]
    fn test_parse_datetime_text_patterns() {
        let v = parse_datetime_text("2024-03-01 10:20:30.1234567").unwrap();
        assert_eq!(v.as_datetime().unwrap().to_string(), "2024-03-01 10:20:30.123456700");

        let v = parse_datetime_text("2024-03-01 10:20:30.5 +05:30").unwrap();
        assert!(matches!(v, CellValue::DateTimeOffset(_)));

        let v = parse_datetime_text("2024-03-01").unwrap();
        assert_eq!(v.as_datetime().unwrap().to_string(), "2024-03-01 00:00:00");

        let v = parse_datetime_text("13:45:00.25").unwrap();
        assert_eq!(v.as_datetime().unwrap().to_string(), "1900-01-01 13:45:00.250");

        let v = parse_datetime_text("Jan  2 2024 01:15:30:123PM").unwrap();
        assert_eq!(v.as_datetime().unwrap().to_string(), "2024-01-02 13:15:30.123");

        let v = parse_datetime_text("10:15:30:1230000AM").unwrap();
        assert_eq!(v.as_datetime().unwrap().to_string(), "1900-01-01 10:15:30.123");

        assert!(parse_datetime_text("not a date").is_none());
    }
}
