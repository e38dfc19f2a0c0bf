//! A pure-Rust [`Converter`] over db-lib's in-memory value layouts.
//!
//! Used by the test double and by tools that decode captured row data
//! without the native library. The layouts are the ones db-lib hands out
//! from `dbdata` for each type:
//!
//! | Type | Layout |
//! |------|--------|
//! | `datetime` | `i32` days since 1900-01-01, `u32` 1/300 s ticks (LE) |
//! | `smalldatetime` | `u16` days since 1900-01-01, `u16` minutes (LE) |
//! | `date` | 3-byte LE days since 0001-01-01 |
//! | `time` | 5-byte LE count of 100 ns ticks |
//! | `datetime2` | `time` followed by `date` |
//! | `datetimeoffset` | `datetime2` in UTC followed by `i16` offset minutes |
//! | `decimal`/`numeric` | precision, scale, sign (1 = negative), BE magnitude |
//! | `money` | `i32` high, `u32` low (LE), 1/10000 units |
//! | `smallmoney` | `i32` 1/10000 units |

use bytes::{Buf, BufMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use tds_native::{ConvertError, Converter, DateRecord, TypeCode};

use crate::value::CellValue;

const TICKS_PER_SECOND: u64 = 300;
const TIME_SCALE_7: u64 = 10_000_000;

fn epoch_1900() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
}

fn epoch_0001() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1, 1, 1)
}

/// Converter for db-lib value layouts, implemented without the library.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireConverter;

impl Converter for WireConverter {
    fn convert(
        &self,
        src_type: TypeCode,
        src: &[u8],
        dst_type: TypeCode,
        dst: &mut [u8],
    ) -> Result<usize, ConvertError> {
        let out: Vec<u8> = match (src_type, dst_type) {
            (TypeCode::DATETIME4 | TypeCode::DATETIMN, TypeCode::DATETIME) if src.len() == 4 => {
                let mut buf = src;
                let days = i32::from(buf.get_u16_le());
                let minutes = u32::from(buf.get_u16_le());
                let mut out = Vec::with_capacity(8);
                out.put_i32_le(days);
                out.put_u32_le(minutes * 60 * 300);
                out
            }
            (_, TypeCode::CHAR) => render_text(src_type, src)?.into_bytes(),
            _ => {
                return Err(ConvertError::Unsupported {
                    from: src_type,
                    to: dst_type,
                });
            }
        };

        if dst.len() < out.len() {
            return Err(ConvertError::Overflow {
                needed: Some(out.len()),
            });
        }
        dst[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    fn crack_datetime(&self, src: &[u8]) -> Option<DateRecord> {
        if src.len() != 8 {
            return None;
        }
        let mut buf = src;
        let days = buf.get_i32_le();
        let ticks = u64::from(buf.get_u32_le());
        let date = epoch_1900()?.checked_add_signed(chrono::Duration::days(i64::from(days)))?;
        let millis = (ticks * 1000 + TICKS_PER_SECOND / 2) / TICKS_PER_SECOND;
        let secs = u32::try_from(millis / 1000).ok()?;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(
            secs,
            u32::try_from(millis % 1000).ok()? * 1_000_000,
        )?;
        Some(DateRecord {
            year: date.year(),
            month0: i32::try_from(date.month0()).ok()?,
            day: i32::try_from(date.day()).ok()?,
            hour: i32::try_from(time.hour()).ok()?,
            minute: i32::try_from(time.minute()).ok()?,
            second: i32::try_from(time.second()).ok()?,
            nanosecond: i32::try_from(time.nanosecond()).ok()?,
        })
    }
}

fn render_text(src_type: TypeCode, src: &[u8]) -> Result<String, ConvertError> {
    match src_type {
        TypeCode::DATE => read_date(src)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .ok_or(ConvertError::Malformed),
        TypeCode::TIME => read_time(src)
            .map(|t| t.format("%H:%M:%S%.f").to_string())
            .ok_or(ConvertError::Malformed),
        TypeCode::DATETIME2 => read_datetime2(src)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            .ok_or(ConvertError::Malformed),
        TypeCode::DATETIMEOFFSET => render_offset(src).ok_or(ConvertError::Malformed),
        TypeCode::DECIMAL | TypeCode::NUMERIC => render_numeric(src),
        TypeCode::MONEY | TypeCode::MONEY4 | TypeCode::MONEYN => render_money(src),
        other => Err(ConvertError::Unsupported {
            from: other,
            to: TypeCode::CHAR,
        }),
    }
}

fn read_date(src: &[u8]) -> Option<NaiveDate> {
    if src.len() != 3 {
        return None;
    }
    let days = u32::from(src[0]) | (u32::from(src[1]) << 8) | (u32::from(src[2]) << 16);
    epoch_0001()?.checked_add_signed(chrono::Duration::days(i64::from(days)))
}

fn read_time(src: &[u8]) -> Option<NaiveTime> {
    if src.len() != 5 {
        return None;
    }
    let ticks = src
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let secs = u32::try_from(ticks / TIME_SCALE_7).ok()?;
    let nanos = u32::try_from((ticks % TIME_SCALE_7) * 100).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

fn read_datetime2(src: &[u8]) -> Option<NaiveDateTime> {
    if src.len() != 8 {
        return None;
    }
    Some(read_date(&src[5..])?.and_time(read_time(&src[..5])?))
}

fn render_offset(src: &[u8]) -> Option<String> {
    if src.len() != 10 {
        return None;
    }
    let utc = read_datetime2(&src[..8])?;
    let offset = i16::from_le_bytes([src[8], src[9]]);
    let local = utc.checked_add_signed(chrono::Duration::minutes(i64::from(offset)))?;
    let sign = if offset < 0 { '-' } else { '+' };
    let abs = offset.unsigned_abs();
    Some(format!(
        "{} {sign}{:02}:{:02}",
        local.format("%Y-%m-%d %H:%M:%S%.f"),
        abs / 60,
        abs % 60
    ))
}

fn render_numeric(src: &[u8]) -> Result<String, ConvertError> {
    if src.len() < 3 || src.len() > 3 + 16 {
        return Err(ConvertError::Malformed);
    }
    let scale = usize::from(src[1]);
    let negative = src[2] == 1;
    let magnitude = src[3..]
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
    Ok(render_scaled(negative, magnitude, scale))
}

fn render_money(src: &[u8]) -> Result<String, ConvertError> {
    let mut buf = src;
    let units: i64 = match src.len() {
        4 => i64::from(buf.get_i32_le()),
        8 => {
            let high = i64::from(buf.get_i32_le());
            let low = i64::from(buf.get_u32_le());
            (high << 32) | low
        }
        _ => return Err(ConvertError::Malformed),
    };
    Ok(render_scaled(units < 0, u128::from(units.unsigned_abs()), 4))
}

fn render_scaled(negative: bool, magnitude: u128, scale: usize) -> String {
    let digits = format!("{magnitude:0>width$}", width = scale + 1);
    let (int, frac) = digits.split_at(digits.len() - scale);
    let sign = if negative && magnitude != 0 { "-" } else { "" };
    if scale == 0 {
        format!("{sign}{int}")
    } else {
        format!("{sign}{int}.{frac}")
    }
}

impl WireConverter {
    /// Produce the db-lib type code and in-memory bytes for a value, the
    /// inverse of decoding through this converter. `None` data is NULL.
    ///
    /// Strings are UTF-8 `varchar`, date-times `datetime2`, decimals
    /// `numeric` and identifiers the mixed-endian `uniqueidentifier` form.
    #[must_use]
    pub fn to_native(value: &CellValue) -> (TypeCode, Option<Vec<u8>>) {
        match value {
            CellValue::Null => (TypeCode::BIG_VARCHAR, None),
            CellValue::String(s) => (TypeCode::BIG_VARCHAR, Some(s.as_bytes().to_vec())),
            CellValue::Int16(v) => (TypeCode::INT2, Some(v.to_le_bytes().to_vec())),
            CellValue::Int32(v) => (TypeCode::INT4, Some(v.to_le_bytes().to_vec())),
            CellValue::Int64(v) => (TypeCode::INT8, Some(v.to_le_bytes().to_vec())),
            CellValue::UInt16(v) => (TypeCode::UINT2, Some(v.to_le_bytes().to_vec())),
            CellValue::UInt32(v) => (TypeCode::UINT4, Some(v.to_le_bytes().to_vec())),
            CellValue::UInt64(v) => (TypeCode::UINT8, Some(v.to_le_bytes().to_vec())),
            CellValue::Float32(v) => (TypeCode::REAL, Some(v.to_le_bytes().to_vec())),
            CellValue::Float64(v) => (TypeCode::FLT8, Some(v.to_le_bytes().to_vec())),
            CellValue::Bool(v) => (TypeCode::BIT, Some(vec![u8::from(*v)])),
            CellValue::Decimal(d) => (TypeCode::NUMERIC, Some(numeric_bytes(*d))),
            CellValue::DateTime(dt) => (TypeCode::DATETIME2, datetime2_bytes(*dt)),
            CellValue::DateTimeOffset(dto) => {
                let offset_minutes = dto.offset().local_minus_utc() / 60;
                let data = datetime2_bytes(dto.naive_utc()).map(|mut b| {
                    b.extend_from_slice(&i16::try_from(offset_minutes).unwrap_or(0).to_le_bytes());
                    b
                });
                (TypeCode::DATETIMEOFFSET, data)
            }
            CellValue::Bytes(b) => (TypeCode::BIG_VARBINARY, Some(b.to_vec())),
            CellValue::Uuid(u) => (TypeCode::UNIQUE, Some(u.to_bytes_le().to_vec())),
            CellValue::Object(v) => (TypeCode::BIG_VARCHAR, Some(v.to_string().into_bytes())),
        }
    }
}

/// db-lib `datetime` bytes for a date-time, rounded to 1/300 s.
#[must_use]
pub fn datetime_bytes(dt: NaiveDateTime) -> Option<[u8; 8]> {
    let days = i32::try_from((dt.date() - epoch_1900()?).num_days()).ok()?;
    let nanos = u64::from(dt.num_seconds_from_midnight()) * 1_000_000_000
        + u64::from(dt.nanosecond() % 1_000_000_000);
    let ticks = u32::try_from((nanos * TICKS_PER_SECOND + 500_000_000) / 1_000_000_000).ok()?;
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&days.to_le_bytes());
    out[4..].copy_from_slice(&ticks.to_le_bytes());
    Some(out)
}

/// db-lib `money` bytes for a decimal, truncated to 4 places.
#[must_use]
pub fn money_bytes(value: Decimal) -> Option<[u8; 8]> {
    let mut scaled = value;
    scaled.rescale(4);
    let units = i64::try_from(scaled.mantissa()).ok()?;
    let high = i32::try_from(units >> 32).ok()?;
    // Low half is the raw bit pattern of the bottom 32 bits.
    let low = (units & 0xFFFF_FFFF) as u32;
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&high.to_le_bytes());
    out[4..].copy_from_slice(&low.to_le_bytes());
    Some(out)
}

fn datetime2_bytes(dt: NaiveDateTime) -> Option<Vec<u8>> {
    let days = u32::try_from((dt.date() - epoch_0001()?).num_days()).ok()?;
    let ticks = u64::from(dt.num_seconds_from_midnight()) * TIME_SCALE_7
        + u64::from(dt.nanosecond() % 1_000_000_000) / 100;
    let mut out = Vec::with_capacity(10);
    out.extend_from_slice(&ticks.to_le_bytes()[..5]);
    out.extend_from_slice(&days.to_le_bytes()[..3]);
    Some(out)
}

fn numeric_bytes(value: Decimal) -> Vec<u8> {
    let mut out = vec![38, u8::try_from(value.scale()).unwrap_or(0)];
    out.push(u8::from(value.is_sign_negative() && !value.is_zero()));
    out.extend_from_slice(&value.mantissa().unsigned_abs().to_be_bytes());
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn text(code: TypeCode, src: &[u8]) -> String {
        let mut dst = [0u8; 128];
        let n = WireConverter.convert(code, src, TypeCode::CHAR, &mut dst).unwrap();
        String::from_utf8(dst[..n].to_vec()).unwrap()
    }

    #[test]
    fn test_crack_datetime() {
        let dt = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 997)
            .unwrap();
        let rec = WireConverter.crack_datetime(&datetime_bytes(dt).unwrap()).unwrap();
        assert_eq!((rec.year, rec.month0, rec.day), (2023, 11, 31));
        assert_eq!((rec.hour, rec.minute, rec.second), (23, 59, 59));
        assert_eq!(rec.nanosecond, 997_000_000);
    }

    #[test]
    fn test_smalldatetime_widens() {
        let mut src = Vec::new();
        src.extend_from_slice(&1u16.to_le_bytes());
        src.extend_from_slice(&90u16.to_le_bytes());
        let mut dst = [0u8; 8];
        let n = WireConverter
            .convert(TypeCode::DATETIME4, &src, TypeCode::DATETIME, &mut dst)
            .unwrap();
        assert_eq!(n, 8);
        let rec = WireConverter.crack_datetime(&dst).unwrap();
        assert_eq!((rec.year, rec.month(), rec.day, rec.hour, rec.minute), (1900, 1, 2, 1, 30));
    }

    #[test]
    fn test_render_numeric_and_money() {
        let (_, data) = WireConverter::to_native(&CellValue::Decimal(Decimal::from_str("-12.340").unwrap()));
        assert_eq!(text(TypeCode::NUMERIC, &data.unwrap()), "-12.340");
        assert_eq!(text(TypeCode::DECIMAL, &[10, 2, 0, 0x05]), "0.05");
        let money = money_bytes(Decimal::from_str("1234.5").unwrap()).unwrap();
        assert_eq!(text(TypeCode::MONEY, &money), "1234.5000");
        assert_eq!(text(TypeCode::MONEY4, &(-15000i32).to_le_bytes()), "-1.5000");
    }

    #[test]
    fn test_render_datetime2_and_offset() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_micro_opt(7, 8, 9, 123_456)
            .unwrap();
        let (code, data) = WireConverter::to_native(&CellValue::DateTime(dt));
        assert_eq!(code, TypeCode::DATETIME2);
        assert_eq!(text(code, &data.unwrap()), "2024-05-06 07:08:09.123456");

        let offset = chrono::FixedOffset::east_opt(-5 * 3600).unwrap();
        let dto = dt.and_local_timezone(offset).unwrap();
        let (code, data) = WireConverter::to_native(&CellValue::DateTimeOffset(dto));
        assert_eq!(text(code, &data.unwrap()), "2024-05-06 07:08:09.123456 -05:00");
    }

    #[test]
    fn test_overflow_reports_needed() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let (code, data) = WireConverter::to_native(&CellValue::DateTime(dt));
        let mut small = [0u8; 4];
        let err = WireConverter
            .convert(code, &data.unwrap(), TypeCode::CHAR, &mut small)
            .unwrap_err();
        assert_eq!(err, ConvertError::Overflow { needed: Some(19) });
    }

    #[test]
    fn test_unsupported_pair() {
        let mut dst = [0u8; 8];
        assert!(matches!(
            WireConverter.convert(TypeCode::INT4, &[0; 4], TypeCode::DATETIME, &mut dst),
            Err(ConvertError::Unsupported { .. })
        ));
    }
}
