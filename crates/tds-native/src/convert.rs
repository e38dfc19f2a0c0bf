//! The native conversion routines the codec delegates to.
//!
//! Legacy date/time values are cracked into a [`DateRecord`] and decimal,
//! money and modern date/time values are rendered to text by the native
//! library. The codec only sees this trait, so a pure-Rust implementation
//! can stand in for the library in tests and tools.

use thiserror::Error;

use crate::types::TypeCode;

/// Failure of a single conversion call.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The destination buffer was too small. `needed` is the required size
    /// when the converter knows it.
    #[error("destination buffer too small (needed {needed:?})")]
    Overflow {
        /// Required destination size, if known.
        needed: Option<usize>,
    },

    /// No conversion exists between the two types.
    #[error("no conversion from {from} to {to}")]
    Unsupported {
        /// Source type.
        from: TypeCode,
        /// Destination type.
        to: TypeCode,
    },

    /// The source bytes are not a valid value of the source type.
    #[error("malformed source value")]
    Malformed,
}

/// Calendar fields produced by cracking a legacy date/time value.
///
/// `month0` is zero-based, as the native library reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRecord {
    /// Year (1753-9999 for `datetime`).
    pub year: i32,
    /// Month, 0-11.
    pub month0: i32,
    /// Day of month, 1-31.
    pub day: i32,
    /// Hour, 0-23.
    pub hour: i32,
    /// Minute, 0-59.
    pub minute: i32,
    /// Second, 0-59.
    pub second: i32,
    /// Fractional second in nanoseconds.
    pub nanosecond: i32,
}

impl DateRecord {
    /// One-based month.
    #[must_use]
    pub const fn month(&self) -> i32 {
        self.month0 + 1
    }
}

/// Byte order the native library expects for outbound `uniqueidentifier`
/// parameter data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GuidLayout {
    /// Wire layout: first three fields little-endian, last eight bytes as-is.
    #[default]
    MixedEndian,
    /// Canonical RFC 4122 byte order; the library swaps on its own.
    BigEndian,
}

/// Conversion services of the native library.
pub trait Converter {
    /// Convert `src` of type `src_type` into `dst` as `dst_type`, returning
    /// the number of bytes written.
    fn convert(
        &self,
        src_type: TypeCode,
        src: &[u8],
        dst_type: TypeCode,
        dst: &mut [u8],
    ) -> Result<usize, ConvertError>;

    /// Crack an 8-byte `datetime` value into calendar fields.
    ///
    /// Returns `None` when the value is out of range or the library refuses.
    fn crack_datetime(&self, src: &[u8]) -> Option<DateRecord>;
}
