//! Bulk-copy row fields.

use crate::error::{NativeError, Result};

/// Bulk-copy direction: rows flow into the table.
pub const BCP_DIRECTION_IN: i32 = 1;

/// Size of the terminator written after each text value.
pub const TERMINATOR_LEN: usize = 1;

/// How a column is described to `bcp_bind`.
///
/// The column's data address is supplied per row (`bcp_colptr`) together
/// with its exact length (`bcp_collen`), so the binding carries neither a
/// length prefix nor a terminator: db-lib rejects either one when no
/// address is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BcpBinding {
    /// Length prefix size in bytes.
    pub prefix_len: i32,
    /// Maximum data length in bytes.
    pub var_len: i32,
    /// Terminator size in bytes.
    pub term_len: i32,
}

impl BcpBinding {
    /// Binding for a column buffer of `capacity` bytes.
    pub fn for_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(NativeError::InvalidArgument("bulk column capacity is 0".into()));
        }
        let var_len = i32::try_from(capacity)
            .map_err(|_| NativeError::InvalidArgument(format!("capacity {capacity}")))?;
        Ok(Self {
            prefix_len: 0,
            var_len,
            term_len: 0,
        })
    }
}

/// One column of a row being sent through bulk copy.
///
/// `buffer` is the column's bound storage (text followed by a NUL
/// terminator). `len` is the effective length for this row; `None` sends
/// NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BcpField<'a> {
    /// Bound column buffer.
    pub buffer: &'a [u8],
    /// Effective length in bytes, excluding the terminator.
    pub len: Option<usize>,
}

impl<'a> BcpField<'a> {
    /// The bytes that will be sent for this row, or `None` for NULL.
    #[must_use]
    pub fn value(&self) -> Option<&'a [u8]> {
        self.len.map(|len| &self.buffer[..len.min(self.buffer.len())])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_has_no_prefix_or_terminator() {
        let binding = BcpBinding::for_capacity(8000).unwrap();
        assert_eq!(binding.prefix_len, 0);
        assert_eq!(binding.term_len, 0);
        assert_eq!(binding.var_len, 8000);
    }

    #[test]
    fn test_binding_rejects_bad_capacity() {
        assert!(BcpBinding::for_capacity(0).is_err());
        assert!(BcpBinding::for_capacity(usize::MAX).is_err());
    }

    #[test]
    fn test_field_value() {
        let buf = b"abc\0\0\0";
        let field = BcpField {
            buffer: buf,
            len: Some(3),
        };
        assert_eq!(field.value(), Some(&b"abc"[..]));

        let null = BcpField {
            buffer: buf,
            len: None,
        };
        assert_eq!(null.value(), None);
    }
}
