//! Remote procedure call request shape handed to the native library.
//!
//! Parameter data is owned by the request, and the request is borrowed for
//! the whole native call sequence (init, bind, send, completion), so every
//! bound buffer stays valid until the call returns.

use crate::types::TypeCode;

/// Capacity reserved for an output parameter whose final length is unknown.
pub const OUTPUT_BUFFER_CAPACITY: i32 = 8000;

/// One bound RPC parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcParam {
    /// Parameter name including the leading `@`; empty for positional.
    pub name: String,
    /// Whether the server copies a value back after execution.
    pub output: bool,
    /// Wire type of `data`.
    pub type_code: TypeCode,
    /// Maximum length the library may write back; `None` for inputs.
    pub max_len: Option<i32>,
    /// Encoded value, `None` for NULL.
    pub data: Option<Vec<u8>>,
}

impl RpcParam {
    /// Create an input parameter.
    pub fn input(name: impl Into<String>, type_code: TypeCode, data: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            output: false,
            type_code,
            max_len: None,
            data,
        }
    }

    /// Create an output parameter with [`OUTPUT_BUFFER_CAPACITY`] bytes
    /// reserved for the returned value.
    pub fn output(name: impl Into<String>, type_code: TypeCode, data: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            output: true,
            type_code,
            max_len: Some(OUTPUT_BUFFER_CAPACITY),
            data,
        }
    }

    /// Length of the bound data; 0 means NULL.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

/// A procedure call with its parameters in binding order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcRequest {
    /// Procedure name (`sp_executesql`, `dbo.usp_x`, ...).
    pub procedure: String,
    /// Parameters in declaration order.
    pub params: Vec<RpcParam>,
}

impl RpcRequest {
    /// Start a call to `procedure`.
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, param: RpcParam) -> Self {
        self.params.push(param);
        self
    }

    /// Append a parameter in place.
    pub fn push(&mut self, param: RpcParam) {
        self.params.push(param);
    }

    /// Number of output parameters.
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.params.iter().filter(|p| p.output).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_reserves_capacity() {
        let p = RpcParam::output("@out", TypeCode::INT4, None);
        assert!(p.output);
        assert_eq!(p.max_len, Some(OUTPUT_BUFFER_CAPACITY));
        assert_eq!(p.data_len(), 0);
    }

    #[test]
    fn test_request_builder() {
        let req = RpcRequest::new("dbo.usp_double")
            .param(RpcParam::input("@in", TypeCode::INT4, Some(21i32.to_le_bytes().to_vec())))
            .param(RpcParam::output("@out", TypeCode::INT4, None));
        assert_eq!(req.params.len(), 2);
        assert_eq!(req.output_count(), 1);
        assert_eq!(req.params[0].data_len(), 4);
    }
}
