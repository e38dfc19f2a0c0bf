//! Remote procedure calls.
//!
//! Parameters are encoded once into an owned [`RpcRequest`]; the request is
//! borrowed for the whole native call, so every bound buffer outlives it.
//! Output parameters reserve [`OUTPUT_BUFFER_CAPACITY`] bytes because their
//! final length is unknown before the call.
//!
//! After the results are read, every return-value slot the library reports
//! is decoded into [`QueryResult::output_params`], and the return status is
//! copied if the procedure set one. Missing slots are simply absent.
//!
//! [`OUTPUT_BUFFER_CAPACITY`]: tds_native::OUTPUT_BUFFER_CAPACITY

use mssql_types::{CellValue, Decoder, ToSql, declared_type, encode};
use tds_native::{ConnectionHandle, GuidLayout, NativeError, RpcParam, RpcRequest};

use crate::assembler::ResultAssembler;
use crate::error::{Error, Result};
use crate::executor::Session;
use crate::result::QueryResult;

/// Name of the parameterized-batch system procedure.
pub const EXECUTESQL: &str = "sp_executesql";

/// Parameter direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ParamDirection {
    /// Sent to the server only.
    #[default]
    Input,
    /// Sent, then replaced by the value the server writes back.
    Output,
}

/// A procedure parameter.
///
/// The value of an output parameter also fixes its wire type, so give it a
/// placeholder of the right kind (for example `0i32`) rather than NULL.
///
/// db-lib sends a zero-length value as NULL, so an empty string or empty
/// binary value reaches the server as NULL. Use `COALESCE(@p, '')` on the
/// server side where the difference matters.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name, with or without the leading `@`.
    pub name: String,
    /// Value to send.
    pub value: CellValue,
    /// Direction.
    pub direction: ParamDirection,
}

impl Parameter {
    /// Create an input parameter.
    pub fn input(name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction: ParamDirection::Input,
        }
    }

    /// Create an output parameter with an initial value.
    pub fn output(name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction: ParamDirection::Output,
        }
    }

    /// Create an input parameter from anything implementing [`ToSql`].
    pub fn from_value<T: ToSql + ?Sized>(name: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Self::input(name, value.to_sql()?))
    }

    /// Whether the server writes this parameter back.
    #[must_use]
    pub fn is_output(&self) -> bool {
        self.direction == ParamDirection::Output
    }

    /// Name with exactly one leading `@`.
    #[must_use]
    pub fn wire_name(&self) -> String {
        format!("@{}", self.name.trim_start_matches('@'))
    }

    fn to_rpc(&self, guid_layout: GuidLayout) -> Result<RpcParam> {
        let encoded = encode(&self.value, guid_layout)?;
        let data = encoded.data.map(|b| b.to_vec());
        Ok(match self.direction {
            ParamDirection::Input => RpcParam::input(self.wire_name(), encoded.type_code, data),
            ParamDirection::Output => RpcParam::output(self.wire_name(), encoded.type_code, data),
        })
    }
}

/// Build the request for `procedure`.
pub fn build_request(
    procedure: &str,
    params: &[Parameter],
    guid_layout: GuidLayout,
) -> Result<RpcRequest> {
    if procedure.trim().is_empty() {
        return Err(Error::Configuration("procedure name is empty".into()));
    }
    let mut request = RpcRequest::new(procedure);
    for param in params {
        request.push(param.to_rpc(guid_layout)?);
    }
    Ok(request)
}

/// The `@params` declaration for a parameterized batch:
/// `@a int, @b nvarchar(4000) OUTPUT`.
#[must_use]
pub fn signature(params: &[Parameter]) -> String {
    params
        .iter()
        .map(|p| {
            let mut decl = format!("{} {}", p.wire_name(), declared_type(&p.value));
            if p.is_output() {
                decl.push_str(" OUTPUT");
            }
            decl
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build an `sp_executesql` request: the statement, the generated
/// signature, then the parameter values.
pub fn executesql_request(
    sql: &str,
    params: &[Parameter],
    guid_layout: GuidLayout,
) -> Result<RpcRequest> {
    if sql.trim().is_empty() {
        return Err(Error::Configuration("no command text".into()));
    }
    let mut synthetic = Vec::with_capacity(params.len() + 2);
    synthetic.push(Parameter::input("@stmt", sql));
    if !params.is_empty() {
        synthetic.push(Parameter::input("@params", signature(params)));
    }
    synthetic.extend(params.iter().cloned());
    build_request(EXECUTESQL, &synthetic, guid_layout)
}

impl Session {
    /// Send `request` and read its results, outputs and return status.
    pub(crate) fn call(&mut self, request: &RpcRequest) -> Result<QueryResult> {
        tracing::debug!(
            procedure = %request.procedure,
            params_count = request.params.len(),
            outputs = request.output_count(),
            "calling procedure"
        );
        let outcome = {
            let (conn, decoder) = self.begin_command()?;
            run_rpc(conn, decoder, request)
        };
        match outcome {
            Ok(result) => {
                self.flush_messages();
                Ok(result)
            }
            Err(e) => Err(self.execution_error(e)),
        }
    }
}

fn run_rpc(
    conn: &mut dyn ConnectionHandle,
    decoder: &mut Decoder,
    request: &RpcRequest,
) -> std::result::Result<QueryResult, NativeError> {
    conn.rpc(request)?;
    let mut result = ResultAssembler::new(conn, decoder).read_all()?;

    for index in 0..conn.return_count() {
        let Some(name) = conn.return_name(index) else {
            continue;
        };
        let data = conn.return_data(index);
        let value = decoder.decode(
            conn.return_type(index),
            data,
            data.map_or(0, <[u8]>::len),
            conn.converter(),
        );
        tracing::trace!(name = %name, value = %value, "output parameter");
        result.output_params.insert(name, value);
    }
    result.return_status = conn.return_status();

    Ok(result)
}
