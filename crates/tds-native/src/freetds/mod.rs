//! FreeTDS db-lib implementation of the native traits.
//!
//! db-lib reports server messages and library errors through two
//! process-wide callbacks. They are registered once by [`FreeTds::init`] and
//! file every message under the `DBPROCESS` pointer it belongs to (0 while
//! no connection exists yet, e.g. during login), where the owning
//! [`ConnectionHandle`] drains them.

#![allow(unsafe_code)]

mod sys;

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::bootstrap::Bootstrap;
use crate::bulk::{BCP_DIRECTION_IN, BcpBinding, BcpField};
use crate::convert::{ConvertError, Converter, DateRecord};
use crate::error::{NativeError, Result};
use crate::library::{ConnectionHandle, LoginHandle, NativeLibrary, ResultsStatus, RowStatus};
use crate::login::{LoginOption, SessionOption};
use crate::message::{OpenCapture, SERVER_MESSAGE_NOTICE, ServerMessage, failure_detail};
use crate::rpc::RpcRequest;
use crate::types::TypeCode;

static BOOTSTRAP: Bootstrap = Bootstrap::new();

static MESSAGES: Lazy<Mutex<HashMap<usize, Vec<ServerMessage>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

const NO_PROCESS: usize = 0;

fn key(dbproc: *mut sys::DBPROCESS) -> usize {
    dbproc as usize
}

fn record(dbproc: *mut sys::DBPROCESS, message: ServerMessage) {
    // While a connection is opening, the DBPROCESS is not ours yet.
    if let Some(message) = OpenCapture::offer(message) {
        MESSAGES.lock().entry(key(dbproc)).or_default().push(message);
    }
}

fn take_messages(key: usize) -> Vec<ServerMessage> {
    MESSAGES.lock().remove(&key).unwrap_or_default()
}

fn peek_detail(key: usize) -> String {
    MESSAGES
        .lock()
        .get(&key)
        .and_then(|m| failure_detail(m))
        .unwrap_or_else(|| "no message from server".to_string())
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn string_from(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| NativeError::InvalidArgument(format!("interior NUL in {value:?}")))
}

fn seconds(duration: Duration) -> c_int {
    c_int::try_from(duration.as_secs()).unwrap_or(c_int::MAX)
}

unsafe extern "C" fn on_error(
    dbproc: *mut sys::DBPROCESS,
    severity: c_int,
    dberr: c_int,
    _oserr: c_int,
    dberrstr: *mut c_char,
    oserrstr: *mut c_char,
) -> c_int {
    if dberr == SERVER_MESSAGE_NOTICE {
        return sys::INT_CANCEL;
    }
    // SAFETY: db-lib passes NUL-terminated strings or null.
    let text = unsafe { string_from(dberrstr) }.unwrap_or_default();
    let os = unsafe { string_from(oserrstr) };
    let message = match os {
        Some(os) if !os.is_empty() => format!("{text} ({os})"),
        _ => text,
    };
    record(dbproc, ServerMessage::new(dberr, message, severity.max(11)));
    sys::INT_CANCEL
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn on_message(
    dbproc: *mut sys::DBPROCESS,
    msgno: sys::DBINT,
    msgstate: c_int,
    severity: c_int,
    msgtext: *mut c_char,
    srvname: *mut c_char,
    procname: *mut c_char,
    line: c_int,
) -> c_int {
    // SAFETY: db-lib passes NUL-terminated strings or null.
    let message = unsafe { string_from(msgtext) }.unwrap_or_default();
    let server = unsafe { string_from(srvname) }.filter(|s| !s.is_empty());
    let procedure = unsafe { string_from(procname) }.filter(|s| !s.is_empty());
    record(
        dbproc,
        ServerMessage {
            number: msgno,
            message,
            severity,
            state: msgstate,
            server,
            procedure,
            line,
        },
    );
    0
}

/// FreeTDS db-lib (`libsybdb`).
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeTds;

impl FreeTds {
    /// Create the library handle. Initialization happens on first use.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NativeLibrary for FreeTds {
    fn name(&self) -> &'static str {
        "freetds"
    }

    fn init(&self) -> Result<()> {
        BOOTSTRAP.run(|| {
            // SAFETY: dbinit and handler registration take no pointers from us
            // besides the two callbacks, which are 'static functions.
            unsafe {
                if sys::dbinit() == sys::FAIL {
                    return Err(NativeError::InitFailed("dbinit returned FAIL".into()));
                }
                sys::dberrhandle(Some(on_error));
                sys::dbmsghandle(Some(on_message));
            }
            Ok(())
        })
    }

    fn new_login(&self) -> Result<Box<dyn LoginHandle>> {
        // SAFETY: dblogin has no preconditions beyond dbinit.
        let raw = unsafe { sys::dblogin() };
        let login = NonNull::new(raw).ok_or(NativeError::AllocationFailed("login record"))?;
        Ok(Box::new(Login { login, port: None }))
    }
}

struct Login {
    login: NonNull<sys::LOGINREC>,
    port: Option<u16>,
}

impl Login {
    fn set_name(&mut self, value: &str, which: c_int) -> Result<()> {
        let value = c_string(value)?;
        // SAFETY: the login record is live and `value` outlives the call.
        let rc = unsafe { sys::dbsetlname(self.login.as_ptr(), value.as_ptr(), which) };
        check(rc, "dbsetlname", NO_PROCESS)
    }

    fn set_bool(&mut self, value: bool, which: c_int) -> Result<()> {
        // SAFETY: the login record is live.
        let rc = unsafe { sys::dbsetlbool(self.login.as_ptr(), c_int::from(value), which) };
        check(rc, "dbsetlbool", NO_PROCESS)
    }
}

impl LoginHandle for Login {
    fn apply(&mut self, option: &LoginOption) -> Result<()> {
        match option {
            LoginOption::User(user) => self.set_name(user, sys::DBSETUSER),
            LoginOption::Password(password) => self.set_name(password, sys::DBSETPWD),
            LoginOption::AppName(app) => self.set_name(app, sys::DBSETAPP),
            LoginOption::Port(port) => {
                self.port = Some(*port);
                Ok(())
            }
            LoginOption::Encryption(mode) => self.set_name(mode.as_native(), sys::DBSETENCRYPTION),
            LoginOption::NtlmV2(v) => self.set_bool(*v, sys::DBSETNTLMV2),
            LoginOption::NetworkAuth(v) => self.set_bool(*v, sys::DBSETNETWORKAUTH),
            LoginOption::ReadOnlyIntent(v) => self.set_bool(*v, sys::DBSETREADONLY),
            LoginOption::WideChars(v) => self.set_bool(*v, sys::DBSETUTF16),
            LoginOption::BulkCopy(v) => self.set_bool(*v, sys::DBSETBCP),
            LoginOption::LoginTimeout(timeout) => {
                // SAFETY: process-wide setting, no pointers involved.
                let rc = unsafe { sys::dbsetlogintime(seconds(*timeout)) };
                check(rc, "dbsetlogintime", NO_PROCESS)
            }
        }
    }

    fn open(&mut self, server: &str) -> Result<Box<dyn ConnectionHandle>> {
        let target = match self.port {
            Some(port) => format!("{server}:{port}"),
            None => server.to_string(),
        };
        let c_target = c_string(&target)?;
        let capture = OpenCapture::begin();
        // SAFETY: the login record is live; msdblib = 0 keeps dbdatecrack
        // months zero-based.
        let raw = unsafe { sys::tdsdbopen(self.login.as_ptr(), c_target.as_ptr(), 0) };
        let messages = capture.finish();
        match NonNull::new(raw) {
            Some(dbproc) => {
                if !messages.is_empty() {
                    MESSAGES
                        .lock()
                        .entry(key(dbproc.as_ptr()))
                        .or_default()
                        .extend(messages);
                }
                Ok(Box::new(Connection {
                    dbproc,
                    converter: NativeConverter { dbproc },
                }))
            }
            None => {
                tracing::debug!(server = %target, messages = messages.len(), "login rejected");
                Err(NativeError::LoginRejected {
                    server: target,
                    detail: failure_detail(&messages)
                        .unwrap_or_else(|| "unable to connect".to_string()),
                })
            }
        }
    }
}

impl Drop for Login {
    fn drop(&mut self) {
        // SAFETY: allocated by dblogin and freed exactly once here.
        unsafe { sys::dbloginfree(self.login.as_ptr()) };
    }
}

fn check(rc: sys::RETCODE, call: &'static str, key: usize) -> Result<()> {
    if rc == sys::SUCCEED {
        return Ok(());
    }
    // Messages without a connection have no one else to drain them.
    let detail = if key == NO_PROCESS {
        failure_detail(&take_messages(key))
            .unwrap_or_else(|| "no message from library".to_string())
    } else {
        peek_detail(key)
    };
    Err(NativeError::call_failed(call, detail))
}

struct NativeConverter {
    dbproc: NonNull<sys::DBPROCESS>,
}

impl Converter for NativeConverter {
    fn convert(
        &self,
        src_type: TypeCode,
        src: &[u8],
        dst_type: TypeCode,
        dst: &mut [u8],
    ) -> std::result::Result<usize, ConvertError> {
        let src_len = sys::DBINT::try_from(src.len()).map_err(|_| ConvertError::Malformed)?;
        let dst_len = sys::DBINT::try_from(dst.len()).unwrap_or(sys::DBINT::MAX);
        // SAFETY: both buffers are valid for the lengths passed.
        let written = unsafe {
            sys::dbconvert(
                self.dbproc.as_ptr(),
                src_type.get(),
                src.as_ptr(),
                src_len,
                dst_type.get(),
                dst.as_mut_ptr(),
                dst_len,
            )
        };
        match usize::try_from(written) {
            Ok(n) => Ok(n.min(dst.len())),
            // db-lib reports overflow and malformed input alike; the caller
            // retries with more room and gives up past its limit.
            Err(_) if dst_type.get() == sys::SYBCHAR => Err(ConvertError::Overflow { needed: None }),
            Err(_) => Err(ConvertError::Unsupported {
                from: src_type,
                to: dst_type,
            }),
        }
    }

    fn crack_datetime(&self, src: &[u8]) -> Option<DateRecord> {
        let bytes: [u8; 8] = src.try_into().ok()?;
        let mut dt = sys::DBDATETIME {
            dtdays: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            dttime: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        };
        let mut rec = sys::DBDATEREC::default();
        // SAFETY: both structs are live locals of the declared layout.
        let rc = unsafe { sys::dbdatecrack(self.dbproc.as_ptr(), &mut rec, &mut dt) };
        if rc != sys::SUCCEED {
            return None;
        }
        Some(DateRecord {
            year: rec.dateyear,
            month0: rec.datemonth,
            day: rec.datedmonth,
            hour: rec.datehour,
            minute: rec.dateminute,
            second: rec.datesecond,
            nanosecond: rec.datemsecond.saturating_mul(1_000_000),
        })
    }
}

struct Connection {
    dbproc: NonNull<sys::DBPROCESS>,
    converter: NativeConverter,
}

impl Connection {
    fn ptr(&self) -> *mut sys::DBPROCESS {
        self.dbproc.as_ptr()
    }

    fn key(&self) -> usize {
        key(self.ptr())
    }

    fn column(index: usize) -> c_int {
        c_int::try_from(index + 1).unwrap_or(c_int::MAX)
    }

    /// # Safety
    /// `data` must be null or valid for `len` bytes for the lifetime of `self`'s
    /// current row.
    unsafe fn slice<'a>(data: *const u8, len: c_int) -> Option<&'a [u8]> {
        if data.is_null() {
            return None;
        }
        let len = usize::try_from(len).unwrap_or(0);
        // SAFETY: upheld by the caller.
        Some(unsafe { std::slice::from_raw_parts(data, len) })
    }
}

impl ConnectionHandle for Connection {
    fn use_database(&mut self, database: &str) -> Result<()> {
        let name = c_string(database)?;
        // SAFETY: live connection, `name` outlives the call.
        let rc = unsafe { sys::dbuse(self.ptr(), name.as_ptr()) };
        check(rc, "dbuse", self.key())
    }

    fn cancel(&mut self) -> Result<()> {
        // SAFETY: live connection.
        let rc = unsafe { sys::dbcancel(self.ptr()) };
        check(rc, "dbcancel", self.key())
    }

    fn set_option(&mut self, option: SessionOption) -> Result<()> {
        match option {
            SessionOption::TextSize(size) => {
                let value = c_string(&size.to_string())?;
                // SAFETY: live connection, `value` outlives the call.
                let rc = unsafe { sys::dbsetopt(self.ptr(), sys::DBTEXTSIZE, value.as_ptr(), 0) };
                check(rc, "dbsetopt", self.key())
            }
            SessionOption::QueryTimeout(timeout) => {
                // SAFETY: process-wide setting, no pointers involved.
                let rc = unsafe { sys::dbsettime(seconds(timeout)) };
                check(rc, "dbsettime", self.key())
            }
        }
    }

    fn submit(&mut self, sql: &str) -> Result<()> {
        let text = c_string(sql)?;
        // SAFETY: live connection, `text` outlives dbcmd which copies it.
        let rc = unsafe { sys::dbcmd(self.ptr(), text.as_ptr()) };
        check(rc, "dbcmd", self.key())?;
        // SAFETY: live connection.
        let rc = unsafe { sys::dbsqlexec(self.ptr()) };
        check(rc, "dbsqlexec", self.key())
    }

    fn results(&mut self) -> ResultsStatus {
        // SAFETY: live connection.
        match unsafe { sys::dbresults(self.ptr()) } {
            sys::SUCCEED => ResultsStatus::Succeed,
            sys::NO_MORE_RESULTS => ResultsStatus::NoMoreResults,
            _ => ResultsStatus::Fail,
        }
    }

    fn column_count(&self) -> usize {
        // SAFETY: live connection.
        usize::try_from(unsafe { sys::dbnumcols(self.ptr()) }).unwrap_or(0)
    }

    fn column_name(&self, column: usize) -> String {
        // SAFETY: live connection; the returned name is NUL-terminated.
        unsafe { string_from(sys::dbcolname(self.ptr(), Self::column(column))) }
            .unwrap_or_default()
    }

    fn column_type(&self, column: usize) -> TypeCode {
        // SAFETY: live connection.
        TypeCode(unsafe { sys::dbcoltype(self.ptr(), Self::column(column)) })
    }

    fn column_len(&self, column: usize) -> usize {
        // SAFETY: live connection.
        usize::try_from(unsafe { sys::dbcollen(self.ptr(), Self::column(column)) }).unwrap_or(0)
    }

    fn next_row(&mut self) -> RowStatus {
        // SAFETY: live connection.
        match unsafe { sys::dbnextrow(self.ptr()) } {
            sys::REG_ROW => RowStatus::Regular,
            sys::NO_MORE_ROWS => RowStatus::NoMoreRows,
            sys::BUF_FULL => RowStatus::BufferFull,
            id if id > 0 => RowStatus::Compute(id),
            _ => RowStatus::Fail,
        }
    }

    fn data(&self, column: usize) -> Option<&[u8]> {
        let col = Self::column(column);
        // SAFETY: the pointer stays valid until the next dbnextrow, which
        // needs `&mut self`.
        unsafe {
            let len = sys::dbdatlen(self.ptr(), col);
            Self::slice(sys::dbdata(self.ptr(), col), len)
        }
    }

    fn row_count(&self) -> Option<i64> {
        // SAFETY: live connection.
        let count = unsafe { sys::dbcount(self.ptr()) };
        (count >= 0).then(|| i64::from(count))
    }

    fn converter(&self) -> &dyn Converter {
        &self.converter
    }

    fn rpc(&mut self, request: &RpcRequest) -> Result<()> {
        let procedure = c_string(&request.procedure)?;
        let names = request
            .params
            .iter()
            .map(|p| c_string(&p.name))
            .collect::<Result<Vec<_>>>()?;

        // SAFETY: live connection; `procedure`, `names` and every parameter
        // buffer in `request` outlive the whole init/param/send/sqlok
        // sequence below.
        unsafe {
            check(sys::dbrpcinit(self.ptr(), procedure.as_ptr(), 0), "dbrpcinit", self.key())?;
            for (param, name) in request.params.iter().zip(&names) {
                let status = if param.output { sys::DBRPCRETURN } else { 0 };
                let fixed = param.type_code.is_fixed_length();
                let max_len = match param.max_len {
                    Some(capacity) if param.output && !fixed => capacity,
                    _ => -1,
                };
                let (value, data_len) = match &param.data {
                    Some(data) => {
                        let len = if fixed {
                            -1
                        } else {
                            sys::DBINT::try_from(data.len()).map_err(|_| {
                                NativeError::InvalidArgument(format!(
                                    "parameter {} too large",
                                    param.name
                                ))
                            })?
                        };
                        (data.as_ptr().cast_mut(), len)
                    }
                    None => (ptr::null_mut(), 0),
                };
                let name_ptr = if param.name.is_empty() {
                    ptr::null()
                } else {
                    name.as_ptr()
                };
                let rc = sys::dbrpcparam(
                    self.ptr(),
                    name_ptr,
                    status,
                    param.type_code.get(),
                    max_len,
                    data_len,
                    value,
                );
                check(rc, "dbrpcparam", self.key())?;
            }
            check(sys::dbrpcsend(self.ptr()), "dbrpcsend", self.key())?;
            check(sys::dbsqlok(self.ptr()), "dbsqlok", self.key())
        }
    }

    fn return_count(&self) -> usize {
        // SAFETY: live connection.
        usize::try_from(unsafe { sys::dbnumrets(self.ptr()) }).unwrap_or(0)
    }

    fn return_name(&self, index: usize) -> Option<String> {
        // SAFETY: live connection; the name is NUL-terminated.
        unsafe { string_from(sys::dbretname(self.ptr(), Self::column(index))) }
    }

    fn return_type(&self, index: usize) -> TypeCode {
        // SAFETY: live connection.
        TypeCode(unsafe { sys::dbrettype(self.ptr(), Self::column(index)) })
    }

    fn return_data(&self, index: usize) -> Option<&[u8]> {
        let num = Self::column(index);
        // SAFETY: return values stay valid until the next command, which
        // needs `&mut self`.
        unsafe {
            let len = sys::dbretlen(self.ptr(), num);
            Self::slice(sys::dbretdata(self.ptr(), num), len)
        }
    }

    fn return_status(&self) -> Option<i32> {
        // SAFETY: live connection.
        unsafe { (sys::dbhasretstat(self.ptr()) != 0).then(|| sys::dbretstatus(self.ptr())) }
    }

    fn bcp_init(&mut self, table: &str) -> Result<()> {
        let table = c_string(table)?;
        // SAFETY: live connection, `table` outlives the call.
        let rc = unsafe {
            sys::bcp_init(self.ptr(), table.as_ptr(), ptr::null(), ptr::null(), BCP_DIRECTION_IN)
        };
        check(rc, "bcp_init", self.key())
    }

    fn bcp_bind(&mut self, column: usize, capacity: usize) -> Result<()> {
        let binding = BcpBinding::for_capacity(capacity)?;
        // SAFETY: live connection; data pointers and lengths are supplied per
        // row with bcp_colptr/bcp_collen before every bcp_sendrow.
        let rc = unsafe {
            sys::bcp_bind(
                self.ptr(),
                ptr::null_mut(),
                binding.prefix_len,
                binding.var_len,
                ptr::null(),
                binding.term_len,
                sys::SYBCHAR,
                Self::column(column),
            )
        };
        check(rc, "bcp_bind", self.key())
    }

    fn bcp_send_row(&mut self, fields: &[BcpField<'_>]) -> Result<()> {
        for (index, field) in fields.iter().enumerate() {
            let col = Self::column(index);
            let len = field
                .len
                .map_or(0, |len| sys::DBINT::try_from(len).unwrap_or(sys::DBINT::MAX));
            // SAFETY: `field.buffer` outlives bcp_sendrow below, which is the
            // last use of the pointer for this row.
            unsafe {
                check(
                    sys::bcp_colptr(self.ptr(), field.buffer.as_ptr().cast_mut(), col),
                    "bcp_colptr",
                    self.key(),
                )?;
                check(sys::bcp_collen(self.ptr(), len, col), "bcp_collen", self.key())?;
            }
        }
        // SAFETY: live connection with every column pointer set.
        let rc = unsafe { sys::bcp_sendrow(self.ptr()) };
        check(rc, "bcp_sendrow", self.key())
    }

    fn bcp_batch(&mut self) -> Result<i64> {
        // SAFETY: live connection.
        let n = unsafe { sys::bcp_batch(self.ptr()) };
        if n < 0 {
            return Err(NativeError::call_failed("bcp_batch", peek_detail(self.key())));
        }
        Ok(i64::from(n))
    }

    fn bcp_done(&mut self) -> Result<i64> {
        // SAFETY: live connection.
        let n = unsafe { sys::bcp_done(self.ptr()) };
        if n < 0 {
            return Err(NativeError::call_failed("bcp_done", peek_detail(self.key())));
        }
        Ok(i64::from(n))
    }

    fn drain_messages(&mut self) -> Vec<ServerMessage> {
        take_messages(self.key())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // SAFETY: opened by tdsdbopen and closed exactly once here.
        unsafe { sys::dbclose(self.ptr()) };
        take_messages(self.key());
    }
}
