//! Raw declarations for FreeTDS db-lib (`sybdb.h`).

#![allow(non_camel_case_types, missing_docs)]

use std::os::raw::{c_char, c_int};

pub type RETCODE = c_int;
pub type STATUS = c_int;
pub type DBINT = i32;
pub type BYTE = u8;
pub type DBBOOL = u8;
pub type DBSMALLINT = i16;

pub const SUCCEED: RETCODE = 1;
pub const FAIL: RETCODE = 0;
pub const NO_MORE_RESULTS: RETCODE = 2;

pub const REG_ROW: STATUS = -1;
pub const NO_MORE_ROWS: STATUS = -2;
pub const BUF_FULL: STATUS = -3;

pub const INT_CANCEL: c_int = 2;

pub const DBSETUSER: c_int = 2;
pub const DBSETPWD: c_int = 3;
pub const DBSETAPP: c_int = 5;
pub const DBSETBCP: c_int = 6;
pub const DBSETNETWORKAUTH: c_int = 101;
pub const DBSETUTF16: c_int = 1001;
pub const DBSETNTLMV2: c_int = 1002;
pub const DBSETREADONLY: c_int = 1003;
pub const DBSETENCRYPTION: c_int = 1005;

pub const DBTEXTSIZE: c_int = 17;

pub const DBRPCRETURN: BYTE = 1;

pub const SYBCHAR: c_int = 47;

#[repr(C)]
pub struct DBPROCESS {
    _private: [u8; 0],
}

#[repr(C)]
pub struct LOGINREC {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DBDATETIME {
    pub dtdays: DBINT,
    pub dttime: DBINT,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DBDATEREC {
    pub dateyear: DBINT,
    pub datemonth: DBINT,
    pub datedmonth: DBINT,
    pub datedyear: DBINT,
    pub datedweek: DBINT,
    pub datehour: DBINT,
    pub dateminute: DBINT,
    pub datesecond: DBINT,
    pub datemsecond: DBINT,
    pub datetzone: DBINT,
}

pub type EHANDLEFUNC = Option<
    unsafe extern "C" fn(*mut DBPROCESS, c_int, c_int, c_int, *mut c_char, *mut c_char) -> c_int,
>;

pub type MHANDLEFUNC = Option<
    unsafe extern "C" fn(
        *mut DBPROCESS,
        DBINT,
        c_int,
        c_int,
        *mut c_char,
        *mut c_char,
        *mut c_char,
        c_int,
    ) -> c_int,
>;

unsafe extern "C" {
    pub fn dbinit() -> RETCODE;
    pub fn dberrhandle(handler: EHANDLEFUNC) -> EHANDLEFUNC;
    pub fn dbmsghandle(handler: MHANDLEFUNC) -> MHANDLEFUNC;
    pub fn dbsetlogintime(seconds: c_int) -> RETCODE;
    pub fn dbsettime(seconds: c_int) -> RETCODE;

    pub fn dblogin() -> *mut LOGINREC;
    pub fn dbloginfree(login: *mut LOGINREC);
    pub fn dbsetlname(login: *mut LOGINREC, value: *const c_char, which: c_int) -> RETCODE;
    pub fn dbsetlbool(login: *mut LOGINREC, value: c_int, which: c_int) -> RETCODE;

    pub fn tdsdbopen(login: *mut LOGINREC, server: *const c_char, msdblib: c_int) -> *mut DBPROCESS;
    pub fn dbclose(dbproc: *mut DBPROCESS);
    pub fn dbuse(dbproc: *mut DBPROCESS, name: *const c_char) -> RETCODE;
    pub fn dbcancel(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbsetopt(
        dbproc: *mut DBPROCESS,
        option: c_int,
        char_param: *const c_char,
        int_param: c_int,
    ) -> RETCODE;

    pub fn dbcmd(dbproc: *mut DBPROCESS, cmdstring: *const c_char) -> RETCODE;
    pub fn dbsqlexec(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbresults(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbnumcols(dbproc: *mut DBPROCESS) -> c_int;
    pub fn dbcolname(dbproc: *mut DBPROCESS, column: c_int) -> *mut c_char;
    pub fn dbcoltype(dbproc: *mut DBPROCESS, column: c_int) -> c_int;
    pub fn dbcollen(dbproc: *mut DBPROCESS, column: c_int) -> DBINT;
    pub fn dbnextrow(dbproc: *mut DBPROCESS) -> STATUS;
    pub fn dbdata(dbproc: *mut DBPROCESS, column: c_int) -> *mut BYTE;
    pub fn dbdatlen(dbproc: *mut DBPROCESS, column: c_int) -> DBINT;
    pub fn dbcount(dbproc: *mut DBPROCESS) -> DBINT;

    pub fn dbconvert(
        dbproc: *mut DBPROCESS,
        srctype: c_int,
        src: *const BYTE,
        srclen: DBINT,
        desttype: c_int,
        dest: *mut BYTE,
        destlen: DBINT,
    ) -> DBINT;
    pub fn dbdatecrack(dbproc: *mut DBPROCESS, di: *mut DBDATEREC, dt: *mut DBDATETIME) -> RETCODE;

    pub fn dbrpcinit(dbproc: *mut DBPROCESS, rpcname: *const c_char, options: DBSMALLINT) -> RETCODE;
    pub fn dbrpcparam(
        dbproc: *mut DBPROCESS,
        paramname: *const c_char,
        status: BYTE,
        db_type: c_int,
        maxlen: DBINT,
        datalen: DBINT,
        value: *mut BYTE,
    ) -> RETCODE;
    pub fn dbrpcsend(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbsqlok(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbnumrets(dbproc: *mut DBPROCESS) -> c_int;
    pub fn dbretname(dbproc: *mut DBPROCESS, retnum: c_int) -> *mut c_char;
    pub fn dbrettype(dbproc: *mut DBPROCESS, retnum: c_int) -> c_int;
    pub fn dbretdata(dbproc: *mut DBPROCESS, retnum: c_int) -> *mut BYTE;
    pub fn dbretlen(dbproc: *mut DBPROCESS, retnum: c_int) -> c_int;
    pub fn dbhasretstat(dbproc: *mut DBPROCESS) -> DBBOOL;
    pub fn dbretstatus(dbproc: *mut DBPROCESS) -> DBINT;

    pub fn bcp_init(
        dbproc: *mut DBPROCESS,
        tblname: *const c_char,
        hfile: *const c_char,
        errfile: *const c_char,
        direction: c_int,
    ) -> RETCODE;
    pub fn bcp_bind(
        dbproc: *mut DBPROCESS,
        varaddr: *mut BYTE,
        prefixlen: c_int,
        varlen: DBINT,
        terminator: *const BYTE,
        termlen: c_int,
        vartype: c_int,
        table_column: c_int,
    ) -> RETCODE;
    pub fn bcp_colptr(dbproc: *mut DBPROCESS, colptr: *mut BYTE, table_column: c_int) -> RETCODE;
    pub fn bcp_collen(dbproc: *mut DBPROCESS, varlen: DBINT, table_column: c_int) -> RETCODE;
    pub fn bcp_sendrow(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn bcp_batch(dbproc: *mut DBPROCESS) -> DBINT;
    pub fn bcp_done(dbproc: *mut DBPROCESS) -> DBINT;
}
