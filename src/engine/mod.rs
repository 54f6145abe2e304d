//! Embedded engine wrapper
//!
//! Thin safe layer over the SQLite C API. All `unsafe` in the crate
//! lives here; the raw pointers inside [`Database`] and [`Statement`]
//! never leave the worker thread that created them, which is what makes
//! the single-writer invariant hold without any locking.
//!
//! Column values are decoded by the engine's runtime type tag per cell,
//! and variable-length payloads are copied out immediately because the
//! engine may reuse or free its buffer as soon as the cursor advances.

use libsqlite3_sys as ffi;
use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;

use crate::error::{Error, Result};
use crate::value::{Params, Value};

const SQLITE_OK: c_int = ffi::SQLITE_OK as c_int;
const SQLITE_ROW: c_int = ffi::SQLITE_ROW as c_int;
const SQLITE_DONE: c_int = ffi::SQLITE_DONE as c_int;
const SQLITE_BUSY: c_int = ffi::SQLITE_BUSY as c_int;
const SQLITE_RANGE: c_int = ffi::SQLITE_RANGE as c_int;

const TYPE_INTEGER: c_int = ffi::SQLITE_INTEGER as c_int;
const TYPE_FLOAT: c_int = ffi::SQLITE_FLOAT as c_int;
const TYPE_TEXT: c_int = ffi::SQLITE_TEXT as c_int;
const TYPE_BLOB: c_int = ffi::SQLITE_BLOB as c_int;

/// Terminal status code reported for successful non-query statements.
pub const STATUS_DONE: i32 = ffi::SQLITE_DONE as i32;

/// Outcome of advancing a statement by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The cursor is positioned on a row.
    Row,
    /// No more rows.
    Done,
}

unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    if db.is_null() {
        return String::new();
    }
    let msg = ffi::sqlite3_errmsg(db);
    if msg.is_null() {
        return String::new();
    }
    CStr::from_ptr(msg).to_string_lossy().into_owned()
}

fn engine_error(db: *mut ffi::sqlite3) -> Error {
    unsafe {
        Error::Engine {
            code: ffi::sqlite3_extended_errcode(db) as i32,
            message: errmsg(db),
        }
    }
}

/// One open connection to the embedded engine.
///
/// Owned exclusively by the gateway worker; closed on drop.
#[derive(Debug)]
pub struct Database {
    db: *mut ffi::sqlite3,
    path: String,
}

impl Database {
    /// Open a database file, creating it if necessary. `":memory:"`
    /// opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let c_path = CString::new(path).map_err(|_| Error::OpenFailed {
            path: path.to_string(),
            code: 0,
            message: "path contains a NUL byte".to_string(),
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        let rc =
            unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != SQLITE_OK || db.is_null() {
            let message = unsafe { errmsg(db) };
            if !db.is_null() {
                unsafe {
                    let _ = ffi::sqlite3_close(db);
                }
            }
            return Err(Error::OpenFailed {
                path: path.to_string(),
                code: rc as i32,
                message,
            });
        }

        Ok(Self {
            db,
            path: path.to_string(),
        })
    }

    /// Path this database was opened with (`":memory:"` for in-memory).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Compile the first statement in `script`, returning the statement
    /// and the unconsumed tail. Leading comments and whitespace are
    /// skipped; `Ok(None)` means the input holds no statement at all.
    ///
    /// Splitting is done by the engine's own tail pointer, so semicolons
    /// inside literals never confuse it.
    pub fn prepare_next<'s>(&self, script: &'s str) -> Result<Option<(Statement, &'s str)>> {
        let mut rest = script;
        loop {
            if rest.trim().is_empty() {
                return Ok(None);
            }
            let c_sql = CString::new(rest)
                .map_err(|_| Error::InvalidSql("SQL text contains a NUL byte".to_string()))?;

            let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
            let mut tail: *const c_char = ptr::null();
            let rc = unsafe {
                ffi::sqlite3_prepare_v2(self.db, c_sql.as_ptr(), -1, &mut stmt, &mut tail)
            };
            if rc != SQLITE_OK {
                return Err(engine_error(self.db));
            }

            let consumed = if tail.is_null() {
                rest.len()
            } else {
                (unsafe { tail.offset_from(c_sql.as_ptr()) } as usize).min(rest.len())
            };
            // The tail always lands on an ASCII boundary (';' or end).
            let (head, remainder) = rest.split_at(consumed);

            if stmt.is_null() {
                // Comment or whitespace only; keep scanning.
                rest = remainder;
                continue;
            }

            return Ok(Some((
                Statement {
                    stmt,
                    db: self.db,
                    sql: head.trim().to_string(),
                },
                remainder,
            )));
        }
    }

    /// Compile a single statement. Fails with `InvalidSql` if the input
    /// contains no statement.
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        match self.prepare_next(sql)? {
            Some((stmt, _tail)) => Ok(stmt),
            None => Err(Error::InvalidSql(
                "input contains no SQL statement".to_string(),
            )),
        }
    }

    /// Row-modification count of the most recently completed statement.
    pub fn changes(&self) -> i64 {
        unsafe { ffi::sqlite3_changes(self.db) as i64 }
    }

    /// Row identifier produced by the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { ffi::sqlite3_last_insert_rowid(self.db) }
    }

    /// Set the engine's busy handler timeout.
    pub fn busy_timeout(&self, ms: i32) -> Result<()> {
        let rc = unsafe { ffi::sqlite3_busy_timeout(self.db, ms as c_int) };
        if rc != SQLITE_OK {
            return Err(engine_error(self.db));
        }
        Ok(())
    }

    /// Allow or forbid loading of native extensions on this connection.
    pub fn enable_load_extension(&self, enable: bool) -> Result<()> {
        let onoff: c_int = if enable { 1 } else { 0 };
        let rc = unsafe { ffi::sqlite3_enable_load_extension(self.db, onoff) };
        if rc != SQLITE_OK {
            return Err(engine_error(self.db));
        }
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        unsafe {
            let _ = ffi::sqlite3_close(self.db);
        }
    }
}

/// One compiled statement. Finalized on drop.
pub struct Statement {
    stmt: *mut ffi::sqlite3_stmt,
    db: *mut ffi::sqlite3,
    sql: String,
}

impl Statement {
    /// The (trimmed) SQL text this statement was compiled from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Advance the statement by one step.
    ///
    /// Transient contention surfaces as [`Error::Busy`], distinguishable
    /// from permanent engine errors.
    pub fn step(&mut self) -> Result<Step> {
        let rc = unsafe { ffi::sqlite3_step(self.stmt) };
        match rc {
            SQLITE_ROW => Ok(Step::Row),
            SQLITE_DONE => Ok(Step::Done),
            SQLITE_BUSY => Err(Error::Busy(unsafe { errmsg(self.db) })),
            _ => Err(engine_error(self.db)),
        }
    }

    /// Bind a parameter payload, positional or named.
    pub fn bind(&mut self, params: &Params) -> Result<()> {
        match params {
            Params::Positional(values) => {
                for (i, value) in values.iter().enumerate() {
                    self.bind_value(i + 1, value)?;
                }
            }
            Params::Named(pairs) => {
                for (name, value) in pairs {
                    let index = self.parameter_index(name)?;
                    self.bind_value(index, value)?;
                }
            }
        }
        Ok(())
    }

    /// Rewind the statement so it can be stepped again.
    pub fn reset(&mut self) {
        // The return code of reset echoes the most recent step error,
        // which the caller already saw; it is not a new failure.
        unsafe {
            let _ = ffi::sqlite3_reset(self.stmt);
        }
    }

    /// Clear all bound parameters back to NULL.
    pub fn clear_bindings(&mut self) {
        unsafe {
            let _ = ffi::sqlite3_clear_bindings(self.stmt);
        }
    }

    pub fn column_count(&self) -> usize {
        let n = unsafe { ffi::sqlite3_column_count(self.stmt) };
        n.max(0) as usize
    }

    pub fn column_names(&self) -> Vec<String> {
        let count = self.column_count();
        let mut names = Vec::with_capacity(count);
        for i in 0..count {
            let name = unsafe { ffi::sqlite3_column_name(self.stmt, i as c_int) };
            if name.is_null() {
                names.push(String::new());
            } else {
                names.push(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned());
            }
        }
        names
    }

    /// Decode the column at `index` of the currently-positioned row,
    /// classified by the engine's runtime type tag.
    pub fn column_value(&self, index: usize) -> Value {
        let i = index as c_int;
        unsafe {
            match ffi::sqlite3_column_type(self.stmt, i) {
                TYPE_INTEGER => Value::Integer(ffi::sqlite3_column_int64(self.stmt, i)),
                TYPE_FLOAT => Value::Float(ffi::sqlite3_column_double(self.stmt, i)),
                TYPE_TEXT => {
                    let ptr = ffi::sqlite3_column_text(self.stmt, i);
                    let len = ffi::sqlite3_column_bytes(self.stmt, i);
                    if ptr.is_null() || len <= 0 {
                        Value::Text(String::new())
                    } else {
                        let bytes = std::slice::from_raw_parts(ptr, len as usize);
                        Value::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                }
                TYPE_BLOB => {
                    let ptr = ffi::sqlite3_column_blob(self.stmt, i);
                    let len = ffi::sqlite3_column_bytes(self.stmt, i);
                    if ptr.is_null() || len <= 0 {
                        Value::Blob(Vec::new())
                    } else {
                        let bytes = std::slice::from_raw_parts(ptr as *const u8, len as usize);
                        Value::Blob(bytes.to_vec())
                    }
                }
                _ => Value::Null,
            }
        }
    }

    /// Decode the whole currently-positioned row, left to right.
    pub fn row_values(&self) -> Vec<Value> {
        let count = self.column_count();
        let mut row = Vec::with_capacity(count);
        for i in 0..count {
            row.push(self.column_value(i));
        }
        row
    }

    fn parameter_index(&self, name: &str) -> Result<usize> {
        let lookup = |candidate: &str| -> Result<c_int> {
            let c_name = CString::new(candidate)
                .map_err(|_| Error::MalformedParams("parameter name contains a NUL byte".to_string()))?;
            Ok(unsafe { ffi::sqlite3_bind_parameter_index(self.stmt, c_name.as_ptr()) })
        };

        let mut index = lookup(name)?;
        if index == 0 && !name.starts_with([':', '@', '$']) {
            index = lookup(&format!(":{}", name))?;
        }
        if index == 0 {
            return Err(Error::MalformedParams(format!(
                "no parameter named '{}'",
                name
            )));
        }
        Ok(index as usize)
    }

    fn bind_value(&mut self, index: usize, value: &Value) -> Result<()> {
        let i = index as c_int;
        let rc = unsafe {
            match value {
                Value::Null => ffi::sqlite3_bind_null(self.stmt, i),
                Value::Integer(v) => ffi::sqlite3_bind_int64(self.stmt, i, *v),
                Value::Float(v) => ffi::sqlite3_bind_double(self.stmt, i, *v),
                Value::Text(s) => ffi::sqlite3_bind_text(
                    self.stmt,
                    i,
                    s.as_ptr() as *const c_char,
                    s.len() as c_int,
                    ffi::SQLITE_TRANSIENT(),
                ),
                Value::Blob(b) => ffi::sqlite3_bind_blob(
                    self.stmt,
                    i,
                    b.as_ptr() as *const std::ffi::c_void,
                    b.len() as c_int,
                    ffi::SQLITE_TRANSIENT(),
                ),
            }
        };
        match rc {
            SQLITE_OK => Ok(()),
            SQLITE_RANGE => Err(Error::MalformedParams(format!(
                "parameter index {} out of range",
                index
            ))),
            _ => Err(engine_error(self.db)),
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        unsafe {
            let _ = ffi::sqlite3_finalize(self.stmt);
        }
    }
}
