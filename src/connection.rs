/// Connection Handle Module
///
/// This module provides the owning handle for one open database: opening
/// with flags and an optional VFS, direct execution with an optional row
/// callback, and the scalar/row convenience helpers built on top of the
/// cursor. The raw engine handle stays reachable throughout.
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr;

use tracing::debug;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::ffi;

/// Bitmask handed to the engine when opening a database.
///
/// The named constants cover the common modes; any engine-defined bits pass
/// through [`OpenFlags::from_bits`] unvalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    /// Open an existing database for reading only.
    pub const READ_ONLY: OpenFlags = OpenFlags(ffi::SQLITE_OPEN_READONLY);
    /// Open for reading and writing.
    pub const READ_WRITE: OpenFlags = OpenFlags(ffi::SQLITE_OPEN_READWRITE);
    /// Create the database if it does not exist.
    pub const CREATE: OpenFlags = OpenFlags(ffi::SQLITE_OPEN_CREATE);

    /// Wraps raw engine bits, including extensions this crate does not name.
    pub fn from_bits(bits: c_int) -> OpenFlags {
        OpenFlags(bits)
    }

    /// The raw bits handed to the engine.
    pub fn bits(self) -> c_int {
        self.0
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::READ_WRITE | Self::CREATE
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: OpenFlags) {
        self.0 |= rhs.0;
    }
}

/// A handle to one open database.
///
/// The wrapped engine connection is non-null for the whole lifetime of the
/// handle and released exactly once when the handle is dropped. The handle
/// holds a raw pointer and is deliberately neither `Send` nor `Sync`: one
/// logical owner at a time, with no internal locking.
#[derive(Debug)]
pub struct Connection {
    db: *mut ffi::sqlite3,
}

/// Row handler state threaded through `sqlite3_exec`. A panic in the
/// handler must not unwind across the C frame, so it is caught in the
/// trampoline, stashed here, and resumed once the engine call returns.
struct ExecState<'a> {
    on_row: &'a mut dyn FnMut(&[&str], &[Option<&str>]) -> bool,
    panic: Option<Box<dyn std::any::Any + Send>>,
}

unsafe extern "C" fn exec_trampoline(
    state: *mut c_void,
    column_count: c_int,
    values: *mut *mut c_char,
    names: *mut *mut c_char,
) -> c_int {
    let state = &mut *(state as *mut ExecState<'_>);
    let column_count = column_count as usize;

    let mut cols: Vec<&str> = Vec::with_capacity(column_count);
    let mut vals: Vec<Option<&str>> = Vec::with_capacity(column_count);
    for i in 0..column_count {
        let name = *names.add(i);
        cols.push(if name.is_null() {
            ""
        } else {
            CStr::from_ptr(name).to_str().unwrap_or("")
        });
        let value = *values.add(i);
        vals.push(if value.is_null() {
            None
        } else {
            CStr::from_ptr(value).to_str().ok()
        });
    }

    match panic::catch_unwind(AssertUnwindSafe(|| (state.on_row)(&cols, &vals))) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(payload) => {
            state.panic = Some(payload);
            1
        }
    }
}

impl Connection {
    /// Opens `path` read-write, creating the database if it is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
        Connection::open_with_flags(path, OpenFlags::default())
    }

    /// Opens a private, transient in-memory database.
    pub fn open_in_memory() -> Result<Connection> {
        Connection::open_with_flags(":memory:", OpenFlags::default())
    }

    /// Opens `path` honoring `flags`.
    pub fn open_with_flags<P: AsRef<Path>>(path: P, flags: OpenFlags) -> Result<Connection> {
        Connection::open_internal(path.as_ref(), flags, None)
    }

    /// Opens `path` honoring `flags`, through the named virtual filesystem.
    pub fn open_with_flags_and_vfs<P: AsRef<Path>>(
        path: P,
        flags: OpenFlags,
        vfs: &str,
    ) -> Result<Connection> {
        Connection::open_internal(path.as_ref(), flags, Some(vfs))
    }

    fn open_internal(path: &Path, flags: OpenFlags, vfs: Option<&str>) -> Result<Connection> {
        let c_path = CString::new(path.to_string_lossy().into_owned())?;
        let c_vfs = match vfs {
            Some(name) => Some(CString::new(name)?),
            None => None,
        };

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_open_v2(
                c_path.as_ptr(),
                &mut db,
                flags.bits(),
                c_vfs.as_ref().map_or(ptr::null(), |v| v.as_ptr()),
            )
        };
        if rc != ffi::SQLITE_OK {
            // The engine may hand back a half-open handle alongside the
            // error status; close it so no connection is retained.
            if !db.is_null() {
                unsafe { ffi::sqlite3_close(db) };
            }
            return Err(Error::Open(rc));
        }

        debug!("opened database at {:?}", path);
        Ok(Connection { db })
    }

    /// Runs one or more semicolon-separated statements in a single engine
    /// call, discarding any result rows.
    pub fn exec(&self, sql: &str) -> Result<()> {
        self.exec_raw(sql, None)
    }

    /// Runs `sql` like [`Connection::exec`], invoking `on_row` once per
    /// result row with the row's column names and text values (`None` for
    /// SQL NULL).
    ///
    /// Returning `false` from the handler aborts iteration; the engine
    /// reports the abort as an execution error. A panic in the handler also
    /// aborts iteration and resumes once the engine call has returned.
    pub fn exec_with<F>(&self, sql: &str, mut on_row: F) -> Result<()>
    where
        F: FnMut(&[&str], &[Option<&str>]) -> bool,
    {
        let mut state = ExecState {
            on_row: &mut on_row,
            panic: None,
        };
        let result = self.exec_raw(sql, Some(&mut state));
        if let Some(payload) = state.panic.take() {
            panic::resume_unwind(payload);
        }
        result
    }

    fn exec_raw(&self, sql: &str, state: Option<&mut ExecState<'_>>) -> Result<()> {
        let c_sql = CString::new(sql)?;
        let (callback, arg) = match state {
            Some(state) => (
                Some(
                    exec_trampoline
                        as unsafe extern "C" fn(
                            *mut c_void,
                            c_int,
                            *mut *mut c_char,
                            *mut *mut c_char,
                        ) -> c_int,
                ),
                state as *mut ExecState<'_> as *mut c_void,
            ),
            None => (None, ptr::null_mut()),
        };

        let mut errmsg: *mut c_char = ptr::null_mut();
        let rc = unsafe { ffi::sqlite3_exec(self.db, c_sql.as_ptr(), callback, arg, &mut errmsg) };

        // The textual message takes precedence over a bare status code.
        if !errmsg.is_null() {
            let message = unsafe { CStr::from_ptr(errmsg) }.to_string_lossy().into_owned();
            unsafe { ffi::sqlite3_free(errmsg as *mut c_void) };
            return Err(Error::Exec(message));
        }
        if rc != ffi::SQLITE_OK {
            return Err(Error::ExecStatus(rc));
        }
        Ok(())
    }

    /// Runs `sql` and returns the first column of the first row as text.
    ///
    /// Returns an empty string when the query produces no rows, the row has
    /// no columns, or the value is SQL NULL.
    pub fn exec_str(&self, sql: &str) -> Result<String> {
        let mut cursor = self.cursor(sql)?;
        if cursor.read()? && cursor.column_count() > 0 {
            return Ok(cursor.value(0).unwrap_or("").to_owned());
        }
        Ok(String::new())
    }

    /// Runs `sql` and parses the first column of the first row as a signed
    /// 64-bit integer, with `strtoll`-style best-effort conversion:
    /// non-numeric text yields 0.
    ///
    /// Returns -1 when the query produces no rows or the row has no
    /// columns. That sentinel is indistinguishable from a genuine -1; use
    /// [`Connection::exec_one`] or a cursor when the distinction matters.
    pub fn exec_i64(&self, sql: &str) -> Result<i64> {
        let mut cursor = self.cursor(sql)?;
        if !cursor.read()? || cursor.column_count() == 0 {
            return Ok(-1);
        }
        Ok(parse_i64(cursor.value(0).unwrap_or("")))
    }

    /// Unsigned twin of [`Connection::exec_i64`]. The "no row" sentinel is
    /// `u64::MAX`, the unsigned reading of -1.
    pub fn exec_u64(&self, sql: &str) -> Result<u64> {
        let mut cursor = self.cursor(sql)?;
        if !cursor.read()? || cursor.column_count() == 0 {
            return Ok(u64::MAX);
        }
        Ok(parse_u64(cursor.value(0).unwrap_or("")))
    }

    /// Runs `sql` and returns the full first row as a column-name to value
    /// map, or an empty map when no row was produced.
    pub fn exec_one(&self, sql: &str) -> Result<HashMap<String, String>> {
        let mut cursor = self.cursor(sql)?;
        if !cursor.read()? {
            return Ok(HashMap::new());
        }
        Ok(cursor.values())
    }

    /// Compiles `sql` into a new [`Cursor`] owned by the caller.
    pub fn cursor(&self, sql: &str) -> Result<Cursor<'_>> {
        Cursor::new(self, sql)
    }

    /// The raw engine connection handle.
    ///
    /// This deliberately breaks encapsulation: any engine feature the
    /// wrapper does not surface is reachable here. The pointer is owned by
    /// this handle and must not be closed or outlive it.
    pub fn raw_handle(&self) -> *mut ffi::sqlite3 {
        self.db
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Cursors borrow the connection, so none can still be live here.
        unsafe { ffi::sqlite3_close(self.db) };
        debug!("closed database");
    }
}

/// Best-effort base-10 conversion in the spirit of `strtoll`: leading
/// whitespace is skipped, one sign is honored, parsing stops at the first
/// non-digit. No digits yields 0; overflow saturates.
fn parse_i64(text: &str) -> i64 {
    let rest = text.trim_start();
    let (negative, rest) = match rest.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, rest.strip_prefix('+').unwrap_or(rest)),
    };
    let mut value: i64 = 0;
    for digit in rest.bytes().take_while(|b| b.is_ascii_digit()) {
        let digit = (digit - b'0') as i64;
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

/// Unsigned counterpart of [`parse_i64`]. A leading minus sign does not
/// parse; it yields 0 like any other non-digit.
fn parse_u64(text: &str) -> u64 {
    let rest = text.trim_start();
    let rest = rest.strip_prefix('+').unwrap_or(rest);
    let mut value: u64 = 0;
    for digit in rest.bytes().take_while(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add((digit - b'0') as u64);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_i64_basics() {
        assert_eq!(parse_i64("42"), 42);
        assert_eq!(parse_i64("-9"), -9);
        assert_eq!(parse_i64("+7"), 7);
        assert_eq!(parse_i64("  13"), 13);
        assert_eq!(parse_i64("42abc"), 42);
        assert_eq!(parse_i64("abc"), 0);
        assert_eq!(parse_i64(""), 0);
    }

    #[test]
    fn test_parse_i64_saturates() {
        assert_eq!(parse_i64("9223372036854775807"), i64::MAX);
        assert_eq!(parse_i64("99999999999999999999"), i64::MAX);
        assert_eq!(parse_i64("-9223372036854775808"), i64::MIN);
        assert_eq!(parse_i64("-99999999999999999999"), i64::MIN);
    }

    #[test]
    fn test_parse_u64_basics() {
        assert_eq!(parse_u64("198"), 198);
        assert_eq!(parse_u64("+3"), 3);
        assert_eq!(parse_u64("-3"), 0);
        assert_eq!(parse_u64("18446744073709551615"), u64::MAX);
        assert_eq!(parse_u64("99999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_open_flags_default_and_or() {
        let flags = OpenFlags::default();
        assert_eq!(
            flags.bits(),
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        );

        let mut flags = OpenFlags::READ_ONLY;
        flags |= OpenFlags::from_bits(ffi::SQLITE_OPEN_URI);
        assert_eq!(flags.bits(), ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_URI);
    }

    #[test]
    fn test_exec_and_scalars_in_memory() {
        let db = Connection::open_in_memory().unwrap();
        db.exec("create table t(a int, b text); insert into t values(1, 'one');")
            .unwrap();

        assert_eq!(db.exec_str("select b from t;").unwrap(), "one");
        assert_eq!(db.exec_i64("select a from t;").unwrap(), 1);
        assert_eq!(db.exec_i64("select a from t where a > 5;").unwrap(), -1);
        assert_eq!(db.exec_u64("select a from t where a > 5;").unwrap(), u64::MAX);
        assert_eq!(db.exec_str("select b from t where a > 5;").unwrap(), "");
    }

    #[test]
    fn test_exec_error_carries_engine_message() {
        let db = Connection::open_in_memory().unwrap();
        match db.exec("definitely not sql") {
            Err(Error::Exec(message)) => assert!(message.contains("syntax error")),
            other => panic!("expected a message-bearing exec error, got {other:?}"),
        }
    }

    #[test]
    fn test_exec_with_sees_every_row() {
        let db = Connection::open_in_memory().unwrap();
        db.exec("create table t(a int); insert into t values(1),(2),(3);")
            .unwrap();

        let mut seen = Vec::new();
        db.exec_with("select a from t order by a;", |cols, vals| {
            assert_eq!(cols, &["a"]);
            seen.push(vals[0].unwrap().to_owned());
            true
        })
        .unwrap();
        assert_eq!(seen, ["1", "2", "3"]);
    }

    #[test]
    fn test_exec_with_abort_surfaces_engine_error() {
        let db = Connection::open_in_memory().unwrap();
        db.exec("create table t(a int); insert into t values(1),(2),(3);")
            .unwrap();

        let mut seen = 0;
        let result = db.exec_with("select a from t;", |_, _| {
            seen += 1;
            false
        });
        assert!(result.is_err());
        assert_eq!(seen, 1);

        // The connection stays usable after the abort.
        assert_eq!(db.exec_i64("select count(*) from t;").unwrap(), 3);
    }

    #[test]
    fn test_exec_rejects_interior_nul() {
        let db = Connection::open_in_memory().unwrap();
        match db.exec("select 1;\0select 2;") {
            Err(Error::NulInInput(_)) => {}
            other => panic!("expected NUL rejection, got {other:?}"),
        }
    }
}
