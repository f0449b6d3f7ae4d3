/// Cursor Handle Module
///
/// This module provides the owning handle for one prepared statement: a
/// pull-based row iteration protocol plus column access by index or name.
/// Column metadata is discovered on the first step and stays fixed for the
/// statement's lifetime; row values are snapshotted as text on every step.
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use tracing::trace;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::ffi;

/// A handle to one prepared statement bound to its parent [`Connection`].
///
/// The borrow of the connection makes "cursors must not outlive their
/// connection" a compile-time guarantee. A cursor exclusively owns its
/// statement handle; it is not `Clone` (duplicating a live statement handle
/// is a programming error) and the handle is finalized exactly once on
/// drop.
///
/// Values returned by [`Cursor::value`] borrow the cursor and are
/// invalidated by the next [`Cursor::read`].
#[derive(Debug)]
pub struct Cursor<'conn> {
    conn: &'conn Connection,
    stmt: *mut ffi::sqlite3_stmt,
    cols: Vec<String>,
    col_indexes: HashMap<String, usize>,
    vals: Vec<Option<String>>,
    pos: u64,
    described: bool,
}

impl<'conn> Cursor<'conn> {
    /// Compiles `sql` against `conn`.
    ///
    /// Only the first statement of a multi-statement string is compiled;
    /// the tail is ignored. Use [`Connection::exec`] to run a whole batch.
    pub fn new(conn: &'conn Connection, sql: &str) -> Result<Cursor<'conn>> {
        let len = c_int::try_from(sql.len()).map_err(|_| Error::Prepare(ffi::SQLITE_TOOBIG))?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                conn.raw_handle(),
                sql.as_ptr() as *const c_char,
                len,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Prepare(rc));
        }

        trace!("prepared statement");
        Ok(Cursor {
            conn,
            stmt,
            cols: Vec::new(),
            col_indexes: HashMap::new(),
            vals: Vec::new(),
            pos: 0,
            described: false,
        })
    }

    /// Advances to the next row.
    ///
    /// Returns `true` with the row's values snapshotted as text, or `false`
    /// once the statement is exhausted. Exhaustion is terminal: stepping an
    /// exhausted cursor again is caller error territory and surfaces as
    /// whatever status the engine reports.
    pub fn read(&mut self) -> Result<bool> {
        let rc = unsafe { ffi::sqlite3_step(self.stmt) };
        if rc != ffi::SQLITE_ROW && rc != ffi::SQLITE_DONE {
            return Err(Error::Step(rc));
        }

        // Column metadata is discovered exactly once, on the first step,
        // even when the statement produces no rows at all.
        if !self.described {
            let count = unsafe { ffi::sqlite3_column_count(self.stmt) } as usize;
            self.cols.reserve(count);
            self.vals.reserve(count);
            for i in 0..count {
                let name = unsafe { ffi::sqlite3_column_name(self.stmt, i as c_int) };
                let name = if name.is_null() {
                    String::new()
                } else {
                    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
                };
                self.col_indexes.insert(name.clone(), i);
                self.cols.push(name);
            }
            self.described = true;
        }

        if rc == ffi::SQLITE_DONE {
            return Ok(false);
        }

        self.pos += 1;
        self.vals.clear();
        for i in 0..self.cols.len() {
            self.vals.push(unsafe { self.column_text(i as c_int) });
        }
        Ok(true)
    }

    /// Reads column `i` of the current row as text; `None` for SQL NULL.
    unsafe fn column_text(&self, i: c_int) -> Option<String> {
        let text = ffi::sqlite3_column_text(self.stmt, i);
        if text.is_null() {
            return None;
        }
        let len = ffi::sqlite3_column_bytes(self.stmt, i) as usize;
        let bytes = slice::from_raw_parts(text, len);
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Number of columns discovered after at least one [`Cursor::read`];
    /// 0 before any read.
    pub fn column_count(&self) -> usize {
        self.cols.len()
    }

    /// The ordered column names; empty before the first read.
    pub fn column_names(&self) -> &[String] {
        &self.cols
    }

    /// The zero-based index for `name`, if the statement has such a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.col_indexes.get(name).copied()
    }

    /// The current row's text value at `index`.
    ///
    /// `None` when the index is out of range or the value is SQL NULL.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.vals.get(index)?.as_deref()
    }

    /// The current row's text value for the named column.
    pub fn value_named(&self, name: &str) -> Option<&str> {
        self.value(self.column_index(name)?)
    }

    /// Snapshots the full current row into a column-name to value map.
    ///
    /// Every discovered column is present as a key; SQL NULL renders as an
    /// empty string. The map is a one-shot copy, detached from the cursor.
    pub fn values(&self) -> HashMap<String, String> {
        self.cols
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), self.value(i).unwrap_or("").to_owned()))
            .collect()
    }

    /// Rows consumed so far; starts at 0.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// The connection this cursor was prepared against.
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        unsafe { ffi::sqlite3_finalize(self.stmt) };
    }
}
