//! curlite — a thin, RAII-flavored handle layer over SQLite.
//!
//! Two collaborating handles wrap the engine's C API: [`Connection`] owns
//! one open database and [`Cursor`] owns one prepared statement, stepped
//! row by row until exhausted. The layer smooths connection lifecycle,
//! statement execution, and row iteration, and deliberately hides nothing:
//! the raw engine handle stays reachable and the sys crate is re-exported
//! as [`ffi`].
//!
//! ```no_run
//! use curlite::Connection;
//!
//! fn main() -> curlite::Result<()> {
//!     let db = Connection::open("app.db")?;
//!     db.exec("create table if not exists kv(k text, v text);")?;
//!
//!     let mut rows = db.cursor("select k, v from kv;")?;
//!     while rows.read()? {
//!         println!("{} = {}", rows.value(0).unwrap_or(""), rows.value(1).unwrap_or(""));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Everything is synchronous and single-owner: no pooling, no locking, no
//! type marshaling beyond text. The engine does the hard work.

// Handle modules
pub mod connection;
pub mod cursor;
pub mod error;

// The engine's sys crate, re-exported so callers can reach past the wrapper
// without declaring their own dependency on it.
pub use libsqlite3_sys as ffi;

// Re-export commonly used types for convenience
pub use connection::{Connection, OpenFlags};
pub use cursor::Cursor;
pub use error::{Error, Result};
