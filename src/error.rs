/// Error types for the handle layer.
///
/// Every failure is one discriminated value carrying either a numeric engine
/// status or the engine's textual message, never both: when `sqlite3_exec`
/// supplies a message it wins over the bare status code.
use thiserror::Error;

/// Error type covering the failure surfaces of the handle layer:
/// - opening a database
/// - compiling a statement
/// - stepping a statement
/// - direct execution via `sqlite3_exec`
#[derive(Error, Debug)]
pub enum Error {
    /// The engine reported a non-zero status while opening a database.
    #[error("Open failed: engine status {0}")]
    Open(i32),

    /// The engine rejected a statement during compilation.
    #[error("Prepare failed: engine status {0}")]
    Prepare(i32),

    /// A step returned something other than a row or end-of-rows.
    #[error("Step failed: engine status {0}")]
    Step(i32),

    /// Direct execution failed and the engine supplied a message.
    #[error("Execute failed: {0}")]
    Exec(String),

    /// Direct execution failed with only a status code.
    #[error("Execute failed: engine status {0}")]
    ExecStatus(i32),

    /// An input string contained an interior NUL byte and cannot cross the
    /// C boundary.
    #[error("Input contains an interior NUL byte: {0}")]
    NulInInput(#[from] std::ffi::NulError),
}

impl Error {
    /// The engine status code, for the variants that carry one.
    pub fn status(&self) -> Option<i32> {
        match self {
            Error::Open(rc) | Error::Prepare(rc) | Error::Step(rc) | Error::ExecStatus(rc) => {
                Some(*rc)
            }
            Error::Exec(_) | Error::NulInInput(_) => None,
        }
    }
}

/// Type alias for Result to use Error as the error type.
///
/// This provides a consistent error type across the crate instead of
/// spelling out `std::result::Result<T, Error>` at every call site.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let open_err = Error::Open(14);
        assert!(open_err.to_string().contains("Open failed"));
        assert!(open_err.to_string().contains("14"));

        let exec_err = Error::Exec("near \"bogus\": syntax error".to_string());
        assert!(exec_err.to_string().contains("syntax error"));

        let step_err = Error::Step(21);
        assert!(step_err.to_string().contains("Step failed"));
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(Error::Open(14).status(), Some(14));
        assert_eq!(Error::Prepare(1).status(), Some(1));
        assert_eq!(Error::Step(21).status(), Some(21));
        assert_eq!(Error::ExecStatus(5).status(), Some(5));
        assert_eq!(Error::Exec("boom".to_string()).status(), None);
    }
}
