//! Native engine binding.
//!
//! The connection layer only talks to the embedded engine through these
//! traits: open/close, execute, escape, last error code and message,
//! last insert id, affected rows and a fetch-next-row cursor. Any engine
//! exposing them can stand in for SQLite, which is how the unit tests
//! count cursor releases and executed statements.

use std::fmt;

use crate::Row;

/// Successful result code.
pub const SQLITE_OK: i32 = 0;
/// Generic error code.
pub const SQLITE_ERROR: i32 = 1;
/// The database file is locked by another connection.
pub const SQLITE_BUSY: i32 = 5;
/// A table in the database is locked.
pub const SQLITE_LOCKED: i32 = 6;
/// The library was used incorrectly, e.g. asked to run an empty statement.
pub const SQLITE_MISUSE: i32 = 21;

/// Returns `true` when a (possibly extended) result code is a lock-contention code.
pub fn is_busy_code(code: i32) -> bool {
    matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)
}

/// How a database handle is opened.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AccessMode {
    ReadOnly,
    /// Read-write; the file is created if missing.
    #[default]
    ReadWrite,
}

impl AccessMode {
    pub fn from_readonly(readonly: bool) -> Self {
        if readonly {
            Self::ReadOnly
        } else {
            Self::ReadWrite
        }
    }

    pub fn is_readonly(self) -> bool {
        self == Self::ReadOnly
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "readonly",
            Self::ReadWrite => "readwrite",
        })
    }
}

/// Status reported by a failed open.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineFailure {
    pub code: i32,
    pub message: String,
}

impl EngineFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Raw outcome of executing one statement.
pub enum Execution {
    /// The engine rejected the statement; details via the handle's last error.
    Failed,
    /// The statement ran and produces no result columns.
    Done,
    /// The statement produced a result set.
    Rows(Box<dyn NativeCursor>),
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => f.write_str("Failed"),
            Self::Done => f.write_str("Done"),
            Self::Rows(_) => f.write_str("Rows(..)"),
        }
    }
}

/// Engine entry point: opens handles and owns the escaping routine.
pub trait Driver: Send + Sync {
    /// Driver name used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Opens a native handle on `path`.
    fn open(&self, path: &str, mode: AccessMode) -> Result<Box<dyn NativeHandle>, EngineFailure>;

    /// Escapes a raw string for use inside a single-quoted SQL literal.
    ///
    /// This is the only character-level escaping implementation for the engine.
    fn escape(&self, raw: &str) -> String;
}

/// An open engine handle.
///
/// Handles and their cursors belong to one thread; they may share engine
/// state without synchronization.
pub trait NativeHandle {
    /// Runs one statement. Failures are read back through the last-error accessors.
    fn execute(&mut self, sql: &str) -> Execution;

    /// Result code of the most recent operation on this handle.
    fn last_error_code(&self) -> i32;

    /// Message for [`last_error_code`](Self::last_error_code).
    fn last_error_message(&self) -> String;

    /// Rowid of the most recent successful INSERT on this handle.
    fn last_insert_id(&self) -> i64;

    /// Rows changed by the most recent statement; 0 for read-only queries.
    fn affected_rows(&self) -> u64;

    /// Releases the handle. Cursors still open may keep engine state alive.
    fn close(self: Box<Self>);
}

/// A forward-only row cursor.
pub trait NativeCursor {
    /// Returns the next row, or `None` once the cursor is exhausted.
    fn fetch_next(&mut self) -> Option<Row>;

    /// Releases the engine resources behind the cursor.
    fn free(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_locked_are_busy_codes() {
        assert!(is_busy_code(SQLITE_BUSY));
        assert!(is_busy_code(SQLITE_LOCKED));
        // SQLITE_BUSY_SNAPSHOT, SQLITE_LOCKED_SHAREDCACHE
        assert!(is_busy_code(517));
        assert!(is_busy_code(262));
        assert!(!is_busy_code(SQLITE_ERROR));
        assert!(!is_busy_code(SQLITE_OK));
    }

    #[test]
    fn access_mode_from_flag() {
        assert_eq!(AccessMode::from_readonly(true), AccessMode::ReadOnly);
        assert_eq!(AccessMode::from_readonly(false), AccessMode::ReadWrite);
        assert_eq!(AccessMode::default(), AccessMode::ReadWrite);
        assert_eq!(AccessMode::ReadOnly.to_string(), "readonly");
    }
}
