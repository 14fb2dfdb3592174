//! SQLite engine binding on top of `rusqlite`.

use std::rc::Rc;
use std::sync::Arc;

use ouroboros::self_referencing;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::OpenFlags;

use crate::engine::{
    AccessMode, Driver, EngineFailure, Execution, NativeCursor, NativeHandle, SQLITE_ERROR,
    SQLITE_MISUSE, SQLITE_OK,
};
use crate::{Row, Value};

/// Opens SQLite database files through `rusqlite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub const NAME: &'static str = "sqlite3";

    pub fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn open(&self, path: &str, mode: AccessMode) -> Result<Box<dyn NativeHandle>, EngineFailure> {
        let flags = match mode {
            AccessMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            AccessMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        } | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = rusqlite::Connection::open_with_flags(path, flags).map_err(into_failure)?;
        register_regexp(&conn).map_err(into_failure)?;
        Ok(Box::new(SqliteHandle::new(conn)))
    }

    fn escape(&self, raw: &str) -> String {
        raw.replace('\'', "''")
    }
}

struct SqliteHandle {
    conn: Rc<rusqlite::Connection>,
    last_error: (i32, String),
    last_changes: u64,
}

impl SqliteHandle {
    fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Rc::new(conn),
            last_error: (SQLITE_OK, "not an error".to_owned()),
            last_changes: 0,
        }
    }

    /// Prepares `sql` and steps it once.
    ///
    /// Errors from preparing or from the first step fail the statement.
    /// Statements without result columns have fully run after that step;
    /// the rest hand out a cursor that steps one row per fetch.
    fn run(&mut self, sql: &str) -> rusqlite::Result<Execution> {
        let stream = RowStream::try_new(
            Rc::clone(&self.conn),
            |conn| conn.prepare(sql),
            |statement| statement.query([]),
        )?;
        let (cols, readonly) = stream.with_rows(|rows| {
            rows.as_ref().map_or((Vec::new(), true), |statement| {
                let cols = statement
                    .column_names()
                    .into_iter()
                    .map(str::to_owned)
                    .collect::<Vec<_>>();
                (cols, statement.readonly())
            })
        });

        let mut cursor = SqliteCursor {
            cols: cols.into(),
            stream: Some(stream),
            pending: None,
        };
        let first = cursor.step()?;
        if cursor.cols.is_empty() {
            self.last_changes = self.conn.changes();
            return Ok(Execution::Done);
        }

        self.last_changes = if readonly { 0 } else { self.conn.changes() };
        cursor.pending = first;
        Ok(Execution::Rows(Box::new(cursor)))
    }
}

impl NativeHandle for SqliteHandle {
    fn execute(&mut self, sql: &str) -> Execution {
        self.last_changes = 0;
        if sql.trim().is_empty() {
            self.last_error = (SQLITE_MISUSE, "query is empty".to_owned());
            return Execution::Failed;
        }

        match self.run(sql) {
            Ok(execution) => {
                self.last_error = (SQLITE_OK, "not an error".to_owned());
                execution
            }
            Err(err) => {
                self.last_error = failure_parts(&err);
                Execution::Failed
            }
        }
    }

    fn last_error_code(&self) -> i32 {
        self.last_error.0
    }

    fn last_error_message(&self) -> String {
        self.last_error.1.clone()
    }

    fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Rows changed by the last statement; read-only queries report 0.
    fn affected_rows(&self) -> u64 {
        self.last_changes
    }

    fn close(self: Box<Self>) {
        match Rc::try_unwrap(self.conn) {
            Ok(conn) => {
                if let Err((_, err)) = conn.close() {
                    tracing::debug!(error = %err, "sqlite handle did not close cleanly");
                }
            }
            // open cursors keep the connection alive until they are dropped
            Err(_) => tracing::debug!("sqlite handle closed with cursors still open"),
        }
    }
}

/// A prepared statement and its row stream over a shared connection.
#[self_referencing]
struct RowStream {
    conn: Rc<rusqlite::Connection>,
    #[borrows(conn)]
    #[not_covariant]
    statement: rusqlite::Statement<'this>,
    #[borrows(mut statement)]
    #[not_covariant]
    rows: rusqlite::Rows<'this>,
}

/// Steps its statement one row per fetch. Freeing finalizes the statement.
struct SqliteCursor {
    cols: Arc<[String]>,
    stream: Option<RowStream>,
    /// Row read while classifying the statement.
    pending: Option<Row>,
}

impl SqliteCursor {
    fn step(&mut self) -> rusqlite::Result<Option<Row>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let cols = &self.cols;
        stream.with_rows_mut(|rows| {
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            let values = (0..cols.len())
                .map(|idx| row.get_ref(idx).map(decode_value))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Some(Row::new(Arc::clone(cols), values)))
        })
    }
}

impl NativeCursor for SqliteCursor {
    fn fetch_next(&mut self) -> Option<Row> {
        if let Some(row) = self.pending.take() {
            return Some(row);
        }
        match self.step() {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(
                    target: "sqlite3_dml",
                    error = %err,
                    "row fetch failed, ending cursor"
                );
                self.free();
                None
            }
        }
    }

    fn free(&mut self) {
        self.pending = None;
        self.stream = None;
    }
}

fn decode_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::Integer(value),
        ValueRef::Real(value) => Value::Float(value),
        ValueRef::Text(text) => Value::Text(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn failure_parts(err: &rusqlite::Error) -> (i32, String) {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => (
            failure.extended_code,
            message.clone().unwrap_or_else(|| failure.to_string()),
        ),
        other => (SQLITE_ERROR, other.to_string()),
    }
}

fn into_failure(err: rusqlite::Error) -> EngineFailure {
    let (code, message) = failure_parts(&err);
    EngineFailure::new(code, message)
}

/// `X REGEXP Y` is evaluated by SQLite as `regexp(Y, X)`.
fn register_regexp(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern = ctx.get::<String>(0)?;
            let regex = Regex::new(&pattern)
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            let matched = match ctx.get_raw(1) {
                ValueRef::Text(text) => std::str::from_utf8(text)
                    .map(|text| regex.is_match(text))
                    .unwrap_or(false),
                ValueRef::Integer(value) => regex.is_match(&value.to_string()),
                ValueRef::Real(value) => regex.is_match(&value.to_string()),
                ValueRef::Null | ValueRef::Blob(_) => false,
            };
            Ok(matched)
        },
    )
}
