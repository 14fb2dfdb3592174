use std::fmt;

use crate::engine::{is_busy_code, Execution, NativeCursor, NativeHandle, SQLITE_OK};
use crate::{Row, Value};

/// How a statement ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Failed,
    /// Ran without producing a result set (DDL, DML, setter PRAGMAs).
    SucceededEmpty,
    SucceededWithCursor,
}

/// Outcome of one executed statement.
///
/// Rows are pulled from the engine cursor on demand. The cursor is freed
/// exactly once: as soon as an accessor sees it exhausted, or on drop.
/// Results without a cursor are released from the start.
pub struct QueryResult {
    query: String,
    outcome: Outcome,
    cursor: Option<Box<dyn NativeCursor>>,
    affected_rows: u64,
    insert_id: i64,
    error_number: i32,
    error_message: String,
    freed: bool,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("query", &self.query)
            .field("outcome", &self.outcome)
            .field("affected_rows", &self.affected_rows)
            .field("insert_id", &self.insert_id)
            .field("error_number", &self.error_number)
            .field("error_message", &self.error_message)
            .field("freed", &self.freed)
            .finish()
    }
}

impl QueryResult {
    /// Classifies a raw execution, reading metadata from the handle that ran it.
    pub(crate) fn new(
        query: impl Into<String>,
        execution: Execution,
        handle: &dyn NativeHandle,
    ) -> Self {
        let (outcome, cursor) = match execution {
            Execution::Failed => (Outcome::Failed, None),
            Execution::Done => (Outcome::SucceededEmpty, None),
            Execution::Rows(cursor) => (Outcome::SucceededWithCursor, Some(cursor)),
        };
        let failed = outcome == Outcome::Failed;

        Self {
            query: query.into(),
            outcome,
            freed: cursor.is_none(),
            cursor,
            affected_rows: if failed { 0 } else { handle.affected_rows() },
            insert_id: handle.last_insert_id(),
            error_number: if failed {
                handle.last_error_code()
            } else {
                SQLITE_OK
            },
            error_message: if failed {
                handle.last_error_message()
            } else {
                String::new()
            },
        }
    }

    /// The next row, or an empty row once the cursor is exhausted.
    pub fn result_row(&mut self) -> Row {
        self.fetch().unwrap_or_default()
    }

    /// Every remaining row, in fetch order.
    pub fn result_array(&mut self) -> Vec<Row> {
        std::iter::from_fn(|| self.fetch()).collect()
    }

    /// The `column` value of every remaining row; rows lacking it are skipped.
    pub fn result_column(&mut self, column: &str) -> Vec<Value> {
        std::iter::from_fn(|| self.fetch())
            .filter_map(|row| row.take(column))
            .collect()
    }

    /// The `column` value of the next row.
    ///
    /// Only one row is read; the cursor is released right after it.
    pub fn result_cell(&mut self, column: &str) -> Option<Value> {
        let row = self.fetch();
        self.free();
        row?.take(column)
    }

    /// Counts the remaining rows by consuming them.
    pub fn number_of_rows(&mut self) -> usize {
        std::iter::from_fn(|| self.fetch()).count()
    }

    /// Whether the engine rejected the statement.
    pub fn has_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    /// Whether the statement failed on a busy or locked database.
    pub fn has_deadlock(&self) -> bool {
        is_busy_code(self.error_number)
    }

    /// How the statement ended.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Rows changed by the statement.
    ///
    /// Always 0 for failed statements and read-only queries.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Rowid of the most recent successful INSERT on the connection, which
    /// may predate this statement.
    pub fn insert_id(&self) -> i64 {
        self.insert_id
    }

    /// Engine error text; empty unless the statement failed.
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Engine result code; [`SQLITE_OK`] unless the statement failed.
    pub fn error_number(&self) -> i32 {
        self.error_number
    }

    /// The SQL text that was executed.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Whether the cursor (if any) has been released.
    pub fn is_freed(&self) -> bool {
        self.freed
    }

    fn fetch(&mut self) -> Option<Row> {
        if self.freed {
            return None;
        }
        let row = self.cursor.as_mut().and_then(|cursor| cursor.fetch_next());
        if row.is_none() {
            self.free();
        }
        row
    }

    fn free(&mut self) {
        if self.freed {
            return;
        }
        if let Some(mut cursor) = self.cursor.take() {
            cursor.free();
        }
        self.freed = true;
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{Outcome, QueryResult};
    use crate::engine::{Execution, NativeCursor, NativeHandle, SQLITE_BUSY, SQLITE_ERROR};
    use crate::{Row, Value};

    struct FakeHandle {
        error: (i32, &'static str),
        affected: u64,
        insert_id: i64,
    }

    impl FakeHandle {
        fn ok() -> Self {
            Self {
                error: (0, "not an error"),
                affected: 3,
                insert_id: 9,
            }
        }

        fn failing(code: i32) -> Self {
            Self {
                error: (code, "database is locked"),
                affected: 3,
                insert_id: 9,
            }
        }
    }

    impl NativeHandle for FakeHandle {
        fn execute(&mut self, _sql: &str) -> Execution {
            Execution::Done
        }

        fn last_error_code(&self) -> i32 {
            self.error.0
        }

        fn last_error_message(&self) -> String {
            self.error.1.to_owned()
        }

        fn last_insert_id(&self) -> i64 {
            self.insert_id
        }

        fn affected_rows(&self) -> u64 {
            self.affected
        }

        fn close(self: Box<Self>) {}
    }

    struct CountingCursor {
        rows: VecDeque<Row>,
        fetches: Arc<AtomicUsize>,
        frees: Arc<AtomicUsize>,
    }

    impl NativeCursor for CountingCursor {
        fn fetch_next(&mut self) -> Option<Row> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.rows.pop_front()
        }

        fn free(&mut self) {
            self.frees.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        fetches: Arc<AtomicUsize>,
        frees: Arc<AtomicUsize>,
    }

    fn two_rows() -> VecDeque<Row> {
        let cols: Arc<[String]> = vec!["id".to_owned(), "name".to_owned()].into();
        VecDeque::from([
            Row::new(Arc::clone(&cols), vec![Value::integer(1), Value::text("a")]),
            Row::new(cols, vec![Value::integer(2), Value::text("b")]),
        ])
    }

    fn cursor_result(rows: VecDeque<Row>) -> (QueryResult, Fixture) {
        let fixture = Fixture {
            fetches: Arc::new(AtomicUsize::new(0)),
            frees: Arc::new(AtomicUsize::new(0)),
        };
        let cursor = CountingCursor {
            rows,
            fetches: Arc::clone(&fixture.fetches),
            frees: Arc::clone(&fixture.frees),
        };
        let result = QueryResult::new(
            "SELECT id, name FROM t",
            Execution::Rows(Box::new(cursor)),
            &FakeHandle::ok(),
        );
        (result, fixture)
    }

    #[test]
    fn failed_result_is_released_and_empty() {
        let handle = FakeHandle::failing(SQLITE_ERROR);
        let mut result = QueryResult::new("SELECT x", Execution::Failed, &handle);

        assert!(result.has_failed());
        assert!(!result.has_deadlock());
        assert!(result.is_freed());
        assert_eq!(result.outcome(), Outcome::Failed);
        assert_eq!(result.affected_rows(), 0);
        assert_eq!(result.error_number(), SQLITE_ERROR);
        assert_eq!(result.error_message(), "database is locked");
        assert_eq!(result.result_array(), Vec::<Row>::new());
        assert_eq!(result.result_cell("x"), None);
        assert!(result.result_row().is_empty());
        assert_eq!(result.number_of_rows(), 0);
    }

    #[test]
    fn busy_failure_is_deadlock() {
        let handle = FakeHandle::failing(SQLITE_BUSY);
        let result = QueryResult::new("UPDATE t", Execution::Failed, &handle);
        assert!(result.has_deadlock());
    }

    #[test]
    fn empty_success_carries_metadata() {
        let mut result = QueryResult::new("INSERT INTO t", Execution::Done, &FakeHandle::ok());

        assert!(!result.has_failed());
        assert!(result.is_freed());
        assert_eq!(result.outcome(), Outcome::SucceededEmpty);
        assert_eq!(result.affected_rows(), 3);
        assert_eq!(result.insert_id(), 9);
        assert_eq!(result.error_number(), 0);
        assert_eq!(result.error_message(), "");
        assert_eq!(result.query(), "INSERT INTO t");
        assert!(result.result_column("id").is_empty());
    }

    #[test]
    fn result_array_returns_rows_and_frees_once() {
        let (mut result, fixture) = cursor_result(two_rows());
        assert!(!result.is_freed());

        let rows = result.result_array();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(rows[1].get_text("name"), Some("b"));
        assert!(result.is_freed());

        assert!(result.result_array().is_empty());
        assert!(result.result_row().is_empty());
        assert_eq!(result.result_cell("id"), None);
        assert!(result.result_column("id").is_empty());
        assert_eq!(result.number_of_rows(), 0);
        drop(result);

        assert_eq!(fixture.frees.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn result_row_walks_cursor_then_frees() {
        let (mut result, fixture) = cursor_result(two_rows());

        assert_eq!(result.result_row().get_i64("id"), Some(1));
        assert_eq!(fixture.frees.load(Ordering::SeqCst), 0);
        assert_eq!(result.result_row().get_i64("id"), Some(2));
        assert!(result.result_row().is_empty());
        assert_eq!(fixture.frees.load(Ordering::SeqCst), 1);
        assert!(result.result_row().is_empty());
        assert_eq!(fixture.frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn result_cell_reads_one_row_and_frees() {
        let (mut result, fixture) = cursor_result(two_rows());

        assert_eq!(result.result_cell("name"), Some(Value::text("a")));
        assert!(result.is_freed());
        assert_eq!(fixture.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.frees.load(Ordering::SeqCst), 1);
        assert_eq!(result.result_cell("name"), None);
    }

    #[test]
    fn result_cell_of_missing_column_is_none() {
        let (mut result, _fixture) = cursor_result(two_rows());
        assert_eq!(result.result_cell("nope"), None);
    }

    #[test]
    fn result_column_collects_one_column() {
        let (mut result, fixture) = cursor_result(two_rows());
        assert_eq!(
            result.result_column("name"),
            vec![Value::text("a"), Value::text("b")]
        );
        assert_eq!(fixture.frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn number_of_rows_consumes_cursor() {
        let (mut result, _fixture) = cursor_result(two_rows());
        assert_eq!(result.number_of_rows(), 2);
        assert!(result.result_array().is_empty());
    }

    #[test]
    fn drop_frees_unread_cursor_once() {
        let (mut result, fixture) = cursor_result(two_rows());
        assert_eq!(result.result_row().get_i64("id"), Some(1));
        drop(result);
        assert_eq!(fixture.frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_cursor_frees_on_first_read() {
        let (mut result, fixture) = cursor_result(VecDeque::new());
        assert_eq!(result.outcome(), Outcome::SucceededWithCursor);
        assert!(result.result_array().is_empty());
        assert_eq!(fixture.frees.load(Ordering::SeqCst), 1);
    }
}
