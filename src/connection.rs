use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigProvider, ConnectionConfig};
use crate::engine::{AccessMode, Driver, NativeHandle};
use crate::logger::{LogContext, LogSink, TracingLogSink};
use crate::{DatabaseError, DmlQueryBuilder, QueryEscaper, QueryResult, Result, SqliteDriver};

/// Driver names accepted by [`Connection::from_config`].
const SQLITE_DRIVER_NAMES: &[&str] = &[SqliteDriver::NAME, "sqlite"];

/// A single database handle with lazy connect and transaction control.
///
/// The handle is opened by [`connect`](Self::connect), which callers invoke
/// once before first use. Queries and transaction statements issued while
/// disconnected fail with [`DatabaseError::ConnectionUnavailable`];
/// `connect`, `disconnect` and `change_database` never fail and report
/// through their return value and the log sink instead.
pub struct Connection {
    config: ConnectionConfig,
    driver: Arc<dyn Driver>,
    logger: Arc<dyn LogSink>,
    handle: Option<Box<dyn NativeHandle>>,
    escaper: OnceCell<QueryEscaper>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.config.file_path)
            .field("access_mode", &self.config.access_mode)
            .field("driver", &self.driver.name())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Connection {
    /// Creates a disconnected connection.
    pub fn new(config: ConnectionConfig, driver: Arc<dyn Driver>, logger: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            driver,
            logger,
            handle: None,
            escaper: OnceCell::new(),
        }
    }

    /// Creates a disconnected SQLite connection that logs through `tracing`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sqlite3_dml::{Connection, ConnectionConfig};
    ///
    /// let mut db = Connection::sqlite(ConnectionConfig::new("app.db"));
    /// db.connect();
    /// ```
    pub fn sqlite(config: ConnectionConfig) -> Self {
        Self::new(config, Arc::new(SqliteDriver), Arc::new(TracingLogSink))
    }

    /// Creates a disconnected connection from configuration keys.
    ///
    /// Returns `None`, after logging a warning, when the database file is
    /// not configured or the driver is not a SQLite driver.
    pub fn from_config(provider: &dyn ConfigProvider, logger: Arc<dyn LogSink>) -> Option<Self> {
        let config = match ConnectionConfig::from_provider(provider) {
            Ok(config) => config,
            Err(err) => {
                logger.warning(
                    "Database configuration is incomplete",
                    &LogContext::new().with("error", err),
                );
                return None;
            }
        };

        let driver = config.driver_name.to_ascii_lowercase();
        if !SQLITE_DRIVER_NAMES.contains(&driver.as_str()) {
            logger.warning(
                "Unsupported database driver",
                &LogContext::new()
                    .with("driver", &config.driver_name)
                    .with("file", &config.file_path),
            );
            return None;
        }

        Some(Self::new(config, Arc::new(SqliteDriver), logger))
    }

    /// Opens the handle if it is not open yet.
    ///
    /// Returns whether the connection is usable afterwards. A failed open
    /// leaves the connection disconnected and logs a warning.
    pub fn connect(&mut self) -> bool {
        if self.handle.is_some() {
            return true;
        }

        match self
            .driver
            .open(&self.config.file_path, self.config.access_mode)
        {
            Ok(handle) => {
                self.handle = Some(handle);
                true
            }
            Err(failure) => {
                self.logger.warning(
                    "Failed to connect to database",
                    &LogContext::new()
                        .with("file", &self.config.file_path)
                        .with("mode", self.config.access_mode)
                        .with("error_number", failure.code)
                        .with("error_message", &failure.message),
                );
                false
            }
        }
    }

    /// Closes the handle; a no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }

    /// Reopens against another database file with the current access mode.
    ///
    /// The stored database path changes even when the reopen fails.
    pub fn change_database(&mut self, file_path: impl Into<String>) -> bool {
        self.config.file_path = file_path.into();
        self.disconnect();
        self.connect()
    }

    /// Whether a native handle is currently open.
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether the configured access mode is read-only.
    pub fn is_readonly(&self) -> bool {
        self.config.access_mode.is_readonly()
    }

    /// Switches the access mode used by the next [`connect`](Self::connect).
    pub fn set_readonly(&mut self, readonly: bool) {
        self.config.access_mode = AccessMode::from_readonly(readonly);
    }

    /// Current database file path.
    pub fn database(&self) -> &str {
        &self.config.file_path
    }

    /// Escapes `raw` with the engine's escaping routine (no quotes added).
    pub fn escape_string(&self, raw: &str) -> Result<String> {
        if self.handle.is_none() {
            return Err(DatabaseError::unavailable("escape a string"));
        }
        Ok(self.driver.escape(raw))
    }

    /// Issues `BEGIN TRANSACTION`.
    ///
    /// Returns whether the engine accepted the statement, or
    /// [`DatabaseError::ConnectionUnavailable`] without touching the engine
    /// when disconnected. The same holds for [`commit`](Self::commit),
    /// [`rollback`](Self::rollback) and [`end_transaction`](Self::end_transaction).
    pub fn begin_transaction(&mut self) -> Result<bool> {
        self.transaction_statement("begin a transaction", "BEGIN TRANSACTION")
    }

    /// Issues `COMMIT TRANSACTION`.
    pub fn commit(&mut self) -> Result<bool> {
        self.transaction_statement("commit", "COMMIT TRANSACTION")
    }

    /// Issues `ROLLBACK TRANSACTION`.
    pub fn rollback(&mut self) -> Result<bool> {
        self.transaction_statement("roll back", "ROLLBACK TRANSACTION")
    }

    /// Issues `END TRANSACTION`, SQLite's alias for commit.
    pub fn end_transaction(&mut self) -> Result<bool> {
        self.transaction_statement("end a transaction", "END TRANSACTION")
    }

    /// Executes one statement.
    ///
    /// Engine failures come back as a failed [`QueryResult`], never as `Err`,
    /// and are not retried.
    pub fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| DatabaseError::unavailable("run a query"))?;
        let execution = handle.execute(sql);
        Ok(QueryResult::new(sql, execution, &**handle))
    }

    /// A fresh statement builder sharing this connection's escaper.
    pub fn new_dml_query_builder(&self) -> DmlQueryBuilder {
        DmlQueryBuilder::new(self.query_escaper().clone())
    }

    /// The escaper for this connection, built on first use.
    pub fn query_escaper(&self) -> &QueryEscaper {
        self.escaper
            .get_or_init(|| QueryEscaper::new(Arc::clone(&self.driver)))
    }

    fn transaction_statement(&mut self, operation: &'static str, sql: &str) -> Result<bool> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| DatabaseError::unavailable(operation))?;
        let execution = handle.execute(sql);
        Ok(!QueryResult::new(sql, execution, &**handle).has_failed())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
