/// Error type returned by this crate.
///
/// Engine-reported failures are not errors: they are carried by
/// [`QueryResult`](crate::QueryResult) or logged by
/// [`Connection::connect`](crate::Connection::connect).
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// An operation that needs a live handle was issued while disconnected.
    #[error("connection unavailable: cannot {operation} without an open database handle")]
    ConnectionUnavailable {
        /// Name of the rejected operation.
        operation: &'static str,
    },
    /// A configuration value or configuration source could not be used.
    #[error("config error for '{key}': {message}")]
    Config { key: String, message: String },
}

impl DatabaseError {
    pub(crate) fn unavailable(operation: &'static str) -> Self {
        Self::ConnectionUnavailable { operation }
    }

    pub(crate) fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for the connection-unavailable error class.
    pub fn is_connection_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use crate::DatabaseError;

    #[test]
    fn unavailable_message_names_operation() {
        let err = DatabaseError::unavailable("commit");
        assert!(err.is_connection_unavailable());
        assert_eq!(
            err.to_string(),
            "connection unavailable: cannot commit without an open database handle"
        );
    }

    #[test]
    fn config_error_is_not_connection_error() {
        let err = DatabaseError::config("db.file", "missing");
        assert!(!err.is_connection_unavailable());
        assert_eq!(err.to_string(), "config error for 'db.file': missing");
    }
}
