//! Warning sink used on connection failures.

use std::fmt;

/// Structured key/value pairs attached to a warning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogContext {
    fields: Vec<(&'static str, String)>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, rendering `value` with `Display`.
    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value:?}")?;
        }
        Ok(())
    }
}

/// Receives warnings from the connection layer.
pub trait LogSink: Send + Sync {
    /// Reports a failure that the caller sees only as a `false`/`None` return.
    fn warning(&self, message: &str, context: &LogContext);
}

/// Context keys emitted as their own `tracing` fields.
const KNOWN_FIELDS: &[&str] = &["file", "mode", "driver", "error_number", "error_message", "error"];

/// A [`LogContext`] split into the fields [`TracingLogSink`] records.
#[derive(Debug, Default, PartialEq)]
struct WarningFields<'a> {
    file: Option<&'a str>,
    mode: Option<&'a str>,
    driver: Option<&'a str>,
    error_number: Option<i64>,
    error_message: Option<&'a str>,
    error: Option<&'a str>,
    /// Keys outside [`KNOWN_FIELDS`], in insertion order.
    extra: LogContext,
}

impl<'a> WarningFields<'a> {
    fn new(context: &'a LogContext) -> Self {
        let extra = context
            .fields()
            .iter()
            .filter(|(key, _)| !KNOWN_FIELDS.contains(key))
            .fold(LogContext::new(), |extra, (key, value)| extra.with(*key, value));

        Self {
            file: context.get("file"),
            mode: context.get("mode"),
            driver: context.get("driver"),
            error_number: context
                .get("error_number")
                .and_then(|code| code.parse().ok()),
            error_message: context.get("error_message"),
            error: context.get("error"),
            extra,
        }
    }
}

/// Forwards warnings to `tracing`, one field per context key.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn warning(&self, message: &str, context: &LogContext) {
        let fields = WarningFields::new(context);
        let extra = (!fields.extra.is_empty()).then(|| tracing::field::display(&fields.extra));
        tracing::warn!(
            target: "sqlite3_dml",
            file = fields.file,
            mode = fields.mode,
            driver = fields.driver,
            error_number = fields.error_number,
            error_message = fields.error_message,
            error = fields.error,
            context = extra,
            "{message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{LogContext, LogSink, TracingLogSink, WarningFields};

    #[test]
    fn context_renders_fields_in_order() {
        let context = LogContext::new()
            .with("file", "app.db")
            .with("error_number", 14);
        assert_eq!(context.to_string(), r#"file="app.db" error_number="14""#);
        assert_eq!(context.get("error_number"), Some("14"));
        assert_eq!(context.get("missing"), None);
    }

    #[test]
    fn tracing_sink_accepts_warnings_without_subscriber() {
        TracingLogSink.warning("cannot open", &LogContext::new().with("file", "x.db"));
    }

    #[test]
    fn known_keys_become_fields() {
        let context = LogContext::new()
            .with("file", "app.db")
            .with("mode", "readonly")
            .with("error_number", 14)
            .with("error_message", "unable to open database file")
            .with("attempt", 2);

        let fields = WarningFields::new(&context);
        assert_eq!(fields.file, Some("app.db"));
        assert_eq!(fields.mode, Some("readonly"));
        assert_eq!(fields.error_number, Some(14));
        assert_eq!(fields.error_message, Some("unable to open database file"));
        assert_eq!(fields.driver, None);
        assert_eq!(fields.extra, LogContext::new().with("attempt", 2));
    }

    #[test]
    fn context_without_extra_keys_has_empty_extra() {
        let context = LogContext::new().with("driver", "mysql").with("file", "app.db");
        let fields = WarningFields::new(&context);
        assert_eq!(fields.driver, Some("mysql"));
        assert!(fields.extra.is_empty());
    }
}
