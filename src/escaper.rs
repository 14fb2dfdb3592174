//! Turns raw values and identifiers into SQL fragments.

use std::fmt;
use std::sync::Arc;

use crate::engine::Driver;

/// The only index-hint verb SQLite knows.
pub const INDEXED_BY: &str = "INDEXED BY";

/// Where the `%` wildcards go in a LIKE pattern.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LikeMatch {
    /// `'value%'`
    Forward,
    /// `'%value'`
    Backward,
    /// `'%value%'`
    #[default]
    Both,
}

impl From<&str> for LikeMatch {
    /// `"forward"` and `"backward"` select a side; anything else matches both.
    fn from(position: &str) -> Self {
        match position {
            "forward" => Self::Forward,
            "backward" => Self::Backward,
            _ => Self::Both,
        }
    }
}

/// Builds escaped SQL fragments for one connection.
///
/// Character-level escaping is always delegated to the connection's
/// [`Driver`]; this type only adds quoting and decoration.
#[derive(Clone)]
pub struct QueryEscaper {
    driver: Arc<dyn Driver>,
}

impl fmt::Debug for QueryEscaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEscaper")
            .field("driver", &self.driver.name())
            .finish()
    }
}

impl QueryEscaper {
    pub(crate) fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// `'escaped'`
    pub fn value(&self, value: &str) -> String {
        format!("'{}'", self.driver.escape(value))
    }

    /// Same output as [`value`](Self::value); kept for call sites handling
    /// hex-encoded data.
    pub fn hexvalue(&self, value: &str) -> String {
        self.value(value)
    }

    /// Escaped LIKE pattern with wildcards placed per `position`.
    pub fn likevalue(&self, value: &str, position: impl Into<LikeMatch>) -> String {
        let escaped = self.driver.escape(value);
        match position.into() {
            LikeMatch::Forward => format!("'{escaped}%'"),
            LikeMatch::Backward => format!("'%{escaped}'"),
            LikeMatch::Both => format!("'%{escaped}%'"),
        }
    }

    /// Bare integer literal.
    pub fn intvalue(&self, value: i64) -> String {
        value.to_string()
    }

    /// Bare float literal in Rust's shortest round-trip form.
    pub fn floatvalue(&self, value: f64) -> String {
        value.to_string()
    }

    /// Wraps a subquery in parentheses.
    pub fn query_value(&self, sql: &str) -> String {
        format!("({sql})")
    }

    /// `('a', 'b')`
    pub fn list_value<S: AsRef<str>>(&self, values: &[S]) -> String {
        let items = values
            .iter()
            .map(|value| self.value(value.as_ref()))
            .collect::<Vec<_>>();
        format!("({})", items.join(", "))
    }

    /// Index hint for a table reference.
    ///
    /// Returns `None` when `indices` is empty. An unknown `keyword` falls
    /// back to `INDEXED BY`.
    pub fn index_hint<S: AsRef<str>>(&self, keyword: &str, indices: &[S]) -> Option<String> {
        if indices.is_empty() {
            return None;
        }
        let keyword = if keyword == INDEXED_BY {
            keyword
        } else {
            INDEXED_BY
        };
        let names = indices
            .iter()
            .map(|index| quote_identifier(index.as_ref()))
            .collect::<Vec<_>>();
        Some(format!("{keyword} {}", names.join(", ")))
    }

    /// Quoted column reference; `t.c` becomes `"t"."c"` and `*` stays bare.
    pub fn column(&self, name: &str, collation: Option<&str>) -> String {
        collate(location_reference(name), collation)
    }

    /// Quoted column for a result list, with ` AS "alias"` when given.
    pub fn result_column(&self, name: &str, alias: Option<&str>) -> String {
        aliased(location_reference(name), alias)
    }

    /// Quoted table reference, with ` AS "alias"` when given.
    pub fn table(&self, name: &str, alias: Option<&str>) -> String {
        aliased(location_reference(name), alias)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn location_reference(name: &str) -> String {
    name.split('.')
        .map(|part| {
            if part == "*" {
                part.to_owned()
            } else {
                quote_identifier(part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn aliased(reference: String, alias: Option<&str>) -> String {
    match alias.filter(|alias| !alias.is_empty()) {
        Some(alias) => format!("{reference} AS {}", quote_identifier(alias)),
        None => reference,
    }
}

fn collate(reference: String, collation: Option<&str>) -> String {
    match collation.filter(|collation| !collation.is_empty()) {
        Some(collation) => format!("{reference} COLLATE {collation}"),
        None => reference,
    }
}
