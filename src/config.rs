//! Configuration lookup for connection setup.
//!
//! The connection reads three keys once, when it is built:
//! - `db.file`: database file path (required)
//! - `db.driver`: engine driver name, `sqlite3` when absent
//! - `db.readonly`: open read-only instead of read-write

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::engine::AccessMode;
use crate::{DatabaseError, Result};

pub const KEY_FILE: &str = "db.file";
pub const KEY_DRIVER: &str = "db.driver";
pub const KEY_READONLY: &str = "db.readonly";

/// Driver used when `db.driver` is not configured.
pub const DEFAULT_DRIVER: &str = "sqlite3";

/// String and bool lookups by key.
pub trait ConfigProvider {
    fn get_string(&self, key: &str) -> Option<String>;

    /// Booleans stored as strings accept `true/false`, `1/0`, `yes/no` and `on/off`.
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_string(key).as_deref().and_then(parse_bool)
    }
}

/// Settings a [`Connection`](crate::Connection) is created from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionConfig {
    /// Database file path, or `:memory:`.
    pub file_path: String,
    pub access_mode: AccessMode,
    pub driver_name: String,
}

impl ConnectionConfig {
    /// Read-write sqlite3 settings for `file_path`.
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            access_mode: AccessMode::ReadWrite,
            driver_name: DEFAULT_DRIVER.to_owned(),
        }
    }

    /// Sets the access mode.
    pub fn with_access_mode(mut self, access_mode: AccessMode) -> Self {
        self.access_mode = access_mode;
        self
    }

    /// Sets the driver name checked by [`Connection::from_config`](crate::Connection::from_config).
    pub fn with_driver(mut self, driver_name: impl Into<String>) -> Self {
        self.driver_name = driver_name.into();
        self
    }

    /// Reads the connection keys from `provider`.
    ///
    /// Fails only when `db.file` is missing or empty.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self> {
        let file_path = provider
            .get_string(KEY_FILE)
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| DatabaseError::config(KEY_FILE, "database file path is not set"))?;
        let readonly = provider.get_bool(KEY_READONLY).unwrap_or(false);
        let driver_name = provider
            .get_string(KEY_DRIVER)
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DRIVER.to_owned());

        Ok(Self {
            file_path,
            access_mode: AccessMode::from_readonly(readonly),
            driver_name,
        })
    }
}

/// In-memory provider, mostly for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_bool(self, key: impl Into<String>, value: bool) -> Self {
        self.with(key, value.to_string())
    }
}

impl ConfigProvider for MapConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Reads keys from environment variables: `db.file` → `DB_FILE`.
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    prefix: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `prefix` to every variable name, e.g. `APP_` → `APP_DB_FILE`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable consulted for `key`.
    pub fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace('.', "_").to_ascii_uppercase())
    }
}

impl ConfigProvider for EnvConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

/// Provider backed by a JSON document.
///
/// Dotted keys walk nested objects first and fall back to a flat key, so
/// both `{"db": {"file": "a.db"}}` and `{"db.file": "a.db"}` serve `db.file`.
#[derive(Clone, Debug)]
pub struct JsonConfig {
    root: JsonValue,
}

impl JsonConfig {
    /// Parses a JSON object.
    pub fn parse(content: &str) -> Result<Self> {
        let root: JsonValue = serde_json::from_str(content)
            .map_err(|err| DatabaseError::config("<json>", format!("invalid JSON: {err}")))?;
        if !root.is_object() {
            return Err(DatabaseError::config(
                "<json>",
                "configuration root must be an object",
            ));
        }
        Ok(Self { root })
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            DatabaseError::config(path.display().to_string(), format!("cannot read: {err}"))
        })?;
        Self::parse(&content)
    }

    fn lookup(&self, key: &str) -> Option<&JsonValue> {
        let nested = key
            .split('.')
            .try_fold(&self.root, |node, part| node.get(part));
        nested.or_else(|| self.root.get(key))
    }
}

impl ConfigProvider for JsonConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.lookup(key)? {
            JsonValue::String(value) => Some(value.clone()),
            JsonValue::Bool(value) => Some(value.to_string()),
            JsonValue::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.lookup(key)? {
            JsonValue::Bool(value) => Some(*value),
            JsonValue::String(value) => parse_bool(value),
            JsonValue::Number(value) => value.as_i64().map(|value| value != 0),
            _ => None,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_read_write_sqlite3() {
        let config = ConnectionConfig::from_provider(&MapConfig::new().with(KEY_FILE, "app.db"))
            .expect("must read config");
        assert_eq!(config, ConnectionConfig::new("app.db"));
        assert_eq!(config.driver_name, DEFAULT_DRIVER);
        assert_eq!(config.access_mode, AccessMode::ReadWrite);
    }

    #[test]
    fn readonly_and_driver_are_read() {
        let provider = MapConfig::new()
            .with(KEY_FILE, "app.db")
            .with(KEY_DRIVER, " sqlite ")
            .with_bool(KEY_READONLY, true);
        let config = ConnectionConfig::from_provider(&provider).expect("must read config");
        assert_eq!(config.access_mode, AccessMode::ReadOnly);
        assert_eq!(config.driver_name, "sqlite");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ConnectionConfig::from_provider(&MapConfig::new().with(KEY_FILE, "  "))
            .expect_err("must fail");
        assert!(matches!(err, DatabaseError::Config { ref key, .. } if key == KEY_FILE));
    }

    #[test]
    fn bool_strings_are_parsed() {
        let provider = MapConfig::new()
            .with("a", "Yes")
            .with("b", "off")
            .with("c", "maybe");
        assert_eq!(provider.get_bool("a"), Some(true));
        assert_eq!(provider.get_bool("b"), Some(false));
        assert_eq!(provider.get_bool("c"), None);
        assert_eq!(provider.get_bool("d"), None);
    }

    #[test]
    fn env_var_names_are_derived_from_keys() {
        assert_eq!(EnvConfig::new().var_name(KEY_FILE), "DB_FILE");
        assert_eq!(
            EnvConfig::with_prefix("APP_").var_name(KEY_READONLY),
            "APP_DB_READONLY"
        );
    }

    #[test]
    fn json_nested_and_flat_keys() {
        let nested = JsonConfig::parse(r#"{"db": {"file": "a.db", "readonly": true}}"#)
            .expect("must parse");
        assert_eq!(nested.get_string(KEY_FILE).as_deref(), Some("a.db"));
        assert_eq!(nested.get_bool(KEY_READONLY), Some(true));

        let flat = JsonConfig::parse(r#"{"db.file": "b.db", "db.readonly": "no"}"#)
            .expect("must parse");
        assert_eq!(flat.get_string(KEY_FILE).as_deref(), Some("b.db"));
        assert_eq!(flat.get_bool(KEY_READONLY), Some(false));
        assert_eq!(flat.get_string(KEY_DRIVER), None);
    }

    #[test]
    fn json_root_must_be_object() {
        assert!(JsonConfig::parse("[1, 2]").is_err());
        assert!(JsonConfig::parse("not json").is_err());
    }

    #[test]
    fn json_load_reads_file() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let path = dir.path().join("db.json");
        fs::write(&path, r#"{"db": {"file": "c.db"}}"#).expect("must write config");

        let config = ConnectionConfig::from_provider(&JsonConfig::load(&path).expect("must load"))
            .expect("must read config");
        assert_eq!(config.file_path, "c.db");
    }
}
