//! `sqlite3-dml` is a synchronous client layer over an embedded SQLite engine.
//!
//! The crate offers three cooperating pieces:
//! - [`Connection`]: lazy connect, transactions and raw queries
//! - [`DmlQueryBuilder`]: fluent SELECT/INSERT/REPLACE/UPDATE/DELETE assembly
//! - [`QueryResult`]: row, column and cell access over a forward-only cursor
//!
//! Values are escaped through the connection's [`QueryEscaper`], which
//! delegates character-level escaping to the engine driver.
//!
//! ```no_run
//! use sqlite3_dml::{Connection, ConnectionConfig};
//!
//! # fn main() -> sqlite3_dml::Result<()> {
//! let mut db = Connection::sqlite(ConnectionConfig::new("app.db"));
//! db.connect();
//!
//! let mut builder = db.new_dml_query_builder();
//! let name = db.query_escaper().value("Ada");
//! builder.from("users").where_("name", &name);
//!
//! let mut result = db.query(&builder.get_select_query())?;
//! for row in result.result_array() {
//!     println!("{:?}", row.get("id"));
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod connection;
pub mod engine;
mod error;
mod escaper;
mod logger;
mod result;
mod row;
mod sqlite;
mod value;

pub use builder::DmlQueryBuilder;
pub use config::{
    ConfigProvider, ConnectionConfig, EnvConfig, JsonConfig, MapConfig, DEFAULT_DRIVER,
    KEY_DRIVER, KEY_FILE, KEY_READONLY,
};
pub use connection::Connection;
pub use engine::AccessMode;
pub use error::DatabaseError;
pub use escaper::{LikeMatch, QueryEscaper, INDEXED_BY};
pub use logger::{LogContext, LogSink, TracingLogSink};
pub use result::{Outcome, QueryResult};
pub use row::Row;
pub use sqlite::SqliteDriver;
pub use value::Value;

pub type Result<T> = std::result::Result<T, DatabaseError>;
