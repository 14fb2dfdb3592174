use sqlite3_dml::{Connection, EnvConfig, TracingLogSink};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // DB_FILE, DB_DRIVER and DB_READONLY select the database.
    let Some(mut db) = Connection::from_config(&EnvConfig::new(), Arc::new(TracingLogSink)) else {
        anyhow::bail!("set DB_FILE to the database path");
    };
    if !db.connect() {
        anyhow::bail!("cannot open {}", db.database());
    }

    db.query("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")?;

    let esc = db.query_escaper().clone();
    let mut insert = db.new_dml_query_builder();
    insert
        .into_table("users")
        .column_names(&["name"])
        .values(&[esc.value("Kit")]);

    db.begin_transaction()?;
    let inserted = db.query(&insert.get_insert_query())?;
    if inserted.has_failed() {
        db.rollback()?;
        anyhow::bail!("insert failed: {}", inserted.error_message());
    }
    db.commit()?;
    println!("inserted row {}", inserted.insert_id());

    let mut select = db.new_dml_query_builder();
    select
        .select("id, name")
        .from("users")
        .where_like("name", &esc.likevalue("K", "forward"), false)
        .order_by("id", true);

    let mut result = db.query(&select.get_select_query())?;
    for row in result.result_array() {
        println!("{}", serde_json::to_string(&row)?);
    }

    Ok(())
}
