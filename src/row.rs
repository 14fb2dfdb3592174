//! Name-addressable result rows.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::Value;

/// One fetched row: column names aligned with their values.
///
/// Column names are shared between all rows of a cursor. An empty row
/// (no columns) is what the result accessors hand out at end-of-cursor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    cols: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Builds a row. Extra values beyond the column count are dropped and
    /// missing ones are filled with [`Value::Null`].
    pub fn new(cols: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(cols.len(), Value::Null);
        Self { cols, values }
    }

    /// Returns a value by exact column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.cols.iter().position(|col| col == name)?;
        self.values.get(idx)
    }

    /// Returns an integer value by column name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    /// Returns a float value by column name.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    /// Returns a text value by column name.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn columns(&self) -> &[String] {
        &self.cols
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cols
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Takes the value out of a column, leaving the row untouched otherwise.
    pub(crate) fn take(mut self, name: &str) -> Option<Value> {
        let idx = self.cols.iter().position(|col| col == name)?;
        Some(std::mem::replace(&mut self.values[idx], Value::Null))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (col, value) in self.iter() {
            map.serialize_entry(col, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{Row, Value};

    fn sample() -> Row {
        let cols: Arc<[String]> = vec!["id".to_owned(), "name".to_owned()].into();
        Row::new(cols, vec![Value::integer(1), Value::text("Kit")])
    }

    #[test]
    fn get_by_name() {
        let row = sample();
        assert_eq!(row.get_i64("id"), Some(1));
        assert_eq!(row.get_text("name"), Some("Kit"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn new_pads_missing_values_with_null() {
        let cols: Arc<[String]> = vec!["a".to_owned(), "b".to_owned()].into();
        let row = Row::new(cols, vec![Value::integer(1)]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("b"), Some(&Value::Null));
    }

    #[test]
    fn default_row_is_empty() {
        let row = Row::default();
        assert!(row.is_empty());
        assert_eq!(row.iter().count(), 0);
    }

    #[test]
    fn serializes_as_object_in_column_order() {
        let json = serde_json::to_string(&sample()).expect("must serialize");
        assert_eq!(json, r#"{"id":1,"name":"Kit"}"#);
    }

    #[test]
    fn take_moves_single_column() {
        assert_eq!(sample().take("name"), Some(Value::text("Kit")));
        assert_eq!(sample().take("nope"), None);
    }
}
