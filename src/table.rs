use std::collections::BTreeMap;

use crate::value::Value;

/// A single schema-less row: column name to scalar value.
///
/// A `BTreeMap` keeps key iteration deterministic, which in turn keeps
/// derived column order and persisted output stable across runs.
pub type Record = BTreeMap<String, Value>;

/// Read a cell from a record; a missing key reads as [`Value::Null`].
pub fn cell<'a>(row: &'a Record, field: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    row.get(field).unwrap_or(&NULL)
}

/// The in-memory working set of a pipeline run: an ordered sequence of
/// records plus the currently-known column set.
///
/// Rows are not validated for column homogeneity; extra or missing keys
/// per row are tolerated, mirroring loosely-structured ingested data.
/// The column list is re-derived after each stage rather than fixed up
/// front: select and aggregate replace it entirely, transform extends
/// it, and filter/clean/sort leave it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    /// An empty table with no rows and no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from raw records, deriving the column list in
    /// first-seen order across all rows.
    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Table { columns, rows }
    }

    /// Build a table with an explicit column list. Used by operators
    /// that already know their output schema.
    pub fn with_columns(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Table { columns, rows }
    }

    /// Current column set, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The rows, in order.
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `name` is in the current column set.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Consume the table, yielding its rows.
    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }
}
