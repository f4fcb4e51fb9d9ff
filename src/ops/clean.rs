//! Row-level data cleaning: null filling, duplicate removal, null
//! dropping. Columns are unchanged.

use std::collections::HashSet;

use crate::error::Warnings;
use crate::stage::{CleanConfig, parse_config};
use crate::table::{Record, Table, cell};
use crate::value::{GroupKey, Value};

/// Apply `{field, operation, value?}`.
///
/// - `fill_na` replaces null (or missing) cells with `value`, default 0
/// - `remove_duplicates` keeps the first row per distinct value of `field`
/// - `remove_na` drops rows where `field` is null or missing
pub fn apply(
    table: &Table,
    config: &serde_json::Value,
    stage: &str,
    warnings: &mut Warnings,
) -> Table {
    let cfg: CleanConfig = match parse_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(stage, format!("invalid clean configuration: {e}"));
            return table.clone();
        }
    };

    if cfg.field.is_empty() {
        warnings.push(stage, "clean needs a target field");
        return table.clone();
    }
    if !table.has_column(&cfg.field) {
        warnings.push(
            stage,
            format!("field '{}' does not exist in the dataset", cfg.field),
        );
        return table.clone();
    }

    let field = cfg.field.as_str();
    let rows: Vec<Record> = match cfg.operation.as_str() {
        "fill_na" => {
            let fill = match Value::from_json(cfg.value.clone()) {
                Value::Null => Value::Integer(0),
                Value::String(s) if s.is_empty() => Value::Integer(0),
                other => other,
            };
            table
                .rows()
                .iter()
                .map(|row| {
                    let mut row = row.clone();
                    if cell(&row, field).is_null() {
                        row.insert(field.to_string(), fill.clone());
                    }
                    row
                })
                .collect()
        }
        "remove_duplicates" => {
            let mut seen: HashSet<GroupKey> = HashSet::new();
            table
                .rows()
                .iter()
                .filter(|row| seen.insert(cell(row, field).group_key()))
                .cloned()
                .collect()
        }
        "remove_na" => table
            .rows()
            .iter()
            .filter(|row| !cell(row, field).is_null())
            .cloned()
            .collect(),
        other => {
            warnings.push(stage, format!("unknown clean operation '{other}'"));
            return table.clone();
        }
    };

    Table::with_columns(table.columns().to_vec(), rows)
}
