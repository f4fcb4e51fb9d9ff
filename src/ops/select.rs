//! Column projection with optional renaming. Replaces the table's
//! column set; never drops or reorders rows.

use crate::error::Warnings;
use crate::stage::{SelectConfig, parse_config};
use crate::table::{Record, Table};

/// Apply `{selected_fields, mode, rename_mapping?}`.
///
/// `include` keeps the listed fields that exist, in the listed order;
/// `exclude` keeps everything else in the table's current order. A
/// selection that would leave no columns degrades to a no-op. Renames
/// apply after selection, only where the old name survived and the new
/// name is non-blank.
pub fn apply(
    table: &Table,
    config: &serde_json::Value,
    stage: &str,
    warnings: &mut Warnings,
) -> Table {
    let cfg: SelectConfig = match parse_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(stage, format!("invalid select configuration: {e}"));
            return table.clone();
        }
    };

    if cfg.selected_fields.is_empty() {
        warnings.push(stage, "select needs at least one field");
        return table.clone();
    }

    let kept: Vec<String> = match cfg.mode.as_str() {
        "include" => {
            let kept: Vec<String> = cfg
                .selected_fields
                .iter()
                .filter(|f| table.has_column(f))
                .cloned()
                .collect();
            if kept.is_empty() {
                warnings.push(stage, "none of the selected fields exist in the dataset");
                return table.clone();
            }
            kept
        }
        "exclude" => {
            let kept: Vec<String> = table
                .columns()
                .iter()
                .filter(|c| !cfg.selected_fields.contains(c))
                .cloned()
                .collect();
            if kept.is_empty() {
                warnings.push(stage, "excluding the selected fields would leave no columns");
                return table.clone();
            }
            kept
        }
        other => {
            warnings.push(stage, format!("unknown select mode '{other}'"));
            return table.clone();
        }
    };

    // renames for surviving columns with non-blank targets
    let renames: Vec<(&String, String)> = cfg
        .rename_mapping
        .iter()
        .filter(|(old, new)| kept.contains(old) && !new.trim().is_empty())
        .map(|(old, new)| (old, new.trim().to_string()))
        .collect();

    let final_name = |column: &String| -> String {
        renames
            .iter()
            .find(|(old, _)| *old == column)
            .map(|(_, new)| new.clone())
            .unwrap_or_else(|| column.clone())
    };

    let columns: Vec<String> = kept.iter().map(final_name).collect();
    let rows: Vec<Record> = table
        .rows()
        .iter()
        .map(|row| {
            let mut out = Record::new();
            for column in &kept {
                if let Some(value) = row.get(column) {
                    out.insert(final_name(column), value.clone());
                }
            }
            out
        })
        .collect();

    Table::with_columns(columns, rows)
}
