//! Stable multi-key sorting with optional row limiting. Columns are
//! unchanged; the row count may shrink when a limit is enabled.

use std::cmp::Ordering;

use crate::error::Warnings;
use crate::stage::{SortConfig, parse_config};
use crate::table::{Record, Table, cell};

/// Apply `{sort_fields, enable_limit?, ...}`.
///
/// Keys compare in listed priority order, each ascending or descending
/// independently. Null (and missing) cells always sort last regardless
/// of direction. With `enable_limit`, `top`/`bottom` keep the first or
/// last `limit_count` rows of the sorted sequence and `range` keeps
/// `[start_row, end_row)`, clamped to the table.
pub fn apply(
    table: &Table,
    config: &serde_json::Value,
    stage: &str,
    warnings: &mut Warnings,
) -> Table {
    let cfg: SortConfig = match parse_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(stage, format!("invalid sort configuration: {e}"));
            return table.clone();
        }
    };

    if cfg.sort_fields.is_empty() {
        warnings.push(stage, "sort needs at least one sort field");
        return table.clone();
    }
    for sf in &cfg.sort_fields {
        if !table.has_column(&sf.field) {
            warnings.push(
                stage,
                format!("sort field '{}' does not exist in the dataset", sf.field),
            );
            return table.clone();
        }
    }

    let mut rows: Vec<Record> = table.rows().to_vec();
    rows.sort_by(|a, b| {
        for sf in &cfg.sort_fields {
            let av = cell(a, &sf.field);
            let bv = cell(b, &sf.field);
            let ord = match (av.is_null(), bv.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ord = av.cmp_scalars(bv);
                    if sf.descending() { ord.reverse() } else { ord }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    if cfg.enable_limit {
        rows = match cfg.limit_type.as_str() {
            "top" => {
                let n = cfg.limit_count.max(0) as usize;
                rows.truncate(n.min(rows.len()));
                rows
            }
            "bottom" => {
                let n = (cfg.limit_count.max(0) as usize).min(rows.len());
                rows.split_off(rows.len() - n)
            }
            "range" => {
                let start = (cfg.start_row.max(0) as usize).min(rows.len());
                let end = (cfg.end_row.max(0) as usize).clamp(start, rows.len());
                rows[start..end].to_vec()
            }
            other => {
                // the validator rejects this up front; degrade to unlimited here
                warnings.push(stage, format!("unknown limit type '{other}'"));
                rows
            }
        };
    }

    Table::with_columns(table.columns().to_vec(), rows)
}
