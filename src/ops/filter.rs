//! Row filtering by a single-field predicate.

use std::collections::HashSet;

use crate::error::Warnings;
use crate::stage::{FilterConfig, parse_config};
use crate::table::{Table, cell};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    In,
    NotIn,
    IsNull,
    NotNull,
}

impl FilterOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(FilterOp::Eq),
            "!=" => Some(FilterOp::Ne),
            ">" => Some(FilterOp::Gt),
            ">=" => Some(FilterOp::Ge),
            "<" => Some(FilterOp::Lt),
            "<=" => Some(FilterOp::Le),
            "contains" => Some(FilterOp::Contains),
            "not_contains" => Some(FilterOp::NotContains),
            "in" => Some(FilterOp::In),
            "not_in" => Some(FilterOp::NotIn),
            "is_null" => Some(FilterOp::IsNull),
            "not_null" => Some(FilterOp::NotNull),
            _ => None,
        }
    }
}

/// Keep the rows of `table` matching `{field, operator, value}`.
///
/// Numeric comparisons coerce the cell to a number first (non-numeric
/// cells become null and are excluded). `in`/`not_in` split `value` on
/// commas into a literal set matched against the cell's string
/// rendering. Unknown operator or missing field degrade to a no-op.
pub fn apply(
    table: &Table,
    config: &serde_json::Value,
    stage: &str,
    warnings: &mut Warnings,
) -> Table {
    let cfg: FilterConfig = match parse_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(stage, format!("invalid filter configuration: {e}"));
            return table.clone();
        }
    };

    if cfg.field.is_empty() || cfg.operator.is_empty() {
        warnings.push(stage, "filter needs both a field and an operator");
        return table.clone();
    }
    if !table.has_column(&cfg.field) {
        warnings.push(
            stage,
            format!("field '{}' does not exist in the dataset", cfg.field),
        );
        return table.clone();
    }
    let Some(op) = FilterOp::parse(&cfg.operator) else {
        warnings.push(stage, format!("unknown filter operator '{}'", cfg.operator));
        return table.clone();
    };

    let value = Value::from_json(cfg.value.clone());
    let field = cfg.field.as_str();

    let keep: Box<dyn Fn(&Value) -> bool> = match op {
        FilterOp::Eq => Box::new(move |v| v.loose_eq(&value)),
        FilterOp::Ne => Box::new(move |v| !v.loose_eq(&value)),
        FilterOp::Gt | FilterOp::Ge | FilterOp::Lt | FilterOp::Le => {
            let Some(threshold) = value.as_numeric() else {
                warnings.push(
                    stage,
                    format!("comparison value '{}' is not numeric", value.render()),
                );
                return table.clone();
            };
            Box::new(move |v| {
                v.as_numeric().is_some_and(|n| match op {
                    FilterOp::Gt => n > threshold,
                    FilterOp::Ge => n >= threshold,
                    FilterOp::Lt => n < threshold,
                    FilterOp::Le => n <= threshold,
                    _ => unreachable!(),
                })
            })
        }
        FilterOp::Contains => {
            let needle = value.render();
            Box::new(move |v| !v.is_null() && v.render().contains(&needle))
        }
        FilterOp::NotContains => {
            // null cells are excluded, matching the coercion contract of contains
            let needle = value.render();
            Box::new(move |v| !v.is_null() && !v.render().contains(&needle))
        }
        FilterOp::In | FilterOp::NotIn => {
            let set: HashSet<String> = value
                .render()
                .split(',')
                .map(|item| item.trim().to_string())
                .collect();
            match op {
                FilterOp::In => Box::new(move |v| !v.is_null() && set.contains(&v.render())),
                // a null cell is never "in" the set, so not_in keeps it
                _ => Box::new(move |v| v.is_null() || !set.contains(&v.render())),
            }
        }
        FilterOp::IsNull => Box::new(|v| v.is_null()),
        FilterOp::NotNull => Box::new(|v| !v.is_null()),
    };

    let rows = table
        .rows()
        .iter()
        .filter(|row| keep(cell(row, field)))
        .cloned()
        .collect();
    Table::with_columns(table.columns().to_vec(), rows)
}
