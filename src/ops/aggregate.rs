//! Group-by aggregation. The only operator (besides select) that
//! replaces the table's column set outright.

use std::collections::HashMap;

use crate::error::Warnings;
use crate::stage::{AggregateConfig, parse_config};
use crate::table::{Record, Table, cell};
use crate::value::{GroupKey, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggOp {
    Sum,
    Mean,
    Count,
    Max,
    Min,
    Std,
    Var,
    Median,
    First,
    Last,
}

impl AggOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(AggOp::Sum),
            "mean" => Some(AggOp::Mean),
            "count" => Some(AggOp::Count),
            "max" => Some(AggOp::Max),
            "min" => Some(AggOp::Min),
            "std" => Some(AggOp::Std),
            "var" => Some(AggOp::Var),
            "median" => Some(AggOp::Median),
            "first" => Some(AggOp::First),
            "last" => Some(AggOp::Last),
            _ => None,
        }
    }
}

/// Collapse `table` to one row per distinct group-key tuple, in
/// first-seen order. Output columns are the group-by fields followed by
/// each aggregation's output name (default `{field}_{operation}`).
///
/// `count` counts non-null cells without coercion; every other
/// operation coerces to numeric first and excludes nulls from the
/// statistic. `std`/`var` are sample statistics (n − 1).
pub fn apply(
    table: &Table,
    config: &serde_json::Value,
    stage: &str,
    warnings: &mut Warnings,
) -> Table {
    let cfg: AggregateConfig = match parse_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(stage, format!("invalid aggregate configuration: {e}"));
            return table.clone();
        }
    };
    let (group_by, aggregations) = cfg.normalized();

    if group_by.is_empty() {
        warnings.push(stage, "aggregate needs at least one group-by field");
        return table.clone();
    }
    if aggregations.is_empty() {
        warnings.push(stage, "aggregate needs at least one aggregation");
        return table.clone();
    }
    for field in &group_by {
        if !table.has_column(field) {
            warnings.push(
                stage,
                format!("group-by field '{field}' does not exist in the dataset"),
            );
            return table.clone();
        }
    }

    // resolve the valid aggregations; skip (with a warning) the rest
    let mut specs: Vec<(String, AggOp, String)> = Vec::new();
    for agg in &aggregations {
        if agg.field.is_empty() || agg.operation.is_empty() {
            continue;
        }
        if !table.has_column(&agg.field) {
            warnings.push(
                stage,
                format!("aggregation field '{}' does not exist in the dataset", agg.field),
            );
            continue;
        }
        let Some(op) = AggOp::parse(&agg.operation) else {
            warnings.push(
                stage,
                format!("unknown aggregation operation '{}'", agg.operation),
            );
            continue;
        };
        let output_name = if agg.output_name.is_empty() {
            format!("{}_{}", agg.field, agg.operation)
        } else {
            agg.output_name.clone()
        };
        specs.push((agg.field.clone(), op, output_name));
    }
    if specs.is_empty() {
        warnings.push(stage, "no valid aggregations configured");
        return table.clone();
    }

    // group rows by key tuple, preserving first-seen order
    let mut index: HashMap<Vec<GroupKey>, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Record>> = Vec::new();
    for row in table.rows() {
        let key: Vec<GroupKey> = group_by.iter().map(|g| cell(row, g).group_key()).collect();
        match index.get(&key) {
            Some(&i) => groups[i].push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }

    let mut columns: Vec<String> = group_by.clone();
    columns.extend(specs.iter().map(|(_, _, name)| name.clone()));

    let rows: Vec<Record> = groups
        .iter()
        .map(|members| {
            let mut out = Record::new();
            let head = members[0];
            for g in &group_by {
                out.insert(g.clone(), cell(head, g).clone());
            }
            for (field, op, name) in &specs {
                out.insert(name.clone(), compute(members, field, *op));
            }
            out
        })
        .collect();

    Table::with_columns(columns, rows)
}

fn compute(members: &[&Record], field: &str, op: AggOp) -> Value {
    if op == AggOp::Count {
        let n = members.iter().filter(|row| !cell(row, field).is_null()).count();
        return Value::Integer(n as i64);
    }

    let numbers: Vec<f64> = members
        .iter()
        .filter_map(|row| cell(row, field).as_numeric())
        .collect();
    if numbers.is_empty() {
        return Value::Null;
    }

    match op {
        AggOp::Sum => Value::from_f64_preserving(numbers.iter().sum()),
        AggOp::Mean => Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64),
        AggOp::Max => Value::from_f64_preserving(numbers.iter().copied().fold(f64::MIN, f64::max)),
        AggOp::Min => Value::from_f64_preserving(numbers.iter().copied().fold(f64::MAX, f64::min)),
        AggOp::Std => sample_var(&numbers).map(|v| Value::Float(v.sqrt())).unwrap_or(Value::Null),
        AggOp::Var => sample_var(&numbers).map(Value::Float).unwrap_or(Value::Null),
        AggOp::Median => Value::from_f64_preserving(median(&numbers)),
        AggOp::First => Value::from_f64_preserving(numbers[0]),
        AggOp::Last => Value::from_f64_preserving(numbers[numbers.len() - 1]),
        AggOp::Count => unreachable!("count handled above"),
    }
}

fn sample_var(numbers: &[f64]) -> Option<f64> {
    if numbers.len() < 2 {
        return None;
    }
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
    Some(numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (numbers.len() - 1) as f64)
}

fn median(numbers: &[f64]) -> f64 {
    let mut sorted = numbers.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
