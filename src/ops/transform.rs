//! Per-field value transformations: string casing, numeric scaling,
//! percent conversions, and datetime component extraction.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::error::Warnings;
use crate::stage::{TransformConfig, parse_config};
use crate::table::{Record, Table, cell};
use crate::value::Value;

/// Apply `{fields, operation, ...}` to each target field in turn.
///
/// With a `new_field_prefix` the result lands in `{prefix}_{field}`
/// (additive); otherwise the field is overwritten in place. A field
/// missing from the table is skipped with a warning; the remaining
/// fields still transform.
pub fn apply(
    table: &Table,
    config: &serde_json::Value,
    stage: &str,
    warnings: &mut Warnings,
) -> Table {
    let cfg: TransformConfig = match parse_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(stage, format!("invalid transform configuration: {e}"));
            return table.clone();
        }
    };
    let cfg = cfg.normalized();

    if cfg.fields.is_empty() || cfg.operation.is_empty() {
        warnings.push(stage, "transform needs target fields and an operation");
        return table.clone();
    }
    if transform_fn(&cfg.operation).is_none() {
        warnings.push(
            stage,
            format!("unknown transform operation '{}'", cfg.operation),
        );
        return table.clone();
    }

    let mut columns = table.columns().to_vec();
    let mut rows: Vec<Record> = table.rows().to_vec();

    for field in &cfg.fields {
        if !table.has_column(field) {
            warnings.push(
                stage,
                format!("field '{field}' does not exist in the dataset, skipped"),
            );
            continue;
        }

        let target = if cfg.new_field_prefix.is_empty() {
            field.clone()
        } else {
            format!("{}_{}", cfg.new_field_prefix, field)
        };

        let output = transform_column(&rows, field, &cfg);
        for (row, value) in rows.iter_mut().zip(output) {
            row.insert(target.clone(), value);
        }
        if !columns.iter().any(|c| c == &target) {
            columns.push(target);
        }
    }

    Table::with_columns(columns, rows)
}

enum Transform {
    /// Per-cell mapping with no column-wide state.
    Cellwise(fn(&Value, &TransformConfig) -> Value),
    /// Needs the whole column (z-score, min-max).
    Columnwise(fn(&[Option<f64>]) -> Vec<Value>),
}

fn transform_fn(operation: &str) -> Option<Transform> {
    let f = match operation {
        "uppercase" => Transform::Cellwise(|v, _| map_string(v, |s| s.to_uppercase())),
        "lowercase" => Transform::Cellwise(|v, _| map_string(v, |s| s.to_lowercase())),
        "trim" => Transform::Cellwise(|v, _| map_string(v, |s| s.trim().to_string())),
        "round" => Transform::Cellwise(|v, cfg| {
            v.as_numeric()
                .map(|n| round_to(n, cfg.decimal_places))
                .unwrap_or(Value::Null)
        }),
        "abs" => Transform::Cellwise(|v, _| {
            v.as_numeric()
                .map(|n| Value::from_f64_preserving(n.abs()))
                .unwrap_or(Value::Null)
        }),
        "percent_to_decimal" => Transform::Cellwise(percent_to_decimal),
        "decimal_to_percent" => Transform::Cellwise(decimal_to_percent),
        "standardize" => Transform::Columnwise(standardize),
        "normalize" => Transform::Columnwise(normalize),
        op if op.strip_prefix("extract_").is_some_and(is_time_component) => {
            Transform::Cellwise(extract_time_component)
        }
        _ => return None,
    };
    Some(f)
}

fn transform_column(rows: &[Record], field: &str, cfg: &TransformConfig) -> Vec<Value> {
    match transform_fn(&cfg.operation) {
        Some(Transform::Cellwise(f)) => rows.iter().map(|row| f(cell(row, field), cfg)).collect(),
        Some(Transform::Columnwise(f)) => {
            let coerced: Vec<Option<f64>> =
                rows.iter().map(|row| cell(row, field).as_numeric()).collect();
            f(&coerced)
        }
        None => unreachable!("operation checked by caller"),
    }
}

/// Non-null scalars are rendered to text and mapped; null passes through.
fn map_string(v: &Value, f: impl Fn(&str) -> String) -> Value {
    if v.is_null() {
        Value::Null
    } else {
        Value::String(f(&v.render()))
    }
}

/// Round to `places` decimal places via `Decimal`, avoiding binary-float
/// artifacts on common inputs like 2.675.
fn round_to(n: f64, places: u32) -> Value {
    match Decimal::from_f64(n) {
        Some(d) => {
            let rounded = d.round_dp(places);
            rounded
                .to_f64()
                .map(Value::Float)
                .unwrap_or(Value::Null)
        }
        None => Value::Null,
    }
}

/// `"42.5%"` → `0.43` (rounded to `decimal_places`). Non-numeric values
/// pass through unchanged.
fn percent_to_decimal(v: &Value, cfg: &TransformConfig) -> Value {
    if v.is_null() {
        return Value::Null;
    }
    let text = v.render();
    let stripped = text.trim().trim_end_matches('%');
    match stripped.trim().parse::<f64>() {
        Ok(n) => round_to(n / 100.0, cfg.decimal_places),
        Err(_) => v.clone(),
    }
}

/// `0.425` → `42.5`. Non-numeric values pass through unchanged.
fn decimal_to_percent(v: &Value, cfg: &TransformConfig) -> Value {
    if v.is_null() {
        return Value::Null;
    }
    match v.as_numeric() {
        Some(n) => round_to(n * 100.0, cfg.decimal_places),
        None => v.clone(),
    }
}

/// Sample z-score over the coerced column. A column with fewer than two
/// numeric values, or zero spread, yields nulls.
fn standardize(coerced: &[Option<f64>]) -> Vec<Value> {
    let numbers: Vec<f64> = coerced.iter().flatten().copied().collect();
    if numbers.len() < 2 {
        return vec![Value::Null; coerced.len()];
    }
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
    let var = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (numbers.len() - 1) as f64;
    let std = var.sqrt();
    if std == 0.0 {
        return vec![Value::Null; coerced.len()];
    }
    coerced
        .iter()
        .map(|n| match n {
            Some(x) => Value::Float((x - mean) / std),
            None => Value::Null,
        })
        .collect()
}

/// Min-max scaling to [0, 1]. A constant column yields nulls.
fn normalize(coerced: &[Option<f64>]) -> Vec<Value> {
    let numbers: Vec<f64> = coerced.iter().flatten().copied().collect();
    let (Some(min), Some(max)) = (
        numbers.iter().copied().reduce(f64::min),
        numbers.iter().copied().reduce(f64::max),
    ) else {
        return vec![Value::Null; coerced.len()];
    };
    if min == max {
        return vec![Value::Null; coerced.len()];
    }
    coerced
        .iter()
        .map(|n| match n {
            Some(x) => Value::Float((x - min) / (max - min)),
            None => Value::Null,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Datetime component extraction
// ---------------------------------------------------------------------------

fn is_time_component(component: &str) -> bool {
    matches!(
        component,
        "year" | "month" | "day" | "hour" | "minute" | "second" | "quarter" | "weekday"
    )
}

fn extract_time_component(v: &Value, cfg: &TransformConfig) -> Value {
    let Some(dt) = parse_datetime(v, &cfg.time_format) else {
        return Value::Null;
    };
    let component = cfg.operation.strip_prefix("extract_").unwrap_or_default();
    let n = match component {
        "year" => i64::from(dt.year()),
        "month" => i64::from(dt.month()),
        "day" => i64::from(dt.day()),
        "hour" => i64::from(dt.hour()),
        "minute" => i64::from(dt.minute()),
        "second" => i64::from(dt.second()),
        "quarter" => i64::from((dt.month() - 1) / 3 + 1),
        // 0 = Monday .. 6 = Sunday
        "weekday" => i64::from(dt.weekday().num_days_from_monday()),
        _ => return Value::Null,
    };
    Value::Integer(n)
}

/// The fixed time-format vocabulary accepted in stage configurations,
/// mapped to strftime patterns. Unknown entries fall back to `auto`.
fn vocabulary_pattern(time_format: &str) -> Option<&'static str> {
    match time_format {
        "YYYYmmdd" => Some("%Y%m%d"),
        "YYYY-mm-dd" => Some("%Y-%m-%d"),
        "YYYY/mm/dd" => Some("%Y/%m/%d"),
        "YYYY年mm月dd日" => Some("%Y年%m月%d日"),
        "hhMMss" => Some("%H%M%S"),
        "hh:MM:ss" => Some("%H:%M:%S"),
        "hh时MM分ss秒" => Some("%H时%M分%S秒"),
        "YYYYmmdd hhMMss" => Some("%Y%m%d %H%M%S"),
        "YYYY-mm-dd hh:MM:ss" => Some("%Y-%m-%d %H:%M:%S"),
        _ => None,
    }
}

fn parse_datetime(v: &Value, time_format: &str) -> Option<NaiveDateTime> {
    if v.is_null() {
        return None;
    }
    if time_format == "timestamp" {
        return parse_epoch(v.as_numeric()?);
    }
    if let Some(pattern) = vocabulary_pattern(time_format) {
        return parse_with_pattern(&v.render(), pattern);
    }
    parse_auto(v)
}

/// Epoch timestamps: magnitudes above 1e10 are milliseconds, else seconds.
fn parse_epoch(n: f64) -> Option<NaiveDateTime> {
    if !n.is_finite() {
        return None;
    }
    let dt = if n.abs() > 1e10 {
        DateTime::from_timestamp_millis(n as i64)?
    } else {
        DateTime::from_timestamp(n as i64, 0)?
    };
    Some(dt.naive_utc())
}

fn parse_with_pattern(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
        return Some(dt);
    }
    // date-only patterns parse at midnight; time-only attach to an epoch date
    if let Ok(date) = NaiveDate::parse_from_str(text, pattern) {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(time) = NaiveTime::parse_from_str(text, pattern) {
        return Some(NaiveDateTime::new(NaiveDate::from_ymd_opt(1900, 1, 1)?, time));
    }
    None
}

static DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").expect("static regex")
});
static DATE_DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"));
static DATE_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}/\d{2}/\d{2}$").expect("static regex"));
static DATE_COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}$").expect("static regex"));
static TIME_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}$").expect("static regex"));
static EPOCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10,13}$").expect("static regex"));

/// Auto-detection: recognize the common shapes by pattern, then parse
/// with the matching format. Bare 10-13 digit numbers read as epochs.
fn parse_auto(v: &Value) -> Option<NaiveDateTime> {
    if matches!(v, Value::Integer(_) | Value::Float(_)) {
        return parse_epoch(v.as_numeric()?);
    }
    let text = v.render();
    let text = text.trim();
    if DATE_TIME_RE.is_match(text) {
        let pattern = if text.contains('T') {
            "%Y-%m-%dT%H:%M:%S"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        // tolerate trailing fractional seconds by truncating to the match
        let head = &text[..19.min(text.len())];
        return parse_with_pattern(head, pattern);
    }
    if DATE_DASH_RE.is_match(text) {
        return parse_with_pattern(text, "%Y-%m-%d");
    }
    if DATE_SLASH_RE.is_match(text) {
        return parse_with_pattern(text, "%Y/%m/%d");
    }
    if DATE_COMPACT_RE.is_match(text) {
        return parse_with_pattern(text, "%Y%m%d");
    }
    if TIME_ONLY_RE.is_match(text) {
        return parse_with_pattern(text, "%H:%M:%S");
    }
    if EPOCH_RE.is_match(text) {
        return parse_epoch(text.parse::<f64>().ok()?);
    }
    DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_detects_common_shapes() {
        let dt = parse_auto(&Value::String("2024-03-01".into())).unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 3);

        let dt = parse_auto(&Value::String("2024/03/01".into())).unwrap();
        assert_eq!(dt.day(), 1);

        let dt = parse_auto(&Value::String("20240301".into())).unwrap();
        assert_eq!(dt.month(), 3);

        let dt = parse_auto(&Value::String("2024-03-01 10:30:05".into())).unwrap();
        assert_eq!(dt.hour(), 10);

        assert!(parse_auto(&Value::String("not a date".into())).is_none());
    }

    #[test]
    fn epoch_magnitude_disambiguates_units() {
        // seconds
        let dt = parse_epoch(1_700_000_000.0).unwrap();
        assert_eq!(dt.year(), 2023);
        // milliseconds
        let dt = parse_epoch(1_700_000_000_000.0).unwrap();
        assert_eq!(dt.year(), 2023);
    }

    #[test]
    fn weekday_is_monday_zero() {
        // 2024-03-04 is a Monday
        let cfg = TransformConfig {
            operation: "extract_weekday".to_string(),
            ..Default::default()
        };
        let v = extract_time_component(&Value::String("2024-03-04".into()), &cfg);
        assert_eq!(v, Value::Integer(0));
    }
}
