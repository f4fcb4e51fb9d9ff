//! Stage definitions and their typed configurations.
//!
//! A pipeline is an ordered list of [`StageDef`]s, each carrying a
//! JSON-compatible `configuration` blob whose shape depends on the stage
//! kind. Configurations are deserialized permissively (unknown operators
//! stay plain strings; missing entries get defaults) so that a malformed
//! stage degrades to a no-op at execution time instead of failing the
//! run. Back-compat shapes (the old singular `field`/`new_field` and
//! `group_by`/`aggregate_field` configs) are normalized into the
//! canonical list forms here, at parse time, so operator logic only ever
//! sees one shape.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The six stage types a pipeline can chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Filter,
    Transform,
    Aggregate,
    Clean,
    Select,
    Sort,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Filter => "filter",
            StageKind::Transform => "transform",
            StageKind::Aggregate => "aggregate",
            StageKind::Clean => "clean",
            StageKind::Select => "select",
            StageKind::Sort => "sort",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of a pipeline: a name, a kind, an execution order, and a
/// kind-dependent configuration mapping (JSON-compatible values only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    /// Optional display name used in the execution log.
    #[serde(default)]
    pub name: Option<String>,

    /// Stage type.
    #[serde(rename = "type")]
    pub kind: StageKind,

    /// Execution order; ties break by insertion order.
    pub order: i32,

    /// Kind-dependent configuration.
    #[serde(default)]
    pub configuration: serde_json::Value,
}

impl StageDef {
    pub fn new(kind: StageKind, order: i32, configuration: serde_json::Value) -> Self {
        StageDef {
            name: None,
            kind,
            order,
            configuration,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label used in logs and errors: the stage name, falling back to
    /// the kind when unnamed.
    pub fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.kind.as_str(),
        }
    }
}

/// Deserialize a stage configuration blob into its typed form.
pub fn parse_config<T: DeserializeOwned>(raw: &serde_json::Value) -> Result<T, serde_json::Error> {
    T::deserialize(raw)
}

/// A config entry that accepts either a single string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) if s.is_empty() => Vec::new(),
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// `{field, operator, value}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub field: String,
    pub operator: String,
    pub value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// `{fields, operation, new_field_prefix?, decimal_places?, time_format?}`
///
/// The legacy single-field shape (`field` + optional `new_field`) is
/// accepted and folded into the list form by [`TransformConfig::normalized`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub fields: Vec<String>,
    pub operation: String,
    pub new_field_prefix: String,
    pub decimal_places: u32,
    pub time_format: String,

    // legacy single-field shape
    pub(crate) field: String,
    pub(crate) new_field: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            fields: Vec::new(),
            operation: String::new(),
            new_field_prefix: String::new(),
            decimal_places: 2,
            time_format: "auto".to_string(),
            field: String::new(),
            new_field: String::new(),
        }
    }
}

impl TransformConfig {
    /// Fold the legacy `field`/`new_field` pair into the canonical list
    /// shape. With exactly one legacy field, `new_field` becomes the
    /// output prefix (so the derived column is `{new_field}_{field}`).
    pub fn normalized(mut self) -> Self {
        if self.fields.is_empty() && !self.field.is_empty() {
            if !self.new_field.is_empty() {
                self.new_field_prefix = std::mem::take(&mut self.new_field);
            }
            self.fields = vec![std::mem::take(&mut self.field)];
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// One aggregation: a field, an operation, and an optional output column
/// name (defaulting to `{field}_{operation}`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AggregationSpec {
    pub field: String,
    pub operation: String,
    pub output_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SpecOrList {
    One(AggregationSpec),
    Many(Vec<AggregationSpec>),
}

/// `{group_by, aggregations}` with back-compat for the singular
/// `group_by` string plus `aggregate_field`/`operation` pair.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    group_by: Option<OneOrMany>,
    aggregations: Option<SpecOrList>,

    // legacy singular shape
    aggregate_field: String,
    operation: String,
}

impl AggregateConfig {
    /// Resolve into the canonical `(group_by, aggregations)` lists.
    pub fn normalized(self) -> (Vec<String>, Vec<AggregationSpec>) {
        let group_by = self.group_by.map(OneOrMany::into_vec).unwrap_or_default();

        let mut aggregations = match self.aggregations {
            Some(SpecOrList::One(spec)) => vec![spec],
            Some(SpecOrList::Many(specs)) => specs,
            None => Vec::new(),
        };

        if aggregations.is_empty() && !self.aggregate_field.is_empty() && !self.operation.is_empty()
        {
            aggregations.push(AggregationSpec {
                output_name: format!("{}_{}", self.aggregate_field, self.operation),
                field: self.aggregate_field,
                operation: self.operation,
            });
        }

        (group_by, aggregations)
    }
}

// ---------------------------------------------------------------------------
// Select
// ---------------------------------------------------------------------------

fn default_mode() -> String {
    "include".to_string()
}

/// `{selected_fields, mode: include|exclude, rename_mapping?}`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectConfig {
    pub selected_fields: Vec<String>,
    pub mode: String,
    pub rename_mapping: HashMap<String, String>,
}

impl Default for SelectConfig {
    fn default() -> Self {
        SelectConfig {
            selected_fields: Vec::new(),
            mode: default_mode(),
            rename_mapping: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

/// One sort key: field plus `asc`/`desc` direction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SortField {
    pub field: String,
    pub direction: String,
}

impl Default for SortField {
    fn default() -> Self {
        SortField {
            field: String::new(),
            direction: "asc".to_string(),
        }
    }
}

impl SortField {
    pub fn descending(&self) -> bool {
        self.direction.eq_ignore_ascii_case("desc")
    }
}

/// `{sort_fields, enable_limit?, limit_type?, limit_count?, start_row?, end_row?}`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    pub sort_fields: Vec<SortField>,
    pub enable_limit: bool,
    pub limit_type: String,
    pub limit_count: i64,
    pub start_row: i64,
    pub end_row: i64,
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig {
            sort_fields: Vec::new(),
            enable_limit: false,
            limit_type: "top".to_string(),
            limit_count: 10,
            start_row: 0,
            end_row: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Clean
// ---------------------------------------------------------------------------

/// `{field, operation, value?}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    pub field: String,
    pub operation: String,
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_transform_shape_normalizes_to_list_form() {
        let cfg: TransformConfig = parse_config(&json!({
            "field": "price",
            "new_field": "rounded",
            "operation": "round",
        }))
        .unwrap();
        let cfg = cfg.normalized();
        assert_eq!(cfg.fields, ["price"]);
        assert_eq!(cfg.new_field_prefix, "rounded");
        assert_eq!(cfg.decimal_places, 2);
    }

    #[test]
    fn legacy_aggregate_shape_normalizes() {
        let cfg: AggregateConfig = parse_config(&json!({
            "group_by": "city",
            "aggregate_field": "sales",
            "operation": "sum",
        }))
        .unwrap();
        let (group_by, aggs) = cfg.normalized();
        assert_eq!(group_by, ["city"]);
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].field, "sales");
        assert_eq!(aggs[0].output_name, "sales_sum");
    }

    #[test]
    fn aggregations_accept_single_mapping_or_list() {
        let cfg: AggregateConfig = parse_config(&json!({
            "group_by": ["a"],
            "aggregations": {"field": "x", "operation": "mean"},
        }))
        .unwrap();
        let (_, aggs) = cfg.normalized();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].operation, "mean");
    }

    #[test]
    fn stage_label_falls_back_to_kind() {
        let unnamed = StageDef::new(StageKind::Filter, 1, json!({}));
        assert_eq!(unnamed.label(), "filter");
        let named = StageDef::new(StageKind::Filter, 1, json!({})).named("drop inactive");
        assert_eq!(named.label(), "drop inactive");
    }
}
