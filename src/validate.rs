//! Dry-run pipeline validation.
//!
//! Before committing to execution, the stage chain is walked against a
//! running `available_columns` set, raising a descriptive error (naming
//! the offending field and stage) on the first structural problem. After
//! a stage's checks pass it is *simulated*: the real operator runs
//! against the working in-memory table, so schema drift across the
//! chain (derived transform columns, aggregate/select replacing the
//! schema) is tracked exactly as execution would produce it. Simulation
//! findings are logged at debug level and never fail validation; a
//! stage whose configuration does not deserialize is left to degrade to
//! a no-op at execution time.

use std::collections::HashSet;

use crate::error::{PipelineError, Warnings};
use crate::ops;
use crate::stage::{
    AggregateConfig, CleanConfig, FilterConfig, SelectConfig, SortConfig, StageDef, StageKind,
    TransformConfig, parse_config,
};
use crate::table::Table;

/// Validate `stages` (already in execution order) against `table`.
///
/// An empty input table is rejected immediately, before any stage is
/// inspected.
pub fn validate(table: &Table, stages: &[StageDef]) -> Result<(), PipelineError> {
    if table.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut available: HashSet<String> = table.columns().iter().cloned().collect();
    let mut current = table.clone();

    for stage in stages {
        check_stage(stage, &available)?;

        // simulate with the real operator to refresh the column set
        let mut sim = Warnings::new();
        current = ops::apply_stage(&current, stage, &mut sim);
        for w in sim.iter() {
            tracing::debug!(stage = %w.stage, "simulation: {}", w.message);
        }

        match stage.kind {
            StageKind::Transform => {
                available.extend(current.columns().iter().cloned());
            }
            StageKind::Aggregate | StageKind::Select | StageKind::Sort => {
                available = current.columns().iter().cloned().collect();
            }
            StageKind::Filter | StageKind::Clean => {}
        }
    }

    Ok(())
}

fn check_stage(stage: &StageDef, available: &HashSet<String>) -> Result<(), PipelineError> {
    let label = stage.label();
    let missing = |field: &str| {
        PipelineError::validation(label, format!("field '{field}' does not exist in the dataset"))
    };

    match stage.kind {
        StageKind::Filter => {
            if let Ok(cfg) = parse_config::<FilterConfig>(&stage.configuration)
                && !cfg.field.is_empty()
                && !available.contains(&cfg.field)
            {
                return Err(missing(&cfg.field));
            }
        }
        StageKind::Transform => {
            if let Ok(cfg) = parse_config::<TransformConfig>(&stage.configuration) {
                let cfg = cfg.normalized();
                for field in &cfg.fields {
                    if !field.is_empty() && !available.contains(field) {
                        return Err(missing(field));
                    }
                }
            }
        }
        StageKind::Clean => {
            if let Ok(cfg) = parse_config::<CleanConfig>(&stage.configuration)
                && !cfg.field.is_empty()
                && !available.contains(&cfg.field)
            {
                return Err(missing(&cfg.field));
            }
        }
        StageKind::Aggregate => {
            if let Ok(cfg) = parse_config::<AggregateConfig>(&stage.configuration) {
                let (group_by, aggregations) = cfg.normalized();
                for field in &group_by {
                    if !field.is_empty() && !available.contains(field) {
                        return Err(PipelineError::validation(
                            label,
                            format!("group-by field '{field}' does not exist in the dataset"),
                        ));
                    }
                }
                for agg in &aggregations {
                    if !agg.field.is_empty() && !available.contains(&agg.field) {
                        return Err(PipelineError::validation(
                            label,
                            format!(
                                "aggregation field '{}' does not exist in the dataset",
                                agg.field
                            ),
                        ));
                    }
                }
            }
        }
        StageKind::Select => {
            if let Ok(cfg) = parse_config::<SelectConfig>(&stage.configuration) {
                if cfg.selected_fields.is_empty() {
                    return Err(PipelineError::validation(
                        label,
                        "select must choose at least one field",
                    ));
                }
                if cfg.mode == "include" {
                    for field in &cfg.selected_fields {
                        if !field.is_empty() && !available.contains(field) {
                            return Err(missing(field));
                        }
                    }
                }
            }
        }
        StageKind::Sort => {
            if let Ok(cfg) = parse_config::<SortConfig>(&stage.configuration) {
                if cfg.sort_fields.is_empty() {
                    return Err(PipelineError::validation(
                        label,
                        "sort must configure at least one sort field",
                    ));
                }
                for sf in &cfg.sort_fields {
                    if !sf.field.is_empty() && !available.contains(&sf.field) {
                        return Err(missing(&sf.field));
                    }
                }
                if cfg.enable_limit {
                    match cfg.limit_type.as_str() {
                        "top" | "bottom" => {
                            if cfg.limit_count <= 0 {
                                return Err(PipelineError::validation(
                                    label,
                                    "limit count must be greater than 0",
                                ));
                            }
                        }
                        "range" => {
                            if cfg.start_row < 0 {
                                return Err(PipelineError::validation(
                                    label,
                                    "start row cannot be negative",
                                ));
                            }
                            if cfg.start_row >= cfg.end_row {
                                return Err(PipelineError::validation(
                                    label,
                                    "start row must be less than end row",
                                ));
                            }
                        }
                        other => {
                            return Err(PipelineError::validation(
                                label,
                                format!("unknown limit type '{other}'"),
                            ));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
